//! Multi-level LRU raster cache
//!
//! Rasters are grouped by resolution class. Each class is an independent
//! LRU with its own capacity; the set of classes is itself bounded and
//! evicted least-recently-used first, except that the current class is
//! never evicted.

use std::num::NonZeroUsize;
use std::sync::Arc;

use log::{debug, warn};
use lru::LruCache;

use super::raster::Raster;
use super::types::{ItemId, ResolutionClass};

/// Default rasters kept per resolution class
pub const DEFAULT_CLASS_CAPACITY: usize = 500;
/// Default number of resolution classes kept at once
pub const DEFAULT_MAX_CLASSES: usize = 7;
/// Largest scale factor at which a cached raster from another class is reused
pub const DEFAULT_FAST_ZOOM_MAX_SCALE: f32 = 1.5;

/// Cache key for rendered thumbnails
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub class: ResolutionClass,
    pub item: ItemId,
}

impl CacheKey {
    #[must_use]
    pub const fn new(class: ResolutionClass, item: ItemId) -> Self {
        Self { class, item }
    }
}

/// Identity of a cached raster. Fresh for every insertion.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RasterId(pub u64);

/// A cache entry
#[derive(Clone, Debug)]
pub struct CachedRaster {
    pub id: RasterId,
    pub raster: Arc<Raster>,
    /// Produced by rescaling another class's raster rather than rendered
    pub derived: bool,
}

impl CachedRaster {
    #[must_use]
    pub fn size(&self) -> (u32, u32) {
        self.raster.size()
    }
}

/// Outcome of [`ThumbnailCache::lookup`]
#[derive(Clone, Debug)]
pub enum Lookup {
    /// Rendered at the requested class
    Exact(CachedRaster),
    /// Rescaled from a neighbouring class; still worth requesting a real render
    Rescaled(CachedRaster),
    Miss,
}

impl Lookup {
    #[must_use]
    pub fn raster(&self) -> Option<&CachedRaster> {
        match self {
            Self::Exact(entry) | Self::Rescaled(entry) => Some(entry),
            Self::Miss => None,
        }
    }

    #[must_use]
    pub fn is_exact(&self) -> bool {
        matches!(self, Self::Exact(_))
    }
}

type ClassMap = LruCache<ItemId, CachedRaster>;

/// Two-level LRU: resolution class -> item -> raster
pub struct ThumbnailCache {
    classes: LruCache<ResolutionClass, ClassMap>,
    class_capacity: NonZeroUsize,
    max_classes: usize,
    fast_zoom_max_scale: f32,
    current: Option<ResolutionClass>,
    next_id: u64,
}

impl Default for ThumbnailCache {
    fn default() -> Self {
        Self::new(DEFAULT_CLASS_CAPACITY, DEFAULT_MAX_CLASSES)
    }
}

impl ThumbnailCache {
    /// Create a cache holding `class_capacity` rasters in each of at most
    /// `max_classes` classes
    #[must_use]
    pub fn new(class_capacity: usize, max_classes: usize) -> Self {
        Self {
            classes: LruCache::unbounded(),
            class_capacity: NonZeroUsize::new(class_capacity).unwrap_or(NonZeroUsize::MIN),
            max_classes: max_classes.max(1),
            fast_zoom_max_scale: DEFAULT_FAST_ZOOM_MAX_SCALE,
            current: None,
            next_id: 1,
        }
    }

    #[must_use]
    pub fn with_fast_zoom_max_scale(mut self, scale: f32) -> Self {
        self.fast_zoom_max_scale = if scale.is_finite() { scale.max(1.0) } else { 1.0 };
        self
    }

    /// Mark the class in use; it is exempt from class eviction
    pub fn set_current_class(&mut self, class: ResolutionClass) {
        self.current = Some(class);
        // Touch so the class is also the most recent in the outer order.
        self.classes.promote(&class);
    }

    #[must_use]
    pub fn current_class(&self) -> Option<ResolutionClass> {
        self.current
    }

    /// Get an entry, promoting it (and its class) in LRU order
    #[must_use]
    pub fn get(&mut self, key: CacheKey) -> Option<CachedRaster> {
        self.classes
            .get_mut(&key.class)
            .and_then(|items| items.get(&key.item))
            .cloned()
    }

    /// Look at an entry without touching LRU order
    #[must_use]
    pub fn peek(&self, key: CacheKey) -> Option<&CachedRaster> {
        self.classes
            .peek(&key.class)
            .and_then(|items| items.peek(&key.item))
    }

    #[must_use]
    pub fn contains(&self, key: CacheKey) -> bool {
        self.peek(key).is_some()
    }

    /// True only for a rendered (not rescaled) entry
    #[must_use]
    pub fn contains_exact(&self, key: CacheKey) -> bool {
        self.peek(key).is_some_and(|entry| !entry.derived)
    }

    /// Insert a rendered raster, replacing any entry for the key
    pub fn put(&mut self, key: CacheKey, raster: impl Into<Arc<Raster>>) -> CachedRaster {
        self.insert(key, raster.into(), false)
    }

    fn insert(&mut self, key: CacheKey, raster: Arc<Raster>, derived: bool) -> CachedRaster {
        let entry = CachedRaster {
            id: RasterId(self.next_id),
            raster,
            derived,
        };
        self.next_id += 1;

        if !self.classes.contains(&key.class) {
            self.make_room_for_class(key.class);
            self.classes
                .put(key.class, LruCache::new(self.class_capacity));
        }

        if let Some(items) = self.classes.get_mut(&key.class) {
            if let Some((evicted, _)) = items.push(key.item, entry.clone()) {
                if evicted != key.item {
                    debug!("Evicted item {evicted} from class {}", key.class);
                }
            }
        }
        entry
    }

    fn make_room_for_class(&mut self, incoming: ResolutionClass) {
        while self.classes.len() >= self.max_classes {
            let victim = self
                .classes
                .iter()
                .rev()
                .map(|(class, _)| *class)
                .find(|class| Some(*class) != self.current && *class != incoming);
            let Some(victim) = victim else {
                // Only protected classes left; allow going over the limit.
                break;
            };
            if let Some(items) = self.classes.pop(&victim) {
                debug!("Evicted class {victim} ({} rasters)", items.len());
            }
        }
    }

    /// Exact hit, cheap rescale from the nearest class, or miss
    pub fn lookup(&mut self, key: CacheKey) -> Lookup {
        if let Some(entry) = self.get(key) {
            return if entry.derived {
                Lookup::Rescaled(entry)
            } else {
                Lookup::Exact(entry)
            };
        }

        let Some((source_class, source)) = self.nearest_source(key) else {
            return Lookup::Miss;
        };

        let ratio = key.class.height() as f32 / source_class.height().max(1) as f32;
        let (src_w, src_h) = source.size();
        let width = ((src_w as f32 * ratio).round() as u32).max(1);
        let height = ((src_h as f32 * ratio).round() as u32).max(1);

        match source.raster.resized_fast(width, height) {
            Ok(scaled) => {
                let entry = self.insert(key, Arc::new(scaled), true);
                Lookup::Rescaled(entry)
            }
            Err(e) => {
                warn!(
                    "Fast rescale of item {} from {source_class} to {} failed: {e}",
                    key.item, key.class
                );
                Lookup::Miss
            }
        }
    }

    /// Nearest class holding a rendered raster of the item within the scale limit.
    /// Ties go to the larger source.
    fn nearest_source(&self, key: CacheKey) -> Option<(ResolutionClass, CachedRaster)> {
        let mut best: Option<(ResolutionClass, f32, &CachedRaster)> = None;
        for (class, items) in self.classes.iter() {
            if *class == key.class {
                continue;
            }
            let Some(entry) = items.peek(&key.item) else {
                continue;
            };
            if entry.derived {
                continue;
            }
            let distance = class.scale_distance(key.class);
            if distance > self.fast_zoom_max_scale {
                continue;
            }
            let better = match best {
                None => true,
                Some((best_class, best_distance, _)) => {
                    distance < best_distance || (distance == best_distance && *class > best_class)
                }
            };
            if better {
                best = Some((*class, distance, entry));
            }
        }
        best.map(|(class, _, entry)| (class, entry.clone()))
    }

    /// Remove an item from every class. Returns how many entries were dropped.
    pub fn invalidate_item(&mut self, item: ItemId) -> usize {
        let mut removed = 0;
        for (_, items) in self.classes.iter_mut() {
            if items.pop(&item).is_some() {
                removed += 1;
            }
        }
        removed
    }

    /// Drop everything, including the current-class marker
    pub fn clear(&mut self) {
        self.classes.clear();
        self.current = None;
    }

    /// Total rasters across classes
    #[must_use]
    pub fn len(&self) -> usize {
        self.classes.iter().map(|(_, items)| items.len()).sum()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[must_use]
    pub fn class_len(&self, class: ResolutionClass) -> usize {
        self.classes.peek(&class).map_or(0, LruCache::len)
    }

    /// Cached classes, most recently used first
    #[must_use]
    pub fn classes(&self) -> Vec<ResolutionClass> {
        self.classes.iter().map(|(class, _)| *class).collect()
    }

    #[must_use]
    pub fn class_capacity(&self) -> usize {
        self.class_capacity.get()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raster(h: u32) -> Raster {
        Raster::solid(h * 7 / 10, h, [10, 20, 30, 255])
    }

    fn key(class: u32, item: ItemId) -> CacheKey {
        CacheKey::new(ResolutionClass(class), item)
    }

    #[test]
    fn cache_put_and_get() {
        let mut cache = ThumbnailCache::new(10, 3);
        cache.put(key(150, 1), raster(150));

        assert!(cache.contains(key(150, 1)));
        assert!(cache.get(key(150, 1)).is_some());
        assert!(cache.get(key(300, 1)).is_none());
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn consecutive_reads_return_same_handle() {
        let mut cache = ThumbnailCache::new(10, 3);
        cache.put(key(150, 1), raster(150));
        let a = cache.get(key(150, 1)).unwrap();
        let b = cache.get(key(150, 1)).unwrap();
        assert_eq!(a.id, b.id);
        assert!(Arc::ptr_eq(&a.raster, &b.raster));
    }

    #[test]
    fn overflow_evicts_least_recently_accessed() {
        let mut cache = ThumbnailCache::new(3, 3);
        for id in 0..3 {
            cache.put(key(150, id), raster(150));
        }
        // Refresh 0 so 1 becomes the oldest.
        let _ = cache.get(key(150, 0));
        cache.put(key(150, 3), raster(150));

        assert_eq!(cache.class_len(ResolutionClass(150)), 3);
        assert!(!cache.contains(key(150, 1)));
        assert!(cache.contains(key(150, 0)));
        assert!(cache.contains(key(150, 3)));
    }

    #[test]
    fn classes_evict_independently() {
        let mut cache = ThumbnailCache::new(2, 3);
        cache.put(key(150, 1), raster(150));
        cache.put(key(150, 2), raster(150));
        cache.put(key(300, 1), raster(300));
        cache.put(key(150, 3), raster(150));

        assert!(!cache.contains(key(150, 1)));
        assert!(cache.contains(key(300, 1)));
    }

    #[test]
    fn invalidate_item_clears_every_class() {
        let mut cache = ThumbnailCache::new(10, 4);
        cache.put(key(100, 7), raster(100));
        cache.put(key(150, 7), raster(150));
        cache.put(key(150, 8), raster(150));

        assert_eq!(cache.invalidate_item(7), 2);
        assert!(!cache.contains(key(100, 7)));
        assert!(cache.contains(key(150, 8)));
    }

    #[test]
    fn current_class_survives_class_eviction() {
        let mut cache = ThumbnailCache::new(10, 2);
        cache.set_current_class(ResolutionClass(150));
        cache.put(key(150, 1), raster(150));
        cache.put(key(300, 1), raster(300));
        // Make 150 the least recently used.
        let _ = cache.get(key(300, 1));
        cache.put(key(450, 1), raster(450));

        let classes = cache.classes();
        assert!(classes.contains(&ResolutionClass(150)));
        assert!(classes.contains(&ResolutionClass(450)));
        assert!(!classes.contains(&ResolutionClass(300)));
    }

    #[test]
    fn near_class_is_rescaled_and_flagged() {
        let mut cache = ThumbnailCache::new(10, 4);
        cache.put(key(150, 1), raster(150));

        let Lookup::Rescaled(entry) = cache.lookup(key(180, 1)) else {
            panic!("expected a rescale");
        };
        assert!(entry.derived);
        assert_eq!(entry.size().1, 180);
        assert!(cache.contains(key(180, 1)));
        assert!(!cache.contains_exact(key(180, 1)));

        // Stable on re-read.
        let Lookup::Rescaled(again) = cache.lookup(key(180, 1)) else {
            panic!("expected the stored rescale");
        };
        assert_eq!(again.id, entry.id);
    }

    #[test]
    fn distant_class_is_a_miss() {
        let mut cache = ThumbnailCache::new(10, 4);
        cache.put(key(150, 1), raster(150));
        assert!(matches!(cache.lookup(key(300, 1)), Lookup::Miss));
        assert!(!cache.contains(key(300, 1)));
    }

    #[test]
    fn real_render_replaces_derived_entry() {
        let mut cache = ThumbnailCache::new(10, 4);
        cache.put(key(150, 1), raster(150));
        let derived = cache.lookup(key(120, 1));
        assert!(!derived.is_exact());

        cache.put(key(120, 1), raster(120));
        let exact = cache.lookup(key(120, 1));
        assert!(exact.is_exact());
        assert_ne!(exact.raster().unwrap().id, derived.raster().unwrap().id);
    }

    #[test]
    fn clear_resets_everything() {
        let mut cache = ThumbnailCache::new(10, 4);
        cache.set_current_class(ResolutionClass(150));
        cache.put(key(150, 1), raster(150));
        cache.clear();
        assert!(cache.is_empty());
        assert_eq!(cache.current_class(), None);
    }
}
