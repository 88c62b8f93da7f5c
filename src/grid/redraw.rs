//! Incremental redraw over a retained surface
//!
//! Every drawn index owns one base primitive (image, placeholder or box body)
//! and any number of overlays. Bases are kept and moved while their content
//! token is unchanged; overlays and ephemeral markers are rebuilt each cycle.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use log::debug;

use super::cache::{CacheKey, Lookup, RasterId, ThumbnailCache};
use super::draw::{
    self, BoxPainter, HeaderHitZone, ItemPainter, OverlayState, PageContent, PagePainter, Palette,
};
use super::layout::GridLayout;
use super::scheduler::RenderScheduler;
use super::surface::{DrawableSurface, Primitive, SurfaceHandle};
use super::types::{
    BoxState, BoxThumbnail, BracketSide, DropTarget, Item, ItemId, ItemKind, ResolutionClass, Section, Viewport,
};

/// Items kept drawn beyond each edge of the visible range
pub const DEFAULT_VISIBLE_BUFFER: usize = 2;

/// Identity of what a base primitive shows. Position is not part of it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ContentToken {
    Page {
        item: ItemId,
        size: (i32, i32),
        content: PageToken,
    },
    Box {
        item: ItemId,
        size: (i32, i32),
        state: BoxState,
        progress: u8,
        /// [`BoxThumbnail::id`]
        thumbnail: Option<u64>,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PageToken {
    Raster(RasterId),
    Placeholder { failed: bool },
}

impl From<&PageContent> for PageToken {
    fn from(content: &PageContent) -> Self {
        match content {
            PageContent::Raster(entry) => Self::Raster(entry.id),
            PageContent::Placeholder { failed } => Self::Placeholder { failed: *failed },
        }
    }
}

/// Surface objects owned by one drawn index
#[derive(Clone, Debug)]
pub struct DrawnItemRecord {
    pub base_handle: Option<SurfaceHandle>,
    pub overlay_handles: Vec<SurfaceHandle>,
    pub content_token: ContentToken,
    origin: (i32, i32),
}

/// Resolves page rasters for the redraw, requesting renders on demand
pub trait RasterSource {
    fn page_content(&mut self, key: CacheKey) -> PageContent;
}

/// Cache first, scheduler on a miss or a rescaled hit
pub struct CacheSource<'a> {
    pub cache: &'a mut ThumbnailCache,
    pub scheduler: &'a mut RenderScheduler,
}

impl RasterSource for CacheSource<'_> {
    fn page_content(&mut self, key: CacheKey) -> PageContent {
        match self.cache.lookup(key) {
            Lookup::Exact(entry) => PageContent::Raster(entry),
            Lookup::Rescaled(entry) => {
                self.scheduler.request(self.cache, key);
                PageContent::Raster(entry)
            }
            Lookup::Miss => {
                let failed = self.scheduler.has_failed(key);
                self.scheduler.request(self.cache, key);
                PageContent::Placeholder { failed }
            }
        }
    }
}

/// Per-frame selection and pointer decorations
#[derive(Clone, Copy, Debug)]
pub struct Decorations<'a> {
    pub selected: &'a BTreeSet<usize>,
    pub marked: &'a BTreeSet<usize>,
    pub hovered: Option<usize>,
    pub bracket: Option<(usize, BracketSide)>,
    pub cut_gap: Option<usize>,
    pub drop_target: Option<DropTarget>,
}

impl Decorations<'_> {
    fn overlay_state(&self, index: usize) -> OverlayState {
        OverlayState {
            selected: self.selected.contains(&index),
            hovered: self.hovered == Some(index),
            marked: self.marked.contains(&index),
            bracket: self
                .bracket
                .filter(|(i, _)| *i == index && self.cut_gap.is_none())
                .map(|(_, side)| side),
        }
    }
}

/// Everything one redraw reads
pub struct Frame<'a> {
    pub items: &'a [Item],
    pub layout: &'a GridLayout,
    pub viewport: Viewport,
    pub class: ResolutionClass,
    pub sections: &'a [Section],
    /// Section headers are drawn in continuous page mode only
    pub show_headers: bool,
    pub decorations: Decorations<'a>,
    pub fan: Option<Primitive>,
}

/// Surface work performed by one redraw
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RedrawStats {
    pub base_created: usize,
    pub base_moved: usize,
    pub base_kept: usize,
    pub base_deleted: usize,
    pub overlays_created: usize,
    pub overlays_deleted: usize,
    pub ephemeral_created: usize,
}

impl RedrawStats {
    /// Objects created or destroyed, the expensive part
    #[must_use]
    pub fn base_churn(&self) -> usize {
        self.base_created + self.base_deleted
    }
}

pub struct RedrawController {
    records: BTreeMap<usize, DrawnItemRecord>,
    ephemeral: Vec<SurfaceHandle>,
    static_items: Vec<SurfaceHandle>,
    /// Viewport size the static items were laid out for
    static_size: Option<(i32, i32)>,
    header_zones: Vec<HeaderHitZone>,
    buffer: usize,
    palette: Palette,
    visible: (usize, usize),
    drawn: (usize, usize),
}

impl Default for RedrawController {
    fn default() -> Self {
        Self::new(DEFAULT_VISIBLE_BUFFER)
    }
}

impl RedrawController {
    #[must_use]
    pub fn new(buffer: usize) -> Self {
        Self {
            records: BTreeMap::new(),
            ephemeral: Vec::new(),
            static_items: Vec::new(),
            static_size: None,
            header_zones: Vec::new(),
            buffer,
            palette: Palette::default(),
            visible: (0, 0),
            drawn: (0, 0),
        }
    }

    #[must_use]
    pub fn with_palette(mut self, palette: Palette) -> Self {
        self.palette = palette;
        self
    }

    #[must_use]
    pub fn palette(&self) -> &Palette {
        &self.palette
    }

    #[must_use]
    pub fn record(&self, index: usize) -> Option<&DrawnItemRecord> {
        self.records.get(&index)
    }

    pub fn records(&self) -> impl Iterator<Item = (usize, &DrawnItemRecord)> {
        self.records.iter().map(|(i, r)| (*i, r))
    }

    /// Visible range of the last redraw, half-open
    #[must_use]
    pub fn visible_range(&self) -> (usize, usize) {
        self.visible
    }

    /// Visible range plus buffer of the last redraw
    #[must_use]
    pub fn drawn_range(&self) -> (usize, usize) {
        self.drawn
    }

    #[must_use]
    pub fn is_drawn(&self, index: usize) -> bool {
        index >= self.drawn.0 && index < self.drawn.1
    }

    #[must_use]
    pub fn header_zones(&self) -> &[HeaderHitZone] {
        &self.header_zones
    }

    /// Section whose drawn header contains the point
    #[must_use]
    pub fn header_at(&self, x: i32, y: i32) -> Option<usize> {
        self.header_zones
            .iter()
            .find(|zone| zone.rect.contains(x, y))
            .map(|zone| zone.section)
    }

    /// Drop every surface object this controller owns
    pub fn clear_all(&mut self, surface: &mut dyn DrawableSurface) {
        let indices: Vec<usize> = self.records.keys().copied().collect();
        for index in indices {
            self.delete_record(surface, index, &mut RedrawStats::default());
        }
        for handle in self.ephemeral.drain(..).chain(self.static_items.drain(..)) {
            surface.delete(handle);
        }
        self.static_size = None;
        self.header_zones.clear();
        self.visible = (0, 0);
        self.drawn = (0, 0);
    }

    fn delete_record(&mut self, surface: &mut dyn DrawableSurface, index: usize, stats: &mut RedrawStats) {
        if let Some(record) = self.records.remove(&index) {
            if let Some(base) = record.base_handle {
                surface.delete(base);
                stats.base_deleted += 1;
            }
            for handle in record.overlay_handles {
                surface.delete(handle);
                stats.overlays_deleted += 1;
            }
        }
    }

    /// One redraw cycle
    pub fn redraw(
        &mut self,
        surface: &mut dyn DrawableSurface,
        source: &mut dyn RasterSource,
        frame: &Frame<'_>,
    ) -> RedrawStats {
        let mut stats = RedrawStats::default();

        for handle in self.ephemeral.drain(..) {
            surface.delete(handle);
        }
        self.header_zones.clear();

        if frame.items.is_empty() {
            let indices: Vec<usize> = self.records.keys().copied().collect();
            for index in indices {
                self.delete_record(surface, index, &mut stats);
            }
            let size = (frame.viewport.width, frame.viewport.height);
            if self.static_size != Some(size) {
                for handle in self.static_items.drain(..) {
                    surface.delete(handle);
                }
                if let Some(hint) = draw::empty_state(frame.viewport, &self.palette) {
                    self.static_items.push(surface.create(hint));
                }
                self.static_size = Some(size);
            }
            self.visible = (0, 0);
            self.drawn = (0, 0);
            return stats;
        }

        for handle in self.static_items.drain(..) {
            surface.delete(handle);
        }
        self.static_size = None;

        let count = frame.items.len().min(frame.layout.len());
        let (start, end) = frame
            .layout
            .visible_range(frame.viewport.scroll_y, frame.viewport.height);
        let draw_start = start.saturating_sub(self.buffer);
        let draw_end = (end + self.buffer).min(count);
        self.visible = (start, end);
        self.drawn = (draw_start, draw_end);

        let leaving: Vec<usize> = self
            .records
            .keys()
            .copied()
            .filter(|i| *i < draw_start || *i >= draw_end)
            .collect();
        for index in leaving {
            self.delete_record(surface, index, &mut stats);
        }

        for record in self.records.values_mut() {
            for handle in record.overlay_handles.drain(..) {
                surface.delete(handle);
                stats.overlays_deleted += 1;
            }
        }

        for index in draw_start..draw_end {
            self.draw_item(surface, source, frame, index, &mut stats);
        }

        self.draw_ephemeral(surface, frame, &mut stats);

        if stats.base_churn() > 0 {
            debug!("Redraw {stats:?} over {draw_start}..{draw_end}");
        }
        stats
    }

    fn draw_item(
        &mut self,
        surface: &mut dyn DrawableSurface,
        source: &mut dyn RasterSource,
        frame: &Frame<'_>,
        index: usize,
        stats: &mut RedrawStats,
    ) {
        let (Some(item), Some(pos)) = (frame.items.get(index), frame.layout.position(index)) else {
            return;
        };
        let size = (pos.width, pos.height);
        let origin = (pos.x, pos.y);

        let page_content = match item.kind {
            ItemKind::Page => Some(source.page_content(CacheKey::new(frame.class, item.id))),
            ItemKind::Box(_) => None,
        };
        let token = match (&item.kind, &page_content) {
            (ItemKind::Box(info), _) => ContentToken::Box {
                item: item.id,
                size,
                state: info.state,
                progress: info.progress_percent(),
                thumbnail: info.thumbnail.as_ref().map(BoxThumbnail::id),
            },
            (ItemKind::Page, Some(content)) => ContentToken::Page {
                item: item.id,
                size,
                content: PageToken::from(content),
            },
            (ItemKind::Page, None) => return,
        };

        let painter: Box<dyn ItemPainter + '_> = match (&item.kind, &page_content) {
            (ItemKind::Box(info), _) => Box::new(BoxPainter { info }),
            (ItemKind::Page, Some(content)) => Box::new(PagePainter { content }),
            (ItemKind::Page, None) => return,
        };

        let reusable = self.records.get(&index).and_then(|record| {
            let base = record.base_handle?;
            // A vanished handle is treated like a changed token.
            (record.content_token == token && surface.contains(base)).then_some((base, record.origin))
        });

        let base = match reusable {
            Some((base, previous)) => {
                if previous == origin {
                    stats.base_kept += 1;
                } else {
                    surface.move_to(base, origin);
                    stats.base_moved += 1;
                }
                base
            }
            None => {
                if let Some(old) = self.records.get(&index).and_then(|r| r.base_handle) {
                    if surface.delete(old) {
                        stats.base_deleted += 1;
                    }
                }
                stats.base_created += 1;
                surface.create(painter.base(pos, &self.palette))
            }
        };

        let overlays: Vec<SurfaceHandle> = painter
            .overlays(pos, frame.decorations.overlay_state(index), &self.palette)
            .into_iter()
            .map(|primitive| surface.create(primitive))
            .collect();
        stats.overlays_created += overlays.len();

        self.records.insert(
            index,
            DrawnItemRecord {
                base_handle: Some(base),
                overlay_handles: overlays,
                content_token: token,
                origin,
            },
        );
    }

    fn draw_ephemeral(&mut self, surface: &mut dyn DrawableSurface, frame: &Frame<'_>, stats: &mut RedrawStats) {
        let mut fresh = Vec::new();

        if let Some(gap) = frame.decorations.cut_gap {
            fresh.extend(draw::cut_marker(frame.layout, gap, &self.palette));
        }
        if let Some(target) = frame.decorations.drop_target {
            fresh.extend(draw::drop_marker(frame.layout, target, &self.palette));
        }

        if frame.show_headers {
            let top = frame.viewport.scroll_y;
            let bottom = top + frame.viewport.height;
            for (index, anchor) in &frame.layout.section_headers {
                let Some(section) = frame.sections.get(*index) else {
                    continue;
                };
                if anchor.y > bottom || anchor.y + 30 < top {
                    continue;
                }
                if let Some((primitive, zone)) = draw::section_header(*index, section, *anchor, &self.palette) {
                    fresh.push(primitive);
                    self.header_zones.push(zone);
                }
            }
        }

        if let Some(fan) = &frame.fan {
            fresh.push(fan.clone());
        }

        stats.ephemeral_created += fresh.len();
        self.ephemeral
            .extend(fresh.into_iter().map(|primitive| surface.create(primitive)));
    }
}
