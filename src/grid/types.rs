//! Core types for the thumbnail grid

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use super::raster::Raster;

/// Stable identifier of a grid item, assigned by the host
pub type ItemId = u64;

/// Aspect ratio assumed for pages whose real size is not known yet (A4 portrait)
pub const DEFAULT_ASPECT_RATIO: f32 = 0.707;

/// Discrete raster quality tier, expressed as the target thumbnail height in pixels
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ResolutionClass(pub u32);

impl ResolutionClass {
    #[must_use]
    pub const fn new(height_px: u32) -> Self {
        Self(height_px)
    }

    #[must_use]
    pub const fn height(self) -> u32 {
        self.0
    }

    /// Ratio between two classes, always >= 1.0
    #[must_use]
    pub fn scale_distance(self, other: Self) -> f32 {
        let a = self.0.max(1) as f32;
        let b = other.0.max(1) as f32;
        if a > b { a / b } else { b / a }
    }
}

impl std::fmt::Display for ResolutionClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}px", self.0)
    }
}

/// Lifecycle of a staged document box
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum BoxState {
    Queued,
    Loading,
    Loaded,
    Failed,
    Marked,
}

/// Staged document placeholder shown instead of individual pages
#[derive(Clone, Debug)]
pub struct BoxInfo {
    /// Display name
    pub name: String,
    pub state: BoxState,
    /// Download/load progress in `0.0..=1.0`, meaningful while loading
    pub progress: f32,
    /// Number of pages once loaded
    pub page_count: usize,
    /// Preview of the first page, if available
    pub thumbnail: Option<BoxThumbnail>,
}

static NEXT_THUMBNAIL_ID: AtomicU64 = AtomicU64::new(1);

/// A box preview raster with an identity that is unique for the process.
/// Clones share the id; every `new` gets a fresh one.
#[derive(Clone, Debug)]
pub struct BoxThumbnail {
    id: u64,
    raster: Arc<Raster>,
}

impl BoxThumbnail {
    #[must_use]
    pub fn new(raster: impl Into<Arc<Raster>>) -> Self {
        Self {
            id: NEXT_THUMBNAIL_ID.fetch_add(1, Ordering::Relaxed),
            raster: raster.into(),
        }
    }

    #[must_use]
    pub fn id(&self) -> u64 {
        self.id
    }

    #[must_use]
    pub fn raster(&self) -> &Arc<Raster> {
        &self.raster
    }
}

impl BoxInfo {
    #[must_use]
    pub fn new(name: impl Into<String>, state: BoxState) -> Self {
        Self {
            name: name.into(),
            state,
            progress: 0.0,
            page_count: 0,
            thumbnail: None,
        }
    }

    #[must_use]
    pub fn with_thumbnail(mut self, raster: impl Into<Arc<Raster>>) -> Self {
        self.thumbnail = Some(BoxThumbnail::new(raster));
        self
    }

    /// Progress rounded to whole percent, only while loading
    #[must_use]
    pub fn progress_percent(&self) -> u8 {
        if self.state == BoxState::Loading {
            (self.progress.clamp(0.0, 1.0) * 100.0) as u8
        } else {
            0
        }
    }
}

/// What a grid cell shows
#[derive(Clone, Debug)]
pub enum ItemKind {
    Page,
    Box(BoxInfo),
}

/// A renderable grid unit. Its index in the item list is also its position.
#[derive(Clone, Debug)]
pub struct Item {
    pub id: ItemId,
    pub kind: ItemKind,
    /// Width / height
    pub aspect_ratio: f32,
}

impl Item {
    #[must_use]
    pub fn page(id: ItemId, aspect_ratio: f32) -> Self {
        Self {
            id,
            kind: ItemKind::Page,
            aspect_ratio,
        }
    }

    #[must_use]
    pub fn document_box(id: ItemId, info: BoxInfo, box_size: (u32, u32)) -> Self {
        let aspect_ratio = box_size.0 as f32 / box_size.1.max(1) as f32;
        Self {
            id,
            kind: ItemKind::Box(info),
            aspect_ratio,
        }
    }

    #[must_use]
    pub fn is_page(&self) -> bool {
        matches!(self.kind, ItemKind::Page)
    }

    /// Target cell size for the given class. Boxes ignore zoom.
    #[must_use]
    pub fn target_size(&self, class: ResolutionClass, box_size: (u32, u32)) -> (i32, i32) {
        match self.kind {
            ItemKind::Page => {
                let aspect = if self.aspect_ratio.is_finite() && self.aspect_ratio > 0.0 {
                    self.aspect_ratio
                } else {
                    DEFAULT_ASPECT_RATIO
                };
                let h = class.height() as i32;
                let w = (h as f32 * aspect).round() as i32;
                (w, h)
            }
            ItemKind::Box(_) => (box_size.0 as i32, box_size.1 as i32),
        }
    }
}

/// A named, contiguous range of items
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Section {
    pub title: String,
    pub start_index: usize,
    pub count: usize,
}

impl Section {
    #[must_use]
    pub fn new(title: impl Into<String>, start_index: usize, count: usize) -> Self {
        Self {
            title: title.into(),
            start_index,
            count,
        }
    }

    /// One past the last index
    #[must_use]
    pub fn end_index(&self) -> usize {
        self.start_index + self.count
    }

    #[must_use]
    pub fn contains(&self, index: usize) -> bool {
        index >= self.start_index && index < self.end_index()
    }
}

/// Checks the contiguity invariant of a section list
#[must_use]
pub fn sections_are_contiguous(sections: &[Section]) -> bool {
    sections
        .windows(2)
        .all(|pair| pair[1].start_index == pair[0].end_index())
}

/// Placed rectangle of one item in content coordinates
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct LayoutPosition {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl LayoutPosition {
    #[must_use]
    pub const fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    #[must_use]
    pub fn right(&self) -> i32 {
        self.x + self.width
    }

    #[must_use]
    pub fn bottom(&self) -> i32 {
        self.y + self.height
    }

    #[must_use]
    pub fn center_x(&self) -> f32 {
        self.x as f32 + self.width as f32 / 2.0
    }

    /// Inclusive hit test
    #[must_use]
    pub fn contains(&self, x: i32, y: i32) -> bool {
        self.x <= x && x <= self.right() && self.y <= y && y <= self.bottom()
    }

    /// Hit test with a tolerance band around the rectangle
    #[must_use]
    pub fn contains_with_margin(&self, x: i32, y: i32, margin: i32) -> bool {
        self.x - margin <= x
            && x <= self.right() + margin
            && self.y - margin <= y
            && y <= self.bottom() + margin
    }
}

/// Which edge of an item the pointer is hugging
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum BracketSide {
    Left,
    Right,
}

/// Where a drag would land
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum DropTarget {
    /// Insert before this item
    Before(usize),
    /// Insert after this item, the last on its row
    EndOfRow(usize),
    /// Insert after `last`, the final item of `section`
    EndOfSection { section: usize, last: usize },
    EndOfList,
}

impl DropTarget {
    /// Insertion index in a list of `count` items
    #[must_use]
    pub fn insertion_index(&self, count: usize) -> usize {
        match *self {
            Self::Before(index) => index.min(count),
            Self::EndOfRow(last) | Self::EndOfSection { last, .. } => (last + 1).min(count),
            Self::EndOfList => count,
        }
    }
}

/// Scrollable window onto the content
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Viewport {
    /// Content offset of the top edge
    pub scroll_y: i32,
    pub width: i32,
    pub height: i32,
}

impl Viewport {
    #[must_use]
    pub const fn new(width: i32, height: i32) -> Self {
        Self {
            scroll_y: 0,
            width,
            height,
        }
    }
}
