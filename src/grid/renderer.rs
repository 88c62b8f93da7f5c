//! The rasterizing backend seen by the grid

use super::raster::Raster;
use super::request::RenderError;
use super::types::{ItemId, ResolutionClass};

/// Produces page thumbnails. Called from worker threads.
pub trait ThumbnailRenderer: Send + Sync {
    /// Render `item` so that its height matches `class`
    fn render(&self, item: ItemId, class: ResolutionClass) -> Result<Raster, RenderError>;

    /// Natural (width, height) of the item in any unit, used to seed aspect ratios
    fn intrinsic_size(&self, _item: ItemId) -> Option<(f32, f32)> {
        None
    }
}

impl<T: ThumbnailRenderer + ?Sized> ThumbnailRenderer for std::sync::Arc<T> {
    fn render(&self, item: ItemId, class: ResolutionClass) -> Result<Raster, RenderError> {
        (**self).render(item, class)
    }

    fn intrinsic_size(&self, item: ItemId) -> Option<(f32, f32)> {
        (**self).intrinsic_size(item)
    }
}
