pub mod grid;
pub mod panic_handler;
pub mod settings;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use grid::{
    GridHost, GridOptions, Item, ItemId, ResolutionClass, Section, ThumbnailCache, ThumbnailGrid,
    ThumbnailRenderer,
};
pub use settings::{ConfigError, GridConfig};
