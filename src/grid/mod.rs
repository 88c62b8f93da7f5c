//! Thumbnail grid engine

mod cache;
mod controller;
mod draw;
mod fan;
mod layout;
mod raster;
mod redraw;
mod renderer;
mod request;
mod scene;
mod scheduler;
mod selection;
mod state;
mod surface;
mod types;
mod view;
mod worker;
mod zoom;

pub use cache::{
    CacheKey, CachedRaster, DEFAULT_CLASS_CAPACITY, DEFAULT_FAST_ZOOM_MAX_SCALE,
    DEFAULT_MAX_CLASSES, Lookup, RasterId, ThumbnailCache,
};
pub use controller::{
    ControllerConfig, DEFAULT_BRACKET_EDGE, DEFAULT_DRAG_THRESHOLD, DEFAULT_HOVER_TOLERANCE,
    Direction, GesturePhase, GridController, GridHost, HitContext, Modifiers, PointerEvent,
    resolve_drop,
};
pub use draw::{HeaderHitZone, ItemPainter, OverlayState, PageContent, Palette};
pub use fan::{FAN_THUMB_SIZE, FanPreview, MAX_FAN_THUMBS, compose_fan, sample_for_fan};
pub use layout::{DEFAULT_GAP, GridLayout, HeaderAnchor, LayoutInput};
pub use raster::{Raster, RasterError};
pub use redraw::{
    CacheSource, ContentToken, DEFAULT_VISIBLE_BUFFER, Decorations, DrawnItemRecord, Frame,
    PageToken, RasterSource, RedrawController, RedrawStats,
};
pub use renderer::ThumbnailRenderer;
pub use request::{Priority, RenderError};
pub use scene::{RetainedScene, SceneCounters};
pub use scheduler::{
    CompletionEvent, DEFAULT_WARMUP_BUFFER, DEFAULT_WARMUP_DELAY, DEFAULT_WARMUP_THROTTLE,
    DEFAULT_WORKERS, RenderScheduler, SchedulerConfig, SchedulerStats,
};
pub use selection::{ItemSelection, apply_order, block_move_order};
pub use state::{Command, Effect, ViewState};
pub use surface::{Color, DrawableSurface, Layer, Primitive, Shape, SurfaceHandle};
pub use types::*;
pub use view::{DEFAULT_BOX_SIZE, GridOptions, ThumbnailGrid, TickReport};
pub use zoom::{DEFAULT_THUMBNAIL_SIZE, DEFAULT_ZOOM_LEVELS, ZoomLadder};
