//! Render task and completion types

use super::cache::CacheKey;
use super::raster::Raster;

/// Unique identifier for render tasks
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct RequestId(pub u64);

impl RequestId {
    #[must_use]
    pub const fn new(id: u64) -> Self {
        Self(id)
    }
}

/// Why a task was submitted
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Priority {
    /// Needed by the visible range now
    Interactive,
    /// Predictive, adjacent resolution class
    Warmup,
}

/// A unit of work for the pool
#[derive(Clone, Debug)]
pub struct RenderTask {
    pub id: RequestId,
    pub key: CacheKey,
    pub priority: Priority,
    /// Document epoch at submission
    pub epoch: u64,
    /// Zoom/scroll generation at submission
    pub generation: u64,
}

/// Message sent to render workers
#[derive(Debug)]
pub enum WorkerMessage {
    Render(RenderTask),
    Shutdown,
}

/// Errors reported by a [`ThumbnailRenderer`](super::renderer::ThumbnailRenderer)
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum RenderError {
    /// The source is not loaded yet; retry on the next visibility pass
    #[error("not ready")]
    NotReady,

    #[error("{detail}")]
    Failed { detail: String },
}

impl RenderError {
    pub fn failed(msg: impl Into<String>) -> Self {
        Self::Failed { detail: msg.into() }
    }
}

/// Result posted back to the UI thread
#[derive(Debug)]
pub struct RenderCompletion {
    pub task: RenderTask,
    pub result: Result<Raster, RenderError>,
}
