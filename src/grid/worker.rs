//! Render worker - runs in separate thread(s)

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use flume::{Receiver, Sender};
use log::{debug, warn};

use super::cache::CacheKey;
use super::raster::Raster;
use super::renderer::ThumbnailRenderer;
use super::request::{RenderCompletion, RenderError, WorkerMessage};

/// Main worker function - pulls tasks from the shared queue until shutdown
#[expect(
    clippy::needless_pass_by_value,
    reason = "Values moved into thread, need ownership"
)]
pub fn render_worker(
    index: usize,
    renderer: Arc<dyn ThumbnailRenderer>,
    tasks: Receiver<WorkerMessage>,
    completions: Sender<RenderCompletion>,
) {
    debug!("Render worker {index} started");

    for message in tasks {
        match message {
            WorkerMessage::Render(task) => {
                let result = render_guarded(renderer.as_ref(), task.key);
                if completions.send(RenderCompletion { task, result }).is_err() {
                    // Scheduler is gone.
                    break;
                }
            }
            WorkerMessage::Shutdown => break,
        }
    }

    debug!("Render worker {index} stopped");
}

/// Calls the renderer, turning a panic into a failed result
fn render_guarded(renderer: &dyn ThumbnailRenderer, key: CacheKey) -> Result<Raster, RenderError> {
    match panic::catch_unwind(AssertUnwindSafe(|| renderer.render(key.item, key.class))) {
        Ok(result) => result,
        Err(payload) => {
            let detail = panic_message(payload.as_ref());
            warn!(
                "Renderer panicked on item {} at {}: {detail}",
                key.item, key.class
            );
            Err(RenderError::failed(format!("renderer panicked: {detail}")))
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
