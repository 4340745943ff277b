//! Seams between the scheduler, the renderer and the consumer of results.

use tileview_render::{RenderError, RenderedTile, TileRenderer, TileRequest};

/// Runs a single render task.
///
/// Called from the worker thread only, one task at a time.
pub trait TileExecutor: Send + Sync {
    /// `Ok(None)` means the task was skipped without error.
    fn execute(&self, request: &TileRequest) -> Result<Option<RenderedTile>, RenderError>;
}

impl TileExecutor for TileRenderer {
    fn execute(&self, request: &TileRequest) -> Result<Option<RenderedTile>, RenderError> {
        self.render(request)
    }
}

/// Receives the outcome of completed tasks while the scheduler is running.
pub trait RenderSink: Send + Sync {
    /// A tile finished rendering. The sink owns it from here on.
    fn tile_ready(&self, tile: RenderedTile);

    /// A page failed to open or render.
    fn page_error(&self, page: u32, error: RenderError);
}
