use std::sync::Arc;
use tileview_render::{RenderError, RenderedTile};

/// Callbacks into the widget that draws the document.
///
/// Called from the render worker thread; implementations should only record
/// state and schedule a redraw on their own thread.
pub trait Presentation: Send + Sync {
    /// A tile was rendered and stored in the cache.
    fn on_tile_ready(&self, tile: &Arc<RenderedTile>);

    /// A page failed to open or render. Reported once per page until the
    /// page errors are reset.
    fn on_page_error(&self, page: u32, error: &RenderError);

    fn request_redraw(&self);
}
