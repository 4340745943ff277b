//! Execution of a single tile render task against the document engine.

use crate::buffer::BufferPool;
use crate::error::RenderError;
use crate::night::apply_night_mode;
use crate::tile::{device_rect, RenderedTile, TileRequest};
use parking_lot::Mutex;
use pdf_engine::{DocumentEngine, EngineHandle};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

/// Renders tiles one at a time under the engine lock.
///
/// The renderer remembers, per document page, whether opening it succeeded.
/// A page that failed once is reported once and then skipped silently until
/// [`TileRenderer::reset_page_errors`] is called.
pub struct TileRenderer {
    engine: EngineHandle,
    pool: BufferPool,
    /// Display index -> document page; identity when empty.
    page_order: Vec<Option<u32>>,
    page_states: Mutex<HashMap<u32, bool>>,
    night_mode: AtomicBool,
}

impl TileRenderer {
    pub fn new(engine: EngineHandle, pool: BufferPool) -> Self {
        Self {
            engine,
            pool,
            page_order: Vec::new(),
            page_states: Mutex::new(HashMap::new()),
            night_mode: AtomicBool::new(false),
        }
    }

    /// Routes displayed page indices through a user page order.
    /// `None` entries never render.
    pub fn with_page_order(mut self, page_order: Vec<Option<u32>>) -> Self {
        self.page_order = page_order;
        self
    }

    pub fn with_night_mode(self, enabled: bool) -> Self {
        self.set_night_mode(enabled);
        self
    }

    pub fn set_night_mode(&self, enabled: bool) {
        self.night_mode.store(enabled, Ordering::Release);
    }

    pub fn night_mode(&self) -> bool {
        self.night_mode.load(Ordering::Acquire)
    }

    pub fn pool(&self) -> &BufferPool {
        &self.pool
    }

    /// Document page shown at display index `page`.
    pub fn document_page(&self, page: u32) -> Option<u32> {
        if self.page_order.is_empty() {
            Some(page)
        } else {
            self.page_order.get(page as usize).copied().flatten()
        }
    }

    /// True once opening or rendering the page has failed.
    pub fn page_has_error(&self, document_page: u32) -> bool {
        matches!(self.page_states.lock().get(&document_page), Some(false))
    }

    /// Forgets every recorded page state so failed pages are retried.
    pub fn reset_page_errors(&self) {
        self.page_states.lock().clear();
    }

    /// Runs one render task.
    ///
    /// Returns `Ok(None)` for tasks that are skipped without being an error:
    /// degenerate sizes, pages already known to be broken, unmapped display
    /// indices and failed buffer allocations.
    ///
    /// # Errors
    /// [`RenderError::PageRender`] the first time a page fails to open or
    /// render.
    pub fn render(&self, request: &TileRequest) -> Result<Option<RenderedTile>, RenderError> {
        let Some(document_page) = self.document_page(request.page) else {
            tracing::debug!(page = request.page, "no document page for display index");
            return Ok(None);
        };
        if request.is_degenerate() {
            return Ok(None);
        }
        let format = request.quality.pixel_format();
        let (width, height) = request.pixel_size();
        let (Some(width), Some(height)) = (pixel_extent(width), pixel_extent(height)) else {
            let err = RenderError::Allocation {
                width: u32::try_from(width).unwrap_or(u32::MAX),
                height: u32::try_from(height).unwrap_or(u32::MAX),
                format,
            };
            tracing::error!(page = request.page, %err, "tile size out of range");
            return Ok(None);
        };
        let night_mode = self.night_mode();

        let mut engine = self.engine.lock();
        self.open_page(&mut *engine, request.page, document_page)?;
        if self.page_has_error(document_page) {
            return Ok(None);
        }

        let mut buffer = match self.pool.acquire(width, height, format) {
            Ok(buffer) => buffer,
            Err(err) => {
                tracing::error!(page = request.page, %err, "tile buffer allocation failed");
                return Ok(None);
            }
        };

        let device = device_rect(width, height, request.bounds);
        if let Err(source) =
            engine.render_into(&mut buffer.target(), document_page, device, request.quality.annotations)
        {
            self.page_states.lock().insert(document_page, false);
            tracing::warn!(page = request.page, document_page, %source, "page failed to render");
            return Err(RenderError::PageRender { page: request.page, source });
        }
        drop(engine);

        if night_mode {
            buffer = match apply_night_mode(&buffer, &self.pool) {
                Ok(night) => night,
                Err(err) => {
                    tracing::error!(page = request.page, %err, "night mode buffer allocation failed");
                    return Ok(None);
                }
            };
        }

        Ok(Some(RenderedTile::new(*request, buffer).with_night_mode(night_mode)))
    }

    fn open_page(
        &self,
        engine: &mut dyn DocumentEngine,
        page: u32,
        document_page: u32,
    ) -> Result<(), RenderError> {
        let mut states = self.page_states.lock();
        if states.contains_key(&document_page) {
            return Ok(());
        }
        match engine.open_page(document_page) {
            Ok(()) => {
                states.insert(document_page, true);
                Ok(())
            }
            Err(source) => {
                states.insert(document_page, false);
                tracing::warn!(page, document_page, %source, "page failed to open");
                Err(RenderError::PageRender { page, source })
            }
        }
    }
}

/// Pixel extent that fits both the buffer and device coordinates.
fn pixel_extent(value: i64) -> Option<u32> {
    i32::try_from(value).ok().and_then(|value| u32::try_from(value).ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tile::{RelativeBounds, RenderQuality};
    use pdf_engine::{DeviceRect, EngineError, PageSize, PixelFormat, RenderTarget};
    use std::sync::atomic::AtomicUsize;
    use std::sync::Arc;

    #[derive(Default)]
    struct FakeEngine {
        opens: Arc<AtomicUsize>,
        renders: Arc<AtomicUsize>,
        broken_page: Option<u32>,
        failing_render: Option<u32>,
        last_device: Arc<Mutex<Option<DeviceRect>>>,
    }

    impl DocumentEngine for FakeEngine {
        fn page_count(&self) -> u32 {
            4
        }

        fn native_size(&self, _page: u32) -> Result<PageSize, EngineError> {
            Ok(PageSize::new(100, 100))
        }

        fn open_page(&mut self, page: u32) -> Result<(), EngineError> {
            self.opens.fetch_add(1, Ordering::SeqCst);
            if self.broken_page == Some(page) {
                return Err(EngineError::PageOpen { page, reason: "corrupt".to_owned() });
            }
            Ok(())
        }

        fn render_into(
            &mut self,
            target: &mut RenderTarget<'_>,
            page: u32,
            device: DeviceRect,
            _annotations: bool,
        ) -> Result<(), EngineError> {
            self.renders.fetch_add(1, Ordering::SeqCst);
            if self.failing_render == Some(page) {
                return Err(EngineError::Backend("paint failed".to_owned()));
            }
            *self.last_device.lock() = Some(device);
            target.pixels.fill(255);
            Ok(())
        }
    }

    fn request(page: u32) -> TileRequest {
        TileRequest::part(page, RelativeBounds::new(0.0, 0.0, 0.5, 0.5), 1, 8.0, 8.0, RenderQuality::default())
    }

    #[test]
    fn test_render_produces_tile() {
        let engine = FakeEngine::default();
        let last_device = engine.last_device.clone();
        let renderer = TileRenderer::new(EngineHandle::new(engine), BufferPool::new());

        let tile = renderer.render(&request(0)).unwrap().expect("tile should render");

        assert_eq!(tile.pixel_size(), Some((8, 8)));
        assert_eq!(*last_device.lock(), Some(DeviceRect { left: 0, top: 0, width: 16, height: 16 }));
        assert_eq!(tile.with_pixels(|b| b.format()), Some(PixelFormat::Rgb8));
        assert!(!tile.night_mode());
    }

    #[test]
    fn test_open_page_is_called_once_per_page() {
        let engine = FakeEngine::default();
        let opens = engine.opens.clone();
        let renderer = TileRenderer::new(EngineHandle::new(engine), BufferPool::new());

        renderer.render(&request(1)).unwrap();
        renderer.render(&request(1)).unwrap();
        renderer.render(&request(2)).unwrap();

        assert_eq!(opens.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_broken_page_reported_once() {
        let engine = FakeEngine { broken_page: Some(2), ..Default::default() };
        let renders = engine.renders.clone();
        let renderer = TileRenderer::new(EngineHandle::new(engine), BufferPool::new());

        let err = renderer.render(&request(2)).unwrap_err();
        assert!(matches!(err, RenderError::PageRender { page: 2, .. }));
        assert!(renderer.page_has_error(2));

        assert!(renderer.render(&request(2)).unwrap().is_none());
        assert_eq!(renders.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_reset_page_errors_retries() {
        let engine = FakeEngine { broken_page: Some(0), ..Default::default() };
        let opens = engine.opens.clone();
        let renderer = TileRenderer::new(EngineHandle::new(engine), BufferPool::new());

        assert!(renderer.render(&request(0)).is_err());
        renderer.reset_page_errors();
        assert!(!renderer.page_has_error(0));
        assert!(renderer.render(&request(0)).is_err());
        assert_eq!(opens.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_render_failure_marks_page() {
        let engine = FakeEngine { failing_render: Some(3), ..Default::default() };
        let renderer = TileRenderer::new(EngineHandle::new(engine), BufferPool::new());

        assert!(matches!(renderer.render(&request(3)), Err(RenderError::PageRender { page: 3, .. })));
        assert!(renderer.render(&request(3)).unwrap().is_none());
    }

    #[test]
    fn test_degenerate_request_skipped() {
        let engine = FakeEngine::default();
        let opens = engine.opens.clone();
        let renderer = TileRenderer::new(EngineHandle::new(engine), BufferPool::new());
        let degenerate = TileRequest::part(0, RelativeBounds::FULL, 1, 0.0, 8.0, RenderQuality::default());

        assert!(renderer.render(&degenerate).unwrap().is_none());
        assert_eq!(opens.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_oversized_request_skipped() {
        let engine = FakeEngine::default();
        let opens = engine.opens.clone();
        let pool = BufferPool::new();
        let renderer = TileRenderer::new(EngineHandle::new(engine), pool.clone());
        let huge = TileRequest::part(0, RelativeBounds::FULL, 1, 1.0e12, 8.0, RenderQuality::default());

        assert!(renderer.render(&huge).unwrap().is_none());
        assert!(!renderer.page_has_error(0));
        assert_eq!(opens.load(Ordering::SeqCst), 0);
        assert_eq!(pool.stats().allocations, 0);
        assert!(renderer.render(&request(0)).unwrap().is_some());
    }

    #[test]
    fn test_page_order_maps_display_index() {
        let engine = FakeEngine { broken_page: Some(3), ..Default::default() };
        let renderer =
            TileRenderer::new(EngineHandle::new(engine), BufferPool::new()).with_page_order(vec![Some(3), Some(0), None]);

        // Display page 0 shows the broken document page 3.
        let err = renderer.render(&request(0)).unwrap_err();
        assert_eq!(err.page(), Some(0));
        assert!(renderer.render(&request(1)).unwrap().is_some());
        assert!(renderer.render(&request(2)).unwrap().is_none());
        assert!(renderer.render(&request(3)).unwrap().is_none());
    }

    #[test]
    fn test_night_mode_inverts_white_page() {
        let pool = BufferPool::new();
        let renderer =
            TileRenderer::new(EngineHandle::new(FakeEngine::default()), pool.clone()).with_night_mode(true);

        let tile = renderer.render(&request(0)).unwrap().unwrap();

        assert_eq!(tile.with_pixels(|b| b.pixel(0, 0)), Some(Some([0, 0, 0, 255])));
        assert!(tile.night_mode());
        // The pre-night buffer went back to the pool.
        assert_eq!(pool.stats().releases, 1);
    }

    #[test]
    fn test_best_quality_uses_rgba() {
        let renderer = TileRenderer::new(EngineHandle::new(FakeEngine::default()), BufferPool::new());
        let mut req = request(0);
        req.quality = RenderQuality { best_quality: true, annotations: false };

        let tile = renderer.render(&req).unwrap().unwrap();
        assert_eq!(tile.with_pixels(|b| b.format()), Some(PixelFormat::Rgba8));
    }
}
