//! A viewer session: one document, its layout, tile cache and render worker.

use crate::config::ViewerConfig;
use crate::error::ViewerResult;
use crate::placement::{place_tiles, TilePlacement};
use crate::planner::{PlanSummary, ViewportTilePlanner};
use crate::presentation::Presentation;
use crate::viewport::Viewport;
use parking_lot::Mutex;
use pdf_engine::EngineHandle;
use std::sync::Arc;
use std::time::Duration;
use tileview_cache::{CacheSnapshot, CacheStats, TileCache};
use tileview_render::{BufferPool, PoolStats, RenderError, RenderedTile, TileRenderer};
use tileview_scheduler::{RenderScheduler, RenderSink, SchedulerConfig, SchedulerStats};
use viewer_core::{DocumentLayout, PageOrder, Size, ZoomLevels};

/// Stores finished tiles in the cache and tells the presentation about them.
///
/// `night_mode` is the palette the cache currently holds. Tiles painted with
/// the other palette finished after a switch and are dropped.
struct ViewerSink {
    cache: Arc<TileCache>,
    presentation: Arc<dyn Presentation>,
    night_mode: Arc<Mutex<bool>>,
}

impl RenderSink for ViewerSink {
    fn tile_ready(&self, tile: RenderedTile) {
        let tile = Arc::new(tile);
        let stored = {
            let night_mode = self.night_mode.lock();
            if tile.night_mode() != *night_mode {
                tracing::debug!(page = tile.page(), "dropping tile rendered with the previous palette");
                tile.release();
                return;
            }
            if tile.is_thumbnail() {
                self.cache.upsert_thumbnail(tile.clone())
            } else {
                self.cache.upsert_active(tile.clone());
                true
            }
        };
        if stored {
            self.presentation.on_tile_ready(&tile);
            self.presentation.request_redraw();
        }
    }

    fn page_error(&self, page: u32, error: RenderError) {
        self.presentation.on_page_error(page, &error);
    }
}

/// Combined statistics of one session.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ViewerStats {
    pub cache: CacheStats,
    pub scheduler: SchedulerStats,
    pub pool: PoolStats,
}

/// Drives tile rendering for one open document.
///
/// The host calls [`TileViewer::load_pages`] whenever the viewport moves and
/// draws [`TileViewer::placements`] when the presentation asks for a redraw.
///
/// # Example
///
/// ```
/// use std::sync::Arc;
/// use std::time::Duration;
/// use pdf_engine::{EngineHandle, LopdfEngine, PageSize};
/// use tileview_core::{Presentation, TileViewer, ViewerConfig, Viewport};
/// use tileview_render::{RenderError, RenderedTile};
/// use viewer_core::Size;
///
/// struct Quiet;
///
/// impl Presentation for Quiet {
///     fn on_tile_ready(&self, _tile: &Arc<RenderedTile>) {}
///     fn on_page_error(&self, _page: u32, _error: &RenderError) {}
///     fn request_redraw(&self) {}
/// }
///
/// let engine = EngineHandle::new(LopdfEngine::from_page_sizes(vec![PageSize::new(600, 800); 3]));
/// let viewer = TileViewer::open(engine, ViewerConfig::default(), Arc::new(Quiet), Size::new(300, 500))?;
///
/// let viewport = Viewport::new(300, 500);
/// viewer.load_pages(&viewport);
/// assert!(viewer.wait_idle(Duration::from_secs(5)));
/// assert!(!viewer.placements(&viewport).is_empty());
///
/// viewer.close();
/// # Ok::<(), tileview_core::ViewerError>(())
/// ```
pub struct TileViewer {
    config: ViewerConfig,
    page_order: PageOrder,
    layout: DocumentLayout,
    planner: ViewportTilePlanner,
    cache: Arc<TileCache>,
    renderer: Arc<TileRenderer>,
    scheduler: RenderScheduler,
    presentation: Arc<dyn Presentation>,
    pool: BufferPool,
    palette: Arc<Mutex<bool>>,
}

impl TileViewer {
    /// Opens a session showing every document page in order.
    ///
    /// # Errors
    /// See [`TileViewer::open_with_order`].
    pub fn open(
        engine: EngineHandle,
        config: ViewerConfig,
        presentation: Arc<dyn Presentation>,
        viewport: Size,
    ) -> ViewerResult<Self> {
        Self::open_with_order(engine, config, Vec::new(), presentation, viewport)
    }

    /// Opens a session with a user page order.
    ///
    /// # Arguments
    ///
    /// * `engine` - Document engine shared with the render worker
    /// * `config` - Cache, layout and quality settings
    /// * `page_order` - Document page for each displayed page; empty means identity
    /// * `presentation` - Receives tiles, page errors and redraw requests
    /// * `viewport` - Initial viewport size in pixels
    ///
    /// Order entries naming no existing page, and pages whose size cannot be
    /// read, are laid out with zero size and never rendered.
    ///
    /// # Errors
    ///
    /// Returns [`crate::ViewerError::Config`] for an invalid configuration and
    /// [`crate::ViewerError::Scheduler`] if the render worker cannot start.
    pub fn open_with_order(
        engine: EngineHandle,
        config: ViewerConfig,
        page_order: Vec<usize>,
        presentation: Arc<dyn Presentation>,
        viewport: Size,
    ) -> ViewerResult<Self> {
        config.validate()?;

        let (page_order, sizes) = {
            let engine = engine.lock();
            let order = PageOrder::custom(page_order, engine.page_count() as usize);
            let sizes: Vec<Size> = order
                .resolve()
                .into_iter()
                .map(|page| match page {
                    Some(page) => match engine.native_size(page as u32) {
                        Ok(size) => Size::new(size.width, size.height),
                        Err(err) => {
                            tracing::warn!(page, %err, "cannot read page size");
                            Size::default()
                        }
                    },
                    None => Size::default(),
                })
                .collect();
            (order, sizes)
        };

        let layout = DocumentLayout::new(sizes, config.layout_options(), viewport).with_page_order(&page_order);
        let document_pages = page_order
            .resolve()
            .into_iter()
            .map(|page| page.and_then(|page| u32::try_from(page).ok()))
            .collect();

        let pool = BufferPool::new();
        let renderer = Arc::new(
            TileRenderer::new(engine, pool.clone())
                .with_page_order(document_pages)
                .with_night_mode(config.night_mode),
        );
        let cache = Arc::new(TileCache::new(config.cache_limit, config.thumbnail_limit));
        let palette = Arc::new(Mutex::new(config.night_mode));
        let sink = Arc::new(ViewerSink {
            cache: cache.clone(),
            presentation: presentation.clone(),
            night_mode: palette.clone(),
        });
        let scheduler = RenderScheduler::new(renderer.clone(), sink, SchedulerConfig::default())?;
        scheduler.start();

        tracing::info!(
            pages = layout.page_count(),
            document_pages = page_order.document_pages(),
            "viewer opened"
        );

        Ok(Self {
            planner: ViewportTilePlanner::new(&config),
            config,
            page_order,
            layout,
            cache,
            renderer,
            scheduler,
            presentation,
            pool,
            palette,
        })
    }

    /// Recomputes the layout for a new viewport size.
    pub fn resize(&mut self, viewport: Size) {
        self.layout.recalculate(viewport);
    }

    /// Runs one planning pass for `viewport`.
    ///
    /// Queued requests from the previous pass are dropped, the cache starts a
    /// new generation and every visible cell is either promoted from the
    /// cache or queued for rendering.
    pub fn load_pages(&self, viewport: &Viewport) -> PlanSummary {
        self.scheduler.purge_all();
        self.cache.begin_new_pass();
        self.planner
            .plan_and_request(&self.layout, viewport, &self.cache, |request| self.scheduler.submit(request))
    }

    pub fn snapshot(&self) -> CacheSnapshot {
        self.cache.snapshot_all()
    }

    /// Screen placement of every cached tile visible in `viewport`.
    pub fn placements(&self, viewport: &Viewport) -> Vec<TilePlacement> {
        place_tiles(&self.layout, viewport, &self.snapshot())
    }

    /// Lets pages that failed before be tried again on the next pass.
    pub fn reset_page_errors(&self) {
        self.renderer.reset_page_errors();
    }

    /// Switches night mode. Cached tiles were rendered with the old palette,
    /// so the cache is emptied and the host is asked to redraw.
    pub fn set_night_mode(&mut self, enabled: bool) {
        if self.config.night_mode == enabled {
            return;
        }
        self.config.night_mode = enabled;
        {
            let mut palette = self.palette.lock();
            *palette = enabled;
            self.renderer.set_night_mode(enabled);
        }
        self.scheduler.purge_all();
        self.cache.clear();
        self.presentation.request_redraw();
    }

    pub fn night_mode(&self) -> bool {
        self.config.night_mode
    }

    pub fn layout(&self) -> &DocumentLayout {
        &self.layout
    }

    pub fn config(&self) -> &ViewerConfig {
        &self.config
    }

    pub fn page_order(&self) -> &PageOrder {
        &self.page_order
    }

    pub fn page_count(&self) -> usize {
        self.layout.page_count()
    }

    pub fn zoom_levels(&self) -> ZoomLevels {
        self.config.zoom_levels()
    }

    pub fn stats(&self) -> ViewerStats {
        ViewerStats {
            cache: self.cache.stats(),
            scheduler: self.scheduler.stats(),
            pool: self.pool.stats(),
        }
    }

    /// Blocks until every queued request has been handled.
    ///
    /// Returns `false` if `timeout` passed first.
    pub fn wait_idle(&self, timeout: Duration) -> bool {
        self.scheduler.wait_idle(timeout)
    }

    /// Ends the session: pending work is dropped, the worker is joined and
    /// every cached tile is released.
    /// Stops the worker, releases every tile and trims the buffer pool.
    ///
    /// Returns the final statistics of the session.
    pub fn close(mut self) -> ViewerStats {
        self.scheduler.shutdown();
        self.cache.clear();
        self.pool.shrink();
        let stats = self.stats();
        tracing::info!(
            delivered = stats.scheduler.delivered,
            allocations = stats.pool.allocations,
            "viewer closed"
        );
        stats
    }
}
