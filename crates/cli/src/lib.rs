use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use parking_lot::Mutex;
use pdf_engine::{write_blank_document, DocumentEngine, EngineHandle, LopdfEngine, OpenSource};
use serde::Serialize;
use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tileview_cache::TileCache;
use tileview_core::{PlanSummary, Presentation, TileViewer, ViewerConfig, Viewport, ViewportTilePlanner};
use tileview_render::{RenderError, RenderedTile, TileRequest};
use tracing_subscriber::EnvFilter;
use viewer_core::{DocumentLayout, FitPolicy, ScrollAxis, Size};

/// Longest time `render` waits for the worker to drain the queue.
const RENDER_TIMEOUT: Duration = Duration::from_secs(120);

#[derive(Debug, Parser)]
#[command(name = "tileview")]
#[command(about = "Tile planning and rendering for paginated documents")]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Print machine-readable document metadata.
    Info {
        #[arg(value_name = "FILE")]
        file: PathBuf,
    },
    /// Print the page layout for a viewport.
    Layout {
        #[arg(value_name = "FILE")]
        file: PathBuf,
        #[command(flatten)]
        view: ViewArgs,
    },
    /// Print the tile requests of one planning pass against an empty cache.
    Plan {
        #[arg(value_name = "FILE")]
        file: PathBuf,
        #[command(flatten)]
        view: ViewArgs,
    },
    /// Render the tiles of one planning pass into PNG files.
    Render {
        #[arg(value_name = "FILE")]
        file: PathBuf,
        #[command(flatten)]
        view: ViewArgs,
        /// Directory receiving one PNG per tile
        #[arg(long, value_name = "DIR")]
        output: PathBuf,
        #[arg(long)]
        night: bool,
    },
    /// Write a blank document with the given number of pages.
    Sample {
        #[arg(long, default_value_t = 3)]
        pages: usize,
        /// Page width in points
        #[arg(long, default_value_t = 612.0)]
        width: f32,
        /// Page height in points
        #[arg(long, default_value_t = 792.0)]
        height: f32,
        #[arg(long, value_name = "FILE")]
        output: PathBuf,
    },
    /// Print CLI version.
    Version,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum FitArg {
    Width,
    Height,
    Both,
}

impl From<FitArg> for FitPolicy {
    fn from(value: FitArg) -> Self {
        match value {
            FitArg::Width => FitPolicy::Width,
            FitArg::Height => FitPolicy::Height,
            FitArg::Both => FitPolicy::Both,
        }
    }
}

#[derive(Debug, Args)]
struct ViewArgs {
    /// Viewport width in pixels
    #[arg(long, default_value_t = 800)]
    width: i32,
    /// Viewport height in pixels
    #[arg(long, default_value_t = 1000)]
    height: i32,
    /// Horizontal content translation (<= 0 once scrolled)
    #[arg(long, default_value_t = 0.0, allow_hyphen_values = true)]
    offset_x: f32,
    /// Vertical content translation (<= 0 once scrolled)
    #[arg(long, default_value_t = 0.0, allow_hyphen_values = true)]
    offset_y: f32,
    #[arg(long, default_value_t = 1.0)]
    zoom: f32,
    #[arg(long, value_enum)]
    fit: Option<FitArg>,
    #[arg(long)]
    spacing: Option<f32>,
    #[arg(long)]
    auto_spacing: bool,
    #[arg(long)]
    horizontal: bool,
    /// TOML configuration file; `TILEVIEW_*` variables apply on top
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,
}

impl ViewArgs {
    fn viewer_config(&self) -> Result<ViewerConfig> {
        let config = match &self.config {
            Some(path) => ViewerConfig::from_file(path)
                .with_context(|| format!("failed to load config {}", path.display()))?,
            None => ViewerConfig::default(),
        };
        let mut config = config.with_env_overrides().context("invalid TILEVIEW_* environment")?;

        if let Some(fit) = self.fit {
            config.fit_policy = fit.into();
        }
        if let Some(spacing) = self.spacing {
            config.spacing = spacing;
        }
        if self.auto_spacing {
            config.auto_spacing = true;
        }
        if self.horizontal {
            config.scroll_axis = ScrollAxis::Horizontal;
        }
        config.validate().context("invalid configuration")?;
        Ok(config)
    }

    fn viewport(&self) -> Result<Viewport> {
        if self.width <= 0 || self.height <= 0 {
            anyhow::bail!("viewport must be at least 1x1, got {}x{}", self.width, self.height);
        }
        if !(self.zoom > 0.0) {
            anyhow::bail!("--zoom must be positive");
        }
        Ok(Viewport::new(self.width, self.height)
            .with_offset(self.offset_x, self.offset_y)
            .with_zoom(self.zoom))
    }
}

#[derive(Debug, Serialize)]
struct SizeOutput {
    width: f32,
    height: f32,
}

#[derive(Debug, Serialize)]
struct InfoOutput {
    path: String,
    page_count: u32,
    pages: Vec<SizeOutput>,
}

#[derive(Debug, Serialize)]
struct PageLayoutOutput {
    index: usize,
    document_page: Option<u32>,
    original: SizeOutput,
    scaled: SizeOutput,
    offset: f32,
    secondary_offset: f32,
}

#[derive(Debug, Serialize)]
struct LayoutOutput {
    page_count: usize,
    zoom: f32,
    axis: ScrollAxis,
    document_length: f32,
    pages: Vec<PageLayoutOutput>,
}

#[derive(Debug, Serialize)]
struct RequestOutput {
    page: u32,
    thumbnail: bool,
    priority: u32,
    bounds: [f32; 4],
    width: f32,
    height: f32,
}

impl From<&TileRequest> for RequestOutput {
    fn from(request: &TileRequest) -> Self {
        let b = request.bounds;
        Self {
            page: request.page,
            thumbnail: request.thumbnail,
            priority: request.priority,
            bounds: [b.left, b.top, b.right, b.bottom],
            width: request.width,
            height: request.height,
        }
    }
}

#[derive(Debug, Serialize)]
struct PlanOutput {
    summary: PlanSummary,
    requests: Vec<RequestOutput>,
}

#[derive(Debug, Clone, Serialize)]
struct PageErrorOutput {
    page: u32,
    message: String,
}

#[derive(Debug, Serialize)]
struct RenderOutput {
    summary: PlanSummary,
    files: Vec<String>,
    page_errors: Vec<PageErrorOutput>,
}

/// Collects page errors reported by the render worker.
#[derive(Default)]
struct ErrorLog {
    errors: Mutex<Vec<PageErrorOutput>>,
}

impl Presentation for ErrorLog {
    fn on_tile_ready(&self, tile: &Arc<RenderedTile>) {
        tracing::trace!(page = tile.page(), thumbnail = tile.is_thumbnail(), "tile ready");
    }

    fn on_page_error(&self, page: u32, error: &RenderError) {
        self.errors.lock().push(PageErrorOutput { page, message: error.to_string() });
    }

    fn request_redraw(&self) {}
}

pub fn run<I, T>(args: I) -> Result<()>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    let cli = Cli::parse_from(args);
    init_tracing();

    match cli.command {
        Commands::Info { file } => run_info(&file),
        Commands::Layout { file, view } => run_layout(&file, &view),
        Commands::Plan { file, view } => run_plan(&file, &view),
        Commands::Render { file, view, output, night } => run_render(&file, &view, &output, night),
        Commands::Sample { pages, width, height, output } => run_sample(pages, width, height, &output),
        Commands::Version => {
            println!("{}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    // A second call in the same process keeps the first subscriber.
    let _ = tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr).try_init();
}

fn run_info(file: &Path) -> Result<()> {
    let engine = open_document(file)?;

    let pages = (0..engine.page_count())
        .map(|page| {
            let size = engine.native_size(page)?;
            Ok(SizeOutput { width: size.width as f32, height: size.height as f32 })
        })
        .collect::<Result<Vec<_>>>()?;

    let payload = InfoOutput { path: file.display().to_string(), page_count: engine.page_count(), pages };
    print_json(&payload)
}

fn run_layout(file: &Path, view: &ViewArgs) -> Result<()> {
    let config = view.viewer_config()?;
    let viewport = view.viewport()?;
    let layout = build_layout(&open_document(file)?, &config, viewport.size())?;
    let zoom = viewport.zoom;

    let pages = (0..layout.page_count())
        .map(|page| {
            let original = layout.original_size(page);
            let scaled = layout.scaled_size_at(page, zoom);
            PageLayoutOutput {
                index: page,
                document_page: layout.document_page(page),
                original: SizeOutput { width: original.width as f32, height: original.height as f32 },
                scaled: SizeOutput { width: scaled.width, height: scaled.height },
                offset: layout.offset_of(page, zoom),
                secondary_offset: layout.secondary_offset_of(page, zoom),
            }
        })
        .collect();

    print_json(&LayoutOutput {
        page_count: layout.page_count(),
        zoom,
        axis: layout.axis(),
        document_length: layout.document_length(zoom),
        pages,
    })
}

fn run_plan(file: &Path, view: &ViewArgs) -> Result<()> {
    let config = view.viewer_config()?;
    let viewport = view.viewport()?;
    let layout = build_layout(&open_document(file)?, &config, viewport.size())?;

    let planner = ViewportTilePlanner::new(&config);
    let cache = TileCache::new(config.cache_limit, config.thumbnail_limit);
    let mut requests = Vec::new();
    let summary = planner.plan_and_request(&layout, &viewport, &cache, |request| {
        requests.push(RequestOutput::from(&request));
    });

    print_json(&PlanOutput { summary, requests })
}

fn run_render(file: &Path, view: &ViewArgs, output: &Path, night: bool) -> Result<()> {
    let mut config = view.viewer_config()?;
    if night {
        config = config.with_night_mode(true);
    }
    let viewport = view.viewport()?;
    let engine = EngineHandle::new(open_document(file)?);

    let errors = Arc::new(ErrorLog::default());
    let viewer = TileViewer::open(engine, config, errors.clone(), viewport.size())
        .context("failed to start viewer")?;

    let summary = viewer.load_pages(&viewport);
    if !viewer.wait_idle(RENDER_TIMEOUT) {
        anyhow::bail!("rendering did not finish within {}s", RENDER_TIMEOUT.as_secs());
    }

    fs::create_dir_all(output)
        .with_context(|| format!("failed to create output directory {}", output.display()))?;

    let snapshot = viewer.snapshot();
    let mut files = Vec::new();
    for tile in snapshot.thumbnails.iter().chain(snapshot.tiles.iter()) {
        let Some(image) = tile.with_pixels(|pixels| pixels.to_rgba_image()) else {
            continue;
        };
        let path = output.join(tile_file_name(tile));
        image
            .save(&path)
            .with_context(|| format!("failed to write image to {}", path.display()))?;
        files.push(path.display().to_string());
    }

    let stats = viewer.close();
    tracing::info!(
        tiles = files.len(),
        allocations = stats.pool.allocations,
        reuses = stats.pool.reuses,
        "render pass written"
    );

    let page_errors = errors.errors.lock().clone();
    print_json(&RenderOutput { summary, files, page_errors })
}

fn run_sample(pages: usize, width: f32, height: f32, output: &Path) -> Result<()> {
    if pages == 0 {
        anyhow::bail!("--pages must be at least 1");
    }
    if !(width > 0.0 && height > 0.0) {
        anyhow::bail!("page size must be positive, got {width}x{height}");
    }

    let bytes = write_blank_document(&vec![(width, height); pages]).context("failed to build document")?;
    if let Some(parent) = output.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    fs::write(output, bytes).with_context(|| format!("failed to write {}", output.display()))?;

    println!("{}", output.display());
    Ok(())
}

fn open_document(file: &Path) -> Result<LopdfEngine> {
    ensure_file_exists(file)?;
    LopdfEngine::open(OpenSource::from(file)).context("failed to open PDF")
}

fn build_layout(engine: &LopdfEngine, config: &ViewerConfig, viewport: Size) -> Result<DocumentLayout> {
    let sizes = (0..engine.page_count())
        .map(|page| {
            let size = engine.native_size(page)?;
            Ok(Size::new(size.width, size.height))
        })
        .collect::<Result<Vec<_>>>()?;
    Ok(DocumentLayout::new(sizes, config.layout_options(), viewport))
}

fn tile_file_name(tile: &RenderedTile) -> String {
    if tile.is_thumbnail() {
        format!("page-{}-thumb.png", tile.page())
    } else {
        format!("page-{}-tile-{:03}.png", tile.page(), tile.priority())
    }
}

fn ensure_file_exists(path: &Path) -> Result<()> {
    if !path.exists() {
        anyhow::bail!("file does not exist: {}", path.display());
    }

    if !path.is_file() {
        anyhow::bail!("path is not a file: {}", path.display());
    }

    Ok(())
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value)?;
    println!("{json}");
    Ok(())
}
