//! Document engine seam.
//!
//! The tile pipeline never talks to a concrete decoder directly. It consumes
//! the [`DocumentEngine`] trait through an [`EngineHandle`], which doubles as
//! the global lock serialising every call into the (non-reentrant) backend.
//!
//! [`LopdfEngine`] is the default backend: it reads page geometry with
//! `lopdf` and paints a placeholder page (white paper with a light frame).

mod sample;

pub use sample::write_blank_document;

use lopdf::Document;
use parking_lot::{Mutex, MutexGuard};
use std::collections::HashSet;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Native page size in device pixels (one PDF point per pixel).
///
/// Either dimension may be zero or negative for malformed pages; callers
/// treat such pages as degenerate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PageSize {
    pub width: i32,
    pub height: i32,
}

impl PageSize {
    pub const fn new(width: i32, height: i32) -> Self {
        Self { width, height }
    }
}

/// Pixel layout of a render target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PixelFormat {
    /// 8-bit RGBA, used for best-quality rendering.
    Rgba8,
    /// 8-bit RGB without alpha, the memory-saving format.
    Rgb8,
}

impl PixelFormat {
    pub const fn bytes_per_pixel(self) -> usize {
        match self {
            Self::Rgba8 => 4,
            Self::Rgb8 => 3,
        }
    }
}

/// Where the page lands inside the target bitmap.
///
/// The page is rendered at `width x height` pixels with its top-left corner
/// at `(left, top)` relative to the bitmap origin; everything outside the
/// bitmap is clipped. Tiles use negative `left`/`top` to select a window of
/// an enlarged page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DeviceRect {
    pub left: i32,
    pub top: i32,
    pub width: i32,
    pub height: i32,
}

/// Mutable pixel storage handed to [`DocumentEngine::render_into`].
#[derive(Debug)]
pub struct RenderTarget<'a> {
    pub pixels: &'a mut [u8],
    pub width: u32,
    pub height: u32,
    pub format: PixelFormat,
}

impl RenderTarget<'_> {
    /// Number of bytes the target must hold.
    pub fn required_len(&self) -> usize {
        self.width as usize * self.height as usize * self.format.bytes_per_pixel()
    }

    fn put_pixel(&mut self, x: u32, y: u32, rgb: [u8; 3]) {
        let bpp = self.format.bytes_per_pixel();
        let start = (y as usize * self.width as usize + x as usize) * bpp;
        let pixel = &mut self.pixels[start..start + bpp];
        pixel[..3].copy_from_slice(&rgb);
        if bpp == 4 {
            pixel[3] = 255;
        }
    }
}

#[derive(Debug, Clone)]
pub enum OpenSource {
    Path(PathBuf),
    Bytes(Vec<u8>),
}

impl From<PathBuf> for OpenSource {
    fn from(value: PathBuf) -> Self {
        Self::Path(value)
    }
}

impl From<&Path> for OpenSource {
    fn from(value: &Path) -> Self {
        Self::Path(value.to_path_buf())
    }
}

impl From<Vec<u8>> for OpenSource {
    fn from(value: Vec<u8>) -> Self {
        Self::Bytes(value)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("PDF parse error: {0}")]
    Parse(#[from] lopdf::Error),
    #[error("page {page} out of range (page_count={page_count})")]
    PageOutOfRange { page: u32, page_count: u32 },
    #[error("page {page} could not be opened: {reason}")]
    PageOpen { page: u32, reason: String },
    #[error("encrypted PDFs are not supported in the default backend")]
    EncryptedUnsupported,
    #[error("backend error: {0}")]
    Backend(String),
}

/// The consumed interface of a native document engine.
///
/// Implementations are not required to be reentrant; callers reach them
/// only through [`EngineHandle::lock`].
pub trait DocumentEngine: Send {
    /// Number of pages in the underlying document.
    fn page_count(&self) -> u32;

    /// Unscaled size of `page`.
    fn native_size(&self, page: u32) -> Result<PageSize, EngineError>;

    /// Prepares `page` for rendering. Opening an already open page is a no-op.
    fn open_page(&mut self, page: u32) -> Result<(), EngineError>;

    /// Paints `page` into `target`, placing the page at `device`.
    fn render_into(
        &mut self,
        target: &mut RenderTarget<'_>,
        page: u32,
        device: DeviceRect,
        annotations: bool,
    ) -> Result<(), EngineError>;
}

/// Shared, lock-guarded access to one document engine.
///
/// Cloning the handle shares the engine and its lock. Every render task and
/// every geometry query against the engine goes through [`EngineHandle::lock`].
#[derive(Clone)]
pub struct EngineHandle {
    inner: Arc<Mutex<dyn DocumentEngine>>,
}

impl EngineHandle {
    pub fn new<E: DocumentEngine + 'static>(engine: E) -> Self {
        Self { inner: Arc::new(Mutex::new(engine)) }
    }

    /// Acquires the engine lock, blocking until the current holder releases it.
    pub fn lock(&self) -> MutexGuard<'_, dyn DocumentEngine> {
        self.inner.lock()
    }

    /// Like [`EngineHandle::lock`] but gives up immediately when contended.
    pub fn try_lock(&self) -> Option<MutexGuard<'_, dyn DocumentEngine>> {
        self.inner.try_lock()
    }
}

impl fmt::Debug for EngineHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EngineHandle").field("locked", &self.inner.is_locked()).finish()
    }
}

const PAPER: [u8; 3] = [255, 255, 255];
const FRAME: [u8; 3] = [220, 220, 220];
const ANNOTATION_MARK: [u8; 3] = [250, 210, 90];

/// Default backend built on `lopdf`.
///
/// Page geometry comes from each page's `MediaBox` (US Letter when absent).
/// Rendering is a placeholder: white paper, a one pixel frame at the page
/// edge, and a small corner marker when annotations are requested.
#[derive(Debug, Default)]
pub struct LopdfEngine {
    page_sizes: Vec<PageSize>,
    opened: HashSet<u32>,
}

impl LopdfEngine {
    /// Parses a document and records its page sizes.
    pub fn open(source: impl Into<OpenSource>) -> Result<Self, EngineError> {
        let bytes = match source.into() {
            OpenSource::Path(path) => fs::read(path)?,
            OpenSource::Bytes(bytes) => bytes,
        };

        let page_sizes = Self::parse_sizes(&bytes)?;
        tracing::debug!(pages = page_sizes.len(), "document opened");

        Ok(Self { page_sizes, opened: HashSet::new() })
    }

    /// Builds an engine over already known page sizes, without a document.
    pub fn from_page_sizes(page_sizes: Vec<PageSize>) -> Self {
        Self { page_sizes, opened: HashSet::new() }
    }

    /// Number of pages opened so far.
    pub fn opened_pages(&self) -> usize {
        self.opened.len()
    }

    fn parse_sizes(bytes: &[u8]) -> Result<Vec<PageSize>, EngineError> {
        if bytes.windows("/Encrypt".len()).any(|window| window == b"/Encrypt") {
            return Err(EngineError::EncryptedUnsupported);
        }

        let doc = Document::load_mem(bytes)?;
        let pages = doc.get_pages();
        let mut sizes = Vec::with_capacity(pages.len());

        for (_, object_id) in pages {
            let dict = doc.get_dictionary(object_id)?;
            let size = dict
                .get(b"MediaBox")
                .ok()
                .and_then(|obj| obj.as_array().ok())
                .and_then(|array| {
                    if array.len() != 4 {
                        return None;
                    }
                    let x0 = array[0].as_float().ok()?;
                    let y0 = array[1].as_float().ok()?;
                    let x1 = array[2].as_float().ok()?;
                    let y1 = array[3].as_float().ok()?;
                    Some(PageSize::new(
                        (x1 - x0).abs().round() as i32,
                        (y1 - y0).abs().round() as i32,
                    ))
                })
                .unwrap_or(PageSize::new(612, 792));

            sizes.push(size);
        }

        if sizes.is_empty() {
            return Err(EngineError::Backend("document has no pages".to_owned()));
        }

        Ok(sizes)
    }

    fn check_page(&self, page: u32) -> Result<PageSize, EngineError> {
        self.page_sizes.get(page as usize).copied().ok_or(EngineError::PageOutOfRange {
            page,
            page_count: self.page_sizes.len() as u32,
        })
    }
}

impl DocumentEngine for LopdfEngine {
    fn page_count(&self) -> u32 {
        self.page_sizes.len() as u32
    }

    fn native_size(&self, page: u32) -> Result<PageSize, EngineError> {
        self.check_page(page)
    }

    fn open_page(&mut self, page: u32) -> Result<(), EngineError> {
        let size = self.check_page(page)?;
        if size.width <= 0 || size.height <= 0 {
            return Err(EngineError::PageOpen { page, reason: "empty media box".to_owned() });
        }
        self.opened.insert(page);
        Ok(())
    }

    fn render_into(
        &mut self,
        target: &mut RenderTarget<'_>,
        page: u32,
        device: DeviceRect,
        annotations: bool,
    ) -> Result<(), EngineError> {
        if !self.opened.contains(&page) {
            return Err(EngineError::Backend(format!("page {page} rendered before being opened")));
        }
        if target.pixels.len() < target.required_len() {
            return Err(EngineError::Backend(format!(
                "render target holds {} bytes, {} required",
                target.pixels.len(),
                target.required_len()
            )));
        }

        let marker = (device.width.min(device.height) / 16).max(1);

        for y in 0..target.height {
            let page_y = y as i32 - device.top;
            for x in 0..target.width {
                let page_x = x as i32 - device.left;
                let inside = page_x >= 0
                    && page_y >= 0
                    && page_x < device.width
                    && page_y < device.height;
                let color = if !inside {
                    PAPER
                } else if page_x == 0
                    || page_y == 0
                    || page_x == device.width - 1
                    || page_y == device.height - 1
                {
                    FRAME
                } else if annotations && page_x >= device.width - marker && page_y < marker {
                    ANNOTATION_MARK
                } else {
                    PAPER
                };
                target.put_pixel(x, y, color);
            }
        }

        Ok(())
    }
}
