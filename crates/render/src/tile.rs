//! Tile value types
//!
//! A tile is a rectangular fragment of one page, addressed in page-relative
//! coordinates so that the same key survives zoom and layout changes.

use crate::buffer::PixelBuffer;
use parking_lot::Mutex;
use pdf_engine::{DeviceRect, PixelFormat};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicU32, Ordering};

/// Rectangle in page-relative space, `[0,1] x [0,1]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RelativeBounds {
    pub left: f32,
    pub top: f32,
    pub right: f32,
    pub bottom: f32,
}

impl RelativeBounds {
    /// The whole page, used for thumbnails.
    pub const FULL: Self = Self { left: 0.0, top: 0.0, right: 1.0, bottom: 1.0 };

    pub const fn new(left: f32, top: f32, right: f32, bottom: f32) -> Self {
        Self { left, top, right, bottom }
    }

    pub fn width(&self) -> f32 {
        self.right - self.left
    }

    pub fn height(&self) -> f32 {
        self.bottom - self.top
    }

    pub fn is_empty(&self) -> bool {
        self.width() <= 0.0 || self.height() <= 0.0
    }

    fn bits(&self) -> [u32; 4] {
        [canonical_bits(self.left), canonical_bits(self.top), canonical_bits(self.right), canonical_bits(self.bottom)]
    }
}

// -0.0 and 0.0 must produce the same key.
fn canonical_bits(value: f32) -> u32 {
    if value == 0.0 {
        0
    } else {
        value.to_bits()
    }
}

/// Structural cache key: page, bounds and thumbnail flag.
///
/// Bounds are compared bit-for-bit, which is exact for tiles produced by the
/// same grid computation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TileKey {
    pub page: u32,
    bounds: [u32; 4],
    pub thumbnail: bool,
}

impl TileKey {
    pub fn new(page: u32, bounds: RelativeBounds, thumbnail: bool) -> Self {
        Self { page, bounds: bounds.bits(), thumbnail }
    }

    pub fn bounds(&self) -> RelativeBounds {
        let [left, top, right, bottom] = self.bounds.map(f32::from_bits);
        RelativeBounds { left, top, right, bottom }
    }
}

/// Per-request quality switches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct RenderQuality {
    /// Render with alpha (`Rgba8`) instead of the memory-saving `Rgb8`.
    pub best_quality: bool,
    /// Ask the engine to paint annotations.
    pub annotations: bool,
}

impl RenderQuality {
    pub fn pixel_format(&self) -> PixelFormat {
        if self.best_quality {
            PixelFormat::Rgba8
        } else {
            PixelFormat::Rgb8
        }
    }
}

/// A request to render one tile.
///
/// Equality and hashing only look at [`TileKey`]; priority, target size and
/// quality do not take part.
#[derive(Debug, Clone, Copy)]
pub struct TileRequest {
    /// Displayed page index
    pub page: u32,
    pub bounds: RelativeBounds,
    pub thumbnail: bool,
    /// Position within the planning pass; lower values are older.
    pub priority: u32,
    /// Target width in pixels before rounding
    pub width: f32,
    /// Target height in pixels before rounding
    pub height: f32,
    pub quality: RenderQuality,
}

impl TileRequest {
    /// Creates a regular (non-thumbnail) tile request.
    pub fn part(
        page: u32,
        bounds: RelativeBounds,
        priority: u32,
        width: f32,
        height: f32,
        quality: RenderQuality,
    ) -> Self {
        Self { page, bounds, thumbnail: false, priority, width, height, quality }
    }

    /// Creates a whole-page thumbnail request. Thumbnails always have priority 0.
    pub fn thumbnail(page: u32, width: f32, height: f32, quality: RenderQuality) -> Self {
        Self {
            page,
            bounds: RelativeBounds::FULL,
            thumbnail: true,
            priority: 0,
            width,
            height,
            quality,
        }
    }

    pub fn key(&self) -> TileKey {
        TileKey::new(self.page, self.bounds, self.thumbnail)
    }

    /// Target size rounded to whole pixels.
    pub fn pixel_size(&self) -> (i64, i64) {
        (self.width.round() as i64, self.height.round() as i64)
    }

    /// True when the rounded target has no area.
    pub fn is_degenerate(&self) -> bool {
        let (width, height) = self.pixel_size();
        width <= 0 || height <= 0 || self.bounds.is_empty()
    }
}

impl PartialEq for TileRequest {
    fn eq(&self, other: &Self) -> bool {
        self.key() == other.key()
    }
}

impl Eq for TileRequest {}

impl Hash for TileRequest {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.key().hash(state);
    }
}

/// Maps a tile's relative bounds to the engine's device space.
///
/// The page is scaled so that the `bounds` window fills a `width x height`
/// bitmap, then shifted so the window's top-left lands on the origin.
pub fn device_rect(width: u32, height: u32, bounds: RelativeBounds) -> DeviceRect {
    let (w, h) = (width as f32, height as f32);
    let left = (-bounds.left * w / bounds.width()).round();
    let top = (-bounds.top * h / bounds.height()).round();
    let right = ((w - bounds.left * w) / bounds.width()).round();
    let bottom = ((h - bounds.top * h) / bounds.height()).round();

    DeviceRect {
        left: left as i32,
        top: top as i32,
        width: (right - left) as i32,
        height: (bottom - top) as i32,
    }
}

/// A successfully rendered tile.
///
/// The pixel buffer can be released exactly once; afterwards the tile keeps
/// its metadata but [`RenderedTile::with_pixels`] yields nothing, so a
/// released tile can never be drawn.
pub struct RenderedTile {
    request: TileRequest,
    priority: AtomicU32,
    night_mode: bool,
    buffer: Mutex<Option<PixelBuffer>>,
}

impl RenderedTile {
    pub fn new(request: TileRequest, buffer: PixelBuffer) -> Self {
        Self {
            request,
            priority: AtomicU32::new(request.priority),
            night_mode: false,
            buffer: Mutex::new(Some(buffer)),
        }
    }

    /// Marks the palette the pixels were painted with.
    pub fn with_night_mode(mut self, enabled: bool) -> Self {
        self.night_mode = enabled;
        self
    }

    /// The request this tile answers, carrying its current priority.
    pub fn request(&self) -> TileRequest {
        TileRequest { priority: self.priority(), ..self.request }
    }

    pub fn priority(&self) -> u32 {
        self.priority.load(Ordering::Acquire)
    }

    /// Re-ranks the tile; the cache calls this when a pass promotes it.
    pub fn set_priority(&self, priority: u32) {
        self.priority.store(priority, Ordering::Release);
    }

    pub fn night_mode(&self) -> bool {
        self.night_mode
    }

    pub fn key(&self) -> TileKey {
        self.request.key()
    }

    pub fn page(&self) -> u32 {
        self.request.page
    }

    pub fn bounds(&self) -> RelativeBounds {
        self.request.bounds
    }

    pub fn is_thumbnail(&self) -> bool {
        self.request.thumbnail
    }

    /// Releases the pixel buffer back to its pool.
    ///
    /// Returns `true` only for the call that actually released it.
    pub fn release(&self) -> bool {
        self.buffer.lock().take().is_some()
    }

    pub fn is_released(&self) -> bool {
        self.buffer.lock().is_none()
    }

    /// Runs `f` against the pixels unless the tile was released.
    pub fn with_pixels<R>(&self, f: impl FnOnce(&PixelBuffer) -> R) -> Option<R> {
        self.buffer.lock().as_ref().map(f)
    }

    /// Pixel dimensions of the live buffer.
    pub fn pixel_size(&self) -> Option<(u32, u32)> {
        self.with_pixels(|buffer| (buffer.width(), buffer.height()))
    }
}

impl fmt::Debug for RenderedTile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RenderedTile")
            .field("key", &self.key())
            .field("released", &self.is_released())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::BufferPool;
    use std::collections::HashSet;

    fn bounds(l: f32, t: f32, r: f32, b: f32) -> RelativeBounds {
        RelativeBounds::new(l, t, r, b)
    }

    #[test]
    fn test_request_equality_ignores_priority_and_size() {
        let quality = RenderQuality::default();
        let a = TileRequest::part(3, bounds(0.0, 0.0, 0.5, 0.5), 1, 384.0, 384.0, quality);
        let b = TileRequest::part(
            3,
            bounds(0.0, 0.0, 0.5, 0.5),
            42,
            100.0,
            90.0,
            RenderQuality { best_quality: true, annotations: true },
        );

        assert_eq!(a, b);
        assert_eq!(a.key(), b.key());
    }

    #[test]
    fn test_thumbnail_flag_is_part_of_key() {
        let quality = RenderQuality::default();
        let part = TileRequest::part(0, RelativeBounds::FULL, 1, 10.0, 10.0, quality);
        let thumb = TileRequest::thumbnail(0, 10.0, 10.0, quality);

        assert_ne!(part, thumb);
        assert_eq!(thumb.priority, 0);
    }

    #[test]
    fn test_key_hash_dedups() {
        let mut keys = HashSet::new();
        keys.insert(TileKey::new(1, bounds(0.0, 0.25, 0.5, 0.5), false));
        keys.insert(TileKey::new(1, bounds(-0.0, 0.25, 0.5, 0.5), false));
        keys.insert(TileKey::new(2, bounds(0.0, 0.25, 0.5, 0.5), false));

        assert_eq!(keys.len(), 2);
    }

    #[test]
    fn test_key_bounds_roundtrip() {
        let original = bounds(0.25, 0.5, 0.75, 1.0);

        assert_eq!(TileKey::new(0, original, false).bounds(), original);
    }

    #[test]
    fn test_degenerate_request() {
        let quality = RenderQuality::default();

        assert!(TileRequest::part(0, RelativeBounds::FULL, 1, 0.4, 10.0, quality).is_degenerate());
        assert!(TileRequest::part(0, bounds(1.0, 0.0, 1.0, 1.0), 1, 10.0, 10.0, quality)
            .is_degenerate());
        assert!(!TileRequest::part(0, RelativeBounds::FULL, 1, 0.6, 0.6, quality).is_degenerate());
    }

    #[test]
    fn test_pixel_format_follows_quality() {
        assert_eq!(RenderQuality::default().pixel_format(), PixelFormat::Rgb8);
        assert_eq!(
            RenderQuality { best_quality: true, annotations: false }.pixel_format(),
            PixelFormat::Rgba8
        );
    }

    #[test]
    fn test_device_rect_full_page() {
        let rect = device_rect(300, 400, RelativeBounds::FULL);

        assert_eq!(rect, DeviceRect { left: 0, top: 0, width: 300, height: 400 });
    }

    #[test]
    fn test_device_rect_bottom_right_quarter() {
        // A 384x384 tile covering the bottom-right quarter sees a 768x768 page
        // shifted up and left by one tile.
        let rect = device_rect(384, 384, bounds(0.5, 0.5, 1.0, 1.0));

        assert_eq!(rect, DeviceRect { left: -384, top: -384, width: 768, height: 768 });
    }

    #[test]
    fn test_release_happens_once() {
        let pool = BufferPool::new();
        let buffer = pool.acquire(2, 2, PixelFormat::Rgb8).unwrap();
        let tile = RenderedTile::new(
            TileRequest::part(0, RelativeBounds::FULL, 1, 2.0, 2.0, RenderQuality::default()),
            buffer,
        );

        assert_eq!(tile.pixel_size(), Some((2, 2)));
        assert!(tile.release());
        assert!(!tile.release());
        assert!(tile.is_released());
        assert!(tile.with_pixels(|_| ()).is_none());
        assert_eq!(pool.stats().releases, 1);
    }

    #[test]
    fn test_set_priority_updates_request() {
        let pool = BufferPool::new();
        let buffer = pool.acquire(2, 2, PixelFormat::Rgb8).unwrap();
        let tile = RenderedTile::new(
            TileRequest::part(0, RelativeBounds::FULL, 1, 2.0, 2.0, RenderQuality::default()),
            buffer,
        )
        .with_night_mode(true);

        tile.set_priority(8);

        assert_eq!(tile.priority(), 8);
        assert_eq!(tile.request().priority, 8);
        assert_eq!(tile.key().page, 0);
        assert!(tile.night_mode());
    }
}
