//! Pixel buffers and their recycling pool
//!
//! Buffers are the only resource in the tile pipeline that needs explicit
//! release. Dropping a [`PixelBuffer`] hands its storage back to the
//! [`BufferPool`] it came from, where later allocations of equal or smaller
//! size pick it up again.

use crate::error::RenderError;
use image::{Rgba, RgbaImage};
use parking_lot::Mutex;
use pdf_engine::{PixelFormat, RenderTarget};
use std::fmt;
use std::sync::Arc;

/// Default number of free buffers kept for reuse.
pub const DEFAULT_POOL_CAPACITY: usize = 32;

/// Statistics about buffer allocation
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PoolStats {
    /// Buffers created from fresh memory
    pub allocations: u64,
    /// Buffers served from recycled storage
    pub reuses: u64,
    /// Buffers returned to the pool (kept or dropped)
    pub releases: u64,
    /// Allocation requests that could not be satisfied
    pub failures: u64,
    /// Free buffers currently held
    pub free: usize,
}

struct PoolState {
    free: Vec<Vec<u8>>,
    capacity: usize,
    stats: PoolStats,
}

/// Shared pool of pixel storage.
///
/// Cloning the pool shares it.
#[derive(Clone)]
pub struct BufferPool {
    state: Arc<Mutex<PoolState>>,
}

impl BufferPool {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_POOL_CAPACITY)
    }

    /// Creates a pool that keeps at most `capacity` free buffers.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            state: Arc::new(Mutex::new(PoolState {
                free: Vec::new(),
                capacity,
                stats: PoolStats::default(),
            })),
        }
    }

    /// Hands out a zeroed buffer of `width x height` pixels.
    ///
    /// # Errors
    /// Returns [`RenderError::Allocation`] when the byte size overflows or the
    /// allocator refuses the request.
    pub fn acquire(
        &self,
        width: u32,
        height: u32,
        format: PixelFormat,
    ) -> Result<PixelBuffer, RenderError> {
        let failure = RenderError::Allocation { width, height, format };
        let mut state = self.state.lock();

        let Some(len) = (width as usize)
            .checked_mul(height as usize)
            .and_then(|pixels| pixels.checked_mul(format.bytes_per_pixel()))
        else {
            state.stats.failures += 1;
            return Err(failure);
        };

        // Smallest free buffer that is large enough.
        let reusable = state
            .free
            .iter()
            .enumerate()
            .filter(|(_, data)| data.capacity() >= len)
            .min_by_key(|(_, data)| data.capacity())
            .map(|(index, _)| index);

        let mut data = match reusable {
            Some(index) => {
                state.stats.reuses += 1;
                let mut data = state.free.swap_remove(index);
                data.clear();
                data
            }
            None => {
                let mut data = Vec::new();
                if data.try_reserve_exact(len).is_err() {
                    state.stats.failures += 1;
                    return Err(failure);
                }
                state.stats.allocations += 1;
                data
            }
        };
        state.stats.free = state.free.len();
        drop(state);

        data.resize(len, 0);
        Ok(PixelBuffer { width, height, format, data, pool: Some(self.clone()) })
    }

    fn recycle(&self, data: Vec<u8>) {
        let mut state = self.state.lock();
        state.stats.releases += 1;
        if state.free.len() < state.capacity {
            state.free.push(data);
        }
        state.stats.free = state.free.len();
    }

    pub fn stats(&self) -> PoolStats {
        self.state.lock().stats
    }

    /// Drops every free buffer.
    pub fn shrink(&self) {
        let mut state = self.state.lock();
        state.free.clear();
        state.stats.free = 0;
    }
}

impl Default for BufferPool {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for BufferPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BufferPool").field("stats", &self.stats()).finish()
    }
}

/// Owned pixel storage for one tile.
pub struct PixelBuffer {
    width: u32,
    height: u32,
    format: PixelFormat,
    data: Vec<u8>,
    pool: Option<BufferPool>,
}

impl PixelBuffer {
    /// Wraps existing bytes; the buffer is not tied to any pool.
    ///
    /// Returns `None` when `data` does not match the dimensions.
    pub fn from_vec(width: u32, height: u32, format: PixelFormat, data: Vec<u8>) -> Option<Self> {
        let expected = width as usize * height as usize * format.bytes_per_pixel();
        (data.len() == expected).then_some(Self { width, height, format, data, pool: None })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn format(&self) -> PixelFormat {
        self.format
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn as_bytes_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    /// Memory footprint in bytes
    pub fn byte_size(&self) -> usize {
        self.data.len()
    }

    /// Borrows the buffer as an engine render target.
    pub fn target(&mut self) -> RenderTarget<'_> {
        RenderTarget {
            pixels: &mut self.data,
            width: self.width,
            height: self.height,
            format: self.format,
        }
    }

    /// Reads one pixel as RGBA; `Rgb8` pixels report an opaque alpha.
    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let bpp = self.format.bytes_per_pixel();
        let start = (y as usize * self.width as usize + x as usize) * bpp;
        let px = &self.data[start..start + bpp];
        Some([px[0], px[1], px[2], if bpp == 4 { px[3] } else { 255 }])
    }

    /// Converts to an `image` buffer, e.g. for PNG export.
    pub fn to_rgba_image(&self) -> RgbaImage {
        RgbaImage::from_fn(self.width, self.height, |x, y| {
            Rgba(self.pixel(x, y).unwrap_or([0, 0, 0, 0]))
        })
    }
}

impl Drop for PixelBuffer {
    fn drop(&mut self) {
        if let Some(pool) = self.pool.take() {
            pool.recycle(std::mem::take(&mut self.data));
        }
    }
}

impl fmt::Debug for PixelBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PixelBuffer")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("format", &self.format)
            .finish()
    }
}
