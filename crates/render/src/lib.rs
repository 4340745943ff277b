//! Tileview Render Library
//!
//! Tile value types, pixel buffers and the single-task tile renderer.
//!
//! A [`TileRequest`] names a page-relative rectangle of one page. The
//! [`TileRenderer`] turns it into a [`RenderedTile`] by mapping the rectangle
//! into the engine's device space and painting into a pooled buffer.
//!
//! # Example
//!
//! ```
//! use pdf_engine::{EngineHandle, LopdfEngine, PageSize};
//! use tileview_render::{BufferPool, RelativeBounds, RenderQuality, TileRenderer, TileRequest};
//!
//! let engine = LopdfEngine::from_page_sizes(vec![PageSize::new(600, 800)]);
//! let renderer = TileRenderer::new(EngineHandle::new(engine), BufferPool::new());
//!
//! let request = TileRequest::part(
//!     0,
//!     RelativeBounds::new(0.0, 0.0, 0.5, 0.5),
//!     1,
//!     384.0,
//!     384.0,
//!     RenderQuality::default(),
//! );
//! let tile = renderer.render(&request).unwrap().unwrap();
//! assert_eq!(tile.pixel_size(), Some((384, 384)));
//! ```

pub mod buffer;
pub mod error;
pub mod night;
pub mod renderer;
pub mod tile;

pub use buffer::{BufferPool, PixelBuffer, PoolStats};
pub use error::RenderError;
pub use night::{apply_night_mode, night_value};
pub use pdf_engine::PixelFormat;
pub use renderer::TileRenderer;
pub use tile::{device_rect, RelativeBounds, RenderQuality, RenderedTile, TileKey, TileRequest};
