//! Tileview Cache Library
//!
//! Bounded tile cache with active/passive generation aging and a separate
//! FIFO thumbnail store.

mod generation;
mod thumbnails;
pub mod tiles;

pub use tiles::{CacheSnapshot, CacheStats, TileCache, DEFAULT_CACHE_LIMIT, DEFAULT_THUMBNAIL_LIMIT};
