//! Generation-based tile cache
//!
//! Rendered tiles live in two aging buckets. The *active* generation holds
//! tiles requested or found during the current viewport pass; the *passive*
//! generation holds whatever the previous passes left behind. When the pair
//! is full, passive tiles are evicted first, lowest priority first.
//! Thumbnails are kept apart in a small FIFO store.

use crate::generation::Generation;
use crate::thumbnails::Thumbnails;
use parking_lot::Mutex;
use std::sync::Arc;
use tileview_render::{RelativeBounds, RenderedTile, TileKey};

/// Default bound on active plus passive tiles.
pub const DEFAULT_CACHE_LIMIT: usize = 150;

/// Default bound on stored thumbnails.
pub const DEFAULT_THUMBNAIL_LIMIT: usize = 10;

/// Statistics about cache usage
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Tiles in the current pass's generation
    pub active: usize,
    /// Tiles left over from earlier passes
    pub passive: usize,
    pub thumbnails: usize,
    /// Lookups that found a cached tile
    pub hits: u64,
    /// Lookups that found nothing
    pub misses: u64,
    /// Tiles dropped to respect a limit
    pub evictions: u64,
    /// Passive tiles moved back into the active generation
    pub promotions: u64,
    /// Pixel buffers released by the cache
    pub releases: u64,
}

impl CacheStats {
    /// Calculate the lookup hit rate (0.0 to 1.0)
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

/// Read-only copy of the cache contents for one drawing pass.
#[derive(Debug, Clone, Default)]
pub struct CacheSnapshot {
    pub thumbnails: Vec<Arc<RenderedTile>>,
    /// Passive tiles first, then active ones, each in priority order.
    pub tiles: Vec<Arc<RenderedTile>>,
}

impl CacheSnapshot {
    pub fn is_empty(&self) -> bool {
        self.thumbnails.is_empty() && self.tiles.is_empty()
    }
}

struct TileState {
    active: Generation,
    passive: Generation,
    limit: usize,
    next_seq: u64,
    hits: u64,
    misses: u64,
    evictions: u64,
    promotions: u64,
    releases: u64,
}

impl TileState {
    fn new(limit: usize) -> Self {
        Self {
            active: Generation::default(),
            passive: Generation::default(),
            limit: limit.max(1),
            next_seq: 0,
            hits: 0,
            misses: 0,
            evictions: 0,
            promotions: 0,
            releases: 0,
        }
    }

    fn seq(&mut self) -> u64 {
        let seq = self.next_seq;
        self.next_seq += 1;
        seq
    }

    fn total(&self) -> usize {
        self.active.len() + self.passive.len()
    }

    fn release(&mut self, tile: &RenderedTile) {
        if tile.release() {
            self.releases += 1;
        }
    }

    /// Evicts until one more tile fits.
    fn make_room(&mut self) {
        let mut evicted = 0usize;
        while self.total() >= self.limit {
            let (tile, generation) = match self.passive.pop_oldest() {
                Some(tile) => (tile, "passive"),
                None => match self.active.pop_oldest() {
                    Some(tile) => (tile, "active"),
                    None => break,
                },
            };
            tracing::trace!(page = tile.page(), generation, "tile evicted");
            self.release(&tile);
            evicted += 1;
        }
        if evicted > 0 {
            self.evictions += evicted as u64;
            tracing::debug!(evicted, active = self.active.len(), passive = self.passive.len(), "eviction sweep");
        }
    }
}

/// Bounded two-generation tile cache plus a thumbnail store.
///
/// The tile pair and the thumbnails are guarded by two independent locks that
/// are never held together. Every operation is infallible; a tile that cannot
/// be found is simply a miss.
///
/// # Example
///
/// ```
/// use std::sync::Arc;
/// use tileview_cache::TileCache;
/// use tileview_render::{PixelBuffer, PixelFormat, RelativeBounds, RenderQuality, RenderedTile, TileRequest};
///
/// let cache = TileCache::new(150, 10);
/// let bounds = RelativeBounds::new(0.0, 0.0, 0.5, 0.5);
/// let request = TileRequest::part(0, bounds, 1, 2.0, 2.0, RenderQuality::default());
/// let buffer = PixelBuffer::from_vec(2, 2, PixelFormat::Rgb8, vec![0; 12]).unwrap();
/// cache.upsert_active(Arc::new(RenderedTile::new(request, buffer)));
///
/// // Next viewport pass: the tile ages, then is found again and promoted.
/// cache.begin_new_pass();
/// assert!(cache.try_promote(0, bounds, 1));
/// assert_eq!(cache.stats().active, 1);
/// ```
pub struct TileCache {
    tiles: Mutex<TileState>,
    thumbnails: Mutex<Thumbnails>,
}

impl TileCache {
    /// Create a cache
    ///
    /// # Arguments
    ///
    /// * `limit` - Bound on active plus passive tiles (at least 1)
    /// * `thumbnail_limit` - Bound on stored thumbnails (at least 1)
    pub fn new(limit: usize, thumbnail_limit: usize) -> Self {
        Self {
            tiles: Mutex::new(TileState::new(limit)),
            thumbnails: Mutex::new(Thumbnails::new(thumbnail_limit)),
        }
    }

    /// Stores a tile in the active generation.
    ///
    /// Evicts passive tiles, then active ones, while the pair is full. A tile
    /// with the same key already cached in either generation is replaced and
    /// released.
    pub fn upsert_active(&self, tile: Arc<RenderedTile>) {
        let mut state = self.tiles.lock();
        let key = tile.key();
        let priority = tile.priority();

        let mut replaced: Vec<_> = state.active.remove(&key).into_iter().collect();
        replaced.extend(state.passive.remove(&key));
        for old in replaced {
            tracing::trace!(page = old.page(), "cached tile replaced");
            state.release(&old);
        }

        state.make_room();
        let seq = state.seq();
        state.active.insert(priority, seq, tile);
    }

    /// Ages every active tile into the passive generation.
    ///
    /// Call once per viewport pass, before planning the new pass.
    pub fn begin_new_pass(&self) {
        let mut state = self.tiles.lock();
        let active = std::mem::take(&mut state.active);
        for old in state.passive.absorb(active) {
            state.release(&old);
        }
    }

    /// Looks up the tile of `page` covering `bounds`.
    ///
    /// A passive match moves back to the active generation with
    /// `new_priority` and counts as found; otherwise reports whether the
    /// active generation already has it.
    pub fn try_promote(&self, page: u32, bounds: RelativeBounds, new_priority: u32) -> bool {
        let key = TileKey::new(page, bounds, false);
        let mut state = self.tiles.lock();

        if let Some(tile) = state.passive.remove(&key) {
            let seq = state.seq();
            tile.set_priority(new_priority);
            state.active.insert(new_priority, seq, tile);
            state.promotions += 1;
            state.hits += 1;
            return true;
        }
        if state.active.contains(&key) {
            state.hits += 1;
            true
        } else {
            state.misses += 1;
            false
        }
    }

    /// True if any generation holds the tile of `page` covering `bounds`.
    pub fn contains(&self, page: u32, bounds: RelativeBounds) -> bool {
        let key = TileKey::new(page, bounds, false);
        let state = self.tiles.lock();
        state.active.contains(&key) || state.passive.contains(&key)
    }

    /// Stores a thumbnail, oldest out first.
    ///
    /// An equal thumbnail already stored wins; the new one is released.
    /// Returns whether `tile` was stored.
    pub fn upsert_thumbnail(&self, tile: Arc<RenderedTile>) -> bool {
        self.thumbnails.lock().upsert(tile)
    }

    pub fn contains_thumbnail(&self, page: u32, bounds: RelativeBounds) -> bool {
        self.thumbnails.lock().contains(&TileKey::new(page, bounds, true))
    }

    /// Copies the cache contents for drawing.
    pub fn snapshot_all(&self) -> CacheSnapshot {
        let tiles = {
            let state = self.tiles.lock();
            state.passive.tiles().chain(state.active.tiles()).cloned().collect()
        };
        let thumbnails = self.thumbnails.lock().snapshot();
        CacheSnapshot { thumbnails, tiles }
    }

    /// Releases every cached tile and thumbnail.
    pub fn clear(&self) {
        {
            let mut state = self.tiles.lock();
            let mut tiles = state.active.drain();
            tiles.extend(state.passive.drain());
            for tile in tiles {
                state.release(&tile);
            }
        }
        self.thumbnails.lock().clear();
        tracing::debug!("tile cache cleared");
    }

    /// Number of cached tiles, thumbnails excluded.
    pub fn len(&self) -> usize {
        self.tiles.lock().total()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0 && self.thumbnails.lock().len() == 0
    }

    pub fn limit(&self) -> usize {
        self.tiles.lock().limit
    }

    /// Get current cache statistics
    pub fn stats(&self) -> CacheStats {
        let mut stats = {
            let state = self.tiles.lock();
            CacheStats {
                active: state.active.len(),
                passive: state.passive.len(),
                thumbnails: 0,
                hits: state.hits,
                misses: state.misses,
                evictions: state.evictions,
                promotions: state.promotions,
                releases: state.releases,
            }
        };
        let thumbnails = self.thumbnails.lock();
        stats.thumbnails = thumbnails.len();
        stats.evictions += thumbnails.evictions;
        stats.releases += thumbnails.releases;
        stats
    }
}

impl Default for TileCache {
    fn default() -> Self {
        Self::new(DEFAULT_CACHE_LIMIT, DEFAULT_THUMBNAIL_LIMIT)
    }
}
