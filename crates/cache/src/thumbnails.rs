//! FIFO-bounded thumbnail store.

use std::collections::VecDeque;
use std::sync::Arc;
use tileview_render::{RenderedTile, TileKey};

pub(crate) struct Thumbnails {
    tiles: VecDeque<Arc<RenderedTile>>,
    limit: usize,
    pub(crate) evictions: u64,
    pub(crate) releases: u64,
}

impl Thumbnails {
    pub(crate) fn new(limit: usize) -> Self {
        Self { tiles: VecDeque::with_capacity(limit), limit: limit.max(1), evictions: 0, releases: 0 }
    }

    pub(crate) fn len(&self) -> usize {
        self.tiles.len()
    }

    pub(crate) fn contains(&self, key: &TileKey) -> bool {
        self.tiles.iter().any(|tile| tile.key() == *key)
    }

    /// Appends `tile` unless an equal thumbnail is already stored.
    ///
    /// A suppressed duplicate is released. Returns whether the tile was stored.
    pub(crate) fn upsert(&mut self, tile: Arc<RenderedTile>) -> bool {
        if self.contains(&tile.key()) {
            tracing::trace!(page = tile.page(), "duplicate thumbnail released");
            self.release(&tile);
            return false;
        }
        while self.tiles.len() >= self.limit {
            let Some(oldest) = self.tiles.pop_front() else { break };
            tracing::trace!(page = oldest.page(), "thumbnail evicted");
            self.evictions += 1;
            self.release(&oldest);
        }
        self.tiles.push_back(tile);
        true
    }

    pub(crate) fn snapshot(&self) -> Vec<Arc<RenderedTile>> {
        self.tiles.iter().cloned().collect()
    }

    pub(crate) fn clear(&mut self) {
        for tile in std::mem::take(&mut self.tiles) {
            self.release(&tile);
        }
    }

    fn release(&mut self, tile: &RenderedTile) {
        if tile.release() {
            self.releases += 1;
        }
    }
}
