//! One aging bucket of the tile cache.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tileview_render::{RenderedTile, TileKey};

/// Ordering slot of a cached tile: priority first, insertion sequence second.
type Slot = (u32, u64);

/// Tiles ordered by ascending priority, with a key index for lookups.
#[derive(Default)]
pub(crate) struct Generation {
    order: BTreeMap<Slot, Arc<RenderedTile>>,
    index: HashMap<TileKey, Slot>,
}

impl Generation {
    pub(crate) fn len(&self) -> usize {
        self.order.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub(crate) fn contains(&self, key: &TileKey) -> bool {
        self.index.contains_key(key)
    }

    /// Inserts `tile` at `(priority, seq)` and returns the tile it displaced
    /// under the same key, if any.
    pub(crate) fn insert(&mut self, priority: u32, seq: u64, tile: Arc<RenderedTile>) -> Option<Arc<RenderedTile>> {
        let key = tile.key();
        let replaced = self.remove(&key);
        self.index.insert(key, (priority, seq));
        self.order.insert((priority, seq), tile);
        replaced
    }

    pub(crate) fn remove(&mut self, key: &TileKey) -> Option<Arc<RenderedTile>> {
        let slot = self.index.remove(key)?;
        self.order.remove(&slot)
    }

    /// Removes the tile with the lowest priority (oldest on ties).
    pub(crate) fn pop_oldest(&mut self) -> Option<Arc<RenderedTile>> {
        let (_, tile) = self.order.pop_first()?;
        self.index.remove(&tile.key());
        Some(tile)
    }

    /// Tiles in eviction order.
    pub(crate) fn tiles(&self) -> impl Iterator<Item = &Arc<RenderedTile>> {
        self.order.values()
    }

    /// Moves every tile of `other` into this generation, keeping their slots.
    ///
    /// Returns tiles displaced by a key already present here.
    pub(crate) fn absorb(&mut self, other: Generation) -> Vec<Arc<RenderedTile>> {
        let mut displaced = Vec::new();
        for ((priority, seq), tile) in other.order {
            displaced.extend(self.insert(priority, seq, tile));
        }
        displaced
    }

    /// Empties the generation, handing back every tile.
    pub(crate) fn drain(&mut self) -> Vec<Arc<RenderedTile>> {
        self.index.clear();
        std::mem::take(&mut self.order).into_values().collect()
    }
}
