//! Screen placement of cached tiles.
//!
//! Drawing code takes a [`CacheSnapshot`], maps every live tile onto the
//! screen with the current layout and viewport and paints the result:
//! thumbnails first as a low-resolution backdrop, then the full-resolution
//! parts on top.

use crate::viewport::Viewport;
use serde::Serialize;
use std::sync::Arc;
use tileview_cache::CacheSnapshot;
use tileview_render::RenderedTile;
use viewer_core::DocumentLayout;

/// Destination rectangle in viewport pixels.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct ScreenRect {
    pub left: f32,
    pub top: f32,
    pub right: f32,
    pub bottom: f32,
}

impl ScreenRect {
    pub fn width(&self) -> f32 {
        self.right - self.left
    }

    pub fn height(&self) -> f32 {
        self.bottom - self.top
    }
}

/// A tile together with where it lands on screen.
#[derive(Debug, Clone)]
pub struct TilePlacement {
    pub tile: Arc<RenderedTile>,
    pub rect: ScreenRect,
}

/// Places one tile, or returns `None` when it is released, belongs to a
/// page that is not laid out, or falls completely outside the viewport.
pub fn place_tile(layout: &DocumentLayout, viewport: &Viewport, tile: &RenderedTile) -> Option<ScreenRect> {
    let page = tile.page() as usize;
    if tile.is_released() || layout.is_degenerate(page) {
        return None;
    }

    let zoom = viewport.zoom;
    let size = layout.scaled_size_at(page, zoom);
    let along = layout.offset_of(page, zoom);
    let across = layout.secondary_offset_of(page, zoom);
    let (tx, ty) = if layout.is_vertical() { (across, along) } else { (along, across) };

    let x = viewport.offset_x + tx;
    let y = viewport.offset_y + ty;
    let bounds = tile.bounds();
    let rect = ScreenRect {
        left: x + bounds.left * size.width,
        top: y + bounds.top * size.height,
        right: x + bounds.right * size.width,
        bottom: y + bounds.bottom * size.height,
    };

    let (width, height) = (viewport.width as f32, viewport.height as f32);
    if rect.left >= width || rect.right <= 0.0 || rect.top >= height || rect.bottom <= 0.0 {
        return None;
    }
    Some(rect)
}

/// Places every visible tile of a snapshot in drawing order.
pub fn place_tiles(layout: &DocumentLayout, viewport: &Viewport, snapshot: &CacheSnapshot) -> Vec<TilePlacement> {
    snapshot
        .thumbnails
        .iter()
        .chain(snapshot.tiles.iter())
        .filter_map(|tile| {
            place_tile(layout, viewport, tile).map(|rect| TilePlacement { tile: tile.clone(), rect })
        })
        .collect()
}
