use serde::{Deserialize, Serialize};
use viewer_core::Size;

/// Current scroll translation, zoom and size of the visible area.
///
/// Offsets are the translation applied to the content, so they are `<= 0`
/// once the user has scrolled.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Viewport {
    pub offset_x: f32,
    pub offset_y: f32,
    pub zoom: f32,
    pub width: i32,
    pub height: i32,
}

impl Viewport {
    /// An unscrolled viewport at zoom 1.
    pub fn new(width: i32, height: i32) -> Self {
        Self { offset_x: 0.0, offset_y: 0.0, zoom: 1.0, width, height }
    }

    pub fn with_offset(mut self, offset_x: f32, offset_y: f32) -> Self {
        self.offset_x = offset_x;
        self.offset_y = offset_y;
        self
    }

    pub fn with_zoom(mut self, zoom: f32) -> Self {
        self.zoom = zoom;
        self
    }

    pub fn size(&self) -> Size {
        Size::new(self.width, self.height)
    }
}
