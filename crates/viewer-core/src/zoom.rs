use serde::{Deserialize, Serialize};

/// Zoom bounds and the double-tap cycle between them.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ZoomLevels {
    pub min: f32,
    pub mid: f32,
    pub max: f32,
}

impl Default for ZoomLevels {
    fn default() -> Self {
        Self { min: 1.0, mid: 1.75, max: 3.0 }
    }
}

impl ZoomLevels {
    pub fn new(min: f32, mid: f32, max: f32) -> Self {
        Self { min, mid, max }
    }

    pub fn clamp(&self, zoom: f32) -> f32 {
        zoom.clamp(self.min, self.max)
    }

    /// Zoom to use after a double tap at `zoom`.
    pub fn next_double_tap(&self, zoom: f32) -> f32 {
        if zoom < self.mid {
            self.mid
        } else if zoom < self.max {
            self.max
        } else {
            self.min
        }
    }
}
