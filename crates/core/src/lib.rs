//! Tileview Core Library
//!
//! Ties layout, tile cache and render scheduling together into a viewer
//! session.
//!
//! - [`ViewerConfig`]: cache, layout and quality settings (TOML and
//!   `TILEVIEW_*` environment variables)
//! - [`ViewportTilePlanner`]: decides which tiles a viewport needs
//! - [`TileViewer`]: one open document with its cache and render worker
//! - [`place_tiles`]: maps cached tiles onto the screen for drawing

pub mod config;
pub mod error;
pub mod placement;
pub mod planner;
pub mod presentation;
pub mod viewer;
pub mod viewport;

pub use config::{ConfigError, ViewerConfig};
pub use error::{ViewerError, ViewerResult};
pub use placement::{place_tile, place_tiles, ScreenRect, TilePlacement};
pub use planner::{GridCell, GridSize, PlanSummary, RenderRange, ViewportTilePlanner};
pub use presentation::Presentation;
pub use viewer::{TileViewer, ViewerStats};
pub use viewport::Viewport;
