//! Page layout for a continuously scrolled document.
//!
//! Turns native page sizes, a fit policy and the viewport size into unzoomed
//! page geometry, and answers the offset queries the tile planner and the
//! presentation layer need.

pub mod fit;
pub mod geometry;
pub mod layout;
pub mod navigation;
pub mod pages;
pub mod zoom;

pub use fit::{FitPolicy, PageSizeCalculator};
pub use geometry::{ScrollAxis, Size, SizeF};
pub use layout::{DocumentLayout, LayoutOptions, PageGeometry};
pub use navigation::SnapEdge;
pub use pages::{dedup_consecutive, group_indices, PageOrder};
pub use zoom::ZoomLevels;
