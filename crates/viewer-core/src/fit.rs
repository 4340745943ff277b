//! Fit policies: native page size to displayed size.

use crate::geometry::{Size, SizeF};
use serde::{Deserialize, Serialize};

/// Rule used to derive a page's displayed size from its native size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FitPolicy {
    /// Widest page matches the viewport width.
    #[default]
    Width,
    /// Tallest page matches the viewport height.
    Height,
    /// Whichever constraint binds first.
    Both,
}

/// Computes scaled page sizes sharing one zoom reference.
///
/// The ratios come from the widest and the tallest page of the document so
/// that every page is scaled by the same factor. With `fit_each_page` each
/// page is fitted to the viewport on its own instead.
#[derive(Debug, Clone, PartialEq)]
pub struct PageSizeCalculator {
    policy: FitPolicy,
    view: SizeF,
    fit_each_page: bool,
    width_ratio: f32,
    height_ratio: f32,
    optimal_max_width: SizeF,
    optimal_max_height: SizeF,
}

impl PageSizeCalculator {
    /// # Arguments
    /// * `policy` - fit policy
    /// * `max_width_page` - native size of the widest page
    /// * `max_height_page` - native size of the tallest page
    /// * `view` - viewport size in pixels
    /// * `fit_each_page` - fit every page to the viewport independently
    pub fn new(
        policy: FitPolicy,
        max_width_page: Size,
        max_height_page: Size,
        view: Size,
        fit_each_page: bool,
    ) -> Self {
        let view = view.to_f32();
        let mut calculator = Self {
            policy,
            view,
            fit_each_page,
            width_ratio: 0.0,
            height_ratio: 0.0,
            optimal_max_width: SizeF::ZERO,
            optimal_max_height: SizeF::ZERO,
        };
        if !max_width_page.is_degenerate() && !max_height_page.is_degenerate() {
            calculator.calculate_max_pages(max_width_page, max_height_page);
        }
        calculator
    }

    /// Displayed size of the widest page.
    pub fn optimal_max_width(&self) -> SizeF {
        self.optimal_max_width
    }

    /// Displayed size of the tallest page.
    pub fn optimal_max_height(&self) -> SizeF {
        self.optimal_max_height
    }

    /// Displayed size of one page; zero for degenerate native sizes.
    pub fn calculate(&self, page: Size) -> SizeF {
        if page.is_degenerate() {
            return SizeF::ZERO;
        }
        let (max_width, max_height) = if self.fit_each_page {
            (self.view.width, self.view.height)
        } else {
            (page.width as f32 * self.width_ratio, page.height as f32 * self.height_ratio)
        };
        match self.policy {
            FitPolicy::Width => fit_width(page, max_width),
            FitPolicy::Height => fit_height(page, max_height),
            FitPolicy::Both => fit_both(page, max_width, max_height),
        }
    }

    fn calculate_max_pages(&mut self, widest: Size, tallest: Size) {
        match self.policy {
            FitPolicy::Width => {
                self.optimal_max_width = fit_width(widest, self.view.width);
                self.width_ratio = self.optimal_max_width.width / widest.width as f32;
                self.optimal_max_height = fit_width(tallest, tallest.width as f32 * self.width_ratio);
                self.height_ratio = self.optimal_max_height.height / tallest.height as f32;
            }
            FitPolicy::Height => {
                self.optimal_max_height = fit_height(tallest, self.view.height);
                self.height_ratio = self.optimal_max_height.height / tallest.height as f32;
                self.optimal_max_width = fit_height(widest, widest.height as f32 * self.height_ratio);
                self.width_ratio = self.optimal_max_width.width / widest.width as f32;
            }
            FitPolicy::Both => {
                let local_max_width = fit_both(widest, self.view.width, self.view.height);
                let local_width_ratio = local_max_width.width / widest.width as f32;
                self.optimal_max_height =
                    fit_both(tallest, tallest.width as f32 * local_width_ratio, self.view.height);
                self.height_ratio = self.optimal_max_height.height / tallest.height as f32;
                self.optimal_max_width =
                    fit_both(widest, self.view.width, widest.height as f32 * self.height_ratio);
                self.width_ratio = self.optimal_max_width.width / widest.width as f32;
            }
        }
    }
}

// Sizes are computed as `max * a / b` in f64 so exact ratios stay exact
// before flooring.
fn scaled(max: f32, numerator: i32, denominator: i32) -> f32 {
    (max as f64 * numerator as f64 / denominator as f64).floor() as f32
}

fn fit_width(page: Size, max_width: f32) -> SizeF {
    SizeF::new(max_width, scaled(max_width, page.height, page.width))
}

fn fit_height(page: Size, max_height: f32) -> SizeF {
    SizeF::new(scaled(max_height, page.width, page.height), max_height)
}

fn fit_both(page: Size, max_width: f32, max_height: f32) -> SizeF {
    let size = fit_width(page, max_width);
    if size.height > max_height {
        fit_height(page, max_height)
    } else {
        size
    }
}
