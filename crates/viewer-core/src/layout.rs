//! Document layout
//!
//! Stores unzoomed page geometry along the scroll axis. Every query takes a
//! zoom factor and multiplies at read time; zoom is never baked into the
//! stored values.

use crate::fit::{FitPolicy, PageSizeCalculator};
use crate::geometry::{ScrollAxis, Size, SizeF};
use crate::pages::PageOrder;
use serde::{Deserialize, Serialize};

/// Layout switches that do not change with the viewport.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LayoutOptions {
    pub fit_policy: FitPolicy,
    /// Fit every page to the viewport independently.
    pub fit_each_page: bool,
    /// Give each page its own slot of at least one viewport length.
    pub auto_spacing: bool,
    /// Gap between pages in pixels
    pub spacing: f32,
    pub axis: ScrollAxis,
}

impl Default for LayoutOptions {
    fn default() -> Self {
        Self {
            fit_policy: FitPolicy::Width,
            fit_each_page: false,
            auto_spacing: false,
            spacing: 0.0,
            axis: ScrollAxis::Vertical,
        }
    }
}

/// Geometry of one displayed page, unzoomed.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PageGeometry {
    pub original_size: Size,
    pub scaled_size: SizeF,
    /// Start of the page along the scroll axis
    pub offset: f32,
    /// Spacing attributed to this page (auto-spacing mode only)
    pub spacing: f32,
}

impl PageGeometry {
    pub fn is_degenerate(&self) -> bool {
        self.scaled_size.is_empty()
    }
}

/// Page geometry of a whole document for one viewport size.
///
/// # Example
///
/// ```
/// use viewer_core::{DocumentLayout, LayoutOptions, Size};
///
/// let pages = vec![Size::new(600, 800); 10];
/// let options = LayoutOptions { spacing: 10.0, ..LayoutOptions::default() };
/// let layout = DocumentLayout::new(pages, options, Size::new(300, 500));
///
/// assert_eq!(layout.length_of(3, 1.0), 400.0);
/// assert_eq!(layout.document_length(1.0), 10.0 * 400.0 + 9.0 * 10.0);
/// assert_eq!(layout.page_at_offset(850.0, 1.0), 2);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct DocumentLayout {
    options: LayoutOptions,
    viewport: Size,
    pages: Vec<PageGeometry>,
    document_pages: Vec<Option<u32>>,
    max_page_size: SizeF,
    document_length: f32,
}

impl DocumentLayout {
    /// Lays out pages with the given native sizes.
    ///
    /// # Arguments
    /// * `original_sizes` - native size of each displayed page, in display order
    /// * `options` - fit policy, spacing and scroll axis
    /// * `viewport` - viewport size in pixels
    pub fn new(original_sizes: Vec<Size>, options: LayoutOptions, viewport: Size) -> Self {
        let pages: Vec<PageGeometry> = original_sizes
            .into_iter()
            .map(|original_size| PageGeometry { original_size, ..PageGeometry::default() })
            .collect();
        let document_pages = (0..pages.len()).map(|page| u32::try_from(page).ok()).collect();
        let mut layout = Self {
            options,
            viewport,
            pages,
            document_pages,
            max_page_size: SizeF::ZERO,
            document_length: 0.0,
        };
        layout.recalculate(viewport);
        layout
    }

    /// Attaches the display-to-document mapping the sizes were resolved with.
    pub fn with_page_order(mut self, order: &PageOrder) -> Self {
        self.document_pages = order
            .resolve()
            .into_iter()
            .map(|page| page.and_then(|page| u32::try_from(page).ok()))
            .collect();
        self.document_pages.resize(self.pages.len(), None);
        self
    }

    /// Recomputes scaled sizes, spacing, offsets and document length.
    ///
    /// Idempotent; call after every viewport size change.
    pub fn recalculate(&mut self, viewport: Size) {
        self.viewport = viewport;

        let mut widest = Size::default();
        let mut tallest = Size::default();
        for page in &self.pages {
            if page.original_size.width > widest.width {
                widest = page.original_size;
            }
            if page.original_size.height > tallest.height {
                tallest = page.original_size;
            }
        }

        let calculator = PageSizeCalculator::new(
            self.options.fit_policy,
            widest,
            tallest,
            viewport,
            self.options.fit_each_page,
        );
        self.max_page_size = if self.is_vertical() {
            calculator.optimal_max_width()
        } else {
            calculator.optimal_max_height()
        };
        for page in &mut self.pages {
            page.scaled_size = calculator.calculate(page.original_size);
        }

        if self.options.auto_spacing {
            self.prepare_auto_spacing();
        } else {
            for page in &mut self.pages {
                page.spacing = 0.0;
            }
        }
        self.prepare_offsets();

        tracing::debug!(
            pages = self.pages.len(),
            document_length = self.document_length,
            viewport_width = viewport.width,
            viewport_height = viewport.height,
            "layout recalculated"
        );
    }

    fn contributing_range(&self) -> Option<(usize, usize)> {
        let first = self.pages.iter().position(|page| !page.is_degenerate())?;
        let last = self.pages.iter().rposition(|page| !page.is_degenerate())?;
        Some((first, last))
    }

    fn prepare_auto_spacing(&mut self) {
        let axis = self.options.axis;
        let view_length = axis.along(self.viewport.to_f32());
        let last = self.contributing_range().map(|(_, last)| last);

        for (index, page) in self.pages.iter_mut().enumerate() {
            if page.is_degenerate() {
                page.spacing = 0.0;
                continue;
            }
            let mut spacing = (view_length - axis.along(page.scaled_size)).max(0.0);
            if Some(index) != last {
                spacing += self.options.spacing;
            }
            page.spacing = spacing;
        }
    }

    fn prepare_offsets(&mut self) {
        let axis = self.options.axis;
        let gap = self.options.spacing;
        let auto = self.options.auto_spacing;
        let range = self.contributing_range();
        let mut offset = 0.0f32;
        let mut seen = false;

        for (index, page) in self.pages.iter_mut().enumerate() {
            if page.is_degenerate() {
                page.offset = offset;
                continue;
            }
            let length = axis.along(page.scaled_size);
            if auto {
                offset += page.spacing / 2.0;
                match range {
                    Some((first, _)) if index == first => offset -= gap / 2.0,
                    Some((_, last)) if index == last => offset += gap / 2.0,
                    _ => {}
                }
                page.offset = offset;
                offset += length + page.spacing / 2.0;
            } else {
                if seen {
                    offset += gap;
                }
                page.offset = offset;
                offset += length;
            }
            seen = true;
        }

        self.document_length = if auto {
            self.pages.iter().map(|page| axis.along(page.scaled_size) + page.spacing).sum()
        } else {
            offset
        };
    }

    pub fn options(&self) -> &LayoutOptions {
        &self.options
    }

    pub fn viewport(&self) -> Size {
        self.viewport
    }

    pub fn axis(&self) -> ScrollAxis {
        self.options.axis
    }

    pub fn is_vertical(&self) -> bool {
        self.options.axis.is_vertical()
    }

    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    pub fn pages(&self) -> &[PageGeometry] {
        &self.pages
    }

    pub fn page(&self, page: usize) -> Option<&PageGeometry> {
        self.pages.get(page)
    }

    /// Document page shown at display index `page`.
    pub fn document_page(&self, page: usize) -> Option<u32> {
        self.document_pages.get(page).copied().flatten()
    }

    /// True for pages with a zero scaled size (and out-of-range indices).
    pub fn is_degenerate(&self, page: usize) -> bool {
        self.pages.get(page).map_or(true, PageGeometry::is_degenerate)
    }

    pub fn original_size(&self, page: usize) -> Size {
        self.pages.get(page).map(|p| p.original_size).unwrap_or_default()
    }

    /// Unzoomed displayed size; zero for unknown pages.
    pub fn scaled_size(&self, page: usize) -> SizeF {
        self.pages.get(page).map(|p| p.scaled_size).unwrap_or_default()
    }

    pub fn scaled_size_at(&self, page: usize, zoom: f32) -> SizeF {
        self.scaled_size(page).scale(zoom)
    }

    /// Start of `page` along the scroll axis.
    pub fn offset_of(&self, page: usize, zoom: f32) -> f32 {
        self.pages.get(page).map_or(0.0, |p| p.offset * zoom)
    }

    /// Extent of `page` along the scroll axis.
    pub fn length_of(&self, page: usize, zoom: f32) -> f32 {
        self.options.axis.along(self.scaled_size(page)) * zoom
    }

    /// Spacing used when locating `page`: its own auto spacing, or the fixed gap.
    pub fn spacing_of(&self, page: usize, zoom: f32) -> f32 {
        let spacing = if self.options.auto_spacing {
            self.pages.get(page).map_or(0.0, |p| p.spacing)
        } else {
            self.options.spacing
        };
        spacing * zoom
    }

    /// Cross-axis offset that centres `page` against the widest (or tallest) page.
    pub fn secondary_offset_of(&self, page: usize, zoom: f32) -> f32 {
        let axis = self.options.axis;
        zoom * (axis.across(self.max_page_size) - axis.across(self.scaled_size(page))) / 2.0
    }

    pub fn document_length(&self, zoom: f32) -> f32 {
        self.document_length * zoom
    }

    /// Displayed size of the page that defines the cross-axis extent.
    pub fn max_page_size(&self) -> SizeF {
        self.max_page_size
    }

    pub fn max_page_width(&self, zoom: f32) -> f32 {
        self.max_page_size.width * zoom
    }

    pub fn max_page_height(&self, zoom: f32) -> f32 {
        self.max_page_size.height * zoom
    }

    /// Page found at `offset` along the scroll axis.
    ///
    /// Returns the last non-degenerate page whose start minus half its
    /// spacing is at or before `offset`; 0 before the first page.
    pub fn page_at_offset(&self, offset: f32, zoom: f32) -> usize {
        let mut current = 0;
        for (index, page) in self.pages.iter().enumerate() {
            if page.is_degenerate() {
                continue;
            }
            let start = page.offset * zoom - self.spacing_of(index, zoom) / 2.0;
            if start > offset {
                break;
            }
            current = index;
        }
        current
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn uniform(count: usize, spacing: f32) -> DocumentLayout {
        let options = LayoutOptions { spacing, ..LayoutOptions::default() };
        DocumentLayout::new(vec![Size::new(600, 800); count], options, Size::new(300, 500))
    }

    #[test]
    fn test_uniform_pages_fit_width() {
        let layout = uniform(10, 12.0);

        for page in layout.pages() {
            assert_eq!(page.scaled_size, SizeF::new(300.0, 400.0));
        }
        assert_eq!(layout.document_length(1.0), 10.0 * 400.0 + 9.0 * 12.0);
    }

    #[test]
    fn test_offsets_increase() {
        let layout = uniform(5, 8.0);

        assert_eq!(layout.offset_of(0, 1.0), 0.0);
        assert_eq!(layout.offset_of(1, 1.0), 408.0);
        assert_eq!(layout.offset_of(4, 1.0), 4.0 * 408.0);
        for pair in layout.pages().windows(2) {
            assert!(pair[1].offset > pair[0].offset);
        }
    }

    #[test]
    fn test_zoom_is_linear() {
        let pages = vec![Size::new(600, 800), Size::new(500, 500), Size::new(612, 792)];
        let options = LayoutOptions { spacing: 6.0, ..LayoutOptions::default() };
        let layout = DocumentLayout::new(pages, options, Size::new(400, 700));

        for page in 0..layout.page_count() {
            for zoom in [0.5f32, 1.0, 1.75, 3.0] {
                let offset = layout.offset_of(page, zoom);
                let length = layout.length_of(page, zoom);
                assert!((layout.offset_of(page, 2.0 * zoom) - 2.0 * offset).abs() < 1e-3);
                assert!((layout.length_of(page, 2.0 * zoom) - 2.0 * length).abs() < 1e-3);
            }
        }
    }

    #[test]
    fn test_random_layouts_are_linear_in_zoom() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..20 {
            let count = rng.gen_range(1..30);
            let pages = (0..count)
                .map(|_| Size::new(rng.gen_range(100..2000), rng.gen_range(100..2000)))
                .collect();
            let options = LayoutOptions {
                spacing: rng.gen_range(0..20) as f32,
                auto_spacing: rng.gen_bool(0.5),
                ..LayoutOptions::default()
            };
            let layout = DocumentLayout::new(pages, options, Size::new(800, 1000));
            let zoom: f32 = rng.gen_range(1.0..3.0);

            for page in 0..layout.page_count() {
                let expected = 2.0 * layout.offset_of(page, zoom);
                let tolerance = 1e-4 * expected.abs().max(1.0);
                assert!((layout.offset_of(page, 2.0 * zoom) - expected).abs() <= tolerance);
            }
        }
    }

    #[test]
    fn test_page_at_offset() {
        let layout = uniform(3, 10.0);
        // Page starts: 0, 410, 820. Boundaries sit half a gap earlier.

        assert_eq!(layout.page_at_offset(-100.0, 1.0), 0);
        assert_eq!(layout.page_at_offset(0.0, 1.0), 0);
        assert_eq!(layout.page_at_offset(404.0, 1.0), 0);
        assert_eq!(layout.page_at_offset(405.0, 1.0), 1);
        assert_eq!(layout.page_at_offset(830.0, 1.0), 2);
        assert_eq!(layout.page_at_offset(1e6, 1.0), 2);
        assert_eq!(layout.page_at_offset(830.0, 2.0), 1);
    }

    #[test]
    fn test_degenerate_page_excluded_from_length() {
        let pages = vec![Size::new(600, 800), Size::new(0, 0), Size::new(600, 800)];
        let options = LayoutOptions { spacing: 10.0, ..LayoutOptions::default() };
        let layout = DocumentLayout::new(pages, options, Size::new(300, 500));

        assert_eq!(layout.scaled_size(1), SizeF::ZERO);
        assert!(layout.is_degenerate(1));
        assert_eq!(layout.document_length(1.0), 400.0 + 10.0 + 400.0);
        assert_eq!(layout.offset_of(2, 1.0), 410.0);
        assert_eq!(layout.page_at_offset(400.0, 1.0), 0);
        assert_eq!(layout.page_at_offset(420.0, 1.0), 2);
    }

    #[test]
    fn test_single_zero_page() {
        let layout = DocumentLayout::new(vec![Size::new(0, 0)], LayoutOptions::default(), Size::new(300, 500));

        assert_eq!(layout.document_length(1.0), 0.0);
        assert_eq!(layout.page_at_offset(10.0, 1.0), 0);
    }

    #[test]
    fn test_recalculate_is_idempotent() {
        let mut layout = uniform(4, 5.0);
        let before = layout.clone();

        layout.recalculate(Size::new(300, 500));
        layout.recalculate(Size::new(300, 500));
        assert_eq!(layout, before);

        layout.recalculate(Size::new(600, 500));
        assert_eq!(layout.scaled_size(0), SizeF::new(600.0, 800.0));
    }

    #[test]
    fn test_auto_spacing_centres_pages() {
        let options = LayoutOptions { auto_spacing: true, spacing: 10.0, ..LayoutOptions::default() };
        let layout = DocumentLayout::new(vec![Size::new(600, 800); 3], options, Size::new(300, 500));

        // Each 400 px page sits in a 500 px slot; the gap is shared between neighbours.
        assert_eq!(layout.spacing_of(0, 1.0), 110.0);
        assert_eq!(layout.spacing_of(2, 1.0), 100.0);
        assert_eq!(layout.offset_of(0, 1.0), 50.0);
        assert_eq!(layout.offset_of(1, 1.0), 50.0 + 400.0 + 55.0 + 55.0);
        assert_eq!(layout.document_length(1.0), 3.0 * 400.0 + 110.0 + 110.0 + 100.0);
    }

    #[test]
    fn test_secondary_offset_centres_narrow_pages() {
        let pages = vec![Size::new(1000, 500), Size::new(500, 500)];
        let layout = DocumentLayout::new(pages, LayoutOptions::default(), Size::new(500, 800));

        assert_eq!(layout.secondary_offset_of(0, 1.0), 0.0);
        assert_eq!(layout.secondary_offset_of(1, 1.0), 125.0);
        assert_eq!(layout.secondary_offset_of(1, 2.0), 250.0);
    }

    #[test]
    fn test_document_page_follows_order() {
        let order = PageOrder::custom(vec![2, 0, 9], 3);
        let sizes = vec![Size::new(600, 800), Size::new(600, 800), Size::new(0, 0)];
        let layout = DocumentLayout::new(sizes, LayoutOptions::default(), Size::new(300, 500))
            .with_page_order(&order);

        assert_eq!(layout.document_page(0), Some(2));
        assert_eq!(layout.document_page(1), Some(0));
        assert_eq!(layout.document_page(2), None);
        assert_eq!(layout.document_page(3), None);
        assert_eq!(uniform(2, 0.0).document_page(1), Some(1));
    }

    #[test]
    fn test_horizontal_axis() {
        let options = LayoutOptions {
            axis: ScrollAxis::Horizontal,
            fit_policy: FitPolicy::Height,
            spacing: 4.0,
            ..LayoutOptions::default()
        };
        let layout = DocumentLayout::new(vec![Size::new(600, 800); 2], options, Size::new(1000, 400));

        assert_eq!(layout.length_of(0, 1.0), 300.0);
        assert_eq!(layout.offset_of(1, 1.0), 304.0);
        assert_eq!(layout.document_length(1.0), 604.0);
        assert_eq!(layout.max_page_height(1.0), 400.0);
    }
}
