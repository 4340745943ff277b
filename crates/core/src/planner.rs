//! Viewport tile planner
//!
//! Converts the visible region (plus a preload margin) into a grid of tile
//! requests for every page it touches. Tiles already cached are promoted into
//! the current generation; everything else is handed to the caller for
//! rendering.

use crate::config::ViewerConfig;
use crate::viewport::Viewport;
use serde::Serialize;
use tileview_cache::TileCache;
use tileview_render::{RelativeBounds, RenderQuality, TileRequest};
use viewer_core::DocumentLayout;

/// Number of tile rows and columns covering one page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct GridSize {
    pub rows: u32,
    pub cols: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct GridCell {
    pub row: u32,
    pub col: u32,
}

/// Cells of one page that intersect the scroll window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RenderRange {
    pub page: usize,
    pub grid: GridSize,
    /// Top-left cell, inclusive
    pub leading: GridCell,
    /// Bottom-right cell, inclusive
    pub trailing: GridCell,
}

impl RenderRange {
    /// Cells in row-major order.
    pub fn cells(&self) -> impl Iterator<Item = GridCell> + '_ {
        (self.leading.row..=self.trailing.row)
            .flat_map(move |row| (self.leading.col..=self.trailing.col).map(move |col| GridCell { row, col }))
    }
}

/// Outcome of one planning pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct PlanSummary {
    pub first_page: usize,
    pub last_page: usize,
    /// Tiles submitted for rendering
    pub requested: usize,
    /// Tiles found in the cache
    pub cache_hits: usize,
    pub thumbnails_requested: usize,
}

/// Plans tile requests for a viewport.
#[derive(Debug, Clone, PartialEq)]
pub struct ViewportTilePlanner {
    part_size: f32,
    thumbnail_ratio: f32,
    cache_limit: usize,
    preload: f32,
    quality: RenderQuality,
}

impl ViewportTilePlanner {
    pub fn new(config: &ViewerConfig) -> Self {
        Self {
            part_size: config.part_size,
            thumbnail_ratio: config.thumbnail_ratio,
            cache_limit: config.cache_limit,
            preload: config.preload_px(),
            quality: config.quality(),
        }
    }

    pub fn quality(&self) -> RenderQuality {
        self.quality
    }

    /// Tile grid of `page` at `zoom`; `None` for degenerate pages.
    pub fn grid_size(&self, layout: &DocumentLayout, page: usize, zoom: f32) -> Option<GridSize> {
        let size = layout.scaled_size_at(page, zoom);
        if size.is_empty() {
            return None;
        }
        let rows = (size.height / self.part_size).ceil() as u32;
        let cols = (size.width / self.part_size).ceil() as u32;
        (rows > 0 && cols > 0).then_some(GridSize { rows, cols })
    }

    /// First and last page touched by the scroll window.
    pub fn page_range(&self, layout: &DocumentLayout, viewport: &Viewport) -> Option<(usize, usize)> {
        if layout.page_count() == 0 {
            return None;
        }
        let window = self.windows(layout, viewport);
        Some((
            layout.page_at_offset(window.along.0, viewport.zoom),
            layout.page_at_offset(window.along.1, viewport.zoom),
        ))
    }

    /// Visible cell ranges, one per non-degenerate page in the window.
    pub fn render_ranges(&self, layout: &DocumentLayout, viewport: &Viewport) -> Vec<RenderRange> {
        let Some((first_page, last_page)) = self.page_range(layout, viewport) else {
            return Vec::new();
        };
        let window = self.windows(layout, viewport);
        let axis = layout.axis();
        let zoom = viewport.zoom;

        let mut ranges = Vec::with_capacity(last_page - first_page + 1);
        for page in first_page..=last_page {
            let Some(grid) = self.grid_size(layout, page, zoom) else {
                continue;
            };
            let page_offset = layout.offset_of(page, zoom);
            let secondary = layout.secondary_offset_of(page, zoom);
            let start = if page == first_page { window.along.0 } else { page_offset };
            let end = if page == last_page {
                window.along.1
            } else {
                page_offset + layout.length_of(page, zoom)
            };

            let size = layout.scaled_size_at(page, zoom);
            let (along_cells, cross_cells) = if axis.is_vertical() {
                (grid.rows, grid.cols)
            } else {
                (grid.cols, grid.rows)
            };
            let along_cell = axis.along(size) / along_cells as f32;
            let cross_cell = axis.across(size) / cross_cells as f32;

            let lead_along = clamp_cell(((start - page_offset).max(0.0) / along_cell).floor(), along_cells);
            let trail_along = clamp_cell(((end - page_offset) / along_cell).ceil(), along_cells);
            let lead_cross = clamp_cell(((window.cross.0 - secondary).max(0.0) / cross_cell).floor(), cross_cells);
            let trail_cross = clamp_cell(((window.cross.1 - secondary).max(0.0) / cross_cell).floor(), cross_cells);

            let (leading, trailing) = if axis.is_vertical() {
                (GridCell { row: lead_along, col: lead_cross }, GridCell { row: trail_along, col: trail_cross })
            } else {
                (GridCell { row: lead_cross, col: lead_along }, GridCell { row: trail_cross, col: trail_along })
            };
            ranges.push(RenderRange { page, grid, leading, trailing });
        }
        ranges
    }

    /// Relative bounds and render size of one grid cell.
    ///
    /// Returns `None` for cells whose clipped size has no area.
    pub fn cell(&self, grid: GridSize, cell: GridCell) -> Option<(RelativeBounds, f32, f32)> {
        let left = cell.col as f32 / grid.cols as f32;
        let top = cell.row as f32 / grid.rows as f32;
        let mut width = 1.0 / grid.cols as f32;
        let mut height = 1.0 / grid.rows as f32;
        if left + width > 1.0 {
            width = 1.0 - left;
        }
        if top + height > 1.0 {
            height = 1.0 - top;
        }

        let render_width = self.part_size * grid.cols as f32 * width;
        let render_height = self.part_size * grid.rows as f32 * height;
        if render_width <= 0.0 || render_height <= 0.0 {
            return None;
        }
        Some((RelativeBounds::new(left, top, left + width, top + height), render_width, render_height))
    }

    /// Runs one planning pass.
    ///
    /// Thumbnails for every page in the window are requested first. Cells are
    /// then visited row-major with a priority counter starting at 1; cached
    /// cells are promoted, missing ones passed to `submit`. The pass stops
    /// after `cache_limit` cells.
    ///
    /// # Arguments
    /// * `layout` - current document layout
    /// * `viewport` - scroll offsets, zoom and size
    /// * `cache` - tile cache used for promotion and thumbnail lookups
    /// * `submit` - receives every request that needs rendering
    pub fn plan_and_request(
        &self,
        layout: &DocumentLayout,
        viewport: &Viewport,
        cache: &TileCache,
        mut submit: impl FnMut(TileRequest),
    ) -> PlanSummary {
        let Some((first_page, last_page)) = self.page_range(layout, viewport) else {
            return PlanSummary::default();
        };
        let ranges = self.render_ranges(layout, viewport);
        let mut summary = PlanSummary { first_page, last_page, ..PlanSummary::default() };

        for range in &ranges {
            let page = range.page as u32;
            if cache.contains_thumbnail(page, RelativeBounds::FULL) {
                continue;
            }
            let size = layout.scaled_size(range.page).scale(self.thumbnail_ratio);
            let request = TileRequest::thumbnail(page, size.width, size.height, self.quality);
            if !request.is_degenerate() {
                submit(request);
                summary.thumbnails_requested += 1;
            }
        }

        let mut priority = 1u32;
        let mut loaded = 0usize;
        'pages: for range in &ranges {
            let page = range.page as u32;
            for cell in range.cells() {
                if loaded >= self.cache_limit {
                    break 'pages;
                }
                let Some((bounds, width, height)) = self.cell(range.grid, cell) else {
                    continue;
                };
                if cache.try_promote(page, bounds, priority) {
                    summary.cache_hits += 1;
                } else {
                    submit(TileRequest::part(page, bounds, priority, width, height, self.quality));
                    summary.requested += 1;
                }
                priority += 1;
                loaded += 1;
            }
        }

        tracing::debug!(
            first_page,
            last_page,
            requested = summary.requested,
            cache_hits = summary.cache_hits,
            thumbnails = summary.thumbnails_requested,
            "planning pass"
        );
        summary
    }

    fn windows(&self, layout: &DocumentLayout, viewport: &Viewport) -> Windows {
        let x = scroll_window(viewport.offset_x, viewport.width as f32, self.preload);
        let y = scroll_window(viewport.offset_y, viewport.height as f32, self.preload);
        if layout.is_vertical() {
            Windows { along: y, cross: x }
        } else {
            Windows { along: x, cross: y }
        }
    }
}

/// Scroll windows along and across the scroll axis, in zoomed pixels.
struct Windows {
    along: (f32, f32),
    cross: (f32, f32),
}

/// Distance range covered by the viewport plus the preload margin.
fn scroll_window(offset: f32, view: f32, preload: f32) -> (f32, f32) {
    let distance = -offset.min(0.0);
    ((distance - preload).max(0.0), distance + view + preload)
}

fn clamp_cell(index: f32, cells: u32) -> u32 {
    if index > 0.0 {
        (index as u32).min(cells.saturating_sub(1))
    } else {
        0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};
    use std::sync::Arc;
    use tileview_render::{PixelBuffer, PixelFormat, RenderedTile};
    use viewer_core::{FitPolicy, LayoutOptions, ScrollAxis, Size};

    fn layout(pages: Vec<Size>, viewport: Size) -> DocumentLayout {
        DocumentLayout::new(pages, LayoutOptions::default(), viewport)
    }

    fn planner() -> ViewportTilePlanner {
        ViewportTilePlanner::new(&ViewerConfig::default())
    }

    fn collect(
        planner: &ViewportTilePlanner,
        layout: &DocumentLayout,
        viewport: &Viewport,
        cache: &TileCache,
    ) -> (PlanSummary, Vec<TileRequest>) {
        let mut requests = Vec::new();
        let summary = planner.plan_and_request(layout, viewport, cache, |request| requests.push(request));
        (summary, requests)
    }

    fn fill(cache: &TileCache, requests: &[TileRequest]) {
        for request in requests {
            let buffer = PixelBuffer::from_vec(1, 1, PixelFormat::Rgb8, vec![0; 3]).unwrap();
            let tile = Arc::new(RenderedTile::new(*request, buffer));
            if request.thumbnail {
                cache.upsert_thumbnail(tile);
            } else {
                cache.upsert_active(tile);
            }
        }
    }

    #[test]
    fn test_rows_for_tall_page() {
        let layout = layout(vec![Size::new(900, 1200)], Size::new(900, 1000));

        assert_eq!(planner().grid_size(&layout, 0, 1.0), Some(GridSize { rows: 4, cols: 3 }));
        assert_eq!(planner().grid_size(&layout, 0, 2.0), Some(GridSize { rows: 7, cols: 5 }));
    }

    #[test]
    fn test_first_page_starts_at_origin() {
        let layout = layout(vec![Size::new(600, 800); 3], Size::new(300, 500));

        for viewport in [
            Viewport::new(300, 500),
            Viewport::new(300, 500).with_offset(0.0, 40.0),
            Viewport::new(300, 500).with_offset(12.0, -0.25),
            Viewport::new(300, 500).with_zoom(3.0),
        ] {
            let ranges = planner().render_ranges(&layout, &viewport);
            assert_eq!(ranges[0].page, 0);
            assert_eq!(ranges[0].leading, GridCell { row: 0, col: 0 }, "{viewport:?}");
        }
    }

    #[test]
    fn test_plan_requests_thumbnails_then_cells_row_major() {
        let layout = layout(vec![Size::new(600, 800); 10], Size::new(300, 500));
        let viewport = Viewport::new(300, 500);

        let (summary, requests) = collect(&planner(), &layout, &viewport, &TileCache::default());

        assert_eq!((summary.first_page, summary.last_page), (0, 1));
        assert_eq!(summary.thumbnails_requested, 2);
        assert_eq!(summary.requested, 4);
        assert_eq!(summary.cache_hits, 0);

        assert!(requests[0].thumbnail && requests[1].thumbnail);
        assert!((requests[0].width - 180.0).abs() < 1e-3);
        assert!((requests[0].height - 240.0).abs() < 1e-3);
        assert_eq!(requests[0].priority, 0);

        let parts: Vec<(u32, f32, u32)> =
            requests[2..].iter().map(|r| (r.page, r.bounds.top, r.priority)).collect();
        assert_eq!(parts, vec![(0, 0.0, 1), (0, 0.5, 2), (1, 0.0, 3), (1, 0.5, 4)]);
        assert!(requests[2..].iter().all(|r| r.width == 384.0 && r.height == 384.0));
    }

    #[test]
    fn test_second_pass_promotes_cached_tiles() {
        let layout = layout(vec![Size::new(600, 800); 10], Size::new(300, 500));
        let viewport = Viewport::new(300, 500);
        let cache = TileCache::default();
        let planner = planner();

        let (_, requests) = collect(&planner, &layout, &viewport, &cache);
        fill(&cache, &requests);
        cache.begin_new_pass();

        let (summary, again) = collect(&planner, &layout, &viewport, &cache);
        assert!(again.is_empty());
        assert_eq!(summary.cache_hits, 4);
        assert_eq!(summary.thumbnails_requested, 0);
        assert_eq!(cache.stats().active, 4);
        assert_eq!(cache.stats().passive, 0);
    }

    #[test]
    fn test_pass_stops_at_cache_limit() {
        let layout = layout(vec![Size::new(600, 800); 10], Size::new(300, 500));
        let planner = ViewportTilePlanner::new(&ViewerConfig::default().with_cache_limit(3));

        let (summary, requests) = collect(&planner, &layout, &Viewport::new(300, 500), &TileCache::default());

        assert_eq!(summary.requested, 3);
        assert_eq!(requests.iter().filter(|r| !r.thumbnail).count(), 3);
    }

    #[test]
    fn test_scrolled_zoomed_window() {
        let layout = layout(vec![Size::new(600, 800)], Size::new(300, 500));
        let viewport = Viewport::new(300, 500).with_zoom(3.0).with_offset(-300.0, -600.0);

        let ranges = planner().render_ranges(&layout, &viewport);

        assert_eq!(ranges.len(), 1);
        assert_eq!(ranges[0].grid, GridSize { rows: 4, cols: 3 });
        assert_eq!(ranges[0].leading, GridCell { row: 1, col: 0 });
        assert_eq!(ranges[0].trailing, GridCell { row: 3, col: 2 });
        assert_eq!(ranges[0].cells().count(), 9);
    }

    #[test]
    fn test_degenerate_page_is_skipped() {
        let pages = vec![Size::new(600, 800), Size::new(0, 0), Size::new(600, 800)];
        let layout = layout(pages, Size::new(300, 1000));

        let (summary, requests) = collect(&planner(), &layout, &Viewport::new(300, 1000), &TileCache::default());

        assert_eq!((summary.first_page, summary.last_page), (0, 2));
        assert!(requests.iter().all(|r| r.page != 1));
        assert_eq!(summary.thumbnails_requested, 2);
    }

    #[test]
    fn test_horizontal_scrolling() {
        let options = LayoutOptions {
            axis: ScrollAxis::Horizontal,
            fit_policy: FitPolicy::Height,
            ..LayoutOptions::default()
        };
        let layout = DocumentLayout::new(vec![Size::new(600, 800); 6], options, Size::new(1000, 400));

        let ranges = planner().render_ranges(&layout, &Viewport::new(1000, 400));

        assert_eq!(ranges.len(), 4);
        assert_eq!(ranges[0].grid, GridSize { rows: 2, cols: 1 });
        assert_eq!(ranges[0].leading, GridCell::default());
        assert_eq!(ranges[3].trailing, GridCell { row: 1, col: 0 });
    }

    #[test]
    fn test_duplicate_requests_not_resubmitted_while_cached() {
        let layout = layout(vec![Size::new(600, 800); 4], Size::new(300, 500));
        let cache = TileCache::default();
        let planner = planner();
        let viewport = Viewport::new(300, 500);

        let (_, first) = collect(&planner, &layout, &viewport, &cache);
        fill(&cache, &first);
        let (_, second) = collect(&planner, &layout, &viewport.with_offset(0.0, -10.0), &cache);

        for request in &second {
            assert!(!first.iter().any(|old| old == request), "{request:?} submitted twice");
        }
    }

    #[test]
    fn test_full_grid_covers_page() {
        let mut rng = StdRng::seed_from_u64(3);
        let planner = planner();

        for _ in 0..50 {
            let grid = GridSize { rows: rng.gen_range(1..20), cols: rng.gen_range(1..20) };
            let mut area = 0.0f64;
            for row in 0..grid.rows {
                for col in 0..grid.cols {
                    let (bounds, _, _) = planner.cell(grid, GridCell { row, col }).unwrap();
                    assert!(bounds.right <= 1.0 && bounds.bottom <= 1.0);
                    area += (bounds.width() * bounds.height()) as f64;

                    if col + 1 < grid.cols {
                        let (next, _, _) = planner.cell(grid, GridCell { row, col: col + 1 }).unwrap();
                        assert!((next.left - bounds.right).abs() < 1e-5);
                    } else {
                        assert!((1.0 - bounds.right).abs() < 1e-5);
                    }
                }
            }
            assert!((area - 1.0).abs() < 1e-4, "{grid:?} covers {area}");
        }
    }

    #[test]
    fn test_empty_document() {
        let layout = layout(Vec::new(), Size::new(300, 500));
        let (summary, requests) = collect(&planner(), &layout, &Viewport::new(300, 500), &TileCache::default());

        assert_eq!(summary, PlanSummary::default());
        assert!(requests.is_empty());
    }
}
