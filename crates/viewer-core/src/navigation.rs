//! Scroll navigation helpers.
//!
//! Offsets follow the content-translation model: the current offset is the
//! translation applied to the document, so it is `<= 0` once scrolled.

use crate::geometry::{ScrollAxis, Size};
use crate::layout::DocumentLayout;

/// Edge of a page to snap to after a fling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SnapEdge {
    Start,
    Center,
    End,
    None,
}

fn view_length(axis: ScrollAxis, viewport: Size) -> f32 {
    axis.along(viewport.to_f32())
}

/// Page currently in focus.
///
/// 0 at the very start, the last page at the very end, otherwise the page at
/// the centre of the viewport.
pub fn focus_page(layout: &DocumentLayout, offset_x: f32, offset_y: f32, zoom: f32, viewport: Size) -> usize {
    let axis = layout.axis();
    let offset = axis.pick(offset_x, offset_y);
    let length = view_length(axis, viewport);

    if offset > -1.0 {
        0
    } else if offset < -layout.document_length(zoom) + length + 1.0 {
        layout.page_count().saturating_sub(1)
    } else {
        layout.page_at_offset(-(offset - length / 2.0), zoom)
    }
}

/// Edge of `page` the view should snap to from the current `offset`.
pub fn snap_edge(layout: &DocumentLayout, page: usize, offset: f32, zoom: f32, viewport: Size) -> SnapEdge {
    let length = view_length(layout.axis(), viewport);
    let page_start = -layout.offset_of(page, zoom);
    let page_length = layout.length_of(page, zoom);

    if length >= page_length {
        SnapEdge::Center
    } else if offset >= page_start {
        SnapEdge::Start
    } else if page_start - page_length > offset - length {
        SnapEdge::End
    } else {
        SnapEdge::None
    }
}

/// Scroll distance that puts `edge` of `page` at the matching viewport edge.
pub fn snap_offset(layout: &DocumentLayout, page: usize, edge: SnapEdge, zoom: f32, viewport: Size) -> f32 {
    let length = view_length(layout.axis(), viewport);
    let offset = layout.offset_of(page, zoom);
    let page_length = layout.length_of(page, zoom);

    match edge {
        SnapEdge::Center => offset - length / 2.0 + page_length / 2.0,
        SnapEdge::End => offset - length + page_length,
        SnapEdge::Start | SnapEdge::None => offset,
    }
}

/// Scroll progress in `0..=1`; 0 when the whole document fits.
pub fn position_offset(layout: &DocumentLayout, offset: f32, zoom: f32, viewport: Size) -> f32 {
    let scrollable = layout.document_length(zoom) - view_length(layout.axis(), viewport);
    if scrollable <= 0.0 {
        return 0.0;
    }
    (-offset / scrollable).clamp(0.0, 1.0)
}

/// Page found at scroll progress `position`.
pub fn page_at_position_offset(layout: &DocumentLayout, position: f32, zoom: f32) -> usize {
    layout.page_at_offset(layout.document_length(zoom) * position, zoom)
}

/// Clamps a requested translation so content stays on screen.
///
/// Content smaller than the viewport is centred on that axis.
pub fn clamp_offsets(layout: &DocumentLayout, x: f32, y: f32, zoom: f32, viewport: Size) -> (f32, f32) {
    let view = viewport.to_f32();
    let (content_width, content_height) = if layout.is_vertical() {
        (layout.max_page_width(zoom), layout.document_length(zoom))
    } else {
        (layout.document_length(zoom), layout.max_page_height(zoom))
    };
    (
        clamp_axis(x, content_width, view.width),
        clamp_axis(y, content_height, view.height),
    )
}

fn clamp_axis(offset: f32, content: f32, view: f32) -> f32 {
    if content < view {
        (view - content) / 2.0
    } else if offset > 0.0 {
        0.0
    } else if offset + content < view {
        view - content
    } else {
        offset
    }
}

/// Translation that brings the start of `page` to the top of the viewport.
pub fn jump_offset(layout: &DocumentLayout, page: usize, zoom: f32) -> f32 {
    let offset = if page == 0 { 0.0 } else { -layout.offset_of(page, zoom) };
    offset + layout.spacing_of(page, zoom) / 2.0
}

pub fn document_fits_view(layout: &DocumentLayout, zoom: f32, viewport: Size) -> bool {
    layout.document_length(zoom) < view_length(layout.axis(), viewport)
}

/// True when `page` covers the whole viewport along the scroll axis.
pub fn page_fills_screen(layout: &DocumentLayout, page: usize, offset: f32, zoom: f32, viewport: Size) -> bool {
    let start = -layout.offset_of(page, zoom);
    let end = start - layout.length_of(page, zoom);
    start > offset && end < offset - view_length(layout.axis(), viewport)
}
