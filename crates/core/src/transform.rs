//! Coordinate transforms between canvas space and native page space.
//!
//! Two independent transforms compose here:
//!
//! - a quarter-turn rotation about the page origin matching the page's
//!   `/Rotate` metadata (no scaling; pass-through at rotation 0), and
//! - the vertical flip `y' = height - y` between the canvas orientation
//!   (origin top-left, y down) and native page space (origin bottom-left,
//!   y up), applied after the rotation when exporting and inverted before
//!   it when hydrating a sidecar.
//!
//! The quarter turns use exact match arms rather than trig so the
//! round-trip law holds bit-for-bit.

use crate::geometry::{CanvasPoint, CanvasRect};
use pagemark_engine::{PageRotation, PdfPoint, PdfRect};

fn rotate(x: f32, y: f32, rotation: PageRotation) -> (f32, f32) {
    match rotation {
        PageRotation::None => (x, y),
        PageRotation::Quarter => (-y, x),
        PageRotation::Half => (-x, -y),
        PageRotation::ThreeQuarter => (y, -x),
    }
}

fn inverse(rotation: PageRotation) -> PageRotation {
    match rotation {
        PageRotation::None => PageRotation::None,
        PageRotation::Quarter => PageRotation::ThreeQuarter,
        PageRotation::Half => PageRotation::Half,
        PageRotation::ThreeQuarter => PageRotation::Quarter,
    }
}

/// Page space -> canvas space (forward rotation).
pub fn to_canvas_space(point: PdfPoint, rotation: PageRotation) -> CanvasPoint {
    let (x, y) = rotate(point.x, point.y, rotation);
    CanvasPoint::new(x, y)
}

/// Canvas space -> page space (inverse rotation).
pub fn to_page_space(point: CanvasPoint, rotation: PageRotation) -> PdfPoint {
    let (x, y) = rotate(point.x, point.y, inverse(rotation));
    PdfPoint::new(x, y)
}

/// The export flip `y' = height - y`. Its own inverse for a fixed height.
pub fn to_export_space(point: PdfPoint, page_height: f32) -> PdfPoint {
    PdfPoint::new(point.x, page_height - point.y)
}

/// Inverse of [`to_export_space`], named for the hydration direction.
pub fn from_export_space(point: PdfPoint, page_height: f32) -> PdfPoint {
    to_export_space(point, page_height)
}

/// Rotates both corners into page space and re-normalizes.
///
/// A rectangle that collapses to zero width or height under the transform is
/// returned as-is; dropping degenerate shapes is a creation-time rule only.
pub fn rect_to_page_space(rect: CanvasRect, rotation: PageRotation) -> PdfRect {
    let a = to_page_space(CanvasPoint::new(rect.x0, rect.y0), rotation);
    let b = to_page_space(CanvasPoint::new(rect.x1, rect.y1), rotation);
    PdfRect::new(a.x.min(b.x), a.y.min(b.y), a.x.max(b.x), a.y.max(b.y))
}

/// Rotates both corners into canvas space and re-normalizes.
pub fn rect_to_canvas_space(rect: PdfRect, rotation: PageRotation) -> CanvasRect {
    let a = to_canvas_space(PdfPoint::new(rect.x0, rect.y0), rotation);
    let b = to_canvas_space(PdfPoint::new(rect.x1, rect.y1), rotation);
    CanvasRect::new(a.x.min(b.x), a.y.min(b.y), a.x.max(b.x), a.y.max(b.y))
}

/// Flips a page-space rectangle into export orientation, keeping it
/// normalized: the low y edge maps from the high one and vice versa.
pub fn rect_to_export_space(rect: PdfRect, page_height: f32) -> PdfRect {
    PdfRect::new(rect.x0, page_height - rect.y1, rect.x1, page_height - rect.y0)
}

/// Inverse of [`rect_to_export_space`]; the flip is an involution.
pub fn rect_from_export_space(rect: PdfRect, page_height: f32) -> PdfRect {
    rect_to_export_space(rect, page_height)
}
