//! Overlay rendering and hit-testing.
//!
//! Pure functions from a page's annotation sequence to drawable primitives.
//! A text label and its dashed bounding decoration share one [`OverlayId`]
//! so move and delete always act on the pair atomically; the id is the
//! annotation's index in the page sequence, recomputed on every render.

use crate::annotation::Annotation;
use crate::geometry::{CanvasPoint, CanvasRect};

/// Estimated advance width per character, as a fraction of the font size.
const TEXT_WIDTH_FACTOR: f32 = 0.6;
/// Line height as a fraction of the font size.
const TEXT_LINE_HEIGHT: f32 = 1.2;
/// Padding between a label and its dashed decoration box.
const TEXT_BOX_PADDING: f32 = 2.0;

/// Index of the backing annotation in its page sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OverlayId(pub usize);

#[derive(Debug, Clone, PartialEq)]
pub enum OverlayShape {
    /// Solid outlined rectangle (drawn rectangles and lines).
    Outline(CanvasRect),
    /// Dashed decoration box around a text label.
    TextBox(CanvasRect),
    /// The text label itself, anchored top-left.
    Label { anchor: CanvasPoint, content: String, size: u32 },
    /// Straight segment, used for the line draft preview.
    Segment { from: CanvasPoint, to: CanvasPoint },
}

#[derive(Debug, Clone, PartialEq)]
pub struct OverlayPrimitive {
    pub id: OverlayId,
    pub shape: OverlayShape,
    pub selected: bool,
}

/// Estimated rendered extent of a text label.
///
/// The estimate feeds both rendering and hit-testing so the decoration box
/// on screen and the region that accepts edit clicks are always the same.
pub fn text_extent(content: &str, x: f32, y: f32, size: u32) -> CanvasRect {
    let width = content.chars().count() as f32 * size as f32 * TEXT_WIDTH_FACTOR;
    let height = size as f32 * TEXT_LINE_HEIGHT;
    CanvasRect::new(x, y, x + width, y + height)
}

/// Canvas-space bounds used for hit-testing any annotation.
pub fn bounds(annotation: &Annotation) -> CanvasRect {
    if let Annotation::Text { content, x, y, size } = annotation {
        text_extent(content, *x, *y, *size).inflated(TEXT_BOX_PADDING)
    } else {
        annotation.outline_rect().unwrap_or_default()
    }
}

/// Renders one page's annotations, bottom of the z-order first.
pub fn render(annotations: &[Annotation], selected: Option<usize>) -> Vec<OverlayPrimitive> {
    let mut primitives = Vec::new();

    for (index, annotation) in annotations.iter().enumerate() {
        let id = OverlayId(index);
        let is_selected = selected == Some(index);

        match annotation {
            Annotation::Rect(_) | Annotation::Line { .. } => {
                if let Some(rect) = annotation.outline_rect() {
                    primitives.push(OverlayPrimitive {
                        id,
                        shape: OverlayShape::Outline(rect),
                        selected: is_selected,
                    });
                }
            }
            Annotation::Text { content, x, y, size } => {
                let extent = text_extent(content, *x, *y, *size);
                // Decoration first so it stacks beneath the label.
                primitives.push(OverlayPrimitive {
                    id,
                    shape: OverlayShape::TextBox(extent.inflated(TEXT_BOX_PADDING)),
                    selected: is_selected,
                });
                primitives.push(OverlayPrimitive {
                    id,
                    shape: OverlayShape::Label {
                        anchor: CanvasPoint::new(*x, *y),
                        content: content.clone(),
                        size: *size,
                    },
                    selected: is_selected,
                });
            }
        }
    }

    primitives
}

/// Topmost annotation whose bounds contain `at`, filtered by `pred`.
pub fn hit_test_where(
    annotations: &[Annotation],
    at: CanvasPoint,
    pred: impl Fn(&Annotation) -> bool,
) -> Option<usize> {
    annotations
        .iter()
        .enumerate()
        .rev()
        .find(|&(_, annotation)| pred(annotation) && bounds(annotation).contains(at))
        .map(|(index, _)| index)
}

/// Topmost annotation of any kind under the pointer.
pub fn hit_test(annotations: &[Annotation], at: CanvasPoint) -> Option<usize> {
    hit_test_where(annotations, at, |_| true)
}
