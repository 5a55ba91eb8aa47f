//! Interactive editing session.
//!
//! Consumes discrete pointer gestures and modal-dialog results, owns the
//! [`AnnotationStore`] for the open document, and reports whether the overlay
//! needs redrawing. Drawing uses the primary button, selection and moving the
//! secondary button, double clicks open the edit dialogs.
//!
//! Dialog calls are synchronous suspension points: the surrounding framework
//! must not deliver further gesture events while a prompt is open, and a
//! cancelled prompt (`None`) always means "no change".

use crate::annotation::{Annotation, AnnotationStore, DEFAULT_FONT_SIZE};
use crate::geometry::{CanvasPoint, CanvasRect};
use crate::overlay::{self, OverlayShape};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrawMode {
    Rectangle,
    Line,
    Text,
}

impl DrawMode {
    /// Next mode in the toggle cycle.
    pub fn next(self) -> Self {
        match self {
            Self::Rectangle => Self::Line,
            Self::Line => Self::Text,
            Self::Text => Self::Rectangle,
        }
    }
}

impl Default for DrawMode {
    fn default() -> Self {
        Self::Rectangle
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointerButton {
    Primary,
    Secondary,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum GestureEvent {
    ButtonDown { button: PointerButton, at: CanvasPoint },
    Drag { button: PointerButton, at: CanvasPoint },
    ButtonUp { button: PointerButton, at: CanvasPoint },
    DoubleClick { button: PointerButton, at: CanvasPoint },
    /// The delete gesture; removes the hit item from display *and* store.
    DeleteAt { at: CanvasPoint },
}

/// Value collected by the text dialog.
#[derive(Debug, Clone, PartialEq)]
pub struct TextPrompt {
    pub content: String,
    pub size: u32,
}

impl Default for TextPrompt {
    fn default() -> Self {
        Self { content: String::new(), size: DEFAULT_FONT_SIZE }
    }
}

/// Modal dialogs supplied by the embedding UI.
///
/// Implementations block until the user dismisses the dialog and return
/// `None` on cancel.
pub trait SessionDialogs {
    /// Text content and font size; `initial` prefills the edit case.
    fn text_prompt(&mut self, initial: Option<&TextPrompt>) -> Option<TextPrompt>;
    /// Coordinate adjustment for a drawn rectangle.
    fn rect_prompt(&mut self, current: CanvasRect) -> Option<CanvasRect>;
}

/// In-progress shape shown during a draw gesture, before it is committed.
#[derive(Debug, Clone, Copy, PartialEq)]
enum DraftShape {
    Rect { anchor: CanvasPoint, cursor: CanvasPoint },
    Line { anchor: CanvasPoint, cursor: CanvasPoint },
}

impl DraftShape {
    fn drag_to(&mut self, at: CanvasPoint) {
        match self {
            Self::Rect { cursor, .. } => *cursor = at,
            // Lines are horizontal-only: the endpoint tracks the pointer x
            // but stays on the anchor's row.
            Self::Line { anchor, cursor } => *cursor = CanvasPoint::new(at.x, anchor.y),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
enum GestureState {
    #[default]
    Idle,
    Drawing(DraftShape),
    Selected {
        index: usize,
        last: CanvasPoint,
    },
    /// Live translation; `moved` is the working copy shown on screen.
    /// The store is only written when the gesture completes.
    Moving {
        index: usize,
        moved: Annotation,
        last: CanvasPoint,
    },
}

/// Edit state for one open document.
#[derive(Debug)]
pub struct EditorSession {
    page_count: usize,
    current_page: usize,
    mode: DrawMode,
    store: AnnotationStore,
    state: GestureState,
}

impl EditorSession {
    pub fn new(page_count: usize) -> Self {
        Self {
            page_count,
            current_page: 0,
            mode: DrawMode::Rectangle,
            store: AnnotationStore::new(page_count),
            state: GestureState::Idle,
        }
    }

    /// Resets everything for a newly opened document. The draw mode is
    /// deliberately kept across opens.
    pub fn open_document(&mut self, page_count: usize) {
        self.page_count = page_count;
        self.current_page = 0;
        self.store.reset_all(page_count);
        self.state = GestureState::Idle;
    }

    /// Replaces the store wholesale, e.g. after hydrating a sidecar.
    pub fn set_store(&mut self, store: AnnotationStore) {
        self.page_count = store.page_count();
        self.current_page = self.current_page.min(self.page_count.saturating_sub(1));
        self.store = store;
        self.state = GestureState::Idle;
    }

    pub fn store(&self) -> &AnnotationStore {
        &self.store
    }

    pub fn page_count(&self) -> usize {
        self.page_count
    }

    pub fn current_page(&self) -> usize {
        self.current_page
    }

    pub fn mode(&self) -> DrawMode {
        self.mode
    }

    /// Cycles rectangle -> line -> text; drops any in-progress gesture.
    pub fn toggle_mode(&mut self) -> DrawMode {
        self.state = GestureState::Idle;
        self.mode = self.mode.next();
        self.mode
    }

    pub fn next_page(&mut self) -> bool {
        if self.current_page + 1 < self.page_count {
            self.current_page += 1;
            self.state = GestureState::Idle;
            true
        } else {
            false
        }
    }

    pub fn prev_page(&mut self) -> bool {
        if self.current_page > 0 {
            self.current_page -= 1;
            self.state = GestureState::Idle;
            true
        } else {
            false
        }
    }

    pub fn go_to_page(&mut self, page: usize) -> bool {
        if page < self.page_count && page != self.current_page {
            self.current_page = page;
            self.state = GestureState::Idle;
            true
        } else {
            false
        }
    }

    /// Index of the visually selected annotation, if any.
    pub fn selection(&self) -> Option<usize> {
        match &self.state {
            GestureState::Selected { index, .. } | GestureState::Moving { index, .. } => {
                Some(*index)
            }
            _ => None,
        }
    }

    /// Draft primitive to draw on top of the overlay during a draw gesture.
    pub fn draft_shape(&self) -> Option<OverlayShape> {
        match &self.state {
            GestureState::Drawing(DraftShape::Rect { anchor, cursor }) => {
                Some(OverlayShape::Outline(CanvasRect::from_corners(*anchor, *cursor)))
            }
            GestureState::Drawing(DraftShape::Line { anchor, cursor }) => {
                Some(OverlayShape::Segment { from: *anchor, to: *cursor })
            }
            _ => None,
        }
    }

    /// Current page's annotations as displayed: during a move the working
    /// copy stands in for the stored entry at its index.
    pub fn display_annotations(&self) -> Vec<Annotation> {
        let mut annotations = self.store.list(self.current_page).to_vec();
        if let GestureState::Moving { index, moved, .. } = &self.state {
            annotations[*index] = moved.clone();
        }
        annotations
    }

    /// Feeds one gesture event through the state machine; returns whether
    /// the overlay must be redrawn.
    pub fn handle_event(&mut self, event: GestureEvent, dialogs: &mut dyn SessionDialogs) -> bool {
        match event {
            GestureEvent::ButtonDown { button: PointerButton::Primary, at } => {
                self.primary_down(at, dialogs)
            }
            GestureEvent::ButtonDown { button: PointerButton::Secondary, at } => {
                self.secondary_down(at)
            }
            GestureEvent::Drag { button: PointerButton::Primary, at } => {
                match &mut self.state {
                    GestureState::Drawing(draft) => {
                        draft.drag_to(at);
                        true
                    }
                    _ => false,
                }
            }
            GestureEvent::Drag { button: PointerButton::Secondary, at } => self.secondary_drag(at),
            GestureEvent::ButtonUp { button: PointerButton::Primary, at } => self.primary_up(at),
            GestureEvent::ButtonUp { button: PointerButton::Secondary, .. } => self.secondary_up(),
            GestureEvent::DoubleClick { button: PointerButton::Primary, at } => {
                self.edit_text_at(at, dialogs)
            }
            GestureEvent::DoubleClick { button: PointerButton::Secondary, at } => {
                self.edit_rect_at(at, dialogs)
            }
            GestureEvent::DeleteAt { at } => self.delete_at(at),
        }
    }

    fn primary_down(&mut self, at: CanvasPoint, dialogs: &mut dyn SessionDialogs) -> bool {
        if !matches!(self.state, GestureState::Idle) {
            return false;
        }
        match self.mode {
            DrawMode::Rectangle => {
                self.state = GestureState::Drawing(DraftShape::Rect { anchor: at, cursor: at });
                true
            }
            DrawMode::Line => {
                self.state = GestureState::Drawing(DraftShape::Line { anchor: at, cursor: at });
                true
            }
            DrawMode::Text => {
                let Some(prompt) = dialogs.text_prompt(None) else {
                    return false;
                };
                if prompt.content.is_empty() {
                    return false;
                }
                self.store.add(
                    self.current_page,
                    Annotation::text(prompt.content, at.x, at.y, prompt.size),
                );
                true
            }
        }
    }

    fn primary_up(&mut self, at: CanvasPoint) -> bool {
        let GestureState::Drawing(draft) = std::mem::take(&mut self.state) else {
            return false;
        };

        match draft {
            DraftShape::Rect { anchor, .. } => {
                let rect = CanvasRect::from_corners(anchor, at);
                if rect.is_degenerate() {
                    log::debug!("discarding degenerate rectangle draft");
                } else {
                    self.store.add(self.current_page, Annotation::Rect(rect));
                }
            }
            DraftShape::Line { anchor, .. } => {
                if at.x == anchor.x {
                    log::debug!("discarding zero-length line draft");
                } else {
                    self.store.add(self.current_page, Annotation::line(anchor.x, at.x, anchor.y));
                }
            }
        }

        // The draft disappears either way.
        true
    }

    fn secondary_down(&mut self, at: CanvasPoint) -> bool {
        if !matches!(self.state, GestureState::Idle) {
            return false;
        }
        match overlay::hit_test(self.store.list(self.current_page), at) {
            Some(index) => {
                self.state = GestureState::Selected { index, last: at };
                true
            }
            None => false,
        }
    }

    fn secondary_drag(&mut self, at: CanvasPoint) -> bool {
        match std::mem::take(&mut self.state) {
            GestureState::Selected { index, last } => {
                let moved = self.store.list(self.current_page)[index]
                    .translated(at.x - last.x, at.y - last.y);
                self.state = GestureState::Moving { index, moved, last: at };
                true
            }
            GestureState::Moving { index, moved, last } => {
                let moved = moved.translated(at.x - last.x, at.y - last.y);
                self.state = GestureState::Moving { index, moved, last: at };
                true
            }
            other => {
                self.state = other;
                false
            }
        }
    }

    fn secondary_up(&mut self) -> bool {
        match std::mem::take(&mut self.state) {
            GestureState::Moving { index, moved, .. } => {
                // Commit the moved coordinates; the on-screen position alone
                // would be lost on the next redraw or export.
                self.store.update_at(self.current_page, index, moved);
                true
            }
            GestureState::Selected { .. } => true,
            other => {
                self.state = other;
                false
            }
        }
    }

    fn edit_text_at(&mut self, at: CanvasPoint, dialogs: &mut dyn SessionDialogs) -> bool {
        if !matches!(self.state, GestureState::Idle) {
            return false;
        }
        let entries = self.store.list(self.current_page);
        let Some(index) =
            overlay::hit_test_where(entries, at, |a| matches!(a, Annotation::Text { .. }))
        else {
            return false;
        };

        let old = entries[index].clone();
        let Annotation::Text { content, x, y, size } = &old else {
            return false;
        };
        let initial = TextPrompt { content: content.clone(), size: *size };
        let (x, y) = (*x, *y);

        let Some(prompt) = dialogs.text_prompt(Some(&initial)) else {
            return false;
        };
        if prompt.content.is_empty() {
            return false;
        }

        // Remove-then-append: an edited label moves to the top of the
        // z-order. The anchor point never changes.
        self.store.replace(
            self.current_page,
            &old,
            Annotation::text(prompt.content, x, y, prompt.size),
        );
        true
    }

    fn edit_rect_at(&mut self, at: CanvasPoint, dialogs: &mut dyn SessionDialogs) -> bool {
        if !matches!(self.state, GestureState::Idle) {
            return false;
        }
        let entries = self.store.list(self.current_page);
        let Some(index) = overlay::hit_test_where(entries, at, |a| matches!(a, Annotation::Rect(_)))
        else {
            return false;
        };
        let Annotation::Rect(current) = entries[index] else {
            return false;
        };

        let Some(new_bounds) = dialogs.rect_prompt(current) else {
            return false;
        };
        let new_bounds = new_bounds.normalized();
        if new_bounds.is_degenerate() {
            return false;
        }

        self.store.update_at(self.current_page, index, Annotation::Rect(new_bounds));
        true
    }

    fn delete_at(&mut self, at: CanvasPoint) -> bool {
        let entries = self.store.list(self.current_page);
        let Some(index) = overlay::hit_test(entries, at) else {
            return false;
        };
        let victim = entries[index].clone();

        // The store entry goes with the on-screen primitive; leaving it
        // behind would resurrect the annotation at the next redraw.
        self.store.remove(self.current_page, &victim);
        self.state = GestureState::Idle;
        true
    }
}
