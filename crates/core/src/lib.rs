//! Pagemark core: the annotation overlay engine.
//!
//! Data model and per-page store for annotations, the canvas/page
//! coordinate transforms, pure overlay rendering, the interactive edit
//! state machine, the export pipeline, and the sidecar codec.

pub mod annotation;
pub mod export;
pub mod geometry;
pub mod overlay;
pub mod session;
pub mod sidecar;
pub mod transform;

pub use annotation::{Annotation, AnnotationStore, DEFAULT_FONT_SIZE, FONT_SIZES};
pub use export::{
    document_geometry, export_selection, ExportError, ExportSummary, PageGeometry,
};
pub use geometry::{CanvasPoint, CanvasRect};
pub use overlay::{OverlayId, OverlayPrimitive, OverlayShape};
pub use session::{
    DrawMode, EditorSession, GestureEvent, PointerButton, SessionDialogs, TextPrompt,
};
pub use sidecar::{SidecarEntry, SidecarError, SidecarRecord};
