//! Sidecar persistence for annotation data.
//!
//! The sidecar lives next to an exported document at `<path>.json` and maps
//! page-index strings to lists of annotation tuples: `[x0, y0, x1, y1]` for
//! rectangles (and the thin rectangles lines collapse to), or
//! `[text, x, y, size]` for labels. All values are in export space; loading
//! runs them back through the inverse flip and rotation to canvas space.

use crate::annotation::{Annotation, AnnotationStore};
use crate::export::PageGeometry;
use crate::transform;
use pagemark_engine::PdfRect;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Wire form of a saved annotation. Untagged: a 4-number tuple is a shape,
/// a string-led tuple is a text label, exactly as the sidecar format
/// defines them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SidecarEntry {
    Shape([f32; 4]),
    Text(String, f32, f32, u32),
}

/// Per-page annotation tuples keyed by **source** page index. serde_json
/// renders the integer keys as JSON object strings, matching the format.
pub type SidecarRecord = BTreeMap<u32, Vec<SidecarEntry>>;

#[derive(Debug, thiserror::Error)]
pub enum SidecarError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("malformed sidecar: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error("sidecar page {page} out of range (page_count={page_count})")]
    PageOutOfRange { page: u32, page_count: usize },
}

/// Sidecar location for a document path: the full name plus `.json`.
pub fn sidecar_path(document_path: &Path) -> PathBuf {
    let mut name = document_path.as_os_str().to_os_string();
    name.push(".json");
    PathBuf::from(name)
}

/// Loads a sidecar. An absent file is the expected state for a document
/// that was never annotated and maps to `Ok(None)`; malformed content is
/// fatal to the caller, with no partial recovery.
pub fn load(path: &Path) -> Result<Option<SidecarRecord>, SidecarError> {
    if !path.exists() {
        return Ok(None);
    }
    let json = fs::read_to_string(path)?;
    let record: SidecarRecord = serde_json::from_str(&json)?;
    Ok(Some(record))
}

/// Writes the record verbatim, atomically via a temp-file rename.
pub fn save(path: &Path, record: &SidecarRecord) -> Result<(), SidecarError> {
    let json = serde_json::to_string_pretty(record)?;
    let temp_path = path.with_extension("tmp");
    fs::write(&temp_path, json)?;
    fs::rename(&temp_path, path)?;
    Ok(())
}

/// Builds a canvas-space store from a loaded record.
///
/// Shape tuples are un-flipped and rotated forward into canvas space; text
/// anchors are un-flipped only, mirroring how they were exported. Shapes
/// that arrive degenerate are kept: the zero-size rejection applies at
/// draw time, never to values that already exist.
pub fn hydrate_store(
    record: &SidecarRecord,
    geometry: &[PageGeometry],
) -> Result<AnnotationStore, SidecarError> {
    let mut store = AnnotationStore::new(geometry.len());

    for (&page, entries) in record {
        let Some(geom) = geometry.get(page as usize) else {
            return Err(SidecarError::PageOutOfRange { page, page_count: geometry.len() });
        };
        let height = geom.size.height_pt;

        for entry in entries {
            match entry {
                SidecarEntry::Shape([x0, y0, x1, y1]) => {
                    let page_rect = transform::rect_from_export_space(
                        PdfRect::new(*x0, *y0, *x1, *y1),
                        height,
                    );
                    let canvas = transform::rect_to_canvas_space(page_rect, geom.rotation);
                    store.add(page as usize, Annotation::Rect(canvas));
                }
                SidecarEntry::Text(content, x, y, size) => {
                    store.add(
                        page as usize,
                        Annotation::text(content.clone(), *x, height - *y, *size),
                    );
                }
            }
        }
    }

    log::debug!("hydrated {} sidecar pages", record.len());
    Ok(store)
}
