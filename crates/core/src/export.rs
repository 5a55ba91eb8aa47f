//! Export pipeline.
//!
//! Copies the selected pages, in selection order, into a new document via
//! the engine's writer half; burns text annotations into page content and
//! attaches rectangle/line annotations as native square markups; and writes
//! the sidecar record alongside the output.

use crate::annotation::{Annotation, AnnotationStore};
use crate::sidecar::{self, SidecarEntry, SidecarError, SidecarRecord};
use crate::transform;
use pagemark_engine::{
    DocumentHandle, PageRotation, PageSize, PdfEngine, PdfEngineError, PdfPoint,
};
use std::path::{Path, PathBuf};

/// Native size and rotation of one page, captured at document open.
#[derive(Debug, Clone, Copy)]
pub struct PageGeometry {
    pub size: PageSize,
    pub rotation: PageRotation,
}

/// Reads every page's geometry from an open document.
pub fn document_geometry(
    engine: &dyn PdfEngine,
    document: DocumentHandle,
) -> Result<Vec<PageGeometry>, PdfEngineError> {
    let page_count = engine.page_count(document)?;
    (0..page_count)
        .map(|page| {
            Ok(PageGeometry {
                size: engine.page_size(document, page)?,
                rotation: engine.page_rotation(document, page)?,
            })
        })
        .collect()
}

#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    /// Recoverable: nothing is written, the user picks pages and retries.
    #[error("no pages selected")]
    NothingSelected,
    /// Recoverable: the selection names a page the document does not have.
    #[error("selected page {page} out of range (page_count={page_count})")]
    PageOutOfRange { page: u32, page_count: usize },
    #[error(transparent)]
    Engine(#[from] PdfEngineError),
    #[error(transparent)]
    Sidecar(#[from] SidecarError),
}

#[derive(Debug, Clone)]
pub struct ExportSummary {
    pub pages_written: usize,
    pub rect_markups: usize,
    pub text_runs: usize,
    /// Where the sidecar landed. Its entries stay keyed by the **original**
    /// source page indices even though the written document numbers pages
    /// sequentially in selection order.
    pub sidecar_path: PathBuf,
}

/// Exports `selection` (original page indices, in the order chosen) from
/// `source` to `output_path`, plus the sidecar at `<output_path>.json`.
pub fn export_selection(
    engine: &mut dyn PdfEngine,
    source: DocumentHandle,
    geometry: &[PageGeometry],
    store: &AnnotationStore,
    selection: &[u32],
    output_path: &Path,
) -> Result<ExportSummary, ExportError> {
    if selection.is_empty() {
        return Err(ExportError::NothingSelected);
    }
    for &page in selection {
        if page as usize >= geometry.len() {
            return Err(ExportError::PageOutOfRange { page, page_count: geometry.len() });
        }
    }

    let output = engine.begin_output()?;
    let mut record = SidecarRecord::new();
    let mut rect_markups = 0usize;
    let mut text_runs = 0usize;

    for &page in selection {
        let out_page = engine.copy_page(output, source, page)?;
        let geom = geometry[page as usize];
        let height = geom.size.height_pt;
        let entries = record.entry(page).or_default();

        for annotation in store.list(page as usize) {
            if let Annotation::Text { content, x, y, size } = annotation {
                // Text is inserted at its visual anchor: flip only, no
                // rotation inverse.
                let at = PdfPoint::new(*x, height - *y);
                engine.insert_text(output, out_page, at, content, *size as f32)?;
                entries.push(SidecarEntry::Text(content.clone(), at.x, at.y, *size));
                text_runs += 1;
            } else if let Some(canvas) = annotation.outline_rect() {
                let page_rect = transform::rect_to_page_space(canvas, geom.rotation);
                let export_rect = transform::rect_to_export_space(page_rect, height);
                engine.add_rect_markup(output, out_page, export_rect)?;
                entries.push(SidecarEntry::Shape([
                    export_rect.x0,
                    export_rect.y0,
                    export_rect.x1,
                    export_rect.y1,
                ]));
                rect_markups += 1;
            }
        }
    }

    engine.save_output(output, output_path)?;

    let sidecar_path = sidecar::sidecar_path(output_path);
    sidecar::save(&sidecar_path, &record)?;

    log::info!(
        "exported {} pages ({} markups, {} text runs) to {}",
        selection.len(),
        rect_markups,
        text_runs,
        output_path.display()
    );

    Ok(ExportSummary {
        pages_written: selection.len(),
        rect_markups,
        text_runs,
        sidecar_path,
    })
}
