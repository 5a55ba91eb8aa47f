//! Document collaborator for pagemark.
//!
//! Exposes the handle-based [`PdfEngine`] trait the core works against and a
//! concrete lopdf-backed implementation. The read half covers page metadata
//! and preview rendering; the write half builds a new document out of copied
//! pages, native square markups, and burned-in text runs.

use image::{ImageBuffer, Rgba};
use lopdf::{dictionary, Dictionary, Document, Object, ObjectId};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

pub type RgbaImage = ImageBuffer<Rgba<u8>, Vec<u8>>;

/// Resource name under which the markup font is registered on a page.
const MARKUP_FONT_KEY: &str = "FPm";

/// Fallback page size (US Letter) when a page carries no usable MediaBox.
const FALLBACK_PAGE_SIZE: PageSize = PageSize { width_pt: 612.0, height_pt: 792.0 };

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DocumentHandle(u64);

impl DocumentHandle {
    pub fn raw(self) -> u64 {
        self.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct OutputHandle(u64);

impl OutputHandle {
    pub fn raw(self) -> u64 {
        self.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageSize {
    pub width_pt: f32,
    pub height_pt: f32,
}

/// Page rotation as stored in the document, clockwise quarter turns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PageRotation {
    #[default]
    None,
    Quarter,
    Half,
    ThreeQuarter,
}

impl PageRotation {
    pub fn from_degrees(degrees: i64) -> Option<Self> {
        match degrees.rem_euclid(360) {
            0 => Some(Self::None),
            90 => Some(Self::Quarter),
            180 => Some(Self::Half),
            270 => Some(Self::ThreeQuarter),
            _ => None,
        }
    }

    pub fn degrees(self) -> u16 {
        match self {
            Self::None => 0,
            Self::Quarter => 90,
            Self::Half => 180,
            Self::ThreeQuarter => 270,
        }
    }

    /// Whether rendering this page swaps its width and height.
    pub fn swaps_axes(self) -> bool {
        matches!(self, Self::Quarter | Self::ThreeQuarter)
    }
}

/// A point in native page space (origin bottom-left, y up, units in points).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PdfPoint {
    pub x: f32,
    pub y: f32,
}

impl PdfPoint {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

/// A rectangle in native page space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PdfRect {
    pub x0: f32,
    pub y0: f32,
    pub x1: f32,
    pub y1: f32,
}

impl PdfRect {
    pub fn new(x0: f32, y0: f32, x1: f32, y1: f32) -> Self {
        Self { x0, y0, x1, y1 }
    }
}

#[derive(Debug, Clone)]
pub enum OpenSource {
    Path(PathBuf),
    Bytes(Vec<u8>),
}

impl From<PathBuf> for OpenSource {
    fn from(value: PathBuf) -> Self {
        Self::Path(value)
    }
}

impl From<&Path> for OpenSource {
    fn from(value: &Path) -> Self {
        Self::Path(value.to_path_buf())
    }
}

impl From<Vec<u8>> for OpenSource {
    fn from(value: Vec<u8>) -> Self {
        Self::Bytes(value)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum PdfEngineError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("PDF parse error: {0}")]
    Parse(#[from] lopdf::Error),
    #[error("invalid document handle {0}")]
    InvalidHandle(u64),
    #[error("invalid output handle {0}")]
    InvalidOutput(u64),
    #[error("page {page} out of range (page_count={page_count})")]
    PageOutOfRange { page: u32, page_count: u32 },
    #[error("encrypted PDFs are not supported in the default backend")]
    EncryptedUnsupported,
    #[error("backend error: {0}")]
    Backend(String),
}

/// Abstract document collaborator.
///
/// Source documents are read-only once opened; an output document is built
/// page by page and consumed by `save_output`. All writer coordinates are in
/// native page space.
pub trait PdfEngine {
    fn open(&mut self, source: OpenSource) -> Result<DocumentHandle, PdfEngineError>;
    fn page_count(&self, handle: DocumentHandle) -> Result<u32, PdfEngineError>;
    fn page_size(
        &self,
        handle: DocumentHandle,
        page_index: u32,
    ) -> Result<PageSize, PdfEngineError>;
    fn page_rotation(
        &self,
        handle: DocumentHandle,
        page_index: u32,
    ) -> Result<PageRotation, PdfEngineError>;
    fn render_page(
        &self,
        handle: DocumentHandle,
        page_index: u32,
    ) -> Result<RgbaImage, PdfEngineError>;
    fn begin_output(&mut self) -> Result<OutputHandle, PdfEngineError>;
    /// Copies one source page into the output; returns the output page index.
    fn copy_page(
        &mut self,
        output: OutputHandle,
        source: DocumentHandle,
        page_index: u32,
    ) -> Result<u32, PdfEngineError>;
    fn add_rect_markup(
        &mut self,
        output: OutputHandle,
        page_index: u32,
        rect: PdfRect,
    ) -> Result<(), PdfEngineError>;
    fn insert_text(
        &mut self,
        output: OutputHandle,
        page_index: u32,
        at: PdfPoint,
        text: &str,
        size: f32,
    ) -> Result<(), PdfEngineError>;
    fn save_output(&mut self, output: OutputHandle, path: &Path)
        -> Result<(), PdfEngineError>;
    fn close(&mut self, handle: DocumentHandle) -> Result<(), PdfEngineError>;
}

#[derive(Debug, Clone, Copy)]
struct PageInfo {
    size: PageSize,
    rotation: PageRotation,
}

#[derive(Debug)]
struct SourceRecord {
    bytes: Vec<u8>,
    pages: Vec<PageInfo>,
}

#[derive(Debug)]
struct OutputRecord {
    doc: Document,
    page_ids: Vec<ObjectId>,
    font_id: Option<ObjectId>,
}

#[derive(Debug, Default)]
pub struct LopdfEngine {
    next_handle: u64,
    sources: HashMap<DocumentHandle, SourceRecord>,
    outputs: HashMap<OutputHandle, OutputRecord>,
}

impl LopdfEngine {
    pub fn new() -> Self {
        Self::default()
    }

    fn source(&self, handle: DocumentHandle) -> Result<&SourceRecord, PdfEngineError> {
        self.sources
            .get(&handle)
            .ok_or(PdfEngineError::InvalidHandle(handle.raw()))
    }

    fn output_mut(&mut self, handle: OutputHandle) -> Result<&mut OutputRecord, PdfEngineError> {
        self.outputs
            .get_mut(&handle)
            .ok_or(PdfEngineError::InvalidOutput(handle.raw()))
    }

    fn page_info(
        &self,
        handle: DocumentHandle,
        page_index: u32,
    ) -> Result<PageInfo, PdfEngineError> {
        let record = self.source(handle)?;
        record.pages.get(page_index as usize).copied().ok_or(PdfEngineError::PageOutOfRange {
            page: page_index,
            page_count: record.pages.len() as u32,
        })
    }

    fn parse_pages(doc: &Document) -> Result<Vec<PageInfo>, PdfEngineError> {
        let mut pages = Vec::new();

        for page_id in doc.page_iter() {
            let size = resolved_page_attr(doc, page_id, b"MediaBox")
                .and_then(|obj| media_box_size(doc, &obj))
                .unwrap_or(FALLBACK_PAGE_SIZE);

            let rotation = resolved_page_attr(doc, page_id, b"Rotate")
                .and_then(|obj| obj.as_i64().ok())
                .map(|degrees| {
                    PageRotation::from_degrees(degrees).unwrap_or_else(|| {
                        log::warn!("ignoring non-quarter-turn /Rotate value {degrees}");
                        PageRotation::None
                    })
                })
                .unwrap_or_default();

            pages.push(PageInfo { size, rotation });
        }

        if pages.is_empty() {
            return Err(PdfEngineError::Backend("document has no pages".to_owned()));
        }

        Ok(pages)
    }
}

/// Looks up a page attribute, walking the parent chain for inheritable keys.
/// The value is cloned as found; a `Reference` is returned unresolved.
fn inherited_page_attr(doc: &Document, page_id: ObjectId, key: &[u8]) -> Option<Object> {
    let mut current = page_id;
    loop {
        let dict = doc.get_object(current).ok()?.as_dict().ok()?;
        if let Ok(value) = dict.get(key) {
            return Some(value.clone());
        }
        current = dict.get(b"Parent").ok()?.as_reference().ok()?;
    }
}

/// Like [`inherited_page_attr`] but resolves a top-level reference.
fn resolved_page_attr(doc: &Document, page_id: ObjectId, key: &[u8]) -> Option<Object> {
    match inherited_page_attr(doc, page_id, key)? {
        Object::Reference(id) => doc.get_object(id).ok().cloned(),
        other => Some(other),
    }
}

fn media_box_size(doc: &Document, media_box: &Object) -> Option<PageSize> {
    let array = match media_box {
        Object::Reference(id) => doc.get_object(*id).ok()?.as_array().ok()?,
        other => other.as_array().ok()?,
    };
    if array.len() != 4 {
        return None;
    }
    let x0 = array[0].as_float().ok()?;
    let y0 = array[1].as_float().ok()?;
    let x1 = array[2].as_float().ok()?;
    let y1 = array[3].as_float().ok()?;
    Some(PageSize { width_pt: (x1 - x0).abs(), height_pt: (y1 - y0).abs() })
}

/// Escapes a string for a PDF literal string operand.
fn escape_pdf_text(text: &str) -> String {
    text.replace('\\', "\\\\").replace('(', "\\(").replace(')', "\\)")
}

/// Takes a possibly-missing, possibly-referenced dictionary entry and returns
/// an owned dictionary to edit and set back inline.
fn take_dict_entry(doc: &Document, owner: &mut Dictionary, key: &[u8]) -> Dictionary {
    match owner.remove(key) {
        Some(Object::Dictionary(dict)) => dict,
        Some(Object::Reference(id)) => doc
            .get_object(id)
            .ok()
            .and_then(|obj| obj.as_dict().ok())
            .cloned()
            .unwrap_or_else(Dictionary::new),
        _ => Dictionary::new(),
    }
}

impl PdfEngine for LopdfEngine {
    fn open(&mut self, source: OpenSource) -> Result<DocumentHandle, PdfEngineError> {
        let bytes = match source {
            OpenSource::Path(path) => fs::read(path)?,
            OpenSource::Bytes(bytes) => bytes,
        };

        if bytes.windows("/Encrypt".len()).any(|window| window == b"/Encrypt") {
            return Err(PdfEngineError::EncryptedUnsupported);
        }

        let doc = Document::load_mem(&bytes)?;
        let pages = Self::parse_pages(&doc)?;
        let page_count = pages.len();

        self.next_handle += 1;
        let handle = DocumentHandle(self.next_handle);
        self.sources.insert(handle, SourceRecord { bytes, pages });

        log::debug!("opened document {} with {page_count} pages", handle.raw());
        Ok(handle)
    }

    fn page_count(&self, handle: DocumentHandle) -> Result<u32, PdfEngineError> {
        Ok(self.source(handle)?.pages.len() as u32)
    }

    fn page_size(
        &self,
        handle: DocumentHandle,
        page_index: u32,
    ) -> Result<PageSize, PdfEngineError> {
        Ok(self.page_info(handle, page_index)?.size)
    }

    fn page_rotation(
        &self,
        handle: DocumentHandle,
        page_index: u32,
    ) -> Result<PageRotation, PdfEngineError> {
        Ok(self.page_info(handle, page_index)?.rotation)
    }

    fn render_page(
        &self,
        handle: DocumentHandle,
        page_index: u32,
    ) -> Result<RgbaImage, PdfEngineError> {
        let info = self.page_info(handle, page_index)?;

        let (mut width_pt, mut height_pt) = (info.size.width_pt, info.size.height_pt);
        if info.rotation.swaps_axes() {
            std::mem::swap(&mut width_pt, &mut height_pt);
        }

        let width = width_pt.round().max(1.0) as u32;
        let height = height_pt.round().max(1.0) as u32;

        let mut image = RgbaImage::from_pixel(width, height, Rgba([255, 255, 255, 255]));

        if width >= 4 && height >= 4 {
            for x in 0..width {
                image.put_pixel(x, 0, Rgba([220, 220, 220, 255]));
                image.put_pixel(x, height - 1, Rgba([220, 220, 220, 255]));
            }
            for y in 0..height {
                image.put_pixel(0, y, Rgba([220, 220, 220, 255]));
                image.put_pixel(width - 1, y, Rgba([220, 220, 220, 255]));
            }
        }

        Ok(image)
    }

    fn begin_output(&mut self) -> Result<OutputHandle, PdfEngineError> {
        self.next_handle += 1;
        let handle = OutputHandle(self.next_handle);
        self.outputs.insert(
            handle,
            OutputRecord { doc: Document::with_version("1.7"), page_ids: Vec::new(), font_id: None },
        );
        Ok(handle)
    }

    fn copy_page(
        &mut self,
        output: OutputHandle,
        source: DocumentHandle,
        page_index: u32,
    ) -> Result<u32, PdfEngineError> {
        let record = self
            .sources
            .get(&source)
            .ok_or(PdfEngineError::InvalidHandle(source.raw()))?;
        let page_count = record.pages.len() as u32;
        if page_index >= page_count {
            return Err(PdfEngineError::PageOutOfRange { page: page_index, page_count });
        }

        let out = self
            .outputs
            .get_mut(&output)
            .ok_or(PdfEngineError::InvalidOutput(output.raw()))?;

        // Re-parse the source and renumber the fresh object graph above the
        // output's id range before splicing it in.
        let mut staged = Document::load_mem(&record.bytes)?;
        staged.renumber_objects_with(out.doc.max_id + 1);

        let page_id = staged
            .page_iter()
            .nth(page_index as usize)
            .ok_or(PdfEngineError::PageOutOfRange { page: page_index, page_count })?;

        // Inheritable attributes must be pinned onto the page dictionary
        // before it is re-parented under the output Pages node.
        let inherited: Vec<(&[u8], Object)> = [b"Resources".as_slice(), b"MediaBox", b"Rotate", b"CropBox"]
            .into_iter()
            .filter_map(|key| {
                let page_dict = staged.get_object(page_id).ok()?.as_dict().ok()?;
                if page_dict.has(key) {
                    return None;
                }
                inherited_page_attr(&staged, page_id, key).map(|value| (key, value))
            })
            .collect();

        let staged_max_id = staged.max_id;
        for (id, object) in staged.objects {
            out.doc.objects.insert(id, object);
        }
        out.doc.max_id = out.doc.max_id.max(staged_max_id);

        if !inherited.is_empty() {
            let page_dict = out
                .doc
                .get_object_mut(page_id)
                .and_then(|obj| obj.as_dict_mut())?;
            for (key, value) in inherited {
                page_dict.set(key, value);
            }
        }

        out.page_ids.push(page_id);
        Ok(out.page_ids.len() as u32 - 1)
    }

    fn add_rect_markup(
        &mut self,
        output: OutputHandle,
        page_index: u32,
        rect: PdfRect,
    ) -> Result<(), PdfEngineError> {
        let out = self.output_mut(output)?;
        let page_id = *out.page_ids.get(page_index as usize).ok_or(
            PdfEngineError::PageOutOfRange {
                page: page_index,
                page_count: out.page_ids.len() as u32,
            },
        )?;

        let annot_id = out.doc.add_object(dictionary! {
            "Type" => "Annot",
            "Subtype" => "Square",
            "Rect" => vec![
                Object::Real(rect.x0),
                Object::Real(rect.y0),
                Object::Real(rect.x1),
                Object::Real(rect.y1),
            ],
            "C" => vec![Object::Real(1.0), Object::Real(0.0), Object::Real(0.0)],
            "BS" => dictionary! { "W" => 1 },
        });

        let page_dict = out
            .doc
            .get_object_mut(page_id)
            .and_then(|obj| obj.as_dict_mut())?;

        if let Ok(Object::Array(annots)) = page_dict.get_mut(b"Annots") {
            annots.push(Object::Reference(annot_id));
        } else {
            page_dict.set("Annots", Object::Array(vec![Object::Reference(annot_id)]));
        }

        Ok(())
    }

    fn insert_text(
        &mut self,
        output: OutputHandle,
        page_index: u32,
        at: PdfPoint,
        text: &str,
        size: f32,
    ) -> Result<(), PdfEngineError> {
        let out = self.output_mut(output)?;
        let page_id = *out.page_ids.get(page_index as usize).ok_or(
            PdfEngineError::PageOutOfRange {
                page: page_index,
                page_count: out.page_ids.len() as u32,
            },
        )?;

        let font_id = match out.font_id {
            Some(id) => id,
            None => {
                let id = out.doc.add_object(dictionary! {
                    "Type" => "Font",
                    "Subtype" => "Type1",
                    "BaseFont" => "Helvetica",
                });
                out.font_id = Some(id);
                id
            }
        };

        // Normalize Resources and its Font table to inline dictionaries so
        // the markup font can be registered without touching shared objects.
        let mut resources = {
            let page_dict = out
                .doc
                .get_object_mut(page_id)
                .and_then(|obj| obj.as_dict_mut())?;
            let taken = page_dict.remove(b"Resources");
            match taken {
                Some(Object::Dictionary(dict)) => dict,
                Some(Object::Reference(id)) => out
                    .doc
                    .get_object(id)
                    .ok()
                    .and_then(|obj| obj.as_dict().ok())
                    .cloned()
                    .unwrap_or_else(Dictionary::new),
                _ => Dictionary::new(),
            }
        };
        let mut fonts = take_dict_entry(&out.doc, &mut resources, b"Font");
        fonts.set(MARKUP_FONT_KEY, Object::Reference(font_id));
        resources.set("Font", Object::Dictionary(fonts));

        let page_dict = out
            .doc
            .get_object_mut(page_id)
            .and_then(|obj| obj.as_dict_mut())?;
        page_dict.set("Resources", Object::Dictionary(resources));

        let content = format!(
            "BT /{} {} Tf 1 0 0 rg {} {} Td ({}) Tj ET",
            MARKUP_FONT_KEY,
            size,
            at.x,
            at.y,
            escape_pdf_text(text)
        );
        out.doc.add_page_contents(page_id, content.into_bytes())?;

        Ok(())
    }

    fn save_output(
        &mut self,
        output: OutputHandle,
        path: &Path,
    ) -> Result<(), PdfEngineError> {
        let mut record = self
            .outputs
            .remove(&output)
            .ok_or(PdfEngineError::InvalidOutput(output.raw()))?;

        if record.page_ids.is_empty() {
            return Err(PdfEngineError::Backend("output has no pages".to_owned()));
        }

        let kids: Vec<Object> =
            record.page_ids.iter().map(|id| Object::Reference(*id)).collect();
        let pages_id = record.doc.add_object(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => record.page_ids.len() as i64,
        });

        for page_id in &record.page_ids {
            let page_dict = record
                .doc
                .get_object_mut(*page_id)
                .and_then(|obj| obj.as_dict_mut())?;
            page_dict.set("Parent", Object::Reference(pages_id));
        }

        let catalog_id = record.doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => Object::Reference(pages_id),
        });
        record.doc.trailer.set("Root", Object::Reference(catalog_id));

        record.doc.save(path)?;
        log::debug!("saved output document with {} pages to {}", record.page_ids.len(), path.display());
        Ok(())
    }

    fn close(&mut self, handle: DocumentHandle) -> Result<(), PdfEngineError> {
        self.sources
            .remove(&handle)
            .map(|_| ())
            .ok_or(PdfEngineError::InvalidHandle(handle.raw()))
    }
}

pub fn default_engine() -> LopdfEngine {
    LopdfEngine::new()
}

#[cfg(test)]
mod tests {
    use super::*;
    use lopdf::Stream;

    /// Builds an in-memory PDF with the given page specs as
    /// `(width, height, rotation_degrees)` tuples.
    fn fixture_pdf(specs: &[(f32, f32, i64)]) -> Vec<u8> {
        let mut doc = Document::with_version("1.7");

        let mut kids = Vec::new();
        let mut page_ids = Vec::new();
        for &(width, height, rotation) in specs {
            let content_id = doc.add_object(Stream::new(dictionary! {}, b"q Q".to_vec()));
            let mut page = dictionary! {
                "Type" => "Page",
                "MediaBox" => vec![
                    0.into(),
                    0.into(),
                    Object::Real(width),
                    Object::Real(height),
                ],
                "Contents" => Object::Reference(content_id),
                "Resources" => dictionary! {},
            };
            if rotation != 0 {
                page.set("Rotate", rotation);
            }
            let page_id = doc.add_object(page);
            kids.push(Object::Reference(page_id));
            page_ids.push(page_id);
        }

        let pages_id = doc.add_object(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => specs.len() as i64,
        });
        for page_id in page_ids {
            if let Ok(dict) = doc.get_object_mut(page_id).and_then(|obj| obj.as_dict_mut()) {
                dict.set("Parent", Object::Reference(pages_id));
            }
        }
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => Object::Reference(pages_id),
        });
        doc.trailer.set("Root", Object::Reference(catalog_id));

        let mut bytes = Vec::new();
        doc.save_to(&mut bytes).expect("fixture should serialize");
        bytes
    }

    /// Fixture where MediaBox lives on the Pages node only.
    fn fixture_pdf_inherited_media_box() -> Vec<u8> {
        let mut doc = Document::with_version("1.7");
        let page_id = doc.add_object(dictionary! { "Type" => "Page" });
        let pages_id = doc.add_object(dictionary! {
            "Type" => "Pages",
            "Kids" => vec![Object::Reference(page_id)],
            "Count" => 1,
            "MediaBox" => vec![0.into(), 0.into(), 500.into(), 700.into()],
        });
        if let Ok(dict) = doc.get_object_mut(page_id).and_then(|obj| obj.as_dict_mut()) {
            dict.set("Parent", Object::Reference(pages_id));
        }
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => Object::Reference(pages_id),
        });
        doc.trailer.set("Root", Object::Reference(catalog_id));

        let mut bytes = Vec::new();
        doc.save_to(&mut bytes).expect("fixture should serialize");
        bytes
    }

    fn loaded_page_sizes(path: &Path) -> Vec<(f32, f32)> {
        let doc = Document::load(path).expect("saved output should parse");
        doc.page_iter()
            .map(|page_id| {
                let media_box = resolved_page_attr(&doc, page_id, b"MediaBox")
                    .expect("copied page should carry a MediaBox");
                let size = media_box_size(&doc, &media_box).expect("MediaBox should be numeric");
                (size.width_pt, size.height_pt)
            })
            .collect()
    }

    #[test]
    fn opens_pdf_and_reads_page_metadata() {
        let mut engine = LopdfEngine::new();
        let handle = engine
            .open(OpenSource::Bytes(fixture_pdf(&[
                (612.0, 792.0, 0),
                (500.0, 500.0, 90),
                (400.0, 600.0, 180),
            ])))
            .expect("open should succeed");

        assert_eq!(engine.page_count(handle).expect("count should succeed"), 3);
        assert_eq!(
            engine.page_size(handle, 0).expect("size should succeed"),
            PageSize { width_pt: 612.0, height_pt: 792.0 }
        );
        assert_eq!(
            engine.page_rotation(handle, 1).expect("rotation should succeed"),
            PageRotation::Quarter
        );
        assert_eq!(
            engine.page_rotation(handle, 2).expect("rotation should succeed"),
            PageRotation::Half
        );
    }

    #[test]
    fn media_box_inherited_from_pages_node() {
        let mut engine = LopdfEngine::new();
        let handle = engine
            .open(OpenSource::Bytes(fixture_pdf_inherited_media_box()))
            .expect("open should succeed");

        assert_eq!(
            engine.page_size(handle, 0).expect("size should succeed"),
            PageSize { width_pt: 500.0, height_pt: 700.0 }
        );
    }

    #[test]
    fn render_swaps_axes_for_rotated_pages() {
        let mut engine = LopdfEngine::new();
        let handle = engine
            .open(OpenSource::Bytes(fixture_pdf(&[(400.0, 600.0, 90)])))
            .expect("open should succeed");

        let image = engine.render_page(handle, 0).expect("render should succeed");
        assert_eq!((image.width(), image.height()), (600, 400));
    }

    #[test]
    fn invalid_handle_returns_error() {
        let engine = LopdfEngine::new();
        let err = engine
            .page_count(DocumentHandle(999))
            .expect_err("should fail for unknown handle");
        assert!(matches!(err, PdfEngineError::InvalidHandle(999)));
    }

    #[test]
    fn page_out_of_range_is_reported() {
        let mut engine = LopdfEngine::new();
        let handle = engine
            .open(OpenSource::Bytes(fixture_pdf(&[(612.0, 792.0, 0)])))
            .expect("open should succeed");

        let err = engine.page_size(handle, 5).expect_err("page 5 should be out of range");
        assert!(matches!(err, PdfEngineError::PageOutOfRange { page: 5, page_count: 1 }));
    }

    #[test]
    fn encrypted_marker_is_rejected() {
        let mut engine = LopdfEngine::new();
        let err = engine
            .open(OpenSource::Bytes(b"%PDF-1.7 /Encrypt garbage".to_vec()))
            .expect_err("encrypted marker should be rejected");
        assert!(matches!(err, PdfEngineError::EncryptedUnsupported));
    }

    #[test]
    fn copied_pages_follow_selection_order() {
        let mut engine = LopdfEngine::new();
        let handle = engine
            .open(OpenSource::Bytes(fixture_pdf(&[
                (612.0, 792.0, 0),
                (500.0, 500.0, 0),
                (400.0, 600.0, 0),
            ])))
            .expect("open should succeed");

        let output = engine.begin_output().expect("begin_output should succeed");
        assert_eq!(engine.copy_page(output, handle, 2).expect("copy should succeed"), 0);
        assert_eq!(engine.copy_page(output, handle, 0).expect("copy should succeed"), 1);

        let temp = tempfile::tempdir().expect("temp dir should be created");
        let out_path = temp.path().join("reordered.pdf");
        engine.save_output(output, &out_path).expect("save should succeed");

        assert_eq!(loaded_page_sizes(&out_path), vec![(400.0, 600.0), (612.0, 792.0)]);
    }

    #[test]
    fn rect_markup_lands_in_page_annots() {
        let mut engine = LopdfEngine::new();
        let handle = engine
            .open(OpenSource::Bytes(fixture_pdf(&[(612.0, 792.0, 0)])))
            .expect("open should succeed");

        let output = engine.begin_output().expect("begin_output should succeed");
        engine.copy_page(output, handle, 0).expect("copy should succeed");
        engine
            .add_rect_markup(output, 0, PdfRect::new(100.0, 642.0, 200.0, 692.0))
            .expect("markup should succeed");

        let temp = tempfile::tempdir().expect("temp dir should be created");
        let out_path = temp.path().join("markup.pdf");
        engine.save_output(output, &out_path).expect("save should succeed");

        let doc = Document::load(&out_path).expect("saved output should parse");
        let page_id = doc.page_iter().next().expect("output should have a page");
        let annots = doc
            .get_object(page_id)
            .and_then(|obj| obj.as_dict())
            .and_then(|dict| dict.get(b"Annots"))
            .and_then(|obj| obj.as_array())
            .expect("page should carry an Annots array");
        assert_eq!(annots.len(), 1);

        let annot = annots[0]
            .as_reference()
            .ok()
            .and_then(|id| doc.get_object(id).ok())
            .and_then(|obj| obj.as_dict().ok())
            .expect("annotation should resolve to a dictionary");
        assert_eq!(annot.get(b"Subtype").and_then(|obj| obj.as_name()).ok(), Some(b"Square".as_slice()));

        let rect = annot
            .get(b"Rect")
            .and_then(|obj| obj.as_array())
            .expect("annotation should carry a Rect");
        let values: Vec<f32> = rect.iter().map(|obj| obj.as_float().unwrap()).collect();
        assert_eq!(values, vec![100.0, 642.0, 200.0, 692.0]);
    }

    #[test]
    fn inserted_text_reaches_page_content_and_fonts() {
        let mut engine = LopdfEngine::new();
        let handle = engine
            .open(OpenSource::Bytes(fixture_pdf(&[(612.0, 792.0, 0)])))
            .expect("open should succeed");

        let output = engine.begin_output().expect("begin_output should succeed");
        engine.copy_page(output, handle, 0).expect("copy should succeed");
        engine
            .insert_text(output, 0, PdfPoint::new(80.0, 700.0), "Reviewed (ok)", 12.0)
            .expect("insert_text should succeed");

        let temp = tempfile::tempdir().expect("temp dir should be created");
        let out_path = temp.path().join("text.pdf");
        engine.save_output(output, &out_path).expect("save should succeed");

        let doc = Document::load(&out_path).expect("saved output should parse");
        let page_id = doc.page_iter().next().expect("output should have a page");

        let content = doc.get_page_content(page_id).expect("page content should load");
        let content = String::from_utf8_lossy(&content);
        assert!(content.contains("(Reviewed \\(ok\\)) Tj"));
        assert!(content.contains("/FPm 12 Tf"));

        let fonts = doc
            .get_object(page_id)
            .and_then(|obj| obj.as_dict())
            .and_then(|dict| dict.get(b"Resources"))
            .and_then(|obj| obj.as_dict())
            .and_then(|dict| dict.get(b"Font"))
            .and_then(|obj| obj.as_dict())
            .expect("page should carry a Font table");
        assert!(fonts.has(MARKUP_FONT_KEY.as_bytes()));
    }

    #[test]
    fn save_output_without_pages_fails() {
        let mut engine = LopdfEngine::new();
        let output = engine.begin_output().expect("begin_output should succeed");

        let temp = tempfile::tempdir().expect("temp dir should be created");
        let err = engine
            .save_output(output, &temp.path().join("empty.pdf"))
            .expect_err("empty output should be rejected");
        assert!(matches!(err, PdfEngineError::Backend(_)));
    }
}
