//! Document handle over lopdf
//!
//! A [`PdfHandle`] exclusively owns one decoded document for the duration of
//! an operation. Pages copied between handles are structural clones: the
//! objects reachable from a source page are duplicated into the target under
//! fresh ids, so the output keeps no link back to its source.

use std::collections::{BTreeMap, HashMap, HashSet};

use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Dictionary, Document, Object, ObjectId, Stream};
use tracing::debug;

use crate::cancel::CancelToken;
use crate::error::PdfToolsError;
use crate::result::PdfOutput;

/// Resource name of the standard Helvetica font we register on stamped pages
pub const FONT_RESOURCE: &str = "PTHelv";

/// Page attributes a page may inherit from its ancestors in the page tree
const INHERITABLE: [&[u8]; 4] = [b"Resources", b"MediaBox", b"CropBox", b"Rotate"];

/// Guard against malformed, cyclic page trees
const MAX_TREE_DEPTH: usize = 32;

const LETTER: PageBox = PageBox {
    x0: 0.0,
    y0: 0.0,
    x1: 612.0,
    y1: 792.0,
};

/// A page's MediaBox in default user space units
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageBox {
    pub x0: f32,
    pub y0: f32,
    pub x1: f32,
    pub y1: f32,
}

impl PageBox {
    pub fn width(&self) -> f32 {
        self.x1 - self.x0
    }

    pub fn height(&self) -> f32 {
        self.y1 - self.y0
    }

    /// Map a top-left-origin UI point onto this page's bottom-left-origin space
    pub fn ui_to_document(&self, ui_x: f32, ui_y: f32) -> (f32, f32) {
        let (x, y) = crate::draw::to_document_space(ui_x, ui_y, self.height());
        (self.x0 + x, self.y0 + y)
    }
}

/// How [`PdfHandle::save`] serializes a document
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SaveOptions {
    /// Flate-compress streams that carry no filter yet
    pub compress_streams: bool,
    /// Drop objects no longer reachable from the trailer
    pub prune: bool,
    /// Remove the document information dictionary and XMP metadata
    pub strip_metadata: bool,
    /// Renumber objects densely from 1
    pub renumber: bool,
}

impl Default for SaveOptions {
    fn default() -> Self {
        Self {
            compress_streams: true,
            prune: false,
            strip_metadata: false,
            renumber: false,
        }
    }
}

/// Document information dictionary entries
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DocumentInfo {
    pub title: Option<String>,
    pub author: Option<String>,
    pub subject: Option<String>,
    pub keywords: Option<String>,
    pub creator: Option<String>,
    pub producer: Option<String>,
    pub creation_date: Option<String>,
    pub modification_date: Option<String>,
}

pub struct PdfHandle {
    doc: Document,
    font_id: Option<ObjectId>,
    alpha_states: BTreeMap<u16, ObjectId>,
}

impl PdfHandle {
    /// Decode PDF bytes. Encrypted documents are refused outright.
    pub fn load(bytes: &[u8]) -> Result<Self, PdfToolsError> {
        let doc =
            Document::load_mem(bytes).map_err(|e| PdfToolsError::ParseError(e.to_string()))?;
        if doc.is_encrypted() {
            return Err(PdfToolsError::Unsupported(
                "encrypted PDFs cannot be processed; remove the password first".into(),
            ));
        }
        Ok(Self::from_document(doc))
    }

    /// A document with an empty page tree
    pub fn new_empty() -> Self {
        let mut doc = Document::with_version("1.7");
        let pages_id = doc.add_object(dictionary! {
            "Type" => "Pages",
            "Kids" => Vec::<Object>::new(),
            "Count" => 0,
        });
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => Object::Reference(pages_id),
        });
        doc.trailer.set("Root", Object::Reference(catalog_id));
        Self::from_document(doc)
    }

    fn from_document(doc: Document) -> Self {
        Self {
            doc,
            font_id: None,
            alpha_states: BTreeMap::new(),
        }
    }

    pub fn document(&self) -> &Document {
        &self.doc
    }

    pub fn version(&self) -> &str {
        &self.doc.version
    }

    pub fn page_count(&self) -> u32 {
        self.doc.get_pages().len() as u32
    }

    /// Page object ids in page order
    pub fn page_ids(&self) -> Vec<ObjectId> {
        self.doc.get_pages().into_values().collect()
    }

    /// Object id of a 1-based page number
    pub fn page_id(&self, page_number: u32) -> Result<ObjectId, PdfToolsError> {
        self.doc
            .get_pages()
            .get(&page_number)
            .copied()
            .ok_or_else(|| {
                PdfToolsError::InvalidRange(format!(
                    "Page {} does not exist (document has {} pages)",
                    page_number,
                    self.page_count()
                ))
            })
    }

    fn page_dict(&self, page_id: ObjectId) -> Result<&Dictionary, PdfToolsError> {
        self.doc
            .get_object(page_id)?
            .as_dict()
            .map_err(|_| PdfToolsError::OperationError("Page is not a dictionary".into()))
    }

    fn page_dict_mut(&mut self, page_id: ObjectId) -> Result<&mut Dictionary, PdfToolsError> {
        self.doc
            .get_object_mut(page_id)?
            .as_dict_mut()
            .map_err(|_| PdfToolsError::OperationError("Page is not a dictionary".into()))
    }

    /// Follow a reference to its target; other objects are returned as-is
    fn resolve<'a>(&'a self, obj: &'a Object) -> &'a Object {
        match obj {
            Object::Reference(id) => self.doc.get_object(*id).unwrap_or(obj),
            other => other,
        }
    }

    /// Look up a page attribute, walking up the page tree for inheritable ones
    fn inherited(&self, page_id: ObjectId, key: &[u8]) -> Option<Object> {
        let mut node = self.page_dict(page_id).ok()?;
        for _ in 0..MAX_TREE_DEPTH {
            if let Ok(value) = node.get(key) {
                return Some(value.clone());
            }
            let parent = node.get(b"Parent").ok()?.as_reference().ok()?;
            node = self.doc.get_object(parent).ok()?.as_dict().ok()?;
        }
        None
    }

    /// The page's MediaBox, defaulting to US Letter when absent or malformed
    pub fn page_box(&self, page_id: ObjectId) -> PageBox {
        let Some(media_box) = self.inherited(page_id, b"MediaBox") else {
            return LETTER;
        };
        let Ok(values) = self.resolve(&media_box).as_array() else {
            return LETTER;
        };
        let numbers: Vec<f32> = values
            .iter()
            .filter_map(|v| as_number(self.resolve(v)))
            .collect();
        match numbers.as_slice() {
            [x0, y0, x1, y1] => PageBox {
                x0: x0.min(*x1),
                y0: y0.min(*y1),
                x1: x0.max(*x1),
                y1: y0.max(*y1),
            },
            _ => LETTER,
        }
    }

    /// Effective rotation in degrees, normalized into `0..360`
    pub fn rotation(&self, page_id: ObjectId) -> i64 {
        self.inherited(page_id, b"Rotate")
            .and_then(|r| self.resolve(&r).as_i64().ok())
            .map(|r| r.rem_euclid(360))
            .unwrap_or(0)
    }

    /// Set the page rotation outright; any prior value is discarded
    pub fn set_rotation(&mut self, page_id: ObjectId, degrees: i64) -> Result<(), PdfToolsError> {
        let page = self.page_dict_mut(page_id)?;
        page.set("Rotate", Object::Integer(degrees.rem_euclid(360)));
        Ok(())
    }

    /// Append structural copies of `pages` (1-based, in the order given) from
    /// `source` to the end of this document's page tree.
    ///
    /// Returns the ids of the new page objects. A page listed twice is copied
    /// twice; resources shared between pages are copied once.
    pub fn import_pages(
        &mut self,
        source: &PdfHandle,
        pages: &[u32],
        cancel: &CancelToken,
    ) -> Result<Vec<ObjectId>, PdfToolsError> {
        let pages_root = self.pages_root_id()?;
        let source_pages = source.doc.get_pages();

        let mut copier = ObjectCopier {
            source: &source.doc,
            target: &mut self.doc,
            map: HashMap::new(),
            source_pages: source_pages.values().copied().collect(),
        };

        let mut new_ids = Vec::with_capacity(pages.len());
        for &page_number in pages {
            cancel.checkpoint()?;

            let source_id = *source_pages.get(&page_number).ok_or_else(|| {
                PdfToolsError::InvalidRange(format!(
                    "Page {} does not exist (document has {} pages)",
                    page_number,
                    source_pages.len()
                ))
            })?;

            let mut page = source.page_dict(source_id)?.clone();
            for key in INHERITABLE {
                if !page.has(key) {
                    if let Some(value) = source.inherited(source_id, key) {
                        page.set(key, value);
                    }
                }
            }
            page.remove(b"Parent");

            let new_id = copier.target.new_object_id();
            copier.map.insert(source_id, new_id);
            let mut copied = copier.copy_dict(&page);
            copied.set("Parent", Object::Reference(pages_root));
            copier.target.objects.insert(new_id, Object::Dictionary(copied));

            debug!(
                "Copied page {} ({:?}) as {:?}",
                page_number, source_id, new_id
            );
            new_ids.push(new_id);
        }

        self.append_kids(pages_root, &new_ids)?;
        Ok(new_ids)
    }

    fn pages_root_id(&self) -> Result<ObjectId, PdfToolsError> {
        let catalog_id = self
            .doc
            .trailer
            .get(b"Root")
            .and_then(Object::as_reference)
            .map_err(|_| PdfToolsError::OperationError("No Root in trailer".into()))?;
        self.doc
            .get_object(catalog_id)
            .and_then(Object::as_dict)
            .and_then(|catalog| catalog.get(b"Pages"))
            .and_then(Object::as_reference)
            .map_err(|_| PdfToolsError::OperationError("No Pages in catalog".into()))
    }

    fn append_kids(&mut self, pages_root: ObjectId, kids: &[ObjectId]) -> Result<(), PdfToolsError> {
        let pages_dict = self
            .doc
            .get_object_mut(pages_root)?
            .as_dict_mut()
            .map_err(|_| PdfToolsError::OperationError("Invalid pages dictionary".into()))?;

        let count = pages_dict
            .get(b"Count")
            .and_then(Object::as_i64)
            .unwrap_or(0);
        let mut existing = match pages_dict.get(b"Kids") {
            Ok(Object::Array(arr)) => arr.clone(),
            _ => Vec::new(),
        };
        existing.extend(kids.iter().map(|&id| Object::Reference(id)));

        pages_dict.set("Kids", Object::Array(existing));
        pages_dict.set("Count", Object::Integer(count + kids.len() as i64));
        Ok(())
    }

    /// Draw `operations` on top of the page's existing content.
    ///
    /// Existing content is wrapped in `q`/`Q` so graphics state it leaves
    /// behind (transforms, colors) does not leak into the overlay.
    pub fn overlay(
        &mut self,
        page_id: ObjectId,
        operations: Vec<Operation>,
    ) -> Result<(), PdfToolsError> {
        let existing: Vec<Object> = match self.page_dict(page_id)?.get(b"Contents") {
            Ok(Object::Reference(id)) => match self.doc.get_object(*id) {
                Ok(Object::Array(items)) => items.clone(),
                _ => vec![Object::Reference(*id)],
            },
            Ok(Object::Array(items)) => items.clone(),
            _ => Vec::new(),
        };

        let mut ops = Vec::with_capacity(operations.len() + 1);
        if !existing.is_empty() {
            ops.push(Operation::new("Q", vec![]));
        }
        ops.extend(operations);
        let encoded = Content { operations: ops }.encode()?;
        let overlay_id = self
            .doc
            .add_object(Stream::new(Dictionary::new(), encoded));

        let contents = if existing.is_empty() {
            vec![Object::Reference(overlay_id)]
        } else {
            let open_id = self
                .doc
                .add_object(Stream::new(Dictionary::new(), b"q\n".to_vec()));
            let mut wrapped = Vec::with_capacity(existing.len() + 2);
            wrapped.push(Object::Reference(open_id));
            wrapped.extend(existing);
            wrapped.push(Object::Reference(overlay_id));
            wrapped
        };

        self.page_dict_mut(page_id)?
            .set("Contents", Object::Array(contents));
        Ok(())
    }

    /// Register Helvetica under [`FONT_RESOURCE`] on the page
    pub fn ensure_font(&mut self, page_id: ObjectId) -> Result<(), PdfToolsError> {
        let font_id = match self.font_id {
            Some(id) => id,
            None => {
                let id = self.doc.add_object(dictionary! {
                    "Type" => "Font",
                    "Subtype" => "Type1",
                    "BaseFont" => "Helvetica",
                    "Encoding" => "WinAnsiEncoding",
                });
                self.font_id = Some(id);
                id
            }
        };
        self.register_resource(page_id, "Font", FONT_RESOURCE, Object::Reference(font_id))
    }

    /// Register a constant-alpha graphics state for `opacity` on the page and
    /// return its resource name
    pub fn ensure_alpha(&mut self, page_id: ObjectId, opacity: f32) -> Result<String, PdfToolsError> {
        let permille = (opacity.clamp(0.0, 1.0) * 1000.0).round() as u16;
        let state_id = match self.alpha_states.get(&permille) {
            Some(id) => *id,
            None => {
                let alpha = Object::Real(f32::from(permille) / 1000.0);
                let id = self.doc.add_object(dictionary! {
                    "Type" => "ExtGState",
                    "CA" => alpha.clone(),
                    "ca" => alpha,
                });
                self.alpha_states.insert(permille, id);
                id
            }
        };
        let name = format!("PTGs{}", permille);
        self.register_resource(page_id, "ExtGState", &name, Object::Reference(state_id))?;
        Ok(name)
    }

    fn register_resource(
        &mut self,
        page_id: ObjectId,
        category: &str,
        name: &str,
        value: Object,
    ) -> Result<(), PdfToolsError> {
        let entry = self
            .resources_mut(page_id)?
            .get(category.as_bytes())
            .ok()
            .cloned();

        match entry {
            Some(Object::Reference(id)) => {
                let dict = self.doc.get_object_mut(id)?.as_dict_mut()?;
                dict.set(name, value);
            }
            Some(Object::Dictionary(mut dict)) => {
                dict.set(name, value);
                self.resources_mut(page_id)?.set(category, dict);
            }
            _ => {
                let mut dict = Dictionary::new();
                dict.set(name, value);
                self.resources_mut(page_id)?.set(category, dict);
            }
        }
        Ok(())
    }

    /// The page's resource dictionary, made editable.
    ///
    /// Inherited resources are copied inline onto the page so edits do not
    /// touch sibling pages through the shared ancestor.
    fn resources_mut(&mut self, page_id: ObjectId) -> Result<&mut Dictionary, PdfToolsError> {
        let indirect = match self.page_dict(page_id)?.get(b"Resources") {
            Ok(Object::Reference(id)) => Some(*id),
            Ok(Object::Dictionary(_)) => None,
            _ => {
                let inherited = self
                    .inherited(page_id, b"Resources")
                    .and_then(|r| self.resolve(&r).as_dict().ok().cloned())
                    .unwrap_or_else(Dictionary::new);
                self.page_dict_mut(page_id)?
                    .set("Resources", Object::Dictionary(inherited));
                None
            }
        };

        match indirect {
            Some(id) => self
                .doc
                .get_object_mut(id)?
                .as_dict_mut()
                .map_err(|_| PdfToolsError::OperationError("Invalid resource dictionary".into())),
            None => match self.page_dict_mut(page_id)?.get_mut(b"Resources") {
                Ok(Object::Dictionary(dict)) => Ok(dict),
                _ => Err(PdfToolsError::OperationError(
                    "Invalid resource dictionary".into(),
                )),
            },
        }
    }

    /// Entries of the document information dictionary
    pub fn info(&self) -> DocumentInfo {
        let Some(info) = self
            .doc
            .trailer
            .get(b"Info")
            .ok()
            .map(|obj| self.resolve(obj))
            .and_then(|obj| obj.as_dict().ok())
        else {
            return DocumentInfo::default();
        };

        let text = |key: &[u8]| -> Option<String> {
            match info.get(key).ok().map(|obj| self.resolve(obj)) {
                Some(Object::String(bytes, _)) => {
                    Some(decode_text_string(bytes)).filter(|s| !s.is_empty())
                }
                _ => None,
            }
        };

        DocumentInfo {
            title: text(b"Title"),
            author: text(b"Author"),
            subject: text(b"Subject"),
            keywords: text(b"Keywords"),
            creator: text(b"Creator"),
            producer: text(b"Producer"),
            creation_date: text(b"CreationDate"),
            modification_date: text(b"ModDate"),
        }
    }

    /// Serialize the document. The handle is consumed: nothing may mutate a
    /// document after it has been written out.
    pub fn save(mut self, options: SaveOptions) -> Result<Vec<u8>, PdfToolsError> {
        if options.strip_metadata {
            self.doc.trailer.remove(b"Info");
            if let Ok(catalog_id) = self.doc.trailer.get(b"Root").and_then(Object::as_reference) {
                if let Ok(catalog) = self
                    .doc
                    .get_object_mut(catalog_id)
                    .and_then(Object::as_dict_mut)
                {
                    catalog.remove(b"Metadata");
                }
            }
        }
        if options.prune {
            let removed = self.doc.prune_objects();
            let empty = self.doc.delete_zero_length_streams();
            debug!(
                "Pruned {} unreachable objects and {} empty streams",
                removed.len(),
                empty.len()
            );
        }
        if options.renumber {
            self.doc.renumber_objects();
        }
        if options.compress_streams {
            self.doc.compress();
        }

        let mut buffer = Vec::new();
        self.doc
            .save_to(&mut buffer)
            .map_err(|e| PdfToolsError::OperationError(format!("Failed to save PDF: {}", e)))?;
        Ok(buffer)
    }

    /// Save and package the bytes with the page count
    pub fn finish(self, options: SaveOptions) -> Result<PdfOutput, PdfToolsError> {
        let page_count = self.page_count();
        let bytes = self.save(options)?;
        Ok(PdfOutput::new(bytes, page_count))
    }
}

/// Copies objects reachable from a source page into a target document
struct ObjectCopier<'a> {
    source: &'a Document,
    target: &'a mut Document,
    /// Source id -> target id for everything copied so far
    map: HashMap<ObjectId, ObjectId>,
    /// Every page of the source; references to pages that are not being
    /// copied are dropped rather than dragging those pages along
    source_pages: HashSet<ObjectId>,
}

impl ObjectCopier<'_> {
    fn copy_reference(&mut self, id: ObjectId) -> Object {
        if let Some(&new_id) = self.map.get(&id) {
            return Object::Reference(new_id);
        }
        if self.source_pages.contains(&id) {
            return Object::Null;
        }

        let new_id = self.target.new_object_id();
        self.map.insert(id, new_id);

        let copied = match self.source.get_object(id) {
            Ok(object) => self.copy_value(object),
            Err(_) => Object::Null,
        };
        self.target.objects.insert(new_id, copied);
        Object::Reference(new_id)
    }

    fn copy_value(&mut self, value: &Object) -> Object {
        match value {
            Object::Reference(id) => self.copy_reference(*id),
            Object::Array(items) => Object::Array(items.iter().map(|o| self.copy_value(o)).collect()),
            Object::Dictionary(dict) => Object::Dictionary(self.copy_dict(dict)),
            Object::Stream(stream) => {
                let mut copied = stream.clone();
                copied.dict = self.copy_dict(&stream.dict);
                Object::Stream(copied)
            }
            other => other.clone(),
        }
    }

    fn copy_dict(&mut self, dict: &Dictionary) -> Dictionary {
        let is_tree_node = matches!(
            dict.get(b"Type"),
            Ok(Object::Name(name)) if name == b"Page" || name == b"Pages"
        );
        let mut copied = Dictionary::new();
        for (key, value) in dict.iter() {
            if is_tree_node && key == b"Parent" {
                continue;
            }
            copied.set(key.clone(), self.copy_value(value));
        }
        copied
    }
}

fn as_number(obj: &Object) -> Option<f32> {
    match obj {
        Object::Integer(i) => Some(*i as f32),
        Object::Real(r) => Some(*r),
        _ => None,
    }
}

/// Decode a PDF text string: UTF-16BE with a byte order mark, otherwise
/// treated as single-byte text
fn decode_text_string(bytes: &[u8]) -> String {
    if let Some(utf16) = bytes.strip_prefix(&[0xFE, 0xFF]) {
        let units: Vec<u16> = utf16
            .chunks_exact(2)
            .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
            .collect();
        return String::from_utf16_lossy(&units);
    }
    match std::str::from_utf8(bytes) {
        Ok(text) => text.to_string(),
        Err(_) => bytes.iter().map(|&b| char::from(b)).collect(),
    }
}
