//! Small in-memory PDFs for unit tests

use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Dictionary, Document, Object, ObjectId, Stream, StringFormat};

/// One page of a fixture document
#[derive(Debug, Clone)]
pub struct PageSpecFixture {
    pub text: String,
    pub width: f32,
    pub height: f32,
    pub rotate: Option<i64>,
}

impl PageSpecFixture {
    pub fn letter(text: &str) -> Self {
        Self {
            text: text.to_string(),
            width: 612.0,
            height: 792.0,
            rotate: None,
        }
    }

    pub fn with_size(mut self, width: f32, height: f32) -> Self {
        self.width = width;
        self.height = height;
        self
    }

    pub fn with_rotation(mut self, degrees: i64) -> Self {
        self.rotate = Some(degrees);
        self
    }
}

fn text_content(text: &str) -> Vec<u8> {
    Content {
        operations: vec![
            Operation::new("BT", vec![]),
            Operation::new("Tf", vec![Object::Name(b"F1".to_vec()), Object::Integer(12)]),
            Operation::new("Td", vec![Object::Integer(100), Object::Integer(700)]),
            Operation::new(
                "Tj",
                vec![Object::String(text.as_bytes().to_vec(), StringFormat::Literal)],
            ),
            Operation::new("ET", vec![]),
        ],
    }
    .encode()
    .unwrap()
}

fn font_resources(doc: &mut Document) -> ObjectId {
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Courier",
    });
    doc.add_object(dictionary! {
        "Font" => dictionary! { "F1" => Object::Reference(font_id) },
    })
}

fn finish(mut doc: Document, pages_id: ObjectId, pages: Dictionary) -> Vec<u8> {
    doc.objects.insert(pages_id, Object::Dictionary(pages));
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => Object::Reference(pages_id),
    });
    doc.trailer.set("Root", Object::Reference(catalog_id));

    let mut buffer = Vec::new();
    doc.save_to(&mut buffer).unwrap();
    buffer
}

/// A document whose pages all share one font resource dictionary
pub fn build_pdf(pages: &[PageSpecFixture]) -> Vec<u8> {
    let mut doc = Document::with_version("1.7");
    let pages_id = doc.new_object_id();
    let resources_id = font_resources(&mut doc);

    let mut kids = Vec::new();
    for spec in pages {
        let content_id = doc.add_object(Stream::new(Dictionary::new(), text_content(&spec.text)));
        let mut page = dictionary! {
            "Type" => "Page",
            "Parent" => Object::Reference(pages_id),
            "MediaBox" => vec![0.into(), 0.into(), Object::Real(spec.width), Object::Real(spec.height)],
            "Contents" => Object::Reference(content_id),
            "Resources" => Object::Reference(resources_id),
        };
        if let Some(rotate) = spec.rotate {
            page.set("Rotate", Object::Integer(rotate));
        }
        kids.push(Object::Reference(doc.add_object(page)));
    }

    let count = kids.len() as i64;
    finish(
        doc,
        pages_id,
        dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => count,
        },
    )
}

/// `count` Letter pages labelled "Page 1", "Page 2", ...
pub fn build_numbered_pdf(count: u32) -> Vec<u8> {
    let pages: Vec<PageSpecFixture> = (1..=count)
        .map(|n| PageSpecFixture::letter(&format!("Page {}", n)))
        .collect();
    build_pdf(&pages)
}

/// Pages that carry no MediaBox, Rotate or Resources of their own; all three
/// sit on the page tree root (MediaBox 400x500)
pub fn build_pdf_with_inherited_attributes(count: u32, rotate: i64) -> Vec<u8> {
    let mut doc = Document::with_version("1.7");
    let pages_id = doc.new_object_id();
    let resources_id = font_resources(&mut doc);

    let mut kids = Vec::new();
    for n in 1..=count {
        let content_id = doc.add_object(Stream::new(
            Dictionary::new(),
            text_content(&format!("Inherited {}", n)),
        ));
        kids.push(Object::Reference(doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => Object::Reference(pages_id),
            "Contents" => Object::Reference(content_id),
        })));
    }

    finish(
        doc,
        pages_id,
        dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => i64::from(count),
            "MediaBox" => vec![0.into(), 0.into(), 400.into(), 500.into()],
            "Rotate" => rotate,
            "Resources" => Object::Reference(resources_id),
        },
    )
}

/// A one-page document with an Info dictionary; the author is stored as
/// UTF-16BE to exercise text string decoding
pub fn build_pdf_with_info(title: &str, author: &str) -> Vec<u8> {
    let bytes = build_pdf(&[PageSpecFixture::letter("Info")]);
    let mut doc = Document::load_mem(&bytes).unwrap();

    let mut utf16 = vec![0xFE, 0xFF];
    for unit in author.encode_utf16() {
        utf16.extend_from_slice(&unit.to_be_bytes());
    }
    let info_id = doc.add_object(dictionary! {
        "Title" => Object::String(title.as_bytes().to_vec(), StringFormat::Literal),
        "Author" => Object::String(utf16, StringFormat::Hexadecimal),
        "CreationDate" => Object::String(b"D:20240315093000+01'00'".to_vec(), StringFormat::Literal),
    });
    doc.trailer.set("Info", Object::Reference(info_id));

    let mut buffer = Vec::new();
    doc.save_to(&mut buffer).unwrap();
    buffer
}

/// Decoded content of a page as lossy UTF-8
pub fn page_text(doc: &Document, page_id: ObjectId) -> String {
    String::from_utf8_lossy(&doc.get_page_content(page_id).unwrap()).into_owned()
}

/// Decoded content of every page, in page order
pub fn all_page_texts(bytes: &[u8]) -> Vec<String> {
    let doc = Document::load_mem(bytes).unwrap();
    doc.get_pages()
        .values()
        .map(|id| page_text(&doc, *id))
        .collect()
}
