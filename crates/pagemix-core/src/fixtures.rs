//! Hand-built PDFs for unit tests

use lopdf::{content::Content, content::Operation, Dictionary, Document, Object, Stream};

use crate::model::PageDocument;

fn letter_media_box() -> Object {
    Object::Array(vec![
        Object::Integer(0),
        Object::Integer(0),
        Object::Integer(612),
        Object::Integer(792),
    ])
}

fn font_resources(doc: &mut Document) -> Object {
    let font_id = doc.add_object(Dictionary::from_iter(vec![
        ("Type", Object::Name(b"Font".to_vec())),
        ("Subtype", Object::Name(b"Type1".to_vec())),
        ("BaseFont", Object::Name(b"Helvetica".to_vec())),
    ]));
    Object::Dictionary(Dictionary::from_iter(vec![(
        "Font",
        Object::Dictionary(Dictionary::from_iter(vec![("F1", Object::Reference(font_id))])),
    )]))
}

fn text_content(doc: &mut Document, text: &str) -> Object {
    let content = Content {
        operations: vec![
            Operation::new("BT", vec![]),
            Operation::new(
                "Tf",
                vec![Object::Name(b"F1".to_vec()), Object::Integer(12)],
            ),
            Operation::new("Td", vec![Object::Integer(100), Object::Integer(700)]),
            Operation::new("Tj", vec![Object::string_literal(text)]),
            Operation::new("ET", vec![]),
        ],
    };
    let content_id = doc.add_object(Stream::new(
        Dictionary::new(),
        content.encode().unwrap(),
    ));
    Object::Reference(content_id)
}

fn finish(mut doc: Document, pages_id: lopdf::ObjectId) -> Vec<u8> {
    let catalog_id = doc.add_object(Dictionary::from_iter(vec![
        ("Type", Object::Name(b"Catalog".to_vec())),
        ("Pages", Object::Reference(pages_id)),
    ]));
    doc.trailer.set("Root", Object::Reference(catalog_id));

    let mut buffer = Vec::new();
    doc.save_to(&mut buffer).unwrap();
    buffer
}

/// A flat page tree whose pages carry the given `/Rotate` values and are
/// labelled `Page-1`, `Page-2`, ...
pub fn pdf_with_rotations(rotations: &[i64]) -> Vec<u8> {
    labelled_pdf(rotations, "Page")
}

/// `num_pages` unrotated pages labelled `{prefix}-1`, `{prefix}-2`, ...
pub fn simple_pdf(num_pages: usize, prefix: &str) -> Vec<u8> {
    labelled_pdf(&vec![0; num_pages], prefix)
}

fn labelled_pdf(rotations: &[i64], prefix: &str) -> Vec<u8> {
    let mut doc = Document::with_version("1.7");
    let pages_id = doc.new_object_id();
    let resources = font_resources(&mut doc);

    let mut kids = Vec::new();
    for (i, rotation) in rotations.iter().enumerate() {
        let label = format!("{}-{}", prefix, i + 1);
        let contents = text_content(&mut doc, &label);
        let page = Dictionary::from_iter(vec![
            ("Type", Object::Name(b"Page".to_vec())),
            ("Parent", Object::Reference(pages_id)),
            ("MediaBox", letter_media_box()),
            ("Resources", resources.clone()),
            ("Contents", contents),
            ("Rotate", Object::Integer(*rotation)),
            ("TestLabel", Object::string_literal(label)),
        ]);
        kids.push(Object::Reference(doc.add_object(page)));
    }

    let pages = Dictionary::from_iter(vec![
        ("Type", Object::Name(b"Pages".to_vec())),
        ("Count", Object::Integer(rotations.len() as i64)),
        ("Kids", Object::Array(kids)),
    ]);
    doc.objects.insert(pages_id, Object::Dictionary(pages));

    finish(doc, pages_id)
}

/// Two-level page tree: `/Rotate`, `/MediaBox` and `/Resources` live on the
/// intermediate node only, so every page inherits them.
pub fn nested_tree_pdf(num_pages: usize, rotation: i64) -> Vec<u8> {
    let mut doc = Document::with_version("1.7");
    let root_id = doc.new_object_id();
    let branch_id = doc.new_object_id();
    let resources = font_resources(&mut doc);

    let mut kids = Vec::new();
    for i in 0..num_pages {
        let label = format!("Nested-{}", i + 1);
        let contents = text_content(&mut doc, &label);
        let page = Dictionary::from_iter(vec![
            ("Type", Object::Name(b"Page".to_vec())),
            ("Parent", Object::Reference(branch_id)),
            ("Contents", contents),
            ("TestLabel", Object::string_literal(label)),
        ]);
        kids.push(Object::Reference(doc.add_object(page)));
    }

    let branch = Dictionary::from_iter(vec![
        ("Type", Object::Name(b"Pages".to_vec())),
        ("Parent", Object::Reference(root_id)),
        ("Count", Object::Integer(num_pages as i64)),
        ("Kids", Object::Array(kids)),
        ("MediaBox", letter_media_box()),
        ("Resources", resources),
        ("Rotate", Object::Integer(rotation)),
    ]);
    doc.objects.insert(branch_id, Object::Dictionary(branch));

    let root = Dictionary::from_iter(vec![
        ("Type", Object::Name(b"Pages".to_vec())),
        ("Count", Object::Integer(num_pages as i64)),
        ("Kids", Object::Array(vec![Object::Reference(branch_id)])),
    ]);
    doc.objects.insert(root_id, Object::Dictionary(root));

    finish(doc, root_id)
}

const STYLES_XML: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<w:styles xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main">
  <w:style w:type="paragraph" w:styleId="Normal"><w:name w:val="Normal"/></w:style>
  <w:style w:type="paragraph" w:styleId="Heading1"><w:name w:val="heading 1"/></w:style>
  <w:style w:type="paragraph" w:styleId="Titre1"><w:name w:val="heading 1"/></w:style>
  <w:style w:type="paragraph" w:styleId="Quote"><w:name w:val="Quote"/></w:style>
</w:styles>"#;

/// A minimal DOCX archive whose `<w:body>` holds `body_xml`
pub fn docx_with_body(body_xml: &str) -> Vec<u8> {
    use std::io::{Cursor, Write};
    use zip::write::SimpleFileOptions;

    let document = format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main"><w:body>{}</w:body></w:document>"#,
        body_xml
    );

    let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default();
    writer.start_file("word/document.xml", options).unwrap();
    writer.write_all(document.as_bytes()).unwrap();
    writer.start_file("word/styles.xml", options).unwrap();
    writer.write_all(STYLES_XML.as_bytes()).unwrap();
    writer.finish().unwrap().into_inner()
}

/// Heading, one body paragraph and a two-row table
pub fn sample_docx() -> Vec<u8> {
    docx_with_body(
        r#"<w:p><w:pPr><w:pStyle w:val="Heading1"/></w:pPr><w:r><w:t>Title</w:t></w:r></w:p>
           <w:p><w:r><w:t>Hello world</w:t></w:r></w:p>
           <w:tbl>
             <w:tr><w:tc><w:p><w:r><w:t>a</w:t></w:r></w:p></w:tc><w:tc><w:p><w:r><w:t>b</w:t></w:r></w:p></w:tc></w:tr>
             <w:tr><w:tc><w:p><w:r><w:t>c</w:t></w:r></w:p></w:tc><w:tc><w:p><w:r><w:t>d</w:t></w:r></w:p></w:tc></w:tr>
           </w:tbl>"#,
    )
}

/// The `TestLabel` string stored on page `index`
pub fn label_of(doc: &PageDocument, index: usize) -> String {
    match doc.page_dictionary(index).unwrap().get(b"TestLabel") {
        Ok(Object::String(bytes, _)) => String::from_utf8_lossy(bytes).into_owned(),
        other => panic!("page {} has no label: {:?}", index, other),
    }
}
