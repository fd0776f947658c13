//! Shared PDF builders for integration tests

use lopdf::{content::Content, content::Operation, Dictionary, Document, Object, Stream};
use pagemix_core::PageDocument;

/// One page per entry of `rotations`, labelled `{prefix}-1`, `{prefix}-2`, ...
pub fn labelled_pdf(prefix: &str, rotations: &[i64]) -> Vec<u8> {
    let mut doc = Document::with_version("1.7");
    let pages_id = doc.new_object_id();

    let kids: Vec<Object> = rotations
        .iter()
        .enumerate()
        .map(|(i, rotation)| {
            let label = format!("{}-{}", prefix, i + 1);
            let content = Content {
                operations: vec![
                    Operation::new("BT", vec![]),
                    Operation::new("Tj", vec![Object::string_literal(label.clone())]),
                    Operation::new("ET", vec![]),
                ],
            };
            let content_id = doc.add_object(Stream::new(Dictionary::new(), content.encode().unwrap()));
            let page = Dictionary::from_iter(vec![
                ("Type", Object::Name(b"Page".to_vec())),
                ("Parent", Object::Reference(pages_id)),
                (
                    "MediaBox",
                    Object::Array(vec![
                        Object::Integer(0),
                        Object::Integer(0),
                        Object::Integer(612),
                        Object::Integer(792),
                    ]),
                ),
                ("Contents", Object::Reference(content_id)),
                ("Rotate", Object::Integer(*rotation)),
                ("TestLabel", Object::string_literal(label)),
            ]);
            Object::Reference(doc.add_object(page))
        })
        .collect();

    let pages = Dictionary::from_iter(vec![
        ("Type", Object::Name(b"Pages".to_vec())),
        ("Count", Object::Integer(rotations.len() as i64)),
        ("Kids", Object::Array(kids)),
    ]);
    doc.objects.insert(pages_id, Object::Dictionary(pages));

    let catalog_id = doc.add_object(Dictionary::from_iter(vec![
        ("Type", Object::Name(b"Catalog".to_vec())),
        ("Pages", Object::Reference(pages_id)),
    ]));
    doc.trailer.set("Root", Object::Reference(catalog_id));

    let mut buffer = Vec::new();
    doc.save_to(&mut buffer).unwrap();
    buffer
}

/// `(label, rotation)` for every page of `pdf`
pub fn page_summary(pdf: &[u8]) -> Vec<(String, u16)> {
    let doc = PageDocument::from_bytes(pdf).unwrap();
    (0..doc.page_count())
        .map(|i| {
            let label = match doc.page_dictionary(i).unwrap().get(b"TestLabel") {
                Ok(Object::String(bytes, _)) => String::from_utf8_lossy(bytes).into_owned(),
                other => panic!("page {} has no label: {:?}", i, other),
            };
            (label, doc.page_rotation(i).unwrap().degrees())
        })
        .collect()
}
