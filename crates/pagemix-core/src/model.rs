//! Canonical page-addressable PDF model
//!
//! `PageDocument` wraps a `lopdf::Document` together with its flattened page
//! list, so every other component can address pages by zero-based index.
//!
//! Pages are imported *by value*: the copy owns every object it reaches, and
//! inherited page attributes are materialized on the copy. The source document
//! can be dropped as soon as the import returns.

use std::collections::{BTreeMap, HashSet, VecDeque};

use lopdf::{Dictionary, Document, Object, ObjectId};
use serde::Serialize;

use crate::error::PageMixError;

/// Page attributes that may be inherited from ancestors in the page tree.
const INHERITABLE_KEYS: [&[u8]; 4] = [b"Resources", b"MediaBox", b"CropBox", b"Rotate"];

/// Clockwise page rotation, always one of 0, 90, 180 or 270 degrees.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
pub struct Rotation(u16);

impl Rotation {
    pub const NONE: Rotation = Rotation(0);

    /// Normalize an arbitrary multiple of 90 (negative or above 360 included).
    ///
    /// Returns `None` for angles that are not quarter turns.
    pub fn from_degrees(degrees: i64) -> Option<Self> {
        if degrees % 90 != 0 {
            return None;
        }
        Some(Rotation(degrees.rem_euclid(360) as u16))
    }

    pub fn degrees(self) -> u16 {
        self.0
    }

    /// Combine with a further rotation, modulo 360.
    pub fn rotate_by(self, delta: Rotation) -> Rotation {
        Rotation((self.0 + delta.0) % 360)
    }
}

/// An in-memory PDF addressed as an ordered list of pages
#[derive(Debug, Clone)]
pub struct PageDocument {
    doc: Document,
    pages_root: ObjectId,
    pages: Vec<ObjectId>,
}

impl PageDocument {
    /// Create an empty document with a catalog and an empty page tree
    pub fn new() -> Self {
        let mut doc = Document::with_version("1.7");
        let pages_root = doc.new_object_id();

        let pages = Dictionary::from_iter(vec![
            ("Type", Object::Name(b"Pages".to_vec())),
            ("Count", Object::Integer(0)),
            ("Kids", Object::Array(Vec::new())),
        ]);
        doc.objects.insert(pages_root, Object::Dictionary(pages));

        let catalog = Dictionary::from_iter(vec![
            ("Type", Object::Name(b"Catalog".to_vec())),
            ("Pages", Object::Reference(pages_root)),
        ]);
        let catalog_id = doc.add_object(catalog);
        doc.trailer.set("Root", Object::Reference(catalog_id));

        Self {
            doc,
            pages_root,
            pages: Vec::new(),
        }
    }

    /// Parse PDF bytes
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, PageMixError> {
        let doc = Document::load_mem(bytes).map_err(|e| PageMixError::Parse(e.to_string()))?;

        if doc.trailer.has(b"Encrypt") {
            return Err(PageMixError::Parse(
                "encrypted documents are not supported".into(),
            ));
        }

        let pages_root = page_tree_root(&doc)?;
        let pages = doc.get_pages().into_values().collect();

        Ok(Self {
            doc,
            pages_root,
            pages,
        })
    }

    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    /// The page dictionary at `index`, as stored (inherited keys not applied)
    pub fn page_dictionary(&self, index: usize) -> Result<&Dictionary, PageMixError> {
        let page_id = self.page_id(index)?;
        self.doc.get_dictionary(page_id).map_err(|e| {
            PageMixError::Parse(format!("page {} is not a dictionary: {}", index, e))
        })
    }

    /// Effective rotation of a page, following page-tree inheritance
    ///
    /// Malformed `/Rotate` values read as no rotation.
    pub fn page_rotation(&self, index: usize) -> Result<Rotation, PageMixError> {
        let page_id = self.page_id(index)?;
        let rotation = self
            .inherited_attribute(page_id, b"Rotate")
            .and_then(|value| self.resolve_integer(&value))
            .and_then(Rotation::from_degrees)
            .unwrap_or_default();
        Ok(rotation)
    }

    /// Override the rotation stored on the page at `index`
    pub fn set_rotation(&mut self, index: usize, rotation: Rotation) -> Result<(), PageMixError> {
        let page_id = self.page_id(index)?;
        match self.doc.objects.get_mut(&page_id) {
            Some(Object::Dictionary(page)) => {
                page.set("Rotate", Object::Integer(i64::from(rotation.degrees())));
                Ok(())
            }
            _ => Err(PageMixError::OperationError(format!(
                "page {} is not a dictionary",
                index
            ))),
        }
    }

    /// Copy page `index` of `source` to the end of this document
    ///
    /// The algorithm:
    /// 1. Clone the page dictionary and materialize inherited attributes on it
    /// 2. Walk the reference graph from the page, skipping page-tree nodes
    /// 3. Allocate fresh object ids for everything reached
    /// 4. Insert the remapped objects; references to pages that were not
    ///    imported (link targets, `/Parent`) become `null`
    /// 5. Attach the copy to this document's page tree
    ///
    /// Returns the index of the new page.
    pub fn import_page(&mut self, source: &PageDocument, index: usize) -> Result<usize, PageMixError> {
        let source_page_id = source.page_id(index)?;
        let mut page = source.page_dictionary(index)?.clone();

        for key in INHERITABLE_KEYS {
            if !page.has(key) {
                if let Some(value) = source.inherited_attribute(source_page_id, key) {
                    page.set(key.to_vec(), value);
                }
            }
        }
        page.remove(b"Parent");

        let other_pages: HashSet<ObjectId> = source.pages.iter().copied().collect();
        let new_page_id = self.doc.new_object_id();

        let mut id_map = BTreeMap::new();
        id_map.insert(source_page_id, new_page_id);

        let mut queue = VecDeque::new();
        for (_, value) in page.iter() {
            collect_references(value, &mut queue);
        }

        while let Some(id) = queue.pop_front() {
            if id_map.contains_key(&id) || other_pages.contains(&id) {
                continue;
            }
            let Ok(object) = source.doc.get_object(id) else {
                continue;
            };
            if is_page_tree_node(object) {
                continue;
            }
            id_map.insert(id, self.doc.new_object_id());
            collect_references(object, &mut queue);
        }

        for (&old_id, &new_id) in &id_map {
            if old_id == source_page_id {
                continue;
            }
            if let Ok(object) = source.doc.get_object(old_id) {
                let copied = remap_references(object.clone(), &id_map);
                self.doc.objects.insert(new_id, copied);
            }
        }

        let mut page = remap_dictionary(page, &id_map);
        page.set("Parent", Object::Reference(self.pages_root));
        self.doc.objects.insert(new_page_id, Object::Dictionary(page));

        self.attach_page(new_page_id)?;
        Ok(self.pages.len() - 1)
    }

    /// Serialize to PDF bytes
    pub fn to_bytes(&mut self) -> Result<Vec<u8>, PageMixError> {
        self.doc.compress();

        let mut buffer = Vec::new();
        self.doc
            .save_to(&mut buffer)
            .map_err(|e| PageMixError::OperationError(format!("Failed to save PDF: {}", e)))?;

        Ok(buffer)
    }

    fn page_id(&self, index: usize) -> Result<ObjectId, PageMixError> {
        self.pages.get(index).copied().ok_or_else(|| {
            PageMixError::InvalidInput(format!(
                "page {} does not exist (document has {} pages)",
                index,
                self.pages.len()
            ))
        })
    }

    /// Append a page object to the root page-tree node
    fn attach_page(&mut self, page_id: ObjectId) -> Result<(), PageMixError> {
        let Some(Object::Dictionary(tree)) = self.doc.objects.get_mut(&self.pages_root) else {
            return Err(PageMixError::OperationError(
                "Invalid pages dictionary".into(),
            ));
        };

        let mut kids = match tree.get(b"Kids") {
            Ok(Object::Array(kids)) => kids.clone(),
            _ => Vec::new(),
        };
        kids.push(Object::Reference(page_id));
        let count = match tree.get(b"Count") {
            Ok(Object::Integer(count)) => count + 1,
            _ => kids.len() as i64,
        };
        tree.set("Kids", Object::Array(kids));
        tree.set("Count", Object::Integer(count));

        self.pages.push(page_id);
        Ok(())
    }

    /// Look up `key` on the page, then on each ancestor in the page tree
    fn inherited_attribute(&self, page_id: ObjectId, key: &[u8]) -> Option<Object> {
        let mut visited = HashSet::new();
        let mut current = Some(page_id);

        while let Some(id) = current {
            if !visited.insert(id) {
                break;
            }
            let node = self.doc.get_dictionary(id).ok()?;
            if let Ok(value) = node.get(key) {
                return Some(value.clone());
            }
            current = node.get(b"Parent").and_then(|p| p.as_reference()).ok();
        }

        None
    }

    fn resolve_integer(&self, value: &Object) -> Option<i64> {
        match value {
            Object::Integer(value) => Some(*value),
            Object::Real(value) => Some(*value as i64),
            Object::Reference(id) => match self.doc.get_object(*id).ok()? {
                Object::Integer(value) => Some(*value),
                Object::Real(value) => Some(*value as i64),
                _ => None,
            },
            _ => None,
        }
    }
}

impl Default for PageDocument {
    fn default() -> Self {
        Self::new()
    }
}

/// Find the root `/Pages` node through the trailer and catalog
fn page_tree_root(doc: &Document) -> Result<ObjectId, PageMixError> {
    let catalog_id = doc
        .trailer
        .get(b"Root")
        .and_then(|root| root.as_reference())
        .map_err(|_| PageMixError::Parse("No Root in trailer".into()))?;

    doc.get_dictionary(catalog_id)
        .and_then(|catalog| catalog.get(b"Pages"))
        .and_then(|pages| pages.as_reference())
        .map_err(|_| PageMixError::Parse("No page tree in catalog".into()))
}

fn is_page_tree_node(object: &Object) -> bool {
    let dict = match object {
        Object::Dictionary(dict) => dict,
        _ => return false,
    };
    matches!(
        dict.get(b"Type"),
        Ok(Object::Name(name)) if name == b"Page" || name == b"Pages" || name == b"Catalog"
    )
}

fn collect_references(object: &Object, queue: &mut VecDeque<ObjectId>) {
    match object {
        Object::Reference(id) => queue.push_back(*id),
        Object::Array(items) => {
            for item in items {
                collect_references(item, queue);
            }
        }
        Object::Dictionary(dict) => {
            for (_, value) in dict.iter() {
                collect_references(value, queue);
            }
        }
        Object::Stream(stream) => {
            for (_, value) in stream.dict.iter() {
                collect_references(value, queue);
            }
        }
        _ => {}
    }
}

/// Rewrite references through `id_map`; unmapped references become `null`
fn remap_references(object: Object, id_map: &BTreeMap<ObjectId, ObjectId>) -> Object {
    match object {
        Object::Reference(id) => match id_map.get(&id) {
            Some(&new_id) => Object::Reference(new_id),
            None => Object::Null,
        },
        Object::Array(items) => Object::Array(
            items
                .into_iter()
                .map(|item| remap_references(item, id_map))
                .collect(),
        ),
        Object::Dictionary(dict) => Object::Dictionary(remap_dictionary(dict, id_map)),
        Object::Stream(mut stream) => {
            stream.dict = remap_dictionary(stream.dict, id_map);
            Object::Stream(stream)
        }
        other => other,
    }
}

fn remap_dictionary(mut dict: Dictionary, id_map: &BTreeMap<ObjectId, ObjectId>) -> Dictionary {
    for (_, value) in dict.iter_mut() {
        *value = remap_references(std::mem::replace(value, Object::Null), id_map);
    }
    dict
}
