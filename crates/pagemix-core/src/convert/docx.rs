//! DOCX block extraction
//!
//! A `.docx` file is a ZIP archive; the body lives in `word/document.xml` and
//! paragraph style names in `word/styles.xml`. Only the block structure is
//! read: paragraphs, their heading-ness, and table rows. Run formatting,
//! images and the table grid are dropped.

use std::collections::HashMap;
use std::io::{Cursor, Read, Seek};

use roxmltree::Node;
use zip::ZipArchive;

use crate::error::PageMixError;

const W_NS: &str = "http://schemas.openxmlformats.org/wordprocessingml/2006/main";

/// Separator between table cells when a row is flattened to one line
pub const CELL_SEPARATOR: &str = " | ";

/// One unit of flowed output
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Block {
    Heading(String),
    Body(String),
    TableRow(String),
}

/// Read the emittable blocks of a DOCX document
///
/// Every body paragraph comes first, in document order, followed by the rows
/// of every table in document order. Blank paragraphs and rows whose cells
/// are all blank produce no block.
pub fn read_blocks(bytes: &[u8]) -> Result<Vec<Block>, PageMixError> {
    let mut archive = ZipArchive::new(Cursor::new(bytes))
        .map_err(|e| PageMixError::Conversion(format!("not a DOCX archive: {}", e)))?;

    let document_xml = read_entry(&mut archive, "word/document.xml")?.ok_or_else(|| {
        PageMixError::Conversion("archive has no word/document.xml".into())
    })?;
    let style_names = match read_entry(&mut archive, "word/styles.xml")? {
        Some(styles_xml) => parse_style_names(&styles_xml)?,
        None => HashMap::new(),
    };

    let doc = roxmltree::Document::parse(&document_xml)
        .map_err(|e| PageMixError::Conversion(format!("invalid document.xml: {}", e)))?;

    let body = doc
        .descendants()
        .find(|n| is_w(n, "body"))
        .ok_or_else(|| PageMixError::Conversion("document.xml has no body".into()))?;

    let mut paragraphs = Vec::new();
    let mut rows = Vec::new();
    walk_container(body, &style_names, &mut paragraphs, &mut rows);

    paragraphs.append(&mut rows);
    Ok(paragraphs)
}

fn read_entry<R: Read + Seek>(
    archive: &mut ZipArchive<R>,
    name: &str,
) -> Result<Option<String>, PageMixError> {
    let mut file = match archive.by_name(name) {
        Ok(file) => file,
        Err(zip::result::ZipError::FileNotFound) => return Ok(None),
        Err(e) => {
            return Err(PageMixError::Conversion(format!(
                "failed to open {}: {}",
                name, e
            )))
        }
    };

    let mut content = String::new();
    file.read_to_string(&mut content)
        .map_err(|e| PageMixError::Conversion(format!("failed to read {}: {}", name, e)))?;
    Ok(Some(content))
}

/// Map of style id to display name (`Heading1` -> `heading 1`)
fn parse_style_names(styles_xml: &str) -> Result<HashMap<String, String>, PageMixError> {
    let doc = roxmltree::Document::parse(styles_xml)
        .map_err(|e| PageMixError::Conversion(format!("invalid styles.xml: {}", e)))?;

    let names = doc
        .descendants()
        .filter(|n| is_w(n, "style"))
        .filter_map(|style| {
            let id = style.attribute((W_NS, "styleId"))?;
            let name = style
                .children()
                .find(|c| is_w(c, "name"))
                .and_then(|c| c.attribute((W_NS, "val")))
                .unwrap_or(id);
            Some((id.to_string(), name.to_string()))
        })
        .collect();

    Ok(names)
}

fn walk_container(
    container: Node,
    style_names: &HashMap<String, String>,
    paragraphs: &mut Vec<Block>,
    rows: &mut Vec<Block>,
) {
    for child in container.children().filter(Node::is_element) {
        if is_w(&child, "p") {
            let text = paragraph_text(child);
            if text.trim().is_empty() {
                continue;
            }
            if is_heading(child, style_names) {
                paragraphs.push(Block::Heading(text.trim().to_string()));
            } else {
                paragraphs.push(Block::Body(text.trim().to_string()));
            }
        } else if is_w(&child, "tbl") {
            walk_table(child, rows);
        } else if is_w(&child, "sdt") {
            // Content controls wrap ordinary body content
            if let Some(content) = child.children().find(|c| is_w(c, "sdtContent")) {
                walk_container(content, style_names, paragraphs, rows);
            }
        }
    }
}

fn walk_table(table: Node, rows: &mut Vec<Block>) {
    for row in table.children().filter(|n| is_w(n, "tr")) {
        let cells: Vec<String> = row
            .children()
            .filter(|n| is_w(n, "tc"))
            .map(cell_text)
            .collect();

        if cells.iter().all(|cell| cell.is_empty()) {
            continue;
        }
        rows.push(Block::TableRow(cells.join(CELL_SEPARATOR)));
    }
}

fn cell_text(cell: Node) -> String {
    cell.children()
        .filter(|n| is_w(n, "p"))
        .map(paragraph_text)
        .map(|text| text.trim().to_string())
        .filter(|text| !text.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

fn paragraph_text(paragraph: Node) -> String {
    let mut text = String::new();
    for node in paragraph.descendants().filter(Node::is_element) {
        if is_w(&node, "t") {
            text.push_str(node.text().unwrap_or_default());
        } else if is_w(&node, "tab") || is_w(&node, "br") || is_w(&node, "cr") {
            text.push(' ');
        }
    }
    text
}

fn is_heading(paragraph: Node, style_names: &HashMap<String, String>) -> bool {
    let Some(style_id) = paragraph
        .children()
        .find(|n| is_w(n, "pPr"))
        .and_then(|ppr| ppr.children().find(|n| is_w(n, "pStyle")))
        .and_then(|style| style.attribute((W_NS, "val")))
    else {
        return false;
    };

    let name = style_names
        .get(style_id)
        .map(String::as_str)
        .unwrap_or(style_id);
    name.to_ascii_lowercase().starts_with("heading")
}

fn is_w(node: &Node, local_name: &str) -> bool {
    node.is_element()
        && node.tag_name().name() == local_name
        && node.tag_name().namespace() == Some(W_NS)
}
