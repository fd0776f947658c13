//! Flow layout of extracted blocks onto US-Letter pages
//!
//! Blocks are turned into Typst markup and compiled against an in-memory
//! world that exposes one source file and the embedded font set. Nothing is
//! read from disk and the clock is not consulted, so equal input gives equal
//! output.

use std::sync::OnceLock;

use typst::diag::{FileError, FileResult, SourceDiagnostic};
use typst::foundations::{Bytes, Datetime};
use typst::syntax::{FileId, Source, VirtualPath};
use typst::text::{Font, FontBook};
use typst::utils::LazyHash;
use typst::{Library, World};

use super::docx::Block;
use crate::error::PageMixError;

/// Emitted when a document has no non-blank paragraphs or rows
pub const EMPTY_DOCUMENT_TEXT: &str = "(empty document)";

const PREAMBLE: &str = "#set page(paper: \"us-letter\", margin: 1in)\n\
                        #set text(size: 11pt)\n\
                        #set par(justify: false)\n\n";

struct EmbeddedFonts {
    book: LazyHash<FontBook>,
    fonts: Vec<Font>,
}

static FONTS: OnceLock<EmbeddedFonts> = OnceLock::new();

fn embedded_fonts() -> &'static EmbeddedFonts {
    FONTS.get_or_init(|| {
        let mut book = FontBook::new();
        let mut fonts = Vec::new();
        for data in typst_assets::fonts() {
            for font in Font::iter(Bytes::from_static(data)) {
                book.push(font.info().clone());
                fonts.push(font);
            }
        }
        tracing::info!("Loaded {} embedded fonts for layout", fonts.len());
        EmbeddedFonts {
            book: LazyHash::new(book),
            fonts,
        }
    })
}

/// A single-file world for compiling generated markup
struct LayoutWorld {
    main: Source,
    library: LazyHash<Library>,
}

impl LayoutWorld {
    fn new(markup: String) -> Self {
        let id = FileId::new(None, VirtualPath::new("/main.typ"));
        Self {
            main: Source::new(id, markup),
            library: LazyHash::new(Library::builder().build()),
        }
    }
}

impl World for LayoutWorld {
    fn library(&self) -> &LazyHash<Library> {
        &self.library
    }

    fn book(&self) -> &LazyHash<FontBook> {
        &embedded_fonts().book
    }

    fn main(&self) -> FileId {
        self.main.id()
    }

    fn source(&self, id: FileId) -> FileResult<Source> {
        if id == self.main.id() {
            Ok(self.main.clone())
        } else {
            Err(FileError::NotFound(id.vpath().as_rootless_path().into()))
        }
    }

    fn file(&self, id: FileId) -> FileResult<Bytes> {
        Err(FileError::NotFound(id.vpath().as_rootless_path().into()))
    }

    fn font(&self, index: usize) -> Option<Font> {
        embedded_fonts().fonts.get(index).cloned()
    }

    fn today(&self, _offset: Option<i64>) -> Option<Datetime> {
        None
    }
}

/// Lay out `blocks` and export the result as PDF bytes
pub fn typeset(blocks: &[Block]) -> Result<Vec<u8>, PageMixError> {
    let world = LayoutWorld::new(markup(blocks));

    let warned = typst::compile(&world);
    let document = warned
        .output
        .map_err(|diags| PageMixError::Conversion(format!("layout failed: {}", describe(&diags))))?;

    tracing::debug!(pages = document.pages.len(), "Laid out converted document");

    typst_pdf::pdf(&document, &typst_pdf::PdfOptions::default())
        .map_err(|diags| PageMixError::Conversion(format!("PDF export failed: {}", describe(&diags))))
}

/// Typst markup for `blocks`, one paragraph per block
pub fn markup(blocks: &[Block]) -> String {
    let mut out = String::from(PREAMBLE);

    if blocks.is_empty() {
        push_paragraph(&mut out, EMPTY_DOCUMENT_TEXT);
        return out;
    }

    for block in blocks {
        match block {
            Block::Heading(text) => {
                out.push_str("#heading(level: 1, ");
                out.push_str(&string_literal(text));
                out.push_str(")\n\n");
            }
            Block::Body(text) | Block::TableRow(text) => push_paragraph(&mut out, text),
        }
    }
    out
}

fn push_paragraph(out: &mut String, text: &str) {
    out.push('#');
    out.push_str(&string_literal(text));
    out.push_str("\n\n");
}

/// Quote `text` as a Typst string so no character is read as markup
fn string_literal(text: &str) -> String {
    let mut literal = String::with_capacity(text.len() + 2);
    literal.push('"');
    for c in text.chars() {
        match c {
            '\\' => literal.push_str("\\\\"),
            '"' => literal.push_str("\\\""),
            '\n' | '\r' | '\t' => literal.push(' '),
            c if c.is_control() => {}
            c => literal.push(c),
        }
    }
    literal.push('"');
    literal
}

fn describe(diags: &[SourceDiagnostic]) -> String {
    diags
        .iter()
        .map(|d| d.message.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}
