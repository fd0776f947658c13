//! Word document to PDF conversion
//!
//! Conversion is lossy: only paragraph text, heading-ness and table row text
//! survive, flowed onto US-Letter pages with one inch margins.

pub mod docx;
pub mod layout;

pub use docx::{read_blocks, Block};

use crate::error::PageMixError;

/// Convert DOCX bytes to a PDF
pub fn docx_to_pdf(bytes: &[u8]) -> Result<Vec<u8>, PageMixError> {
    let blocks = read_blocks(bytes)?;
    tracing::debug!(blocks = blocks.len(), "Extracted DOCX blocks");
    layout::typeset(&blocks)
}
