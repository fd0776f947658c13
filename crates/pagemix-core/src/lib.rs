//! Page-level PDF ingestion and composition
//!
//! Uploads (PDF or DOCX) are normalized to PDF, kept in a short-lived
//! [`DocumentStore`], and previewed page by page. A [`Composer`] later builds a
//! new PDF from any ordered mix of stored pages, each with its own rotation.
//!
//! - [`Ingestor::ingest`]: bytes + filename -> id, page count, thumbnails
//! - [`Composer::compose`]: page selections -> PDF bytes
//! - [`spawn_sweeper`]: background reclamation of expired documents

pub mod compose;
pub mod config;
pub mod convert;
pub mod error;
pub mod ingest;
pub mod model;
pub mod preview;
pub mod selection;
pub mod store;
pub mod sweeper;

#[cfg(test)]
mod fixtures;

pub use compose::{Composer, Composition, SkippedEntry};
pub use config::PipelineConfig;
pub use convert::docx_to_pdf;
pub use error::PageMixError;
pub use ingest::{sanitize_filename, IngestedDocument, Ingestor};
pub use model::{PageDocument, Rotation};
pub use preview::{PageRasterizer, PdfiumRasterizer, Previewer};
pub use selection::{PageSelection, SkipReason};
pub use store::{BlobBackend, DocumentId, DocumentStore, FsBackend, MemoryBackend, StoredDocument, SweepReport};
pub use sweeper::spawn_sweeper;

/// Parse PDF bytes and return the page count
pub fn page_count(bytes: &[u8]) -> Result<usize, PageMixError> {
    Ok(PageDocument::from_bytes(bytes)?.page_count())
}
