//! Document ingestion
//!
//! Normalizes an upload into canonical PDF bytes, stores it, and renders a
//! thumbnail for every page.
//!
//! The algorithm:
//! 1. Check the filename's final extension against the allowed set
//! 2. Enforce the upload size cap
//! 3. Convert Word documents to PDF
//! 4. Parse the PDF to count its pages
//! 5. Sweep expired entries from the store
//! 6. Store the canonical bytes
//! 7. Render thumbnails in page order; any failure removes the new entry and
//!    fails the call

use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

use crate::config::PipelineConfig;
use crate::convert::docx_to_pdf;
use crate::error::PageMixError;
use crate::model::PageDocument;
use crate::preview::Previewer;
use crate::store::{DocumentId, DocumentStore};

/// Result of a successful ingestion
#[derive(Debug, Clone, Serialize)]
pub struct IngestedDocument {
    pub id: DocumentId,
    pub original_name: String,
    pub page_count: usize,
    /// `data:image/png;base64,...` tokens, one per page
    pub thumbnails: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SourceFormat {
    Pdf,
    Docx,
}

/// Runs uploads through conversion, storage and preview
#[derive(Clone)]
pub struct Ingestor {
    store: Arc<DocumentStore>,
    previewer: Previewer,
    config: PipelineConfig,
}

impl Ingestor {
    pub fn new(store: Arc<DocumentStore>, previewer: Previewer, config: PipelineConfig) -> Self {
        Self {
            store,
            previewer,
            config,
        }
    }

    pub fn store(&self) -> &Arc<DocumentStore> {
        &self.store
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Ingest `bytes` uploaded under `filename`
    pub fn ingest(&self, bytes: &[u8], filename: &str) -> Result<IngestedDocument, PageMixError> {
        let format = self.detect_format(filename)?;

        if bytes.len() > self.config.max_upload_size {
            return Err(PageMixError::TooLarge {
                size: bytes.len(),
                limit: self.config.max_upload_size,
            });
        }

        let converted;
        let pdf: &[u8] = match format {
            SourceFormat::Pdf => bytes,
            SourceFormat::Docx => {
                converted = docx_to_pdf(bytes)?;
                &converted
            }
        };

        let page_count = PageDocument::from_bytes(pdf)?.page_count();
        if page_count == 0 {
            return Err(PageMixError::Parse("document has no pages".into()));
        }

        if let Err(e) = self.store.sweep(Utc::now(), self.config.retention_ttl) {
            tracing::warn!(error = %e, "Opportunistic sweep failed");
        }

        let id = self.store.put(pdf)?;

        let thumbnails = match self.previewer.thumbnails(pdf, page_count) {
            Ok(thumbnails) => thumbnails,
            Err(e) => {
                if let Err(remove_err) = self.store.remove(&id) {
                    tracing::warn!(
                        document_id = %id,
                        error = %remove_err,
                        "Failed to remove document after preview failure"
                    );
                }
                return Err(e);
            }
        };

        let original_name = sanitize_filename(filename);
        tracing::info!(
            document_id = %id,
            original_name = %original_name,
            page_count,
            converted = format == SourceFormat::Docx,
            "Ingested document"
        );

        Ok(IngestedDocument {
            id,
            original_name,
            page_count,
            thumbnails,
        })
    }

    fn detect_format(&self, filename: &str) -> Result<SourceFormat, PageMixError> {
        if filename.trim().is_empty() {
            return Err(PageMixError::InvalidInput("No file selected".into()));
        }

        let extension = base_name(filename)
            .rsplit_once('.')
            .map(|(_, extension)| extension)
            .unwrap_or_default();

        if extension.is_empty() || !self.config.allows_extension(extension) {
            return Err(PageMixError::InvalidInput(format!(
                "File type not allowed: {}",
                filename
            )));
        }

        match extension.to_ascii_lowercase().as_str() {
            "pdf" => Ok(SourceFormat::Pdf),
            "docx" => Ok(SourceFormat::Docx),
            other => Err(PageMixError::InvalidInput(format!(
                "No converter for .{} files",
                other
            ))),
        }
    }
}

fn base_name(filename: &str) -> &str {
    filename.rsplit(['/', '\\']).next().unwrap_or(filename)
}

/// Make an upload filename safe to echo back and to use as a download name
///
/// Folds accented letters to their ASCII base, keeps `[A-Za-z0-9._-]`,
/// collapses every other run of characters into a single `_`, and drops
/// leading dots and underscores.
pub fn sanitize_filename(filename: &str) -> String {
    let mut safe = String::with_capacity(filename.len());
    let folded = base_name(filename)
        .nfkd()
        .filter(|c| !is_combining_mark(*c));
    for c in folded {
        if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
            safe.push(c);
        } else if !safe.ends_with('_') {
            safe.push('_');
        }
    }

    let trimmed = safe.trim_start_matches(['.', '_']);
    if trimmed.is_empty() {
        "document".to_string()
    } else {
        trimmed.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compose::Composer;
    use crate::fixtures::{docx_with_body, label_of, sample_docx, simple_pdf};
    use crate::preview::tests::{decode_width, StripeRasterizer};
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use std::time::Duration;

    fn ingestor_with(config: PipelineConfig, rasterizer: StripeRasterizer) -> Ingestor {
        let previewer = Previewer::new(Arc::new(rasterizer), config.preview_scale);
        Ingestor::new(Arc::new(DocumentStore::in_memory()), previewer, config)
    }

    fn ingestor() -> Ingestor {
        ingestor_with(PipelineConfig::default(), StripeRasterizer::default())
    }

    #[test]
    fn test_pdf_page_count_and_thumbnails_match() {
        let ingestor = ingestor();
        let result = ingestor.ingest(&simple_pdf(3, "Up"), "three pages.pdf").unwrap();

        assert_eq!(result.page_count, 3);
        assert_eq!(result.original_name, "three_pages.pdf");
        let widths: Vec<u32> = result.thumbnails.iter().map(|t| decode_width(t)).collect();
        assert_eq!(widths, vec![1, 2, 3]);

        let stored = ingestor.store().get(&result.id).unwrap();
        assert_eq!(stored.bytes, simple_pdf(3, "Up"));
    }

    #[test]
    fn test_upload_then_compose_with_rotation() {
        let ingestor = ingestor();
        let uploaded = ingestor.ingest(&simple_pdf(2, "Two"), "two.pdf").unwrap();
        assert_eq!(uploaded.page_count, 2);
        assert_eq!(uploaded.thumbnails.len(), 2);

        let id = uploaded.id.to_string();
        let composition = Composer::new(ingestor.store())
            .compose(&json!([
                {"source_id": id, "page_index": 0, "rotation": 90},
                {"source_id": id, "page_index": 1, "rotation": 0}
            ]))
            .unwrap();

        let output = PageDocument::from_bytes(&composition.pdf).unwrap();
        assert_eq!(output.page_count(), 2);
        assert_eq!(label_of(&output, 0), "Two-1");
        assert_eq!(output.page_rotation(0).unwrap().degrees(), 90);
        assert_eq!(label_of(&output, 1), "Two-2");
        assert_eq!(output.page_rotation(1).unwrap().degrees(), 0);
    }

    #[test]
    fn test_docx_with_heading_and_table_converts() {
        let ingestor = ingestor();
        let result = ingestor.ingest(&sample_docx(), "Report.DOCX").unwrap();

        assert!(result.page_count >= 1);
        assert_eq!(result.thumbnails.len(), result.page_count);

        let stored = ingestor.store().get(&result.id).unwrap();
        assert!(stored.bytes.starts_with(b"%PDF-"));
    }

    #[test]
    fn test_disallowed_extension_writes_nothing() {
        let ingestor = ingestor();
        for name in ["notes.txt", "no_extension", "trailing.", "archive.pdf.zip", ""] {
            let result = ingestor.ingest(&simple_pdf(1, "X"), name);
            assert!(
                matches!(result, Err(PageMixError::InvalidInput(_))),
                "{:?} was accepted",
                name
            );
        }
        assert!(ingestor.store().ids().unwrap().is_empty());
    }

    #[test]
    fn test_extension_check_ignores_case() {
        let ingestor = ingestor();
        let result = ingestor.ingest(&simple_pdf(1, "Caps"), "SCAN.PDF").unwrap();
        assert_eq!(result.original_name, "SCAN.PDF");
    }

    #[test]
    fn test_oversized_upload_is_rejected() {
        let config = PipelineConfig {
            max_upload_size: 16,
            ..Default::default()
        };
        let ingestor = ingestor_with(config, StripeRasterizer::default());

        let result = ingestor.ingest(&simple_pdf(1, "Big"), "big.pdf");
        assert!(matches!(
            result,
            Err(PageMixError::TooLarge { limit: 16, .. })
        ));
        assert!(ingestor.store().ids().unwrap().is_empty());
    }

    #[test]
    fn test_corrupt_inputs_write_nothing() {
        let ingestor = ingestor();

        let result = ingestor.ingest(b"%PDF-1.7 garbage", "broken.pdf");
        assert!(matches!(result, Err(PageMixError::Parse(_))));

        let result = ingestor.ingest(b"not a zip", "broken.docx");
        assert!(matches!(result, Err(PageMixError::Conversion(_))));

        assert!(ingestor.store().ids().unwrap().is_empty());
    }

    #[test]
    fn test_preview_failure_rolls_back_the_write() {
        let rasterizer = StripeRasterizer {
            fail_on: Some(1),
            ..Default::default()
        };
        let ingestor = ingestor_with(PipelineConfig::default(), rasterizer);

        let result = ingestor.ingest(&simple_pdf(3, "Fail"), "fail.pdf");
        assert!(matches!(result, Err(PageMixError::Preview { page: 1, .. })));
        assert!(ingestor.store().ids().unwrap().is_empty());
    }

    #[test]
    fn test_ingestion_sweeps_expired_entries_first() {
        let config = PipelineConfig {
            retention_ttl: Duration::from_millis(1),
            ..Default::default()
        };
        let ingestor = ingestor_with(config, StripeRasterizer::default());

        let stale = ingestor.store().put(b"stale").unwrap();
        std::thread::sleep(Duration::from_millis(20));

        let fresh = ingestor.ingest(&simple_pdf(1, "New"), "new.pdf").unwrap();

        assert!(ingestor.store().get(&stale).is_err());
        assert!(ingestor.store().get(&fresh.id).is_ok());
    }

    #[test]
    fn test_blank_docx_gets_placeholder_page() {
        let ingestor = ingestor();
        let result = ingestor
            .ingest(&docx_with_body("<w:p/>"), "blank.docx")
            .unwrap();
        assert_eq!(result.page_count, 1);
    }

    #[test]
    fn test_sanitize_filename() {
        assert_eq!(sanitize_filename("report.pdf"), "report.pdf");
        assert_eq!(sanitize_filename("my report (final).pdf"), "my_report_final_.pdf");
        assert_eq!(sanitize_filename("../../etc/passwd"), "passwd");
        assert_eq!(sanitize_filename("C:\\Users\\me\\cv.docx"), "cv.docx");
        assert_eq!(sanitize_filename(".hidden.pdf"), "hidden.pdf");
        assert_eq!(sanitize_filename("résumé.pdf"), "resume.pdf");
        assert_eq!(sanitize_filename("Ça Über naïve.docx"), "Ca_Uber_naive.docx");
        assert_eq!(sanitize_filename("ﬁle①.pdf"), "file1.pdf");
        assert_eq!(sanitize_filename("日本.pdf"), "pdf");
        assert_eq!(sanitize_filename("???"), "document");
    }
}
