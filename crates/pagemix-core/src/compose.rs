//! Page composition
//!
//! Builds a new PDF from an ordered list of page selections drawn from stored
//! documents.
//!
//! The algorithm:
//! 1. Reject the call if the request is not a list, or is an empty list
//! 2. For each entry, in order:
//!    a. Validate its shape; a malformed entry is skipped
//!    b. Fetch and parse the source document (at most once per call)
//!    c. Range-check the page index
//!    d. Import the page by value and set its rotation to
//!       `origin + delta (mod 360)`
//! 3. Fail with `NoValidPages` if nothing was appended, otherwise serialize
//!
//! Skipped entries never abort the batch; only storage I/O failures do.

use std::collections::HashMap;

use serde_json::Value;

use crate::error::PageMixError;
use crate::model::PageDocument;
use crate::selection::{parse_entries, PageSelection, SkipReason};
use crate::store::{DocumentId, DocumentStore};

/// An entry that contributed no page, with its position in the request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedEntry {
    pub position: usize,
    pub reason: SkipReason,
}

/// A successfully composed PDF
#[derive(Debug, Clone)]
pub struct Composition {
    pub pdf: Vec<u8>,
    pub page_count: usize,
    pub skipped: Vec<SkippedEntry>,
}

enum Outcome {
    Appended,
    Skipped(SkipReason),
}

/// Composes output documents from pages held in a [`DocumentStore`]
#[derive(Debug, Clone, Copy)]
pub struct Composer<'a> {
    store: &'a DocumentStore,
}

impl<'a> Composer<'a> {
    pub fn new(store: &'a DocumentStore) -> Self {
        Self { store }
    }

    /// Compose the pages named by `request`, a JSON list of
    /// `{source_id | file_id, page_index, rotation?}` entries
    pub fn compose(&self, request: &Value) -> Result<Composition, PageMixError> {
        let entries = parse_entries(request)?;

        let mut output = PageDocument::new();
        let mut sources: HashMap<String, Result<PageDocument, SkipReason>> = HashMap::new();
        let mut skipped = Vec::new();

        for (position, entry) in entries.into_iter().enumerate() {
            let outcome = match entry {
                Ok(selection) => self.append(&mut output, &mut sources, &selection)?,
                Err(reason) => Outcome::Skipped(reason),
            };

            if let Outcome::Skipped(reason) = outcome {
                tracing::debug!(position, reason = %reason, "Skipping page selection");
                skipped.push(SkippedEntry { position, reason });
            }
        }

        if output.page_count() == 0 {
            tracing::info!(skipped = skipped.len(), "Composition produced no pages");
            return Err(PageMixError::NoValidPages);
        }

        let pdf = output.to_bytes()?;
        tracing::info!(
            pages = output.page_count(),
            skipped = skipped.len(),
            size = pdf.len(),
            "Composed document"
        );

        Ok(Composition {
            pdf,
            page_count: output.page_count(),
            skipped,
        })
    }

    fn append(
        &self,
        output: &mut PageDocument,
        sources: &mut HashMap<String, Result<PageDocument, SkipReason>>,
        selection: &PageSelection,
    ) -> Result<Outcome, PageMixError> {
        if !sources.contains_key(&selection.source_id) {
            let loaded = self.load_source(&selection.source_id)?;
            sources.insert(selection.source_id.clone(), loaded);
        }
        let source = match sources.get(&selection.source_id) {
            Some(Ok(source)) => source,
            Some(Err(reason)) => return Ok(Outcome::Skipped(reason.clone())),
            None => {
                return Ok(Outcome::Skipped(SkipReason::SourceNotFound {
                    source_id: selection.source_id.clone(),
                }))
            }
        };

        let page_count = source.page_count();
        let Some(index) = usize::try_from(selection.page_index)
            .ok()
            .filter(|&index| index < page_count)
        else {
            return Ok(Outcome::Skipped(SkipReason::PageOutOfRange {
                page_index: selection.page_index,
                page_count,
            }));
        };

        let origin = match source.page_rotation(index) {
            Ok(rotation) => rotation,
            Err(e) => {
                return Ok(Outcome::Skipped(SkipReason::ImportFailed {
                    message: e.to_string(),
                }))
            }
        };

        let copied = match output.import_page(source, index) {
            Ok(copied) => copied,
            Err(e) => {
                return Ok(Outcome::Skipped(SkipReason::ImportFailed {
                    message: e.to_string(),
                }))
            }
        };
        output.set_rotation(copied, origin.rotate_by(selection.rotation))?;

        Ok(Outcome::Appended)
    }

    /// Fetch and parse a source; only storage failures are errors
    fn load_source(&self, source_id: &str) -> Result<Result<PageDocument, SkipReason>, PageMixError> {
        let not_found = || SkipReason::SourceNotFound {
            source_id: source_id.to_string(),
        };

        let Ok(id) = source_id.parse::<DocumentId>() else {
            return Ok(Err(not_found()));
        };

        let stored = match self.store.get(&id) {
            Ok(stored) => stored,
            Err(PageMixError::NotFound(_)) => return Ok(Err(not_found())),
            Err(e) => return Err(e),
        };

        Ok(PageDocument::from_bytes(&stored.bytes).map_err(|e| {
            tracing::warn!(document_id = %id, error = %e, "Stored document failed to parse");
            SkipReason::SourceUnparsable {
                source_id: source_id.to_string(),
                message: e.to_string(),
            }
        }))
    }
}
