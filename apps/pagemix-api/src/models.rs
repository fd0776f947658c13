//! Wire models for the PageMix API

use pagemix_core::IngestedDocument;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Response to `POST /upload`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadResponse {
    pub file_id: String,
    pub original_name: String,
    pub page_count: usize,
    pub thumbnails: Vec<String>,
}

impl From<IngestedDocument> for UploadResponse {
    fn from(doc: IngestedDocument) -> Self {
        Self {
            file_id: doc.id.to_string(),
            original_name: doc.original_name,
            page_count: doc.page_count,
            thumbnails: doc.thumbnails,
        }
    }
}

/// Body of `POST /merge`
///
/// `pages` is kept as raw JSON; each entry is validated on its own.
#[derive(Debug, Clone, Deserialize)]
pub struct MergeRequest {
    #[serde(default = "empty_list")]
    pub pages: Value,
}

impl Default for MergeRequest {
    fn default() -> Self {
        Self { pages: empty_list() }
    }
}

fn empty_list() -> Value {
    Value::Array(Vec::new())
}

impl MergeRequest {
    /// Anything that is not a JSON object reads as an empty selection
    pub fn from_body(body: &[u8]) -> Self {
        serde_json::from_slice(body).unwrap_or_default()
    }
}
