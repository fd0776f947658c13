//! Validation of composition request entries
//!
//! Requests arrive as loosely-typed JSON. Each entry is checked on its own; a
//! malformed entry becomes a [`SkipReason`] instead of failing the batch.

use std::fmt;

use serde_json::Value;

use crate::error::PageMixError;
use crate::model::Rotation;

/// One requested output page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageSelection {
    pub source_id: String,
    /// Zero-based; may be negative here, range is checked against the source
    pub page_index: i64,
    pub rotation: Rotation,
}

/// Why a composition entry produced no page
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    NotAnObject,
    MissingField { field: &'static str },
    InvalidInteger { field: &'static str },
    InvalidRotation { degrees: i64 },
    SourceNotFound { source_id: String },
    SourceUnparsable { source_id: String, message: String },
    PageOutOfRange { page_index: i64, page_count: usize },
    ImportFailed { message: String },
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::NotAnObject => write!(f, "entry is not an object"),
            SkipReason::MissingField { field } => write!(f, "missing field `{}`", field),
            SkipReason::InvalidInteger { field } => {
                write!(f, "field `{}` is not an integer", field)
            }
            SkipReason::InvalidRotation { degrees } => {
                write!(f, "rotation {} is not a multiple of 90", degrees)
            }
            SkipReason::SourceNotFound { source_id } => {
                write!(f, "document {} not found", source_id)
            }
            SkipReason::SourceUnparsable { source_id, message } => {
                write!(f, "document {} is not a readable PDF: {}", source_id, message)
            }
            SkipReason::PageOutOfRange {
                page_index,
                page_count,
            } => write!(
                f,
                "page {} out of range for a {} page document",
                page_index, page_count
            ),
            SkipReason::ImportFailed { message } => write!(f, "page copy failed: {}", message),
        }
    }
}

/// Split a request into per-entry outcomes
///
/// Fails only when `request` is not a list or is an empty list.
pub fn parse_entries(request: &Value) -> Result<Vec<Result<PageSelection, SkipReason>>, PageMixError> {
    let entries = request
        .as_array()
        .ok_or_else(|| PageMixError::InvalidInput("page selection must be a list".into()))?;

    if entries.is_empty() {
        return Err(PageMixError::InvalidInput("no pages selected".into()));
    }

    Ok(entries.iter().map(parse_entry).collect())
}

/// Validate one entry: `{source_id | file_id, page_index, rotation?}`
pub fn parse_entry(entry: &Value) -> Result<PageSelection, SkipReason> {
    let fields = entry.as_object().ok_or(SkipReason::NotAnObject)?;

    let source_id = fields
        .get("source_id")
        .or_else(|| fields.get("file_id"))
        .and_then(Value::as_str)
        .ok_or(SkipReason::MissingField { field: "source_id" })?
        .to_string();

    let page_index = match fields.get("page_index") {
        None | Some(Value::Null) => return Err(SkipReason::MissingField { field: "page_index" }),
        Some(value) => parse_integer(value).ok_or(SkipReason::InvalidInteger { field: "page_index" })?,
    };

    let rotation = match fields.get("rotation") {
        None | Some(Value::Null) => Rotation::NONE,
        Some(value) => {
            let degrees =
                parse_integer(value).ok_or(SkipReason::InvalidInteger { field: "rotation" })?;
            Rotation::from_degrees(degrees).ok_or(SkipReason::InvalidRotation { degrees })?
        }
    };

    Ok(PageSelection {
        source_id,
        page_index,
        rotation,
    })
}

/// Integers, floats (truncated) and integer strings
fn parse_integer(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| {
            n.as_f64()
                .filter(|f| f.is_finite())
                .map(|f| f.trunc() as i64)
        }),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}
