use thiserror::Error;

#[derive(Error, Debug)]
pub enum PageMixError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Upload of {size} bytes exceeds the {limit} byte limit")]
    TooLarge { size: usize, limit: usize },

    #[error("Failed to convert document: {0}")]
    Conversion(String),

    #[error("Failed to parse PDF: {0}")]
    Parse(String),

    #[error("Document not found: {0}")]
    NotFound(String),

    #[error("No valid pages to merge")]
    NoValidPages,

    #[error("Storage error: {0}")]
    Storage(#[from] std::io::Error),

    #[error("Failed to render preview of page {page}: {message}")]
    Preview { page: usize, message: String },

    #[error("PDF operation failed: {0}")]
    OperationError(String),
}

impl PageMixError {
    /// Whether the caller can fix this by changing the request.
    pub fn is_user_error(&self) -> bool {
        matches!(
            self,
            PageMixError::InvalidInput(_)
                | PageMixError::TooLarge { .. }
                | PageMixError::Conversion(_)
                | PageMixError::Parse(_)
                | PageMixError::NotFound(_)
                | PageMixError::NoValidPages
        )
    }
}
