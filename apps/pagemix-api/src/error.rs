//! Error types for the PageMix API

use axum::{
    extract::multipart::MultipartError,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use pagemix_core::PageMixError;
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Pipeline(#[from] PageMixError),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Malformed upload: {0}")]
    Multipart(#[from] MultipartError),

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::Pipeline(e) => match e {
                PageMixError::TooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
                PageMixError::NotFound(_) => StatusCode::NOT_FOUND,
                e if e.is_user_error() => StatusCode::BAD_REQUEST,
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            },
            ApiError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Multipart(e) => e.status(),
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();

        let message = if status.is_server_error() {
            tracing::error!("Request failed: {}", self);
            match &self {
                ApiError::Pipeline(PageMixError::Preview { .. }) => {
                    "Failed to render page previews".to_string()
                }
                _ => "Internal error".to_string(),
            }
        } else {
            self.to_string()
        };

        let body = Json(json!({
            "error": message,
            "status": status.as_u16(),
        }));

        (status, body).into_response()
    }
}
