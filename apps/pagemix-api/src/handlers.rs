//! HTTP handlers for the PageMix API

use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{Multipart, State},
    http::header,
    response::{IntoResponse, Response},
    Json,
};
use pagemix_core::Composer;

use crate::error::ApiError;
use crate::models::{MergeRequest, UploadResponse};
use crate::state::AppState;

/// Health check endpoint
pub async fn health() -> &'static str {
    "OK"
}

/// Ingest the multipart field `file`
pub async fn upload(
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>, ApiError> {
    let mut upload = None;
    while let Some(field) = multipart.next_field().await? {
        if field.name() == Some("file") {
            let filename = field.file_name().unwrap_or_default().to_string();
            let bytes = field.bytes().await?;
            upload = Some((filename, bytes));
            break;
        }
    }

    let (filename, bytes) =
        upload.ok_or_else(|| ApiError::InvalidRequest("No file part".to_string()))?;

    let ingestor = state.ingestor.clone();
    let ingested = tokio::task::spawn_blocking(move || ingestor.ingest(&bytes, &filename))
        .await
        .map_err(|e| ApiError::Internal(e.into()))??;

    Ok(Json(ingested.into()))
}

/// Compose the selected pages into one downloadable PDF
pub async fn merge(State(state): State<Arc<AppState>>, body: Bytes) -> Result<Response, ApiError> {
    let request = MergeRequest::from_body(&body);

    let store = Arc::clone(&state.store);
    let composition =
        tokio::task::spawn_blocking(move || Composer::new(&store).compose(&request.pages))
            .await
            .map_err(|e| ApiError::Internal(e.into()))??;

    if !composition.skipped.is_empty() {
        tracing::info!(
            skipped = composition.skipped.len(),
            pages = composition.page_count,
            "Merged with skipped selections"
        );
    }

    Ok((
        [
            (header::CONTENT_TYPE, "application/pdf"),
            (
                header::CONTENT_DISPOSITION,
                "attachment; filename=\"merged.pdf\"",
            ),
        ],
        composition.pdf,
    )
        .into_response())
}
