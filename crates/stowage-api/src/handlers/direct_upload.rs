//! Direct upload route for the local storage backend.

use std::sync::Arc;

use axum::{
    body::Body,
    extract::{Path, State},
    http::{header, HeaderMap, StatusCode},
};
use futures::TryStreamExt;
use stowage_storage::{ByteStream, StorageError};

use crate::error::{ErrorResponse, HttpAppError};
use crate::state::AppState;

/// Receive the bytes of a single-shot upload
#[utoipa::path(
    post,
    path = "/api/v0/assets/internal/upload/{assetId}",
    tag = "uploads",
    params(("assetId" = String, Path, description = "Asset identifier from the descriptor")),
    request_body(content = Vec<u8>, description = "Raw file bytes", content_type = "application/octet-stream"),
    responses(
        (status = 204, description = "Bytes stored"),
        (status = 400, description = "Wrong content type or body larger than declared", body = ErrorResponse),
        (status = 404, description = "Unknown asset", body = ErrorResponse),
        (status = 409, description = "Asset already uploaded", body = ErrorResponse)
    )
)]
#[tracing::instrument(skip(state, headers, body), fields(asset_id = %asset_id, operation = "direct_upload"))]
pub async fn receive_upload(
    State(state): State<Arc<AppState>>,
    Path(asset_id): Path<String>,
    headers: HeaderMap,
    body: Body,
) -> Result<StatusCode, HttpAppError> {
    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok());

    let stream: ByteStream = Box::pin(
        body.into_data_stream()
            .map_err(|e| StorageError::UploadFailed(format!("Request body error: {}", e))),
    );

    state
        .direct_uploads
        .receive(&asset_id, content_type, stream)
        .await?;

    Ok(StatusCode::NO_CONTENT)
}
