//! Upload descriptor and multipart completion routes.

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use stowage_core::models::{
    CompleteUploadRequest, CompleteUploadResponse, CreateUploadsRequest, CreateUploadsResponse,
};

use crate::error::{ErrorResponse, HttpAppError, ValidatedJson};
use crate::state::AppState;

/// Issue upload descriptors for a batch of files
#[utoipa::path(
    post,
    path = "/api/v0/businesses/{businessId}/assets/uploads",
    tag = "uploads",
    params(("businessId" = String, Path, description = "Owner scope of the new assets")),
    request_body = CreateUploadsRequest,
    responses(
        (status = 201, description = "Descriptors issued", body = CreateUploadsResponse),
        (status = 400, description = "Invalid batch; nothing was created", body = ErrorResponse),
        (status = 502, description = "Storage backend unavailable", body = ErrorResponse)
    )
)]
#[tracing::instrument(
    skip(state, request),
    fields(owner_scope = %business_id, files = request.files.len(), operation = "create_uploads")
)]
pub async fn create_uploads(
    State(state): State<Arc<AppState>>,
    Path(business_id): Path<String>,
    ValidatedJson(request): ValidatedJson<CreateUploadsRequest>,
) -> Result<impl IntoResponse, HttpAppError> {
    let response = state.uploads.create_uploads(&business_id, &request).await?;
    Ok((StatusCode::CREATED, Json(response)))
}

/// Assemble the parts of a multipart upload
#[utoipa::path(
    post,
    path = "/api/v0/businesses/{businessId}/assets/uploads/{assetId}/complete",
    tag = "uploads",
    params(
        ("businessId" = String, Path, description = "Owner scope of the asset"),
        ("assetId" = String, Path, description = "Asset identifier")
    ),
    request_body = CompleteUploadRequest,
    responses(
        (status = 200, description = "Upload assembled", body = CompleteUploadResponse),
        (status = 400, description = "Missing, duplicate or out-of-range parts", body = ErrorResponse),
        (status = 404, description = "Unknown asset", body = ErrorResponse),
        (status = 410, description = "Upload session expired", body = ErrorResponse),
        (status = 502, description = "Storage backend unavailable", body = ErrorResponse)
    )
)]
#[tracing::instrument(
    skip(state, request),
    fields(owner_scope = %business_id, asset_id = %asset_id, parts = request.parts.len(), operation = "complete_upload")
)]
pub async fn complete_upload(
    State(state): State<Arc<AppState>>,
    Path((business_id, asset_id)): Path<(String, String)>,
    ValidatedJson(request): ValidatedJson<CompleteUploadRequest>,
) -> Result<Json<CompleteUploadResponse>, HttpAppError> {
    let response = state
        .completion
        .complete(&business_id, &asset_id, &request)
        .await?;
    Ok(Json(response))
}
