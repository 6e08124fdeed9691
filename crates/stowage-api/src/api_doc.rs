//! OpenAPI documentation, served at `/api/openapi.json` and browsable under `/docs`.

use utoipa::OpenApi;

use crate::error;
use crate::handlers;
use stowage_core::models;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Stowage API",
        version = "0.1.0",
        description = "Direct-to-storage uploads (v0). Clients request upload descriptors, send bytes straight to blob storage, complete multipart uploads, and read assets back by id. All endpoints are versioned under /api/v0/."
    ),
    paths(
        handlers::uploads::create_uploads,
        handlers::uploads::complete_upload,
        handlers::direct_upload::receive_upload,
        handlers::public_asset::get_public_asset,
    ),
    components(
        schemas(
            models::CreateUploadsRequest,
            models::UploadFileRequest,
            models::CreateUploadsResponse,
            models::UploadDescriptor,
            models::ThumbnailDescriptor,
            models::UploadMethod,
            models::PartUrl,
            models::CompleteUploadRequest,
            models::CompletedPartInput,
            models::CompleteUploadResponse,
            models::AssetReference,
            models::AssetReferenceMetadata,
            stowage_core::FieldError,
            error::ErrorResponse,
        )
    ),
    tags(
        (name = "uploads", description = "Upload descriptors, multipart completion and direct uploads"),
        (name = "public", description = "Unauthenticated asset retrieval")
    )
)]
pub struct ApiDoc;
