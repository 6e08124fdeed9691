//! Storage abstraction traits
//!
//! A backend implements two traits. [`StorageProvider`] is the upload protocol
//! surface (plan, assemble, resolve) used by the descriptor service, completion
//! and retrieval. [`BlobStore`] is the byte-level surface used by cleanup and by the
//! local direct-upload route. [`Storage`] is blanket-implemented for anything that
//! provides both, so callers hold a single `Arc<dyn Storage>`.

use std::collections::BTreeMap;
use std::pin::Pin;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use futures::Stream;
use stowage_core::models::{AssetCategory, MultipartUpload, UploadMethod};
use stowage_core::AppError;
use thiserror::Error;

use crate::StorageBackend;

/// Storage operation errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Upload failed: {0}")]
    UploadFailed(String),

    #[error("Download failed: {0}")]
    DownloadFailed(String),

    #[error("Delete failed: {0}")]
    DeleteFailed(String),

    #[error("Object not found: {0}")]
    NotFound(String),

    #[error("Invalid storage key: {0}")]
    InvalidKey(String),

    #[error("Incomplete multipart upload: {0}")]
    IncompleteParts(String),

    #[error("Upload session expired: {0}")]
    Expired(String),

    #[error("Payload too large: {0}")]
    TooLarge(String),

    #[error("Object already exists: {0}")]
    AlreadyExists(String),

    #[error("Operation not supported by this backend: {0}")]
    Unsupported(String),

    #[error("Storage backend error: {0}")]
    BackendError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Chunked body used for both directions of streaming.
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes, StorageError>> + Send>>;

impl From<StorageError> for AppError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::NotFound(msg) => AppError::NotFound(msg),
            StorageError::IncompleteParts(msg) => AppError::IncompleteMultipart(msg),
            StorageError::Expired(msg) => AppError::Expired(msg),
            StorageError::TooLarge(msg) => AppError::field("sizeBytes", msg),
            StorageError::AlreadyExists(msg) => AppError::Conflict(msg),
            StorageError::InvalidKey(msg) | StorageError::Unsupported(msg) => {
                AppError::BadRequest(msg)
            }
            StorageError::ConfigError(msg) => AppError::Internal(msg),
            other => AppError::Storage(other.to_string()),
        }
    }
}

/// Whether the provider may split the upload into parts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlanMode {
    /// Provider decides (multipart above its threshold).
    Auto,
    /// Always a single request; used for thumbnails.
    SingleShot,
}

/// Everything a provider needs to plan where one file's bytes go.
#[derive(Debug, Clone)]
pub struct UploadTarget {
    pub asset_id: String,
    pub object_key: String,
    pub content_type: String,
    pub category: AssetCategory,
    pub size_bytes: u64,
    pub mode: PlanMode,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SingleShotPlan {
    pub method: UploadMethod,
    pub url: String,
    pub headers: BTreeMap<String, String>,
    /// Set when `url` is presigned.
    pub expires_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadPlan {
    SingleShot(SingleShotPlan),
    Multipart(MultipartUpload),
}

impl UploadPlan {
    pub fn multipart(&self) -> Option<&MultipartUpload> {
        match self {
            UploadPlan::Multipart(upload) => Some(upload),
            UploadPlan::SingleShot(_) => None,
        }
    }
}

/// Checksum reported by the client for one uploaded part.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletedPart {
    pub part_number: u32,
    pub etag: String,
}

/// How the public endpoint should answer for an assembled object.
pub enum PublicLocation {
    Redirect(String),
    Stream {
        body: ByteStream,
        content_length: Option<u64>,
    },
}

impl std::fmt::Debug for PublicLocation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PublicLocation::Redirect(url) => f.debug_tuple("Redirect").field(url).finish(),
            PublicLocation::Stream { content_length, .. } => f
                .debug_struct("Stream")
                .field("content_length", content_length)
                .finish_non_exhaustive(),
        }
    }
}

/// Upload protocol operations.
#[async_trait]
pub trait StorageProvider: Send + Sync {
    /// Decide how the client sends the bytes for `target`.
    async fn plan_upload(&self, target: &UploadTarget) -> StorageResult<UploadPlan>;

    /// Turn the uploaded parts of a multipart session into one object.
    ///
    /// Must reject the call when any part number in `1..=total_parts` lacks a checksum.
    async fn assemble(
        &self,
        object_key: &str,
        upload: &MultipartUpload,
        parts: &[CompletedPart],
    ) -> StorageResult<()>;

    /// Locate the bytes of an assembled object. `NotFound` when nothing was uploaded.
    async fn resolve_public_location(&self, object_key: &str) -> StorageResult<PublicLocation>;
}

/// Byte-level operations.
#[async_trait]
pub trait BlobStore: Send + Sync {
    fn backend_type(&self) -> StorageBackend;

    async fn exists(&self, object_key: &str) -> StorageResult<bool>;

    /// Delete an object. Deleting a missing object succeeds.
    async fn delete(&self, object_key: &str) -> StorageResult<()>;

    /// Release an unfinished multipart session. Missing sessions are not an error.
    async fn abort_upload(&self, _object_key: &str, _upload_session_id: &str) -> StorageResult<()> {
        Ok(())
    }

    /// Write an object from a stream, refusing bodies larger than `max_bytes`.
    /// An existing object is never replaced: the write fails with `AlreadyExists`.
    /// Returns the number of bytes written.
    async fn write_object(
        &self,
        _object_key: &str,
        _body: ByteStream,
        _max_bytes: u64,
    ) -> StorageResult<u64> {
        Err(StorageError::Unsupported(format!(
            "{} storage only accepts uploads through presigned URLs",
            self.backend_type()
        )))
    }
}

/// Full storage backend.
pub trait Storage: StorageProvider + BlobStore {}

impl<T: StorageProvider + BlobStore + ?Sized> Storage for T {}

#[cfg(test)]
mod tests {
    use super::*;
    use stowage_core::ErrorMetadata;

    #[test]
    fn test_storage_error_maps_to_protocol_taxonomy() {
        let not_found = AppError::from(StorageError::NotFound("k".into()));
        assert_eq!(not_found.http_status_code(), 404);

        let incomplete = AppError::from(StorageError::IncompleteParts("missing 3".into()));
        assert_eq!(incomplete.error_code(), "INCOMPLETE_MULTIPART");

        let expired = AppError::from(StorageError::Expired("gone".into()));
        assert_eq!(expired.error_code(), "EXPIRED_RESOURCE");

        let transport = AppError::from(StorageError::BackendError("503".into()));
        assert_eq!(transport.error_code(), "STORAGE_ERROR");
        assert!(transport.is_recoverable());

        let too_large = AppError::from(StorageError::TooLarge("limit".into()));
        assert_eq!(too_large.field_errors()[0].field, "sizeBytes");

        let exists = AppError::from(StorageError::AlreadyExists("key".into()));
        assert_eq!(exists.error_code(), "CONFLICT");
        assert!(!exists.is_recoverable());
    }
}
