//! Stowage Storage Library
//!
//! Storage abstraction for uploaded assets and its two backends: S3-compatible
//! object storage (presigned URLs, multipart sessions) and the local filesystem
//! (uploads proxied through the API).
//!
//! # Storage key format
//!
//! All backends use the same key layout, `business/{owner_scope}/assets/{asset_id}/{file_name}`.
//! Key generation lives in [`keys`] so backends stay consistent.

pub mod factory;
pub mod keys;
#[cfg(feature = "storage-local")]
pub mod local;
pub mod multipart;
#[cfg(feature = "storage-s3")]
pub mod s3;
pub mod traits;

// Re-export commonly used types
pub use factory::create_storage;
#[cfg(feature = "storage-local")]
pub use local::LocalStorage;
#[cfg(feature = "storage-s3")]
pub use s3::{S3Options, S3Storage};
pub use stowage_core::StorageBackend;
pub use traits::{
    BlobStore, ByteStream, CompletedPart, PlanMode, PublicLocation, SingleShotPlan, Storage,
    StorageError, StorageProvider, StorageResult, UploadPlan, UploadTarget,
};
