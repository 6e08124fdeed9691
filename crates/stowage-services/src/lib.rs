//! Stowage Services Layer
//!
//! Orchestration of the upload protocol: classifying declared files, issuing
//! upload descriptors, completing multipart uploads, resolving public
//! assets, and reclaiming identities that were never attached. The API and
//! CLI crates depend on this facade; HTTP handling stays in stowage-api.

pub mod cleanup;
pub mod services;

pub use cleanup::{AssetGarbageCollector, GcOptions, GcReport};
pub use services::{
    validate_owner_scope, AssetUrls, CategoryClassifier, Classification, CompletionCoordinator,
    DirectUploadService, PublicAsset, PublicAssetService, UploadDescriptorService,
};
pub use stowage_storage::{create_storage, Storage, StorageBackend, StorageError, StorageResult};
