//! Stowage Core Library
//!
//! Domain models, error types and configuration shared by every Stowage crate:
//! the asset identity record, upload categories, `AssetReference`, and the
//! request/response shapes of the upload protocol.

pub mod config;
pub mod constants;
pub mod error;
pub mod models;
pub mod storage_types;

// Re-export commonly used types
pub use config::{
    AssetServiceConfig, BaseConfig, CategoryLimits, CategoryPolicy, Config, GcConfig,
    ReferenceColumn,
};
pub use error::{AppError, ErrorMetadata, FieldError, LogLevel};
pub use storage_types::StorageBackend;
// Storage traits and StorageError live in stowage-storage
