//! Database repositories for data access layer
//!
//! `asset` holds the identity records written by the upload protocol, `reference`
//! answers "which of these ids does any entity still point at". Each has a
//! PostgreSQL implementation and an in-memory one in `memory`.
//
// Asset identity records
pub mod asset;
//
// AssetReference lookups across entity tables
pub mod reference;
//
// In-memory implementations
pub mod memory;

pub use asset::{AssetStore, PgAssetRepository, StaleCursor};
pub use memory::{InMemoryAssetRepository, InMemoryReferenceSource};
pub use reference::{PgReferenceSource, ReferenceSource};
