//! Stowage persistence layer
//!
//! The asset identity store and the reference lookup used by the garbage collector.

pub mod db;

pub use db::{
    AssetStore, InMemoryAssetRepository, InMemoryReferenceSource, PgAssetRepository,
    PgReferenceSource, ReferenceSource, StaleCursor,
};
