//! Storage setup and initialization

use anyhow::{Context, Result};
use std::sync::Arc;
use stowage_core::Config;
use stowage_storage::{create_storage, Storage};

pub async fn setup_storage(config: &Config) -> Result<Arc<dyn Storage>> {
    tracing::info!("Initializing storage backend...");
    let storage = create_storage(config)
        .await
        .context("Failed to initialize storage backend")?;
    tracing::info!(
        backend = %storage.backend_type(),
        public_base_url = %config.public_base_url(),
        cdn_base_url = ?config.cdn_base_url(),
        "Storage backend initialized successfully"
    );
    Ok(storage)
}
