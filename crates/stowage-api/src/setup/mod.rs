//! Application setup and initialization
//!
//! Everything `main` needs to go from a loaded `Config` to a serving router,
//! split by concern so tests can reuse the routing without a database.

pub mod database;
pub mod routes;
pub mod server;
pub mod services;
pub mod storage;

use crate::state::AppState;
use anyhow::{Context, Result};
use std::sync::Arc;
use stowage_core::Config;

/// Initialize the entire application
pub async fn initialize_app(config: Config) -> Result<(Arc<AppState>, axum::Router)> {
    crate::telemetry::init_tracing(config.log_format())
        .map_err(|e| anyhow::anyhow!("Failed to initialize tracing: {}", e))?;

    // Fail fast on misconfiguration
    config.validate().context("Configuration validation failed")?;
    tracing::info!(
        environment = %config.environment(),
        backend = %config.storage_backend(),
        "Configuration loaded and validated successfully"
    );

    let pool = database::setup_database(&config).await?;
    let storage = storage::setup_storage(&config).await?;
    let state = services::initialize_services(&config, pool, storage)?;
    let router = routes::setup_routes(&config, state.clone())?;

    Ok((state, router))
}
