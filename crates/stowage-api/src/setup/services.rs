//! Service initialization and application state setup

use anyhow::Result;
use sqlx::PgPool;
use std::sync::Arc;
use stowage_core::Config;
use stowage_db::{PgAssetRepository, PgReferenceSource};
use stowage_services::AssetGarbageCollector;
use stowage_storage::Storage;

use crate::state::AppState;

/// Build the application state and start background tasks.
pub fn initialize_services(
    config: &Config,
    pool: PgPool,
    storage: Arc<dyn Storage>,
) -> Result<Arc<AppState>> {
    let store = Arc::new(PgAssetRepository::new(pool.clone()));

    if config.gc().enabled {
        let references = Arc::new(PgReferenceSource::new(
            pool,
            config.reference_columns().to_vec(),
        ));
        let collector = Arc::new(AssetGarbageCollector::new(
            store.clone(),
            storage.clone(),
            references,
        ));
        // Detached: the task ends with the runtime on shutdown.
        let _handle = collector.start(config.gc().clone());
        tracing::info!(
            interval_secs = config.gc().interval_secs,
            grace_period_secs = config.gc().grace_period_secs,
            batch_limit = config.gc().batch_limit,
            "Asset garbage collector started"
        );
    } else {
        tracing::info!("Asset garbage collector disabled (ASSET_GC_ENABLED=false)");
    }

    Ok(Arc::new(AppState::new(config.clone(), store, storage)))
}
