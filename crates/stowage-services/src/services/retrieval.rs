use std::sync::Arc;

use stowage_core::models::is_valid_asset_id;
use stowage_core::AppError;
use stowage_db::AssetStore;
use stowage_storage::{PublicLocation, Storage};

/// Resolved public asset.
#[derive(Debug)]
pub struct PublicAsset {
    pub asset_id: String,
    pub content_type: String,
    pub location: PublicLocation,
}

/// Unauthenticated lookup of assembled bytes by asset id.
pub struct PublicAssetService {
    store: Arc<dyn AssetStore>,
    storage: Arc<dyn Storage>,
}

impl PublicAssetService {
    pub fn new(store: Arc<dyn AssetStore>, storage: Arc<dyn Storage>) -> Self {
        Self { store, storage }
    }

    fn not_found(asset_id: &str) -> AppError {
        AppError::NotFound(format!("Asset {} not found", asset_id))
    }

    /// `NotFound` for unknown ids and for ids whose bytes were never assembled.
    #[tracing::instrument(skip(self), fields(asset_id = %asset_id))]
    pub async fn resolve(&self, asset_id: &str) -> Result<PublicAsset, AppError> {
        if !is_valid_asset_id(asset_id) {
            return Err(Self::not_found(asset_id));
        }

        let record = self
            .store
            .get(asset_id)
            .await?
            .ok_or_else(|| Self::not_found(asset_id))?;

        if record.multipart.is_some() && !record.is_completed() {
            tracing::debug!(asset_id = %asset_id, "Multipart upload not completed yet");
            return Err(Self::not_found(asset_id));
        }

        if record.provider != self.storage.backend_type() {
            tracing::warn!(
                asset_id = %asset_id,
                provider = %record.provider,
                active = %self.storage.backend_type(),
                "Asset was stored by a different backend"
            );
            return Err(Self::not_found(asset_id));
        }

        let location = self.storage.resolve_public_location(&record.object_key).await?;

        Ok(PublicAsset {
            asset_id: record.asset_id,
            content_type: record.content_type,
            location,
        })
    }
}
