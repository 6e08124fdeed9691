//! Direct uploads for backends without presigned URLs.

use std::sync::Arc;

use chrono::Utc;
use stowage_core::AppError;
use stowage_db::AssetStore;
use stowage_storage::{ByteStream, Storage, StorageError};

fn mime_essence(content_type: &str) -> String {
    content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase()
}

/// Receives the body of a single-shot upload planned by the local provider.
pub struct DirectUploadService {
    store: Arc<dyn AssetStore>,
    storage: Arc<dyn Storage>,
}

impl DirectUploadService {
    pub fn new(store: Arc<dyn AssetStore>, storage: Arc<dyn Storage>) -> Self {
        Self { store, storage }
    }

    /// Stream `body` into the asset's object and record completion.
    ///
    /// The declared size is the ceiling for the body. Returns the bytes written.
    #[tracing::instrument(skip(self, body), fields(asset_id = %asset_id))]
    pub async fn receive(
        &self,
        asset_id: &str,
        content_type: Option<&str>,
        body: ByteStream,
    ) -> Result<u64, AppError> {
        let record = self
            .store
            .get(asset_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Asset {} not found", asset_id)))?;

        if record.multipart.is_some() {
            return Err(AppError::BadRequest(format!(
                "Asset {} must be uploaded in parts",
                asset_id
            )));
        }

        match content_type {
            Some(ct) if mime_essence(ct) == mime_essence(&record.content_type) => {}
            _ => {
                return Err(AppError::field(
                    "contentType",
                    format!("Content-Type must be {}", record.content_type),
                ));
            }
        }

        if record.is_completed() {
            return Err(AppError::Conflict(format!(
                "Asset {} already uploaded",
                asset_id
            )));
        }

        let written = match self
            .storage
            .write_object(&record.object_key, body, record.size_bytes)
            .await
        {
            Ok(written) => written,
            Err(StorageError::TooLarge(_)) => {
                return Err(AppError::field(
                    "sizeBytes",
                    format!("Body exceeds the declared size of {} bytes", record.size_bytes),
                ));
            }
            Err(StorageError::AlreadyExists(_)) => {
                // Only complete bodies are ever persisted.
                self.store.mark_completed(asset_id, Utc::now()).await?;
                return Err(AppError::Conflict(format!(
                    "Asset {} already uploaded",
                    asset_id
                )));
            }
            Err(other) => return Err(other.into()),
        };

        if !self.store.mark_completed(asset_id, Utc::now()).await? {
            tracing::warn!(asset_id = %asset_id, "Concurrent direct upload recorded first");
        }

        tracing::info!(
            asset_id = %asset_id,
            owner_scope = %record.owner_scope,
            size_bytes = written,
            "Direct upload stored"
        );

        Ok(written)
    }
}
