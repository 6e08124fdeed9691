use std::sync::Arc;

use chrono::Utc;
use stowage_core::models::{AssetRecord, CompleteUploadRequest, CompleteUploadResponse};
use stowage_core::AppError;
use stowage_db::AssetStore;
use stowage_storage::multipart::validate_parts;
use stowage_storage::{CompletedPart, Storage, StorageError};
use validator::Validate;

use super::urls::AssetUrls;

/// Finishes multipart uploads and records that the bytes are assembled.
pub struct CompletionCoordinator {
    store: Arc<dyn AssetStore>,
    storage: Arc<dyn Storage>,
    urls: AssetUrls,
}

impl CompletionCoordinator {
    pub fn new(store: Arc<dyn AssetStore>, storage: Arc<dyn Storage>, urls: AssetUrls) -> Self {
        Self {
            store,
            storage,
            urls,
        }
    }

    fn response(&self, asset_id: &str, already_completed: bool) -> CompleteUploadResponse {
        CompleteUploadResponse {
            asset_id: asset_id.to_string(),
            completed: true,
            already_completed,
            public_url: self.urls.public_url(asset_id),
        }
    }

    async fn find_owned(&self, owner_scope: &str, asset_id: &str) -> Result<AssetRecord, AppError> {
        match self.store.get(asset_id).await? {
            Some(record) if record.owner_scope == owner_scope => Ok(record),
            _ => Err(AppError::NotFound(format!("Asset {} not found", asset_id))),
        }
    }

    #[tracing::instrument(skip(self, request), fields(owner_scope = %owner_scope, asset_id = %asset_id, parts = request.parts.len()))]
    pub async fn complete(
        &self,
        owner_scope: &str,
        asset_id: &str,
        request: &CompleteUploadRequest,
    ) -> Result<CompleteUploadResponse, AppError> {
        request.validate()?;

        let record = self.find_owned(owner_scope, asset_id).await?;
        let upload = record.multipart.as_ref().ok_or_else(|| {
            AppError::BadRequest(format!("Asset {} was not uploaded in parts", asset_id))
        })?;

        let reported: Vec<CompletedPart> = request
            .parts
            .iter()
            .map(|p| CompletedPart {
                part_number: p.part_number,
                etag: p.etag.clone(),
            })
            .collect();
        let parts = validate_parts(upload.total_parts, &reported)?;

        if record.is_completed() {
            tracing::debug!(asset_id = %asset_id, "Multipart upload already completed");
            return Ok(self.response(asset_id, true));
        }

        let now = Utc::now();
        if upload.is_expired(now) {
            return Err(AppError::Expired(format!(
                "Upload session for asset {} expired at {}; request a new upload descriptor",
                asset_id, upload.expires_at
            )));
        }

        if let Err(e) = self.storage.assemble(&record.object_key, upload, &parts).await {
            if !matches!(e, StorageError::Expired(_)) {
                return Err(e.into());
            }
            // The session is gone. Either a concurrent call finished it, or an
            // earlier call assembled the object but failed to record that.
            if let Some(current) = self.store.get(asset_id).await? {
                if current.is_completed() {
                    return Ok(self.response(asset_id, true));
                }
            }
            if !self.storage.exists(&record.object_key).await? {
                return Err(e.into());
            }
            tracing::warn!(
                asset_id = %asset_id,
                object_key = %record.object_key,
                "Multipart session closed but object assembled, recording completion"
            );
        }

        let recorded = self.store.mark_completed(asset_id, now).await?;

        tracing::info!(
            asset_id = %asset_id,
            owner_scope = %owner_scope,
            total_parts = upload.total_parts,
            "Multipart upload completed"
        );

        Ok(self.response(asset_id, !recorded))
    }
}
