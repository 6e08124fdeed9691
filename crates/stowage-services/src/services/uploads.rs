//! Upload descriptor issuance.
//!
//! One request mints an identity per file (plus one per thumbnail), asks the
//! storage provider where the bytes go, and persists every record in one
//! transaction. A batch is accepted or rejected as a whole.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use stowage_core::constants::{THUMBNAIL_CONTENT_TYPE, THUMBNAIL_FILE_NAME};
use stowage_core::models::{
    new_asset_id, AssetCategory, AssetRecord, CreateUploadsRequest, CreateUploadsResponse,
    ThumbnailDescriptor, UploadDescriptor, UploadMethod,
};
use stowage_core::{AppError, FieldError};
use stowage_db::AssetStore;
use stowage_storage::keys::{object_key, thumbnail_key};
use stowage_storage::{PlanMode, SingleShotPlan, Storage, UploadPlan, UploadTarget};
use validator::Validate;

use super::classifier::CategoryClassifier;
use super::urls::AssetUrls;

const MAX_OWNER_SCOPE_LEN: usize = 128;

/// Owner scopes become a key segment, so they are restricted to `[A-Za-z0-9_-]`.
pub fn validate_owner_scope(owner_scope: &str) -> Result<(), AppError> {
    let valid = !owner_scope.is_empty()
        && owner_scope.len() <= MAX_OWNER_SCOPE_LEN
        && owner_scope
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'_' || b == b'-');
    if valid {
        Ok(())
    } else {
        Err(AppError::field(
            "businessId",
            "businessId must be 1-128 characters of letters, digits, '_' or '-'",
        ))
    }
}

struct PlannedThumbnail {
    record: AssetRecord,
    plan: SingleShotPlan,
}

struct PlannedFile {
    record: AssetRecord,
    plan: UploadPlan,
    thumbnail: Option<PlannedThumbnail>,
}

pub struct UploadDescriptorService {
    store: Arc<dyn AssetStore>,
    storage: Arc<dyn Storage>,
    classifier: CategoryClassifier,
    urls: AssetUrls,
    thumbnail_max_size_bytes: u64,
}

impl UploadDescriptorService {
    pub fn new(
        store: Arc<dyn AssetStore>,
        storage: Arc<dyn Storage>,
        classifier: CategoryClassifier,
        urls: AssetUrls,
        thumbnail_max_size_bytes: u64,
    ) -> Self {
        Self {
            store,
            storage,
            classifier,
            urls,
            thumbnail_max_size_bytes,
        }
    }

    #[tracing::instrument(skip(self, request), fields(owner_scope = %owner_scope, files = request.files.len()))]
    pub async fn create_uploads(
        &self,
        owner_scope: &str,
        request: &CreateUploadsRequest,
    ) -> Result<CreateUploadsResponse, AppError> {
        validate_owner_scope(owner_scope)?;
        request.validate()?;

        let mut errors = Vec::new();
        let mut classified = Vec::with_capacity(request.files.len());
        for (index, file) in request.files.iter().enumerate() {
            match self
                .classifier
                .classify(&file.content_type, &file.file_name, file.size_bytes)
            {
                Ok(classification) => classified.push((file, classification)),
                Err(file_errors) => errors.extend(file_errors.into_iter().map(|e| {
                    FieldError::new(format!("files[{}].{}", index, e.field), e.message)
                })),
            }
        }
        if !errors.is_empty() {
            tracing::debug!(errors = errors.len(), "Rejecting upload batch");
            return Err(AppError::fields(errors));
        }

        let now = Utc::now();
        let mut planned: Vec<PlannedFile> = Vec::with_capacity(classified.len());
        for (file, classification) in classified {
            let asset_id = new_asset_id();
            let key = object_key(owner_scope, &asset_id, &file.file_name);

            let plan = self
                .storage
                .plan_upload(&UploadTarget {
                    asset_id: asset_id.clone(),
                    object_key: key.clone(),
                    content_type: file.content_type.clone(),
                    category: classification.category,
                    size_bytes: file.size_bytes,
                    mode: PlanMode::Auto,
                })
                .await;
            let plan = match plan {
                Ok(plan) => plan,
                Err(e) => {
                    self.abort_opened(&planned).await;
                    return Err(e.into());
                }
            };

            let mut record = AssetRecord {
                asset_id: asset_id.clone(),
                owner_scope: owner_scope.to_string(),
                category: classification.category,
                provider: self.storage.backend_type(),
                object_key: key,
                file_name: file.file_name.clone(),
                content_type: file.content_type.clone(),
                size_bytes: file.size_bytes,
                multipart: plan.multipart().cloned(),
                thumbnail_of: None,
                has_thumbnail: classification.requires_thumbnail,
                created_at: now,
                completed_at: None,
            };

            let thumbnail = if classification.requires_thumbnail {
                match self.plan_thumbnail(owner_scope, &asset_id, now).await {
                    Ok(thumbnail) => Some(thumbnail),
                    Err(e) => {
                        planned.push(PlannedFile {
                            record,
                            plan,
                            thumbnail: None,
                        });
                        self.abort_opened(&planned).await;
                        return Err(e);
                    }
                }
            } else {
                None
            };
            record.has_thumbnail = thumbnail.is_some();

            planned.push(PlannedFile {
                record,
                plan,
                thumbnail,
            });
        }

        let records: Vec<AssetRecord> = planned
            .iter()
            .flat_map(|p| {
                std::iter::once(p.record.clone())
                    .chain(p.thumbnail.as_ref().map(|t| t.record.clone()))
            })
            .collect();

        if let Err(e) = self.store.insert_batch(&records).await {
            self.abort_opened(&planned).await;
            return Err(e);
        }

        tracing::info!(
            owner_scope = %owner_scope,
            files = planned.len(),
            identities = records.len(),
            "Upload descriptors issued"
        );

        Ok(CreateUploadsResponse {
            uploads: planned.into_iter().map(|p| self.describe(p)).collect(),
        })
    }

    async fn plan_thumbnail(
        &self,
        owner_scope: &str,
        parent_id: &str,
        now: DateTime<Utc>,
    ) -> Result<PlannedThumbnail, AppError> {
        let asset_id = new_asset_id();
        let key = thumbnail_key(owner_scope, &asset_id);

        let plan = self
            .storage
            .plan_upload(&UploadTarget {
                asset_id: asset_id.clone(),
                object_key: key.clone(),
                content_type: THUMBNAIL_CONTENT_TYPE.to_string(),
                category: AssetCategory::Image,
                size_bytes: self.thumbnail_max_size_bytes,
                mode: PlanMode::SingleShot,
            })
            .await?;
        let plan = match plan {
            UploadPlan::SingleShot(plan) => plan,
            UploadPlan::Multipart(upload) => {
                if let Err(e) = self.storage.abort_upload(&key, &upload.upload_session_id).await {
                    tracing::warn!(error = %e, asset_id = %asset_id, "Failed to abort thumbnail session");
                }
                return Err(AppError::Internal(
                    "storage provider returned a multipart plan for a thumbnail".to_string(),
                ));
            }
        };

        Ok(PlannedThumbnail {
            record: AssetRecord {
                asset_id,
                owner_scope: owner_scope.to_string(),
                category: AssetCategory::Image,
                provider: self.storage.backend_type(),
                object_key: key,
                file_name: THUMBNAIL_FILE_NAME.to_string(),
                content_type: THUMBNAIL_CONTENT_TYPE.to_string(),
                size_bytes: self.thumbnail_max_size_bytes,
                multipart: None,
                thumbnail_of: Some(parent_id.to_string()),
                has_thumbnail: false,
                created_at: now,
                completed_at: None,
            },
            plan,
        })
    }

    /// Best effort: the records were never persisted, so nothing else will release these sessions.
    async fn abort_opened(&self, planned: &[PlannedFile]) {
        for file in planned {
            if let Some(upload) = file.plan.multipart() {
                if let Err(e) = self
                    .storage
                    .abort_upload(&file.record.object_key, &upload.upload_session_id)
                    .await
                {
                    tracing::warn!(
                        error = %e,
                        asset_id = %file.record.asset_id,
                        upload_id = %upload.upload_session_id,
                        "Failed to abort multipart upload of rejected batch"
                    );
                }
            }
        }
    }

    fn describe(&self, planned: PlannedFile) -> UploadDescriptor {
        let PlannedFile {
            record,
            plan,
            thumbnail,
        } = planned;

        let public_url = self.urls.public_url(&record.asset_id);
        let cdn_url = self.urls.cdn_url(&record.asset_id, &record.object_key);
        let thumbnail = thumbnail.map(|t| ThumbnailDescriptor {
            public_url: self.urls.public_url(&t.record.asset_id),
            cdn_url: self.urls.cdn_url(&t.record.asset_id, &t.record.object_key),
            asset_id: t.record.asset_id,
            method: t.plan.method,
            url: t.plan.url,
            headers: t.plan.headers,
            expires_at: t.plan.expires_at,
        });

        match plan {
            UploadPlan::SingleShot(plan) => UploadDescriptor {
                asset_id: record.asset_id,
                method: plan.method,
                url: Some(plan.url),
                headers: Some(plan.headers),
                part_size: None,
                total_parts: None,
                part_urls: None,
                upload_id: None,
                expires_at: plan.expires_at,
                public_url,
                cdn_url,
                thumbnail,
            },
            UploadPlan::Multipart(upload) => UploadDescriptor {
                asset_id: record.asset_id,
                method: UploadMethod::Put,
                url: None,
                headers: None,
                part_size: Some(upload.part_size),
                total_parts: Some(upload.total_parts),
                part_urls: Some(upload.part_urls),
                upload_id: Some(upload.upload_session_id),
                expires_at: Some(upload.expires_at),
                public_url,
                cdn_url,
                thumbnail,
            },
        }
    }
}
