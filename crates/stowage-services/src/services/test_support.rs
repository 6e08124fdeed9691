//! Multipart-capable storage double for service tests.

use std::collections::HashSet;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use stowage_core::models::{
    AssetCategory, AssetRecord, MultipartUpload, PartUrl, UploadMethod,
};
use stowage_core::StorageBackend;
use stowage_storage::multipart::{part_layout, validate_parts};
use stowage_storage::{
    BlobStore, CompletedPart, PlanMode, PublicLocation, SingleShotPlan, StorageError,
    StorageProvider, StorageResult, UploadPlan, UploadTarget,
};

const MIB: u64 = 1024 * 1024;

#[derive(Default)]
struct Calls {
    planned: usize,
    assembled: Vec<String>,
    aborted: Vec<String>,
    deleted: Vec<String>,
}

pub struct ScriptedStorage {
    threshold: u64,
    /// Fail the plan call with this zero-based index.
    fail_plan_at: Option<usize>,
    fail_delete: Mutex<HashSet<String>>,
    objects: Mutex<HashSet<String>>,
    /// Sessions already assembled or aborted; the backend no longer knows them.
    closed_sessions: Mutex<HashSet<String>>,
    calls: Mutex<Calls>,
}

impl ScriptedStorage {
    pub fn new() -> Self {
        Self {
            threshold: 10 * MIB,
            fail_plan_at: None,
            fail_delete: Mutex::new(HashSet::new()),
            objects: Mutex::new(HashSet::new()),
            closed_sessions: Mutex::new(HashSet::new()),
            calls: Mutex::new(Calls::default()),
        }
    }

    pub fn failing_plan_at(index: usize) -> Self {
        Self {
            fail_plan_at: Some(index),
            ..Self::new()
        }
    }

    pub fn put_object(&self, key: &str) {
        self.objects.lock().unwrap().insert(key.to_string());
    }

    pub fn has_object(&self, key: &str) -> bool {
        self.objects.lock().unwrap().contains(key)
    }

    pub fn fail_delete_of(&self, key: &str) {
        self.fail_delete.lock().unwrap().insert(key.to_string());
    }

    pub fn assembled_keys(&self) -> Vec<String> {
        self.calls.lock().unwrap().assembled.clone()
    }

    pub fn aborted_sessions(&self) -> Vec<String> {
        self.calls.lock().unwrap().aborted.clone()
    }

    pub fn deleted_keys(&self) -> Vec<String> {
        self.calls.lock().unwrap().deleted.clone()
    }
}

#[async_trait]
impl StorageProvider for ScriptedStorage {
    async fn plan_upload(&self, target: &UploadTarget) -> StorageResult<UploadPlan> {
        let index = {
            let mut calls = self.calls.lock().unwrap();
            calls.planned += 1;
            calls.planned - 1
        };
        if self.fail_plan_at == Some(index) {
            return Err(StorageError::BackendError("injected plan failure".to_string()));
        }

        let expires_at = Utc::now() + Duration::days(1);
        if target.mode == PlanMode::SingleShot || target.size_bytes <= self.threshold {
            let mut headers = std::collections::BTreeMap::new();
            headers.insert("Content-Type".to_string(), target.content_type.clone());
            return Ok(UploadPlan::SingleShot(SingleShotPlan {
                method: UploadMethod::Put,
                url: format!("https://storage.test/{}?signed", target.object_key),
                headers,
                expires_at: Some(expires_at),
            }));
        }

        let (part_size, total_parts) = part_layout(target.size_bytes, 10 * MIB);
        Ok(UploadPlan::Multipart(MultipartUpload {
            upload_session_id: format!("session-{}", target.asset_id),
            part_size,
            total_parts,
            part_urls: (1..=total_parts)
                .map(|n| PartUrl {
                    part_number: n,
                    url: format!("https://storage.test/{}?partNumber={}", target.object_key, n),
                })
                .collect(),
            expires_at,
        }))
    }

    async fn assemble(
        &self,
        object_key: &str,
        upload: &MultipartUpload,
        parts: &[CompletedPart],
    ) -> StorageResult<()> {
        validate_parts(upload.total_parts, parts)?;
        if !self
            .closed_sessions
            .lock()
            .unwrap()
            .insert(upload.upload_session_id.clone())
        {
            return Err(StorageError::Expired(format!(
                "multipart session {} no longer exists",
                upload.upload_session_id
            )));
        }
        self.calls
            .lock()
            .unwrap()
            .assembled
            .push(object_key.to_string());
        self.put_object(object_key);
        Ok(())
    }

    async fn resolve_public_location(&self, object_key: &str) -> StorageResult<PublicLocation> {
        if self.has_object(object_key) {
            Ok(PublicLocation::Redirect(format!(
                "https://storage.test/{}",
                object_key
            )))
        } else {
            Err(StorageError::NotFound(object_key.to_string()))
        }
    }
}

#[async_trait]
impl BlobStore for ScriptedStorage {
    fn backend_type(&self) -> StorageBackend {
        StorageBackend::S3
    }

    async fn exists(&self, object_key: &str) -> StorageResult<bool> {
        Ok(self.has_object(object_key))
    }

    async fn delete(&self, object_key: &str) -> StorageResult<()> {
        if self.fail_delete.lock().unwrap().contains(object_key) {
            return Err(StorageError::DeleteFailed("injected delete failure".to_string()));
        }
        self.objects.lock().unwrap().remove(object_key);
        self.calls
            .lock()
            .unwrap()
            .deleted
            .push(object_key.to_string());
        Ok(())
    }

    async fn abort_upload(&self, _object_key: &str, upload_session_id: &str) -> StorageResult<()> {
        self.closed_sessions
            .lock()
            .unwrap()
            .insert(upload_session_id.to_string());
        self.calls
            .lock()
            .unwrap()
            .aborted
            .push(upload_session_id.to_string());
        Ok(())
    }
}

/// A video record with an open multipart session of `total_parts` parts.
pub fn multipart_record(
    asset_id: &str,
    owner_scope: &str,
    total_parts: u32,
    expires_at: DateTime<Utc>,
) -> AssetRecord {
    AssetRecord {
        asset_id: asset_id.to_string(),
        owner_scope: owner_scope.to_string(),
        category: AssetCategory::Video,
        provider: StorageBackend::S3,
        object_key: format!("business/{}/assets/{}/movie.mp4", owner_scope, asset_id),
        file_name: "movie.mp4".to_string(),
        content_type: "video/mp4".to_string(),
        size_bytes: u64::from(total_parts) * 10 * MIB,
        multipart: Some(MultipartUpload {
            upload_session_id: format!("session-{}", asset_id),
            part_size: 10 * MIB,
            total_parts,
            part_urls: Vec::new(),
            expires_at,
        }),
        thumbnail_of: None,
        has_thumbnail: true,
        created_at: Utc::now(),
        completed_at: None,
    }
}

/// A single-shot record, optionally a thumbnail of `parent`.
pub fn simple_record(
    asset_id: &str,
    thumbnail_of: Option<&str>,
    created_at: DateTime<Utc>,
) -> AssetRecord {
    AssetRecord {
        asset_id: asset_id.to_string(),
        owner_scope: "biz".to_string(),
        category: AssetCategory::Image,
        provider: StorageBackend::S3,
        object_key: format!("business/biz/assets/{}/a.jpg", asset_id),
        file_name: "a.jpg".to_string(),
        content_type: "image/jpeg".to_string(),
        size_bytes: 1024,
        multipart: None,
        thumbnail_of: thumbnail_of.map(String::from),
        has_thumbnail: false,
        created_at,
        completed_at: None,
    }
}
