//! In-memory stores for tests and single-process tooling.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use stowage_core::models::AssetRecord;
use stowage_core::AppError;
use tokio::sync::RwLock;

use super::asset::{AssetStore, StaleCursor};
use super::reference::ReferenceSource;

#[derive(Default)]
pub struct InMemoryAssetRepository {
    records: RwLock<HashMap<String, AssetRecord>>,
}

impl InMemoryAssetRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }

    /// Overwrite `created_at`, for exercising age-based logic.
    pub async fn set_created_at(&self, asset_id: &str, created_at: DateTime<Utc>) -> bool {
        match self.records.write().await.get_mut(asset_id) {
            Some(record) => {
                record.created_at = created_at;
                true
            }
            None => false,
        }
    }
}

#[async_trait]
impl AssetStore for InMemoryAssetRepository {
    async fn insert_batch(&self, records: &[AssetRecord]) -> Result<(), AppError> {
        let mut map = self.records.write().await;

        let mut seen = HashSet::new();
        for record in records {
            if map.contains_key(&record.asset_id) || !seen.insert(record.asset_id.as_str()) {
                return Err(AppError::Conflict(format!(
                    "asset {} already exists",
                    record.asset_id
                )));
            }
        }

        for record in records {
            map.insert(record.asset_id.clone(), record.clone());
        }
        Ok(())
    }

    async fn get(&self, asset_id: &str) -> Result<Option<AssetRecord>, AppError> {
        Ok(self.records.read().await.get(asset_id).cloned())
    }

    async fn mark_completed(&self, asset_id: &str, at: DateTime<Utc>) -> Result<bool, AppError> {
        let mut map = self.records.write().await;
        match map.get_mut(asset_id) {
            Some(record) if record.completed_at.is_none() => {
                record.completed_at = Some(at);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn list_stale(
        &self,
        before: DateTime<Utc>,
        after: Option<&StaleCursor>,
        limit: usize,
    ) -> Result<Vec<AssetRecord>, AppError> {
        let map = self.records.read().await;
        let mut stale: Vec<AssetRecord> = map
            .values()
            .filter(|r| !r.is_thumbnail() && r.created_at < before)
            .filter(|r| {
                after.map_or(true, |c| {
                    (r.created_at, r.asset_id.as_str()) > (c.created_at, c.asset_id.as_str())
                })
            })
            .cloned()
            .collect();
        stale.sort_by(|a, b| {
            a.created_at
                .cmp(&b.created_at)
                .then_with(|| a.asset_id.cmp(&b.asset_id))
        });
        stale.truncate(limit);
        Ok(stale)
    }

    async fn list_orphaned_thumbnails(&self, limit: usize) -> Result<Vec<AssetRecord>, AppError> {
        let map = self.records.read().await;
        let mut orphans: Vec<AssetRecord> = map
            .values()
            .filter(|r| {
                r.thumbnail_of
                    .as_ref()
                    .is_some_and(|parent| !map.contains_key(parent))
            })
            .cloned()
            .collect();
        orphans.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        orphans.truncate(limit);
        Ok(orphans)
    }

    async fn delete(&self, asset_id: &str) -> Result<bool, AppError> {
        Ok(self.records.write().await.remove(asset_id).is_some())
    }
}

/// Reference set held in memory. `set_failing(true)` makes lookups error.
#[derive(Default)]
pub struct InMemoryReferenceSource {
    referenced: RwLock<HashSet<String>>,
    failing: AtomicBool,
}

impl InMemoryReferenceSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn add(&self, asset_id: impl Into<String>) {
        self.referenced.write().await.insert(asset_id.into());
    }

    pub async fn remove(&self, asset_id: &str) {
        self.referenced.write().await.remove(asset_id);
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }
}

#[async_trait]
impl ReferenceSource for InMemoryReferenceSource {
    async fn referenced_asset_ids(&self, asset_ids: &[String]) -> Result<HashSet<String>, AppError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(AppError::Internal("reference lookup unavailable".to_string()));
        }
        let referenced = self.referenced.read().await;
        Ok(asset_ids
            .iter()
            .filter(|id| referenced.contains(*id))
            .cloned()
            .collect())
    }
}
