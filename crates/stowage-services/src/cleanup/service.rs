use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use stowage_core::models::AssetRecord;
use stowage_core::GcConfig;
use stowage_db::{AssetStore, ReferenceSource, StaleCursor};
use stowage_storage::Storage;
use tokio::time::interval;

/// Parameters of one collection pass.
#[derive(Clone, Debug)]
pub struct GcOptions {
    pub now: DateTime<Utc>,
    pub batch_limit: usize,
    pub grace_period: chrono::Duration,
    pub dry_run: bool,
}

impl GcOptions {
    pub fn from_config(config: &GcConfig, now: DateTime<Utc>) -> Self {
        Self {
            now,
            batch_limit: config.batch_limit,
            grace_period: chrono::Duration::seconds(
                i64::try_from(config.grace_period_secs).unwrap_or(i64::MAX / 1000),
            ),
            dry_run: false,
        }
    }

    fn cutoff(&self) -> DateTime<Utc> {
        self.now
            .checked_sub_signed(self.grace_period)
            .unwrap_or(DateTime::<Utc>::MIN_UTC)
    }
}

/// Outcome of one pass. In a dry run `deleted_assets` counts what would have been deleted.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GcReport {
    pub dry_run: bool,
    pub stale_candidates: usize,
    pub referenced: usize,
    pub orphan_thumbnails: usize,
    pub deleted_assets: usize,
    pub deleted_blobs: usize,
    pub aborted_uploads: usize,
    pub errors: usize,
}

/// Reclaims identities that were never attached to a domain entity.
///
/// A record is deleted once it is older than the grace period and no
/// reference source mentions its id. Thumbnails follow their parent: they
/// are never candidates themselves and are removed unconditionally once the
/// parent record is gone.
pub struct AssetGarbageCollector {
    store: Arc<dyn AssetStore>,
    storage: Arc<dyn Storage>,
    references: Arc<dyn ReferenceSource>,
}

impl AssetGarbageCollector {
    pub fn new(
        store: Arc<dyn AssetStore>,
        storage: Arc<dyn Storage>,
        references: Arc<dyn ReferenceSource>,
    ) -> Self {
        Self {
            store,
            storage,
            references,
        }
    }

    /// Run a pass every `config.interval_secs` until the task is aborted.
    /// Returns a JoinHandle for graceful shutdown
    pub fn start(self: Arc<Self>, config: GcConfig) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            let mut gc_interval = interval(Duration::from_secs(config.interval_secs.max(1)));

            loop {
                gc_interval.tick().await;

                tracing::info!("Starting scheduled asset collection");
                let report = self
                    .run_once(&GcOptions::from_config(&config, Utc::now()))
                    .await;
                if report.errors > 0 {
                    tracing::warn!(errors = report.errors, "Asset collection finished with errors");
                }
            }
        })
    }

    #[tracing::instrument(skip(self, options), fields(gc.dry_run = options.dry_run, gc.batch_limit = options.batch_limit))]
    pub async fn run_once(&self, options: &GcOptions) -> GcReport {
        let mut report = GcReport {
            dry_run: options.dry_run,
            ..GcReport::default()
        };

        self.collect_stale(options, &mut report).await;
        self.collect_orphaned_thumbnails(options, &mut report).await;

        tracing::info!(
            dry_run = report.dry_run,
            stale_candidates = report.stale_candidates,
            referenced = report.referenced,
            orphan_thumbnails = report.orphan_thumbnails,
            deleted_assets = report.deleted_assets,
            deleted_blobs = report.deleted_blobs,
            aborted_uploads = report.aborted_uploads,
            errors = report.errors,
            "Asset collection completed"
        );

        report
    }

    /// Walks every stale record page by page so referenced records at the head
    /// of the listing cannot hide newer abandoned ones. At most `batch_limit`
    /// assets are deleted per pass.
    async fn collect_stale(&self, options: &GcOptions, report: &mut GcReport) {
        let cutoff = options.cutoff();
        let page_size = options.batch_limit.max(1);
        let mut budget = options.batch_limit;
        let mut cursor: Option<StaleCursor> = None;

        while budget > 0 {
            let page = match self
                .store
                .list_stale(cutoff, cursor.as_ref(), page_size)
                .await
            {
                Ok(page) => page,
                Err(e) => {
                    tracing::error!(error = %e, "Failed to list stale assets");
                    report.errors += 1;
                    return;
                }
            };
            let Some(last) = page.last() else {
                return;
            };
            let exhausted = page.len() < page_size;
            cursor = Some(StaleCursor::after(last));
            report.stale_candidates += page.len();

            let ids: Vec<String> = page.iter().map(|r| r.asset_id.clone()).collect();
            // Without a reliable answer nothing stale may be deleted this pass.
            let referenced = match self.references.referenced_asset_ids(&ids).await {
                Ok(referenced) => referenced,
                Err(e) => {
                    tracing::error!(error = %e, candidates = ids.len(), "Reference lookup failed, skipping stale assets");
                    report.errors += 1;
                    return;
                }
            };
            report.referenced += referenced.len();

            for record in page {
                if referenced.contains(&record.asset_id) {
                    continue;
                }
                if budget == 0 {
                    return;
                }
                budget -= 1;
                if options.dry_run {
                    tracing::info!(
                        asset_id = %record.asset_id,
                        object_key = %record.object_key,
                        created_at = %record.created_at,
                        "Would delete unreferenced asset"
                    );
                    report.deleted_assets += 1;
                    continue;
                }
                self.delete_asset(&record, report).await;
            }

            if exhausted {
                return;
            }
        }
    }

    async fn collect_orphaned_thumbnails(&self, options: &GcOptions, report: &mut GcReport) {
        let orphans = match self.store.list_orphaned_thumbnails(options.batch_limit).await {
            Ok(orphans) => orphans,
            Err(e) => {
                tracing::error!(error = %e, "Failed to list orphaned thumbnails");
                report.errors += 1;
                return;
            }
        };
        report.orphan_thumbnails = orphans.len();

        for record in orphans {
            if options.dry_run {
                tracing::info!(
                    asset_id = %record.asset_id,
                    parent = ?record.thumbnail_of,
                    "Would delete orphaned thumbnail"
                );
                report.deleted_assets += 1;
                continue;
            }
            self.delete_asset(&record, report).await;
        }
    }

    /// Bytes first, then the record. A record whose bytes could not be removed
    /// is kept so the next pass retries it.
    async fn delete_asset(&self, record: &AssetRecord, report: &mut GcReport) {
        if record.provider != self.storage.backend_type() {
            tracing::warn!(
                asset_id = %record.asset_id,
                provider = %record.provider,
                "Asset belongs to another storage backend, skipping"
            );
            report.errors += 1;
            return;
        }

        if let Some(upload) = record.multipart.as_ref().filter(|_| !record.is_completed()) {
            match self
                .storage
                .abort_upload(&record.object_key, &upload.upload_session_id)
                .await
            {
                Ok(()) => report.aborted_uploads += 1,
                Err(e) => tracing::warn!(
                    error = %e,
                    asset_id = %record.asset_id,
                    upload_id = %upload.upload_session_id,
                    "Failed to abort multipart upload"
                ),
            }
        }

        match self.storage.delete(&record.object_key).await {
            Ok(()) => report.deleted_blobs += 1,
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    asset_id = %record.asset_id,
                    object_key = %record.object_key,
                    "Failed to delete asset bytes, keeping record"
                );
                report.errors += 1;
                return;
            }
        }

        match self.store.delete(&record.asset_id).await {
            Ok(true) => {
                tracing::debug!(asset_id = %record.asset_id, "Deleted asset");
                report.deleted_assets += 1;
            }
            Ok(false) => {
                tracing::debug!(asset_id = %record.asset_id, "Asset already deleted");
            }
            Err(e) => {
                tracing::warn!(error = %e, asset_id = %record.asset_id, "Failed to delete asset record");
                report.errors += 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::test_support::{multipart_record, simple_record, ScriptedStorage};
    use chrono::Duration as ChronoDuration;
    use stowage_core::models::new_asset_id;
    use stowage_db::{InMemoryAssetRepository, InMemoryReferenceSource};

    struct Fixture {
        gc: AssetGarbageCollector,
        store: Arc<InMemoryAssetRepository>,
        storage: Arc<ScriptedStorage>,
        references: Arc<InMemoryReferenceSource>,
    }

    fn fixture() -> Fixture {
        let store = Arc::new(InMemoryAssetRepository::new());
        let storage = Arc::new(ScriptedStorage::new());
        let references = Arc::new(InMemoryReferenceSource::new());
        let gc = AssetGarbageCollector::new(store.clone(), storage.clone(), references.clone());
        Fixture {
            gc,
            store,
            storage,
            references,
        }
    }

    fn options(dry_run: bool) -> GcOptions {
        GcOptions {
            now: Utc::now(),
            batch_limit: 100,
            grace_period: ChronoDuration::hours(48),
            dry_run,
        }
    }

    fn days_ago(days: i64) -> DateTime<Utc> {
        Utc::now() - ChronoDuration::days(days)
    }

    #[tokio::test]
    async fn test_unreferenced_stale_asset_is_deleted_with_bytes() {
        let f = fixture();
        let id = new_asset_id();
        let record = simple_record(&id, None, days_ago(3));
        f.storage.put_object(&record.object_key);
        f.store.insert_batch(&[record.clone()]).await.unwrap();

        let report = f.gc.run_once(&options(false)).await;

        assert_eq!(report.stale_candidates, 1);
        assert_eq!(report.deleted_assets, 1);
        assert_eq!(report.deleted_blobs, 1);
        assert_eq!(report.errors, 0);
        assert!(f.store.get(&id).await.unwrap().is_none());
        assert!(!f.storage.has_object(&record.object_key));
    }

    #[tokio::test]
    async fn test_referenced_asset_survives_repeated_passes() {
        let f = fixture();
        let id = new_asset_id();
        f.store
            .insert_batch(&[simple_record(&id, None, days_ago(30))])
            .await
            .unwrap();
        f.references.add(id.clone()).await;

        for _ in 0..3 {
            let report = f.gc.run_once(&options(false)).await;
            assert_eq!(report.referenced, 1);
            assert_eq!(report.deleted_assets, 0);
        }
        assert!(f.store.get(&id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_asset_within_grace_period_is_kept() {
        let f = fixture();
        let id = new_asset_id();
        f.store
            .insert_batch(&[simple_record(&id, None, Utc::now() - ChronoDuration::hours(47))])
            .await
            .unwrap();

        let report = f.gc.run_once(&options(false)).await;
        assert_eq!(report.stale_candidates, 0);
        assert!(f.store.get(&id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_thumbnail_follows_deleted_parent_in_same_pass() {
        let f = fixture();
        let parent = new_asset_id();
        let thumb = new_asset_id();
        // The thumbnail is fresh, so only its parent's deletion makes it collectable.
        f.store
            .insert_batch(&[
                simple_record(&parent, None, days_ago(3)),
                simple_record(&thumb, Some(&parent), Utc::now()),
            ])
            .await
            .unwrap();

        let report = f.gc.run_once(&options(false)).await;

        assert_eq!(report.orphan_thumbnails, 1);
        assert_eq!(report.deleted_assets, 2);
        assert!(f.store.is_empty().await);
    }

    #[tokio::test]
    async fn test_thumbnail_of_referenced_parent_is_kept() {
        let f = fixture();
        let parent = new_asset_id();
        let thumb = new_asset_id();
        f.store
            .insert_batch(&[
                simple_record(&parent, None, days_ago(3)),
                simple_record(&thumb, Some(&parent), days_ago(3)),
            ])
            .await
            .unwrap();
        f.references.add(parent.clone()).await;

        let report = f.gc.run_once(&options(false)).await;
        assert_eq!(report.deleted_assets, 0);
        assert_eq!(f.store.len().await, 2);
    }

    #[tokio::test]
    async fn test_abandoned_multipart_session_is_aborted() {
        let f = fixture();
        let id = new_asset_id();
        let mut record = multipart_record(&id, "biz", 3, days_ago(2));
        record.created_at = days_ago(3);
        f.store.insert_batch(&[record]).await.unwrap();

        let report = f.gc.run_once(&options(false)).await;
        assert_eq!(report.aborted_uploads, 1);
        assert_eq!(f.storage.aborted_sessions(), vec![format!("session-{}", id)]);
        assert!(f.store.get(&id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_reference_lookup_failure_deletes_nothing_stale() {
        let f = fixture();
        let id = new_asset_id();
        f.store
            .insert_batch(&[simple_record(&id, None, days_ago(3))])
            .await
            .unwrap();
        f.references.set_failing(true);

        let report = f.gc.run_once(&options(false)).await;
        assert_eq!(report.errors, 1);
        assert_eq!(report.deleted_assets, 0);
        assert!(f.store.get(&id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_failed_blob_delete_keeps_record_and_continues() {
        let f = fixture();
        let broken = simple_record(&new_asset_id(), None, days_ago(4));
        let healthy = simple_record(&new_asset_id(), None, days_ago(3));
        f.storage.fail_delete_of(&broken.object_key);
        f.store
            .insert_batch(&[broken.clone(), healthy.clone()])
            .await
            .unwrap();

        let report = f.gc.run_once(&options(false)).await;
        assert_eq!(report.errors, 1);
        assert_eq!(report.deleted_assets, 1);
        assert!(f.store.get(&broken.asset_id).await.unwrap().is_some());
        assert!(f.store.get(&healthy.asset_id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_dry_run_changes_nothing() {
        let f = fixture();
        let id = new_asset_id();
        f.store
            .insert_batch(&[simple_record(&id, None, days_ago(3))])
            .await
            .unwrap();

        let report = f.gc.run_once(&options(true)).await;
        assert!(report.dry_run);
        assert_eq!(report.deleted_assets, 1);
        assert_eq!(report.deleted_blobs, 0);
        assert!(f.store.get(&id).await.unwrap().is_some());
        assert!(f.storage.deleted_keys().is_empty());
    }

    #[tokio::test]
    async fn test_batch_limit_bounds_candidates_oldest_first() {
        let f = fixture();
        let oldest = simple_record(&new_asset_id(), None, days_ago(10));
        let newer = simple_record(&new_asset_id(), None, days_ago(5));
        f.store
            .insert_batch(&[newer.clone(), oldest.clone()])
            .await
            .unwrap();

        let mut opts = options(false);
        opts.batch_limit = 1;
        let report = f.gc.run_once(&opts).await;

        assert_eq!(report.stale_candidates, 1);
        assert!(f.store.get(&oldest.asset_id).await.unwrap().is_none());
        assert!(f.store.get(&newer.asset_id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_old_referenced_assets_do_not_hide_abandoned_ones() {
        let f = fixture();
        let mut referenced = Vec::new();
        for days in [10, 9, 8] {
            let record = simple_record(&new_asset_id(), None, days_ago(days));
            f.references.add(record.asset_id.clone()).await;
            referenced.push(record);
        }
        let abandoned = simple_record(&new_asset_id(), None, days_ago(5));
        f.storage.put_object(&abandoned.object_key);
        let mut all = referenced.clone();
        all.push(abandoned.clone());
        f.store.insert_batch(&all).await.unwrap();

        let mut opts = options(false);
        opts.batch_limit = 1;
        let report = f.gc.run_once(&opts).await;

        assert_eq!(report.stale_candidates, 4);
        assert_eq!(report.referenced, 3);
        assert_eq!(report.deleted_assets, 1);
        assert!(f.store.get(&abandoned.asset_id).await.unwrap().is_none());
        assert!(!f.storage.has_object(&abandoned.object_key));
        for record in &referenced {
            assert!(f.store.get(&record.asset_id).await.unwrap().is_some());
        }
    }

    #[test]
    fn test_options_from_config_use_grace_period() {
        let now = Utc::now();
        let options = GcOptions::from_config(&GcConfig::default(), now);
        assert_eq!(options.cutoff(), now - ChronoDuration::hours(48));
        assert_eq!(options.batch_limit, 500);
        assert!(!options.dry_run);
    }
}
