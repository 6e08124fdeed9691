use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgRow;
use sqlx::types::Json;
use sqlx::{PgPool, Row};
use stowage_core::models::{AssetRecord, MultipartUpload, PartUrl};
use stowage_core::AppError;

/// Storage of asset identity records.
#[async_trait]
pub trait AssetStore: Send + Sync {
    /// Insert every record or none of them.
    async fn insert_batch(&self, records: &[AssetRecord]) -> Result<(), AppError>;

    async fn get(&self, asset_id: &str) -> Result<Option<AssetRecord>, AppError>;

    /// Set `completed_at` if it is still unset. Returns false when another call got there first.
    async fn mark_completed(&self, asset_id: &str, at: DateTime<Utc>) -> Result<bool, AppError>;

    /// Non-thumbnail records created before `before`, ordered by `(created_at, asset_id)`
    /// and starting strictly after `after` when given.
    async fn list_stale(
        &self,
        before: DateTime<Utc>,
        after: Option<&StaleCursor>,
        limit: usize,
    ) -> Result<Vec<AssetRecord>, AppError>;

    /// Thumbnail records whose parent record no longer exists.
    async fn list_orphaned_thumbnails(&self, limit: usize) -> Result<Vec<AssetRecord>, AppError>;

    /// Returns false when the record was already gone.
    async fn delete(&self, asset_id: &str) -> Result<bool, AppError>;

    /// Cheap round trip used by health checks.
    async fn ping(&self) -> Result<(), AppError> {
        Ok(())
    }
}

/// Keyset position in the stale listing.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StaleCursor {
    pub created_at: DateTime<Utc>,
    pub asset_id: String,
}

impl StaleCursor {
    /// Position just past `record`.
    pub fn after(record: &AssetRecord) -> Self {
        Self {
            created_at: record.created_at,
            asset_id: record.asset_id.clone(),
        }
    }
}

const SELECT_COLUMNS: &str = r#"
    asset_id, owner_scope, category, provider, object_key, file_name, content_type,
    size_bytes, upload_session_id, part_size, total_parts, part_urls, parts_expire_at,
    thumbnail_of, has_thumbnail, created_at, completed_at
"#;

fn row_to_record(row: &PgRow) -> Result<AssetRecord, AppError> {
    let upload_session_id: Option<String> = row.try_get("upload_session_id")?;
    let multipart = match upload_session_id {
        Some(upload_session_id) => {
            let part_size: i64 = row.try_get("part_size")?;
            let total_parts: i32 = row.try_get("total_parts")?;
            let part_urls: Json<Vec<PartUrl>> = row.try_get("part_urls")?;
            Some(MultipartUpload {
                upload_session_id,
                part_size: part_size as u64,
                total_parts: total_parts as u32,
                part_urls: part_urls.0,
                expires_at: row.try_get("parts_expire_at")?,
            })
        }
        None => None,
    };

    let size_bytes: i64 = row.try_get("size_bytes")?;

    Ok(AssetRecord {
        asset_id: row.try_get("asset_id")?,
        owner_scope: row.try_get("owner_scope")?,
        category: row.try_get("category")?,
        provider: row.try_get("provider")?,
        object_key: row.try_get("object_key")?,
        file_name: row.try_get("file_name")?,
        content_type: row.try_get("content_type")?,
        size_bytes: size_bytes as u64,
        multipart,
        thumbnail_of: row.try_get("thumbnail_of")?,
        has_thumbnail: row.try_get("has_thumbnail")?,
        created_at: row.try_get("created_at")?,
        completed_at: row.try_get("completed_at")?,
    })
}

/// PostgreSQL-backed [`AssetStore`] over the `uploaded_assets` table.
#[derive(Clone)]
pub struct PgAssetRepository {
    pool: PgPool,
}

impl PgAssetRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AssetStore for PgAssetRepository {
    #[tracing::instrument(skip(self, records), fields(
        db.system = "postgresql",
        db.table = "uploaded_assets",
        db.operation = "insert",
        count = records.len()
    ))]
    async fn insert_batch(&self, records: &[AssetRecord]) -> Result<(), AppError> {
        let mut tx = self.pool.begin().await?;

        for record in records {
            let multipart = record.multipart.as_ref();
            sqlx::query(
                r#"
                INSERT INTO uploaded_assets (
                    asset_id, owner_scope, category, provider, object_key, file_name,
                    content_type, size_bytes, upload_session_id, part_size, total_parts,
                    part_urls, parts_expire_at, thumbnail_of, has_thumbnail, created_at,
                    completed_at
                )
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17)
                "#,
            )
            .bind(&record.asset_id)
            .bind(&record.owner_scope)
            .bind(record.category)
            .bind(record.provider)
            .bind(&record.object_key)
            .bind(&record.file_name)
            .bind(&record.content_type)
            .bind(record.size_bytes as i64)
            .bind(multipart.map(|m| m.upload_session_id.clone()))
            .bind(multipart.map(|m| m.part_size as i64))
            .bind(multipart.map(|m| m.total_parts as i32))
            .bind(multipart.map(|m| Json(m.part_urls.clone())))
            .bind(multipart.map(|m| m.expires_at))
            .bind(&record.thumbnail_of)
            .bind(record.has_thumbnail)
            .bind(record.created_at)
            .bind(record.completed_at)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    #[tracing::instrument(skip(self), fields(
        db.system = "postgresql",
        db.table = "uploaded_assets",
        db.operation = "select"
    ))]
    async fn get(&self, asset_id: &str) -> Result<Option<AssetRecord>, AppError> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM uploaded_assets WHERE asset_id = $1",
            SELECT_COLUMNS
        ))
        .bind(asset_id)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(row_to_record).transpose()
    }

    #[tracing::instrument(skip(self), fields(
        db.system = "postgresql",
        db.table = "uploaded_assets",
        db.operation = "update"
    ))]
    async fn mark_completed(&self, asset_id: &str, at: DateTime<Utc>) -> Result<bool, AppError> {
        let result = sqlx::query(
            r#"
            UPDATE uploaded_assets
            SET completed_at = $2
            WHERE asset_id = $1 AND completed_at IS NULL
            "#,
        )
        .bind(asset_id)
        .bind(at)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    #[tracing::instrument(skip(self), fields(
        db.system = "postgresql",
        db.table = "uploaded_assets",
        db.operation = "select"
    ))]
    async fn list_stale(
        &self,
        before: DateTime<Utc>,
        after: Option<&StaleCursor>,
        limit: usize,
    ) -> Result<Vec<AssetRecord>, AppError> {
        let rows = sqlx::query(&format!(
            r#"
            SELECT {}
            FROM uploaded_assets
            WHERE thumbnail_of IS NULL
              AND created_at < $1
              AND ($2::timestamptz IS NULL OR (created_at, asset_id) > ($2, $3::text))
            ORDER BY created_at ASC, asset_id ASC
            LIMIT $4
            "#,
            SELECT_COLUMNS
        ))
        .bind(before)
        .bind(after.map(|c| c.created_at))
        .bind(after.map(|c| c.asset_id.clone()))
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_record).collect()
    }

    #[tracing::instrument(skip(self), fields(
        db.system = "postgresql",
        db.table = "uploaded_assets",
        db.operation = "select"
    ))]
    async fn list_orphaned_thumbnails(&self, limit: usize) -> Result<Vec<AssetRecord>, AppError> {
        let rows = sqlx::query(&format!(
            r#"
            SELECT {}
            FROM uploaded_assets t
            WHERE t.thumbnail_of IS NOT NULL
              AND NOT EXISTS (
                  SELECT 1 FROM uploaded_assets p WHERE p.asset_id = t.thumbnail_of
              )
            ORDER BY t.created_at ASC
            LIMIT $1
            "#,
            SELECT_COLUMNS
        ))
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_record).collect()
    }

    #[tracing::instrument(skip(self), fields(
        db.system = "postgresql",
        db.table = "uploaded_assets",
        db.operation = "delete"
    ))]
    async fn delete(&self, asset_id: &str) -> Result<bool, AppError> {
        let result = sqlx::query("DELETE FROM uploaded_assets WHERE asset_id = $1")
            .bind(asset_id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn ping(&self) -> Result<(), AppError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}
