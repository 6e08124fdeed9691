use std::collections::HashSet;

use async_trait::async_trait;
use sqlx::{PgPool, Row};
use stowage_core::{AppError, ReferenceColumn};

/// Answers which asset ids are still pointed at by a persisted `AssetReference`.
#[async_trait]
pub trait ReferenceSource: Send + Sync {
    /// The subset of `asset_ids` that at least one entity references.
    async fn referenced_asset_ids(&self, asset_ids: &[String]) -> Result<HashSet<String>, AppError>;
}

/// Looks for references in JSONB columns of entity tables.
///
/// A plain column holds one reference object (`{"assetId": ...}`); a column marked
/// as an array holds a JSON array of them.
#[derive(Clone)]
pub struct PgReferenceSource {
    pool: PgPool,
    columns: Vec<ReferenceColumn>,
}

impl PgReferenceSource {
    pub fn new(pool: PgPool, columns: Vec<ReferenceColumn>) -> Self {
        if columns.is_empty() {
            tracing::warn!(
                "No asset reference columns configured; every stale asset will be treated as unreferenced"
            );
        }
        Self { pool, columns }
    }

    /// Identifiers are validated when the configuration is parsed.
    fn query_for(column: &ReferenceColumn) -> String {
        let table = format!("\"{}\"", column.table);
        let col = format!("\"{}\"", column.column);
        if column.is_array {
            format!(
                r#"
                SELECT DISTINCT elem->>'assetId' AS asset_id
                FROM {table},
                     jsonb_array_elements(
                         CASE WHEN jsonb_typeof({col}) = 'array' THEN {col} ELSE '[]'::jsonb END
                     ) AS elem
                WHERE elem->>'assetId' = ANY($1)
                "#
            )
        } else {
            format!(
                r#"
                SELECT DISTINCT {col}->>'assetId' AS asset_id
                FROM {table}
                WHERE {col}->>'assetId' = ANY($1)
                "#
            )
        }
    }
}

#[async_trait]
impl ReferenceSource for PgReferenceSource {
    #[tracing::instrument(skip(self, asset_ids), fields(
        db.system = "postgresql",
        db.operation = "select",
        candidates = asset_ids.len(),
        columns = self.columns.len()
    ))]
    async fn referenced_asset_ids(&self, asset_ids: &[String]) -> Result<HashSet<String>, AppError> {
        let mut referenced = HashSet::new();
        if asset_ids.is_empty() {
            return Ok(referenced);
        }

        let ids = asset_ids.to_vec();
        for column in &self.columns {
            let rows = sqlx::query(&Self::query_for(column))
                .bind(&ids)
                .fetch_all(&self.pool)
                .await?;

            for row in rows {
                let id: Option<String> = row.try_get("asset_id")?;
                if let Some(id) = id {
                    referenced.insert(id);
                }
            }
        }

        Ok(referenced)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_for_single_column() {
        let column: ReferenceColumn = "businesses.logo".parse().unwrap();
        let sql = PgReferenceSource::query_for(&column);
        assert!(sql.contains(r#""logo"->>'assetId'"#));
        assert!(sql.contains(r#"FROM "businesses""#));
        assert!(!sql.contains("jsonb_array_elements"));
    }

    #[test]
    fn test_query_for_array_column() {
        let column: ReferenceColumn = "products.photos[]".parse().unwrap();
        let sql = PgReferenceSource::query_for(&column);
        assert!(sql.contains(r#"jsonb_array_elements"#));
        assert!(sql.contains(r#"jsonb_typeof("photos")"#));
        assert!(sql.contains("ANY($1)"));
    }
}
