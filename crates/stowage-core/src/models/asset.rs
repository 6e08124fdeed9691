use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::constants::ASSET_ID_PREFIX;
use crate::models::AssetCategory;
use crate::storage_types::StorageBackend;

/// Mint a new opaque asset id (`ast_` followed by 32 lowercase hex characters).
pub fn new_asset_id() -> String {
    format!("{}_{}", ASSET_ID_PREFIX, Uuid::new_v4().simple())
}

/// Cheap shape check used before hitting the database with a path parameter.
pub fn is_valid_asset_id(id: &str) -> bool {
    id.strip_prefix(ASSET_ID_PREFIX)
        .and_then(|rest| rest.strip_prefix('_'))
        .is_some_and(|hex| hex.len() == 32 && hex.bytes().all(|b| b.is_ascii_hexdigit()))
}

/// One presigned part destination, 1-based.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PartUrl {
    pub part_number: u32,
    pub url: String,
}

/// Multipart session attached to an asset whose bytes arrive in parts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MultipartUpload {
    pub upload_session_id: String,
    pub part_size: u64,
    pub total_parts: u32,
    pub part_urls: Vec<PartUrl>,
    /// Part URLs stop working at this instant; the session cannot be renewed.
    pub expires_at: DateTime<Utc>,
}

impl MultipartUpload {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

/// Asset identity record.
///
/// There is no status column: "bytes assembled" is `completed_at`
/// (set by completion or by a local direct upload), and "referenced" is owned by
/// the external entities that persist an `AssetReference`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetRecord {
    pub asset_id: String,
    pub owner_scope: String,
    pub category: AssetCategory,
    pub provider: StorageBackend,
    pub object_key: String,
    pub file_name: String,
    pub content_type: String,
    pub size_bytes: u64,
    pub multipart: Option<MultipartUpload>,
    /// Parent asset id when this record is a thumbnail.
    pub thumbnail_of: Option<String>,
    pub has_thumbnail: bool,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl AssetRecord {
    pub fn is_thumbnail(&self) -> bool {
        self.thumbnail_of.is_some()
    }

    pub fn is_completed(&self) -> bool {
        self.completed_at.is_some()
    }
}
