use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;
use utoipa::ToSchema;

/// Upload category, fixed when the asset identity is minted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(
    feature = "sqlx",
    sqlx(type_name = "asset_category", rename_all = "lowercase")
)]
#[serde(rename_all = "lowercase")]
pub enum AssetCategory {
    Image,
    Video,
    Audio,
    Document,
    Archive,
}

impl AssetCategory {
    pub const ALL: [AssetCategory; 5] = [
        AssetCategory::Image,
        AssetCategory::Video,
        AssetCategory::Audio,
        AssetCategory::Document,
        AssetCategory::Archive,
    ];

    /// Static policy: only visual media get a client-generated thumbnail.
    pub fn requires_thumbnail(self) -> bool {
        matches!(self, AssetCategory::Image | AssetCategory::Video)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            AssetCategory::Image => "image",
            AssetCategory::Video => "video",
            AssetCategory::Audio => "audio",
            AssetCategory::Document => "document",
            AssetCategory::Archive => "archive",
        }
    }
}

impl FromStr for AssetCategory {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        AssetCategory::ALL
            .into_iter()
            .find(|c| c.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| anyhow::anyhow!("Invalid asset category: {}", s))
    }
}

impl Display for AssetCategory {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(self.as_str())
    }
}
