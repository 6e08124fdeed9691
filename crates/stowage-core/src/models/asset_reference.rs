use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

/// Value object external entities (business logo, product photos, ...) persist to
/// point at an uploaded asset. Only `asset_id` is ever read back by this service;
/// `url` is display data and never dereferenced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema, Validate)]
#[serde(rename_all = "camelCase")]
pub struct AssetReference {
    #[validate(length(min = 1, max = 2048))]
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[validate(length(max = 2048))]
    pub original_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[validate(length(max = 2048))]
    pub thumbnail_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[validate(length(max = 2048))]
    pub thumbnail_original_url: Option<String>,
    #[validate(length(min = 1, max = 64))]
    pub asset_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<AssetReferenceMetadata>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AssetReferenceMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alt_text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub caption: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_asset_reference_wire_shape() {
        let json = serde_json::json!({
            "url": "https://cdn.example.com/business/b1/assets/ast_1/logo.png",
            "thumbnailUrl": "https://cdn.example.com/business/b1/assets/ast_2/thumbnail.jpg",
            "assetId": "ast_1",
            "metadata": { "altText": "Logo", "width": 512 }
        });
        let reference: AssetReference = serde_json::from_value(json).unwrap();
        assert_eq!(reference.asset_id, "ast_1");
        assert_eq!(reference.original_url, None);
        let metadata = reference.metadata.as_ref().unwrap();
        assert_eq!(metadata.alt_text.as_deref(), Some("Logo"));
        assert_eq!(metadata.width, Some(512));

        let back = serde_json::to_value(&reference).unwrap();
        assert!(back.get("originalUrl").is_none());
        assert_eq!(back["metadata"]["altText"], "Logo");
    }
}
