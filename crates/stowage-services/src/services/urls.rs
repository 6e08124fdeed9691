use stowage_core::constants::PUBLIC_ASSETS_PATH;
use stowage_storage::keys::encode_key_path;

/// Builds the client-facing URLs of an asset.
#[derive(Debug, Clone)]
pub struct AssetUrls {
    public_base_url: String,
    cdn_base_url: Option<String>,
}

impl AssetUrls {
    pub fn new(public_base_url: &str, cdn_base_url: Option<&str>) -> Self {
        Self {
            public_base_url: public_base_url.trim_end_matches('/').to_string(),
            cdn_base_url: cdn_base_url
                .map(|u| u.trim_end_matches('/').to_string())
                .filter(|u| !u.is_empty()),
        }
    }

    /// Stable retrieval URL served by this API.
    pub fn public_url(&self, asset_id: &str) -> String {
        format!("{}{}/{}", self.public_base_url, PUBLIC_ASSETS_PATH, asset_id)
    }

    /// CDN URL of the object, or the public URL when no CDN is configured.
    pub fn cdn_url(&self, asset_id: &str, object_key: &str) -> String {
        match self.cdn_base_url {
            Some(ref cdn) => format!("{}/{}", cdn, encode_key_path(object_key)),
            None => self.public_url(asset_id),
        }
    }
}
