//! Object key layout shared by every backend.
//!
//! Key format: `business/{owner_scope}/assets/{asset_id}/{file_name}`. Keys never
//! contain `..` or a leading `/`.

use stowage_core::constants::THUMBNAIL_FILE_NAME;

const MAX_FILE_NAME_CHARS: usize = 80;

/// Make a client-supplied file name safe to embed in an object key.
pub fn sanitize_file_name(name: &str) -> String {
    let cleaned = name
        .trim()
        .replace(['\\', '/'], "_")
        .replace("..", "_");
    let cleaned: String = cleaned
        .chars()
        .filter(|c| !c.is_control())
        .take(MAX_FILE_NAME_CHARS)
        .collect();
    let cleaned = cleaned.trim();
    if cleaned.is_empty() || cleaned.chars().all(|c| c == '.' || c == '_') {
        "file".to_string()
    } else {
        cleaned.to_string()
    }
}

pub fn object_key(owner_scope: &str, asset_id: &str, file_name: &str) -> String {
    format!(
        "business/{}/assets/{}/{}",
        owner_scope,
        asset_id,
        sanitize_file_name(file_name)
    )
}

pub fn thumbnail_key(owner_scope: &str, asset_id: &str) -> String {
    object_key(owner_scope, asset_id, THUMBNAIL_FILE_NAME)
}

/// Percent-encode each segment of a key for use in a URL path.
pub fn encode_key_path(key: &str) -> String {
    key.split('/')
        .map(|segment| urlencoding::encode(segment).into_owned())
        .collect::<Vec<_>>()
        .join("/")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_object_key_layout() {
        assert_eq!(
            object_key("biz_1", "ast_abc", "photo.jpg"),
            "business/biz_1/assets/ast_abc/photo.jpg"
        );
        assert_eq!(
            thumbnail_key("biz_1", "ast_abc"),
            "business/biz_1/assets/ast_abc/thumbnail.jpg"
        );
    }

    #[test]
    fn test_sanitize_file_name_strips_traversal() {
        assert_eq!(sanitize_file_name("../../etc/passwd"), "____etc_passwd");
        assert_eq!(sanitize_file_name("a\\b/c.png"), "a_b_c.png");
        assert!(!object_key("b", "a", "../x").contains(".."));
    }

    #[test]
    fn test_sanitize_file_name_defaults_and_caps() {
        assert_eq!(sanitize_file_name("   "), "file");
        assert_eq!(sanitize_file_name(".."), "file");
        let long = "x".repeat(200);
        assert_eq!(sanitize_file_name(&long).chars().count(), 80);
    }

    #[test]
    fn test_encode_key_path_keeps_separators() {
        assert_eq!(
            encode_key_path("business/b/assets/a/my photo.jpg"),
            "business/b/assets/a/my%20photo.jpg"
        );
    }
}
