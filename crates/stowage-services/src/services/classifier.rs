//! Category classification of declared uploads.

use stowage_core::models::AssetCategory;
use stowage_core::{CategoryLimits, FieldError};

const DOCUMENT_MARKERS: &[&str] = &[
    "pdf",
    "msword",
    "wordprocessingml",
    "opendocument.text",
    "rtf",
];
const ARCHIVE_MARKERS: &[&str] = &["zip", "x-tar", "gzip", "x-rar", "x-7z", "compressed"];

/// Outcome of classifying one declared file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Classification {
    pub category: AssetCategory,
    pub max_size_bytes: u64,
    pub requires_thumbnail: bool,
}

/// Maps a declared content type, file name and size onto an upload category.
#[derive(Debug, Clone)]
pub struct CategoryClassifier {
    limits: CategoryLimits,
}

impl CategoryClassifier {
    pub fn new(limits: CategoryLimits) -> Self {
        Self { limits }
    }

    pub fn limits(&self) -> &CategoryLimits {
        &self.limits
    }

    /// Category implied by a content type alone.
    pub fn category_for_content_type(content_type: &str) -> Option<AssetCategory> {
        let mime = content_type
            .split(';')
            .next()
            .unwrap_or_default()
            .trim()
            .to_ascii_lowercase();

        if mime.starts_with("image/") {
            Some(AssetCategory::Image)
        } else if mime.starts_with("video/") {
            Some(AssetCategory::Video)
        } else if mime.starts_with("audio/") {
            Some(AssetCategory::Audio)
        } else if mime.starts_with("text/") || DOCUMENT_MARKERS.iter().any(|m| mime.contains(m)) {
            Some(AssetCategory::Document)
        } else if ARCHIVE_MARKERS.iter().any(|m| mime.contains(m)) {
            Some(AssetCategory::Archive)
        } else {
            None
        }
    }

    /// Classify one file. Errors carry bare field names (`contentType`,
    /// `fileName`, `sizeBytes`); callers prefix them with the item path.
    pub fn classify(
        &self,
        content_type: &str,
        file_name: &str,
        size_bytes: u64,
    ) -> Result<Classification, Vec<FieldError>> {
        let category = Self::category_for_content_type(content_type).ok_or_else(|| {
            vec![FieldError::new(
                "contentType",
                format!("Content type '{}' is not allowed", content_type),
            )]
        })?;
        let policy = self.limits.get(category);

        let mut errors = Vec::new();

        let extension = file_name
            .rsplit_once('.')
            .map(|(_, ext)| ext.trim().to_ascii_lowercase())
            .unwrap_or_default();
        if extension.is_empty() || !policy.allowed_extensions.contains(&extension) {
            errors.push(FieldError::new(
                "fileName",
                format!(
                    "File extension must be one of [{}] for {} uploads",
                    policy.allowed_extensions.join(", "),
                    category
                ),
            ));
        }

        if size_bytes == 0 {
            errors.push(FieldError::new("sizeBytes", "sizeBytes must be at least 1 byte"));
        } else if size_bytes > policy.max_size_bytes {
            errors.push(FieldError::new(
                "sizeBytes",
                format!(
                    "File size {} bytes exceeds the {} limit of {} bytes",
                    size_bytes, category, policy.max_size_bytes
                ),
            ));
        }

        if !errors.is_empty() {
            return Err(errors);
        }

        Ok(Classification {
            category,
            max_size_bytes: policy.max_size_bytes,
            requires_thumbnail: category.requires_thumbnail(),
        })
    }
}
