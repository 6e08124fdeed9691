use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

use crate::models::PartUrl;

/// Request for upload descriptors, one per file.
#[derive(Debug, Clone, Deserialize, ToSchema, Validate)]
pub struct CreateUploadsRequest {
    #[validate(
        length(
            min = 1,
            max = 50,
            message = "files must contain between 1 and 50 entries"
        ),
        nested
    )]
    pub files: Vec<UploadFileRequest>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UploadFileRequest {
    /// Original file name; sanitised before it becomes part of the object key
    #[validate(length(
        min = 1,
        max = 255,
        message = "fileName must be between 1 and 255 characters"
    ))]
    pub file_name: String,
    /// Declared MIME type
    #[validate(length(
        min = 1,
        max = 255,
        message = "contentType must be between 1 and 255 characters"
    ))]
    pub content_type: String,
    /// Declared size in bytes
    #[validate(range(min = 1, message = "sizeBytes must be at least 1 byte"))]
    pub size_bytes: u64,
}

/// HTTP method the client must use against `url`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "UPPERCASE")]
pub enum UploadMethod {
    Post,
    Put,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct CreateUploadsResponse {
    pub uploads: Vec<UploadDescriptor>,
}

/// Where and how to send the bytes of one file.
///
/// Single-shot descriptors carry `url`/`headers`; multipart descriptors carry
/// `uploadId`, `partSize`, `totalParts` and `partUrls` instead.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UploadDescriptor {
    pub asset_id: String,
    pub method: UploadMethod,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub headers: Option<BTreeMap<String, String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub part_size: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_parts: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub part_urls: Option<Vec<PartUrl>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub upload_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
    pub public_url: String,
    pub cdn_url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thumbnail: Option<ThumbnailDescriptor>,
}

/// Nested descriptor for a thumbnail. Always single-shot.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ThumbnailDescriptor {
    pub asset_id: String,
    pub method: UploadMethod,
    pub url: String,
    pub headers: BTreeMap<String, String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
    pub public_url: String,
    pub cdn_url: String,
}

/// Per-part checksums reported by the client after uploading every part.
#[derive(Debug, Clone, Deserialize, ToSchema, Validate)]
pub struct CompleteUploadRequest {
    #[validate(
        length(
            min = 1,
            max = 10000,
            message = "parts must contain between 1 and 10000 entries"
        ),
        nested
    )]
    pub parts: Vec<CompletedPartInput>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CompletedPartInput {
    /// 1-based part number
    #[validate(range(min = 1, max = 10000, message = "partNumber must be between 1 and 10000"))]
    pub part_number: u32,
    /// ETag returned by the storage backend for this part (quotes optional)
    #[validate(length(min = 1, max = 256, message = "etag must not be empty"))]
    pub etag: String,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CompleteUploadResponse {
    pub asset_id: String,
    pub completed: bool,
    /// True when an earlier call already assembled the object
    pub already_completed: bool,
    pub public_url: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AppError;

    fn file(name: &str) -> UploadFileRequest {
        UploadFileRequest {
            file_name: name.to_string(),
            content_type: "image/png".to_string(),
            size_bytes: 10,
        }
    }

    #[test]
    fn test_create_uploads_request_rejects_51_files_on_files_field() {
        let request = CreateUploadsRequest {
            files: (0..51).map(|i| file(&format!("{}.png", i))).collect(),
        };
        let err = AppError::from(request.validate().unwrap_err());
        let fields: Vec<_> = err.field_errors().iter().map(|e| e.field.as_str()).collect();
        assert_eq!(fields, vec!["files"]);
    }

    #[test]
    fn test_create_uploads_request_accepts_50_files() {
        let request = CreateUploadsRequest {
            files: (0..50).map(|i| file(&format!("{}.png", i))).collect(),
        };
        assert!(request.validate().is_ok());
    }

    #[test]
    fn test_upload_file_request_camel_case() {
        let request: CreateUploadsRequest = serde_json::from_value(serde_json::json!({
            "files": [{ "fileName": "a.png", "contentType": "image/png", "sizeBytes": 0 }]
        }))
        .unwrap();
        let err = AppError::from(request.validate().unwrap_err());
        assert_eq!(err.field_errors()[0].field, "files[0].sizeBytes");
    }

    #[test]
    fn test_complete_request_reports_nested_part_field() {
        let request = CompleteUploadRequest {
            parts: vec![
                CompletedPartInput {
                    part_number: 1,
                    etag: "\"abc\"".to_string(),
                },
                CompletedPartInput {
                    part_number: 2,
                    etag: String::new(),
                },
            ],
        };
        let err = AppError::from(request.validate().unwrap_err());
        assert_eq!(err.field_errors()[0].field, "parts[1].etag");

        let value = serde_json::to_value(&request.parts[0]).unwrap();
        assert_eq!(value, serde_json::json!({ "partNumber": 1, "etag": "\"abc\"" }));
    }

    #[test]
    fn test_upload_file_request_serializes_camel_case() {
        let value = serde_json::to_value(file("a.png")).unwrap();
        assert_eq!(
            value,
            serde_json::json!({ "fileName": "a.png", "contentType": "image/png", "sizeBytes": 10 })
        );
    }

    #[test]
    fn test_descriptor_omits_absent_fields() {
        let descriptor = UploadDescriptor {
            asset_id: "ast_1".to_string(),
            method: UploadMethod::Post,
            url: Some("http://localhost/upload".to_string()),
            headers: None,
            part_size: None,
            total_parts: None,
            part_urls: None,
            upload_id: None,
            expires_at: None,
            public_url: "http://localhost/p".to_string(),
            cdn_url: "http://localhost/p".to_string(),
            thumbnail: None,
        };
        let value = serde_json::to_value(&descriptor).unwrap();
        assert_eq!(value["method"], "POST");
        assert_eq!(value["assetId"], "ast_1");
        assert!(value.get("partUrls").is_none());
        assert!(value.get("thumbnail").is_none());
    }
}
