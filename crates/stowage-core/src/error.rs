//! Error types module
//!
//! `AppError` is the single error type crossing crate boundaries. Each variant
//! describes its own HTTP presentation through [`ErrorMetadata`], so handlers only
//! wrap and return it.
//!
//! The taxonomy of the upload protocol maps onto the variants as follows:
//! validation failures are `Validation`/`InvalidInput`/`BadRequest`, an expired
//! multipart session is `Expired`, a part list with gaps is `IncompleteMultipart`,
//! a missing identity or missing bytes is `NotFound`, and backend transport
//! failures are `Storage`. Only `Storage`, `Database` and `Internal*` are retryable.

use std::io;

use serde::Serialize;
use utoipa::ToSchema;

#[cfg(feature = "sqlx")]
use sqlx::Error as SqlxError;

/// Log level for error reporting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    /// Debug level - for expected errors like validation failures
    Debug,
    /// Warning level - for client mistakes worth noticing
    Warn,
    /// Error level - for unexpected failures
    Error,
}

/// Metadata for error responses - defines how an error should be presented
pub trait ErrorMetadata {
    /// HTTP status code to return
    fn http_status_code(&self) -> u16;

    /// Machine-readable error code (e.g., "VALIDATION_ERROR")
    fn error_code(&self) -> &'static str;

    /// Whether this error is recoverable (can be retried with the same parameters)
    fn is_recoverable(&self) -> bool;

    /// Suggested action for the client
    fn suggested_action(&self) -> Option<&'static str>;

    /// Client-facing message (may differ from internal error message)
    fn client_message(&self) -> String;

    /// Whether details should be hidden in production
    fn is_sensitive(&self) -> bool;

    /// Log level for this error
    fn log_level(&self) -> LogLevel;
}

/// A single validation failure addressed to a request field, e.g. `files[3].contentType`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

impl FieldError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[cfg(feature = "sqlx")]
    #[error("Database error: {0}")]
    Database(#[source] SqlxError),

    #[cfg(not(feature = "sqlx"))]
    #[error("Database error: {0}")]
    Database(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Validation failed: {message}")]
    Validation {
        message: String,
        errors: Vec<FieldError>,
    },

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Incomplete multipart upload: {0}")]
    IncompleteMultipart(String),

    #[error("Expired: {0}")]
    Expired(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Internal error with source")]
    InternalWithSource {
        message: String,
        #[source]
        source: anyhow::Error,
    },
}

impl AppError {
    /// Validation error carrying a single field failure.
    pub fn field(field: impl Into<String>, message: impl Into<String>) -> Self {
        let error = FieldError::new(field, message);
        AppError::Validation {
            message: error.message.clone(),
            errors: vec![error],
        }
    }

    /// Validation error for a batch of field failures. The first failure becomes the summary.
    pub fn fields(errors: Vec<FieldError>) -> Self {
        let message = match errors.as_slice() {
            [] => "Request validation failed".to_string(),
            [only] => only.message.clone(),
            [first, rest @ ..] => format!("{} (and {} more)", first.message, rest.len()),
        };
        AppError::Validation { message, errors }
    }

    /// Field failures attached to this error, if any.
    pub fn field_errors(&self) -> &[FieldError] {
        match self {
            AppError::Validation { errors, .. } => errors,
            _ => &[],
        }
    }
}

#[cfg(feature = "sqlx")]
impl From<SqlxError> for AppError {
    fn from(err: SqlxError) -> Self {
        AppError::Database(err)
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::InternalWithSource {
            message: err.to_string(),
            source: err,
        }
    }
}

impl From<io::Error> for AppError {
    fn from(err: io::Error) -> Self {
        AppError::Internal(format!("IO error: {}", err))
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::InvalidInput(format!("JSON parsing error: {}", err))
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(err: validator::ValidationErrors) -> Self {
        let mut errors = Vec::new();
        flatten_validation_errors("", &err, &mut errors);
        errors.sort_by(|a, b| a.field.cmp(&b.field));
        AppError::fields(errors)
    }
}

/// Walks nested `validator` errors into flat `parent[idx].field` paths.
fn flatten_validation_errors(
    prefix: &str,
    errors: &validator::ValidationErrors,
    out: &mut Vec<FieldError>,
) {
    use validator::ValidationErrorsKind;

    for (field, kind) in errors.errors() {
        let name = camel_case(&format!("{}", field));
        let path = if prefix.is_empty() {
            name
        } else {
            format!("{}.{}", prefix, name)
        };
        match kind {
            ValidationErrorsKind::Field(list) => {
                for e in list {
                    let message = e
                        .message
                        .as_ref()
                        .map(|m| m.to_string())
                        .unwrap_or_else(|| format!("{} is invalid ({})", path, e.code));
                    out.push(FieldError::new(path.clone(), message));
                }
            }
            ValidationErrorsKind::Struct(inner) => flatten_validation_errors(&path, inner, out),
            ValidationErrorsKind::List(items) => {
                for (idx, inner) in items {
                    flatten_validation_errors(&format!("{}[{}]", path, idx), inner, out);
                }
            }
        }
    }
}

/// Wire types are camelCase while `validator` reports Rust field names.
fn camel_case(field: &str) -> String {
    let mut out = String::with_capacity(field.len());
    let mut upper = false;
    for c in field.chars() {
        if c == '_' {
            upper = true;
        } else if upper {
            out.extend(c.to_uppercase());
            upper = false;
        } else {
            out.push(c);
        }
    }
    out
}

/// Static metadata for each variant: (http_status, error_code, recoverable, suggested_action, sensitive, log_level).
fn app_error_static_metadata(
    err: &AppError,
) -> (
    u16,
    &'static str,
    bool,
    Option<&'static str>,
    bool,
    LogLevel,
) {
    match err {
        AppError::Database(_) => (
            500,
            "DATABASE_ERROR",
            true,
            Some("Retry after a short delay"),
            true,
            LogLevel::Error,
        ),
        AppError::Storage(_) => (
            502,
            "STORAGE_ERROR",
            true,
            Some("Retry the same request after a short delay"),
            true,
            LogLevel::Error,
        ),
        AppError::Validation { .. } => (
            400,
            "VALIDATION_ERROR",
            false,
            Some("Fix the listed fields and resubmit the whole request"),
            false,
            LogLevel::Debug,
        ),
        AppError::InvalidInput(_) => (
            400,
            "INVALID_INPUT",
            false,
            Some("Check request parameters and try again"),
            false,
            LogLevel::Debug,
        ),
        AppError::BadRequest(_) => (
            400,
            "BAD_REQUEST",
            false,
            Some("Check request format and parameters"),
            false,
            LogLevel::Debug,
        ),
        AppError::NotFound(_) => (
            404,
            "NOT_FOUND",
            false,
            Some("Verify the asset ID exists and its upload finished"),
            false,
            LogLevel::Debug,
        ),
        AppError::Conflict(_) => (
            409,
            "CONFLICT",
            false,
            Some("Request a new upload descriptor"),
            false,
            LogLevel::Debug,
        ),
        AppError::IncompleteMultipart(_) => (
            400,
            "INCOMPLETE_MULTIPART",
            false,
            Some("Submit exactly one etag for every part number"),
            false,
            LogLevel::Debug,
        ),
        AppError::Expired(_) => (
            410,
            "EXPIRED_RESOURCE",
            false,
            Some("Request a new upload descriptor and upload again"),
            false,
            LogLevel::Warn,
        ),
        AppError::Internal(_) | AppError::InternalWithSource { .. } => (
            500,
            "INTERNAL_ERROR",
            true,
            Some("Retry after a short delay"),
            true,
            LogLevel::Error,
        ),
    }
}

impl AppError {
    /// Get the error type name for detailed error responses
    pub fn error_type(&self) -> &str {
        match self {
            AppError::Database(_) => "Database",
            AppError::Storage(_) => "Storage",
            AppError::Validation { .. } => "Validation",
            AppError::InvalidInput(_) => "InvalidInput",
            AppError::BadRequest(_) => "BadRequest",
            AppError::NotFound(_) => "NotFound",
            AppError::Conflict(_) => "Conflict",
            AppError::IncompleteMultipart(_) => "IncompleteMultipart",
            AppError::Expired(_) => "Expired",
            AppError::Internal(_) => "Internal",
            AppError::InternalWithSource { .. } => "Internal",
        }
    }

    /// Get detailed error information including error chain
    pub fn detailed_message(&self) -> String {
        use std::error::Error;

        let mut details = self.to_string();

        let mut source = self.source();
        let mut depth = 0;
        while let Some(err) = source {
            depth += 1;
            if depth > 5 {
                details.push_str("\n  ... (truncated)");
                break;
            }
            details.push_str(&format!("\n  Caused by: {}", err));
            source = err.source();
        }

        details
    }
}

impl ErrorMetadata for AppError {
    fn http_status_code(&self) -> u16 {
        app_error_static_metadata(self).0
    }

    fn error_code(&self) -> &'static str {
        app_error_static_metadata(self).1
    }

    fn is_recoverable(&self) -> bool {
        app_error_static_metadata(self).2
    }

    fn suggested_action(&self) -> Option<&'static str> {
        app_error_static_metadata(self).3
    }

    fn is_sensitive(&self) -> bool {
        app_error_static_metadata(self).4
    }

    fn log_level(&self) -> LogLevel {
        app_error_static_metadata(self).5
    }

    fn client_message(&self) -> String {
        match self {
            AppError::Database(_) => "Failed to access database".to_string(),
            AppError::Storage(_) => "Failed to reach storage backend".to_string(),
            AppError::Validation { message, .. } => message.clone(),
            AppError::InvalidInput(ref msg)
            | AppError::BadRequest(ref msg)
            | AppError::NotFound(ref msg)
            | AppError::Conflict(ref msg)
            | AppError::IncompleteMultipart(ref msg)
            | AppError::Expired(ref msg) => msg.clone(),
            AppError::Internal(_) | AppError::InternalWithSource { .. } => {
                "Internal server error".to_string()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use validator::Validate;

    #[test]
    fn test_error_metadata_database() {
        #[cfg(feature = "sqlx")]
        let err = AppError::from(sqlx::Error::PoolClosed);
        #[cfg(not(feature = "sqlx"))]
        let err = AppError::Database("pool closed".to_string());
        assert_eq!(err.http_status_code(), 500);
        assert_eq!(err.error_code(), "DATABASE_ERROR");
        assert!(err.is_recoverable());
        assert_eq!(err.client_message(), "Failed to access database");
        assert!(err.is_sensitive());
        assert_eq!(err.log_level(), LogLevel::Error);
    }

    #[test]
    fn test_error_metadata_not_found() {
        let err = AppError::NotFound("Asset not found".to_string());
        assert_eq!(err.http_status_code(), 404);
        assert_eq!(err.error_code(), "NOT_FOUND");
        assert!(!err.is_recoverable());
        assert_eq!(err.client_message(), "Asset not found");
        assert!(!err.is_sensitive());
        assert_eq!(err.log_level(), LogLevel::Debug);
    }

    #[test]
    fn test_only_transport_class_is_retryable_for_protocol_errors() {
        assert!(AppError::Storage("timeout".into()).is_recoverable());
        assert!(!AppError::field("files", "too many").is_recoverable());
        assert!(!AppError::Expired("gone".into()).is_recoverable());
        assert!(!AppError::IncompleteMultipart("part 2".into()).is_recoverable());
        assert!(!AppError::NotFound("x".into()).is_recoverable());
    }

    #[test]
    fn test_error_metadata_expired() {
        let err = AppError::Expired("upload session expired".to_string());
        assert_eq!(err.http_status_code(), 410);
        assert_eq!(err.error_code(), "EXPIRED_RESOURCE");
        assert_eq!(err.log_level(), LogLevel::Warn);
    }

    #[test]
    fn test_fields_summary_message() {
        let err = AppError::fields(vec![
            FieldError::new("files[0].contentType", "unsupported content type"),
            FieldError::new("files[2].sizeBytes", "file is too large"),
        ]);
        assert_eq!(err.http_status_code(), 400);
        assert_eq!(err.error_code(), "VALIDATION_ERROR");
        assert_eq!(err.client_message(), "unsupported content type (and 1 more)");
        assert_eq!(err.field_errors().len(), 2);
    }

    #[derive(Validate)]
    struct Inner {
        #[validate(length(min = 1, message = "name is required"))]
        name: String,
    }

    #[derive(Validate)]
    struct Outer {
        #[validate(nested)]
        items: Vec<Inner>,
    }

    #[test]
    fn test_from_validation_errors_flattens_nested_paths() {
        let outer = Outer {
            items: vec![
                Inner {
                    name: "ok".to_string(),
                },
                Inner {
                    name: String::new(),
                },
            ],
        };
        let err = AppError::from(outer.validate().unwrap_err());
        assert_eq!(
            err.field_errors(),
            &[FieldError::new("items[1].name", "name is required")]
        );
    }
}
