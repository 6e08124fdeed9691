//! API constants
//!
//! Routes are versioned under `/api/v0`. The public and direct-upload paths
//! are shared with the services layer, which embeds them in issued URLs.

/// API base path prefix (version-independent)
pub const API_BASE: &str = "/api";

/// Current API version segment.
pub const API_VERSION: &str = "v0";

/// Versioned prefix for every domain route.
pub const API_PREFIX: &str = "/api/v0";

pub use stowage_core::constants::{LOCAL_UPLOAD_PATH, PUBLIC_ASSETS_PATH};

/// Served OpenAPI document.
pub const OPENAPI_PATH: &str = "/api/openapi.json";
