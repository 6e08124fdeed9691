//! Protocol constants shared by the descriptor service, storage providers and API.

/// Prefix of every minted asset id (`ast_<32 hex>`).
pub const ASSET_ID_PREFIX: &str = "ast";

/// Upper bound on files in one descriptor request.
pub const MAX_FILES_PER_REQUEST: usize = 50;

/// Thumbnails are always uploaded as JPEG by clients.
pub const THUMBNAIL_CONTENT_TYPE: &str = "image/jpeg";
pub const THUMBNAIL_FILE_NAME: &str = "thumbnail.jpg";

/// S3-compatible backends accept part numbers 1..=10000.
pub const MAX_PART_NUMBER: u32 = 10_000;

/// Minimum size of every part except the last one.
pub const MIN_PART_SIZE_BYTES: u64 = 5 * 1024 * 1024;

/// Public responses never change for a given asset id.
pub const IMMUTABLE_CACHE_CONTROL: &str = "public, max-age=31536000, immutable";

/// Path of the public retrieval endpoint, relative to the server base URL.
pub const PUBLIC_ASSETS_PATH: &str = "/api/v0/public/assets";

/// Path of the local provider's direct upload endpoint, relative to the server base URL.
pub const LOCAL_UPLOAD_PATH: &str = "/api/v0/assets/internal/upload";
