//! Configuration module
//!
//! Everything is read from the environment (after loading an optional `.env`).
//! `Config::validate` is called once at startup so misconfiguration fails fast.

use std::env;
use std::str::FromStr;
use std::sync::OnceLock;
use std::time::Duration;

use regex::Regex;

use crate::models::AssetCategory;
use crate::storage_types::StorageBackend;

// Common constants
const PORT: u16 = 4000;
const MAX_CONNECTIONS: u32 = 20;
const CONNECTION_TIMEOUT_SECS: u64 = 30;
const MB: u64 = 1024 * 1024;

/// Base configuration shared by the API server and the CLI
#[derive(Clone, Debug)]
pub struct BaseConfig {
    pub server_port: u16,
    pub cors_origins: Vec<String>,
    pub db_max_connections: u32,
    pub db_timeout_seconds: u64,
    pub environment: String,
    pub log_format: String,
}

/// Size ceiling and extension allow-list of one upload category.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CategoryPolicy {
    pub max_size_bytes: u64,
    pub allowed_extensions: Vec<String>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CategoryLimits {
    pub image: CategoryPolicy,
    pub video: CategoryPolicy,
    pub audio: CategoryPolicy,
    pub document: CategoryPolicy,
    pub archive: CategoryPolicy,
}

impl CategoryLimits {
    pub fn get(&self, category: AssetCategory) -> &CategoryPolicy {
        match category {
            AssetCategory::Image => &self.image,
            AssetCategory::Video => &self.video,
            AssetCategory::Audio => &self.audio,
            AssetCategory::Document => &self.document,
            AssetCategory::Archive => &self.archive,
        }
    }

    pub fn get_mut(&mut self, category: AssetCategory) -> &mut CategoryPolicy {
        match category {
            AssetCategory::Image => &mut self.image,
            AssetCategory::Video => &mut self.video,
            AssetCategory::Audio => &mut self.audio,
            AssetCategory::Document => &mut self.document,
            AssetCategory::Archive => &mut self.archive,
        }
    }

    /// Largest ceiling across categories; bounds request bodies on the direct upload route.
    pub fn largest_max_size_bytes(&self) -> u64 {
        AssetCategory::ALL
            .into_iter()
            .map(|c| self.get(c).max_size_bytes)
            .max()
            .unwrap_or(0)
    }
}

impl Default for CategoryLimits {
    fn default() -> Self {
        fn policy(mb: u64, extensions: &str) -> CategoryPolicy {
            CategoryPolicy {
                max_size_bytes: mb * MB,
                allowed_extensions: split_list(extensions),
            }
        }
        Self {
            image: policy(10, "jpg,jpeg,png,webp,gif,heic,heif"),
            video: policy(100, "mp4,mov,avi,mkv,webm"),
            audio: policy(20, "mp3,wav,ogg,m4a,aac"),
            document: policy(10, "pdf,doc,docx,txt,rtf,odt"),
            archive: policy(50, "zip,tar,gz,rar,7z"),
        }
    }
}

/// A JSONB column of an external table that stores `AssetReference` values.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReferenceColumn {
    pub table: String,
    pub column: String,
    /// The column holds an array of references rather than a single one.
    pub is_array: bool,
}

impl FromStr for ReferenceColumn {
    type Err = anyhow::Error;

    /// Parses `table.column` or `table.column[]`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let (spec, is_array) = match s.strip_suffix("[]") {
            Some(rest) => (rest, true),
            None => (s, false),
        };
        let (table, column) = spec
            .split_once('.')
            .ok_or_else(|| anyhow::anyhow!("Reference column must be table.column: {}", s))?;
        if !is_identifier(table) || !is_identifier(column) {
            return Err(anyhow::anyhow!(
                "Reference column contains an invalid identifier: {}",
                s
            ));
        }
        Ok(ReferenceColumn {
            table: table.to_string(),
            column: column.to_string(),
            is_array,
        })
    }
}

fn is_identifier(s: &str) -> bool {
    static IDENT: OnceLock<Regex> = OnceLock::new();
    IDENT
        .get_or_init(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]{0,62}$").expect("static regex"))
        .is_match(s)
}

/// Garbage collector settings
#[derive(Clone, Debug)]
pub struct GcConfig {
    pub enabled: bool,
    pub interval_secs: u64,
    pub grace_period_secs: u64,
    pub batch_limit: usize,
}

impl Default for GcConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_secs: 3600,
            grace_period_secs: 48 * 3600,
            batch_limit: 500,
        }
    }
}

/// Asset upload service configuration
#[derive(Clone, Debug)]
pub struct AssetServiceConfig {
    pub base: BaseConfig,
    pub database_url: String,
    // Storage configuration
    pub storage_backend: StorageBackend,
    pub local_storage_path: String,
    pub public_base_url: String,
    pub cdn_base_url: Option<String>,
    pub s3_bucket: Option<String>,
    pub s3_region: Option<String>,
    pub s3_endpoint: Option<String>, // Custom endpoint for S3-compatible providers (MinIO, R2, Spaces, ...)
    pub s3_public_base_url: Option<String>,
    pub aws_region: Option<String>,
    // Upload protocol
    pub multipart_threshold_bytes: u64,
    pub multipart_part_size_bytes: u64,
    pub upload_url_expiry_secs: u64,
    pub thumbnail_max_size_bytes: u64,
    pub category_limits: CategoryLimits,
    // Cleanup
    pub gc: GcConfig,
    pub reference_columns: Vec<ReferenceColumn>,
}

/// Application configuration.
#[derive(Clone, Debug)]
pub struct Config(pub Box<AssetServiceConfig>);

impl Config {
    fn inner(&self) -> &AssetServiceConfig {
        &self.0
    }

    /// Check if the application is running in production mode
    pub fn is_production(&self) -> bool {
        is_production_env(&self.inner().base.environment)
    }

    pub fn from_env() -> Result<Self, anyhow::Error> {
        let config = AssetServiceConfig::from_env()?;
        Ok(Config(Box::new(config)))
    }

    pub fn validate(&self) -> Result<(), anyhow::Error> {
        self.inner().validate()
    }

    // Convenience getters for common fields
    pub fn server_port(&self) -> u16 {
        self.inner().base.server_port
    }

    pub fn cors_origins(&self) -> &[String] {
        &self.inner().base.cors_origins
    }

    pub fn environment(&self) -> &str {
        &self.inner().base.environment
    }

    pub fn log_format(&self) -> &str {
        &self.inner().base.log_format
    }

    pub fn db_max_connections(&self) -> u32 {
        self.inner().base.db_max_connections
    }

    pub fn db_timeout_seconds(&self) -> u64 {
        self.inner().base.db_timeout_seconds
    }

    pub fn database_url(&self) -> &str {
        &self.inner().database_url
    }

    pub fn storage_backend(&self) -> StorageBackend {
        self.inner().storage_backend
    }

    pub fn local_storage_path(&self) -> &str {
        &self.inner().local_storage_path
    }

    pub fn public_base_url(&self) -> &str {
        &self.inner().public_base_url
    }

    pub fn cdn_base_url(&self) -> Option<&str> {
        self.inner().cdn_base_url.as_deref()
    }

    pub fn s3_bucket(&self) -> Option<&str> {
        self.inner().s3_bucket.as_deref()
    }

    /// `S3_REGION`, falling back to `AWS_REGION`.
    pub fn s3_region(&self) -> Option<&str> {
        self.inner()
            .s3_region
            .as_deref()
            .or(self.inner().aws_region.as_deref())
    }

    pub fn s3_endpoint(&self) -> Option<&str> {
        self.inner().s3_endpoint.as_deref()
    }

    pub fn s3_public_base_url(&self) -> Option<&str> {
        self.inner().s3_public_base_url.as_deref()
    }

    pub fn multipart_threshold_bytes(&self) -> u64 {
        self.inner().multipart_threshold_bytes
    }

    pub fn multipart_part_size_bytes(&self) -> u64 {
        self.inner().multipart_part_size_bytes
    }

    pub fn upload_url_expiry(&self) -> Duration {
        Duration::from_secs(self.inner().upload_url_expiry_secs)
    }

    pub fn thumbnail_max_size_bytes(&self) -> u64 {
        self.inner().thumbnail_max_size_bytes
    }

    pub fn category_limits(&self) -> &CategoryLimits {
        &self.inner().category_limits
    }

    pub fn gc(&self) -> &GcConfig {
        &self.inner().gc
    }

    pub fn reference_columns(&self) -> &[ReferenceColumn] {
        &self.inner().reference_columns
    }
}

pub fn is_production_env(environment: &str) -> bool {
    let environment = environment.to_lowercase();
    environment == "production" || environment == "prod"
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|s| s.trim().to_lowercase())
        .filter(|s| !s.is_empty())
        .collect()
}

fn env_parse<T: FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.trim().parse::<T>().ok())
        .unwrap_or(default)
}

fn env_opt(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

impl AssetServiceConfig {
    pub fn from_env() -> Result<Self, anyhow::Error> {
        dotenvy::dotenv().ok();

        const MULTIPART_THRESHOLD_MB: u64 = 10;
        const MULTIPART_PART_SIZE_MB: u64 = 10;
        const UPLOAD_URL_EXPIRY_SECS: u64 = 24 * 3600;
        const THUMBNAIL_MAX_SIZE_MB: u64 = 2;
        const REFERENCE_COLUMNS: &str = "businesses.logo,products.photos[],variants.photos[]";

        let environment = env::var("ENVIRONMENT")
            .or_else(|_| env::var("APP_ENV"))
            .unwrap_or_else(|_| "development".to_string());

        let cors_origins_str = env::var("CORS_ORIGINS").unwrap_or_else(|_| "*".to_string());
        if is_production_env(&environment) && cors_origins_str.trim() == "*" {
            return Err(anyhow::anyhow!(
                "CORS_ORIGINS cannot be '*' in production. Please specify explicit origins."
            ));
        }
        let cors_origins: Vec<String> = cors_origins_str
            .split(',')
            .map(|s| s.trim().to_string())
            .collect();

        let base = BaseConfig {
            server_port: env_parse("PORT", PORT),
            cors_origins,
            db_max_connections: env_parse("DB_MAX_CONNECTIONS", MAX_CONNECTIONS),
            db_timeout_seconds: env_parse("DB_TIMEOUT_SECONDS", CONNECTION_TIMEOUT_SECS),
            environment,
            log_format: env::var("LOG_FORMAT").unwrap_or_else(|_| "pretty".to_string()),
        };

        let database_url = env::var("DATABASE_URL")
            .map_err(|_| anyhow::anyhow!("DATABASE_URL must be set"))?;

        let storage_backend = match env_opt("STORAGE_BACKEND") {
            Some(value) => value.parse::<StorageBackend>()?,
            None => StorageBackend::Local,
        };

        let public_base_url = env_opt("PUBLIC_BASE_URL")
            .unwrap_or_else(|| format!("http://localhost:{}", base.server_port))
            .trim_end_matches('/')
            .to_string();

        let mut category_limits = CategoryLimits::default();
        for category in AssetCategory::ALL {
            let upper = category.as_str().to_uppercase();
            let policy = category_limits.get_mut(category);
            let default_mb = policy.max_size_bytes / MB;
            policy.max_size_bytes = env_parse(&format!("MAX_{}_SIZE_MB", upper), default_mb) * MB;
            if let Some(list) = env_opt(&format!("{}_EXTENSIONS", upper)) {
                policy.allowed_extensions = split_list(&list);
            }
        }

        let gc_defaults = GcConfig::default();
        let gc = GcConfig {
            enabled: env_parse("ASSET_GC_ENABLED", gc_defaults.enabled),
            interval_secs: env_parse("ASSET_GC_INTERVAL_SECS", gc_defaults.interval_secs),
            grace_period_secs: env_parse(
                "ASSET_GC_GRACE_PERIOD_SECS",
                gc_defaults.grace_period_secs,
            ),
            batch_limit: env_parse("ASSET_GC_BATCH_LIMIT", gc_defaults.batch_limit),
        };

        let reference_columns = env::var("ASSET_REFERENCE_COLUMNS")
            .unwrap_or_else(|_| REFERENCE_COLUMNS.to_string())
            .split(',')
            .filter(|s| !s.trim().is_empty())
            .map(str::parse::<ReferenceColumn>)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(AssetServiceConfig {
            base,
            database_url,
            storage_backend,
            local_storage_path: env_opt("LOCAL_STORAGE_PATH")
                .unwrap_or_else(|| "./data/assets".to_string()),
            public_base_url,
            cdn_base_url: env_opt("CDN_BASE_URL").map(|u| u.trim_end_matches('/').to_string()),
            s3_bucket: env_opt("S3_BUCKET"),
            s3_region: env_opt("S3_REGION"),
            s3_endpoint: env_opt("S3_ENDPOINT"),
            s3_public_base_url: env_opt("S3_PUBLIC_BASE_URL")
                .map(|u| u.trim_end_matches('/').to_string()),
            aws_region: env_opt("AWS_REGION"),
            multipart_threshold_bytes: env_parse("MULTIPART_THRESHOLD_MB", MULTIPART_THRESHOLD_MB)
                * MB,
            multipart_part_size_bytes: env_parse("MULTIPART_PART_SIZE_MB", MULTIPART_PART_SIZE_MB)
                * MB,
            upload_url_expiry_secs: env_parse("UPLOAD_URL_EXPIRY_SECS", UPLOAD_URL_EXPIRY_SECS),
            thumbnail_max_size_bytes: env_parse("THUMBNAIL_MAX_SIZE_MB", THUMBNAIL_MAX_SIZE_MB)
                * MB,
            category_limits,
            gc,
            reference_columns,
        })
    }

    pub fn validate(&self) -> Result<(), anyhow::Error> {
        if !(self.database_url.starts_with("postgres://")
            || self.database_url.starts_with("postgresql://"))
        {
            return Err(anyhow::anyhow!(
                "DATABASE_URL must be a valid PostgreSQL connection string"
            ));
        }

        match self.storage_backend {
            StorageBackend::S3 => {
                if self.s3_bucket.is_none() {
                    return Err(anyhow::anyhow!(
                        "S3_BUCKET must be set when using S3 storage backend"
                    ));
                }
                if self.s3_region.is_none() && self.aws_region.is_none() {
                    return Err(anyhow::anyhow!(
                        "S3_REGION or AWS_REGION must be set when using S3 storage backend"
                    ));
                }
            }
            StorageBackend::Local => {
                if self.local_storage_path.trim().is_empty() {
                    return Err(anyhow::anyhow!(
                        "LOCAL_STORAGE_PATH must be set when using local storage backend"
                    ));
                }
            }
        }

        if self.multipart_threshold_bytes == 0 || self.multipart_part_size_bytes == 0 {
            return Err(anyhow::anyhow!(
                "MULTIPART_THRESHOLD_MB and MULTIPART_PART_SIZE_MB must be greater than zero"
            ));
        }

        // Presigned SigV4 URLs are capped at seven days.
        if self.upload_url_expiry_secs == 0 || self.upload_url_expiry_secs > 7 * 24 * 3600 {
            return Err(anyhow::anyhow!(
                "UPLOAD_URL_EXPIRY_SECS must be between 1 and 604800"
            ));
        }

        if self.gc.grace_period_secs <= self.upload_url_expiry_secs {
            return Err(anyhow::anyhow!(
                "ASSET_GC_GRACE_PERIOD_SECS ({}) must be greater than UPLOAD_URL_EXPIRY_SECS ({})",
                self.gc.grace_period_secs,
                self.upload_url_expiry_secs
            ));
        }

        if self.gc.interval_secs == 0 || self.gc.batch_limit == 0 {
            return Err(anyhow::anyhow!(
                "ASSET_GC_INTERVAL_SECS and ASSET_GC_BATCH_LIMIT must be greater than zero"
            ));
        }

        for category in AssetCategory::ALL {
            if self.category_limits.get(category).allowed_extensions.is_empty() {
                return Err(anyhow::anyhow!(
                    "{}_EXTENSIONS must list at least one extension",
                    category.as_str().to_uppercase()
                ));
            }
        }

        Ok(())
    }
}
