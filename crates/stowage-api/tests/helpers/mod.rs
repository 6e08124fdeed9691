//! Test helpers: build AppState and router for integration tests.
//!
//! The router runs against the in-memory record store and a local storage
//! backend rooted in a temp directory, so no database or network is needed.

use std::sync::Arc;

use axum_test::TestServer;
use stowage_api::setup::routes;
use stowage_api::state::AppState;
use stowage_core::{
    AssetServiceConfig, BaseConfig, CategoryLimits, Config, GcConfig, StorageBackend,
};
use stowage_db::InMemoryAssetRepository;
use stowage_storage::{LocalStorage, Storage};
use tempfile::TempDir;

pub const PUBLIC_BASE_URL: &str = "http://localhost:4000";
const MB: u64 = 1024 * 1024;

/// Test application: server plus the pieces tests poke at directly.
pub struct TestApp {
    pub server: TestServer,
    pub store: Arc<InMemoryAssetRepository>,
    pub storage: Arc<dyn Storage>,
    pub _temp_dir: TempDir,
}

impl TestApp {
    pub fn client(&self) -> &TestServer {
        &self.server
    }
}

pub fn create_test_config(storage_path: &str) -> Config {
    Config(Box::new(AssetServiceConfig {
        base: BaseConfig {
            server_port: 4000,
            cors_origins: vec!["*".to_string()],
            db_max_connections: 5,
            db_timeout_seconds: 5,
            environment: "test".to_string(),
            log_format: "pretty".to_string(),
        },
        database_url: "postgresql://localhost/stowage_test".to_string(),
        storage_backend: StorageBackend::Local,
        local_storage_path: storage_path.to_string(),
        public_base_url: PUBLIC_BASE_URL.to_string(),
        cdn_base_url: None,
        s3_bucket: None,
        s3_region: None,
        s3_endpoint: None,
        s3_public_base_url: None,
        aws_region: None,
        multipart_threshold_bytes: 10 * MB,
        multipart_part_size_bytes: 10 * MB,
        upload_url_expiry_secs: 86400,
        thumbnail_max_size_bytes: 2 * MB,
        category_limits: CategoryLimits::default(),
        gc: GcConfig::default(),
        reference_columns: vec![],
    }))
}

/// Setup test app with an in-memory store and local storage.
pub async fn setup_test_app() -> TestApp {
    let temp_dir = tempfile::tempdir().expect("Failed to create temp directory");
    let storage_path = temp_dir.path().to_string_lossy().to_string();

    let storage: Arc<dyn Storage> = Arc::new(
        LocalStorage::new(temp_dir.path(), PUBLIC_BASE_URL.to_string())
            .await
            .expect("Failed to create local storage"),
    );
    let store = Arc::new(InMemoryAssetRepository::new());

    let config = create_test_config(&storage_path);
    let state = Arc::new(AppState::new(config.clone(), store.clone(), storage.clone()));
    let router = routes::setup_routes(&config, state).expect("Failed to build routes");
    let server = TestServer::new(router).expect("Failed to start test server");

    TestApp {
        server,
        store,
        storage,
        _temp_dir: temp_dir,
    }
}

/// Path part of a URL issued by the server.
pub fn local_path(url: &str) -> String {
    url.strip_prefix(PUBLIC_BASE_URL)
        .unwrap_or(url)
        .to_string()
}
