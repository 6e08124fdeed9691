//! Application state shared by every handler.

use std::sync::Arc;

use stowage_core::Config;
use stowage_db::AssetStore;
use stowage_services::{
    AssetUrls, CategoryClassifier, CompletionCoordinator, DirectUploadService,
    PublicAssetService, UploadDescriptorService,
};
use stowage_storage::Storage;

pub struct AppState {
    pub config: Config,
    pub store: Arc<dyn AssetStore>,
    pub storage: Arc<dyn Storage>,
    pub uploads: UploadDescriptorService,
    pub completion: CompletionCoordinator,
    pub public_assets: PublicAssetService,
    pub direct_uploads: DirectUploadService,
}

impl AppState {
    /// Wire the upload services over one record store and one storage backend.
    pub fn new(config: Config, store: Arc<dyn AssetStore>, storage: Arc<dyn Storage>) -> Self {
        let urls = AssetUrls::new(config.public_base_url(), config.cdn_base_url());
        let uploads = UploadDescriptorService::new(
            store.clone(),
            storage.clone(),
            CategoryClassifier::new(config.category_limits().clone()),
            urls.clone(),
            config.thumbnail_max_size_bytes(),
        );
        let completion = CompletionCoordinator::new(store.clone(), storage.clone(), urls);
        let public_assets = PublicAssetService::new(store.clone(), storage.clone());
        let direct_uploads = DirectUploadService::new(store.clone(), storage.clone());

        Self {
            config,
            store,
            storage,
            uploads,
            completion,
            public_assets,
            direct_uploads,
        }
    }
}
