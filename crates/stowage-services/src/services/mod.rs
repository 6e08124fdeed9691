pub mod classifier;
pub mod completion;
pub mod ingest;
pub mod retrieval;
pub mod uploads;
pub mod urls;

#[cfg(test)]
pub(crate) mod test_support;

pub use classifier::{CategoryClassifier, Classification};
pub use completion::CompletionCoordinator;
pub use ingest::DirectUploadService;
pub use retrieval::{PublicAsset, PublicAssetService};
pub use uploads::{validate_owner_scope, UploadDescriptorService};
pub use urls::AssetUrls;
