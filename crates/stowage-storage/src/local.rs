use crate::traits::{
    BlobStore, ByteStream, CompletedPart, PublicLocation, SingleShotPlan, StorageError,
    StorageProvider, StorageResult, UploadPlan, UploadTarget,
};
use crate::StorageBackend;
use async_trait::async_trait;
use futures::StreamExt;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use stowage_core::constants::LOCAL_UPLOAD_PATH;
use stowage_core::models::{MultipartUpload, UploadMethod};
use tokio::fs;
use tokio::io::AsyncWriteExt;

/// Local filesystem storage implementation
///
/// Clients cannot write to the disk directly, so every upload is planned as a
/// single POST to the API's internal upload route, which streams the body into
/// [`BlobStore::write_object`].
#[derive(Clone)]
pub struct LocalStorage {
    base_path: PathBuf,
    public_base_url: String,
}

impl LocalStorage {
    /// Create a new LocalStorage instance
    ///
    /// # Arguments
    /// * `base_path` - Root directory for asset bytes (e.g., "/var/lib/stowage/assets")
    /// * `public_base_url` - Externally reachable base URL of the API (e.g., "http://localhost:3000")
    pub async fn new(base_path: impl Into<PathBuf>, public_base_url: String) -> StorageResult<Self> {
        let base_path = base_path.into();

        fs::create_dir_all(&base_path).await.map_err(|e| {
            StorageError::ConfigError(format!(
                "Failed to create storage directory {}: {}",
                base_path.display(),
                e
            ))
        })?;

        Ok(LocalStorage {
            base_path,
            public_base_url: public_base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Convert storage key to filesystem path with security validation
    ///
    /// Rejects keys that could escape the base storage directory.
    fn key_to_path(&self, storage_key: &str) -> StorageResult<PathBuf> {
        if storage_key.is_empty() || storage_key.contains("..") || storage_key.starts_with('/') {
            return Err(StorageError::InvalidKey(
                "Storage key contains invalid characters".to_string(),
            ));
        }

        let path = self.base_path.join(storage_key);

        let base_canonical = self.base_path.canonicalize().map_err(|e| {
            StorageError::ConfigError(format!("Failed to canonicalize base path: {}", e))
        })?;

        if let Ok(canonical) = path.canonicalize() {
            if canonical.strip_prefix(&base_canonical).is_err() {
                return Err(StorageError::InvalidKey(
                    "Storage key resolves outside storage directory".to_string(),
                ));
            }
        } else if path.strip_prefix(&self.base_path).is_err() {
            return Err(StorageError::InvalidKey(
                "Storage key resolves outside storage directory".to_string(),
            ));
        }

        Ok(path)
    }

    /// Where clients POST the bytes of `asset_id`.
    pub fn upload_url(&self, asset_id: &str) -> String {
        format!("{}{}/{}", self.public_base_url, LOCAL_UPLOAD_PATH, asset_id)
    }

    /// Ensure parent directory exists
    async fn ensure_parent_dir(&self, path: &Path) -> StorageResult<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }
        Ok(())
    }
}

#[async_trait]
impl StorageProvider for LocalStorage {
    async fn plan_upload(&self, target: &UploadTarget) -> StorageResult<UploadPlan> {
        self.key_to_path(&target.object_key)?;

        let mut headers = BTreeMap::new();
        headers.insert("Content-Type".to_string(), target.content_type.clone());

        Ok(UploadPlan::SingleShot(SingleShotPlan {
            method: UploadMethod::Post,
            url: self.upload_url(&target.asset_id),
            headers,
            expires_at: None,
        }))
    }

    async fn assemble(
        &self,
        object_key: &str,
        upload: &MultipartUpload,
        _parts: &[CompletedPart],
    ) -> StorageResult<()> {
        // Local plans are never multipart.
        Err(StorageError::Unsupported(format!(
            "local storage has no multipart session {} for {}",
            upload.upload_session_id, object_key
        )))
    }

    async fn resolve_public_location(&self, object_key: &str) -> StorageResult<PublicLocation> {
        let path = self.key_to_path(object_key)?;

        let file = match fs::File::open(&path).await {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(StorageError::NotFound(object_key.to_string()));
            }
            Err(e) => {
                return Err(StorageError::DownloadFailed(format!(
                    "Failed to open file {}: {}",
                    path.display(),
                    e
                )));
            }
        };

        let content_length = file.metadata().await.ok().map(|m| m.len());

        let key = object_key.to_string();
        let stream = tokio_util::io::ReaderStream::new(file).map(move |result| {
            result.map_err(|e| {
                tracing::error!(key = %key, error = %e, "Local storage stream read error");
                StorageError::DownloadFailed(format!("Failed to read chunk: {}", e))
            })
        });

        Ok(PublicLocation::Stream {
            body: Box::pin(stream),
            content_length,
        })
    }
}

#[async_trait]
impl BlobStore for LocalStorage {
    fn backend_type(&self) -> StorageBackend {
        StorageBackend::Local
    }

    async fn exists(&self, storage_key: &str) -> StorageResult<bool> {
        let path = self.key_to_path(storage_key)?;
        Ok(fs::try_exists(&path).await.unwrap_or(false))
    }

    async fn delete(&self, storage_key: &str) -> StorageResult<()> {
        let path = self.key_to_path(storage_key)?;
        let start = std::time::Instant::now();

        match fs::remove_file(&path).await {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
            Err(e) => {
                return Err(StorageError::DeleteFailed(format!(
                    "Failed to delete file {}: {}",
                    path.display(),
                    e
                )));
            }
        }

        tracing::info!(
            path = %path.display(),
            key = %storage_key,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Local storage delete successful"
        );

        Ok(())
    }

    async fn write_object(
        &self,
        storage_key: &str,
        mut body: ByteStream,
        max_bytes: u64,
    ) -> StorageResult<u64> {
        let path = self.key_to_path(storage_key)?;
        let start = std::time::Instant::now();

        self.ensure_parent_dir(&path).await?;
        let parent = path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| self.base_path.clone());

        // Each writer gets its own temp file next to the target; it is removed on drop.
        let temp = tokio::task::spawn_blocking(move || tempfile::NamedTempFile::new_in(parent))
            .await
            .map_err(|e| StorageError::UploadFailed(format!("Temp file task failed: {}", e)))?
            .map_err(|e| StorageError::UploadFailed(format!("Failed to create temp file: {}", e)))?;
        let (std_file, temp_path) = temp.into_parts();
        let mut file = fs::File::from_std(std_file);

        let mut written: u64 = 0;
        while let Some(chunk) = body.next().await {
            let chunk = chunk?;
            written += chunk.len() as u64;
            if written > max_bytes {
                return Err(StorageError::TooLarge(format!(
                    "body exceeds the declared size of {} bytes",
                    max_bytes
                )));
            }
            file.write_all(&chunk).await.map_err(|e| {
                StorageError::UploadFailed(format!(
                    "Failed to write file {}: {}",
                    temp_path.display(),
                    e
                ))
            })?;
        }
        file.sync_all().await.map_err(|e| {
            StorageError::UploadFailed(format!(
                "Failed to sync file {}: {}",
                temp_path.display(),
                e
            ))
        })?;
        drop(file);

        let target = path.clone();
        tokio::task::spawn_blocking(move || temp_path.persist_noclobber(&target))
            .await
            .map_err(|e| StorageError::UploadFailed(format!("Persist task failed: {}", e)))?
            .map_err(|e| {
                if e.error.kind() == std::io::ErrorKind::AlreadyExists {
                    StorageError::AlreadyExists(storage_key.to_string())
                } else {
                    StorageError::UploadFailed(format!(
                        "Failed to move upload into {}: {}",
                        path.display(),
                        e.error
                    ))
                }
            })?;

        tracing::info!(
            path = %path.display(),
            key = %storage_key,
            size_bytes = written,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Local storage stream upload successful"
        );

        Ok(written)
    }
}

#[cfg(all(test, feature = "storage-local"))]
mod tests {
    use super::*;
    use bytes::Bytes;
    use stowage_core::models::AssetCategory;
    use tempfile::tempdir;

    use crate::traits::PlanMode;

    async fn storage(dir: &Path) -> LocalStorage {
        LocalStorage::new(dir, "http://localhost:3000/".to_string())
            .await
            .unwrap()
    }

    fn body(chunks: &[&'static [u8]]) -> ByteStream {
        let items: Vec<StorageResult<Bytes>> =
            chunks.iter().map(|c| Ok(Bytes::from_static(c))).collect();
        Box::pin(futures::stream::iter(items))
    }

    async fn read_all(location: PublicLocation) -> Vec<u8> {
        match location {
            PublicLocation::Stream { mut body, .. } => {
                let mut out = Vec::new();
                while let Some(chunk) = body.next().await {
                    out.extend_from_slice(&chunk.unwrap());
                }
                out
            }
            PublicLocation::Redirect(url) => panic!("unexpected redirect to {}", url),
        }
    }

    #[tokio::test]
    async fn test_plan_is_single_post_to_internal_route() {
        let dir = tempdir().unwrap();
        let storage = storage(dir.path()).await;

        let plan = storage
            .plan_upload(&UploadTarget {
                asset_id: "ast_1".to_string(),
                object_key: "business/b/assets/ast_1/big.mp4".to_string(),
                content_type: "video/mp4".to_string(),
                category: AssetCategory::Video,
                size_bytes: 500 * 1024 * 1024,
                mode: PlanMode::Auto,
            })
            .await
            .unwrap();

        match plan {
            UploadPlan::SingleShot(plan) => {
                assert_eq!(plan.method, UploadMethod::Post);
                assert_eq!(
                    plan.url,
                    "http://localhost:3000/api/v0/assets/internal/upload/ast_1"
                );
                assert_eq!(plan.headers.get("Content-Type").unwrap(), "video/mp4");
                assert!(plan.expires_at.is_none());
            }
            UploadPlan::Multipart(_) => panic!("local storage never plans multipart"),
        }
    }

    #[tokio::test]
    async fn test_write_then_resolve_streams_bytes() {
        let dir = tempdir().unwrap();
        let storage = storage(dir.path()).await;
        let key = "business/b/assets/ast_1/a.txt";

        let written = storage
            .write_object(key, body(&[b"hello ", b"world"]), 11)
            .await
            .unwrap();
        assert_eq!(written, 11);
        assert!(storage.exists(key).await.unwrap());

        let location = storage.resolve_public_location(key).await.unwrap();
        if let PublicLocation::Stream { content_length, .. } = &location {
            assert_eq!(*content_length, Some(11));
        }
        assert_eq!(read_all(location).await, b"hello world");
    }

    #[tokio::test]
    async fn test_write_rejects_body_over_limit() {
        let dir = tempdir().unwrap();
        let storage = storage(dir.path()).await;
        let key = "business/b/assets/ast_1/a.txt";

        let result = storage.write_object(key, body(&[b"0123456789"]), 4).await;
        assert!(matches!(result, Err(StorageError::TooLarge(_))));
        assert!(!storage.exists(key).await.unwrap());
        let leftovers = std::fs::read_dir(dir.path().join("business/b/assets/ast_1"))
            .unwrap()
            .count();
        assert_eq!(leftovers, 0);
    }

    #[tokio::test]
    async fn test_existing_object_is_never_replaced() {
        let dir = tempdir().unwrap();
        let storage = storage(dir.path()).await;
        let key = "business/b/assets/ast_1/notes.txt";

        storage.write_object(key, body(&[b"AAAAAAAA"]), 8).await.unwrap();
        let second = storage.write_object(key, body(&[b"BBBBBBBB"]), 8).await;
        assert!(matches!(second, Err(StorageError::AlreadyExists(_))));

        let location = storage.resolve_public_location(key).await.unwrap();
        assert_eq!(read_all(location).await, b"AAAAAAAA");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_concurrent_writes_keep_the_successful_body() {
        let dir = tempdir().unwrap();
        let storage = storage(dir.path()).await;
        let key = "business/b/assets/ast_1/notes.txt";

        let (a, b) = tokio::join!(
            storage.write_object(key, body(&[b"AAAA", b"AAAA"]), 8),
            storage.write_object(key, body(&[b"BBBB", b"BBBB"]), 8),
        );

        let expected: &[u8] = match (&a, &b) {
            (Ok(8), Err(StorageError::AlreadyExists(_))) => b"AAAAAAAA",
            (Err(StorageError::AlreadyExists(_)), Ok(8)) => b"BBBBBBBB",
            other => panic!("exactly one write must win: {:?}", other),
        };
        let location = storage.resolve_public_location(key).await.unwrap();
        assert_eq!(read_all(location).await, expected);
        assert_eq!(
            std::fs::read_dir(dir.path().join("business/b/assets/ast_1"))
                .unwrap()
                .count(),
            1
        );
    }

    #[tokio::test]
    async fn test_resolve_missing_object_is_not_found() {
        let dir = tempdir().unwrap();
        let storage = storage(dir.path()).await;

        let result = storage.resolve_public_location("business/b/assets/x/y").await;
        assert!(matches!(result, Err(StorageError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_path_traversal_rejected() {
        let dir = tempdir().unwrap();
        let storage = storage(dir.path()).await;

        let result = storage.resolve_public_location("../../../etc/passwd").await;
        assert!(matches!(result, Err(StorageError::InvalidKey(_))));

        let result = storage.delete("../etc/passwd").await;
        assert!(matches!(result, Err(StorageError::InvalidKey(_))));

        let result = storage.exists("/etc/passwd").await;
        assert!(matches!(result, Err(StorageError::InvalidKey(_))));
    }

    #[tokio::test]
    async fn test_delete_is_idempotent() {
        let dir = tempdir().unwrap();
        let storage = storage(dir.path()).await;
        let key = "business/b/assets/ast_1/a.txt";

        storage.write_object(key, body(&[b"x"]), 1).await.unwrap();
        storage.delete(key).await.unwrap();
        assert!(!storage.exists(key).await.unwrap());
        assert!(storage.delete(key).await.is_ok());
    }
}
