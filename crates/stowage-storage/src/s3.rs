use crate::keys::encode_key_path;
use crate::multipart::{part_layout, validate_parts};
use crate::traits::{
    BlobStore, CompletedPart, PlanMode, PublicLocation, SingleShotPlan, StorageError,
    StorageProvider, StorageResult, UploadPlan, UploadTarget,
};
use crate::StorageBackend;
use async_trait::async_trait;
use aws_config::meta::region::RegionProviderChain;
use aws_config::retry::{RetryConfig, RetryMode};
use aws_config::BehaviorVersion;
use aws_sdk_s3::error::{ProvideErrorMetadata, SdkError};
use aws_sdk_s3::operation::head_object::HeadObjectError;
use aws_sdk_s3::presigning::{PresignedRequest, PresigningConfig};
use aws_sdk_s3::types::{CompletedMultipartUpload, CompletedPart as S3CompletedPart};
use aws_sdk_s3::Client;
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::time::Duration;
use stowage_core::models::{MultipartUpload, PartUrl, UploadMethod};

/// Settings for [`S3Storage`], usually taken from [`stowage_core::Config`].
#[derive(Debug, Clone)]
pub struct S3Options {
    pub bucket: String,
    pub region: String,
    /// Custom endpoint for S3-compatible providers (MinIO, DigitalOcean Spaces, ...)
    pub endpoint_url: Option<String>,
    /// Base for public object URLs; derived from the endpoint or region when unset.
    pub public_base_url: Option<String>,
    pub multipart_threshold_bytes: u64,
    pub part_size_bytes: u64,
    pub url_expiry: Duration,
}

/// S3 storage implementation
///
/// Clients upload straight to the bucket through presigned URLs. Declared sizes
/// above the multipart threshold get one presigned `UploadPart` URL per part.
#[derive(Clone)]
pub struct S3Storage {
    client: Client,
    bucket: String,
    public_base_url: String,
    multipart_threshold_bytes: u64,
    part_size_bytes: u64,
    url_expiry: Duration,
}

impl S3Storage {
    /// Create a new S3Storage instance, loading credentials from the default AWS chain.
    pub async fn new(options: S3Options) -> StorageResult<Self> {
        let region_provider =
            RegionProviderChain::first_try(aws_config::Region::new(options.region.clone()));

        let retry_config = RetryConfig::standard()
            .with_max_attempts(5)
            .with_retry_mode(RetryMode::Adaptive);

        let config = aws_config::defaults(BehaviorVersion::latest())
            .region(region_provider)
            .retry_config(retry_config.clone())
            .load()
            .await;

        let client = if let Some(ref endpoint) = options.endpoint_url {
            // S3-compatible providers need path-style addressing
            let mut s3_config_builder = aws_sdk_s3::Config::builder()
                .behavior_version(BehaviorVersion::latest())
                .endpoint_url(endpoint)
                .region(config.region().cloned())
                .retry_config(retry_config)
                .force_path_style(true);
            if let Some(provider) = config.credentials_provider() {
                s3_config_builder = s3_config_builder.credentials_provider(provider);
            }
            Client::from_conf(s3_config_builder.build())
        } else {
            Client::new(&config)
        };

        Self::from_client(client, options)
    }

    /// Wrap an already configured client.
    pub fn from_client(client: Client, options: S3Options) -> StorageResult<Self> {
        if options.bucket.is_empty() {
            return Err(StorageError::ConfigError("S3 bucket is empty".to_string()));
        }
        let public_base_url = Self::public_base(&options);

        Ok(S3Storage {
            client,
            bucket: options.bucket,
            public_base_url,
            multipart_threshold_bytes: options.multipart_threshold_bytes,
            part_size_bytes: options.part_size_bytes,
            url_expiry: options.url_expiry,
        })
    }

    /// Public object URL base
    ///
    /// For AWS S3: https://{bucket}.s3.{region}.amazonaws.com
    /// For S3-compatible providers: {endpoint}/{bucket} (path-style)
    fn public_base(options: &S3Options) -> String {
        if let Some(ref base) = options.public_base_url {
            return base.trim_end_matches('/').to_string();
        }
        match options.endpoint_url {
            Some(ref endpoint) => format!("{}/{}", endpoint.trim_end_matches('/'), options.bucket),
            None => format!(
                "https://{}.s3.{}.amazonaws.com",
                options.bucket, options.region
            ),
        }
    }

    pub fn public_url(&self, key: &str) -> String {
        format!("{}/{}", self.public_base_url, encode_key_path(key))
    }

    fn presigning_config(&self) -> StorageResult<PresigningConfig> {
        PresigningConfig::builder()
            .expires_in(self.url_expiry)
            .build()
            .map_err(|e| StorageError::ConfigError(e.to_string()))
    }

    fn expires_at(&self) -> StorageResult<DateTime<Utc>> {
        let expiry = chrono::Duration::from_std(self.url_expiry)
            .map_err(|e| StorageError::ConfigError(e.to_string()))?;
        Ok(Utc::now() + expiry)
    }

    fn signed_headers(presigned: &PresignedRequest, content_type: &str) -> BTreeMap<String, String> {
        let mut headers: BTreeMap<String, String> = presigned
            .headers()
            .map(|(name, value)| {
                let name = if name.eq_ignore_ascii_case("content-type") {
                    "Content-Type".to_string()
                } else {
                    name.to_string()
                };
                (name, value.to_string())
            })
            .collect();
        headers
            .entry("Content-Type".to_string())
            .or_insert_with(|| content_type.to_string());
        headers
    }

    async fn plan_single_shot(&self, target: &UploadTarget) -> StorageResult<UploadPlan> {
        let presigned = self
            .client
            .put_object()
            .bucket(&self.bucket)
            .key(&target.object_key)
            .content_type(&target.content_type)
            .presigned(self.presigning_config()?)
            .await
            .map_err(|e| {
                tracing::error!(
                    error = %e,
                    bucket = %self.bucket,
                    key = %target.object_key,
                    "Failed to presign S3 put"
                );
                StorageError::BackendError(e.to_string())
            })?;

        Ok(UploadPlan::SingleShot(SingleShotPlan {
            method: UploadMethod::Put,
            url: presigned.uri().to_string(),
            headers: Self::signed_headers(&presigned, &target.content_type),
            expires_at: Some(self.expires_at()?),
        }))
    }

    async fn plan_multipart(&self, target: &UploadTarget) -> StorageResult<UploadPlan> {
        let start = std::time::Instant::now();
        let (part_size, total_parts) = part_layout(target.size_bytes, self.part_size_bytes);

        let created = self
            .client
            .create_multipart_upload()
            .bucket(&self.bucket)
            .key(&target.object_key)
            .content_type(&target.content_type)
            .send()
            .await
            .map_err(|e| {
                tracing::error!(
                    error = %e,
                    bucket = %self.bucket,
                    key = %target.object_key,
                    "Failed to create multipart upload"
                );
                StorageError::BackendError(e.to_string())
            })?;

        let upload_id = created
            .upload_id()
            .ok_or_else(|| StorageError::BackendError("No upload ID returned from S3".to_string()))?
            .to_string();

        let mut part_urls = Vec::with_capacity(total_parts as usize);
        for part_number in 1..=total_parts {
            let presigned = self
                .client
                .upload_part()
                .bucket(&self.bucket)
                .key(&target.object_key)
                .upload_id(&upload_id)
                .part_number(part_number as i32)
                .presigned(self.presigning_config()?)
                .await;
            match presigned {
                Ok(presigned) => part_urls.push(PartUrl {
                    part_number,
                    url: presigned.uri().to_string(),
                }),
                Err(e) => {
                    if let Err(abort_err) = self.abort_upload(&target.object_key, &upload_id).await {
                        tracing::warn!(
                            error = %abort_err,
                            upload_id = %upload_id,
                            "Failed to abort multipart upload after presign failure"
                        );
                    }
                    return Err(StorageError::BackendError(e.to_string()));
                }
            }
        }

        tracing::info!(
            bucket = %self.bucket,
            key = %target.object_key,
            size_bytes = target.size_bytes,
            part_size = part_size,
            total_parts = total_parts,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "S3 multipart upload planned"
        );

        Ok(UploadPlan::Multipart(MultipartUpload {
            upload_session_id: upload_id,
            part_size,
            total_parts,
            part_urls,
            expires_at: self.expires_at()?,
        }))
    }
}

#[async_trait]
impl StorageProvider for S3Storage {
    async fn plan_upload(&self, target: &UploadTarget) -> StorageResult<UploadPlan> {
        if target.mode == PlanMode::SingleShot
            || target.size_bytes <= self.multipart_threshold_bytes
        {
            self.plan_single_shot(target).await
        } else {
            self.plan_multipart(target).await
        }
    }

    async fn assemble(
        &self,
        object_key: &str,
        upload: &MultipartUpload,
        parts: &[CompletedPart],
    ) -> StorageResult<()> {
        let parts = validate_parts(upload.total_parts, parts)?;
        let start = std::time::Instant::now();

        let completed = CompletedMultipartUpload::builder()
            .set_parts(Some(
                parts
                    .iter()
                    .map(|p| {
                        S3CompletedPart::builder()
                            .part_number(p.part_number as i32)
                            .e_tag(format!("\"{}\"", p.etag))
                            .build()
                    })
                    .collect(),
            ))
            .build();

        self.client
            .complete_multipart_upload()
            .bucket(&self.bucket)
            .key(object_key)
            .upload_id(&upload.upload_session_id)
            .multipart_upload(completed)
            .send()
            .await
            .map_err(|e| {
                let mapped = match e.code() {
                    Some("NoSuchUpload") => StorageError::Expired(format!(
                        "multipart session {} no longer exists",
                        upload.upload_session_id
                    )),
                    Some("InvalidPart") | Some("InvalidPartOrder") | Some("EntityTooSmall") => {
                        StorageError::IncompleteParts(
                            e.message().unwrap_or("part checksums rejected").to_string(),
                        )
                    }
                    _ => StorageError::BackendError(e.to_string()),
                };
                tracing::error!(
                    error = %e,
                    bucket = %self.bucket,
                    key = %object_key,
                    "Failed to complete multipart upload"
                );
                mapped
            })?;

        tracing::info!(
            bucket = %self.bucket,
            key = %object_key,
            parts = upload.total_parts,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "S3 multipart upload completed"
        );

        Ok(())
    }

    async fn resolve_public_location(&self, object_key: &str) -> StorageResult<PublicLocation> {
        if !self.exists(object_key).await? {
            return Err(StorageError::NotFound(object_key.to_string()));
        }
        Ok(PublicLocation::Redirect(self.public_url(object_key)))
    }
}

#[async_trait]
impl BlobStore for S3Storage {
    fn backend_type(&self) -> StorageBackend {
        StorageBackend::S3
    }

    async fn exists(&self, storage_key: &str) -> StorageResult<bool> {
        match self
            .client
            .head_object()
            .bucket(&self.bucket)
            .key(storage_key)
            .send()
            .await
        {
            Ok(_) => Ok(true),
            Err(e) => match &e {
                SdkError::ServiceError(service_err) => match service_err.err() {
                    HeadObjectError::NotFound(_) => Ok(false),
                    _ => Err(StorageError::BackendError(e.to_string())),
                },
                _ => Err(StorageError::BackendError(e.to_string())),
            },
        }
    }

    async fn delete(&self, storage_key: &str) -> StorageResult<()> {
        let start = std::time::Instant::now();

        // DeleteObject succeeds for missing keys.
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(storage_key)
            .send()
            .await
            .map_err(|e| {
                tracing::error!(
                    error = %e,
                    bucket = %self.bucket,
                    key = %storage_key,
                    duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                    "S3 delete failed"
                );
                StorageError::DeleteFailed(e.to_string())
            })?;

        tracing::info!(
            bucket = %self.bucket,
            key = %storage_key,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "S3 delete successful"
        );

        Ok(())
    }

    async fn abort_upload(&self, storage_key: &str, upload_session_id: &str) -> StorageResult<()> {
        match self
            .client
            .abort_multipart_upload()
            .bucket(&self.bucket)
            .key(storage_key)
            .upload_id(upload_session_id)
            .send()
            .await
        {
            Ok(_) => {
                tracing::info!(
                    bucket = %self.bucket,
                    key = %storage_key,
                    upload_id = %upload_session_id,
                    "S3 multipart upload aborted"
                );
                Ok(())
            }
            Err(e) if e.code() == Some("NoSuchUpload") => Ok(()),
            Err(e) => Err(StorageError::BackendError(e.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aws_sdk_s3::config::{Credentials, Region};
    use stowage_core::models::AssetCategory;

    fn offline_client() -> Client {
        let config = aws_sdk_s3::Config::builder()
            .behavior_version(BehaviorVersion::latest())
            .region(Region::new("eu-west-1"))
            .credentials_provider(Credentials::new("AKIDTEST", "secret", None, None, "test"))
            .build();
        Client::from_conf(config)
    }

    fn options() -> S3Options {
        S3Options {
            bucket: "assets".to_string(),
            region: "eu-west-1".to_string(),
            endpoint_url: None,
            public_base_url: None,
            multipart_threshold_bytes: 10 * 1024 * 1024,
            part_size_bytes: 10 * 1024 * 1024,
            url_expiry: Duration::from_secs(86_400),
        }
    }

    #[test]
    fn test_public_url_defaults_to_virtual_host() {
        let storage = S3Storage::from_client(offline_client(), options()).unwrap();
        assert_eq!(
            storage.public_url("business/b/assets/ast_1/my file.png"),
            "https://assets.s3.eu-west-1.amazonaws.com/business/b/assets/ast_1/my%20file.png"
        );
    }

    #[test]
    fn test_public_url_uses_endpoint_path_style() {
        let mut opts = options();
        opts.endpoint_url = Some("http://localhost:9000/".to_string());
        let storage = S3Storage::from_client(offline_client(), opts).unwrap();
        assert_eq!(
            storage.public_url("business/b/assets/ast_1/a.png"),
            "http://localhost:9000/assets/business/b/assets/ast_1/a.png"
        );

        let mut opts = options();
        opts.public_base_url = Some("https://cdn.example.com/".to_string());
        let storage = S3Storage::from_client(offline_client(), opts).unwrap();
        assert_eq!(
            storage.public_url("k/a.png"),
            "https://cdn.example.com/k/a.png"
        );
    }

    #[tokio::test]
    async fn test_small_file_gets_presigned_put() {
        let storage = S3Storage::from_client(offline_client(), options()).unwrap();

        let plan = storage
            .plan_upload(&UploadTarget {
                asset_id: "ast_1".to_string(),
                object_key: "business/b/assets/ast_1/photo.jpg".to_string(),
                content_type: "image/jpeg".to_string(),
                category: AssetCategory::Image,
                size_bytes: 2 * 1024 * 1024,
                mode: PlanMode::Auto,
            })
            .await
            .unwrap();

        let UploadPlan::SingleShot(plan) = plan else {
            panic!("expected a single-shot plan");
        };
        assert_eq!(plan.method, UploadMethod::Put);
        assert!(plan.url.contains("photo.jpg"));
        assert!(plan.url.contains("X-Amz-Signature"));
        assert_eq!(plan.headers.get("Content-Type").unwrap(), "image/jpeg");
        assert!(plan.expires_at.unwrap() > Utc::now());
    }

    #[tokio::test]
    async fn test_thumbnail_mode_never_opens_multipart() {
        let storage = S3Storage::from_client(offline_client(), options()).unwrap();

        let plan = storage
            .plan_upload(&UploadTarget {
                asset_id: "ast_2".to_string(),
                object_key: "business/b/assets/ast_2/thumbnail.jpg".to_string(),
                content_type: "image/jpeg".to_string(),
                category: AssetCategory::Image,
                size_bytes: 50 * 1024 * 1024,
                mode: PlanMode::SingleShot,
            })
            .await
            .unwrap();

        assert!(plan.multipart().is_none());
    }

    #[test]
    fn test_empty_bucket_rejected() {
        let mut opts = options();
        opts.bucket = String::new();
        assert!(matches!(
            S3Storage::from_client(offline_client(), opts),
            Err(StorageError::ConfigError(_))
        ));
    }
}
