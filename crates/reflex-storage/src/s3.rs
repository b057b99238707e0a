use crate::keys::validate_key;
use crate::traits::{Storage, StorageError, StorageResult};
use crate::StorageBackend;
use async_trait::async_trait;
use bytes::Bytes;
use object_store::aws::{AmazonS3, AmazonS3Builder};
use object_store::path::Path;
use object_store::Error as ObjectStoreError;
use object_store::{ObjectStore, ObjectStoreExt, PutPayload, Result as ObjectResult, WriteMultipart};
use tokio::io::AsyncReadExt;

/// Files above this size are uploaded in parts instead of read into memory
const MULTIPART_THRESHOLD: u64 = 16 * 1024 * 1024;
/// Part size for multipart uploads
const PART_SIZE: usize = 8 * 1024 * 1024;
/// Parts in flight per upload
const MAX_PARTS_IN_FLIGHT: usize = 4;

/// S3 storage implementation
#[derive(Clone)]
pub struct S3Storage {
    store: AmazonS3,
    bucket: String,
    region: String,
    endpoint_url: Option<String>, // Custom endpoint for S3-compatible providers
}

impl S3Storage {
    /// Create a new S3Storage instance
    ///
    /// # Arguments
    /// * `bucket` - S3 bucket name
    /// * `region` - AWS region
    /// * `endpoint_url` - Optional custom endpoint (e.g. "http://localhost:9000" for MinIO)
    pub async fn new(
        bucket: String,
        region: String,
        endpoint_url: Option<String>,
    ) -> StorageResult<Self> {
        let mut builder = AmazonS3Builder::from_env()
            .with_region(region.clone())
            .with_bucket_name(bucket.clone());

        if let Some(ref endpoint) = endpoint_url {
            let allow_http = endpoint.starts_with("http://");
            builder = builder
                .with_endpoint(endpoint.clone())
                .with_allow_http(allow_http);
        }

        let store = builder
            .build()
            .map_err(|e| StorageError::ConfigError(e.to_string()))?;

        Ok(S3Storage {
            store,
            bucket,
            region,
            endpoint_url,
        })
    }

    /// Public URL of an object
    ///
    /// Path-style `{endpoint}/{bucket}/{key}` for S3-compatible providers,
    /// virtual-hosted style otherwise.
    fn generate_url(&self, key: &str) -> String {
        if let Some(ref endpoint) = self.endpoint_url {
            let base_url = endpoint.trim_end_matches('/');
            format!("{}/{}/{}", base_url, self.bucket, key)
        } else {
            format!(
                "https://{}.s3.{}.amazonaws.com/{}",
                self.bucket, self.region, key
            )
        }
    }
}

#[async_trait]
impl Storage for S3Storage {
    async fn upload_with_key(
        &self,
        storage_key: &str,
        data: Vec<u8>,
        _content_type: &str,
    ) -> StorageResult<String> {
        validate_key(storage_key)?;
        let size = data.len() as u64;
        let bytes = Bytes::from(data);
        let location = Path::from(storage_key.to_string());
        let start = std::time::Instant::now();

        let result: ObjectResult<_> = self.store.put(&location, PutPayload::from(bytes)).await;

        result.map_err(|e| {
            tracing::error!(
                error = %e,
                bucket = %self.bucket,
                key = %storage_key,
                size_bytes = size,
                duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                "S3 upload failed"
            );
            StorageError::UploadFailed(e.to_string())
        })?;

        let url = self.generate_url(storage_key);

        tracing::info!(
            bucket = %self.bucket,
            key = %storage_key,
            size_bytes = size,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "S3 upload successful"
        );

        Ok(url)
    }

    async fn upload_file(
        &self,
        local_path: &std::path::Path,
        storage_key: &str,
        content_type: &str,
    ) -> StorageResult<String> {
        validate_key(storage_key)?;
        let size = tokio::fs::metadata(local_path).await?.len();
        if size <= MULTIPART_THRESHOLD {
            let data = tokio::fs::read(local_path).await?;
            return self.upload_with_key(storage_key, data, content_type).await;
        }

        let location = Path::from(storage_key.to_string());
        let start = std::time::Instant::now();
        let written = stream_file(&self.store, &location, local_path, PART_SIZE)
            .await
            .inspect_err(|e| {
                tracing::error!(
                    error = %e,
                    bucket = %self.bucket,
                    key = %storage_key,
                    size_bytes = size,
                    "S3 multipart upload failed"
                );
            })?;

        tracing::info!(
            bucket = %self.bucket,
            key = %storage_key,
            size_bytes = written,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "S3 multipart upload successful"
        );
        Ok(self.generate_url(storage_key))
    }

    async fn exists(&self, storage_key: &str) -> StorageResult<bool> {
        validate_key(storage_key)?;
        let location = Path::from(storage_key.to_string());
        match self.store.head(&location).await {
            Ok(_) => Ok(true),
            Err(ObjectStoreError::NotFound { .. }) => Ok(false),
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    bucket = %self.bucket,
                    key = %storage_key,
                    "S3 existence check failed"
                );
                Err(StorageError::BackendError(e.to_string()))
            }
        }
    }

    fn backend_type(&self) -> StorageBackend {
        StorageBackend::S3
    }
}

/// Copy `local_path` to `location` part by part; the upload is aborted on failure
async fn stream_file<S>(
    store: &S,
    location: &Path,
    local_path: &std::path::Path,
    part_size: usize,
) -> StorageResult<u64>
where
    S: ObjectStore,
{
    let upload = store
        .put_multipart(location)
        .await
        .map_err(|e| StorageError::UploadFailed(e.to_string()))?;
    let mut writer = WriteMultipart::new_with_chunk_size(upload, part_size);
    let mut file = tokio::fs::File::open(local_path).await?;
    let mut buf = vec![0u8; part_size];
    let mut written = 0u64;

    loop {
        let read = match file.read(&mut buf).await {
            Ok(0) => break,
            Ok(read) => read,
            Err(e) => {
                let _ = writer.abort().await;
                return Err(e.into());
            }
        };
        if let Err(e) = writer.wait_for_capacity(MAX_PARTS_IN_FLIGHT).await {
            let _ = writer.abort().await;
            return Err(StorageError::UploadFailed(e.to_string()));
        }
        writer.write(&buf[..read]);
        written += read as u64;
    }

    writer
        .finish()
        .await
        .map_err(|e| StorageError::UploadFailed(e.to_string()))?;
    Ok(written)
}
