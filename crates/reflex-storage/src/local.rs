use crate::keys::validate_key;
use crate::traits::{Storage, StorageError, StorageResult};
use crate::StorageBackend;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;

/// Local filesystem storage implementation
#[derive(Clone)]
pub struct LocalStorage {
    base_path: PathBuf,
}

impl LocalStorage {
    /// Create a new LocalStorage rooted at `base_path`, creating it if needed
    pub async fn new(base_path: impl Into<PathBuf>) -> StorageResult<Self> {
        let base_path = base_path.into();

        fs::create_dir_all(&base_path).await.map_err(|e| {
            StorageError::ConfigError(format!(
                "Failed to create storage directory {}: {}",
                base_path.display(),
                e
            ))
        })?;

        Ok(LocalStorage { base_path })
    }

    /// Convert storage key to filesystem path, rejecting traversal
    fn key_to_path(&self, storage_key: &str) -> StorageResult<PathBuf> {
        validate_key(storage_key)?;
        Ok(self.base_path.join(storage_key))
    }

    fn generate_url(path: &Path) -> String {
        format!("file://{}", path.display())
    }

    async fn ensure_parent_dir(&self, path: &Path) -> StorageResult<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }
        Ok(())
    }
}

#[async_trait]
impl Storage for LocalStorage {
    async fn upload_with_key(
        &self,
        storage_key: &str,
        data: Vec<u8>,
        _content_type: &str,
    ) -> StorageResult<String> {
        let path = self.key_to_path(storage_key)?;
        let size = data.len();

        self.ensure_parent_dir(&path).await?;

        let start = std::time::Instant::now();

        let mut file = fs::File::create(&path).await.map_err(|e| {
            StorageError::UploadFailed(format!("Failed to create file {}: {}", path.display(), e))
        })?;

        file.write_all(&data).await.map_err(|e| {
            StorageError::UploadFailed(format!("Failed to write file {}: {}", path.display(), e))
        })?;

        file.sync_all().await.map_err(|e| {
            StorageError::UploadFailed(format!("Failed to sync file {}: {}", path.display(), e))
        })?;

        tracing::info!(
            path = %path.display(),
            key = %storage_key,
            size_bytes = size,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Local storage upload successful"
        );

        Ok(Self::generate_url(&path))
    }

    async fn upload_file(
        &self,
        local_path: &Path,
        storage_key: &str,
        _content_type: &str,
    ) -> StorageResult<String> {
        let path = self.key_to_path(storage_key)?;
        self.ensure_parent_dir(&path).await?;

        let start = std::time::Instant::now();
        let size = fs::copy(local_path, &path).await.map_err(|e| {
            StorageError::UploadFailed(format!(
                "Failed to copy {} to {}: {}",
                local_path.display(),
                path.display(),
                e
            ))
        })?;

        tracing::info!(
            path = %path.display(),
            key = %storage_key,
            size_bytes = size,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Local storage upload successful"
        );

        Ok(Self::generate_url(&path))
    }

    async fn exists(&self, storage_key: &str) -> StorageResult<bool> {
        let path = self.key_to_path(storage_key)?;
        Ok(fs::try_exists(&path).await?)
    }

    fn backend_type(&self) -> StorageBackend {
        StorageBackend::Local
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_upload_then_exists() {
        let dir = TempDir::new().unwrap();
        let storage = LocalStorage::new(dir.path()).await.unwrap();

        assert!(!storage.exists("source/assets/a-1.jpg").await.unwrap());
        storage
            .upload_with_key("source/assets/a-1.jpg", b"jpeg".to_vec(), "image/jpeg")
            .await
            .unwrap();
        assert!(storage.exists("source/assets/a-1.jpg").await.unwrap());
        assert_eq!(storage.backend_type(), StorageBackend::Local);
    }

    #[tokio::test]
    async fn test_upload_file_copies_contents() {
        let dir = TempDir::new().unwrap();
        let staging = TempDir::new().unwrap();
        let source = staging.path().join("a-2.png");
        tokio::fs::write(&source, b"png-bytes").await.unwrap();

        let storage = LocalStorage::new(dir.path()).await.unwrap();
        let url = storage
            .upload_file(&source, "source/assets/a-2.png", "image/png")
            .await
            .unwrap();

        assert!(url.starts_with("file://"));
        let stored = tokio::fs::read(dir.path().join("source/assets/a-2.png"))
            .await
            .unwrap();
        assert_eq!(stored, b"png-bytes");
    }

    #[tokio::test]
    async fn test_traversal_rejected() {
        let dir = TempDir::new().unwrap();
        let storage = LocalStorage::new(dir.path()).await.unwrap();
        let err = storage.exists("../outside.jpg").await.unwrap_err();
        assert!(matches!(err, StorageError::InvalidKey(_)));
    }
}
