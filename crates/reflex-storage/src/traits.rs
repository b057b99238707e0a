//! Storage abstraction trait
//!
//! This module defines the Storage trait that all destination backends implement.

use crate::StorageBackend;
use async_trait::async_trait;
use reflex_core::Recoverable;
use std::path::Path;
use thiserror::Error;

/// Storage operation errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Upload failed: {0}")]
    UploadFailed(String),

    #[error("File not found: {0}")]
    NotFound(String),

    #[error("Invalid storage key: {0}")]
    InvalidKey(String),

    #[error("Storage backend error: {0}")]
    BackendError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

impl Recoverable for StorageError {
    fn is_recoverable(&self) -> bool {
        matches!(
            self,
            StorageError::UploadFailed(_) | StorageError::BackendError(_) | StorageError::IoError(_)
        )
    }
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Destination storage abstraction
///
/// `exists` distinguishes absence (`Ok(false)`) from failure (`Err`): the transfer
/// pipeline skips work only on a positive answer and must not treat an outage as
/// "not uploaded yet".
#[async_trait]
pub trait Storage: Send + Sync {
    /// Upload data to a specific storage key. Returns the object's URL.
    async fn upload_with_key(
        &self,
        storage_key: &str,
        data: Vec<u8>,
        content_type: &str,
    ) -> StorageResult<String>;

    /// Upload a local file to a specific storage key. Returns the object's URL.
    async fn upload_file(
        &self,
        local_path: &Path,
        storage_key: &str,
        content_type: &str,
    ) -> StorageResult<String> {
        let data = tokio::fs::read(local_path).await?;
        self.upload_with_key(storage_key, data, content_type).await
    }

    /// Check if an object exists
    async fn exists(&self, storage_key: &str) -> StorageResult<bool>;

    /// Get the storage backend type
    fn backend_type(&self) -> StorageBackend;
}
