//! In-memory destination storage

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use reflex_core::StorageBackend;
use reflex_storage::{Storage, StorageError, StorageResult};

/// Storage double keeping objects in a map
#[derive(Default)]
pub struct MockStorage {
    objects: Mutex<HashMap<String, Vec<u8>>>,
    upload_calls: AtomicUsize,
    fail_exists: AtomicBool,
    fail_uploads: AtomicBool,
}

impl MockStorage {
    pub fn new() -> Self {
        Self::default()
    }

    fn objects(&self) -> MutexGuard<'_, HashMap<String, Vec<u8>>> {
        self.objects.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Seed an object without counting an upload
    pub fn put(&self, key: &str, data: Vec<u8>) {
        self.objects().insert(key.to_string(), data);
    }

    pub fn object(&self, key: &str) -> Option<Vec<u8>> {
        self.objects().get(key).cloned()
    }

    pub fn len(&self) -> usize {
        self.objects().len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects().is_empty()
    }

    pub fn upload_calls(&self) -> usize {
        self.upload_calls.load(Ordering::SeqCst)
    }

    pub fn fail_exists(&self, fail: bool) {
        self.fail_exists.store(fail, Ordering::SeqCst);
    }

    pub fn fail_uploads(&self, fail: bool) {
        self.fail_uploads.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl Storage for MockStorage {
    async fn upload_with_key(
        &self,
        storage_key: &str,
        data: Vec<u8>,
        _content_type: &str,
    ) -> StorageResult<String> {
        self.upload_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_uploads.load(Ordering::SeqCst) {
            return Err(StorageError::UploadFailed(format!(
                "injected failure for {}",
                storage_key
            )));
        }
        self.objects().insert(storage_key.to_string(), data);
        Ok(format!("mock://{}", storage_key))
    }

    async fn exists(&self, storage_key: &str) -> StorageResult<bool> {
        if self.fail_exists.load(Ordering::SeqCst) {
            return Err(StorageError::BackendError(format!(
                "injected failure for {}",
                storage_key
            )));
        }
        Ok(self.objects().contains_key(storage_key))
    }

    fn backend_type(&self) -> StorageBackend {
        StorageBackend::Local
    }
}
