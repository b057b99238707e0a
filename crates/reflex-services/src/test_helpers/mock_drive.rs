//! In-memory source drive

use async_trait::async_trait;
use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use reflex_api_client::{ApiError, ApiResult, SourceDrive};
use reflex_core::models::FileMeta;

#[derive(Default)]
struct DriveState {
    folders: HashMap<String, Vec<FileMeta>>,
    contents: HashMap<String, Vec<u8>>,
}

/// Drive double: folder listings and file bytes registered up front
#[derive(Default)]
pub struct MockDrive {
    state: Mutex<DriveState>,
    list_calls: AtomicUsize,
    download_calls: AtomicUsize,
}

impl MockDrive {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, DriveState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn add_folder(&self, folder_id: &str, children: Vec<FileMeta>) {
        self.state().folders.insert(folder_id.to_string(), children);
    }

    pub fn add_content(&self, file_id: &str, bytes: Vec<u8>) {
        self.state().contents.insert(file_id.to_string(), bytes);
    }

    pub fn list_calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }

    pub fn download_calls(&self) -> usize {
        self.download_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SourceDrive for MockDrive {
    async fn list_folder(&self, folder_id: &str) -> ApiResult<Vec<FileMeta>> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        self.state()
            .folders
            .get(folder_id)
            .cloned()
            .ok_or_else(|| ApiError::NotFound(format!("folder {}", folder_id)))
    }

    async fn download_to(&self, file_id: &str, destination: &Path) -> ApiResult<u64> {
        self.download_calls.fetch_add(1, Ordering::SeqCst);
        let bytes = self
            .state()
            .contents
            .get(file_id)
            .cloned()
            .ok_or_else(|| ApiError::NotFound(format!("file {}", file_id)))?;
        tokio::fs::write(destination, &bytes).await?;
        Ok(bytes.len() as u64)
    }
}
