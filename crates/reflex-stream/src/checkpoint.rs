//! Persistence of per-shard sequence numbers between consumer runs.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;
use std::sync::{Mutex, PoisonError};

use crate::error::{StreamError, StreamResult};

#[async_trait]
pub trait CheckpointStore: Send + Sync {
    /// Last processed sequence number per shard; empty on first run
    async fn load(&self) -> StreamResult<HashMap<String, String>>;

    async fn save(&self, checkpoints: &HashMap<String, String>) -> StreamResult<()>;
}

/// Checkpoints kept for the lifetime of the process
#[derive(Debug, Default)]
pub struct MemoryCheckpointStore {
    checkpoints: Mutex<HashMap<String, String>>,
}

impl MemoryCheckpointStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> HashMap<String, String> {
        self.checkpoints
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[async_trait]
impl CheckpointStore for MemoryCheckpointStore {
    async fn load(&self) -> StreamResult<HashMap<String, String>> {
        Ok(self.snapshot())
    }

    async fn save(&self, checkpoints: &HashMap<String, String>) -> StreamResult<()> {
        *self
            .checkpoints
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = checkpoints.clone();
        Ok(())
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct CheckpointFile {
    stream: String,
    shards: BTreeMap<String, String>,
}

/// Checkpoints in a JSON file, replaced atomically on every save
///
/// The file records the stream name; a file written for another stream is
/// rejected rather than silently reused.
#[derive(Debug, Clone)]
pub struct FileCheckpointStore {
    path: PathBuf,
    stream: String,
}

impl FileCheckpointStore {
    pub fn new(path: impl Into<PathBuf>, stream: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            stream: stream.into(),
        }
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

#[async_trait]
impl CheckpointStore for FileCheckpointStore {
    async fn load(&self) -> StreamResult<HashMap<String, String>> {
        let bytes = match tokio::fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(HashMap::new()),
            Err(e) => return Err(e.into()),
        };
        let file: CheckpointFile = serde_json::from_slice(&bytes).map_err(|e| {
            StreamError::Checkpoint(format!("{} is not a checkpoint file: {}", self.path.display(), e))
        })?;
        if file.stream != self.stream {
            return Err(StreamError::Checkpoint(format!(
                "{} holds checkpoints for stream {}, not {}",
                self.path.display(),
                file.stream,
                self.stream
            )));
        }
        Ok(file.shards.into_iter().collect())
    }

    async fn save(&self, checkpoints: &HashMap<String, String>) -> StreamResult<()> {
        let file = CheckpointFile {
            stream: self.stream.clone(),
            shards: checkpoints
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
        };
        let bytes = serde_json::to_vec_pretty(&file).map_err(StreamError::Encode)?;

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }
        let temp = self.temp_path();
        tokio::fs::write(&temp, &bytes).await?;
        tokio::fs::rename(&temp, &self.path).await?;
        tracing::debug!(path = %self.path.display(), shards = checkpoints.len(), "Checkpoint saved");
        Ok(())
    }
}
