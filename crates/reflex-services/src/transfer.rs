//! Source to destination transfer of one asset.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, info, instrument, warn};

use reflex_api_client::SourceDrive;
use reflex_core::models::TransferJob;
use reflex_core::{Config, TaskError};
use reflex_storage::{destination_key, Storage};

/// Moves a staged asset from the source drive to destination storage
///
/// Destination keys are derived from the job's file name only, so a repeated
/// transfer of the same asset targets the same object.
pub struct TransferPipeline {
    drive: Arc<dyn SourceDrive>,
    storage: Arc<dyn Storage>,
    assets_prefix: String,
}

impl TransferPipeline {
    pub fn new(
        drive: Arc<dyn SourceDrive>,
        storage: Arc<dyn Storage>,
        assets_prefix: impl Into<String>,
    ) -> Self {
        Self {
            drive,
            storage,
            assets_prefix: assets_prefix.into(),
        }
    }

    pub fn from_config(drive: Arc<dyn SourceDrive>, storage: Arc<dyn Storage>, config: &Config) -> Self {
        Self::new(drive, storage, config.assets_prefix())
    }

    /// `{assets_prefix}/{file_name}`
    pub fn destination_key(&self, job: &TransferJob) -> Result<String, TaskError> {
        destination_key(&self.assets_prefix, &job.file_name).map_err(TaskError::classify)
    }

    /// Whether the destination object is already there; absence is `false`
    pub async fn file_exists(&self, job: &TransferJob) -> Result<bool, TaskError> {
        let key = self.destination_key(job)?;
        self.storage.exists(&key).await.map_err(TaskError::classify)
    }

    /// Download the source file into the job's staging directory
    #[instrument(skip_all, fields(asset_id = %job.asset_id, file_id = %job.file.id))]
    pub async fn stage(&self, job: &TransferJob) -> Result<PathBuf, TaskError> {
        tokio::fs::create_dir_all(&job.directory).await?;
        let path = job.staging_path();
        let started = Instant::now();
        let bytes = self
            .drive
            .download_to(&job.file.id, &path)
            .await
            .map_err(TaskError::classify)?;
        info!(
            path = %path.display(),
            bytes,
            duration_ms = started.elapsed().as_millis() as u64,
            "Source file staged"
        );
        Ok(path)
    }

    /// Upload the staged file and remove it; returns the destination key
    ///
    /// The staging copy is only removed once the upload succeeded.
    #[instrument(skip_all, fields(asset_id = %job.asset_id))]
    pub async fn upload(&self, job: &TransferJob) -> Result<String, TaskError> {
        let key = self.destination_key(job)?;
        let path = job.staging_path();
        self.storage
            .upload_file(&path, &key, &job.file.mime_type)
            .await
            .map_err(TaskError::classify)?;

        if let Err(e) = tokio::fs::remove_file(&path).await {
            warn!(path = %path.display(), error = %e, "Failed to remove staging file");
        }
        info!(key = %key, "Asset uploaded to destination");
        Ok(key)
    }

    /// Stage and upload unless the destination already has the object
    pub async fn transfer(&self, job: &TransferJob) -> Result<String, TaskError> {
        if self.file_exists(job).await? {
            let key = self.destination_key(job)?;
            debug!(key = %key, asset_id = %job.asset_id, "Destination already present, skipping transfer");
            return Ok(key);
        }
        self.stage(job).await?;
        self.upload(job).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::{file_meta, MockDrive, MockStorage};
    use tempfile::TempDir;

    struct Fixture {
        drive: Arc<MockDrive>,
        storage: Arc<MockStorage>,
        pipeline: TransferPipeline,
        staging: TempDir,
    }

    fn fixture() -> Fixture {
        let drive = Arc::new(MockDrive::new());
        let storage = Arc::new(MockStorage::new());
        let pipeline = TransferPipeline::new(drive.clone(), storage.clone(), "source/assets");
        Fixture {
            drive,
            storage,
            pipeline,
            staging: TempDir::new().unwrap(),
        }
    }

    fn job(fixture: &Fixture) -> TransferJob {
        TransferJob::new(
            "asset-1",
            fixture.staging.path().join("order-1"),
            file_meta("file-1", "a.jpg", "image/jpeg"),
        )
    }

    #[tokio::test]
    async fn test_transfer_stages_uploads_and_cleans_up() {
        let f = fixture();
        f.drive.add_content("file-1", b"jpeg-bytes".to_vec());
        let job = job(&f);

        let key = f.pipeline.transfer(&job).await.unwrap();

        assert_eq!(key, "source/assets/asset-1.jpg");
        assert_eq!(f.storage.object(&key).unwrap(), b"jpeg-bytes");
        assert!(!job.staging_path().exists());
        assert!(job.directory.exists());
    }

    #[tokio::test]
    async fn test_existing_destination_skips_work() {
        let f = fixture();
        f.storage.put("source/assets/asset-1.jpg", b"old".to_vec());
        let job = job(&f);

        let key = f.pipeline.transfer(&job).await.unwrap();

        assert_eq!(key, "source/assets/asset-1.jpg");
        assert_eq!(f.drive.download_calls(), 0);
        assert_eq!(f.storage.upload_calls(), 0);
    }

    #[tokio::test]
    async fn test_existence_failure_propagates() {
        let f = fixture();
        f.storage.fail_exists(true);

        let err = f.pipeline.file_exists(&job(&f)).await.unwrap_err();
        assert!(err.is_recoverable());
    }

    #[tokio::test]
    async fn test_failed_upload_keeps_staging_copy() {
        let f = fixture();
        f.drive.add_content("file-1", b"jpeg-bytes".to_vec());
        f.storage.fail_uploads(true);
        let job = job(&f);

        assert!(f.pipeline.transfer(&job).await.is_err());
        assert!(job.staging_path().exists());
    }

    #[tokio::test]
    async fn test_missing_source_file_is_fatal() {
        let f = fixture();
        let err = f.pipeline.stage(&job(&f)).await.unwrap_err();
        assert!(!err.is_recoverable());
    }
}
