//! Order import orchestration.
//!
//! One import is: resolve the collection hierarchy, enumerate the files to import,
//! then run one chain per file and join them. A chain is
//! `ensure_asset -> check destination -> stage -> upload`, each step on its own lane
//! so catalog, source and destination traffic are throttled independently.

use std::sync::Arc;

use tracing::{error, info, instrument};

use reflex_core::models::{AssetOutcome, Collection, FileMeta, ImportReport, Lane, Order};
use reflex_core::{TaskError, TaskResultExt};
use reflex_worker::JobRunner;

use crate::catalog::CatalogUpsert;
use crate::folders::FolderEnumerator;
use crate::transfer::TransferPipeline;

pub struct OrderImporter {
    runner: JobRunner,
    folders: Arc<FolderEnumerator>,
    catalog: Arc<CatalogUpsert>,
    transfer: Arc<TransferPipeline>,
}

impl OrderImporter {
    pub fn new(
        runner: JobRunner,
        folders: Arc<FolderEnumerator>,
        catalog: Arc<CatalogUpsert>,
        transfer: Arc<TransferPipeline>,
    ) -> Self {
        Self {
            runner,
            folders,
            catalog,
            transfer,
        }
    }

    /// Synchronize every asset of `order`
    ///
    /// Errors before the fan-out (collections, enumeration) fail the whole import.
    /// After it, each chain's failure is recorded in its outcome and turns the
    /// report's status to failure without stopping the other chains.
    #[instrument(skip_all, fields(order_id = %order.id))]
    pub async fn import_order(&self, order: &Order) -> Result<ImportReport, TaskError> {
        let step = self.runner.step("ensure_collections", Lane::Default);
        let collections = self
            .runner
            .run_step(&step, move || self.catalog.ensure_collections(order))
            .await?;

        let work = self.collect_work(order, &collections.order, &collections.requirements).await?;
        info!(chains = work.len(), "Starting asset chains");

        let chains = work
            .iter()
            .map(|(file, collection)| self.run_chain(file, collection))
            .collect::<Vec<_>>();
        let results = self.runner.join_group(chains).await;

        let outcomes = work
            .iter()
            .zip(results)
            .map(|((file, _), result)| match result {
                Ok(outcome) => outcome,
                Err(e) => AssetOutcome {
                    file_id: file.id.clone(),
                    asset_id: None,
                    destination: None,
                    error: Some(e.to_string()),
                },
            })
            .collect();

        let report = ImportReport::from_outcomes(order.id.clone(), outcomes);
        info!(
            status = %report.status,
            assets = report.assets.len(),
            failed = report.failed(),
            "Order import finished"
        );
        Ok(report)
    }

    /// Files to import paired with the collection they belong to
    ///
    /// Requirement items each contribute their own folder's images; an order
    /// without items contributes its delivery folder and allow-listed sub-folders.
    async fn collect_work(
        &self,
        order: &Order,
        order_collection: &Collection,
        requirements: &[Collection],
    ) -> Result<Vec<(FileMeta, Collection)>, TaskError> {
        let step = self.runner.step("enumerate_folder", Lane::Source);
        let mut work = Vec::new();

        if order.has_requirement_items() {
            for (item, collection) in order.requirement_items.iter().zip(requirements) {
                let folder_id = item.folder_id.as_str();
                let contents = self
                    .runner
                    .run_step(&step, move || async move {
                        self.folders
                            .list(folder_id, false, false)
                            .await
                            .map_err(TaskError::classify)
                    })
                    .await?;
                work.extend(
                    contents
                        .images
                        .into_iter()
                        .map(|file| (file, collection.clone())),
                );
            }
        } else {
            let link = order.delivery_link().unrecoverable()?;
            let images = self
                .runner
                .run_step(&step, move || async move {
                    self.folders
                        .deliverable_images(link, true)
                        .await
                        .map_err(TaskError::classify)
                })
                .await?;
            work.extend(
                images
                    .into_iter()
                    .map(|file| (file, order_collection.clone())),
            );
        }

        Ok(work)
    }

    /// One asset's chain; steps run strictly in order
    async fn run_chain(
        &self,
        file: &FileMeta,
        collection: &Collection,
    ) -> Result<AssetOutcome, TaskError> {
        let ensure = self.runner.step("ensure_asset", Lane::Default);
        let job = self
            .runner
            .run_step(&ensure, move || self.catalog.ensure_asset(file, collection))
            .await
            .inspect_err(|e| {
                error!(file_id = %file.id, error = %e, "Asset registration failed");
            })?;

        let stored = self.store(&job).await;
        Ok(match stored {
            Ok(destination) => AssetOutcome {
                file_id: file.id.clone(),
                asset_id: Some(job.asset_id),
                destination: Some(destination),
                error: None,
            },
            Err(e) => {
                error!(
                    file_id = %file.id,
                    asset_id = %job.asset_id,
                    error = %e,
                    "Asset transfer failed"
                );
                AssetOutcome {
                    file_id: file.id.clone(),
                    asset_id: Some(job.asset_id),
                    destination: None,
                    error: Some(e.to_string()),
                }
            }
        })
    }

    async fn store(&self, job: &reflex_core::models::TransferJob) -> Result<String, TaskError> {
        let check = self.runner.step("check_destination", Lane::Destination);
        let exists = self
            .runner
            .run_step(&check, move || self.transfer.file_exists(job))
            .await?;
        if exists {
            return self.transfer.destination_key(job);
        }

        let download = self.runner.step("download", Lane::Source);
        self.runner
            .run_step(&download, move || self.transfer.stage(job))
            .await?;

        let upload = self.runner.step("upload", Lane::Destination);
        self.runner
            .run_step(&upload, move || self.transfer.upload(job))
            .await
    }
}
