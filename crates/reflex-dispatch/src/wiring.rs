//! Production components built from configuration.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};

use reflex_api_client::{Auth, GoogleDriveClient, OrderSource, RestCatalogClient, RestOrderClient};
use reflex_core::Config;
use reflex_services::{CatalogUpsert, FolderEnumerator, OrderImporter, TransferPipeline};
use reflex_storage::create_storage;
use reflex_worker::JobRunner;

/// Everything an order import needs, shared by the worker and the CLI commands
pub struct PipelineContext {
    pub orders: Arc<dyn OrderSource>,
    pub folders: Arc<FolderEnumerator>,
    pub importer: Arc<OrderImporter>,
}

impl PipelineContext {
    pub async fn from_config(config: &Config) -> Result<Self> {
        let timeout = Duration::from_secs(config.http_timeout_secs());

        let token = config
            .drive_access_token()
            .context("DRIVE_ACCESS_TOKEN not configured")?;
        let drive = Arc::new(
            GoogleDriveClient::new(config.drive_api_base(), token, timeout)
                .context("Failed to create drive client")?,
        );
        let catalog = Arc::new(
            RestCatalogClient::new(config.catalog_base_url(), Auth::None, timeout)
                .context("Failed to create catalog client")?,
        );
        let orders = Arc::new(
            RestOrderClient::new(config.orders_base_url(), Auth::None, timeout)
                .context("Failed to create order client")?,
        );
        let storage = create_storage(config)
            .await
            .context("Failed to initialize destination storage")?;

        let folders = Arc::new(FolderEnumerator::new(
            drive.clone(),
            config.folder_allow_list(),
        ));
        let importer = OrderImporter::new(
            JobRunner::from_config(config),
            folders.clone(),
            Arc::new(CatalogUpsert::from_config(catalog, config)),
            Arc::new(TransferPipeline::from_config(drive, storage, config)),
        );

        tracing::info!(
            storage_backend = ?config.storage_backend(),
            catalog = %config.catalog_base_url(),
            "Pipeline components initialized"
        );

        Ok(Self {
            orders,
            folders,
            importer: Arc::new(importer),
        })
    }
}

/// Queue worker reading `REFLEX_QUEUE_URL` and notifying `REFLEX_EVENTS_QUEUE_URL`
#[cfg(feature = "sqs")]
pub async fn queue_worker(config: &Config, importer: Arc<OrderImporter>) -> Result<crate::QueueWorker> {
    use crate::sqs::{sqs_client, SqsEventPublisher, SqsQueue};
    use crate::{DispatchTable, EventDispatchWorker, ImportOrderAction, QueueWorkerConfig};

    let queue_url = config
        .queue_url()
        .context("REFLEX_QUEUE_URL not configured")?;
    let events_queue_url = config
        .events_queue_url()
        .context("REFLEX_EVENTS_QUEUE_URL not configured")?;

    let client = sqs_client(config.aws_region()).await;
    let table = DispatchTable::for_import(Arc::new(ImportOrderAction::new(importer)));
    let dispatcher = EventDispatchWorker::new(
        table,
        Arc::new(SqsEventPublisher::new(client.clone(), events_queue_url)),
    );
    Ok(crate::QueueWorker::new(
        Arc::new(SqsQueue::new(client, queue_url)),
        dispatcher,
        QueueWorkerConfig::from_config(config),
    ))
}
