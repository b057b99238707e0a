//! Reflex CLI: runs the event worker and the operator commands.
//!
//! Configuration comes from the environment (and `.env`); see `reflex_core::config`.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Context};
use clap::{Args, Parser, Subcommand};
use tokio::sync::mpsc;

use reflex_cli::{checkpoint_store, load_order_file, print_json, AuditOutput};
use reflex_core::models::ImportStatus;
use reflex_core::Config;
use reflex_dispatch::PipelineContext;
use reflex_infra::{init_telemetry, shutdown_telemetry};
use reflex_stream::{ContentsProducer, InventoryAudit, KinesisStream, StreamConsumer};

const SERVICE_NAME: &str = "reflex";

#[derive(Parser)]
#[command(name = "reflex", about = "Asset synchronization pipeline")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Consume inbound events from the queue until interrupted
    Worker,
    /// Import one order and print its report
    ImportOrder(OrderArgs),
    /// Append delivery, archive and submission folder snapshots of orders to the change-stream
    PublishContents {
        /// Order ids
        #[arg(required = true)]
        order_ids: Vec<String>,
    },
    /// Replay the change-stream and report per-order image totals
    AuditStream {
        /// Count images of every sub-folder, not only allow-listed ones
        #[arg(long)]
        all_folders: bool,
    },
}

#[derive(Args)]
#[group(required = true, multiple = false)]
struct OrderArgs {
    /// Order id to fetch from the order service
    #[arg(long)]
    id: Option<String>,
    /// JSON file holding the order payload
    #[arg(long)]
    file: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let config = Config::from_env().context("Failed to load configuration")?;
    config.validate().context("Invalid configuration")?;
    init_telemetry(SERVICE_NAME, config.environment(), config.log_json())
        .map_err(|e| anyhow!("Failed to initialize telemetry: {}", e))?;

    let result = match cli.command {
        Commands::Worker => run_worker(&config).await,
        Commands::ImportOrder(args) => import_order(&config, args).await,
        Commands::PublishContents { order_ids } => publish_contents(&config, &order_ids).await,
        Commands::AuditStream { all_folders } => audit_stream(&config, all_folders).await,
    };

    if let Err(e) = &result {
        tracing::error!(error = ?e, "Command failed");
    }
    shutdown_telemetry().await;
    result
}

async fn run_worker(config: &Config) -> anyhow::Result<()> {
    let context = PipelineContext::from_config(config).await?;
    let worker = reflex_dispatch::wiring::queue_worker(config, context.importer.clone()).await?;

    let (shutdown_tx, shutdown_rx) = mpsc::channel(1);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Interrupt received, stopping worker");
            let _ = shutdown_tx.send(()).await;
        }
    });

    worker.run(shutdown_rx).await
}

async fn import_order(config: &Config, args: OrderArgs) -> anyhow::Result<()> {
    let context = PipelineContext::from_config(config).await?;
    let order = match (args.id, args.file) {
        (Some(id), _) => context
            .orders
            .get_order(&id)
            .await
            .with_context(|| format!("Failed to fetch order {}", id))?,
        (None, Some(path)) => load_order_file(&path)?,
        (None, None) => return Err(anyhow!("either --id or --file is required")),
    };

    let report = context
        .importer
        .import_order(&order)
        .await
        .map_err(|e| e.into_inner())
        .with_context(|| format!("Import of order {} failed", order.id))?;
    print_json(&report)?;

    if report.status == ImportStatus::Failure {
        return Err(anyhow!(
            "{} of {} assets failed for order {}",
            report.failed(),
            report.assets.len(),
            order.id
        ));
    }
    Ok(())
}

async fn publish_contents(config: &Config, order_ids: &[String]) -> anyhow::Result<()> {
    let context = PipelineContext::from_config(config).await?;
    let stream = Arc::new(KinesisStream::from_config(config).await);
    let producer = ContentsProducer::new(stream);

    for id in order_ids {
        let order = context
            .orders
            .get_order(id)
            .await
            .with_context(|| format!("Failed to fetch order {}", id))?;
        let contents = context
            .folders
            .order_contents(&order)
            .await
            .with_context(|| format!("Failed to list source folders of order {}", id))?;
        producer.put_contents_record(&order, &contents).await?;
    }

    tracing::info!(orders = order_ids.len(), stream = %config.delivery_stream(), "Contents published");
    Ok(())
}

async fn audit_stream(config: &Config, all_folders: bool) -> anyhow::Result<()> {
    let stream = Arc::new(KinesisStream::from_config(config).await);
    let mut consumer = StreamConsumer::new(
        stream,
        checkpoint_store(config),
        Duration::from_secs(config.stream_iterator_ttl_secs()),
    );
    let mut audit = InventoryAudit::new(config.folder_allow_list(), !all_folders);

    let stats = consumer.run(&mut audit).await?;
    let output = AuditOutput::new(&audit);
    tracing::info!(
        records = stats.records,
        malformed = stats.malformed,
        orders = output.summary.orders,
        total_images = output.summary.total_images,
        zero_image_orders = output.summary.zero_image_orders,
        broken_link_orders = output.summary.broken_link_orders,
        "Stream audit finished"
    );
    print_json(&output)
}
