use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use serde::Serialize;

use reflex_core::models::Order;
use reflex_core::Config;
use reflex_stream::{
    AuditSummary, CheckpointStore, FileCheckpointStore, InventoryAudit, MemoryCheckpointStore,
    OrderInventory,
};

pub fn print_json(value: &impl Serialize) -> anyhow::Result<()> {
    let out = serde_json::to_string_pretty(value).context("Serialize output")?;
    println!("{}", out);
    Ok(())
}

/// Read an order payload saved as JSON
pub fn load_order_file(path: &Path) -> anyhow::Result<Order> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read order file {}", path.display()))?;
    let value: serde_json::Value = serde_json::from_str(&raw)
        .with_context(|| format!("{} is not valid JSON", path.display()))?;
    Ok(Order::from_value(value)?)
}

/// File store when `STREAM_CHECKPOINT_PATH` is set; otherwise every run starts over
pub fn checkpoint_store(config: &Config) -> Arc<dyn CheckpointStore> {
    match config.stream_checkpoint_path() {
        Some(path) => Arc::new(FileCheckpointStore::new(path.clone(), config.delivery_stream())),
        None => Arc::new(MemoryCheckpointStore::default()),
    }
}

/// What `audit-stream` prints
#[derive(Debug, Serialize)]
pub struct AuditOutput<'a> {
    pub summary: AuditSummary,
    pub zero_image_orders: Vec<&'a OrderInventory>,
    pub broken_link_orders: Vec<&'a OrderInventory>,
}

impl<'a> AuditOutput<'a> {
    pub fn new(audit: &'a InventoryAudit) -> Self {
        Self {
            summary: audit.summary(),
            zero_image_orders: audit.zero_image_orders().collect(),
            broken_link_orders: audit.broken_link_orders().collect(),
        }
    }
}
