//! Order import as a dispatch action.

use std::sync::Arc;

use anyhow::Context;
use async_trait::async_trait;
use uuid::Uuid;

use reflex_core::models::{MessageEnvelope, Order};
use reflex_services::OrderImporter;

use crate::table::{ActionOutcome, DispatchAction};

/// Imports the order carried in the envelope's `data`
pub struct ImportOrderAction {
    importer: Arc<OrderImporter>,
}

impl ImportOrderAction {
    pub fn new(importer: Arc<OrderImporter>) -> Self {
        Self { importer }
    }
}

/// Order ids are UUIDs upstream; anything else gets a fresh notification id
fn order_guid(order: &Order) -> Uuid {
    Uuid::parse_str(&order.id).unwrap_or_else(|_| Uuid::new_v4())
}

#[async_trait]
impl DispatchAction for ImportOrderAction {
    async fn run(&self, envelope: &MessageEnvelope) -> anyhow::Result<ActionOutcome> {
        let order = Order::from_value(serde_json::Value::Object(envelope.data.clone()))
            .context("invalid order payload")?;
        let report = self
            .importer
            .import_order(&order)
            .await
            .map_err(|e| e.into_inner())
            .with_context(|| format!("import of order {} failed", order.id))?;

        Ok(ActionOutcome {
            status: report.status,
            guid: order_guid(&order),
            payload: serde_json::to_value(&report)?,
        })
    }
}
