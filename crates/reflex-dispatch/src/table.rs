//! Static mapping from inbound event names to actions and notifications.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use uuid::Uuid;

use reflex_core::models::{ImportStatus, MessageEnvelope};

/// Inbound event that triggers an order import
pub const ORDER_WORKFLOW_ACCEPT: &str = "order.workflow.accept";
pub const IMPORT_ASSETS_SUCCESS: &str = "reflex.import.assets.success";
pub const IMPORT_ASSETS_FAILURE: &str = "reflex.import.assets.failure";

/// What an action hands back to the dispatcher
#[derive(Debug, Clone, PartialEq)]
pub struct ActionOutcome {
    pub status: ImportStatus,
    /// Entity the notification is about
    pub guid: Uuid,
    pub payload: serde_json::Value,
}

/// Work triggered by one inbound event
///
/// An `Err` is an unexpected failure: the dispatcher logs it and propagates it.
/// Expected failures come back as an outcome with [`ImportStatus::Failure`].
#[async_trait]
pub trait DispatchAction: Send + Sync {
    async fn run(&self, envelope: &MessageEnvelope) -> anyhow::Result<ActionOutcome>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NotificationEntry {
    pub event_name: &'static str,
    /// Whether the outcome counts as processed
    pub success: bool,
    pub message: &'static str,
}

pub const IMPORT_NOTIFICATIONS: [(ImportStatus, NotificationEntry); 2] = [
    (
        ImportStatus::Success,
        NotificationEntry {
            event_name: IMPORT_ASSETS_SUCCESS,
            success: true,
            message: "Import processed successfully",
        },
    ),
    (
        ImportStatus::Failure,
        NotificationEntry {
            event_name: IMPORT_ASSETS_FAILURE,
            success: false,
            message: "Import processed with failure",
        },
    ),
];

#[derive(Clone)]
pub struct DispatchEntry {
    pub name: &'static str,
    pub action: Arc<dyn DispatchAction>,
    pub notifications: HashMap<ImportStatus, NotificationEntry>,
    /// Leave the message on the queue when the outcome is not a success
    pub on_failure_retry: bool,
}

impl DispatchEntry {
    pub fn new(name: &'static str, action: Arc<dyn DispatchAction>, on_failure_retry: bool) -> Self {
        Self {
            name,
            action,
            notifications: HashMap::from(IMPORT_NOTIFICATIONS),
            on_failure_retry,
        }
    }

    pub fn notification(&self, status: ImportStatus) -> Option<&NotificationEntry> {
        self.notifications.get(&status)
    }
}

#[derive(Clone, Default)]
pub struct DispatchTable {
    entries: HashMap<String, DispatchEntry>,
}

impl DispatchTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// The production table: accepted orders are imported and retried on failure
    pub fn for_import(action: Arc<dyn DispatchAction>) -> Self {
        let mut table = Self::new();
        table.register(
            ORDER_WORKFLOW_ACCEPT,
            DispatchEntry::new("import_order", action, true),
        );
        table
    }

    pub fn register(&mut self, event_name: impl Into<String>, entry: DispatchEntry) {
        self.entries.insert(event_name.into(), entry);
    }

    pub fn get(&self, event_name: &str) -> Option<&DispatchEntry> {
        self.entries.get(event_name)
    }

    pub fn event_names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }
}
