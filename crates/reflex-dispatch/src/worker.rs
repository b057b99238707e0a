//! Event dispatch worker and the queue loop feeding it.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::sync::mpsc;
use tracing::{debug, error, info, instrument, warn};

use reflex_core::{Config, Recoverable};

use crate::envelope::{decode_envelope, notification};
use crate::queue::{EventPublisher, MessageQueue, QueueMessage};
use crate::table::DispatchTable;

/// Delay before polling again after a transient receive failure
const RECEIVE_RETRY_DELAY: Duration = Duration::from_secs(5);

/// Turns one inbound message into an action run and a notification
///
/// Holds no state between messages.
pub struct EventDispatchWorker {
    table: DispatchTable,
    publisher: Arc<dyn EventPublisher>,
}

impl EventDispatchWorker {
    pub fn new(table: DispatchTable, publisher: Arc<dyn EventPublisher>) -> Self {
        Self { table, publisher }
    }

    /// Returns whether the message should be removed from the queue
    ///
    /// Invalid envelopes and unknown events are acknowledged and dropped. An action
    /// error is logged and returned; the message then stays on the queue.
    #[instrument(skip_all)]
    pub async fn process_message(&self, body: &str) -> Result<bool> {
        let envelope = match decode_envelope(body) {
            Ok(envelope) => envelope,
            Err(e) => {
                warn!(error = %e, "Dropping invalid envelope");
                return Ok(true);
            }
        };

        let Some(entry) = self.table.get(&envelope.event_name) else {
            info!(
                message_id = %envelope.id,
                event_name = %envelope.event_name,
                "Unknown event type, message ignored"
            );
            return Ok(true);
        };

        info!(
            message_id = %envelope.id,
            event_name = %envelope.event_name,
            action = entry.name,
            "Processing event"
        );
        let outcome = match entry.action.run(&envelope).await {
            Ok(outcome) => outcome,
            Err(e) => {
                error!(
                    action = entry.name,
                    event_name = %envelope.event_name,
                    guid = %envelope.guid,
                    data = %serde_json::Value::Object(envelope.data.clone()),
                    error = ?e,
                    "Unexpected error raised by dispatch action"
                );
                return Err(e.context(format!("action {} failed", entry.name)));
            }
        };

        let Some(notify) = entry.notification(outcome.status) else {
            warn!(status = %outcome.status, action = entry.name, "No notification for status");
            return Ok(true);
        };
        let event = notification(
            notify.event_name,
            outcome.guid,
            envelope.actor.clone(),
            outcome.payload,
        );
        self.publisher
            .publish(&event)
            .await
            .with_context(|| format!("failed to publish {}", notify.event_name))?;
        info!(
            event_name = notify.event_name,
            guid = %event.guid,
            status = %outcome.status,
            "{}",
            notify.message
        );

        if !notify.success {
            return Ok(!entry.on_failure_retry);
        }
        Ok(true)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct QueueWorkerConfig {
    pub max_messages: i32,
    pub wait_time_secs: i32,
}

impl QueueWorkerConfig {
    pub fn from_config(config: &Config) -> Self {
        Self {
            max_messages: config.worker_max_messages(),
            wait_time_secs: config.worker_wait_time_secs(),
        }
    }
}

impl Default for QueueWorkerConfig {
    fn default() -> Self {
        Self {
            max_messages: 1,
            wait_time_secs: 20,
        }
    }
}

/// Long-polls the inbound queue and feeds the dispatcher
pub struct QueueWorker {
    queue: Arc<dyn MessageQueue>,
    dispatcher: EventDispatchWorker,
    config: QueueWorkerConfig,
}

impl QueueWorker {
    pub fn new(
        queue: Arc<dyn MessageQueue>,
        dispatcher: EventDispatchWorker,
        config: QueueWorkerConfig,
    ) -> Self {
        Self {
            queue,
            dispatcher,
            config,
        }
    }

    /// Run until `shutdown_rx` fires or an action fails
    ///
    /// Acknowledged messages are deleted; the others are left for redelivery.
    pub async fn run(&self, mut shutdown_rx: mpsc::Receiver<()>) -> Result<()> {
        info!(
            max_messages = self.config.max_messages,
            wait_time_secs = self.config.wait_time_secs,
            "Queue worker started"
        );

        loop {
            let received = tokio::select! {
                _ = shutdown_rx.recv() => {
                    info!("Queue worker shutting down");
                    break;
                }
                received = self.queue.receive(self.config.max_messages, self.config.wait_time_secs) => received,
            };

            let messages = match received {
                Ok(messages) => messages,
                Err(e) if e.is_recoverable() => {
                    warn!(error = %e, "Failed to receive messages, will retry");
                    tokio::time::sleep(RECEIVE_RETRY_DELAY).await;
                    continue;
                }
                Err(e) => return Err(e).context("failed to receive messages"),
            };

            for message in messages {
                self.handle(&message).await?;
            }
        }

        info!("Queue worker stopped");
        Ok(())
    }

    async fn handle(&self, message: &QueueMessage) -> Result<()> {
        let acknowledged = self
            .dispatcher
            .process_message(&message.body)
            .await
            .with_context(|| format!("message {} failed", message.message_id))?;

        if acknowledged {
            self.queue
                .delete(&message.receipt_handle)
                .await
                .with_context(|| format!("failed to delete message {}", message.message_id))?;
            debug!(message_id = %message.message_id, "Message acknowledged");
        } else {
            info!(message_id = %message.message_id, "Message left for redelivery");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::{
        ActionOutcome, DispatchAction, DispatchEntry, IMPORT_ASSETS_FAILURE,
        IMPORT_ASSETS_SUCCESS, ORDER_WORKFLOW_ACCEPT,
    };
    use crate::testing::{MemoryQueue, RecordingPublisher};
    use async_trait::async_trait;
    use reflex_core::models::{ImportStatus, MessageEnvelope};
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use uuid::Uuid;

    const ORDER_GUID: &str = "0a6f3f42-7c1e-4d0b-8f55-3c1a2b9d6e70";

    struct StubAction {
        status: Option<ImportStatus>,
        calls: AtomicUsize,
    }

    impl StubAction {
        fn returning(status: ImportStatus) -> Arc<Self> {
            Arc::new(Self {
                status: Some(status),
                calls: AtomicUsize::new(0),
            })
        }

        fn failing() -> Arc<Self> {
            Arc::new(Self {
                status: None,
                calls: AtomicUsize::new(0),
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl DispatchAction for StubAction {
        async fn run(&self, envelope: &MessageEnvelope) -> anyhow::Result<ActionOutcome> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match self.status {
                Some(status) => Ok(ActionOutcome {
                    status,
                    guid: envelope.guid,
                    payload: json!({"status": status.to_string()}),
                }),
                None => Err(anyhow::anyhow!("catalog exploded")),
            }
        }
    }

    fn body(event_name: &str) -> String {
        json!({
            "id": "5c3ab1f5-1b8e-4a7c-9a53-2d1f0e6f4b11",
            "guid": ORDER_GUID,
            "event_name": event_name,
            "actor": "choreographer",
            "data": {"id": "order-1"}
        })
        .to_string()
    }

    fn worker(action: Arc<StubAction>, retry: bool) -> (EventDispatchWorker, Arc<RecordingPublisher>) {
        let publisher = Arc::new(RecordingPublisher::default());
        let mut table = DispatchTable::new();
        table.register(
            ORDER_WORKFLOW_ACCEPT,
            DispatchEntry::new("import_order", action, retry),
        );
        (EventDispatchWorker::new(table, publisher.clone()), publisher)
    }

    #[tokio::test]
    async fn test_unknown_event_is_acknowledged() {
        let action = StubAction::returning(ImportStatus::Success);
        let (worker, publisher) = worker(action.clone(), true);

        assert!(worker.process_message(&body("order.workflow.reject")).await.unwrap());
        assert_eq!(action.calls(), 0);
        assert!(publisher.events().is_empty());
    }

    #[tokio::test]
    async fn test_invalid_envelope_is_dropped() {
        let action = StubAction::returning(ImportStatus::Success);
        let (worker, publisher) = worker(action.clone(), true);

        assert!(worker.process_message("{\"id\": 1}").await.unwrap());
        assert!(worker.process_message(&body("Order-Accept")).await.unwrap());
        assert_eq!(action.calls(), 0);
        assert!(publisher.events().is_empty());
    }

    #[tokio::test]
    async fn test_success_publishes_and_acknowledges() {
        let action = StubAction::returning(ImportStatus::Success);
        let (worker, publisher) = worker(action.clone(), true);

        assert!(worker.process_message(&body(ORDER_WORKFLOW_ACCEPT)).await.unwrap());

        let events = publisher.events();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event_name, IMPORT_ASSETS_SUCCESS);
        assert_eq!(events[0].guid, Uuid::parse_str(ORDER_GUID).unwrap());
        assert_eq!(events[0].actor.as_deref(), Some("choreographer"));
        assert_eq!(events[0].data["status"], "success");
    }

    #[tokio::test]
    async fn test_failure_with_retry_is_not_acknowledged() {
        let (worker, publisher) = worker(StubAction::returning(ImportStatus::Failure), true);

        assert!(!worker.process_message(&body(ORDER_WORKFLOW_ACCEPT)).await.unwrap());
        assert_eq!(publisher.events()[0].event_name, IMPORT_ASSETS_FAILURE);
    }

    #[tokio::test]
    async fn test_failure_without_retry_is_acknowledged() {
        let (worker, publisher) = worker(StubAction::returning(ImportStatus::Failure), false);

        assert!(worker.process_message(&body(ORDER_WORKFLOW_ACCEPT)).await.unwrap());
        assert_eq!(publisher.events()[0].event_name, IMPORT_ASSETS_FAILURE);
    }

    #[tokio::test]
    async fn test_action_error_propagates() {
        let (worker, publisher) = worker(StubAction::failing(), false);

        let err = worker
            .process_message(&body(ORDER_WORKFLOW_ACCEPT))
            .await
            .unwrap_err();
        assert!(format!("{:#}", err).contains("catalog exploded"));
        assert!(publisher.events().is_empty());
    }

    #[tokio::test]
    async fn test_queue_worker_deletes_only_acknowledged() {
        let queue = Arc::new(MemoryQueue::default());
        queue.push(&body(ORDER_WORKFLOW_ACCEPT));
        queue.push(&body("order.workflow.reject"));
        let (dispatcher, _publisher) = worker(StubAction::returning(ImportStatus::Failure), true);
        let worker = QueueWorker::new(queue.clone(), dispatcher, QueueWorkerConfig::default());

        let (shutdown_tx, shutdown_rx) = mpsc::channel(1);
        queue.on_drained(shutdown_tx);
        worker.run(shutdown_rx).await.unwrap();

        assert_eq!(queue.deleted(), vec!["receipt-2".to_string()]);
    }

    #[tokio::test]
    async fn test_queue_worker_stops_on_action_error() {
        let queue = Arc::new(MemoryQueue::default());
        queue.push(&body(ORDER_WORKFLOW_ACCEPT));
        let (dispatcher, _publisher) = worker(StubAction::failing(), true);
        let worker = QueueWorker::new(queue.clone(), dispatcher, QueueWorkerConfig::default());

        let (_shutdown_tx, shutdown_rx) = mpsc::channel(1);
        assert!(worker.run(shutdown_rx).await.is_err());
        assert!(queue.deleted().is_empty());
    }
}
