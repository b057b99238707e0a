//! Queue and notification contracts.

use async_trait::async_trait;

use reflex_core::models::MessageEnvelope;

use crate::error::QueueResult;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueMessage {
    pub message_id: String,
    /// Handle needed to delete the message once acknowledged
    pub receipt_handle: String,
    pub body: String,
}

/// At-least-once inbound queue
#[async_trait]
pub trait MessageQueue: Send + Sync {
    /// Long-poll for up to `max_messages`
    async fn receive(&self, max_messages: i32, wait_time_secs: i32) -> QueueResult<Vec<QueueMessage>>;

    async fn delete(&self, receipt_handle: &str) -> QueueResult<()>;
}

/// Outbound notification sink
#[async_trait]
pub trait EventPublisher: Send + Sync {
    async fn publish(&self, event: &MessageEnvelope) -> QueueResult<()>;
}
