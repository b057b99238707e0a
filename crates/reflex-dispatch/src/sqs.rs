//! AWS SQS inbound queue and notification publisher.

use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_sdk_sqs::error::{DisplayErrorContext, SdkError};
use aws_sdk_sqs::Client;
use tracing::debug;

use reflex_core::models::MessageEnvelope;

use crate::error::{QueueError, QueueResult};
use crate::queue::{EventPublisher, MessageQueue, QueueMessage};

/// SDK client for `region`
pub async fn sqs_client(region: &str) -> Client {
    let config = aws_config::defaults(BehaviorVersion::latest())
        .region(aws_config::Region::new(region.to_string()))
        .load()
        .await;
    Client::new(&config)
}

fn service_error<E, R>(operation: &'static str, err: SdkError<E, R>) -> QueueError
where
    E: std::error::Error + 'static,
    R: std::fmt::Debug,
{
    let retryable = matches!(
        err,
        SdkError::TimeoutError(_) | SdkError::DispatchFailure(_) | SdkError::ResponseError(_)
    );
    QueueError::Service {
        operation,
        message: DisplayErrorContext(&err).to_string(),
        retryable,
    }
}

pub struct SqsQueue {
    client: Client,
    queue_url: String,
}

impl SqsQueue {
    pub fn new(client: Client, queue_url: impl Into<String>) -> Self {
        Self {
            client,
            queue_url: queue_url.into(),
        }
    }
}

#[async_trait]
impl MessageQueue for SqsQueue {
    async fn receive(&self, max_messages: i32, wait_time_secs: i32) -> QueueResult<Vec<QueueMessage>> {
        let output = self
            .client
            .receive_message()
            .queue_url(&self.queue_url)
            .max_number_of_messages(max_messages)
            .wait_time_seconds(wait_time_secs)
            .send()
            .await
            .map_err(|e| service_error("receive_message", e))?;

        // Messages without a receipt handle could never be deleted
        let messages: Vec<QueueMessage> = output
            .messages()
            .iter()
            .filter_map(|message| {
                Some(QueueMessage {
                    message_id: message.message_id().unwrap_or_default().to_string(),
                    receipt_handle: message.receipt_handle()?.to_string(),
                    body: message.body().unwrap_or_default().to_string(),
                })
            })
            .collect();
        debug!(queue_url = %self.queue_url, messages = messages.len(), "Received messages");
        Ok(messages)
    }

    async fn delete(&self, receipt_handle: &str) -> QueueResult<()> {
        self.client
            .delete_message()
            .queue_url(&self.queue_url)
            .receipt_handle(receipt_handle)
            .send()
            .await
            .map_err(|e| service_error("delete_message", e))?;
        Ok(())
    }
}

/// Sends notifications as JSON envelopes to the events queue
pub struct SqsEventPublisher {
    client: Client,
    queue_url: String,
}

impl SqsEventPublisher {
    pub fn new(client: Client, queue_url: impl Into<String>) -> Self {
        Self {
            client,
            queue_url: queue_url.into(),
        }
    }
}

#[async_trait]
impl EventPublisher for SqsEventPublisher {
    async fn publish(&self, event: &MessageEnvelope) -> QueueResult<()> {
        let body = serde_json::to_string(event)?;
        let output = self
            .client
            .send_message()
            .queue_url(&self.queue_url)
            .message_body(body)
            .send()
            .await
            .map_err(|e| service_error("send_message", e))?;
        debug!(
            event_name = %event.event_name,
            guid = %event.guid,
            message_id = output.message_id().unwrap_or_default(),
            "Notification published"
        );
        Ok(())
    }
}
