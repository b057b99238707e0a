//! In-memory queue and publisher for the dispatch tests.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};
use tokio::sync::mpsc;

use reflex_core::models::MessageEnvelope;

use crate::error::QueueResult;
use crate::queue::{EventPublisher, MessageQueue, QueueMessage};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[derive(Default)]
struct QueueState {
    pending: VecDeque<QueueMessage>,
    deleted: Vec<String>,
    pushed: usize,
    drained: Option<mpsc::Sender<()>>,
}

/// Received messages become invisible; once empty the drain signal fires and
/// `receive` blocks
#[derive(Default)]
pub struct MemoryQueue {
    state: Mutex<QueueState>,
}

impl MemoryQueue {
    pub fn push(&self, body: &str) {
        let mut state = lock(&self.state);
        state.pushed += 1;
        let n = state.pushed;
        state.pending.push_back(QueueMessage {
            message_id: format!("message-{}", n),
            receipt_handle: format!("receipt-{}", n),
            body: body.to_string(),
        });
    }

    pub fn on_drained(&self, signal: mpsc::Sender<()>) {
        lock(&self.state).drained = Some(signal);
    }

    pub fn deleted(&self) -> Vec<String> {
        lock(&self.state).deleted.clone()
    }
}

#[async_trait]
impl MessageQueue for MemoryQueue {
    async fn receive(&self, max_messages: i32, _wait_time_secs: i32) -> QueueResult<Vec<QueueMessage>> {
        let drained = {
            let mut state = lock(&self.state);
            let take = usize::try_from(max_messages).unwrap_or(1).min(state.pending.len());
            if take > 0 {
                return Ok(state.pending.drain(..take).collect());
            }
            state.drained.take()
        };
        if let Some(signal) = drained {
            let _ = signal.send(()).await;
        }
        std::future::pending().await
    }

    async fn delete(&self, receipt_handle: &str) -> QueueResult<()> {
        lock(&self.state).deleted.push(receipt_handle.to_string());
        Ok(())
    }
}

#[derive(Default)]
pub struct RecordingPublisher {
    events: Mutex<Vec<MessageEnvelope>>,
}

impl RecordingPublisher {
    pub fn events(&self) -> Vec<MessageEnvelope> {
        lock(&self.events).clone()
    }
}

#[async_trait]
impl EventPublisher for RecordingPublisher {
    async fn publish(&self, event: &MessageEnvelope) -> QueueResult<()> {
        lock(&self.events).push(event.clone());
        Ok(())
    }
}
