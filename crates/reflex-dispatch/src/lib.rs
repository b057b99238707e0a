//! Reflex Dispatch
//!
//! Turns inbound business events into order imports. The [`QueueWorker`] long-polls
//! the inbound queue, the [`EventDispatchWorker`] validates each envelope, looks its
//! event up in the [`DispatchTable`], runs the mapped action and publishes the
//! success or failure notification. The returned flag decides whether the message
//! is deleted or left for redelivery.

pub mod action;
pub mod envelope;
pub mod error;
pub mod queue;
#[cfg(feature = "sqs")]
pub mod sqs;
pub mod table;
pub mod wiring;
pub mod worker;

#[cfg(test)]
mod testing;

pub use action::ImportOrderAction;
pub use envelope::{decode_envelope, notification};
pub use error::{EnvelopeError, QueueError, QueueResult};
pub use queue::{EventPublisher, MessageQueue, QueueMessage};
#[cfg(feature = "sqs")]
pub use sqs::{SqsEventPublisher, SqsQueue};
pub use table::{ActionOutcome, DispatchAction, DispatchEntry, DispatchTable, NotificationEntry};
pub use wiring::PipelineContext;
pub use worker::{EventDispatchWorker, QueueWorker, QueueWorkerConfig};
