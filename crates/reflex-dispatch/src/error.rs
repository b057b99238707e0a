use reflex_core::Recoverable;
use thiserror::Error;

/// Inbound message that cannot be dispatched
#[derive(Debug, Error)]
pub enum EnvelopeError {
    #[error("Malformed envelope: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("Invalid event name: {0:?}")]
    InvalidEventName(String),
}

impl Recoverable for EnvelopeError {
    fn is_recoverable(&self) -> bool {
        false
    }
}

#[derive(Debug, Error)]
pub enum QueueError {
    #[error("{operation} failed: {message}")]
    Service {
        operation: &'static str,
        message: String,
        retryable: bool,
    },

    #[error("Failed to encode message: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Result type for queue operations
pub type QueueResult<T> = Result<T, QueueError>;

impl Recoverable for QueueError {
    fn is_recoverable(&self) -> bool {
        match self {
            QueueError::Service { retryable, .. } => *retryable,
            QueueError::Encode(_) => false,
        }
    }
}
