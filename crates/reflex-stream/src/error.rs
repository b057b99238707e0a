use reflex_core::Recoverable;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StreamError {
    #[error("{operation} failed: {message}")]
    Service {
        operation: &'static str,
        message: String,
        retryable: bool,
    },

    #[error("Shard iterator expired for {0}")]
    ExpiredIterator(String),

    #[error("Shard {shard_id} iterator expired {attempts} times in a row")]
    IteratorReissueLimit { shard_id: String, attempts: u32 },

    #[error("Stream returned no iterator for shard {0}")]
    MissingIterator(String),

    #[error("Failed to encode record: {0}")]
    Encode(#[source] serde_json::Error),

    #[error("Checkpoint error: {0}")]
    Checkpoint(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for stream operations
pub type StreamResult<T> = Result<T, StreamError>;

impl Recoverable for StreamError {
    fn is_recoverable(&self) -> bool {
        match self {
            StreamError::Service { retryable, .. } => *retryable,
            StreamError::ExpiredIterator(_) | StreamError::Io(_) => true,
            StreamError::IteratorReissueLimit { .. }
            | StreamError::MissingIterator(_)
            | StreamError::Encode(_)
            | StreamError::Checkpoint(_) => false,
        }
    }
}
