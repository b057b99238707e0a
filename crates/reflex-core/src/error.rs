//! Boundary parsing errors
//!
//! External payloads (orders, catalog records, file listings, stream records) are
//! parsed strictly into typed models at the edge. Any mismatch surfaces here and is
//! never retryable: the same bytes will fail the same way on the next attempt.

use crate::task_error::Recoverable;

#[derive(Debug, thiserror::Error)]
pub enum ModelError {
    #[error("Invalid {entity} payload: {source}")]
    InvalidPayload {
        entity: &'static str,
        #[source]
        source: serde_json::Error,
    },

    #[error("Missing field {field} in {entity}")]
    MissingField {
        entity: &'static str,
        field: &'static str,
    },

    #[error("Invalid value for {field}: {message}")]
    InvalidValue {
        field: &'static str,
        message: String,
    },
}

impl ModelError {
    pub fn invalid_payload(entity: &'static str, source: serde_json::Error) -> Self {
        ModelError::InvalidPayload { entity, source }
    }
}

impl Recoverable for ModelError {
    fn is_recoverable(&self) -> bool {
        false
    }
}
