use reflex_core::Recoverable;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Request to {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{method} {url} returned {status}: {body}")]
    Status {
        method: String,
        url: String,
        status: u16,
        body: String,
    },

    #[error("Failed to decode response from {url}: {message}")]
    Decode { url: String, message: String },

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid share URL: {0}")]
    InvalidShareUrl(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Client configuration error: {0}")]
    Config(String),
}

/// Result type for client operations
pub type ApiResult<T> = Result<T, ApiError>;

impl ApiError {
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

impl Recoverable for ApiError {
    /// Throttling, server errors, timeouts and broken connections are worth
    /// another attempt; anything about the request itself is not.
    fn is_recoverable(&self) -> bool {
        match self {
            ApiError::Transport { source, .. } => !source.is_builder(),
            ApiError::Status { status, body, .. } => {
                *status == 408 || *status == 429 || *status >= 500 || is_quota_denial(*status, body)
            }
            ApiError::Io(_) => true,
            ApiError::Decode { .. }
            | ApiError::NotFound(_)
            | ApiError::InvalidShareUrl(_)
            | ApiError::Config(_) => false,
        }
    }
}

/// Drive reports rate and quota limits as 403 with a usage-limit reason
fn is_quota_denial(status: u16, body: &str) -> bool {
    status == 403 && QUOTA_REASONS.iter().any(|reason| body.contains(reason))
}

const QUOTA_REASONS: [&str; 3] = ["rateLimitExceeded", "userRateLimitExceeded", "usageLimits"];
