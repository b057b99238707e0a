//! Step execution error types
//!
//! Every pipeline step returns `Result<T, TaskError>`. The job runner retries a
//! step only while its error is recoverable; an unrecoverable error (or a
//! recoverable one that exhausted the retry ceiling) fails the enclosing chain.

use std::fmt;

/// Layer errors that know whether retrying can help.
///
/// Implemented by the storage, HTTP client and stream error enums so that the
/// classification lives next to the error definition rather than at each call site.
pub trait Recoverable {
    fn is_recoverable(&self) -> bool;
}

/// Step execution error that can be either recoverable or unrecoverable
#[derive(Debug)]
pub struct TaskError {
    inner: anyhow::Error,
    recoverable: bool,
}

impl TaskError {
    /// Create a new unrecoverable step error
    ///
    /// Unrecoverable errors fail the chain immediately. Use this for:
    /// - malformed payloads and invalid references
    /// - client errors (4xx other than absence)
    /// - misconfiguration
    pub fn unrecoverable(err: impl Into<anyhow::Error>) -> Self {
        Self {
            inner: err.into(),
            recoverable: false,
        }
    }

    /// Create a new recoverable step error
    ///
    /// Recoverable errors are retried with exponential backoff up to the
    /// configured ceiling. Use this for connection resets, throttling and 5xx.
    pub fn recoverable(err: impl Into<anyhow::Error>) -> Self {
        Self {
            inner: err.into(),
            recoverable: true,
        }
    }

    /// Wrap a layer error, keeping the classification it reports
    pub fn classify<E>(err: E) -> Self
    where
        E: Recoverable + std::error::Error + Send + Sync + 'static,
    {
        let recoverable = err.is_recoverable();
        Self {
            inner: err.into(),
            recoverable,
        }
    }

    /// Check if this error is recoverable (should be retried)
    pub fn is_recoverable(&self) -> bool {
        self.recoverable
    }

    /// Downgrade to unrecoverable, used once the retry ceiling is reached
    pub fn into_unrecoverable(self) -> Self {
        Self {
            inner: self.inner,
            recoverable: false,
        }
    }

    /// Get the inner error
    pub fn inner(&self) -> &anyhow::Error {
        &self.inner
    }

    /// Consume self and return the inner error
    pub fn into_inner(self) -> anyhow::Error {
        self.inner
    }
}

impl fmt::Display for TaskError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#}", self.inner)
    }
}

impl std::error::Error for TaskError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.inner.source()
    }
}

impl From<anyhow::Error> for TaskError {
    /// Untyped failures (I/O hiccups surfaced through `?`) default to recoverable
    fn from(err: anyhow::Error) -> Self {
        Self::recoverable(err)
    }
}

impl From<std::io::Error> for TaskError {
    fn from(err: std::io::Error) -> Self {
        Self::recoverable(err)
    }
}

/// Extension trait for Result to mark errors as unrecoverable or classified
pub trait TaskResultExt<T> {
    /// Mark this result as unrecoverable on error
    fn unrecoverable(self) -> Result<T, TaskError>;
}

impl<T, E: Into<anyhow::Error>> TaskResultExt<T> for Result<T, E> {
    fn unrecoverable(self) -> Result<T, TaskError> {
        self.map_err(|e| TaskError::unrecoverable(e.into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, thiserror::Error)]
    #[error("throttled: {0}")]
    struct Throttled(bool);

    impl Recoverable for Throttled {
        fn is_recoverable(&self) -> bool {
            self.0
        }
    }

    #[test]
    fn test_unrecoverable_error() {
        let err = TaskError::unrecoverable(anyhow::anyhow!("Malformed order payload"));
        assert!(!err.is_recoverable());
        assert!(err.to_string().contains("Malformed order payload"));
    }

    #[test]
    fn test_recoverable_error() {
        let err = TaskError::recoverable(anyhow::anyhow!("Connection reset"));
        assert!(err.is_recoverable());
        assert!(err.to_string().contains("Connection reset"));
    }

    #[test]
    fn test_from_anyhow() {
        let err: TaskError = anyhow::anyhow!("Some error").into();
        assert!(err.is_recoverable(), "Default should be recoverable");
    }

    #[test]
    fn test_classify_keeps_layer_decision() {
        assert!(TaskError::classify(Throttled(true)).is_recoverable());
        assert!(!TaskError::classify(Throttled(false)).is_recoverable());
    }

    #[test]
    fn test_into_unrecoverable() {
        let err = TaskError::recoverable(anyhow::anyhow!("flaky")).into_unrecoverable();
        assert!(!err.is_recoverable());
    }

    #[test]
    fn test_result_ext() {
        let result: Result<(), anyhow::Error> = Err(anyhow::anyhow!("Config error"));
        let task_result = result.unrecoverable();
        assert!(task_result.is_err());
        assert!(!task_result.unwrap_err().is_recoverable());
    }
}
