//! Reflex Infrastructure Library
//!
//! Cross-cutting infrastructure: tracing initialisation and the token-bucket
//! limiter that throttles calls against the source file host.

#[cfg(feature = "rate-limit")]
pub mod rate_limit;
pub mod telemetry;

#[cfg(feature = "rate-limit")]
pub use rate_limit::RateLimiter;
pub use telemetry::{init_telemetry, shutdown_telemetry};
