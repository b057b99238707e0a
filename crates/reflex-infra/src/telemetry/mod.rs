//! Tracing initialisation
//!
//! Structured logs go to stdout, as text for terminals or JSON for log shippers.

mod init_basic;

pub use init_basic::{init_telemetry, shutdown_telemetry};
