//! Reflex Core Library
//!
//! Domain models, error types and configuration shared by every component of the
//! asset synchronization pipeline: the catalog upsert engine, the transfer pipeline,
//! the dispatch worker and the stream auditor.

pub mod config;
pub mod constants;
pub mod error;
pub mod models;
pub mod slug;
pub mod storage_types;
pub mod task_error;

// Re-export commonly used types
pub use config::{Config, LaneSettings, ReflexConfig};
pub use error::ModelError;
pub use storage_types::StorageBackend;
pub use task_error::{Recoverable, TaskError, TaskResultExt};
