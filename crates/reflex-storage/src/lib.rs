//! Reflex Storage Library
//!
//! Destination storage for transferred assets. The `Storage` trait is implemented
//! by an S3 backend (through `object_store`) and a local filesystem backend used
//! for development and tests.
//!
//! # Storage key format
//!
//! Every asset lands at `{assets_prefix}/{file_name}` where the file name is
//! `{asset_id}.{ext}`. Keys are deterministic, so re-uploading an asset overwrites
//! the same object. Keys must not contain `..` or a leading `/`.

pub mod factory;
pub mod keys;
#[cfg(feature = "storage-local")]
pub mod local;
#[cfg(feature = "storage-s3")]
pub mod s3;
pub mod traits;

// Re-export commonly used types
pub use factory::create_storage;
pub use keys::destination_key;
#[cfg(feature = "storage-local")]
pub use local::LocalStorage;
pub use reflex_core::StorageBackend;
#[cfg(feature = "storage-s3")]
pub use s3::S3Storage;
pub use traits::{Storage, StorageError, StorageResult};
