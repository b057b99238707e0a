//! Reflex Services
//!
//! The components of one order import, leaves first:
//!
//! - [`FolderEnumerator`]: lists a source folder and flattens allow-listed sub-folders
//! - [`CatalogUpsert`]: idempotent collection and asset records in the catalog
//! - [`TransferPipeline`]: source download and destination upload of one asset
//! - [`OrderImporter`]: composes the three into chains run by the job runner

pub mod catalog;
pub mod folders;
pub mod import;
pub mod transfer;

#[cfg(any(test, feature = "test-helpers"))]
pub mod test_helpers;

pub use catalog::{CatalogUpsert, OrderCollections};
pub use folders::FolderEnumerator;
pub use import::OrderImporter;
pub use transfer::TransferPipeline;
