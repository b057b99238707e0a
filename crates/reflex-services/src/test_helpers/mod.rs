//! Test helpers for service tests
//!
//! In-memory stand-ins for the catalog, the source drive and destination storage,
//! plus fixtures for orders and file listings. No network or bucket is needed.

pub mod fixtures;
pub mod mock_catalog;
pub mod mock_drive;
pub mod mock_storage;

pub use fixtures::*;
pub use mock_catalog::MockCatalog;
pub use mock_drive::MockDrive;
pub use mock_storage::MockStorage;
