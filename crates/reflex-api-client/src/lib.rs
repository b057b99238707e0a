//! HTTP clients for the external systems the pipeline talks to.
//!
//! Each system is reached through a narrow trait so components can be handed an
//! in-memory implementation in tests:
//!
//! - [`CatalogApi`]: get / query / post / put against the catalog REST service
//! - [`SourceDrive`]: folder listing and streamed downloads from Google Drive
//! - [`OrderSource`]: order lookup by id

pub mod catalog;
pub mod client;
pub mod drive;
pub mod error;
pub mod orders;

pub use catalog::{CatalogApi, RestCatalogClient};
pub use client::{ApiClient, Auth};
pub use drive::{folder_id_from_url, GoogleDriveClient, SourceDrive};
pub use error::{ApiError, ApiResult};
pub use orders::{OrderSource, RestOrderClient};
