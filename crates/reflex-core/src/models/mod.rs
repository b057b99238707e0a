//! Data models for the pipeline
//!
//! Typed records for everything that crosses a process boundary: orders read from
//! the order service, catalog collections and assets, source file listings, inbound
//! envelopes and the import reports sent back out.

mod catalog;
mod drive;
mod envelope;
mod lane;
mod order;
mod report;
mod transfer;

pub use catalog::*;
pub use drive::*;
pub use envelope::*;
pub use lane::*;
pub use order::*;
pub use report::*;
pub use transfer::*;
