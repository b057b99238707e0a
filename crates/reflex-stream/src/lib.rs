//! Reflex Stream
//!
//! Delivery folder snapshots flow through a change-stream: the producer appends one
//! `{order, contents}` record per order, the consumer replays them shard by shard
//! into a reconciliation callback such as [`InventoryAudit`]. Consumer positions are
//! owned by the consumer and persisted through a [`CheckpointStore`].

pub mod audit;
pub mod checkpoint;
pub mod consumer;
pub mod cursor;
pub mod error;
#[cfg(feature = "kinesis")]
pub mod kinesis;
pub mod producer;
pub mod record;
pub mod source;

#[cfg(test)]
mod testing;

pub use audit::{AuditSummary, InventoryAudit, OrderInventory};
pub use checkpoint::{CheckpointStore, FileCheckpointStore, MemoryCheckpointStore};
pub use consumer::{ConsumerStats, ContentsHandler, StreamConsumer};
pub use cursor::CursorState;
pub use error::{StreamError, StreamResult};
#[cfg(feature = "kinesis")]
pub use kinesis::KinesisStream;
pub use producer::ContentsProducer;
pub use record::ContentsRecord;
pub use source::{ChangeStream, IteratorPosition, RecordBatch, ShardInfo, StreamRecord};
