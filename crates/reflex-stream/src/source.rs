//! Change-stream contract.
//!
//! The consumer only needs shard discovery, iterators and batched reads; the
//! producer only needs appends. Both sit behind [`ChangeStream`] so the consumer
//! can be driven by an in-memory stream in tests.

use async_trait::async_trait;

use crate::error::StreamResult;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShardInfo {
    pub shard_id: String,
}

/// Where a fresh shard iterator starts
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IteratorPosition {
    /// Oldest record still retained by the shard
    TrimHorizon,
    /// The record carrying this sequence number
    AtSequence(String),
    /// The record following this sequence number
    AfterSequence(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamRecord {
    pub sequence_number: String,
    pub partition_key: String,
    pub data: Vec<u8>,
}

/// One `get_records` answer
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecordBatch {
    pub records: Vec<StreamRecord>,
    /// `None` once the shard is closed and fully read
    pub next_iterator: Option<String>,
}

#[async_trait]
pub trait ChangeStream: Send + Sync {
    async fn list_shards(&self) -> StreamResult<Vec<ShardInfo>>;

    async fn shard_iterator(&self, shard_id: &str, position: &IteratorPosition) -> StreamResult<String>;

    async fn get_records(&self, iterator: &str) -> StreamResult<RecordBatch>;

    /// Append one record; returns its sequence number
    async fn put_record(&self, data: Vec<u8>, partition_key: &str) -> StreamResult<String>;
}
