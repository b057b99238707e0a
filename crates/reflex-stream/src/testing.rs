//! In-memory change-stream used by the consumer and producer tests.

use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::error::{StreamError, StreamResult};
use crate::source::{ChangeStream, IteratorPosition, RecordBatch, ShardInfo, StreamRecord};

#[derive(Default)]
struct State {
    shards: Vec<(String, Vec<StreamRecord>)>,
    next_sequence: u64,
    positions: Vec<(String, IteratorPosition)>,
    expired: HashSet<String>,
    stale_shards: HashSet<String>,
    get_records_calls: usize,
}

/// Shards hold records in append order; iterators are `{shard}:{index}`
pub struct MemoryStream {
    state: Mutex<State>,
    batch_size: usize,
}

impl MemoryStream {
    pub fn new(shards: &[&str], batch_size: usize) -> Self {
        let state = State {
            shards: shards
                .iter()
                .map(|id| (id.to_string(), Vec::new()))
                .collect(),
            next_sequence: 1,
            ..State::default()
        };
        Self {
            state: Mutex::new(state),
            batch_size,
        }
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn append(&self, shard_id: &str, partition_key: &str, data: Vec<u8>) -> String {
        let mut state = self.state();
        let sequence_number = format!("{:056}", state.next_sequence);
        state.next_sequence += 1;
        if let Some((_, records)) = state.shards.iter_mut().find(|(id, _)| id == shard_id) {
            records.push(StreamRecord {
                sequence_number: sequence_number.clone(),
                partition_key: partition_key.to_string(),
                data,
            });
        }
        sequence_number
    }

    /// Make `get_records` reject this iterator once
    pub fn expire(&self, iterator: &str) {
        self.state().expired.insert(iterator.to_string());
    }

    /// Make `get_records` reject every iterator of `shard_id`
    pub fn expire_shard(&self, shard_id: &str) {
        self.state().stale_shards.insert(shard_id.to_string());
    }

    pub fn requested_positions(&self) -> Vec<(String, IteratorPosition)> {
        self.state().positions.clone()
    }

    pub fn get_records_calls(&self) -> usize {
        self.state().get_records_calls
    }

    pub fn records(&self, shard_id: &str) -> Vec<StreamRecord> {
        self.state()
            .shards
            .iter()
            .find(|(id, _)| id == shard_id)
            .map(|(_, records)| records.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl ChangeStream for MemoryStream {
    async fn list_shards(&self) -> StreamResult<Vec<ShardInfo>> {
        Ok(self
            .state()
            .shards
            .iter()
            .map(|(id, _)| ShardInfo {
                shard_id: id.clone(),
            })
            .collect())
    }

    async fn shard_iterator(&self, shard_id: &str, position: &IteratorPosition) -> StreamResult<String> {
        let mut state = self.state();
        state
            .positions
            .push((shard_id.to_string(), position.clone()));
        let records = state
            .shards
            .iter()
            .find(|(id, _)| id == shard_id)
            .map(|(_, records)| records)
            .ok_or_else(|| StreamError::MissingIterator(shard_id.to_string()))?;
        let index_of = |sequence: &str| records.iter().position(|r| r.sequence_number == sequence);
        let index = match position {
            IteratorPosition::TrimHorizon => 0,
            IteratorPosition::AtSequence(sequence) => index_of(sequence).unwrap_or(records.len()),
            IteratorPosition::AfterSequence(sequence) => {
                index_of(sequence).map(|i| i + 1).unwrap_or(records.len())
            }
        };
        Ok(format!("{}:{}", shard_id, index))
    }

    async fn get_records(&self, iterator: &str) -> StreamResult<RecordBatch> {
        let mut state = self.state();
        state.get_records_calls += 1;
        let stale = iterator
            .rsplit_once(':')
            .is_some_and(|(shard, _)| state.stale_shards.contains(shard));
        if state.expired.remove(iterator) || stale {
            return Err(StreamError::ExpiredIterator(iterator.to_string()));
        }
        let (shard_id, index) = iterator
            .rsplit_once(':')
            .and_then(|(shard, index)| index.parse::<usize>().ok().map(|i| (shard, i)))
            .ok_or_else(|| StreamError::MissingIterator(iterator.to_string()))?;
        let records = state
            .shards
            .iter()
            .find(|(id, _)| id == shard_id)
            .map(|(_, records)| records)
            .ok_or_else(|| StreamError::MissingIterator(shard_id.to_string()))?;

        let end = (index + self.batch_size).min(records.len());
        let batch = records.get(index..end).map(<[StreamRecord]>::to_vec).unwrap_or_default();
        Ok(RecordBatch {
            next_iterator: Some(format!("{}:{}", shard_id, index + batch.len())),
            records: batch,
        })
    }

    async fn put_record(&self, data: Vec<u8>, partition_key: &str) -> StreamResult<String> {
        let shard_id = {
            let state = self.state();
            let index = partition_key.bytes().map(usize::from).sum::<usize>() % state.shards.len().max(1);
            state
                .shards
                .get(index)
                .map(|(id, _)| id.clone())
                .ok_or_else(|| StreamError::MissingIterator(partition_key.to_string()))?
        };
        Ok(self.append(&shard_id, partition_key, data))
    }
}
