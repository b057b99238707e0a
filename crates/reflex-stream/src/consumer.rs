//! Checkpointed change-stream consumer.
//!
//! Replays every shard from its last checkpoint, hands each decoded record to a
//! [`ContentsHandler`] and persists the advanced sequence numbers after every
//! batch. A run drains the stream: a shard that answers with an empty batch is
//! done for the run and is not polled again.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, instrument, warn};

use crate::checkpoint::CheckpointStore;
use crate::cursor::CursorState;
use crate::error::{StreamError, StreamResult};
use crate::record::ContentsRecord;
use crate::source::ChangeStream;

/// Consecutive expired iterators tolerated per shard before the run fails
pub const MAX_ITERATOR_REISSUES: u32 = 3;

/// Reconciliation callback invoked once per decoded record
pub trait ContentsHandler {
    fn handle(&mut self, record: &ContentsRecord);
}

impl<F> ContentsHandler for F
where
    F: FnMut(&ContentsRecord),
{
    fn handle(&mut self, record: &ContentsRecord) {
        self(record)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConsumerStats {
    pub shards: usize,
    pub batches: usize,
    pub records: usize,
    /// Records that did not decode; skipped and checkpointed past
    pub malformed: usize,
}

pub struct StreamConsumer {
    stream: Arc<dyn ChangeStream>,
    checkpoints: Arc<dyn CheckpointStore>,
    iterator_ttl: Duration,
    cursors: CursorState,
    reissues: HashMap<String, u32>,
}

impl StreamConsumer {
    pub fn new(
        stream: Arc<dyn ChangeStream>,
        checkpoints: Arc<dyn CheckpointStore>,
        iterator_ttl: Duration,
    ) -> Self {
        Self {
            stream,
            checkpoints,
            iterator_ttl,
            cursors: CursorState::new(),
            reissues: HashMap::new(),
        }
    }

    pub fn cursors(&self) -> &CursorState {
        &self.cursors
    }

    /// Drain every shard once
    #[instrument(skip_all)]
    pub async fn run<H>(&mut self, handler: &mut H) -> StreamResult<ConsumerStats>
    where
        H: ContentsHandler + ?Sized,
    {
        self.cursors = CursorState::from_checkpoints(self.checkpoints.load().await?);
        self.reissues.clear();

        let mut active: Vec<String> = self
            .stream
            .list_shards()
            .await?
            .into_iter()
            .map(|shard| shard.shard_id)
            .collect();
        let mut stats = ConsumerStats {
            shards: active.len(),
            ..ConsumerStats::default()
        };
        info!(shards = active.len(), "Starting stream consumer");

        while !active.is_empty() {
            let mut exhausted = HashSet::new();
            for shard_id in &active {
                if self.process_shard(shard_id, handler, &mut stats).await? {
                    exhausted.insert(shard_id.clone());
                }
            }
            active.retain(|shard_id| !exhausted.contains(shard_id));
        }

        info!(
            records = stats.records,
            malformed = stats.malformed,
            batches = stats.batches,
            "Stream drained"
        );
        Ok(stats)
    }

    /// Iterator for `shard_id`: the cached one while fresh, otherwise a new one
    /// positioned after the last processed record
    async fn iterator_for(&mut self, shard_id: &str) -> StreamResult<String> {
        if let Some(iterator) = self.cursors.valid_iterator(shard_id, self.iterator_ttl) {
            return Ok(iterator.to_string());
        }
        let position = self.cursors.resume_position(shard_id);
        let iterator = self.stream.shard_iterator(shard_id, &position).await?;
        debug!(shard_id = %shard_id, position = ?position, "Issued shard iterator");
        self.cursors.set_iterator(shard_id, Some(iterator.clone()));
        Ok(iterator)
    }

    /// Read one batch; returns true when the shard is done for this run
    async fn process_shard<H>(
        &mut self,
        shard_id: &str,
        handler: &mut H,
        stats: &mut ConsumerStats,
    ) -> StreamResult<bool>
    where
        H: ContentsHandler + ?Sized,
    {
        let iterator = self.iterator_for(shard_id).await?;
        let batch = match self.stream.get_records(&iterator).await {
            Ok(batch) => batch,
            Err(StreamError::ExpiredIterator(_)) => {
                let attempts = self.reissues.entry(shard_id.to_string()).or_insert(0);
                *attempts += 1;
                if *attempts > MAX_ITERATOR_REISSUES {
                    return Err(StreamError::IteratorReissueLimit {
                        shard_id: shard_id.to_string(),
                        attempts: *attempts,
                    });
                }
                warn!(
                    shard_id = %shard_id,
                    attempt = *attempts,
                    "Shard iterator expired, requesting a new one"
                );
                self.cursors.invalidate_iterator(shard_id);
                return Ok(false);
            }
            Err(e) => return Err(e),
        };
        self.reissues.remove(shard_id);
        stats.batches += 1;

        if batch.records.is_empty() {
            info!(shard_id = %shard_id, "Nothing to process for shard");
            self.cursors.replace_iterator(shard_id, batch.next_iterator);
            return Ok(true);
        }

        let mut advanced = false;
        for record in &batch.records {
            match ContentsRecord::decode(&record.data) {
                Ok(contents) => {
                    handler.handle(&contents);
                    stats.records += 1;
                }
                Err(e) => {
                    warn!(
                        shard_id = %shard_id,
                        sequence_number = %record.sequence_number,
                        error = %e,
                        "Skipping malformed record"
                    );
                    stats.malformed += 1;
                }
            }
            advanced |= self.cursors.advance(shard_id, &record.sequence_number);
        }

        let closed = batch.next_iterator.is_none();
        self.cursors.replace_iterator(shard_id, batch.next_iterator);
        if advanced {
            self.checkpoints.save(&self.cursors.checkpoints()).await?;
        }
        debug!(
            shard_id = %shard_id,
            records = batch.records.len(),
            sequence_number = self.cursors.sequence_number(shard_id).unwrap_or_default(),
            "Processed batch"
        );
        Ok(closed)
    }
}
