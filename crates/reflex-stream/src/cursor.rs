//! Per-shard read position owned by one consumer.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::time::Duration;

use tokio::time::Instant;

use crate::source::IteratorPosition;

/// Compare two sequence numbers
///
/// Sequence numbers are decimal strings too long for any integer type; without
/// leading zeros a longer string is the larger number.
pub fn compare_sequences(a: &str, b: &str) -> Ordering {
    a.len().cmp(&b.len()).then_with(|| a.cmp(b))
}

#[derive(Debug, Clone, Default)]
struct ShardCursor {
    sequence_number: Option<String>,
    iterator: Option<String>,
    issued_at: Option<Instant>,
}

/// Read position of every shard: last processed sequence number plus the
/// cached iterator and when it was issued
#[derive(Debug, Default)]
pub struct CursorState {
    shards: HashMap<String, ShardCursor>,
}

impl CursorState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from persisted sequence numbers
    pub fn from_checkpoints(checkpoints: HashMap<String, String>) -> Self {
        let shards = checkpoints
            .into_iter()
            .map(|(shard_id, sequence_number)| {
                (
                    shard_id,
                    ShardCursor {
                        sequence_number: Some(sequence_number),
                        ..ShardCursor::default()
                    },
                )
            })
            .collect();
        Self { shards }
    }

    pub fn sequence_number(&self, shard_id: &str) -> Option<&str> {
        self.shards
            .get(shard_id)
            .and_then(|c| c.sequence_number.as_deref())
    }

    /// Cached iterator if it was issued less than `ttl` ago
    pub fn valid_iterator(&self, shard_id: &str, ttl: Duration) -> Option<&str> {
        let cursor = self.shards.get(shard_id)?;
        match (&cursor.iterator, cursor.issued_at) {
            (Some(iterator), Some(issued_at)) if issued_at.elapsed() < ttl => Some(iterator),
            _ => None,
        }
    }

    /// Position for a fresh iterator: after the last processed record, or the
    /// oldest retained record when nothing was processed yet
    pub fn resume_position(&self, shard_id: &str) -> IteratorPosition {
        match self.sequence_number(shard_id) {
            Some(sequence) => IteratorPosition::AfterSequence(sequence.to_string()),
            None => IteratorPosition::TrimHorizon,
        }
    }

    /// Cache an iterator; its validity window starts now
    pub fn set_iterator(&mut self, shard_id: &str, iterator: Option<String>) {
        let cursor = self.shards.entry(shard_id.to_string()).or_default();
        cursor.issued_at = iterator.as_ref().map(|_| Instant::now());
        cursor.iterator = iterator;
    }

    /// Keep the iterator a batch handed back
    ///
    /// The validity window still counts from the last fresh request, so a long
    /// chain of batches is re-anchored on the checkpointed sequence periodically.
    pub fn replace_iterator(&mut self, shard_id: &str, iterator: Option<String>) {
        let cursor = self.shards.entry(shard_id.to_string()).or_default();
        if iterator.is_none() {
            cursor.issued_at = None;
        } else if cursor.issued_at.is_none() {
            cursor.issued_at = Some(Instant::now());
        }
        cursor.iterator = iterator;
    }

    pub fn invalidate_iterator(&mut self, shard_id: &str) {
        if let Some(cursor) = self.shards.get_mut(shard_id) {
            cursor.iterator = None;
            cursor.issued_at = None;
        }
    }

    /// Move the shard's sequence forward; an older or equal sequence is ignored
    pub fn advance(&mut self, shard_id: &str, sequence_number: &str) -> bool {
        let cursor = self.shards.entry(shard_id.to_string()).or_default();
        let newer = match &cursor.sequence_number {
            Some(current) => compare_sequences(sequence_number, current) == Ordering::Greater,
            None => true,
        };
        if newer {
            cursor.sequence_number = Some(sequence_number.to_string());
        }
        newer
    }

    /// Sequence numbers to persist
    pub fn checkpoints(&self) -> HashMap<String, String> {
        self.shards
            .iter()
            .filter_map(|(shard_id, cursor)| {
                cursor
                    .sequence_number
                    .clone()
                    .map(|sequence| (shard_id.clone(), sequence))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sequence_ordering() {
        assert_eq!(compare_sequences("9", "10"), Ordering::Less);
        assert_eq!(
            compare_sequences(
                "49590338271490256608559692538361571095921575989136588898",
                "49590338271490256608559692538361571095921575989136588899"
            ),
            Ordering::Less
        );
        assert_eq!(compare_sequences("42", "42"), Ordering::Equal);
    }

    #[test]
    fn test_advance_is_monotonic() {
        let mut state = CursorState::new();
        assert!(state.advance("shard-0", "100"));
        assert!(state.advance("shard-0", "205"));
        assert!(!state.advance("shard-0", "150"));
        assert_eq!(state.sequence_number("shard-0"), Some("205"));
    }

    #[test]
    fn test_resume_position() {
        let mut state = CursorState::from_checkpoints(HashMap::from([(
            "shard-0".to_string(),
            "100".to_string(),
        )]));
        assert_eq!(
            state.resume_position("shard-0"),
            IteratorPosition::AfterSequence("100".into())
        );
        assert_eq!(state.resume_position("shard-1"), IteratorPosition::TrimHorizon);
        state.advance("shard-1", "7");
        assert_eq!(state.checkpoints().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_iterator_expires_after_ttl() {
        let ttl = Duration::from_secs(280);
        let mut state = CursorState::new();
        state.set_iterator("shard-0", Some("it-1".into()));
        assert_eq!(state.valid_iterator("shard-0", ttl), Some("it-1"));

        tokio::time::advance(Duration::from_secs(200)).await;
        state.replace_iterator("shard-0", Some("it-2".into()));
        assert_eq!(state.valid_iterator("shard-0", ttl), Some("it-2"));

        tokio::time::advance(Duration::from_secs(100)).await;
        assert_eq!(state.valid_iterator("shard-0", ttl), None);
    }
}
