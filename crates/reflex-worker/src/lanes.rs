//! Named execution lanes with independent concurrency ceilings.

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

use reflex_core::models::Lane;
use reflex_core::{Config, LaneSettings, TaskError};

struct LaneSlot {
    semaphore: Arc<Semaphore>,
    queue: String,
    concurrency: usize,
}

/// Semaphore per configured lane.
#[derive(Clone)]
pub struct LanePool {
    lanes: Arc<HashMap<Lane, LaneSlot>>,
}

impl LanePool {
    pub fn new<I>(settings: I) -> Self
    where
        I: IntoIterator<Item = (Lane, LaneSettings)>,
    {
        let lanes = settings
            .into_iter()
            .map(|(lane, s)| {
                let concurrency = s.concurrency.max(1);
                (
                    lane,
                    LaneSlot {
                        semaphore: Arc::new(Semaphore::new(concurrency)),
                        queue: s.queue,
                        concurrency,
                    },
                )
            })
            .collect();
        Self {
            lanes: Arc::new(lanes),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(Lane::ALL.map(|lane| (lane, config.lane(lane).clone())))
    }

    /// Same concurrency on every lane; used by tests and one-shot CLI runs
    pub fn uniform(concurrency: usize) -> Self {
        Self::new(Lane::ALL.map(|lane| {
            (
                lane,
                LaneSettings {
                    concurrency,
                    queue: lane.to_string(),
                },
            )
        }))
    }

    pub fn queue(&self, lane: Lane) -> &str {
        self.lanes
            .get(&lane)
            .map(|slot| slot.queue.as_str())
            .unwrap_or("default")
    }

    pub fn concurrency(&self, lane: Lane) -> usize {
        self.lanes.get(&lane).map(|slot| slot.concurrency).unwrap_or(1)
    }

    /// Wait for a free slot on `lane`
    pub async fn acquire(&self, lane: Lane) -> Result<OwnedSemaphorePermit, TaskError> {
        let slot = self.lanes.get(&lane).ok_or_else(|| {
            TaskError::unrecoverable(anyhow::anyhow!("Lane {} is not configured", lane))
        })?;
        slot.semaphore
            .clone()
            .acquire_owned()
            .await
            .map_err(|e| TaskError::unrecoverable(anyhow::anyhow!("Lane {} closed: {}", lane, e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_lane_ceiling() {
        let pool = LanePool::new([(
            Lane::Source,
            LaneSettings {
                concurrency: 2,
                queue: "reflex_drive".into(),
            },
        )]);

        let first = pool.acquire(Lane::Source).await.unwrap();
        let _second = pool.acquire(Lane::Source).await.unwrap();

        let third = tokio::time::timeout(
            std::time::Duration::from_millis(20),
            pool.acquire(Lane::Source),
        )
        .await;
        assert!(third.is_err(), "third permit should wait");

        drop(first);
        assert!(pool.acquire(Lane::Source).await.is_ok());
        assert_eq!(pool.queue(Lane::Source), "reflex_drive");
    }

    #[tokio::test]
    async fn test_unconfigured_lane_is_unrecoverable() {
        let pool = LanePool::new(std::iter::empty::<(Lane, LaneSettings)>());
        let err = pool.acquire(Lane::Destination).await.unwrap_err();
        assert!(!err.is_recoverable());
    }
}
