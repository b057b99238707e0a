//! Step execution: lane admission, rate limiting, timeout and retry.

use std::future::Future;
use std::time::Duration;

use reflex_core::models::Lane;
use reflex_core::{Config, TaskError};
use reflex_infra::RateLimiter;

use crate::lanes::LanePool;

/// Upper bound on the delay between two attempts of a step.
pub const MAX_RETRY_BACKOFF_SECS: u64 = 300;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt; 0 disables retrying
    pub max_retries: u32,
    pub backoff_base: Duration,
    pub backoff_max: Duration,
    /// Bound on a single attempt
    pub timeout: Option<Duration>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 10,
            backoff_base: Duration::from_secs(1),
            backoff_max: Duration::from_secs(MAX_RETRY_BACKOFF_SECS),
            timeout: Some(Duration::from_secs(3600)),
        }
    }
}

impl RetryPolicy {
    pub fn from_config(config: &Config) -> Self {
        Self {
            max_retries: config.task_max_retries(),
            backoff_base: Duration::from_millis(config.task_backoff_base_ms()),
            backoff_max: Duration::from_secs(config.task_backoff_max_secs()),
            timeout: Some(Duration::from_secs(config.task_timeout_secs())),
        }
    }

    pub fn no_retry() -> Self {
        Self {
            max_retries: 0,
            ..Self::default()
        }
    }

    /// Delay before retry number `retry_count + 1` (exponential with cap)
    pub fn backoff(&self, retry_count: u32) -> Duration {
        let factor = 2_u32.saturating_pow(retry_count.min(31));
        self.backoff_base
            .saturating_mul(factor)
            .min(self.backoff_max)
    }
}

/// Name, lane and retry policy of one pipeline step
#[derive(Debug, Clone)]
pub struct StepDescriptor {
    pub name: &'static str,
    pub lane: Lane,
    pub retry: RetryPolicy,
}

impl StepDescriptor {
    pub fn new(name: &'static str, lane: Lane, retry: RetryPolicy) -> Self {
        Self { name, lane, retry }
    }
}

#[derive(Clone)]
pub struct JobRunner {
    lanes: LanePool,
    rate_limiter: RateLimiter,
    default_retry: RetryPolicy,
}

impl JobRunner {
    pub fn new(lanes: LanePool, rate_limiter: RateLimiter, default_retry: RetryPolicy) -> Self {
        Self {
            lanes,
            rate_limiter,
            default_retry,
        }
    }

    /// Lanes, source-lane throttling and retry policy from configuration
    pub fn from_config(config: &Config) -> Self {
        Self::new(
            LanePool::from_config(config),
            RateLimiter::new([(Lane::Source, config.source_rate_limit())]),
            RetryPolicy::from_config(config),
        )
    }

    /// Step descriptor carrying the runner's default retry policy
    pub fn step(&self, name: &'static str, lane: Lane) -> StepDescriptor {
        StepDescriptor::new(name, lane, self.default_retry.clone())
    }

    pub fn lanes(&self) -> &LanePool {
        &self.lanes
    }

    /// Run one step to completion
    ///
    /// `op` is invoked once per attempt. A recoverable error is retried until the
    /// policy's ceiling, after which it is returned as unrecoverable; an
    /// unrecoverable error is returned immediately. The lane slot is released
    /// while waiting out the backoff.
    pub async fn run_step<T, F, Fut>(&self, step: &StepDescriptor, mut op: F) -> Result<T, TaskError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, TaskError>>,
    {
        let mut retry_count: u32 = 0;

        loop {
            let result = {
                let _permit = self.lanes.acquire(step.lane).await?;
                self.rate_limiter.acquire(step.lane).await;

                match step.retry.timeout {
                    Some(limit) => match tokio::time::timeout(limit, op()).await {
                        Ok(result) => result,
                        Err(_) => Err(TaskError::recoverable(anyhow::anyhow!(
                            "Step {} timed out after {}s",
                            step.name,
                            limit.as_secs()
                        ))),
                    },
                    None => op().await,
                }
            };

            let err = match result {
                Ok(value) => {
                    if retry_count > 0 {
                        tracing::info!(
                            step = step.name,
                            lane = %step.lane,
                            retry_count,
                            "Step succeeded after retry"
                        );
                    }
                    return Ok(value);
                }
                Err(err) => err,
            };

            if !err.is_recoverable() {
                tracing::error!(
                    step = step.name,
                    lane = %step.lane,
                    error = %err,
                    retry_count,
                    "Step failed with unrecoverable error, will not retry"
                );
                return Err(err);
            }

            if retry_count >= step.retry.max_retries {
                tracing::error!(
                    step = step.name,
                    lane = %step.lane,
                    error = %err,
                    max_retries = step.retry.max_retries,
                    "Step failed after max retries"
                );
                return Err(err.into_unrecoverable());
            }

            let backoff = step.retry.backoff(retry_count);
            retry_count += 1;
            tracing::warn!(
                step = step.name,
                lane = %step.lane,
                error = %err,
                retry_count,
                backoff_ms = backoff.as_millis() as u64,
                "Step failed, scheduling retry"
            );
            tokio::time::sleep(backoff).await;
        }
    }

    /// Drive a set of independent chains concurrently and collect every result
    ///
    /// One member failing does not cancel the others; results keep input order.
    pub async fn join_group<T, Fut>(&self, chains: Vec<Fut>) -> Vec<Result<T, TaskError>>
    where
        Fut: Future<Output = Result<T, TaskError>>,
    {
        futures::future::join_all(chains).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
    use std::sync::Arc;

    fn runner(concurrency: usize, max_retries: u32) -> JobRunner {
        JobRunner::new(
            LanePool::uniform(concurrency),
            RateLimiter::unlimited(),
            RetryPolicy {
                max_retries,
                backoff_base: Duration::from_millis(100),
                backoff_max: Duration::from_secs(5),
                timeout: Some(Duration::from_secs(30)),
            },
        )
    }

    #[test]
    fn retry_backoff_exponential_then_capped() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.backoff(0), Duration::from_secs(1));
        assert_eq!(policy.backoff(1), Duration::from_secs(2));
        assert_eq!(policy.backoff(2), Duration::from_secs(4));
        assert_eq!(policy.backoff(8), Duration::from_secs(256));
        assert_eq!(policy.backoff(9), Duration::from_secs(MAX_RETRY_BACKOFF_SECS));
        assert_eq!(policy.backoff(40), Duration::from_secs(MAX_RETRY_BACKOFF_SECS));
    }

    #[tokio::test(start_paused = true)]
    async fn recoverable_error_is_retried_until_success() {
        let runner = runner(1, 5);
        let step = runner.step("flaky", Lane::Default);
        let attempts = AtomicU32::new(0);

        let value = runner
            .run_step(&step, || async {
                if attempts.fetch_add(1, Ordering::SeqCst) < 2 {
                    Err(TaskError::recoverable(anyhow::anyhow!("connection reset")))
                } else {
                    Ok(42)
                }
            })
            .await
            .unwrap();

        assert_eq!(value, 42);
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn unrecoverable_error_stops_immediately() {
        let runner = runner(1, 5);
        let step = runner.step("fatal", Lane::Default);
        let attempts = AtomicU32::new(0);

        let err = runner
            .run_step(&step, || async {
                attempts.fetch_add(1, Ordering::SeqCst);
                Err::<(), _>(TaskError::unrecoverable(anyhow::anyhow!("bad payload")))
            })
            .await
            .unwrap_err();

        assert!(!err.is_recoverable());
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn ceiling_turns_error_fatal() {
        let runner = runner(1, 3);
        let step = runner.step("always-failing", Lane::Source);
        let attempts = AtomicU32::new(0);

        let err = runner
            .run_step(&step, || async {
                attempts.fetch_add(1, Ordering::SeqCst);
                Err::<(), _>(TaskError::recoverable(anyhow::anyhow!("503")))
            })
            .await
            .unwrap_err();

        assert!(!err.is_recoverable());
        assert_eq!(attempts.load(Ordering::SeqCst), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn timeout_counts_as_recoverable_attempt() {
        let mut runner = runner(1, 1);
        runner.default_retry.timeout = Some(Duration::from_secs(1));
        let step = runner.step("slow", Lane::Destination);
        let attempts = AtomicU32::new(0);

        let value = runner
            .run_step(&step, || async {
                if attempts.fetch_add(1, Ordering::SeqCst) == 0 {
                    tokio::time::sleep(Duration::from_secs(10)).await;
                }
                Ok::<_, TaskError>("done")
            })
            .await
            .unwrap();

        assert_eq!(value, "done");
        assert_eq!(attempts.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn group_respects_lane_ceiling_and_keeps_order() {
        let runner = runner(2, 0);
        let in_flight = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let chains = (0..6)
            .map(|i| {
                let runner = runner.clone();
                let in_flight = in_flight.clone();
                let peak = peak.clone();
                async move {
                    let step = runner.step("download", Lane::Source);
                    runner
                        .run_step(&step, || {
                            let in_flight = in_flight.clone();
                            let peak = peak.clone();
                            async move {
                                let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                                peak.fetch_max(now, Ordering::SeqCst);
                                tokio::time::sleep(Duration::from_millis(10)).await;
                                in_flight.fetch_sub(1, Ordering::SeqCst);
                                if i == 3 {
                                    Err(TaskError::unrecoverable(anyhow::anyhow!("missing file")))
                                } else {
                                    Ok(i)
                                }
                            }
                        })
                        .await
                }
            })
            .collect::<Vec<_>>();

        let results = runner.join_group(chains).await;

        assert_eq!(results.len(), 6);
        assert!(results[3].is_err());
        let ok: Vec<_> = results.iter().filter_map(|r| r.as_ref().ok()).copied().collect();
        assert_eq!(ok, vec![0, 1, 2, 4, 5]);
        assert!(peak.load(Ordering::SeqCst) <= 2);
    }
}
