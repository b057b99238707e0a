use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

use reflex_core::models::Lane;

#[derive(Debug, Clone)]
struct TokenBucket {
    tokens: f64,
    capacity: f64,
    refill_rate: f64, // tokens per second
    last_refill: Instant,
}

impl TokenBucket {
    fn new(capacity: f64, refill_rate: f64) -> Self {
        Self {
            tokens: capacity,
            capacity,
            refill_rate,
            last_refill: Instant::now(),
        }
    }

    fn refill(&mut self) {
        let now = Instant::now();
        let elapsed = now.duration_since(self.last_refill).as_secs_f64();
        self.tokens = (self.tokens + elapsed * self.refill_rate).min(self.capacity);
        self.last_refill = now;
    }

    fn try_acquire(&mut self) -> bool {
        self.refill();

        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            true
        } else {
            false
        }
    }

    fn time_until_next_token(&self) -> Duration {
        if self.tokens >= 1.0 {
            Duration::ZERO
        } else {
            let seconds = (1.0 - self.tokens) / self.refill_rate;
            Duration::from_secs_f64(seconds.max(0.0))
        }
    }
}

/// Per-lane token-bucket limiter
///
/// Bucket capacity is twice the refill rate, allowing a short burst after idle
/// periods.
#[derive(Clone)]
pub struct RateLimiter {
    buckets: Arc<Mutex<HashMap<Lane, TokenBucket>>>,
}

impl RateLimiter {
    /// Throttle each listed lane to its rate in calls per second
    pub fn new<I>(rates: I) -> Self
    where
        I: IntoIterator<Item = (Lane, f64)>,
    {
        let buckets = rates
            .into_iter()
            .filter(|(_, rate)| *rate > 0.0)
            .map(|(lane, rate)| (lane, TokenBucket::new(rate * 2.0, rate)))
            .collect();
        Self {
            buckets: Arc::new(Mutex::new(buckets)),
        }
    }

    pub fn unlimited() -> Self {
        Self::new(std::iter::empty::<(Lane, f64)>())
    }

    pub async fn is_limited(&self, lane: Lane) -> bool {
        self.buckets.lock().await.contains_key(&lane)
    }

    /// Acquire a token for the given lane, waiting until one is available
    #[tracing::instrument(skip(self))]
    pub async fn acquire(&self, lane: Lane) {
        loop {
            let wait_duration = {
                let mut buckets = self.buckets.lock().await;
                let Some(bucket) = buckets.get_mut(&lane) else {
                    return;
                };

                if bucket.try_acquire() {
                    tracing::trace!(
                        lane = %lane,
                        tokens_remaining = bucket.tokens,
                        "Rate limit token acquired"
                    );
                    return;
                }

                bucket.time_until_next_token()
            };

            if wait_duration > Duration::ZERO {
                tracing::debug!(
                    lane = %lane,
                    wait_ms = wait_duration.as_millis() as u64,
                    "Rate limit reached, waiting for token"
                );
                tokio::time::sleep(wait_duration).await;
            }
        }
    }

    /// Try to acquire a token without waiting
    pub async fn try_acquire(&self, lane: Lane) -> bool {
        let mut buckets = self.buckets.lock().await;
        match buckets.get_mut(&lane) {
            Some(bucket) => bucket.try_acquire(),
            None => true,
        }
    }

    /// Current number of available tokens, `None` for unthrottled lanes
    pub async fn available_tokens(&self, lane: Lane) -> Option<f64> {
        let mut buckets = self.buckets.lock().await;
        buckets.get_mut(&lane).map(|bucket| {
            bucket.refill();
            bucket.tokens
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_unthrottled_lane_never_waits() {
        let limiter = RateLimiter::new([(Lane::Source, 1.0)]);
        for _ in 0..100 {
            assert!(limiter.try_acquire(Lane::Destination).await);
        }
        assert_eq!(limiter.available_tokens(Lane::Destination).await, None);
        assert!(!limiter.is_limited(Lane::Default).await);
    }

    #[tokio::test]
    async fn test_burst_capacity_is_twice_rate() {
        let limiter = RateLimiter::new([(Lane::Source, 2.0)]);
        assert_eq!(limiter.available_tokens(Lane::Source).await, Some(4.0));
    }

    #[tokio::test]
    async fn test_try_acquire_non_blocking() {
        let limiter = RateLimiter::new([(Lane::Source, 1.0)]);

        assert!(limiter.try_acquire(Lane::Source).await);
        while limiter.try_acquire(Lane::Source).await {}
        assert!(!limiter.try_acquire(Lane::Source).await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_acquire_waits_for_refill() {
        let limiter = RateLimiter::new([(Lane::Source, 10.0)]);
        while limiter.try_acquire(Lane::Source).await {}

        let start = Instant::now();
        limiter.acquire(Lane::Source).await;
        assert!(start.elapsed() >= Duration::from_millis(50));
    }

    #[tokio::test(start_paused = true)]
    async fn test_refill_over_time() {
        let limiter = RateLimiter::new([(Lane::Source, 10.0)]);
        for _ in 0..20 {
            limiter.acquire(Lane::Source).await;
        }
        let drained = limiter.available_tokens(Lane::Source).await.unwrap();

        tokio::time::sleep(Duration::from_millis(500)).await;
        let refilled = limiter.available_tokens(Lane::Source).await.unwrap();
        assert!(refilled > drained);
    }
}
