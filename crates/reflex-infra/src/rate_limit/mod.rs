//! Rate limiting service
//!
//! Token buckets per execution lane. Lanes without a configured rate are not
//! throttled.

pub use limiter::RateLimiter;

mod limiter;
