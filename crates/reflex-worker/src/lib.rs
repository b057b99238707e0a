//! Reflex job runner
//!
//! A step is an async closure plus a [`StepDescriptor`] naming its lane and retry
//! policy. The [`JobRunner`] applies the descriptor uniformly: it waits for a lane
//! slot, passes the lane's rate limiter, bounds the attempt with a timeout and
//! retries recoverable failures with exponential backoff.
//!
//! Chains are ordinary `async` blocks running steps one after another; groups are
//! sets of independent chains joined with [`JobRunner::join_group`].

pub mod lanes;
pub mod runner;

pub use lanes::LanePool;
pub use runner::{JobRunner, RetryPolicy, StepDescriptor, MAX_RETRY_BACKOFF_SECS};
