//! Resilience patterns for fault tolerance
//!
//! Generic, reusable retry machinery: an executor that takes an async
//! operation plus a classifier deciding which failures are transient, and
//! sleeps between attempts according to a backoff strategy with jitter.
//!
//! The executor is generic over the error type and never inspects errors
//! itself; callers decide retryability through [`RetryPolicy`]
//! implementations such as [`policies::RetryIf`].

pub mod retry;

// Re-export retry types
pub use retry::{
    policies, retry_if, BackoffStrategy, Jitter, RetryConfig, RetryConfigBuilder,
    RetryConfigError, RetryDecision, RetryExecutor, RetryOutcome, RetryPolicy,
};
