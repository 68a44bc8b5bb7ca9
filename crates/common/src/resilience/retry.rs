//! Generic retry executor with backoff and jitter
//!
//! This module provides a retry mechanism for any async operation that
//! might fail transiently. The caller supplies the operation and a
//! [`RetryPolicy`] (usually a classifier closure wrapped in
//! [`policies::RetryIf`]); the executor owns the sleep schedule.
//!
//! Exhausting the retry budget returns the *last* error produced by the
//! operation unchanged, so callers keep their own error taxonomy.

use std::fmt;
use std::future::Future;
use std::time::Duration;

use rand::Rng;
use thiserror::Error;
use tracing::{debug, instrument, warn};

/// Errors raised while building a [`RetryConfig`]
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RetryConfigError {
    /// The retry strategy configuration is invalid
    #[error("Invalid retry configuration: {message}")]
    InvalidConfiguration { message: String },
}

/// Outcome of a retry execution including result and summary statistics.
#[derive(Debug)]
pub struct RetryOutcome<T, E> {
    /// Final result; on failure this is the last error the operation produced
    pub result: Result<T, E>,
    /// Number of times the operation was invoked
    pub attempts: u32,
    /// Delays slept before each retry, in order
    pub delays: Vec<Duration>,
}

impl<T, E> RetryOutcome<T, E> {
    /// Consume the outcome and return only the result.
    pub fn into_result(self) -> Result<T, E> {
        self.result
    }

    /// Number of retries performed (attempts after the first).
    pub fn retries(&self) -> u32 {
        self.attempts.saturating_sub(1)
    }

    /// Sum of all delays slept between attempts.
    pub fn total_delay(&self) -> Duration {
        self.delays.iter().sum()
    }
}

/// Trait for determining whether an error should be retried
pub trait RetryPolicy<E> {
    /// Decide whether to retry after `error`. `attempt` is the number of
    /// retries already performed (0 after the first failure).
    fn should_retry(&self, error: &E, attempt: u32) -> RetryDecision;
}

/// Decision for whether to retry an operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryDecision {
    /// Retry the operation with the configured backoff delay
    Retry,
    /// Don't retry the operation
    Stop,
}

/// Backoff strategy for calculating retry delays
#[derive(Debug, Clone, PartialEq)]
pub enum BackoffStrategy {
    /// Fixed delay between retries
    Fixed(Duration),
    /// Exponential backoff: initial_delay * base^attempt, capped at max_delay
    Exponential { initial_delay: Duration, base: f64, max_delay: Duration },
}

impl BackoffStrategy {
    /// Calculate the un-jittered delay before the retry that follows
    /// `attempt` previous retries (0 for the first retry).
    pub fn calculate_delay(&self, attempt: u32) -> Duration {
        match self {
            Self::Fixed(delay) => *delay,
            Self::Exponential { initial_delay, base, max_delay } => {
                let exponent = i32::try_from(attempt).unwrap_or(i32::MAX);
                let delay_ms = initial_delay.as_millis() as f64 * base.powi(exponent);
                let capped = delay_ms.min(max_delay.as_millis() as f64).max(0.0);
                Duration::from_millis(capped as u64)
            }
        }
    }
}

/// Jitter applied on top of the backoff delay
#[derive(Debug, Clone, PartialEq)]
pub enum Jitter {
    /// No jitter
    None,
    /// Multiply the delay by a factor drawn uniformly from `[min, max)`
    Proportional { min: f64, max: f64 },
}

impl Jitter {
    /// Apply jitter to the calculated delay
    pub fn apply(&self, delay: Duration) -> Duration {
        match self {
            Self::None => delay,
            Self::Proportional { min, max } => {
                let factor = if min < max {
                    rand::thread_rng().gen_range(*min..*max)
                } else {
                    *min
                };
                Duration::try_from_secs_f64(delay.as_secs_f64() * factor.max(0.0))
                    .unwrap_or(Duration::MAX)
            }
        }
    }
}

/// Configuration for retry behavior
#[derive(Debug, Clone, PartialEq)]
pub struct RetryConfig {
    /// Maximum number of retries after the initial attempt
    pub max_retries: u32,
    /// Backoff strategy for calculating delays
    pub backoff: BackoffStrategy,
    /// Jitter type for randomizing delays
    pub jitter: Jitter,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            backoff: BackoffStrategy::Exponential {
                initial_delay: Duration::from_millis(2000),
                base: 2.0,
                max_delay: Duration::from_secs(60),
            },
            jitter: Jitter::Proportional { min: 0.8, max: 1.2 },
        }
    }
}

impl RetryConfig {
    /// Create a configuration builder
    pub fn builder() -> RetryConfigBuilder {
        RetryConfigBuilder::new()
    }

    /// Configuration that never sleeps and never retries.
    pub fn disabled() -> Self {
        Self { max_retries: 0, backoff: BackoffStrategy::Fixed(Duration::ZERO), jitter: Jitter::None }
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), RetryConfigError> {
        if let BackoffStrategy::Exponential { base, .. } = &self.backoff {
            if !base.is_finite() || *base <= 0.0 {
                return Err(RetryConfigError::InvalidConfiguration {
                    message: "exponential base must be greater than 0".to_string(),
                });
            }
        }

        if let Jitter::Proportional { min, max } = &self.jitter {
            if !min.is_finite() || !max.is_finite() || *min < 0.0 || min > max {
                return Err(RetryConfigError::InvalidConfiguration {
                    message: format!("jitter range [{min}, {max}) is invalid"),
                });
            }
        }

        Ok(())
    }
}

/// Builder for RetryConfig with fluent API
#[derive(Debug)]
pub struct RetryConfigBuilder {
    config: RetryConfig,
}

impl Default for RetryConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl RetryConfigBuilder {
    pub fn new() -> Self {
        Self { config: RetryConfig::default() }
    }

    pub fn max_retries(mut self, retries: u32) -> Self {
        self.config.max_retries = retries;
        self
    }

    pub fn fixed_backoff(mut self, delay: Duration) -> Self {
        self.config.backoff = BackoffStrategy::Fixed(delay);
        self
    }

    pub fn exponential_backoff(
        mut self,
        initial_delay: Duration,
        base: f64,
        max_delay: Duration,
    ) -> Self {
        self.config.backoff = BackoffStrategy::Exponential { initial_delay, base, max_delay };
        self
    }

    pub fn no_jitter(mut self) -> Self {
        self.config.jitter = Jitter::None;
        self
    }

    pub fn proportional_jitter(mut self, min: f64, max: f64) -> Self {
        self.config.jitter = Jitter::Proportional { min, max };
        self
    }

    pub fn build(self) -> Result<RetryConfig, RetryConfigError> {
        self.config.validate()?;
        Ok(self.config)
    }
}

/// The main retry executor
#[derive(Debug, Clone)]
pub struct RetryExecutor<P> {
    config: RetryConfig,
    policy: P,
}

impl<P> RetryExecutor<P> {
    /// Create a new retry executor with the given configuration and policy
    pub fn new(config: RetryConfig, policy: P) -> Self {
        Self { config, policy }
    }

    /// Create with default configuration
    pub fn with_policy(policy: P) -> Self {
        Self::new(RetryConfig::default(), policy)
    }

    pub fn config(&self) -> &RetryConfig {
        &self.config
    }

    /// Execute an operation with retry logic
    pub async fn execute<F, Fut, T, E>(&self, operation: F) -> Result<T, E>
    where
        P: RetryPolicy<E>,
        E: fmt::Display,
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        self.execute_with_outcome(operation).await.into_result()
    }

    /// Execute an operation with retry logic and return outcome statistics.
    #[instrument(skip(self, operation), fields(max_retries = self.config.max_retries))]
    pub async fn execute_with_outcome<F, Fut, T, E>(&self, mut operation: F) -> RetryOutcome<T, E>
    where
        P: RetryPolicy<E>,
        E: fmt::Display,
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let mut attempts: u32 = 0;
        let mut delays = Vec::new();

        loop {
            attempts += 1;
            debug!(attempt = attempts, "executing operation");

            let error = match operation().await {
                Ok(value) => {
                    if attempts > 1 {
                        debug!(retries = attempts - 1, "operation succeeded after retries");
                    }
                    return RetryOutcome { result: Ok(value), attempts, delays };
                }
                Err(error) => error,
            };

            let retries_done = attempts - 1;

            let delay = match self.policy.should_retry(&error, retries_done) {
                RetryDecision::Stop => {
                    debug!(attempt = attempts, error = %error, "error is not retryable");
                    return RetryOutcome { result: Err(error), attempts, delays };
                }
                _ if retries_done >= self.config.max_retries => {
                    warn!(attempts, error = %error, "all retry attempts exhausted");
                    return RetryOutcome { result: Err(error), attempts, delays };
                }
                RetryDecision::Retry => {
                    self.config.jitter.apply(self.config.backoff.calculate_delay(retries_done))
                }
            };

            warn!(
                attempt = attempts,
                delay_ms = delay.as_millis() as u64,
                error = %error,
                "operation failed, retrying"
            );

            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            delays.push(delay);
        }
    }
}

/// Convenience function: retry `operation` while `classifier` says the error
/// is transient.
pub async fn retry_if<F, Fut, T, E, C>(config: RetryConfig, classifier: C, operation: F) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    C: Fn(&E) -> bool,
    E: fmt::Display,
{
    RetryExecutor::new(config, policies::RetryIf::new(classifier)).execute(operation).await
}

/// Pre-defined retry policies
pub mod policies {
    use super::{RetryDecision, RetryPolicy};

    /// Never retry policy - never retries
    #[derive(Debug, Clone, Copy)]
    pub struct NeverRetry;

    impl<E> RetryPolicy<E> for NeverRetry {
        fn should_retry(&self, _error: &E, _attempt: u32) -> RetryDecision {
            RetryDecision::Stop
        }
    }

    /// Classifier-based retry policy: retries whenever the predicate
    /// returns `true` for the error.
    #[derive(Debug, Clone, Copy)]
    pub struct RetryIf<F> {
        classifier: F,
    }

    impl<F> RetryIf<F> {
        pub fn new(classifier: F) -> Self {
            Self { classifier }
        }
    }

    impl<F, E> RetryPolicy<E> for RetryIf<F>
    where
        F: Fn(&E) -> bool,
    {
        fn should_retry(&self, error: &E, _attempt: u32) -> RetryDecision {
            if (self.classifier)(error) {
                RetryDecision::Retry
            } else {
                RetryDecision::Stop
            }
        }
    }
}
