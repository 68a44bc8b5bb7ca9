use std::time::Duration;

use flowsync_common::resilience::RetryConfig;
use flowsync_domain::{FlowSyncError, Result, RetrySettings};

/// Backoff growth factor between consecutive retries
const BACKOFF_BASE: f64 = 2.0;
const MAX_BACKOFF: Duration = Duration::from_secs(60);

/// Exponential backoff with proportional jitter built from settings.
pub fn retry_config(settings: &RetrySettings) -> Result<RetryConfig> {
    RetryConfig::builder()
        .max_retries(settings.max_retries)
        .exponential_backoff(settings.initial_delay(), BACKOFF_BASE, MAX_BACKOFF)
        .proportional_jitter(settings.jitter_min, settings.jitter_max)
        .build()
        .map_err(|e| FlowSyncError::Config(format!("Invalid retry settings: {e}")))
}
