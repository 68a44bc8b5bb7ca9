//! Configuration structures
//!
//! Every field carries a serde default so partial TOML/JSON files load.
//! Credentials are kept apart from tunables: the pipeline needs only the
//! three credential strings, everything else has a working default.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::constants::{
    DEFAULT_FAILURES_TABLE, DEFAULT_FLOWS_TABLE, DEFAULT_INITIAL_RETRY_DELAY_MS,
    DEFAULT_MAX_FAILED_BATCHES, DEFAULT_MAX_PAGES, DEFAULT_MAX_REQUEST_DELAY_MS,
    DEFAULT_MAX_RETRIES, DEFAULT_MIN_REQUEST_DELAY_MS, DEFAULT_SINK_BATCH_DELAY_MS,
    MAX_SINK_BATCH_SIZE,
};
use crate::errors::{FlowSyncError, Result};

/// The three credential strings a run needs, passed through verbatim.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    pub source_api_key: String,
    pub sink_api_key: String,
    pub sink_base_id: String,
}

impl Credentials {
    pub fn new(
        source_api_key: impl Into<String>,
        sink_api_key: impl Into<String>,
        sink_base_id: impl Into<String>,
    ) -> Self {
        Self {
            source_api_key: source_api_key.into(),
            sink_api_key: sink_api_key.into(),
            sink_base_id: sink_base_id.into(),
        }
    }

    /// Reject blank credentials before any request is made.
    pub fn validate(&self) -> Result<()> {
        let missing: Vec<&str> = [
            ("source_api_key", &self.source_api_key),
            ("sink_api_key", &self.sink_api_key),
            ("sink_base_id", &self.sink_base_id),
        ]
        .into_iter()
        .filter(|(_, value)| value.trim().is_empty())
        .map(|(name, _)| name)
        .collect();

        if missing.is_empty() {
            Ok(())
        } else {
            Err(FlowSyncError::Config(format!("missing credentials: {}", missing.join(", "))))
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("source_api_key", &"<redacted>")
            .field("sink_api_key", &"<redacted>")
            .field("sink_base_id", &self.sink_base_id)
            .finish()
    }
}

/// Source (marketing automation API) settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    pub base_url: String,
    /// API revision header value
    pub revision: String,
    pub timeout_secs: u64,
    pub min_request_delay_ms: u64,
    pub max_request_delay_ms: u64,
    /// Upper bound on pages followed per list call
    pub max_pages: usize,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            base_url: "https://a.klaviyo.com/api".to_string(),
            revision: "2024-10-15".to_string(),
            timeout_secs: 30,
            min_request_delay_ms: DEFAULT_MIN_REQUEST_DELAY_MS,
            max_request_delay_ms: DEFAULT_MAX_REQUEST_DELAY_MS,
            max_pages: DEFAULT_MAX_PAGES,
        }
    }
}

impl SourceConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn request_delay_range(&self) -> (Duration, Duration) {
        (
            Duration::from_millis(self.min_request_delay_ms),
            Duration::from_millis(self.max_request_delay_ms),
        )
    }
}

/// Sink (spreadsheet-like records API) settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SinkConfig {
    pub base_url: String,
    pub flows_table: String,
    pub failures_table: String,
    /// Table read by the connection test; defaults to `flows_table`
    pub connection_test_table: Option<String>,
    pub batch_size: usize,
    pub batch_delay_ms: u64,
    pub max_failed_batches: usize,
    /// Let the sink coerce values into select options and similar types
    pub typecast: bool,
    pub timeout_secs: u64,
}

impl Default for SinkConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.airtable.com/v0".to_string(),
            flows_table: DEFAULT_FLOWS_TABLE.to_string(),
            failures_table: DEFAULT_FAILURES_TABLE.to_string(),
            connection_test_table: None,
            batch_size: MAX_SINK_BATCH_SIZE,
            batch_delay_ms: DEFAULT_SINK_BATCH_DELAY_MS,
            max_failed_batches: DEFAULT_MAX_FAILED_BATCHES,
            typecast: true,
            timeout_secs: 30,
        }
    }
}

impl SinkConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn batch_delay(&self) -> Duration {
        Duration::from_millis(self.batch_delay_ms)
    }

    /// Batch size clamped to what the sink accepts per request
    pub fn effective_batch_size(&self) -> usize {
        self.batch_size.clamp(1, MAX_SINK_BATCH_SIZE)
    }

    pub fn connection_test_table(&self) -> &str {
        self.connection_test_table.as_deref().unwrap_or(&self.flows_table)
    }
}

/// Retry tunables shared by both HTTP clients
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrySettings {
    pub max_retries: u32,
    pub initial_delay_ms: u64,
    pub jitter_min: f64,
    pub jitter_max: f64,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            initial_delay_ms: DEFAULT_INITIAL_RETRY_DELAY_MS,
            jitter_min: 0.8,
            jitter_max: 1.2,
        }
    }
}

impl RetrySettings {
    pub fn initial_delay(&self) -> Duration {
        Duration::from_millis(self.initial_delay_ms)
    }
}

/// Metric aggregation settings used by the orchestrator
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncSettings {
    pub timezone: String,
    pub interval: String,
    pub measurement: String,
    /// Metric used when no metric name overlaps a flow name
    pub default_metric_name: Option<String>,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            timezone: "UTC".to_string(),
            interval: "month".to_string(),
            measurement: "count".to_string(),
            default_metric_name: Some("Received Email".to_string()),
        }
    }
}

/// Root configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub source: SourceConfig,
    pub sink: SinkConfig,
    pub retry: RetrySettings,
    pub sync: SyncSettings,
    pub credentials: Option<Credentials>,
}

impl Config {
    /// Default settings carrying the given credentials
    pub fn with_credentials(credentials: Credentials) -> Self {
        Self { credentials: Some(credentials), ..Self::default() }
    }

    /// Credentials, or a configuration error when none were supplied
    pub fn require_credentials(&self) -> Result<&Credentials> {
        self.credentials
            .as_ref()
            .ok_or_else(|| FlowSyncError::Config("no credentials configured".to_string()))
    }

    /// Check ranges and required values.
    pub fn validate(&self) -> Result<()> {
        self.require_credentials()?.validate()?;

        if self.sink.batch_size == 0 {
            return Err(FlowSyncError::Config("sink.batch_size must be at least 1".into()));
        }
        if self.sink.max_failed_batches == 0 {
            return Err(FlowSyncError::Config("sink.max_failed_batches must be at least 1".into()));
        }
        if self.source.min_request_delay_ms > self.source.max_request_delay_ms {
            return Err(FlowSyncError::Config(
                "source.min_request_delay_ms exceeds source.max_request_delay_ms".into(),
            ));
        }
        if self.source.max_pages == 0 {
            return Err(FlowSyncError::Config("source.max_pages must be at least 1".into()));
        }
        let (jitter_min, jitter_max) = (self.retry.jitter_min, self.retry.jitter_max);
        if !jitter_min.is_finite()
            || !jitter_max.is_finite()
            || jitter_min < 0.0
            || jitter_min > jitter_max
        {
            return Err(FlowSyncError::Config("retry jitter range is invalid".into()));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn creds() -> Credentials {
        Credentials::new("pk_source", "pat_sink", "appBase")
    }

    #[test]
    fn debug_output_redacts_keys() {
        let rendered = format!("{:?}", creds());
        assert!(!rendered.contains("pk_source"));
        assert!(!rendered.contains("pat_sink"));
        assert!(rendered.contains("appBase"));
    }

    #[test]
    fn blank_credentials_are_rejected() {
        let err = Credentials::new("", "pat", " ").validate().unwrap_err();
        assert!(err.to_string().contains("source_api_key"));
        assert!(err.to_string().contains("sink_base_id"));
    }

    #[test]
    fn defaults_validate_with_credentials() {
        assert!(Config::with_credentials(creds()).validate().is_ok());
        assert!(Config::default().validate().is_err());
    }

    #[test]
    fn batch_size_is_clamped_to_sink_limit() {
        let sink = SinkConfig { batch_size: 50, ..SinkConfig::default() };
        assert_eq!(sink.effective_batch_size(), 10);
    }

    #[test]
    fn partial_json_fills_defaults() {
        let config: Config =
            serde_json::from_str(r#"{ "sink": { "flows_table": "Automations" } }"#).unwrap();
        assert_eq!(config.sink.flows_table, "Automations");
        assert_eq!(config.sink.failures_table, "Failed Flows");
        assert_eq!(config.retry.max_retries, 3);
        assert_eq!(config.source.min_request_delay_ms, 600);
    }

    #[test]
    fn inverted_delay_range_fails_validation() {
        let mut config = Config::with_credentials(creds());
        config.source.min_request_delay_ms = 2000;
        assert!(config.validate().is_err());
    }

    #[test]
    fn non_finite_jitter_fails_validation() {
        for (min, max) in [(0.8, f64::INFINITY), (f64::NAN, 1.2), (0.8, f64::NAN)] {
            let mut config = Config::with_credentials(creds());
            config.retry.jitter_min = min;
            config.retry.jitter_max = max;
            assert!(config.validate().is_err(), "accepted jitter [{min}, {max})");
        }
    }
}
