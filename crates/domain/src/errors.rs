//! Error types used throughout the application
//!
//! [`ApiError`] is the taxonomy every outbound client speaks: one variant per
//! failure kind, each carrying an HTTP-status-like code where one exists.
//! [`FlowSyncError`] is what a sync run surfaces to its caller; every variant
//! is fatal to the run.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::utils::text::truncate_with_suffix;

/// Categories of API errors for retry logic
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiErrorCategory {
    /// Authentication errors (401, 403) - non-retryable
    Authentication,
    /// Rate limiting errors (429) - retry with backoff
    RateLimit,
    /// Server errors (5xx) - retryable
    Server,
    /// Missing resource (404) - non-retryable
    NotFound,
    /// Other client errors (4xx) - non-retryable
    Client,
    /// Response body could not be read as JSON
    Parse,
    /// Network/connection errors
    Network,
    /// Local batch validation failures
    Validation,
    /// One or more sink batches failed
    Batch,
    /// Configuration errors - non-retryable
    Config,
}

/// Resource recovered from a failing endpoint path, used to make
/// not-found messages actionable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum ResourceHint {
    Flow(String),
    FlowAction(String),
    FlowMessage(String),
    Metric(String),
    Table(String),
}

impl ResourceHint {
    /// Recover the most specific resource id embedded in an endpoint path.
    ///
    /// `/api/flows/ABC/flow-actions/` yields `Flow("ABC")`;
    /// `/api/flow-actions/123/` yields `FlowAction("123")`.
    pub fn from_path(path: &str) -> Option<Self> {
        let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();

        segments.windows(2).rev().find_map(|pair| {
            let id = pair[1].to_string();
            match pair[0] {
                "flows" => Some(Self::Flow(id)),
                "flow-actions" => Some(Self::FlowAction(id)),
                "flow-messages" => Some(Self::FlowMessage(id)),
                "metrics" => Some(Self::Metric(id)),
                _ => None,
            }
        })
    }
}

impl fmt::Display for ResourceHint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Flow(id) => write!(f, "flow '{id}'"),
            Self::FlowAction(id) => write!(f, "flow action '{id}'"),
            Self::FlowMessage(id) => write!(f, "flow message '{id}'"),
            Self::Metric(id) => write!(f, "metric '{id}'"),
            Self::Table(name) => write!(f, "table '{name}'"),
        }
    }
}

/// Outbound API errors
#[derive(Debug, Clone, Error, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "details")]
pub enum ApiError {
    #[error("Authentication failed (HTTP {status}): {message}")]
    Auth { status: u16, message: String },

    #[error("Rate limit exceeded, retry after {retry_after_secs}s: {message}")]
    RateLimited { retry_after_secs: u64, message: String },

    #[error("Server error (HTTP {status}): {message}")]
    Server { status: u16, message: String },

    #[error("Not found: {message}")]
    NotFound { resource: Option<ResourceHint>, message: String },

    #[error("API error (HTTP {status}): {message}")]
    Api { status: u16, message: String },

    #[error("Failed to parse response: {0}")]
    Parse(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Invalid batch: {0}")]
    Validation(String),

    #[error("{failed} of {total} batches failed ({written} records written)", written = .created.len())]
    BatchFailures { failed: usize, total: usize, created: Vec<String> },

    #[error("Aborted after {failed} failed batches ({written} records written)", written = .created.len())]
    MultiBatchFailure { failed: usize, created: Vec<String> },

    #[error("Configuration error: {0}")]
    Config(String),
}

impl ApiError {
    /// Get the error category for this error
    pub fn category(&self) -> ApiErrorCategory {
        match self {
            Self::Auth { .. } => ApiErrorCategory::Authentication,
            Self::RateLimited { .. } => ApiErrorCategory::RateLimit,
            Self::Server { .. } => ApiErrorCategory::Server,
            Self::NotFound { .. } => ApiErrorCategory::NotFound,
            Self::Api { .. } => ApiErrorCategory::Client,
            Self::Parse(_) => ApiErrorCategory::Parse,
            Self::Network(_) => ApiErrorCategory::Network,
            Self::Validation(_) => ApiErrorCategory::Validation,
            Self::BatchFailures { .. } | Self::MultiBatchFailure { .. } => ApiErrorCategory::Batch,
            Self::Config(_) => ApiErrorCategory::Config,
        }
    }

    /// Only rate limiting and server errors are transient.
    pub fn is_retryable(&self) -> bool {
        matches!(self.category(), ApiErrorCategory::RateLimit | ApiErrorCategory::Server)
    }

    /// HTTP-status-like code carried by this error, if any
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Self::Auth { status, .. } | Self::Server { status, .. } | Self::Api { status, .. } => {
                Some(*status)
            }
            Self::RateLimited { .. } => Some(429),
            Self::NotFound { .. } => Some(404),
            Self::Validation(_) => Some(422),
            _ => None,
        }
    }

    /// Server-provided retry hint for rate limited responses
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::RateLimited { retry_after_secs, .. } => {
                Some(Duration::from_secs(*retry_after_secs))
            }
            _ => None,
        }
    }

    /// Resource id recovered from the failing endpoint, for not-found errors
    pub fn resource(&self) -> Option<&ResourceHint> {
        match self {
            Self::NotFound { resource, .. } => resource.as_ref(),
            _ => None,
        }
    }

    /// Ids of records written before a batch error was raised
    pub fn written_ids(&self) -> &[String] {
        match self {
            Self::BatchFailures { created, .. } | Self::MultiBatchFailure { created, .. } => {
                created
            }
            _ => &[],
        }
    }

    /// Display text capped at `max_len` characters
    pub fn truncated(&self, max_len: usize) -> String {
        truncate_with_suffix(&self.to_string(), max_len)
    }
}

/// External service a run talks to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Service {
    Source,
    Sink,
}

impl fmt::Display for Service {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Source => f.write_str("source"),
            Self::Sink => f.write_str("sink"),
        }
    }
}

/// Run-level error for a sync; every variant aborts the run
#[derive(Debug, Clone, Error, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "details")]
pub enum FlowSyncError {
    #[error("{service} connection test failed: {source}")]
    Connection { service: Service, source: ApiError },

    #[error("Failed to extract {stage}: {source}")]
    Extract { stage: String, source: ApiError },

    #[error("Failed to load records into '{table}': {source}")]
    Load { table: String, source: ApiError },

    #[error("Configuration error: {0}")]
    Config(String),
}

impl FlowSyncError {
    /// The underlying API error, when the failure came from a client call
    pub fn api_error(&self) -> Option<&ApiError> {
        match self {
            Self::Connection { source, .. }
            | Self::Extract { source, .. }
            | Self::Load { source, .. } => Some(source),
            Self::Config(_) => None,
        }
    }
}

/// Result type alias for FlowSync operations
pub type Result<T> = std::result::Result<T, FlowSyncError>;
