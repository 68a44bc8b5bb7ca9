use std::str::FromStr;

use flowsync_domain::{FlowSyncError, Result, SyncReport};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

/// Filter used when `RUST_LOG` is unset
pub const DEFAULT_LOG_FILTER: &str = "flowsync=info";

/// Output format of the tracing subscriber
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

impl FromStr for LogFormat {
    type Err = FlowSyncError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pretty" | "text" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(FlowSyncError::Config(format!("Unknown log format: {other}"))),
        }
    }
}

impl LogFormat {
    /// Read `FLOWSYNC_LOG_FORMAT`, falling back to pretty output.
    pub fn from_env() -> Self {
        std::env::var("FLOWSYNC_LOG_FORMAT").ok().and_then(|v| v.parse().ok()).unwrap_or_default()
    }
}

/// Install the global subscriber.
///
/// Returns `false` when a subscriber was already installed, so repeated
/// calls are harmless.
pub fn init_tracing(format: LogFormat) -> bool {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    let builder = tracing_subscriber::fmt().with_env_filter(filter).with_target(true);

    let installed = match format {
        LogFormat::Pretty => builder.try_init(),
        LogFormat::Json => builder.json().try_init(),
    };
    installed.is_ok()
}

/// Stable label for an error kind, safe for logs and metrics.
#[inline]
pub fn error_label(error: &FlowSyncError) -> &'static str {
    match error {
        FlowSyncError::Connection { .. } => "connection",
        FlowSyncError::Extract { .. } => "extract",
        FlowSyncError::Load { .. } => "load",
        FlowSyncError::Config(_) => "config",
    }
}

/// Log the outcome of a sync run with structured fields.
pub fn log_sync_outcome(outcome: &Result<SyncReport>) {
    match outcome {
        Ok(report) if report.is_clean() => info!(
            run_id = %report.run_id,
            flows_processed = report.flows_processed,
            flows_created = report.flows_created,
            total_messages = report.total_messages,
            "sync_completed"
        ),
        Ok(report) => warn!(
            run_id = %report.run_id,
            flows_processed = report.flows_processed,
            flows_created = report.flows_created,
            flows_with_errors = report.flows_with_errors,
            failed_flows_reported = report.failed_flows_reported,
            load_warnings = report.load_warnings.len(),
            "sync_completed_with_failures"
        ),
        Err(err) => error!(kind = error_label(err), error = %err, "sync_failed"),
    }
}
