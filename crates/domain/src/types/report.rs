//! Run bookkeeping: failure records, per-flow errors and the final report

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
#[cfg(feature = "ts-gen")]
use ts_rs::TS;
use uuid::Uuid;

use crate::constants::{MAX_REASON_LENGTH, REASON_AUTH, REASON_RATE_LIMIT};
use crate::errors::{ApiError, ApiErrorCategory};
use crate::impl_domain_status_conversions;
use crate::types::sink::timestamp;

/* -------------------------------------------------------------------------- */
/* Failure records */
/* -------------------------------------------------------------------------- */

/// Why a per-action fetch produced nothing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts-gen", derive(TS))]
#[cfg_attr(feature = "ts-gen", ts(export))]
#[serde(rename_all = "snake_case")]
pub enum FailureStatus {
    InvalidId,
    Empty,
    NotFound,
    Auth,
    RateLimited,
    Error,
}

impl_domain_status_conversions!(FailureStatus {
    InvalidId => "invalid_id",
    Empty => "empty",
    NotFound => "not_found",
    Auth => "auth",
    RateLimited => "rate_limited",
    Error => "error",
});

/// An action (or flow) that could not be enriched; reported, never retried
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts-gen", derive(TS))]
#[cfg_attr(feature = "ts-gen", ts(export))]
#[serde(rename_all = "camelCase")]
pub struct FailedFlowRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub flow_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub flow_action_id: Option<String>,
    pub reason: String,
    pub status: FailureStatus,
    #[cfg_attr(feature = "ts-gen", ts(type = "string"))]
    pub timestamp: DateTime<Utc>,
}

impl FailedFlowRecord {
    pub fn new(reason: impl Into<String>, status: FailureStatus) -> Self {
        Self {
            flow_id: None,
            flow_action_id: None,
            reason: reason.into(),
            status,
            timestamp: Utc::now(),
        }
    }

    /// Classify a fetch error. `not_found_reason` names the missing
    /// resource; other kinds get fixed reasons, and anything unexpected
    /// keeps its (truncated) message.
    pub fn from_error(error: &ApiError, not_found_reason: &str) -> Self {
        match error.category() {
            ApiErrorCategory::NotFound => Self::new(not_found_reason, FailureStatus::NotFound),
            ApiErrorCategory::Authentication => Self::new(REASON_AUTH, FailureStatus::Auth),
            ApiErrorCategory::RateLimit => Self::new(REASON_RATE_LIMIT, FailureStatus::RateLimited),
            _ => Self::new(error.truncated(MAX_REASON_LENGTH), FailureStatus::Error),
        }
    }

    pub fn with_flow(mut self, flow_id: impl Into<String>) -> Self {
        self.flow_id = Some(flow_id.into());
        self
    }

    pub fn with_action(mut self, flow_action_id: impl Into<String>) -> Self {
        self.flow_action_id = Some(flow_action_id.into());
        self
    }

    /// Field map for the failures table
    pub fn to_sink_row(&self) -> Value {
        let mut fields = Map::new();
        if let Some(flow_id) = &self.flow_id {
            fields.insert("Flow ID".into(), json!(flow_id));
        }
        if let Some(action_id) = &self.flow_action_id {
            fields.insert("Flow Action ID".into(), json!(action_id));
        }
        fields.insert("Reason".into(), json!(self.reason));
        fields.insert("Status".into(), json!(self.status.as_str()));
        fields.insert("Timestamp".into(), json!(timestamp(self.timestamp)));
        Value::Object(fields)
    }
}

/// A flow whose enrichment aborted
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts-gen", derive(TS))]
#[cfg_attr(feature = "ts-gen", ts(export))]
#[serde(rename_all = "camelCase")]
pub struct FlowError {
    pub flow_id: String,
    pub flow_name: String,
    pub message: String,
}

/* -------------------------------------------------------------------------- */
/* Sync report */
/* -------------------------------------------------------------------------- */

/// Outcome of one sync run
///
/// Returned even when individual flows or actions failed; those show up in
/// `flows_with_errors` and `failed_flows_reported`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts-gen", derive(TS))]
#[cfg_attr(feature = "ts-gen", ts(export))]
#[serde(rename_all = "camelCase")]
pub struct SyncReport {
    #[cfg_attr(feature = "ts-gen", ts(type = "string"))]
    pub run_id: Uuid,
    #[cfg_attr(feature = "ts-gen", ts(type = "string"))]
    pub started_at: DateTime<Utc>,
    #[cfg_attr(feature = "ts-gen", ts(type = "string"))]
    pub finished_at: DateTime<Utc>,
    pub flows_processed: usize,
    /// Records written to the primary table
    pub flows_created: usize,
    pub flows_with_errors: usize,
    pub failed_flows_reported: usize,
    pub total_metrics: usize,
    pub total_messages: usize,
    pub total_failures: usize,
    pub flow_errors: Vec<FlowError>,
    pub failed_flows: Vec<FailedFlowRecord>,
    pub load_warnings: Vec<String>,
}

impl SyncReport {
    /// Empty report for a run starting now
    pub fn begin(started_at: DateTime<Utc>) -> Self {
        Self {
            run_id: Uuid::now_v7(),
            started_at,
            finished_at: started_at,
            flows_processed: 0,
            flows_created: 0,
            flows_with_errors: 0,
            failed_flows_reported: 0,
            total_metrics: 0,
            total_messages: 0,
            total_failures: 0,
            flow_errors: Vec::new(),
            failed_flows: Vec::new(),
            load_warnings: Vec::new(),
        }
    }

    /// Stamp the finish time and derive the totals.
    pub fn finish(mut self, finished_at: DateTime<Utc>) -> Self {
        self.finished_at = finished_at;
        self.flows_with_errors = self.flow_errors.len();
        self.failed_flows_reported = self.failed_flows.len();
        self.total_failures = self.flows_with_errors + self.failed_flows_reported;
        self
    }

    /// No flow errors, no failure records, no load warnings
    pub fn is_clean(&self) -> bool {
        self.total_failures == 0 && self.load_warnings.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_kinds_map_to_reasons() {
        let not_found = ApiError::NotFound { resource: None, message: "gone".into() };
        let record = FailedFlowRecord::from_error(&not_found, "Action not found (404)");
        assert_eq!(record.status, FailureStatus::NotFound);
        assert_eq!(record.reason, "Action not found (404)");

        let auth = ApiError::Auth { status: 403, message: "denied".into() };
        assert_eq!(FailedFlowRecord::from_error(&auth, "").reason, REASON_AUTH);

        let limited = ApiError::RateLimited { retry_after_secs: 60, message: String::new() };
        assert_eq!(FailedFlowRecord::from_error(&limited, "").status, FailureStatus::RateLimited);

        let generic = ApiError::Parse("y".repeat(400));
        let record = FailedFlowRecord::from_error(&generic, "");
        assert_eq!(record.status, FailureStatus::Error);
        assert!(record.reason.chars().count() <= MAX_REASON_LENGTH);
    }

    #[test]
    fn failure_row_omits_missing_ids() {
        let row = FailedFlowRecord::new("Invalid action ID format", FailureStatus::InvalidId)
            .with_action("bad-id")
            .to_sink_row();

        assert_eq!(row["Flow Action ID"], "bad-id");
        assert_eq!(row["Status"], "invalid_id");
        assert!(row.get("Flow ID").is_none());
    }

    #[test]
    fn finish_derives_totals() {
        let mut report = SyncReport::begin(Utc::now());
        report.flow_errors.push(FlowError {
            flow_id: "F1".into(),
            flow_name: "Welcome".into(),
            message: "boom".into(),
        });
        report.failed_flows.push(FailedFlowRecord::new("x", FailureStatus::Empty));
        report.failed_flows.push(FailedFlowRecord::new("y", FailureStatus::Empty));

        let report = report.finish(Utc::now());
        assert_eq!(report.flows_with_errors, 1);
        assert_eq!(report.failed_flows_reported, 2);
        assert_eq!(report.total_failures, 3);
        assert!(!report.is_clean());
    }

    #[test]
    fn report_serializes_camel_case() {
        let value = serde_json::to_value(SyncReport::begin(Utc::now()).finish(Utc::now())).unwrap();
        assert!(value.get("flowsProcessed").is_some());
        assert!(value.get("failedFlowsReported").is_some());
    }
}
