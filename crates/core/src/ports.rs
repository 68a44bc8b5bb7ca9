//! Port interfaces for the external APIs a sync talks to

use async_trait::async_trait;
use flowsync_domain::{
    ApiError, FailedFlowRecord, Flow, FlowAction, FlowMessage, Metric, MetricAggregateQuery,
    MetricAggregateResult,
};
use serde_json::Value;

/// Read-only access to the marketing automation API
///
/// Per-action lookups never fail: they degrade to an empty result and,
/// where the action itself is at fault, append to the client's own
/// failure list.
#[async_trait]
pub trait SourceApi: Send + Sync {
    /// Cheap authenticated request; success means credentials work
    async fn test_connection(&self) -> Result<(), ApiError>;

    /// All flows visible to the account
    async fn list_flows(&self) -> Result<Vec<Flow>, ApiError>;

    /// Actions of one flow; empty on invalid id or fetch failure
    async fn list_flow_actions(&mut self, flow_id: &str) -> Vec<FlowAction>;

    /// Messages of one action; empty (plus a failure record) when none
    /// could be fetched
    async fn list_flow_messages(&mut self, flow_action_id: &str) -> Vec<FlowMessage>;

    /// All metrics visible to the account
    async fn list_metrics(&self) -> Result<Vec<Metric>, ApiError>;

    /// Aggregate counts for one metric
    async fn query_metric_aggregate(
        &self,
        query: &MetricAggregateQuery,
    ) -> Result<MetricAggregateResult, ApiError>;

    /// Failures accumulated over the lifetime of this client, oldest first
    fn failed_flows(&self) -> &[FailedFlowRecord];
}

/// Write access to the records store
#[async_trait]
pub trait SinkApi: Send + Sync {
    /// Cheap authenticated request against a known table
    async fn test_connection(&self) -> Result<(), ApiError>;

    /// Create rows in `table`, returning the ids the store assigned.
    ///
    /// An error does not mean nothing was written; batch errors carry the
    /// ids created before the failure.
    async fn create_records(&self, table: &str, rows: &[Value]) -> Result<Vec<String>, ApiError>;
}
