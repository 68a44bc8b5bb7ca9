//! In-memory fakes for `SourceApi` and `SinkApi`

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use flowsync_core::ports::{SinkApi, SourceApi};
use flowsync_domain::constants::{REASON_FLOW_NOT_FOUND, REASON_NO_MESSAGES};
use flowsync_domain::{
    ApiError, FailedFlowRecord, FailureStatus, Flow, FlowAction, FlowMessage, FlowStatus, Metric,
    MetricAggregateBucket, MetricAggregateQuery, MetricAggregateResult,
};
use serde_json::Value;

pub fn flow(id: &str, name: &str) -> Flow {
    Flow {
        id: id.into(),
        name: name.into(),
        status: FlowStatus::Active,
        trigger_type: Some("Added to List".into()),
        created: None,
        updated: None,
    }
}

pub fn action(id: &str, flow_id: &str) -> FlowAction {
    FlowAction {
        id: id.into(),
        flow_id: flow_id.into(),
        action_type: Some("SEND_EMAIL".into()),
        status: Some("live".into()),
        created: None,
        updated: None,
    }
}

pub fn message(id: &str, action_id: &str, channel: &str) -> FlowMessage {
    FlowMessage {
        id: id.into(),
        flow_action_id: action_id.into(),
        name: Some(format!("Message {id}")),
        channel: Some(channel.into()),
        subject: None,
        status: Some("live".into()),
        attributes: Value::Null,
    }
}

pub fn metric(id: &str, name: &str) -> Metric {
    Metric { id: id.into(), name: name.into(), integration: Some("Klaviyo".into()) }
}

/// Scripted source. Action lookups for flows in `missing_flows` behave
/// like a 404 and are recorded as failures.
#[derive(Default)]
pub struct FakeSource {
    pub connection_error: Option<ApiError>,
    pub flows_error: Option<ApiError>,
    pub flows: Vec<Flow>,
    pub metrics: Vec<Metric>,
    pub actions: HashMap<String, Vec<FlowAction>>,
    pub missing_flows: HashSet<String>,
    pub messages: HashMap<String, Vec<FlowMessage>>,
    /// Count returned per window start year, e.g. `"2025" => 150.0`
    pub counts_by_year: HashMap<String, f64>,
    pub failing_metrics: HashSet<String>,
    pub queries: Arc<Mutex<Vec<MetricAggregateQuery>>>,
    pub failed: Vec<FailedFlowRecord>,
}

impl FakeSource {
    pub fn with_flow(mut self, flow: Flow, actions: Vec<FlowAction>) -> Self {
        self.actions.insert(flow.id.clone(), actions);
        self.flows.push(flow);
        self
    }

    pub fn with_messages(mut self, action_id: &str, messages: Vec<FlowMessage>) -> Self {
        self.messages.insert(action_id.to_string(), messages);
        self
    }

    pub fn with_metric(mut self, metric: Metric) -> Self {
        self.metrics.push(metric);
        self
    }

    pub fn with_count(mut self, year: &str, count: f64) -> Self {
        self.counts_by_year.insert(year.to_string(), count);
        self
    }

    pub fn recorded_queries(&self) -> Vec<MetricAggregateQuery> {
        self.queries.lock().unwrap().clone()
    }
}

#[async_trait]
impl SourceApi for FakeSource {
    async fn test_connection(&self) -> Result<(), ApiError> {
        self.connection_error.clone().map_or(Ok(()), Err)
    }

    async fn list_flows(&self) -> Result<Vec<Flow>, ApiError> {
        self.flows_error.clone().map_or_else(|| Ok(self.flows.clone()), Err)
    }

    async fn list_flow_actions(&mut self, flow_id: &str) -> Vec<FlowAction> {
        if self.missing_flows.contains(flow_id) {
            self.failed.push(
                FailedFlowRecord::new(REASON_FLOW_NOT_FOUND, FailureStatus::NotFound)
                    .with_flow(flow_id),
            );
            return Vec::new();
        }
        self.actions.get(flow_id).cloned().unwrap_or_default()
    }

    async fn list_flow_messages(&mut self, flow_action_id: &str) -> Vec<FlowMessage> {
        match self.messages.get(flow_action_id) {
            Some(messages) if !messages.is_empty() => messages.clone(),
            _ => {
                self.failed.push(
                    FailedFlowRecord::new(REASON_NO_MESSAGES, FailureStatus::Empty)
                        .with_action(flow_action_id),
                );
                Vec::new()
            }
        }
    }

    async fn list_metrics(&self) -> Result<Vec<Metric>, ApiError> {
        Ok(self.metrics.clone())
    }

    async fn query_metric_aggregate(
        &self,
        query: &MetricAggregateQuery,
    ) -> Result<MetricAggregateResult, ApiError> {
        self.queries.lock().unwrap().push(query.clone());

        if self.failing_metrics.contains(&query.metric_id) {
            return Err(ApiError::Api { status: 400, message: "invalid filter".into() });
        }

        let count = query
            .filter
            .first()
            .and_then(|f| self.counts_by_year.iter().find(|(year, _)| f.contains(year.as_str())))
            .map_or(0.0, |(_, count)| *count);

        Ok(MetricAggregateResult {
            dates: vec!["2025-01-01".into()],
            data: vec![MetricAggregateBucket {
                dimensions: Vec::new(),
                measurements: HashMap::from([("count".to_string(), vec![count])]),
            }],
        })
    }

    fn failed_flows(&self) -> &[FailedFlowRecord] {
        &self.failed
    }
}

/// Sink storing rows per table; tables in `errors` fail with that error
#[derive(Default, Clone)]
pub struct FakeSink {
    pub connection_error: Option<ApiError>,
    pub errors: HashMap<String, ApiError>,
    pub tables: Arc<Mutex<HashMap<String, Vec<Value>>>>,
}

impl FakeSink {
    pub fn failing(mut self, table: &str, error: ApiError) -> Self {
        self.errors.insert(table.to_string(), error);
        self
    }

    pub fn rows(&self, table: &str) -> Vec<Value> {
        self.tables.lock().unwrap().get(table).cloned().unwrap_or_default()
    }
}

#[async_trait]
impl SinkApi for FakeSink {
    async fn test_connection(&self) -> Result<(), ApiError> {
        self.connection_error.clone().map_or(Ok(()), Err)
    }

    async fn create_records(&self, table: &str, rows: &[Value]) -> Result<Vec<String>, ApiError> {
        if let Some(error) = self.errors.get(table) {
            return Err(error.clone());
        }

        let mut tables = self.tables.lock().unwrap();
        let stored = tables.entry(table.to_string()).or_default();
        let ids = (stored.len()..stored.len() + rows.len()).map(|i| format!("rec{i}")).collect();
        stored.extend(rows.iter().cloned());
        Ok(ids)
    }
}
