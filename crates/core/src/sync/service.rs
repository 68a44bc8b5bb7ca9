//! Sync orchestrator - core business logic

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use flowsync_domain::constants::{DEFAULT_FAILURES_TABLE, DEFAULT_FLOWS_TABLE};
use flowsync_domain::{
    ApiError, Config, FailedFlowRecord, Flow, FlowError, FlowRecord, FlowSyncError, Metric,
    MetricAggregateQuery, Result, Service, SyncReport,
};
use serde_json::Value;
use tracing::{debug, info, instrument, warn};

use super::metrics::{count_growth, select_metric, MetricSelection, YearWindow, YearWindows};
use crate::ports::{SinkApi, SourceApi};

/// Settings the orchestrator needs beyond the two clients
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncOptions {
    pub flows_table: String,
    pub failures_table: String,
    pub timezone: String,
    pub interval: String,
    pub measurement: String,
    pub default_metric_name: Option<String>,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            flows_table: DEFAULT_FLOWS_TABLE.to_string(),
            failures_table: DEFAULT_FAILURES_TABLE.to_string(),
            timezone: "UTC".to_string(),
            interval: "month".to_string(),
            measurement: "count".to_string(),
            default_metric_name: Some("Received Email".to_string()),
        }
    }
}

impl SyncOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            flows_table: config.sink.flows_table.clone(),
            failures_table: config.sink.failures_table.clone(),
            timezone: config.sync.timezone.clone(),
            interval: config.sync.interval.clone(),
            measurement: config.sync.measurement.clone(),
            default_metric_name: config.sync.default_metric_name.clone(),
        }
    }
}

/// Year-over-year counts for one flow
#[derive(Debug, Clone, Copy, Default, PartialEq)]
struct FlowCounts {
    current: f64,
    previous: f64,
}

/// Runs one sync: connect, extract, enrich each flow, load, report
pub struct SyncService<S, K> {
    source: S,
    sink: K,
    options: SyncOptions,
}

impl<S, K> SyncService<S, K>
where
    S: SourceApi,
    K: SinkApi,
{
    /// Create a new sync service with default options
    pub fn new(source: S, sink: K) -> Self {
        Self { source, sink, options: SyncOptions::default() }
    }

    pub fn with_options(mut self, options: SyncOptions) -> Self {
        self.options = options;
        self
    }

    pub fn options(&self) -> &SyncOptions {
        &self.options
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn sink(&self) -> &K {
        &self.sink
    }

    /// Run a sync against the current clock
    pub async fn run(&mut self) -> Result<SyncReport> {
        self.run_at(Utc::now()).await
    }

    /// Run a sync with year windows computed from `now`.
    ///
    /// Only connection failures, extract failures and unrecoverable loads
    /// surface as errors; per-flow problems land in the report.
    #[instrument(skip(self), fields(flows_table = %self.options.flows_table))]
    pub async fn run_at(&mut self, now: DateTime<Utc>) -> Result<SyncReport> {
        let mut report = SyncReport::begin(now);
        let known_failures = self.source.failed_flows().len();
        info!(run_id = %report.run_id, "Starting sync run");

        self.connect().await?;

        let flows = self
            .source
            .list_flows()
            .await
            .map_err(|source| FlowSyncError::Extract { stage: "flows".into(), source })?;
        let metrics = self
            .source
            .list_metrics()
            .await
            .map_err(|source| FlowSyncError::Extract { stage: "metrics".into(), source })?;

        report.flows_processed = flows.len();
        report.total_metrics = metrics.len();
        info!(flows = flows.len(), metrics = metrics.len(), "Extracted source data");

        let windows = YearWindows::containing(now);
        let mut rows = Vec::with_capacity(flows.len());

        for flow in &flows {
            match self.enrich_flow(flow, &metrics, windows, now).await {
                Ok(record) => {
                    report.total_messages += record.message_count;
                    rows.push(record.to_sink_row());
                }
                Err(err) => {
                    warn!(flow_id = %flow.id, error = %err, "Flow enrichment failed");
                    report.flow_errors.push(FlowError {
                        flow_id: flow.id.clone(),
                        flow_name: flow.name.clone(),
                        message: err.to_string(),
                    });
                }
            }
        }

        report.failed_flows =
            self.source.failed_flows().iter().skip(known_failures).cloned().collect();
        self.load(&rows, &mut report).await?;

        let report = report.finish(Utc::now());
        info!(
            run_id = %report.run_id,
            flows_processed = report.flows_processed,
            flows_created = report.flows_created,
            flows_with_errors = report.flows_with_errors,
            failed_flows_reported = report.failed_flows_reported,
            "Sync run finished"
        );
        Ok(report)
    }

    async fn connect(&self) -> Result<()> {
        self.source
            .test_connection()
            .await
            .map_err(|source| FlowSyncError::Connection { service: Service::Source, source })?;
        self.sink
            .test_connection()
            .await
            .map_err(|source| FlowSyncError::Connection { service: Service::Sink, source })?;
        debug!("Source and sink connections verified");
        Ok(())
    }

    #[instrument(skip(self, flow, metrics, windows, now), fields(flow_id = %flow.id))]
    async fn enrich_flow(
        &mut self,
        flow: &Flow,
        metrics: &[Metric],
        windows: YearWindows,
        now: DateTime<Utc>,
    ) -> std::result::Result<FlowRecord, ApiError> {
        let actions = self.source.list_flow_actions(&flow.id).await;

        let mut message_count = 0;
        let mut channels = BTreeSet::new();
        for action in &actions {
            let messages = self.source.list_flow_messages(&action.id).await;
            message_count += messages.len();
            channels.extend(messages.into_iter().filter_map(|m| m.channel));
        }

        let selection = select_metric(
            &flow.id,
            &flow.name,
            metrics,
            self.options.default_metric_name.as_deref(),
        );
        let counts = match &selection {
            Some(selection) => self.year_counts(selection, windows).await?,
            None => {
                debug!("No metric matches flow; counts default to zero");
                FlowCounts::default()
            }
        };

        Ok(FlowRecord {
            flow_id: flow.id.clone(),
            flow_name: flow.name.clone(),
            status: flow.status,
            trigger_type: flow.trigger_type.clone(),
            created: flow.created,
            updated: flow.updated,
            action_count: actions.len(),
            message_count,
            channels: channels.into_iter().collect(),
            metric_name: selection.map(|s| s.metric.name.clone()),
            current_year_count: counts.current,
            previous_year_count: counts.previous,
            count_growth: count_growth(counts.current, counts.previous),
            last_synced: now,
        })
    }

    async fn year_counts(
        &self,
        selection: &MetricSelection<'_>,
        windows: YearWindows,
    ) -> std::result::Result<FlowCounts, ApiError> {
        let current = self.window_count(selection, windows.current).await?;
        let previous = self.window_count(selection, windows.previous).await?;
        Ok(FlowCounts { current, previous })
    }

    async fn window_count(
        &self,
        selection: &MetricSelection<'_>,
        window: YearWindow,
    ) -> std::result::Result<f64, ApiError> {
        let mut query = MetricAggregateQuery::new(&selection.metric.id)
            .interval(&self.options.interval)
            .measurement(&self.options.measurement)
            .timezone(&self.options.timezone);
        for expression in window.filters() {
            query = query.filter(expression);
        }
        if let Some(flow_filter) = &selection.flow_filter {
            query = query.filter(flow_filter);
        }

        let result = self.source.query_metric_aggregate(&query).await?;
        Ok(result.total(&self.options.measurement))
    }

    async fn load(&self, rows: &[Value], report: &mut SyncReport) -> Result<()> {
        let flows_table = &self.options.flows_table;

        if rows.is_empty() {
            info!("No flow records to load");
        } else {
            match self.sink.create_records(flows_table, rows).await {
                Ok(ids) => report.flows_created = ids.len(),
                Err(err @ ApiError::BatchFailures { .. }) => {
                    report.flows_created = err.written_ids().len();
                    warn!(table = %flows_table, error = %err, "Some flow batches failed to load");
                    report.load_warnings.push(format!("{flows_table}: {err}"));
                }
                Err(source) => {
                    return Err(FlowSyncError::Load { table: flows_table.clone(), source });
                }
            }
        }

        if !report.failed_flows.is_empty() {
            let failures_table = &self.options.failures_table;
            let failure_rows: Vec<Value> =
                report.failed_flows.iter().map(FailedFlowRecord::to_sink_row).collect();

            match self.sink.create_records(failures_table, &failure_rows).await {
                Ok(ids) => debug!(table = %failures_table, written = ids.len(), "Failures recorded"),
                Err(err) => {
                    warn!(table = %failures_table, error = %err, "Failed to record failed flows");
                    report.load_warnings.push(format!("{failures_table}: {err}"));
                }
            }
        }

        Ok(())
    }
}
