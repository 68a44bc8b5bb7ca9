//! Integration tests for the sync orchestrator using in-memory ports

mod support;

use chrono::{TimeZone, Utc};
use flowsync_core::ports::SourceApi;
use flowsync_core::{SyncOptions, SyncService};
use flowsync_domain::{ApiError, FailureStatus, FlowSyncError, Service};
use support::fakes::{action, flow, message, metric, FakeSink, FakeSource};

fn mid_2025() -> chrono::DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 6, 15, 9, 0, 0).unwrap()
}

fn two_flow_source() -> FakeSource {
    let mut source = FakeSource::default()
        .with_flow(flow("FlowA", "Welcome Series"), vec![action("1001", "FlowA")])
        .with_messages("1001", vec![message("m1", "1001", "email"), message("m2", "1001", "sms")])
        .with_flow(flow("FlowB", "Browse Abandonment"), Vec::new())
        .with_metric(metric("M1", "Received Email"))
        .with_count("2025", 150.0)
        .with_count("2024", 100.0);
    source.missing_flows.insert("FlowB".into());
    source
}

#[tokio::test]
async fn end_to_end_with_missing_flow_actions() {
    let sink = FakeSink::default();
    let mut service = SyncService::new(two_flow_source(), sink.clone());

    let report = service.run_at(mid_2025()).await.unwrap();

    assert_eq!(report.flows_processed, 2);
    assert_eq!(report.flows_created, 2);
    assert_eq!(report.flows_with_errors, 0);
    assert!(report.failed_flows_reported >= 1);
    assert_eq!(report.total_messages, 2);
    assert_eq!(report.total_metrics, 1);
    assert_eq!(report.total_failures, report.failed_flows_reported);

    let flows = sink.rows("Flows");
    assert_eq!(flows.len(), 2);
    assert_eq!(flows[0]["Flow ID"], "FlowA");
    assert_eq!(flows[0]["Messages"], 2);
    assert_eq!(flows[0]["Channels"], "email, sms");
    assert_eq!(flows[0]["Count Growth (%)"], 50.0);
    assert_eq!(flows[1]["Actions"], 0);

    let failures = sink.rows("Failed Flows");
    assert_eq!(failures.len(), report.failed_flows_reported);
    assert_eq!(failures[0]["Flow ID"], "FlowB");
    assert_eq!(failures[0]["Status"], "not_found");
}

#[tokio::test]
async fn source_keeps_failures_and_each_run_reports_its_own() {
    let sink = FakeSink::default();
    let mut service = SyncService::new(two_flow_source(), sink.clone());

    let first = service.run_at(mid_2025()).await.unwrap();
    assert_eq!(service.source().failed_flows().len(), first.failed_flows_reported);
    assert_eq!(service.source().failed_flows()[0].flow_id.as_deref(), Some("FlowB"));

    let second = service.run_at(mid_2025()).await.unwrap();
    assert_eq!(second.failed_flows_reported, first.failed_flows_reported);
    assert_eq!(second.failed_flows[0].flow_id.as_deref(), Some("FlowB"));
    assert_eq!(service.source().failed_flows().len(), 2 * first.failed_flows_reported);
}

#[tokio::test]
async fn default_metric_queries_are_attributed_to_flow() {
    let mut service = SyncService::new(two_flow_source(), FakeSink::default());
    service.run_at(mid_2025()).await.unwrap();

    let queries = service.source().recorded_queries();
    // two windows per flow
    assert_eq!(queries.len(), 4);
    assert!(queries.iter().all(|q| q.metric_id == "M1"));
    assert_eq!(queries[0].filter[0], "greater-or-equal(datetime,2025-01-01T00:00:00)");
    assert_eq!(queries[1].filter[1], "less-than(datetime,2025-01-01T00:00:00)");
    assert_eq!(queries[0].filter[2], "equals($attributed_flow,\"FlowA\")");
}

#[tokio::test]
async fn no_metrics_means_zero_counts_and_no_queries() {
    let mut source = two_flow_source();
    source.metrics.clear();
    let sink = FakeSink::default();
    let mut service = SyncService::new(source, sink.clone());

    let report = service.run_at(mid_2025()).await.unwrap();

    assert!(service.source().recorded_queries().is_empty());
    assert_eq!(report.flows_created, 2);
    assert_eq!(sink.rows("Flows")[0]["Current Year Count"], 0.0);
    assert!(sink.rows("Flows")[0].get("Metric").is_none());
}

#[tokio::test]
async fn aggregate_failure_is_isolated_to_its_flow() {
    let mut source = FakeSource::default()
        .with_flow(flow("F1", "Welcome Series"), vec![action("11", "F1")])
        .with_messages("11", vec![message("m1", "11", "email")])
        .with_flow(flow("F2", "Abandoned Cart"), vec![action("22", "F2")])
        .with_messages("22", vec![message("m2", "22", "email")])
        .with_metric(metric("M1", "Received Email"))
        .with_metric(metric("M2", "Welcome Series Signup"));
    source.failing_metrics.insert("M2".into());
    let sink = FakeSink::default();
    let mut service = SyncService::new(source, sink.clone());

    let report = service.run_at(mid_2025()).await.unwrap();

    assert_eq!(report.flows_processed, 2);
    assert_eq!(report.flows_created, 1);
    assert_eq!(report.flows_with_errors, 1);
    assert_eq!(report.flow_errors[0].flow_id, "F1");
    assert!(report.flow_errors[0].message.contains("invalid filter"));
    assert_eq!(sink.rows("Flows")[0]["Flow ID"], "F2");
    assert!(!report.is_clean());
}

#[tokio::test]
async fn action_without_messages_is_reported() {
    let source = FakeSource::default()
        .with_flow(flow("F1", "Welcome"), vec![action("11", "F1")])
        .with_metric(metric("M1", "Received Email"));
    let sink = FakeSink::default();
    let mut service = SyncService::new(source, sink.clone());

    let report = service.run_at(mid_2025()).await.unwrap();

    assert_eq!(report.failed_flows_reported, 1);
    assert_eq!(report.failed_flows[0].status, FailureStatus::Empty);
    assert_eq!(report.failed_flows[0].flow_action_id.as_deref(), Some("11"));
    assert_eq!(sink.rows("Failed Flows").len(), 1);
}

#[tokio::test]
async fn source_connection_failure_is_fatal() {
    let source = FakeSource {
        connection_error: Some(ApiError::Auth { status: 401, message: "bad key".into() }),
        ..two_flow_source()
    };
    let sink = FakeSink::default();
    let mut service = SyncService::new(source, sink.clone());

    let err = service.run_at(mid_2025()).await.unwrap_err();

    assert!(matches!(err, FlowSyncError::Connection { service: Service::Source, .. }));
    assert!(sink.rows("Flows").is_empty());
}

#[tokio::test]
async fn sink_connection_failure_is_fatal() {
    let sink = FakeSink {
        connection_error: Some(ApiError::NotFound { resource: None, message: "no base".into() }),
        ..FakeSink::default()
    };
    let mut service = SyncService::new(two_flow_source(), sink);

    let err = service.run_at(mid_2025()).await.unwrap_err();
    assert!(matches!(err, FlowSyncError::Connection { service: Service::Sink, .. }));
}

#[tokio::test]
async fn flow_listing_failure_aborts_run() {
    let source = FakeSource {
        flows_error: Some(ApiError::Server { status: 503, message: "down".into() }),
        ..FakeSource::default()
    };
    let mut service = SyncService::new(source, FakeSink::default());

    let err = service.run_at(mid_2025()).await.unwrap_err();
    assert!(matches!(err, FlowSyncError::Extract { ref stage, .. } if stage == "flows"));
}

#[tokio::test]
async fn multi_batch_failure_on_primary_table_is_fatal() {
    let sink = FakeSink::default().failing(
        "Flows",
        ApiError::MultiBatchFailure { failed: 3, created: vec!["rec0".into()] },
    );
    let mut service = SyncService::new(two_flow_source(), sink);

    let err = service.run_at(mid_2025()).await.unwrap_err();

    match err {
        FlowSyncError::Load { table, source } => {
            assert_eq!(table, "Flows");
            assert_eq!(source.written_ids(), ["rec0".to_string()]);
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn partial_batch_failure_keeps_written_count() {
    let sink = FakeSink::default().failing(
        "Flows",
        ApiError::BatchFailures { failed: 1, total: 2, created: vec!["rec0".into()] },
    );
    let mut service = SyncService::new(two_flow_source(), sink);

    let report = service.run_at(mid_2025()).await.unwrap();

    assert_eq!(report.flows_created, 1);
    assert_eq!(report.load_warnings.len(), 1);
    assert!(report.load_warnings[0].starts_with("Flows:"));
}

#[tokio::test]
async fn failures_table_error_only_warns() {
    let sink = FakeSink::default()
        .failing("Failed Flows", ApiError::NotFound { resource: None, message: "no table".into() });
    let mut service = SyncService::new(two_flow_source(), sink.clone());

    let report = service.run_at(mid_2025()).await.unwrap();

    assert_eq!(report.flows_created, 2);
    assert_eq!(report.load_warnings.len(), 1);
    assert_eq!(sink.rows("Flows").len(), 2);
}

#[tokio::test]
async fn custom_table_names_are_used() {
    let options = SyncOptions {
        flows_table: "Automations".into(),
        failures_table: "Automation Errors".into(),
        ..SyncOptions::default()
    };
    let sink = FakeSink::default();
    let mut service = SyncService::new(two_flow_source(), sink.clone()).with_options(options);

    service.run_at(mid_2025()).await.unwrap();

    assert_eq!(sink.rows("Automations").len(), 2);
    assert!(!sink.rows("Automation Errors").is_empty());
    assert!(sink.rows("Flows").is_empty());
}
