//! Sync orchestration: connect, extract, enrich, load, report

pub mod metrics;
mod service;

pub use metrics::{count_growth, select_metric, MetricSelection, YearWindow, YearWindows};
pub use service::{SyncOptions, SyncService};
