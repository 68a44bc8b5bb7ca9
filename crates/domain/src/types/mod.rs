//! Domain types and models

pub mod report;
pub mod sink;
pub mod source;

pub use report::{FailedFlowRecord, FailureStatus, FlowError, SyncReport};
pub use sink::{FieldMap, FlowRecord, SinkRecord, StoredRecord};
pub use source::{
    Flow, FlowAction, FlowMessage, FlowStatus, Metric, MetricAggregateBucket,
    MetricAggregateQuery, MetricAggregateResult,
};
