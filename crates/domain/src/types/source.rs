//! Source-side entities
//!
//! Read-only views of what the marketing automation API returns. Nothing
//! here is mutated after it is fetched; relationships are id references.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::impl_domain_status_conversions;

/// Lifecycle status of a flow
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum FlowStatus {
    Active,
    Draft,
    Archived,
    #[default]
    Unknown,
}

impl_domain_status_conversions!(FlowStatus {
    Active => "active",
    Draft => "draft",
    Archived => "archived",
    Unknown => "unknown",
});

impl FlowStatus {
    /// Map the raw API status string, with the separate archived flag
    /// taking precedence.
    pub fn from_api(status: Option<&str>, archived: bool) -> Self {
        if archived {
            return Self::Archived;
        }

        match status.map(|s| s.trim().to_lowercase()).as_deref() {
            Some("live" | "active") => Self::Active,
            Some("draft" | "manual") => Self::Draft,
            Some("archived") => Self::Archived,
            _ => Self::Unknown,
        }
    }

    /// Human-facing label written to the sink
    pub fn label(&self) -> &'static str {
        match self {
            Self::Active => "Active",
            Self::Draft => "Draft",
            Self::Archived => "Archived",
            Self::Unknown => "Unknown",
        }
    }
}

/// An automation sequence
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Flow {
    pub id: String,
    pub name: String,
    pub status: FlowStatus,
    pub trigger_type: Option<String>,
    pub created: Option<DateTime<Utc>>,
    pub updated: Option<DateTime<Utc>>,
}

/// A step within a flow
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlowAction {
    pub id: String,
    pub flow_id: String,
    pub action_type: Option<String>,
    pub status: Option<String>,
    pub created: Option<DateTime<Utc>>,
    pub updated: Option<DateTime<Utc>>,
}

/// A concrete communication emitted by a flow action
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlowMessage {
    pub id: String,
    pub flow_action_id: String,
    pub name: Option<String>,
    pub channel: Option<String>,
    pub subject: Option<String>,
    pub status: Option<String>,
    /// Raw attribute object as returned by the API
    #[serde(default)]
    pub attributes: serde_json::Value,
}

/// A named event type the source system counts
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Metric {
    pub id: String,
    pub name: String,
    pub integration: Option<String>,
}

/// Request for aggregated metric counts
///
/// Serializes to the `attributes` object of a `metric-aggregate` request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricAggregateQuery {
    pub metric_id: String,
    pub interval: String,
    pub measurements: Vec<String>,
    pub timezone: String,
    /// Filter expressions, e.g. `greater-or-equal(datetime,2024-01-01T00:00:00)`
    pub filter: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub by: Vec<String>,
}

impl MetricAggregateQuery {
    pub fn new(metric_id: impl Into<String>) -> Self {
        Self {
            metric_id: metric_id.into(),
            interval: "month".to_string(),
            measurements: vec!["count".to_string()],
            timezone: "UTC".to_string(),
            filter: Vec::new(),
            by: Vec::new(),
        }
    }

    pub fn interval(mut self, interval: impl Into<String>) -> Self {
        self.interval = interval.into();
        self
    }

    pub fn measurement(mut self, measurement: impl Into<String>) -> Self {
        self.measurements = vec![measurement.into()];
        self
    }

    pub fn timezone(mut self, timezone: impl Into<String>) -> Self {
        self.timezone = timezone.into();
        self
    }

    pub fn filter(mut self, expression: impl Into<String>) -> Self {
        self.filter.push(expression.into());
        self
    }
}

/// One dimension group of an aggregate result
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct MetricAggregateBucket {
    #[serde(default)]
    pub dimensions: Vec<String>,
    /// Measurement name to one value per interval date
    #[serde(default)]
    pub measurements: HashMap<String, Vec<f64>>,
}

/// Aggregated metric counts, bucketed by interval
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct MetricAggregateResult {
    #[serde(default)]
    pub dates: Vec<String>,
    #[serde(default)]
    pub data: Vec<MetricAggregateBucket>,
}

impl MetricAggregateResult {
    /// Sum every bucket value of `measurement`; absent measurements count as 0.
    pub fn total(&self, measurement: &str) -> f64 {
        self.data
            .iter()
            .filter_map(|bucket| bucket.measurements.get(measurement))
            .flat_map(|values| values.iter().copied())
            .filter(|value| value.is_finite())
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn status_mapping_covers_api_values() {
        assert_eq!(FlowStatus::from_api(Some("live"), false), FlowStatus::Active);
        assert_eq!(FlowStatus::from_api(Some("Manual"), false), FlowStatus::Draft);
        assert_eq!(FlowStatus::from_api(Some("draft"), false), FlowStatus::Draft);
        assert_eq!(FlowStatus::from_api(Some("live"), true), FlowStatus::Archived);
        assert_eq!(FlowStatus::from_api(Some("paused"), false), FlowStatus::Unknown);
        assert_eq!(FlowStatus::from_api(None, false), FlowStatus::Unknown);
    }

    #[test]
    fn query_serializes_without_empty_grouping() {
        let query = MetricAggregateQuery::new("M1")
            .filter("greater-or-equal(datetime,2024-01-01T00:00:00)")
            .filter("less-than(datetime,2025-01-01T00:00:00)");
        let value = serde_json::to_value(&query).unwrap();

        assert_eq!(value["metric_id"], "M1");
        assert_eq!(value["measurements"], json!(["count"]));
        assert_eq!(value["filter"].as_array().unwrap().len(), 2);
        assert!(value.get("by").is_none());
    }

    #[test]
    fn total_sums_all_buckets() {
        let result: MetricAggregateResult = serde_json::from_value(json!({
            "dates": ["2024-01-01", "2024-02-01"],
            "data": [
                { "dimensions": [], "measurements": { "count": [10.0, 5.0] } },
                { "dimensions": ["x"], "measurements": { "count": [2.0, 3.0], "unique": [1.0] } }
            ]
        }))
        .unwrap();

        assert!((result.total("count") - 20.0).abs() < f64::EPSILON);
        assert!((result.total("sum_value")).abs() < f64::EPSILON);
    }
}
