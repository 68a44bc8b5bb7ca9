//! Metric matching and year-over-year arithmetic
//!
//! Metrics relate to flows only by name, so matching is heuristic: a
//! metric whose name overlaps the flow name wins, otherwise the configured
//! default metric is narrowed to the flow with an attribution filter.

use chrono::{DateTime, Datelike, Utc};
use flowsync_domain::utils::text::names_overlap;
use flowsync_domain::Metric;

/// Metric chosen for one flow, plus any extra filter narrowing it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetricSelection<'a> {
    pub metric: &'a Metric,
    pub flow_filter: Option<String>,
}

/// Pick the metric used to count a flow's activity.
///
/// Returns `None` when nothing overlaps the flow name and no default metric
/// is available.
pub fn select_metric<'a>(
    flow_id: &str,
    flow_name: &str,
    metrics: &'a [Metric],
    default_metric_name: Option<&str>,
) -> Option<MetricSelection<'a>> {
    if let Some(metric) = metrics.iter().find(|m| names_overlap(&m.name, flow_name)) {
        return Some(MetricSelection { metric, flow_filter: None });
    }

    let default_name = default_metric_name?;
    metrics.iter().find(|m| m.name.eq_ignore_ascii_case(default_name)).map(|metric| {
        MetricSelection {
            metric,
            flow_filter: Some(format!("equals($attributed_flow,\"{flow_id}\")")),
        }
    })
}

/// Calendar year as a half-open `[Jan 1, Jan 1 next year)` range
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct YearWindow {
    pub year: i32,
}

impl YearWindow {
    pub fn start(&self) -> String {
        format!("{:04}-01-01T00:00:00", self.year)
    }

    pub fn end(&self) -> String {
        format!("{:04}-01-01T00:00:00", self.year + 1)
    }

    /// Aggregate filter expressions bounding this year
    pub fn filters(&self) -> [String; 2] {
        [
            format!("greater-or-equal(datetime,{})", self.start()),
            format!("less-than(datetime,{})", self.end()),
        ]
    }
}

/// Current and previous calendar years relative to a clock reading
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct YearWindows {
    pub current: YearWindow,
    pub previous: YearWindow,
}

impl YearWindows {
    pub fn containing(now: DateTime<Utc>) -> Self {
        let year = now.year();
        Self { current: YearWindow { year }, previous: YearWindow { year: year - 1 } }
    }
}

/// Percentage change from `previous` to `current`; 0 when there is no
/// previous baseline.
pub fn count_growth(current: f64, previous: f64) -> f64 {
    if previous > 0.0 {
        (current - previous) / previous * 100.0
    } else {
        0.0
    }
}
