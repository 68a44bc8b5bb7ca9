/// JSON:API wire types for the marketing automation API
use chrono::{DateTime, Utc};
use flowsync_domain::{Flow, FlowAction, FlowMessage, FlowStatus, Metric, MetricAggregateResult};
use serde::Deserialize;
use serde_json::Value;

/// Resource type of messages in an action's `included` list
pub const FLOW_MESSAGE_TYPE: &str = "flow-message";

/// A JSON:API resource object
#[derive(Debug, Clone, Deserialize)]
#[serde(bound(deserialize = "A: Deserialize<'de> + Default"))]
pub struct Resource<A> {
    pub id: String,
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub attributes: A,
}

/// Pagination links of a collection document
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Links {
    #[serde(default)]
    pub next: Option<String>,
}

/// A collection document: `data` is an array
#[derive(Debug, Clone, Deserialize)]
#[serde(bound(deserialize = "A: Deserialize<'de> + Default"))]
pub struct CollectionDocument<A> {
    #[serde(default = "Vec::new")]
    pub data: Vec<Resource<A>>,
    #[serde(default)]
    pub links: Links,
}

/// A single-resource document carrying side-loaded `included` resources
#[derive(Debug, Clone, Deserialize)]
pub struct IncludedDocument {
    #[serde(default)]
    pub included: Option<Vec<Resource<Value>>>,
}

/// A single-resource document
#[derive(Debug, Clone, Deserialize)]
#[serde(bound(deserialize = "A: Deserialize<'de> + Default"))]
pub struct SingleDocument<A> {
    pub data: Resource<A>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct FlowAttributes {
    pub name: Option<String>,
    pub status: Option<String>,
    #[serde(default)]
    pub archived: bool,
    pub trigger_type: Option<String>,
    pub created: Option<String>,
    pub updated: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct FlowActionAttributes {
    pub action_type: Option<String>,
    pub status: Option<String>,
    pub created: Option<String>,
    pub updated: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct MetricAttributes {
    pub name: Option<String>,
    #[serde(default)]
    pub integration: Option<Value>,
}

/// Lenient timestamp parsing; the API mixes offsets and `Z` suffixes.
fn timestamp(raw: Option<&str>) -> Option<DateTime<Utc>> {
    raw.and_then(|s| DateTime::parse_from_rfc3339(s).ok()).map(|dt| dt.with_timezone(&Utc))
}

impl Resource<FlowAttributes> {
    pub fn into_flow(self) -> Flow {
        let attrs = self.attributes;
        Flow {
            status: FlowStatus::from_api(attrs.status.as_deref(), attrs.archived),
            name: attrs.name.unwrap_or_else(|| format!("Flow {}", self.id)),
            trigger_type: attrs.trigger_type,
            created: timestamp(attrs.created.as_deref()),
            updated: timestamp(attrs.updated.as_deref()),
            id: self.id,
        }
    }
}

impl Resource<FlowActionAttributes> {
    pub fn into_flow_action(self, flow_id: &str) -> FlowAction {
        let attrs = self.attributes;
        FlowAction {
            id: self.id,
            flow_id: flow_id.to_string(),
            action_type: attrs.action_type,
            status: attrs.status,
            created: timestamp(attrs.created.as_deref()),
            updated: timestamp(attrs.updated.as_deref()),
        }
    }
}

impl Resource<Value> {
    /// Messages keep their raw attributes; channel and subject are read
    /// from either the flat or the `definition` layout.
    pub fn into_flow_message(self, flow_action_id: &str) -> FlowMessage {
        let attrs = self.attributes;
        let text = |pointer: &str| attrs.pointer(pointer).and_then(Value::as_str).map(str::to_string);

        FlowMessage {
            id: self.id,
            flow_action_id: flow_action_id.to_string(),
            name: text("/name"),
            channel: text("/channel").or_else(|| text("/definition/channel")),
            subject: text("/content/subject").or_else(|| text("/definition/content/subject")),
            status: text("/status"),
            attributes: attrs,
        }
    }
}

impl Resource<MetricAttributes> {
    pub fn into_metric(self) -> Metric {
        let attrs = self.attributes;
        let integration = attrs.integration.as_ref().and_then(|integration| match integration {
            Value::String(name) => Some(name.clone()),
            other => other.get("name").and_then(Value::as_str).map(str::to_string),
        });

        Metric { name: attrs.name.unwrap_or_default(), integration, id: self.id }
    }
}

impl SingleDocument<MetricAggregateResult> {
    pub fn into_result(self) -> MetricAggregateResult {
        self.data.attributes
    }
}
