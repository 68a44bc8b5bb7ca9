//! Sink-side records
//!
//! The sink stores field maps keyed by column name. Rows handed to the
//! sink client may arrive bare or wrapped in a `{ "fields": ... }`
//! envelope; [`SinkRecord::from_row`] normalises both shapes.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use crate::constants::RESERVED_FIELD_KEYS;
use crate::errors::ApiError;
use crate::types::source::FlowStatus;

/// Column name to cell value
pub type FieldMap = Map<String, Value>;

/// A sanitized write-side record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SinkRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub fields: FieldMap,
}

impl SinkRecord {
    /// Validate and sanitize one caller-supplied row.
    ///
    /// Fails with [`ApiError::Validation`] for null or non-object rows, a
    /// `fields` envelope that is not an object, or a field map that is
    /// empty once reserved keys are removed.
    pub fn from_row(row: &Value) -> Result<Self, ApiError> {
        let object = match row {
            Value::Object(object) => object,
            Value::Null => return Err(ApiError::Validation("row is null".into())),
            other => {
                return Err(ApiError::Validation(format!(
                    "row must be an object, got {}",
                    json_kind(other)
                )))
            }
        };

        let id = object.get("id").and_then(Value::as_str).map(str::to_string);

        let mut fields = match object.get("fields") {
            Some(Value::Object(inner)) => inner.clone(),
            Some(other) => {
                return Err(ApiError::Validation(format!(
                    "fields must be an object, got {}",
                    json_kind(other)
                )))
            }
            None => object.clone(),
        };

        for key in RESERVED_FIELD_KEYS {
            fields.remove(key);
        }

        if fields.is_empty() {
            return Err(ApiError::Validation("row has no fields after sanitization".into()));
        }

        Ok(Self { id, fields })
    }

    /// Body entry for a batch create
    pub fn into_create_payload(self) -> Value {
        json!({ "fields": self.fields })
    }

    /// Body entry for a batch update; the record must carry an id.
    pub fn into_update_payload(self) -> Result<Value, ApiError> {
        match self.id {
            Some(id) if !id.trim().is_empty() => Ok(json!({ "id": id, "fields": self.fields })),
            _ => Err(ApiError::Validation("update row is missing a record id".into())),
        }
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// A record as stored in the sink
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredRecord {
    pub id: String,
    #[serde(default)]
    pub fields: FieldMap,
    #[serde(rename = "createdTime", default, skip_serializing_if = "Option::is_none")]
    pub created_time: Option<String>,
}

/// One row of the primary flows table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlowRecord {
    pub flow_id: String,
    pub flow_name: String,
    pub status: FlowStatus,
    pub trigger_type: Option<String>,
    pub created: Option<DateTime<Utc>>,
    pub updated: Option<DateTime<Utc>>,
    pub action_count: usize,
    pub message_count: usize,
    /// Distinct message channels, sorted
    pub channels: Vec<String>,
    pub metric_name: Option<String>,
    pub current_year_count: f64,
    pub previous_year_count: f64,
    pub count_growth: f64,
    pub last_synced: DateTime<Utc>,
}

impl FlowRecord {
    /// Field map keyed by sink column name; absent values are omitted.
    pub fn to_sink_row(&self) -> Value {
        let mut fields = Map::new();
        fields.insert("Flow ID".into(), json!(self.flow_id));
        fields.insert("Flow Name".into(), json!(self.flow_name));
        fields.insert("Status".into(), json!(self.status.label()));
        if let Some(trigger) = &self.trigger_type {
            fields.insert("Trigger Type".into(), json!(trigger));
        }
        if let Some(created) = self.created {
            fields.insert("Created".into(), json!(timestamp(created)));
        }
        if let Some(updated) = self.updated {
            fields.insert("Updated".into(), json!(timestamp(updated)));
        }
        fields.insert("Actions".into(), json!(self.action_count));
        fields.insert("Messages".into(), json!(self.message_count));
        if !self.channels.is_empty() {
            fields.insert("Channels".into(), json!(self.channels.join(", ")));
        }
        if let Some(metric) = &self.metric_name {
            fields.insert("Metric".into(), json!(metric));
        }
        fields.insert("Current Year Count".into(), json!(self.current_year_count));
        fields.insert("Previous Year Count".into(), json!(self.previous_year_count));
        fields.insert("Count Growth (%)".into(), json!(round2(self.count_growth)));
        fields.insert("Last Synced".into(), json!(timestamp(self.last_synced)));
        Value::Object(fields)
    }
}

pub(crate) fn timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Secs, true)
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
