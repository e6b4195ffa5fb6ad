//! HEC event envelope
//!
//! Every normalized record travels as a [`NormalizedEvent`]:
//!
//! ```json
//! {"time":1718000000.123,"index":"nautobot","source":"nautobot","sourcetype":"nautobot:dcim:device","event":{...},"host":"nb01"}
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// One event as accepted by the ingestion endpoint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedEvent {
    /// Epoch seconds with sub-second precision
    pub time: f64,
    pub index: String,
    pub source: String,
    pub sourcetype: String,
    pub event: Map<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,
}

impl NormalizedEvent {
    /// Serialize as one compact JSON line
    pub fn to_line(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

/// Envelope metadata shared by every event of a job
#[derive(Debug, Clone, PartialEq)]
pub struct EventTemplate {
    pub index: String,
    pub source: String,
    pub sourcetype: String,
    /// Host used when the record does not provide one
    pub default_host: Option<String>,
    /// Event field whose string value becomes the envelope host
    pub host_field: Option<String>,
}

impl EventTemplate {
    pub fn new(
        index: impl Into<String>,
        source: impl Into<String>,
        sourcetype: impl Into<String>,
    ) -> Self {
        Self {
            index: index.into(),
            source: source.into(),
            sourcetype: sourcetype.into(),
            default_host: None,
            host_field: None,
        }
    }

    pub fn with_default_host(mut self, host: Option<String>) -> Self {
        self.default_host = host;
        self
    }

    pub fn with_host_field(mut self, field: Option<String>) -> Self {
        self.host_field = field;
        self
    }

    /// Wrap an event body stamped with the current time
    pub fn wrap(&self, event: Map<String, Value>) -> NormalizedEvent {
        self.wrap_at(event, Utc::now())
    }

    /// Wrap an event body stamped with `at`
    pub fn wrap_at(&self, event: Map<String, Value>, at: DateTime<Utc>) -> NormalizedEvent {
        let host = self
            .host_field
            .as_ref()
            .and_then(|field| event.get(field))
            .and_then(|value| match value {
                Value::String(s) if !s.is_empty() => Some(s.clone()),
                Value::Number(n) => Some(n.to_string()),
                _ => None,
            })
            .or_else(|| self.default_host.clone());

        NormalizedEvent {
            time: at.timestamp_millis() as f64 / 1000.0,
            index: self.index.clone(),
            source: self.source.clone(),
            sourcetype: self.sourcetype.clone(),
            event,
            host,
        }
    }
}
