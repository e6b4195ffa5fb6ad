//! Deep flattening with timestamp normalization

use chrono::{DateTime, NaiveDate, NaiveDateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeSet;

/// How timestamp fields are rendered in events
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimestampStyle {
    /// RFC 3339 in UTC, e.g. `2024-05-01T10:00:00Z`
    #[default]
    Iso8601,
    /// Whole epoch seconds as a string, e.g. `"1714557600"`
    EpochSeconds,
    /// Leave the source representation alone
    Preserve,
}

/// Default field names treated as timestamps
pub const DEFAULT_TIMESTAMP_FIELDS: &[&str] = &["created", "last_updated"];

/// Recursively rebuilds a record, normalizing timestamp fields
#[derive(Debug, Clone)]
pub struct Flattener {
    style: TimestampStyle,
    timestamp_fields: BTreeSet<String>,
}

impl Default for Flattener {
    fn default() -> Self {
        Self::new(TimestampStyle::default())
    }
}

impl Flattener {
    pub fn new(style: TimestampStyle) -> Self {
        Self {
            style,
            timestamp_fields: DEFAULT_TIMESTAMP_FIELDS
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }

    pub fn with_timestamp_fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.timestamp_fields = fields.into_iter().map(Into::into).collect();
        self
    }

    pub fn flatten(&self, fields: Map<String, Value>) -> Map<String, Value> {
        fields
            .into_iter()
            .map(|(key, value)| {
                let value = if self.timestamp_fields.contains(&key) {
                    self.timestamp(value)
                } else {
                    self.flatten_value(value)
                };
                (key, value)
            })
            .collect()
    }

    fn flatten_value(&self, value: Value) -> Value {
        match value {
            Value::Object(map) => Value::Object(self.flatten(map)),
            Value::Array(items) => {
                Value::Array(items.into_iter().map(|v| self.flatten_value(v)).collect())
            }
            scalar => scalar,
        }
    }

    fn timestamp(&self, value: Value) -> Value {
        let Value::String(raw) = &value else {
            return self.flatten_value(value);
        };
        if self.style == TimestampStyle::Preserve {
            return value;
        }
        match parse_timestamp(raw) {
            Some(at) => Value::String(match self.style {
                TimestampStyle::EpochSeconds => at.timestamp().to_string(),
                _ => at.to_rfc3339_opts(SecondsFormat::AutoSi, true),
            }),
            None => {
                log::trace!("Leaving unparseable timestamp '{}' as-is", raw);
                value
            }
        }
    }
}

/// Parse the timestamp shapes Nautobot emits: RFC 3339, naive date-time, or a
/// bare date (midnight UTC)
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(at) = DateTime::parse_from_rfc3339(raw) {
        return Some(at.with_timezone(&Utc));
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f") {
        return Some(naive.and_utc());
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}
