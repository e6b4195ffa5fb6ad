//! Field dropper transformer
//!
//! Removes blacklisted top-level fields from records, typically sensitive or
//! bulky fields that should never reach the event index.

use crate::etl::Transformer;
use eyre::Result;
use serde_json::Value;

/// Transformer that drops specified fields from objects
///
/// This is used before shipping records to remove fields like:
/// - custom_fields (raw custom-field blobs)
/// - local_config_context_data / local_context_data
/// - secrets_group, config_context
///
/// # Example
/// ```
/// use nautobot_hec_exporter::transform::FieldDropper;
/// use nautobot_hec_exporter::etl::Transformer;
/// use serde_json::json;
///
/// let dropper = FieldDropper::new(vec!["custom_fields", "local_context_data"]);
/// let input = json!({
///     "name": "sw1",
///     "custom_fields": {"owner": "netops"},
///     "local_context_data": {"ntp": ["10.0.0.1"]}
/// });
///
/// let output = dropper.transform(input).unwrap();
/// assert!(!output.as_object().unwrap().contains_key("custom_fields"));
/// assert!(!output.as_object().unwrap().contains_key("local_context_data"));
/// assert_eq!(output["name"], "sw1");
/// ```
#[derive(Debug, Clone, Default)]
pub struct FieldDropper {
    fields: Vec<String>,
}

impl FieldDropper {
    /// Create a new field dropper with the specified fields to remove
    pub fn new<S: AsRef<str>>(fields: impl IntoIterator<Item = S>) -> Self {
        Self {
            fields: fields.into_iter().map(|s| s.as_ref().to_string()).collect(),
        }
    }

    /// Create a field dropper with the fields Nautobot exports should never ship
    ///
    /// Drops: custom_fields, computed_fields, config_context,
    /// local_config_context_data, local_context_data, secrets_group, notes_url
    pub fn default_nautobot_fields() -> Self {
        Self::new(DEFAULT_BLACKLIST)
    }

    pub fn fields(&self) -> &[String] {
        &self.fields
    }

    /// Remove the blacklisted keys from a mapping in place
    pub fn drop_from(&self, obj: &mut serde_json::Map<String, Value>) {
        for field in &self.fields {
            obj.remove(field);
        }
    }
}

/// Fields dropped when a job does not name its own blacklist
pub const DEFAULT_BLACKLIST: &[&str] = &[
    "custom_fields",
    "computed_fields",
    "config_context",
    "local_config_context_data",
    "local_context_data",
    "secrets_group",
    "notes_url",
];

impl Transformer for FieldDropper {
    type Input = Value;
    type Output = Value;

    fn transform(&self, mut input: Self::Input) -> Result<Self::Output> {
        if let Some(obj) = input.as_object_mut() {
            self.drop_from(obj);
        }
        Ok(input)
    }
}
