//! Raw record capability
//!
//! The normalizer accepts anything that can be asked for its field mapping.
//! Three shapes are supported:
//! - a native JSON mapping ([`Map`] or an object [`Value`])
//! - any `Serialize` type, wrapped in [`Serialized`]
//! - a plain [`AttributeBag`] of name/value pairs

use eyre::{Result, eyre};
use serde::Serialize;
use serde_json::{Map, Value};

/// Something that can hand over its fields as a JSON mapping
pub trait Record {
    /// Consume the record and return its fields
    ///
    /// # Errors
    /// Returns an error if the record does not describe a mapping
    fn into_fields(self) -> Result<Map<String, Value>>;
}

impl Record for Map<String, Value> {
    fn into_fields(self) -> Result<Map<String, Value>> {
        Ok(self)
    }
}

impl Record for Value {
    fn into_fields(self) -> Result<Map<String, Value>> {
        match self {
            Value::Object(map) => Ok(map),
            other => Err(eyre!(
                "record must be a JSON object, got {}",
                kind_of(&other)
            )),
        }
    }
}

/// Record backed by any serializable type
///
/// # Example
/// ```
/// use nautobot_hec_exporter::transform::{Record, Serialized};
/// use serde::Serialize;
///
/// #[derive(Serialize)]
/// struct Vlan {
///     vid: u16,
///     name: String,
/// }
///
/// let fields = Serialized(Vlan { vid: 10, name: "users".into() })
///     .into_fields()
///     .unwrap();
/// assert_eq!(fields["vid"], 10);
/// ```
pub struct Serialized<T>(pub T);

impl<T: Serialize> Record for Serialized<T> {
    fn into_fields(self) -> Result<Map<String, Value>> {
        serde_json::to_value(&self.0)?.into_fields()
    }
}

/// Record made of loose attributes
///
/// Later attributes overwrite earlier ones with the same name.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AttributeBag {
    attributes: Vec<(String, Value)>,
}

impl AttributeBag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.attributes.push((name.into(), value.into()));
        self
    }
}

impl FromIterator<(String, Value)> for AttributeBag {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        Self {
            attributes: iter.into_iter().collect(),
        }
    }
}

impl Record for AttributeBag {
    fn into_fields(self) -> Result<Map<String, Value>> {
        Ok(self.attributes.into_iter().collect())
    }
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_value_must_be_object() {
        assert!(json!({"a": 1}).into_fields().is_ok());
        let err = json!([1, 2]).into_fields().unwrap_err();
        assert!(err.to_string().contains("an array"));
    }

    #[test]
    fn test_attribute_bag_last_wins() {
        let fields = AttributeBag::new()
            .with("name", "eth0")
            .with("enabled", true)
            .with("name", "eth1")
            .into_fields()
            .unwrap();
        assert_eq!(fields.len(), 2);
        assert_eq!(fields["name"], "eth1");
        assert_eq!(fields["enabled"], true);
    }

    #[test]
    fn test_serialized_nested() {
        #[derive(Serialize)]
        struct Iface {
            name: &'static str,
            device: Option<&'static str>,
        }
        let fields = Serialized(Iface {
            name: "ge-0/0/0",
            device: None,
        })
        .into_fields()
        .unwrap();
        assert_eq!(fields["name"], "ge-0/0/0");
        assert_eq!(fields["device"], Value::Null);
    }
}
