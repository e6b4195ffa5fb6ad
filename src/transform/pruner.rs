//! Empty-value pruning

use serde_json::{Map, Value};

/// Recursively remove `null`, `""`, `{}` and `[]`.
///
/// Pruning is structural: a nested object or list that only held empty
/// values disappears entirely. Returns `None` when nothing is left.
///
/// # Example
/// ```
/// use nautobot_hec_exporter::transform::prune_empty;
/// use serde_json::json;
///
/// let pruned = prune_empty(json!({"a": "", "b": {"c": null}, "d": [1, null]}));
/// assert_eq!(pruned, Some(json!({"d": [1]})));
/// assert_eq!(prune_empty(json!({"a": {}})), None);
/// ```
pub fn prune_empty(value: Value) -> Option<Value> {
    match value {
        Value::Null => None,
        Value::String(s) if s.is_empty() => None,
        Value::Object(map) => {
            let cleaned = prune_map(map);
            (!cleaned.is_empty()).then_some(Value::Object(cleaned))
        }
        Value::Array(items) => {
            let cleaned: Vec<Value> = items.into_iter().filter_map(prune_empty).collect();
            (!cleaned.is_empty()).then_some(Value::Array(cleaned))
        }
        other => Some(other),
    }
}

/// Prune every value of a mapping, dropping keys whose value ends up empty
pub fn prune_map(map: Map<String, Value>) -> Map<String, Value> {
    map.into_iter()
        .filter_map(|(key, value)| prune_empty(value).map(|v| (key, v)))
        .collect()
}
