//! Reference caches for foreign-key-like fields
//!
//! Fields such as `status`, `role`, `tenant`, `tags` or `location` usually
//! carry an object id. A [`ReferenceCache`] is a full snapshot of the
//! matching reference collection, used to replace ids with display values.

use crate::error::CacheBuildError;
use crate::etl::{PageSource, PaginatedFetcher, QueryDefinition};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

/// A reference collection to cache
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReferenceTable {
    pub name: String,
    pub query: QueryDefinition,
    /// Entry field holding the display value; `name` is used when absent
    #[serde(default = "default_value_field")]
    pub value_field: String,
    /// Entry field that records may store instead of the id
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secondary_key: Option<String>,
}

fn default_value_field() -> String {
    "name".to_string()
}

impl ReferenceTable {
    pub fn new(name: impl Into<String>, query: QueryDefinition) -> Self {
        Self {
            name: name.into(),
            query,
            value_field: default_value_field(),
            secondary_key: None,
        }
    }

    pub fn with_value_field(mut self, field: impl Into<String>) -> Self {
        self.value_field = field.into();
        self
    }

    pub fn with_secondary_key(mut self, key: impl Into<String>) -> Self {
        self.secondary_key = Some(key.into());
        self
    }
}

/// Result of building a cache: either the full table or an empty fallback
#[derive(Debug)]
pub enum CacheBuild {
    Built(ReferenceCache),
    Degraded(CacheBuildError),
}

impl CacheBuild {
    pub fn is_degraded(&self) -> bool {
        matches!(self, Self::Degraded(_))
    }

    /// The built cache, or an empty one when the build degraded
    pub fn into_cache(self) -> ReferenceCache {
        match self {
            Self::Built(cache) => cache,
            Self::Degraded(_) => ReferenceCache::default(),
        }
    }
}

/// Lookup table from id (or secondary key) to display value
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReferenceCache {
    entries: HashMap<String, String>,
}

impl ReferenceCache {
    /// Page through the whole reference collection.
    ///
    /// Any fetch failure, on any page, degrades to an empty cache so that a
    /// cache is never partially populated.
    pub async fn build<S: PageSource>(
        source: S,
        table: &ReferenceTable,
        page_size: usize,
    ) -> CacheBuild {
        let mut fetcher = PaginatedFetcher::new(source, &table.query, page_size);
        match fetcher.fetch_all().await {
            Ok(entries) => {
                let cache = Self::from_entries(table, &entries);
                log::debug!(
                    "Reference table '{}' cached {} value(s)",
                    table.name,
                    cache.len()
                );
                CacheBuild::Built(cache)
            }
            Err(source) => CacheBuild::Degraded(CacheBuildError {
                table: table.name.clone(),
                source,
            }),
        }
    }

    /// Build a cache from already-fetched reference entries
    pub fn from_entries(table: &ReferenceTable, entries: &[Value]) -> Self {
        let mut cache = Self::default();
        for entry in entries {
            let display = entry
                .get(&table.value_field)
                .and_then(display_value)
                .or_else(|| entry.get("name").and_then(display_value));
            let Some(display) = display else {
                continue;
            };

            if let Some(id) = entry.get("id").and_then(key_of) {
                cache.entries.insert(id, display.clone());
            }
            if let Some(key) = table
                .secondary_key
                .as_ref()
                .and_then(|field| entry.get(field))
                .and_then(key_of)
            {
                cache.entries.insert(key, display);
            }
        }
        cache
    }

    pub fn insert(&mut self, key: impl Into<String>, display: impl Into<String>) {
        self.entries.insert(key.into(), display.into());
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Replace a reference value with its display value.
    ///
    /// - `null` stays `null`
    /// - lists are resolved element by element
    /// - an object with an `id` becomes its display value, or the bare id on
    ///   a miss
    /// - a scalar is looked up directly and returned unchanged on a miss
    pub fn resolve(&self, value: Value) -> Value {
        match value {
            Value::Null => Value::Null,
            Value::Array(items) => Value::Array(items.into_iter().map(|v| self.resolve(v)).collect()),
            Value::Object(map) => match map.get("id") {
                Some(id) => match key_of(id).and_then(|key| self.get(&key)) {
                    Some(display) => Value::String(display.to_string()),
                    None => id.clone(),
                },
                None => Value::Object(map),
            },
            Value::String(ref s) => match self.get(s) {
                Some(display) => Value::String(display.to_string()),
                None => value,
            },
            Value::Number(ref n) => match self.get(&n.to_string()) {
                Some(display) => Value::String(display.to_string()),
                None => value,
            },
            Value::Bool(_) => value,
        }
    }
}

impl FromIterator<(String, String)> for ReferenceCache {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}

fn key_of(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn display_value(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FetchError;
    use crate::etl::Page;
    use serde_json::json;

    fn statuses() -> ReferenceTable {
        ReferenceTable::new("statuses", QueryDefinition::rest("extras/statuses"))
    }

    struct Pages(Vec<Vec<Value>>);

    impl PageSource for Pages {
        async fn fetch_page(
            &self,
            _query: &QueryDefinition,
            limit: usize,
            offset: usize,
        ) -> Result<Page, FetchError> {
            match self.0.get(offset / limit) {
                Some(page) => Ok(Page::new(page.clone())),
                None => Err(FetchError::Transport("connection reset".to_string())),
            }
        }
    }

    #[test]
    fn test_resolve_rules() {
        let cache: ReferenceCache = [("abc".to_string(), "Active".to_string())]
            .into_iter()
            .collect();

        assert_eq!(cache.resolve(Value::Null), Value::Null);
        assert_eq!(cache.resolve(json!({"id": "abc"})), json!("Active"));
        assert_eq!(cache.resolve(json!({"id": "zzz", "url": "x"})), json!("zzz"));
        assert_eq!(cache.resolve(json!("abc")), json!("Active"));
        assert_eq!(cache.resolve(json!("planned")), json!("planned"));
        assert_eq!(cache.resolve(json!({"name": "x"})), json!({"name": "x"}));
        assert_eq!(
            cache.resolve(json!([{"id": "abc"}, "other", null])),
            json!(["Active", "other", null])
        );
        assert_eq!(cache.resolve(json!(true)), json!(true));
    }

    #[test]
    fn test_from_entries_fallbacks() {
        let table = statuses().with_value_field("label").with_secondary_key("value");
        let entries = vec![
            json!({"id": "1", "label": "Active", "value": "active"}),
            json!({"id": "2", "name": "Planned"}),
            json!({"id": "3"}),
            json!({"label": "Orphan"}),
            json!({"id": 4, "label": "", "name": "Staged"}),
        ];

        let cache = ReferenceCache::from_entries(&table, &entries);

        assert_eq!(cache.get("1"), Some("Active"));
        assert_eq!(cache.get("active"), Some("Active"));
        assert_eq!(cache.get("2"), Some("Planned"));
        assert_eq!(cache.get("3"), None);
        assert_eq!(cache.get("4"), Some("Staged"));
        assert_eq!(cache.len(), 4);
    }

    #[tokio::test]
    async fn test_build_pages_through_everything() {
        let source = Pages(vec![
            vec![json!({"id": "a", "name": "Active"}), json!({"id": "b", "name": "Offline"})],
            vec![json!({"id": "c", "name": "Planned"})],
        ]);

        let build = ReferenceCache::build(&source, &statuses(), 2).await;

        assert!(!build.is_degraded());
        let cache = build.into_cache();
        assert_eq!(cache.len(), 3);
        assert_eq!(cache.get("c"), Some("Planned"));
    }

    #[tokio::test]
    async fn test_build_failure_degrades_to_empty() {
        // Second page fails: nothing from the first page may leak through
        let source = Pages(vec![vec![json!({"id": "a", "name": "Active"}), json!({"id": "b", "name": "Offline"})]]);

        let build = ReferenceCache::build(&source, &statuses(), 2).await;

        match &build {
            CacheBuild::Degraded(err) => {
                assert_eq!(err.table, "statuses");
                assert!(matches!(err.source, FetchError::Transport(_)));
            }
            CacheBuild::Built(_) => panic!("expected degraded build"),
        }
        let cache = build.into_cache();
        assert!(cache.is_empty());
        assert_eq!(cache.resolve(json!({"id": "a"})), json!("a"));
    }
}
