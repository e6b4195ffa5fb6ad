//! Record normalization
//!
//! Raw record → flatten → resolve references → drop blacklist → prune.

use super::{FieldDropper, Flattener, Record, ReferenceCache, prune_map};
use crate::etl::Transformer;
use eyre::Result;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Turns raw inventory records into event bodies
///
/// # Example
/// ```
/// use nautobot_hec_exporter::transform::{RecordNormalizer, ReferenceCache};
/// use serde_json::json;
/// use std::sync::Arc;
///
/// let statuses: ReferenceCache = [("abc".to_string(), "Active".to_string())]
///     .into_iter()
///     .collect();
/// let normalizer = RecordNormalizer::new().with_reference("status", Arc::new(statuses));
///
/// let event = normalizer
///     .normalize(json!({"name": "sw1", "status": {"id": "abc"}, "serial": ""}))
///     .unwrap();
/// assert_eq!(event, json!({"name": "sw1", "status": "Active"}).as_object().unwrap().clone());
/// ```
#[derive(Debug, Clone, Default)]
pub struct RecordNormalizer {
    flattener: Flattener,
    references: BTreeMap<String, Arc<ReferenceCache>>,
    blacklist: FieldDropper,
}

impl RecordNormalizer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_flattener(mut self, flattener: Flattener) -> Self {
        self.flattener = flattener;
        self
    }

    /// Resolve `field` through `cache`
    pub fn with_reference(mut self, field: impl Into<String>, cache: Arc<ReferenceCache>) -> Self {
        self.references.insert(field.into(), cache);
        self
    }

    pub fn with_blacklist(mut self, blacklist: FieldDropper) -> Self {
        self.blacklist = blacklist;
        self
    }

    /// Normalize one record into an event body.
    ///
    /// The result may be empty when every field was pruned; callers decide
    /// whether to emit it.
    ///
    /// # Errors
    /// Returns an error if the record is not a mapping
    pub fn normalize<R: Record>(&self, record: R) -> Result<Map<String, Value>> {
        let mut fields = self.flattener.flatten(record.into_fields()?);

        for (field, cache) in &self.references {
            if let Some(value) = fields.get_mut(field) {
                *value = cache.resolve(value.take());
            }
        }

        self.blacklist.drop_from(&mut fields);

        Ok(prune_map(fields))
    }
}

impl Transformer for RecordNormalizer {
    type Input = Value;
    type Output = Map<String, Value>;

    fn transform(&self, input: Self::Input) -> Result<Self::Output> {
        self.normalize(input)
    }
}
