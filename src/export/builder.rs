//! Raw record → HEC event

use crate::etl::Transformer;
use crate::event::{EventTemplate, NormalizedEvent};
use crate::transform::RecordNormalizer;
use eyre::Result;
use serde_json::Value;

/// Normalizes a record and wraps it in the job's envelope.
///
/// Records whose body is empty after pruning yield `None`.
#[derive(Debug, Clone)]
pub struct EventBuilder {
    normalizer: RecordNormalizer,
    template: EventTemplate,
}

impl EventBuilder {
    pub fn new(normalizer: RecordNormalizer, template: EventTemplate) -> Self {
        Self {
            normalizer,
            template,
        }
    }

    pub fn template(&self) -> &EventTemplate {
        &self.template
    }
}

impl Transformer for EventBuilder {
    type Input = Value;
    type Output = Option<NormalizedEvent>;

    fn transform(&self, input: Self::Input) -> Result<Self::Output> {
        let body = self.normalizer.normalize(input)?;
        if body.is_empty() {
            return Ok(None);
        }
        Ok(Some(self.template.wrap(body)))
    }
}
