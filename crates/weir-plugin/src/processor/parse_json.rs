//! JSON parsing processor
//!
//! Parses a JSON string field and merges the resulting object into the
//! event, either at the root or under a destination key. Records whose
//! source field is absent or unparseable pass through unchanged.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use weir_model::{PluginSpec, Processor, ProcessorError, Record};

use crate::error::Result;
use crate::registry::ProcessorFactory;

/// Processor that expands a JSON string field into event fields
pub struct ParseJsonProcessor {
    source: String,
    destination: Option<String>,
}

impl ParseJsonProcessor {
    pub fn new(source: impl Into<String>, destination: Option<String>) -> Self {
        Self {
            source: source.into(),
            destination,
        }
    }
}

#[async_trait]
impl Processor for ParseJsonProcessor {
    async fn execute(
        &self,
        mut batch: Vec<Record>,
    ) -> std::result::Result<Vec<Record>, ProcessorError> {
        for record in &mut batch {
            let Some(raw) = record.event().get_str(&self.source) else {
                continue;
            };

            let parsed = match serde_json::from_str::<Value>(raw) {
                Ok(Value::Object(fields)) => fields,
                Ok(_) | Err(_) => {
                    tracing::debug!(source = %self.source, "field is not a JSON object, leaving record unchanged");
                    continue;
                }
            };

            match &self.destination {
                Some(dest) => {
                    record.event_mut().insert(dest.clone(), Value::Object(parsed));
                }
                None => {
                    for (key, value) in parsed {
                        record.event_mut().insert(key, value);
                    }
                }
            }
        }
        Ok(batch)
    }

    fn name(&self) -> &str {
        "parse_json"
    }
}

/// Factory for the JSON parsing processor
pub struct ParseJsonFactory;

impl ProcessorFactory for ParseJsonFactory {
    fn create(&self, spec: &PluginSpec) -> Result<Arc<dyn Processor>> {
        let source = spec.get_str("source").unwrap_or("message").to_string();
        let destination = spec.get_str("destination").map(|s| s.to_string());
        Ok(Arc::new(ParseJsonProcessor::new(source, destination)))
    }
}
