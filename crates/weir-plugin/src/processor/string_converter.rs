//! String case conversion processor
//!
//! Upper- or lower-cases configured string fields in place. Non-string
//! and missing fields are left untouched.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use weir_model::{PluginKind, PluginSpec, Processor, ProcessorError, Record};

use crate::error::{PluginLoadError, Result};
use crate::registry::ProcessorFactory;

/// Conversion direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConvertMode {
    #[default]
    Upper,
    Lower,
}

impl ConvertMode {
    fn parse(name: &str) -> std::result::Result<Self, String> {
        match name {
            "upper" => Ok(ConvertMode::Upper),
            "lower" => Ok(ConvertMode::Lower),
            other => Err(format!("unknown mode '{}', expected 'upper' or 'lower'", other)),
        }
    }

    fn apply(&self, s: &str) -> String {
        match self {
            ConvertMode::Upper => s.to_uppercase(),
            ConvertMode::Lower => s.to_lowercase(),
        }
    }
}

/// Processor converting the case of configured string fields
pub struct StringConverterProcessor {
    keys: Vec<String>,
    mode: ConvertMode,
}

impl StringConverterProcessor {
    pub fn new(keys: Vec<String>, mode: ConvertMode) -> Self {
        Self { keys, mode }
    }
}

#[async_trait]
impl Processor for StringConverterProcessor {
    async fn execute(
        &self,
        mut batch: Vec<Record>,
    ) -> std::result::Result<Vec<Record>, ProcessorError> {
        for record in &mut batch {
            for key in &self.keys {
                if let Some(Value::String(s)) = record.event().get(key) {
                    let converted = self.mode.apply(s);
                    record.event_mut().insert(key.clone(), Value::String(converted));
                }
            }
        }
        Ok(batch)
    }

    fn name(&self) -> &str {
        "string_converter"
    }
}

/// Factory for the string converter
pub struct StringConverterFactory;

impl ProcessorFactory for StringConverterFactory {
    fn create(&self, spec: &PluginSpec) -> Result<Arc<dyn Processor>> {
        let keys = spec.get_string_array("keys").unwrap_or_default();
        if keys.is_empty() {
            return Err(PluginLoadError::invalid_config(
                PluginKind::Processor,
                spec.name(),
                "at least one entry in 'keys' is required",
            ));
        }

        let mode = match spec.get_str("mode") {
            Some(name) => ConvertMode::parse(name).map_err(|msg| {
                PluginLoadError::invalid_config(PluginKind::Processor, spec.name(), msg)
            })?,
            None => ConvertMode::default(),
        };

        Ok(Arc::new(StringConverterProcessor::new(keys, mode)))
    }
}
