//! Pass-through processor

use std::sync::Arc;

use async_trait::async_trait;

use weir_model::{PluginSpec, Processor, ProcessorError, Record};

use crate::error::Result;
use crate::registry::ProcessorFactory;

/// Processor that returns batches unchanged
#[derive(Debug, Default)]
pub struct NoopProcessor;

impl NoopProcessor {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Processor for NoopProcessor {
    async fn execute(&self, batch: Vec<Record>) -> std::result::Result<Vec<Record>, ProcessorError> {
        Ok(batch)
    }

    fn name(&self) -> &str {
        "noop"
    }
}

/// Factory for the noop processor
pub struct NoopFactory;

impl ProcessorFactory for NoopFactory {
    fn create(&self, _spec: &PluginSpec) -> Result<Arc<dyn Processor>> {
        Ok(Arc::new(NoopProcessor::new()))
    }
}
