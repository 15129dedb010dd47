//! Keyed counting processor
//!
//! Maintains a running count per identification-key group and stamps the
//! current count onto each record. The state is keyed by the hash of the
//! configured identification keys, so correctness in a cluster depends
//! on all records of a group reaching the same node: the plugin declares
//! peer-forwarding affinity, and single-thread affinity so each worker
//! owns its own state.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;

use weir_model::{identification_hash, PluginKind, PluginSpec, Processor, ProcessorError, Record};

use crate::error::{PluginLoadError, Result};
use crate::registry::ProcessorFactory;

/// Processor appending a per-group running count to each record
pub struct AggregateCountProcessor {
    identification_keys: Vec<String>,
    count_key: String,
    counts: Mutex<HashMap<u64, u64>>,
}

impl AggregateCountProcessor {
    pub fn new(identification_keys: Vec<String>, count_key: impl Into<String>) -> Self {
        Self {
            identification_keys,
            count_key: count_key.into(),
            counts: Mutex::new(HashMap::new()),
        }
    }

    /// Number of distinct groups seen so far
    pub fn group_count(&self) -> usize {
        self.counts.lock().len()
    }
}

#[async_trait]
impl Processor for AggregateCountProcessor {
    async fn execute(
        &self,
        mut batch: Vec<Record>,
    ) -> std::result::Result<Vec<Record>, ProcessorError> {
        let mut counts = self.counts.lock();
        for record in &mut batch {
            let hash = identification_hash(record.event(), &self.identification_keys);
            let count = counts.entry(hash).or_insert(0);
            *count += 1;
            record
                .event_mut()
                .insert(self.count_key.clone(), Value::from(*count));
        }
        Ok(batch)
    }

    fn name(&self) -> &str {
        "aggregate_count"
    }
}

/// Factory for the keyed counting processor
pub struct AggregateCountFactory;

impl ProcessorFactory for AggregateCountFactory {
    fn create(&self, spec: &PluginSpec) -> Result<Arc<dyn Processor>> {
        let keys = spec.get_string_array("identification_keys").unwrap_or_default();
        if keys.is_empty() {
            return Err(PluginLoadError::invalid_config(
                PluginKind::Processor,
                spec.name(),
                "at least one entry in 'identification_keys' is required",
            ));
        }

        let count_key = spec.get_str("count_key").unwrap_or("aggregate_count").to_string();
        Ok(Arc::new(AggregateCountProcessor::new(keys, count_key)))
    }
}
