//! Null sink
//!
//! Discards everything; counts what it discarded.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;

use weir_model::{PluginSpec, Record, Sink, SinkError};

use crate::error::Result;
use crate::registry::SinkFactory;

/// Sink that drops all records
#[derive(Debug, Default)]
pub struct NullSink {
    records_dropped: AtomicU64,
}

impl NullSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Total records discarded
    pub fn records_dropped(&self) -> u64 {
        self.records_dropped.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl Sink for NullSink {
    async fn output(&self, batch: Vec<Record>) -> std::result::Result<(), SinkError> {
        self.records_dropped
            .fetch_add(batch.len() as u64, Ordering::Relaxed);
        Ok(())
    }

    fn name(&self) -> &str {
        "null"
    }
}

/// Factory for the null sink
pub struct NullSinkFactory;

impl SinkFactory for NullSinkFactory {
    fn create(&self, _spec: &PluginSpec) -> Result<Arc<dyn Sink>> {
        Ok(Arc::new(NullSink::new()))
    }
}
