//! Stdout sink
//!
//! Writes each record's event as one JSON line to standard output.

use std::io::Write;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;

use weir_model::{PluginSpec, Record, Sink, SinkError};

use crate::error::Result;
use crate::registry::SinkFactory;

/// Sink printing events as JSON lines
#[derive(Debug, Default)]
pub struct StdoutSink {
    records_written: AtomicU64,
}

impl StdoutSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Total records written so far
    pub fn records_written(&self) -> u64 {
        self.records_written.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl Sink for StdoutSink {
    async fn output(&self, batch: Vec<Record>) -> std::result::Result<(), SinkError> {
        let mut out = String::with_capacity(batch.len() * 64);
        for record in &batch {
            let line = serde_json::to_string(record.event())
                .map_err(|e| SinkError::new("stdout", e))?;
            out.push_str(&line);
            out.push('\n');
        }

        let stdout = std::io::stdout();
        let mut lock = stdout.lock();
        lock.write_all(out.as_bytes())
            .and_then(|_| lock.flush())
            .map_err(|e| SinkError::new("stdout", e))?;

        self.records_written
            .fetch_add(batch.len() as u64, Ordering::Relaxed);
        Ok(())
    }

    fn name(&self) -> &str {
        "stdout"
    }
}

/// Factory for the stdout sink
pub struct StdoutSinkFactory;

impl SinkFactory for StdoutSinkFactory {
    fn create(&self, _spec: &PluginSpec) -> Result<Arc<dyn Sink>> {
        Ok(Arc::new(StdoutSink::new()))
    }
}
