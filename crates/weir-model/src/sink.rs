//! Sink contract

use async_trait::async_trait;

use crate::{Record, SinkError};

/// A record consumer at the end of a pipeline.
///
/// Sinks may block on their output I/O; a slow sink propagates
/// backpressure up through the worker pool to the buffer and source.
/// A failed `output` is logged and counted by the runtime; other sinks
/// in the same fan-out still receive the batch.
#[async_trait]
pub trait Sink: Send + Sync {
    /// Deliver a batch
    async fn output(&self, batch: Vec<Record>) -> Result<(), SinkError>;

    /// Flush and release resources; called once at pipeline stop
    async fn close(&self) -> Result<(), SinkError> {
        Ok(())
    }

    /// Plugin name for logging and metrics
    fn name(&self) -> &str;
}
