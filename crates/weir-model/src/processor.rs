//! Processor contract

use async_trait::async_trait;

use crate::{ProcessorError, Record};

/// A batch transformer.
///
/// Processors may drop, mutate, or emit records. Two capabilities are
/// declared at registration time, not on the trait, and are orthogonal:
///
/// - *single-thread*: the plugin gets a dedicated instance per pipeline
///   worker and is never shared across workers
/// - *peer forwarding*: events sharing the plugin's identification keys
///   must all be processed on the owning cluster node, so the builder
///   wraps the instance in a forwarding decorator
///
/// An instance shared across workers must be internally thread-safe.
#[async_trait]
pub trait Processor: Send + Sync {
    /// Transform a batch, returning the records to pass downstream
    async fn execute(&self, batch: Vec<Record>) -> Result<Vec<Record>, ProcessorError>;

    /// Plugin name for logging and metrics
    fn name(&self) -> &str;
}
