//! Source contract

use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::{Buffer, SourceError};

/// A record producer.
///
/// The runtime spawns `start` as a long-lived task. The source's only
/// output side-effect is writing records into `target`; concurrency
/// inside the source is its own business. The source must observe
/// `shutdown` between emissions and return promptly once it is
/// cancelled. Returning `Ok` before cancellation means the source is
/// exhausted (e.g. a file read to EOF); the pipeline keeps draining.
#[async_trait]
pub trait Source: Send + Sync {
    /// Produce records into `target` until exhausted or cancelled
    async fn start(
        &self,
        target: Arc<dyn Buffer>,
        shutdown: CancellationToken,
    ) -> Result<(), SourceError>;

    /// Plugin name for logging and metrics
    fn name(&self) -> &str;
}
