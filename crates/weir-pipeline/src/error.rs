//! Build error types

use thiserror::Error;

use weir_plugin::PluginLoadError;

/// Result type for pipeline building
pub type Result<T> = std::result::Result<T, BuildError>;

/// Failure to assemble one pipeline.
///
/// Caught at the per-pipeline boundary: the builder logs it, unwinds the
/// pipeline's connected component, and continues with the rest of the
/// topology.
#[derive(Debug, Error)]
pub enum BuildError {
    /// A plugin could not be instantiated
    #[error(transparent)]
    Plugin(#[from] PluginLoadError),

    /// The upstream feeding this pipeline's source failed to build
    #[error("cannot wire source of pipeline '{pipeline}': upstream pipeline '{upstream}' is not runnable")]
    UpstreamUnavailable { pipeline: String, upstream: String },

    /// A stateful processor sits behind an in-process connector, where
    /// records were already partitioned by the upstream pipeline
    #[error("processor '{processor}' in pipeline '{pipeline}' requires peer forwarding but the pipeline is fed by an in-process connector")]
    PeerForwardingBehindConnector { pipeline: String, processor: String },
}
