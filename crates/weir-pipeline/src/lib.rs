//! Weir - Pipeline
//!
//! The assembly, linkage, and execution engine: validated topology in,
//! running pipelines out.
//!
//! # Architecture
//!
//! ```text
//! [Topology] ──→ validate ──→ PipelineBuilder ──→ IndexMap<String, Arc<Pipeline>>
//!                                  │
//!                  PluginFactory ──┤── PipelineConnector (sink of one pipeline,
//!                                  │                      source of another)
//!                                  └── PeerForwardingProcessor (wraps stateful
//!                                                               processors)
//!
//! Pipeline::start:
//!   [Source task] ──→ [Buffer] ──→ [worker 0..N] ──→ [Sink, Sink, ...]
//!                                      │
//!                                      └─ stage chain, per-worker or shared
//!                                         processor instances
//! ```
//!
//! # Key design points
//!
//! - **Build order**: the validator's topological order drives the
//!   builder; a `pipeline`-sourced pipeline re-enters the builder for
//!   its upstream, guarded by the runnable map
//! - **Failure unwinding**: a pipeline that fails to build removes its
//!   whole connected component (both directions of the reference graph)
//!   from the runnable map
//! - **Backpressure**: the buffer is the only coupling point; slow
//!   sinks hold workers, workers hold the buffer, the buffer holds the
//!   source
//! - **Shutdown**: stop signals the source, drains within a grace
//!   period, then hard-cancels workers and counts what was dropped

mod builder;
mod connector;
mod decorator;
mod error;
mod metrics;
mod pipeline;

pub use builder::PipelineBuilder;
pub use connector::PipelineConnector;
pub use decorator::PeerForwardingProcessor;
pub use error::{BuildError, Result};
pub use metrics::{PipelineMetrics, PipelineMetricsSnapshot};
pub use pipeline::{Pipeline, PipelineState, ProcessorStage};
