//! Weir - Model
//!
//! Core data model and plugin contracts for the pipeline runtime.
//!
//! # Overview
//!
//! Everything that flows through a pipeline is a [`Record`]: an opaque
//! [`Event`] payload plus a small amount of metadata. The runtime never
//! inspects event contents; only processors do.
//!
//! Plugins come in four kinds ([`PluginKind`]), each with its own contract:
//!
//! - [`Source`] - produces records into a buffer until stopped
//! - [`Buffer`] - the thread-safe bounded queue between source and workers
//! - [`Processor`] - transforms batches of records
//! - [`Sink`] - delivers batches out of the pipeline
//!
//! A [`PluginSpec`] is the configuration-side description of a plugin: a
//! name plus an untyped attribute table. The special name `"pipeline"`
//! denotes an in-process link to another pipeline rather than a real
//! plugin; see [`PluginSpec::pipeline_link`].

mod error;
mod record;
mod spec;

pub mod buffer;
pub mod processor;
pub mod sink;
pub mod source;

pub use buffer::Buffer;
pub use error::{BufferError, ProcessorError, SinkError, SourceError};
pub use processor::Processor;
pub use record::{identification_hash, Event, Record, RecordMetadata};
pub use sink::Sink;
pub use source::Source;
pub use spec::{PluginSpec, PIPELINE_PLUGIN};

/// The four plugin kinds a pipeline is assembled from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PluginKind {
    Source,
    Buffer,
    Processor,
    Sink,
}

impl std::fmt::Display for PluginKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            PluginKind::Source => "source",
            PluginKind::Buffer => "buffer",
            PluginKind::Processor => "processor",
            PluginKind::Sink => "sink",
        };
        f.write_str(s)
    }
}
