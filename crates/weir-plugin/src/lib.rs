//! Weir - Plugins
//!
//! Plugin registry, factory, and the built-in plugin set.
//!
//! # Overview
//!
//! The topology document selects plugins by name; the registry maps
//! `(kind, name)` to a factory plus capability flags, and the factory
//! turns specs into live instances:
//!
//! ```text
//! PluginSpec ──→ PluginRegistry ──→ factory.create() ──→ Arc<dyn Source|Buffer|Processor|Sink>
//!                     │
//!                     └─ capabilities: single_thread, requires_peer_forwarding
//! ```
//!
//! Processor stages honor a multiplicity function: single-thread plugins
//! get one instance per pipeline worker, everything else one shared
//! instance (see [`PluginFactory::load_processors`]).
//!
//! # Built-ins
//!
//! - Sources: `file`, `stdin`
//! - Buffer: `bounded` (the default)
//! - Processors: `noop`, `string_converter`, `parse_json`,
//!   `aggregate_count` (single-thread + peer-forwarding)
//! - Sinks: `stdout`, `file`, `null`
//!
//! # Adding a plugin
//!
//! 1. Define a config struct with `TryFrom<&PluginSpec>` validation
//! 2. Implement the matching contract trait from `weir-model`
//! 3. Implement the factory trait and register it (with capability flags
//!    for processors) before building pipelines

mod error;
mod factory;
mod registry;

pub mod buffer;
pub mod processor;
pub mod sink;
pub mod source;

pub use error::PluginLoadError;
pub use factory::PluginFactory;
pub use registry::{
    BufferFactory, PluginCapabilities, PluginRegistry, ProcessorFactory, SinkFactory,
    SourceFactory,
};

use buffer::BoundedBufferFactory;
use processor::{AggregateCountFactory, NoopFactory, ParseJsonFactory, StringConverterFactory};
use sink::{FileSinkFactory, NullSinkFactory, StdoutSinkFactory};
use source::{FileSourceFactory, StdinSourceFactory};

/// Create a registry with every built-in plugin registered
pub fn default_registry() -> PluginRegistry {
    let mut registry = PluginRegistry::new();

    registry.register_source("file", FileSourceFactory);
    registry.register_source("stdin", StdinSourceFactory);

    registry.register_buffer("bounded", BoundedBufferFactory);

    registry.register_processor("noop", PluginCapabilities::new(), NoopFactory);
    registry.register_processor("string_converter", PluginCapabilities::new(), StringConverterFactory);
    registry.register_processor("parse_json", PluginCapabilities::new(), ParseJsonFactory);
    registry.register_processor(
        "aggregate_count",
        PluginCapabilities::new().single_thread().requires_peer_forwarding(),
        AggregateCountFactory,
    );

    registry.register_sink("stdout", StdoutSinkFactory);
    registry.register_sink("file", FileSinkFactory);
    registry.register_sink("null", NullSinkFactory);

    registry
}
