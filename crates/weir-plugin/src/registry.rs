//! Plugin registry - name + kind to factory resolution
//!
//! The registry maps plugin names to factory implementations per plugin
//! kind, plus the capability flags the builder consults when assembling a
//! pipeline.
//!
//! # Design
//!
//! - **Compile-time extensibility**: implement one of the factory traits
//!   and register it at startup
//! - **Capability flags**: `single_thread` and `requires_peer_forwarding`
//!   are declared at registration, not discovered at runtime
//! - **Config-driven**: the topology document selects plugins by name
//!
//! # Example
//!
//! ```ignore
//! let mut registry = PluginRegistry::new();
//! registry.register_sink("stdout", StdoutSinkFactory);
//! registry.register_processor(
//!     "aggregate_count",
//!     PluginCapabilities::new().single_thread().requires_peer_forwarding(),
//!     AggregateCountFactory,
//! );
//! ```

use std::collections::HashMap;
use std::sync::Arc;

use weir_model::{Buffer, PluginSpec, Processor, Sink, Source};

use crate::error::Result;

/// Capability flags declared at registration time.
///
/// The two flags are orthogonal: a plugin may require a dedicated
/// instance per worker, cluster-wide key affinity, both, or neither.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PluginCapabilities {
    /// The plugin gets one instance per pipeline worker and is never
    /// shared across workers
    pub single_thread: bool,

    /// Events sharing the plugin's identification keys must be processed
    /// on the owning cluster node
    pub requires_peer_forwarding: bool,
}

impl PluginCapabilities {
    /// No capabilities: one shared, internally thread-safe instance
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark the plugin single-thread
    #[must_use]
    pub fn single_thread(mut self) -> Self {
        self.single_thread = true;
        self
    }

    /// Mark the plugin as requiring peer forwarding
    #[must_use]
    pub fn requires_peer_forwarding(mut self) -> Self {
        self.requires_peer_forwarding = true;
        self
    }
}

/// Factory for source plugins
pub trait SourceFactory: Send + Sync {
    /// Create a source instance from its spec
    fn create(&self, spec: &PluginSpec) -> Result<Arc<dyn Source>>;
}

/// Factory for buffer plugins
pub trait BufferFactory: Send + Sync {
    /// Create a buffer instance from its spec
    fn create(&self, spec: &PluginSpec) -> Result<Arc<dyn Buffer>>;
}

/// Factory for processor plugins
pub trait ProcessorFactory: Send + Sync {
    /// Create one processor instance from its spec.
    ///
    /// Called once per instance for single-thread plugins, so stateful
    /// plugins get independent state per worker.
    fn create(&self, spec: &PluginSpec) -> Result<Arc<dyn Processor>>;
}

/// Factory for sink plugins
pub trait SinkFactory: Send + Sync {
    /// Create a sink instance from its spec
    fn create(&self, spec: &PluginSpec) -> Result<Arc<dyn Sink>>;
}

pub(crate) struct ProcessorEntry {
    pub factory: Box<dyn ProcessorFactory>,
    pub capabilities: PluginCapabilities,
}

/// Registry of plugin factories, keyed by name within each kind
#[derive(Default)]
pub struct PluginRegistry {
    sources: HashMap<String, Box<dyn SourceFactory>>,
    buffers: HashMap<String, Box<dyn BufferFactory>>,
    processors: HashMap<String, ProcessorEntry>,
    sinks: HashMap<String, Box<dyn SinkFactory>>,
}

impl PluginRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a source factory
    ///
    /// # Panics
    ///
    /// Panics if a source is already registered under this name.
    pub fn register_source<F: SourceFactory + 'static>(&mut self, name: &str, factory: F) {
        if self.sources.insert(name.to_string(), Box::new(factory)).is_some() {
            panic!("source plugin '{}' already registered", name);
        }
    }

    /// Register a buffer factory
    ///
    /// # Panics
    ///
    /// Panics if a buffer is already registered under this name.
    pub fn register_buffer<F: BufferFactory + 'static>(&mut self, name: &str, factory: F) {
        if self.buffers.insert(name.to_string(), Box::new(factory)).is_some() {
            panic!("buffer plugin '{}' already registered", name);
        }
    }

    /// Register a processor factory with its capability flags
    ///
    /// # Panics
    ///
    /// Panics if a processor is already registered under this name.
    pub fn register_processor<F: ProcessorFactory + 'static>(
        &mut self,
        name: &str,
        capabilities: PluginCapabilities,
        factory: F,
    ) {
        let entry = ProcessorEntry {
            factory: Box::new(factory),
            capabilities,
        };
        if self.processors.insert(name.to_string(), entry).is_some() {
            panic!("processor plugin '{}' already registered", name);
        }
    }

    /// Register a sink factory
    ///
    /// # Panics
    ///
    /// Panics if a sink is already registered under this name.
    pub fn register_sink<F: SinkFactory + 'static>(&mut self, name: &str, factory: F) {
        if self.sinks.insert(name.to_string(), Box::new(factory)).is_some() {
            panic!("sink plugin '{}' already registered", name);
        }
    }

    pub(crate) fn source(&self, name: &str) -> Option<&dyn SourceFactory> {
        self.sources.get(name).map(|f| f.as_ref())
    }

    pub(crate) fn buffer(&self, name: &str) -> Option<&dyn BufferFactory> {
        self.buffers.get(name).map(|f| f.as_ref())
    }

    pub(crate) fn processor(&self, name: &str) -> Option<&ProcessorEntry> {
        self.processors.get(name)
    }

    pub(crate) fn sink(&self, name: &str) -> Option<&dyn SinkFactory> {
        self.sinks.get(name).map(|f| f.as_ref())
    }

    /// Capability flags for a registered processor
    pub fn processor_capabilities(&self, name: &str) -> Option<PluginCapabilities> {
        self.processors.get(name).map(|e| e.capabilities)
    }

    /// Names of registered source plugins
    pub fn source_names(&self) -> Vec<&str> {
        self.sources.keys().map(|s| s.as_str()).collect()
    }

    /// Names of registered buffer plugins
    pub fn buffer_names(&self) -> Vec<&str> {
        self.buffers.keys().map(|s| s.as_str()).collect()
    }

    /// Names of registered processor plugins
    pub fn processor_names(&self) -> Vec<&str> {
        self.processors.keys().map(|s| s.as_str()).collect()
    }

    /// Names of registered sink plugins
    pub fn sink_names(&self) -> Vec<&str> {
        self.sinks.keys().map(|s| s.as_str()).collect()
    }
}

#[cfg(test)]
#[path = "registry_test.rs"]
mod tests;
