//! Plugin factory - spec to instance resolution
//!
//! The factory turns a [`PluginSpec`] into live plugin instances using
//! the registry. Sources, buffers, and sinks are always single
//! instances; a processor spec yields a whole stage whose instance count
//! is decided by a multiplicity function over the plugin's capabilities.

use std::sync::Arc;

use weir_model::{Buffer, PluginKind, PluginSpec, Processor, Sink, Source};

use crate::error::{PluginLoadError, Result};
use crate::registry::{PluginCapabilities, PluginRegistry};

/// Instantiates plugins from specs.
///
/// Cheap to clone; shares the registry.
#[derive(Clone)]
pub struct PluginFactory {
    registry: Arc<PluginRegistry>,
}

impl PluginFactory {
    /// Create a factory over a registry
    pub fn new(registry: Arc<PluginRegistry>) -> Self {
        Self { registry }
    }

    /// The underlying registry
    pub fn registry(&self) -> &PluginRegistry {
        &self.registry
    }

    /// Load a source plugin
    pub fn load_source(&self, spec: &PluginSpec) -> Result<Arc<dyn Source>> {
        let factory = self.registry.source(spec.name()).ok_or_else(|| {
            PluginLoadError::unknown(PluginKind::Source, spec.name(), self.registry.source_names())
        })?;
        factory.create(spec)
    }

    /// Load a buffer plugin
    pub fn load_buffer(&self, spec: &PluginSpec) -> Result<Arc<dyn Buffer>> {
        let factory = self.registry.buffer(spec.name()).ok_or_else(|| {
            PluginLoadError::unknown(PluginKind::Buffer, spec.name(), self.registry.buffer_names())
        })?;
        factory.create(spec)
    }

    /// Load a sink plugin
    pub fn load_sink(&self, spec: &PluginSpec) -> Result<Arc<dyn Sink>> {
        let factory = self.registry.sink(spec.name()).ok_or_else(|| {
            PluginLoadError::unknown(PluginKind::Sink, spec.name(), self.registry.sink_names())
        })?;
        factory.create(spec)
    }

    /// Load a processor stage.
    ///
    /// `multiplicity` maps the resolved plugin's capabilities to an
    /// instance count (at least one instance is always produced). The
    /// stage is constructed all-or-nothing: the first failing instance
    /// aborts the whole stage and nothing is returned.
    pub fn load_processors(
        &self,
        spec: &PluginSpec,
        multiplicity: impl Fn(&PluginCapabilities) -> usize,
    ) -> Result<Vec<Arc<dyn Processor>>> {
        let entry = self.registry.processor(spec.name()).ok_or_else(|| {
            PluginLoadError::unknown(
                PluginKind::Processor,
                spec.name(),
                self.registry.processor_names(),
            )
        })?;

        let count = multiplicity(&entry.capabilities).max(1);
        let mut instances = Vec::with_capacity(count);
        for _ in 0..count {
            instances.push(entry.factory.create(spec)?);
        }

        tracing::debug!(
            processor = spec.name(),
            instances = count,
            single_thread = entry.capabilities.single_thread,
            "processor stage constructed"
        );

        Ok(instances)
    }

    /// Capability flags for a registered processor
    pub fn processor_capabilities(&self, name: &str) -> Option<PluginCapabilities> {
        self.registry.processor_capabilities(name)
    }
}

#[cfg(test)]
#[path = "factory_test.rs"]
mod tests;
