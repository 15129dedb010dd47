//! Pipeline builder
//!
//! Walks the validated topology in dependency order and turns each
//! pipeline spec into a runnable [`Pipeline`]: plugins through the
//! factory, `pipeline` links through shared connectors, stateful
//! processors behind the peer-forwarding decorator.
//!
//! # Failure handling
//!
//! Construction failures are contained at the per-pipeline boundary.
//! When a pipeline fails, every pipeline transitively connected to it
//! through `pipeline` references - in both directions - is removed from
//! the runnable map: a pipeline missing any connected peer cannot run.
//! The unwind is recursive and idempotent.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use indexmap::IndexMap;

use weir_model::{PluginKind, PluginSpec, Processor, Sink, Source};
use weir_peer::PeerForwarder;
use weir_plugin::{PluginFactory, PluginLoadError};
use weir_topology::{Topology, TopologyError};

use crate::connector::PipelineConnector;
use crate::decorator::PeerForwardingProcessor;
use crate::error::BuildError;
use crate::pipeline::{Pipeline, ProcessorStage};

/// Builds the runnable-pipeline map from a validated topology.
///
/// Single-threaded by construction: `build` consumes the builder, and
/// the returned map is read-only afterwards.
pub struct PipelineBuilder {
    factory: PluginFactory,
    forwarder: Arc<dyn PeerForwarder>,
    /// One connector per downstream pipeline, shared between the
    /// upstream sink slot and the downstream source slot
    connectors: HashMap<String, Arc<PipelineConnector>>,
}

impl PipelineBuilder {
    /// Create a builder over a plugin factory and a peer forwarder
    pub fn new(factory: PluginFactory, forwarder: Arc<dyn PeerForwarder>) -> Self {
        Self {
            factory,
            forwarder,
            connectors: HashMap::new(),
        }
    }

    /// Validate the topology and build every pipeline in it.
    ///
    /// Validator failures abort the whole startup; per-pipeline build
    /// failures only unwind the failed pipeline's connected component.
    /// The returned map iterates in build order (upstreams first).
    pub fn build(
        mut self,
        topology: &Topology,
    ) -> Result<IndexMap<String, Arc<Pipeline>>, TopologyError> {
        let order = weir_topology::validate(topology)?;

        let mut runnable = IndexMap::with_capacity(order.len());
        let mut failed = HashSet::new();

        for name in &order {
            self.build_pipeline(name, topology, &mut runnable, &mut failed);
        }

        tracing::info!(
            built = runnable.len(),
            failed = failed.len(),
            "topology build finished"
        );
        Ok(runnable)
    }

    /// Build one pipeline unless it was already built or unwound
    fn build_pipeline(
        &mut self,
        name: &str,
        topology: &Topology,
        runnable: &mut IndexMap<String, Arc<Pipeline>>,
        failed: &mut HashSet<String>,
    ) {
        if runnable.contains_key(name) || failed.contains(name) {
            return;
        }

        tracing::info!(pipeline = name, "building pipeline");
        match self.assemble(name, topology, runnable, failed) {
            Ok(pipeline) => {
                runnable.insert(name.to_string(), Arc::new(pipeline));
            }
            Err(e) => {
                tracing::error!(
                    pipeline = name,
                    error = %e,
                    "pipeline build failed, removing its connected pipelines"
                );
                self.unwind(name, topology, runnable, failed);
            }
        }
    }

    fn assemble(
        &mut self,
        name: &str,
        topology: &Topology,
        runnable: &mut IndexMap<String, Arc<Pipeline>>,
        failed: &mut HashSet<String>,
    ) -> Result<Pipeline, BuildError> {
        let spec = topology.get(name).expect("build order only lists known pipelines");

        // Source: an in-process connector for pipeline links, a real
        // plugin otherwise
        let source_link = spec.source().pipeline_link().map(|s| s.to_string());
        let source: Arc<dyn Source> = match &source_link {
            Some(upstream) => {
                // The upstream must exist before its connector can feed
                // this pipeline; re-enter the builder if the walk has
                // not reached it yet (the runnable map guards against
                // duplicate work)
                self.build_pipeline(upstream, topology, runnable, failed);
                if !runnable.contains_key(upstream) {
                    return Err(BuildError::UpstreamUnavailable {
                        pipeline: name.to_string(),
                        upstream: upstream.clone(),
                    });
                }

                let connector = self.connector_for(name);
                connector.set_upstream(upstream.clone());
                connector
            }
            None => self.factory.load_source(spec.source())?,
        };

        let buffer_spec = spec
            .buffer()
            .cloned()
            .unwrap_or_else(|| PluginSpec::bare("bounded"));
        let buffer = self.factory.load_buffer(&buffer_spec)?;

        let mut stages = Vec::with_capacity(spec.processors().len());
        for processor_spec in spec.processors() {
            let stage = self.build_stage(name, spec.workers(), processor_spec, source_link.is_some())?;
            stages.push(stage);
        }

        let mut sinks: Vec<Arc<dyn Sink>> = Vec::with_capacity(spec.sinks().len());
        for sink_spec in spec.sinks() {
            let sink: Arc<dyn Sink> = match sink_spec.pipeline_link() {
                Some(downstream) => self.connector_for(downstream),
                None => self.factory.load_sink(sink_spec)?,
            };
            sinks.push(sink);
        }

        Ok(Pipeline::new(
            name,
            source,
            buffer,
            stages,
            sinks,
            spec.workers(),
            spec.read_batch_delay(),
        ))
    }

    /// Build one processor stage, honoring single-thread multiplicity
    /// and wrapping stateful processors in the forwarding decorator.
    fn build_stage(
        &self,
        pipeline: &str,
        workers: usize,
        spec: &PluginSpec,
        fed_by_connector: bool,
    ) -> Result<ProcessorStage, BuildError> {
        let instances = self
            .factory
            .load_processors(spec, |caps| if caps.single_thread { workers } else { 1 })?;

        let capabilities = self
            .factory
            .processor_capabilities(spec.name())
            .unwrap_or_default();

        if !capabilities.requires_peer_forwarding {
            return Ok(ProcessorStage::new(spec.name(), instances));
        }

        // Records arriving through a connector were already partitioned
        // by the upstream pipeline; forwarding again here would route on
        // a different key set and break affinity
        if fed_by_connector {
            return Err(BuildError::PeerForwardingBehindConnector {
                pipeline: pipeline.to_string(),
                processor: spec.name().to_string(),
            });
        }

        let keys = spec.get_string_array("identification_keys").unwrap_or_default();
        if keys.is_empty() {
            return Err(BuildError::Plugin(PluginLoadError::invalid_config(
                PluginKind::Processor,
                spec.name(),
                "peer forwarding requires 'identification_keys'",
            )));
        }

        tracing::debug!(
            pipeline,
            processor = spec.name(),
            keys = ?keys,
            "wrapping processor for peer forwarding"
        );

        let decorated = instances
            .into_iter()
            .map(|inner| {
                Arc::new(PeerForwardingProcessor::new(
                    inner,
                    Arc::clone(&self.forwarder),
                    spec.name(),
                    keys.clone(),
                )) as Arc<dyn Processor>
            })
            .collect();

        Ok(ProcessorStage::new(spec.name(), decorated))
    }

    /// Get or create the single connector feeding the named downstream
    /// pipeline
    fn connector_for(&mut self, downstream: &str) -> Arc<PipelineConnector> {
        Arc::clone(self.connectors.entry(downstream.to_string()).or_insert_with(|| {
            tracing::debug!(downstream, "registering pipeline connector");
            Arc::new(PipelineConnector::new(downstream))
        }))
    }

    /// Remove a failed pipeline and everything transitively connected
    /// to it, following `pipeline` references in both directions.
    fn unwind(
        &mut self,
        name: &str,
        topology: &Topology,
        runnable: &mut IndexMap<String, Arc<Pipeline>>,
        failed: &mut HashSet<String>,
    ) {
        if !failed.insert(name.to_string()) {
            return;
        }

        if runnable.shift_remove(name).is_some() {
            tracing::warn!(pipeline = name, "removing built pipeline from runnable set");
        }
        self.connectors.remove(name);

        let Some(spec) = topology.get(name) else {
            return;
        };

        let mut connected: Vec<&str> = spec.linked_pipelines();
        for other in topology.pipelines() {
            if other.linked_pipelines().contains(&name) {
                connected.push(other.name());
            }
        }

        for neighbor in connected {
            self.unwind(neighbor, topology, runnable, failed);
        }
    }
}

#[cfg(test)]
#[path = "builder_test.rs"]
mod tests;
