//! Topology document model
//!
//! Deserializes the TOML topology document into [`Topology`], preserving
//! pipeline insertion order. Structural checks that do not need the
//! whole graph (exactly-one-key plugin entries, attribute tables) happen
//! here; cross-pipeline checks live in the validator.

use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use indexmap::IndexMap;
use serde::Deserialize;

use weir_model::PluginSpec;

use crate::error::TopologyError;
use crate::Result;

const DEFAULT_WORKERS: usize = 1;
const DEFAULT_DELAY: Duration = Duration::from_secs(3);

/// One parsed pipeline definition
#[derive(Debug, Clone)]
pub struct PipelineSpec {
    name: String,
    workers: usize,
    read_batch_delay: Duration,
    source: PluginSpec,
    buffer: Option<PluginSpec>,
    processors: Vec<PluginSpec>,
    sinks: Vec<PluginSpec>,
}

impl PipelineSpec {
    /// The pipeline name
    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Processor worker count
    #[inline]
    pub fn workers(&self) -> usize {
        self.workers
    }

    /// How long a worker may wait accumulating a batch
    #[inline]
    pub fn read_batch_delay(&self) -> Duration {
        self.read_batch_delay
    }

    /// The source plugin spec
    #[inline]
    pub fn source(&self) -> &PluginSpec {
        &self.source
    }

    /// The buffer plugin spec, if declared
    #[inline]
    pub fn buffer(&self) -> Option<&PluginSpec> {
        self.buffer.as_ref()
    }

    /// Ordered processor stage specs
    #[inline]
    pub fn processors(&self) -> &[PluginSpec] {
        &self.processors
    }

    /// Ordered sink specs
    #[inline]
    pub fn sinks(&self) -> &[PluginSpec] {
        &self.sinks
    }

    /// Names of pipelines this pipeline references via `pipeline` links
    /// (source first, then sinks, in declaration order)
    pub fn linked_pipelines(&self) -> Vec<&str> {
        let mut linked = Vec::new();
        if let Some(upstream) = self.source.pipeline_link() {
            linked.push(upstream);
        }
        for sink in &self.sinks {
            if let Some(downstream) = sink.pipeline_link() {
                linked.push(downstream);
            }
        }
        linked
    }
}

/// The parsed topology: named pipelines in document order
#[derive(Debug, Clone)]
pub struct Topology {
    pipelines: IndexMap<String, PipelineSpec>,
}

impl Topology {
    /// Load and parse a topology file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|e| TopologyError::Io {
            path: path.display().to_string(),
            source: e,
        })?;
        Self::from_str(&contents)
    }

    /// Look up a pipeline by name
    pub fn get(&self, name: &str) -> Option<&PipelineSpec> {
        self.pipelines.get(name)
    }

    /// Whether a pipeline exists
    pub fn contains(&self, name: &str) -> bool {
        self.pipelines.contains_key(name)
    }

    /// Iterate pipelines in document order
    pub fn pipelines(&self) -> impl Iterator<Item = &PipelineSpec> {
        self.pipelines.values()
    }

    /// Pipeline names in document order
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.pipelines.keys().map(|s| s.as_str())
    }

    /// Number of pipelines
    pub fn len(&self) -> usize {
        self.pipelines.len()
    }

    /// Whether the topology is empty
    pub fn is_empty(&self) -> bool {
        self.pipelines.is_empty()
    }
}

impl FromStr for Topology {
    type Err = TopologyError;

    fn from_str(s: &str) -> Result<Self> {
        let doc: TopologyDoc = toml::from_str(s)?;

        let mut pipelines = IndexMap::with_capacity(doc.0.len());
        for (name, pipeline) in doc.0 {
            let spec = into_pipeline_spec(&name, pipeline)?;
            pipelines.insert(name, spec);
        }

        Ok(Self { pipelines })
    }
}

// Raw deserialization shapes. Kept private; `Topology::from_str` converts
// them into the public model with per-pipeline context in errors.

#[derive(Debug, Deserialize)]
#[serde(transparent)]
struct TopologyDoc(IndexMap<String, PipelineDoc>);

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct PipelineDoc {
    #[serde(default)]
    workers: Option<i64>,

    #[serde(default, with = "humantime_serde::option")]
    delay: Option<Duration>,

    source: Option<PluginDoc>,

    #[serde(default)]
    buffer: Option<PluginDoc>,

    #[serde(default)]
    processor: Vec<PluginDoc>,

    #[serde(default)]
    sink: Vec<PluginDoc>,
}

#[derive(Debug, Deserialize)]
#[serde(transparent)]
struct PluginDoc(IndexMap<String, toml::Value>);

fn into_pipeline_spec(name: &str, doc: PipelineDoc) -> Result<PipelineSpec> {
    let workers = match doc.workers {
        None => DEFAULT_WORKERS,
        Some(n) if n >= 1 => n as usize,
        Some(n) => {
            return Err(TopologyError::invalid_field(
                name,
                "workers",
                format!("must be a positive integer, got {}", n),
            ));
        }
    };

    let source = match doc.source {
        Some(plugin) => into_plugin_spec(name, "source", plugin)?,
        None => return Err(TopologyError::missing_field(name, "source")),
    };

    let buffer = doc
        .buffer
        .map(|plugin| into_plugin_spec(name, "buffer", plugin))
        .transpose()?;

    let processors = doc
        .processor
        .into_iter()
        .map(|plugin| into_plugin_spec(name, "processor", plugin))
        .collect::<Result<Vec<_>>>()?;

    let sinks = doc
        .sink
        .into_iter()
        .map(|plugin| into_plugin_spec(name, "sink", plugin))
        .collect::<Result<Vec<_>>>()?;

    Ok(PipelineSpec {
        name: name.to_string(),
        workers,
        read_batch_delay: doc.delay.unwrap_or(DEFAULT_DELAY),
        source,
        buffer,
        processors,
        sinks,
    })
}

fn into_plugin_spec(pipeline: &str, field: &'static str, doc: PluginDoc) -> Result<PluginSpec> {
    let mut entries = doc.0.into_iter();
    let Some((plugin_name, attrs)) = entries.next() else {
        return Err(TopologyError::invalid_field(
            pipeline,
            field,
            "expected exactly one plugin entry, got none",
        ));
    };
    if entries.next().is_some() {
        return Err(TopologyError::invalid_field(
            pipeline,
            field,
            "expected exactly one plugin entry, got several",
        ));
    }

    let settings = match attrs {
        toml::Value::Table(table) => table,
        other => {
            return Err(TopologyError::invalid_field(
                pipeline,
                field,
                format!(
                    "plugin '{}' attributes must be a table, got {}",
                    plugin_name,
                    other.type_str()
                ),
            ));
        }
    };

    Ok(PluginSpec::new(plugin_name, settings))
}

#[cfg(test)]
#[path = "model_test.rs"]
mod tests;
