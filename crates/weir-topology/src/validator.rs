//! Topology validation
//!
//! Validates cross-pipeline consistency and produces a build order:
//! - pipeline names are non-empty, every pipeline has at least one sink
//! - every `pipeline` link target exists
//! - the inter-pipeline reference graph is acyclic
//! - warns when a pipeline's records can never reach a real sink
//!
//! The reference graph is directed by data flow (upstream → downstream).
//! An edge may be declared from either endpoint: the upstream's
//! `pipeline` sink, the downstream's `pipeline` source, or both; the two
//! declarations describe the same edge and are deduplicated.

use std::collections::HashSet;

use indexmap::IndexMap;

use weir_model::PIPELINE_PLUGIN;

use crate::error::TopologyError;
use crate::model::Topology;
use crate::Result;

/// Validate a topology and return the build order.
///
/// The order lists upstream pipelines before the pipelines that consume
/// from them, with ties broken by document order.
pub fn validate(topology: &Topology) -> Result<Vec<String>> {
    if topology.is_empty() {
        return Err(TopologyError::Empty);
    }

    for spec in topology.pipelines() {
        if spec.name().is_empty() {
            return Err(TopologyError::EmptyPipelineName);
        }
        if spec.sinks().is_empty() {
            return Err(TopologyError::missing_field(spec.name(), "sink"));
        }

        // A `pipeline` plugin without a name attribute is not a usable link
        if spec.source().name() == PIPELINE_PLUGIN && spec.source().pipeline_link().is_none() {
            return Err(TopologyError::invalid_field(
                spec.name(),
                "source",
                "pipeline link requires a 'name' attribute",
            ));
        }
        for sink in spec.sinks() {
            if sink.name() == PIPELINE_PLUGIN && sink.pipeline_link().is_none() {
                return Err(TopologyError::invalid_field(
                    spec.name(),
                    "sink",
                    "pipeline link requires a 'name' attribute",
                ));
            }
        }

        for linked in spec.linked_pipelines() {
            if !topology.contains(linked) {
                return Err(TopologyError::unknown_pipeline(spec.name(), linked));
            }
        }
    }

    let graph = ReferenceGraph::build(topology);

    if let Some(cycle) = graph.find_cycle() {
        return Err(TopologyError::Cycle { pipelines: cycle });
    }

    warn_unobservable(topology, &graph);

    Ok(graph.topological_order())
}

/// The deduplicated data-flow graph between pipelines
struct ReferenceGraph {
    /// Adjacency: upstream → downstreams, both in document order
    downstream: IndexMap<String, Vec<String>>,
}

impl ReferenceGraph {
    fn build(topology: &Topology) -> Self {
        let mut downstream: IndexMap<String, Vec<String>> = topology
            .names()
            .map(|name| (name.to_string(), Vec::new()))
            .collect();

        let mut push_edge = |from: &str, to: &str| {
            let targets = downstream.get_mut(from).expect("all names pre-seeded");
            if !targets.iter().any(|t| t == to) {
                targets.push(to.to_string());
            }
        };

        for spec in topology.pipelines() {
            if let Some(upstream) = spec.source().pipeline_link() {
                push_edge(upstream, spec.name());
            }
            for sink in spec.sinks() {
                if let Some(linked) = sink.pipeline_link() {
                    push_edge(spec.name(), linked);
                }
            }
        }

        Self { downstream }
    }

    /// DFS cycle search; returns the cycle path (first node repeated at
    /// the end) if one exists
    fn find_cycle(&self) -> Option<Vec<String>> {
        let mut visited = HashSet::new();
        let mut stack = Vec::new();

        for start in self.downstream.keys() {
            if !visited.contains(start.as_str()) {
                if let Some(cycle) = self.dfs(start, &mut visited, &mut stack) {
                    return Some(cycle);
                }
            }
        }
        None
    }

    fn dfs<'a>(
        &'a self,
        node: &'a str,
        visited: &mut HashSet<&'a str>,
        stack: &mut Vec<&'a str>,
    ) -> Option<Vec<String>> {
        if let Some(pos) = stack.iter().position(|n| *n == node) {
            let mut cycle: Vec<String> = stack[pos..].iter().map(|s| s.to_string()).collect();
            cycle.push(node.to_string());
            return Some(cycle);
        }
        if visited.contains(node) {
            return None;
        }

        stack.push(node);
        let (key, targets) = self
            .downstream
            .get_key_value(node)
            .expect("all nodes pre-seeded");
        for next in targets {
            if let Some(cycle) = self.dfs(next, visited, stack) {
                return Some(cycle);
            }
        }
        stack.pop();
        visited.insert(key.as_str());
        None
    }

    /// Kahn's algorithm with document-order tie-breaking.
    ///
    /// Must only be called on an acyclic graph.
    fn topological_order(&self) -> Vec<String> {
        let mut indegree: IndexMap<&str, usize> =
            self.downstream.keys().map(|name| (name.as_str(), 0)).collect();
        for targets in self.downstream.values() {
            for target in targets {
                *indegree.get_mut(target.as_str()).expect("all nodes pre-seeded") += 1;
            }
        }

        let mut order = Vec::with_capacity(indegree.len());
        let mut emitted: HashSet<&str> = HashSet::new();

        while order.len() < indegree.len() {
            // First ready pipeline in document order
            let next = indegree
                .iter()
                .find(|(name, degree)| **degree == 0 && !emitted.contains(*name))
                .map(|(name, _)| *name)
                .expect("acyclic graph always has a ready node");

            emitted.insert(next);
            order.push(next.to_string());

            for target in &self.downstream[next] {
                *indegree.get_mut(target.as_str()).expect("all nodes pre-seeded") -= 1;
            }
        }

        order
    }
}

/// Warn about pipelines whose records can never be observed outside the
/// process: no real (non-pipeline) sink is reachable via sink links.
fn warn_unobservable(topology: &Topology, graph: &ReferenceGraph) {
    for spec in topology.pipelines() {
        let mut reachable = Vec::new();
        let mut seen = HashSet::new();
        reachable.push(spec.name());
        seen.insert(spec.name());

        let mut observable = false;
        while let Some(current) = reachable.pop() {
            let current_spec = topology.get(current).expect("validated above");
            if current_spec
                .sinks()
                .iter()
                .any(|s| s.pipeline_link().is_none())
            {
                observable = true;
                break;
            }
            for next in &graph.downstream[current] {
                if seen.insert(next.as_str()) {
                    reachable.push(next.as_str());
                }
            }
        }

        if !observable {
            tracing::warn!(
                pipeline = spec.name(),
                "no observable sink reachable from this pipeline; its records never leave the process"
            );
        }
    }
}

#[cfg(test)]
#[path = "validator_test.rs"]
mod tests;
