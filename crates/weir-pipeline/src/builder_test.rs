//! Builder tests
//!
//! Cover wiring of pipeline links, build ordering, failure unwinding in
//! both directions of the reference graph, and processor multiplicity.

use std::str::FromStr;
use std::sync::Arc;

use weir_peer::LocalPeerForwarder;
use weir_plugin::{default_registry, PluginFactory};
use weir_topology::{Topology, TopologyError};

use super::PipelineBuilder;

fn builder() -> PipelineBuilder {
    PipelineBuilder::new(
        PluginFactory::new(Arc::new(default_registry())),
        Arc::new(LocalPeerForwarder::default()),
    )
}

fn topology(doc: &str) -> Topology {
    Topology::from_str(doc).unwrap()
}

/// Compare trait objects by data pointer, across trait types
fn same_object<A: ?Sized, B: ?Sized>(a: &Arc<A>, b: &Arc<B>) -> bool {
    std::ptr::eq(Arc::as_ptr(a) as *const u8, Arc::as_ptr(b) as *const u8)
}

#[test]
fn test_linear_link_shares_one_connector() {
    let topo = topology(
        r#"
[a]
source = { stdin = {} }
sink = [ { pipeline = { name = "b" } } ]

[b]
source = { pipeline = { name = "a" } }
sink = [ { stdout = {} } ]
"#,
    );

    let runnable = builder().build(&topo).unwrap();
    assert_eq!(runnable.len(), 2);

    let a = &runnable["a"];
    let b = &runnable["b"];

    // A's only sink and B's source are the same connector object
    assert_eq!(b.source().name(), "pipeline");
    assert_eq!(a.sinks().len(), 1);
    assert!(same_object(&a.sinks()[0], b.source()));

    // Upstream pipelines come first in the runnable map
    let names: Vec<&str> = runnable.keys().map(|s| s.as_str()).collect();
    assert_eq!(names, vec!["a", "b"]);
}

#[test]
fn test_fan_in_shares_the_downstream_connector() {
    let topo = topology(
        r#"
[x]
source = { stdin = {} }
sink = [ { pipeline = { name = "z" } } ]

[y]
source = { stdin = {} }
sink = [ { pipeline = { name = "z" } } ]

[z]
source = { pipeline = { name = "x" } }
sink = [ { null = {} } ]
"#,
    );

    let runnable = builder().build(&topo).unwrap();
    assert_eq!(runnable.len(), 3);

    // Exactly one connector exists for z, shared by both upstream sinks
    let x_sink = &runnable["x"].sinks()[0];
    let y_sink = &runnable["y"].sinks()[0];
    let z_source = runnable["z"].source();

    assert!(same_object(x_sink, z_source));
    assert!(same_object(y_sink, z_source));
}

#[test]
fn test_cycle_aborts_whole_build() {
    let topo = topology(
        r#"
[a]
source = { stdin = {} }
sink = [ { pipeline = { name = "b" } } ]

[b]
source = { stdin = {} }
sink = [ { pipeline = { name = "a" } } ]
"#,
    );

    let err = builder().build(&topo).unwrap_err();
    assert!(matches!(err, TopologyError::Cycle { .. }));
}

#[test]
fn test_unknown_processor_unwinds_chain() {
    // a -> b -> c, with b's processor unknown; the whole chain goes
    let topo = topology(
        r#"
[a]
source = { stdin = {} }
sink = [ { pipeline = { name = "b" } } ]

[b]
source = { pipeline = { name = "a" } }
processor = [ { nonexistent = {} } ]
sink = [ { pipeline = { name = "c" } } ]

[c]
source = { pipeline = { name = "b" } }
sink = [ { stdout = {} } ]
"#,
    );

    let runnable = builder().build(&topo).unwrap();
    assert!(runnable.is_empty());
}

#[test]
fn test_unwind_spares_disconnected_pipelines() {
    let topo = topology(
        r#"
[doomed]
source = { stdin = {} }
processor = [ { nonexistent = {} } ]
sink = [ { null = {} } ]

[survivor]
source = { stdin = {} }
sink = [ { null = {} } ]
"#,
    );

    let runnable = builder().build(&topo).unwrap();
    assert_eq!(runnable.len(), 1);
    assert!(runnable.contains_key("survivor"));
}

#[test]
fn test_unwind_follows_upstream_direction() {
    // The upstream fails; its already-unbuilt downstream is removed too
    let topo = topology(
        r#"
[a]
source = { nonexistent = {} }
sink = [ { pipeline = { name = "b" } } ]

[b]
source = { pipeline = { name = "a" } }
sink = [ { null = {} } ]
"#,
    );

    let runnable = builder().build(&topo).unwrap();
    assert!(runnable.is_empty());
}

#[test]
fn test_unwind_follows_reverse_references() {
    // q was already built when p fails; q references p only from its
    // own sink, so the unwind must walk the reverse direction to find it
    let topo = topology(
        r#"
[q]
source = { stdin = {} }
sink = [ { pipeline = { name = "p" } } ]

[p]
source = { pipeline = { name = "q" } }
sink = [ { nonexistent = {} } ]
"#,
    );

    let runnable = builder().build(&topo).unwrap();
    assert!(runnable.is_empty());
}

#[test]
fn test_single_thread_processor_gets_worker_instances() {
    let topo = topology(
        r#"
[counts]
workers = 4
source = { stdin = {} }
processor = [
    { noop = {} },
    { aggregate_count = { identification_keys = ["k"] } },
]
sink = [ { null = {} } ]
"#,
    );

    let runnable = builder().build(&topo).unwrap();
    let pipeline = &runnable["counts"];
    assert_eq!(pipeline.worker_count(), 4);

    let stages = pipeline.stages();
    assert_eq!(stages.len(), 2);

    // Shared stage: one instance; single-thread stage: one per worker
    assert_eq!(stages[0].instances().len(), 1);
    assert_eq!(stages[1].instances().len(), 4);
    assert_eq!(stages[1].plugin_name(), "aggregate_count");

    // The decorator reports the wrapped plugin's name
    assert_eq!(stages[1].instances()[0].name(), "aggregate_count");
}

#[test]
fn test_peer_forwarding_requires_identification_keys() {
    let topo = topology(
        r#"
[counts]
source = { stdin = {} }
processor = [ { aggregate_count = {} } ]
sink = [ { null = {} } ]
"#,
    );

    let runnable = builder().build(&topo).unwrap();
    assert!(runnable.is_empty());
}

#[test]
fn test_peer_forwarding_behind_connector_rejected() {
    // The stateful stage sits in a connector-fed pipeline; the whole
    // connected component is unwound
    let topo = topology(
        r#"
[entry]
source = { stdin = {} }
sink = [ { pipeline = { name = "stateful" } } ]

[stateful]
source = { pipeline = { name = "entry" } }
processor = [ { aggregate_count = { identification_keys = ["k"] } } ]
sink = [ { null = {} } ]
"#,
    );

    let runnable = builder().build(&topo).unwrap();
    assert!(runnable.is_empty());
}

#[test]
fn test_peer_forwarding_at_entry_is_allowed() {
    let topo = topology(
        r#"
[entry]
source = { stdin = {} }
processor = [ { aggregate_count = { identification_keys = ["k"] } } ]
sink = [ { pipeline = { name = "out" } } ]

[out]
source = { pipeline = { name = "entry" } }
sink = [ { null = {} } ]
"#,
    );

    let runnable = builder().build(&topo).unwrap();
    assert_eq!(runnable.len(), 2);
}

#[test]
fn test_declaration_order_does_not_matter() {
    // Downstream declared before its upstream; the builder re-enters
    // through the source link and still builds both exactly once
    let topo = topology(
        r#"
[late]
source = { pipeline = { name = "early" } }
sink = [ { stdout = {} } ]

[early]
source = { stdin = {} }
sink = [ { pipeline = { name = "late" } } ]
"#,
    );

    let runnable = builder().build(&topo).unwrap();
    assert_eq!(runnable.len(), 2);

    let names: Vec<&str> = runnable.keys().map(|s| s.as_str()).collect();
    assert_eq!(names, vec!["early", "late"]);
    assert!(same_object(
        &runnable["early"].sinks()[0],
        runnable["late"].source()
    ));
}
