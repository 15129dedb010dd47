//! Weir - Topology
//!
//! The declarative topology document: parsing into an in-memory model
//! and validation into a build order.
//!
//! # Document shape
//!
//! A TOML mapping from pipeline name to pipeline table:
//!
//! ```toml
//! [entry]
//! workers = 2
//! delay = "50ms"
//! source = { file = { path = "in.ndjson" } }
//! buffer = { bounded = { capacity = 512 } }
//! processor = [ { parse_json = {} } ]
//! sink = [ { pipeline = { name = "enrich" } } ]
//!
//! [enrich]
//! source = { pipeline = { name = "entry" } }
//! sink = [ { stdout = {} } ]
//! ```
//!
//! Each plugin entry is a single-key table; the key is the plugin name
//! and the value its attribute table. `pipeline` is the reserved name
//! for in-process links between pipelines. Duplicate keys anywhere in
//! the document are rejected by the TOML parser.
//!
//! # Validation
//!
//! [`validate`] checks structural invariants (unique non-empty names,
//! required stages, known references), rejects cycles in the
//! inter-pipeline reference graph, and returns a topological build
//! order with upstream pipelines before their dependents.

mod error;
mod model;
mod validator;

pub use error::TopologyError;
pub use model::{PipelineSpec, Topology};
pub use validator::validate;

/// Result type for topology operations
pub type Result<T> = std::result::Result<T, TopologyError>;
