//! # Chunked Graph Model
//!
//! Value objects that cross every boundary: storage ↔ cutting ↔ lineage ↔ user.
//!
//! Design rule: this module is pure data. No I/O, no async.

pub mod node;
pub mod edges;
pub mod edge_utils;
pub mod operation_log;

pub use node::{NodeId, node_ids};
pub use edges::{Affinity, EdgeType, Edges, EdgesByType, DEFAULT_AFFINITY, DEFAULT_AREA};
pub use edge_utils::{
    concatenate_chunk_edges, filter_edges, flatten_parents_children, get_active_edges,
};
pub use operation_log::{OperationLog, RawLogEntry, StatusCode};
