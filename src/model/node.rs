//! Node identifiers for supervoxels, agglomerated nodes and roots.

use serde::{Deserialize, Serialize};

/// Opaque 64-bit node identifier.
///
/// Chunk and layer bits are owned by the identity scheme of the storage
/// layer; nothing in this crate looks inside the value beyond equality
/// and ordering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(pub u64);

impl NodeId {
    pub fn get(self) -> u64 {
        self.0
    }
}

impl From<u64> for NodeId {
    fn from(raw: u64) -> Self {
        NodeId(raw)
    }
}

impl From<NodeId> for u64 {
    fn from(id: NodeId) -> Self {
        id.0
    }
}

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Collect raw ids into `NodeId`s. Handy for tests and fixtures.
pub fn node_ids(raw: impl IntoIterator<Item = u64>) -> Vec<NodeId> {
    raw.into_iter().map(NodeId).collect()
}
