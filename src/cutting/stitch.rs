//! Cross-chunk stitching.
//!
//! Supervoxels joined by must-merge edges are one object no matter how
//! the split goes, so they are collapsed into a single representative
//! (the smallest id of the group) before any flow is computed.

use std::time::Instant;

use hashbrown::HashMap;
use tracing::debug;

use crate::model::{Edges, NodeId};
use crate::{Error, Result};

/// Two-way table between original ids and their representatives.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StitchMapping {
    /// original id → representative, for every id referenced by an edge
    forward: HashMap<NodeId, NodeId>,
    /// representative → sorted members, only for groups larger than one
    reverse: HashMap<NodeId, Vec<NodeId>>,
}

impl StitchMapping {
    fn insert(&mut self, node: NodeId, representative: NodeId) -> Result<()> {
        match self.forward.insert(node, representative) {
            Some(first) if first != representative => Err(Error::MalformedMapping {
                node,
                first,
                second: representative,
            }),
            _ => Ok(()),
        }
    }

    /// Representative of `id`. Ids no edge referenced stand for themselves.
    pub fn representative(&self, id: NodeId) -> NodeId {
        self.forward.get(&id).copied().unwrap_or(id)
    }

    pub fn get(&self, id: NodeId) -> Option<NodeId> {
        self.forward.get(&id).copied()
    }

    /// Members collapsed into `representative`, if it stands for a group.
    pub fn members(&self, representative: NodeId) -> Option<&[NodeId]> {
        self.reverse.get(&representative).map(Vec::as_slice)
    }

    /// Original ids behind a stitched id: its group, or just itself.
    pub fn preimage<'a>(&'a self, stitched: &'a NodeId) -> &'a [NodeId] {
        match self.reverse.get(stitched) {
            Some(members) => members,
            None => std::slice::from_ref(stitched),
        }
    }

    pub fn forward(&self) -> &HashMap<NodeId, NodeId> {
        &self.forward
    }

    pub fn reverse(&self) -> &HashMap<NodeId, Vec<NodeId>> {
        &self.reverse
    }

    /// True when no two ids were merged.
    pub fn is_identity(&self) -> bool {
        self.reverse.is_empty()
    }
}

/// Output of [`stitch`].
#[derive(Debug, Clone)]
pub struct Stitched {
    /// Input edges in representative space, must-merge edges removed.
    pub edges: Edges,
    pub mapping: StitchMapping,
}

/// Union-find over dense slots. Slots are assigned in ascending id
/// order and a union always keeps the smaller root, so every root is the
/// minimum of its component.
struct MinRootForest {
    parent: Vec<u32>,
}

impl MinRootForest {
    fn new(n: usize) -> Self {
        Self { parent: (0..n as u32).collect() }
    }

    fn find(&mut self, mut x: u32) -> u32 {
        while self.parent[x as usize] != x {
            self.parent[x as usize] = self.parent[self.parent[x as usize] as usize];
            x = self.parent[x as usize];
        }
        x
    }

    fn union(&mut self, a: u32, b: u32) {
        let (ra, rb) = (self.find(a), self.find(b));
        if ra != rb {
            let (lo, hi) = if ra < rb { (ra, rb) } else { (rb, ra) };
            self.parent[hi as usize] = lo;
        }
    }
}

/// Collapse must-merge components and rewrite the remaining edges.
pub fn stitch(edges: &Edges) -> Result<Stitched> {
    let started = Instant::now();

    let nodes = edges.unique_nodes();
    let slot: HashMap<NodeId, u32> = nodes.iter().enumerate().map(|(i, &id)| (id, i as u32)).collect();

    let mut forest = MinRootForest::new(nodes.len());
    let mut must_merge = 0usize;
    for (a, b, aff) in edges.iter() {
        if aff.is_must_merge() {
            forest.union(slot[&a], slot[&b]);
            must_merge += 1;
        }
    }

    let mut mapping = StitchMapping::default();
    for (i, &node) in nodes.iter().enumerate() {
        let representative = nodes[forest.find(i as u32) as usize];
        mapping.insert(node, representative)?;
        if representative != node {
            mapping.reverse.entry(representative).or_insert_with(|| vec![representative]).push(node);
        }
    }

    let keep: Vec<bool> = edges.affinities().iter().map(|aff| !aff.is_must_merge()).collect();
    let kept = edges.select(&keep)?;
    let stitched = Edges::from_columns(
        kept.node_ids1().iter().map(|&id| mapping.representative(id)).collect(),
        kept.node_ids2().iter().map(|&id| mapping.representative(id)).collect(),
        kept.affinities().to_vec(),
        kept.areas().to_vec(),
    )?;

    debug!(
        nodes = nodes.len(),
        must_merge,
        groups = mapping.reverse.len(),
        "Stitching: {:.2}ms",
        started.elapsed().as_secs_f64() * 1000.0
    );

    Ok(Stitched { edges: stitched, mapping })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{node_ids, Affinity};

    #[test]
    fn test_chain_collapses_to_smallest_id() {
        let edges = Edges::from_weighted(&[(1, 2, 10.0), (3, 2, f32::INFINITY), (3, 4, 5.0)]);
        let out = stitch(&edges).unwrap();

        assert_eq!(out.mapping.representative(NodeId(3)), NodeId(2));
        assert_eq!(out.mapping.representative(NodeId(2)), NodeId(2));
        assert_eq!(out.mapping.members(NodeId(2)), Some(&node_ids([2, 3])[..]));
        assert_eq!(out.mapping.members(NodeId(1)), None);

        assert_eq!(out.edges.pairs(), &[[NodeId(1), NodeId(2)], [NodeId(2), NodeId(4)]]);
        assert_eq!(out.edges.affinities(), &[Affinity::Weight(10.0), Affinity::Weight(5.0)]);
    }

    #[test]
    fn test_every_endpoint_in_forward_mapping() {
        let edges = Edges::from_weighted(&[(5, 6, 0.3), (7, 8, f32::INFINITY), (8, 9, f32::INFINITY)]);
        let out = stitch(&edges).unwrap();
        let mut keys: Vec<NodeId> = out.mapping.forward().keys().copied().collect();
        keys.sort();
        assert_eq!(keys, node_ids([5, 6, 7, 8, 9]));
        assert_eq!(out.mapping.representative(NodeId(9)), NodeId(7));
        assert_eq!(out.edges.len(), 1);
    }

    #[test]
    fn test_restitch_is_identity() {
        let edges = Edges::from_weighted(&[(1, 2, 1.0), (2, 3, f32::INFINITY), (3, 4, 2.0), (4, 5, 0.5)]);
        let once = stitch(&edges).unwrap();
        let twice = stitch(&once.edges).unwrap();

        assert!(twice.mapping.is_identity());
        assert!(twice.mapping.forward().iter().all(|(k, v)| k == v));
        assert_eq!(twice.edges, once.edges);
    }

    #[test]
    fn test_preimage_falls_back_to_self() {
        let edges = Edges::from_weighted(&[(10, 11, f32::INFINITY), (11, 12, 1.0)]);
        let out = stitch(&edges).unwrap();
        let ten = NodeId(10);
        let twelve = NodeId(12);
        assert_eq!(out.mapping.preimage(&ten), &node_ids([10, 11])[..]);
        assert_eq!(out.mapping.preimage(&twelve), &[NodeId(12)]);
    }

    #[test]
    fn test_conflicting_insert_is_malformed() {
        let mut mapping = StitchMapping::default();
        mapping.insert(NodeId(4), NodeId(1)).unwrap();
        mapping.insert(NodeId(4), NodeId(1)).unwrap();
        let err = mapping.insert(NodeId(4), NodeId(2)).unwrap_err();
        assert!(matches!(err, Error::MalformedMapping { node: NodeId(4), first: NodeId(1), second: NodeId(2) }));
    }
}
