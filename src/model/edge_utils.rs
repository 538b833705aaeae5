//! Combining and filtering edge sets read from many chunks.

use hashbrown::{HashMap, HashSet};

use super::{EdgeType, Edges, EdgesByType, NodeId};

/// Merge the per-chunk edge sets of several chunks into one set per type.
pub fn concatenate_chunk_edges(chunks: &[EdgesByType]) -> EdgesByType {
    let mut merged = EdgesByType::new();
    for edge_type in EdgeType::ALL {
        merged.set(edge_type, Edges::concat(chunks.iter().map(|c| c.get(edge_type))));
    }
    merged
}

/// Every edge, of any type, whose first endpoint is one of `node_ids`.
///
/// Stored edge sets list each edge from both sides, so keying on the
/// first endpoint yields the full neighborhood of the requested nodes.
pub fn filter_edges(node_ids: &[NodeId], edges: &EdgesByType) -> Edges {
    let wanted: HashSet<NodeId> = node_ids.iter().copied().collect();
    let parts: Vec<Edges> = EdgeType::ALL
        .iter()
        .map(|&t| edges.get(t).filter(|a, _, _| wanted.contains(&a)))
        .collect();
    Edges::concat(&parts)
}

/// `{parent: [children]}` flattened into two parallel columns.
pub fn flatten_parents_children(parent_children: &HashMap<NodeId, Vec<NodeId>>) -> (Vec<NodeId>, Vec<NodeId>) {
    let mut parents: Vec<&NodeId> = parent_children.keys().collect();
    parents.sort_unstable();

    let mut parent_ids = Vec::new();
    let mut child_ids = Vec::new();
    for parent in parents {
        let children = &parent_children[parent];
        parent_ids.extend(std::iter::repeat_n(*parent, children.len()));
        child_ids.extend_from_slice(children);
    }
    (parent_ids, child_ids)
}

/// Edges whose endpoints share a parent, i.e. edges that are part of an
/// agglomerated component. A node with no listed parent is its own parent.
pub fn get_active_edges(edges: &Edges, parent_children: &HashMap<NodeId, Vec<NodeId>>) -> Edges {
    let (parents, children) = flatten_parents_children(parent_children);
    let child_parent: HashMap<NodeId, NodeId> = children.into_iter().zip(parents).collect();
    let parent_of = |id: NodeId| child_parent.get(&id).copied().unwrap_or(id);

    edges.filter(|a, b, _| parent_of(a) == parent_of(b))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::node_ids;

    fn chunk(in_chunk: &[(u64, u64, f32)], cross: &[(u64, u64, f32)]) -> EdgesByType {
        EdgesByType::new()
            .with(EdgeType::InChunk, Edges::from_weighted(in_chunk))
            .with(EdgeType::CrossChunk, Edges::from_weighted(cross))
    }

    #[test]
    fn test_concatenate_chunk_edges() {
        let a = chunk(&[(1, 2, 0.5)], &[(2, 10, f32::INFINITY)]);
        let b = chunk(&[(10, 11, 0.7), (11, 12, 0.1)], &[]);
        let merged = concatenate_chunk_edges(&[a, b]);

        assert_eq!(merged.in_chunk.len(), 3);
        assert_eq!(merged.cross_chunk.len(), 1);
        assert!(merged.between_chunk.is_empty());
        assert_eq!(merged.in_chunk.node_ids1(), &node_ids([1, 10, 11])[..]);
    }

    #[test]
    fn test_filter_edges_uses_first_endpoint() {
        let edges = chunk(&[(1, 2, 0.5), (2, 1, 0.5), (3, 4, 0.2)], &[(2, 9, f32::INFINITY)]);
        let filtered = filter_edges(&node_ids([2]), &edges);
        assert_eq!(filtered.len(), 2);
        assert!(filtered.node_ids1().iter().all(|&id| id == NodeId(2)));
        assert!(filtered.affinities()[1].is_must_merge());
    }

    #[test]
    fn test_flatten_parents_children() {
        let mut pc = HashMap::new();
        pc.insert(NodeId(100), node_ids([1, 2]));
        pc.insert(NodeId(50), node_ids([3]));
        let (parents, children) = flatten_parents_children(&pc);
        assert_eq!(parents, node_ids([50, 100, 100]));
        assert_eq!(children, node_ids([3, 1, 2]));
    }

    #[test]
    fn test_get_active_edges() {
        let edges = Edges::from_weighted(&[(1, 2, 0.9), (2, 3, 0.1), (3, 4, 0.8), (5, 5, 0.3)]);
        let mut pc = HashMap::new();
        pc.insert(NodeId(100), node_ids([1, 2]));
        pc.insert(NodeId(200), node_ids([3, 4]));

        let active = get_active_edges(&edges, &pc);
        assert_eq!(active.pairs(), &[
            [NodeId(1), NodeId(2)],
            [NodeId(3), NodeId(4)],
            [NodeId(5), NodeId(5)],
        ]);
    }
}
