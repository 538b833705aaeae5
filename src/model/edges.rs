//! Columnar edge sets between supervoxels.
//!
//! An [`Edges`] value is four parallel columns: both endpoints, the
//! affinity and the contact area of each edge. Lengths are checked at
//! construction; after that a set is never mutated in place, which is
//! what makes the cached pair view safe.

use std::sync::OnceLock;

use hashbrown::HashSet;
use serde::{Deserialize, Serialize};

use super::NodeId;
use crate::{Error, Result};

/// Legacy float written for an edge without a measured affinity.
pub const DEFAULT_AFFINITY: f32 = f32::MIN_POSITIVE;

/// Area recorded for an edge without a measured contact area.
pub const DEFAULT_AREA: f32 = f32::MIN_POSITIVE;

// ============================================================================
// Affinity
// ============================================================================

/// Weight attached to an edge.
///
/// Replaces the float sentinels of the storage format: the smallest
/// positive float ("no weight known") and positive infinity ("these two
/// supervoxels are the same object and may never be split").
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub enum Affinity {
    /// Placeholder for an edge whose affinity was never measured.
    #[default]
    Unweighted,
    /// An ordinary, finite affinity.
    Weight(f32),
    /// Cross-chunk link that is always traversable.
    MustMerge,
}

impl Affinity {
    /// Interpret a stored float. Only `+inf` means must-merge.
    pub fn from_f32(value: f32) -> Self {
        if value == f32::INFINITY {
            Affinity::MustMerge
        } else {
            Affinity::Weight(value)
        }
    }

    /// The float this affinity is stored as.
    pub fn as_f32(self) -> f32 {
        match self {
            Affinity::Unweighted => DEFAULT_AFFINITY,
            Affinity::Weight(w) => w,
            Affinity::MustMerge => f32::INFINITY,
        }
    }

    pub fn is_must_merge(self) -> bool {
        matches!(self, Affinity::MustMerge)
    }

    /// `Weight(+inf)` is a must-merge link spelled as a weight.
    pub fn normalized(self) -> Self {
        match self {
            Affinity::Weight(w) if w == f32::INFINITY => Affinity::MustMerge,
            other => other,
        }
    }
}

fn normalize_all(mut affinities: Vec<Affinity>) -> Vec<Affinity> {
    for aff in affinities.iter_mut() {
        *aff = aff.normalized();
    }
    affinities
}

impl From<f32> for Affinity {
    fn from(value: f32) -> Self {
        Affinity::from_f32(value)
    }
}

// ============================================================================
// EdgeType
// ============================================================================

/// Which chunk relation produced an edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EdgeType {
    /// Both endpoints live in the same chunk.
    InChunk,
    /// Endpoints in adjacent chunks of the same layer.
    BetweenChunk,
    /// Parent/child or must-merge links, carrying [`Affinity::MustMerge`].
    CrossChunk,
}

impl EdgeType {
    pub const ALL: [EdgeType; 3] = [EdgeType::InChunk, EdgeType::BetweenChunk, EdgeType::CrossChunk];

    pub fn as_str(self) -> &'static str {
        match self {
            EdgeType::InChunk => "in",
            EdgeType::BetweenChunk => "between",
            EdgeType::CrossChunk => "cross",
        }
    }
}

impl std::fmt::Display for EdgeType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Edges
// ============================================================================

/// Undirected edges stored column-wise.
#[derive(Debug, Clone, Default)]
pub struct Edges {
    node_ids1: Vec<NodeId>,
    node_ids2: Vec<NodeId>,
    affinities: Vec<Affinity>,
    areas: Vec<f32>,
    /// N×2 view, built on first use.
    pairs: OnceLock<Vec<[NodeId; 2]>>,
}

fn check_len(column: &'static str, expected: usize, got: usize) -> Result<()> {
    if expected != got {
        return Err(Error::ShapeMismatch { column, expected, got });
    }
    Ok(())
}

impl Edges {
    /// Edges with unweighted affinities and default areas.
    pub fn new(node_ids1: Vec<NodeId>, node_ids2: Vec<NodeId>) -> Result<Self> {
        check_len("node_ids2", node_ids1.len(), node_ids2.len())?;
        let n = node_ids1.len();
        Ok(Self {
            node_ids1,
            node_ids2,
            affinities: vec![Affinity::Unweighted; n],
            areas: vec![DEFAULT_AREA; n],
            pairs: OnceLock::new(),
        })
    }

    /// Build from all four columns at once.
    pub fn from_columns(
        node_ids1: Vec<NodeId>,
        node_ids2: Vec<NodeId>,
        affinities: Vec<Affinity>,
        areas: Vec<f32>,
    ) -> Result<Self> {
        let n = node_ids1.len();
        check_len("node_ids2", n, node_ids2.len())?;
        check_len("affinities", n, affinities.len())?;
        check_len("areas", n, areas.len())?;
        let affinities = normalize_all(affinities);
        Ok(Self { node_ids1, node_ids2, affinities, areas, pairs: OnceLock::new() })
    }

    /// Build from `(a, b, affinity)` triples; `+inf` becomes [`Affinity::MustMerge`].
    pub fn from_weighted(triples: &[(u64, u64, f32)]) -> Self {
        let n = triples.len();
        let mut edges = Self {
            node_ids1: Vec::with_capacity(n),
            node_ids2: Vec::with_capacity(n),
            affinities: Vec::with_capacity(n),
            areas: vec![DEFAULT_AREA; n],
            pairs: OnceLock::new(),
        };
        for &(a, b, aff) in triples {
            edges.node_ids1.push(NodeId(a));
            edges.node_ids2.push(NodeId(b));
            edges.affinities.push(Affinity::from_f32(aff));
        }
        edges
    }

    pub fn empty() -> Self {
        Self::default()
    }

    /// Replace the affinity column.
    pub fn with_affinities(mut self, affinities: Vec<Affinity>) -> Result<Self> {
        check_len("affinities", self.len(), affinities.len())?;
        self.affinities = normalize_all(affinities);
        Ok(self)
    }

    /// Replace the area column. Areas never alias affinities.
    pub fn with_areas(mut self, areas: Vec<f32>) -> Result<Self> {
        check_len("areas", self.len(), areas.len())?;
        self.areas = areas;
        Ok(self)
    }

    pub fn len(&self) -> usize {
        self.node_ids1.len()
    }

    pub fn is_empty(&self) -> bool {
        self.node_ids1.is_empty()
    }

    pub fn node_ids1(&self) -> &[NodeId] {
        &self.node_ids1
    }

    pub fn node_ids2(&self) -> &[NodeId] {
        &self.node_ids2
    }

    pub fn affinities(&self) -> &[Affinity] {
        &self.affinities
    }

    pub fn areas(&self) -> &[f32] {
        &self.areas
    }

    /// `[[a, b], ...]` view of the endpoints, computed once per set.
    pub fn pairs(&self) -> &[[NodeId; 2]] {
        self.pairs.get_or_init(|| {
            self.node_ids1
                .iter()
                .zip(&self.node_ids2)
                .map(|(&a, &b)| [a, b])
                .collect()
        })
    }

    /// Iterate `(a, b, affinity)`.
    pub fn iter(&self) -> impl Iterator<Item = (NodeId, NodeId, Affinity)> + '_ {
        self.node_ids1
            .iter()
            .zip(&self.node_ids2)
            .zip(&self.affinities)
            .map(|((&a, &b), &aff)| (a, b, aff))
    }

    /// Sorted, deduplicated endpoints.
    pub fn unique_nodes(&self) -> Vec<NodeId> {
        let mut nodes: Vec<NodeId> = self.node_ids1.iter().chain(&self.node_ids2).copied().collect();
        nodes.sort_unstable();
        nodes.dedup();
        nodes
    }

    /// Keep rows whose mask entry is true.
    pub fn select(&self, mask: &[bool]) -> Result<Self> {
        check_len("mask", self.len(), mask.len())?;
        Ok(self.retain_rows(|i| mask[i]))
    }

    /// Keep rows for which `keep(a, b, affinity)` holds.
    pub fn filter(&self, keep: impl Fn(NodeId, NodeId, Affinity) -> bool) -> Self {
        self.retain_rows(|i| keep(self.node_ids1[i], self.node_ids2[i], self.affinities[i]))
    }

    /// Edges with both endpoints inside `nodes`.
    pub fn subgraph(&self, nodes: &HashSet<NodeId>) -> Self {
        self.filter(|a, b, _| nodes.contains(&a) && nodes.contains(&b))
    }

    /// Concatenate several sets, preserving row order.
    pub fn concat<'a>(parts: impl IntoIterator<Item = &'a Edges>) -> Self {
        let mut out = Self::default();
        for part in parts {
            out.node_ids1.extend_from_slice(&part.node_ids1);
            out.node_ids2.extend_from_slice(&part.node_ids2);
            out.affinities.extend_from_slice(&part.affinities);
            out.areas.extend_from_slice(&part.areas);
        }
        out
    }

    fn retain_rows(&self, keep: impl Fn(usize) -> bool) -> Self {
        let mut out = Self::default();
        for i in (0..self.len()).filter(|&i| keep(i)) {
            out.node_ids1.push(self.node_ids1[i]);
            out.node_ids2.push(self.node_ids2[i]);
            out.affinities.push(self.affinities[i]);
            out.areas.push(self.areas[i]);
        }
        out
    }
}

impl PartialEq for Edges {
    fn eq(&self, other: &Self) -> bool {
        self.node_ids1 == other.node_ids1
            && self.node_ids2 == other.node_ids2
            && self.affinities == other.affinities
            && self.areas == other.areas
    }
}

// ============================================================================
// EdgesByType
// ============================================================================

/// One edge set per [`EdgeType`], as stored for a chunk.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EdgesByType {
    pub in_chunk: Edges,
    pub between_chunk: Edges,
    pub cross_chunk: Edges,
}

impl EdgesByType {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, edge_type: EdgeType) -> &Edges {
        match edge_type {
            EdgeType::InChunk => &self.in_chunk,
            EdgeType::BetweenChunk => &self.between_chunk,
            EdgeType::CrossChunk => &self.cross_chunk,
        }
    }

    pub fn set(&mut self, edge_type: EdgeType, edges: Edges) {
        match edge_type {
            EdgeType::InChunk => self.in_chunk = edges,
            EdgeType::BetweenChunk => self.between_chunk = edges,
            EdgeType::CrossChunk => self.cross_chunk = edges,
        }
    }

    pub fn with(mut self, edge_type: EdgeType, edges: Edges) -> Self {
        self.set(edge_type, edges);
        self
    }

    /// All three sets in `EdgeType::ALL` order.
    pub fn all(&self) -> Edges {
        Edges::concat(EdgeType::ALL.iter().map(|&t| self.get(t)))
    }

    pub fn len(&self) -> usize {
        EdgeType::ALL.iter().map(|&t| self.get(t).len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::node_ids;

    #[test]
    fn test_length_mismatch_rejected() {
        let err = Edges::new(node_ids([1, 2]), node_ids([3])).unwrap_err();
        assert!(matches!(err, Error::ShapeMismatch { column: "node_ids2", expected: 2, got: 1 }));

        let edges = Edges::new(node_ids([1, 2]), node_ids([3, 4])).unwrap();
        assert!(edges.clone().with_affinities(vec![Affinity::Weight(1.0)]).is_err());
        assert!(edges.with_areas(vec![1.0, 2.0, 3.0]).is_err());
    }

    #[test]
    fn test_defaults_are_placeholders() {
        let edges = Edges::new(node_ids([1]), node_ids([2])).unwrap();
        assert_eq!(edges.affinities(), &[Affinity::Unweighted]);
        assert_eq!(edges.affinities()[0].as_f32(), DEFAULT_AFFINITY);
        assert_eq!(edges.areas(), &[DEFAULT_AREA]);
    }

    #[test]
    fn test_areas_independent_of_affinities() {
        let edges = Edges::new(node_ids([1, 2]), node_ids([2, 3]))
            .unwrap()
            .with_affinities(vec![Affinity::Weight(0.5), Affinity::Weight(0.9)])
            .unwrap()
            .with_areas(vec![120.0, 48.0])
            .unwrap();
        assert_eq!(edges.areas(), &[120.0, 48.0]);
        assert_eq!(edges.affinities()[1], Affinity::Weight(0.9));
    }

    #[test]
    fn test_pairs_cached() {
        let edges = Edges::from_weighted(&[(1, 2, 0.5), (2, 3, 0.7)]);
        let first = edges.pairs();
        assert_eq!(first, &[[NodeId(1), NodeId(2)], [NodeId(2), NodeId(3)]]);
        assert!(std::ptr::eq(first, edges.pairs()));
    }

    #[test]
    fn test_infinity_becomes_must_merge() {
        let edges = Edges::from_weighted(&[(1, 2, f32::INFINITY), (2, 3, 3.0)]);
        assert!(edges.affinities()[0].is_must_merge());
        assert_eq!(edges.affinities()[1], Affinity::Weight(3.0));
        assert_eq!(Affinity::MustMerge.as_f32(), f32::INFINITY);
    }

    #[test]
    fn test_infinite_weight_normalized_on_construction() {
        let edges = Edges::new(node_ids([1, 2]), node_ids([2, 3]))
            .unwrap()
            .with_affinities(vec![Affinity::Weight(f32::INFINITY), Affinity::Weight(0.4)])
            .unwrap();
        assert_eq!(edges.affinities(), &[Affinity::MustMerge, Affinity::Weight(0.4)]);

        let edges = Edges::from_columns(
            node_ids([5]),
            node_ids([6]),
            vec![Affinity::Weight(f32::INFINITY)],
            vec![DEFAULT_AREA],
        )
        .unwrap();
        assert!(edges.affinities()[0].is_must_merge());
    }

    #[test]
    fn test_select_and_subgraph() {
        let edges = Edges::from_weighted(&[(1, 2, 0.1), (2, 3, 0.2), (3, 4, 0.3)]);
        let picked = edges.select(&[true, false, true]).unwrap();
        assert_eq!(picked.node_ids1(), &node_ids([1, 3])[..]);
        assert!(edges.select(&[true]).is_err());

        let inside: HashSet<NodeId> = node_ids([1, 2, 3]).into_iter().collect();
        let sub = edges.subgraph(&inside);
        assert_eq!(sub.len(), 2);
        assert_eq!(sub.unique_nodes(), node_ids([1, 2, 3]));
    }

    #[test]
    fn test_edges_by_type_all() {
        let by_type = EdgesByType::new()
            .with(EdgeType::InChunk, Edges::from_weighted(&[(1, 2, 0.5)]))
            .with(EdgeType::CrossChunk, Edges::from_weighted(&[(2, 9, f32::INFINITY)]));
        let all = by_type.all();
        assert_eq!(all.len(), 2);
        assert_eq!(by_type.len(), 2);
        assert!(all.affinities()[1].is_must_merge());
        assert_eq!(EdgeType::BetweenChunk.to_string(), "between");
    }
}
