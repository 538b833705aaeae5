//! Local min-cut split solver.
//!
//! Given the edge neighborhood of an object and two groups of supervoxels,
//! find the cheapest set of real edges whose removal separates the groups.

use std::time::Instant;

use hashbrown::HashMap;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::flow::{Capacity, FlowNetwork};
use super::{remap_cut, stitch};
use crate::model::{Affinity, Edges, NodeId};
use crate::{Error, Result};

/// Why a split request produced nothing to remove.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NoCutReason {
    /// Every edge was a must-merge edge; nothing is left to cut.
    EmptyGraph,
    /// Sources and sinks are not connected in the local graph.
    AlreadySeparated,
}

/// Result of a split request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum MinCutOutcome {
    /// Edges to remove, in original id space, listed in both directions.
    /// May be empty when every cut edge was synthetic.
    Cut(Vec<(NodeId, NodeId)>),
    NoCut(NoCutReason),
}

impl MinCutOutcome {
    /// The removable edges; empty for [`MinCutOutcome::NoCut`].
    pub fn edges(&self) -> &[(NodeId, NodeId)] {
        match self {
            MinCutOutcome::Cut(edges) => edges,
            MinCutOutcome::NoCut(_) => &[],
        }
    }

    pub fn is_cut(&self) -> bool {
        matches!(self, MinCutOutcome::Cut(_))
    }
}

fn elapsed_ms(since: Instant) -> f64 {
    since.elapsed().as_secs_f64() * 1000.0
}

/// Unweighted edges keep their legacy tiny weight so they still count.
fn capacity_of(affinity: Affinity) -> f64 {
    f64::from(affinity.as_f32())
}

/// Map ids through `f`, sort and deduplicate.
fn remap_group(ids: &[NodeId], f: impl Fn(NodeId) -> NodeId) -> Vec<NodeId> {
    let mut out: Vec<NodeId> = ids.iter().map(|&id| f(id)).collect();
    out.sort_unstable();
    out.dedup();
    out
}

/// Union-find with path halving; component labels are slot roots.
struct Components {
    parent: Vec<usize>,
}

impl Components {
    fn new(n: usize) -> Self {
        Self { parent: (0..n).collect() }
    }

    fn find(&mut self, mut x: usize) -> usize {
        while self.parent[x] != x {
            self.parent[x] = self.parent[self.parent[x]];
            x = self.parent[x];
        }
        x
    }

    fn union(&mut self, a: usize, b: usize) {
        let (ra, rb) = (self.find(a), self.find(b));
        if ra != rb {
            self.parent[ra.max(rb)] = ra.min(rb);
        }
    }

    fn count(&mut self) -> usize {
        (0..self.parent.len()).filter(|&i| self.find(i) == i).count()
    }
}

/// The stitched graph on dense slots, ids in ascending order.
struct LocalGraph {
    ids: Vec<NodeId>,
    /// Real edges `u < v`, parallel capacities summed.
    edges: Vec<(usize, usize, Capacity)>,
    /// Synthetic ties within the source group and within the sink group.
    ties: Vec<(usize, usize)>,
    sources: Vec<usize>,
    sinks: Vec<usize>,
}

impl LocalGraph {
    fn build(stitched: &Edges, sources: &[NodeId], sinks: &[NodeId]) -> Self {
        let mut ids = stitched.unique_nodes();
        ids.extend_from_slice(sources);
        ids.extend_from_slice(sinks);
        ids.sort_unstable();
        ids.dedup();
        let slot: HashMap<NodeId, usize> = ids.iter().enumerate().map(|(i, &id)| (id, i)).collect();

        let mut summed: HashMap<(usize, usize), f64> = HashMap::new();
        for (a, b, aff) in stitched.iter() {
            let (u, v) = (slot[&a], slot[&b]);
            if u == v {
                continue;
            }
            *summed.entry((u.min(v), u.max(v))).or_insert(0.0) += capacity_of(aff);
        }
        let mut edges: Vec<(usize, usize, Capacity)> =
            summed.into_iter().map(|((u, v), c)| (u, v, Capacity::Finite(c))).collect();
        edges.sort_unstable_by_key(|&(u, v, _)| (u, v));

        let sources: Vec<usize> = sources.iter().map(|id| slot[id]).collect();
        let sinks: Vec<usize> = sinks.iter().map(|id| slot[id]).collect();
        let mut ties = Vec::new();
        for group in [&sources, &sinks] {
            for (i, &u) in group.iter().enumerate() {
                for &v in &group[i + 1..] {
                    ties.push((u, v));
                }
            }
        }

        Self { ids, edges, ties, sources, sinks }
    }

    /// Components of the graph with `removed` real edges left out.
    fn components(&self, removed: &[bool]) -> Components {
        let mut cc = Components::new(self.ids.len());
        for (i, &(u, v, _)) in self.edges.iter().enumerate() {
            if !removed[i] {
                cc.union(u, v);
            }
        }
        for &(u, v) in &self.ties {
            cc.union(u, v);
        }
        cc
    }
}

/// Check that after the cut every source shares a component with all
/// other sources and with no sink, and the same for sinks.
fn verify_partition(graph: &LocalGraph, cut: &[bool]) -> Result<()> {
    let mut cc = graph.components(cut);
    let source_label = cc.find(graph.sources[0]);
    let sink_label = cc.find(graph.sinks[0]);

    if source_label == sink_label {
        return Err(Error::InvalidCut("sources and sinks still connected after cut".into()));
    }
    for &s in &graph.sources {
        if cc.find(s) != source_label {
            return Err(Error::InvalidCut(format!("source {} split from its group", graph.ids[s])));
        }
    }
    for &t in &graph.sinks {
        if cc.find(t) != sink_label {
            return Err(Error::InvalidCut(format!("sink {} split from its group", graph.ids[t])));
        }
    }
    debug!(components = cc.count(), "partition verified");
    Ok(())
}

/// Compute the edges to remove so that `sources` and `sinks` end up in
/// different objects.
///
/// `edges` is the local neighborhood in original supervoxel ids, including
/// must-merge links. The returned edges are always a subset of `edges`.
pub fn mincut(edges: &Edges, sources: &[NodeId], sinks: &[NodeId]) -> Result<MinCutOutcome> {
    if sources.is_empty() || sinks.is_empty() {
        return Err(Error::InvalidRequest("sources and sinks must both be non-empty".into()));
    }
    let mut started = Instant::now();

    let stitched = stitch(edges)?;
    let mapping = &stitched.mapping;

    for &source in sources {
        for &sink in sinks {
            let representative = mapping.representative(source);
            if representative == mapping.representative(sink) {
                return Err(Error::ContradictoryMerge {
                    source_node: source,
                    sink_node: sink,
                    representative,
                });
            }
        }
    }

    if stitched.edges.is_empty() {
        return Ok(MinCutOutcome::NoCut(NoCutReason::EmptyGraph));
    }

    let stitched_sources = remap_group(sources, |id| mapping.representative(id));
    let stitched_sinks = remap_group(sinks, |id| mapping.representative(id));
    let local = LocalGraph::build(&stitched.edges, &stitched_sources, &stitched_sinks);
    debug!(
        nodes = local.ids.len(),
        edges = local.edges.len(),
        "Graph creation: {:.2}ms",
        elapsed_ms(started)
    );
    started = Instant::now();

    // Components without both a source and a sink cannot affect the cut;
    // the ties put every source in one component and every sink in one.
    let no_cut = vec![false; local.edges.len()];
    let mut cc = local.components(&no_cut);
    let source_label = cc.find(local.sources[0]);
    if cc.find(local.sinks[0]) != source_label {
        debug!("sources and sinks already separated");
        return Ok(MinCutOutcome::NoCut(NoCutReason::AlreadySeparated));
    }
    let kept: Vec<bool> = (0..local.ids.len()).map(|i| cc.find(i) == source_label).collect();
    debug!(
        trimmed = kept.iter().filter(|&&k| !k).count(),
        "dropped nodes outside the source/sink component"
    );

    let mut network = FlowNetwork::new(local.ids.len());
    for &(u, v, capacity) in &local.edges {
        if kept[u] {
            network.add_edge(u, v, capacity);
        }
    }
    for &(u, v) in &local.ties {
        network.add_edge(u, v, Capacity::Unbounded);
    }

    let (source, sink) = (local.sources[0], local.sinks[0]);
    let flow = network.max_flow(source, sink);
    if !flow.is_finite() {
        return Err(Error::InvalidCut("unbounded flow between sources and sinks".into()));
    }
    let source_side = network.source_side(source);

    let mut in_cut = vec![false; local.edges.len()];
    let mut stitched_cut = Vec::new();
    for (i, &(u, v, _)) in local.edges.iter().enumerate() {
        if kept[u] && source_side[u] != source_side[v] {
            in_cut[i] = true;
            let (s, t) = if source_side[u] { (u, v) } else { (v, u) };
            stitched_cut.push((local.ids[s], local.ids[t]));
        }
    }
    debug!(flow, cut = stitched_cut.len(), "Mincut comp: {:.2}ms", elapsed_ms(started));
    started = Instant::now();

    verify_partition(&local, &in_cut)?;
    debug!("Verifying local graph: {:.2}ms", elapsed_ms(started));

    Ok(MinCutOutcome::Cut(remap_cut(&stitched_cut, mapping, edges)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{node_ids, DEFAULT_AREA};

    fn pairs(raw: &[(u64, u64)]) -> Vec<(NodeId, NodeId)> {
        raw.iter().map(|&(a, b)| (NodeId(a), NodeId(b))).collect()
    }

    #[test]
    fn test_stitched_chain_cuts_weaker_edge() {
        let edges = Edges::from_weighted(&[(1, 2, 10.0), (2, 3, f32::INFINITY), (3, 4, 5.0)]);
        let out = mincut(&edges, &node_ids([1]), &node_ids([4])).unwrap();
        assert_eq!(out, MinCutOutcome::Cut(pairs(&[(3, 4), (4, 3)])));
    }

    #[test]
    fn test_source_and_sink_merged_is_contradictory() {
        let edges = Edges::from_weighted(&[(1, 2, f32::INFINITY)]);
        let err = mincut(&edges, &node_ids([1]), &node_ids([2])).unwrap_err();
        assert!(matches!(
            err,
            Error::ContradictoryMerge {
                source_node: NodeId(1),
                sink_node: NodeId(2),
                representative: NodeId(1),
            }
        ));
    }

    #[test]
    fn test_only_must_merge_edges_is_empty_graph() {
        let edges = Edges::from_weighted(&[(1, 2, f32::INFINITY), (3, 4, f32::INFINITY)]);
        let out = mincut(&edges, &node_ids([1]), &node_ids([3])).unwrap();
        assert_eq!(out, MinCutOutcome::NoCut(NoCutReason::EmptyGraph));
        assert!(out.edges().is_empty());
    }

    #[test]
    fn test_disconnected_groups_already_separated() {
        let edges = Edges::from_weighted(&[(1, 2, 0.9), (3, 4, 0.9)]);
        let out = mincut(&edges, &node_ids([1]), &node_ids([4])).unwrap();
        assert_eq!(out, MinCutOutcome::NoCut(NoCutReason::AlreadySeparated));
    }

    #[test]
    fn test_unknown_source_is_isolated() {
        let edges = Edges::from_weighted(&[(1, 2, 0.9)]);
        let out = mincut(&edges, &node_ids([77]), &node_ids([2])).unwrap();
        assert_eq!(out, MinCutOutcome::NoCut(NoCutReason::AlreadySeparated));
    }

    #[test]
    fn test_multiple_sources_and_sinks() {
        // 1,2 on the left, 5,6 on the right, weak bridge 3-4
        let edges = Edges::from_weighted(&[
            (1, 3, 0.9),
            (2, 3, 0.8),
            (3, 4, 0.1),
            (4, 5, 0.9),
            (4, 6, 0.7),
        ]);
        let out = mincut(&edges, &node_ids([1, 2]), &node_ids([5, 6])).unwrap();
        assert_eq!(out.edges(), &pairs(&[(3, 4), (4, 3)])[..]);
    }

    #[test]
    fn test_sources_not_split_apart() {
        // Cheapest cut for 1 vs 3 alone would be 1-2, but 2 is also a source.
        let edges = Edges::from_weighted(&[(1, 2, 0.1), (2, 3, 0.5)]);
        let out = mincut(&edges, &node_ids([1, 2]), &node_ids([3])).unwrap();
        assert_eq!(out.edges(), &pairs(&[(2, 3), (3, 2)])[..]);
    }

    #[test]
    fn test_parallel_stitched_edges_are_summed() {
        // 2 and 3 merge, so their edges to 1 weigh 0.6 together and 3-5 is cheaper.
        let edges = Edges::from_weighted(&[
            (1, 2, 0.3),
            (1, 3, 0.3),
            (2, 3, f32::INFINITY),
            (3, 5, 0.5),
        ]);
        let out = mincut(&edges, &node_ids([1]), &node_ids([5])).unwrap();
        assert_eq!(out.edges(), &pairs(&[(3, 5), (5, 3)])[..]);
    }

    #[test]
    fn test_group_cut_reports_every_member_edge() {
        let edges = Edges::from_weighted(&[
            (1, 2, 0.1),
            (1, 3, 0.1),
            (2, 3, f32::INFINITY),
            (2, 4, 0.9),
        ]);
        let out = mincut(&edges, &node_ids([1]), &node_ids([4])).unwrap();
        assert_eq!(out.edges(), &pairs(&[(1, 2), (1, 3), (2, 1), (3, 1)])[..]);
    }

    #[test]
    fn test_empty_groups_rejected() {
        let edges = Edges::from_weighted(&[(1, 2, 0.5)]);
        assert!(matches!(mincut(&edges, &[], &node_ids([2])), Err(Error::InvalidRequest(_))));
        assert!(matches!(mincut(&edges, &node_ids([1]), &[]), Err(Error::InvalidRequest(_))));
    }

    #[test]
    fn test_unweighted_edges_cut_fewest() {
        // two unweighted edges into 4 versus one out of 1
        let edges = Edges::new(node_ids([1, 2, 2, 3]), node_ids([2, 4, 3, 4])).unwrap();
        let out = mincut(&edges, &node_ids([1]), &node_ids([4])).unwrap();
        assert_eq!(out.edges(), &pairs(&[(1, 2), (2, 1)])[..]);
    }

    #[test]
    fn test_large_weight_elsewhere_keeps_small_edges() {
        let edges = Edges::from_weighted(&[(1, 4, 0.9), (1, 2, 0.5), (2, 4, 0.1), (4, 5, 1e13)]);
        let out = mincut(&edges, &node_ids([1]), &node_ids([4])).unwrap();
        assert_eq!(out.edges(), &pairs(&[(1, 4), (4, 1), (2, 4), (4, 2)])[..]);
    }

    #[test]
    fn test_unweighted_next_to_weighted() {
        let edges = Edges::from_columns(
            node_ids([1, 2]),
            node_ids([2, 3]),
            vec![Affinity::Weight(1.0), Affinity::Unweighted],
            vec![DEFAULT_AREA; 2],
        )
        .unwrap();
        let out = mincut(&edges, &node_ids([1]), &node_ids([3])).unwrap();
        assert_eq!(out.edges(), &pairs(&[(2, 3), (3, 2)])[..]);
    }

    #[test]
    fn test_infinite_weight_is_a_merge_not_a_fatal_cut() {
        let edges = Edges::new(node_ids([1]), node_ids([2]))
            .unwrap()
            .with_affinities(vec![Affinity::Weight(f32::INFINITY)])
            .unwrap();
        let err = mincut(&edges, &node_ids([1]), &node_ids([2])).unwrap_err();
        assert!(matches!(err, Error::ContradictoryMerge { .. }));
    }

    #[test]
    fn test_long_chain() {
        let n = 100_000u64;
        let triples: Vec<(u64, u64, f32)> = (0..n)
            .map(|i| (i, i + 1, if i == 60_000 { 0.25 } else { 1.0 }))
            .collect();
        let edges = Edges::from_weighted(&triples);

        let out = mincut(&edges, &node_ids([0]), &node_ids([n])).unwrap();
        assert_eq!(out.edges(), &pairs(&[(60_000, 60_001), (60_001, 60_000)])[..]);
    }

    #[test]
    fn test_deterministic() {
        let edges = Edges::from_weighted(&[(1, 2, 0.5), (2, 3, 0.5), (1, 4, 0.5), (4, 3, 0.5)]);
        let first = mincut(&edges, &node_ids([1]), &node_ids([3])).unwrap();
        for _ in 0..10 {
            assert_eq!(mincut(&edges, &node_ids([1]), &node_ids([3])).unwrap(), first);
        }
    }
}
