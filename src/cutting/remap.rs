//! Translating a stitched cut back to real edges.

use hashbrown::HashSet;

use super::StitchMapping;
use crate::model::{Edges, NodeId};

/// Expand a cut found between representatives into the original edges
/// it stands for.
///
/// Each cut edge `(s, t)` becomes every pair from the groups behind `s`
/// and `t`, in both directions. Only pairs that were edges of `original`
/// (in either orientation) survive, so synthetic ties and merged-away
/// pairs never reach the caller. An empty result is valid.
pub fn remap_cut(cut: &[(NodeId, NodeId)], mapping: &StitchMapping, original: &Edges) -> Vec<(NodeId, NodeId)> {
    let mut known: HashSet<(NodeId, NodeId)> = HashSet::with_capacity(original.len() * 2);
    for &[a, b] in original.pairs() {
        known.insert((a, b));
        known.insert((b, a));
    }

    let mut seen = HashSet::new();
    let mut out = Vec::new();
    let mut emit = |pair: (NodeId, NodeId)| {
        if known.contains(&pair) && seen.insert(pair) {
            out.push(pair);
        }
    };

    for (s, t) in cut {
        let (pre_s, pre_t) = (mapping.preimage(s), mapping.preimage(t));
        for &a in pre_s {
            for &b in pre_t {
                emit((a, b));
            }
        }
        for &b in pre_t {
            for &a in pre_s {
                emit((b, a));
            }
        }
    }
    out
}
