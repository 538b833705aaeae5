//! # Chunk Hierarchy Addressing
//!
//! Layer 2 is the lowest chunked layer; every layer above merges
//! `fanout` chunks per axis into one parent chunk.
//!
//! ```text
//! layer 4:          [0,0]
//!                  /     \
//! layer 3:     [0,0]     [1,0]
//!              /  \       /  \
//! layer 2: [0,0][1,0] [2,0][3,0]      (fanout 2, one axis shown)
//! ```
//!
//! When an edit is accepted every ancestor chunk of the touched layer-2
//! chunks must be recomputed; [`GraphMeta::ancestor_tasks`] lists them.

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use crate::config::GraphConfig;
use crate::{Error, Result};

/// Chunk coordinates, one entry per axis.
pub type ChunkCoord = SmallVec<[i64; 3]>;

/// Lowest layer that is partitioned into chunks.
pub const MIN_CHUNK_LAYER: u8 = 2;

// ============================================================================
// ChunkTask
// ============================================================================

/// One subgraph-processing unit: a chunk at a given layer.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChunkTask {
    pub layer: u8,
    pub coords: ChunkCoord,
}

impl ChunkTask {
    pub fn new(layer: u8, coords: impl IntoIterator<Item = i64>) -> Self {
        Self { layer, coords: coords.into_iter().collect() }
    }

    /// `"{layer}_{x}_{y}_{z}"`. A cache and log key, never parsed back.
    pub fn task_id(layer: u8, coords: &[i64]) -> String {
        let mut id = layer.to_string();
        for c in coords {
            id.push('_');
            id.push_str(&c.to_string());
        }
        id
    }

    pub fn id(&self) -> String {
        Self::task_id(self.layer, &self.coords)
    }

    /// The chunk one layer up that contains this one; `None` at the
    /// highest representable layer.
    pub fn parent(&self, fanout: u32) -> Option<ChunkTask> {
        Some(ChunkTask {
            layer: self.layer.checked_add(1)?,
            coords: parent_coords(&self.coords, fanout),
        })
    }
}

impl std::fmt::Display for ChunkTask {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.id())
    }
}

/// Per-axis floor division by `fanout`.
pub fn parent_coords(coords: &[i64], fanout: u32) -> ChunkCoord {
    let fanout = i64::from(fanout.max(1));
    coords.iter().map(|c| c.div_euclid(fanout)).collect()
}

/// Every coordinate one layer down whose parent is `coords`:
/// `fanout^dims` of them, last axis varying fastest.
pub fn children_coords(coords: &[i64], fanout: u32) -> Vec<ChunkCoord> {
    let fanout = i64::from(fanout.max(1));
    let base: ChunkCoord = coords.iter().map(|c| c * fanout).collect();
    let total = (fanout as usize).pow(coords.len() as u32);

    let mut out = Vec::with_capacity(total);
    let mut offset: ChunkCoord = SmallVec::from_elem(0, coords.len());
    for _ in 0..total {
        out.push(base.iter().zip(&offset).map(|(b, o)| b + o).collect());
        // odometer increment
        for axis in (0..offset.len()).rev() {
            offset[axis] += 1;
            if offset[axis] < fanout {
                break;
            }
            offset[axis] = 0;
        }
    }
    out
}

// ============================================================================
// GraphMeta
// ============================================================================

/// Validated geometry plus everything derived from it.
#[derive(Debug, Clone, PartialEq)]
pub struct GraphMeta {
    config: GraphConfig,
}

impl GraphMeta {
    pub fn new(config: GraphConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &GraphConfig {
        &self.config
    }

    pub fn fanout(&self) -> u32 {
        self.config.fanout
    }

    /// Number of chunks per axis at `layer`, if the dataset is bounded.
    pub fn layer_chunk_bounds(&self, layer: u8) -> Option<ChunkCoord> {
        if layer < MIN_CHUNK_LAYER {
            return None;
        }
        let bounds = self.config.bounds.as_ref()?;
        let fanout = u64::from(self.config.fanout);
        let mut chunks: ChunkCoord = bounds
            .iter()
            .zip(&self.config.chunk_size)
            .map(|(b, size)| b.div_ceil(*size) as i64)
            .collect();
        for _ in MIN_CHUNK_LAYER..layer {
            for c in chunks.iter_mut() {
                *c = (*c as u64).div_ceil(fanout) as i64;
            }
        }
        Some(chunks)
    }

    /// Total layers including the supervoxel layer: the explicit override,
    /// else the smallest count whose top layer is a single chunk.
    pub fn layer_count(&self) -> Option<u8> {
        if let Some(layers) = self.config.layer_count {
            return Some(layers);
        }
        let widest = self.layer_chunk_bounds(MIN_CHUNK_LAYER)?.into_iter().max().unwrap_or(1).max(1);
        if self.config.fanout == 1 {
            return None;
        }
        let fanout = i64::from(self.config.fanout);
        let mut steps = 0u8;
        let mut span = 1i64;
        while span < widest {
            span = span.saturating_mul(fanout);
            steps += 1;
        }
        Some((steps + MIN_CHUNK_LAYER).max(3))
    }

    pub fn chunk_task(&self, layer: u8, coords: impl IntoIterator<Item = i64>) -> ChunkTask {
        ChunkTask::new(layer, coords)
    }

    /// Parent chunk, or `None` when `task` is already the root layer.
    pub fn parent_task(&self, task: &ChunkTask) -> Option<ChunkTask> {
        match self.layer_count() {
            Some(top) if task.layer >= top => None,
            _ => task.parent(self.config.fanout),
        }
    }

    /// Child coordinates of a chunk at `layer`, clipped to the dataset
    /// bounds of the layer below. Empty at or under the lowest chunk layer.
    pub fn children_coords(&self, layer: u8, coords: &[i64]) -> Vec<ChunkCoord> {
        if layer <= MIN_CHUNK_LAYER {
            return Vec::new();
        }
        let mut children = children_coords(coords, self.config.fanout);
        if let Some(limit) = self.layer_chunk_bounds(layer - 1) {
            children.retain(|c| c.iter().zip(&limit).all(|(&x, &max)| (0..max).contains(&x)));
        }
        children
    }

    pub fn child_tasks(&self, task: &ChunkTask) -> Vec<ChunkTask> {
        self.children_coords(task.layer, &task.coords)
            .into_iter()
            .map(|coords| ChunkTask { layer: task.layer - 1, coords })
            .collect()
    }

    /// Every chunk above `task` up to and including the root layer.
    pub fn ancestor_tasks(&self, task: &ChunkTask) -> Result<Vec<ChunkTask>> {
        let top = self
            .layer_count()
            .ok_or_else(|| Error::Config("layer count unknown: set bounds or layer_count".into()))?;

        let mut out = Vec::new();
        let mut current = task.clone();
        while current.layer < top {
            let Some(parent) = current.parent(self.config.fanout) else {
                break;
            };
            out.push(parent.clone());
            current = parent;
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use smallvec::smallvec;

    fn cc(v: &[i64]) -> ChunkCoord {
        ChunkCoord::from_slice(v)
    }

    fn meta(bounds: Option<Vec<u64>>) -> GraphMeta {
        GraphMeta::new(GraphConfig {
            fanout: 2,
            chunk_size: vec![64, 64, 64],
            bounds,
            layer_count: None,
        })
        .unwrap()
    }

    #[test]
    fn test_task_id() {
        assert_eq!(ChunkTask::task_id(2, &[1, 0, 3]), "2_1_0_3");
        assert_eq!(ChunkTask::new(5, [7, 8, 9]).to_string(), "5_7_8_9");
    }

    #[test]
    fn test_parent_floor_divides() {
        let task = ChunkTask::new(2, [5, 4, 1]);
        let parent = task.parent(2).unwrap();
        assert_eq!(parent.layer, 3);
        assert_eq!(parent.coords, cc(&[2, 2, 0]));
        assert_eq!(parent_coords(&[-1, 3], 2), cc(&[-1, 1]));
    }

    #[test]
    fn test_parent_of_top_representable_layer() {
        let task = ChunkTask::new(u8::MAX, [0, 0, 0]);
        assert_eq!(task.parent(2), None);

        let m = GraphMeta::new(GraphConfig::default()).unwrap();
        assert_eq!(m.parent_task(&task), None);

        let m = GraphMeta::new(GraphConfig { layer_count: Some(u8::MAX), ..GraphConfig::default() }).unwrap();
        let ancestors = m.ancestor_tasks(&ChunkTask::new(u8::MAX - 1, [4, 0, 0])).unwrap();
        assert_eq!(ancestors, vec![ChunkTask::new(u8::MAX, [2, 0, 0])]);
        assert!(m.ancestor_tasks(&task).unwrap().is_empty());
    }

    #[test]
    fn test_children_count_and_order() {
        let children = children_coords(&[1, 0, 2], 2);
        assert_eq!(children.len(), 8);
        assert_eq!(children[0], cc(&[2, 0, 4]));
        assert_eq!(children[1], cc(&[2, 0, 5]));
        assert_eq!(children[7], cc(&[3, 1, 5]));
        assert!(children.iter().all(|c| parent_coords(c, 2).as_slice() == [1, 0, 2]));
    }

    #[test]
    fn test_children_below_min_layer_empty() {
        let m = meta(None);
        assert!(m.children_coords(2, &[0, 0, 0]).is_empty());
        assert!(m.children_coords(1, &[0, 0, 0]).is_empty());
        assert_eq!(m.children_coords(3, &[0, 0, 0]).len(), 8);
    }

    #[test]
    fn test_layer_bounds_and_count() {
        // 320 voxels / 64 = 5 chunks on x, 1 on y and z
        let m = meta(Some(vec![320, 64, 64]));
        assert_eq!(m.layer_chunk_bounds(2), Some(smallvec![5, 1, 1]));
        assert_eq!(m.layer_chunk_bounds(3), Some(smallvec![3, 1, 1]));
        assert_eq!(m.layer_chunk_bounds(5), Some(smallvec![1, 1, 1]));
        assert_eq!(m.layer_count(), Some(5));
    }

    #[test]
    fn test_children_clipped_to_bounds() {
        let m = meta(Some(vec![320, 64, 64]));
        // layer 3 chunk x=2 covers layer 2 x in {4, 5}; only x=4 exists
        let children = m.children_coords(3, &[2, 0, 0]);
        assert_eq!(children, vec![cc(&[4, 0, 0])]);
    }

    #[test]
    fn test_ancestors_reach_root() {
        let m = meta(Some(vec![320, 64, 64]));
        let ancestors = m.ancestor_tasks(&ChunkTask::new(2, [4, 0, 0])).unwrap();
        let ids: Vec<String> = ancestors.iter().map(ChunkTask::id).collect();
        assert_eq!(ids, vec!["3_2_0_0", "4_1_0_0", "5_0_0_0"]);
        assert_eq!(m.parent_task(&ancestors[2]), None);
    }

    #[test]
    fn test_ancestors_need_layer_count() {
        assert!(matches!(meta(None).ancestor_tasks(&ChunkTask::new(2, [0, 0, 0])), Err(Error::Config(_))));
    }

    #[test]
    fn test_explicit_layer_count_wins() {
        let m = GraphMeta::new(GraphConfig { layer_count: Some(7), ..GraphConfig::default() }).unwrap();
        assert_eq!(m.layer_count(), Some(7));
    }
}
