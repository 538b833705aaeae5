//! # chunkedgraph: Chunk-Partitioned Supervoxel Graph
//!
//! The connectivity core of an agglomerated segmentation: supervoxels are
//! nodes, affinities are edge weights, and the space is cut into chunks
//! that form a hierarchy of ever coarser layers.
//!
//! ## Design Principles
//!
//! 1. **Pure split engine**: stitching, min-cut and remapping are functions of
//!    a frozen edge snapshot, safe to run for many edits at once
//! 2. **Trait-first storage**: `StorageBackend` is the only way data comes in
//! 3. **No sentinels**: must-merge links and placeholder weights are enum
//!    variants, not magic floats
//!
//! ## Quick Start
//!
//! ```rust
//! use chunkedgraph::{mincut, Edges, NodeId};
//!
//! // 2 and 3 are joined across a chunk boundary and cannot be split
//! let edges = Edges::from_weighted(&[(1, 2, 10.0), (2, 3, f32::INFINITY), (3, 4, 5.0)]);
//! let cut = mincut(&edges, &[NodeId(1)], &[NodeId(4)])?;
//!
//! assert_eq!(cut.edges(), &[(NodeId(3), NodeId(4)), (NodeId(4), NodeId(3))]);
//! # Ok::<(), chunkedgraph::Error>(())
//! ```
//!
//! ## Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `model` | Edge sets, node ids, operation logs |
//! | `cutting` | Cross-chunk stitching, min-cut, cut remapping |
//! | `hierarchy` | Chunk tasks, parent/child addressing |
//! | `lineage` | Log parsing and previous-root enrichment |
//! | `storage` | Storage contract and in-memory backend |

// ============================================================================
// Modules
// ============================================================================

pub mod model;
pub mod cutting;
pub mod hierarchy;
pub mod lineage;
pub mod storage;
pub mod config;

// ============================================================================
// Re-exports: Model
// ============================================================================

pub use model::{
    Affinity, EdgeType, Edges, EdgesByType, NodeId,
    OperationLog, RawLogEntry, StatusCode,
};

// ============================================================================
// Re-exports: Cutting
// ============================================================================

pub use cutting::{mincut, stitch, remap_cut, MinCutOutcome, NoCutReason, StitchMapping};

// ============================================================================
// Re-exports: Hierarchy & config
// ============================================================================

pub use hierarchy::{ChunkCoord, ChunkTask, GraphMeta};
pub use config::GraphConfig;

// ============================================================================
// Re-exports: Storage
// ============================================================================

pub use storage::{StorageBackend, BackendConfig, MemoryBackend};

use chrono::{DateTime, Utc};
use hashbrown::HashSet;
use tracing::info;

// ============================================================================
// Top-level ChunkedGraph handle
// ============================================================================

/// The primary entry point. A `ChunkedGraph` wraps a storage backend and
/// the chunk geometry it was built with.
pub struct ChunkedGraph<B: StorageBackend> {
    backend: B,
    meta: GraphMeta,
}

impl<B: StorageBackend> ChunkedGraph<B> {
    /// Create a ChunkedGraph with the given backend.
    pub fn with_backend(backend: B, config: GraphConfig) -> Result<Self> {
        Ok(Self { backend, meta: GraphMeta::new(config)? })
    }

    pub fn meta(&self) -> &GraphMeta {
        &self.meta
    }

    /// Access the underlying backend (for advanced use).
    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn chunk_task(&self, layer: u8, coords: impl IntoIterator<Item = i64>) -> ChunkTask {
        self.meta.chunk_task(layer, coords)
    }

    /// Split one object: read the neighborhood of `supervoxels`, keep the
    /// edges internal to it, and find the edges separating `sources` from
    /// `sinks`. Nothing is written back.
    pub async fn split(
        &self,
        sources: &[NodeId],
        sinks: &[NodeId],
        supervoxels: &[NodeId],
    ) -> Result<MinCutOutcome> {
        let inside: HashSet<NodeId> = supervoxels.iter().copied().collect();
        let edges = self.backend.edges_for(supervoxels).await?.subgraph(&inside);
        let outcome = mincut(&edges, sources, sinks)?;
        info!(
            edges = edges.len(),
            sources = sources.len(),
            sinks = sinks.len(),
            removed = outcome.edges().len(),
            "split computed"
        );
        Ok(outcome)
    }

    /// Parsed edit log, optionally only operations since `start_time`.
    pub async fn parsed_logs(&self, start_time: Option<DateTime<Utc>>) -> Result<Vec<OperationLog>> {
        let raw = self.backend.read_log_entries(start_time).await?;
        Ok(lineage::parse_log_entries(raw))
    }

    /// Parsed edit log with previous roots and their timestamps attached.
    pub async fn logs_with_previous_roots(
        &self,
        start_time: Option<DateTime<Utc>>,
    ) -> Result<Vec<OperationLog>> {
        let logs = self.parsed_logs(start_time).await?;
        lineage::logs_with_previous_roots(&self.backend, logs).await
    }
}

/// In-memory chunked graph for testing and embedding.
impl ChunkedGraph<MemoryBackend> {
    pub async fn open(backend: BackendConfig, config: GraphConfig) -> Result<Self> {
        match backend {
            BackendConfig::Memory => Self::with_backend(MemoryBackend::new(), config),
        }
    }

    pub async fn open_memory(config: GraphConfig) -> Result<Self> {
        Self::open(BackendConfig::Memory, config).await
    }
}

// ============================================================================
// Error Types
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Column '{column}' has {got} rows, expected {expected}")]
    ShapeMismatch { column: &'static str, expected: usize, got: usize },

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Source {source_node} and sink {sink_node} are merged into {representative} and cannot be split")]
    ContradictoryMerge { source_node: NodeId, sink_node: NodeId, representative: NodeId },

    #[error("Node {node} mapped to both {first} and {second}")]
    MalformedMapping { node: NodeId, first: NodeId, second: NodeId },

    #[error("Invalid cut: {0}")]
    InvalidCut(String),

    #[error("Storage error: {0}")]
    StorageError(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
