//! # Storage Backend Trait
//!
//! This is the contract between the split/lineage core and whatever holds
//! the row-versioned graph state. The core only ever reads through it:
//! committing a cut back to storage belongs to the caller.
//!
//! ## Implementations
//!
//! | Backend | Module | Description |
//! |---------|--------|-------------|
//! | `MemoryBackend` | `memory` | In-memory for testing/embedding |

pub mod memory;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use hashbrown::HashMap;

use crate::model::{Edges, NodeId, RawLogEntry};
use crate::Result;

pub use memory::MemoryBackend;

// ============================================================================
// Backend Configuration
// ============================================================================

/// Configuration for connecting to a storage backend.
#[derive(Debug, Clone, Default)]
pub enum BackendConfig {
    /// In-memory (no persistence)
    #[default]
    Memory,
}

// ============================================================================
// StorageBackend Trait
// ============================================================================

/// The storage contract.
///
/// Lookups that cover many ids are batched: callers hand over every id
/// at once and get back whatever was found. Missing keys are not errors;
/// deciding what a gap means is the caller's job.
#[async_trait]
pub trait StorageBackend: Send + Sync + 'static {
    /// Release whatever the backend holds open, such as connections or
    /// file handles. Reads after shutdown are backend-defined.
    async fn shutdown(&self) -> Result<()>;

    /// All in-chunk, between-chunk and cross-chunk edges whose first
    /// endpoint is one of `node_ids`.
    async fn edges_for(&self, node_ids: &[NodeId]) -> Result<Edges>;

    /// Edit-log rows, optionally only those at or after `start_time`.
    async fn read_log_entries(&self, start_time: Option<DateTime<Utc>>) -> Result<Vec<RawLogEntry>>;

    /// Immediate predecessors of each root.
    async fn previous_root_ids(&self, roots: &[NodeId]) -> Result<HashMap<NodeId, Vec<NodeId>>>;

    /// Creation time of each node.
    async fn node_timestamps(&self, node_ids: &[NodeId]) -> Result<HashMap<NodeId, DateTime<Utc>>>;
}
