//! In-memory storage backend.
//!
//! This is the reference implementation of `StorageBackend`.
//! It uses simple HashMaps protected by RwLock.
//!
//! ## Limitations
//!
//! - **No versioning**: rows are overwritten in place; there is no
//!   read-at-timestamp.
//! - **No chunk lookup**: `edges_for()` scans every stored chunk.
//!
//! Use this backend for:
//! - Testing the split engine and lineage enrichment end to end
//! - Embedding in tools that already hold a frozen edge snapshot

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use hashbrown::HashMap;
use parking_lot::RwLock;

use super::StorageBackend;
use crate::hierarchy::ChunkTask;
use crate::model::{concatenate_chunk_edges, filter_edges, Edges, EdgesByType, NodeId, RawLogEntry};
use crate::Result;

// ============================================================================
// MemoryBackend
// ============================================================================

/// In-memory chunked graph storage.
#[derive(Clone, Default)]
pub struct MemoryBackend {
    inner: Arc<MemoryInner>,
}

#[derive(Default)]
struct MemoryInner {
    /// chunk id → edges stored for that chunk
    chunk_edges: RwLock<HashMap<String, EdgesByType>>,
    /// log id → raw row
    logs: RwLock<HashMap<u64, RawLogEntry>>,
    /// root → roots it replaced
    previous_roots: RwLock<HashMap<NodeId, Vec<NodeId>>>,
    timestamps: RwLock<HashMap<NodeId, DateTime<Utc>>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store (or replace) the edges of one chunk.
    pub fn put_chunk_edges(&self, chunk: &ChunkTask, edges: EdgesByType) {
        self.inner.chunk_edges.write().insert(chunk.id(), edges);
    }

    pub fn put_log_entry(&self, entry: RawLogEntry) {
        self.inner.logs.write().insert(entry.id, entry);
    }

    /// Record that `root` was created at `created` from `previous`.
    pub fn put_root(&self, root: NodeId, previous: Vec<NodeId>, created: DateTime<Utc>) {
        self.inner.previous_roots.write().insert(root, previous);
        self.inner.timestamps.write().insert(root, created);
    }

    pub fn put_timestamp(&self, node: NodeId, created: DateTime<Utc>) {
        self.inner.timestamps.write().insert(node, created);
    }

    pub fn chunk_count(&self) -> usize {
        self.inner.chunk_edges.read().len()
    }
}

fn log_timestamp(entry: &RawLogEntry) -> Option<DateTime<Utc>> {
    entry
        .attributes
        .get("timestamp")
        .and_then(|v| v.as_str())
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|t| t.with_timezone(&Utc))
}

// ============================================================================
// StorageBackend impl
// ============================================================================

#[async_trait]
impl StorageBackend for MemoryBackend {
    /// Nothing is held open; stored rows stay readable.
    async fn shutdown(&self) -> Result<()> { Ok(()) }

    async fn edges_for(&self, node_ids: &[NodeId]) -> Result<Edges> {
        let chunks = self.inner.chunk_edges.read();
        let mut keys: Vec<&String> = chunks.keys().collect();
        keys.sort();
        let stored: Vec<EdgesByType> = keys.into_iter().map(|k| chunks[k].clone()).collect();
        Ok(filter_edges(node_ids, &concatenate_chunk_edges(&stored)))
    }

    async fn read_log_entries(&self, start_time: Option<DateTime<Utc>>) -> Result<Vec<RawLogEntry>> {
        let logs = self.inner.logs.read();
        let mut out: Vec<RawLogEntry> = logs
            .values()
            .filter(|entry| match (start_time, log_timestamp(entry)) {
                (Some(start), Some(ts)) => ts >= start,
                (Some(_), None) => false,
                (None, _) => true,
            })
            .cloned()
            .collect();
        out.sort_by_key(|entry| entry.id);
        Ok(out)
    }

    async fn previous_root_ids(&self, roots: &[NodeId]) -> Result<HashMap<NodeId, Vec<NodeId>>> {
        let lineage = self.inner.previous_roots.read();
        Ok(roots
            .iter()
            .filter_map(|root| lineage.get(root).map(|prev| (*root, prev.clone())))
            .collect())
    }

    async fn node_timestamps(&self, node_ids: &[NodeId]) -> Result<HashMap<NodeId, DateTime<Utc>>> {
        let timestamps = self.inner.timestamps.read();
        Ok(node_ids
            .iter()
            .filter_map(|id| timestamps.get(id).map(|ts| (*id, *ts)))
            .collect())
    }
}

// ============================================================================
// Tests
// ============================================================================
