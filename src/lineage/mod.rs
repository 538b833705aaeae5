//! Edit-log parsing and lineage enrichment.
//!
//! Every logged operation names the roots it produced. Enrichment looks up
//! the roots those replaced, plus when each of the replaced roots was
//! created, so audits can walk the history backwards. Lookups are
//! batched across the whole log; a gap only fails the entry it touches.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use hashbrown::{HashMap, HashSet};
use tracing::{debug, warn};

use crate::model::{NodeId, OperationLog, RawLogEntry, StatusCode};
use crate::storage::StorageBackend;
use crate::Result;

const STATUS_KEY: &str = "operation_status";
const ROOTS_KEY: &str = "roots";
const USER_KEY: &str = "user_id";
const TIMESTAMP_KEY: &str = "timestamp";

fn parse_roots(value: &serde_json::Value) -> Option<Vec<NodeId>> {
    match value {
        serde_json::Value::Array(items) => items.iter().map(|v| v.as_u64().map(NodeId)).collect(),
        serde_json::Value::Number(n) => n.as_u64().map(|id| vec![NodeId(id)]),
        _ => None,
    }
}

/// Turn raw log rows into [`OperationLog`]s.
///
/// Known attributes become fields; everything else is carried in
/// `attributes` as-is. Unknown status codes and malformed roots are
/// recorded as [`StatusCode::Exception`] rather than dropping the row.
pub fn parse_log_entries(raw: Vec<RawLogEntry>) -> Vec<OperationLog> {
    raw.into_iter().map(parse_log_entry).collect()
}

fn parse_log_entry(entry: RawLogEntry) -> OperationLog {
    let mut attributes: BTreeMap<String, serde_json::Value> = entry.attributes;

    let mut status = match attributes.remove(STATUS_KEY) {
        None => StatusCode::Success,
        Some(value) => match value.as_i64().and_then(StatusCode::from_code) {
            Some(status) => status,
            None => {
                warn!(id = entry.id, %value, "unknown operation status");
                StatusCode::Exception
            }
        },
    };

    let roots = match attributes.remove(ROOTS_KEY) {
        None => Vec::new(),
        Some(value) => parse_roots(&value).unwrap_or_else(|| {
            warn!(id = entry.id, %value, "malformed roots");
            status = StatusCode::Exception;
            Vec::new()
        }),
    };

    let user_id = attributes.remove(USER_KEY).map(|v| match v {
        serde_json::Value::String(s) => s,
        other => other.to_string(),
    });
    let timestamp = attributes
        .remove(TIMESTAMP_KEY)
        .and_then(|v| v.as_str().and_then(|s| DateTime::parse_from_rfc3339(s).ok()))
        .map(|t| t.with_timezone(&Utc));

    let mut log = OperationLog::new(entry.id, status, roots);
    log.user_id = user_id;
    log.timestamp = timestamp;
    log.attributes = attributes;
    log
}

/// Sorted, deduplicated previous roots of `log` with their timestamps,
/// or `None` if any lookup has a gap.
fn resolve(
    log: &OperationLog,
    previous: &HashMap<NodeId, Vec<NodeId>>,
    timestamps: &HashMap<NodeId, DateTime<Utc>>,
) -> Option<(Vec<NodeId>, Vec<DateTime<Utc>>)> {
    if log.roots.is_empty() {
        return None;
    }
    let mut old_roots = Vec::new();
    for root in &log.roots {
        old_roots.extend_from_slice(previous.get(root)?);
    }
    old_roots.sort_unstable();
    old_roots.dedup();

    let old_roots_ts = old_roots
        .iter()
        .map(|id| timestamps.get(id).copied())
        .collect::<Option<Vec<_>>>()?;
    Some((old_roots, old_roots_ts))
}

/// Attach previous roots and their timestamps to every log.
///
/// An entry whose roots cannot all be resolved is marked
/// [`StatusCode::WriteFailed`] and keeps empty `old_roots`; the rest of
/// the batch is unaffected.
pub fn attach_previous_roots(
    mut logs: Vec<OperationLog>,
    previous: &HashMap<NodeId, Vec<NodeId>>,
    timestamps: &HashMap<NodeId, DateTime<Utc>>,
) -> Vec<OperationLog> {
    for log in &mut logs {
        match resolve(log, previous, timestamps) {
            Some((old_roots, old_roots_ts)) => {
                log.old_roots = old_roots;
                log.old_roots_ts = old_roots_ts;
            }
            None => {
                warn!(id = log.id, roots = ?log.roots, "lineage gap, marking write failed");
                log.status = StatusCode::WriteFailed;
                log.old_roots.clear();
                log.old_roots_ts.clear();
            }
        }
    }
    logs
}

/// Enrich `logs` using one batched predecessor lookup and one batched
/// timestamp lookup against `backend`.
pub async fn logs_with_previous_roots<B: StorageBackend>(
    backend: &B,
    logs: Vec<OperationLog>,
) -> Result<Vec<OperationLog>> {
    let mut roots: Vec<NodeId> = logs.iter().flat_map(|log| log.roots.iter().copied()).collect();
    roots.sort_unstable();
    roots.dedup();

    let previous = backend.previous_root_ids(&roots).await?;

    let mut old_roots: Vec<NodeId> = previous
        .values()
        .flatten()
        .copied()
        .collect::<HashSet<_>>()
        .into_iter()
        .collect();
    old_roots.sort_unstable();
    let timestamps = backend.node_timestamps(&old_roots).await?;

    debug!(
        logs = logs.len(),
        roots = roots.len(),
        old_roots = old_roots.len(),
        "resolved lineage"
    );
    Ok(attach_previous_roots(logs, &previous, &timestamps))
}
