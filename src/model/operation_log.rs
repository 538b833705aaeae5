//! Edit-history log records.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::NodeId;

/// Outcome of an edit operation as recorded in the log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "i32", try_from = "i32")]
pub enum StatusCode {
    Success = 0,
    Created = 1,
    Exception = 2,
    WriteStarted = 3,
    WriteFailed = 4,
}

impl StatusCode {
    pub fn code(self) -> i32 {
        self as i32
    }

    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            0 => Some(StatusCode::Success),
            1 => Some(StatusCode::Created),
            2 => Some(StatusCode::Exception),
            3 => Some(StatusCode::WriteStarted),
            4 => Some(StatusCode::WriteFailed),
            _ => None,
        }
    }
}

impl From<StatusCode> for i32 {
    fn from(status: StatusCode) -> Self {
        status.code()
    }
}

impl TryFrom<i32> for StatusCode {
    type Error = String;

    fn try_from(code: i32) -> std::result::Result<Self, Self::Error> {
        StatusCode::from_code(i64::from(code)).ok_or_else(|| format!("unknown status code {code}"))
    }
}

/// A log row exactly as storage returns it.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RawLogEntry {
    pub id: u64,
    pub attributes: BTreeMap<String, serde_json::Value>,
}

impl RawLogEntry {
    pub fn new(id: u64) -> Self {
        Self { id, attributes: BTreeMap::new() }
    }

    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }
}

/// One parsed edit operation.
///
/// `old_roots` / `old_roots_ts` are empty until lineage enrichment
/// fills them; they always have the same length.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperationLog {
    pub id: u64,
    pub status: StatusCode,
    /// Roots produced by the operation.
    pub roots: Vec<NodeId>,
    #[serde(default)]
    pub old_roots: Vec<NodeId>,
    #[serde(default)]
    pub old_roots_ts: Vec<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
    /// Everything else the log row carried, untouched.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub attributes: BTreeMap<String, serde_json::Value>,
}

impl OperationLog {
    pub fn new(id: u64, status: StatusCode, roots: Vec<NodeId>) -> Self {
        Self {
            id,
            status,
            roots,
            old_roots: Vec::new(),
            old_roots_ts: Vec::new(),
            user_id: None,
            timestamp: None,
            attributes: BTreeMap::new(),
        }
    }
}
