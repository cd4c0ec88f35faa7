//! Write-through bookkeeping
//!
//! Mutations are applied to memory first and persisted afterwards. A failed
//! write is not rolled back; it is recorded here so callers can see which
//! local state has diverged from the durable copy.

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Outcome of persisting a local change
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncStatus {
    /// Write dispatched in the background, outcome not yet known
    Pending,
    Synced,
    Failed,
}

/// What kind of write failed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum WriteKind {
    Move,
    Create,
    Rewrite,
}

/// A local change the durable copy does not have
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WriteFailure {
    pub kind: WriteKind,
    pub error: String,
    pub failed_at: DateTime<Utc>,
}

impl WriteFailure {
    pub fn new(kind: WriteKind, error: impl ToString) -> Self {
        Self {
            kind,
            error: error.to_string(),
            failed_at: Utc::now(),
        }
    }
}
