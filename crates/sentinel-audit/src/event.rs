//! Decision log entry types.
//!
//! `LogEntry` is a single link in the hash chain. It wraps either a
//! supervisor's `DecisionRecord` or the marker written when an intercepted
//! call finished evaluating. `DecisionTrail` is the sealed export.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use sentinel_contracts::{ids::ExecutionId, record::DecisionRecord};

/// What one entry commits to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "entry", rename_all = "snake_case")]
pub enum EntryBody {
    /// One supervisor answer.
    Decision(DecisionRecord),

    /// Every chain for this call has been evaluated.
    Finalized {
        execution_id: ExecutionId,
        at: DateTime<Utc>,
    },
}

impl EntryBody {
    pub fn execution_id(&self) -> ExecutionId {
        match self {
            EntryBody::Decision(record) => record.execution_id,
            EntryBody::Finalized { execution_id, .. } => *execution_id,
        }
    }
}

/// A single entry in the SHA-256 hash chain.
///
/// Each entry commits to the previous one via `prev_hash`. Changing any
/// field, including inside `body`, invalidates `this_hash` and every later
/// `prev_hash`, which `verify_chain` detects.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEntry {
    /// Position in the chain, starting at 0.
    pub sequence: u64,

    pub body: EntryBody,

    /// Hash of the previous entry, or `GENESIS_HASH` for the first.
    pub prev_hash: String,

    /// Hash over (sequence, prev_hash, canonical JSON of body).
    pub this_hash: String,
}

impl LogEntry {
    /// The `prev_hash` of the first entry in every chain: 64 hex zeros.
    pub const GENESIS_HASH: &'static str =
        "0000000000000000000000000000000000000000000000000000000000000000";
}

/// A sealed snapshot of the decision log.
///
/// `terminal_hash` is the `this_hash` of the last entry and commits to the
/// whole trail.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionTrail {
    pub entries: Vec<LogEntry>,

    pub exported_at: DateTime<Utc>,

    /// Empty when the log is empty.
    pub terminal_hash: String,
}
