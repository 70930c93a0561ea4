//! Per-decision records written to the local decision log.
//!
//! The chain evaluator produces one `DecisionRecord` for every supervisor it
//! consults. Records are never modified once written.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{decision::Decision, ids::ExecutionId};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionRecord {
    /// The intercepted call this decision belongs to.
    pub execution_id: ExecutionId,
    /// Name of the guarded tool.
    pub tool: String,
    /// Index of the chain within the chain set.
    pub chain_index: usize,
    /// Index of the supervisor within its chain.
    pub position: usize,
    /// Name of the supervisor that decided.
    pub supervisor: String,
    pub decision: Decision,
    /// Wall-clock time the record was created (UTC).
    pub timestamp: DateTime<Utc>,
}
