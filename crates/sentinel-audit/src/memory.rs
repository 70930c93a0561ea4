//! In-memory implementation of `DecisionLog`.
//!
//! `InMemoryDecisionLog` keeps every entry in a `Vec` behind a `Mutex`, so one
//! log can be shared by every guarded tool of a configuration and written
//! from concurrent calls. Entries from different calls interleave in arrival
//! order on a single chain.
//!
//! Use `export()` to obtain a sealed `DecisionTrail` and `verify_integrity()`
//! to confirm the chain has not been tampered with.

use std::sync::{Arc, Mutex, MutexGuard};

use chrono::Utc;
use tracing::{debug, info};

use sentinel_contracts::{
    error::{SentinelError, SentinelResult},
    ids::ExecutionId,
    record::DecisionRecord,
};
use sentinel_core::traits::DecisionLog;

use crate::{
    chain::{hash_entry, verify_chain},
    event::{DecisionTrail, EntryBody, LogEntry},
};

// ── Internal mutable state ────────────────────────────────────────────────────

pub(crate) struct LogState {
    pub(crate) entries: Vec<LogEntry>,

    /// The `this_hash` of the last entry, or `GENESIS_HASH` before any.
    pub(crate) last_hash: String,
}

// ── Public log ────────────────────────────────────────────────────────────────

/// An append-only decision log backed by a SHA-256 hash chain.
///
/// Cloning is cheap and every clone appends to the same chain.
#[derive(Clone)]
pub struct InMemoryDecisionLog {
    pub(crate) state: Arc<Mutex<LogState>>,
}

impl Default for InMemoryDecisionLog {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryDecisionLog {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(LogState {
                entries: Vec::new(),
                last_hash: LogEntry::GENESIS_HASH.to_string(),
            })),
        }
    }

    fn lock(&self) -> SentinelResult<MutexGuard<'_, LogState>> {
        self.state.lock().map_err(|e| SentinelError::DecisionLogFailed {
            reason: format!("decision log lock poisoned: {}", e),
        })
    }

    fn append(&self, body: EntryBody) -> SentinelResult<()> {
        let mut state = self.lock()?;

        let sequence = state.entries.len() as u64;
        let prev_hash = state.last_hash.clone();
        let this_hash = hash_entry(sequence, &body, &prev_hash)?;

        state.entries.push(LogEntry {
            sequence,
            body,
            prev_hash,
            this_hash: this_hash.clone(),
        });
        state.last_hash = this_hash;
        Ok(())
    }

    /// Every decision recorded for one call, in the order it was made.
    pub fn decisions_for(&self, execution_id: &ExecutionId) -> Vec<DecisionRecord> {
        self.lock()
            .map(|state| {
                state
                    .entries
                    .iter()
                    .filter_map(|entry| match &entry.body {
                        EntryBody::Decision(record) if record.execution_id == *execution_id => {
                            Some(record.clone())
                        }
                        _ => None,
                    })
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn is_finalized(&self, execution_id: &ExecutionId) -> bool {
        self.lock()
            .map(|state| {
                state.entries.iter().any(|entry| {
                    matches!(&entry.body, EntryBody::Finalized { execution_id: id, .. } if id == execution_id)
                })
            })
            .unwrap_or(false)
    }

    pub fn len(&self) -> usize {
        self.lock().map(|state| state.entries.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Export a sealed snapshot of everything written so far.
    pub fn export(&self) -> SentinelResult<DecisionTrail> {
        let state = self.lock()?;
        let terminal_hash = state
            .entries
            .last()
            .map(|e| e.this_hash.clone())
            .unwrap_or_default();

        Ok(DecisionTrail {
            entries: state.entries.clone(),
            exported_at: Utc::now(),
            terminal_hash,
        })
    }

    /// Check prev-hash linkage and hash correctness of every entry.
    pub fn verify_integrity(&self) -> bool {
        self.lock()
            .map(|state| verify_chain(&state.entries))
            .unwrap_or(false)
    }
}

// ── DecisionLog impl ──────────────────────────────────────────────────────────

impl DecisionLog for InMemoryDecisionLog {
    fn record(&self, record: &DecisionRecord) -> SentinelResult<()> {
        debug!(
            execution_id = %record.execution_id,
            supervisor = %record.supervisor,
            decision = %record.decision.kind(),
            "decision recorded"
        );
        self.append(EntryBody::Decision(record.clone()))
    }

    fn finalize(&self, execution_id: &ExecutionId) -> SentinelResult<()> {
        self.append(EntryBody::Finalized {
            execution_id: *execution_id,
            at: Utc::now(),
        })?;

        let state = self.lock()?;
        info!(
            execution_id = %execution_id,
            entry_count = state.entries.len(),
            terminal_hash = %state.last_hash,
            "call evaluation sealed in decision log"
        );
        Ok(())
    }
}
