//! # sentinel-audit
//!
//! Append-only, SHA-256 hash-chained decision log for the Sentinel runtime.
//!
//! ## Overview
//!
//! Every supervisor decision the chain evaluator observes is wrapped in a
//! `LogEntry` linked to the previous entry by its SHA-256 hash, followed by a
//! `Finalized` marker once the call has been fully evaluated. Altering any
//! entry breaks the chain and is detected by `verify_chain`.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use sentinel_audit::InMemoryDecisionLog;
//!
//! let log = Arc::new(InMemoryDecisionLog::new());
//! let config = SupervisionConfig::builder().decision_log(log.clone()) /* ... */;
//!
//! // after some guarded calls
//! assert!(log.verify_integrity());
//! let trail = log.export()?;
//! ```

pub mod chain;
pub mod event;
pub mod memory;

pub use chain::{hash_entry, verify_chain};
pub use event::{DecisionTrail, EntryBody, LogEntry};
pub use memory::InMemoryDecisionLog;

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use sentinel_contracts::{decision::Decision, ids::ExecutionId, record::DecisionRecord};
    use sentinel_core::traits::DecisionLog;

    use super::{EntryBody, InMemoryDecisionLog, LogEntry};

    // ── Helpers ───────────────────────────────────────────────────────────────

    fn make_record(execution_id: ExecutionId, position: usize, decision: Decision) -> DecisionRecord {
        DecisionRecord {
            execution_id,
            tool: "divide".to_string(),
            chain_index: 0,
            position,
            supervisor: format!("supervisor-{}", position),
            decision,
            timestamp: Utc::now(),
        }
    }

    fn filled_log() -> (InMemoryDecisionLog, ExecutionId) {
        let log = InMemoryDecisionLog::new();
        let id = ExecutionId::new();
        log.record(&make_record(id, 0, Decision::escalate("unsure"))).unwrap();
        log.record(&make_record(id, 1, Decision::approve("fine"))).unwrap();
        log.finalize(&id).unwrap();
        (log, id)
    }

    // ── Tests ─────────────────────────────────────────────────────────────────

    /// Decisions plus the finalize marker form a valid chain.
    #[test]
    fn test_hash_chain_integrity() {
        let (log, _) = filled_log();
        assert_eq!(log.len(), 3);
        assert!(log.verify_integrity(), "chain must be valid after sequential writes");
    }

    /// Rewriting a recorded decision breaks the chain.
    #[test]
    fn test_tamper_detection() {
        let (log, _) = filled_log();

        {
            let mut state = log.state.lock().unwrap();
            if let EntryBody::Decision(record) = &mut state.entries[0].body {
                record.decision = Decision::approve("nothing to see here");
            }
        }

        assert!(
            !log.verify_integrity(),
            "chain must detect tampering with a stored decision"
        );
    }

    /// Dropping an entry from the middle breaks linkage.
    #[test]
    fn test_removal_detection() {
        let (log, _) = filled_log();
        log.state.lock().unwrap().entries.remove(1);
        assert!(!log.verify_integrity());
    }

    #[test]
    fn test_genesis_hash() {
        let (log, _) = filled_log();
        let trail = log.export().unwrap();
        assert_eq!(
            trail.entries[0].prev_hash,
            LogEntry::GENESIS_HASH,
            "first entry must link to the genesis hash"
        );
    }

    /// Sequence numbers are 0, 1, 2, … with no gaps.
    #[test]
    fn test_sequence_monotonic() {
        let (log, _) = filled_log();
        let trail = log.export().unwrap();
        for (idx, entry) in trail.entries.iter().enumerate() {
            assert_eq!(entry.sequence, idx as u64);
        }
    }

    #[test]
    fn test_export_terminal_hash() {
        let (log, _) = filled_log();
        let trail = log.export().unwrap();

        assert_eq!(trail.terminal_hash, trail.entries.last().unwrap().this_hash);
        assert!(super::verify_chain(&trail.entries));
    }

    /// Interleaved calls share one chain but can be read back separately.
    #[test]
    fn test_decisions_for_filters_by_execution() {
        let log = InMemoryDecisionLog::new();
        let first = ExecutionId::new();
        let second = ExecutionId::new();

        log.record(&make_record(first, 0, Decision::approve("a"))).unwrap();
        log.record(&make_record(second, 0, Decision::reject("b"))).unwrap();
        log.finalize(&second).unwrap();

        let decisions = log.decisions_for(&first);
        assert_eq!(decisions.len(), 1);
        assert_eq!(decisions[0].decision, Decision::approve("a"));

        assert!(log.is_finalized(&second));
        assert!(!log.is_finalized(&first));
        assert!(log.verify_integrity());
    }

    #[test]
    fn test_clones_append_to_the_same_chain() {
        let log = InMemoryDecisionLog::new();
        let clone = log.clone();
        let id = ExecutionId::new();

        log.record(&make_record(id, 0, Decision::approve("x"))).unwrap();
        clone.finalize(&id).unwrap();

        assert_eq!(log.len(), 2);
        assert!(log.verify_integrity());
    }

    #[test]
    fn test_verify_empty() {
        let log = InMemoryDecisionLog::new();
        assert!(log.is_empty());
        assert!(log.verify_integrity(), "an empty chain must be considered valid");
        assert!(super::verify_chain(&[]));
        assert_eq!(log.export().unwrap().terminal_hash, "");
    }
}
