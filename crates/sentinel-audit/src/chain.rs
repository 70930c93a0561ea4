//! Hash-chain primitives: hashing and chain integrity verification.
//!
//! Hash input layout (bytes, in order):
//!   1. sequence as 8-byte little-endian
//!   2. prev_hash as UTF-8 bytes (64 ASCII hex chars)
//!   3. canonical JSON of the entry body (serde_json, no pretty-printing)

use sha2::{Digest, Sha256};

use sentinel_contracts::error::{SentinelError, SentinelResult};

use crate::event::{EntryBody, LogEntry};

/// Compute the SHA-256 hash of one entry as a lowercase hex string.
///
/// Fails only if `body` cannot be serialized, which surfaces as a decision
/// log failure.
pub fn hash_entry(sequence: u64, body: &EntryBody, prev_hash: &str) -> SentinelResult<String> {
    let body_json = serde_json::to_vec(body).map_err(|e| SentinelError::DecisionLogFailed {
        reason: format!("entry {} could not be serialized: {}", sequence, e),
    })?;

    let mut hasher = Sha256::new();
    hasher.update(sequence.to_le_bytes());
    hasher.update(prev_hash.as_bytes());
    hasher.update(&body_json);

    Ok(hex::encode(hasher.finalize()))
}

/// Verify the integrity of a hash chain.
///
/// Valid when every entry links to its predecessor (or to `GENESIS_HASH`),
/// carries the expected sequence number, and its `this_hash` matches the
/// recomputed value. An empty chain is valid.
pub fn verify_chain(entries: &[LogEntry]) -> bool {
    let mut expected_prev = LogEntry::GENESIS_HASH.to_string();

    for (index, entry) in entries.iter().enumerate() {
        if entry.sequence != index as u64 || entry.prev_hash != expected_prev {
            return false;
        }

        match hash_entry(entry.sequence, &entry.body, &entry.prev_hash) {
            Ok(recomputed) if recomputed == entry.this_hash => {}
            _ => return false,
        }

        expected_prev = entry.this_hash.clone();
    }

    true
}
