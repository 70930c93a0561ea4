//! Runtime error types for the Sentinel supervision pipeline.
//!
//! Only configuration problems, tool failures, decision-log failures, and
//! termination ever reach the caller of a guarded tool. Transport, timeout,
//! and cancellation errors are produced by the review protocol and turned
//! into decisions by the supervisor that hit them.

use thiserror::Error;

use crate::{ids::RequestId, remote::ReviewStatus};

/// The unified error type for the Sentinel runtime.
#[derive(Debug, Error)]
pub enum SentinelError {
    /// A required configuration value is missing or invalid.
    #[error("configuration error: {reason}")]
    Config { reason: String },

    /// The remote backend was unreachable or answered with a failure status.
    #[error("transport error: {reason}")]
    Transport { reason: String },

    /// No terminal review status arrived before the deadline.
    #[error("review {request_id} did not resolve within {waited_secs}s")]
    ReviewTimedOut { request_id: RequestId, waited_secs: u64 },

    /// The backend reported a terminal status other than `completed`.
    #[error("review {request_id} ended with status {status:?}")]
    ReviewFailed {
        request_id: RequestId,
        status: ReviewStatus,
    },

    /// The run was aborted while a review was outstanding.
    #[error("review {request_id} abandoned: run aborted")]
    ReviewCancelled { request_id: RequestId },

    /// A supervisor terminated the run. Callers should stop their agent loop.
    #[error("run terminated while supervising '{tool}': {explanation}")]
    Terminated { tool: String, explanation: String },

    /// The wrapped tool itself failed after being allowed to run.
    #[error("tool '{tool}' failed: {reason}")]
    ToolFailed { tool: String, reason: String },

    /// The local decision log could not persist a record.
    ///
    /// This is treated as fatal: a call whose supervision cannot be recorded
    /// does not proceed.
    #[error("decision log write failed: {reason}")]
    DecisionLogFailed { reason: String },

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl SentinelError {
    pub fn config(reason: impl Into<String>) -> Self {
        SentinelError::Config {
            reason: reason.into(),
        }
    }

    pub fn transport(reason: impl Into<String>) -> Self {
        SentinelError::Transport {
            reason: reason.into(),
        }
    }

    /// True for the run-ending signal produced by a `Terminate` decision.
    pub fn is_terminal(&self) -> bool {
        matches!(self, SentinelError::Terminated { .. })
    }
}

/// Convenience alias used throughout the Sentinel crates.
pub type SentinelResult<T> = Result<T, SentinelError>;
