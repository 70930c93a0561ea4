//! The decision vocabulary supervisors speak.
//!
//! A supervisor consulted about a pending tool call answers with exactly one
//! `Decision`. The chain evaluator consumes decisions; nothing else produces
//! them except the remote-result mapping in the review protocol.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::call::{Arguments, ToolCall};

/// The closed set of outcomes, without payloads.
///
/// Used for logging, remote serialization, and anywhere a caller only needs
/// to branch on the outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionKind {
    Approve,
    Reject,
    Escalate,
    Terminate,
    Modify,
}

impl DecisionKind {
    /// Lowercase wire name (`"approve"`, `"reject"`, ...).
    pub fn as_str(&self) -> &'static str {
        match self {
            DecisionKind::Approve => "approve",
            DecisionKind::Reject => "reject",
            DecisionKind::Escalate => "escalate",
            DecisionKind::Terminate => "terminate",
            DecisionKind::Modify => "modify",
        }
    }
}

impl fmt::Display for DecisionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Replacement arguments carried by a `Modify` decision.
///
/// Only the keys present in `arguments` are replaced; the rest of the
/// original call is kept as is.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Modification {
    /// Keys to overwrite on the pending call.
    pub arguments: Arguments,
    /// The call the modification was computed against, when the supervisor
    /// had it at hand.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original: Option<ToolCall>,
}

impl Modification {
    pub fn new(arguments: Arguments) -> Self {
        Self {
            arguments,
            original: None,
        }
    }

    /// Attach the call this modification was derived from.
    pub fn against(mut self, call: &ToolCall) -> Self {
        self.original = Some(call.clone());
        self
    }
}

/// A supervisor's answer about one pending call.
///
/// The modification payload only exists on the `Modify` variant, so a
/// decision can never carry replacement arguments it is not allowed to use.
/// `explanation` is free text for humans and agents; it never drives
/// control flow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "decision", rename_all = "snake_case")]
pub enum Decision {
    /// Let the call run as requested.
    Approve { explanation: String },

    /// Block the call. Vetoes every other chain.
    Reject { explanation: String },

    /// "I cannot decide; ask the next authority."
    Escalate { explanation: String },

    /// Block the call and stop the whole agent run.
    Terminate { explanation: String },

    /// Approve, but replace some arguments first.
    Modify {
        modification: Modification,
        explanation: String,
    },
}

impl Decision {
    pub fn approve(explanation: impl Into<String>) -> Self {
        Decision::Approve {
            explanation: explanation.into(),
        }
    }

    pub fn reject(explanation: impl Into<String>) -> Self {
        Decision::Reject {
            explanation: explanation.into(),
        }
    }

    pub fn escalate(explanation: impl Into<String>) -> Self {
        Decision::Escalate {
            explanation: explanation.into(),
        }
    }

    pub fn terminate(explanation: impl Into<String>) -> Self {
        Decision::Terminate {
            explanation: explanation.into(),
        }
    }

    pub fn modify(arguments: Arguments, explanation: impl Into<String>) -> Self {
        Decision::Modify {
            modification: Modification::new(arguments),
            explanation: explanation.into(),
        }
    }

    pub fn kind(&self) -> DecisionKind {
        match self {
            Decision::Approve { .. } => DecisionKind::Approve,
            Decision::Reject { .. } => DecisionKind::Reject,
            Decision::Escalate { .. } => DecisionKind::Escalate,
            Decision::Terminate { .. } => DecisionKind::Terminate,
            Decision::Modify { .. } => DecisionKind::Modify,
        }
    }

    pub fn explanation(&self) -> &str {
        match self {
            Decision::Approve { explanation }
            | Decision::Reject { explanation }
            | Decision::Escalate { explanation }
            | Decision::Terminate { explanation }
            | Decision::Modify { explanation, .. } => explanation,
        }
    }

    /// The replacement arguments, present only for `Modify`.
    pub fn modification(&self) -> Option<&Modification> {
        match self {
            Decision::Modify { modification, .. } => Some(modification),
            _ => None,
        }
    }

    /// True for the two outcomes that let a chain finish successfully.
    pub fn is_affirmative(&self) -> bool {
        matches!(self, Decision::Approve { .. } | Decision::Modify { .. })
    }
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.explanation().is_empty() {
            write!(f, "{}", self.kind())
        } else {
            write!(f, "{}: {}", self.kind(), self.explanation())
        }
    }
}
