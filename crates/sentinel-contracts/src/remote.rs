//! Data exchanged with the remote supervision backend.
//!
//! Requests are created when a human- or model-backed supervisor needs an
//! external verdict; results are created once per resolved request and never
//! modified afterwards. Registration specs describe tools and supervisors so
//! the backend can render and route reviews.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{
    call::{Arguments, CallContext, ChainSlot, Message, ToolCall},
    decision::{Decision, DecisionKind, Modification},
    ids::{ChainId, ExecutionId, RunId, SupervisorId},
};

/// Lifecycle of a supervision request on the backend.
///
/// `Pending` means unassigned; `Assigned` means a reviewer has picked it up
/// but not yet decided. The other three are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewStatus {
    Pending,
    Assigned,
    Completed,
    Failed,
    Timeout,
}

impl ReviewStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ReviewStatus::Completed | ReviewStatus::Failed | ReviewStatus::Timeout
        )
    }
}

/// The decision value as the backend spells it.
///
/// Anything the backend sends that is not one of the five known values
/// deserializes to `Unknown`, which maps to `Escalate` locally.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RemoteDecision {
    Approve,
    Reject,
    Modify,
    Escalate,
    Terminate,
    #[serde(other)]
    Unknown,
}

impl From<DecisionKind> for RemoteDecision {
    fn from(kind: DecisionKind) -> Self {
        match kind {
            DecisionKind::Approve => RemoteDecision::Approve,
            DecisionKind::Reject => RemoteDecision::Reject,
            DecisionKind::Escalate => RemoteDecision::Escalate,
            DecisionKind::Terminate => RemoteDecision::Terminate,
            DecisionKind::Modify => RemoteDecision::Modify,
        }
    }
}

/// A serialized tool invocation as the backend stores it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolRequest {
    pub tool: String,
    pub arguments: Arguments,
}

impl ToolRequest {
    /// The call this request describes, as a supervisor would see it.
    pub fn to_call(&self) -> ToolCall {
        ToolCall::new(self.tool.clone(), self.arguments.clone())
    }
}

impl From<&ToolCall> for ToolRequest {
    fn from(call: &ToolCall) -> Self {
        Self {
            tool: call.tool.clone(),
            arguments: call.arguments.clone(),
        }
    }
}

/// A request for an external verdict on one pending call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SupervisionRequest {
    pub run_id: Option<RunId>,
    pub execution_id: ExecutionId,
    pub chain_id: Option<ChainId>,
    pub supervisor_id: Option<SupervisorId>,
    pub position_in_chain: usize,
    /// Opaque agent state forwarded to the reviewer.
    pub task_state: Value,
    pub tool_requests: Vec<ToolRequest>,
    /// Recent conversation turns for reviewer context.
    pub messages: Vec<Message>,
    /// Results of earlier tool calls in the same run.
    #[serde(default)]
    pub prior_results: Vec<Value>,
    pub created_at: DateTime<Utc>,
}

impl SupervisionRequest {
    /// Build a request for `call` at `slot`, forwarding the last
    /// `history` messages of `ctx`.
    pub fn for_call(call: &ToolCall, ctx: &CallContext, slot: &ChainSlot, history: usize) -> Self {
        Self {
            run_id: ctx.run_id,
            execution_id: ctx.execution_id,
            chain_id: slot.chain_id,
            supervisor_id: slot.supervisor_id,
            position_in_chain: slot.position,
            task_state: ctx.task_state.clone(),
            tool_requests: vec![ToolRequest::from(call)],
            messages: ctx.recent_messages(history).to_vec(),
            prior_results: ctx.prior_results.clone(),
            created_at: Utc::now(),
        }
    }

    /// The first tool request as a call, if there is one.
    pub fn call(&self) -> Option<ToolCall> {
        self.tool_requests.first().map(ToolRequest::to_call)
    }
}

/// The resolved outcome of a supervision request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SupervisionResult {
    pub decision: RemoteDecision,
    #[serde(default)]
    pub reasoning: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modified_tool_request: Option<ToolRequest>,
    pub created_at: DateTime<Utc>,
}

impl SupervisionResult {
    /// Describe a decision about `call` so it can be reported to the backend.
    pub fn from_decision(decision: &Decision, call: &ToolCall) -> Self {
        let modified_tool_request = decision.modification().map(|m| ToolRequest {
            tool: m.original.as_ref().unwrap_or(call).tool.clone(),
            arguments: m.arguments.clone(),
        });
        Self {
            decision: decision.kind().into(),
            reasoning: decision.explanation().to_string(),
            modified_tool_request,
            created_at: Utc::now(),
        }
    }

    /// Map the backend's verdict on `call` onto the local decision
    /// vocabulary.
    ///
    /// A `modify` without a modified tool request cannot be applied and is
    /// treated like an unknown value: escalate.
    pub fn into_decision(self, call: &ToolCall) -> Decision {
        let explanation = self.reasoning;
        match self.decision {
            RemoteDecision::Approve => Decision::Approve { explanation },
            RemoteDecision::Reject => Decision::Reject { explanation },
            RemoteDecision::Escalate => Decision::Escalate { explanation },
            RemoteDecision::Terminate => Decision::Terminate { explanation },
            RemoteDecision::Modify => match self.modified_tool_request {
                Some(request) => Decision::Modify {
                    modification: Modification::new(request.arguments).against(call),
                    explanation,
                },
                None => Decision::Escalate {
                    explanation: format!(
                        "reviewer chose modify without a modified tool request: {}",
                        explanation
                    ),
                },
            },
            RemoteDecision::Unknown => Decision::Escalate {
                explanation: format!("unrecognized remote decision: {}", explanation),
            },
        }
    }
}

/// Which backing a supervisor has. Reported at registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SupervisorKind {
    Rule,
    Model,
    Human,
}

/// Registration payload for one tool.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolSpec {
    pub name: String,
    pub description: String,
    #[serde(default)]
    pub schema: Value,
}

/// Registration payload for one supervisor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SupervisorSpec {
    pub name: String,
    pub description: String,
    pub kind: SupervisorKind,
    /// Source or configuration of a rule supervisor, for display only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
}
