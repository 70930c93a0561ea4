//! Descriptions of a pending tool call and the ambient state around it.
//!
//! These are what supervisors see. The runtime builds them when a guarded
//! tool is invoked and never inspects `task_state` itself.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::ids::{ChainId, ExecutionId, RunId, SupervisorId};

/// Named call arguments, keyed by parameter name.
pub type Arguments = serde_json::Map<String, Value>;

/// A pending invocation of a guarded tool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    /// Registered tool name (e.g. "divide", "send_email").
    pub tool: String,
    /// The arguments the caller passed.
    pub arguments: Arguments,
    /// Human-readable description of what the tool does.
    #[serde(default)]
    pub description: String,
    /// JSON Schema of the tool's parameters, if declared.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema: Option<Value>,
}

impl ToolCall {
    pub fn new(tool: impl Into<String>, arguments: Arguments) -> Self {
        Self {
            tool: tool.into(),
            arguments,
            description: String::new(),
            schema: None,
        }
    }

    /// Look up one argument by name.
    pub fn argument(&self, name: &str) -> Option<&Value> {
        self.arguments.get(name)
    }
}

/// One turn of the surrounding conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// "system", "user", "assistant", or "tool".
    pub role: String,
    pub content: String,
}

impl Message {
    pub fn new(role: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: role.into(),
            content: content.into(),
        }
    }
}

/// Everything around a call that richer supervisors may want to read.
///
/// Rule supervisors usually ignore this; model- and human-backed supervisors
/// forward it to their reviewer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallContext {
    /// The run this call belongs to, once registered with a backend.
    pub run_id: Option<RunId>,
    /// Minted once per intercepted call.
    pub execution_id: ExecutionId,
    /// Recent conversation turns, oldest first.
    #[serde(default)]
    pub messages: Vec<Message>,
    /// Results of earlier tool calls in the same run.
    #[serde(default)]
    pub prior_results: Vec<Value>,
    /// Arbitrary agent state. The runtime never inspects this.
    #[serde(default)]
    pub task_state: Value,
}

impl CallContext {
    pub fn new() -> Self {
        Self {
            run_id: None,
            execution_id: ExecutionId::new(),
            messages: Vec::new(),
            prior_results: Vec::new(),
            task_state: Value::Null,
        }
    }

    pub fn with_messages(mut self, messages: Vec<Message>) -> Self {
        self.messages = messages;
        self
    }

    pub fn with_prior_results(mut self, prior_results: Vec<Value>) -> Self {
        self.prior_results = prior_results;
        self
    }

    pub fn with_task_state(mut self, task_state: Value) -> Self {
        self.task_state = task_state;
        self
    }

    /// The last `n` messages, oldest first.
    pub fn recent_messages(&self, n: usize) -> &[Message] {
        let start = self.messages.len().saturating_sub(n);
        &self.messages[start..]
    }
}

impl Default for CallContext {
    fn default() -> Self {
        Self::new()
    }
}

/// Where in the chain set a supervisor is being consulted.
///
/// Remote ids are present only when the configuration was registered with a
/// backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainSlot {
    /// Index of the chain within the chain set.
    pub chain_index: usize,
    /// Index of the supervisor within its chain.
    pub position: usize,
    /// Number of supervisors in the chain.
    pub chain_len: usize,
    pub chain_id: Option<ChainId>,
    pub supervisor_id: Option<SupervisorId>,
}

impl ChainSlot {
    pub fn is_last(&self) -> bool {
        self.position + 1 >= self.chain_len
    }
}
