//! Model-backed supervisor.
//!
//! A `ModelSupervisor` shows the pending call to a language model and asks
//! for a JSON verdict:
//!
//! ```json
//! { "decision": "modify", "explanation": "b must be positive", "arguments": { "b": 1 } }
//! ```
//!
//! Any failure (unreachable model, unparsable reply) escalates.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, warn};

use sentinel_contracts::{
    call::{Arguments, CallContext, ChainSlot, ToolCall},
    decision::Decision,
    error::{SentinelError, SentinelResult},
    remote::{RemoteDecision, SupervisionResult, SupervisorKind, ToolRequest},
};
use sentinel_core::traits::Supervisor;

/// A text-completion capability.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    async fn complete(&self, system: &str, prompt: &str) -> SentinelResult<String>;
}

// ── Chat completions over HTTP ────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct ChatCompletionsConfig {
    pub base_url: String,
    pub api_key: Option<String>,
    pub model: String,
}

impl Default for ChatCompletionsConfig {
    fn default() -> Self {
        ChatCompletionsConfig {
            base_url: std::env::var("SENTINEL_MODEL_BASE_URL")
                .unwrap_or_else(|_| "https://api.openai.com/v1".to_string()),
            api_key: std::env::var("OPENAI_API_KEY").ok(),
            model: std::env::var("SENTINEL_MODEL").unwrap_or_else(|_| "gpt-4o-mini".to_string()),
        }
    }
}

impl ChatCompletionsConfig {
    pub fn from_env() -> Self {
        Self::default()
    }
}

#[derive(Debug, Deserialize)]
struct Completion {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

/// An OpenAI-compatible `/chat/completions` client.
pub struct ChatCompletionsModel {
    config: ChatCompletionsConfig,
    client: Client,
}

impl ChatCompletionsModel {
    pub fn new(config: ChatCompletionsConfig) -> SentinelResult<Self> {
        let client = Client::builder()
            .user_agent(concat!("sentinel-review/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| SentinelError::config(format!("failed to build HTTP client: {}", e)))?;
        Ok(Self { config, client })
    }
}

#[async_trait]
impl LanguageModel for ChatCompletionsModel {
    async fn complete(&self, system: &str, prompt: &str) -> SentinelResult<String> {
        let url = format!("{}/chat/completions", self.config.base_url.trim_end_matches('/'));
        let body = json!({
            "model": self.config.model,
            "temperature": 0,
            "messages": [
                { "role": "system", "content": system },
                { "role": "user", "content": prompt },
            ],
        });

        let mut request = self.client.post(&url).json(&body);
        if let Some(key) = &self.config.api_key {
            request = request.bearer_auth(key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| SentinelError::transport(format!("model request failed: {}", e)))?;
        let status = response.status();
        if !status.is_success() {
            return Err(SentinelError::transport(format!("model returned {}", status)));
        }

        let completion: Completion = response
            .json()
            .await
            .map_err(|e| SentinelError::transport(format!("model reply unreadable: {}", e)))?;

        completion
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| SentinelError::transport("model reply had no content"))
    }
}

// ── ModelSupervisor ───────────────────────────────────────────────────────────

const SYSTEM_PROMPT: &str = "You supervise tool calls made by an autonomous agent. \
Reply with a single JSON object: {\"decision\": \"approve\" | \"reject\" | \"modify\" | \"escalate\" | \"terminate\", \
\"explanation\": string, \"arguments\": object (only for modify, the arguments to replace)}.";

#[derive(Debug, Deserialize)]
struct ModelVerdict {
    decision: RemoteDecision,
    #[serde(default)]
    explanation: String,
    #[serde(default)]
    arguments: Option<Arguments>,
}

pub struct ModelSupervisor {
    name: String,
    description: String,
    model: Arc<dyn LanguageModel>,
    instructions: String,
    history: usize,
}

impl ModelSupervisor {
    /// `instructions` is the policy the model enforces, in plain language.
    pub fn new(name: impl Into<String>, model: Arc<dyn LanguageModel>, instructions: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            model,
            instructions: instructions.into(),
            history: 10,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_history(mut self, history: usize) -> Self {
        self.history = history;
        self
    }

    fn prompt(&self, call: &ToolCall, ctx: &CallContext) -> String {
        let transcript: Vec<String> = ctx
            .recent_messages(self.history)
            .iter()
            .map(|m| format!("{}: {}", m.role, m.content))
            .collect();

        format!(
            "Policy:\n{}\n\nTool: {}\nDescription: {}\nArguments: {}\nTask state: {}\nPrior results: {}\n\nRecent conversation:\n{}",
            self.instructions,
            call.tool,
            call.description,
            Value::Object(call.arguments.clone()),
            ctx.task_state,
            Value::Array(ctx.prior_results.clone()),
            transcript.join("\n"),
        )
    }
}

/// Parse a model reply into a decision about `call`. Tolerates prose or
/// code fences around the JSON object.
pub fn parse_verdict(call: &ToolCall, reply: &str) -> SentinelResult<Decision> {
    let start = reply.find('{');
    let end = reply.rfind('}');
    let json = match (start, end) {
        (Some(s), Some(e)) if s < e => &reply[s..=e],
        _ => {
            return Err(SentinelError::transport(format!(
                "model reply contains no JSON object: {}",
                reply
            )))
        }
    };

    let verdict: ModelVerdict = serde_json::from_str(json)?;
    let result = SupervisionResult {
        decision: verdict.decision,
        reasoning: verdict.explanation,
        modified_tool_request: verdict.arguments.map(|arguments| ToolRequest {
            tool: call.tool.clone(),
            arguments,
        }),
        created_at: Utc::now(),
    };
    Ok(result.into_decision(call))
}

#[async_trait]
impl Supervisor for ModelSupervisor {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn kind(&self) -> SupervisorKind {
        SupervisorKind::Model
    }

    fn code(&self) -> Option<String> {
        Some(self.instructions.clone())
    }

    async fn decide(&self, call: &ToolCall, ctx: &CallContext, _slot: &ChainSlot) -> Decision {
        let reply = match self.model.complete(SYSTEM_PROMPT, &self.prompt(call, ctx)).await {
            Ok(reply) => reply,
            Err(e) => {
                warn!(supervisor = %self.name, error = %e, "model unavailable");
                return Decision::escalate(format!("model supervisor {} unavailable: {}", self.name, e));
            }
        };

        match parse_verdict(call, &reply) {
            Ok(decision) => {
                debug!(supervisor = %self.name, decision = %decision.kind(), "model decided");
                decision
            }
            Err(e) => {
                warn!(supervisor = %self.name, error = %e, "model reply not understood");
                Decision::escalate(format!("model supervisor {} gave an unusable reply: {}", self.name, e))
            }
        }
    }
}
