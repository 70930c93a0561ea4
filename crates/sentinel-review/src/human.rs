//! Human-backed supervisor.
//!
//! Each decision is a round trip through the review protocol: the pending
//! call is submitted, a reviewer resolves it on the backend, and the result
//! is mapped back. Nothing that goes wrong on the way escapes as an error:
//!
//!   submit failed     → Escalate (transport error in the explanation)
//!   no answer in time → Escalate ("did not respond in time")
//!   status unusable   → Escalate
//!   run aborted       → Terminate

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tracing::{info, warn};

use sentinel_contracts::{
    call::{CallContext, ChainSlot, ToolCall},
    decision::Decision,
    error::SentinelError,
    ids::RequestId,
    remote::{SupervisionRequest, SupervisorKind},
};
use sentinel_core::traits::Supervisor;

use crate::{config::ClientConfig, console::ReviewConsole, protocol::ReviewProtocol};

pub struct HumanSupervisor {
    name: String,
    description: String,
    protocol: Arc<ReviewProtocol>,
    timeout: Duration,
    history: usize,
    console: Option<ReviewConsole>,
}

impl HumanSupervisor {
    pub fn new(name: impl Into<String>, protocol: Arc<ReviewProtocol>, timeout: Duration) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            protocol,
            timeout,
            history: 10,
            console: None,
        }
    }

    /// Review timeout and forwarded history taken from `config`.
    pub fn from_config(name: impl Into<String>, protocol: Arc<ReviewProtocol>, config: &ClientConfig) -> Self {
        Self::new(name, protocol, config.review_timeout()).with_history(config.history)
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Number of recent conversation turns forwarded to the reviewer.
    pub fn with_history(mut self, history: usize) -> Self {
        self.history = history;
        self
    }

    /// Announce each pending review on `console`.
    pub fn with_console(mut self, console: ReviewConsole) -> Self {
        self.console = Some(console);
        self
    }

    async fn announce(&self, request_id: RequestId, call: &ToolCall) {
        let Some(console) = &self.console else {
            return;
        };
        let arguments = Value::Object(call.arguments.clone());
        console
            .announce(&[
                format!("[{}] review requested: {}", self.name, request_id),
                format!("  tool:      {}", call.tool),
                format!("  arguments: {}", arguments),
                format!("  timeout:   {}s", self.timeout.as_secs()),
            ])
            .await;
    }

    fn unresolved(&self, err: SentinelError) -> Decision {
        match err {
            SentinelError::ReviewTimedOut { waited_secs, .. } => Decision::escalate(format!(
                "{} did not respond in time ({}s)",
                self.name, waited_secs
            )),
            SentinelError::ReviewCancelled { request_id } => Decision::terminate(format!(
                "run aborted while review {} was outstanding",
                request_id
            )),
            SentinelError::ReviewFailed { status, .. } => Decision::escalate(format!(
                "review by {} ended with status {:?}",
                self.name, status
            )),
            other => Decision::escalate(format!("review by {} unavailable: {}", self.name, other)),
        }
    }
}

#[async_trait]
impl Supervisor for HumanSupervisor {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn kind(&self) -> SupervisorKind {
        SupervisorKind::Human
    }

    async fn decide(&self, call: &ToolCall, ctx: &CallContext, slot: &ChainSlot) -> Decision {
        let request = SupervisionRequest::for_call(call, ctx, slot, self.history);

        let request_id = match self.protocol.submit_request(&request).await {
            Ok(id) => id,
            Err(e) => {
                warn!(supervisor = %self.name, error = %e, "could not submit review request");
                return Decision::escalate(format!(
                    "review request by {} could not be submitted: {}",
                    self.name, e
                ));
            }
        };

        self.announce(request_id, call).await;

        if let Err(e) = self.protocol.poll_status(request_id, self.timeout).await {
            return self.unresolved(e);
        }

        match self.protocol.fetch_result(request_id, call).await {
            Ok(decision) => {
                info!(
                    supervisor = %self.name,
                    request_id = %request_id,
                    decision = %decision.kind(),
                    "human review resolved"
                );
                decision
            }
            Err(e) => self.unresolved(e),
        }
    }
}
