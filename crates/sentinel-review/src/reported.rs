//! Reporting wrapper for locally deciding supervisors.
//!
//! Rule- and model-backed supervisors decide without the backend. Wrapping
//! one in `Reported` records each of its decisions remotely as a request plus
//! result, so the backend's audit trail covers every chain position and not
//! only the ones a human looked at. Reporting failures are logged; they never
//! change the decision.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, warn};

use sentinel_contracts::{
    call::{CallContext, ChainSlot, ToolCall},
    decision::Decision,
    error::SentinelResult,
    remote::{SupervisionRequest, SupervisorKind},
};
use sentinel_core::traits::Supervisor;

use crate::protocol::ReviewProtocol;

pub struct Reported<S> {
    inner: S,
    protocol: Arc<ReviewProtocol>,
    history: usize,
}

impl<S: Supervisor> Reported<S> {
    pub fn new(inner: S, protocol: Arc<ReviewProtocol>) -> Self {
        Self {
            inner,
            protocol,
            history: 10,
        }
    }

    /// Number of recent conversation turns forwarded with each report.
    pub fn with_history(mut self, history: usize) -> Self {
        self.history = history;
        self
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }

    async fn report(
        &self,
        call: &ToolCall,
        ctx: &CallContext,
        slot: &ChainSlot,
        decision: &Decision,
    ) -> SentinelResult<()> {
        let request = SupervisionRequest::for_call(call, ctx, slot, self.history);
        let request_id = self.protocol.submit_request(&request).await?;
        let result_id = self.protocol.submit_result(request_id, call, decision).await?;
        debug!(
            supervisor = %self.inner.name(),
            request_id = %request_id,
            result_id = %result_id,
            "local decision reported"
        );
        Ok(())
    }
}

#[async_trait]
impl<S: Supervisor> Supervisor for Reported<S> {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn description(&self) -> &str {
        self.inner.description()
    }

    fn kind(&self) -> SupervisorKind {
        self.inner.kind()
    }

    fn code(&self) -> Option<String> {
        self.inner.code()
    }

    async fn decide(&self, call: &ToolCall, ctx: &CallContext, slot: &ChainSlot) -> Decision {
        let decision = self.inner.decide(call, ctx, slot).await;

        if let Err(e) = self.report(call, ctx, slot, &decision).await {
            warn!(
                supervisor = %self.inner.name(),
                error = %e,
                "could not report local decision"
            );
        }

        decision
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use serde_json::json;

    use sentinel_contracts::{
        call::{CallContext, ChainSlot, Message, ToolCall},
        decision::DecisionKind,
        remote::RemoteDecision,
    };
    use sentinel_core::traits::{ReviewBackend, Supervisor};
    use sentinel_rules::RuleSupervisor;

    use super::Reported;
    use crate::{config::ClientConfig, memory::InMemoryBackend, protocol::ReviewProtocol};

    const CLAMP: &str = r#"
        default = "approve"

        [[rules]]
        id = "zero-to-one"
        tool = "divide"
        when = { argument = "b", op = "eq", value = 0 }
        decision = "modify"
        explanation = "b was zero"
        set = { b = 1 }
    "#;

    fn slot() -> ChainSlot {
        ChainSlot {
            chain_index: 0,
            position: 0,
            chain_len: 1,
            chain_id: None,
            supervisor_id: None,
        }
    }

    fn reported(backend: &Arc<InMemoryBackend>) -> Reported<RuleSupervisor> {
        let protocol = Arc::new(ReviewProtocol::new(
            backend.clone() as Arc<dyn ReviewBackend>,
            &ClientConfig::new("http://localhost:8000"),
        ));
        Reported::new(RuleSupervisor::from_toml_str("clamp", CLAMP).unwrap(), protocol)
    }

    #[tokio::test]
    async fn local_modification_is_reported_with_its_tool() {
        let backend = Arc::new(InMemoryBackend::new());
        let supervisor = reported(&backend);
        let call = ToolCall::new("divide", json!({ "a": 3, "b": 0 }).as_object().cloned().unwrap());

        let decision = supervisor.decide(&call, &CallContext::new(), &slot()).await;
        assert_eq!(decision.kind(), DecisionKind::Modify);

        let results = backend.results();
        assert_eq!(results.len(), 1);
        let (_, result) = &results[0];
        assert_eq!(result.decision, RemoteDecision::Modify);
        let modified = result.modified_tool_request.as_ref().unwrap();
        assert_eq!(modified.tool, "divide");
        assert_eq!(modified.arguments["b"], json!(1));
    }

    #[tokio::test]
    async fn report_carries_history_and_prior_results() {
        let backend = Arc::new(InMemoryBackend::new());
        let supervisor = reported(&backend).with_history(1);
        let call = ToolCall::new("divide", json!({ "a": 3, "b": 3 }).as_object().cloned().unwrap());
        let ctx = CallContext::new()
            .with_messages(vec![Message::new("user", "first"), Message::new("user", "second")])
            .with_prior_results(vec![json!(0.5)]);

        supervisor.decide(&call, &ctx, &slot()).await;

        let (id, _) = backend.results()[0].clone();
        let request = backend.request(id).unwrap();
        assert_eq!(request.messages.len(), 1);
        assert_eq!(request.messages[0].content, "second");
        assert_eq!(request.prior_results, vec![json!(0.5)]);
    }

    #[tokio::test]
    async fn unreachable_backend_leaves_the_decision_alone() {
        let backend = Arc::new(InMemoryBackend::new());
        backend.set_unreachable(true);
        let supervisor = reported(&backend);
        let call = ToolCall::new("divide", json!({ "a": 3, "b": 3 }).as_object().cloned().unwrap());

        let decision = supervisor.decide(&call, &CallContext::new(), &slot()).await;

        assert_eq!(decision.kind(), DecisionKind::Approve);
        assert_eq!(backend.request_count(), 0);
    }
}
