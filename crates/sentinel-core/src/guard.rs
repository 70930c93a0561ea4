//! Call interception: wrapping a tool so every call is supervised first.
//!
//! `guard()` is done once, at setup; the returned `GuardedTool` is what the
//! agent calls. Each call:
//!
//!   1. builds the `ToolCall` and fills the run id into the context
//!   2. short-circuits to a synthetic value if a mock policy is active
//!   3. resolves and evaluates the tool's chain set
//!   4. runs the tool, returns a refusal string, or returns `Terminated`

use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use futures::future::{BoxFuture, FutureExt};
use serde_json::Value;
use tracing::{debug, info, warn};

use sentinel_contracts::{
    call::{Arguments, CallContext, ToolCall},
    error::{SentinelError, SentinelResult},
    mock::MockPolicy,
};

use crate::{config::SupervisionConfig, evaluator::Verdict, traits::Tool};

/// What a guarded call produced.
#[derive(Debug, Clone, PartialEq)]
pub enum CallOutcome {
    /// The tool ran (possibly with modified arguments) and returned this.
    Executed(Value),
    /// A mock policy supplied this value; the tool did not run.
    Mocked(Value),
    /// Supervision blocked the call. The text is meant to be handed back to
    /// the agent as feedback.
    Refused(String),
}

impl CallOutcome {
    /// The value returned to the agent: the tool or mock result, or the
    /// refusal text as a JSON string.
    pub fn into_value(self) -> Value {
        match self {
            CallOutcome::Executed(v) | CallOutcome::Mocked(v) => v,
            CallOutcome::Refused(text) => Value::String(text),
        }
    }

    pub fn is_refused(&self) -> bool {
        matches!(self, CallOutcome::Refused(_))
    }
}

/// A tool placed behind the supervision configuration.
pub struct GuardedTool {
    tool: Arc<dyn Tool>,
    config: Arc<SupervisionConfig>,
    sample_cursor: AtomicUsize,
}

/// Wrap `tool` so that every call goes through `config`.
pub fn guard(tool: Arc<dyn Tool>, config: Arc<SupervisionConfig>) -> GuardedTool {
    GuardedTool {
        tool,
        config,
        sample_cursor: AtomicUsize::new(0),
    }
}

impl GuardedTool {
    pub fn name(&self) -> &str {
        self.tool.name()
    }

    /// Call the tool under supervision.
    ///
    /// # Errors
    ///
    /// - `Terminated` when a supervisor ended the run
    /// - `Config` when the mock policy cannot be honored
    /// - `DecisionLogFailed` when a decision could not be recorded
    /// - whatever the tool itself returns when it ran and failed
    pub async fn call(&self, arguments: Arguments, mut ctx: CallContext) -> SentinelResult<CallOutcome> {
        if ctx.run_id.is_none() {
            ctx.run_id = self.config.run_id();
        }

        let call = ToolCall {
            tool: self.tool.name().to_string(),
            arguments,
            description: self.tool.description().to_string(),
            schema: self.tool.schema(),
        };

        // ── Mock policy ──────────────────────────────────────────────────────
        let policy = self.config.mock_policy(&call.tool);
        if policy.is_mocked() {
            let value = self.mock(policy, &call).await?;
            debug!(
                execution_id = %ctx.execution_id,
                tool = %call.tool,
                "mock policy active, tool not executed"
            );
            return Ok(CallOutcome::Mocked(value));
        }

        // ── Supervision ──────────────────────────────────────────────────────
        let chains = self.config.chain_set(&call.tool);
        let ignored = self.config.ignored_attributes(&call.tool);
        let verdict = self
            .config
            .evaluator()
            .evaluate(&chains, &call, &ctx, &ignored)
            .await?;

        match verdict {
            Verdict::Unsupervised => self.execute(call.arguments).await,

            Verdict::Proceed { arguments, .. } => {
                info!(
                    execution_id = %ctx.execution_id,
                    tool = %call.tool,
                    modified = arguments != call.arguments,
                    "call approved"
                );
                self.execute(arguments).await
            }

            Verdict::Refused { explanation } => {
                info!(
                    execution_id = %ctx.execution_id,
                    tool = %call.tool,
                    "call refused"
                );
                Ok(CallOutcome::Refused(format!(
                    "The call to '{}' was blocked by its supervisors and did not run. {}",
                    call.tool, explanation
                )))
            }

            Verdict::Terminated { explanation } => Err(SentinelError::Terminated {
                tool: call.tool,
                explanation,
            }),
        }
    }

    async fn execute(&self, arguments: Arguments) -> SentinelResult<CallOutcome> {
        self.tool.invoke(arguments).await.map(CallOutcome::Executed)
    }

    async fn mock(&self, policy: &MockPolicy, call: &ToolCall) -> SentinelResult<Value> {
        match policy {
            MockPolicy::NoMock => Err(SentinelError::config("mock requested without a mock policy")),

            MockPolicy::Sample { values } => {
                if values.is_empty() {
                    return Err(SentinelError::config(format!(
                        "sample mock policy for '{}' has no values",
                        call.tool
                    )));
                }
                let index = self.sample_cursor.fetch_add(1, Ordering::Relaxed) % values.len();
                Ok(values[index].clone())
            }

            MockPolicy::Random | MockPolicy::Synthesize | MockPolicy::Replay => {
                let returns = self.tool.returns();
                if matches!(policy, MockPolicy::Random) && returns.is_none() {
                    return Err(SentinelError::config(format!(
                        "random mock policy for '{}' needs a declared return schema",
                        call.tool
                    )));
                }
                let strategy = self.config.mock_strategy().ok_or_else(|| {
                    warn!(tool = %call.tool, "mock policy set without a mock strategy");
                    SentinelError::config(format!(
                        "mock policy for '{}' requires a mock strategy",
                        call.tool
                    ))
                })?;
                strategy.synthesize(policy, call, returns.as_ref()).await
            }
        }
    }
}

// ── Closure-backed tools ─────────────────────────────────────────────────────

type ToolFn = dyn Fn(Arguments) -> BoxFuture<'static, SentinelResult<Value>> + Send + Sync;

/// A `Tool` backed by an async closure.
pub struct FnTool {
    name: String,
    description: String,
    schema: Option<Value>,
    returns: Option<Value>,
    func: Box<ToolFn>,
}

/// Build a tool from a name and an async closure.
pub fn tool_fn<F, Fut>(name: impl Into<String>, func: F) -> FnTool
where
    F: Fn(Arguments) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = SentinelResult<Value>> + Send + 'static,
{
    FnTool {
        name: name.into(),
        description: String::new(),
        schema: None,
        returns: None,
        func: Box::new(move |args| func(args).boxed()),
    }
}

impl FnTool {
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_schema(mut self, schema: Value) -> Self {
        self.schema = Some(schema);
        self
    }

    pub fn with_returns(mut self, returns: Value) -> Self {
        self.returns = Some(returns);
        self
    }
}

#[async_trait]
impl Tool for FnTool {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn schema(&self) -> Option<Value> {
        self.schema.clone()
    }

    fn returns(&self) -> Option<Value> {
        self.returns.clone()
    }

    async fn invoke(&self, arguments: Arguments) -> SentinelResult<Value> {
        (self.func)(arguments).await
    }
}

// ── Tests ────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;
    use serde_json::{json, Value};

    use sentinel_contracts::{
        call::{Arguments, CallContext, ChainSlot, ToolCall},
        decision::Decision,
        error::{SentinelError, SentinelResult},
        mock::MockPolicy,
        remote::SupervisorKind,
    };

    use crate::chain::SupervisorRef;
    use crate::config::SupervisionConfig;
    use crate::traits::{MockStrategy, Supervisor, Tool};

    use super::{guard, tool_fn, CallOutcome, FnTool};

    /// Approves when `b > min_b`, escalates otherwise.
    struct MinB(f64);

    #[async_trait]
    impl Supervisor for MinB {
        fn name(&self) -> &str {
            "min-b"
        }

        fn kind(&self) -> SupervisorKind {
            SupervisorKind::Rule
        }

        async fn decide(&self, call: &ToolCall, _ctx: &CallContext, _slot: &ChainSlot) -> Decision {
            match call.argument("b").and_then(Value::as_f64) {
                Some(b) if b > self.0 => Decision::approve("b is positive"),
                _ => Decision::escalate("b<=0"),
            }
        }
    }

    struct Fixed(&'static str, Decision);

    #[async_trait]
    impl Supervisor for Fixed {
        fn name(&self) -> &str {
            self.0
        }

        fn kind(&self) -> SupervisorKind {
            SupervisorKind::Rule
        }

        async fn decide(&self, _call: &ToolCall, _ctx: &CallContext, _slot: &ChainSlot) -> Decision {
            self.1.clone()
        }
    }

    fn args(value: Value) -> Arguments {
        value.as_object().cloned().unwrap()
    }

    /// `divide(a, b)` that records every argument set it was invoked with.
    fn divide(seen: Arc<Mutex<Vec<Arguments>>>) -> FnTool {
        tool_fn("divide", move |arguments: Arguments| {
            let seen = Arc::clone(&seen);
            async move {
                seen.lock().unwrap().push(arguments.clone());
                let a = arguments.get("a").and_then(Value::as_f64).unwrap_or(0.0);
                let b = arguments.get("b").and_then(Value::as_f64).unwrap_or(1.0);
                Ok::<_, SentinelError>(json!(a / b))
            }
        })
        .with_description("divide a by b")
    }

    fn sup(s: impl Supervisor + 'static) -> SupervisorRef {
        Arc::new(s)
    }

    struct EchoStrategy;

    #[async_trait]
    impl MockStrategy for EchoStrategy {
        async fn synthesize(
            &self,
            _policy: &MockPolicy,
            call: &ToolCall,
            _returns: Option<&Value>,
        ) -> SentinelResult<Value> {
            Ok(json!({ "mocked": call.tool }))
        }
    }

    // ── Supervised execution ─────────────────────────────────────────────────

    #[tokio::test]
    async fn approved_call_executes() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let config = SupervisionConfig::builder()
            .configure("divide", vec![vec![sup(MinB(0.0))]], Vec::<String>::new())
            .build()
            .unwrap();
        let guarded = guard(Arc::new(divide(seen.clone())), Arc::new(config));

        let outcome = guarded
            .call(args(json!({ "a": 10, "b": 2 })), CallContext::new())
            .await
            .unwrap();

        assert_eq!(outcome, CallOutcome::Executed(json!(5.0)));
        assert_eq!(seen.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn exhausted_escalation_returns_refusal_text() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let config = SupervisionConfig::builder()
            .configure("divide", vec![vec![sup(MinB(0.0))]], Vec::<String>::new())
            .build()
            .unwrap();
        let guarded = guard(Arc::new(divide(seen.clone())), Arc::new(config));

        let outcome = guarded
            .call(args(json!({ "a": 10, "b": -1 })), CallContext::new())
            .await
            .unwrap();

        match outcome {
            CallOutcome::Refused(text) => {
                assert!(text.contains("divide"));
                assert!(text.contains("b<=0"));
            }
            other => panic!("expected refusal, got {:?}", other),
        }
        assert!(seen.lock().unwrap().is_empty(), "refused call must not run");
    }

    #[tokio::test]
    async fn modified_arguments_reach_the_tool() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let fix = Fixed("fix-b", Decision::modify(args(json!({ "b": 5, "a": 99 })), "b too small"));
        let config = SupervisionConfig::builder()
            .configure("divide", vec![vec![sup(fix)]], ["a"])
            .build()
            .unwrap();
        let guarded = guard(Arc::new(divide(seen.clone())), Arc::new(config));

        let outcome = guarded
            .call(args(json!({ "a": 10, "b": 0 })), CallContext::new())
            .await
            .unwrap();

        assert_eq!(outcome, CallOutcome::Executed(json!(2.0)));
        assert_eq!(seen.lock().unwrap()[0], args(json!({ "a": 10, "b": 5 })));
    }

    #[tokio::test]
    async fn unsupervised_tool_runs_with_original_arguments() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let config = SupervisionConfig::builder().build().unwrap();
        let guarded = guard(Arc::new(divide(seen.clone())), Arc::new(config));

        let outcome = guarded
            .call(args(json!({ "a": 9, "b": 3 })), CallContext::new())
            .await
            .unwrap();

        assert_eq!(outcome, CallOutcome::Executed(json!(3.0)));
        assert_eq!(seen.lock().unwrap()[0], args(json!({ "a": 9, "b": 3 })));
    }

    #[tokio::test]
    async fn terminate_surfaces_as_terminal_error() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let stop = Fixed("kill-switch", Decision::terminate("agent is looping"));
        let config = SupervisionConfig::builder()
            .configure("divide", vec![vec![sup(stop)]], Vec::<String>::new())
            .build()
            .unwrap();
        let guarded = guard(Arc::new(divide(seen.clone())), Arc::new(config));

        let err = guarded
            .call(args(json!({ "a": 1, "b": 1 })), CallContext::new())
            .await
            .unwrap_err();

        assert!(err.is_terminal());
        assert!(err.to_string().contains("agent is looping"));
        assert!(seen.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn tool_failure_after_approval_is_returned() {
        let failing = tool_fn("divide", |_args: Arguments| async {
            Err::<Value, _>(SentinelError::ToolFailed {
                tool: "divide".to_string(),
                reason: "division by zero".to_string(),
            })
        });
        let config = SupervisionConfig::builder().build().unwrap();
        let guarded = guard(Arc::new(failing), Arc::new(config));

        let err = guarded.call(Arguments::new(), CallContext::new()).await.unwrap_err();
        assert!(matches!(err, SentinelError::ToolFailed { .. }));
    }

    // ── Mock policy ──────────────────────────────────────────────────────────

    #[tokio::test]
    async fn sample_policy_cycles_and_skips_supervision() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let config = SupervisionConfig::builder()
            .configure(
                "divide",
                vec![vec![sup(Fixed("veto", Decision::reject("never")))]],
                Vec::<String>::new(),
            )
            .mock_policy(MockPolicy::Sample {
                values: vec![json!(1), json!(2)],
            })
            .build()
            .unwrap();
        let guarded = guard(Arc::new(divide(seen.clone())), Arc::new(config));

        let mut values = Vec::new();
        for _ in 0..3 {
            let outcome = guarded.call(Arguments::new(), CallContext::new()).await.unwrap();
            values.push(outcome.into_value());
        }

        assert_eq!(values, vec![json!(1), json!(2), json!(1)]);
        assert!(seen.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn empty_sample_list_is_a_config_error() {
        let config = SupervisionConfig::builder()
            .mock_policy(MockPolicy::Sample { values: Vec::new() })
            .build()
            .unwrap();
        let guarded = guard(Arc::new(divide(Arc::default())), Arc::new(config));

        let err = guarded.call(Arguments::new(), CallContext::new()).await.unwrap_err();
        assert!(matches!(err, SentinelError::Config { .. }));
    }

    #[tokio::test]
    async fn random_policy_requires_return_schema() {
        let config = SupervisionConfig::builder()
            .mock_policy(MockPolicy::Random)
            .mock_strategy(Arc::new(EchoStrategy))
            .build()
            .unwrap();
        let guarded = guard(Arc::new(divide(Arc::default())), Arc::new(config));

        let err = guarded.call(Arguments::new(), CallContext::new()).await.unwrap_err();
        match err {
            SentinelError::Config { reason } => assert!(reason.contains("return schema")),
            other => panic!("expected Config, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn synthesize_policy_without_strategy_is_a_config_error() {
        let config = SupervisionConfig::builder()
            .tool_mock_policy("divide", MockPolicy::Synthesize)
            .build()
            .unwrap();
        let guarded = guard(Arc::new(divide(Arc::default())), Arc::new(config));

        let err = guarded.call(Arguments::new(), CallContext::new()).await.unwrap_err();
        assert!(matches!(err, SentinelError::Config { .. }));
    }

    #[tokio::test]
    async fn strategy_supplies_mocked_value() {
        let tool = divide(Arc::default()).with_returns(json!({ "type": "number" }));
        let config = SupervisionConfig::builder()
            .mock_policy(MockPolicy::Random)
            .mock_strategy(Arc::new(EchoStrategy))
            .build()
            .unwrap();
        let guarded = guard(Arc::new(tool), Arc::new(config));

        let outcome = guarded.call(Arguments::new(), CallContext::new()).await.unwrap();
        assert_eq!(outcome, CallOutcome::Mocked(json!({ "mocked": "divide" })));
    }

    #[test]
    fn tool_spec_carries_description() {
        let tool = divide(Arc::default()).with_schema(json!({ "type": "object" }));
        let spec = tool.spec();
        assert_eq!(spec.name, "divide");
        assert_eq!(spec.description, "divide a by b");
        assert_eq!(spec.schema, json!({ "type": "object" }));
    }
}
