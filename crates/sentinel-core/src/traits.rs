//! Core trait definitions for the Sentinel supervision pipeline.
//!
//! These traits define the complete trust boundary:
//!
//! - `Tool`                : the guarded callable (untrusted side effects)
//! - `Supervisor`          : a decision maker consulted before the tool runs
//! - `ReviewBackend`       : remote store of supervision requests and results
//! - `RegistrationBackend` : remote registry of runs, tools, and supervisors
//! - `DecisionLog`         : trusted local sink recording every decision
//! - `MockStrategy`        : produces synthetic results for mocked calls
//!
//! The guard wires them together. `Tool::invoke()` is never called unless
//! every configured chain ends in Approve or Modify.

use async_trait::async_trait;
use serde_json::Value;

use sentinel_contracts::{
    call::{Arguments, CallContext, ChainSlot, ToolCall},
    decision::Decision,
    error::SentinelResult,
    ids::{ChainId, ExecutionId, RequestId, ResultId, RunId, SupervisorId, ToolId},
    mock::MockPolicy,
    record::DecisionRecord,
    remote::{
        ReviewStatus, SupervisionRequest, SupervisionResult, SupervisorKind, SupervisorSpec,
        ToolSpec,
    },
};

/// A decision maker consulted about pending tool calls.
///
/// `decide()` is infallible by contract: implementations backed by I/O must
/// turn transport failures and timeouts into `Decision::Escalate` with an
/// explanation instead of surfacing an error to the evaluator.
#[async_trait]
pub trait Supervisor: Send + Sync {
    /// Stable identity. Two supervisors with the same name are the same
    /// supervisor as far as duplicate suppression and registration go.
    fn name(&self) -> &str;

    fn description(&self) -> &str {
        ""
    }

    fn kind(&self) -> SupervisorKind;

    /// Source or configuration shown to reviewers at registration time.
    fn code(&self) -> Option<String> {
        None
    }

    /// Decide about `call`, consulted at `slot` of the chain set.
    async fn decide(&self, call: &ToolCall, ctx: &CallContext, slot: &ChainSlot) -> Decision;

    /// Registration payload for this supervisor.
    fn spec(&self) -> SupervisorSpec {
        SupervisorSpec {
            name: self.name().to_string(),
            description: self.description().to_string(),
            kind: self.kind(),
            code: self.code(),
        }
    }
}

/// A callable that can be placed behind a guard.
#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &str;

    fn description(&self) -> &str {
        ""
    }

    /// JSON Schema of the parameters.
    fn schema(&self) -> Option<Value> {
        None
    }

    /// JSON Schema of the return value. Required by `MockPolicy::Random`.
    fn returns(&self) -> Option<Value> {
        None
    }

    /// Run the tool for real.
    async fn invoke(&self, arguments: Arguments) -> SentinelResult<Value>;

    /// Registration payload for this tool.
    fn spec(&self) -> ToolSpec {
        ToolSpec {
            name: self.name().to_string(),
            description: self.description().to_string(),
            schema: self.schema().unwrap_or(Value::Null),
        }
    }
}

/// Remote storage for supervision requests and their results.
///
/// Every method may fail with `SentinelError::Transport`; callers inside a
/// supervisor must map that to a decision.
#[async_trait]
pub trait ReviewBackend: Send + Sync {
    async fn create_request(&self, request: &SupervisionRequest) -> SentinelResult<RequestId>;

    async fn get_status(&self, request_id: RequestId) -> SentinelResult<ReviewStatus>;

    async fn get_result(&self, request_id: RequestId) -> SentinelResult<SupervisionResult>;

    async fn create_result(
        &self,
        request_id: RequestId,
        result: &SupervisionResult,
    ) -> SentinelResult<ResultId>;
}

/// Remote registry of runs, tools, supervisors, and chain assignments.
///
/// Used once at setup; never consulted while calls are being supervised.
#[async_trait]
pub trait RegistrationBackend: Send + Sync {
    async fn create_run(&self, name: &str) -> SentinelResult<RunId>;

    async fn register_tool(&self, run_id: RunId, spec: &ToolSpec) -> SentinelResult<ToolId>;

    async fn register_supervisor(&self, spec: &SupervisorSpec) -> SentinelResult<SupervisorId>;

    /// Assign ordered chains of supervisors to a tool. Returns one chain id
    /// per chain, in order.
    async fn assign_supervisors(
        &self,
        run_id: RunId,
        tool_id: ToolId,
        chains: &[Vec<SupervisorId>],
    ) -> SentinelResult<Vec<ChainId>>;
}

/// The local decision log: the immutable record of every supervisor answer.
///
/// A failed write is fatal to the call being supervised.
pub trait DecisionLog: Send + Sync {
    /// Append one record. Records are never modified or deleted.
    fn record(&self, record: &DecisionRecord) -> SentinelResult<()>;

    /// Mark one intercepted call as fully evaluated.
    fn finalize(&self, execution_id: &ExecutionId) -> SentinelResult<()>;
}

/// Produces the value a mocked call returns instead of running the tool.
#[async_trait]
pub trait MockStrategy: Send + Sync {
    /// `returns` is the tool's declared return schema, if any.
    async fn synthesize(
        &self,
        policy: &MockPolicy,
        call: &ToolCall,
        returns: Option<&Value>,
    ) -> SentinelResult<Value>;
}
