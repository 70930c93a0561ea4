//! In-memory supervision backend.
//!
//! `InMemoryBackend` implements both backend traits without a network and
//! exposes the reviewer's side of the protocol (`pending`, `assign`,
//! `resolve`, `fail`) so tests and the demo can play the human. Failure
//! injection (`fail_next_polls`, `set_unreachable`) exercises the protocol's
//! retry and escalation paths.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::watch;
use tracing::debug;

use sentinel_contracts::{
    decision::Decision,
    error::{SentinelError, SentinelResult},
    ids::{ChainId, RequestId, ResultId, RunId, SupervisorId, ToolId},
    remote::{
        RemoteDecision, ReviewStatus, SupervisionRequest, SupervisionResult, SupervisorSpec,
        ToolRequest, ToolSpec,
    },
};
use sentinel_core::traits::{RegistrationBackend, ReviewBackend};

/// One request as the backend stores it.
#[derive(Debug, Clone)]
pub struct StoredRequest {
    pub request: SupervisionRequest,
    pub status: ReviewStatus,
    pub result: Option<(ResultId, SupervisionResult)>,
}

#[derive(Debug, Clone)]
pub struct StoredRun {
    pub name: String,
    pub tools: BTreeMap<ToolId, ToolSpec>,
    pub chains: HashMap<ToolId, Vec<(ChainId, Vec<SupervisorId>)>>,
}

#[derive(Default)]
struct State {
    runs: HashMap<RunId, StoredRun>,
    supervisors: HashMap<SupervisorId, SupervisorSpec>,
    requests: HashMap<RequestId, StoredRequest>,
    /// Creation order, for stable `pending()` output.
    order: Vec<RequestId>,
}

pub struct InMemoryBackend {
    state: Mutex<State>,
    created: watch::Sender<u64>,
    failing_polls: AtomicUsize,
    unreachable: AtomicBool,
}

impl Default for InMemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryBackend {
    pub fn new() -> Self {
        let (created, _) = watch::channel(0);
        Self {
            state: Mutex::new(State::default()),
            created,
            failing_polls: AtomicUsize::new(0),
            unreachable: AtomicBool::new(false),
        }
    }

    fn lock(&self) -> SentinelResult<MutexGuard<'_, State>> {
        self.state
            .lock()
            .map_err(|e| SentinelError::transport(format!("backend state poisoned: {}", e)))
    }

    fn check_reachable(&self) -> SentinelResult<()> {
        if self.unreachable.load(Ordering::SeqCst) {
            return Err(SentinelError::transport("backend unreachable"));
        }
        Ok(())
    }

    // ── Failure injection ─────────────────────────────────────────────────────

    /// Make every call fail with a transport error until cleared.
    pub fn set_unreachable(&self, unreachable: bool) {
        self.unreachable.store(unreachable, Ordering::SeqCst);
    }

    /// Fail the next `n` status checks with a transport error.
    pub fn fail_next_polls(&self, n: usize) {
        self.failing_polls.store(n, Ordering::SeqCst);
    }

    // ── Reviewer side ─────────────────────────────────────────────────────────

    /// Requests awaiting a reviewer, oldest first.
    pub fn pending(&self) -> Vec<(RequestId, SupervisionRequest)> {
        let Ok(state) = self.lock() else {
            return Vec::new();
        };
        state
            .order
            .iter()
            .filter_map(|id| {
                let stored = state.requests.get(id)?;
                (!stored.status.is_terminal()).then(|| (*id, stored.request.clone()))
            })
            .collect()
    }

    /// Wait until at least one request is pending, then return them all.
    pub async fn wait_pending(&self) -> Vec<(RequestId, SupervisionRequest)> {
        let mut created = self.created.subscribe();
        loop {
            let pending = self.pending();
            if !pending.is_empty() {
                return pending;
            }
            if created.changed().await.is_err() {
                return Vec::new();
            }
        }
    }

    /// A reviewer picked the request up.
    pub fn assign(&self, request_id: RequestId) -> SentinelResult<()> {
        let mut state = self.lock()?;
        let stored = stored_mut(&mut state, request_id)?;
        if stored.status == ReviewStatus::Pending {
            stored.status = ReviewStatus::Assigned;
        }
        Ok(())
    }

    /// A reviewer decided. The request becomes `Completed`.
    ///
    /// A request is resolved at most once; later results are refused.
    pub fn resolve(&self, request_id: RequestId, result: SupervisionResult) -> SentinelResult<ResultId> {
        let mut state = self.lock()?;
        let stored = stored_mut(&mut state, request_id)?;
        if stored.result.is_some() || stored.status.is_terminal() {
            return Err(SentinelError::transport(format!(
                "request {} already resolved ({:?})",
                request_id, stored.status
            )));
        }
        let result_id = ResultId::new();
        stored.status = ReviewStatus::Completed;
        stored.result = Some((result_id, result));
        debug!(request_id = %request_id, "review resolved");
        Ok(result_id)
    }

    /// Resolve with a local `Decision` about the request's call, as a
    /// reviewer UI would.
    pub fn resolve_with(&self, request_id: RequestId, decision: &Decision) -> SentinelResult<ResultId> {
        let call = self
            .request(request_id)
            .and_then(|request| request.call())
            .ok_or_else(|| SentinelError::transport(format!("request {} has no tool call", request_id)))?;
        self.resolve(request_id, SupervisionResult::from_decision(decision, &call))
    }

    /// Resolve with a raw remote decision value and no payload.
    pub fn resolve_raw(&self, request_id: RequestId, decision: RemoteDecision, reasoning: &str) -> SentinelResult<ResultId> {
        self.resolve(
            request_id,
            SupervisionResult {
                decision,
                reasoning: reasoning.to_string(),
                modified_tool_request: None::<ToolRequest>,
                created_at: Utc::now(),
            },
        )
    }

    /// End the request without a result (`Failed` or `Timeout`).
    pub fn fail(&self, request_id: RequestId, status: ReviewStatus) -> SentinelResult<()> {
        let mut state = self.lock()?;
        stored_mut(&mut state, request_id)?.status = status;
        Ok(())
    }

    // ── Inspection ────────────────────────────────────────────────────────────

    pub fn request(&self, request_id: RequestId) -> Option<SupervisionRequest> {
        self.lock()
            .ok()?
            .requests
            .get(&request_id)
            .map(|s| s.request.clone())
    }

    pub fn stored(&self, request_id: RequestId) -> Option<StoredRequest> {
        self.lock().ok()?.requests.get(&request_id).cloned()
    }

    pub fn request_count(&self) -> usize {
        self.lock().map(|s| s.requests.len()).unwrap_or(0)
    }

    /// Every result on record, in request creation order.
    pub fn results(&self) -> Vec<(RequestId, SupervisionResult)> {
        let Ok(state) = self.lock() else {
            return Vec::new();
        };
        state
            .order
            .iter()
            .filter_map(|id| {
                let (_, result) = state.requests.get(id)?.result.as_ref()?;
                Some((*id, result.clone()))
            })
            .collect()
    }

    pub fn run(&self, run_id: RunId) -> Option<StoredRun> {
        self.lock().ok()?.runs.get(&run_id).cloned()
    }

    pub fn supervisor(&self, supervisor_id: SupervisorId) -> Option<SupervisorSpec> {
        self.lock().ok()?.supervisors.get(&supervisor_id).cloned()
    }
}

fn stored_mut(state: &mut State, request_id: RequestId) -> SentinelResult<&mut StoredRequest> {
    state
        .requests
        .get_mut(&request_id)
        .ok_or_else(|| SentinelError::transport(format!("unknown supervision request {}", request_id)))
}

#[async_trait]
impl ReviewBackend for InMemoryBackend {
    async fn create_request(&self, request: &SupervisionRequest) -> SentinelResult<RequestId> {
        self.check_reachable()?;
        let id = RequestId::new();
        {
            let mut state = self.lock()?;
            state.requests.insert(
                id,
                StoredRequest {
                    request: request.clone(),
                    status: ReviewStatus::Pending,
                    result: None,
                },
            );
            state.order.push(id);
        }
        self.created.send_modify(|n| *n += 1);
        Ok(id)
    }

    async fn get_status(&self, request_id: RequestId) -> SentinelResult<ReviewStatus> {
        self.check_reachable()?;
        let injected = self
            .failing_polls
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if injected {
            return Err(SentinelError::transport("injected status failure"));
        }
        let mut state = self.lock()?;
        Ok(stored_mut(&mut state, request_id)?.status)
    }

    async fn get_result(&self, request_id: RequestId) -> SentinelResult<SupervisionResult> {
        self.check_reachable()?;
        let mut state = self.lock()?;
        stored_mut(&mut state, request_id)?
            .result
            .as_ref()
            .map(|(_, result)| result.clone())
            .ok_or_else(|| SentinelError::transport(format!("request {} has no result", request_id)))
    }

    async fn create_result(
        &self,
        request_id: RequestId,
        result: &SupervisionResult,
    ) -> SentinelResult<ResultId> {
        self.check_reachable()?;
        self.resolve(request_id, result.clone())
    }
}

#[async_trait]
impl RegistrationBackend for InMemoryBackend {
    async fn create_run(&self, name: &str) -> SentinelResult<RunId> {
        self.check_reachable()?;
        let id = RunId::new();
        self.lock()?.runs.insert(
            id,
            StoredRun {
                name: name.to_string(),
                tools: BTreeMap::new(),
                chains: HashMap::new(),
            },
        );
        Ok(id)
    }

    async fn register_tool(&self, run_id: RunId, spec: &ToolSpec) -> SentinelResult<ToolId> {
        self.check_reachable()?;
        let id = ToolId::new();
        let mut state = self.lock()?;
        let run = state
            .runs
            .get_mut(&run_id)
            .ok_or_else(|| SentinelError::transport(format!("unknown run {}", run_id)))?;
        run.tools.insert(id, spec.clone());
        Ok(id)
    }

    async fn register_supervisor(&self, spec: &SupervisorSpec) -> SentinelResult<SupervisorId> {
        self.check_reachable()?;
        let id = SupervisorId::new();
        self.lock()?.supervisors.insert(id, spec.clone());
        Ok(id)
    }

    async fn assign_supervisors(
        &self,
        run_id: RunId,
        tool_id: ToolId,
        chains: &[Vec<SupervisorId>],
    ) -> SentinelResult<Vec<ChainId>> {
        self.check_reachable()?;
        let mut state = self.lock()?;
        let run = state
            .runs
            .get_mut(&run_id)
            .ok_or_else(|| SentinelError::transport(format!("unknown run {}", run_id)))?;
        let assigned: Vec<(ChainId, Vec<SupervisorId>)> = chains
            .iter()
            .map(|chain| (ChainId::new(), chain.clone()))
            .collect();
        let ids = assigned.iter().map(|(id, _)| *id).collect();
        run.chains.insert(tool_id, assigned);
        Ok(ids)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use sentinel_contracts::{
        call::{CallContext, ChainSlot, ToolCall},
        decision::Decision,
        error::SentinelError,
        remote::{RemoteDecision, ReviewStatus, SupervisionRequest},
    };
    use sentinel_core::traits::ReviewBackend;

    use super::InMemoryBackend;

    fn request() -> SupervisionRequest {
        let call = ToolCall::new("divide", json!({ "a": 1, "b": 0 }).as_object().cloned().unwrap());
        let slot = ChainSlot {
            chain_index: 0,
            position: 0,
            chain_len: 1,
            chain_id: None,
            supervisor_id: None,
        };
        SupervisionRequest::for_call(&call, &CallContext::new(), &slot, 10)
    }

    #[tokio::test]
    async fn results_are_immutable_once_written() {
        let backend = InMemoryBackend::new();
        let id = backend.create_request(&request()).await.unwrap();

        backend.resolve_with(id, &Decision::approve("first")).unwrap();
        let err = backend.resolve_with(id, &Decision::reject("second")).unwrap_err();

        assert!(matches!(err, SentinelError::Transport { .. }));
        assert_eq!(backend.results().len(), 1);
        assert_eq!(backend.results()[0].1.decision, RemoteDecision::Approve);
    }

    #[tokio::test]
    async fn failed_request_takes_no_result() {
        let backend = InMemoryBackend::new();
        let id = backend.create_request(&request()).await.unwrap();
        backend.fail(id, ReviewStatus::Failed).unwrap();

        assert!(backend.resolve_raw(id, RemoteDecision::Approve, "late").is_err());
        assert_eq!(backend.stored(id).unwrap().status, ReviewStatus::Failed);
    }

    #[tokio::test]
    async fn reviewer_modification_names_the_requested_tool() {
        let backend = InMemoryBackend::new();
        let id = backend.create_request(&request()).await.unwrap();
        let fix = json!({ "b": 1 }).as_object().cloned().unwrap();

        backend.resolve_with(id, &Decision::modify(fix, "use 1")).unwrap();

        let (_, result) = backend.stored(id).unwrap().result.unwrap();
        assert_eq!(result.modified_tool_request.unwrap().tool, "divide");
    }
}
