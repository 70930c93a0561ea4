//! The remote review sub-protocol: submit, poll, fetch, report.
//!
//! A request moves `Pending → Assigned → Completed | Failed | Timeout` on the
//! backend. `ReviewProtocol` drives one side of that lifecycle:
//!
//! - `submit_request` creates the request
//! - `poll_status` checks the status every `poll_interval` until it is
//!   terminal, the deadline passes, or the run is aborted; transient status
//!   failures are retried up to `max_poll_failures` in a row
//! - `fetch_result` maps the backend's result onto a local `Decision`
//! - `submit_result` reports a decision made locally
//!
//! Each wait is an independent future with its own deadline, so any number
//! of reviews can be outstanding on one runtime.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::{interval, timeout, MissedTickBehavior};
use tracing::{debug, info, warn};

use sentinel_contracts::{
    call::ToolCall,
    decision::Decision,
    error::{SentinelError, SentinelResult},
    ids::{RequestId, ResultId},
    remote::{ReviewStatus, SupervisionRequest, SupervisionResult},
};
use sentinel_core::traits::ReviewBackend;

use crate::config::ClientConfig;

// ── AbortSignal ───────────────────────────────────────────────────────────────

/// Run-wide cancellation flag. Clones share the flag.
#[derive(Debug, Clone)]
pub struct AbortSignal {
    tx: Arc<watch::Sender<bool>>,
}

impl Default for AbortSignal {
    fn default() -> Self {
        Self::new()
    }
}

impl AbortSignal {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(false);
        Self { tx: Arc::new(tx) }
    }

    /// Abort the run. Every outstanding poll loop returns `ReviewCancelled`.
    pub fn abort(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_aborted(&self) -> bool {
        *self.tx.borrow()
    }

    /// Resolves once `abort()` has been called.
    pub async fn aborted(&self) {
        let mut rx = self.tx.subscribe();
        loop {
            if *rx.borrow_and_update() {
                return;
            }
            if rx.changed().await.is_err() {
                futures::future::pending::<()>().await;
            }
        }
    }
}

// ── ReviewProtocol ────────────────────────────────────────────────────────────

/// Floor for the status poll period; a zero period would never yield.
const MIN_POLL_INTERVAL: Duration = Duration::from_millis(1);

pub struct ReviewProtocol {
    backend: Arc<dyn ReviewBackend>,
    poll_interval: Duration,
    max_poll_failures: u32,
    abort: AbortSignal,
    abandoned: Mutex<HashSet<RequestId>>,
}

impl ReviewProtocol {
    /// A zero poll interval in `config` is raised to one millisecond.
    pub fn new(backend: Arc<dyn ReviewBackend>, config: &ClientConfig) -> Self {
        let poll_interval = config.poll_interval();
        if poll_interval < MIN_POLL_INTERVAL {
            warn!(
                poll_interval_secs = config.poll_interval_secs,
                "poll interval too small, polling every millisecond"
            );
        }
        Self {
            backend,
            poll_interval: poll_interval.max(MIN_POLL_INTERVAL),
            max_poll_failures: config.max_poll_failures,
            abort: AbortSignal::new(),
            abandoned: Mutex::new(HashSet::new()),
        }
    }

    /// Share `signal` with other protocols of the same run.
    pub fn with_abort_signal(mut self, signal: AbortSignal) -> Self {
        self.abort = signal;
        self
    }

    pub fn abort_signal(&self) -> &AbortSignal {
        &self.abort
    }

    pub fn backend(&self) -> &Arc<dyn ReviewBackend> {
        &self.backend
    }

    /// Create a supervision request on the backend.
    pub async fn submit_request(&self, request: &SupervisionRequest) -> SentinelResult<RequestId> {
        let request_id = self.backend.create_request(request).await?;
        info!(
            request_id = %request_id,
            execution_id = %request.execution_id,
            position = request.position_in_chain,
            "supervision request submitted"
        );
        Ok(request_id)
    }

    /// Wait for the request to reach `Completed`.
    ///
    /// # Errors
    ///
    /// - `ReviewTimedOut` when `limit` elapses first
    /// - `ReviewFailed` when the backend ends the request as `failed` or
    ///   `timeout`
    /// - `ReviewCancelled` when the run is aborted; the request is then
    ///   recorded as abandoned
    /// - `Transport` after more than `max_poll_failures` consecutive failed
    ///   status checks
    pub async fn poll_status(&self, request_id: RequestId, limit: Duration) -> SentinelResult<ReviewStatus> {
        tokio::select! {
            biased;

            _ = self.abort.aborted() => {
                self.abandon(request_id);
                Err(SentinelError::ReviewCancelled { request_id })
            }

            polled = timeout(limit, self.poll_until_terminal(request_id)) => match polled {
                Ok(result) => result,
                Err(_) => {
                    warn!(request_id = %request_id, waited_secs = limit.as_secs(), "review timed out");
                    Err(SentinelError::ReviewTimedOut {
                        request_id,
                        waited_secs: limit.as_secs(),
                    })
                }
            },
        }
    }

    async fn poll_until_terminal(&self, request_id: RequestId) -> SentinelResult<ReviewStatus> {
        let mut ticker = interval(self.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut failures: u32 = 0;

        loop {
            ticker.tick().await;

            match self.backend.get_status(request_id).await {
                Ok(ReviewStatus::Completed) => return Ok(ReviewStatus::Completed),
                Ok(status) if status.is_terminal() => {
                    warn!(request_id = %request_id, status = ?status, "review ended without a result");
                    return Err(SentinelError::ReviewFailed { request_id, status });
                }
                Ok(status) => {
                    failures = 0;
                    debug!(request_id = %request_id, status = ?status, "review still open");
                }
                Err(e) => {
                    failures += 1;
                    if failures > self.max_poll_failures {
                        warn!(request_id = %request_id, failures, "giving up on review status");
                        return Err(e);
                    }
                    warn!(request_id = %request_id, failures, error = %e, "status check failed, retrying");
                }
            }
        }
    }

    /// Fetch the result of a completed request and map it onto a decision
    /// about `call`.
    ///
    /// Results for abandoned requests are ignored.
    pub async fn fetch_result(&self, request_id: RequestId, call: &ToolCall) -> SentinelResult<Decision> {
        if self.is_abandoned(request_id) {
            return Err(SentinelError::ReviewCancelled { request_id });
        }
        let result = self.backend.get_result(request_id).await?;
        Ok(result.into_decision(call))
    }

    /// Submit, wait, and fetch in one step.
    pub async fn review(&self, request: &SupervisionRequest, limit: Duration) -> SentinelResult<Decision> {
        let call = request
            .call()
            .ok_or_else(|| SentinelError::config("supervision request carries no tool request"))?;
        let request_id = self.submit_request(request).await?;
        self.poll_status(request_id, limit).await?;
        self.fetch_result(request_id, &call).await
    }

    /// Report a decision made locally about `call` for `request_id`.
    pub async fn submit_result(
        &self,
        request_id: RequestId,
        call: &ToolCall,
        decision: &Decision,
    ) -> SentinelResult<ResultId> {
        let result = SupervisionResult::from_decision(decision, call);
        let result_id = self.backend.create_result(request_id, &result).await?;
        debug!(request_id = %request_id, result_id = %result_id, decision = %decision.kind(), "result submitted");
        Ok(result_id)
    }

    fn abandon(&self, request_id: RequestId) {
        warn!(request_id = %request_id, "run aborted, abandoning review");
        if let Ok(mut abandoned) = self.abandoned.lock() {
            abandoned.insert(request_id);
        }
    }

    pub fn is_abandoned(&self, request_id: RequestId) -> bool {
        self.abandoned
            .lock()
            .map(|a| a.contains(&request_id))
            .unwrap_or(false)
    }

    /// Requests given up on because the run was aborted.
    pub fn abandoned(&self) -> Vec<RequestId> {
        self.abandoned
            .lock()
            .map(|a| a.iter().copied().collect())
            .unwrap_or_default()
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use serde_json::json;

    use sentinel_contracts::{
        call::{CallContext, ChainSlot, ToolCall},
        decision::{Decision, DecisionKind},
        error::SentinelError,
        remote::{RemoteDecision, ReviewStatus, SupervisionRequest},
    };
    use sentinel_core::traits::ReviewBackend;

    use super::{AbortSignal, ReviewProtocol};
    use crate::{config::ClientConfig, memory::InMemoryBackend};

    fn call() -> ToolCall {
        ToolCall::new("divide", json!({ "a": 1, "b": 0 }).as_object().cloned().unwrap())
    }

    fn request() -> SupervisionRequest {
        let call = call();
        let slot = ChainSlot {
            chain_index: 0,
            position: 0,
            chain_len: 1,
            chain_id: None,
            supervisor_id: None,
        };
        SupervisionRequest::for_call(&call, &CallContext::new(), &slot, 10)
    }

    fn protocol(backend: &Arc<InMemoryBackend>) -> ReviewProtocol {
        let config = ClientConfig {
            poll_interval_secs: 1,
            max_poll_failures: 2,
            ..ClientConfig::new("http://localhost:8000")
        };
        ReviewProtocol::new(backend.clone() as Arc<dyn ReviewBackend>, &config)
    }

    // ── poll_status ───────────────────────────────────────────────────────────

    #[tokio::test(start_paused = true)]
    async fn poll_returns_once_resolved() {
        let backend = Arc::new(InMemoryBackend::new());
        let protocol = protocol(&backend);
        let id = protocol.submit_request(&request()).await.unwrap();

        let reviewer = {
            let backend = backend.clone();
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_secs(3)).await;
                backend.assign(id).unwrap();
                tokio::time::sleep(Duration::from_secs(3)).await;
                backend.resolve_with(id, &Decision::approve("looks fine")).unwrap();
            })
        };

        let status = protocol.poll_status(id, Duration::from_secs(60)).await.unwrap();
        assert_eq!(status, ReviewStatus::Completed);
        assert_eq!(protocol.fetch_result(id, &call()).await.unwrap(), Decision::approve("looks fine"));
        reviewer.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn poll_times_out_when_nobody_answers() {
        let backend = Arc::new(InMemoryBackend::new());
        let protocol = protocol(&backend);
        let id = protocol.submit_request(&request()).await.unwrap();

        let err = protocol.poll_status(id, Duration::from_secs(30)).await.unwrap_err();
        assert!(matches!(err, SentinelError::ReviewTimedOut { waited_secs: 30, .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn transient_status_failures_are_retried() {
        let backend = Arc::new(InMemoryBackend::new());
        let protocol = protocol(&backend);
        let id = protocol.submit_request(&request()).await.unwrap();
        backend.resolve_with(id, &Decision::reject("no")).unwrap();
        backend.fail_next_polls(2);

        let status = protocol.poll_status(id, Duration::from_secs(60)).await.unwrap();
        assert_eq!(status, ReviewStatus::Completed);
    }

    #[tokio::test(start_paused = true)]
    async fn persistent_status_failures_give_up() {
        let backend = Arc::new(InMemoryBackend::new());
        let protocol = protocol(&backend);
        let id = protocol.submit_request(&request()).await.unwrap();
        backend.fail_next_polls(10);

        let err = protocol.poll_status(id, Duration::from_secs(60)).await.unwrap_err();
        assert!(matches!(err, SentinelError::Transport { .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn failed_review_status_is_reported() {
        let backend = Arc::new(InMemoryBackend::new());
        let protocol = protocol(&backend);
        let id = protocol.submit_request(&request()).await.unwrap();
        backend.fail(id, ReviewStatus::Timeout).unwrap();

        let err = protocol.poll_status(id, Duration::from_secs(60)).await.unwrap_err();
        assert!(matches!(
            err,
            SentinelError::ReviewFailed { status: ReviewStatus::Timeout, .. }
        ));
    }

    // ── Cancellation ──────────────────────────────────────────────────────────

    #[tokio::test(start_paused = true)]
    async fn abort_cancels_and_late_results_are_ignored() {
        let backend = Arc::new(InMemoryBackend::new());
        let signal = AbortSignal::new();
        let protocol = Arc::new(protocol(&backend).with_abort_signal(signal.clone()));
        let id = protocol.submit_request(&request()).await.unwrap();

        let waiting = {
            let protocol = protocol.clone();
            tokio::spawn(async move { protocol.poll_status(id, Duration::from_secs(300)).await })
        };

        tokio::time::sleep(Duration::from_secs(5)).await;
        signal.abort();

        let err = waiting.await.unwrap().unwrap_err();
        assert!(matches!(err, SentinelError::ReviewCancelled { .. }));
        assert!(protocol.is_abandoned(id));

        backend.resolve_with(id, &Decision::approve("too late")).unwrap();
        assert!(matches!(
            protocol.fetch_result(id, &call()).await,
            Err(SentinelError::ReviewCancelled { .. })
        ));
    }

    #[tokio::test]
    async fn already_aborted_signal_resolves_immediately() {
        let signal = AbortSignal::new();
        signal.abort();
        assert!(signal.is_aborted());
        signal.aborted().await;
    }

    // ── Results ───────────────────────────────────────────────────────────────

    #[tokio::test]
    async fn unknown_remote_decision_escalates() {
        let backend = Arc::new(InMemoryBackend::new());
        let protocol = protocol(&backend);
        let id = protocol.submit_request(&request()).await.unwrap();
        backend.resolve_raw(id, RemoteDecision::Unknown, "??").unwrap();

        let decision = protocol.fetch_result(id, &call()).await.unwrap();
        assert_eq!(decision.kind(), DecisionKind::Escalate);
    }

    #[tokio::test]
    async fn submitted_result_lands_on_backend() {
        let backend = Arc::new(InMemoryBackend::new());
        let protocol = protocol(&backend);
        let id = protocol.submit_request(&request()).await.unwrap();

        protocol.submit_result(id, &call(), &Decision::approve("rule ok")).await.unwrap();

        let stored = backend.stored(id).unwrap();
        assert_eq!(stored.status, ReviewStatus::Completed);
        assert_eq!(stored.result.unwrap().1.decision, RemoteDecision::Approve);
    }

    #[tokio::test]
    async fn second_result_for_a_request_is_refused() {
        let backend = Arc::new(InMemoryBackend::new());
        let protocol = protocol(&backend);
        let id = protocol.submit_request(&request()).await.unwrap();

        protocol.submit_result(id, &call(), &Decision::approve("first")).await.unwrap();
        let err = protocol
            .submit_result(id, &call(), &Decision::reject("second"))
            .await
            .unwrap_err();

        assert!(matches!(err, SentinelError::Transport { .. }));
        let (_, stored) = backend.stored(id).unwrap().result.unwrap();
        assert_eq!(stored.decision, RemoteDecision::Approve);
        assert_eq!(stored.reasoning, "first");
    }

    #[tokio::test(start_paused = true)]
    async fn review_submits_waits_and_maps_onto_the_call() {
        let backend = Arc::new(InMemoryBackend::new());
        let protocol = Arc::new(protocol(&backend));

        let reviewer = {
            let backend = backend.clone();
            tokio::spawn(async move {
                for (id, _) in backend.wait_pending().await {
                    let fix = json!({ "b": 2 }).as_object().cloned().unwrap();
                    backend.resolve_with(id, &Decision::modify(fix, "use 2")).unwrap();
                }
            })
        };

        let decision = protocol.review(&request(), Duration::from_secs(60)).await.unwrap();
        let modification = decision.modification().unwrap();
        assert_eq!(modification.arguments["b"], json!(2));
        assert_eq!(modification.original, Some(call()));
        reviewer.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn zero_poll_interval_still_polls() {
        let backend = Arc::new(InMemoryBackend::new());
        let config = ClientConfig {
            poll_interval_secs: 0,
            ..ClientConfig::new("http://localhost:8000")
        };
        let protocol = ReviewProtocol::new(backend.clone() as Arc<dyn ReviewBackend>, &config);
        let id = protocol.submit_request(&request()).await.unwrap();

        let err = protocol.poll_status(id, Duration::from_secs(1)).await.unwrap_err();
        assert!(matches!(err, SentinelError::ReviewTimedOut { .. }));

        backend.resolve_with(id, &Decision::approve("ok")).unwrap();
        let status = protocol.poll_status(id, Duration::from_secs(1)).await.unwrap();
        assert_eq!(status, ReviewStatus::Completed);
    }
}
