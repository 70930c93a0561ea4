//! Scenario 3: Escalation to a human reviewer
//!
//! The chain is [min-b (reported), on-call]. The run is registered with an
//! in-process review backend, and a background task plays the reviewer:
//!
//! Case A: divide(12, -4) → min-b escalates, the reviewer flips the sign
//! Case B: divide(12, 0)  → min-b escalates, the reviewer rejects
//! Case C: divide(12, -1) → the reviewer has left; the review times out and
//!                           the exhausted chain refuses the call
//!
//! Swap `InMemoryBackend` for `HttpBackend::from_env()` to talk to a real
//! review server.

use std::sync::Arc;
use std::time::Duration;

use serde_json::{json, Value};
use tracing::{info, warn};

use sentinel_contracts::{
    call::{Arguments, CallContext},
    decision::Decision,
    error::SentinelResult,
    ids::SupervisorId,
};
use sentinel_core::{guard, traits::{ReviewBackend, Tool}, SupervisionConfig, SupervisorRef};
use sentinel_review::{
    ClientConfig, HumanSupervisor, InMemoryBackend, Reported, ReviewConsole, ReviewProtocol,
};
use sentinel_rules::RuleSupervisor;

use super::{divide::MIN_B, show};
use crate::tools::{args, divide};

/// What the simulated reviewer does with an escalated division.
fn review(arguments: &Arguments) -> Decision {
    match arguments.get("b").and_then(Value::as_f64) {
        Some(b) if b < 0.0 => {
            let mut fixed = arguments.clone();
            fixed.insert("b".to_string(), json!(-b));
            Decision::modify(fixed, "negative divisor was a sign error")
        }
        _ => Decision::reject("division by zero is never intended"),
    }
}

/// Answer every pending request addressed to `reviewer_id`. Requests from
/// reported rule supervisors are resolved by their own reports.
fn spawn_reviewer(backend: Arc<InMemoryBackend>, reviewer_id: Option<SupervisorId>) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            let mut answered = false;
            for (id, request) in backend.wait_pending().await {
                if request.supervisor_id != reviewer_id {
                    continue;
                }
                let decision = match request.tool_requests.first() {
                    Some(tool_request) => review(&tool_request.arguments),
                    None => Decision::reject("nothing to review"),
                };
                info!(request_id = %id, decision = %decision.kind(), "reviewer answered");
                if let Err(e) = backend.assign(id).and_then(|_| backend.resolve_with(id, &decision)) {
                    warn!(request_id = %id, error = %e, "could not resolve review");
                }
                answered = true;
            }
            if !answered {
                tokio::time::sleep(Duration::from_millis(50)).await;
            }
        }
    })
}

pub async fn run_scenario() -> SentinelResult<()> {
    println!("=== Scenario 3: Escalation to a human reviewer ===");
    println!();

    let backend = Arc::new(InMemoryBackend::new());
    let client = ClientConfig {
        poll_interval_secs: 1,
        review_timeout_secs: 3,
        ..ClientConfig::new("http://localhost:8000")
    };
    let protocol = Arc::new(ReviewProtocol::new(
        backend.clone() as Arc<dyn ReviewBackend>,
        &client,
    ));

    let min_b: SupervisorRef = Arc::new(Reported::new(
        RuleSupervisor::from_toml_str("min-b", MIN_B)?,
        protocol.clone(),
    ));
    let on_call: SupervisorRef = Arc::new(
        HumanSupervisor::from_config("on-call", protocol.clone(), &client)
            .with_description("Human reviewer for escalated divisions")
            .with_console(ReviewConsole::stderr()),
    );

    let tool = divide();
    let spec = tool.spec();
    let config = SupervisionConfig::builder()
        .configure("divide", vec![vec![min_b, on_call]], Vec::<String>::new())
        .build()?
        .register(backend.as_ref(), "human-review-demo", &[spec])
        .await?;
    if let Some(run_id) = config.run_id() {
        println!("  Registered run {}", run_id);
    }
    let reviewer_id = config
        .registration()
        .and_then(|r| r.supervisor_ids.get("on-call").copied());
    let divide = guard(Arc::new(tool), Arc::new(config));

    println!("  Chain: [min-b, on-call] (review timeout 3s)");
    let reviewer = spawn_reviewer(backend.clone(), reviewer_id);

    let outcome = divide.call(args(json!({ "a": 12, "b": -4 })), CallContext::new()).await;
    show("Case A: divide(12, -4)", &outcome);
    outcome?;

    let outcome = divide.call(args(json!({ "a": 12, "b": 0 })), CallContext::new()).await;
    show("Case B: divide(12, 0)", &outcome);
    outcome?;

    reviewer.abort();
    let outcome = divide.call(args(json!({ "a": 12, "b": -1 })), CallContext::new()).await;
    show("Case C: divide(12, -1)", &outcome);
    outcome?;

    println!();
    println!(
        "  Backend holds {} requests and {} results",
        backend.request_count(),
        backend.results().len()
    );
    println!();
    Ok(())
}
