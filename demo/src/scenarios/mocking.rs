//! Scenario 4: Mocked execution
//!
//! With a `Sample` mock policy the guard never reaches the supervisors or
//! the tool; each call returns the next sample, cycling. The chain here
//! would refuse every call, which shows that mocking comes first.

use std::sync::Arc;

use serde_json::json;

use sentinel_contracts::{
    call::{CallContext, ToolCall},
    decision::Decision,
    error::SentinelResult,
    mock::MockPolicy,
};
use sentinel_core::{guard, SupervisionConfig, SupervisorRef};
use sentinel_rules::fn_supervisor;

use super::show;
use crate::tools::{args, divide};

pub async fn run_scenario() -> SentinelResult<()> {
    println!("=== Scenario 4: Mocked execution ===");
    println!();

    let deny_all: SupervisorRef = Arc::new(fn_supervisor(
        "deny-all",
        |_call: &ToolCall, _ctx: &CallContext| Decision::reject("tools are disabled"),
    ));
    let config = SupervisionConfig::builder()
        .configure("divide", vec![vec![deny_all]], Vec::<String>::new())
        .tool_mock_policy(
            "divide",
            MockPolicy::Sample {
                values: vec![json!(1.5), json!(-2.0)],
            },
        )
        .build()?;
    let divide = guard(Arc::new(divide()), Arc::new(config));

    println!("  Chain: [deny-all], mock policy: sample [1.5, -2.0]");
    for i in 1..=3 {
        let outcome = divide.call(args(json!({ "a": i, "b": 0 })), CallContext::new()).await;
        show(&format!("Call {}: divide({}, 0)", i, i), &outcome);
        outcome?;
    }

    println!();
    Ok(())
}
