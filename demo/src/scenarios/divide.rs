//! Scenario 1: Rule supervision
//!
//! A single chain holding one rule supervisor guards `divide`:
//!
//! Case A: b > 0  → the rule approves and the tool runs
//! Case B: b = 0  → the rule escalates, the chain is exhausted, the call is
//!                   refused with the rule's explanation ("b<=0")
//!
//! Nothing outside the process is contacted.

use std::sync::Arc;

use serde_json::json;

use sentinel_contracts::{call::CallContext, error::SentinelResult};
use sentinel_core::{guard, SupervisionConfig, SupervisorRef};
use sentinel_rules::RuleSupervisor;

use super::show;
use crate::tools::{args, divide};

pub(crate) const MIN_B: &str = include_str!("../../rules/divide.toml");

pub async fn run_scenario() -> SentinelResult<()> {
    println!("=== Scenario 1: Rule supervision ===");
    println!();

    let min_b: SupervisorRef = Arc::new(
        RuleSupervisor::from_toml_str("min-b", MIN_B)?
            .with_description("Approves only strictly positive divisors"),
    );
    let config = SupervisionConfig::builder()
        .configure("divide", vec![vec![min_b]], Vec::<String>::new())
        .build()?;
    let divide = guard(Arc::new(divide()), Arc::new(config));

    println!("  Chain: [min-b]");
    let outcome = divide.call(args(json!({ "a": 10, "b": 2 })), CallContext::new()).await;
    show("Case A: divide(10, 2)", &outcome);
    outcome?;

    let outcome = divide.call(args(json!({ "a": 10, "b": 0 })), CallContext::new()).await;
    show("Case B: divide(10, 0)", &outcome);
    outcome?;

    println!();
    Ok(())
}
