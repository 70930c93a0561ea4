//! Scenario 2: Chains from a file, with a decision log
//!
//! `rules/chains.toml` wires supervisors by name: `divide` gets the chain
//! [min-b, limits] and every tool also passes the global [audit-trail] chain.
//!
//! Case A: divide(9, 3)       → min-b approves, audit-trail approves
//! Case B: divide(9, 0)       → min-b escalates, limits rewrites b to 1
//! Case C: divide(9, -3)      → min-b escalates, limits rejects
//! Case D: divide(5e6, 0)     → limits terminates the run
//!
//! Every decision lands in a hash-chained decision log, which is verified
//! and summarized at the end.

use std::sync::Arc;

use serde_json::json;

use sentinel_audit::{EntryBody, InMemoryDecisionLog};
use sentinel_contracts::{
    call::{CallContext, ToolCall},
    decision::Decision,
    error::{SentinelError, SentinelResult},
};
use sentinel_core::{guard, ChainsFile, SupervisionConfig, SupervisorRef};
use sentinel_rules::{fn_supervisor, RuleSupervisor};

use super::{divide::MIN_B, show};
use crate::tools::{args, divide};

const LIMITS: &str = include_str!("../../rules/limits.toml");
const CHAINS: &str = include_str!("../../rules/chains.toml");

pub async fn run_scenario() -> SentinelResult<()> {
    println!("=== Scenario 2: Chains file and decision log ===");
    println!();

    let min_b: SupervisorRef = Arc::new(RuleSupervisor::from_toml_str("min-b", MIN_B)?);
    let limits: SupervisorRef = Arc::new(RuleSupervisor::from_toml_str("limits", LIMITS)?);
    let audit_trail: SupervisorRef = Arc::new(fn_supervisor(
        "audit-trail",
        |call: &ToolCall, _ctx: &CallContext| Decision::approve(format!("{} noted", call.tool)),
    ));

    let log = Arc::new(InMemoryDecisionLog::new());
    let config = SupervisionConfig::builder()
        .supervisor(min_b)
        .supervisor(limits)
        .supervisor(audit_trail)
        .chains_file(ChainsFile::from_toml_str(CHAINS)?)
        .decision_log(log.clone())
        .build()?;
    let divide = guard(Arc::new(divide()), Arc::new(config));

    println!("  Chains: [min-b, limits] then [audit-trail]");
    let cases = [
        ("Case A: divide(9, 3)", json!({ "a": 9, "b": 3 })),
        ("Case B: divide(9, 0)", json!({ "a": 9, "b": 0 })),
        ("Case C: divide(9, -3)", json!({ "a": 9, "b": -3 })),
        ("Case D: divide(5e6, 0)", json!({ "a": 5_000_000, "b": 0 })),
    ];
    for (label, arguments) in cases {
        let outcome = divide.call(args(arguments), CallContext::new()).await;
        show(label, &outcome);
        match outcome {
            Ok(_) => {}
            Err(e) if e.is_terminal() => println!("    (the agent run would stop here)"),
            Err(e) => return Err(e),
        }
    }

    println!();
    let trail = log.export()?;
    println!("  Decision log: {} entries", trail.entries.len());
    for entry in &trail.entries {
        println!("    #{:<3} {}", entry.sequence, describe(&entry.body));
    }
    if !log.verify_integrity() {
        return Err(SentinelError::DecisionLogFailed {
            reason: "hash chain does not verify".to_string(),
        });
    }
    let short = trail.terminal_hash.get(..16).unwrap_or(trail.terminal_hash.as_str());
    println!("  Hash chain verified, terminal hash {}…", short);
    println!();
    Ok(())
}

fn describe(body: &EntryBody) -> String {
    match body {
        EntryBody::Decision(record) => format!(
            "{} chain {} pos {} {:<10} {}",
            record.tool,
            record.chain_index,
            record.position,
            record.supervisor,
            record.decision.kind()
        ),
        EntryBody::Finalized { execution_id, .. } => {
            format!("finalized {}", execution_id)
        }
    }
}
