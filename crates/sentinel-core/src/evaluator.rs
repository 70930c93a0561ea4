//! The Sentinel chain evaluator: the fail-closed supervision algorithm.
//!
//! For every chain in a chain set, supervisors are consulted in order:
//!
//!   Approve / Modify → the chain succeeds, later positions are skipped
//!   Escalate         → ask the next position; at the last position the
//!                      escalation becomes the chain's outcome
//!   Reject           → the whole call is refused immediately
//!   Terminate        → the whole run is terminated immediately
//!
//! The call proceeds only if every chain succeeded. Any chain that exhausted
//! its supervisors while escalating refuses the call: an inconclusive lane
//! never authorizes a side effect.

use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info, warn};

use sentinel_contracts::{
    call::{Arguments, CallContext, ChainSlot, ToolCall},
    decision::{Decision, DecisionKind},
    error::SentinelResult,
    record::DecisionRecord,
};

use crate::{chain::ChainSet, traits::DecisionLog};

/// One supervisor's answer, tagged with where it was given.
#[derive(Debug, Clone, PartialEq)]
pub struct ChainOutcome {
    pub chain_index: usize,
    pub supervisor: String,
    pub decision: Decision,
}

/// The aggregate result of evaluating a chain set.
///
/// Callers pattern-match on this to decide what to do with the call:
/// - `Unsupervised` → no chains configured; run with the original arguments
/// - `Proceed` → run with `arguments` (original merged with modifications)
/// - `Refused` → do not run; tell the agent why
/// - `Terminated` → do not run; stop the whole agent run
#[derive(Debug, Clone, PartialEq)]
pub enum Verdict {
    Unsupervised,

    Proceed {
        /// Final arguments after applying every chain's modification.
        arguments: Arguments,
        /// The successful outcome of each chain, in chain order.
        outcomes: Vec<ChainOutcome>,
    },

    Refused {
        /// Which supervisors objected and why.
        explanation: String,
    },

    Terminated {
        explanation: String,
    },
}

/// Runs chain sets against pending calls.
///
/// Cheap to clone; one evaluator is normally shared by every guarded tool of
/// a configuration.
#[derive(Clone, Default)]
pub struct ChainEvaluator {
    log: Option<Arc<dyn DecisionLog>>,
}

impl ChainEvaluator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record every supervisor answer to `log`.
    pub fn with_log(log: Arc<dyn DecisionLog>) -> Self {
        Self { log: Some(log) }
    }

    /// Evaluate `chains` for `call`.
    ///
    /// Supervisors within a chain run strictly in sequence; chains run in
    /// order. `ignored` names arguments no modification may overwrite.
    ///
    /// # Errors
    ///
    /// Only decision-log failures. Everything a supervisor can go through is
    /// already a `Decision` by the time it reaches here.
    pub async fn evaluate(
        &self,
        chains: &ChainSet,
        call: &ToolCall,
        ctx: &CallContext,
        ignored: &BTreeSet<String>,
    ) -> SentinelResult<Verdict> {
        let execution_id = ctx.execution_id;

        if chains.is_empty() {
            debug!(
                execution_id = %execution_id,
                tool = %call.tool,
                "no supervision configured, running unsupervised"
            );
            return Ok(Verdict::Unsupervised);
        }

        debug!(
            execution_id = %execution_id,
            tool = %call.tool,
            chains = chains.len(),
            "evaluating chain set"
        );

        let mut outcomes: Vec<ChainOutcome> = Vec::with_capacity(chains.len());

        for (chain_index, chain) in chains.chains().iter().enumerate() {
            let mut consulted: Vec<ChainOutcome> = Vec::new();

            for (position, member) in chain.members.iter().enumerate() {
                let slot = ChainSlot {
                    chain_index,
                    position,
                    chain_len: chain.len(),
                    chain_id: chain.chain_id,
                    supervisor_id: member.supervisor_id,
                };

                let decision = member.supervisor.decide(call, ctx, &slot).await;
                self.record(call, ctx, &slot, member.name(), &decision)?;

                debug!(
                    execution_id = %execution_id,
                    chain = chain_index,
                    position,
                    supervisor = %member.name(),
                    decision = %decision.kind(),
                    "supervisor decided"
                );

                let kind = decision.kind();
                let outcome = ChainOutcome {
                    chain_index,
                    supervisor: member.name().to_string(),
                    decision,
                };

                match kind {
                    DecisionKind::Approve | DecisionKind::Modify => {
                        outcomes.push(outcome);
                        break;
                    }

                    DecisionKind::Reject => {
                        consulted.push(outcome);
                        let explanation = describe(&consulted);
                        warn!(
                            execution_id = %execution_id,
                            tool = %call.tool,
                            chain = chain_index,
                            explanation = %explanation,
                            "call rejected"
                        );
                        self.finalize(ctx)?;
                        return Ok(Verdict::Refused { explanation });
                    }

                    DecisionKind::Terminate => {
                        consulted.push(outcome);
                        let explanation = describe(&consulted);
                        warn!(
                            execution_id = %execution_id,
                            tool = %call.tool,
                            chain = chain_index,
                            explanation = %explanation,
                            "run terminated by supervisor"
                        );
                        self.finalize(ctx)?;
                        return Ok(Verdict::Terminated { explanation });
                    }

                    DecisionKind::Escalate => {
                        if slot.is_last() {
                            debug!(
                                execution_id = %execution_id,
                                chain = chain_index,
                                "chain exhausted while escalating"
                            );
                            outcomes.push(outcome);
                        } else {
                            consulted.push(outcome);
                        }
                    }
                }
            }
        }

        self.finalize(ctx)?;

        if outcomes.iter().all(|o| o.decision.is_affirmative()) {
            let arguments = merge_modifications(&call.arguments, &outcomes, ignored);
            info!(
                execution_id = %execution_id,
                tool = %call.tool,
                modified = outcomes.iter().any(|o| o.decision.modification().is_some()),
                "every chain approved"
            );
            Ok(Verdict::Proceed {
                arguments,
                outcomes,
            })
        } else {
            let explanation = describe(&outcomes);
            warn!(
                execution_id = %execution_id,
                tool = %call.tool,
                explanation = %explanation,
                "call refused: not every chain approved"
            );
            Ok(Verdict::Refused { explanation })
        }
    }

    fn record(
        &self,
        call: &ToolCall,
        ctx: &CallContext,
        slot: &ChainSlot,
        supervisor: &str,
        decision: &Decision,
    ) -> SentinelResult<()> {
        let Some(log) = &self.log else {
            return Ok(());
        };
        log.record(&DecisionRecord {
            execution_id: ctx.execution_id,
            tool: call.tool.clone(),
            chain_index: slot.chain_index,
            position: slot.position,
            supervisor: supervisor.to_string(),
            decision: decision.clone(),
            timestamp: Utc::now(),
        })
    }

    fn finalize(&self, ctx: &CallContext) -> SentinelResult<()> {
        match &self.log {
            Some(log) => log.finalize(&ctx.execution_id),
            None => Ok(()),
        }
    }
}

/// Apply every `Modify` outcome to `original`, in chain order.
///
/// Later chains override earlier ones key by key. Keys listed in `ignored`
/// are never overwritten.
pub fn merge_modifications(
    original: &Arguments,
    outcomes: &[ChainOutcome],
    ignored: &BTreeSet<String>,
) -> Arguments {
    let mut merged = original.clone();
    for outcome in outcomes {
        let Some(modification) = outcome.decision.modification() else {
            continue;
        };
        for (key, value) in &modification.arguments {
            if ignored.contains(key) {
                warn!(
                    supervisor = %outcome.supervisor,
                    argument = %key,
                    "modification of ignored argument discarded"
                );
                continue;
            }
            merged.insert(key.clone(), value.clone());
        }
    }
    merged
}

/// Render outcomes as `[supervisor] kind: explanation; ...`.
pub fn describe(outcomes: &[ChainOutcome]) -> String {
    outcomes
        .iter()
        .map(|o| format!("[{}] {}", o.supervisor, o.decision))
        .collect::<Vec<_>>()
        .join("; ")
}

// ── Tests ────────────────────────────────────────────────────────────────────
