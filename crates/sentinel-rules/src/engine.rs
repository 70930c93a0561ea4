//! TOML-driven rule supervisor.
//!
//! `RuleSupervisor` loads a `RuleSet` from a TOML string or file and
//! implements the `Supervisor` trait from sentinel-core.
//!
//! Evaluation algorithm:
//!
//! 1. Iterate rules in declaration order.
//! 2. The first rule whose tool pattern and argument condition match decides.
//! 3. If no rule matched, the rule set's default applies (escalate unless
//!    configured otherwise), so an unmatched call moves on to the next
//!    supervisor in the chain.

use std::path::Path;

use async_trait::async_trait;
use tracing::debug;

use sentinel_contracts::{
    call::{CallContext, ChainSlot, ToolCall},
    decision::Decision,
    error::{SentinelError, SentinelResult},
    remote::SupervisorKind,
};
use sentinel_core::traits::Supervisor;

use crate::rule::RuleSet;

/// A `Supervisor` that decides from a TOML rule set.
///
/// ```rust,ignore
/// use sentinel_rules::RuleSupervisor;
///
/// let divisor = RuleSupervisor::from_file("positive-divisor", Path::new("rules/divide.toml"))?;
/// ```
#[derive(Debug)]
pub struct RuleSupervisor {
    name: String,
    description: String,
    rules: RuleSet,
    source: Option<String>,
}

impl RuleSupervisor {
    /// Build from an already-parsed rule set.
    pub fn new(name: impl Into<String>, rules: RuleSet) -> SentinelResult<Self> {
        rules.validate()?;
        Ok(Self {
            name: name.into(),
            description: String::new(),
            rules,
            source: None,
        })
    }

    /// Parse `s` as TOML and build a `RuleSupervisor`.
    ///
    /// Returns `SentinelError::Config` if the TOML is malformed, does not
    /// match the `RuleSet` schema, or fails validation.
    pub fn from_toml_str(name: impl Into<String>, s: &str) -> SentinelResult<Self> {
        let rules: RuleSet = toml::from_str(s)
            .map_err(|e| SentinelError::config(format!("failed to parse rule TOML: {}", e)))?;
        let mut supervisor = Self::new(name, rules)?;
        supervisor.source = Some(s.to_string());
        Ok(supervisor)
    }

    /// Read the file at `path` and parse it as a TOML rule set.
    pub fn from_file(name: impl Into<String>, path: &Path) -> SentinelResult<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            SentinelError::config(format!(
                "failed to read rule file '{}': {}",
                path.display(),
                e
            ))
        })?;
        Self::from_toml_str(name, &contents)
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn rules(&self) -> &RuleSet {
        &self.rules
    }

    /// Apply the rule set to `call`.
    pub fn evaluate(&self, call: &ToolCall) -> Decision {
        for rule in &self.rules.rules {
            if !rule.matches(call) {
                continue;
            }

            debug!(
                supervisor = %self.name,
                rule_id = %rule.id,
                tool = %call.tool,
                "rule matched"
            );
            return rule.decide();
        }

        debug!(
            supervisor = %self.name,
            tool = %call.tool,
            "no rule matched, applying default"
        );
        self.rules.default_decision()
    }
}

#[async_trait]
impl Supervisor for RuleSupervisor {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn kind(&self) -> SupervisorKind {
        SupervisorKind::Rule
    }

    fn code(&self) -> Option<String> {
        self.source.clone()
    }

    async fn decide(&self, call: &ToolCall, _ctx: &CallContext, _slot: &ChainSlot) -> Decision {
        self.evaluate(call)
    }
}
