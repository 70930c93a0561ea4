//! Rule types and configuration schema.
//!
//! A `RuleSet` is deserialized from TOML and holds an ordered list of
//! `Rule`s. Rules are evaluated in declaration order; the first matching rule
//! decides. If no rule matches, the set's default decision applies, which
//! is `escalate` unless configured otherwise.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use sentinel_contracts::{
    call::{Arguments, ToolCall},
    decision::Decision,
    error::{SentinelError, SentinelResult},
};

/// The decision a rule produces when it matches a call.
///
/// Example in TOML:
/// ```toml
/// decision = "approve"
/// decision = "modify"
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleDecision {
    Approve,
    Reject,
    #[default]
    Escalate,
    Terminate,
    Modify,
}

/// Comparison applied to one argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConditionOp {
    Eq,
    Ne,
    Gt,
    Ge,
    Lt,
    Le,
    /// `value` must be an array containing the argument.
    In,
    Present,
    Absent,
}

/// A predicate over one named argument of the call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Condition {
    pub argument: String,
    pub op: ConditionOp,
    /// Unused by `present` and `absent`.
    #[serde(default)]
    pub value: Option<Value>,
}

impl Condition {
    pub fn holds(&self, call: &ToolCall) -> bool {
        let actual = call.argument(&self.argument);
        let expected = self.value.as_ref();

        match (self.op, actual, expected) {
            (ConditionOp::Present, actual, _) => actual.is_some(),
            (ConditionOp::Absent, actual, _) => actual.is_none(),
            (_, None, _) | (_, _, None) => false,
            (ConditionOp::Eq, Some(a), Some(e)) => values_equal(a, e),
            (ConditionOp::Ne, Some(a), Some(e)) => !values_equal(a, e),
            (ConditionOp::In, Some(a), Some(Value::Array(items))) => {
                items.iter().any(|item| values_equal(a, item))
            }
            (ConditionOp::In, Some(_), Some(_)) => false,
            (op, Some(a), Some(e)) => match compare(a, e) {
                Some(ordering) => match op {
                    ConditionOp::Gt => ordering == Ordering::Greater,
                    ConditionOp::Ge => ordering != Ordering::Less,
                    ConditionOp::Lt => ordering == Ordering::Less,
                    ConditionOp::Le => ordering != Ordering::Greater,
                    _ => false,
                },
                None => false,
            },
        }
    }
}

/// Numbers compare by value so `2` equals `2.0`.
fn values_equal(a: &Value, b: &Value) -> bool {
    match (a.as_f64(), b.as_f64()) {
        (Some(x), Some(y)) => x == y,
        _ => a == b,
    }
}

fn compare(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Number(_), Value::Number(_)) => a.as_f64()?.partial_cmp(&b.as_f64()?),
        (Value::String(x), Value::String(y)) => Some(x.cmp(y)),
        _ => None,
    }
}

/// A single rule loaded from TOML.
///
/// `tool` supports the wildcard `"*"`, which matches any tool name.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Rule {
    /// Stable identifier used in explanations and logs.
    pub id: String,

    #[serde(default)]
    pub description: String,

    /// Tool name pattern. Use `"*"` to match any tool.
    pub tool: String,

    /// Optional argument predicate; a rule without one matches on tool alone.
    #[serde(default)]
    pub when: Option<Condition>,

    pub decision: RuleDecision,

    /// Explanation attached to the decision. Defaults to a message naming the
    /// rule.
    #[serde(default)]
    pub explanation: Option<String>,

    /// Argument overrides. Required when `decision = "modify"`.
    #[serde(default)]
    pub set: Option<Arguments>,
}

impl Rule {
    pub fn matches(&self, call: &ToolCall) -> bool {
        let tool_matches = self.tool == "*" || self.tool == call.tool;
        tool_matches && self.when.as_ref().map_or(true, |c| c.holds(call))
    }

    /// The decision this rule produces for a matching call.
    pub fn decide(&self) -> Decision {
        let explanation = self
            .explanation
            .clone()
            .unwrap_or_else(|| format!("{} by rule '{}'", verb(self.decision), self.id));

        match self.decision {
            RuleDecision::Approve => Decision::approve(explanation),
            RuleDecision::Reject => Decision::reject(explanation),
            RuleDecision::Escalate => Decision::escalate(explanation),
            RuleDecision::Terminate => Decision::terminate(explanation),
            RuleDecision::Modify => {
                Decision::modify(self.set.clone().unwrap_or_default(), explanation)
            }
        }
    }
}

fn verb(decision: RuleDecision) -> &'static str {
    match decision {
        RuleDecision::Approve => "approved",
        RuleDecision::Reject => "rejected",
        RuleDecision::Escalate => "escalated",
        RuleDecision::Terminate => "terminated",
        RuleDecision::Modify => "modified",
    }
}

/// The top-level structure deserialized from a TOML rule file.
///
/// Example:
/// ```toml
/// [[rules]]
/// id = "positive-divisor"
/// tool = "divide"
/// when = { argument = "b", op = "gt", value = 0 }
/// decision = "approve"
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RuleSet {
    /// Decision when no rule matches.
    #[serde(default)]
    pub default: RuleDecision,

    #[serde(default)]
    pub default_explanation: Option<String>,

    /// Ordered list of rules. First match wins.
    #[serde(default)]
    pub rules: Vec<Rule>,
}

impl RuleSet {
    /// Reject rule sets that could never produce a well-formed decision.
    pub fn validate(&self) -> SentinelResult<()> {
        if self.default == RuleDecision::Modify {
            return Err(SentinelError::config(
                "rule set default cannot be 'modify': there is nothing to set",
            ));
        }
        for rule in &self.rules {
            if rule.decision == RuleDecision::Modify && rule.set.is_none() {
                return Err(SentinelError::config(format!(
                    "rule '{}' modifies without a 'set' table",
                    rule.id
                )));
            }
            if let Some(condition) = &rule.when {
                let needs_value = !matches!(condition.op, ConditionOp::Present | ConditionOp::Absent);
                if needs_value && condition.value.is_none() {
                    return Err(SentinelError::config(format!(
                        "rule '{}' compares '{}' without a value",
                        rule.id, condition.argument
                    )));
                }
            }
        }
        Ok(())
    }

    pub fn default_decision(&self) -> Decision {
        let explanation = self
            .default_explanation
            .clone()
            .unwrap_or_else(|| "no rule matched".to_string());
        match self.default {
            RuleDecision::Approve => Decision::approve(explanation),
            RuleDecision::Reject => Decision::reject(explanation),
            RuleDecision::Terminate => Decision::terminate(explanation),
            RuleDecision::Escalate | RuleDecision::Modify => Decision::escalate(explanation),
        }
    }
}
