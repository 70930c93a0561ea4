//! # sentinel-rules
//!
//! Rule-based supervisors for the Sentinel runtime.
//!
//! ## Overview
//!
//! This crate provides two local supervisors, both implementing
//! [`Supervisor`](sentinel_core::traits::Supervisor):
//!
//! - [`RuleSupervisor`], whose rules are declared in TOML and evaluated in
//!   order, first match wins, falling back to `escalate`
//! - [`FnSupervisor`], built from a closure over the call
//!
//! ## Quick start
//!
//! ```rust,ignore
//! use sentinel_rules::RuleSupervisor;
//!
//! let divisor = RuleSupervisor::from_toml_str("positive-divisor", r#"
//!     default_explanation = "b<=0"
//!
//!     [[rules]]
//!     id = "b-positive"
//!     tool = "divide"
//!     when = { argument = "b", op = "gt", value = 0 }
//!     decision = "approve"
//! "#)?;
//! ```

pub mod engine;
pub mod func;
pub mod rule;

pub use engine::RuleSupervisor;
pub use func::{fn_supervisor, FnSupervisor};
pub use rule::{Condition, ConditionOp, Rule, RuleDecision, RuleSet};

// ── Tests ─────────────────────────────────────────────────────────────────────
