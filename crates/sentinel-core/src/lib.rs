//! # sentinel-core
//!
//! The supervision runtime for Sentinel-guarded tools.
//!
//! This crate provides:
//! - The collaborator traits (`Supervisor`, `Tool`, `ReviewBackend`,
//!   `RegistrationBackend`, `DecisionLog`, `MockStrategy`)
//! - The `ChainEvaluator` implementing fail-closed chain semantics
//! - `SupervisionConfig`, the immutable per-run registry of chains
//! - `guard()`, which wraps a tool so every call is supervised first
//!
//! ## Usage
//!
//! ```rust,ignore
//! use sentinel_core::{guard, tool_fn, SupervisionConfig};
//!
//! let config = SupervisionConfig::builder()
//!     .configure("divide", vec![vec![positive_divisor]], ["request_id"])
//!     .build()?;
//! let divide = guard(Arc::new(tool_fn("divide", divide_impl)), Arc::new(config));
//! let outcome = divide.call(arguments, CallContext::new()).await?;
//! ```

pub mod chain;
pub mod config;
pub mod evaluator;
pub mod guard;
pub mod traits;

pub use chain::{Chain, ChainSet, SupervisorRef};
pub use config::{ChainsFile, Registration, SupervisionConfig, SupervisionConfigBuilder};
pub use evaluator::{ChainEvaluator, ChainOutcome, Verdict};
pub use guard::{guard, tool_fn, CallOutcome, FnTool, GuardedTool};
