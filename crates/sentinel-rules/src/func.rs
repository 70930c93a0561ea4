//! Closure-backed supervisors.

use std::fmt;

use async_trait::async_trait;

use sentinel_contracts::{
    call::{CallContext, ChainSlot, ToolCall},
    decision::Decision,
    remote::SupervisorKind,
};
use sentinel_core::traits::Supervisor;

type DecideFn = dyn Fn(&ToolCall, &CallContext) -> Decision + Send + Sync;

/// A local supervisor whose decision is a plain function of the call.
pub struct FnSupervisor {
    name: String,
    description: String,
    func: Box<DecideFn>,
}

/// Build a rule supervisor from a closure.
///
/// ```rust,ignore
/// let positive = fn_supervisor("positive-divisor", |call, _ctx| {
///     match call.argument("b").and_then(Value::as_f64) {
///         Some(b) if b > 0.0 => Decision::approve("b > 0"),
///         _ => Decision::escalate("b<=0"),
///     }
/// });
/// ```
pub fn fn_supervisor<F>(name: impl Into<String>, func: F) -> FnSupervisor
where
    F: Fn(&ToolCall, &CallContext) -> Decision + Send + Sync + 'static,
{
    FnSupervisor {
        name: name.into(),
        description: String::new(),
        func: Box::new(func),
    }
}

impl FnSupervisor {
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }
}

impl fmt::Debug for FnSupervisor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnSupervisor").field("name", &self.name).finish()
    }
}

#[async_trait]
impl Supervisor for FnSupervisor {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn kind(&self) -> SupervisorKind {
        SupervisorKind::Rule
    }

    async fn decide(&self, call: &ToolCall, ctx: &CallContext, _slot: &ChainSlot) -> Decision {
        (self.func)(call, ctx)
    }
}
