//! The tool every scenario guards: plain floating-point division.

use serde_json::{json, Value};

use sentinel_contracts::{call::Arguments, error::SentinelError};
use sentinel_core::{tool_fn, FnTool};

pub fn divide() -> FnTool {
    tool_fn("divide", |arguments: Arguments| async move {
        let a = number(&arguments, "a")?;
        let b = number(&arguments, "b")?;
        Ok::<_, SentinelError>(json!(a / b))
    })
    .with_description("Divide a by b")
    .with_schema(json!({
        "type": "object",
        "required": ["a", "b"],
        "properties": {
            "a": { "type": "number" },
            "b": { "type": "number" }
        }
    }))
    .with_returns(json!({ "type": "number" }))
}

fn number(arguments: &Arguments, name: &str) -> Result<f64, SentinelError> {
    arguments
        .get(name)
        .and_then(Value::as_f64)
        .ok_or_else(|| SentinelError::ToolFailed {
            tool: "divide".to_string(),
            reason: format!("argument '{}' must be a number", name),
        })
}

/// Build an argument map from a JSON object literal.
pub fn args(value: Value) -> Arguments {
    match value {
        Value::Object(map) => map,
        _ => Arguments::new(),
    }
}
