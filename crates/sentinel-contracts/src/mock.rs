//! Mock policy: whether a guarded call runs for real.
//!
//! A mocked call never reaches the supervision chains; the guard replaces
//! real execution with a synthetic value before any supervisor is asked.

use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "policy", rename_all = "snake_case")]
pub enum MockPolicy {
    /// Execute the real tool under supervision.
    #[default]
    NoMock,

    /// Return values from a fixed list, cycling in order.
    Sample { values: Vec<Value> },

    /// Return a random value matching the tool's declared return schema.
    Random,

    /// Return a value synthesized by a language model.
    Synthesize,

    /// Replay a previously recorded result for an equivalent call.
    Replay,
}

impl MockPolicy {
    pub fn is_mocked(&self) -> bool {
        !matches!(self, MockPolicy::NoMock)
    }
}
