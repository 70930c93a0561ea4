pub mod chains;
pub mod divide;
pub mod human_review;
pub mod mocking;

use sentinel_contracts::error::SentinelResult;
use sentinel_core::CallOutcome;

/// Print one guarded call's outcome in the demo's common format.
pub(crate) fn show(label: &str, outcome: &SentinelResult<CallOutcome>) {
    match outcome {
        Ok(CallOutcome::Executed(value)) => println!("    {:<28} → executed: {}", label, value),
        Ok(CallOutcome::Mocked(value)) => println!("    {:<28} → mocked:   {}", label, value),
        Ok(CallOutcome::Refused(text)) => println!("    {:<28} → refused:  {}", label, text),
        Err(e) => println!("    {:<28} → error:    {}", label, e),
    }
}
