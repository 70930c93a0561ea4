//! Sentinel Supervision Runtime: Demo CLI
//!
//! Runs one or all of the demo scenarios. Each scenario guards the same
//! `divide` tool with real Sentinel components (rule supervisors, chain
//! evaluator, decision log, review protocol) and prints what happened to
//! every call.
//!
//! Usage:
//!   cargo run -p demo -- run-all
//!   cargo run -p demo -- rules
//!   cargo run -p demo -- chains
//!   cargo run -p demo -- human-review
//!   cargo run -p demo -- mocking

mod scenarios;
mod tools;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use sentinel_contracts::error::SentinelResult;

use scenarios::{chains, divide, human_review, mocking};

// ── CLI definition ────────────────────────────────────────────────────────────

/// Sentinel: supervision chains for agent tool calls.
#[derive(Parser)]
#[command(
    name = "demo",
    about = "Sentinel supervision runtime demo",
    long_about = "Runs Sentinel demo scenarios showing rule supervision, chain evaluation,\n\
                  human escalation over the review protocol, mocking, and decision log integrity."
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run every scenario in sequence.
    RunAll,
    /// Scenario 1: a single rule supervisor (approve / refuse).
    Rules,
    /// Scenario 2: chains loaded from TOML, modify / reject / terminate, decision log.
    Chains,
    /// Scenario 3: escalation to a human reviewer, including a timeout.
    HumanReview,
    /// Scenario 4: sample mocking bypasses supervision.
    Mocking,
}

// ── Entry point ───────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() {
    // Set RUST_LOG=debug for per-decision output.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_target(false)
        .compact()
        .init();

    let cli = Cli::parse();

    print_banner();

    let result = match cli.command {
        Command::RunAll => run_all().await,
        Command::Rules => divide::run_scenario().await,
        Command::Chains => chains::run_scenario().await,
        Command::HumanReview => human_review::run_scenario().await,
        Command::Mocking => mocking::run_scenario().await,
    };

    match result {
        Ok(()) => {
            println!("All selected scenarios completed successfully.");
        }
        Err(e) => {
            eprintln!("Demo error: {}", e);
            std::process::exit(1);
        }
    }
}

async fn run_all() -> SentinelResult<()> {
    divide::run_scenario().await?;
    chains::run_scenario().await?;
    human_review::run_scenario().await?;
    mocking::run_scenario().await?;
    Ok(())
}

// ── Banner ────────────────────────────────────────────────────────────────────

fn print_banner() {
    println!();
    println!("Sentinel: Supervision Chains for Agent Tool Calls");
    println!("==================================================");
    println!();
    println!("Per guarded call:");
    println!("  [1] Mock policy: a mocked call returns a synthetic value and stops here");
    println!("  [2] Each chain is walked in order; a supervisor approves, rejects,");
    println!("      modifies, escalates to the next position, or terminates the run");
    println!("  [3] Every chain must approve (or modify) before the tool runs");
    println!("  [4] Every decision is appended to a SHA-256 hash-chained decision log");
    println!();
}
