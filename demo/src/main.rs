//! agentgate Spending Reference Runtime: Demo CLI
//!
//! Runs one or all of the five spending-limit scenarios. Each scenario uses
//! real agentgate components (registry, pipeline, schema validator, journal)
//! wired to a local sandbox running a mock swap ability and two policies.
//!
//! Usage:
//!   cargo run -p demo -- run-all
//!   cargo run -p demo -- happy-path
//!   cargo run -p demo -- spend-limit
//!   cargo run -p demo -- commit-failure
//!   cargo run -p demo -- disabled-version
//!   cargo run -p demo -- ordering --parallel-precheck
//!   cargo run -p demo -- --config pipeline.toml run-all

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use agentgate_contracts::error::GateResult;
use agentgate_core::PipelineConfig;
use agentgate_ref_spending::scenarios::{
    commit_failure, disabled_version, happy_path, ordering, spend_limit,
};

// ── CLI definition ────────────────────────────────────────────────────────────

/// agentgate: policy-gated ability invocation demo.
///
/// Each subcommand runs one or all of the spending-limit scenarios, showing
/// permission resolution, staged policy enforcement and the report journal.
#[derive(Parser)]
#[command(
    name = "agentgate-demo",
    about = "agentgate spending-limit reference runtime demo",
    long_about = "Runs agentgate demo scenarios showing delegation checks, ordered\n\
                  policy enforcement across precheck/execute/commit, and journaled reports."
)]
struct Cli {
    /// Pipeline configuration file (TOML). Defaults apply when omitted.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Run policy prechecks concurrently.
    #[arg(long, global = true)]
    parallel_precheck: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run all five scenarios in sequence.
    RunAll,
    /// Scenario 1: swaps with and without policies attached.
    HappyPath,
    /// Scenario 2: cumulative spend breaks the daily limit in execute.
    SpendLimit,
    /// Scenario 3: the spend ledger write fails after the swap executed.
    CommitFailure,
    /// Scenario 4: a disabled app version is rejected before any call.
    DisabledVersion,
    /// Scenario 5: the first declared policy to deny decides.
    Ordering,
}

// ── Entry point ───────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() {
    // Set RUST_LOG=info to follow each invocation, debug for every phase.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_target(false)
        .compact()
        .init();

    let cli = Cli::parse();

    let config = match load_config(&cli) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Config error: {}", e);
            std::process::exit(2);
        }
    };

    print_banner(&config);

    let result = match cli.command {
        Command::RunAll => run_all(&config).await,
        Command::HappyPath => happy_path::run_scenario(&config).await,
        Command::SpendLimit => spend_limit::run_scenario(&config).await,
        Command::CommitFailure => commit_failure::run_scenario(&config).await,
        Command::DisabledVersion => disabled_version::run_scenario(&config).await,
        Command::Ordering => ordering::run_scenario(&config).await,
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

fn load_config(cli: &Cli) -> GateResult<PipelineConfig> {
    let mut config = match &cli.config {
        Some(path) => {
            info!(path = %path.display(), "loading pipeline config");
            PipelineConfig::from_file(path)?
        }
        None => PipelineConfig::default(),
    };
    if cli.parallel_precheck {
        config.parallel_precheck = true;
    }
    config.validate()?;
    Ok(config)
}

// ── Scenario dispatch ─────────────────────────────────────────────────────────

async fn run_all(config: &PipelineConfig) -> GateResult<()> {
    happy_path::run_scenario(config).await?;
    spend_limit::run_scenario(config).await?;
    commit_failure::run_scenario(config).await?;
    disabled_version::run_scenario(config).await?;
    ordering::run_scenario(config).await?;
    Ok(())
}

// ── Banner ────────────────────────────────────────────────────────────────────

fn print_banner(config: &PipelineConfig) {
    println!();
    println!("agentgate: Policy-gated Ability Invocation");
    println!("Spending-Limit Reference Demo");
    println!("==========================================");
    println!();
    println!("Pipeline per invocation:");
    println!("  [1] Resolve delegatee -> agent wallet -> app version -> ability policies");
    println!("  [2] Map ability params onto each policy; validate against contracts");
    println!("  [3] Precheck every policy in registration order, then the ability");
    println!("  [4] Execute every policy, then the ability (first deny stops it)");
    println!("  [5] Commit each policy that declares one; report to the hash-chained journal");
    println!();
    println!(
        "Phase timeout {}ms, resolution timeout {}ms, precheck {}",
        config.phase_timeout_ms,
        config.resolution_timeout_ms,
        if config.parallel_precheck { "parallel" } else { "sequential" }
    );
    println!();
}
