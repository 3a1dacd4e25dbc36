//! Scenario 3: Commit failure
//!
//! The spending-limit commit is made to fail after the swap has executed.
//! The swap already happened, so the verdict stays Allow; the failed commit
//! shows up in the report and the ledger never learns about the spend.

use agentgate_contracts::{error::GateResult, report::ExecutionReport};
use agentgate_core::PipelineConfig;

use super::print_report;
use crate::market::{self, USDC, WETH};
use crate::runtime::{swap_request, SpendingRuntime, GUARDED_DELEGATEE};

pub const AMOUNT_IN: u128 = 300_000_000;

pub async fn run(runtime: &SpendingRuntime) -> GateResult<ExecutionReport> {
    runtime.spending_limit.fail_commits(true);
    let report = runtime
        .pipeline
        .invoke(swap_request(GUARDED_DELEGATEE, USDC, WETH, AMOUNT_IN))
        .await;
    runtime.spending_limit.fail_commits(false);
    report
}

pub async fn run_scenario(config: &PipelineConfig) -> GateResult<()> {
    println!("=== Scenario 3: Commit Failure ===");
    println!();

    let runtime = SpendingRuntime::new(config.clone())?;
    let report = run(&runtime).await?;

    println!("  Swap 300 USDC -> WETH; the spend ledger rejects the commit");
    print_report(&report);
    println!();
    for failure in report.commit_failures() {
        println!("  Commit failure: {} ({:?})", failure.entity, failure.status);
    }
    println!("  Spent today:    ${}", market::format_usd(runtime.spent_today()));
    println!();
    println!("  Scenario 3 complete.");
    println!();

    Ok(())
}
