//! Scenario 2: Spend-limit deny
//!
//! The daily limit is $1000. A first swap of 900 USDC goes through and its
//! commit records $900. A second swap of 200 USDC fits under the limit on
//! its own, so precheck allows, but execute sees the $900 already spent
//! and denies. The swap's own execute is never called.

use agentgate_contracts::{error::GateResult, report::ExecutionReport};
use agentgate_core::PipelineConfig;

use super::print_report;
use crate::market::{self, USDC, WETH};
use crate::runtime::{swap_request, SpendingRuntime, GUARDED_DELEGATEE};

pub const FIRST_AMOUNT_IN: u128 = 900_000_000;
pub const SECOND_AMOUNT_IN: u128 = 200_000_000;

/// Run both swaps and return the report of the denied one.
pub async fn run(runtime: &SpendingRuntime) -> GateResult<ExecutionReport> {
    runtime
        .pipeline
        .invoke(swap_request(GUARDED_DELEGATEE, USDC, WETH, FIRST_AMOUNT_IN))
        .await?;
    runtime
        .pipeline
        .invoke(swap_request(GUARDED_DELEGATEE, USDC, WETH, SECOND_AMOUNT_IN))
        .await
}

pub async fn run_scenario(config: &PipelineConfig) -> GateResult<()> {
    println!("=== Scenario 2: Spend-Limit Deny ===");
    println!();

    let runtime = SpendingRuntime::new(config.clone())?;
    let report = run(&runtime).await?;

    println!("  Daily limit $1000.00; already spent $900.00 in an earlier swap");
    println!("  Swap 200 USDC -> WETH");
    print_report(&report);
    println!();
    println!("  Spent today:    ${} (unchanged)", market::format_usd(runtime.spent_today()));
    println!();
    println!("  Scenario 2 complete.");
    println!();

    Ok(())
}
