//! Scenario 1: Happy path
//!
//! Two swaps of 250 USDC for WETH, both allowed:
//!   1. Under version 1, where no policies are attached. Only the ability's
//!      own precheck and execute run.
//!   2. Under version 2, where the spending limit and the token allow list
//!      are attached. Every phase allows, and the spending-limit commit
//!      records the spend against the swap's transaction hash.

use agentgate_contracts::{error::GateResult, report::ExecutionReport};
use agentgate_core::PipelineConfig;

use super::print_report;
use crate::market::{self, USDC, WETH};
use crate::runtime::{swap_request, SpendingRuntime, BARE_DELEGATEE, GUARDED_DELEGATEE};

pub const AMOUNT_IN: u128 = 250_000_000;

/// Run both swaps and return (bare, guarded) reports.
pub async fn run(runtime: &SpendingRuntime) -> GateResult<(ExecutionReport, ExecutionReport)> {
    let bare = runtime
        .pipeline
        .invoke(swap_request(BARE_DELEGATEE, USDC, WETH, AMOUNT_IN))
        .await?;
    let guarded = runtime
        .pipeline
        .invoke(swap_request(GUARDED_DELEGATEE, USDC, WETH, AMOUNT_IN))
        .await?;
    Ok((bare, guarded))
}

pub async fn run_scenario(config: &PipelineConfig) -> GateResult<()> {
    println!("=== Scenario 1: Happy Path ===");
    println!();

    let runtime = SpendingRuntime::new(config.clone())?;
    let (bare, guarded) = run(&runtime).await?;

    println!("  Swap 250 USDC -> WETH, no policies attached (version 1)");
    print_report(&bare);
    println!();
    println!("  Swap 250 USDC -> WETH, spending limit + allowed tokens (version 2)");
    print_report(&guarded);
    println!();
    println!("  Spent today:    ${}", market::format_usd(runtime.spent_today()));
    println!(
        "  Journal:        {} report(s), integrity {}",
        runtime.journal.len(),
        if runtime.journal.verify_integrity() { "VERIFIED" } else { "FAILED" }
    );
    println!();
    println!("  Scenario 1 complete.");
    println!();

    Ok(())
}

#[cfg(test)]
mod tests {
    use agentgate_contracts::descriptor::Phase;

    use super::*;
    use crate::market::usd;
    use crate::programs::spending_limit;

    #[tokio::test]
    async fn bare_ability_allows_with_no_policy_outcomes() {
        let runtime = SpendingRuntime::new(PipelineConfig::default()).unwrap();
        let (bare, _) = run(&runtime).await.unwrap();

        assert!(bare.is_allowed());
        assert!(bare.policy_outcomes.is_empty());
        assert!(bare.ability_outcome(Phase::Precheck).unwrap().is_allow());
        let execute = bare.ability_outcome(Phase::Execute).unwrap();
        assert!(execute.allow_payload().unwrap()["txHash"].as_str().unwrap().starts_with("0x"));
    }

    #[tokio::test]
    async fn guarded_swap_commits_its_spend() {
        let runtime = SpendingRuntime::new(PipelineConfig::default()).unwrap();
        let (_, guarded) = run(&runtime).await.unwrap();

        assert!(guarded.is_allowed());
        assert!(guarded.commit_failures().is_empty());
        let commit = guarded
            .policy_outcome(spending_limit::PACKAGE_NAME, Phase::Commit)
            .unwrap();
        let executed = guarded.ability_outcome(Phase::Execute).unwrap();
        assert_eq!(
            commit.allow_payload().unwrap()["txHash"],
            executed.allow_payload().unwrap()["txHash"]
        );

        assert_eq!(runtime.spent_today(), usd(250));
        assert_eq!(runtime.journal.len(), 2);
        assert!(runtime.journal.verify_integrity());
    }
}
