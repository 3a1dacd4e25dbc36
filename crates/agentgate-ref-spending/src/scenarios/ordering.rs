//! Scenario 5: Policy ordering
//!
//! 100 LINK is worth $1500. That breaks the $1000 daily limit, and LINK is
//! not on the allow list either. Versions 2 and 3 attach the same two
//! policies in opposite orders, and the first policy to deny decides, so
//! the same request is denied for a different reason under each.

use agentgate_contracts::{error::GateResult, report::ExecutionReport};
use agentgate_core::PipelineConfig;

use super::print_report;
use crate::market::{LINK, USDC};
use crate::runtime::{swap_request, SpendingRuntime, GUARDED_DELEGATEE, REORDERED_DELEGATEE};

/// 100 LINK in base units.
pub const AMOUNT_IN: u128 = 100_000_000_000_000_000_000;

/// Run the swap under both orders and return (spending limit first,
/// allowed tokens first).
pub async fn run(runtime: &SpendingRuntime) -> GateResult<(ExecutionReport, ExecutionReport)> {
    let limit_first = runtime
        .pipeline
        .invoke(swap_request(GUARDED_DELEGATEE, LINK, USDC, AMOUNT_IN))
        .await?;
    let tokens_first = runtime
        .pipeline
        .invoke(swap_request(REORDERED_DELEGATEE, LINK, USDC, AMOUNT_IN))
        .await?;
    Ok((limit_first, tokens_first))
}

pub async fn run_scenario(config: &PipelineConfig) -> GateResult<()> {
    println!("=== Scenario 5: Policy Ordering ===");
    println!();

    let runtime = SpendingRuntime::new(config.clone())?;
    let (limit_first, tokens_first) = run(&runtime).await?;

    println!(
        "  Swap 100 LINK -> USDC (precheck {})",
        if config.parallel_precheck { "in parallel" } else { "in order" }
    );
    println!();
    println!("  [spending-limit, allowed-tokens]");
    print_report(&limit_first);
    println!();
    println!("  [allowed-tokens, spending-limit]");
    print_report(&tokens_first);
    println!();
    println!("  Scenario 5 complete.");
    println!();

    Ok(())
}

#[cfg(test)]
mod tests {
    use agentgate_contracts::descriptor::Phase;

    use super::*;
    use crate::programs::{allowed_tokens, spending_limit};

    fn assert_decided_by(report: &ExecutionReport, package: &str, reason: &str) {
        let decision = report.deciding().unwrap();
        assert_eq!(decision.entity.package_name, package);
        assert_eq!(decision.phase, Phase::Precheck);
        assert_eq!(decision.reason, reason);
    }

    const LINK_NOT_ALLOWED: &str =
        "Token 0x514910771af9ca656af840dff83e8264ecf986ca is not on the allow list";

    #[tokio::test]
    async fn first_declared_policy_decides() {
        let runtime = SpendingRuntime::new(PipelineConfig::default()).unwrap();
        let (limit_first, tokens_first) = run(&runtime).await.unwrap();

        assert_decided_by(&limit_first, spending_limit::PACKAGE_NAME, spending_limit::DENY_REASON);
        assert_decided_by(&tokens_first, allowed_tokens::PACKAGE_NAME, LINK_NOT_ALLOWED);

        // Sequential precheck stops at the first deny.
        assert!(limit_first
            .policy_outcome(allowed_tokens::PACKAGE_NAME, Phase::Precheck)
            .is_none());
        assert!(limit_first.ability_outcome(Phase::Precheck).is_none());
    }

    #[tokio::test]
    async fn parallel_precheck_reports_the_same_reasons() {
        let config = PipelineConfig {
            parallel_precheck: true,
            ..PipelineConfig::default()
        };
        let runtime = SpendingRuntime::new(config).unwrap();
        let (limit_first, tokens_first) = run(&runtime).await.unwrap();

        assert_decided_by(&limit_first, spending_limit::PACKAGE_NAME, spending_limit::DENY_REASON);
        assert_decided_by(&tokens_first, allowed_tokens::PACKAGE_NAME, LINK_NOT_ALLOWED);

        // Both policies ran; both denied.
        assert!(limit_first
            .policy_outcome(allowed_tokens::PACKAGE_NAME, Phase::Precheck)
            .unwrap()
            .is_deny());
        assert_eq!(runtime.spent_today(), 0);
    }
}
