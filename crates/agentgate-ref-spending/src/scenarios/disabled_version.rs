//! Scenario 4: Disabled version
//!
//! A swap succeeds under version 2. The app manager then disables
//! version 2, and the same request is rejected during permission
//! resolution with no ability or policy code run at all.

use agentgate_contracts::{
    error::{GateError, GateResult},
    report::ExecutionReport,
};
use agentgate_core::PipelineConfig;

use super::print_report;
use crate::market::{USDC, WETH};
use crate::runtime::{swap_request, SpendingRuntime, APP_ID, GUARDED_DELEGATEE, GUARDED_VERSION};

pub const AMOUNT_IN: u128 = 100_000_000;

/// What happened after the version was disabled.
#[derive(Debug)]
pub struct DisabledOutcome {
    /// The allowed swap before the version was disabled.
    pub before: ExecutionReport,
    /// The rejection after it was disabled.
    pub rejection: GateResult<ExecutionReport>,
    /// Sandbox calls made by the rejected invocation.
    pub calls_after_disable: usize,
}

pub async fn run(runtime: &SpendingRuntime) -> GateResult<DisabledOutcome> {
    let before = runtime
        .pipeline
        .invoke(swap_request(GUARDED_DELEGATEE, USDC, WETH, AMOUNT_IN))
        .await?;

    if !runtime
        .registry
        .set_version_enabled(APP_ID, GUARDED_VERSION, false)?
    {
        return Err(GateError::ConfigError {
            reason: format!("app {APP_ID} has no version {GUARDED_VERSION}"),
        });
    }

    let calls = runtime.sandbox.call_count();
    let rejection = runtime
        .pipeline
        .invoke(swap_request(GUARDED_DELEGATEE, USDC, WETH, AMOUNT_IN))
        .await;

    Ok(DisabledOutcome {
        before,
        rejection,
        calls_after_disable: runtime.sandbox.call_count() - calls,
    })
}

pub async fn run_scenario(config: &PipelineConfig) -> GateResult<()> {
    println!("=== Scenario 4: Disabled Version ===");
    println!();

    let runtime = SpendingRuntime::new(config.clone())?;
    let outcome = run(&runtime).await?;

    println!("  Swap 100 USDC -> WETH while version {GUARDED_VERSION} is enabled");
    print_report(&outcome.before);
    println!();
    println!("  Version {GUARDED_VERSION} disabled; same swap again");
    match &outcome.rejection {
        Ok(report) => print_report(report),
        Err(e) => println!("  Rejected:       {e}"),
    }
    println!("  Sandbox calls:  {}", outcome.calls_after_disable);
    println!();
    println!("  Scenario 4 complete.");
    println!();

    Ok(())
}
