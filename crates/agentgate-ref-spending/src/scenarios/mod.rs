//! Reference runtime scenarios.
//!
//! Each scenario builds a fresh `SpendingRuntime`, so spend recorded by one
//! never leaks into another, and demonstrates one enforcement pattern.

pub mod commit_failure;
pub mod disabled_version;
pub mod happy_path;
pub mod ordering;
pub mod spend_limit;

use agentgate_contracts::{
    outcome::{LifecycleOutcome, PhaseStatus},
    report::{ExecutionReport, Verdict},
};

/// Print the verdict and every observed phase of `report`.
pub(crate) fn print_report(report: &ExecutionReport) {
    match &report.verdict {
        Verdict::Allow => println!("  Verdict:        Allow"),
        Verdict::Deny(d) => println!("  Verdict:        Deny by {} in {}: {}", d.entity, d.phase, d.reason),
        Verdict::Failed(d) => println!("  Verdict:        Failed at {} in {}: {}", d.entity, d.phase, d.reason),
        Verdict::Cancelled { phase } => println!("  Verdict:        Cancelled during {}", phase),
    }
    println!("  Terminal state: {}", report.terminal_state);

    let policy_records = report.policy_outcomes.iter().flat_map(|p| p.phases.iter());
    for record in policy_records.chain(report.ability_outcomes.iter()) {
        let status = match &record.status {
            PhaseStatus::Completed(LifecycleOutcome::Allow { .. }) => "allow".to_string(),
            PhaseStatus::Completed(LifecycleOutcome::Deny { reason, .. }) => {
                format!("deny ({})", reason.code)
            }
            PhaseStatus::Failed(failure) => format!("failed ({})", failure),
        };
        println!(
            "    {:<8} {:<36} {}",
            record.phase.as_str(),
            record.entity.package_name,
            status
        );
    }
}
