//! The execution report returned to the caller of one invocation.
//!
//! Built fresh per invocation by the result aggregator and handed to the
//! caller, who owns it. Retrying means invoking again and getting a new one.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    descriptor::Phase,
    identity::{Identity, InvocationId},
    outcome::{EntityRef, PhaseRecord},
};

/// Lifecycle executor states.
///
/// ```text
/// Init → Precheck → Execute → Commit → Done
///           │          │         │
///           └──────────┴─────────┴──→ Denied | Failed
/// ```
///
/// `Precheck → Done` ends a precheck-only invocation. `Execute → Done` ends
/// an invocation that has nothing to commit or was cancelled before commit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PipelineState {
    Init,
    Precheck,
    Execute,
    Commit,
    Done,
    Denied,
    Failed,
}

impl PipelineState {
    pub fn can_transition_to(self, next: PipelineState) -> bool {
        use PipelineState::*;
        matches!(
            (self, next),
            (Init, Precheck)
                | (Precheck, Execute)
                | (Precheck, Done)
                | (Execute, Commit)
                | (Execute, Done)
                | (Commit, Done)
                | (Precheck | Execute | Commit, Denied | Failed)
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, PipelineState::Done | PipelineState::Denied | PipelineState::Failed)
    }
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            PipelineState::Init => "init",
            PipelineState::Precheck => "precheck",
            PipelineState::Execute => "execute",
            PipelineState::Commit => "commit",
            PipelineState::Done => "done",
            PipelineState::Denied => "denied",
            PipelineState::Failed => "failed",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum InvocationMode {
    Full,
    PrecheckOnly,
}

/// The entity and phase that decided a non-Allow verdict.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Decision {
    pub entity: EntityRef,
    pub phase: Phase,
    pub code: String,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Verdict {
    Allow,
    /// A policy or the ability denied.
    Deny(Decision),
    /// An entity broke its contract or its call could not complete.
    Failed(Decision),
    /// The caller cancelled before the invocation finished; `phase` is the
    /// phase that was not allowed to complete.
    Cancelled { phase: Phase },
}

/// Every phase record for one policy, in the order observed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolicyOutcomes {
    pub policy: EntityRef,
    pub phases: Vec<PhaseRecord>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionReport {
    pub invocation_id: InvocationId,
    pub mode: InvocationMode,
    pub identity: Identity,
    pub ability: EntityRef,
    pub verdict: Verdict,
    pub terminal_state: PipelineState,
    /// The ability's own phase records.
    pub ability_outcomes: Vec<PhaseRecord>,
    /// One entry per policy that was invoked at least once, in declared order.
    pub policy_outcomes: Vec<PolicyOutcomes>,
    /// True when cancellation stopped the pipeline from issuing further calls.
    pub cancelled: bool,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl ExecutionReport {
    pub fn is_allowed(&self) -> bool {
        self.verdict == Verdict::Allow
    }

    /// The deciding entity, phase and reason for a Deny or Failed verdict.
    pub fn deciding(&self) -> Option<&Decision> {
        match &self.verdict {
            Verdict::Deny(decision) | Verdict::Failed(decision) => Some(decision),
            Verdict::Allow | Verdict::Cancelled { .. } => None,
        }
    }

    pub fn ability_outcome(&self, phase: Phase) -> Option<&PhaseRecord> {
        self.ability_outcomes.iter().find(|r| r.phase == phase)
    }

    pub fn policy_outcome(&self, package_name: &str, phase: Phase) -> Option<&PhaseRecord> {
        self.policy_outcomes
            .iter()
            .find(|p| p.policy.package_name == package_name)
            .and_then(|p| p.phases.iter().find(|r| r.phase == phase))
    }

    /// Commit records that did not allow. Never part of the verdict.
    pub fn commit_failures(&self) -> Vec<&PhaseRecord> {
        self.policy_outcomes
            .iter()
            .flat_map(|p| p.phases.iter())
            .filter(|r| r.phase == Phase::Commit && !r.is_allow())
            .collect()
    }

    /// Total number of phase calls observed.
    pub fn call_count(&self) -> usize {
        self.ability_outcomes.len()
            + self
                .policy_outcomes
                .iter()
                .map(|p| p.phases.len())
                .sum::<usize>()
    }
}
