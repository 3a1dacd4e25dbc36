//! The result aggregator: folds phase records into one `ExecutionReport`.
//!
//! Records arrive in observation order. The verdict is decided by precheck
//! and execute records only: the first one that is not an Allow decides it.
//! Commit records are reported but never change the verdict, because by the
//! time a policy commits, the ability's chain effect has already happened.

use chrono::{DateTime, Utc};

use agentgate_contracts::{
    descriptor::Phase,
    identity::{Identity, InvocationId},
    outcome::{EntityKind, EntityRef, LifecycleOutcome, PhaseRecord, PhaseStatus},
    report::{Decision, ExecutionReport, InvocationMode, PipelineState, PolicyOutcomes, Verdict},
};

/// Fold records, in observation order, into a verdict.
///
/// Allow iff every precheck and execute record is an Allow.
pub fn fold_verdict<'r>(records: impl IntoIterator<Item = &'r PhaseRecord>) -> Verdict {
    for record in records {
        if record.phase == Phase::Commit {
            continue;
        }
        match &record.status {
            PhaseStatus::Completed(LifecycleOutcome::Allow { .. }) => {}
            PhaseStatus::Completed(LifecycleOutcome::Deny { reason, .. }) => {
                return Verdict::Deny(Decision {
                    entity: record.entity.clone(),
                    phase: record.phase,
                    code: reason.code.clone(),
                    reason: reason.message.clone(),
                });
            }
            PhaseStatus::Failed(failure) => {
                return Verdict::Failed(Decision {
                    entity: record.entity.clone(),
                    phase: record.phase,
                    code: failure.code().to_string(),
                    reason: failure.to_string(),
                });
            }
        }
    }
    Verdict::Allow
}

pub struct ResultAggregator {
    invocation_id: InvocationId,
    mode: InvocationMode,
    identity: Identity,
    ability: EntityRef,
    /// Declared policy order; reports list policies in this order.
    policies: Vec<EntityRef>,
    observed: Vec<PhaseRecord>,
    cancelled: bool,
    interrupted: Option<Phase>,
    started_at: DateTime<Utc>,
}

impl ResultAggregator {
    pub fn new(
        invocation_id: InvocationId,
        mode: InvocationMode,
        identity: Identity,
        ability: EntityRef,
        policies: Vec<EntityRef>,
        started_at: DateTime<Utc>,
    ) -> Self {
        Self {
            invocation_id,
            mode,
            identity,
            ability,
            policies,
            observed: Vec::new(),
            cancelled: false,
            interrupted: None,
            started_at,
        }
    }

    pub fn invocation_id(&self) -> InvocationId {
        self.invocation_id
    }

    pub fn record(&mut self, record: PhaseRecord) {
        self.observed.push(record);
    }

    /// Note that cancellation stopped further calls.
    ///
    /// `phase` is the phase that could not complete. Cancelling before or
    /// during commit does not touch the verdict.
    pub fn mark_cancelled(&mut self, phase: Phase) {
        self.cancelled = true;
        if phase != Phase::Commit && self.interrupted.is_none() {
            self.interrupted = Some(phase);
        }
    }

    pub fn finish(self, terminal_state: PipelineState) -> ExecutionReport {
        let verdict = match (fold_verdict(&self.observed), self.interrupted) {
            (Verdict::Allow, Some(phase)) => Verdict::Cancelled { phase },
            (verdict, _) => verdict,
        };

        let mut ability_outcomes = Vec::new();
        let mut policy_outcomes: Vec<PolicyOutcomes> = self
            .policies
            .iter()
            .map(|policy| PolicyOutcomes {
                policy: policy.clone(),
                phases: Vec::new(),
            })
            .collect();

        for record in self.observed {
            match record.entity.kind {
                EntityKind::Ability => ability_outcomes.push(record),
                EntityKind::Policy => {
                    if let Some(slot) = policy_outcomes
                        .iter_mut()
                        .find(|slot| slot.policy == record.entity)
                    {
                        slot.phases.push(record);
                    }
                }
            }
        }
        // Policies that were never invoked are not reported.
        policy_outcomes.retain(|slot| !slot.phases.is_empty());

        ExecutionReport {
            invocation_id: self.invocation_id,
            mode: self.mode,
            identity: self.identity,
            ability: self.ability,
            verdict,
            terminal_state,
            ability_outcomes,
            policy_outcomes,
            cancelled: self.cancelled,
            started_at: self.started_at,
            finished_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use agentgate_contracts::{
        identity::{Address, AgentWalletId, AppId, AppVersion, Cid},
        outcome::{DenyReason, FailureKind},
    };

    use super::*;

    fn identity() -> Identity {
        Identity {
            app_id: AppId(1),
            app_version: AppVersion(1),
            delegatee: Address::new("0xd"),
            agent_wallet: AgentWalletId::new("1"),
            agent_wallet_address: Address::new("0xw"),
        }
    }

    fn ability() -> EntityRef {
        EntityRef::ability("swap", Cid::new("QmSwap"))
    }

    fn policy(name: &str) -> EntityRef {
        EntityRef::policy(name, Cid::new(format!("Qm-{name}")))
    }

    fn allow(entity: EntityRef, phase: Phase) -> PhaseRecord {
        PhaseRecord {
            entity,
            phase,
            status: PhaseStatus::Completed(LifecycleOutcome::Allow { payload: json!({}) }),
            elapsed_ms: 0,
        }
    }

    fn deny(entity: EntityRef, phase: Phase, message: &str) -> PhaseRecord {
        PhaseRecord {
            entity,
            phase,
            status: PhaseStatus::Completed(LifecycleOutcome::Deny {
                payload: json!({}),
                reason: DenyReason {
                    code: "denied".to_string(),
                    message: message.to_string(),
                },
            }),
            elapsed_ms: 0,
        }
    }

    fn failed(entity: EntityRef, phase: Phase) -> PhaseRecord {
        PhaseRecord {
            entity,
            phase,
            status: PhaseStatus::Failed(FailureKind::Transport {
                reason: "rpc down".to_string(),
            }),
            elapsed_ms: 0,
        }
    }

    fn aggregator(policies: Vec<EntityRef>) -> ResultAggregator {
        ResultAggregator::new(
            InvocationId::new(),
            InvocationMode::Full,
            identity(),
            ability(),
            policies,
            Utc::now(),
        )
    }

    // ── fold_verdict ─────────────────────────────────────────────────────────

    #[test]
    fn empty_record_set_allows() {
        assert_eq!(fold_verdict(&Vec::<PhaseRecord>::new()), Verdict::Allow);
    }

    #[test]
    fn all_allow_allows() {
        let records = vec![
            allow(policy("a"), Phase::Precheck),
            allow(ability(), Phase::Precheck),
            allow(policy("a"), Phase::Execute),
            allow(ability(), Phase::Execute),
        ];
        assert_eq!(fold_verdict(&records), Verdict::Allow);
    }

    #[test]
    fn first_offender_decides() {
        let records = vec![
            allow(policy("a"), Phase::Execute),
            deny(policy("b"), Phase::Execute, "first"),
            deny(policy("c"), Phase::Execute, "second"),
        ];
        match fold_verdict(&records) {
            Verdict::Deny(decision) => {
                assert_eq!(decision.entity, policy("b"));
                assert_eq!(decision.reason, "first");
            }
            other => panic!("expected Deny, got {:?}", other),
        }
    }

    #[test]
    fn failure_is_distinct_from_denial() {
        let records = vec![failed(policy("a"), Phase::Precheck)];
        match fold_verdict(&records) {
            Verdict::Failed(decision) => {
                assert_eq!(decision.code, "transport");
                assert_eq!(decision.phase, Phase::Precheck);
            }
            other => panic!("expected Failed, got {:?}", other),
        }
    }

    #[test]
    fn commit_records_never_decide() {
        let records = vec![
            allow(policy("a"), Phase::Execute),
            allow(ability(), Phase::Execute),
            failed(policy("a"), Phase::Commit),
            deny(policy("a"), Phase::Commit, "late"),
        ];
        assert_eq!(fold_verdict(&records), Verdict::Allow);
    }

    // ── ResultAggregator ─────────────────────────────────────────────────────

    #[test]
    fn policies_reported_in_declared_order_regardless_of_observation() {
        let mut agg = aggregator(vec![policy("first"), policy("second")]);
        // "second" has a precheck, "first" only executes.
        agg.record(allow(policy("second"), Phase::Precheck));
        agg.record(allow(policy("first"), Phase::Execute));
        agg.record(allow(policy("second"), Phase::Execute));

        let report = agg.finish(PipelineState::Done);
        let names: Vec<&str> = report
            .policy_outcomes
            .iter()
            .map(|p| p.policy.package_name.as_str())
            .collect();
        assert_eq!(names, vec!["first", "second"]);
        assert_eq!(report.policy_outcomes[1].phases.len(), 2);
    }

    #[test]
    fn uninvoked_policies_are_omitted() {
        let mut agg = aggregator(vec![policy("a"), policy("b"), policy("c")]);
        agg.record(allow(policy("a"), Phase::Execute));
        agg.record(deny(policy("b"), Phase::Execute, "no"));

        let report = agg.finish(PipelineState::Denied);
        assert_eq!(report.policy_outcomes.len(), 2);
        assert!(report.policy_outcome("c", Phase::Execute).is_none());
        assert!(!report.is_allowed());
    }

    #[test]
    fn cancellation_before_completion_is_reported() {
        let mut agg = aggregator(vec![policy("a")]);
        agg.record(allow(policy("a"), Phase::Precheck));
        agg.mark_cancelled(Phase::Execute);

        let report = agg.finish(PipelineState::Failed);
        assert!(report.cancelled);
        assert_eq!(report.verdict, Verdict::Cancelled { phase: Phase::Execute });
    }

    #[test]
    fn cancellation_during_commit_keeps_allow() {
        let mut agg = aggregator(vec![policy("a")]);
        agg.record(allow(policy("a"), Phase::Execute));
        agg.record(allow(ability(), Phase::Execute));
        agg.mark_cancelled(Phase::Commit);

        let report = agg.finish(PipelineState::Done);
        assert!(report.cancelled);
        assert!(report.is_allowed());
    }
}
