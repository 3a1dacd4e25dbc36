//! The lifecycle executor: drives policies and the ability through
//! precheck → execute → commit.
//!
//! Execution model for one invocation:
//!
//! ```text
//! Precheck: P1 → P2 → … → Pn → ability     (any Deny/Failed stops here)
//! Execute:  P1 → P2 → … → Pn → ability     (ability runs only if all allowed)
//! Commit:   P1 → P2 → … → Pn               (only after the ability executed)
//! ```
//!
//! Policies run in registration order and are never reordered. Precheck is
//! read-only and may be dispatched concurrently; execute and commit are
//! strictly sequential because later policies may depend on the effects of
//! earlier ones. There is no rollback: a Deny in execute leaves any effects
//! of earlier policies in place, and a commit failure never reverses the
//! ability's execute.
//!
//! Every phase output is checked against the entity's declared schema for
//! that phase before it counts. A mismatch is a `Failed` record, distinct
//! from a `Denied` one.

use std::collections::BTreeMap;
use std::time::Instant;

use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use agentgate_contracts::{
    context::{PhaseContext, PriorOutputs},
    descriptor::{AbilityContract, Phase, PhaseSchemas, PolicyContract},
    error::{GateError, GateResult},
    identity::{Identity, InvocationId},
    outcome::{
        DenyReason, EntityKind, EntityRef, FailureKind, LifecycleOutcome, PhaseRecord,
        PhaseResponse, PhaseStatus,
    },
    report::{ExecutionReport, InvocationMode, PipelineState},
};

use crate::{
    aggregate::ResultAggregator,
    config::PipelineConfig,
    traits::{PhaseRunner, SchemaValidator},
};

/// A policy ready to run: its contract plus its private parameters.
#[derive(Debug, Clone)]
pub struct PlannedPolicy {
    pub entity: EntityRef,
    pub contract: PolicyContract,
    /// Mapped ability params, in the policy's namespace.
    pub params: Value,
    /// Decoded on-chain configuration.
    pub user_params: Value,
}

/// Everything the executor needs for one invocation, fully validated.
#[derive(Debug, Clone)]
pub struct InvocationPlan {
    pub invocation_id: InvocationId,
    pub identity: Identity,
    pub ability: EntityRef,
    pub ability_contract: AbilityContract,
    pub ability_params: Value,
    /// In registration order.
    pub policies: Vec<PlannedPolicy>,
}

impl InvocationPlan {
    fn ability_context(&self, phase: Phase, prior: PriorOutputs) -> PhaseContext {
        PhaseContext::new(
            self.invocation_id,
            &self.identity,
            &self.ability,
            self.ability.clone(),
            phase,
        )
        .with_params(self.ability_params.clone(), Value::Object(Default::default()))
        .with_prior(prior)
    }

    fn policy_context(
        &self,
        policy: &PlannedPolicy,
        phase: Phase,
        prior: PriorOutputs,
    ) -> PhaseContext {
        PhaseContext::new(
            self.invocation_id,
            &self.identity,
            &self.ability,
            policy.entity.clone(),
            phase,
        )
        .with_params(policy.params.clone(), policy.user_params.clone())
        .with_prior(prior)
    }
}

enum Flow<T> {
    Continue(T),
    Halt,
}

/// What the execute phase hands to commit.
struct Executed {
    ability_precheck: Option<Value>,
    ability_execute: Option<Value>,
    policy_execute: BTreeMap<String, Value>,
}

pub struct LifecycleExecutor<'a> {
    runner: &'a dyn PhaseRunner,
    validator: &'a dyn SchemaValidator,
    config: &'a PipelineConfig,
    cancel: CancellationToken,
    state: PipelineState,
    aggregator: ResultAggregator,
}

impl<'a> LifecycleExecutor<'a> {
    pub fn new(
        runner: &'a dyn PhaseRunner,
        validator: &'a dyn SchemaValidator,
        config: &'a PipelineConfig,
        cancel: CancellationToken,
        aggregator: ResultAggregator,
    ) -> Self {
        Self {
            runner,
            validator,
            config,
            cancel,
            state: PipelineState::Init,
            aggregator,
        }
    }

    pub fn state(&self) -> PipelineState {
        self.state
    }

    /// Run `plan` to a terminal state and return the report.
    ///
    /// # Errors
    ///
    /// Only `IllegalTransition`, which indicates a bug in the executor
    /// itself. Denials, contract violations and sandbox failures are all
    /// recorded in the report.
    pub async fn run(
        mut self,
        plan: &InvocationPlan,
        mode: InvocationMode,
    ) -> GateResult<ExecutionReport> {
        self.transition(PipelineState::Precheck)?;
        let ability_precheck = match self.run_precheck(plan).await? {
            Flow::Continue(payload) => payload,
            Flow::Halt => return Ok(self.finish()),
        };

        if mode == InvocationMode::PrecheckOnly {
            self.transition(PipelineState::Done)?;
            return Ok(self.finish());
        }

        self.transition(PipelineState::Execute)?;
        let executed = match self.run_execute(plan, ability_precheck).await? {
            Flow::Continue(executed) => executed,
            Flow::Halt => return Ok(self.finish()),
        };

        if executed.ability_execute.is_none() {
            debug!(
                invocation_id = %plan.invocation_id,
                "ability declares no execute phase; nothing to commit"
            );
            self.transition(PipelineState::Done)?;
            return Ok(self.finish());
        }

        if self.cancel.is_cancelled() {
            self.aggregator.mark_cancelled(Phase::Commit);
            warn!(
                invocation_id = %plan.invocation_id,
                "cancelled after execute; commits not issued"
            );
            self.transition(PipelineState::Done)?;
            return Ok(self.finish());
        }

        self.transition(PipelineState::Commit)?;
        self.run_commit(plan, executed).await;
        self.transition(PipelineState::Done)?;
        Ok(self.finish())
    }

    // ── Phases ───────────────────────────────────────────────────────────────

    async fn run_precheck(&mut self, plan: &InvocationPlan) -> GateResult<Flow<Option<Value>>> {
        let prechecking: Vec<(&PlannedPolicy, &PhaseSchemas)> = plan
            .policies
            .iter()
            .filter_map(|p| p.contract.schemas_for(Phase::Precheck).map(|s| (p, s)))
            .collect();

        let mut prior = PriorOutputs::default();

        if self.config.parallel_precheck && prechecking.len() > 1 {
            if self.cancel.is_cancelled() {
                return self.interrupt(Phase::Precheck);
            }
            let calls = prechecking.iter().map(|(policy, schemas)| {
                let context = plan.policy_context(policy, Phase::Precheck, PriorOutputs::default());
                self.call(&policy.entity, schemas, context, true)
            });
            let records = futures::future::join_all(calls).await;

            // Every dispatched call is reported; the first non-Allow in
            // declared order decides, exactly as a sequential run would.
            let first_bad = records.iter().find(|r| !r.is_allow()).cloned();
            for record in records {
                if let Some(payload) = record.allow_payload() {
                    prior
                        .policies
                        .insert(record.entity.package_name.clone(), payload.clone());
                }
                self.aggregator.record(record);
            }
            if let Some(record) = first_bad {
                self.halt_on(&record)?;
                return Ok(Flow::Halt);
            }
        } else {
            for (policy, schemas) in prechecking {
                if self.cancel.is_cancelled() {
                    return self.interrupt(Phase::Precheck);
                }
                let context = plan.policy_context(policy, Phase::Precheck, PriorOutputs::default());
                let record = self.call(&policy.entity, schemas, context, true).await;
                let Some(payload) = self.settle(record)? else {
                    return Ok(Flow::Halt);
                };
                prior.policies.insert(policy.entity.package_name.clone(), payload);
            }
        }

        // The ability's own precheck is the last precheck step.
        let Some(schemas) = plan.ability_contract.schemas_for(Phase::Precheck) else {
            return Ok(Flow::Continue(None));
        };
        if self.cancel.is_cancelled() {
            return self.interrupt(Phase::Precheck);
        }
        let context = plan.ability_context(Phase::Precheck, prior);
        let record = self.call(&plan.ability, schemas, context, true).await;
        match self.settle(record)? {
            Some(payload) => Ok(Flow::Continue(Some(payload))),
            None => Ok(Flow::Halt),
        }
    }

    async fn run_execute(
        &mut self,
        plan: &InvocationPlan,
        ability_precheck: Option<Value>,
    ) -> GateResult<Flow<Executed>> {
        let mut prior = PriorOutputs {
            ability_precheck: ability_precheck.clone(),
            ..PriorOutputs::default()
        };

        for policy in &plan.policies {
            let Some(schemas) = policy.contract.schemas_for(Phase::Execute) else {
                continue;
            };
            if self.cancel.is_cancelled() {
                return self.interrupt(Phase::Execute);
            }
            // Each policy sees the ability's precheck output and the execute
            // results of every policy before it.
            let context = plan.policy_context(policy, Phase::Execute, prior.clone());
            let record = self.call(&policy.entity, schemas, context, true).await;
            let Some(payload) = self.settle(record)? else {
                return Ok(Flow::Halt);
            };
            prior.policies.insert(policy.entity.package_name.clone(), payload);
        }

        let ability_execute = match plan.ability_contract.schemas_for(Phase::Execute) {
            None => None,
            Some(schemas) => {
                if self.cancel.is_cancelled() {
                    return self.interrupt(Phase::Execute);
                }
                let context = plan.ability_context(Phase::Execute, prior.clone());
                let record = self.call(&plan.ability, schemas, context, true).await;
                match self.settle(record)? {
                    Some(payload) => Some(payload),
                    None => return Ok(Flow::Halt),
                }
            }
        };

        Ok(Flow::Continue(Executed {
            ability_precheck,
            ability_execute,
            policy_execute: prior.policies,
        }))
    }

    /// Commit failures are recorded and logged, never propagated.
    async fn run_commit(&mut self, plan: &InvocationPlan, executed: Executed) {
        for policy in &plan.policies {
            let Some(schemas) = policy.contract.schemas_for(Phase::Commit) else {
                continue;
            };
            if self.cancel.is_cancelled() {
                self.aggregator.mark_cancelled(Phase::Commit);
                warn!(
                    invocation_id = %plan.invocation_id,
                    policy = %policy.entity.package_name,
                    "cancelled during commit; remaining commits not issued"
                );
                return;
            }

            let prior = PriorOutputs {
                ability_precheck: executed.ability_precheck.clone(),
                policies: BTreeMap::new(),
                ability_execute: executed.ability_execute.clone(),
                own_execute: executed.policy_execute.get(&policy.entity.package_name).cloned(),
            };
            let context = plan.policy_context(policy, Phase::Commit, prior);

            // An in-flight commit is allowed to finish even if the caller
            // cancels meanwhile.
            let record = self.call(&policy.entity, schemas, context, false).await;
            if !record.is_allow() {
                warn!(
                    invocation_id = %plan.invocation_id,
                    policy = %policy.entity.package_name,
                    status = ?record.status,
                    "policy commit did not complete; execute verdict stands"
                );
            }
            self.aggregator.record(record);
        }
    }

    // ── Single phase call ────────────────────────────────────────────────────

    /// Dispatch one phase call and turn whatever comes back into a record.
    async fn call(
        &self,
        entity: &EntityRef,
        schemas: &PhaseSchemas,
        context: PhaseContext,
        cancellable: bool,
    ) -> PhaseRecord {
        let phase = context.phase;
        let timeout = self.config.phase_timeout();
        let started = Instant::now();

        debug!(
            invocation_id = %context.invocation_id,
            entity = %entity,
            phase = %phase,
            "dispatching phase"
        );

        let bounded = tokio::time::timeout(
            timeout,
            self.runner.run_phase(&entity.cid, phase, &context),
        );

        let outcome = if cancellable {
            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => None,
                result = bounded => Some(result),
            }
        } else {
            Some(bounded.await)
        };

        let status = match outcome {
            None => PhaseStatus::Failed(FailureKind::Cancelled),
            Some(Err(_elapsed)) => PhaseStatus::Failed(FailureKind::Timeout {
                after_ms: self.config.phase_timeout_ms,
            }),
            Some(Ok(Err(e))) => PhaseStatus::Failed(FailureKind::Transport {
                reason: e.to_string(),
            }),
            Some(Ok(Ok(bytes))) => self.interpret(entity, phase, schemas, &bytes),
        };

        PhaseRecord {
            entity: entity.clone(),
            phase,
            status,
            elapsed_ms: started.elapsed().as_millis() as u64,
        }
    }

    /// Decode a phase response and check it against the declared schema.
    fn interpret(
        &self,
        entity: &EntityRef,
        phase: Phase,
        schemas: &PhaseSchemas,
        bytes: &[u8],
    ) -> PhaseStatus {
        let response: PhaseResponse = match serde_json::from_slice(bytes) {
            Ok(response) => response,
            Err(e) => {
                return PhaseStatus::Failed(FailureKind::SchemaViolation {
                    reason: format!("malformed phase response: {e}"),
                })
            }
        };

        let (schema, which) = if response.allow {
            (&schemas.success, "success")
        } else {
            (&schemas.failure, "failure")
        };
        let schema_id = format!("{}:{}:{}", entity.package_name, phase, which);

        match self.validator.validate(&schema_id, schema, &response.result) {
            Ok(report) if report.passed => {}
            Ok(report) => {
                return PhaseStatus::Failed(FailureKind::SchemaViolation {
                    reason: format!("{which} payload violates {schema_id}: {}", report.summary()),
                })
            }
            Err(e) => {
                return PhaseStatus::Failed(FailureKind::SchemaViolation {
                    reason: e.to_string(),
                })
            }
        }

        if response.allow {
            return PhaseStatus::Completed(LifecycleOutcome::Allow {
                payload: response.result,
            });
        }

        let default_code = match entity.kind {
            EntityKind::Ability => "ability_denied",
            EntityKind::Policy => "policy_denied",
        };
        PhaseStatus::Completed(LifecycleOutcome::Deny {
            payload: response.result,
            reason: DenyReason {
                code: response.code.unwrap_or_else(|| default_code.to_string()),
                message: response
                    .reason
                    .unwrap_or_else(|| format!("{} denied during {}", entity.package_name, phase)),
            },
        })
    }

    // ── State bookkeeping ────────────────────────────────────────────────────

    fn transition(&mut self, next: PipelineState) -> GateResult<()> {
        if !self.state.can_transition_to(next) {
            return Err(GateError::IllegalTransition {
                from: self.state,
                to: next,
            });
        }
        debug!(
            invocation_id = %self.aggregator.invocation_id(),
            from = %self.state,
            to = %next,
            "lifecycle transition"
        );
        self.state = next;
        Ok(())
    }

    /// Record a sequential call. Returns the allow payload, or `None` after
    /// moving to the matching terminal state.
    fn settle(&mut self, record: PhaseRecord) -> GateResult<Option<Value>> {
        if let Some(payload) = record.allow_payload() {
            let payload = payload.clone();
            self.aggregator.record(record);
            return Ok(Some(payload));
        }
        self.halt_on(&record)?;
        self.aggregator.record(record);
        Ok(None)
    }

    fn halt_on(&mut self, record: &PhaseRecord) -> GateResult<()> {
        match &record.status {
            PhaseStatus::Completed(LifecycleOutcome::Deny { reason, .. }) => {
                warn!(
                    invocation_id = %self.aggregator.invocation_id(),
                    entity = %record.entity,
                    phase = %record.phase,
                    code = %reason.code,
                    reason = %reason.message,
                    "denied"
                );
                self.transition(PipelineState::Denied)
            }
            PhaseStatus::Failed(failure) => {
                warn!(
                    invocation_id = %self.aggregator.invocation_id(),
                    entity = %record.entity,
                    phase = %record.phase,
                    failure = %failure,
                    "phase failed"
                );
                if *failure == FailureKind::Cancelled {
                    self.aggregator.mark_cancelled(record.phase);
                }
                self.transition(PipelineState::Failed)
            }
            PhaseStatus::Completed(LifecycleOutcome::Allow { .. }) => Ok(()),
        }
    }

    fn interrupt<T>(&mut self, phase: Phase) -> GateResult<Flow<T>> {
        warn!(
            invocation_id = %self.aggregator.invocation_id(),
            phase = %phase,
            "invocation cancelled; no further calls issued"
        );
        self.aggregator.mark_cancelled(phase);
        self.transition(PipelineState::Failed)?;
        Ok(Flow::Halt)
    }

    fn finish(self) -> ExecutionReport {
        self.aggregator.finish(self.state)
    }
}
