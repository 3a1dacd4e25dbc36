//! The pipeline: the single entry point for invoking an ability.
//!
//! Every invocation runs the same sequence:
//!
//!   Resolve permission → Build policy map → Map parameters → Validate
//!   → Precheck → Execute → Commit → Report
//!
//! Everything up to and including validation happens before the first
//! sandbox call. An invocation that is not permitted, or whose policies are
//! misregistered, never reaches a `PhaseRunner`. Those failures are returned
//! as `Err`; once phases start, the outcome is always an `ExecutionReport`.

use std::sync::Arc;

use chrono::Utc;
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use agentgate_contracts::{
    descriptor::ParameterMapping,
    error::{ErrorClass, GateError, GateResult},
    identity::{Address, AgentWalletId, Cid, Identity, InvocationId},
    outcome::EntityRef,
    params::user_params_to_json,
    permission::PermissionRecord,
    report::{ExecutionReport, InvocationMode},
    schema::ValidationReport,
};

use crate::{
    aggregate::ResultAggregator,
    catalog::PackageCatalog,
    config::PipelineConfig,
    lifecycle::{InvocationPlan, LifecycleExecutor, PlannedPolicy},
    mapper,
    policy_map::PolicyMap,
    resolver::PermissionResolver,
    traits::{ChainRegistry, PhaseRunner, ReportSink, SchemaValidator},
};

/// One request to run an ability on behalf of an agent wallet.
#[derive(Debug, Clone)]
pub struct InvocationRequest {
    pub delegatee: Address,
    pub agent_wallet: AgentWalletId,
    pub ability_cid: Cid,
    /// Ability parameters. Must be a JSON object.
    pub params: Value,
}

pub struct Pipeline {
    registry: Arc<dyn ChainRegistry>,
    runner: Arc<dyn PhaseRunner>,
    validator: Arc<dyn SchemaValidator>,
    catalog: Arc<PackageCatalog>,
    sink: Option<Arc<dyn ReportSink>>,
    config: PipelineConfig,
}

impl Pipeline {
    /// # Errors
    ///
    /// `ConfigError` when `config` has a zero timeout.
    pub fn new(
        registry: Arc<dyn ChainRegistry>,
        runner: Arc<dyn PhaseRunner>,
        validator: Arc<dyn SchemaValidator>,
        catalog: Arc<PackageCatalog>,
        config: PipelineConfig,
    ) -> GateResult<Self> {
        config.validate()?;
        Ok(Self {
            registry,
            runner,
            validator,
            catalog,
            sink: None,
            config,
        })
    }

    /// Hand every finished report to `sink`.
    pub fn with_sink(mut self, sink: Arc<dyn ReportSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Run the full lifecycle for `request`.
    ///
    /// # Errors
    ///
    /// Authorization, resolution and configuration failures, and malformed
    /// parameters. A Deny or a failed phase is not an error: it is reported
    /// in the returned `ExecutionReport`.
    pub async fn invoke(&self, request: InvocationRequest) -> GateResult<ExecutionReport> {
        self.run(request, InvocationMode::Full, CancellationToken::new())
            .await
    }

    /// Like `invoke`, but stops issuing calls once `cancel` fires.
    ///
    /// Precheck and execute calls in flight are abandoned. A commit in flight
    /// is allowed to finish; commits not yet issued are skipped.
    pub async fn invoke_with_cancel(
        &self,
        request: InvocationRequest,
        cancel: CancellationToken,
    ) -> GateResult<ExecutionReport> {
        self.run(request, InvocationMode::Full, cancel).await
    }

    /// Run only the precheck phase: "would this be allowed right now?"
    pub async fn precheck(&self, request: InvocationRequest) -> GateResult<ExecutionReport> {
        self.run(request, InvocationMode::PrecheckOnly, CancellationToken::new())
            .await
    }

    async fn run(
        &self,
        request: InvocationRequest,
        mode: InvocationMode,
        cancel: CancellationToken,
    ) -> GateResult<ExecutionReport> {
        let plan = self.plan(&request).await?;

        info!(
            invocation_id = %plan.invocation_id,
            delegatee = %plan.identity.delegatee,
            agent_wallet = %plan.identity.agent_wallet,
            app_id = %plan.identity.app_id,
            app_version = %plan.identity.app_version,
            ability = %plan.ability,
            policy_count = plan.policies.len(),
            mode = ?mode,
            "invocation starting"
        );

        let aggregator = ResultAggregator::new(
            plan.invocation_id,
            mode,
            plan.identity.clone(),
            plan.ability.clone(),
            plan.policies.iter().map(|p| p.entity.clone()).collect(),
            Utc::now(),
        );
        let report = LifecycleExecutor::new(
            self.runner.as_ref(),
            self.validator.as_ref(),
            &self.config,
            cancel,
            aggregator,
        )
        .run(&plan, mode)
        .await?;

        info!(
            invocation_id = %report.invocation_id,
            verdict = ?report.verdict,
            terminal_state = %report.terminal_state,
            calls = report.call_count(),
            commit_failures = report.commit_failures().len(),
            "invocation finished"
        );

        if let Some(sink) = &self.sink {
            if let Err(e) = sink.record(&report) {
                error!(
                    invocation_id = %report.invocation_id,
                    error = %e,
                    "failed to record execution report"
                );
            }
        }

        Ok(report)
    }

    /// Resolve, map and validate everything the lifecycle needs. No sandbox
    /// call happens here.
    async fn plan(&self, request: &InvocationRequest) -> GateResult<InvocationPlan> {
        // ── Step 1: Permission ───────────────────────────────────────────────
        let record = match PermissionResolver::new(
            self.registry.as_ref(),
            self.config.resolution_timeout(),
        )
        .resolve(&request.delegatee, &request.agent_wallet, &request.ability_cid)
        .await
        {
            Ok(record) => record,
            Err(e) => {
                log_rejection(request, &e);
                return Err(e);
            }
        };

        let identity = record.identity.clone();
        self.prepare(request, record).map_err(|e| {
            log_planning_failure(&identity, &request.ability_cid, &e);
            e
        })
    }

    /// Steps 2 to 4 of planning, for a request whose permission resolved.
    fn prepare(
        &self,
        request: &InvocationRequest,
        record: PermissionRecord,
    ) -> GateResult<InvocationPlan> {
        // ── Step 2: Ability contract and params ──────────────────────────────
        let ability_contract = self.catalog.ability(&record.ability_cid)?;
        let ability = EntityRef::ability(&ability_contract.package_name, record.ability_cid.clone());

        let Value::Object(ability_params) = &request.params else {
            return Err(GateError::InvalidParameters {
                entity: ability.to_string(),
                reason: "ability parameters must be a JSON object".to_string(),
            });
        };
        let report = self.validator.validate(
            &format!("{}:params", ability_contract.package_name),
            &ability_contract.params_schema,
            &request.params,
        )?;
        if !report.passed {
            return Err(GateError::InvalidParameters {
                entity: ability.to_string(),
                reason: report.summary(),
            });
        }

        // ── Step 3: Policy map ───────────────────────────────────────────────
        let policy_map = PolicyMap::build(record.policies)?;

        // ── Step 4: Per-policy parameters ────────────────────────────────────
        let mut policies = Vec::with_capacity(policy_map.len());
        for resolved in policy_map.iter() {
            let contract = self
                .catalog
                .policy(&resolved.policy_cid, &resolved.package_name)?;
            let entity = EntityRef::policy(&resolved.package_name, resolved.policy_cid.clone());

            let params = Value::Object(mapper::project(
                ability_params,
                &resolved.parameter_mapping,
                &resolved.package_name,
            )?);
            let report = self.validator.validate(
                &format!("{}:abilityParams", resolved.package_name),
                &contract.ability_params_schema,
                &params,
            )?;
            if !report.passed {
                return Err(GateError::InvalidParameters {
                    entity: entity.to_string(),
                    reason: in_ability_terms(report, &resolved.parameter_mapping).summary(),
                });
            }

            let user_params = user_params_to_json(&resolved.user_params);
            let report = self.validator.validate(
                &format!("{}:userParams", resolved.package_name),
                &contract.user_params_schema,
                &user_params,
            )?;
            if !report.passed {
                return Err(GateError::InvalidPolicyConfiguration {
                    policy: resolved.package_name.clone(),
                    reason: report.summary(),
                });
            }

            policies.push(PlannedPolicy {
                entity,
                contract: contract.clone(),
                params,
                user_params,
            });
        }

        Ok(InvocationPlan {
            invocation_id: InvocationId::new(),
            identity: record.identity,
            ability,
            ability_contract: ability_contract.clone(),
            ability_params: request.params.clone(),
            policies,
        })
    }
}

/// Rewrite failure paths so they name the ability parameters the caller
/// actually sent.
fn in_ability_terms(
    mut report: ValidationReport,
    mapping: &ParameterMapping,
) -> ValidationReport {
    for failure in &mut report.failures {
        failure.path = mapper::reverse_path(&failure.path, mapping);
    }
    report
}

/// Registration and internal faults are operator problems; everything else
/// is the caller's.
fn is_misconfiguration(e: &GateError) -> bool {
    matches!(e.class(), ErrorClass::Configuration | ErrorClass::Internal)
}

/// A rejection before the identity resolved.
fn log_rejection(request: &InvocationRequest, e: &GateError) {
    if is_misconfiguration(e) {
        error!(
            delegatee = %request.delegatee,
            agent_wallet = %request.agent_wallet,
            ability = %request.ability_cid,
            error = %e,
            "invocation rejected: misconfigured registration"
        );
    } else {
        warn!(
            delegatee = %request.delegatee,
            agent_wallet = %request.agent_wallet,
            ability = %request.ability_cid,
            error = %e,
            "invocation rejected"
        );
    }
}

/// A rejection after the identity resolved. Names the app version so a bad
/// registration can be traced to the version that published it.
fn log_planning_failure(identity: &Identity, ability: &Cid, e: &GateError) {
    if is_misconfiguration(e) {
        error!(
            delegatee = %identity.delegatee,
            agent_wallet = %identity.agent_wallet,
            app_id = %identity.app_id,
            app_version = %identity.app_version,
            ability = %ability,
            error = %e,
            "invocation rejected: misconfigured registration"
        );
    } else {
        warn!(
            delegatee = %identity.delegatee,
            agent_wallet = %identity.agent_wallet,
            app_id = %identity.app_id,
            app_version = %identity.app_version,
            ability = %ability,
            error = %e,
            "invocation rejected"
        );
    }
}
