//! Trait seams of the agentgate pipeline.
//!
//! These four traits are the complete boundary between the pipeline and its
//! collaborators:
//!
//! - `ChainRegistry`   — read-only on-chain delegation and policy state
//! - `PhaseRunner`     — the sandbox that runs ability/policy phase code
//! - `SchemaValidator` — checks payloads against declared JSON shapes
//! - `ReportSink`      — receives every finished execution report
//!
//! The pipeline owns ordering, parameter isolation and failure propagation.
//! It never inspects what happens inside a `PhaseRunner` call; it only
//! validates what comes back.

use async_trait::async_trait;
use serde_json::Value;

use agentgate_contracts::{
    context::PhaseContext,
    descriptor::Phase,
    error::{GateResult, RegistryError, SandboxError},
    identity::{Address, AgentWalletId, AppId, AppVersion, Cid},
    permission::{PermissionGrant, RegisteredPolicy},
    report::ExecutionReport,
    schema::ValidationReport,
};

/// Read-only view of the on-chain app registry.
///
/// Every method is a suspending chain read. `Ok(None)` means the chain
/// answered and there is nothing there; `Err` means the chain could not be
/// asked.
#[async_trait]
pub trait ChainRegistry: Send + Sync {
    /// Resolve an agent wallet token id to its account address.
    async fn agent_wallet_address(
        &self,
        agent_wallet: &AgentWalletId,
    ) -> Result<Option<Address>, RegistryError>;

    /// The app version, if any, the delegatee may currently act under for
    /// this agent wallet.
    async fn resolve_permission(
        &self,
        delegatee: &Address,
        agent_wallet: &AgentWalletId,
    ) -> Result<Option<PermissionGrant>, RegistryError>;

    /// Policies attached to `ability` under the app version, in
    /// registration order. `Ok(None)` when the ability is not part of the
    /// version at all.
    async fn resolve_ability_policies(
        &self,
        app_id: AppId,
        app_version: AppVersion,
        ability: &Cid,
    ) -> Result<Option<Vec<RegisteredPolicy>>, RegistryError>;
}

/// The sandboxed code execution capability.
///
/// Returns the raw phase response bytes. Decoding and contract checks are
/// the pipeline's job.
#[async_trait]
pub trait PhaseRunner: Send + Sync {
    async fn run_phase(
        &self,
        code_cid: &Cid,
        phase: Phase,
        context: &PhaseContext,
    ) -> Result<Vec<u8>, SandboxError>;
}

/// Validates untyped payloads against declared JSON shapes.
///
/// Implementations must be deterministic and free of I/O. A `Value::Null`
/// schema means "no constraint" and must pass.
pub trait SchemaValidator: Send + Sync {
    fn validate(
        &self,
        schema_id: &str,
        schema: &Value,
        payload: &Value,
    ) -> GateResult<ValidationReport>;
}

/// Receives each finished `ExecutionReport`.
pub trait ReportSink: Send + Sync {
    fn record(&self, report: &ExecutionReport) -> GateResult<()>;
}
