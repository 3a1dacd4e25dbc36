//! The explicit context object handed to every sandboxed phase call.
//!
//! Phase code never reads caller identity or parent-ability identifiers from
//! ambient state. Everything it may rely on is in `PhaseContext`, including
//! the outputs of earlier stages it is allowed to chain on.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{
    descriptor::Phase,
    identity::{Address, AppId, AppVersion, Cid, Identity, InvocationId},
    outcome::EntityRef,
};

/// Outputs of earlier stages made visible to a later one.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PriorOutputs {
    /// The ability's precheck allow payload, once it exists.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ability_precheck: Option<Value>,
    /// Allow payloads of policies that already ran in the current phase,
    /// keyed by package name.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub policies: BTreeMap<String, Value>,
    /// The ability's execute allow payload. Present during commit.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ability_execute: Option<Value>,
    /// The policy's own execute allow payload. Present during commit.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub own_execute: Option<Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhaseContext {
    pub invocation_id: InvocationId,
    pub app_id: AppId,
    pub app_version: AppVersion,
    pub delegatee_address: Address,
    pub agent_wallet_address: Address,
    pub ability_cid: Cid,
    pub ability_package: String,
    /// The ability or policy this call runs.
    pub entity: EntityRef,
    pub phase: Phase,
    /// Ability params for the ability; mapped params for a policy.
    pub params: Value,
    /// Decoded policy configuration. An empty object for the ability.
    pub user_params: Value,
    pub prior: PriorOutputs,
}

impl PhaseContext {
    /// Start a context for `entity` under `identity`. Params and prior
    /// outputs are filled in by the caller.
    pub fn new(
        invocation_id: InvocationId,
        identity: &Identity,
        ability: &EntityRef,
        entity: EntityRef,
        phase: Phase,
    ) -> Self {
        Self {
            invocation_id,
            app_id: identity.app_id,
            app_version: identity.app_version,
            delegatee_address: identity.delegatee.clone(),
            agent_wallet_address: identity.agent_wallet_address.clone(),
            ability_cid: ability.cid.clone(),
            ability_package: ability.package_name.clone(),
            entity,
            phase,
            params: Value::Object(Default::default()),
            user_params: Value::Object(Default::default()),
            prior: PriorOutputs::default(),
        }
    }

    pub fn with_params(mut self, params: Value, user_params: Value) -> Self {
        self.params = params;
        self.user_params = user_params;
        self
    }

    pub fn with_prior(mut self, prior: PriorOutputs) -> Self {
        self.prior = prior;
        self
    }
}
