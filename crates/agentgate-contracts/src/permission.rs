//! Registry query results and the resolved permission record.

use serde::{Deserialize, Serialize};

use crate::{
    descriptor::ParameterMapping,
    identity::{AppId, AppVersion, Cid, Identity},
    params::{RawParam, UserParams},
};

/// Current delegation state for a (delegatee, agent wallet) pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionGrant {
    pub app_id: AppId,
    pub app_version: AppVersion,
    /// Versions can be disabled without revoking the delegation itself.
    pub enabled: bool,
}

/// A policy attached to an ability under one app version, as stored on chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisteredPolicy {
    pub policy_cid: Cid,
    pub package_name: String,
    pub parameter_mapping: ParameterMapping,
    /// Configured values, still undecoded.
    pub configured_params: Vec<RawParam>,
}

/// A registered policy after its configuration has been decoded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedPolicy {
    pub policy_cid: Cid,
    pub package_name: String,
    pub parameter_mapping: ParameterMapping,
    pub user_params: UserParams,
}

/// The permission resolver's output.
///
/// A snapshot valid for one invocation only. `policies` is in on-chain
/// registration order and is never reordered or deduplicated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionRecord {
    pub identity: Identity,
    pub ability_cid: Cid,
    pub policies: Vec<ResolvedPolicy>,
}
