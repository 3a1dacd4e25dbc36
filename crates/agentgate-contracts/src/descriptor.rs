//! Declared contracts of abilities and policies.
//!
//! A contract names a package, points at its content-addressed code, and
//! declares the JSON shapes it accepts and returns per lifecycle phase. The
//! pipeline never trusts a phase output that does not match its contract.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::identity::Cid;

/// The three lifecycle phases an ability or policy may implement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    /// Read-only feasibility check.
    Precheck,
    /// The state-mutating action.
    Execute,
    /// Post-action bookkeeping. Policies only.
    Commit,
}

impl Phase {
    pub fn as_str(self) -> &'static str {
        match self {
            Phase::Precheck => "precheck",
            Phase::Execute => "execute",
            Phase::Commit => "commit",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// JSON Schemas for the allow and deny payloads of one phase.
///
/// A `Value::Null` schema places no constraint on the payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhaseSchemas {
    pub success: Value,
    pub failure: Value,
}

impl PhaseSchemas {
    pub fn new(success: Value, failure: Value) -> Self {
        Self { success, failure }
    }

    /// Schemas that accept any payload.
    pub fn unconstrained() -> Self {
        Self {
            success: Value::Null,
            failure: Value::Null,
        }
    }
}

/// The declared contract of an ability package.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AbilityContract {
    pub package_name: String,
    pub cid: Cid,
    /// Schema for the caller-supplied parameters.
    pub params_schema: Value,
    /// `None` skips the phase for this ability.
    pub precheck: Option<PhaseSchemas>,
    pub execute: Option<PhaseSchemas>,
}

impl AbilityContract {
    /// Declared schemas for `phase`. Abilities never commit.
    pub fn schemas_for(&self, phase: Phase) -> Option<&PhaseSchemas> {
        match phase {
            Phase::Precheck => self.precheck.as_ref(),
            Phase::Execute => self.execute.as_ref(),
            Phase::Commit => None,
        }
    }
}

/// The declared contract of a policy package.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolicyContract {
    pub package_name: String,
    pub cid: Cid,
    /// Schema for the parameters the policy receives through its mapping.
    pub ability_params_schema: Value,
    /// Schema for the decoded on-chain configuration.
    pub user_params_schema: Value,
    pub precheck: Option<PhaseSchemas>,
    pub execute: Option<PhaseSchemas>,
    pub commit: Option<PhaseSchemas>,
}

impl PolicyContract {
    pub fn schemas_for(&self, phase: Phase) -> Option<&PhaseSchemas> {
        match phase {
            Phase::Precheck => self.precheck.as_ref(),
            Phase::Execute => self.execute.as_ref(),
            Phase::Commit => self.commit.as_ref(),
        }
    }
}

/// Maps ability parameter names to the names a policy receives them under.
///
/// Registered per (ability, policy) pair. Only mapped keys ever reach the
/// policy.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ParameterMapping(pub BTreeMap<String, String>);

impl ParameterMapping {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert of `ability_param → policy_param`.
    pub fn map(mut self, ability_param: impl Into<String>, policy_param: impl Into<String>) -> Self {
        self.0.insert(ability_param.into(), policy_param.into());
        self
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &String)> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// The ability parameter that feeds `policy_param`, if any.
    pub fn ability_param_for(&self, policy_param: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(_, target)| target.as_str() == policy_param)
            .map(|(source, _)| source.as_str())
    }
}
