//! Per-entity, per-phase lifecycle outcomes.
//!
//! Every phase call the executor makes produces exactly one `PhaseRecord`.
//! A record is either a completed `LifecycleOutcome` (the entity answered
//! Allow or Deny within its contract) or a `FailureKind` (it did not).

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{descriptor::Phase, identity::Cid};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    Ability,
    Policy,
}

/// Names the ability or policy a record belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EntityRef {
    pub kind: EntityKind,
    pub package_name: String,
    pub cid: Cid,
}

impl EntityRef {
    pub fn ability(package_name: impl Into<String>, cid: Cid) -> Self {
        Self {
            kind: EntityKind::Ability,
            package_name: package_name.into(),
            cid,
        }
    }

    pub fn policy(package_name: impl Into<String>, cid: Cid) -> Self {
        Self {
            kind: EntityKind::Policy,
            package_name: package_name.into(),
            cid,
        }
    }
}

impl fmt::Display for EntityRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self.kind {
            EntityKind::Ability => "ability",
            EntityKind::Policy => "policy",
        };
        write!(f, "{kind} '{}'", self.package_name)
    }
}

/// Why an entity denied.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DenyReason {
    /// Machine-readable reason code.
    pub code: String,
    /// Human-readable explanation.
    pub message: String,
}

/// An entity's answer for one phase, already checked against its contract.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum LifecycleOutcome {
    Allow {
        payload: Value,
    },
    Deny {
        payload: Value,
        reason: DenyReason,
    },
}

impl LifecycleOutcome {
    pub fn is_allow(&self) -> bool {
        matches!(self, LifecycleOutcome::Allow { .. })
    }

    pub fn payload(&self) -> &Value {
        match self {
            LifecycleOutcome::Allow { payload } | LifecycleOutcome::Deny { payload, .. } => {
                payload
            }
        }
    }
}

/// A phase call that did not produce a valid answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum FailureKind {
    /// The entity returned data outside its declared contract.
    SchemaViolation { reason: String },
    /// The sandbox call itself failed.
    Transport { reason: String },
    /// The call did not return within the configured bound.
    Timeout { after_ms: u64 },
    /// The invocation was cancelled while this call was in flight.
    Cancelled,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureKind::SchemaViolation { reason } => write!(f, "schema violation: {reason}"),
            FailureKind::Transport { reason } => write!(f, "sandbox call failed: {reason}"),
            FailureKind::Timeout { after_ms } => write!(f, "timed out after {after_ms}ms"),
            FailureKind::Cancelled => f.write_str("cancelled in flight"),
        }
    }
}

impl FailureKind {
    /// Short machine-readable code used in report decisions.
    pub fn code(&self) -> &'static str {
        match self {
            FailureKind::SchemaViolation { .. } => "schema_violation",
            FailureKind::Transport { .. } => "transport",
            FailureKind::Timeout { .. } => "timeout",
            FailureKind::Cancelled => "cancelled",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PhaseStatus {
    Completed(LifecycleOutcome),
    Failed(FailureKind),
}

/// One observed phase call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhaseRecord {
    pub entity: EntityRef,
    pub phase: Phase,
    pub status: PhaseStatus,
    pub elapsed_ms: u64,
}

impl PhaseRecord {
    pub fn is_allow(&self) -> bool {
        matches!(&self.status, PhaseStatus::Completed(outcome) if outcome.is_allow())
    }

    pub fn is_deny(&self) -> bool {
        matches!(&self.status, PhaseStatus::Completed(LifecycleOutcome::Deny { .. }))
    }

    pub fn is_failed(&self) -> bool {
        matches!(self.status, PhaseStatus::Failed(_))
    }

    /// The allow payload, if this record is an Allow.
    pub fn allow_payload(&self) -> Option<&Value> {
        match &self.status {
            PhaseStatus::Completed(LifecycleOutcome::Allow { payload }) => Some(payload),
            _ => None,
        }
    }
}

/// The JSON document a sandboxed phase returns, before contract checks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhaseResponse {
    pub allow: bool,
    #[serde(default)]
    pub result: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
}

impl PhaseResponse {
    pub fn allow(result: Value) -> Self {
        Self {
            allow: true,
            result,
            reason: None,
            code: None,
        }
    }

    pub fn deny(result: Value, code: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            allow: false,
            result,
            reason: Some(reason.into()),
            code: Some(code.into()),
        }
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        // A struct of plain JSON values always serializes.
        serde_json::to_vec(self).unwrap_or_default()
    }
}
