//! Error taxonomy for the agentgate pipeline.
//!
//! `GateError` is returned when an invocation cannot produce a report at
//! all: the caller is not authorized, the chain could not be read, or the
//! app's registration is misconfigured. Policy denials, contract violations
//! and sandbox failures are not errors; they are recorded inside the
//! `ExecutionReport`.

use thiserror::Error;

use crate::{
    identity::{AppId, AppVersion},
    report::PipelineState,
};

/// Which policy identity collided in the policy map.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdentityKey {
    PackageName,
    CodeCid,
}

impl std::fmt::Display for IdentityKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            IdentityKey::PackageName => f.write_str("package name"),
            IdentityKey::CodeCid => f.write_str("code CID"),
        }
    }
}

/// Coarse grouping of `GateError` variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// The caller is not allowed to act. Terminal.
    Authorization,
    /// Chain state could not be read. The caller may retry.
    Resolution,
    /// The app, ability or policy registration is broken. Never retried.
    Configuration,
    /// The caller's request is malformed.
    Input,
    /// Pipeline bookkeeping went wrong.
    Internal,
}

#[derive(Debug, Error)]
pub enum GateError {
    #[error("identifier '{field}' must not be empty")]
    InvalidIdentifier { field: &'static str },

    #[error("agent wallet '{agent_wallet}' does not resolve to a known token")]
    UnknownAgentWallet { agent_wallet: String },

    #[error("delegatee '{delegatee}' is not permitted to run ability '{ability}' for agent wallet '{agent_wallet}'")]
    NotPermitted {
        delegatee: String,
        agent_wallet: String,
        ability: String,
    },

    #[error("app {app_id} version {app_version} is disabled")]
    VersionDisabled {
        app_id: AppId,
        app_version: AppVersion,
    },

    #[error("registry query '{query}' failed: {reason}")]
    ResolutionFailed { query: &'static str, reason: String },

    #[error("duplicate policy {key} '{value}'")]
    DuplicatePolicyIdentity { key: IdentityKey, value: String },

    #[error("policy '{policy}' maps ability parameter '{parameter}', which was not supplied")]
    MissingMappedParameter { policy: String, parameter: String },

    #[error("no package registered for CID '{cid}': {reason}")]
    UnknownPackage { cid: String, reason: String },

    #[error("policy '{policy}' has invalid configuration: {reason}")]
    InvalidPolicyConfiguration { policy: String, reason: String },

    #[error("invalid parameters for {entity}: {reason}")]
    InvalidParameters { entity: String, reason: String },

    #[error("illegal lifecycle transition from {from} to {to}")]
    IllegalTransition {
        from: PipelineState,
        to: PipelineState,
    },

    #[error("configuration error: {reason}")]
    ConfigError { reason: String },

    #[error("journal write failed: {reason}")]
    JournalWriteFailed { reason: String },
}

impl GateError {
    pub fn class(&self) -> ErrorClass {
        match self {
            GateError::NotPermitted { .. }
            | GateError::VersionDisabled { .. }
            | GateError::UnknownAgentWallet { .. } => ErrorClass::Authorization,
            GateError::ResolutionFailed { .. } => ErrorClass::Resolution,
            GateError::DuplicatePolicyIdentity { .. }
            | GateError::MissingMappedParameter { .. }
            | GateError::UnknownPackage { .. }
            | GateError::InvalidPolicyConfiguration { .. }
            | GateError::ConfigError { .. } => ErrorClass::Configuration,
            GateError::InvalidIdentifier { .. } | GateError::InvalidParameters { .. } => {
                ErrorClass::Input
            }
            GateError::IllegalTransition { .. }
            | GateError::JournalWriteFailed { .. } => ErrorClass::Internal,
        }
    }

    /// Only resolution failures are worth a caller retry.
    pub fn is_retryable(&self) -> bool {
        self.class() == ErrorClass::Resolution
    }
}

pub type GateResult<T> = Result<T, GateError>;

/// A chain registry query failed at the transport level.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct RegistryError {
    pub message: String,
}

impl RegistryError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// A sandboxed phase call failed before producing output.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct SandboxError {
    pub message: String,
}

impl SandboxError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}
