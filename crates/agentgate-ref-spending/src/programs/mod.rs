//! Reference ability and policy programs.
//!
//! Each program is plain Rust code installed into the `LocalSandbox` and
//! paired with the contract the catalog declares for it.

pub mod allowed_tokens;
pub mod spending_limit;
pub mod swap;

use serde_json::Value;

use agentgate_contracts::error::SandboxError;

pub use allowed_tokens::AllowedTokensPolicy;
pub use spending_limit::SpendingLimitPolicy;
pub use swap::SwapAbility;

/// A required string field of `value`.
pub(crate) fn str_field<'v>(value: &'v Value, name: &str) -> Result<&'v str, SandboxError> {
    value
        .get(name)
        .and_then(Value::as_str)
        .ok_or_else(|| SandboxError::new(format!("missing string field '{name}'")))
}

/// A required base-10 unsigned integer carried as a JSON string.
pub(crate) fn uint_field(value: &Value, name: &str) -> Result<u128, SandboxError> {
    str_field(value, name)?
        .parse::<u128>()
        .map_err(|e| SandboxError::new(format!("field '{name}' is not an unsigned integer: {e}")))
}
