//! The allowed-tokens policy: the traded token must be on a configured list.

use serde_json::{json, Value};

use agentgate_contracts::{
    context::PhaseContext,
    descriptor::{Phase, PhaseSchemas, PolicyContract},
    error::SandboxError,
    identity::Cid,
    outcome::PhaseResponse,
};

use super::str_field;
use crate::sandbox::LocalProgram;

pub const PACKAGE_NAME: &str = "@agentgate/policy-allowed-tokens";

pub const DENY_CODE: &str = "token_not_allowed";

pub struct AllowedTokensPolicy;

impl AllowedTokensPolicy {
    pub fn contract(cid: Cid) -> PolicyContract {
        let verdict = json!({
            "type": "object",
            "required": ["token"]
        });
        PolicyContract {
            package_name: PACKAGE_NAME.to_string(),
            cid,
            ability_params_schema: json!({
                "type": "object",
                "properties": {
                    "token": { "type": "string", "format": "evm-address" }
                },
                "required": ["token"]
            }),
            user_params_schema: json!({
                "type": "object",
                "properties": {
                    "allowedTokens": {
                        "type": "array",
                        "items": { "type": "string", "format": "evm-address" }
                    }
                },
                "required": ["allowedTokens"]
            }),
            precheck: Some(PhaseSchemas::new(verdict.clone(), verdict.clone())),
            execute: Some(PhaseSchemas::new(verdict.clone(), verdict)),
            commit: None,
        }
    }
}

impl LocalProgram for AllowedTokensPolicy {
    fn run(&self, phase: Phase, context: &PhaseContext) -> Result<PhaseResponse, SandboxError> {
        if phase == Phase::Commit {
            return Err(SandboxError::new("allowed-tokens declares no commit"));
        }

        let token = str_field(&context.params, "token")?;
        let allowed = context
            .user_params
            .get("allowedTokens")
            .and_then(Value::as_array)
            .ok_or_else(|| SandboxError::new("missing allowedTokens configuration"))?;

        let listed = allowed
            .iter()
            .filter_map(Value::as_str)
            .any(|t| t.eq_ignore_ascii_case(token));

        if listed {
            Ok(PhaseResponse::allow(json!({ "token": token })))
        } else {
            Ok(PhaseResponse::deny(
                json!({ "token": token }),
                DENY_CODE,
                format!("Token {token} is not on the allow list"),
            ))
        }
    }
}
