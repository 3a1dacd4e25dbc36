//! The parameter mapper: projects ability params into a policy's namespace.
//!
//! A policy receives exactly the ability parameters its mapping names, under
//! the names the mapping gives them, and nothing else. Two policies that
//! both call a parameter `amount` never see each other's view of it.

use std::collections::BTreeSet;

use serde_json::{Map, Value};

use agentgate_contracts::{
    descriptor::ParameterMapping,
    error::{GateError, GateResult},
};

/// Build `policy`'s private parameter object from `ability_params`.
///
/// Every key in the mapping must be present in `ability_params`. A missing
/// key is a registration error and is never defaulted. So is a mapping that
/// feeds one policy parameter from two ability parameters.
pub fn project(
    ability_params: &Map<String, Value>,
    mapping: &ParameterMapping,
    policy: &str,
) -> GateResult<Map<String, Value>> {
    let mut targets = BTreeSet::new();
    for (_, policy_param) in mapping.iter() {
        if !targets.insert(policy_param) {
            return Err(GateError::InvalidPolicyConfiguration {
                policy: policy.to_string(),
                reason: format!(
                    "policy parameter '{policy_param}' is mapped from more than one ability parameter"
                ),
            });
        }
    }

    let mut projected = Map::new();
    for (ability_param, policy_param) in mapping.iter() {
        let value = ability_params
            .get(ability_param)
            .ok_or_else(|| GateError::MissingMappedParameter {
                policy: policy.to_string(),
                parameter: ability_param.clone(),
            })?;
        projected.insert(policy_param.clone(), value.clone());
    }
    Ok(projected)
}

/// Translate a JSON pointer into the policy's params back to the ability
/// parameter that fed it, so validation failures name what the caller sent.
///
/// `/buyAmount/0` under `amountIn → buyAmount` becomes `/amountIn/0`.
/// Pointers whose first segment is not produced by the mapping come back
/// unchanged.
pub fn reverse_path(path: &str, mapping: &ParameterMapping) -> String {
    let Some(rest) = path.strip_prefix('/') else {
        return path.to_string();
    };
    let (head, tail) = match rest.find('/') {
        Some(i) => (&rest[..i], &rest[i..]),
        None => (rest, ""),
    };
    match mapping.ability_param_for(head) {
        Some(ability_param) => format!("/{ability_param}{tail}"),
        None => path.to_string(),
    }
}
