//! Schema-based validator for the agentgate pipeline.
//!
//! `JsonSchemaValidator` implements the `SchemaValidator` trait from
//! `agentgate-core`. A schema document is compiled once per schema id and
//! reused while the document stays the same. All violations are collected
//! before returning so operators see the full failure set in one pass.
//!
//! A `null` schema places no constraint. A schema document that does not
//! compile is reported as a failed validation, not as an error, so the
//! offending phase is recorded as a contract violation.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use serde_json::Value;
use tracing::{debug, warn};

use agentgate_contracts::{
    error::GateResult,
    schema::{ValidationFailure, ValidationReport},
};
use agentgate_core::traits::SchemaValidator;

/// Compiled validator plus the document it was compiled from.
type Compiled = (Value, Arc<jsonschema::Validator>);

pub struct JsonSchemaValidator {
    compiled: RwLock<HashMap<String, Compiled>>,
}

impl JsonSchemaValidator {
    pub fn new() -> Self {
        Self {
            compiled: RwLock::new(HashMap::new()),
        }
    }

    /// Number of compiled schemas currently cached.
    pub fn cached(&self) -> usize {
        self.compiled.read().map(|c| c.len()).unwrap_or(0)
    }

    fn compile(schema: &Value) -> Result<jsonschema::Validator, String> {
        jsonschema::options()
            .with_format("evm-address", is_evm_address)
            .with_format("uint-string", is_uint_string)
            .should_validate_formats(true)
            .build(schema)
            .map_err(|e| e.to_string())
    }

    fn validator_for(
        &self,
        schema_id: &str,
        schema: &Value,
    ) -> Result<Arc<jsonschema::Validator>, String> {
        if let Ok(cache) = self.compiled.read() {
            if let Some((document, validator)) = cache.get(schema_id) {
                if document == schema {
                    return Ok(Arc::clone(validator));
                }
            }
        }

        let validator = Arc::new(Self::compile(schema)?);
        if let Ok(mut cache) = self.compiled.write() {
            cache.insert(schema_id.to_string(), (schema.clone(), Arc::clone(&validator)));
        }
        Ok(validator)
    }
}

impl Default for JsonSchemaValidator {
    fn default() -> Self {
        Self::new()
    }
}

impl SchemaValidator for JsonSchemaValidator {
    fn validate(
        &self,
        schema_id: &str,
        schema: &Value,
        payload: &Value,
    ) -> GateResult<ValidationReport> {
        if schema.is_null() {
            return Ok(ValidationReport::pass());
        }

        let validator = match self.validator_for(schema_id, schema) {
            Ok(validator) => validator,
            Err(e) => {
                let message = format!("invalid JSON Schema document: {e}");
                warn!(schema_id = %schema_id, %message, "schema compilation failure");
                return Ok(ValidationReport {
                    passed: false,
                    failures: vec![ValidationFailure {
                        path: String::new(),
                        message,
                    }],
                });
            }
        };

        let failures: Vec<ValidationFailure> = validator
            .iter_errors(payload)
            .map(|error| ValidationFailure {
                path: error.instance_path.to_string(),
                message: error.to_string(),
            })
            .collect();

        let passed = failures.is_empty();
        debug!(
            schema_id = %schema_id,
            passed,
            failure_count = failures.len(),
            "validation complete"
        );

        Ok(ValidationReport { passed, failures })
    }
}

fn is_evm_address(s: &str) -> bool {
    s.strip_prefix("0x")
        .map(|hex| hex.len() == 40 && hex.chars().all(|c| c.is_ascii_hexdigit()))
        .unwrap_or(false)
}

fn is_uint_string(s: &str) -> bool {
    !s.is_empty() && s.chars().all(|c| c.is_ascii_digit())
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn swap_params_schema() -> Value {
        json!({
            "type": "object",
            "properties": {
                "tokenIn": { "type": "string", "format": "evm-address" },
                "amountIn": { "type": "string", "format": "uint-string" }
            },
            "required": ["tokenIn", "amountIn"]
        })
    }

    #[test]
    fn null_schema_always_passes() {
        let validator = JsonSchemaValidator::new();
        let report = validator
            .validate("any", &Value::Null, &json!({ "whatever": [1, 2, 3] }))
            .unwrap();
        assert!(report.passed);
        assert_eq!(validator.cached(), 0);
    }

    #[test]
    fn conforming_payload_passes() {
        let validator = JsonSchemaValidator::new();
        let payload = json!({
            "tokenIn": "0x1111111111111111111111111111111111111111",
            "amountIn": "250"
        });
        let report = validator
            .validate("swap:params", &swap_params_schema(), &payload)
            .unwrap();
        assert!(report.passed, "failures: {:?}", report.failures);
    }

    #[test]
    fn missing_required_field_fails() {
        let validator = JsonSchemaValidator::new();
        let report = validator
            .validate("swap:params", &swap_params_schema(), &json!({ "amountIn": "1" }))
            .unwrap();
        assert!(!report.passed);
        assert!(
            report.failures[0].message.contains("tokenIn"),
            "failure should name the missing field: {}",
            report.failures[0].message
        );
    }

    #[test]
    fn all_violations_collected_with_paths() {
        let validator = JsonSchemaValidator::new();
        let payload = json!({ "tokenIn": "not-an-address", "amountIn": "-5" });
        let report = validator
            .validate("swap:params", &swap_params_schema(), &payload)
            .unwrap();
        assert!(!report.passed);
        assert_eq!(report.failures.len(), 2);
        let paths: Vec<&str> = report.failures.iter().map(|f| f.path.as_str()).collect();
        assert!(paths.contains(&"/tokenIn"));
        assert!(paths.contains(&"/amountIn"));
    }

    #[test]
    fn invalid_schema_document_is_a_failure_not_an_error() {
        let validator = JsonSchemaValidator::new();
        let report = validator
            .validate("broken", &json!({ "type": "no-such-type" }), &json!({}))
            .unwrap();
        assert!(!report.passed);
        assert!(report.failures[0].message.contains("invalid JSON Schema document"));
    }

    #[test]
    fn compiled_schemas_are_reused_until_the_document_changes() {
        let validator = JsonSchemaValidator::new();
        let strict = json!({ "type": "object", "required": ["txHash"] });
        let loose = json!({ "type": "object" });

        assert!(!validator.validate("swap:execute:success", &strict, &json!({})).unwrap().passed);
        assert!(!validator.validate("swap:execute:success", &strict, &json!({})).unwrap().passed);
        assert_eq!(validator.cached(), 1);

        // Same id, new document: recompiled, not served stale.
        assert!(validator.validate("swap:execute:success", &loose, &json!({})).unwrap().passed);
        assert_eq!(validator.cached(), 1);
    }

    #[test]
    fn formats() {
        assert!(is_evm_address("0xAbCdEf0123456789abcdef0123456789ABCDEF01"));
        assert!(!is_evm_address("0x123"));
        assert!(!is_evm_address("AbCdEf0123456789abcdef0123456789ABCDEF0100"));
        assert!(is_uint_string("0"));
        assert!(is_uint_string("115792089237316195423570985008687907853269984665640564039457584007913129639935"));
        assert!(!is_uint_string(""));
        assert!(!is_uint_string("1.5"));
    }
}
