//! # agentgate-contracts
//!
//! Shared types, wire formats, and the error taxonomy for the agentgate
//! ability/policy execution pipeline.
//!
//! Every crate in the workspace imports from here. No business logic lives
//! in this crate, only data definitions, codecs and error types.

pub mod context;
pub mod descriptor;
pub mod error;
pub mod identity;
pub mod outcome;
pub mod params;
pub mod permission;
pub mod report;
pub mod schema;

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use serde_json::json;

    use super::*;
    use descriptor::{ParameterMapping, Phase};
    use error::{ErrorClass, GateError, IdentityKey};
    use identity::{Address, AgentWalletId, AppId, AppVersion, Cid, Identity, InvocationId};
    use outcome::{
        DenyReason, EntityRef, FailureKind, LifecycleOutcome, PhaseRecord, PhaseResponse,
        PhaseStatus,
    };
    use report::{
        Decision, ExecutionReport, InvocationMode, PipelineState, PolicyOutcomes, Verdict,
    };

    fn identity() -> Identity {
        Identity {
            app_id: AppId(7),
            app_version: AppVersion(2),
            delegatee: Address::new("0xdelegatee"),
            agent_wallet: AgentWalletId::new("token-1"),
            agent_wallet_address: Address::new("0xwallet"),
        }
    }

    fn record(entity: EntityRef, phase: Phase, status: PhaseStatus) -> PhaseRecord {
        PhaseRecord {
            entity,
            phase,
            status,
            elapsed_ms: 1,
        }
    }

    fn allow() -> PhaseStatus {
        PhaseStatus::Completed(LifecycleOutcome::Allow { payload: json!({}) })
    }

    // ── PipelineState ────────────────────────────────────────────────────────

    #[test]
    fn forward_transitions_are_legal() {
        use PipelineState::*;
        assert!(Init.can_transition_to(Precheck));
        assert!(Precheck.can_transition_to(Execute));
        assert!(Execute.can_transition_to(Commit));
        assert!(Commit.can_transition_to(Done));
        assert!(Precheck.can_transition_to(Done));
    }

    #[test]
    fn phases_cannot_be_skipped_or_reentered() {
        use PipelineState::*;
        assert!(!Init.can_transition_to(Execute));
        assert!(!Init.can_transition_to(Commit));
        assert!(!Precheck.can_transition_to(Commit));
        assert!(!Commit.can_transition_to(Execute));
        assert!(!Done.can_transition_to(Precheck));
        assert!(!Denied.can_transition_to(Execute));
        assert!(!Init.can_transition_to(Denied));
    }

    #[test]
    fn any_active_phase_can_deny_or_fail() {
        use PipelineState::*;
        for from in [Precheck, Execute, Commit] {
            assert!(from.can_transition_to(Denied));
            assert!(from.can_transition_to(Failed));
        }
        assert!(Denied.is_terminal() && Failed.is_terminal() && Done.is_terminal());
        assert!(!Commit.is_terminal());
    }

    // ── ParameterMapping ─────────────────────────────────────────────────────

    #[test]
    fn mapping_reverse_lookup() {
        let mapping = ParameterMapping::new()
            .map("amountIn", "buyAmount")
            .map("tokenIn", "token");
        assert_eq!(mapping.ability_param_for("buyAmount"), Some("amountIn"));
        assert_eq!(mapping.ability_param_for("token"), Some("tokenIn"));
        assert_eq!(mapping.ability_param_for("amountIn"), None);
        assert_eq!(mapping.len(), 2);
    }

    // ── PhaseResponse wire format ────────────────────────────────────────────

    #[test]
    fn phase_response_defaults_missing_fields() {
        let parsed: PhaseResponse = serde_json::from_slice(br#"{ "allow": true }"#).unwrap();
        assert!(parsed.allow);
        assert_eq!(parsed.result, serde_json::Value::Null);
        assert_eq!(parsed.reason, None);
    }

    #[test]
    fn phase_response_deny_carries_code_and_reason() {
        let bytes = PhaseResponse::deny(json!({ "spent": 10 }), "limit", "too much").to_bytes();
        let parsed: PhaseResponse = serde_json::from_slice(&bytes).unwrap();
        assert!(!parsed.allow);
        assert_eq!(parsed.code.as_deref(), Some("limit"));
        assert_eq!(parsed.reason.as_deref(), Some("too much"));
    }

    // ── ExecutionReport helpers ──────────────────────────────────────────────

    #[test]
    fn report_helpers_find_records_and_commit_failures() {
        let ability = EntityRef::ability("swap", Cid::new("QmSwap"));
        let policy = EntityRef::policy("spending-limit", Cid::new("QmLimit"));
        let report = ExecutionReport {
            invocation_id: InvocationId::new(),
            mode: InvocationMode::Full,
            identity: identity(),
            ability: ability.clone(),
            verdict: Verdict::Allow,
            terminal_state: PipelineState::Done,
            ability_outcomes: vec![record(ability.clone(), Phase::Execute, allow())],
            policy_outcomes: vec![PolicyOutcomes {
                policy: policy.clone(),
                phases: vec![
                    record(policy.clone(), Phase::Execute, allow()),
                    record(
                        policy.clone(),
                        Phase::Commit,
                        PhaseStatus::Failed(FailureKind::Transport {
                            reason: "rpc down".to_string(),
                        }),
                    ),
                ],
            }],
            cancelled: false,
            started_at: Utc::now(),
            finished_at: Utc::now(),
        };

        assert!(report.is_allowed());
        assert!(report.deciding().is_none());
        assert!(report.ability_outcome(Phase::Execute).unwrap().is_allow());
        assert!(report.ability_outcome(Phase::Precheck).is_none());
        assert!(report.policy_outcome("spending-limit", Phase::Commit).unwrap().is_failed());
        assert_eq!(report.commit_failures().len(), 1);
        assert_eq!(report.call_count(), 3);
    }

    #[test]
    fn deny_verdict_exposes_decision() {
        let decision = Decision {
            entity: EntityRef::policy("spending-limit", Cid::new("QmLimit")),
            phase: Phase::Execute,
            code: "daily_limit".to_string(),
            reason: "Attempted buy amount exceeds daily limit".to_string(),
        };
        let verdict = Verdict::Deny(decision.clone());
        let json = serde_json::to_string(&verdict).unwrap();
        let decoded: Verdict = serde_json::from_str(&json).unwrap();
        assert_eq!(decoded, verdict);
    }

    #[test]
    fn record_predicates() {
        let policy = EntityRef::policy("p", Cid::new("Qm1"));
        let deny = record(
            policy.clone(),
            Phase::Precheck,
            PhaseStatus::Completed(LifecycleOutcome::Deny {
                payload: json!(null),
                reason: DenyReason {
                    code: "c".to_string(),
                    message: "m".to_string(),
                },
            }),
        );
        assert!(deny.is_deny() && !deny.is_allow() && !deny.is_failed());
        assert!(deny.allow_payload().is_none());

        let ok = record(policy, Phase::Precheck, allow());
        assert_eq!(ok.allow_payload(), Some(&json!({})));
    }

    // ── GateError ────────────────────────────────────────────────────────────

    #[test]
    fn error_classes() {
        let not_permitted = GateError::NotPermitted {
            delegatee: "0xd".to_string(),
            agent_wallet: "1".to_string(),
            ability: "QmA".to_string(),
        };
        assert_eq!(not_permitted.class(), ErrorClass::Authorization);
        assert!(!not_permitted.is_retryable());

        let resolution = GateError::ResolutionFailed {
            query: "resolve_permission",
            reason: "connection reset".to_string(),
        };
        assert_eq!(resolution.class(), ErrorClass::Resolution);
        assert!(resolution.is_retryable());

        let duplicate = GateError::DuplicatePolicyIdentity {
            key: IdentityKey::CodeCid,
            value: "QmDup".to_string(),
        };
        assert_eq!(duplicate.class(), ErrorClass::Configuration);
    }

    #[test]
    fn error_display_messages() {
        let err = GateError::VersionDisabled {
            app_id: AppId(3),
            app_version: AppVersion(9),
        };
        assert_eq!(err.to_string(), "app 3 version 9 is disabled");

        let err = GateError::MissingMappedParameter {
            policy: "spending-limit".to_string(),
            parameter: "amountIn".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("spending-limit"));
        assert!(msg.contains("amountIn"));

        let err = GateError::DuplicatePolicyIdentity {
            key: IdentityKey::PackageName,
            value: "rate-limit".to_string(),
        };
        assert_eq!(err.to_string(), "duplicate policy package name 'rate-limit'");
    }
}
