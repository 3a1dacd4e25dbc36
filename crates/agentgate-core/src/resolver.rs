//! The permission resolver: on-chain authorization for one invocation.
//!
//! Resolution queries the registry in a fixed order:
//!
//! 1. the agent wallet's account address,
//! 2. the app version the delegatee may act under, and whether it is enabled,
//! 3. the policies attached to the ability under that version.
//!
//! Policy configuration is decoded into `ParamValue`s here, once, so nothing
//! downstream re-reads raw bytes. The resolver is read-only and never
//! retries; a failed or timed-out query is `ResolutionFailed`, kept distinct
//! from `NotPermitted` so callers can tell "denied" from "unknown".

use std::future::Future;
use std::time::Duration;

use tracing::{debug, warn};

use agentgate_contracts::{
    error::{GateError, GateResult, RegistryError},
    identity::{Address, AgentWalletId, Cid, Identity},
    params::{ParamValue, UserParams},
    permission::{PermissionRecord, RegisteredPolicy, ResolvedPolicy},
};

use crate::traits::ChainRegistry;

pub struct PermissionResolver<'a> {
    registry: &'a dyn ChainRegistry,
    timeout: Duration,
}

impl<'a> PermissionResolver<'a> {
    pub fn new(registry: &'a dyn ChainRegistry, timeout: Duration) -> Self {
        Self { registry, timeout }
    }

    /// Resolve the permission record for `delegatee` running `ability` on
    /// behalf of `agent_wallet`.
    ///
    /// # Errors
    ///
    /// - `InvalidIdentifier` for empty inputs
    /// - `UnknownAgentWallet` when the token id resolves to nothing
    /// - `NotPermitted` when there is no delegation, or the ability is not
    ///   part of the delegated app version
    /// - `VersionDisabled` when the delegated version is switched off
    /// - `InvalidPolicyConfiguration` when a configured value does not decode
    /// - `ResolutionFailed` when any registry query errors or times out
    pub async fn resolve(
        &self,
        delegatee: &Address,
        agent_wallet: &AgentWalletId,
        ability: &Cid,
    ) -> GateResult<PermissionRecord> {
        if delegatee.is_blank() {
            return Err(GateError::InvalidIdentifier { field: "delegatee" });
        }
        if agent_wallet.is_blank() {
            return Err(GateError::InvalidIdentifier { field: "agent_wallet" });
        }
        if ability.is_blank() {
            return Err(GateError::InvalidIdentifier { field: "ability_cid" });
        }

        let agent_wallet_address = self
            .bounded("agent_wallet_address", self.registry.agent_wallet_address(agent_wallet))
            .await?
            .ok_or_else(|| GateError::UnknownAgentWallet {
                agent_wallet: agent_wallet.to_string(),
            })?;

        let not_permitted = || GateError::NotPermitted {
            delegatee: delegatee.to_string(),
            agent_wallet: agent_wallet.to_string(),
            ability: ability.to_string(),
        };

        let grant = self
            .bounded(
                "resolve_permission",
                self.registry.resolve_permission(delegatee, agent_wallet),
            )
            .await?
            .ok_or_else(not_permitted)?;

        if !grant.enabled {
            warn!(
                delegatee = %delegatee,
                agent_wallet = %agent_wallet,
                app_id = %grant.app_id,
                app_version = %grant.app_version,
                "delegated app version is disabled"
            );
            return Err(GateError::VersionDisabled {
                app_id: grant.app_id,
                app_version: grant.app_version,
            });
        }

        let registered = self
            .bounded(
                "resolve_ability_policies",
                self.registry
                    .resolve_ability_policies(grant.app_id, grant.app_version, ability),
            )
            .await?
            .ok_or_else(not_permitted)?;

        let policies = registered
            .into_iter()
            .map(decode_policy)
            .collect::<GateResult<Vec<_>>>()?;

        debug!(
            delegatee = %delegatee,
            agent_wallet = %agent_wallet,
            app_id = %grant.app_id,
            app_version = %grant.app_version,
            ability = %ability,
            policy_count = policies.len(),
            "permission resolved"
        );

        Ok(PermissionRecord {
            identity: Identity {
                app_id: grant.app_id,
                app_version: grant.app_version,
                delegatee: delegatee.clone(),
                agent_wallet: agent_wallet.clone(),
                agent_wallet_address,
            },
            ability_cid: ability.clone(),
            policies,
        })
    }

    async fn bounded<T>(
        &self,
        query: &'static str,
        call: impl Future<Output = Result<T, RegistryError>>,
    ) -> GateResult<T> {
        match tokio::time::timeout(self.timeout, call).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(e)) => Err(GateError::ResolutionFailed {
                query,
                reason: e.to_string(),
            }),
            Err(_) => Err(GateError::ResolutionFailed {
                query,
                reason: format!("timed out after {}ms", self.timeout.as_millis()),
            }),
        }
    }
}

fn decode_policy(policy: RegisteredPolicy) -> GateResult<ResolvedPolicy> {
    let mut user_params = UserParams::new();
    for raw in &policy.configured_params {
        let value =
            ParamValue::decode(raw).map_err(|e| GateError::InvalidPolicyConfiguration {
                policy: policy.package_name.clone(),
                reason: e.to_string(),
            })?;
        if user_params.insert(raw.name.clone(), value).is_some() {
            return Err(GateError::InvalidPolicyConfiguration {
                policy: policy.package_name.clone(),
                reason: format!("parameter '{}' is configured twice", raw.name),
            });
        }
    }
    Ok(ResolvedPolicy {
        policy_cid: policy.policy_cid,
        package_name: policy.package_name,
        parameter_mapping: policy.parameter_mapping,
        user_params,
    })
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;
    use serde_json::json;

    use agentgate_contracts::{
        descriptor::ParameterMapping,
        identity::{AppId, AppVersion},
        params::{ParamType, RawParam},
        permission::PermissionGrant,
    };

    use super::*;

    // ── Mock registry ────────────────────────────────────────────────────────

    #[derive(Clone)]
    struct MockRegistry {
        wallet: Option<Address>,
        grant: Option<PermissionGrant>,
        policies: Option<Vec<RegisteredPolicy>>,
        fail_on: Option<&'static str>,
        stall: bool,
        queries: Arc<Mutex<Vec<&'static str>>>,
    }

    impl MockRegistry {
        fn permitted() -> Self {
            Self {
                wallet: Some(Address::new("0xwallet")),
                grant: Some(PermissionGrant {
                    app_id: AppId(1),
                    app_version: AppVersion(3),
                    enabled: true,
                }),
                policies: Some(vec![limit_policy(json!("1000"))]),
                fail_on: None,
                stall: false,
                queries: Arc::new(Mutex::new(vec![])),
            }
        }

        fn note(&self, query: &'static str) -> Result<(), RegistryError> {
            self.queries.lock().unwrap().push(query);
            if self.fail_on == Some(query) {
                return Err(RegistryError::new("rpc unavailable"));
            }
            Ok(())
        }
    }

    #[async_trait]
    impl ChainRegistry for MockRegistry {
        async fn agent_wallet_address(
            &self,
            _agent_wallet: &AgentWalletId,
        ) -> Result<Option<Address>, RegistryError> {
            self.note("agent_wallet_address")?;
            if self.stall {
                tokio::time::sleep(Duration::from_secs(60)).await;
            }
            Ok(self.wallet.clone())
        }

        async fn resolve_permission(
            &self,
            _delegatee: &Address,
            _agent_wallet: &AgentWalletId,
        ) -> Result<Option<PermissionGrant>, RegistryError> {
            self.note("resolve_permission")?;
            Ok(self.grant.clone())
        }

        async fn resolve_ability_policies(
            &self,
            _app_id: AppId,
            _app_version: AppVersion,
            _ability: &Cid,
        ) -> Result<Option<Vec<RegisteredPolicy>>, RegistryError> {
            self.note("resolve_ability_policies")?;
            Ok(self.policies.clone())
        }
    }

    fn limit_policy(limit: serde_json::Value) -> RegisteredPolicy {
        RegisteredPolicy {
            policy_cid: Cid::new("QmLimit"),
            package_name: "spending-limit".to_string(),
            parameter_mapping: ParameterMapping::new().map("amountIn", "buyAmount"),
            configured_params: vec![RawParam::encode("maxDailySpendUsd", ParamType::Uint, &limit)],
        }
    }

    async fn resolve(registry: &MockRegistry) -> GateResult<PermissionRecord> {
        PermissionResolver::new(registry, Duration::from_millis(200))
            .resolve(
                &Address::new("0xdelegatee"),
                &AgentWalletId::new("42"),
                &Cid::new("QmSwap"),
            )
            .await
    }

    // ── Tests ────────────────────────────────────────────────────────────────

    #[tokio::test]
    async fn resolves_identity_and_decodes_policy_params() {
        let registry = MockRegistry::permitted();
        let record = resolve(&registry).await.unwrap();

        assert_eq!(record.identity.app_id, AppId(1));
        assert_eq!(record.identity.app_version, AppVersion(3));
        assert_eq!(record.identity.agent_wallet_address, Address::new("0xwallet"));
        assert_eq!(record.policies.len(), 1);
        assert_eq!(
            record.policies[0].user_params.get("maxDailySpendUsd"),
            Some(&ParamValue::Uint(1000))
        );
        assert_eq!(
            *registry.queries.lock().unwrap(),
            vec!["agent_wallet_address", "resolve_permission", "resolve_ability_policies"]
        );
    }

    #[tokio::test]
    async fn identical_queries_yield_identical_records() {
        let registry = MockRegistry::permitted();
        let first = resolve(&registry).await.unwrap();
        let second = resolve(&registry).await.unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn empty_delegatee_is_rejected_before_any_query() {
        let registry = MockRegistry::permitted();
        let err = PermissionResolver::new(&registry, Duration::from_secs(1))
            .resolve(&Address::new("  "), &AgentWalletId::new("42"), &Cid::new("QmSwap"))
            .await
            .unwrap_err();
        assert!(matches!(err, GateError::InvalidIdentifier { field: "delegatee" }));
        assert!(registry.queries.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn unknown_wallet() {
        let registry = MockRegistry { wallet: None, ..MockRegistry::permitted() };
        assert!(matches!(
            resolve(&registry).await,
            Err(GateError::UnknownAgentWallet { .. })
        ));
    }

    #[tokio::test]
    async fn missing_delegation_is_not_permitted() {
        let registry = MockRegistry { grant: None, ..MockRegistry::permitted() };
        assert!(matches!(resolve(&registry).await, Err(GateError::NotPermitted { .. })));
        // The policy query is never issued.
        assert_eq!(registry.queries.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn ability_outside_version_is_not_permitted() {
        let registry = MockRegistry { policies: None, ..MockRegistry::permitted() };
        assert!(matches!(resolve(&registry).await, Err(GateError::NotPermitted { .. })));
    }

    #[tokio::test]
    async fn disabled_version() {
        let mut registry = MockRegistry::permitted();
        registry.grant = Some(PermissionGrant {
            app_id: AppId(1),
            app_version: AppVersion(3),
            enabled: false,
        });
        match resolve(&registry).await {
            Err(GateError::VersionDisabled { app_id, app_version }) => {
                assert_eq!(app_id, AppId(1));
                assert_eq!(app_version, AppVersion(3));
            }
            other => panic!("expected VersionDisabled, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn registry_error_is_resolution_failed_not_denial() {
        let registry = MockRegistry {
            fail_on: Some("resolve_permission"),
            ..MockRegistry::permitted()
        };
        match resolve(&registry).await {
            Err(err @ GateError::ResolutionFailed { query: "resolve_permission", .. }) => {
                assert!(err.is_retryable());
                assert!(err.to_string().contains("rpc unavailable"));
            }
            other => panic!("expected ResolutionFailed, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn slow_registry_times_out() {
        let registry = MockRegistry { stall: true, ..MockRegistry::permitted() };
        match resolve(&registry).await {
            Err(GateError::ResolutionFailed { reason, .. }) => {
                assert!(reason.contains("timed out"), "{reason}");
            }
            other => panic!("expected ResolutionFailed, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn undecodable_configuration_is_a_configuration_error() {
        let registry = MockRegistry {
            policies: Some(vec![limit_policy(json!("lots"))]),
            ..MockRegistry::permitted()
        };
        match resolve(&registry).await {
            Err(GateError::InvalidPolicyConfiguration { policy, .. }) => {
                assert_eq!(policy, "spending-limit");
            }
            other => panic!("expected InvalidPolicyConfiguration, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn duplicate_parameter_name_is_rejected() {
        let mut policy = limit_policy(json!("10"));
        policy
            .configured_params
            .push(RawParam::encode("maxDailySpendUsd", ParamType::Uint, &json!("20")));
        let registry = MockRegistry {
            policies: Some(vec![policy]),
            ..MockRegistry::permitted()
        };
        let err = resolve(&registry).await.unwrap_err();
        assert!(err.to_string().contains("configured twice"), "{err}");
    }
}
