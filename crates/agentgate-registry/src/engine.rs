//! In-memory chain registry.
//!
//! `InMemoryRegistry` loads a `RegistryFixture` from a TOML string or file
//! and implements the `ChainRegistry` trait from agentgate-core.
//!
//! Lookup rules:
//!
//! 1. Addresses compare case-insensitively, as on chain.
//! 2. A delegation resolves to its app version together with the version's
//!    current enabled flag; the resolver decides what a disabled version
//!    means.
//! 3. An ability that the version does not publish resolves to `None`.
//!    An ability published with no policies resolves to an empty list.
//!
//! Configured policy values are kept as the raw bytes the fixture gave, so a
//! malformed value surfaces where the chain would surface it: at decode time
//! in the resolver.

use std::collections::HashMap;
use std::path::Path;
use std::sync::RwLock;

use async_trait::async_trait;
use tracing::{debug, info};

use agentgate_contracts::{
    descriptor::ParameterMapping,
    error::{GateError, GateResult, RegistryError},
    identity::{Address, AgentWalletId, AppId, AppVersion, Cid},
    params::{ParamType, RawParam},
    permission::{PermissionGrant, RegisteredPolicy},
};
use agentgate_core::traits::ChainRegistry;

use crate::fixture::{PolicyEntry, RegistryFixture};

type VersionKey = (AppId, AppVersion);

#[derive(Debug, Default)]
struct PublishedVersion {
    enabled: bool,
    abilities: HashMap<Cid, Vec<RegisteredPolicy>>,
}

#[derive(Debug, Default)]
struct State {
    wallets: HashMap<AgentWalletId, Address>,
    /// (lowercased delegatee, wallet) → version.
    delegations: HashMap<(String, AgentWalletId), VersionKey>,
    versions: HashMap<VersionKey, PublishedVersion>,
}

#[derive(Debug, Default)]
pub struct InMemoryRegistry {
    state: RwLock<State>,
}

impl InMemoryRegistry {
    /// An empty registry: every lookup resolves to nothing.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse `s` as a TOML registry fixture.
    ///
    /// Returns `GateError::ConfigError` if the TOML is malformed, a
    /// parameter names an unknown type, or a version is published twice.
    pub fn from_toml_str(s: &str) -> GateResult<Self> {
        let fixture: RegistryFixture = toml::from_str(s).map_err(|e| GateError::ConfigError {
            reason: format!("failed to parse registry TOML: {}", e),
        })?;
        Self::from_fixture(fixture)
    }

    /// Read the file at `path` and parse it as a registry fixture.
    pub fn from_file(path: &Path) -> GateResult<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| GateError::ConfigError {
            reason: format!("failed to read registry file '{}': {}", path.display(), e),
        })?;
        Self::from_toml_str(&contents)
    }

    pub fn from_fixture(fixture: RegistryFixture) -> GateResult<Self> {
        let registry = Self::new();

        for wallet in fixture.wallets {
            registry.add_wallet(AgentWalletId::new(wallet.token_id), Address::new(wallet.address))?;
        }
        for delegation in fixture.delegations {
            registry.delegate(
                Address::new(delegation.delegatee),
                AgentWalletId::new(delegation.agent_wallet),
                AppId(delegation.app_id),
                AppVersion(delegation.app_version),
            )?;
        }
        for version in fixture.versions {
            let key = (AppId(version.app_id), AppVersion(version.version));
            let mut abilities = HashMap::new();
            for ability in version.abilities {
                let policies = ability
                    .policies
                    .into_iter()
                    .map(registered_policy)
                    .collect::<GateResult<Vec<_>>>()?;
                abilities.insert(Cid::new(ability.cid), policies);
            }

            let mut state = registry.write()?;
            if state.versions.contains_key(&key) {
                return Err(GateError::ConfigError {
                    reason: format!("app {} version {} is published twice", key.0, key.1),
                });
            }
            state.versions.insert(
                key,
                PublishedVersion {
                    enabled: version.enabled,
                    abilities,
                },
            );
        }

        Ok(registry)
    }

    // ── Mutators ──────────────────────────────────────────────────────────────

    pub fn add_wallet(&self, token_id: AgentWalletId, address: Address) -> GateResult<()> {
        self.write()?.wallets.insert(token_id, address);
        Ok(())
    }

    /// Let `delegatee` act for `agent_wallet` under the given app version.
    /// Replaces any earlier delegation for the same pair.
    pub fn delegate(
        &self,
        delegatee: Address,
        agent_wallet: AgentWalletId,
        app_id: AppId,
        app_version: AppVersion,
    ) -> GateResult<()> {
        self.write()?
            .delegations
            .insert((normalize(&delegatee), agent_wallet), (app_id, app_version));
        Ok(())
    }

    /// Remove a delegation. Returns whether one existed.
    pub fn revoke(&self, delegatee: &Address, agent_wallet: &AgentWalletId) -> GateResult<bool> {
        Ok(self
            .write()?
            .delegations
            .remove(&(normalize(delegatee), agent_wallet.clone()))
            .is_some())
    }

    /// Publish `ability` under a version with `policies` in registration
    /// order, creating the version enabled if it does not exist yet.
    pub fn publish_ability(
        &self,
        app_id: AppId,
        app_version: AppVersion,
        ability: Cid,
        policies: Vec<RegisteredPolicy>,
    ) -> GateResult<()> {
        self.write()?
            .versions
            .entry((app_id, app_version))
            .or_insert_with(|| PublishedVersion {
                enabled: true,
                abilities: HashMap::new(),
            })
            .abilities
            .insert(ability, policies);
        Ok(())
    }

    /// Switch a published version on or off. Returns false when the version
    /// is unknown.
    pub fn set_version_enabled(
        &self,
        app_id: AppId,
        app_version: AppVersion,
        enabled: bool,
    ) -> GateResult<bool> {
        let mut state = self.write()?;
        Ok(match state.versions.get_mut(&(app_id, app_version)) {
            Some(version) => {
                info!(app_id = %app_id, app_version = %app_version, enabled, "app version toggled");
                version.enabled = enabled;
                true
            }
            None => false,
        })
    }

    fn read(&self) -> Result<std::sync::RwLockReadGuard<'_, State>, RegistryError> {
        self.state
            .read()
            .map_err(|_| RegistryError::new("registry state lock poisoned"))
    }

    fn write(&self) -> GateResult<std::sync::RwLockWriteGuard<'_, State>> {
        self.state.write().map_err(|_| GateError::ConfigError {
            reason: "registry state lock poisoned".to_string(),
        })
    }
}

#[async_trait]
impl ChainRegistry for InMemoryRegistry {
    async fn agent_wallet_address(
        &self,
        agent_wallet: &AgentWalletId,
    ) -> Result<Option<Address>, RegistryError> {
        Ok(self.read()?.wallets.get(agent_wallet).cloned())
    }

    async fn resolve_permission(
        &self,
        delegatee: &Address,
        agent_wallet: &AgentWalletId,
    ) -> Result<Option<PermissionGrant>, RegistryError> {
        let state = self.read()?;
        let Some(&(app_id, app_version)) = state
            .delegations
            .get(&(normalize(delegatee), agent_wallet.clone()))
        else {
            debug!(delegatee = %delegatee, agent_wallet = %agent_wallet, "no delegation");
            return Ok(None);
        };
        // A delegation to a version that was never published is as good as none.
        Ok(state.versions.get(&(app_id, app_version)).map(|v| PermissionGrant {
            app_id,
            app_version,
            enabled: v.enabled,
        }))
    }

    async fn resolve_ability_policies(
        &self,
        app_id: AppId,
        app_version: AppVersion,
        ability: &Cid,
    ) -> Result<Option<Vec<RegisteredPolicy>>, RegistryError> {
        Ok(self
            .read()?
            .versions
            .get(&(app_id, app_version))
            .and_then(|v| v.abilities.get(ability))
            .cloned())
    }
}

fn normalize(address: &Address) -> String {
    address.as_str().to_ascii_lowercase()
}

fn registered_policy(entry: PolicyEntry) -> GateResult<RegisteredPolicy> {
    let configured_params = entry
        .params
        .into_iter()
        .map(|param| {
            let param_type =
                ParamType::from_name(&param.param_type).ok_or_else(|| GateError::ConfigError {
                    reason: format!(
                        "policy '{}' parameter '{}' has unknown type '{}'",
                        entry.package_name, param.name, param.param_type
                    ),
                })?;
            Ok(RawParam {
                name: param.name,
                type_tag: param_type.tag(),
                value: param.value.into_bytes(),
            })
        })
        .collect::<GateResult<Vec<_>>>()?;

    Ok(RegisteredPolicy {
        policy_cid: Cid::new(entry.cid),
        package_name: entry.package_name,
        parameter_mapping: ParameterMapping(entry.parameter_mapping),
        configured_params,
    })
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;

    const FIXTURE: &str = r#"
[[wallets]]
token_id = "42"
address = "0xWallet"

[[delegations]]
delegatee = "0xDelegatee"
agent_wallet = "42"
app_id = 1
app_version = 3

[[versions]]
app_id = 1
version = 3

[[versions.abilities]]
cid = "QmSwap"

[[versions.abilities.policies]]
cid = "QmLimit"
package_name = "spending-limit"
parameter_mapping = { amountIn = "buyAmount" }

[[versions.abilities.policies.params]]
name = "maxDailySpendUsd"
type = "uint"
value = '"1000"'

[[versions.abilities.policies]]
cid = "QmTokens"
package_name = "allowed-tokens"

[[versions.abilities]]
cid = "QmBare"
"#;

    fn registry() -> InMemoryRegistry {
        InMemoryRegistry::from_toml_str(FIXTURE).unwrap()
    }

    // ── Loading ───────────────────────────────────────────────────────────────

    #[tokio::test]
    async fn loads_policies_in_registration_order() {
        let policies = registry()
            .resolve_ability_policies(AppId(1), AppVersion(3), &Cid::new("QmSwap"))
            .await
            .unwrap()
            .unwrap();

        let names: Vec<&str> = policies.iter().map(|p| p.package_name.as_str()).collect();
        assert_eq!(names, vec!["spending-limit", "allowed-tokens"]);
        assert_eq!(
            policies[0].parameter_mapping.ability_param_for("buyAmount"),
            Some("amountIn")
        );
        assert_eq!(policies[0].configured_params[0].type_tag, ParamType::Uint.tag());
        assert_eq!(policies[0].configured_params[0].value, b"\"1000\"".to_vec());
    }

    #[test]
    fn malformed_toml_is_config_error() {
        let err = InMemoryRegistry::from_toml_str("[[wallets]\ntoken_id =").unwrap_err();
        assert!(matches!(err, GateError::ConfigError { .. }));
    }

    #[test]
    fn unknown_param_type_is_config_error() {
        let toml = r#"
[[versions]]
app_id = 1
version = 1
[[versions.abilities]]
cid = "QmA"
[[versions.abilities.policies]]
cid = "QmP"
package_name = "p"
[[versions.abilities.policies.params]]
name = "x"
type = "uint7"
value = "1"
"#;
        match InMemoryRegistry::from_toml_str(toml) {
            Err(GateError::ConfigError { reason }) => assert!(reason.contains("uint7"), "{reason}"),
            other => panic!("expected ConfigError, got {:?}", other),
        }
    }

    #[test]
    fn version_published_twice_is_config_error() {
        let toml = "[[versions]]\napp_id = 1\nversion = 1\n[[versions]]\napp_id = 1\nversion = 1\n";
        assert!(InMemoryRegistry::from_toml_str(toml).is_err());
    }

    // ── Lookups ───────────────────────────────────────────────────────────────

    #[tokio::test]
    async fn addresses_compare_case_insensitively() {
        let grant = registry()
            .resolve_permission(&Address::new("0xdelegatee"), &AgentWalletId::new("42"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(grant.app_id, AppId(1));
        assert_eq!(grant.app_version, AppVersion(3));
        assert!(grant.enabled);
    }

    #[tokio::test]
    async fn unknown_wallet_resolves_to_none() {
        let address = registry()
            .agent_wallet_address(&AgentWalletId::new("7"))
            .await
            .unwrap();
        assert!(address.is_none());
    }

    #[tokio::test]
    async fn unpublished_ability_is_none_but_bare_ability_is_empty() {
        let registry = registry();
        let missing = registry
            .resolve_ability_policies(AppId(1), AppVersion(3), &Cid::new("QmOther"))
            .await
            .unwrap();
        assert!(missing.is_none());

        let bare = registry
            .resolve_ability_policies(AppId(1), AppVersion(3), &Cid::new("QmBare"))
            .await
            .unwrap();
        assert_eq!(bare, Some(vec![]));
    }

    // ── Mutators ──────────────────────────────────────────────────────────────

    #[tokio::test]
    async fn disabling_a_version_shows_in_the_grant() {
        let registry = registry();
        assert!(registry.set_version_enabled(AppId(1), AppVersion(3), false).unwrap());
        assert!(!registry.set_version_enabled(AppId(9), AppVersion(9), false).unwrap());

        let grant = registry
            .resolve_permission(&Address::new("0xDelegatee"), &AgentWalletId::new("42"))
            .await
            .unwrap()
            .unwrap();
        assert!(!grant.enabled);
    }

    #[tokio::test]
    async fn revoked_delegation_resolves_to_none() {
        let registry = registry();
        assert!(registry.revoke(&Address::new("0xDELEGATEE"), &AgentWalletId::new("42")).unwrap());
        assert!(!registry.revoke(&Address::new("0xDelegatee"), &AgentWalletId::new("42")).unwrap());

        let grant = registry
            .resolve_permission(&Address::new("0xDelegatee"), &AgentWalletId::new("42"))
            .await
            .unwrap();
        assert!(grant.is_none());
    }

    #[tokio::test]
    async fn programmatic_publish() {
        let registry = InMemoryRegistry::new();
        registry
            .publish_ability(AppId(5), AppVersion(1), Cid::new("QmX"), vec![])
            .unwrap();
        registry
            .delegate(Address::new("0xd"), AgentWalletId::new("1"), AppId(5), AppVersion(1))
            .unwrap();
        let grant = registry
            .resolve_permission(&Address::new("0xD"), &AgentWalletId::new("1"))
            .await
            .unwrap();
        assert!(grant.is_some());
    }

    #[test]
    fn mutators_report_a_poisoned_lock() {
        let registry = Arc::new(registry());
        let writer = Arc::clone(&registry);
        let _ = std::thread::spawn(move || {
            let _state = writer.state.write().unwrap();
            panic!("writer died holding the lock");
        })
        .join();

        let wallet = AgentWalletId::new("1");
        let delegatee = Address::new("0xd");
        assert!(matches!(
            registry.add_wallet(wallet.clone(), Address::new("0x1")),
            Err(GateError::ConfigError { .. })
        ));
        assert!(matches!(
            registry.delegate(delegatee.clone(), wallet.clone(), AppId(1), AppVersion(3)),
            Err(GateError::ConfigError { .. })
        ));
        assert!(registry.revoke(&delegatee, &wallet).is_err());
        assert!(registry
            .publish_ability(AppId(1), AppVersion(3), Cid::new("QmX"), vec![])
            .is_err());
        assert!(registry.set_version_enabled(AppId(1), AppVersion(3), false).is_err());
    }
}
