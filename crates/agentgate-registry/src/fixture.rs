//! Registry fixture schema.
//!
//! A `RegistryFixture` is deserialized from TOML and mirrors what the chain
//! holds: which token ids map to which wallet addresses, which delegatee may
//! act for which wallet under which app version, and which policies each
//! published version attaches to each ability, in registration order.
//!
//! Policy configuration values are written as JSON text, exactly the bytes
//! the chain stores:
//!
//! ```toml
//! [[versions.abilities.policies.params]]
//! name = "maxDailySpendUsd"
//! type = "uint"
//! value = '"1000"'
//! ```

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RegistryFixture {
    #[serde(default)]
    pub wallets: Vec<WalletEntry>,
    #[serde(default)]
    pub delegations: Vec<DelegationEntry>,
    #[serde(default)]
    pub versions: Vec<VersionEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WalletEntry {
    pub token_id: String,
    pub address: String,
}

/// The delegatee may act for `agent_wallet` under this app version.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DelegationEntry {
    pub delegatee: String,
    pub agent_wallet: String,
    pub app_id: u64,
    pub app_version: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VersionEntry {
    pub app_id: u64,
    pub version: u64,
    #[serde(default = "enabled_by_default")]
    pub enabled: bool,
    #[serde(default)]
    pub abilities: Vec<AbilityEntry>,
}

fn enabled_by_default() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AbilityEntry {
    pub cid: String,
    /// In registration order.
    #[serde(default)]
    pub policies: Vec<PolicyEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolicyEntry {
    pub cid: String,
    pub package_name: String,
    /// Ability param name → policy param name.
    #[serde(default)]
    pub parameter_mapping: BTreeMap<String, String>,
    #[serde(default)]
    pub params: Vec<ParamEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParamEntry {
    pub name: String,
    /// A parameter type name such as `uint` or `address[]`.
    #[serde(rename = "type")]
    pub param_type: String,
    /// JSON text of the value.
    pub value: String,
}
