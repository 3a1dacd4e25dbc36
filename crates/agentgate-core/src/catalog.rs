//! The package catalog: declared contracts of known abilities and policies.
//!
//! The registry says which policies are attached; the catalog says what
//! shapes their code accepts and returns. The host registers every package
//! it can run at startup.

use std::collections::HashMap;

use agentgate_contracts::{
    descriptor::{AbilityContract, PolicyContract},
    error::{GateError, GateResult},
    identity::Cid,
};

#[derive(Debug, Clone, Default)]
pub struct PackageCatalog {
    abilities: HashMap<Cid, AbilityContract>,
    policies: HashMap<Cid, PolicyContract>,
}

impl PackageCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an ability contract. Re-registering a CID replaces it.
    pub fn register_ability(&mut self, contract: AbilityContract) {
        self.abilities.insert(contract.cid.clone(), contract);
    }

    pub fn register_policy(&mut self, contract: PolicyContract) {
        self.policies.insert(contract.cid.clone(), contract);
    }

    pub fn ability(&self, cid: &Cid) -> GateResult<&AbilityContract> {
        self.abilities.get(cid).ok_or_else(|| GateError::UnknownPackage {
            cid: cid.to_string(),
            reason: "no ability contract registered".to_string(),
        })
    }

    /// Look up a policy contract and check it agrees with the package name
    /// the registry attached under this CID.
    pub fn policy(&self, cid: &Cid, package_name: &str) -> GateResult<&PolicyContract> {
        let contract = self.policies.get(cid).ok_or_else(|| GateError::UnknownPackage {
            cid: cid.to_string(),
            reason: "no policy contract registered".to_string(),
        })?;
        if contract.package_name != package_name {
            return Err(GateError::UnknownPackage {
                cid: cid.to_string(),
                reason: format!(
                    "registry names package '{}' but the catalog has '{}'",
                    package_name, contract.package_name
                ),
            });
        }
        Ok(contract)
    }
}
