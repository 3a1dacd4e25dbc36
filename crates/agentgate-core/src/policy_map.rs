//! The policy map: resolved policies indexed by identity, order preserved.
//!
//! Execution order is load-bearing (a rate-limit policy may be expected to
//! run before a value check), so the map keeps the registration order as an
//! explicit key list next to its two indexes. A package name or code CID
//! that appears twice is a misconfigured registration and fails the build;
//! nothing is ever merged or dropped. The pipeline logs the failure with
//! the resolved app identity.

use std::collections::HashMap;

use agentgate_contracts::{
    error::{GateError, GateResult, IdentityKey},
    identity::Cid,
    permission::ResolvedPolicy,
};

#[derive(Debug, Clone, Default)]
pub struct PolicyMap {
    entries: Vec<ResolvedPolicy>,
    order: Vec<Cid>,
    by_cid: HashMap<Cid, usize>,
    by_package: HashMap<String, usize>,
}

impl PolicyMap {
    /// Index `policies`, which must be in registration order.
    pub fn build(policies: Vec<ResolvedPolicy>) -> GateResult<Self> {
        let mut map = PolicyMap::default();

        for (index, policy) in policies.into_iter().enumerate() {
            if map.by_package(&policy.package_name).is_some() {
                return Err(GateError::DuplicatePolicyIdentity {
                    key: IdentityKey::PackageName,
                    value: policy.package_name,
                });
            }
            if map.by_cid(&policy.policy_cid).is_some() {
                return Err(GateError::DuplicatePolicyIdentity {
                    key: IdentityKey::CodeCid,
                    value: policy.policy_cid.to_string(),
                });
            }

            map.by_package.insert(policy.package_name.clone(), index);
            map.by_cid.insert(policy.policy_cid.clone(), index);
            map.order.push(policy.policy_cid.clone());
            map.entries.push(policy);
        }

        Ok(map)
    }

    /// Policy CIDs in registration order.
    pub fn order(&self) -> &[Cid] {
        &self.order
    }

    /// Policies in registration order.
    pub fn iter(&self) -> impl Iterator<Item = &ResolvedPolicy> {
        self.order.iter().filter_map(|cid| self.by_cid(cid))
    }

    pub fn by_cid(&self, cid: &Cid) -> Option<&ResolvedPolicy> {
        self.by_cid.get(cid).map(|&i| &self.entries[i])
    }

    pub fn by_package(&self, package_name: &str) -> Option<&ResolvedPolicy> {
        self.by_package.get(package_name).map(|&i| &self.entries[i])
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
