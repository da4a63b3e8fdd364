//! Domain registry: administrative namespaces holding fee economics.
//!
//! A domain owns nothing about key membership. It names a family of
//! keychains, carries the treasury that collects verification fees,
//! and records the per-key verification cost.

use keychain_core::{Amount, DepositHandle, KeyId, RecordId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// An administrative namespace for a family of keychains.
#[derive(Debug, Serialize, Deserialize)]
pub struct Domain {
    /// Globally unique name.
    pub name: String,
    /// Identity that created the domain. May found keychains on behalf
    /// of other identities.
    pub authority: KeyId,
    /// Identity credited with verification fees.
    pub treasury: KeyId,
    /// Fee debited from a key at the moment it first verifies itself.
    pub verification_cost: Amount,
    pub(crate) deposit: DepositHandle,
}

impl Domain {
    /// Deterministic record id for a domain name.
    pub fn record_id(name: &str) -> RecordId {
        RecordId::derive(&[name.as_bytes(), b"keychain"])
    }
}

/// Registry of domains keyed by name.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct DomainRegistry {
    domains: BTreeMap<String, Domain>,
}

impl DomainRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.domains.contains_key(name)
    }

    pub fn get(&self, name: &str) -> Option<&Domain> {
        self.domains.get(name)
    }

    pub(crate) fn insert(&mut self, domain: Domain) {
        self.domains.insert(domain.name.clone(), domain);
    }

    /// Fee charged when a key verifies itself on a keychain in this domain.
    pub fn verification_cost_of(&self, name: &str) -> Option<Amount> {
        self.domains.get(name).map(|d| d.verification_cost)
    }

    /// Treasury identity credited with verification fees.
    pub fn treasury_of(&self, name: &str) -> Option<KeyId> {
        self.domains.get(name).map(|d| d.treasury)
    }

    pub fn authority_of(&self, name: &str) -> Option<KeyId> {
        self.domains.get(name).map(|d| d.authority)
    }

    pub fn len(&self) -> usize {
        self.domains.len()
    }

    pub fn is_empty(&self) -> bool {
        self.domains.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_domain_record_id_is_stable() {
        assert_eq!(Domain::record_id("domination"), Domain::record_id("domination"));
        assert_ne!(Domain::record_id("domination"), Domain::record_id("other"));
    }

    #[test]
    fn test_registry_lookups() {
        let registry = DomainRegistry::new();
        assert!(registry.is_empty());
        assert!(!registry.contains("domination"));
        assert_eq!(registry.verification_cost_of("domination"), None);
        assert_eq!(registry.treasury_of("domination"), None);
    }
}
