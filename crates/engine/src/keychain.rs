//! Keychain identity store: named member lists and the membership index.
//!
//! A keychain is a durable, named identity scoped under a domain and
//! controlled by an ordered list of keys. This module holds the record
//! types and the primitive mutations the governance engine applies on
//! commit; nothing here decides *whether* a mutation may happen.

use crate::pending::PendingAction;
use keychain_core::{DepositHandle, KeyId, RecordId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A single key on a keychain.
#[derive(Debug, Serialize, Deserialize)]
pub struct Member {
    pub key: KeyId,
    /// False from insertion until the key verifies itself.
    pub verified: bool,
    /// Stable vote-bitset index, assigned once at insertion and never
    /// reassigned while this member exists.
    pub slot: u8,
    /// Escrow backing the membership-index entry. Present only while
    /// verified; an unverified member has no index entry to back.
    pub(crate) deposit: Option<DepositHandle>,
}

/// A named identity controlled by a rotating set of keys.
#[derive(Debug, Serialize, Deserialize)]
pub struct Keychain {
    pub id: RecordId,
    /// Name of the owning domain.
    pub domain: String,
    /// Unique within the domain.
    pub name: String,
    members: Vec<Member>,
    num_keys: u16,
    /// The single in-flight proposal slot. At most one per keychain.
    pub(crate) pending: Option<PendingAction>,
    pub(crate) deposit: DepositHandle,
}

impl Keychain {
    /// Deterministic record id for a keychain name within a domain.
    pub fn record_id(domain: &str, name: &str) -> RecordId {
        RecordId::derive(&[
            name.as_bytes(),
            b"keychains",
            domain.as_bytes(),
            b"keychain",
        ])
    }

    /// Deterministic record id for a key's membership-index entry.
    pub fn key_record_id(domain: &str, key: &KeyId) -> RecordId {
        RecordId::derive(&[key.as_bytes(), b"keys", domain.as_bytes(), b"keychain"])
    }

    /// A new keychain with its trusted founding member at slot 0.
    pub(crate) fn new(
        domain: &str,
        name: &str,
        founder: KeyId,
        deposit: DepositHandle,
        founder_deposit: DepositHandle,
    ) -> Self {
        Self {
            id: Self::record_id(domain, name),
            domain: domain.to_string(),
            name: name.to_string(),
            members: vec![Member {
                key: founder,
                verified: true,
                slot: 0,
                deposit: Some(founder_deposit),
            }],
            num_keys: 1,
            pending: None,
            deposit,
        }
    }

    /// Members in insertion order.
    pub fn members(&self) -> &[Member] {
        &self.members
    }

    /// Always equal to `members().len()`.
    pub fn num_keys(&self) -> u16 {
        self.num_keys
    }

    pub fn member(&self, key: &KeyId) -> Option<&Member> {
        self.members.iter().find(|m| &m.key == key)
    }

    pub(crate) fn member_mut(&mut self, key: &KeyId) -> Option<&mut Member> {
        self.members.iter_mut().find(|m| &m.key == key)
    }

    pub fn is_member(&self, key: &KeyId) -> bool {
        self.member(key).is_some()
    }

    /// True iff `key` is a current verified member.
    pub fn has_verified_member(&self, key: &KeyId) -> bool {
        self.member(key).is_some_and(|m| m.verified)
    }

    /// Count of verified members, the basis for quorum snapshots.
    pub fn verified_count(&self) -> u16 {
        self.members.iter().filter(|m| m.verified).count() as u16
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Current proposal, if one is open.
    pub fn pending_action(&self) -> Option<&PendingAction> {
        self.pending.as_ref()
    }

    /// Lowest slot not held by a current member.
    ///
    /// Freed slots are reusable: vote bitsets never outlive a single
    /// pending action, so a reassigned slot cannot alias stale votes.
    pub(crate) fn next_free_slot(&self) -> Option<u8> {
        (0..crate::pending::VoteSet::CAPACITY)
            .find(|slot| !self.members.iter().any(|m| m.slot == *slot))
    }

    /// Insert an unverified member at the given slot.
    pub(crate) fn insert_member(&mut self, key: KeyId, slot: u8) {
        self.members.push(Member {
            key,
            verified: false,
            slot,
            deposit: None,
        });
        self.num_keys += 1;
    }

    /// Remove a member, preserving the order of the rest.
    pub(crate) fn drop_member(&mut self, key: &KeyId) -> Option<Member> {
        let index = self.members.iter().position(|m| &m.key == key)?;
        let member = self.members.remove(index);
        self.num_keys -= 1;
        Some(member)
    }
}

/// Global uniqueness index over keys.
///
/// A verified entry exists iff the key is currently a verified member
/// of exactly one keychain; this is the sole source of truth other
/// subsystems rely on. Unverified insertions are tracked alongside so
/// a key cannot be proposed into a second keychain while its first
/// membership is still awaiting verification.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct MembershipIndex {
    verified: BTreeMap<KeyId, RecordId>,
    unverified: BTreeMap<KeyId, RecordId>,
}

impl MembershipIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// True if any keychain, via a verified or still-unverified entry,
    /// currently claims this key.
    pub fn is_claimed(&self, key: &KeyId) -> bool {
        self.verified.contains_key(key) || self.unverified.contains_key(key)
    }

    /// Keychain holding this key as a verified member.
    pub fn keychain_of(&self, key: &KeyId) -> Option<RecordId> {
        self.verified.get(key).copied()
    }

    pub fn verified_len(&self) -> usize {
        self.verified.len()
    }

    pub(crate) fn record_verified(&mut self, key: KeyId, keychain: RecordId) {
        self.verified.insert(key, keychain);
    }

    pub(crate) fn record_unverified(&mut self, key: KeyId, keychain: RecordId) {
        self.unverified.insert(key, keychain);
    }

    /// Move a key from the unverified claims to the index proper.
    pub(crate) fn promote(&mut self, key: &KeyId) {
        if let Some(keychain) = self.unverified.remove(key) {
            self.verified.insert(*key, keychain);
        }
    }

    pub(crate) fn drop_verified(&mut self, key: &KeyId) {
        self.verified.remove(key);
    }

    pub(crate) fn drop_unverified(&mut self, key: &KeyId) {
        self.unverified.remove(key);
    }
}
