//! Governance engine facade: every public keychain operation.
//!
//! The host execution model is serial-per-keychain and atomic-per-call,
//! so the engine holds no locks and keeps no state between calls beyond
//! the records themselves. Every operation validates completely before
//! its first mutation; an error therefore leaves no trace.
//!
//! # Proposal lifecycle
//!
//! ```text
//! Idle ──propose_add / propose_remove──▶ Pending
//! Pending ──votes reach yes threshold──▶ commit ──▶ Idle
//! Pending ──votes reach no threshold───▶ cancel ──▶ Idle
//! ```
//!
//! The proposer's implicit yes is cast inside the propose call, so a
//! single-member keychain resolves its own proposals immediately,
//! including the self-removal that destroys the keychain.

use crate::domain::{Domain, DomainRegistry};
use crate::error::{KeychainError, Result};
use crate::event::{EventTrail, GovernanceEvent};
use crate::keychain::{Keychain, MembershipIndex};
use crate::pending::{ActionKind, Outcome, PendingAction, VoteSet};
use crate::util::validate_name;
use keychain_core::{Amount, Bank, Config, CoreError, KeyId, RecordId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, info};

/// The keychain governance engine.
///
/// Owns the domain registry, the keychain records, the membership
/// index, and the balance ledger, and exposes the full operation
/// surface. External subsystems that merely consume an identity are
/// limited to [`KeychainEngine::is_authorized`].
#[derive(Debug, Serialize, Deserialize)]
pub struct KeychainEngine {
    config: Config,
    registry: DomainRegistry,
    keychains: BTreeMap<RecordId, Keychain>,
    index: MembershipIndex,
    bank: Bank,
    events: EventTrail,
}

impl KeychainEngine {
    pub fn new() -> Self {
        Self::with_config(Config::default_config())
    }

    pub fn with_config(config: Config) -> Self {
        Self {
            config,
            registry: DomainRegistry::new(),
            keychains: BTreeMap::new(),
            index: MembershipIndex::new(),
            bank: Bank::new(),
            events: EventTrail::new(),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn registry(&self) -> &DomainRegistry {
        &self.registry
    }

    pub fn bank(&self) -> &Bank {
        &self.bank
    }

    /// Mutable ledger access for the host to fund identities.
    pub fn bank_mut(&mut self) -> &mut Bank {
        &mut self.bank
    }

    pub fn events(&self) -> &EventTrail {
        &self.events
    }

    pub fn keychain(&self, domain: &str, name: &str) -> Option<&Keychain> {
        self.keychains.get(&Keychain::record_id(domain, name))
    }

    /// Create a domain. The caller becomes its authority and pays the
    /// domain deposit.
    pub fn create_domain(
        &mut self,
        name: &str,
        verification_cost: Amount,
        treasury: KeyId,
        caller: KeyId,
    ) -> Result<()> {
        validate_name(name, &self.config.limits)?;
        if self.registry.contains(name) {
            return Err(KeychainError::AlreadyExists(name.to_string()));
        }

        let deposit = self
            .bank
            .allocate(&caller, Domain::record_id(name), self.config.deposits.domain)?;
        self.registry.insert(Domain {
            name: name.to_string(),
            authority: caller,
            treasury,
            verification_cost,
            deposit,
        });

        info!(domain = name, authority = %caller, verification_cost, "domain created");
        self.events.record(GovernanceEvent::DomainCreated {
            domain: name.to_string(),
            authority: caller,
        });
        Ok(())
    }

    /// Create a keychain with `founder` as its single, trusted member.
    ///
    /// The caller must be the founder itself or the domain authority;
    /// the authority may found on behalf of another identity, anyone
    /// else only for themselves. The founder's index entry is created
    /// immediately, without the verification handshake.
    pub fn create_keychain(
        &mut self,
        domain: &str,
        name: &str,
        founder: KeyId,
        caller: KeyId,
    ) -> Result<()> {
        let authority = self
            .registry
            .authority_of(domain)
            .ok_or_else(|| KeychainError::NotFound(format!("domain {domain}")))?;
        validate_name(name, &self.config.limits)?;
        let id = Keychain::record_id(domain, name);
        if self.keychains.contains_key(&id) {
            return Err(KeychainError::AlreadyExists(format!("{domain}/{name}")));
        }
        if caller != founder && caller != authority {
            return Err(KeychainError::Unauthorized { caller });
        }
        if self.index.is_claimed(&founder) {
            return Err(KeychainError::DuplicateKey { key: founder });
        }

        let keychain_amount = self.config.deposits.keychain;
        let key_amount = self.config.deposits.key;
        // combined check first so the two escrows apply atomically
        let total = self.payable_total(&caller, keychain_amount, key_amount)?;
        self.bank.ensure_balance(&caller, total)?;
        let deposit = self.bank.allocate(&caller, id, keychain_amount)?;
        let founder_deposit =
            self.bank
                .allocate(&caller, Keychain::key_record_id(domain, &founder), key_amount)?;

        self.keychains
            .insert(id, Keychain::new(domain, name, founder, deposit, founder_deposit));
        self.index.record_verified(founder, id);

        info!(domain, keychain = name, founder = %founder, "keychain created");
        self.events.record(GovernanceEvent::KeychainCreated {
            domain: domain.to_string(),
            keychain: name.to_string(),
            founder,
        });
        Ok(())
    }

    /// Propose adding `target` to a keychain.
    ///
    /// The target is inserted immediately as an unverified member so
    /// its slot is fixed for the vote; the insertion is rolled back if
    /// the proposal is cancelled. The proposer's implicit yes may
    /// resolve the action within this call.
    pub fn propose_add(
        &mut self,
        domain: &str,
        name: &str,
        target: KeyId,
        caller: KeyId,
    ) -> Result<()> {
        let id = Keychain::record_id(domain, name);
        let kc = self
            .keychains
            .get_mut(&id)
            .ok_or_else(|| KeychainError::NotFound(format!("keychain {domain}/{name}")))?;
        if kc.pending.is_some() {
            return Err(KeychainError::ActionInProgress);
        }
        let proposer_slot = kc
            .member(&caller)
            .filter(|m| m.verified)
            .map(|m| m.slot)
            .ok_or(KeychainError::Unauthorized { caller })?;
        if kc.is_member(&target) || self.index.is_claimed(&target) {
            return Err(KeychainError::DuplicateKey { key: target });
        }
        let max_keys = self.config.limits.max_keys;
        if kc.num_keys() as usize >= max_keys {
            return Err(KeychainError::MaxKeys { limit: max_keys });
        }
        let slot = kc.next_free_slot().ok_or(KeychainError::MaxKeys {
            limit: VoteSet::CAPACITY as usize,
        })?;

        let quorum = kc.verified_count();
        kc.insert_member(target, slot);
        self.index.record_unverified(target, id);

        let mut action = PendingAction::new(ActionKind::AddKey(target), quorum);
        action.record_vote(proposer_slot, true);
        kc.pending = Some(action);

        info!(domain, keychain = name, target = %target, proposer = %caller, quorum, "add key proposed");
        self.events.record(GovernanceEvent::ProposalOpened {
            domain: domain.to_string(),
            keychain: name.to_string(),
            kind: ActionKind::AddKey(target),
            proposer: caller,
            quorum,
        });
        self.resolve(id)
    }

    /// Propose removing `target` from a keychain.
    pub fn propose_remove(
        &mut self,
        domain: &str,
        name: &str,
        target: KeyId,
        caller: KeyId,
    ) -> Result<()> {
        let id = Keychain::record_id(domain, name);
        let kc = self
            .keychains
            .get_mut(&id)
            .ok_or_else(|| KeychainError::NotFound(format!("keychain {domain}/{name}")))?;
        if kc.pending.is_some() {
            return Err(KeychainError::ActionInProgress);
        }
        let proposer_slot = kc
            .member(&caller)
            .filter(|m| m.verified)
            .map(|m| m.slot)
            .ok_or(KeychainError::Unauthorized { caller })?;
        if !kc.is_member(&target) {
            return Err(KeychainError::NotFound(format!("key {target}")));
        }

        let quorum = kc.verified_count();
        let mut action = PendingAction::new(ActionKind::RemoveKey(target), quorum);
        action.record_vote(proposer_slot, true);
        kc.pending = Some(action);

        info!(domain, keychain = name, target = %target, proposer = %caller, quorum, "remove key proposed");
        self.events.record(GovernanceEvent::ProposalOpened {
            domain: domain.to_string(),
            keychain: name.to_string(),
            kind: ActionKind::RemoveKey(target),
            proposer: caller,
            quorum,
        });
        self.resolve(id)
    }

    /// Verify the calling key on a keychain, completing the handshake.
    ///
    /// Self-attestation only: the caller verifies itself, pays the
    /// domain's verification fee to the treasury, and escrows the
    /// deposit backing its new membership-index entry. A key whose own
    /// add proposal is still open is not yet verifiable.
    pub fn verify_key(&mut self, domain: &str, name: &str, caller: KeyId) -> Result<()> {
        let id = Keychain::record_id(domain, name);
        let kc = self
            .keychains
            .get(&id)
            .ok_or_else(|| KeychainError::NotFound(format!("keychain {domain}/{name}")))?;
        match kc.member(&caller) {
            Some(m) if !m.verified => {}
            _ => return Err(KeychainError::Unverifiable { key: caller }),
        }
        if let Some(action) = kc.pending_action() {
            if action.kind == ActionKind::AddKey(caller) {
                return Err(KeychainError::Unverifiable { key: caller });
            }
        }

        let (fee, treasury) = {
            let d = self
                .registry
                .get(domain)
                .ok_or_else(|| KeychainError::NotFound(format!("domain {domain}")))?;
            (d.verification_cost, d.treasury)
        };
        let key_amount = self.config.deposits.key;
        // one up-front check covers the fee and the escrow together
        let total = self.payable_total(&caller, fee, key_amount)?;
        self.bank.ensure_balance(&caller, total)?;
        self.bank.transfer(&caller, &treasury, fee)?;
        let deposit =
            self.bank
                .allocate(&caller, Keychain::key_record_id(domain, &caller), key_amount)?;

        let member = self
            .keychains
            .get_mut(&id)
            .ok_or_else(|| KeychainError::NotFound(format!("keychain {domain}/{name}")))?
            .member_mut(&caller)
            .ok_or(KeychainError::Unverifiable { key: caller })?;
        member.verified = true;
        member.deposit = Some(deposit);
        self.index.promote(&caller);

        info!(domain, keychain = name, key = %caller, fee, "key verified");
        self.events.record(GovernanceEvent::KeyVerified {
            domain: domain.to_string(),
            keychain: name.to_string(),
            key: caller,
            fee,
        });
        Ok(())
    }

    /// Cast a vote on the open proposal.
    ///
    /// Authorization uses *current* verified membership, not the frozen
    /// quorum snapshot, so a member verified after the proposal opened
    /// may vote without enlarging the quorum. A yes clears any earlier
    /// no from the same member and vice versa; repeating the same
    /// direction changes nothing.
    pub fn vote_pending_action(
        &mut self,
        domain: &str,
        name: &str,
        approve: bool,
        caller: KeyId,
    ) -> Result<()> {
        let id = Keychain::record_id(domain, name);
        let kc = self
            .keychains
            .get_mut(&id)
            .ok_or_else(|| KeychainError::NotFound(format!("keychain {domain}/{name}")))?;
        if kc.pending.is_none() {
            return Err(KeychainError::NoPendingAction);
        }
        let slot = kc
            .member(&caller)
            .filter(|m| m.verified)
            .map(|m| m.slot)
            .ok_or(KeychainError::Unauthorized { caller })?;
        if let Some(action) = kc.pending.as_mut() {
            action.record_vote(slot, approve);
        }

        debug!(domain, keychain = name, voter = %caller, approve, "vote cast");
        self.events.record(GovernanceEvent::VoteCast {
            domain: domain.to_string(),
            keychain: name.to_string(),
            voter: caller,
            approve,
        });
        self.resolve(id)
    }

    /// Sum two charges that must be paid together in one call.
    ///
    /// `verification_cost` is caller-chosen at domain creation, so the
    /// sum may not fit in [`Amount`]. An unpayable total fails as
    /// `InsufficientFunds` before anything moves; the reported need is
    /// saturated.
    fn payable_total(&self, payer: &KeyId, a: Amount, b: Amount) -> Result<Amount> {
        a.checked_add(b).ok_or_else(|| {
            CoreError::InsufficientFunds {
                needed: Amount::MAX,
                available: self.bank.balance(payer),
            }
            .into()
        })
    }

    /// The only query external subsystems may depend on: is `identity`
    /// a current verified member of this keychain?
    pub fn is_authorized(&self, domain: &str, name: &str, identity: &KeyId) -> bool {
        self.keychains
            .get(&Keychain::record_id(domain, name))
            .map(|kc| kc.has_verified_member(identity))
            .unwrap_or(false)
    }

    /// Apply the terminal transition if either tally has reached the
    /// threshold; otherwise leave the action pending.
    fn resolve(&mut self, id: RecordId) -> Result<()> {
        let outcome = match self.keychains.get(&id).and_then(|kc| kc.pending_action()) {
            Some(action) => action.outcome(),
            None => return Ok(()),
        };
        match outcome {
            None => Ok(()),
            Some(Outcome::Approved) => self.commit(id),
            Some(Outcome::Rejected) => self.cancel(id),
        }
    }

    /// Majority yes: apply the proposed mutation and close the action.
    fn commit(&mut self, id: RecordId) -> Result<()> {
        let kc = self
            .keychains
            .get_mut(&id)
            .ok_or_else(|| KeychainError::NotFound("keychain".to_string()))?;
        let kind = kc
            .pending
            .as_ref()
            .map(|a| a.kind)
            .ok_or(KeychainError::NoPendingAction)?;
        let domain = kc.domain.clone();
        let name = kc.name.clone();

        match kind {
            ActionKind::AddKey(target) => {
                // the member entry went in at proposal time, still
                // unverified; committing only closes the action
                kc.pending = None;
                info!(domain = %domain, keychain = %name, key = %target, "add key committed");
            }
            ActionKind::RemoveKey(target) => {
                let member = kc
                    .drop_member(&target)
                    .ok_or_else(|| KeychainError::NotFound(format!("key {target}")))?;
                kc.pending = None;
                let emptied = kc.is_empty();

                if member.verified {
                    self.index.drop_verified(&target);
                } else {
                    self.index.drop_unverified(&target);
                }
                if let Some(deposit) = member.deposit {
                    // the refund goes to the removed key itself, never
                    // the treasury or the caller
                    self.bank.release(deposit, &target);
                }
                info!(domain = %domain, keychain = %name, key = %target, "remove key committed");

                if emptied {
                    let keychain = self
                        .keychains
                        .remove(&id)
                        .ok_or_else(|| KeychainError::NotFound("keychain".to_string()))?;
                    self.bank.release(keychain.deposit, &target);
                    info!(domain = %domain, keychain = %name, "last key removed, keychain destroyed");
                    self.events.record(GovernanceEvent::KeychainDestroyed {
                        domain: domain.clone(),
                        keychain: name.clone(),
                        beneficiary: target,
                    });
                }
            }
        }

        self.events.record(GovernanceEvent::ProposalCommitted {
            domain,
            keychain: name,
            kind,
        });
        Ok(())
    }

    /// Majority no: discard the proposal. No funds ever move here.
    fn cancel(&mut self, id: RecordId) -> Result<()> {
        let kc = self
            .keychains
            .get_mut(&id)
            .ok_or_else(|| KeychainError::NotFound("keychain".to_string()))?;
        let kind = kc
            .pending
            .as_ref()
            .map(|a| a.kind)
            .ok_or(KeychainError::NoPendingAction)?;
        let domain = kc.domain.clone();
        let name = kc.name.clone();
        kc.pending = None;

        if let ActionKind::AddKey(target) = kind {
            // the entry inserted at proposal time never got to verify,
            // so it cannot be carrying an escrowed deposit
            if let Some(member) = kc.drop_member(&target) {
                debug_assert!(member.deposit.is_none());
            }
            self.index.drop_unverified(&target);
        }

        info!(domain = %domain, keychain = %name, ?kind, "pending action cancelled");
        self.events.record(GovernanceEvent::ProposalCancelled {
            domain,
            keychain: name,
            kind,
        });
        Ok(())
    }
}

impl Default for KeychainEngine {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(n: u8) -> KeyId {
        KeyId::from_bytes([n; 32])
    }

    fn engine_with_keychain(founder: KeyId) -> KeychainEngine {
        let mut engine = KeychainEngine::new();
        engine.bank_mut().deposit(founder, 100_000_000);
        engine
            .create_domain("domination", 10_000, key(99), founder)
            .unwrap();
        engine
            .create_keychain("domination", "player1", founder, founder)
            .unwrap();
        engine
    }

    #[test]
    fn test_is_authorized_tracks_verification() {
        let founder = key(1);
        let joiner = key(2);
        let mut engine = engine_with_keychain(founder);
        engine.bank_mut().deposit(joiner, 100_000_000);

        assert!(engine.is_authorized("domination", "player1", &founder));
        assert!(!engine.is_authorized("domination", "player1", &joiner));

        engine
            .propose_add("domination", "player1", joiner, founder)
            .unwrap();
        // inserted but unverified
        assert!(!engine.is_authorized("domination", "player1", &joiner));

        engine.verify_key("domination", "player1", joiner).unwrap();
        assert!(engine.is_authorized("domination", "player1", &joiner));
    }

    #[test]
    fn test_is_authorized_unknown_keychain_is_false() {
        let engine = KeychainEngine::new();
        assert!(!engine.is_authorized("domination", "ghost", &key(1)));
    }

    #[test]
    fn test_verify_blocked_while_own_add_is_pending() {
        let founder = key(1);
        let second = key(2);
        let third = key(3);
        let mut engine = engine_with_keychain(founder);
        for k in [second, third] {
            engine.bank_mut().deposit(k, 100_000_000);
        }

        // grow to two verified members so proposals stay pending
        engine
            .propose_add("domination", "player1", second, founder)
            .unwrap();
        engine.verify_key("domination", "player1", second).unwrap();

        engine
            .propose_add("domination", "player1", third, founder)
            .unwrap();
        let err = engine
            .verify_key("domination", "player1", third)
            .unwrap_err();
        assert!(matches!(err, KeychainError::Unverifiable { .. }));

        // once the add commits, verification goes through
        engine
            .vote_pending_action("domination", "player1", true, second)
            .unwrap();
        engine.verify_key("domination", "player1", third).unwrap();
    }

    #[test]
    fn test_verify_with_extreme_fee_fails_without_side_effects() {
        let founder = key(1);
        let joiner = key(2);
        let treasury = key(99);
        let mut engine = KeychainEngine::new();
        engine.bank_mut().deposit(founder, 100_000_000);
        // a full balance would satisfy a wrapped sum, so fund to the max
        engine.bank_mut().deposit(joiner, Amount::MAX);
        engine
            .create_domain("domination", Amount::MAX, treasury, founder)
            .unwrap();
        engine
            .create_keychain("domination", "player1", founder, founder)
            .unwrap();
        engine
            .propose_add("domination", "player1", joiner, founder)
            .unwrap();

        let err = engine
            .verify_key("domination", "player1", joiner)
            .unwrap_err();
        assert!(err.is_insufficient_funds());
        // no fee moved, no escrow taken, no verification recorded
        assert_eq!(engine.bank().balance(&treasury), 0);
        assert_eq!(engine.bank().balance(&joiner), Amount::MAX);
        assert!(!engine.is_authorized("domination", "player1", &joiner));
    }

    #[test]
    fn test_create_keychain_with_extreme_deposits_fails_cleanly() {
        let founder = key(1);
        let mut config = Config::default_config();
        config.deposits.domain = 1;
        config.deposits.keychain = Amount::MAX;
        config.deposits.key = Amount::MAX;
        let mut engine = KeychainEngine::with_config(config);
        engine.bank_mut().deposit(founder, Amount::MAX);
        engine
            .create_domain("domination", 10_000, key(99), founder)
            .unwrap();

        let err = engine
            .create_keychain("domination", "player1", founder, founder)
            .unwrap_err();
        assert!(err.is_insufficient_funds());
        assert!(engine.keychain("domination", "player1").is_none());
        assert_eq!(engine.bank().balance(&founder), Amount::MAX - 1);
        assert_eq!(engine.bank().escrowed(), 1);
    }

    #[test]
    fn test_create_domain_requires_deposit_funds() {
        let mut engine = KeychainEngine::new();
        let err = engine
            .create_domain("domination", 10_000, key(99), key(1))
            .unwrap_err();
        assert!(err.is_insufficient_funds());
        assert!(engine.registry().is_empty());
    }

    #[test]
    fn test_create_keychain_authority_may_found_for_another() {
        let authority = key(1);
        let founder = key(2);
        let outsider = key(3);
        let mut engine = KeychainEngine::new();
        engine.bank_mut().deposit(authority, 100_000_000);
        engine.bank_mut().deposit(outsider, 100_000_000);
        engine
            .create_domain("domination", 10_000, key(99), authority)
            .unwrap();

        // a non-authority cannot found for someone else
        let err = engine
            .create_keychain("domination", "player1", founder, outsider)
            .unwrap_err();
        assert!(matches!(err, KeychainError::Unauthorized { .. }));

        // the authority can
        engine
            .create_keychain("domination", "player1", founder, authority)
            .unwrap();
        assert!(engine.is_authorized("domination", "player1", &founder));
    }
}
