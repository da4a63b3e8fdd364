//! Pending-action state: one open proposal per keychain.
//!
//! Vote tallies are bitsets addressed by stable member slot, scoped to
//! the lifetime of a single [`PendingAction`]. Nothing here persists
//! across proposals, which is what makes freed slots safely reusable.

use keychain_core::KeyId;
use serde::{Deserialize, Serialize};

/// Membership mutation being voted on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ActionKind {
    /// Add `target` as a new (initially unverified) member.
    AddKey(KeyId),
    /// Remove `target` from the member list.
    RemoveKey(KeyId),
}

/// Bitmask of member slots that have voted in one direction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteSet(u16);

impl VoteSet {
    /// Number of addressable slots.
    pub const CAPACITY: u8 = 16;

    /// Record a vote for `slot`. Idempotent: re-casting never inflates
    /// the tally.
    pub fn cast(&mut self, slot: u8) {
        self.0 |= 1 << slot;
    }

    /// Withdraw the vote at `slot`, if any.
    pub fn retract(&mut self, slot: u8) {
        self.0 &= !(1 << slot);
    }

    pub fn contains(&self, slot: u8) -> bool {
        self.0 & (1 << slot) != 0
    }

    /// Popcount of the set.
    pub fn count(&self) -> u16 {
        self.0.count_ones() as u16
    }
}

/// Terminal result of a resolved proposal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Majority yes: apply the mutation.
    Approved,
    /// Majority no: discard the proposal.
    Rejected,
}

/// An open, unresolved proposal to add or remove a key.
#[derive(Debug, Serialize, Deserialize)]
pub struct PendingAction {
    pub kind: ActionKind,
    pub yes: VoteSet,
    pub no: VoteSet,
    /// Verified member count frozen at proposal time. Never recomputed.
    pub quorum: u16,
}

impl PendingAction {
    pub(crate) fn new(kind: ActionKind, quorum: u16) -> Self {
        Self {
            kind,
            yes: VoteSet::default(),
            no: VoteSet::default(),
            quorum,
        }
    }

    /// Strict majority of the membership as it stood when the proposal
    /// opened.
    pub fn threshold(&self) -> u16 {
        self.quorum / 2 + 1
    }

    /// Cast or flip a vote. A yes clears any no at the same slot and
    /// vice versa; repeating the same direction is a no-op.
    pub(crate) fn record_vote(&mut self, slot: u8, approve: bool) {
        if approve {
            self.yes.cast(slot);
            self.no.retract(slot);
        } else {
            self.no.cast(slot);
            self.yes.retract(slot);
        }
    }

    /// The decision, if either side has reached the threshold.
    pub fn outcome(&self) -> Option<Outcome> {
        if self.yes.count() >= self.threshold() {
            Some(Outcome::Approved)
        } else if self.no.count() >= self.threshold() {
            Some(Outcome::Rejected)
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn target() -> KeyId {
        KeyId::from_bytes([9; 32])
    }

    #[test]
    fn test_vote_set_is_idempotent() {
        let mut votes = VoteSet::default();
        votes.cast(3);
        votes.cast(3);
        votes.cast(3);
        assert_eq!(votes.count(), 1);
        assert!(votes.contains(3));
    }

    #[test]
    fn test_vote_set_retract() {
        let mut votes = VoteSet::default();
        votes.cast(0);
        votes.cast(2);
        votes.retract(0);
        assert_eq!(votes.count(), 1);
        assert!(!votes.contains(0));
        assert!(votes.contains(2));
    }

    #[test]
    fn test_threshold_is_strict_majority() {
        for (quorum, expected) in [(1, 1), (2, 2), (3, 2), (4, 3), (5, 3)] {
            let action = PendingAction::new(ActionKind::AddKey(target()), quorum);
            assert_eq!(action.threshold(), expected, "quorum {quorum}");
        }
    }

    #[test]
    fn test_vote_flips_clear_the_other_side() {
        let mut action = PendingAction::new(ActionKind::RemoveKey(target()), 3);
        action.record_vote(1, true);
        action.record_vote(1, false);
        assert_eq!(action.yes.count(), 0);
        assert_eq!(action.no.count(), 1);

        action.record_vote(1, true);
        assert_eq!(action.yes.count(), 1);
        assert_eq!(action.no.count(), 0);
    }

    #[test]
    fn test_outcome_requires_threshold() {
        let mut action = PendingAction::new(ActionKind::AddKey(target()), 3);
        action.record_vote(0, true);
        assert_eq!(action.outcome(), None);

        action.record_vote(1, false);
        assert_eq!(action.outcome(), None);

        action.record_vote(2, true);
        assert_eq!(action.outcome(), Some(Outcome::Approved));
    }

    #[test]
    fn test_single_member_quorum_resolves_on_one_vote() {
        let mut action = PendingAction::new(ActionKind::RemoveKey(target()), 1);
        action.record_vote(0, true);
        assert_eq!(action.outcome(), Some(Outcome::Approved));
    }

    #[test]
    fn test_rejection_outcome() {
        let mut action = PendingAction::new(ActionKind::AddKey(target()), 2);
        action.record_vote(0, false);
        action.record_vote(1, false);
        assert_eq!(action.outcome(), Some(Outcome::Rejected));
    }
}
