//! Governance event trail.
//!
//! Every governance-visible state change is appended to a bounded
//! in-memory trail, mirroring what the engine also logs through
//! `tracing`. Tests and audit tooling read it back; nothing in the
//! engine depends on it.

use crate::pending::ActionKind;
use keychain_core::{Amount, KeyId};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use tracing::debug;

/// Default number of events retained before the oldest are dropped.
const DEFAULT_CAPACITY: usize = 1024;

/// One governance-visible state change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum GovernanceEvent {
    DomainCreated {
        domain: String,
        authority: KeyId,
    },
    KeychainCreated {
        domain: String,
        keychain: String,
        founder: KeyId,
    },
    ProposalOpened {
        domain: String,
        keychain: String,
        kind: ActionKind,
        proposer: KeyId,
        quorum: u16,
    },
    VoteCast {
        domain: String,
        keychain: String,
        voter: KeyId,
        approve: bool,
    },
    KeyVerified {
        domain: String,
        keychain: String,
        key: KeyId,
        fee: Amount,
    },
    ProposalCommitted {
        domain: String,
        keychain: String,
        kind: ActionKind,
    },
    ProposalCancelled {
        domain: String,
        keychain: String,
        kind: ActionKind,
    },
    KeychainDestroyed {
        domain: String,
        keychain: String,
        beneficiary: KeyId,
    },
}

/// Bounded append-only trail of governance events.
#[derive(Debug, Serialize, Deserialize)]
pub struct EventTrail {
    events: VecDeque<GovernanceEvent>,
    capacity: usize,
}

impl EventTrail {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            events: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub(crate) fn record(&mut self, event: GovernanceEvent) {
        debug!(?event, "governance event");
        if self.events.len() >= self.capacity {
            self.events.pop_front();
        }
        self.events.push_back(event);
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn latest(&self) -> Option<&GovernanceEvent> {
        self.events.back()
    }

    pub fn iter(&self) -> impl Iterator<Item = &GovernanceEvent> {
        self.events.iter()
    }

    /// Serialize the whole trail for export or audit.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(&self.events)
    }
}

impl Default for EventTrail {
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

    #[test]
    fn test_trail_records_in_order() {
        let mut trail = EventTrail::new();
        trail.record(GovernanceEvent::DomainCreated {
            domain: "domination".into(),
            authority: key(1),
        });
        trail.record(GovernanceEvent::KeychainCreated {
            domain: "domination".into(),
            keychain: "player1".into(),
            founder: key(2),
        });

        assert_eq!(trail.len(), 2);
        assert!(matches!(
            trail.latest(),
            Some(GovernanceEvent::KeychainCreated { .. })
        ));
    }

    #[test]
    fn test_trail_drops_oldest_beyond_capacity() {
        let mut trail = EventTrail::with_capacity(2);
        for n in 1..=3 {
            trail.record(GovernanceEvent::DomainCreated {
                domain: format!("domain{n}"),
                authority: key(n),
            });
        }

        assert_eq!(trail.len(), 2);
        let first = trail.iter().next().unwrap();
        assert!(matches!(
            first,
            GovernanceEvent::DomainCreated { domain, .. } if domain == "domain2"
        ));
    }

    #[test]
    fn test_trail_serializes_to_json() {
        let mut trail = EventTrail::new();
        trail.record(GovernanceEvent::VoteCast {
            domain: "domination".into(),
            keychain: "player1".into(),
            voter: key(3),
            approve: true,
        });

        let json = trail.to_json().unwrap();
        assert!(json.contains("VoteCast"));
    }
}
