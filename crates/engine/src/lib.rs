//! Threshold-voting governance for durable, named on-ledger identities.
//!
//! A keychain is a named identity controlled by a rotating set of
//! keys. While it has a single key that key acts alone; once it has
//! more, no single key can change the membership: every add or remove
//! runs through a majority vote whose quorum is frozen the instant the
//! proposal opens. New keys only become vote-eligible after a
//! self-attested verification handshake that charges the domain's
//! anti-sybil fee.
//!
//! # Components
//!
//! - **Domain registry** ([`domain`]): root namespaces holding the fee
//!   treasury and the per-key verification cost.
//! - **Keychain identity store** ([`keychain`]): the ordered member
//!   lists and the global uniqueness index mapping a key to the one
//!   keychain claiming it.
//! - **Pending-action engine** ([`pending`], [`engine`]): the single
//!   in-flight proposal slot per keychain, vote bitsets over stable
//!   member slots, and the exactly-once commit/cancel resolution.
//! - **Event trail** ([`event`]): bounded audit log of every
//!   governance-visible state change.

pub mod domain;
pub mod engine;
pub mod error;
pub mod event;
pub mod keychain;
pub mod pending;
mod util;

pub use domain::{Domain, DomainRegistry};
pub use engine::KeychainEngine;
pub use error::{KeychainError, Result};
pub use event::{EventTrail, GovernanceEvent};
pub use keychain::{Keychain, Member, MembershipIndex};
pub use pending::{ActionKind, Outcome, PendingAction, VoteSet};

// Re-export core types for convenience
pub use keychain_core::{Amount, Bank, Config, CoreError, DepositHandle, KeyId, RecordId};
