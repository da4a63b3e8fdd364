//! Identifier primitives shared across the keychain workspace.

use ed25519_dalek::VerifyingKey;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Balances, fees, and deposits are all denominated in this unit.
pub type Amount = u64;

/// A public identity participating in keychain governance.
///
/// Wraps the 32-byte Ed25519 verifying key of a wallet. Everything the
/// engine authorizes or pays (domain authorities, treasuries, members,
/// proposed keys) is a `KeyId`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
pub struct KeyId([u8; 32]);

impl KeyId {
    /// Construct from raw key bytes.
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Raw key bytes, usable as a derivation seed.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl From<VerifyingKey> for KeyId {
    fn from(vk: VerifyingKey) -> Self {
        Self(vk.to_bytes())
    }
}

impl From<&VerifyingKey> for KeyId {
    fn from(vk: &VerifyingKey) -> Self {
        Self(vk.to_bytes())
    }
}

impl fmt::Display for KeyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

/// Deterministic handle for an allocated record.
///
/// Derived with BLAKE3 over a seed tuple so the same inputs, such as
/// `(name, "keychains", domain)`, always resolve to the same id
/// without any registry round-trip.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RecordId([u8; 32]);

impl RecordId {
    /// Derive a record id from an ordered seed tuple.
    pub fn derive(seeds: &[&[u8]]) -> Self {
        let mut hasher = blake3::Hasher::new();
        for seed in seeds {
            // length-prefixed so seed boundaries stay unambiguous
            hasher.update(&(seed.len() as u64).to_le_bytes());
            hasher.update(seed);
        }
        Self(*hasher.finalize().as_bytes())
    }

    /// Raw id bytes.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}
