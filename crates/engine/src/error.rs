//! Error taxonomy for keychain governance operations.

use keychain_core::{CoreError, KeyId};
use thiserror::Error;

/// Errors returned by the governance engine.
///
/// Every operation either fully applies its effect or returns one of
/// these with zero persisted side effects. None is terminal: callers
/// correct the triggering condition and resubmit.
#[derive(Debug, Error)]
pub enum KeychainError {
    /// A domain or keychain with that name already exists
    #[error("already exists: {0}")]
    AlreadyExists(String),

    /// The named domain, keychain, or member does not exist
    #[error("not found: {0}")]
    NotFound(String),

    /// The caller may not perform this operation
    #[error("caller {caller} is not authorized")]
    Unauthorized { caller: KeyId },

    /// The key is already a member here or claimed by another keychain
    #[error("duplicate key: {key}")]
    DuplicateKey { key: KeyId },

    /// Another proposal is still open on this keychain
    #[error("a pending action already exists")]
    ActionInProgress,

    /// No proposal is open on this keychain
    #[error("no pending action exists")]
    NoPendingAction,

    /// The key is not currently awaiting verification on this keychain
    #[error("key {key} cannot be verified on this keychain")]
    Unverifiable { key: KeyId },

    /// Name failed validation
    #[error("invalid name: {0}")]
    InvalidName(String),

    /// The keychain already holds the maximum number of keys
    #[error("keychain is full, limit is {limit} keys")]
    MaxKeys { limit: usize },

    /// Funds or deposit-ledger failure (`InsufficientFunds` surfaces here)
    #[error(transparent)]
    Core(#[from] CoreError),
}

impl KeychainError {
    /// True when the failure was an insufficient balance.
    pub fn is_insufficient_funds(&self) -> bool {
        matches!(self, Self::Core(CoreError::InsufficientFunds { .. }))
    }
}

/// Result type for governance operations.
pub type Result<T> = std::result::Result<T, KeychainError>;
