//! Core primitives for the keychain governance workspace.
//!
//! This crate provides the fundamental types and utilities shared by
//! the governance engine: identity and record identifiers, the balance
//! ledger with deposit-backed record lifecycle, configuration, and
//! logging bootstrap.

pub mod config;
pub mod error;
pub mod funds;
pub mod logging;
pub mod types;

pub use config::{Config, DepositConfig, LimitsConfig};
pub use error::{CoreError, Result};
pub use funds::{Bank, DepositHandle};
pub use types::{Amount, KeyId, RecordId};
