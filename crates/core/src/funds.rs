//! Balance ledger and deposit-backed record lifecycle.
//!
//! Every durable record in the system (domain, keychain, membership
//! index entry) is backed by an escrowed deposit that is paid by a
//! named payer at allocation and refunded to a named beneficiary at
//! destruction. This module provides that lifecycle as two primitives,
//! `allocate` and `release`, plus plain fee transfers between
//! identities.
//!
//! # Guarantees
//!
//! - A failed debit has no effect: the payer's balance is checked
//!   before anything is moved.
//! - A [`DepositHandle`] is move-only. Releasing it consumes it, so a
//!   deposit can be refunded exactly once.
//! - Total supply (balances plus escrow) is conserved by every
//!   operation.

use crate::error::{CoreError, Result};
use crate::types::{Amount, KeyId, RecordId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

/// Escrow backing one allocated record.
///
/// Deliberately neither `Clone` nor `Copy`: the handle is the sole
/// proof that the escrow is still live, and [`Bank::release`] takes it
/// by value.
#[derive(Debug, Serialize, Deserialize)]
pub struct DepositHandle {
    record: RecordId,
    amount: Amount,
}

impl DepositHandle {
    /// Record this deposit backs.
    pub fn record(&self) -> RecordId {
        self.record
    }

    /// Escrowed amount, refunded in full at release.
    pub fn amount(&self) -> Amount {
        self.amount
    }
}

/// In-memory balance ledger keyed by identity.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct Bank {
    balances: BTreeMap<KeyId, Amount>,
    escrowed: Amount,
}

impl Bank {
    /// Create an empty bank.
    pub fn new() -> Self {
        Self::default()
    }

    /// Credit an account. Used by the host to fund identities.
    pub fn deposit(&mut self, account: KeyId, amount: Amount) {
        *self.balances.entry(account).or_default() += amount;
    }

    /// Current spendable balance of an account.
    pub fn balance(&self, account: &KeyId) -> Amount {
        self.balances.get(account).copied().unwrap_or(0)
    }

    /// Total escrowed across all live deposits.
    pub fn escrowed(&self) -> Amount {
        self.escrowed
    }

    /// Balances plus escrow. Conserved by every operation.
    pub fn total_supply(&self) -> Amount {
        self.balances.values().sum::<Amount>() + self.escrowed
    }

    /// Fail `InsufficientFunds` unless `account` holds at least `amount`.
    ///
    /// Callers that need several debits in one atomic operation check
    /// the combined amount up front with this before moving anything.
    pub fn ensure_balance(&self, account: &KeyId, amount: Amount) -> Result<()> {
        let available = self.balance(account);
        if available < amount {
            return Err(CoreError::InsufficientFunds {
                needed: amount,
                available,
            });
        }
        Ok(())
    }

    /// Move `amount` from one account to another.
    ///
    /// No partial effect: fails `InsufficientFunds` before anything
    /// moves. A zero-amount or self transfer is a no-op.
    pub fn transfer(&mut self, from: &KeyId, to: &KeyId, amount: Amount) -> Result<()> {
        self.ensure_balance(from, amount)?;
        if amount == 0 || from == to {
            return Ok(());
        }
        *self.balances.entry(*from).or_default() -= amount;
        *self.balances.entry(*to).or_default() += amount;
        debug!(%from, %to, amount, "transfer");
        Ok(())
    }

    /// Escrow `amount` from `payer` against a record being created.
    pub fn allocate(
        &mut self,
        payer: &KeyId,
        record: RecordId,
        amount: Amount,
    ) -> Result<DepositHandle> {
        self.ensure_balance(payer, amount)?;
        *self.balances.entry(*payer).or_default() -= amount;
        self.escrowed += amount;
        debug!(%payer, %record, amount, "deposit escrowed");
        Ok(DepositHandle { record, amount })
    }

    /// Refund an escrowed deposit to `beneficiary`, consuming the handle.
    pub fn release(&mut self, handle: DepositHandle, beneficiary: &KeyId) {
        self.escrowed -= handle.amount;
        *self.balances.entry(*beneficiary).or_default() += handle.amount;
        debug!(%beneficiary, record = %handle.record, amount = handle.amount, "deposit released");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(n: u8) -> KeyId {
        KeyId::from_bytes([n; 32])
    }

    fn record(n: u8) -> RecordId {
        RecordId::derive(&[&[n]])
    }

    #[test]
    fn test_deposit_and_balance() {
        let mut bank = Bank::new();
        bank.deposit(key(1), 500);
        assert_eq!(bank.balance(&key(1)), 500);
        assert_eq!(bank.balance(&key(2)), 0);
    }

    #[test]
    fn test_transfer_moves_funds() {
        let mut bank = Bank::new();
        bank.deposit(key(1), 100);
        bank.transfer(&key(1), &key(2), 60).unwrap();
        assert_eq!(bank.balance(&key(1)), 40);
        assert_eq!(bank.balance(&key(2)), 60);
    }

    #[test]
    fn test_transfer_insufficient_funds_has_no_effect() {
        let mut bank = Bank::new();
        bank.deposit(key(1), 10);
        let err = bank.transfer(&key(1), &key(2), 11).unwrap_err();
        assert!(matches!(
            err,
            CoreError::InsufficientFunds {
                needed: 11,
                available: 10
            }
        ));
        assert_eq!(bank.balance(&key(1)), 10);
        assert_eq!(bank.balance(&key(2)), 0);
    }

    #[test]
    fn test_self_transfer_is_noop() {
        let mut bank = Bank::new();
        bank.deposit(key(1), 10);
        bank.transfer(&key(1), &key(1), 10).unwrap();
        assert_eq!(bank.balance(&key(1)), 10);
    }

    #[test]
    fn test_allocate_then_release_round_trips() {
        let mut bank = Bank::new();
        bank.deposit(key(1), 100);
        let handle = bank.allocate(&key(1), record(9), 70).unwrap();
        assert_eq!(bank.balance(&key(1)), 30);
        assert_eq!(bank.escrowed(), 70);
        assert_eq!(handle.amount(), 70);

        bank.release(handle, &key(2));
        assert_eq!(bank.balance(&key(2)), 70);
        assert_eq!(bank.escrowed(), 0);
    }

    #[test]
    fn test_allocate_insufficient_funds() {
        let mut bank = Bank::new();
        bank.deposit(key(1), 5);
        assert!(bank.allocate(&key(1), record(9), 6).is_err());
        assert_eq!(bank.balance(&key(1)), 5);
        assert_eq!(bank.escrowed(), 0);
    }

    #[test]
    fn test_total_supply_conserved() {
        let mut bank = Bank::new();
        bank.deposit(key(1), 1000);
        bank.deposit(key(2), 200);
        assert_eq!(bank.total_supply(), 1200);

        let handle = bank.allocate(&key(1), record(3), 400).unwrap();
        assert_eq!(bank.total_supply(), 1200);

        bank.transfer(&key(2), &key(1), 150).unwrap();
        assert_eq!(bank.total_supply(), 1200);

        bank.release(handle, &key(2));
        assert_eq!(bank.total_supply(), 1200);
    }
}
