//! Balance and key tables.
//!
//! [`LedgerView`] is the read contract operations, transactions and blocks are
//! verified against. [`Ledger`] is the concrete table the chain materializes
//! by replaying committed operations.

use crate::account::{Account, AccountId};
use crate::crypto::PublicKey;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use thiserror::Error;

/// Errors from direct ledger mutation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StateError {
    #[error("insufficient funds in {account} (required {required}, available {available})")]
    InsufficientFunds {
        account: AccountId,
        required: u64,
        available: u64,
    },

    #[error("balance overflow in {0}")]
    Overflow(AccountId),
}

/// Read-only access to balances and registered keys.
pub trait LedgerView {
    /// Balance of a known account, `None` if the account is unknown.
    fn balance_of(&self, id: &AccountId) -> Option<u64>;

    /// Whether `key` is one of the account's registered public keys.
    fn has_key(&self, id: &AccountId, key: &PublicKey) -> bool;
}

/// Balances plus the public keys each account has published.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Ledger {
    balances: HashMap<AccountId, u64>,
    keys: HashMap<AccountId, Vec<PublicKey>>,
}

impl Ledger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a table seeded from the accounts' local balances.
    ///
    /// Fixture helper: production ledgers start empty and grow by replay.
    pub fn from_accounts<'a>(accounts: impl IntoIterator<Item = &'a Account>) -> Self {
        let mut ledger = Self::new();
        for account in accounts {
            ledger.register(account);
            ledger.balances.insert(account.id(), account.balance());
        }
        ledger
    }

    /// Publish an account's keys, creating a zero balance entry if new.
    ///
    /// Keys already known are kept; new ones are appended.
    pub fn register(&mut self, account: &Account) {
        self.balances.entry(account.id()).or_insert(0);
        let known = self.keys.entry(account.id()).or_default();
        for key in account.public_keys() {
            if !known.contains(&key) {
                known.push(key);
            }
        }
    }

    /// Balance, treating unknown accounts as empty.
    pub fn balance(&self, id: &AccountId) -> u64 {
        self.balances.get(id).copied().unwrap_or(0)
    }

    pub fn credit(&mut self, id: &AccountId, amount: u64) -> Result<(), StateError> {
        let balance = self.balances.entry(*id).or_insert(0);
        *balance = balance
            .checked_add(amount)
            .ok_or(StateError::Overflow(*id))?;
        Ok(())
    }

    pub fn debit(&mut self, id: &AccountId, amount: u64) -> Result<(), StateError> {
        let available = self.balance(id);
        if available < amount {
            return Err(StateError::InsufficientFunds {
                account: *id,
                required: amount,
                available,
            });
        }
        self.balances.insert(*id, available - amount);
        Ok(())
    }

    /// Move `amount` from `from` to `to`.
    pub fn transfer(
        &mut self,
        from: &AccountId,
        to: &AccountId,
        amount: u64,
    ) -> Result<(), StateError> {
        self.debit(from, amount)?;
        self.credit(to, amount)
    }

    /// Sum of all balances.
    pub fn total_supply(&self) -> u128 {
        self.balances.values().map(|&b| b as u128).sum()
    }

    /// Immutable copy of the balance table.
    pub fn snapshot(&self) -> BalanceSnapshot {
        BalanceSnapshot {
            balances: self.balances.iter().map(|(k, v)| (*k, *v)).collect(),
        }
    }
}

impl LedgerView for Ledger {
    fn balance_of(&self, id: &AccountId) -> Option<u64> {
        self.balances.get(id).copied()
    }

    fn has_key(&self, id: &AccountId, key: &PublicKey) -> bool {
        self.keys.get(id).is_some_and(|keys| keys.contains(key))
    }
}

/// A point-in-time copy of account balances.
///
/// Has no mutators; callers cannot reach chain state through it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BalanceSnapshot {
    balances: BTreeMap<AccountId, u64>,
}

impl BalanceSnapshot {
    pub fn get(&self, id: &AccountId) -> Option<u64> {
        self.balances.get(id).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&AccountId, &u64)> {
        self.balances.iter()
    }

    pub fn total(&self) -> u128 {
        self.balances.values().map(|&b| b as u128).sum()
    }
}
