//! Accounts: an identity, its signing keys and an advisory balance.
//!
//! The balance held here is a local view. The authoritative balance lives in
//! the chain's [`Ledger`](crate::state::Ledger) and only changes when a block
//! is appended; use [`Account::sync_balance`] to refresh the local copy.

use crate::crypto::{CryptoError, Keypair, PublicKey};
use crate::hash::{hash_encoded, Hash};
use crate::operation::Operation;
use crate::state::LedgerView;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Errors raised by account-level checks.
#[derive(Debug, Error)]
pub enum AccountError {
    #[error("key generation failed: {0}")]
    KeyGeneration(#[from] CryptoError),

    #[error("amount must be positive")]
    InvalidAmount,

    #[error("insufficient funds (required {required}, available {available})")]
    InsufficientFunds { required: u64, available: u64 },

    #[error("balance overflow")]
    BalanceOverflow,

    #[error("signing key is not owned by account {0}")]
    UnknownKey(AccountId),
}

/// Stable account identifier: the digest of the account's initial key material.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub struct AccountId(pub Hash);

impl AccountId {
    /// Derive the id from the public keys an account is created with.
    pub fn derive(initial_keys: &[PublicKey]) -> Self {
        Self(hash_encoded(initial_keys))
    }

    /// Get the underlying bytes.
    pub fn as_bytes(&self) -> &[u8; 32] {
        self.0.as_bytes()
    }

    /// Short hex form for logs and console output.
    pub fn short(&self) -> String {
        self.0.to_hex()[..12].to_string()
    }
}

impl fmt::Debug for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AccountId({})", self.short())
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A ledger participant.
///
/// Equality compares ids only; two handles on the same account with diverged
/// balances are still the same account.
#[derive(Debug, Clone)]
pub struct Account {
    id: AccountId,
    keys: Vec<Keypair>,
    balance: u64,
}

impl Account {
    /// Create an account with a freshly generated keypair and zero balance.
    pub fn create() -> Result<Self, AccountError> {
        let keypair = Keypair::try_generate()?;
        Ok(Self::from_keypair(keypair))
    }

    /// Create an account around an existing keypair.
    pub fn from_keypair(keypair: Keypair) -> Self {
        let id = AccountId::derive(std::slice::from_ref(&keypair.public_key));
        Self {
            id,
            keys: vec![keypair],
            balance: 0,
        }
    }

    pub fn id(&self) -> AccountId {
        self.id
    }

    pub fn balance(&self) -> u64 {
        self.balance
    }

    /// All keys, oldest first. `keys()[0]` is the creating key.
    pub fn keys(&self) -> &[Keypair] {
        &self.keys
    }

    /// The key the account was created with.
    pub fn primary_key(&self) -> &Keypair {
        &self.keys[0]
    }

    pub fn public_keys(&self) -> Vec<PublicKey> {
        self.keys.iter().map(|k| k.public_key.clone()).collect()
    }

    pub fn owns_key(&self, key: &PublicKey) -> bool {
        self.keys.iter().any(|k| &k.public_key == key)
    }

    /// Append a key (rotation). Keys are never removed.
    pub fn add_key(&mut self, keypair: Keypair) {
        if !self.owns_key(&keypair.public_key) {
            self.keys.push(keypair);
        }
    }

    /// Apply a signed delta to the local balance.
    ///
    /// Used by fixtures and faucets; fails instead of going negative.
    pub fn update_balance(&mut self, delta: i64) -> Result<(), AccountError> {
        let updated = self.balance as i128 + delta as i128;
        if updated < 0 {
            return Err(AccountError::InsufficientFunds {
                required: delta.unsigned_abs(),
                available: self.balance,
            });
        }
        self.balance = u64::try_from(updated).map_err(|_| AccountError::BalanceOverflow)?;
        Ok(())
    }

    /// Replace the local balance with the one recorded in `view`, if any.
    pub fn sync_balance(&mut self, view: &impl LedgerView) {
        if let Some(balance) = view.balance_of(&self.id) {
            self.balance = balance;
        }
    }

    /// Build and sign a payment from this account.
    ///
    /// The balance check is a point-in-time guard against the local balance;
    /// it does not reserve funds.
    pub fn create_payment_operation(
        &self,
        receiver: &AccountId,
        amount: u64,
        signing_key: &Keypair,
    ) -> Result<Operation, AccountError> {
        if amount == 0 {
            return Err(AccountError::InvalidAmount);
        }
        if amount > self.balance {
            return Err(AccountError::InsufficientFunds {
                required: amount,
                available: self.balance,
            });
        }
        if !self.owns_key(&signing_key.public_key) {
            return Err(AccountError::UnknownKey(self.id));
        }
        Ok(Operation::signed_payment(self.id, *receiver, amount, signing_key))
    }
}

impl PartialEq for Account {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Account {}

impl LedgerView for Account {
    fn balance_of(&self, id: &AccountId) -> Option<u64> {
        (id == &self.id).then_some(self.balance)
    }

    fn has_key(&self, id: &AccountId, key: &PublicKey) -> bool {
        id == &self.id && self.owns_key(key)
    }
}
