//! Operations: single signed value transfers and coinbase mints.

use crate::account::{Account, AccountError, AccountId};
use crate::crypto::{Keypair, PublicKey, Signature};
use crate::hash::{hash_concat, Hash};
use crate::state::LedgerView;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that can occur while verifying an operation.
#[derive(Debug, Error)]
pub enum OperationError {
    #[error("amount must be positive")]
    InvalidAmount,

    #[error("unknown sender account {0}")]
    UnknownAccount(AccountId),

    #[error("signing key is not registered for {0}")]
    UnknownKey(AccountId),

    #[error("payment signature is invalid")]
    SignatureInvalid,

    #[error("insufficient funds in {account} (required {required}, available {available})")]
    InsufficientFunds {
        account: AccountId,
        required: u64,
        available: u64,
    },
}

/// What an operation does with its amount.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum OperationKind {
    /// Move value out of `sender`, authorized by `signer`.
    Payment {
        sender: AccountId,
        signer: PublicKey,
        signature: Signature,
    },
    /// Mint new value. `anchor` is the id of the block the mint extends, so
    /// mints to the same miner never collide across heights.
    Coinbase { anchor: Hash },
}

/// A value movement to `receiver`.
///
/// Equality is semantic: two operations with the same sender, receiver,
/// amount and signature are the same operation, wherever they appear.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Operation {
    pub receiver: AccountId,
    pub amount: u64,
    pub kind: OperationKind,
}

impl Operation {
    /// Build and sign a payment on behalf of `sender`.
    ///
    /// Fails under the same conditions as [`Account::create_payment_operation`].
    pub fn create_payment(
        sender: &Account,
        receiver: &AccountId,
        amount: u64,
        signing_key: &Keypair,
    ) -> Result<Self, AccountError> {
        sender.create_payment_operation(receiver, amount, signing_key)
    }

    /// Sign a payment without any sender-side checks.
    pub(crate) fn signed_payment(
        sender: AccountId,
        receiver: AccountId,
        amount: u64,
        signing_key: &Keypair,
    ) -> Self {
        let message = Self::payment_message(&sender, &receiver, amount);
        Self {
            receiver,
            amount,
            kind: OperationKind::Payment {
                sender,
                signer: signing_key.public_key.clone(),
                signature: signing_key.sign_hash(&message),
            },
        }
    }

    /// Mint `amount` to `receiver`.
    pub fn create_coinbase(receiver: &AccountId, amount: u64) -> Result<Self, OperationError> {
        Self::create_anchored_coinbase(receiver, amount, Hash::ZERO)
    }

    /// Mint `amount` to `receiver` on top of the block `anchor`.
    pub fn create_anchored_coinbase(
        receiver: &AccountId,
        amount: u64,
        anchor: Hash,
    ) -> Result<Self, OperationError> {
        if amount == 0 {
            return Err(OperationError::InvalidAmount);
        }
        Ok(Self {
            receiver: *receiver,
            amount,
            kind: OperationKind::Coinbase { anchor },
        })
    }

    /// Canonical message a payment signature covers.
    pub fn payment_message(sender: &AccountId, receiver: &AccountId, amount: u64) -> Hash {
        hash_concat(&[
            b"powledger/payment",
            sender.as_bytes(),
            receiver.as_bytes(),
            &amount.to_le_bytes(),
        ])
    }

    pub fn is_coinbase(&self) -> bool {
        matches!(self.kind, OperationKind::Coinbase { .. })
    }

    /// The debited account; `None` for coinbase.
    pub fn sender(&self) -> Option<&AccountId> {
        match &self.kind {
            OperationKind::Payment { sender, .. } => Some(sender),
            OperationKind::Coinbase { .. } => None,
        }
    }

    /// Check the payment signature alone. Coinbase operations carry none and pass.
    pub fn verify_signature(&self) -> Result<(), OperationError> {
        match &self.kind {
            OperationKind::Payment {
                sender,
                signer,
                signature,
            } => {
                let message = Self::payment_message(sender, &self.receiver, self.amount);
                signer
                    .verify(message.as_bytes(), signature)
                    .map_err(|_| OperationError::SignatureInvalid)
            }
            OperationKind::Coinbase { .. } => Ok(()),
        }
    }

    /// Verify against the state in `view`.
    ///
    /// For payments this checks key ownership, the signature, and that the
    /// sender's balance in `view` covers the amount right now. The result
    /// depends on `view`: an operation that verifies before a block commits
    /// may not verify after it.
    pub fn verify(&self, view: &impl LedgerView) -> Result<(), OperationError> {
        if self.amount == 0 {
            return Err(OperationError::InvalidAmount);
        }
        let OperationKind::Payment { sender, signer, .. } = &self.kind else {
            return Ok(());
        };

        let available = view
            .balance_of(sender)
            .ok_or(OperationError::UnknownAccount(*sender))?;
        if !view.has_key(sender, signer) {
            return Err(OperationError::UnknownKey(*sender));
        }
        self.verify_signature()?;
        if self.amount > available {
            return Err(OperationError::InsufficientFunds {
                account: *sender,
                required: self.amount,
                available,
            });
        }
        Ok(())
    }
}
