//! Transactions: replay-protected, content-addressed bundles of operations.

use crate::account::AccountId;
use crate::block::current_timestamp;
use crate::hash::{hash_encoded, Hash};
use crate::operation::{Operation, OperationError};
use crate::state::LedgerView;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Errors that can occur during transaction construction or verification.
#[derive(Debug, Error)]
pub enum TransactionError {
    #[error("transaction has no operations")]
    Empty,

    #[error("sequence {0} is outside [0, 255]")]
    SequenceOutOfRange(i64),

    #[error("transaction id does not match its contents")]
    IdMismatch,

    #[error("coinbase transactions must hold exactly one coinbase operation")]
    MalformedCoinbase,

    #[error("coinbase operation inside a payment transaction")]
    UnexpectedCoinbase,

    #[error("operation {index}: {source}")]
    Operation {
        index: usize,
        #[source]
        source: OperationError,
    },
}

pub type Result<T> = std::result::Result<T, TransactionError>;

/// Replay-protection sequence number.
///
/// A higher ordinal supersedes a lower one carrying the same transaction id
/// inside a candidate block. Coinbase transactions use a dedicated marker
/// instead of an ordinal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Sequence {
    Ordinal(u8),
    Coinbase,
}

impl Sequence {
    pub fn ordinal(&self) -> Option<u8> {
        match self {
            Sequence::Ordinal(n) => Some(*n),
            Sequence::Coinbase => None,
        }
    }

    pub fn is_coinbase(&self) -> bool {
        matches!(self, Sequence::Coinbase)
    }

    /// Whether a transaction with this sequence replaces one with `other`.
    pub fn supersedes(&self, other: &Sequence) -> bool {
        match (self.ordinal(), other.ordinal()) {
            (Some(mine), Some(theirs)) => mine > theirs,
            _ => false,
        }
    }
}

impl TryFrom<i64> for Sequence {
    type Error = TransactionError;

    fn try_from(n: i64) -> Result<Self> {
        u8::try_from(n)
            .map(Sequence::Ordinal)
            .map_err(|_| TransactionError::SequenceOutOfRange(n))
    }
}

impl fmt::Display for Sequence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Sequence::Ordinal(n) => write!(f, "{}", n),
            Sequence::Coinbase => write!(f, "coinbase"),
        }
    }
}

/// Fields covered by the transaction id. The sequence is not covered, so
/// resubmissions with a higher sequence keep the same id.
#[derive(Serialize)]
struct TransactionContent<'a> {
    operations: &'a [Operation],
    timestamp: u64,
}

/// An ordered set of operations with a content-derived id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    /// Digest of the operations and timestamp.
    pub id: Hash,
    pub operations: Vec<Operation>,
    pub sequence: Sequence,
    /// Unix timestamp in seconds of the last (re)construction.
    pub timestamp: u64,
}

impl Transaction {
    /// Build a payment transaction stamped with the current time.
    ///
    /// Returns the transaction only if it verifies against `view` right away.
    pub fn create(
        operations: Vec<Operation>,
        sequence: Sequence,
        view: &impl LedgerView,
    ) -> Result<Self> {
        Self::create_at(operations, sequence, current_timestamp(), view)
    }

    /// Build a payment transaction with an explicit timestamp.
    pub fn create_at(
        operations: Vec<Operation>,
        sequence: Sequence,
        timestamp: u64,
        view: &impl LedgerView,
    ) -> Result<Self> {
        if sequence.is_coinbase() {
            return Err(TransactionError::MalformedCoinbase);
        }
        let tx = Self::assemble(operations, sequence, timestamp);
        tx.verify(view)?;
        Ok(tx)
    }

    /// Wrap a single mint to `miner`.
    pub fn create_coinbase(miner: &AccountId, amount: u64) -> Result<Self> {
        Self::create_anchored_coinbase(miner, amount, Hash::ZERO)
    }

    /// Wrap a single mint to `miner` on top of the block `anchor`.
    pub fn create_anchored_coinbase(miner: &AccountId, amount: u64, anchor: Hash) -> Result<Self> {
        let op = Operation::create_anchored_coinbase(miner, amount, anchor)
            .map_err(|source| TransactionError::Operation { index: 0, source })?;
        Ok(Self::assemble(vec![op], Sequence::Coinbase, current_timestamp()))
    }

    fn assemble(operations: Vec<Operation>, sequence: Sequence, timestamp: u64) -> Self {
        let mut tx = Self {
            id: Hash::ZERO,
            operations,
            sequence,
            timestamp,
        };
        tx.id = tx.compute_id();
        tx
    }

    /// Recompute the id from the current fields.
    pub fn compute_id(&self) -> Hash {
        hash_encoded(&TransactionContent {
            operations: &self.operations,
            timestamp: self.timestamp,
        })
    }

    pub fn is_coinbase(&self) -> bool {
        self.sequence.is_coinbase()
    }

    /// Total value moved or minted.
    pub fn total_amount(&self) -> u64 {
        self.operations
            .iter()
            .fold(0u64, |acc, op| acc.saturating_add(op.amount))
    }

    /// Check integrity and every contained operation.
    ///
    /// Payment operations are verified against `view`; a coinbase
    /// transaction only has to be well formed.
    pub fn verify(&self, view: &impl LedgerView) -> Result<()> {
        if self.operations.is_empty() {
            return Err(TransactionError::Empty);
        }
        if self.id != self.compute_id() {
            return Err(TransactionError::IdMismatch);
        }

        if self.is_coinbase() {
            return match self.operations.as_slice() {
                [op] if op.is_coinbase() && op.amount > 0 => Ok(()),
                _ => Err(TransactionError::MalformedCoinbase),
            };
        }

        for (index, op) in self.operations.iter().enumerate() {
            if op.is_coinbase() {
                return Err(TransactionError::UnexpectedCoinbase);
            }
            op.verify(view)
                .map_err(|source| TransactionError::Operation { index, source })?;
        }
        Ok(())
    }

    /// Restamp and recompute the id, keeping the payload.
    ///
    /// The new timestamp is strictly later than the old one, so the refreshed
    /// transaction never collides with a committed copy of itself. A timestamp
    /// already at `u64::MAX` stays there.
    pub fn refresh(&mut self) {
        self.timestamp = current_timestamp().max(self.timestamp.saturating_add(1));
        self.id = self.compute_id();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::account::Account;
    use crate::state::Ledger;

    struct Fixture {
        first: Account,
        second: Account,
        ledger: Ledger,
    }

    fn setup() -> Fixture {
        let mut first = Account::create().unwrap();
        let mut second = Account::create().unwrap();
        first.update_balance(20).unwrap();
        second.update_balance(13).unwrap();
        let ledger = Ledger::from_accounts([&first, &second]);
        Fixture {
            first,
            second,
            ledger,
        }
    }

    fn pay(from: &Account, to: &Account, amount: u64) -> Operation {
        from.create_payment_operation(&to.id(), amount, from.primary_key())
            .unwrap()
    }

    #[test]
    fn test_payment_transaction() {
        let f = setup();
        let ops = vec![
            pay(&f.first, &f.second, 5),
            pay(&f.first, &f.second, 8),
            pay(&f.second, &f.second, 8),
        ];
        let tx = Transaction::create(ops, Sequence::Ordinal(255), &f.ledger).unwrap();
        assert_eq!(tx.id, tx.compute_id());
        assert_eq!(tx.total_amount(), 21);
        assert!(!tx.is_coinbase());
    }

    #[test]
    fn test_sequence_range() {
        assert_eq!(Sequence::try_from(0i64).unwrap(), Sequence::Ordinal(0));
        assert_eq!(Sequence::try_from(255i64).unwrap(), Sequence::Ordinal(255));
        assert!(matches!(
            Sequence::try_from(300i64),
            Err(TransactionError::SequenceOutOfRange(300))
        ));
        assert!(matches!(
            Sequence::try_from(-1i64),
            Err(TransactionError::SequenceOutOfRange(-1))
        ));
    }

    #[test]
    fn test_supersedes() {
        assert!(Sequence::Ordinal(121).supersedes(&Sequence::Ordinal(12)));
        assert!(!Sequence::Ordinal(12).supersedes(&Sequence::Ordinal(121)));
        assert!(!Sequence::Ordinal(12).supersedes(&Sequence::Ordinal(12)));
        assert!(!Sequence::Coinbase.supersedes(&Sequence::Ordinal(0)));
        assert!(!Sequence::Ordinal(255).supersedes(&Sequence::Coinbase));
    }

    #[test]
    fn test_invalid_operation_rejected() {
        let f = setup();
        // Signed by first's key on behalf of second
        let forged =
            Operation::signed_payment(f.second.id(), f.first.id(), 8, f.first.primary_key());
        let ops = vec![pay(&f.first, &f.second, 5), forged];
        assert!(matches!(
            Transaction::create(ops, Sequence::Ordinal(120), &f.ledger),
            Err(TransactionError::Operation { index: 1, .. })
        ));
    }

    #[test]
    fn test_empty_rejected() {
        let f = setup();
        assert!(matches!(
            Transaction::create(vec![], Sequence::Ordinal(1), &f.ledger),
            Err(TransactionError::Empty)
        ));
    }

    #[test]
    fn test_coinbase_sequence_reserved() {
        let f = setup();
        let ops = vec![pay(&f.first, &f.second, 5)];
        assert!(matches!(
            Transaction::create(ops, Sequence::Coinbase, &f.ledger),
            Err(TransactionError::MalformedCoinbase)
        ));
    }

    #[test]
    fn test_coinbase_op_in_payment_rejected() {
        let f = setup();
        let mint = Operation::create_coinbase(&f.first.id(), 10).unwrap();
        assert!(matches!(
            Transaction::create(vec![mint], Sequence::Ordinal(3), &f.ledger),
            Err(TransactionError::UnexpectedCoinbase)
        ));
    }

    #[test]
    fn test_coinbase_transaction() {
        let f = setup();
        let tx = Transaction::create_coinbase(&f.first.id(), 10).unwrap();
        assert!(tx.is_coinbase());
        assert!(tx.verify(&Ledger::new()).is_ok());
        assert!(Transaction::create_coinbase(&f.first.id(), 0).is_err());
    }

    #[test]
    fn test_tamper_detected() {
        let f = setup();
        let mut tx =
            Transaction::create(vec![pay(&f.first, &f.second, 5)], Sequence::Ordinal(7), &f.ledger)
                .unwrap();
        tx.timestamp += 1;
        assert!(matches!(tx.verify(&f.ledger), Err(TransactionError::IdMismatch)));
    }

    #[test]
    fn test_id_ignores_sequence() {
        let f = setup();
        let ops = vec![pay(&f.first, &f.second, 5)];
        let low =
            Transaction::create_at(ops.clone(), Sequence::Ordinal(12), 1_000, &f.ledger).unwrap();
        let high = Transaction::create_at(ops, Sequence::Ordinal(121), 1_000, &f.ledger).unwrap();
        assert_eq!(low.id, high.id);
        assert_ne!(low, high);
    }

    #[test]
    fn test_refresh_changes_id() {
        let f = setup();
        let mut tx = Transaction::create_at(
            vec![pay(&f.first, &f.second, 5)],
            Sequence::Ordinal(9),
            1_000,
            &f.ledger,
        )
        .unwrap();
        let old_id = tx.id;
        let payload = tx.operations.clone();

        tx.refresh();

        assert!(tx.timestamp > 1_000);
        assert_ne!(tx.id, old_id);
        assert_eq!(tx.operations, payload);
        assert_eq!(tx.sequence, Sequence::Ordinal(9));
        assert!(tx.verify(&f.ledger).is_ok());
    }

    #[test]
    fn test_refresh_at_max_timestamp() {
        let f = setup();
        let mut tx = Transaction::create_at(
            vec![pay(&f.first, &f.second, 5)],
            Sequence::Ordinal(1),
            u64::MAX,
            &f.ledger,
        )
        .unwrap();

        tx.refresh();

        assert_eq!(tx.timestamp, u64::MAX);
        assert!(tx.verify(&f.ledger).is_ok());
    }

    #[test]
    fn test_anchored_coinbases_differ() {
        let f = setup();
        let a = Transaction::create_anchored_coinbase(&f.first.id(), 50, Hash::ZERO).unwrap();
        let b = Transaction::create_anchored_coinbase(&f.first.id(), 50, Hash::MAX).unwrap();
        assert_ne!(a.operations, b.operations);
    }
}
