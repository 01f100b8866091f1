//! Blocks: proof-of-work sealed bundles of transactions.

use crate::account::AccountId;
use crate::hash::{hash_encoded, Hash};
use crate::transaction::{Sequence, Transaction, TransactionError};
use crate::state::LedgerView;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::time::{SystemTime, UNIX_EPOCH};
use thiserror::Error;

/// Errors that can occur while assembling or verifying a block.
#[derive(Debug, Error)]
pub enum BlockError {
    #[error("transaction error: {0}")]
    Transaction(#[from] TransactionError),

    #[error("block already holds its coinbase transaction")]
    CoinbaseAlreadyPresent,

    #[error("coinbase transactions can only be added with add_coinbase_transaction")]
    UnexpectedCoinbase,

    #[error("coinbase transaction must be unique and last")]
    MisplacedCoinbase,

    #[error("duplicate transaction {0:?}")]
    DuplicateTransaction(Hash),

    #[error("stale transaction {id:?} (sequence {incoming} does not supersede {existing})")]
    StaleTransaction {
        id: Hash,
        incoming: Sequence,
        existing: Sequence,
    },

    #[error("operation already spent by transaction {0:?}")]
    DuplicateOperation(Hash),

    #[error("block id does not match its contents")]
    IdMismatch,

    #[error("block id is above the target")]
    DifficultyNotMet,
}

pub type Result<T> = std::result::Result<T, BlockError>;

/// Current Unix timestamp in seconds.
pub fn current_timestamp() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("time went backwards")
        .as_secs()
}

/// The hashed part of a block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockHeader {
    /// Id of the block this one extends (zero for genesis).
    pub prev_id: Hash,
    /// Digest of the transaction list, sequences included.
    pub transactions_root: Hash,
    /// Unix timestamp in seconds.
    pub timestamp: u64,
    /// Largest id this block may have once sealed.
    pub target: Hash,
    /// Proof-of-work nonce, only changed by sealing.
    pub nonce: u64,
}

impl BlockHeader {
    pub fn hash(&self) -> Hash {
        hash_encoded(self)
    }
}

/// A candidate or sealed block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    /// Digest of the header, kept in step with every mutation.
    pub id: Hash,
    pub header: BlockHeader,
    pub transactions: Vec<Transaction>,
}

impl Block {
    /// Start an empty candidate extending `prev_id`.
    pub fn new(prev_id: Hash, target: Hash) -> Self {
        let transactions = Vec::new();
        let header = BlockHeader {
            prev_id,
            transactions_root: Self::transactions_root(&transactions),
            timestamp: current_timestamp(),
            target,
            nonce: 0,
        };
        Self {
            id: header.hash(),
            header,
            transactions,
        }
    }

    /// Start the genesis candidate.
    pub fn genesis(target: Hash) -> Self {
        Self::new(Hash::ZERO, target)
    }

    fn transactions_root(transactions: &[Transaction]) -> Hash {
        hash_encoded(transactions)
    }

    pub fn prev_id(&self) -> Hash {
        self.header.prev_id
    }

    pub fn target(&self) -> Hash {
        self.header.target
    }

    pub fn nonce(&self) -> u64 {
        self.header.nonce
    }

    pub fn is_genesis(&self) -> bool {
        self.header.prev_id == Hash::ZERO
    }

    pub fn tx_count(&self) -> usize {
        self.transactions.len()
    }

    pub fn transaction_ids(&self) -> impl Iterator<Item = Hash> + '_ {
        self.transactions.iter().map(|tx| tx.id)
    }

    pub fn coinbase(&self) -> Option<&Transaction> {
        self.transactions.iter().find(|tx| tx.is_coinbase())
    }

    pub fn has_coinbase(&self) -> bool {
        self.coinbase().is_some()
    }

    /// Whether the current id satisfies the target.
    pub fn is_sealed(&self) -> bool {
        self.id.meets_target(&self.header.target)
    }

    /// Recompute the id from the header.
    pub fn compute_id(&self) -> Hash {
        self.header.hash()
    }

    /// Rehash after the transaction list changed.
    fn recommit(&mut self) {
        self.header.transactions_root = Self::transactions_root(&self.transactions);
        self.id = self.header.hash();
    }

    /// Append the mining reward. Nothing can be added after it.
    pub fn add_coinbase_transaction(&mut self, miner: &AccountId, amount: u64) -> Result<()> {
        if self.has_coinbase() {
            return Err(BlockError::CoinbaseAlreadyPresent);
        }
        let tx = Transaction::create_anchored_coinbase(miner, amount, self.header.prev_id)?;
        self.transactions.push(tx);
        self.recommit();
        Ok(())
    }

    /// Add a payment transaction verified against `view`.
    ///
    /// A transaction whose id is already present replaces the existing entry
    /// only if its sequence is higher; otherwise the call fails and the block
    /// is left unchanged. Operations already present in a transaction with a
    /// different id are rejected as double spends.
    pub fn add_transaction(&mut self, tx: Transaction, view: &impl LedgerView) -> Result<()> {
        if tx.is_coinbase() {
            return Err(BlockError::UnexpectedCoinbase);
        }
        if self.has_coinbase() {
            return Err(BlockError::CoinbaseAlreadyPresent);
        }
        tx.verify(view)?;

        let mut superseded = Vec::new();
        for (index, existing) in self.transactions.iter().enumerate() {
            if existing.id != tx.id {
                continue;
            }
            if !tx.sequence.supersedes(&existing.sequence) {
                return Err(BlockError::StaleTransaction {
                    id: tx.id,
                    incoming: tx.sequence,
                    existing: existing.sequence,
                });
            }
            superseded.push(index);
        }

        for existing in self.transactions.iter().filter(|t| t.id != tx.id) {
            if tx.operations.iter().any(|op| existing.operations.contains(op)) {
                return Err(BlockError::DuplicateOperation(existing.id));
            }
        }

        match superseded.split_first() {
            Some((&slot, rest)) => {
                for &index in rest.iter().rev() {
                    self.transactions.remove(index);
                }
                self.transactions[slot] = tx;
            }
            None => self.transactions.push(tx),
        }
        self.recommit();
        Ok(())
    }

    /// Check internal consistency against `view`.
    ///
    /// Every transaction must verify, ids must be distinct, no operation may
    /// appear in two transactions, at most one coinbase may appear and only
    /// last, and the id must match the contents and satisfy the target.
    pub fn verify(&self, view: &impl LedgerView) -> Result<()> {
        if let Some(pos) = self.transactions.iter().position(|tx| tx.is_coinbase()) {
            if pos + 1 != self.transactions.len() {
                return Err(BlockError::MisplacedCoinbase);
            }
        }

        let mut seen = HashSet::new();
        for (index, tx) in self.transactions.iter().enumerate() {
            tx.verify(view)?;
            if !seen.insert(tx.id) {
                return Err(BlockError::DuplicateTransaction(tx.id));
            }
            for earlier in &self.transactions[..index] {
                if tx.operations.iter().any(|op| earlier.operations.contains(op)) {
                    return Err(BlockError::DuplicateOperation(earlier.id));
                }
            }
        }

        if self.header.transactions_root != Self::transactions_root(&self.transactions)
            || self.id != self.compute_id()
        {
            return Err(BlockError::IdMismatch);
        }
        if !self.is_sealed() {
            return Err(BlockError::DifficultyNotMet);
        }
        Ok(())
    }

    /// Bump the nonce and recompute the id. One proof-of-work attempt.
    pub fn seal_id(&mut self) {
        self.header.nonce = self.header.nonce.wrapping_add(1);
        self.id = self.header.hash();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::account::Account;
    use crate::operation::Operation;
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

    fn tx(f: &Fixture, ops: Vec<Operation>, seq: u8) -> Transaction {
        Transaction::create_at(ops, Sequence::Ordinal(seq), 1_700_000_000, &f.ledger).unwrap()
    }

    fn seal(block: &mut Block) {
        while !block.is_sealed() {
            block.seal_id();
        }
    }

    #[test]
    fn test_new_block() {
        let block = Block::genesis(Hash::MAX);
        assert!(block.is_genesis());
        assert_eq!(block.tx_count(), 0);
        assert_eq!(block.id, block.compute_id());
        assert!(block.is_sealed());
    }

    #[test]
    fn test_add_transactions() {
        let f = setup();
        let mut block = Block::new(Hash::ZERO, Hash::MAX);

        let op1 = pay(&f.first, &f.second, 5);
        let op2 = pay(&f.first, &f.second, 8);
        let op3 = pay(&f.second, &f.second, 8);
        let tx1 = tx(&f, vec![op1.clone(), op2.clone()], 255);
        let tx2 = tx(&f, vec![op3.clone()], 120);

        assert!(block.add_transaction(tx1.clone(), &f.ledger).is_ok());
        assert!(block.add_transaction(tx2, &f.ledger).is_ok());
        assert_eq!(block.tx_count(), 2);

        // Exact duplicate
        assert!(matches!(
            block.add_transaction(tx1, &f.ledger),
            Err(BlockError::StaleTransaction { .. })
        ));

        // Same id as tx1 with a lower sequence
        let tx1_low = tx(&f, vec![op1, op2.clone()], 12);
        assert!(matches!(
            block.add_transaction(tx1_low, &f.ledger),
            Err(BlockError::StaleTransaction { .. })
        ));

        // Same id as tx2 with a higher sequence replaces it
        let tx2_high = tx(&f, vec![op3.clone()], 121);
        assert!(block.add_transaction(tx2_high.clone(), &f.ledger).is_ok());
        assert_eq!(block.tx_count(), 2);
        assert_eq!(block.transactions[1], tx2_high);

        // Reuses op2 under a different id
        let conflicting = tx(&f, vec![op2, op3], 120);
        assert!(matches!(
            block.add_transaction(conflicting, &f.ledger),
            Err(BlockError::DuplicateOperation(_))
        ));
        assert_eq!(block.tx_count(), 2);
    }

    #[test]
    fn test_supersession_order() {
        let f = setup();
        let ops = vec![pay(&f.first, &f.second, 5)];
        let t1 = tx(&f, ops.clone(), 12);
        let t2 = tx(&f, ops, 121);
        assert_eq!(t1.id, t2.id);

        let mut forward = Block::new(Hash::ZERO, Hash::MAX);
        forward.add_transaction(t1.clone(), &f.ledger).unwrap();
        forward.add_transaction(t2.clone(), &f.ledger).unwrap();
        assert_eq!(forward.transactions, vec![t2.clone()]);

        let mut reverse = Block::new(Hash::ZERO, Hash::MAX);
        reverse.add_transaction(t2.clone(), &f.ledger).unwrap();
        assert!(reverse.add_transaction(t1, &f.ledger).is_err());
        assert_eq!(reverse.transactions, vec![t2]);
    }

    #[test]
    fn test_invalid_transaction_rejected() {
        let f = setup();
        let mut block = Block::new(Hash::ZERO, Hash::MAX);
        let mut bad = tx(&f, vec![pay(&f.first, &f.second, 5)], 1);
        bad.operations[0].amount = 19;
        assert!(matches!(
            block.add_transaction(bad, &f.ledger),
            Err(BlockError::Transaction(_))
        ));
        assert_eq!(block.tx_count(), 0);
    }

    #[test]
    fn test_coinbase_is_terminal() {
        let f = setup();
        let mut block = Block::new(Hash::ZERO, Hash::MAX);
        assert!(block.add_coinbase_transaction(&f.first.id(), 10).is_ok());

        let tx1 = tx(&f, vec![pay(&f.first, &f.second, 5)], 255);
        assert!(matches!(
            block.add_transaction(tx1, &f.ledger),
            Err(BlockError::CoinbaseAlreadyPresent)
        ));
        assert!(matches!(
            block.add_coinbase_transaction(&f.first.id(), 10),
            Err(BlockError::CoinbaseAlreadyPresent)
        ));
        assert_eq!(block.tx_count(), 1);
    }

    #[test]
    fn test_coinbase_not_addable_as_payment() {
        let f = setup();
        let mut block = Block::new(Hash::ZERO, Hash::MAX);
        let mint = Transaction::create_coinbase(&f.first.id(), 10).unwrap();
        assert!(matches!(
            block.add_transaction(mint, &f.ledger),
            Err(BlockError::UnexpectedCoinbase)
        ));
    }

    #[test]
    fn test_mutation_keeps_id_current() {
        let f = setup();
        let mut block = Block::new(Hash::ZERO, Hash::MAX);
        let before = block.id;
        block
            .add_transaction(tx(&f, vec![pay(&f.first, &f.second, 5)], 1), &f.ledger)
            .unwrap();
        assert_ne!(block.id, before);
        assert_eq!(block.id, block.compute_id());
    }

    #[test]
    fn test_verify_sealed_block() {
        let f = setup();
        let mut block = Block::new(Hash::ZERO, Hash::with_leading_zero_bits(4));
        block
            .add_transaction(tx(&f, vec![pay(&f.first, &f.second, 5)], 1), &f.ledger)
            .unwrap();
        block.add_coinbase_transaction(&f.first.id(), 50).unwrap();
        seal(&mut block);

        assert!(block.verify(&f.ledger).is_ok());
    }

    #[test]
    fn test_verify_rejects_unsealed() {
        let mut block = Block::new(Hash::ZERO, Hash::ZERO);
        block.seal_id();
        assert!(matches!(
            block.verify(&Ledger::new()),
            Err(BlockError::DifficultyNotMet)
        ));
    }

    #[test]
    fn test_verify_rejects_tampering() {
        let f = setup();
        let mut block = Block::new(Hash::ZERO, Hash::MAX);
        block
            .add_transaction(tx(&f, vec![pay(&f.first, &f.second, 5)], 1), &f.ledger)
            .unwrap();
        block.transactions[0].sequence = Sequence::Ordinal(200);
        assert!(matches!(
            block.verify(&f.ledger),
            Err(BlockError::IdMismatch)
        ));
    }

    #[test]
    fn test_verify_rejects_hand_built_conflicts() {
        let f = setup();
        let op = pay(&f.first, &f.second, 5);
        let a = tx(&f, vec![op.clone()], 1);
        let b = Transaction::create_at(vec![op], Sequence::Ordinal(1), 1_700_000_001, &f.ledger)
            .unwrap();

        let mut block = Block::new(Hash::ZERO, Hash::MAX);
        block.transactions = vec![a.clone(), b];
        block.recommit();
        assert!(matches!(
            block.verify(&f.ledger),
            Err(BlockError::DuplicateOperation(id)) if id == a.id
        ));

        block.transactions = vec![a.clone(), a];
        block.recommit();
        assert!(matches!(
            block.verify(&f.ledger),
            Err(BlockError::DuplicateTransaction(_))
        ));
    }

    #[test]
    fn test_verify_rejects_misplaced_coinbase() {
        let f = setup();
        let mut block = Block::new(Hash::ZERO, Hash::MAX);
        let mint = Transaction::create_coinbase(&f.first.id(), 50).unwrap();
        let payment = tx(&f, vec![pay(&f.first, &f.second, 5)], 1);
        block.transactions = vec![mint, payment];
        block.recommit();
        assert!(matches!(
            block.verify(&f.ledger),
            Err(BlockError::MisplacedCoinbase)
        ));
    }

    #[test]
    fn test_seal_id_advances_nonce() {
        let mut block = Block::genesis(Hash::MAX);
        let first_id = block.id;
        block.seal_id();
        assert_eq!(block.nonce(), 1);
        assert_ne!(block.id, first_id);
        assert_eq!(block.id, block.compute_id());
    }
}
