//! Block execution engine.
//!
//! Applies the operations of a block to a staged copy of the ledger. The
//! caller commits the staged ledger only if the whole block applied, so a
//! failure part-way through leaves the live ledger untouched.

use powledger_core::{AccountId, Block, Hash, Ledger, OperationKind, StateError, Transaction};
use thiserror::Error;

/// Errors that can occur during execution.
#[derive(Debug, Error)]
pub enum ExecutionError {
    #[error("insufficient funds in {account} (required {required}, available {available}) at transaction {tx:?}")]
    InsufficientFunds {
        tx: Hash,
        account: AccountId,
        required: u64,
        available: u64,
    },

    #[error("balance overflow in {account} at transaction {tx:?}")]
    Overflow { tx: Hash, account: AccountId },
}

impl ExecutionError {
    fn from_state(tx: Hash, err: StateError) -> Self {
        match err {
            StateError::InsufficientFunds {
                account,
                required,
                available,
            } => Self::InsufficientFunds {
                tx,
                account,
                required,
                available,
            },
            StateError::Overflow(account) => Self::Overflow { tx, account },
        }
    }
}

pub type Result<T> = std::result::Result<T, ExecutionError>;

/// Result of executing a single transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionReceipt {
    pub tx_id: Hash,
    /// Number of operations applied.
    pub operations: usize,
    /// Value moved between accounts.
    pub transferred: u64,
    /// Value created by coinbase operations.
    pub minted: u64,
}

/// Result of executing a block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockExecutionResult {
    pub block_id: Hash,
    pub receipts: Vec<TransactionReceipt>,
    /// Total value created by the block.
    pub minted: u64,
    /// Total value moved by the block's payments.
    pub transferred: u64,
}

/// Block executor.
pub struct Executor<'a> {
    /// Ledger the block is applied on top of.
    ledger: &'a Ledger,
}

impl<'a> Executor<'a> {
    pub fn new(ledger: &'a Ledger) -> Self {
        Self { ledger }
    }

    /// Apply one transaction to `staged`.
    ///
    /// Payments debit the sender and credit the receiver; coinbase operations
    /// only credit.
    pub fn execute_transaction(
        staged: &mut Ledger,
        tx: &Transaction,
    ) -> Result<TransactionReceipt> {
        let mut receipt = TransactionReceipt {
            tx_id: tx.id,
            operations: 0,
            transferred: 0,
            minted: 0,
        };

        for op in &tx.operations {
            match &op.kind {
                OperationKind::Payment { sender, .. } => {
                    staged
                        .transfer(sender, &op.receiver, op.amount)
                        .map_err(|e| ExecutionError::from_state(tx.id, e))?;
                    receipt.transferred = receipt.transferred.saturating_add(op.amount);
                }
                OperationKind::Coinbase { .. } => {
                    staged
                        .credit(&op.receiver, op.amount)
                        .map_err(|e| ExecutionError::from_state(tx.id, e))?;
                    receipt.minted = receipt.minted.saturating_add(op.amount);
                }
            }
            receipt.operations += 1;
        }

        Ok(receipt)
    }

    /// Apply every transaction of `block` in order.
    ///
    /// Returns the resulting ledger; the ledger the executor was built on is
    /// not modified.
    pub fn execute_block(&self, block: &Block) -> Result<(Ledger, BlockExecutionResult)> {
        let mut staged = self.ledger.clone();
        let mut receipts = Vec::with_capacity(block.tx_count());

        for tx in &block.transactions {
            receipts.push(Self::execute_transaction(&mut staged, tx)?);
        }

        let minted = receipts.iter().fold(0u64, |acc, r| acc.saturating_add(r.minted));
        let transferred = receipts
            .iter()
            .fold(0u64, |acc, r| acc.saturating_add(r.transferred));

        Ok((
            staged,
            BlockExecutionResult {
                block_id: block.id,
                receipts,
                minted,
                transferred,
            },
        ))
    }
}
