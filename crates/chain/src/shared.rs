//! Thread-safe handle on a [`Blockchain`].
//!
//! Appends take the write lock, so at most one append is in flight. Miners
//! take a short read lock to build a candidate, seal it without holding any
//! lock and then race to append. Losers are rejected by the head check.

use crate::blockchain::{Blockchain, Result};
use crate::executor::BlockExecutionResult;
use powledger_consensus::ProofOfWork;
use powledger_core::{AccountId, BalanceSnapshot, Block, Hash, Transaction};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

#[derive(Debug, Clone)]
pub struct SharedBlockchain {
    inner: Arc<RwLock<Blockchain>>,
}

impl SharedBlockchain {
    pub fn new(chain: Blockchain) -> Self {
        Self {
            inner: Arc::new(RwLock::new(chain)),
        }
    }

    /// Shared read access. A poisoned lock is recovered; appends never leave
    /// the chain half-updated.
    pub fn read(&self) -> RwLockReadGuard<'_, Blockchain> {
        self.inner.read().unwrap_or_else(|e| e.into_inner())
    }

    pub fn write(&self) -> RwLockWriteGuard<'_, Blockchain> {
        self.inner.write().unwrap_or_else(|e| e.into_inner())
    }

    pub fn head_id(&self) -> Option<Hash> {
        self.read().head().map(|b| b.id)
    }

    pub fn height(&self) -> u64 {
        self.read().height()
    }

    pub fn account_state(&self) -> BalanceSnapshot {
        self.read().account_state()
    }

    pub fn contains_transaction(&self, id: &Hash) -> bool {
        self.read().contains_transaction(id)
    }

    /// Candidate on the current head, filled with `transactions`, plus the
    /// sealer to finish it with.
    pub fn prepare(&self, transactions: Vec<Transaction>) -> Result<(Block, ProofOfWork)> {
        let chain = self.read();
        let mut block = chain.candidate_block();
        for tx in transactions {
            block.add_transaction(tx, chain.ledger())?;
        }
        Ok((block, chain.proof_of_work().clone()))
    }

    pub fn validate_and_append(&self, block: Block) -> Result<BlockExecutionResult> {
        self.write().validate_and_append(block)
    }

    /// Prepare, seal outside the lock, then append.
    pub fn mine(
        &self,
        transactions: Vec<Transaction>,
        miner: &AccountId,
    ) -> Result<BlockExecutionResult> {
        let (candidate, pow) = self.prepare(transactions)?;
        let sealed = pow.seal(candidate, miner)?;
        self.validate_and_append(sealed)
    }
}

impl From<Blockchain> for SharedBlockchain {
    fn from(chain: Blockchain) -> Self {
        Self::new(chain)
    }
}
