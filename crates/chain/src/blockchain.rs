//! Main blockchain orchestration.
//!
//! The [`Blockchain`] owns the block history, the index of committed
//! transaction ids and the authoritative balance [`Ledger`].
//! [`Blockchain::validate_and_append`] is the only path that changes balances
//! after genesis.

use crate::executor::{BlockExecutionResult, Executor};
use powledger_consensus::{BlockValidator, ConsensusError, PowConfig, ProofOfWork, ValidationError};
use powledger_core::{
    Account, AccountError, AccountId, BalanceSnapshot, Block, BlockError, Hash, Ledger, LedgerView,
    StateError, Transaction,
};
use std::collections::HashSet;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Default number of coins the faucet can hand out.
pub const DEFAULT_FAUCET_SUPPLY: u64 = 100;

/// Errors that can occur during blockchain operations.
#[derive(Debug, Error)]
pub enum BlockchainError {
    #[error("consensus error: {0}")]
    Consensus(#[from] ConsensusError),

    #[error("validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("block error: {0}")]
    Block(#[from] BlockError),

    #[error("execution error: {0}")]
    Execution(#[from] crate::executor::ExecutionError),

    #[error("account error: {0}")]
    Account(#[from] AccountError),

    #[error("state error: {0}")]
    State(#[from] StateError),

    #[error("faucet cannot cover {requested} (remaining {remaining})")]
    FaucetExhausted { requested: u64, remaining: u64 },
}

pub type Result<T> = std::result::Result<T, BlockchainError>;

/// Blockchain configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainConfig {
    /// Proof-of-work target and coinbase emission.
    pub pow: PowConfig,
    /// Total coins the faucet may grant over the chain's lifetime.
    pub faucet_supply: u64,
}

impl Default for ChainConfig {
    fn default() -> Self {
        Self {
            pow: PowConfig::default(),
            faucet_supply: DEFAULT_FAUCET_SUPPLY,
        }
    }
}

impl ChainConfig {
    pub fn new(pow: PowConfig) -> Self {
        Self {
            pow,
            ..Self::default()
        }
    }

    pub fn with_faucet_supply(mut self, supply: u64) -> Self {
        self.faucet_supply = supply;
        self
    }
}

/// The authoritative chain of sealed blocks and the balances they imply.
#[derive(Debug)]
pub struct Blockchain {
    config: ChainConfig,
    pow: ProofOfWork,
    /// Accepted blocks, genesis first.
    history: Vec<Block>,
    /// Ids of every committed transaction.
    tx_index: HashSet<Hash>,
    /// Materialized balances and published keys.
    ledger: Ledger,
    faucet_remaining: u64,
    /// Receiver of the genesis reward.
    creator: Account,
}

impl Blockchain {
    /// Create a chain and mine its genesis block.
    ///
    /// Genesis extends the all-zero id, pays its coinbase to a fresh creator
    /// account and is appended without chain-level validation.
    pub fn new(config: ChainConfig) -> Result<Self> {
        let pow = ProofOfWork::new(config.pow.clone());
        let creator = Account::create()?;

        let mut ledger = Ledger::new();
        ledger.register(&creator);

        let genesis = pow.seal(pow.candidate(Hash::ZERO), &creator.id())?;
        let (ledger, _) = Executor::new(&ledger).execute_block(&genesis)?;

        info!(
            id = %genesis.id,
            creator = %creator.id().short(),
            difficulty_bits = config.pow.difficulty_bits(),
            "genesis block created"
        );

        let tx_index = genesis.transaction_ids().collect();
        Ok(Self {
            faucet_remaining: config.faucet_supply,
            config,
            pow,
            history: vec![genesis],
            tx_index,
            ledger,
            creator,
        })
    }

    pub fn config(&self) -> &ChainConfig {
        &self.config
    }

    pub fn proof_of_work(&self) -> &ProofOfWork {
        &self.pow
    }

    /// The most recently accepted block.
    pub fn head(&self) -> Option<&Block> {
        self.history.last()
    }

    fn head_id(&self) -> Hash {
        self.head().map(|b| b.id).unwrap_or(Hash::ZERO)
    }

    /// Number of blocks on top of genesis.
    pub fn height(&self) -> u64 {
        self.history.len().saturating_sub(1) as u64
    }

    pub fn history(&self) -> &[Block] {
        &self.history
    }

    pub fn block_by_id(&self, id: &Hash) -> Option<&Block> {
        self.history.iter().find(|b| &b.id == id)
    }

    pub fn contains_transaction(&self, id: &Hash) -> bool {
        self.tx_index.contains(id)
    }

    pub fn creator(&self) -> &Account {
        &self.creator
    }

    pub fn faucet_remaining(&self) -> u64 {
        self.faucet_remaining
    }

    /// Publish an account's keys so its payments can be verified.
    ///
    /// Call again after [`Account::add_key`] to publish a rotated key.
    pub fn register_account(&mut self, account: &Account) {
        self.ledger.register(account);
    }

    /// Authoritative balance; `None` for accounts the chain has never seen.
    pub fn balance_of(&self, id: &AccountId) -> Option<u64> {
        self.ledger.balance_of(id)
    }

    /// Read access to the authoritative ledger, for building and verifying
    /// operations and transactions.
    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    /// Copy of the current balances.
    pub fn account_state(&self) -> BalanceSnapshot {
        self.ledger.snapshot()
    }

    /// Empty candidate extending the current head at the chain's target.
    pub fn candidate_block(&self) -> Block {
        self.pow.candidate(self.head_id())
    }

    /// Seal `block` for `miner`. Does not append.
    pub fn seal_block(&self, block: Block, miner: &AccountId) -> Result<Block> {
        Ok(self.pow.seal(block, miner)?)
    }

    /// Build a block from `transactions`, seal it for `miner` and append it.
    pub fn mine_block(
        &mut self,
        transactions: Vec<Transaction>,
        miner: &AccountId,
    ) -> Result<BlockExecutionResult> {
        let mut block = self.candidate_block();
        for tx in transactions {
            block.add_transaction(tx, &self.ledger)?;
        }
        let block = self.seal_block(block, miner)?;
        self.validate_and_append(block)
    }

    /// Validate `block` against the chain and append it.
    ///
    /// Checks, in order: the block extends the head, none of its transactions
    /// is already committed, the block verifies against current balances, the
    /// target and coinbase follow the chain's configuration, and every
    /// operation applies. On any failure nothing is changed.
    pub fn validate_and_append(&mut self, block: Block) -> Result<BlockExecutionResult> {
        let (staged, result) = match self.check_block(&block) {
            Ok(applied) => applied,
            Err(err) => {
                warn!(id = %block.id, prev = %block.prev_id(), error = %err, "block rejected");
                return Err(err);
            }
        };

        self.ledger = staged;
        self.tx_index.extend(block.transaction_ids());
        self.history.push(block);

        info!(
            height = self.height(),
            id = %result.block_id,
            txs = result.receipts.len(),
            minted = result.minted,
            transferred = result.transferred,
            "block appended"
        );
        Ok(result)
    }

    fn check_block(&self, block: &Block) -> Result<(Ledger, BlockExecutionResult)> {
        BlockValidator::validate_extends_head(block, self.head_id())?;
        BlockValidator::validate_not_replayed(block, &self.tx_index)?;
        block.verify(&self.ledger)?;
        BlockValidator::validate_rules(block, &self.config.pow)?;
        Ok(Executor::new(&self.ledger).execute_block(block)?)
    }

    /// Grant test coins from the bounded faucet.
    ///
    /// Registers the account if needed and credits both the ledger and the
    /// account's local balance.
    pub fn faucet(&mut self, account: &mut Account, amount: u64) -> Result<()> {
        if amount == 0 {
            return Err(AccountError::InvalidAmount.into());
        }
        if amount > self.faucet_remaining {
            return Err(BlockchainError::FaucetExhausted {
                requested: amount,
                remaining: self.faucet_remaining,
            });
        }
        let id = account.id();
        let delta = i64::try_from(amount).map_err(|_| AccountError::BalanceOverflow)?;
        self.ledger
            .balance(&id)
            .checked_add(amount)
            .ok_or(StateError::Overflow(id))?;

        account.update_balance(delta)?;
        self.ledger.register(account);
        self.ledger.credit(&id, amount)?;
        self.faucet_remaining -= amount;

        debug!(account = %id.short(), amount, remaining = self.faucet_remaining, "faucet grant");
        Ok(())
    }
}
