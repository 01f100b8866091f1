//! Proof-of-work sealing.
//!
//! A block is sealed when its id, read as a 256-bit big-endian integer, is at
//! or below the target carried in its header. Sealing appends the miner's
//! coinbase and then searches nonces until the id qualifies.

use powledger_core::{AccountId, Block, BlockError, Hash};
use std::sync::atomic::{AtomicBool, Ordering};
use thiserror::Error;
use tracing::debug;

/// Coinbase reward minted by every sealed block.
pub const DEFAULT_EMISSION: u64 = 50;

/// Leading zero bits required by the default target.
pub const DEFAULT_DIFFICULTY_BITS: u32 = 8;

/// Nonce attempts between cancellation checks.
const CANCEL_CHECK_INTERVAL: u64 = 1024;

/// Errors that can occur while sealing a block.
#[derive(Debug, Error)]
pub enum ConsensusError {
    #[error("block error: {0}")]
    Block(#[from] BlockError),

    #[error("block target {got:?} differs from configured target {expected:?}")]
    TargetMismatch { expected: Hash, got: Hash },

    #[error("sealing cancelled after {iterations} attempts")]
    Cancelled { iterations: u64 },
}

pub type Result<T> = std::result::Result<T, ConsensusError>;

/// Proof-of-work configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PowConfig {
    /// Largest id a sealed block may have.
    pub target: Hash,
    /// Amount minted to the miner of each block.
    pub emission: u64,
}

impl Default for PowConfig {
    fn default() -> Self {
        Self {
            target: Hash::with_leading_zero_bits(DEFAULT_DIFFICULTY_BITS),
            emission: DEFAULT_EMISSION,
        }
    }
}

impl PowConfig {
    pub fn new(target: Hash, emission: u64) -> Self {
        Self { target, emission }
    }

    /// Default emission with a target requiring `bits` leading zero bits.
    pub fn with_difficulty_bits(bits: u32) -> Self {
        Self {
            target: Hash::with_leading_zero_bits(bits),
            ..Self::default()
        }
    }

    pub fn with_emission(mut self, emission: u64) -> Self {
        self.emission = emission;
        self
    }

    /// Number of leading zero bits the target demands.
    pub fn difficulty_bits(&self) -> u32 {
        self.target.leading_zero_bits()
    }
}

/// Outcome of a single sealing attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SealState {
    Sealing,
    Sealed,
}

/// Block sealer for a fixed configuration.
#[derive(Debug, Clone)]
pub struct ProofOfWork {
    config: PowConfig,
}

impl ProofOfWork {
    pub fn new(config: PowConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &PowConfig {
        &self.config
    }

    pub fn emission(&self) -> u64 {
        self.config.emission
    }

    pub fn target(&self) -> Hash {
        self.config.target
    }

    /// Empty candidate extending `prev_id` at the configured target.
    pub fn candidate(&self, prev_id: Hash) -> Block {
        Block::new(prev_id, self.config.target)
    }

    /// Try the next nonce.
    pub fn step(block: &mut Block) -> SealState {
        block.seal_id();
        if block.is_sealed() {
            SealState::Sealed
        } else {
            SealState::Sealing
        }
    }

    /// Append the coinbase for `miner` and search nonces until sealed.
    ///
    /// Consumes the candidate. The search is unbounded; use
    /// [`seal_with_cancel`](Self::seal_with_cancel) to stop it from another thread.
    pub fn seal(&self, block: Block, miner: &AccountId) -> Result<Block> {
        self.seal_with_cancel(block, miner, &AtomicBool::new(false))
    }

    /// Like [`seal`](Self::seal), but gives up once `cancel` is set.
    pub fn seal_with_cancel(
        &self,
        mut block: Block,
        miner: &AccountId,
        cancel: &AtomicBool,
    ) -> Result<Block> {
        if block.target() != self.config.target {
            return Err(ConsensusError::TargetMismatch {
                expected: self.config.target,
                got: block.target(),
            });
        }
        block.add_coinbase_transaction(miner, self.config.emission)?;

        let mut iterations = 0u64;
        loop {
            iterations += 1;
            if Self::step(&mut block) == SealState::Sealed {
                break;
            }
            if iterations % CANCEL_CHECK_INTERVAL == 0 && cancel.load(Ordering::Relaxed) {
                debug!(iterations, prev = %block.prev_id(), "sealing cancelled");
                return Err(ConsensusError::Cancelled { iterations });
            }
        }

        debug!(
            id = %block.id,
            nonce = block.nonce(),
            iterations,
            txs = block.tx_count(),
            "block sealed"
        );
        Ok(block)
    }
}

impl Default for ProofOfWork {
    fn default() -> Self {
        Self::new(PowConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use powledger_core::Account;

    fn easy() -> ProofOfWork {
        ProofOfWork::new(PowConfig::with_difficulty_bits(4))
    }

    #[test]
    fn test_default_config() {
        let config = PowConfig::default();
        assert_eq!(config.emission, DEFAULT_EMISSION);
        assert_eq!(config.difficulty_bits(), DEFAULT_DIFFICULTY_BITS);
    }

    #[test]
    fn test_config_builders() {
        let config = PowConfig::with_difficulty_bits(12).with_emission(7);
        assert_eq!(config.difficulty_bits(), 12);
        assert_eq!(config.emission, 7);
    }

    #[test]
    fn test_seal_adds_coinbase() {
        let pow = easy();
        let miner = Account::create().unwrap();
        let block = pow.seal(pow.candidate(Hash::ZERO), &miner.id()).unwrap();

        assert!(block.is_sealed());
        assert!(block.id.leading_zero_bits() >= 4);
        let coinbase = block.coinbase().unwrap();
        assert_eq!(coinbase.operations[0].receiver, miner.id());
        assert_eq!(coinbase.total_amount(), DEFAULT_EMISSION);
        assert_eq!(block.id, block.compute_id());
    }

    #[test]
    fn test_seal_rejects_block_with_coinbase() {
        let pow = easy();
        let miner = Account::create().unwrap();
        let mut block = pow.candidate(Hash::ZERO);
        block.add_coinbase_transaction(&miner.id(), 1).unwrap();

        assert!(matches!(
            pow.seal(block, &miner.id()),
            Err(ConsensusError::Block(BlockError::CoinbaseAlreadyPresent))
        ));
    }

    #[test]
    fn test_seal_rejects_foreign_target() {
        let pow = easy();
        let miner = Account::create().unwrap();
        let block = Block::new(Hash::ZERO, Hash::MAX);
        assert!(matches!(
            pow.seal(block, &miner.id()),
            Err(ConsensusError::TargetMismatch { .. })
        ));
    }

    #[test]
    fn test_cancelled_seal() {
        // Zero target can never be met
        let pow = ProofOfWork::new(PowConfig::new(Hash::ZERO, 1));
        let miner = Account::create().unwrap();
        let cancel = AtomicBool::new(true);

        let result = pow.seal_with_cancel(pow.candidate(Hash::ZERO), &miner.id(), &cancel);
        assert!(matches!(
            result,
            Err(ConsensusError::Cancelled { iterations }) if iterations == CANCEL_CHECK_INTERVAL
        ));
    }

    #[test]
    fn test_step_reports_state() {
        let mut block = Block::new(Hash::ZERO, Hash::MAX);
        assert_eq!(ProofOfWork::step(&mut block), SealState::Sealed);

        let mut block = Block::new(Hash::ZERO, Hash::ZERO);
        assert_eq!(ProofOfWork::step(&mut block), SealState::Sealing);
    }
}
