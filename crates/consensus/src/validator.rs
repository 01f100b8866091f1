//! Chain-level block validation rules.
//!
//! These rules need context a block cannot check on its own: the current
//! head, the set of committed transaction ids and the configured target and
//! emission. Intrinsic checks live in [`Block::verify`].

use crate::pow::PowConfig;
use powledger_core::{Block, Hash};
use std::collections::HashSet;
use thiserror::Error;

/// Errors that can occur during validation.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("block does not extend the head (expected prev {expected:?}, got {got:?})")]
    ChainLinkMismatch { expected: Hash, got: Hash },

    #[error("transaction {0:?} is already committed")]
    ReplayedTransaction(Hash),

    #[error("block target {got:?} differs from configured target {expected:?}")]
    TargetMismatch { expected: Hash, got: Hash },

    #[error("invalid coinbase: {0}")]
    InvalidCoinbase(&'static str),
}

pub type Result<T> = std::result::Result<T, ValidationError>;

/// Block validator.
pub struct BlockValidator;

impl BlockValidator {
    /// The block's prev id must be the id of the current head.
    pub fn validate_extends_head(block: &Block, head_id: Hash) -> Result<()> {
        if block.prev_id() != head_id {
            return Err(ValidationError::ChainLinkMismatch {
                expected: head_id,
                got: block.prev_id(),
            });
        }
        Ok(())
    }

    /// No transaction id may already be committed.
    pub fn validate_not_replayed(block: &Block, committed: &HashSet<Hash>) -> Result<()> {
        match block.transaction_ids().find(|id| committed.contains(id)) {
            Some(id) => Err(ValidationError::ReplayedTransaction(id)),
            None => Ok(()),
        }
    }

    pub fn validate_target(block: &Block, config: &PowConfig) -> Result<()> {
        if block.target() != config.target {
            return Err(ValidationError::TargetMismatch {
                expected: config.target,
                got: block.target(),
            });
        }
        Ok(())
    }

    /// Exactly one coinbase, last, minting the configured emission.
    pub fn validate_coinbase(block: &Block, config: &PowConfig) -> Result<()> {
        let coinbase = match block.transactions.last() {
            Some(tx) if tx.is_coinbase() => tx,
            _ => return Err(ValidationError::InvalidCoinbase("missing")),
        };
        if block.transactions.iter().filter(|tx| tx.is_coinbase()).count() != 1 {
            return Err(ValidationError::InvalidCoinbase("more than one"));
        }
        if coinbase.total_amount() != config.emission {
            return Err(ValidationError::InvalidCoinbase("wrong emission"));
        }
        Ok(())
    }

    /// Every chain-level rule except replay, which needs the commit index.
    pub fn validate_rules(block: &Block, config: &PowConfig) -> Result<()> {
        Self::validate_target(block, config)?;
        Self::validate_coinbase(block, config)?;
        Ok(())
    }
}
