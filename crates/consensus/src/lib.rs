//! Proof-of-work consensus for powledger.
//!
//! This crate provides:
//! - Block sealing by nonce search against a fixed target
//! - Chain-level block validation (head linkage, replay, coinbase policy)
//!
//! # Example
//!
//! ```rust,no_run
//! use powledger_consensus::{PowConfig, ProofOfWork};
//! use powledger_core::{Account, Hash};
//!
//! let pow = ProofOfWork::new(PowConfig::with_difficulty_bits(8));
//! let miner = Account::create().unwrap();
//!
//! let block = pow.seal(pow.candidate(Hash::ZERO), &miner.id()).unwrap();
//! assert!(block.is_sealed());
//! ```

pub mod pow;
pub mod validator;

// Re-export commonly used types
pub use pow::{ConsensusError, PowConfig, ProofOfWork, SealState, DEFAULT_EMISSION};
pub use validator::{BlockValidator, ValidationError};
