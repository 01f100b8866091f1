//! Blockchain orchestration for powledger.
//!
//! This crate brings the ledger primitives and proof-of-work consensus
//! together:
//! - **Blockchain**: history, replay index and the authoritative balances
//! - **Executor**: staged, all-or-nothing application of a block
//! - **Shared**: a lock-protected handle for concurrent miners
//!
//! # Example
//!
//! ```rust,no_run
//! use powledger_chain::{Blockchain, ChainConfig};
//! use powledger_consensus::PowConfig;
//! use powledger_core::{Account, Sequence, Transaction};
//!
//! let mut chain = Blockchain::new(ChainConfig::new(PowConfig::with_difficulty_bits(8))).unwrap();
//!
//! let mut alice = Account::create().unwrap();
//! let bob = Account::create().unwrap();
//! chain.faucet(&mut alice, 20).unwrap();
//! chain.register_account(&bob);
//!
//! let op = alice.create_payment_operation(&bob.id(), 5, alice.primary_key()).unwrap();
//! let tx = Transaction::create(vec![op], Sequence::Ordinal(0), chain.ledger()).unwrap();
//! chain.mine_block(vec![tx], &alice.id()).unwrap();
//!
//! assert_eq!(chain.balance_of(&bob.id()), Some(5));
//! ```

pub mod blockchain;
pub mod executor;
pub mod shared;

// Re-export commonly used types
pub use blockchain::{Blockchain, BlockchainError, ChainConfig, DEFAULT_FAUCET_SUPPLY};
pub use executor::{BlockExecutionResult, ExecutionError, Executor, TransactionReceipt};
pub use shared::SharedBlockchain;
