//! Core ledger primitives for powledger.
//!
//! This crate provides the fundamental types used throughout the ledger:
//! - Hashing and signing
//! - Accounts and the balance table they are verified against
//! - Operations and transactions
//! - Blocks and block headers

pub mod account;
pub mod block;
pub mod crypto;
pub mod hash;
pub mod operation;
pub mod state;
pub mod transaction;

// Re-export commonly used types at the crate root
pub use account::{Account, AccountError, AccountId};
pub use block::{current_timestamp, Block, BlockError, BlockHeader};
pub use crypto::{CryptoError, Keypair, PublicKey, Signature};
pub use hash::{hash, hash_concat, hash_encoded, Hash, H256};
pub use operation::{Operation, OperationError, OperationKind};
pub use state::{BalanceSnapshot, Ledger, LedgerView, StateError};
pub use transaction::{Sequence, Transaction, TransactionError};
