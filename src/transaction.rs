//! Transactions.
//!
//! A transaction is an id plus the set of page locks the buffer pool has
//! granted to it. Completing it (commit or abort) resolves its dirty pages
//! and releases every lock at once.

pub mod handle;
pub mod id;

pub use handle::Transaction;
pub use id::{TransactionId, TransactionIdGenerator};
