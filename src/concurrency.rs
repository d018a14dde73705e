//! Concurrency control.
//!
//! Page-granularity shared/exclusive locking with strict two-phase release:
//! a transaction keeps every lock until it completes. Waits that would close
//! a cycle in the wait-for graph abort the requester instead of blocking.

pub mod lock;

pub use lock::{LockManager, LockMode};
