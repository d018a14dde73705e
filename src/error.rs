//! Error types shared by every layer of heapdb.

use crate::access::tuple::RecordId;
use crate::storage::page::{PageId, TableId};
use crate::transaction::TransactionId;
use thiserror::Error;

/// Errors that can occur while describing, storing or scanning tuples.
#[derive(Error, Debug)]
pub enum DbError {
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Field index {index} out of range (num fields: {num_fields})")]
    FieldIndexOutOfRange { index: usize, num_fields: usize },

    #[error("No field named '{0}'")]
    NoSuchField(String),

    #[error("Table not found: {0}")]
    TableNotFound(TableId),

    #[error("Unknown table: '{0}'")]
    UnknownTable(String),

    #[error("Page not found: {0}")]
    PageNotFound(PageId),

    #[error("Page could not be read: {0}")]
    PageUnavailable(PageId),

    #[error("Tuple not found: {0}")]
    TupleNotFound(RecordId),

    #[error("Corrupt page {page_id}: {reason}")]
    CorruptPage { page_id: PageId, reason: String },

    #[error("Corrupt field: {0}")]
    CorruptField(String),

    #[error("Page is full: {0}")]
    PageFull(PageId),

    #[error("Buffer pool is full: every cached page is dirty")]
    BufferPoolFull,

    #[error("Transaction {0} aborted")]
    TransactionAborted(TransactionId),

    #[error("No more tuples")]
    NoSuchElement,

    #[error("Iterator misuse: {0}")]
    IteratorState(&'static str),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl DbError {
    /// True for the lock manager's abort signal, which callers must propagate untouched.
    pub fn is_aborted(&self) -> bool {
        matches!(self, DbError::TransactionAborted(_))
    }
}

/// Result type for heapdb operations.
pub type DbResult<T> = Result<T, DbError>;
