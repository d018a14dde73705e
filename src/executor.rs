//! Executor-side iterator contract.
//!
//! Operators pull tuples one at a time through `OpIterator`. Only the leaf
//! operator, the sequential scan, lives here; it adapts a file cursor to the
//! operator contract and relabels the table's fields with the scan's alias.

use crate::access::schema::Schema;
use crate::access::tuple::Tuple;
use crate::catalog::Catalog;
use crate::error::DbResult;
use crate::storage::buffer::BufferPool;
use std::sync::Arc;

pub mod seq_scan;

pub use seq_scan::SeqScan;

/// Pull-based operator.
pub trait OpIterator: Send {
    /// Prepare the operator. Must be called before `has_next`/`next`.
    fn open(&mut self) -> DbResult<()>;

    fn has_next(&mut self) -> DbResult<bool>;

    /// Next tuple, or `NoSuchElement` when exhausted.
    fn next(&mut self) -> DbResult<Tuple>;

    fn rewind(&mut self) -> DbResult<()>;

    fn close(&mut self);

    /// Schema of the tuples this operator produces.
    fn schema(&self) -> &Arc<Schema>;
}

/// Shared resources operators resolve tables and pages through.
#[derive(Clone)]
pub struct ExecutionContext {
    pub catalog: Arc<Catalog>,
    pub buffer_pool: BufferPool,
}

impl ExecutionContext {
    pub fn new(catalog: Arc<Catalog>, buffer_pool: BufferPool) -> Self {
        Self {
            catalog,
            buffer_pool,
        }
    }
}

impl From<&crate::database::Database> for ExecutionContext {
    fn from(db: &crate::database::Database) -> Self {
        Self::new(Arc::clone(db.catalog()), db.buffer_pool().clone())
    }
}
