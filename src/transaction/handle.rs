use crate::error::DbResult;
use crate::storage::buffer::BufferPool;
use crate::transaction::TransactionId;

/// A running transaction. Dropping it without `commit` aborts it.
pub struct Transaction {
    id: TransactionId,
    pool: BufferPool,
    finished: bool,
}

impl Transaction {
    pub fn new(id: TransactionId, pool: BufferPool) -> Self {
        log::debug!("{} started", id);
        Self {
            id,
            pool,
            finished: false,
        }
    }

    pub fn id(&self) -> TransactionId {
        self.id
    }

    /// Write this transaction's changes and release its locks. If a write
    /// fails the changes are rolled back and the error returned.
    pub fn commit(mut self) -> DbResult<()> {
        self.finished = true;
        self.pool.transaction_complete(self.id, true)
    }

    /// Roll back this transaction's changes and release its locks.
    pub fn abort(mut self) -> DbResult<()> {
        self.finished = true;
        self.pool.transaction_complete(self.id, false)
    }
}

impl Drop for Transaction {
    fn drop(&mut self) {
        if self.finished {
            return;
        }
        if let Err(e) = self.pool.transaction_complete(self.id, false) {
            log::warn!("failed to abort dropped {}: {}", self.id, e);
        }
    }
}

impl std::fmt::Debug for Transaction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Transaction")
            .field("id", &self.id)
            .field("finished", &self.finished)
            .finish()
    }
}
