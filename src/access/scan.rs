//! Page-by-page tuple cursors over a `DbFile`.

use crate::access::heap::{DbFile, HeapFile};
use crate::access::tuple::Tuple;
use crate::error::{DbError, DbResult};
use crate::storage::buffer::{BufferPool, Permission};
use crate::storage::page::PageId;
use crate::transaction::TransactionId;
use std::sync::Arc;
use std::vec;

/// Pull-based cursor over the tuples of one file.
///
/// `open` must be called before `has_next`/`next`/`rewind`. After `close`
/// the cursor is finished and cannot be reopened.
pub trait DbFileIterator: Send {
    fn open(&mut self) -> DbResult<()>;

    fn has_next(&mut self) -> DbResult<bool>;

    /// Next tuple, or `NoSuchElement` once the file is exhausted.
    fn next(&mut self) -> DbResult<Tuple>;

    /// Go back to the first tuple of the file.
    fn rewind(&mut self) -> DbResult<()>;

    fn close(&mut self);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CursorState {
    Unopened,
    Open,
    Closed,
}

/// Cursor over a heap file: page number first, then slot order within the
/// page. Pages are fetched lazily through the buffer pool, so every page the
/// scan touches is locked for `tid` with the scan's permission.
pub struct HeapFileIterator {
    file: Arc<HeapFile>,
    pool: BufferPool,
    tid: TransactionId,
    permission: Permission,
    state: CursorState,
    num_pages: u32,
    next_page: u32,
    current: Option<vec::IntoIter<Tuple>>,
}

impl HeapFileIterator {
    pub fn new(
        file: Arc<HeapFile>,
        pool: BufferPool,
        tid: TransactionId,
        permission: Permission,
    ) -> Self {
        Self {
            file,
            pool,
            tid,
            permission,
            state: CursorState::Unopened,
            num_pages: 0,
            next_page: 0,
            current: None,
        }
    }

    fn ensure_open(&self) -> DbResult<()> {
        match self.state {
            CursorState::Open => Ok(()),
            CursorState::Unopened => Err(DbError::IteratorState("iterator is not open")),
            CursorState::Closed => Err(DbError::IteratorState("iterator is closed")),
        }
    }

    fn restart(&mut self) {
        self.num_pages = self.file.num_pages();
        self.next_page = 0;
        self.current = None;
    }

    /// Load the next page's tuples into the cursor.
    fn advance_page(&mut self) -> DbResult<()> {
        let pid = PageId::heap(self.file.id(), self.next_page);
        let page = self.pool.get_page(self.tid, pid, self.permission)?;
        let tuples: Vec<Tuple> = page.read().heap().iter().cloned().collect();
        self.current = Some(tuples.into_iter());
        self.next_page += 1;
        Ok(())
    }
}

impl DbFileIterator for HeapFileIterator {
    fn open(&mut self) -> DbResult<()> {
        match self.state {
            CursorState::Unopened => {
                self.restart();
                self.state = CursorState::Open;
                Ok(())
            }
            CursorState::Open => Ok(()),
            CursorState::Closed => Err(DbError::IteratorState("iterator is closed")),
        }
    }

    fn has_next(&mut self) -> DbResult<bool> {
        self.ensure_open()?;
        loop {
            if let Some(current) = &self.current {
                if !current.as_slice().is_empty() {
                    return Ok(true);
                }
            }
            if self.next_page >= self.num_pages {
                return Ok(false);
            }
            self.advance_page()?;
        }
    }

    fn next(&mut self) -> DbResult<Tuple> {
        if !self.has_next()? {
            return Err(DbError::NoSuchElement);
        }
        self.current
            .as_mut()
            .and_then(|tuples| tuples.next())
            .ok_or(DbError::NoSuchElement)
    }

    fn rewind(&mut self) -> DbResult<()> {
        self.ensure_open()?;
        self.restart();
        Ok(())
    }

    fn close(&mut self) {
        self.state = CursorState::Closed;
        self.current = None;
    }
}
