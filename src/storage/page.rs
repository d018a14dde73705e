pub mod heap_page;

use crate::error::DbResult;
use crate::transaction::TransactionId;
use bytes::Bytes;
use std::fmt;

pub use heap_page::HeapPage;

/// Identity of a table, stable for a given file path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TableId(pub u32);

impl fmt::Display for TableId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "table#{}", self.0)
    }
}

/// Location of a page inside a heap file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HeapPageId {
    pub table_id: TableId,
    pub page_no: u32,
}

impl HeapPageId {
    pub fn new(table_id: TableId, page_no: u32) -> Self {
        Self { table_id, page_no }
    }
}

/// Cache and lock key for a page, tagged by the kind of file that owns it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PageId {
    Heap(HeapPageId),
}

impl PageId {
    pub fn heap(table_id: TableId, page_no: u32) -> Self {
        PageId::Heap(HeapPageId::new(table_id, page_no))
    }

    pub fn table_id(&self) -> TableId {
        match self {
            PageId::Heap(pid) => pid.table_id,
        }
    }

    pub fn page_no(&self) -> u32 {
        match self {
            PageId::Heap(pid) => pid.page_no,
        }
    }
}

impl fmt::Display for PageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PageId::Heap(pid) => write!(f, "heap({}, page {})", pid.table_id, pid.page_no),
        }
    }
}

/// A decoded page of any storage kind, as cached by the buffer pool.
#[derive(Debug, Clone)]
pub enum DbPage {
    Heap(HeapPage),
}

impl DbPage {
    pub fn id(&self) -> PageId {
        match self {
            DbPage::Heap(page) => PageId::Heap(page.id()),
        }
    }

    /// Encoded image of exactly one page.
    pub fn page_data(&self) -> Bytes {
        match self {
            DbPage::Heap(page) => page.page_data(),
        }
    }

    /// The transaction that last dirtied this page, if it is dirty.
    pub fn is_dirty(&self) -> Option<TransactionId> {
        match self {
            DbPage::Heap(page) => page.is_dirty(),
        }
    }

    pub fn mark_dirty(&mut self, tid: Option<TransactionId>) {
        match self {
            DbPage::Heap(page) => page.mark_dirty(tid),
        }
    }

    /// The page as it was when its before-image was last taken.
    pub fn before_image(&self) -> DbResult<DbPage> {
        match self {
            DbPage::Heap(page) => Ok(DbPage::Heap(page.before_image()?)),
        }
    }

    pub fn set_before_image(&mut self) {
        match self {
            DbPage::Heap(page) => page.set_before_image(),
        }
    }

    pub fn heap(&self) -> &HeapPage {
        match self {
            DbPage::Heap(page) => page,
        }
    }

    pub fn heap_mut(&mut self) -> &mut HeapPage {
        match self {
            DbPage::Heap(page) => page,
        }
    }
}
