//! Heap files: unordered tables stored as a flat array of fixed-size pages.

use crate::access::scan::{DbFileIterator, HeapFileIterator};
use crate::access::schema::Schema;
use crate::access::tuple::Tuple;
use crate::error::{DbError, DbResult};
use crate::storage::buffer::{BufferPool, PageRef, Permission};
use crate::storage::disk::PageFile;
use crate::storage::page::{DbPage, HeapPage, HeapPageId, PageId, TableId};
use crate::transaction::TransactionId;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// A table's on-disk storage, as seen by the buffer pool and the catalog.
pub trait DbFile: Send + Sync {
    fn id(&self) -> TableId;

    fn schema(&self) -> Arc<Schema>;

    /// Read and decode one page. `Ok(None)` means the bytes could not be
    /// read at all; undecodable bytes are an error.
    fn read_page(&self, pid: &PageId) -> DbResult<Option<DbPage>>;

    /// Write a page image back to its slot in the file.
    fn write_page(&self, page: &DbPage) -> DbResult<()>;

    fn num_pages(&self) -> u32;

    /// Store `tuple` somewhere with room, returning the pages it dirtied.
    fn insert_tuple(
        &self,
        pool: &BufferPool,
        tid: TransactionId,
        tuple: Tuple,
    ) -> DbResult<Vec<PageRef>>;

    /// Remove the tuple addressed by `tuple`'s record id, returning its page.
    fn delete_tuple(&self, pool: &BufferPool, tid: TransactionId, tuple: &Tuple)
        -> DbResult<PageRef>;

    /// Read-only scan over every tuple in the file.
    fn iterator(self: Arc<Self>, pool: BufferPool, tid: TransactionId) -> Box<dyn DbFileIterator>;
}

#[derive(Debug)]
pub struct HeapFile {
    path: PathBuf,
    table_id: TableId,
    schema: Arc<Schema>,
    file: PageFile,
}

impl HeapFile {
    /// Create an empty heap file at `path`, truncating anything already there.
    pub fn create(path: &Path, schema: Arc<Schema>, page_size: usize) -> DbResult<Self> {
        Self::check_fits(&schema, page_size)?;
        let file = PageFile::create(path, page_size)?;
        Self::with_file(path, schema, file)
    }

    /// Open the heap file at `path`, creating an empty one if it is missing.
    pub fn open(path: &Path, schema: Arc<Schema>, page_size: usize) -> DbResult<Self> {
        Self::check_fits(&schema, page_size)?;
        let file = PageFile::open(path, page_size)?;
        Self::with_file(path, schema, file)
    }

    fn with_file(path: &Path, schema: Arc<Schema>, file: PageFile) -> DbResult<Self> {
        let path = std::fs::canonicalize(path)?;
        let table_id = table_id_for(&path);
        log::debug!("opened heap file {} as {}", path.display(), table_id);
        Ok(Self {
            path,
            table_id,
            schema,
            file,
        })
    }

    fn check_fits(schema: &Schema, page_size: usize) -> DbResult<()> {
        if HeapPage::num_slots_for(schema, page_size) == 0 {
            return Err(DbError::InvalidArgument(format!(
                "a {} byte page cannot hold a {} byte tuple",
                page_size,
                schema.byte_size()
            )));
        }
        Ok(())
    }

    /// Canonical path of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn page_size(&self) -> usize {
        self.file.page_size()
    }

    /// Scan requesting `permission` on every page it visits.
    pub fn iterator_with_permission(
        self: &Arc<Self>,
        pool: BufferPool,
        tid: TransactionId,
        permission: Permission,
    ) -> HeapFileIterator {
        HeapFileIterator::new(Arc::clone(self), pool, tid, permission)
    }

    /// A file that cannot be sized counts as empty.
    fn pages_or_zero(&self, counted: DbResult<u32>) -> u32 {
        counted.unwrap_or_else(|e| {
            log::warn!("could not size {}: {}", self.path.display(), e);
            0
        })
    }

    fn heap_page_id(&self, pid: &PageId) -> DbResult<HeapPageId> {
        match pid {
            PageId::Heap(hpid) if hpid.table_id == self.table_id => Ok(*hpid),
            _ => Err(DbError::PageNotFound(*pid)),
        }
    }
}

impl DbFile for HeapFile {
    fn id(&self) -> TableId {
        self.table_id
    }

    fn schema(&self) -> Arc<Schema> {
        Arc::clone(&self.schema)
    }

    fn read_page(&self, pid: &PageId) -> DbResult<Option<DbPage>> {
        let hpid = self.heap_page_id(pid)?;
        let mut buf = vec![0u8; self.page_size()];
        if let Err(e) = self.file.read_page(hpid.page_no, &mut buf) {
            log::warn!("could not read {} from {}: {}", pid, self.path.display(), e);
            return Ok(None);
        }
        let page = HeapPage::new(hpid, &buf, Arc::clone(&self.schema))?;
        Ok(Some(DbPage::Heap(page)))
    }

    fn write_page(&self, page: &DbPage) -> DbResult<()> {
        let hpid = self.heap_page_id(&page.id())?;
        self.file.write_page(hpid.page_no, &page.page_data())
    }

    fn num_pages(&self) -> u32 {
        self.pages_or_zero(self.file.num_pages())
    }

    fn insert_tuple(
        &self,
        pool: &BufferPool,
        tid: TransactionId,
        tuple: Tuple,
    ) -> DbResult<Vec<PageRef>> {
        if **tuple.schema() != *self.schema {
            return Err(DbError::InvalidArgument(format!(
                "tuple schema [{}] does not match table schema [{}]",
                tuple.schema(),
                self.schema
            )));
        }

        for page_no in 0..self.num_pages() {
            let pid = PageId::heap(self.table_id, page_no);
            let already_locked = pool.holds_lock(tid, pid);

            let page = pool.get_page(tid, pid, Permission::ReadOnly)?;
            let has_room = page.read().heap().num_empty_slots() > 0;
            if !has_room {
                // Only give back a lock taken just for this probe.
                if !already_locked {
                    pool.release_page(tid, pid);
                }
                continue;
            }

            let page = pool.get_page(tid, pid, Permission::ReadWrite)?;
            page.write().heap_mut().insert_tuple(tuple)?;
            return Ok(vec![page]);
        }

        let page_no = self.file.allocate_page()?;
        log::debug!("appended page {} to {}", page_no, self.path.display());

        let pid = PageId::heap(self.table_id, page_no);
        let page = pool.get_page(tid, pid, Permission::ReadWrite)?;
        page.write().heap_mut().insert_tuple(tuple)?;
        Ok(vec![page])
    }

    fn delete_tuple(
        &self,
        pool: &BufferPool,
        tid: TransactionId,
        tuple: &Tuple,
    ) -> DbResult<PageRef> {
        let record_id = tuple
            .record_id()
            .ok_or_else(|| DbError::InvalidArgument("tuple has no record id".to_string()))?;
        let pid = record_id.page_id;
        if pid.table_id() != self.table_id || pid.page_no() >= self.num_pages() {
            return Err(DbError::PageNotFound(pid));
        }

        let page = pool.get_page(tid, pid, Permission::ReadWrite)?;
        page.write().heap_mut().delete_tuple(tuple)?;
        Ok(page)
    }

    fn iterator(self: Arc<Self>, pool: BufferPool, tid: TransactionId) -> Box<dyn DbFileIterator> {
        Box::new(HeapFileIterator::new(self, pool, tid, Permission::ReadOnly))
    }
}

/// Stable identity of the file at canonical path `path`.
pub fn table_id_for(path: &Path) -> TableId {
    TableId(crc32fast::hash(path.to_string_lossy().as_bytes()))
}
