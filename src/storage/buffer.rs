pub mod lru;
pub mod replacer;

use crate::access::tuple::Tuple;
use crate::catalog::Catalog;
use crate::concurrency::{LockManager, LockMode};
use crate::config::Config;
use crate::error::{DbError, DbResult};
use crate::storage::page::{DbPage, PageId, TableId};
use crate::transaction::TransactionId;
use dashmap::DashMap;
use lru::LruReplacer;
use parking_lot::{Mutex, RwLock};
use replacer::Replacer;
use std::sync::Arc;
use std::time::Duration;

/// A cached page. Holders outside the pool keep it from being evicted.
pub type PageRef = Arc<RwLock<DbPage>>;

/// Access level requested when fetching a page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Permission {
    ReadOnly,
    ReadWrite,
}

impl Permission {
    pub fn lock_mode(self) -> LockMode {
        match self {
            Permission::ReadOnly => LockMode::Shared,
            Permission::ReadWrite => LockMode::Exclusive,
        }
    }
}

/// Shared page cache sitting between heap files and transactions.
///
/// Every fetch first takes the page lock for the calling transaction, so the
/// pool is also the single gate for cross-transaction isolation. Dirty pages
/// stay cached until their transaction completes (no steal); only clean pages
/// nobody else references are evicted.
#[derive(Clone)]
pub struct BufferPool {
    inner: Arc<BufferPoolInner>,
}

struct BufferPoolInner {
    catalog: Arc<Catalog>,
    pages: DashMap<PageId, PageRef>,
    replacer: Mutex<Box<dyn Replacer>>,
    lock_manager: LockManager,
    // Serializes misses so the cache never grows past capacity.
    load_latch: Mutex<()>,
    capacity: usize,
    lock_timeout: Option<Duration>,
}

impl BufferPool {
    pub fn new(catalog: Arc<Catalog>, config: &Config) -> Self {
        let capacity = config.buffer_pool_pages.max(1);
        Self {
            inner: Arc::new(BufferPoolInner {
                catalog,
                pages: DashMap::with_capacity(capacity),
                replacer: Mutex::new(Box::new(LruReplacer::new(capacity))),
                lock_manager: LockManager::new(),
                load_latch: Mutex::new(()),
                capacity,
                lock_timeout: config.lock_timeout,
            }),
        }
    }

    pub fn catalog(&self) -> &Arc<Catalog> {
        &self.inner.catalog
    }

    /// Fetch `pid` for `tid`, blocking until the lock for `permission` is
    /// granted. Fails with `TransactionAborted` when the wait would deadlock
    /// or times out.
    pub fn get_page(
        &self,
        tid: TransactionId,
        pid: PageId,
        permission: Permission,
    ) -> DbResult<PageRef> {
        self.inner.lock_manager.acquire_lock(
            tid,
            pid,
            permission.lock_mode(),
            self.inner.lock_timeout,
        )?;

        if let Some(page) = self.cached(&pid) {
            return Ok(page);
        }

        let _latch = self.inner.load_latch.lock();
        if let Some(page) = self.cached(&pid) {
            return Ok(page);
        }

        let file = self.inner.catalog.database_file(pid.table_id())?;
        let page = file
            .read_page(&pid)?
            .ok_or(DbError::PageUnavailable(pid))?;

        if self.inner.pages.len() >= self.inner.capacity {
            self.evict_page()?;
        }

        let page = Arc::new(RwLock::new(page));
        self.inner.pages.insert(pid, Arc::clone(&page));
        self.inner.replacer.lock().record_access(pid);
        Ok(page)
    }

    fn cached(&self, pid: &PageId) -> Option<PageRef> {
        let page = self.inner.pages.get(pid).map(|e| Arc::clone(e.value()))?;
        self.inner.replacer.lock().record_access(*pid);
        Some(page)
    }

    /// Drop one clean, unreferenced page from the cache. Caller holds the load latch.
    fn evict_page(&self) -> DbResult<()> {
        let pages = &self.inner.pages;
        let evictable = |pid: &PageId| {
            pages
                .get(pid)
                .map_or(true, |e| is_evictable(e.value()))
        };

        let mut replacer = self.inner.replacer.lock();
        for _ in 0..replacer.size() {
            let victim = replacer.victim(&evictable).ok_or(DbError::BufferPoolFull)?;
            // Re-check under the shard lock; a racing fetch may have taken a reference.
            if pages.remove_if(&victim, |_, page| is_evictable(page)).is_some() {
                log::debug!("evicted {}", victim);
                return Ok(());
            }
            if pages.contains_key(&victim) {
                replacer.record_access(victim);
            }
        }
        Err(DbError::BufferPoolFull)
    }

    /// Insert `tuple` into table `table_id` on behalf of `tid`.
    pub fn insert_tuple(&self, tid: TransactionId, table_id: TableId, tuple: Tuple) -> DbResult<()> {
        let file = self.inner.catalog.database_file(table_id)?;
        for page in file.insert_tuple(self, tid, tuple)? {
            page.write().mark_dirty(Some(tid));
        }
        Ok(())
    }

    /// Delete the stored tuple addressed by `tuple`'s record id.
    pub fn delete_tuple(&self, tid: TransactionId, tuple: &Tuple) -> DbResult<()> {
        let record_id = tuple
            .record_id()
            .ok_or_else(|| DbError::InvalidArgument("tuple has no record id".to_string()))?;
        let file = self
            .inner
            .catalog
            .database_file(record_id.page_id.table_id())?;
        let page = file.delete_tuple(self, tid, tuple)?;
        page.write().mark_dirty(Some(tid));
        Ok(())
    }

    /// Give up `tid`'s lock on `pid` before the transaction ends.
    pub fn release_page(&self, tid: TransactionId, pid: PageId) {
        self.inner.lock_manager.release_lock(tid, pid);
    }

    pub fn holds_lock(&self, tid: TransactionId, pid: PageId) -> bool {
        self.inner.lock_manager.holds_lock(tid, pid)
    }

    pub fn lock_mode(&self, tid: TransactionId, pid: PageId) -> Option<LockMode> {
        self.inner.lock_manager.lock_mode(tid, pid)
    }

    /// Write `pid` back to its file if it is cached and dirty.
    ///
    /// The page stays marked dirty by its transaction until that transaction
    /// completes, so an abort still rolls it back (on disk too).
    pub fn flush_page(&self, pid: PageId) -> DbResult<()> {
        let Some(page) = self.inner.pages.get(&pid).map(|e| Arc::clone(e.value())) else {
            return Ok(());
        };
        let page = page.read();
        if page.is_dirty().is_some() {
            self.write_back(&page)?;
        }
        Ok(())
    }

    /// Flush every page dirtied by `tid`.
    pub fn flush_pages(&self, tid: TransactionId) -> DbResult<()> {
        for pid in self.inner.lock_manager.pages_locked_by(tid) {
            if self.dirtier(&pid) == Some(tid) {
                self.flush_page(pid)?;
            }
        }
        Ok(())
    }

    /// Flush every dirty page, committed or not.
    pub fn flush_all_pages(&self) -> DbResult<()> {
        let pids: Vec<PageId> = self.inner.pages.iter().map(|e| *e.key()).collect();
        for pid in pids {
            self.flush_page(pid)?;
        }
        Ok(())
    }

    /// Drop `pid` from the cache without writing it.
    pub fn discard_page(&self, pid: PageId) {
        self.inner.pages.remove(&pid);
        self.inner.replacer.lock().remove(&pid);
    }

    /// Finish `tid`: on commit write its dirty pages and make them the new
    /// before-images; on abort put the before-images back. A commit that
    /// fails to write is rolled back like an abort and returns the write
    /// error. Its locks are released either way.
    pub fn transaction_complete(&self, tid: TransactionId, commit: bool) -> DbResult<()> {
        let result = if commit {
            self.commit_pages(tid).or_else(|e| {
                if let Err(rollback) = self.restore_pages(tid) {
                    log::warn!("{} rollback after failed commit: {}", tid, rollback);
                }
                Err(e)
            })
        } else {
            self.restore_pages(tid)
        };
        self.inner.lock_manager.release_all_locks(tid);

        match &result {
            Ok(()) if commit => log::debug!("{} committed", tid),
            Ok(()) => log::debug!("{} aborted", tid),
            Err(e) => log::warn!("{} did not complete cleanly: {}", tid, e),
        }
        result
    }

    fn commit_pages(&self, tid: TransactionId) -> DbResult<()> {
        let pages = self.pages_dirtied_by(tid);
        // Pages stay dirty until every write has succeeded.
        for page in &pages {
            self.write_back(&page.read())?;
        }
        for page in &pages {
            let mut page = page.write();
            page.mark_dirty(None);
            page.set_before_image();
        }
        Ok(())
    }

    /// Put back the before-image of every page `tid` dirtied. Keeps going
    /// past failures and reports the first one.
    fn restore_pages(&self, tid: TransactionId) -> DbResult<()> {
        let mut result = Ok(());
        for page in self.pages_dirtied_by(tid) {
            let mut page = page.write();
            let restored = page
                .before_image()
                .map(|before| *page = before)
                .and_then(|()| self.undo_on_disk(&page));
            if let Err(e) = restored {
                log::warn!("could not roll back {} for {}: {}", page.id(), tid, e);
                if result.is_ok() {
                    result = Err(e);
                }
            }
        }
        result
    }

    /// Rewrite a restored page if a flush already put newer bytes on disk.
    fn undo_on_disk(&self, page: &DbPage) -> DbResult<()> {
        let file = self.inner.catalog.database_file(page.id().table_id())?;
        let on_disk = file.read_page(&page.id())?;
        if on_disk.map_or(true, |disk| disk.page_data() != page.page_data()) {
            file.write_page(page)?;
            log::debug!("rolled back {} on disk", page.id());
        }
        Ok(())
    }

    fn pages_dirtied_by(&self, tid: TransactionId) -> Vec<PageRef> {
        self.inner
            .lock_manager
            .pages_locked_by(tid)
            .into_iter()
            .filter_map(|pid| self.inner.pages.get(&pid).map(|e| Arc::clone(e.value())))
            .filter(|page| page.read().is_dirty() == Some(tid))
            .collect()
    }

    fn dirtier(&self, pid: &PageId) -> Option<TransactionId> {
        self.inner
            .pages
            .get(pid)
            .and_then(|e| e.value().read().is_dirty())
    }

    fn write_back(&self, page: &DbPage) -> DbResult<()> {
        let file = self.inner.catalog.database_file(page.id().table_id())?;
        file.write_page(page)?;
        log::debug!("flushed {}", page.id());
        Ok(())
    }

    /// Number of cached pages.
    pub fn num_cached(&self) -> usize {
        self.inner.pages.len()
    }
}

fn is_evictable(page: &PageRef) -> bool {
    Arc::strong_count(page) == 1 && page.read().is_dirty().is_none()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::access::heap::{DbFile, HeapFile};
    use crate::access::schema::Schema;
    use crate::access::value::{Field, Type};
    use anyhow::Result;
    use tempfile::{tempdir, TempDir};

    const T1: TransactionId = TransactionId(1);
    const T2: TransactionId = TransactionId(2);

    // 4 byte tuples in a 64 byte page: 15 slots
    const PAGE: usize = 64;

    struct Fixture {
        _dir: TempDir,
        file: Arc<HeapFile>,
        pool: BufferPool,
    }

    impl Fixture {
        fn new(pool_pages: usize) -> Result<Self> {
            let dir = tempdir()?;
            let schema = Arc::new(Schema::from_types(vec![Type::Int])?);
            let file = Arc::new(HeapFile::create(&dir.path().join("b.dat"), schema, PAGE)?);
            let catalog = Arc::new(Catalog::new());
            catalog.add_table(file.clone(), "b", None);
            let config = Config::builder()
                .page_size(PAGE)
                .buffer_pool_pages(pool_pages)
                .build();
            Ok(Self {
                _dir: dir,
                pool: BufferPool::new(catalog, &config),
                file,
            })
        }

        fn insert(&self, tid: TransactionId, v: i32) -> Result<()> {
            let tuple = Tuple::new(self.file.schema(), vec![Field::Int(v)])?;
            self.pool.insert_tuple(tid, self.file.id(), tuple)?;
            Ok(())
        }

        fn pid(&self, n: u32) -> PageId {
            PageId::heap(self.file.id(), n)
        }

        fn count_on_disk(&self, n: u32) -> Result<usize> {
            let page = self.file.read_page(&self.pid(n))?.unwrap();
            Ok(page.heap().iter().count())
        }
    }

    #[test]
    fn test_permission_lock_modes() {
        assert_eq!(Permission::ReadOnly.lock_mode(), LockMode::Shared);
        assert_eq!(Permission::ReadWrite.lock_mode(), LockMode::Exclusive);
    }

    #[test]
    fn test_get_page_caches_and_locks() -> Result<()> {
        let f = Fixture::new(4)?;
        f.insert(T1, 1)?;
        f.pool.transaction_complete(T1, true)?;

        let a = f.pool.get_page(T2, f.pid(0), Permission::ReadOnly)?;
        let b = f.pool.get_page(T2, f.pid(0), Permission::ReadOnly)?;
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(f.pool.lock_mode(T2, f.pid(0)), Some(LockMode::Shared));
        assert_eq!(f.pool.num_cached(), 1);
        Ok(())
    }

    #[test]
    fn test_missing_page_is_unavailable() -> Result<()> {
        let f = Fixture::new(4)?;
        assert!(matches!(
            f.pool.get_page(T1, f.pid(3), Permission::ReadOnly),
            Err(DbError::PageUnavailable(_))
        ));
        Ok(())
    }

    #[test]
    fn test_unknown_table() -> Result<()> {
        let f = Fixture::new(4)?;
        let pid = PageId::heap(TableId(f.file.id().0 ^ 1), 0);
        assert!(matches!(
            f.pool.get_page(T1, pid, Permission::ReadOnly),
            Err(DbError::TableNotFound(_))
        ));
        Ok(())
    }

    #[test]
    fn test_commit_writes_pages() -> Result<()> {
        let f = Fixture::new(4)?;
        f.insert(T1, 1)?;
        f.insert(T1, 2)?;

        // Not written before commit.
        assert_eq!(f.count_on_disk(0)?, 0);

        f.pool.transaction_complete(T1, true)?;
        assert_eq!(f.count_on_disk(0)?, 2);
        assert!(!f.pool.holds_lock(T1, f.pid(0)));
        Ok(())
    }

    #[test]
    fn test_abort_restores_before_image() -> Result<()> {
        let f = Fixture::new(4)?;
        f.insert(T1, 1)?;
        f.pool.transaction_complete(T1, true)?;

        f.insert(T2, 2)?;
        f.pool.transaction_complete(T2, false)?;

        let page = f.pool.get_page(TransactionId(3), f.pid(0), Permission::ReadOnly)?;
        let page = page.read();
        assert_eq!(page.heap().iter().count(), 1);
        assert!(page.is_dirty().is_none());
        assert_eq!(f.count_on_disk(0)?, 1);
        Ok(())
    }

    #[test]
    fn test_evicts_clean_pages_only() -> Result<()> {
        let f = Fixture::new(2)?;
        // Three pages worth of tuples, one committed page at a time.
        for batch in 0..3 {
            let tid = TransactionId(10 + batch);
            for i in 0..15 {
                f.insert(tid, i)?;
            }
            f.pool.transaction_complete(tid, true)?;
        }
        assert_eq!(f.file.num_pages(), 3);
        assert_eq!(f.pool.num_cached(), 2);

        for n in 0..3 {
            f.pool.get_page(T2, f.pid(n), Permission::ReadOnly)?;
        }
        assert_eq!(f.pool.num_cached(), 2);
        Ok(())
    }

    #[test]
    fn test_full_of_dirty_pages() -> Result<()> {
        let f = Fixture::new(1)?;
        for i in 0..15 {
            f.insert(T1, i)?;
        }
        // Page 0 is dirty and full; a second page needs a frame.
        let err = f.insert(T1, 99).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<DbError>(),
            Some(DbError::BufferPoolFull)
        ));
        Ok(())
    }

    #[test]
    fn test_discard_page_drops_changes() -> Result<()> {
        let f = Fixture::new(4)?;
        f.insert(T1, 1)?;
        f.pool.discard_page(f.pid(0));
        assert_eq!(f.pool.num_cached(), 0);

        let page = f.pool.get_page(T1, f.pid(0), Permission::ReadOnly)?;
        assert_eq!(page.read().heap().iter().count(), 0);
        Ok(())
    }

    #[test]
    fn test_flush_pages_by_transaction() -> Result<()> {
        let f = Fixture::new(4)?;
        f.insert(T1, 1)?;
        f.pool.flush_pages(T2)?;
        assert_eq!(f.count_on_disk(0)?, 0);

        f.pool.flush_pages(T1)?;
        assert_eq!(f.count_on_disk(0)?, 1);

        f.pool.flush_all_pages()?;
        Ok(())
    }

    #[test]
    fn test_abort_after_flush_rolls_back_disk() -> Result<()> {
        let f = Fixture::new(4)?;
        f.insert(T1, 1)?;
        f.pool.transaction_complete(T1, true)?;

        f.insert(T2, 2)?;
        f.pool.flush_pages(T2)?;
        assert_eq!(f.count_on_disk(0)?, 2);

        f.pool.transaction_complete(T2, false)?;
        assert_eq!(f.count_on_disk(0)?, 1);

        let page = f.pool.get_page(TransactionId(3), f.pid(0), Permission::ReadOnly)?;
        assert_eq!(page.read().heap().iter().count(), 1);
        Ok(())
    }

    #[test]
    fn test_abort_after_flush_all_of_new_page() -> Result<()> {
        let f = Fixture::new(4)?;
        f.insert(T1, 7)?;
        f.pool.flush_all_pages()?;
        assert_eq!(f.count_on_disk(0)?, 1);
        assert_eq!(f.pool.dirtier(&f.pid(0)), Some(T1));

        f.pool.transaction_complete(T1, false)?;
        assert_eq!(f.count_on_disk(0)?, 0);
        assert_eq!(f.pool.dirtier(&f.pid(0)), None);
        Ok(())
    }

    #[test]
    fn test_failed_commit_rolls_back() -> Result<()> {
        let f = Fixture::new(4)?;
        f.insert(T1, 1)?;

        // With the table gone from the catalog the write-back cannot happen.
        f.pool.catalog().clear();
        assert!(matches!(
            f.pool.transaction_complete(T1, true),
            Err(DbError::TableNotFound(_))
        ));
        assert!(!f.pool.holds_lock(T1, f.pid(0)));
        assert_eq!(f.pool.dirtier(&f.pid(0)), None);

        f.pool.catalog().add_table(f.file.clone(), "b", None);
        let page = f.pool.get_page(T2, f.pid(0), Permission::ReadOnly)?;
        assert_eq!(page.read().heap().iter().count(), 0);
        assert_eq!(f.count_on_disk(0)?, 0);
        Ok(())
    }

    #[test]
    fn test_delete_marks_dirty() -> Result<()> {
        let f = Fixture::new(4)?;
        f.insert(T1, 1)?;
        f.pool.transaction_complete(T1, true)?;

        let page = f.pool.get_page(T2, f.pid(0), Permission::ReadOnly)?;
        let tuple = page.read().heap().iter().next().cloned().unwrap();
        drop(page);

        f.pool.delete_tuple(T2, &tuple)?;
        assert_eq!(f.pool.lock_mode(T2, f.pid(0)), Some(LockMode::Exclusive));
        f.pool.transaction_complete(T2, true)?;
        assert_eq!(f.count_on_disk(0)?, 0);
        Ok(())
    }
}
