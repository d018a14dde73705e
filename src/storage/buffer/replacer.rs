use crate::storage::page::PageId;
use std::fmt::Debug;

/// Eviction policy over the pages resident in the buffer pool.
pub trait Replacer: Send + Sync + Debug {
    /// Note that `page_id` was just used, inserting it if it is new.
    fn record_access(&mut self, page_id: PageId);

    /// Forget `page_id`, e.g. after it was discarded.
    fn remove(&mut self, page_id: &PageId);

    /// Pick and forget the best page to evict among those `evictable`
    /// accepts. Returns None if no tracked page qualifies.
    fn victim(&mut self, evictable: &dyn Fn(&PageId) -> bool) -> Option<PageId>;

    /// Number of tracked pages.
    fn size(&self) -> usize;
}
