//! Page lock manager.

use crate::error::{DbError, DbResult};
use crate::storage::page::PageId;
use crate::transaction::TransactionId;
use parking_lot::{Condvar, Mutex};
use std::collections::{HashMap, HashSet, VecDeque};
use std::time::{Duration, Instant};

/// Lock modes supported by the system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum LockMode {
    /// Shared lock for reads.
    Shared,
    /// Exclusive lock for writes.
    Exclusive,
}

impl LockMode {
    pub fn is_compatible_with(&self, other: &LockMode) -> bool {
        matches!((self, other), (LockMode::Shared, LockMode::Shared))
    }
}

/// A waiter's edges: the page it wants and the holders it is blocked behind.
#[derive(Debug)]
struct Waits {
    page: PageId,
    holders: HashSet<TransactionId>,
}

/// Wait-for graph: waiter -> transactions it is blocked behind.
#[derive(Debug, Default)]
struct DeadlockDetector {
    wait_for: HashMap<TransactionId, Waits>,
}

impl DeadlockDetector {
    fn set_waits(&mut self, waiter: TransactionId, page: PageId, holders: HashSet<TransactionId>) {
        self.wait_for.insert(waiter, Waits { page, holders });
    }

    fn clear_waits(&mut self, waiter: TransactionId) {
        self.wait_for.remove(&waiter);
    }

    fn remove_transaction(&mut self, tid: TransactionId) {
        self.wait_for.remove(&tid);
        for waits in self.wait_for.values_mut() {
            waits.holders.remove(&tid);
        }
    }

    /// `holder` no longer holds `page`; waiters on that page stop waiting for it.
    fn remove_holder(&mut self, holder: TransactionId, page: PageId) {
        for waits in self.wait_for.values_mut() {
            if waits.page == page {
                waits.holders.remove(&holder);
            }
        }
    }

    /// True if `holder` can already reach `waiter`, so a new edge
    /// `waiter -> holder` would close a cycle.
    fn would_cause_deadlock(&self, waiter: TransactionId, holder: TransactionId) -> bool {
        let mut visited = HashSet::new();
        let mut queue = VecDeque::from([holder]);

        while let Some(current) = queue.pop_front() {
            if current == waiter {
                return true;
            }
            if visited.insert(current) {
                if let Some(next) = self.wait_for.get(&current) {
                    queue.extend(next.holders.iter().copied());
                }
            }
        }
        false
    }
}

#[derive(Debug, Default)]
struct LockTable {
    holders: HashMap<PageId, HashMap<TransactionId, LockMode>>,
    by_txn: HashMap<TransactionId, HashSet<PageId>>,
    detector: DeadlockDetector,
}

impl LockTable {
    /// Transactions other than `tid` whose lock on `pid` conflicts with `mode`.
    fn blockers(&self, tid: TransactionId, pid: PageId, mode: LockMode) -> HashSet<TransactionId> {
        self.holders
            .get(&pid)
            .map(|holders| {
                holders
                    .iter()
                    .filter(|(holder, held)| **holder != tid && !held.is_compatible_with(&mode))
                    .map(|(holder, _)| *holder)
                    .collect()
            })
            .unwrap_or_default()
    }

    fn grant(&mut self, tid: TransactionId, pid: PageId, mode: LockMode) {
        let held = self.holders.entry(pid).or_default().entry(tid).or_insert(mode);
        *held = (*held).max(mode);
        self.by_txn.entry(tid).or_default().insert(pid);
        self.detector.clear_waits(tid);
    }

    fn remove(&mut self, tid: TransactionId, pid: PageId) {
        if let Some(holders) = self.holders.get_mut(&pid) {
            holders.remove(&tid);
            if holders.is_empty() {
                self.holders.remove(&pid);
            }
        }
    }

    /// Drop one lock early, before `tid` completes.
    fn release(&mut self, tid: TransactionId, pid: PageId) {
        self.remove(tid, pid);
        if let Some(pages) = self.by_txn.get_mut(&tid) {
            pages.remove(&pid);
            if pages.is_empty() {
                self.by_txn.remove(&tid);
            }
        }
        self.detector.remove_holder(tid, pid);
    }
}

/// Shared/exclusive locks on pages, keyed by transaction.
///
/// A lock is granted when no other transaction holds a conflicting one. A
/// sole shared holder upgrades to exclusive in place. Otherwise the caller
/// blocks until a release, unless waiting would deadlock or the timeout
/// elapses; both abort the requester with `TransactionAborted`.
#[derive(Debug, Default)]
pub struct LockManager {
    table: Mutex<LockTable>,
    released: Condvar,
}

impl LockManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn acquire_lock(
        &self,
        tid: TransactionId,
        pid: PageId,
        mode: LockMode,
        timeout: Option<Duration>,
    ) -> DbResult<()> {
        let deadline = timeout.map(|t| Instant::now() + t);
        let mut table = self.table.lock();

        loop {
            let blockers = table.blockers(tid, pid, mode);
            if blockers.is_empty() {
                table.grant(tid, pid, mode);
                return Ok(());
            }

            if blockers
                .iter()
                .any(|holder| table.detector.would_cause_deadlock(tid, *holder))
            {
                log::debug!("{} aborted: waiting for {:?} on {} deadlocks", tid, mode, pid);
                table.detector.clear_waits(tid);
                return Err(DbError::TransactionAborted(tid));
            }

            table.detector.set_waits(tid, pid, blockers);

            match deadline {
                Some(deadline) => {
                    let expired = Instant::now() >= deadline
                        || (self.released.wait_until(&mut table, deadline).timed_out()
                            && !table.blockers(tid, pid, mode).is_empty());
                    if expired {
                        log::debug!("{} aborted: timed out waiting for {}", tid, pid);
                        table.detector.clear_waits(tid);
                        return Err(DbError::TransactionAborted(tid));
                    }
                }
                None => self.released.wait(&mut table),
            }
        }
    }

    pub fn release_lock(&self, tid: TransactionId, pid: PageId) {
        self.table.lock().release(tid, pid);
        self.released.notify_all();
    }

    pub fn release_all_locks(&self, tid: TransactionId) {
        let mut table = self.table.lock();
        if let Some(pages) = table.by_txn.remove(&tid) {
            for pid in pages {
                table.remove(tid, pid);
            }
        }
        table.detector.remove_transaction(tid);
        self.released.notify_all();
    }

    /// Mode `tid` currently holds on `pid`, if any.
    pub fn lock_mode(&self, tid: TransactionId, pid: PageId) -> Option<LockMode> {
        let table = self.table.lock();
        table.holders.get(&pid).and_then(|h| h.get(&tid)).copied()
    }

    pub fn holds_lock(&self, tid: TransactionId, pid: PageId) -> bool {
        self.lock_mode(tid, pid).is_some()
    }

    pub fn pages_locked_by(&self, tid: TransactionId) -> Vec<PageId> {
        let table = self.table.lock();
        let mut pages: Vec<PageId> = table
            .by_txn
            .get(&tid)
            .map(|set| set.iter().copied().collect())
            .unwrap_or_default();
        pages.sort();
        pages
    }
}
