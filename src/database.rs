use crate::access::heap::{DbFile, HeapFile};
use crate::access::schema::Schema;
use crate::catalog::Catalog;
use crate::config::Config;
use crate::error::DbResult;
use crate::storage::buffer::BufferPool;
use crate::storage::page::PageId;
use crate::transaction::{Transaction, TransactionIdGenerator};
use std::path::Path;
use std::sync::Arc;

/// High-level handle that owns and wires together every shared component.
pub struct Database {
    config: Config,
    catalog: Arc<Catalog>,
    buffer_pool: BufferPool,
    txn_ids: TransactionIdGenerator,
}

impl Database {
    pub fn new(config: Config) -> Self {
        let catalog = Arc::new(Catalog::new());
        let buffer_pool = BufferPool::new(Arc::clone(&catalog), &config);
        Self {
            config,
            catalog,
            buffer_pool,
            txn_ids: TransactionIdGenerator::new(),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn catalog(&self) -> &Arc<Catalog> {
        &self.catalog
    }

    pub fn buffer_pool(&self) -> &BufferPool {
        &self.buffer_pool
    }

    /// Create an empty table file at `path` and register it as `name`.
    pub fn create_table(&self, path: &Path, name: &str, schema: Schema) -> DbResult<Arc<HeapFile>> {
        let file = HeapFile::create(path, Arc::new(schema), self.config.page_size)?;
        Ok(self.register(file, name))
    }

    /// Register the table file at `path` (created empty if missing) as `name`.
    pub fn open_table(&self, path: &Path, name: &str, schema: Schema) -> DbResult<Arc<HeapFile>> {
        let file = HeapFile::open(path, Arc::new(schema), self.config.page_size)?;
        Ok(self.register(file, name))
    }

    fn register(&self, file: HeapFile, name: &str) -> Arc<HeapFile> {
        let file = Arc::new(file);
        // A re-registered file must not be served from stale cached pages.
        for page_no in 0..file.num_pages() {
            self.buffer_pool
                .discard_page(PageId::heap(file.id(), page_no));
        }
        self.catalog.add_table(file.clone(), name, None);
        file
    }

    /// Names of all registered tables, sorted.
    pub fn list_tables(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .catalog
            .table_ids()
            .into_iter()
            .filter_map(|id| self.catalog.table_name(id).ok())
            .collect();
        names.sort();
        names
    }

    pub fn begin(&self) -> Transaction {
        Transaction::new(self.txn_ids.next(), self.buffer_pool.clone())
    }
}
