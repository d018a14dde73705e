//! In-memory table registry.
//!
//! Maps table names and ids to the `DbFile` holding the table's pages. The
//! catalog is not persisted; callers re-register tables on startup.

use crate::access::heap::DbFile;
use crate::access::schema::Schema;
use crate::error::{DbError, DbResult};
use crate::storage::page::TableId;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Clone)]
pub struct TableInfo {
    pub file: Arc<dyn DbFile>,
    pub name: String,
    pub primary_key: Option<String>,
}

impl std::fmt::Debug for TableInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TableInfo")
            .field("table_id", &self.file.id())
            .field("name", &self.name)
            .field("primary_key", &self.primary_key)
            .finish()
    }
}

#[derive(Debug, Default)]
struct CatalogInner {
    tables: HashMap<TableId, TableInfo>,
    names: HashMap<String, TableId>,
}

#[derive(Debug, Default)]
pub struct Catalog {
    inner: RwLock<CatalogInner>,
}

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `file` under `name`. A table already registered under the
    /// same name or the same id is replaced.
    pub fn add_table(&self, file: Arc<dyn DbFile>, name: &str, primary_key: Option<&str>) {
        let table_id = file.id();
        let mut inner = self.inner.write();

        if let Some(old_id) = inner.names.remove(name) {
            inner.tables.remove(&old_id);
        }
        if let Some(old) = inner.tables.remove(&table_id) {
            inner.names.remove(&old.name);
        }

        log::debug!("registered table '{}' as {}", name, table_id);
        inner.names.insert(name.to_string(), table_id);
        inner.tables.insert(
            table_id,
            TableInfo {
                file,
                name: name.to_string(),
                primary_key: primary_key.map(str::to_string),
            },
        );
    }

    pub fn table_id(&self, name: &str) -> DbResult<TableId> {
        self.inner
            .read()
            .names
            .get(name)
            .copied()
            .ok_or_else(|| DbError::UnknownTable(name.to_string()))
    }

    pub fn table_info(&self, table_id: TableId) -> DbResult<TableInfo> {
        self.inner
            .read()
            .tables
            .get(&table_id)
            .cloned()
            .ok_or(DbError::TableNotFound(table_id))
    }

    pub fn database_file(&self, table_id: TableId) -> DbResult<Arc<dyn DbFile>> {
        Ok(self.table_info(table_id)?.file)
    }

    pub fn schema(&self, table_id: TableId) -> DbResult<Arc<Schema>> {
        Ok(self.database_file(table_id)?.schema())
    }

    pub fn table_name(&self, table_id: TableId) -> DbResult<String> {
        Ok(self.table_info(table_id)?.name)
    }

    pub fn primary_key(&self, table_id: TableId) -> DbResult<Option<String>> {
        Ok(self.table_info(table_id)?.primary_key)
    }

    /// Registered table ids in ascending order.
    pub fn table_ids(&self) -> Vec<TableId> {
        let mut ids: Vec<TableId> = self.inner.read().tables.keys().copied().collect();
        ids.sort();
        ids
    }

    pub fn clear(&self) {
        let mut inner = self.inner.write();
        inner.tables.clear();
        inner.names.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::access::heap::HeapFile;
    use crate::access::value::Type;
    use anyhow::Result;
    use tempfile::tempdir;

    fn heap_file(dir: &std::path::Path, file: &str) -> Result<Arc<dyn DbFile>> {
        let schema = Arc::new(Schema::named(&[(Type::Int, "id")])?);
        Ok(Arc::new(HeapFile::create(&dir.join(file), schema, 4096)?))
    }

    #[test]
    fn test_add_and_lookup() -> Result<()> {
        let dir = tempdir()?;
        let catalog = Catalog::new();
        let file = heap_file(dir.path(), "users.dat")?;
        let id = file.id();

        catalog.add_table(file, "users", Some("id"));

        assert_eq!(catalog.table_id("users")?, id);
        assert_eq!(catalog.table_name(id)?, "users");
        assert_eq!(catalog.primary_key(id)?.as_deref(), Some("id"));
        assert_eq!(catalog.schema(id)?.num_fields(), 1);
        assert_eq!(catalog.table_ids(), vec![id]);
        Ok(())
    }

    #[test]
    fn test_missing_tables() {
        let catalog = Catalog::new();
        assert!(matches!(
            catalog.table_id("nope"),
            Err(DbError::UnknownTable(_))
        ));
        assert!(matches!(
            catalog.database_file(TableId(5)),
            Err(DbError::TableNotFound(TableId(5)))
        ));
    }

    #[test]
    fn test_readding_name_replaces_entry() -> Result<()> {
        let dir = tempdir()?;
        let catalog = Catalog::new();
        let first = heap_file(dir.path(), "a.dat")?;
        let second = heap_file(dir.path(), "b.dat")?;
        let first_id = first.id();
        let second_id = second.id();

        catalog.add_table(first, "t", None);
        catalog.add_table(second, "t", None);

        assert_eq!(catalog.table_id("t")?, second_id);
        assert!(catalog.database_file(first_id).is_err());
        assert_eq!(catalog.table_ids().len(), 1);
        Ok(())
    }

    #[test]
    fn test_clear() -> Result<()> {
        let dir = tempdir()?;
        let catalog = Catalog::new();
        catalog.add_table(heap_file(dir.path(), "a.dat")?, "a", None);
        catalog.clear();
        assert!(catalog.table_ids().is_empty());
        assert!(catalog.table_id("a").is_err());
        Ok(())
    }
}
