//! Sequential scan operator.

use crate::access::scan::DbFileIterator;
use crate::access::schema::Schema;
use crate::access::tuple::Tuple;
use crate::error::DbResult;
use crate::executor::{ExecutionContext, OpIterator};
use crate::storage::page::TableId;
use crate::transaction::TransactionId;
use std::sync::Arc;

/// Reads every tuple of one table, in storage order, under read locks.
///
/// Output fields are named `alias.field` for every named table field.
pub struct SeqScan {
    context: ExecutionContext,
    tid: TransactionId,
    table_id: TableId,
    alias: String,
    schema: Arc<Schema>,
    cursor: Box<dyn DbFileIterator>,
}

impl SeqScan {
    pub fn new(
        context: ExecutionContext,
        tid: TransactionId,
        table_id: TableId,
        alias: &str,
    ) -> DbResult<Self> {
        let (schema, cursor) = Self::build(&context, tid, table_id, alias)?;
        Ok(Self {
            context,
            tid,
            table_id,
            alias: alias.to_string(),
            schema,
            cursor,
        })
    }

    fn build(
        context: &ExecutionContext,
        tid: TransactionId,
        table_id: TableId,
        alias: &str,
    ) -> DbResult<(Arc<Schema>, Box<dyn DbFileIterator>)> {
        let file = context.catalog.database_file(table_id)?;
        let schema = Arc::new(file.schema().with_alias(alias));
        let cursor = file.iterator(context.buffer_pool.clone(), tid);
        Ok((schema, cursor))
    }

    pub fn table_name(&self) -> DbResult<String> {
        self.context.catalog.table_name(self.table_id)
    }

    pub fn alias(&self) -> &str {
        &self.alias
    }

    /// Point the scan at another table. The new scan starts unopened.
    pub fn reset(&mut self, table_id: TableId, alias: &str) -> DbResult<()> {
        let (schema, cursor) = Self::build(&self.context, self.tid, table_id, alias)?;
        self.cursor.close();
        self.table_id = table_id;
        self.alias = alias.to_string();
        self.schema = schema;
        self.cursor = cursor;
        Ok(())
    }
}

impl OpIterator for SeqScan {
    fn open(&mut self) -> DbResult<()> {
        self.cursor.open()
    }

    fn has_next(&mut self) -> DbResult<bool> {
        self.cursor.has_next()
    }

    fn next(&mut self) -> DbResult<Tuple> {
        let mut tuple = self.cursor.next()?;
        tuple.reset_schema(Arc::clone(&self.schema))?;
        Ok(tuple)
    }

    fn rewind(&mut self) -> DbResult<()> {
        self.cursor.rewind()
    }

    fn close(&mut self) {
        self.cursor.close();
    }

    fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::access::heap::DbFile;
    use crate::access::value::{Field, Type};
    use crate::config::Config;
    use crate::database::Database;
    use crate::error::DbError;
    use anyhow::Result;
    use tempfile::tempdir;

    #[test]
    fn test_scan_with_alias() -> Result<()> {
        let dir = tempdir()?;
        let db = Database::new(Config::default());
        let schema = Schema::named(&[(Type::Int, "id"), (Type::String, "name")])?;
        let table = db.create_table(&dir.path().join("people.dat"), "people", schema)?;

        let txn = db.begin();
        for (id, name) in [(1, "ann"), (2, "bob")] {
            let tuple = Tuple::new(
                table.schema(),
                vec![Field::Int(id), Field::String(name.to_string())],
            )?;
            db.buffer_pool().insert_tuple(txn.id(), table.id(), tuple)?;
        }

        let mut scan = SeqScan::new(ExecutionContext::from(&db), txn.id(), table.id(), "p")?;
        assert_eq!(scan.table_name()?, "people");
        assert_eq!(scan.alias(), "p");
        assert_eq!(scan.schema().index_of("p.name")?, 1);

        scan.open()?;
        let mut names = Vec::new();
        while scan.has_next()? {
            let tuple = scan.next()?;
            assert_eq!(tuple.schema().field_name(0)?, Some("p.id"));
            names.push(tuple.field(1)?.to_string());
        }
        assert_eq!(names, vec!["ann", "bob"]);
        assert!(matches!(scan.next(), Err(DbError::NoSuchElement)));

        scan.rewind()?;
        assert!(scan.has_next()?);
        scan.close();
        Ok(())
    }

    #[test]
    fn test_reset_switches_table() -> Result<()> {
        let dir = tempdir()?;
        let db = Database::new(Config::default());
        let a = db.create_table(
            &dir.path().join("a.dat"),
            "a",
            Schema::named(&[(Type::Int, "x")])?,
        )?;
        let b = db.create_table(
            &dir.path().join("b.dat"),
            "b",
            Schema::named(&[(Type::Int, "y")])?,
        )?;

        let txn = db.begin();
        let tuple = Tuple::new(b.schema(), vec![Field::Int(5)])?;
        db.buffer_pool().insert_tuple(txn.id(), b.id(), tuple)?;

        let mut scan = SeqScan::new(ExecutionContext::from(&db), txn.id(), a.id(), "first")?;
        scan.open()?;
        assert!(!scan.has_next()?);

        scan.reset(b.id(), "second")?;
        assert_eq!(scan.table_name()?, "b");
        assert_eq!(scan.schema().field_name(0)?, Some("second.y"));
        scan.open()?;
        assert_eq!(scan.next()?.field(0)?, &Field::Int(5));
        Ok(())
    }

    #[test]
    fn test_unknown_table() {
        let db = Database::new(Config::default());
        let txn = db.begin();
        let result = SeqScan::new(ExecutionContext::from(&db), txn.id(), TableId(404), "t");
        assert!(matches!(result, Err(DbError::TableNotFound(_))));
    }
}
