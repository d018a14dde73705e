//! Bulk conversion of comma-separated text into a heap file.

use crate::access::heap::table_id_for;
use crate::access::schema::Schema;
use crate::access::tuple::Tuple;
use crate::error::{DbError, DbResult};
use crate::storage::disk::PageFile;
use crate::storage::page::{HeapPage, HeapPageId, TableId};
use std::io::BufRead;
use std::path::Path;
use std::sync::Arc;

/// Writes pages straight to disk, bypassing the buffer pool and locking.
/// Meant for loading a table before any transaction touches it.
pub struct HeapFileEncoder;

impl HeapFileEncoder {
    /// Parse one tuple per non-empty line of `reader` and write them, densely
    /// packed, to a new heap file at `out_path`. Returns the number of pages
    /// written.
    pub fn convert<R: BufRead>(
        reader: R,
        out_path: &Path,
        schema: Arc<Schema>,
        page_size: usize,
    ) -> DbResult<u32> {
        if HeapPage::num_slots_for(&schema, page_size) == 0 {
            return Err(DbError::InvalidArgument(format!(
                "a {} byte page cannot hold a {} byte tuple",
                page_size,
                schema.byte_size()
            )));
        }

        let file = PageFile::create(out_path, page_size)?;
        let table_id = table_id_for(&std::fs::canonicalize(out_path)?);

        let mut page_no = 0;
        let mut page = Self::empty_page(table_id, page_no, &schema, page_size)?;
        let mut pending = false;

        for (line_no, line) in reader.lines().enumerate() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            let tuple = Self::parse_line(&line, &schema).map_err(|e| {
                DbError::InvalidArgument(format!("line {}: {}", line_no + 1, e))
            })?;

            if page.num_empty_slots() == 0 {
                file.write_page(page_no, &page.page_data())?;
                page_no += 1;
                page = Self::empty_page(table_id, page_no, &schema, page_size)?;
            }
            page.insert_tuple(tuple)?;
            pending = true;
        }

        if pending {
            file.write_page(page_no, &page.page_data())?;
            page_no += 1;
        }
        file.sync()?;
        log::debug!("wrote {} pages to {}", page_no, out_path.display());
        Ok(page_no)
    }

    fn empty_page(
        table_id: TableId,
        page_no: u32,
        schema: &Arc<Schema>,
        page_size: usize,
    ) -> DbResult<HeapPage> {
        HeapPage::new(
            HeapPageId::new(table_id, page_no),
            &HeapPage::empty_page_data(page_size),
            Arc::clone(schema),
        )
    }

    fn parse_line(line: &str, schema: &Arc<Schema>) -> DbResult<Tuple> {
        let parts: Vec<&str> = line.split(',').collect();
        if parts.len() != schema.num_fields() {
            return Err(DbError::InvalidArgument(format!(
                "expected {} values, found {}",
                schema.num_fields(),
                parts.len()
            )));
        }
        let fields = schema
            .items()
            .zip(parts)
            .map(|(item, text)| item.field_type.parse_field(text))
            .collect::<DbResult<Vec<_>>>()?;
        Tuple::new(Arc::clone(schema), fields)
    }
}
