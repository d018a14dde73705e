use crate::access::schema::Schema;
use crate::access::value::Field;
use crate::error::{DbError, DbResult};
use crate::storage::page::PageId;
use bytes::BufMut;
use std::cmp::Ordering;
use std::fmt;
use std::io::Read;
use std::sync::Arc;

/// Address of a stored tuple: the page holding it plus its slot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RecordId {
    pub page_id: PageId,
    pub slot: usize,
}

impl RecordId {
    pub fn new(page_id: PageId, slot: usize) -> Self {
        Self { page_id, slot }
    }
}

impl PartialOrd for RecordId {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for RecordId {
    fn cmp(&self, other: &Self) -> Ordering {
        // First compare by page, then by slot
        match self.page_id.cmp(&other.page_id) {
            Ordering::Equal => self.slot.cmp(&other.slot),
            other => other,
        }
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} slot {}", self.page_id, self.slot)
    }
}

/// A row: field values laid out according to a schema
#[derive(Debug, Clone, PartialEq)]
pub struct Tuple {
    schema: Arc<Schema>,
    fields: Vec<Field>,
    record_id: Option<RecordId>,
}

impl Tuple {
    /// Build a tuple, checking the values against `schema`.
    pub fn new(schema: Arc<Schema>, fields: Vec<Field>) -> DbResult<Self> {
        if fields.len() != schema.num_fields() {
            return Err(DbError::InvalidArgument(format!(
                "{} values for a schema of {} fields",
                fields.len(),
                schema.num_fields()
            )));
        }
        for (i, field) in fields.iter().enumerate() {
            let expected = schema.field_type(i)?;
            if field.field_type() != expected {
                return Err(DbError::InvalidArgument(format!(
                    "field {} is {} but the schema expects {}",
                    i,
                    field.field_type(),
                    expected
                )));
            }
        }

        Ok(Self {
            schema,
            fields,
            record_id: None,
        })
    }

    pub fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    /// Swap the schema for an equal one (e.g. an aliased copy).
    pub fn reset_schema(&mut self, schema: Arc<Schema>) -> DbResult<()> {
        if *schema != *self.schema {
            return Err(DbError::InvalidArgument(format!(
                "schema [{}] does not match [{}]",
                schema, self.schema
            )));
        }
        self.schema = schema;
        Ok(())
    }

    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    pub fn field(&self, index: usize) -> DbResult<&Field> {
        self.fields.get(index).ok_or(DbError::FieldIndexOutOfRange {
            index,
            num_fields: self.fields.len(),
        })
    }

    pub fn set_field(&mut self, index: usize, field: Field) -> DbResult<()> {
        let expected = self.schema.field_type(index)?;
        if field.field_type() != expected {
            return Err(DbError::InvalidArgument(format!(
                "field {} expects {}, got {}",
                index,
                expected,
                field.field_type()
            )));
        }
        self.fields[index] = field;
        Ok(())
    }

    pub fn record_id(&self) -> Option<RecordId> {
        self.record_id
    }

    pub fn set_record_id(&mut self, record_id: Option<RecordId>) {
        self.record_id = record_id;
    }

    /// Append the fixed-width encoding (`schema.byte_size()` bytes).
    pub fn serialize<B: BufMut>(&self, out: &mut B) {
        for field in &self.fields {
            field.serialize(out);
        }
    }

    /// Decode one tuple of `schema` from `input`.
    pub fn parse<R: Read>(schema: Arc<Schema>, input: &mut R) -> DbResult<Self> {
        let fields = schema
            .items()
            .map(|item| Field::parse(item.field_type, &mut *input))
            .collect::<DbResult<Vec<_>>>()?;
        Ok(Self {
            schema,
            fields,
            record_id: None,
        })
    }
}

impl fmt::Display for Tuple {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rendered: Vec<String> = self.fields.iter().map(|v| v.to_string()).collect();
        write!(f, "{}", rendered.join("\t"))
    }
}
