//! Schema descriptors governing tuple layout.

use crate::access::value::Type;
use crate::error::{DbError, DbResult};
use std::collections::HashMap;
use std::fmt;
use std::hash::{Hash, Hasher};

/// One entry of a schema: a field type plus an optional name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SchemaItem {
    pub field_type: Type,
    pub name: Option<String>,
}

impl SchemaItem {
    pub fn new(field_type: Type, name: Option<String>) -> Self {
        Self { field_type, name }
    }
}

impl fmt::Display for SchemaItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.field_type, self.name.as_deref().unwrap_or(""))
    }
}

/// Ordered, immutable description of the fields of a tuple.
///
/// Equality and hashing look only at the field types at every position;
/// names are ignored.
#[derive(Debug, Clone)]
pub struct Schema {
    items: Vec<SchemaItem>,
    // First occurrence wins when names repeat.
    name_index: HashMap<String, usize>,
}

impl Schema {
    /// Build a schema from parallel type and name sequences.
    pub fn new(types: Vec<Type>, names: Vec<Option<String>>) -> DbResult<Self> {
        if types.len() != names.len() {
            return Err(DbError::InvalidArgument(format!(
                "{} types but {} names",
                types.len(),
                names.len()
            )));
        }
        let items = types
            .into_iter()
            .zip(names)
            .map(|(field_type, name)| SchemaItem::new(field_type, name))
            .collect();
        Self::from_items(items)
    }

    /// Build a schema of anonymous fields.
    pub fn from_types(types: Vec<Type>) -> DbResult<Self> {
        let names = vec![None; types.len()];
        Self::new(types, names)
    }

    /// Convenience constructor for fully named schemas.
    pub fn named(fields: &[(Type, &str)]) -> DbResult<Self> {
        let items = fields
            .iter()
            .map(|(t, n)| SchemaItem::new(*t, Some(n.to_string())))
            .collect();
        Self::from_items(items)
    }

    pub fn from_items(items: Vec<SchemaItem>) -> DbResult<Self> {
        if items.is_empty() {
            return Err(DbError::InvalidArgument(
                "a schema needs at least one field".to_string(),
            ));
        }

        Ok(Self::build(items))
    }

    fn build(items: Vec<SchemaItem>) -> Self {
        let mut name_index = HashMap::new();
        for (i, item) in items.iter().enumerate() {
            if let Some(name) = &item.name {
                name_index.entry(name.clone()).or_insert(i);
            }
        }
        Self { items, name_index }
    }

    pub fn num_fields(&self) -> usize {
        self.items.len()
    }

    pub fn items(&self) -> impl Iterator<Item = &SchemaItem> {
        self.items.iter()
    }

    pub fn field_name(&self, index: usize) -> DbResult<Option<&str>> {
        self.item(index).map(|item| item.name.as_deref())
    }

    pub fn field_type(&self, index: usize) -> DbResult<Type> {
        self.item(index).map(|item| item.field_type)
    }

    /// Index of the first field called `name`.
    pub fn index_of(&self, name: &str) -> DbResult<usize> {
        self.name_index
            .get(name)
            .copied()
            .ok_or_else(|| DbError::NoSuchField(name.to_string()))
    }

    /// Fixed byte width of every tuple following this schema.
    pub fn byte_size(&self) -> usize {
        self.items.iter().map(|item| item.field_type.byte_len()).sum()
    }

    /// Concatenate `a`'s fields followed by `b`'s into a new schema.
    pub fn merge(a: &Schema, b: &Schema) -> Schema {
        // Both inputs are non-empty, so the result is too.
        Schema::build(a.items.iter().chain(b.items.iter()).cloned().collect())
    }

    /// Copy of this schema with every named field renamed to `alias.name`.
    pub fn with_alias(&self, alias: &str) -> Schema {
        let items = self
            .items
            .iter()
            .map(|item| SchemaItem {
                field_type: item.field_type,
                name: item.name.as_ref().map(|n| format!("{}.{}", alias, n)),
            })
            .collect();
        Schema::build(items)
    }

    fn item(&self, index: usize) -> DbResult<&SchemaItem> {
        self.items.get(index).ok_or(DbError::FieldIndexOutOfRange {
            index,
            num_fields: self.items.len(),
        })
    }
}

impl PartialEq for Schema {
    fn eq(&self, other: &Self) -> bool {
        self.items.len() == other.items.len()
            && self
                .items
                .iter()
                .zip(other.items.iter())
                .all(|(a, b)| a.field_type == b.field_type)
    }
}

impl Eq for Schema {}

impl Hash for Schema {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.items.len().hash(state);
        for item in &self.items {
            item.field_type.hash(state);
        }
    }
}

impl fmt::Display for Schema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rendered: Vec<String> = self.items.iter().map(|item| item.to_string()).collect();
        write!(f, "{}", rendered.join(", "))
    }
}
