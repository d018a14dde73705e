//! Access layer: how tuples are described, encoded, stored and scanned.
//!
//! - **Type / Field**: fixed-width value types and their big-endian encoding
//! - **Schema**: ordered field descriptor fixing a tuple's byte layout
//! - **Tuple**: field values plus the record id they were read from
//! - **HeapFile**: a table as a flat file of fixed-slot pages
//! - **HeapFileIterator**: lazy, lock-mediated cursor over a heap file
//! - **HeapFileEncoder**: bulk loader from comma-separated text

pub mod encoder;
pub mod heap;
pub mod scan;
pub mod schema;
pub mod tuple;
pub mod value;

pub use encoder::HeapFileEncoder;
pub use heap::{DbFile, HeapFile};
pub use scan::{DbFileIterator, HeapFileIterator};
pub use schema::{Schema, SchemaItem};
pub use tuple::{RecordId, Tuple};
pub use value::{Field, Type, STRING_LEN};
