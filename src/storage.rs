//! Storage layer.
//!
//! - **PageFile**: positional reads and writes of fixed-size pages on one file
//! - **HeapPage**: bitmap plus fixed-width slots, one tuple per slot
//! - **BufferPool**: lock-mediated page cache shared by all transactions
//!
//! Page ids are tagged by storage kind so the pool and lock manager can key
//! on them without knowing which file format a page belongs to.

pub mod buffer;
pub mod disk;
pub mod page;

pub use buffer::{BufferPool, PageRef, Permission};
pub use disk::PageFile;
pub use page::{DbPage, HeapPage, HeapPageId, PageId, TableId};
