//! Fixed-slot heap page.
//!
//! Layout of a page of `page_size` bytes for a schema whose tuples are
//! `tuple_size` bytes wide:
//!
//! ```text
//! +----------------+--------+--------+-----+------------+---------+
//! | presence bitmap| slot 0 | slot 1 | ... | slot N - 1 | padding |
//! +----------------+--------+--------+-----+------------+---------+
//! ```
//!
//! `N = floor(page_size * 8 / (tuple_size * 8 + 1))`; the bitmap takes
//! `ceil(N / 8)` bytes and bit `i` (least significant bit first) marks slot `i`
//! as occupied. Fresh pages are all zeroes and a deleted slot is zeroed again;
//! bytes of slots a page never touched are carried through unchanged.

use crate::access::schema::Schema;
use crate::access::tuple::{RecordId, Tuple};
use crate::error::{DbError, DbResult};
use crate::storage::page::{HeapPageId, PageId};
use crate::transaction::TransactionId;
use bytes::{Bytes, BytesMut};
use std::io::Cursor;
use std::sync::Arc;

#[derive(Debug, Clone)]
pub struct HeapPage {
    pid: HeapPageId,
    schema: Arc<Schema>,
    image: BytesMut,
    header_len: usize,
    tuples: Vec<Option<Tuple>>,
    dirtier: Option<TransactionId>,
    before_image: Bytes,
}

impl HeapPage {
    /// Decode a page from exactly one page worth of bytes.
    pub fn new(pid: HeapPageId, data: &[u8], schema: Arc<Schema>) -> DbResult<Self> {
        let page_size = data.len();
        let num_slots = Self::num_slots_for(&schema, page_size);
        if num_slots == 0 {
            return Err(DbError::InvalidArgument(format!(
                "a {} byte page cannot hold a {} byte tuple",
                page_size,
                schema.byte_size()
            )));
        }

        let header_len = Self::header_len(num_slots);
        let tuple_size = schema.byte_size();

        let mut tuples = Vec::with_capacity(num_slots);
        for slot in 0..num_slots {
            if !bit_is_set(data, slot) {
                tuples.push(None);
                continue;
            }

            let start = header_len + slot * tuple_size;
            let mut cursor = Cursor::new(&data[start..start + tuple_size]);
            let mut tuple = Tuple::parse(schema.clone(), &mut cursor).map_err(|e| {
                DbError::CorruptPage {
                    page_id: PageId::Heap(pid),
                    reason: format!("slot {}: {}", slot, e),
                }
            })?;
            tuple.set_record_id(Some(RecordId::new(PageId::Heap(pid), slot)));
            tuples.push(Some(tuple));
        }

        Ok(Self {
            pid,
            schema,
            image: BytesMut::from(data),
            header_len,
            tuples,
            dirtier: None,
            before_image: Bytes::copy_from_slice(data),
        })
    }

    /// Number of tuples of `schema` that fit on a page of `page_size` bytes.
    pub fn num_slots_for(schema: &Schema, page_size: usize) -> usize {
        // Every slot costs its tuple bytes plus one bitmap bit.
        (page_size * 8) / (schema.byte_size() * 8 + 1)
    }

    /// Bytes used by the presence bitmap for `num_slots` slots.
    pub fn header_len(num_slots: usize) -> usize {
        num_slots.div_ceil(8)
    }

    /// Image of a page with no tuples.
    pub fn empty_page_data(page_size: usize) -> Vec<u8> {
        vec![0u8; page_size]
    }

    pub fn id(&self) -> HeapPageId {
        self.pid
    }

    pub fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    pub fn num_slots(&self) -> usize {
        self.tuples.len()
    }

    pub fn is_slot_used(&self, slot: usize) -> bool {
        slot < self.num_slots() && bit_is_set(&self.image, slot)
    }

    pub fn num_empty_slots(&self) -> usize {
        (0..self.num_slots())
            .filter(|&slot| !self.is_slot_used(slot))
            .count()
    }

    /// Encode back into exactly one page of bytes.
    pub fn page_data(&self) -> Bytes {
        Bytes::copy_from_slice(&self.image)
    }

    fn slot_bytes(&mut self, slot: usize) -> &mut [u8] {
        let tuple_size = self.schema.byte_size();
        let start = self.header_len + slot * tuple_size;
        &mut self.image[start..start + tuple_size]
    }

    /// Store `tuple` in the lowest free slot and stamp its record id.
    pub fn insert_tuple(&mut self, mut tuple: Tuple) -> DbResult<RecordId> {
        if **tuple.schema() != *self.schema {
            return Err(DbError::InvalidArgument(format!(
                "tuple schema [{}] does not match page schema [{}]",
                tuple.schema(),
                self.schema
            )));
        }

        let slot = (0..self.num_slots())
            .find(|&slot| !self.is_slot_used(slot))
            .ok_or(DbError::PageFull(PageId::Heap(self.pid)))?;

        let mut encoded = Vec::with_capacity(self.schema.byte_size());
        tuple.serialize(&mut encoded);
        self.slot_bytes(slot).copy_from_slice(&encoded);

        let record_id = RecordId::new(PageId::Heap(self.pid), slot);
        tuple.set_record_id(Some(record_id));
        self.mark_slot_used(slot, true);
        self.tuples[slot] = Some(tuple);
        Ok(record_id)
    }

    /// Clear the slot addressed by `tuple`'s record id.
    pub fn delete_tuple(&mut self, tuple: &Tuple) -> DbResult<()> {
        let record_id = tuple.record_id().ok_or_else(|| {
            DbError::InvalidArgument("tuple has no record id".to_string())
        })?;
        if record_id.page_id != PageId::Heap(self.pid) {
            return Err(DbError::PageNotFound(record_id.page_id));
        }
        if !self.is_slot_used(record_id.slot) {
            return Err(DbError::TupleNotFound(record_id));
        }

        self.mark_slot_used(record_id.slot, false);
        self.slot_bytes(record_id.slot).fill(0);
        self.tuples[record_id.slot] = None;
        Ok(())
    }

    /// Present tuples in ascending slot order.
    pub fn iter(&self) -> impl Iterator<Item = &Tuple> + '_ {
        self.tuples
            .iter()
            .enumerate()
            .filter(|(slot, _)| self.is_slot_used(*slot))
            .filter_map(|(_, tuple)| tuple.as_ref())
    }

    pub fn mark_dirty(&mut self, tid: Option<TransactionId>) {
        self.dirtier = tid;
    }

    pub fn is_dirty(&self) -> Option<TransactionId> {
        self.dirtier
    }

    pub fn before_image(&self) -> DbResult<HeapPage> {
        HeapPage::new(self.pid, &self.before_image, self.schema.clone())
    }

    pub fn set_before_image(&mut self) {
        self.before_image = self.page_data();
    }

    fn mark_slot_used(&mut self, slot: usize, used: bool) {
        let mask = 1u8 << (slot % 8);
        if used {
            self.image[slot / 8] |= mask;
        } else {
            self.image[slot / 8] &= !mask;
        }
    }
}

fn bit_is_set(header: &[u8], slot: usize) -> bool {
    (header[slot / 8] >> (slot % 8)) & 1 == 1
}
