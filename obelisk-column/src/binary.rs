//! A column of variable-length byte values.

use obelisk_common::Result;

use crate::{
    codec::{read_bytes, read_u64, write_u64},
    offsets::Offsets,
    values::Values,
};

/// A dense column of variable-length byte values.
///
/// Values are stored back to back in a single byte buffer; `offsets` holds
/// `n + 1` entries delimiting each value, so access at an arbitrary index is
/// O(1). Readers must take value lengths from the offsets; the buffer holds
/// no terminators.
#[derive(Debug, Clone, Default)]
pub struct BinaryColumn {
    values: Values,
    offsets: Offsets,
}

impl BinaryColumn {
    /// Creates a new, empty column.
    pub fn new() -> BinaryColumn {
        BinaryColumn {
            values: Values::new(),
            offsets: Offsets::new(),
        }
    }

    /// Returns the number of values in the column.
    #[inline]
    pub fn len(&self) -> usize {
        self.offsets.item_count()
    }

    /// Returns `true` if the column holds no values.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Appends a byte value.
    pub fn push(&mut self, value: &[u8]) {
        self.values.extend_from_slice(value);
        self.offsets.push_length(value.len());
    }

    /// Returns the value at `index`.
    ///
    /// # Panics
    ///
    /// Panics if `index` is out of bounds.
    #[inline]
    pub fn value_at(&self, index: usize) -> &[u8] {
        &self.values.as_bytes()[self.offsets.range_at(index)]
    }

    /// Returns the value at `index` as UTF-8 text.
    ///
    /// # Panics
    ///
    /// Panics if the stored bytes are not valid UTF-8.
    #[inline]
    pub fn str_at(&self, index: usize) -> &str {
        std::str::from_utf8(self.value_at(index)).expect("valid utf-8")
    }

    /// Appends `len` values starting at `start` from another column.
    pub fn extend_from_range(&mut self, source: &BinaryColumn, start: usize, len: usize) {
        if len == 0 {
            return;
        }
        let byte_start = source.offsets.range_at(start).start;
        let byte_end = source.offsets.range_at(start + len - 1).end;
        self.values
            .extend_from_slice(&source.values.as_bytes()[byte_start..byte_end]);
        self.offsets.extend_from_range(&source.offsets, start, len);
    }

    /// Removes the last `count` values.
    pub fn pop_back(&mut self, count: usize) {
        self.truncate(self.len() - count);
    }

    /// Truncates the column to `len` values.
    pub fn truncate(&mut self, len: usize) {
        self.offsets.truncate(len);
        self.values.truncate_bytes(self.offsets.last() as usize);
    }

    /// Reserves capacity for at least `additional` more values, assuming
    /// `value_bytes` bytes of payload per value.
    pub fn reserve(&mut self, additional: usize, value_bytes: usize) {
        self.offsets.reserve(additional);
        self.values.reserve_bytes(additional * value_bytes);
    }

    /// Returns the offsets delimiting the stored values.
    pub fn offsets(&self) -> &Offsets {
        &self.offsets
    }

    /// Returns the raw value bytes, back to back.
    pub fn value_bytes(&self) -> &[u8] {
        self.values.as_bytes()
    }

    /// Returns the in-memory size of the column in bytes.
    pub fn byte_size(&self) -> usize {
        self.values.bytes_len() + self.offsets.byte_size()
    }

    /// Returns the number of bytes the column has allocated.
    pub fn allocated_bytes(&self) -> usize {
        self.values.allocated_bytes() + self.offsets.allocated_bytes()
    }

    /// Drops excess capacity.
    pub fn shrink_to_fit(&mut self) {
        self.values.shrink_to_fit();
        self.offsets.shrink_to_fit();
    }

    /// Appends the blob encoding of the column to `out`.
    pub(crate) fn write_to(&self, out: &mut Vec<u8>) {
        write_u64(out, self.len() as u64);
        self.offsets.write_to(out);
        out.extend_from_slice(self.values.as_bytes());
    }

    /// Reads a blob encoding produced by [`write_to`](BinaryColumn::write_to).
    pub(crate) fn read_from(input: &mut &[u8]) -> Result<BinaryColumn> {
        let len = read_u64(input)? as usize;
        let offsets = Offsets::read_from(input, len)?;
        let byte_len = offsets.last() as usize;
        let bytes = read_bytes(input, byte_len)?;
        let mut values = Values::with_byte_capacity(byte_len);
        values.extend_from_slice(bytes);
        Ok(BinaryColumn { values, offsets })
    }
}
