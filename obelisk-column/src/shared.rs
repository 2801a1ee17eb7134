//! The per-row overflow store for paths beyond the dynamic-path cap.

use std::hash::Hasher;
use std::ops::Range;

use obelisk_common::{verify_data, Result};

use crate::{
    binary::BinaryColumn,
    codec::{read_u64, write_u64, ValueCodec},
    column::ColumnOps,
    dynamic::DynamicColumn,
    offsets::Offsets,
};

/// A ragged per-row store of `(path, value)` pairs.
///
/// Logically a sequence of sorted maps from path to encoded value bytes.
/// The layout is an array column of tuples of two string columns: all
/// entries live flattened in the `paths` and `values` columns, and
/// `offsets` delimits the entries of each row. Within a row the paths are
/// strictly sorted by byte order and unique, which makes
/// [`lower_bound`](SharedDataStore::lower_bound) an O(log k) binary search
/// over the paths column. Values are never the encoded null: writers drop
/// nulls before they reach this store.
#[derive(Debug, Clone, Default)]
pub struct SharedDataStore {
    paths: BinaryColumn,
    values: BinaryColumn,
    offsets: Offsets,
}

impl SharedDataStore {
    /// Creates a new, empty store.
    pub fn new() -> SharedDataStore {
        SharedDataStore {
            paths: BinaryColumn::new(),
            values: BinaryColumn::new(),
            offsets: Offsets::new(),
        }
    }

    /// Returns the total number of entries across all rows.
    #[inline]
    pub fn entry_count(&self) -> usize {
        self.paths.len()
    }

    /// Returns the entry index range of the given row.
    #[inline]
    pub fn row_range(&self, row: usize) -> Range<usize> {
        self.offsets.range_at(row)
    }

    /// Returns the path of the entry at the flat index `index`.
    #[inline]
    pub fn path_at(&self, index: usize) -> &str {
        self.paths.str_at(index)
    }

    /// Returns the encoded value of the entry at the flat index `index`.
    #[inline]
    pub fn value_at(&self, index: usize) -> &[u8] {
        self.values.value_at(index)
    }

    /// Iterates over the `(path, value)` entries of a row in sorted order.
    pub fn row_entries(&self, row: usize) -> impl Iterator<Item = (&str, &[u8])> {
        self.row_range(row)
            .map(move |i| (self.path_at(i), self.value_at(i)))
    }

    /// Appends one row from already-sorted, null-free entries.
    pub fn append_row<'a>(&mut self, entries: impl IntoIterator<Item = (&'a str, &'a [u8])>) {
        let start = self.entry_count();
        for (path, value) in entries {
            debug_assert!(
                self.entry_count() == start || self.path_at(self.entry_count() - 1) < path,
                "shared-data entries must arrive strictly sorted"
            );
            self.push_entry(path, value);
        }
        self.finish_row();
    }

    /// Appends one row copied verbatim from another store.
    pub fn append_row_from(&mut self, source: &SharedDataStore, row: usize) {
        let range = source.row_range(row);
        let len = range.len();
        self.paths.extend_from_range(&source.paths, range.start, len);
        self.values
            .extend_from_range(&source.values, range.start, len);
        self.finish_row();
    }

    /// Appends `len` rows starting at `start`, copied verbatim.
    pub fn append_range_from(&mut self, source: &SharedDataStore, start: usize, len: usize) {
        if len == 0 {
            return;
        }
        let first = source.row_range(start).start;
        let last = source.row_range(start + len - 1).end;
        self.paths.extend_from_range(&source.paths, first, last - first);
        self.values
            .extend_from_range(&source.values, first, last - first);
        self.offsets.extend_from_range(&source.offsets, start, len);
    }

    /// Appends one entry to the currently open row.
    ///
    /// The row stays open until [`finish_row`](SharedDataStore::finish_row)
    /// seals it by emitting the row offset.
    pub(crate) fn push_entry(&mut self, path: &str, value: &[u8]) {
        self.paths.push(path.as_bytes());
        self.values.push(value);
    }

    /// Seals the currently open row, even if no entries were pushed.
    pub(crate) fn finish_row(&mut self) {
        self.offsets.push_offset(self.entry_count() as u64);
    }

    /// Drops entries of the currently open row past `entry_count`, used by
    /// the insert rollback.
    pub(crate) fn truncate_entries(&mut self, entry_count: usize) {
        self.paths.truncate(entry_count);
        self.values.truncate(entry_count);
    }

    /// Returns the first entry index within `row` whose path is >= `path`.
    ///
    /// Runs a binary search directly over the paths column, relying on the
    /// per-row sort order.
    pub fn lower_bound(&self, row: usize, path: &str) -> usize {
        let Range { start, end } = self.row_range(row);
        let mut lo = start;
        let mut hi = end;
        while lo < hi {
            let mid = lo + (hi - lo) / 2;
            if self.paths.value_at(mid) < path.as_bytes() {
                lo = mid + 1;
            } else {
                hi = mid;
            }
        }
        lo
    }

    /// Returns the flat index of `path` within `row`, if present.
    pub fn find_in_row(&self, row: usize, path: &str) -> Option<usize> {
        let index = self.lower_bound(row, path);
        (index != self.row_range(row).end && self.path_at(index) == path).then_some(index)
    }

    /// Returns the row offsets.
    pub fn offsets(&self) -> &Offsets {
        &self.offsets
    }

    /// Returns the flattened paths and values columns.
    pub fn paths_and_values(&self) -> (&BinaryColumn, &BinaryColumn) {
        (&self.paths, &self.values)
    }

    /// Extracts the values of `path` across the row range `start..end`,
    /// appending one value per row to `target`: the decoded entry where the
    /// row carries the path, a default otherwise.
    pub fn fill_path_column(
        &self,
        path: &str,
        start: usize,
        end: usize,
        target: &mut DynamicColumn,
    ) -> Result<()> {
        if start == end {
            return Ok(());
        }
        let first = self.row_range(start).start;
        let last = self.row_range(end - 1).end;
        if first == last {
            target.insert_many_defaults(end - start);
            return Ok(());
        }
        for row in start..end {
            match self.find_in_row(row, path) {
                Some(index) => {
                    let mut input = self.value_at(index);
                    ValueCodec::decode_into(target, &mut input)?;
                }
                None => target.insert_default(),
            }
        }
        Ok(())
    }

    /// Feeds the entries of a row into a hasher.
    pub fn update_hash<H: Hasher>(&self, row: usize, hasher: &mut H) {
        for (path, value) in self.row_entries(row) {
            hasher.write_u64(path.len() as u64);
            hasher.write(path.as_bytes());
            hasher.write_u64(value.len() as u64);
            hasher.write(value);
        }
    }

    /// Appends the blob encoding of the store to `out`, used by the
    /// compression wrapper.
    pub(crate) fn write_to(&self, out: &mut Vec<u8>) {
        write_u64(out, self.len() as u64);
        self.offsets.write_to(out);
        self.paths.write_to(out);
        self.values.write_to(out);
    }

    /// Reads a blob produced by [`write_to`](SharedDataStore::write_to).
    pub(crate) fn read_from(input: &mut &[u8]) -> Result<SharedDataStore> {
        let rows = read_u64(input)? as usize;
        let offsets = Offsets::read_from(input, rows)?;
        let paths = BinaryColumn::read_from(input)?;
        let values = BinaryColumn::read_from(input)?;
        verify_data!(shared_data, paths.len() == values.len());
        verify_data!(shared_data, offsets.last() as usize == paths.len());
        Ok(SharedDataStore {
            paths,
            values,
            offsets,
        })
    }
}

impl ColumnOps for SharedDataStore {
    fn len(&self) -> usize {
        self.offsets.item_count()
    }

    fn insert_default(&mut self) {
        self.offsets.push_length(0);
    }

    fn insert_many_defaults(&mut self, count: usize) {
        self.offsets.push_empty(count);
    }

    fn pop_back(&mut self, count: usize) {
        let new_rows = self.len() - count;
        self.offsets.truncate(new_rows);
        let entries = self.offsets.last() as usize;
        self.paths.truncate(entries);
        self.values.truncate(entries);
    }

    fn is_default_at(&self, index: usize) -> bool {
        self.row_range(index).is_empty()
    }

    fn reserve(&mut self, additional: usize) {
        self.offsets.reserve(additional);
    }

    fn byte_size(&self) -> usize {
        self.paths.byte_size() + self.values.byte_size() + self.offsets.byte_size()
    }

    fn allocated_bytes(&self) -> usize {
        self.paths.allocated_bytes() + self.values.allocated_bytes() + self.offsets.allocated_bytes()
    }

    fn clone_empty(&self) -> SharedDataStore {
        SharedDataStore::new()
    }

    fn gather_padded(&self, rows: &[Option<usize>]) -> SharedDataStore {
        let mut result = SharedDataStore::new();
        result.reserve(rows.len());
        for row in rows {
            match row {
                Some(row) => result.append_row_from(self, *row),
                None => result.insert_default(),
            }
        }
        result
    }

    fn shrink_to_fit(&mut self) {
        self.paths.shrink_to_fit();
        self.values.shrink_to_fit();
        self.offsets.shrink_to_fit();
    }
}
