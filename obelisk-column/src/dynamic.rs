//! Self-describing columns for paths discovered at ingest time.

use std::hash::Hasher;

use ahash::AHashMap;
use obelisk_common::{verify_arg, verify_data, Error, Result};

use crate::{
    binary::BinaryColumn,
    codec::{read_u64, read_u8, write_u64, ValueCodec},
    column::ColumnOps,
    presence::Presence,
    value::{Scalar, ScalarKind},
};

/// A column of heterogeneous values for one dynamic path.
///
/// Every value is stored in its canonical [`ValueCodec`] encoding, one entry
/// per row, so the column is self-describing: a reader needs no declared
/// type to interpret a row. Nulls are stored as the one-byte null encoding
/// and additionally tracked in the presence, which makes the default row
/// (null) cheap to test.
///
/// The column keeps an advisory tally of the distinct non-null value kinds
/// it has seen, capped at `max_types`. The tally never affects what can be
/// stored; it only drives merge-time structure convergence.
#[derive(Debug, Clone)]
pub struct DynamicColumn {
    data: BinaryColumn,
    presence: Presence,
    types: Vec<(ScalarKind, usize)>,
    max_types: usize,
}

impl DynamicColumn {
    /// Creates a new, empty column with the given type-tally cap.
    pub fn new(max_types: usize) -> DynamicColumn {
        DynamicColumn {
            data: BinaryColumn::new(),
            presence: Presence::Trivial(0),
            types: Vec::new(),
            max_types,
        }
    }

    /// Returns the type-tally cap.
    #[inline]
    pub fn max_types(&self) -> usize {
        self.max_types
    }

    /// Returns the observed non-null value kinds with their counts.
    pub fn types(&self) -> &[(ScalarKind, usize)] {
        &self.types
    }

    /// Appends a scalar value of any kind.
    pub fn push(&mut self, value: &Scalar) {
        let mut buf = Vec::with_capacity(16);
        ValueCodec::encode(value, &mut buf);
        self.data.push(&buf);
        match value.kind() {
            Some(kind) => {
                self.presence.push_non_null();
                self.note_type(kind, 1);
            }
            None => self.presence.push_null(),
        }
    }

    /// Appends a null value.
    pub fn push_null(&mut self) {
        self.push(&Scalar::Null);
    }

    /// Returns the canonical encoding of the value at `index`.
    #[inline]
    pub fn encoded_at(&self, index: usize) -> &[u8] {
        self.data.value_at(index)
    }

    /// Returns the value at `index`.
    pub fn scalar_at(&self, index: usize) -> Scalar {
        let mut input = self.data.value_at(index);
        ValueCodec::decode(&mut input).expect("well-formed stored encoding")
    }

    /// Returns `true` if the value at `index` is null.
    #[inline]
    pub fn is_null_at(&self, index: usize) -> bool {
        self.presence.is_null(index)
    }

    /// Returns the number of default (null) rows.
    pub fn default_row_count(&self) -> usize {
        self.presence.count_nulls()
    }

    /// Appends the row at `index` of another column.
    pub fn append_row_from(&mut self, source: &DynamicColumn, index: usize) {
        self.extend_from_column(source, index, 1);
    }

    /// Appends `len` rows starting at `start` from another column.
    pub fn extend_from_column(&mut self, source: &DynamicColumn, start: usize, len: usize) {
        for row in start..start + len {
            if !source.presence.is_null(row) {
                if let Some(kind) = ScalarKind::from_tag(source.data.value_at(row)[0]) {
                    self.note_type(kind, 1);
                }
            }
        }
        self.data.extend_from_range(&source.data, start, len);
        self.presence.extend_from_range(&source.presence, start, len);
    }

    /// Returns `true` if this column has the same structure as `other`,
    /// i.e. the same type-tally cap.
    pub fn structure_equals(&self, other: &DynamicColumn) -> bool {
        self.max_types == other.max_types
    }

    /// Rebuilds the advisory type set from several source columns.
    ///
    /// The per-kind non-null counts of all sources are summed; if more
    /// distinct kinds were seen than `max_types`, the most frequent ones
    /// win, ties broken by kind order. Must be called on an empty column.
    pub fn take_dynamic_structure_from_source_columns(
        &mut self,
        sources: &[&DynamicColumn],
    ) -> Result<()> {
        verify_arg!(self, self.is_empty());
        let mut tally: AHashMap<ScalarKind, usize> = AHashMap::new();
        for source in sources {
            for &(kind, count) in &source.types {
                *tally.entry(kind).or_insert(0) += count;
            }
        }
        let mut ranked: Vec<(ScalarKind, usize)> = tally.into_iter().collect();
        ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        ranked.truncate(self.max_types);
        self.types = ranked;
        Ok(())
    }

    /// Feeds the value at `index` into a hasher.
    pub fn update_hash<H: Hasher>(&self, index: usize, hasher: &mut H) {
        let bytes = self.data.value_at(index);
        hasher.write_u64(bytes.len() as u64);
        hasher.write(bytes);
    }

    fn note_type(&mut self, kind: ScalarKind, count: usize) {
        if let Some(entry) = self.types.iter_mut().find(|(k, _)| *k == kind) {
            entry.1 += count;
        } else if self.types.len() < self.max_types {
            self.types.push((kind, count));
        }
    }

    /// Appends the blob encoding of the column to `out`, used by the
    /// compression wrapper.
    pub(crate) fn write_to(&self, out: &mut Vec<u8>) {
        write_u64(out, self.max_types as u64);
        write_u64(out, self.len() as u64);
        self.presence.write_to(out);
        self.data.write_to(out);
        write_u64(out, self.types.len() as u64);
        for &(kind, count) in &self.types {
            out.push(kind.to_tag());
            write_u64(out, count as u64);
        }
    }

    /// Reads a column blob produced by [`write_to`](DynamicColumn::write_to).
    pub(crate) fn read_from(input: &mut &[u8]) -> Result<DynamicColumn> {
        let max_types = read_u64(input)? as usize;
        let len = read_u64(input)? as usize;
        let presence = Presence::read_from(input, len)?;
        let data = BinaryColumn::read_from(input)?;
        verify_data!(dynamic_column, data.len() == len);
        let type_count = read_u64(input)? as usize;
        let mut types = Vec::with_capacity(type_count);
        for _ in 0..type_count {
            let tag = read_u8(input)?;
            let kind = ScalarKind::from_tag(tag).ok_or_else(|| {
                Error::invalid_format("dynamic column", format!("bad kind tag {tag}"))
            })?;
            let count = read_u64(input)? as usize;
            types.push((kind, count));
        }
        Ok(DynamicColumn {
            data,
            presence,
            types,
            max_types,
        })
    }
}

impl ColumnOps for DynamicColumn {
    fn len(&self) -> usize {
        self.presence.len()
    }

    fn insert_default(&mut self) {
        self.push_null();
    }

    fn insert_many_defaults(&mut self, count: usize) {
        for _ in 0..count {
            self.data.push(ValueCodec::encoded_null());
        }
        self.presence.extend_with_nulls(count);
    }

    fn pop_back(&mut self, count: usize) {
        let new_len = self.len() - count;
        self.data.truncate(new_len);
        self.presence.truncate(new_len);
    }

    fn is_default_at(&self, index: usize) -> bool {
        self.presence.is_null(index)
    }

    fn reserve(&mut self, additional: usize) {
        self.data.reserve(additional, 9);
    }

    fn byte_size(&self) -> usize {
        self.data.byte_size() + self.presence.byte_size()
    }

    fn allocated_bytes(&self) -> usize {
        self.data.allocated_bytes()
    }

    fn clone_empty(&self) -> DynamicColumn {
        DynamicColumn::new(self.max_types)
    }

    fn gather_padded(&self, rows: &[Option<usize>]) -> DynamicColumn {
        let mut result = self.clone_empty();
        result.reserve(rows.len());
        for row in rows {
            match row {
                Some(row) => result.append_row_from(self, *row),
                None => result.push_null(),
            }
        }
        result
    }

    fn shrink_to_fit(&mut self) {
        self.data.shrink_to_fit();
    }
}
