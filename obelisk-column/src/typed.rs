//! Dense columns for paths with a declared scalar type.

use std::hash::Hasher;

use obelisk_common::{verify_data, Error, Result};

use crate::{
    codec::{read_bytes, read_u64, read_u8, write_u64},
    column::ColumnOps,
    offsets::Offsets,
    presence::Presence,
    value::{Scalar, ScalarKind},
    values::Values,
};

/// A dense, nullable column holding values of one declared scalar kind.
///
/// Fixed-size kinds store their values back to back in the byte buffer;
/// variable-length kinds add offsets. The default row is null, so a typed
/// path that is absent from an inserted object row reads back as
/// [`Scalar::Null`].
#[derive(Debug, Clone)]
pub struct TypedColumn {
    kind: ScalarKind,
    values: Values,
    offsets: Option<Offsets>,
    presence: Presence,
}

impl TypedColumn {
    /// Creates a new, empty column of the given kind.
    pub fn new(kind: ScalarKind) -> TypedColumn {
        TypedColumn {
            kind,
            values: Values::new(),
            offsets: kind.requires_offsets().then(Offsets::new),
            presence: Presence::Trivial(0),
        }
    }

    /// Returns the declared scalar kind.
    #[inline]
    pub fn kind(&self) -> ScalarKind {
        self.kind
    }

    /// Appends a scalar value.
    ///
    /// Nulls are accepted for any kind; a non-null value of the wrong kind
    /// is rejected without mutating the column.
    pub fn push(&mut self, value: &Scalar) -> Result<()> {
        match value.kind() {
            None => {
                self.push_null();
                Ok(())
            }
            Some(kind) if kind == self.kind => {
                match value {
                    Scalar::Bool(v) => self.values.push(*v as u8),
                    Scalar::Int(v) => self.values.push(*v),
                    Scalar::UInt(v) => self.values.push(*v),
                    Scalar::Float(v) => self.values.push(*v),
                    Scalar::String(v) => self.push_var_bytes(v.as_bytes()),
                    Scalar::Binary(v) => self.push_var_bytes(v),
                    Scalar::Null => unreachable!(),
                }
                self.presence.push_non_null();
                Ok(())
            }
            Some(kind) => Err(Error::type_mismatch(
                self.kind.to_string(),
                kind.to_string(),
            )),
        }
    }

    fn push_var_bytes(&mut self, bytes: &[u8]) {
        self.values.extend_from_slice(bytes);
        self.offsets
            .as_mut()
            .expect("variable-length column has offsets")
            .push_length(bytes.len());
    }

    /// Appends a null value.
    pub fn push_null(&mut self) {
        if let Some(offsets) = self.offsets.as_mut() {
            offsets.push_length(0);
        } else {
            let size = self.kind.fixed_size().expect("fixed-size kind");
            self.values.extend_zeroed(size);
        }
        self.presence.push_null();
    }

    /// Returns `true` if the value at `index` is null.
    #[inline]
    pub fn is_null_at(&self, index: usize) -> bool {
        self.presence.is_null(index)
    }

    /// Returns the value at `index`.
    pub fn scalar_at(&self, index: usize) -> Scalar {
        if self.presence.is_null(index) {
            return Scalar::Null;
        }
        match self.kind {
            ScalarKind::Bool => Scalar::Bool(self.values.get::<u8>(index) != 0),
            ScalarKind::Int64 => Scalar::Int(self.values.get::<i64>(index)),
            ScalarKind::UInt64 => Scalar::UInt(self.values.get::<u64>(index)),
            ScalarKind::Float64 => Scalar::Float(self.values.get::<f64>(index)),
            ScalarKind::String => {
                let bytes = self.var_bytes_at(index);
                Scalar::String(
                    std::str::from_utf8(bytes)
                        .expect("stored string is valid utf-8")
                        .to_string(),
                )
            }
            ScalarKind::Binary => Scalar::Binary(self.var_bytes_at(index).to_vec()),
        }
    }

    fn var_bytes_at(&self, index: usize) -> &[u8] {
        let offsets = self.offsets.as_ref().expect("offsets");
        &self.values.as_bytes()[offsets.range_at(index)]
    }

    fn fixed_bytes_at(&self, index: usize, size: usize) -> &[u8] {
        &self.values.as_bytes()[index * size..(index + 1) * size]
    }

    /// Appends the row at `index` of another column of the same kind.
    pub fn append_row_from(&mut self, source: &TypedColumn, index: usize) {
        self.extend_from_column(source, index, 1);
    }

    /// Appends `len` rows starting at `start` from another column.
    ///
    /// # Panics
    ///
    /// Panics if the kinds differ or the range is out of bounds.
    pub fn extend_from_column(&mut self, source: &TypedColumn, start: usize, len: usize) {
        assert_eq!(self.kind, source.kind);
        assert!(start + len <= source.len());
        if len == 0 {
            return;
        }
        if let Some(size) = self.kind.fixed_size() {
            self.values
                .extend_from_slice(&source.values.as_bytes()[start * size..(start + len) * size]);
        } else {
            let src_offsets = source.offsets.as_ref().expect("offsets");
            let byte_start = src_offsets.range_at(start).start;
            let byte_end = src_offsets.range_at(start + len - 1).end;
            self.values
                .extend_from_slice(&source.values.as_bytes()[byte_start..byte_end]);
            self.offsets
                .as_mut()
                .expect("offsets")
                .extend_from_range(src_offsets, start, len);
        }
        self.presence.extend_from_range(&source.presence, start, len);
    }

    /// Returns `true` if this column has the same structure as `other`,
    /// i.e. the same declared kind.
    pub fn structure_equals(&self, other: &TypedColumn) -> bool {
        self.kind == other.kind
    }

    /// Feeds the value at `index` into a hasher.
    pub fn update_hash<H: Hasher>(&self, index: usize, hasher: &mut H) {
        if self.presence.is_null(index) {
            hasher.write_u8(0);
            return;
        }
        hasher.write_u8(1);
        match self.kind.fixed_size() {
            Some(size) => hasher.write(self.fixed_bytes_at(index, size)),
            None => {
                let bytes = self.var_bytes_at(index);
                hasher.write_u64(bytes.len() as u64);
                hasher.write(bytes);
            }
        }
    }

    /// Appends the arena encoding of the value at `index`: a presence byte,
    /// then the raw value for fixed-size kinds or a length-prefixed payload
    /// for variable-length kinds.
    pub fn serialize_at(&self, index: usize, arena: &mut Vec<u8>) {
        if self.presence.is_null(index) {
            arena.push(0);
            return;
        }
        arena.push(1);
        match self.kind.fixed_size() {
            Some(size) => arena.extend_from_slice(self.fixed_bytes_at(index, size)),
            None => {
                let bytes = self.var_bytes_at(index);
                write_u64(arena, bytes.len() as u64);
                arena.extend_from_slice(bytes);
            }
        }
    }

    /// Decodes one arena-encoded value, appends it, and returns the rest of
    /// the input.
    pub fn deserialize_and_insert<'a>(&mut self, mut input: &'a [u8]) -> Result<&'a [u8]> {
        let flag = read_u8(&mut input)?;
        if flag == 0 {
            self.push_null();
            return Ok(input);
        }
        match self.kind.fixed_size() {
            Some(size) => {
                let bytes = read_bytes(&mut input, size)?;
                self.values.extend_from_slice(bytes);
            }
            None => {
                let len = read_u64(&mut input)? as usize;
                let bytes = read_bytes(&mut input, len)?;
                if self.kind == ScalarKind::String {
                    verify_data!(input, std::str::from_utf8(bytes).is_ok());
                }
                self.values.extend_from_slice(bytes);
                self.offsets.as_mut().expect("offsets").push_length(len);
            }
        }
        self.presence.push_non_null();
        Ok(input)
    }

    /// Walks one arena-encoded value without materializing it and returns
    /// the rest of the input.
    pub fn skip_serialized<'a>(&self, mut input: &'a [u8]) -> Result<&'a [u8]> {
        let flag = read_u8(&mut input)?;
        if flag == 0 {
            return Ok(input);
        }
        match self.kind.fixed_size() {
            Some(size) => {
                read_bytes(&mut input, size)?;
            }
            None => {
                let len = read_u64(&mut input)? as usize;
                read_bytes(&mut input, len)?;
            }
        }
        Ok(input)
    }

    /// Appends the column blob encoding to `out`, used by the compression
    /// wrapper.
    pub(crate) fn write_to(&self, out: &mut Vec<u8>) {
        out.push(self.kind.to_tag());
        write_u64(out, self.len() as u64);
        self.presence.write_to(out);
        if let Some(offsets) = self.offsets.as_ref() {
            offsets.write_to(out);
        }
        write_u64(out, self.values.bytes_len() as u64);
        out.extend_from_slice(self.values.as_bytes());
    }

    /// Reads a column blob produced by [`write_to`](TypedColumn::write_to).
    pub(crate) fn read_from(input: &mut &[u8]) -> Result<TypedColumn> {
        let tag = read_u8(input)?;
        let kind = ScalarKind::from_tag(tag)
            .ok_or_else(|| Error::invalid_format("typed column", format!("bad kind tag {tag}")))?;
        let len = read_u64(input)? as usize;
        let presence = Presence::read_from(input, len)?;
        let offsets = if kind.requires_offsets() {
            Some(Offsets::read_from(input, len)?)
        } else {
            None
        };
        let byte_len = read_u64(input)? as usize;
        let bytes = read_bytes(input, byte_len)?;
        let mut values = Values::with_byte_capacity(byte_len);
        values.extend_from_slice(bytes);
        let column = TypedColumn {
            kind,
            values,
            offsets,
            presence,
        };
        verify_data!(typed_column, column.value_bytes_coherent());
        Ok(column)
    }

    fn value_bytes_coherent(&self) -> bool {
        match (self.kind.fixed_size(), self.offsets.as_ref()) {
            (Some(size), None) => self.values.bytes_len() == self.len() * size,
            (None, Some(offsets)) => {
                offsets.item_count() == self.len()
                    && offsets.last() as usize == self.values.bytes_len()
            }
            _ => false,
        }
    }
}

impl ColumnOps for TypedColumn {
    fn len(&self) -> usize {
        self.presence.len()
    }

    fn insert_default(&mut self) {
        self.push_null();
    }

    fn insert_many_defaults(&mut self, count: usize) {
        if let Some(offsets) = self.offsets.as_mut() {
            offsets.push_empty(count);
        } else {
            let size = self.kind.fixed_size().expect("fixed-size kind");
            self.values.extend_zeroed(size * count);
        }
        self.presence.extend_with_nulls(count);
    }

    fn pop_back(&mut self, count: usize) {
        let new_len = self.len() - count;
        if let Some(offsets) = self.offsets.as_mut() {
            offsets.truncate(new_len);
            self.values.truncate_bytes(offsets.last() as usize);
        } else {
            let size = self.kind.fixed_size().expect("fixed-size kind");
            self.values.truncate_bytes(new_len * size);
        }
        self.presence.truncate(new_len);
    }

    fn is_default_at(&self, index: usize) -> bool {
        self.presence.is_null(index)
    }

    fn reserve(&mut self, additional: usize) {
        let elem = self.kind.fixed_size().unwrap_or(8);
        self.values.reserve_bytes(additional * elem);
        if let Some(offsets) = self.offsets.as_mut() {
            offsets.reserve(additional);
        }
    }

    fn byte_size(&self) -> usize {
        self.values.bytes_len()
            + self.offsets.as_ref().map_or(0, Offsets::byte_size)
            + self.presence.byte_size()
    }

    fn allocated_bytes(&self) -> usize {
        self.values.allocated_bytes() + self.offsets.as_ref().map_or(0, Offsets::allocated_bytes)
    }

    fn clone_empty(&self) -> TypedColumn {
        TypedColumn::new(self.kind)
    }

    fn gather_padded(&self, rows: &[Option<usize>]) -> TypedColumn {
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
        self.values.shrink_to_fit();
        if let Some(offsets) = self.offsets.as_mut() {
            offsets.shrink_to_fit();
        }
    }
}
