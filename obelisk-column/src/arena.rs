//! Per-row self-describing serialization for shuffle buffers.
//!
//! One row serializes to:
//!
//! ```text
//! row := u64 num_paths
//!        typed_entry*      (typed path iteration order)
//!        dynamic_entry*    (dynamic path iteration order)
//!        shared_entry*     (sorted order from the shared-data row)
//! typed_entry   := u64 path_len, path, <typed column encoding>
//! dynamic_entry := u64 path_len, path, u64 value_len, value encoding
//! shared_entry  := u64 path_len, path, u64 value_len, value bytes
//! ```
//!
//! All widths are native-endian `u64`. The arena buffer is caller-owned and
//! may reallocate while a row is written, so the serializer returns byte
//! offsets into the buffer rather than references.

use std::ops::Range;

use obelisk_common::{Error, Result};

use crate::{
    codec::{read_bytes, read_u64, write_u64, ValueCodec},
    object::ObjectColumn,
};

impl ObjectColumn {
    /// Appends the self-describing encoding of the row at `index` to the
    /// arena and returns the byte range covering it.
    pub fn serialize_value_into_arena(&self, index: usize, arena: &mut Vec<u8>) -> Range<usize> {
        let begin = arena.len();
        let row_range = self.shared_data.row_range(index);
        let num_paths = self.typed_paths.len() + self.dynamic_paths.len() + row_range.len();
        write_u64(arena, num_paths as u64);

        for (path, column) in self.typed_paths.iter() {
            write_u64(arena, path.len() as u64);
            arena.extend_from_slice(path.as_bytes());
            column.serialize_at(index, arena);
        }
        for (path, column) in self.dynamic_paths.iter() {
            write_path_and_value(arena, path, column.encoded_at(index));
        }
        for i in row_range {
            write_path_and_value(
                arena,
                self.shared_data.path_at(i),
                self.shared_data.value_at(i),
            );
        }
        begin..arena.len()
    }

    /// Decodes one serialized row, appends it, and returns the rest of the
    /// input.
    ///
    /// Typed paths deserialize through their own column codec. Other
    /// entries decode into an existing dynamic column, a newly created one
    /// while under the cap, or are deferred, sorted and appended as the
    /// shared-data row. Null values are still inserted into dynamic columns
    /// but dropped from the shared-data spill.
    pub fn deserialize_and_insert_from_arena<'a>(&mut self, mut input: &'a [u8]) -> Result<&'a [u8]> {
        let prev_size = self.size();
        let num_paths = read_u64(&mut input)?;
        let mut deferred: Vec<(&str, &[u8])> = Vec::new();
        for _ in 0..num_paths {
            let path = read_path(&mut input)?;
            if self.typed_paths.contains(path) {
                let column = self.typed_paths.get_mut(path).expect("path just checked");
                input = column.deserialize_and_insert(input)?;
                continue;
            }
            let value_len = read_u64(&mut input)? as usize;
            let value = read_bytes(&mut input, value_len)?;
            if let Some(column) = self.dynamic_paths.get_mut(path) {
                let mut value_input = value;
                ValueCodec::decode_into(column, &mut value_input)?;
            } else if let Some(column) = self.add_new_dynamic_path(path) {
                let mut value_input = value;
                ValueCodec::decode_into(column, &mut value_input)?;
            } else {
                // Validate up front so shared data only ever stores
                // well-formed encodings.
                let mut probe = value;
                ValueCodec::decode(&mut probe)?;
                if !ValueCodec::is_encoded_null(value) {
                    deferred.push((path, value));
                }
            }
        }

        deferred.sort_unstable_by(|a, b| a.0.cmp(b.0));
        self.shared_data
            .append_row(deferred.iter().map(|&(path, value)| (path, value)));
        self.fill_remaining_with_defaults(prev_size);
        Ok(input)
    }

    /// Walks one serialized row without materializing it and returns the
    /// rest of the input.
    pub fn skip_serialized_in_arena<'a>(&self, mut input: &'a [u8]) -> Result<&'a [u8]> {
        let num_paths = read_u64(&mut input)?;
        for _ in 0..num_paths {
            let path = read_path(&mut input)?;
            if let Some(column) = self.typed_paths.get(path) {
                input = column.skip_serialized(input)?;
            } else {
                let value_len = read_u64(&mut input)? as usize;
                read_bytes(&mut input, value_len)?;
            }
        }
        Ok(input)
    }
}

fn write_path_and_value(arena: &mut Vec<u8>, path: &str, value: &[u8]) {
    write_u64(arena, path.len() as u64);
    arena.extend_from_slice(path.as_bytes());
    write_u64(arena, value.len() as u64);
    arena.extend_from_slice(value);
}

fn read_path<'a>(input: &mut &'a [u8]) -> Result<&'a str> {
    let path_len = read_u64(input)? as usize;
    let path_bytes = read_bytes(input, path_len)?;
    std::str::from_utf8(path_bytes)
        .map_err(|_| Error::invalid_format("serialized row", "path is not valid utf-8"))
}
