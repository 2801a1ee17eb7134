//! A lazy compression wrapper around an object column.

use obelisk_common::{verify_data, Error, Result};

use crate::{
    dynamic::DynamicColumn,
    object::{ObjectColumn, Statistics},
    paths::PathTable,
    shared::SharedDataStore,
    typed::TypedColumn,
};

/// One lz4-compressed sub-column blob with its size prepended.
#[derive(Debug, Clone)]
struct CompressedBlob(Vec<u8>);

impl CompressedBlob {
    fn compress(raw: &[u8]) -> Result<CompressedBlob> {
        let bytes = lz4::block::compress(raw, None, true)
            .map_err(|e| Error::io("lz4 compression", e))?;
        Ok(CompressedBlob(bytes))
    }

    fn byte_size(&self) -> usize {
        self.0.len()
    }

    fn decompress(&self) -> Result<Vec<u8>> {
        lz4::block::decompress(&self.0, None).map_err(|e| Error::io("lz4 decompression", e))
    }
}

/// The compressed form of an [`ObjectColumn`].
///
/// Holds every sub-column as a compressed blob together with the structure
/// caps and statistics. Until [`decompress`](CompressedObjectColumn::decompress)
/// is called, only the row count and compressed byte size are observable.
#[derive(Debug, Clone)]
pub struct CompressedObjectColumn {
    typed_paths: Vec<(String, CompressedBlob)>,
    dynamic_paths: Vec<(String, CompressedBlob)>,
    shared_data: CompressedBlob,
    row_count: usize,
    byte_size: usize,
    max_dynamic_paths: usize,
    max_dynamic_types: usize,
    statistics: Statistics,
}

impl ObjectColumn {
    /// Compresses every sub-column and returns the deferred handle.
    pub fn compress(&self) -> Result<CompressedObjectColumn> {
        let mut byte_size = 0;
        let mut blob = Vec::new();

        let mut typed_paths = Vec::with_capacity(self.typed_paths.len());
        for (path, column) in self.typed_paths.iter() {
            blob.clear();
            column.write_to(&mut blob);
            let compressed = CompressedBlob::compress(&blob)?;
            byte_size += compressed.byte_size();
            typed_paths.push((path.to_string(), compressed));
        }

        let mut dynamic_paths = Vec::with_capacity(self.dynamic_paths.len());
        for (path, column) in self.dynamic_paths.iter() {
            blob.clear();
            column.write_to(&mut blob);
            let compressed = CompressedBlob::compress(&blob)?;
            byte_size += compressed.byte_size();
            dynamic_paths.push((path.to_string(), compressed));
        }

        blob.clear();
        self.shared_data.write_to(&mut blob);
        let shared_data = CompressedBlob::compress(&blob)?;
        byte_size += shared_data.byte_size();

        Ok(CompressedObjectColumn {
            typed_paths,
            dynamic_paths,
            shared_data,
            row_count: self.size(),
            byte_size,
            max_dynamic_paths: self.max_dynamic_paths,
            max_dynamic_types: self.max_dynamic_types,
            statistics: self.statistics.clone(),
        })
    }
}

impl CompressedObjectColumn {
    /// Returns the number of rows in the compressed column.
    pub fn row_count(&self) -> usize {
        self.row_count
    }

    /// Returns the total compressed size in bytes.
    pub fn byte_size(&self) -> usize {
        self.byte_size
    }

    /// Rebuilds the full object column from the compressed blobs.
    pub fn decompress(&self) -> Result<ObjectColumn> {
        let mut typed_paths = PathTable::with_capacity(self.typed_paths.len());
        for (path, blob) in &self.typed_paths {
            let raw = blob.decompress()?;
            let mut input = raw.as_slice();
            let column = TypedColumn::read_from(&mut input)?;
            verify_data!(typed_column, input.is_empty());
            typed_paths.insert(path.clone(), column);
        }

        let mut dynamic_paths = PathTable::with_capacity(self.dynamic_paths.len());
        for (path, blob) in &self.dynamic_paths {
            let raw = blob.decompress()?;
            let mut input = raw.as_slice();
            let column = DynamicColumn::read_from(&mut input)?;
            verify_data!(dynamic_column, input.is_empty());
            dynamic_paths.insert(path.clone(), column);
        }

        let raw = self.shared_data.decompress()?;
        let mut input = raw.as_slice();
        let shared_data = SharedDataStore::read_from(&mut input)?;
        verify_data!(shared_data, input.is_empty());

        ObjectColumn::from_parts(
            typed_paths,
            dynamic_paths,
            shared_data,
            self.max_dynamic_paths,
            self.max_dynamic_types,
            self.statistics.clone(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::object::object_row;
    use crate::value::{Scalar, ScalarKind};

    #[test]
    fn test_compress_round_trip() {
        let mut column = ObjectColumn::new([("id".to_string(), ScalarKind::Int64)], 1, 4);
        for i in 0..32 {
            column
                .insert(&object_row([
                    ("id", Scalar::Int(i)),
                    ("a", Scalar::String(format!("value-{i}"))),
                    ("b", Scalar::Float(i as f64 / 2.0)),
                ]))
                .unwrap();
        }

        let compressed = column.compress().unwrap();
        assert_eq!(compressed.row_count(), 32);
        assert!(compressed.byte_size() > 0);

        let restored = compressed.decompress().unwrap();
        assert_eq!(restored.size(), column.size());
        assert!(restored.structure_equals(&column));
        for row in 0..column.size() {
            assert_eq!(restored.read_row(row), column.read_row(row));
        }
    }

    #[test]
    fn test_compress_empty_column() {
        let column = ObjectColumn::new([("id".to_string(), ScalarKind::Int64)], 2, 4);
        let compressed = column.compress().unwrap();
        assert_eq!(compressed.row_count(), 0);
        let restored = compressed.decompress().unwrap();
        assert!(restored.is_empty());
        assert!(restored.structure_equals(&column));
    }
}
