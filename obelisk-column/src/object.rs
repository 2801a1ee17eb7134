//! The object column: typed paths, dynamic paths and shared overflow data.

use std::collections::BTreeMap;
use std::hash::Hasher;

use itertools::Itertools;
use obelisk_common::{verify_arg, Error, Result};

use crate::{
    codec::ValueCodec,
    column::ColumnOps,
    dynamic::DynamicColumn,
    paths::PathTable,
    shared::SharedDataStore,
    typed::TypedColumn,
    value::{ObjectRow, ScalarKind},
};

#[cfg(test)]
use crate::value::Scalar;

/// Where the advisory dynamic-path statistics of a column came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StatisticsSource {
    /// Statistics read from a persisted part.
    #[default]
    Read,
    /// Statistics produced by merge-time structure selection.
    Merge,
}

/// Advisory non-null counts per dynamic path.
///
/// Statistics never affect correctness; they only steer merge-time
/// structure selection towards the densest paths.
#[derive(Debug, Clone, Default)]
pub struct Statistics {
    pub source: StatisticsSource,
    pub data: BTreeMap<String, usize>,
}

/// A columnar container for semi-structured object values.
///
/// Each row is a mapping from dotted string paths to heterogeneous scalar
/// values. Three stores hold the data:
///
/// - typed paths, fixed at construction, as dense [`TypedColumn`]s,
/// - up to `max_dynamic_paths` dynamic paths discovered at ingest time, as
///   self-describing [`DynamicColumn`]s,
/// - every further path per row in the [`SharedDataStore`] overflow, a
///   length-prefixed, path-sorted binary map.
///
/// All three stores always hold the same number of rows. A null value in a
/// dynamic path is indistinguishable from the path being absent in that
/// row, and shared data never stores nulls at all.
#[derive(Debug, Clone)]
pub struct ObjectColumn {
    pub(crate) typed_paths: PathTable<TypedColumn>,
    pub(crate) dynamic_paths: PathTable<DynamicColumn>,
    pub(crate) shared_data: SharedDataStore,
    pub(crate) max_dynamic_paths: usize,
    pub(crate) max_dynamic_types: usize,
    pub(crate) statistics: Statistics,
}

impl ObjectColumn {
    /// Creates an empty column with the given typed-path schema and caps.
    pub fn new(
        typed: impl IntoIterator<Item = (String, ScalarKind)>,
        max_dynamic_paths: usize,
        max_dynamic_types: usize,
    ) -> ObjectColumn {
        let mut typed_paths = PathTable::new();
        for (path, kind) in typed {
            typed_paths.insert(path, TypedColumn::new(kind));
        }
        ObjectColumn {
            typed_paths,
            dynamic_paths: PathTable::new(),
            shared_data: SharedDataStore::new(),
            max_dynamic_paths,
            max_dynamic_types,
            statistics: Statistics::default(),
        }
    }

    /// Creates an empty column from pre-built typed path columns.
    ///
    /// # Errors
    ///
    /// Fails if any of the supplied columns is non-empty.
    pub fn with_typed_columns(
        typed_paths: PathTable<TypedColumn>,
        max_dynamic_paths: usize,
        max_dynamic_types: usize,
    ) -> Result<ObjectColumn> {
        if typed_paths.columns().any(|c| !c.is_empty()) {
            return Err(Error::invalid_operation(
                "constructing an object column from non-empty typed path columns",
            ));
        }
        Ok(ObjectColumn {
            typed_paths,
            dynamic_paths: PathTable::new(),
            shared_data: SharedDataStore::new(),
            max_dynamic_paths,
            max_dynamic_types,
            statistics: Statistics::default(),
        })
    }

    /// Assembles a column from fully populated sub-stores.
    ///
    /// # Errors
    ///
    /// Fails if the sub-store row counts disagree or the number of dynamic
    /// paths exceeds `max_dynamic_paths`.
    pub fn from_parts(
        typed_paths: PathTable<TypedColumn>,
        dynamic_paths: PathTable<DynamicColumn>,
        shared_data: SharedDataStore,
        max_dynamic_paths: usize,
        max_dynamic_types: usize,
        statistics: Statistics,
    ) -> Result<ObjectColumn> {
        let rows = shared_data.len();
        verify_arg!(typed_paths, typed_paths.columns().all(|c| c.len() == rows));
        verify_arg!(
            dynamic_paths,
            dynamic_paths.columns().all(|c| c.len() == rows)
        );
        verify_arg!(dynamic_paths, dynamic_paths.len() <= max_dynamic_paths);
        Ok(ObjectColumn {
            typed_paths,
            dynamic_paths,
            shared_data,
            max_dynamic_paths,
            max_dynamic_types,
            statistics,
        })
    }

    /// Returns the number of rows.
    #[inline]
    pub fn size(&self) -> usize {
        self.shared_data.len()
    }

    /// Returns `true` if the column holds no rows.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.size() == 0
    }

    /// Returns the dynamic-path cap.
    #[inline]
    pub fn max_dynamic_paths(&self) -> usize {
        self.max_dynamic_paths
    }

    /// Returns the per-path dynamic type cap.
    #[inline]
    pub fn max_dynamic_types(&self) -> usize {
        self.max_dynamic_types
    }

    /// Returns the typed path columns.
    pub fn typed_paths(&self) -> &PathTable<TypedColumn> {
        &self.typed_paths
    }

    /// Returns the dynamic path columns.
    pub fn dynamic_paths(&self) -> &PathTable<DynamicColumn> {
        &self.dynamic_paths
    }

    /// Returns the shared-data overflow store.
    pub fn shared_data(&self) -> &SharedDataStore {
        &self.shared_data
    }

    /// Returns the advisory statistics.
    pub fn statistics(&self) -> &Statistics {
        &self.statistics
    }

    /// Replaces the advisory statistics, e.g. with counts read from a
    /// persisted part.
    pub fn set_statistics(&mut self, statistics: Statistics) {
        self.statistics = statistics;
    }

    /// Returns a descriptive name of the column structure, with typed paths
    /// listed in sorted order.
    pub fn display_name(&self) -> String {
        let typed = self
            .typed_paths
            .sorted_paths()
            .into_iter()
            .map(|path| {
                let kind = self.typed_paths.get(path).expect("sorted path exists").kind();
                format!(", {path} {kind}")
            })
            .join("");
        format!(
            "Object(max_dynamic_paths={}, max_dynamic_types={}{typed})",
            self.max_dynamic_paths, self.max_dynamic_types
        )
    }

    /// Adds a new dynamic path, back-filled with `size()` default rows.
    ///
    /// Returns `None` when the dynamic-path cap is reached.
    pub fn add_new_dynamic_path(&mut self, path: &str) -> Option<&mut DynamicColumn> {
        if self.dynamic_paths.len() == self.max_dynamic_paths {
            return None;
        }
        let rows = self.size();
        let mut column = DynamicColumn::new(self.max_dynamic_types);
        column.insert_many_defaults(rows);
        Some(self.dynamic_paths.insert(path.to_string(), column))
    }

    /// Appends one object row.
    ///
    /// Each entry goes to its typed path, its dynamic path, a newly created
    /// dynamic path while under the cap, or — for non-null values past the
    /// cap — the shared-data row. Null values past the cap are dropped:
    /// a null dynamic value cannot be told apart from an absent path.
    ///
    /// # Errors
    ///
    /// Fails fast on a typed-path kind mismatch; the partially written row
    /// is not rolled back. Use [`try_insert`](ObjectColumn::try_insert) for
    /// the transactional variant.
    pub fn insert(&mut self, row: &ObjectRow) -> Result<()> {
        let prev_size = self.size();
        let mut value_buf = Vec::new();
        for (path, value) in row {
            if let Some(column) = self.typed_paths.get_mut(path) {
                column.push(value)?;
            } else if let Some(column) = self.dynamic_paths.get_mut(path) {
                column.push(value);
            } else if let Some(column) = self.add_new_dynamic_path(path) {
                column.push(value);
            } else if !value.is_null() {
                value_buf.clear();
                ValueCodec::encode(value, &mut value_buf);
                self.shared_data.push_entry(path, &value_buf);
            }
        }
        self.shared_data.finish_row();
        self.fill_remaining_with_defaults(prev_size);
        Ok(())
    }

    /// Appends one object row, rolling back on failure.
    ///
    /// Returns `false` and leaves the column unchanged — lengths, shared
    /// data, and the dynamic path set — if any sub-column rejects its
    /// value.
    pub fn try_insert(&mut self, row: &ObjectRow) -> bool {
        let prev_size = self.size();
        let prev_entries = self.shared_data.entry_count();
        let mut created_paths: Vec<String> = Vec::new();
        let mut value_buf = Vec::new();
        for (path, value) in row {
            if let Some(column) = self.typed_paths.get_mut(path) {
                if column.push(value).is_err() {
                    self.rollback(prev_size, prev_entries, &created_paths);
                    return false;
                }
            } else if let Some(column) = self.dynamic_paths.get_mut(path) {
                column.push(value);
            } else if self.dynamic_paths.len() < self.max_dynamic_paths {
                created_paths.push(path.clone());
                let column = self
                    .add_new_dynamic_path(path)
                    .expect("under the dynamic-path cap");
                column.push(value);
            } else if !value.is_null() {
                value_buf.clear();
                ValueCodec::encode(value, &mut value_buf);
                self.shared_data.push_entry(path, &value_buf);
            }
        }
        self.shared_data.finish_row();
        self.fill_remaining_with_defaults(prev_size);
        true
    }

    fn rollback(&mut self, prev_size: usize, prev_entries: usize, created_paths: &[String]) {
        for column in self.typed_paths.columns_mut() {
            let len = column.len();
            if len > prev_size {
                column.pop_back(len - prev_size);
            }
        }
        for column in self.dynamic_paths.columns_mut() {
            let len = column.len();
            if len > prev_size {
                column.pop_back(len - prev_size);
            }
        }
        self.shared_data.truncate_entries(prev_entries);
        for path in created_paths {
            self.dynamic_paths.remove(path);
        }
    }

    /// Appends one default to every typed and dynamic column still at
    /// `prev_size`, closing out a freshly written row.
    pub(crate) fn fill_remaining_with_defaults(&mut self, prev_size: usize) {
        for column in self.typed_paths.columns_mut() {
            if column.len() == prev_size {
                column.insert_default();
            }
        }
        for column in self.dynamic_paths.columns_mut() {
            if column.len() == prev_size {
                column.insert_default();
            }
        }
    }

    /// Reads the row at `index` back as an object.
    ///
    /// The result holds every typed path (nulls included), the non-null
    /// dynamic path values, and every shared-data entry of the row.
    pub fn read_row(&self, index: usize) -> ObjectRow {
        let mut row = ObjectRow::new();
        for (path, column) in self.typed_paths.iter() {
            row.insert(path.to_string(), column.scalar_at(index));
        }
        for (path, column) in self.dynamic_paths.iter() {
            if !column.is_null_at(index) {
                row.insert(path.to_string(), column.scalar_at(index));
            }
        }
        for (path, value) in self.shared_data.row_entries(index) {
            let mut input = value;
            let scalar = ValueCodec::decode(&mut input).expect("well-formed shared value");
            row.insert(path.to_string(), scalar);
        }
        row
    }

    /// Returns `true` if every sub-column is default at `index` and the
    /// shared-data row is empty.
    pub fn is_default_at(&self, index: usize) -> bool {
        self.typed_paths.columns().all(|c| c.is_default_at(index))
            && self.dynamic_paths.columns().all(|c| c.is_default_at(index))
            && self.shared_data.is_default_at(index)
    }

    /// Appends one default row.
    pub fn insert_default(&mut self) {
        self.insert_many_defaults(1);
    }

    /// Appends `count` default rows.
    pub fn insert_many_defaults(&mut self, count: usize) {
        for column in self.typed_paths.columns_mut() {
            column.insert_many_defaults(count);
        }
        for column in self.dynamic_paths.columns_mut() {
            column.insert_many_defaults(count);
        }
        self.shared_data.insert_many_defaults(count);
    }

    /// Removes the last `count` rows from every sub-store.
    pub fn pop_back(&mut self, count: usize) {
        for column in self.typed_paths.columns_mut() {
            column.pop_back(count);
        }
        for column in self.dynamic_paths.columns_mut() {
            column.pop_back(count);
        }
        self.shared_data.pop_back(count);
    }

    /// Reserves capacity for at least `additional` more rows in every
    /// sub-store.
    pub fn reserve(&mut self, additional: usize) {
        for column in self.typed_paths.columns_mut() {
            column.reserve(additional);
        }
        for column in self.dynamic_paths.columns_mut() {
            column.reserve(additional);
        }
        self.shared_data.reserve(additional);
    }

    /// Expands the column in place to `mask.len()` rows, inserting default
    /// rows where the mask (xor `inverted`) is unset.
    pub fn expand(&mut self, mask: &[bool], inverted: bool) {
        for column in self.typed_paths.columns_mut() {
            column.expand(mask, inverted);
        }
        for column in self.dynamic_paths.columns_mut() {
            column.expand(mask, inverted);
        }
        self.shared_data.expand(mask, inverted);
    }

    /// Drops excess capacity in every sub-store.
    pub fn finalize(&mut self) {
        for column in self.typed_paths.columns_mut() {
            column.shrink_to_fit();
        }
        for column in self.dynamic_paths.columns_mut() {
            column.shrink_to_fit();
        }
        self.shared_data.shrink_to_fit();
    }

    /// Returns the in-memory size of the stored data in bytes.
    pub fn byte_size(&self) -> usize {
        let typed: usize = self.typed_paths.columns().map(ColumnOps::byte_size).sum();
        let dynamic: usize = self.dynamic_paths.columns().map(ColumnOps::byte_size).sum();
        typed + dynamic + self.shared_data.byte_size()
    }

    /// Returns the number of bytes the column has allocated.
    pub fn allocated_bytes(&self) -> usize {
        let typed: usize = self
            .typed_paths
            .columns()
            .map(ColumnOps::allocated_bytes)
            .sum();
        let dynamic: usize = self
            .dynamic_paths
            .columns()
            .map(ColumnOps::allocated_bytes)
            .sum();
        typed + dynamic + self.shared_data.allocated_bytes()
    }

    /// Feeds the row at `index` into a hasher, covering every sub-store.
    pub fn update_hash<H: Hasher>(&self, index: usize, hasher: &mut H) {
        for column in self.typed_paths.columns() {
            column.update_hash(index, hasher);
        }
        for column in self.dynamic_paths.columns() {
            column.update_hash(index, hasher);
        }
        self.shared_data.update_hash(index, hasher);
    }

    /// Object values have no single-buffer scalar representation.
    pub fn get_data_at(&self, _index: usize) -> Result<&[u8]> {
        Err(Error::unsupported(format!(
            "get_data_at on {}",
            self.display_name()
        )))
    }

    /// Object values have no single-buffer scalar representation.
    pub fn insert_data(&mut self, _data: &[u8]) -> Result<()> {
        Err(Error::unsupported(format!(
            "insert_data on {}",
            self.display_name()
        )))
    }
}

/// Builds an object row from literal entries, shared by the unit tests.
#[cfg(test)]
pub(crate) fn object_row<const N: usize>(entries: [(&str, Scalar); N]) -> ObjectRow {
    entries
        .into_iter()
        .map(|(path, value)| (path.to_string(), value))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_column() -> ObjectColumn {
        ObjectColumn::new([("id".to_string(), ScalarKind::Int64)], 2, 4)
    }

    #[test]
    fn test_insert_dispatch() {
        let mut column = test_column();
        column
            .insert(&object_row([
                ("id", Scalar::Int(1)),
                ("a", Scalar::String("x".to_string())),
            ]))
            .unwrap();
        column
            .insert(&object_row([
                ("id", Scalar::Int(2)),
                ("b", Scalar::Float(1.5)),
            ]))
            .unwrap();
        column
            .insert(&object_row([
                ("id", Scalar::Int(3)),
                ("c", Scalar::Bool(true)),
            ]))
            .unwrap();

        assert_eq!(column.size(), 3);
        let dynamic: Vec<&str> = column.dynamic_paths().paths().collect();
        assert_eq!(dynamic, ["a", "b"]);
        assert!(column.shared_data().is_default_at(0));
        assert!(column.shared_data().is_default_at(1));
        assert_eq!(column.shared_data().row_entries(2).count(), 1);
        assert_eq!(
            column.read_row(2),
            object_row([("id", Scalar::Int(3)), ("c", Scalar::Bool(true))])
        );
    }

    #[test]
    fn test_null_past_cap_is_dropped() {
        let mut column = ObjectColumn::new([], 1, 4);
        column
            .insert(&object_row([("a", Scalar::Int(1))]))
            .unwrap();
        column.insert(&object_row([("b", Scalar::Null)])).unwrap();
        assert_eq!(column.size(), 2);
        assert_eq!(column.dynamic_paths().len(), 1);
        assert!(column.shared_data().is_default_at(1));
        assert_eq!(column.read_row(1), ObjectRow::new());
    }

    #[test]
    fn test_missing_paths_filled_with_defaults() {
        let mut column = test_column();
        column
            .insert(&object_row([
                ("id", Scalar::Int(1)),
                ("a", Scalar::Int(10)),
            ]))
            .unwrap();
        column.insert(&object_row([("id", Scalar::Int(2))])).unwrap();
        let a = column.dynamic_paths().get("a").unwrap();
        assert_eq!(a.len(), 2);
        assert!(a.is_null_at(1));
    }

    #[test]
    fn test_try_insert_rolls_back() {
        let mut column = test_column();
        column
            .insert(&object_row([
                ("id", Scalar::Int(1)),
                ("a", Scalar::String("x".to_string())),
            ]))
            .unwrap();
        let before_entries = column.shared_data().entry_count();

        let rejected = object_row([
            ("a", Scalar::Int(5)),
            ("id", Scalar::String("not-an-int".to_string())),
            ("z", Scalar::Bool(true)),
        ]);
        assert!(!column.try_insert(&rejected));
        assert_eq!(column.size(), 1);
        assert_eq!(column.shared_data().entry_count(), before_entries);
        let dynamic: Vec<&str> = column.dynamic_paths().paths().collect();
        assert_eq!(dynamic, ["a"]);
        assert_eq!(column.dynamic_paths().get("a").unwrap().len(), 1);

        assert!(column.try_insert(&object_row([("id", Scalar::Int(2))])));
        assert_eq!(column.size(), 2);
    }

    #[test]
    fn test_is_default_at() {
        let mut column = test_column();
        column.insert_default();
        column
            .insert(&object_row([("id", Scalar::Int(1))]))
            .unwrap();
        assert!(column.is_default_at(0));
        assert!(!column.is_default_at(1));
    }

    #[test]
    fn test_pop_back() {
        let mut column = test_column();
        for i in 0..3 {
            column
                .insert(&object_row([
                    ("id", Scalar::Int(i)),
                    ("extra", Scalar::UInt(i as u64)),
                ]))
                .unwrap();
        }
        column.pop_back(2);
        assert_eq!(column.size(), 1);
        assert_eq!(column.dynamic_paths().get("extra").unwrap().len(), 1);
    }

    #[test]
    fn test_unsupported_accessors() {
        let mut column = test_column();
        assert!(column.get_data_at(0).is_err());
        assert!(column.insert_data(b"x").is_err());
    }

    #[test]
    fn test_display_name() {
        let column = ObjectColumn::new(
            [
                ("z".to_string(), ScalarKind::String),
                ("a".to_string(), ScalarKind::Int64),
            ],
            8,
            16,
        );
        assert_eq!(
            column.display_name(),
            "Object(max_dynamic_paths=8, max_dynamic_types=16, a Int64, z String)"
        );
    }

    #[test]
    fn test_with_typed_columns_rejects_non_empty() {
        let mut typed = PathTable::new();
        let mut column = TypedColumn::new(ScalarKind::Int64);
        column.push(&Scalar::Int(1)).unwrap();
        typed.insert("id".to_string(), column);
        assert!(ObjectColumn::with_typed_columns(typed, 2, 4).is_err());
    }

    #[test]
    fn test_expand() {
        let mut column = test_column();
        column
            .insert(&object_row([("id", Scalar::Int(1))]))
            .unwrap();
        column
            .insert(&object_row([("id", Scalar::Int(2))]))
            .unwrap();
        column.expand(&[true, false, true, false], false);
        assert_eq!(column.size(), 4);
        assert_eq!(column.read_row(0), object_row([("id", Scalar::Int(1))]));
        assert!(column.is_default_at(1));
        assert_eq!(column.read_row(2), object_row([("id", Scalar::Int(2))]));
        assert!(column.is_default_at(3));
    }
}
