//! Structural inserts from other object columns and merge-time structure
//! selection.

use std::collections::BTreeMap;

use ahash::AHashMap;
use itertools::Itertools;
use obelisk_common::{verify_arg, Error, Result};

use crate::{
    codec::ValueCodec,
    column::ColumnOps,
    dynamic::DynamicColumn,
    object::{ObjectColumn, Statistics, StatisticsSource},
};

impl ObjectColumn {
    /// Appends row `index` of another object column.
    ///
    /// See [`insert_range_from`](ObjectColumn::insert_range_from).
    pub fn insert_from(&mut self, source: &ObjectColumn, index: usize) -> Result<()> {
        self.insert_range_from(source, index, 1)
    }

    /// Appends `length` rows of another object column starting at `start`.
    ///
    /// Typed paths are copied column-to-column; the typed path sets of both
    /// columns must match. Source dynamic paths are copied into existing or
    /// newly created dynamic columns while the cap allows, and the rest are
    /// spilled into shared data, interleaved in sorted order with the
    /// source's own shared-data entries. A source shared-data path that
    /// exists as a dynamic path here is decoded into that dynamic column
    /// instead.
    pub fn insert_range_from(
        &mut self,
        source: &ObjectColumn,
        start: usize,
        length: usize,
    ) -> Result<()> {
        if length == 0 {
            return Ok(());
        }
        verify_arg!(range, start + length <= source.size());
        verify_arg!(
            typed_paths,
            source.typed_paths.len() == self.typed_paths.len()
        );

        for (path, column) in source.typed_paths.iter() {
            let target = self.typed_paths.get_mut(path).ok_or_else(|| {
                Error::invalid_arg(
                    "typed_paths",
                    format!("source typed path {path:?} is missing in the target"),
                )
            })?;
            target.extend_from_column(column, start, length);
        }

        // Dynamic paths past the cap are deferred and spilled into shared
        // data below; shared data is sorted per row, so sort them up front.
        let mut spill_paths: Vec<&str> = Vec::new();
        for (path, column) in source.dynamic_paths.iter() {
            if let Some(target) = self.dynamic_paths.get_mut(path) {
                target.extend_from_column(column, start, length);
            } else if let Some(target) = self.add_new_dynamic_path(path) {
                target.extend_from_column(column, start, length);
            } else {
                spill_paths.push(path);
            }
        }
        spill_paths.sort_unstable();

        self.insert_shared_rows(source, &spill_paths, start, length)
    }

    /// Merges the source's shared-data rows with the deferred spill paths
    /// and pads the dynamic columns left untouched by the range insert.
    fn insert_shared_rows(
        &mut self,
        source: &ObjectColumn,
        spill_paths: &[&str],
        start: usize,
        length: usize,
    ) -> Result<()> {
        let src_first = source.shared_data.row_range(start).start;
        let src_last = source.shared_data.row_range(start + length - 1).end;

        // Fast path: the source range has no shared-data entries.
        if src_first == src_last {
            let current_size = self.size();
            if spill_paths.is_empty() {
                self.shared_data.insert_many_defaults(length);
            } else {
                for row in start..start + length {
                    for &path in spill_paths {
                        self.spill_dynamic_value(source, path, row);
                    }
                    self.shared_data.finish_row();
                }
            }
            for column in self.dynamic_paths.columns_mut() {
                if column.len() == current_size {
                    column.insert_many_defaults(length);
                }
            }
            return Ok(());
        }

        // Per row, interleave the source's sorted shared entries with the
        // sorted spill list into a single sorted run.
        for row in start..start + length {
            let current_size = self.size();
            let mut spill_index = 0;
            for i in source.shared_data.row_range(row) {
                let path = source.shared_data.path_at(i);
                if let Some(target) = self.dynamic_paths.get_mut(path) {
                    let mut input = source.shared_data.value_at(i);
                    ValueCodec::decode_into(target, &mut input)?;
                } else {
                    while spill_index < spill_paths.len() && spill_paths[spill_index] < path {
                        self.spill_dynamic_value(source, spill_paths[spill_index], row);
                        spill_index += 1;
                    }
                    // A spill path never collides with a source shared path
                    // within one row; the shared entry would win if it did.
                    self.shared_data
                        .push_entry(path, source.shared_data.value_at(i));
                }
            }
            for &path in &spill_paths[spill_index..] {
                self.spill_dynamic_value(source, path, row);
            }
            self.shared_data.finish_row();

            for column in self.dynamic_paths.columns_mut() {
                if column.len() == current_size {
                    column.insert_default();
                }
            }
        }
        Ok(())
    }

    /// Appends the source dynamic value of `path` at `row` to the open
    /// shared-data row, unless it is null.
    fn spill_dynamic_value(&mut self, source: &ObjectColumn, path: &str, row: usize) {
        let column = source
            .dynamic_paths
            .get(path)
            .expect("spill path comes from the source dynamic set");
        if !column.is_null_at(row) {
            self.shared_data.push_entry(path, column.encoded_at(row));
        }
    }

    /// Installs a dynamic path set, each column back-filled with `size()`
    /// default rows. An already present path is replaced by a fresh column.
    ///
    /// # Errors
    ///
    /// Fails if the set exceeds `max_dynamic_paths`.
    pub fn set_dynamic_paths(&mut self, paths: Vec<String>) -> Result<()> {
        verify_arg!(paths, paths.len() <= self.max_dynamic_paths);
        let rows = self.size();
        for path in paths {
            let mut column = DynamicColumn::new(self.max_dynamic_types);
            column.insert_many_defaults(rows);
            self.dynamic_paths.remove(&path);
            self.dynamic_paths.insert(path, column);
        }
        Ok(())
    }

    /// Rebuilds the dynamic path set of this empty column from several
    /// source columns, ahead of merging their rows.
    ///
    /// Each source dynamic path is tallied by its total non-null count,
    /// preferring the source's statistics over a scan. If the tally exceeds
    /// `max_dynamic_paths`, the densest paths win, ties broken by path
    /// order; the losers will be spilled into shared data by the subsequent
    /// [`insert_range_from`](ObjectColumn::insert_range_from) calls.
    /// Statistics are replaced by the kept tallies, and the selection
    /// recurses into the kept paths' dynamic columns so nested type
    /// structure converges too.
    ///
    /// # Errors
    ///
    /// Fails if this column is not empty.
    pub fn take_dynamic_structure_from_source_columns(
        &mut self,
        sources: &[&ObjectColumn],
    ) -> Result<()> {
        verify_arg!(column, self.is_empty());

        let mut tally: AHashMap<&str, usize> = AHashMap::new();
        for source in sources {
            for (path, column) in source.dynamic_paths.iter() {
                let count = source
                    .statistics
                    .data
                    .get(path)
                    .copied()
                    .unwrap_or_else(|| column.len() - column.default_row_count());
                *tally.entry(path).or_insert(0) += count;
            }
        }

        let keep: Vec<(&str, usize)> = tally
            .into_iter()
            .sorted_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)))
            .take(self.max_dynamic_paths)
            .collect();

        self.dynamic_paths.clear();
        let mut statistics = Statistics {
            source: StatisticsSource::Merge,
            data: BTreeMap::new(),
        };
        for &(path, count) in &keep {
            self.dynamic_paths
                .insert(path.to_string(), DynamicColumn::new(self.max_dynamic_types));
            statistics.data.insert(path.to_string(), count);
        }
        self.statistics = statistics;

        for (path, column) in self.dynamic_paths.iter_mut() {
            let path_sources: Vec<&DynamicColumn> = sources
                .iter()
                .filter_map(|source| source.dynamic_paths.get(path))
                .collect();
            column.take_dynamic_structure_from_source_columns(&path_sources)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::object::object_row;
    use crate::value::{Scalar, ScalarKind};

    fn source_column() -> ObjectColumn {
        let mut column = ObjectColumn::new([("id".to_string(), ScalarKind::Int64)], 2, 4);
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
        column
    }

    #[test]
    fn test_insert_range_from_same_structure() {
        let source = source_column();
        let mut target = ObjectColumn::new([("id".to_string(), ScalarKind::Int64)], 2, 4);
        target.insert_range_from(&source, 0, 3).unwrap();
        assert_eq!(target.size(), 3);
        for row in 0..3 {
            assert_eq!(target.read_row(row), source.read_row(row));
        }
    }

    #[test]
    fn test_insert_range_from_spills_past_cap() {
        let source = source_column();
        let mut target = ObjectColumn::new([("id".to_string(), ScalarKind::Int64)], 1, 4);
        target.insert_range_from(&source, 0, 3).unwrap();

        assert_eq!(target.size(), 3);
        assert_eq!(target.dynamic_paths().len(), 1);
        let kept: Vec<&str> = target.dynamic_paths().paths().collect();
        assert_eq!(kept, ["a"]);

        // "b" lands in shared data for row 1, "c" stays shared for row 2.
        assert_eq!(target.shared_data().find_in_row(0, "b"), None);
        assert!(target.shared_data().find_in_row(1, "b").is_some());
        assert!(target.shared_data().find_in_row(2, "c").is_some());
        for row in 0..3 {
            assert_eq!(target.read_row(row), source.read_row(row));
        }
    }

    #[test]
    fn test_insert_range_promotes_shared_to_dynamic() {
        let source = source_column();
        // Target already carries "c" as a dynamic path, so the source's
        // shared-data entry for it must be decoded instead of copied.
        let mut target = ObjectColumn::new([("id".to_string(), ScalarKind::Int64)], 3, 4);
        target
            .insert(&object_row([
                ("id", Scalar::Int(0)),
                ("c", Scalar::Bool(false)),
            ]))
            .unwrap();
        target.insert_range_from(&source, 2, 1).unwrap();

        assert_eq!(target.size(), 2);
        let c = target.dynamic_paths().get("c").unwrap();
        assert_eq!(c.scalar_at(1), Scalar::Bool(true));
        assert!(target.shared_data().is_default_at(1));
    }

    #[test]
    fn test_insert_from_single_row() {
        let source = source_column();
        let mut target = ObjectColumn::new([("id".to_string(), ScalarKind::Int64)], 2, 4);
        target.insert_from(&source, 2).unwrap();
        assert_eq!(target.size(), 1);
        assert_eq!(target.read_row(0), source.read_row(2));
    }

    #[test]
    fn test_set_dynamic_paths() {
        let mut column = ObjectColumn::new([], 2, 4);
        column.insert(&object_row([("a", Scalar::Int(1))])).unwrap();
        column
            .set_dynamic_paths(vec!["a".to_string(), "b".to_string()])
            .unwrap();
        assert_eq!(column.dynamic_paths().len(), 2);
        let a = column.dynamic_paths().get("a").unwrap();
        assert_eq!(a.len(), 1);
        assert!(a.is_null_at(0));
        assert!(column
            .set_dynamic_paths(vec!["a".into(), "b".into(), "c".into()])
            .is_err());
    }

    #[test]
    fn test_take_dynamic_structure_ranks_by_non_null_count() {
        let mut first = ObjectColumn::new([], 4, 4);
        for i in 0..5 {
            first
                .insert(&object_row([("x", Scalar::Int(i))]))
                .unwrap();
        }
        first.insert(&object_row([("y", Scalar::Int(0))])).unwrap();
        first.insert(&object_row([("y", Scalar::Int(1))])).unwrap();

        let mut second = ObjectColumn::new([], 4, 4);
        for i in 0..4 {
            second
                .insert(&object_row([("y", Scalar::Int(i))]))
                .unwrap();
        }
        second.insert(&object_row([("z", Scalar::Int(0))])).unwrap();

        let mut merged = ObjectColumn::new([], 2, 4);
        merged
            .take_dynamic_structure_from_source_columns(&[&first, &second])
            .unwrap();

        let kept: Vec<&str> = merged.dynamic_paths().paths().collect();
        assert_eq!(kept, ["y", "x"]);
        assert_eq!(merged.statistics().source, StatisticsSource::Merge);
        assert_eq!(merged.statistics().data.get("y"), Some(&6));
        assert_eq!(merged.statistics().data.get("x"), Some(&5));
        assert!(merged.statistics().data.get("z").is_none());
    }

    #[test]
    fn test_take_dynamic_structure_prefers_statistics() {
        let mut source = ObjectColumn::new([], 4, 4);
        source.insert(&object_row([("p", Scalar::Int(1))])).unwrap();
        source.insert(&object_row([("q", Scalar::Int(2))])).unwrap();
        let mut statistics = Statistics::default();
        statistics.data.insert("p".to_string(), 100);
        source.set_statistics(statistics);

        let mut merged = ObjectColumn::new([], 1, 4);
        merged
            .take_dynamic_structure_from_source_columns(&[&source])
            .unwrap();
        let kept: Vec<&str> = merged.dynamic_paths().paths().collect();
        assert_eq!(kept, ["p"]);
        assert_eq!(merged.statistics().data.get("p"), Some(&100));
    }

    #[test]
    fn test_take_dynamic_structure_requires_empty_column() {
        let mut column = ObjectColumn::new([], 2, 4);
        column.insert(&object_row([("a", Scalar::Int(1))])).unwrap();
        assert!(column
            .take_dynamic_structure_from_source_columns(&[])
            .is_err());
    }
}
