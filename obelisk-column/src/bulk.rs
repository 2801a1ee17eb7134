//! Bulk row-rearranging operations over all sub-stores in parallel.

use obelisk_common::{verify_arg, Result};

use crate::{column::ColumnOps, object::ObjectColumn, paths::PathTable};

impl ObjectColumn {
    /// Builds a new column whose row `i` is row `rows[i]`, or a default row
    /// where `rows[i]` is `None`. Every sub-store is gathered with the same
    /// index view, so the result stays coherent by construction.
    fn gather_rows(&self, rows: &[Option<usize>]) -> ObjectColumn {
        let mut typed_paths = PathTable::with_capacity(self.typed_paths.len());
        for (path, column) in self.typed_paths.iter() {
            typed_paths.insert(path.to_string(), column.gather_padded(rows));
        }
        let mut dynamic_paths = PathTable::with_capacity(self.dynamic_paths.len());
        for (path, column) in self.dynamic_paths.iter() {
            dynamic_paths.insert(path.to_string(), column.gather_padded(rows));
        }
        ObjectColumn {
            typed_paths,
            dynamic_paths,
            shared_data: self.shared_data.gather_padded(rows),
            max_dynamic_paths: self.max_dynamic_paths,
            max_dynamic_types: self.max_dynamic_types,
            statistics: self.statistics.clone(),
        }
    }

    /// Returns a new column holding the rows where `mask` is set.
    pub fn filter(&self, mask: &[bool]) -> Result<ObjectColumn> {
        verify_arg!(mask, mask.len() == self.size());
        let rows: Vec<Option<usize>> = mask
            .iter()
            .enumerate()
            .filter_map(|(row, &selected)| selected.then_some(Some(row)))
            .collect();
        Ok(self.gather_rows(&rows))
    }

    /// Returns a new column with the rows rearranged by `permutation`.
    pub fn permute(&self, permutation: &[usize]) -> Result<ObjectColumn> {
        self.index_values(permutation)
    }

    /// Returns a new column whose row `i` is row `indices[i]`.
    pub fn index_values(&self, indices: &[usize]) -> Result<ObjectColumn> {
        verify_arg!(indices, indices.iter().all(|&row| row < self.size()));
        let rows: Vec<Option<usize>> = indices.iter().map(|&row| Some(row)).collect();
        Ok(self.gather_rows(&rows))
    }

    /// Returns a new column where row `i` is repeated
    /// `offsets[i] - offsets[i - 1]` times.
    pub fn replicate(&self, offsets: &[u64]) -> Result<ObjectColumn> {
        verify_arg!(offsets, offsets.len() == self.size());
        verify_arg!(offsets, offsets.windows(2).all(|pair| pair[0] <= pair[1]));
        let total = offsets.last().copied().unwrap_or(0) as usize;
        let mut rows = Vec::with_capacity(total);
        let mut previous = 0u64;
        for (row, &offset) in offsets.iter().enumerate() {
            for _ in previous..offset {
                rows.push(Some(row));
            }
            previous = offset;
        }
        Ok(self.gather_rows(&rows))
    }

    /// Splits the column into `num_columns` independent shards; row `i`
    /// goes to shard `selector[i]`.
    pub fn scatter(&self, num_columns: usize, selector: &[usize]) -> Result<Vec<ObjectColumn>> {
        verify_arg!(selector, selector.len() == self.size());
        verify_arg!(selector, selector.iter().all(|&shard| shard < num_columns));
        let mut shard_rows: Vec<Vec<Option<usize>>> = vec![Vec::new(); num_columns];
        for (row, &shard) in selector.iter().enumerate() {
            shard_rows[shard].push(Some(row));
        }
        Ok(shard_rows
            .iter()
            .map(|rows| self.gather_rows(rows))
            .collect())
    }

    /// Returns an empty column with the same structure and statistics.
    pub fn clone_empty(&self) -> ObjectColumn {
        self.gather_rows(&[])
    }

    /// Returns a copy truncated or padded with default rows to `new_len`.
    pub fn clone_resized(&self, new_len: usize) -> ObjectColumn {
        let rows: Vec<Option<usize>> = (0..new_len)
            .map(|row| (row < self.size()).then_some(row))
            .collect();
        self.gather_rows(&rows)
    }

    /// Returns `true` if both columns share the same structure: equal caps
    /// and equal typed path sets with equal column structure. Dynamic paths
    /// and shared data are value-level and intentionally ignored.
    pub fn structure_equals(&self, other: &ObjectColumn) -> bool {
        if self.max_dynamic_paths != other.max_dynamic_paths
            || self.max_dynamic_types != other.max_dynamic_types
            || self.typed_paths.len() != other.typed_paths.len()
        {
            return false;
        }
        self.typed_paths.iter().all(|(path, column)| {
            other
                .typed_paths
                .get(path)
                .is_some_and(|c| c.structure_equals(column))
        })
    }

    /// Returns the identity permutation: object values are not comparable,
    /// so no sort order exists to produce.
    pub fn get_permutation(&self) -> Vec<usize> {
        (0..self.size()).collect()
    }
}
