//! The capability seam shared by the sub-stores of an object column.

/// Operations every sub-store of an object column supports.
///
/// The trait is implemented by the typed and dynamic path columns as well
/// as the shared-data store, and is dispatched statically: the object
/// column owns its children concretely and fans operations out to each.
///
/// [`gather_padded`](ColumnOps::gather_padded) is the single
/// row-rearrangement primitive: the object column turns filtering,
/// permuting, indexing, replication and scattering into row-index views
/// and gathers every sub-store with the same view, so all of them are
/// guaranteed to transform identically.
pub trait ColumnOps: Sized {
    /// Returns the number of rows.
    fn len(&self) -> usize;

    /// Returns `true` if the store holds no rows.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Appends one default row.
    fn insert_default(&mut self);

    /// Appends `count` default rows.
    fn insert_many_defaults(&mut self, count: usize) {
        for _ in 0..count {
            self.insert_default();
        }
    }

    /// Removes the last `count` rows.
    fn pop_back(&mut self, count: usize);

    /// Returns `true` if the row at `index` is the default row.
    fn is_default_at(&self, index: usize) -> bool;

    /// Reserves capacity for at least `additional` more rows.
    fn reserve(&mut self, additional: usize);

    /// Returns the in-memory size of the stored data in bytes.
    fn byte_size(&self) -> usize;

    /// Returns the number of bytes the store has allocated.
    fn allocated_bytes(&self) -> usize;

    /// Returns an empty store with the same structure.
    fn clone_empty(&self) -> Self;

    /// Builds a new store whose row `i` is row `rows[i]` of this store, or
    /// the default row where `rows[i]` is `None`.
    fn gather_padded(&self, rows: &[Option<usize>]) -> Self;

    /// Expands the store in place to `mask.len()` rows: positions where
    /// `mask` is set (xor `inverted`) receive the existing rows in order,
    /// the rest become default rows.
    fn expand(&mut self, mask: &[bool], inverted: bool) {
        let mut next = 0usize;
        let rows: Vec<Option<usize>> = mask
            .iter()
            .map(|&selected| {
                if selected != inverted {
                    let row = next;
                    next += 1;
                    Some(row)
                } else {
                    None
                }
            })
            .collect();
        assert_eq!(next, self.len());
        *self = self.gather_padded(&rows);
    }

    /// Drops excess capacity.
    fn shrink_to_fit(&mut self);
}
