//! A canonical map from object paths to column handles.

use ahash::AHashMap;

/// A mapping from path names to column handles.
///
/// Values are kept in a `Vec` in insertion order, with an `ahash` index for
/// near-constant membership checks, the hot path during inserts. Iteration
/// follows insertion order and carries no semantic meaning; callers that
/// need a stable key identity across calls must sort the paths explicitly
/// (see [`sorted_paths`](PathTable::sorted_paths)).
#[derive(Debug, Clone, Default)]
pub struct PathTable<C> {
    entries: Vec<(String, C)>,
    index: AHashMap<String, usize>,
}

impl<C> PathTable<C> {
    /// Creates a new, empty table.
    pub fn new() -> PathTable<C> {
        PathTable {
            entries: Vec::new(),
            index: AHashMap::new(),
        }
    }

    /// Creates a new, empty table with space for `capacity` paths.
    pub fn with_capacity(capacity: usize) -> PathTable<C> {
        PathTable {
            entries: Vec::with_capacity(capacity),
            index: AHashMap::with_capacity(capacity),
        }
    }

    /// Returns the number of paths in the table.
    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if the table holds no paths.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns `true` if the table contains `path`.
    #[inline]
    pub fn contains(&self, path: &str) -> bool {
        self.index.contains_key(path)
    }

    /// Returns the column stored for `path`, if any.
    #[inline]
    pub fn get(&self, path: &str) -> Option<&C> {
        self.index.get(path).map(|&i| &self.entries[i].1)
    }

    /// Returns the column stored for `path` mutably, if any.
    #[inline]
    pub fn get_mut(&mut self, path: &str) -> Option<&mut C> {
        let i = *self.index.get(path)?;
        Some(&mut self.entries[i].1)
    }

    /// Inserts a new path, returning a mutable reference to its column.
    ///
    /// # Panics
    ///
    /// Panics if the path is already present.
    pub fn insert(&mut self, path: String, column: C) -> &mut C {
        let idx = self.entries.len();
        let prev = self.index.insert(path.clone(), idx);
        assert!(prev.is_none(), "duplicate path {path:?}");
        self.entries.push((path, column));
        &mut self.entries[idx].1
    }

    /// Removes a path and returns its column, or `None` if absent.
    ///
    /// The insertion order of the remaining paths is preserved.
    pub fn remove(&mut self, path: &str) -> Option<C> {
        let idx = self.index.remove(path)?;
        let (_, column) = self.entries.remove(idx);
        for i in self.index.values_mut() {
            if *i > idx {
                *i -= 1;
            }
        }
        Some(column)
    }

    /// Removes all paths.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.index.clear();
    }

    /// Iterates over `(path, column)` pairs in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &C)> {
        self.entries.iter().map(|(p, c)| (p.as_str(), c))
    }

    /// Iterates over `(path, column)` pairs with mutable columns.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = (&str, &mut C)> {
        self.entries.iter_mut().map(|(p, c)| (p.as_str(), c))
    }

    /// Iterates over the path names in insertion order.
    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(p, _)| p.as_str())
    }

    /// Iterates over the columns in insertion order.
    pub fn columns(&self) -> impl Iterator<Item = &C> {
        self.entries.iter().map(|(_, c)| c)
    }

    /// Iterates over the columns mutably.
    pub fn columns_mut(&mut self) -> impl Iterator<Item = &mut C> {
        self.entries.iter_mut().map(|(_, c)| c)
    }

    /// Returns the path names sorted by byte order.
    pub fn sorted_paths(&self) -> Vec<&str> {
        let mut paths: Vec<&str> = self.paths().collect();
        paths.sort_unstable();
        paths
    }
}
