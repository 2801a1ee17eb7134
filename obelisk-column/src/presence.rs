//! Null tracking for column values.

use obelisk_common::{Error, Result};

use crate::codec::{read_bytes, read_u8};

/// Tracks which values of a column are null.
///
/// Three representations are used, picked automatically as values are
/// appended:
/// - `Trivial`: all values are present (non-null),
/// - `Nulls`: all values are null,
/// - `Bytes`: mixed, one byte per value (`1` present, `0` null).
#[derive(Debug, Clone)]
pub enum Presence {
    /// All values are present.
    Trivial(usize),

    /// All values are null.
    Nulls(usize),

    /// One byte per value: `1` present, `0` null.
    Bytes(Vec<u8>),
}

impl Presence {
    /// Returns the number of values tracked, null or not.
    #[inline]
    pub fn len(&self) -> usize {
        match self {
            Presence::Trivial(len) => *len,
            Presence::Nulls(len) => *len,
            Presence::Bytes(bytes) => bytes.len(),
        }
    }

    /// Returns `true` if no values are tracked.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns `true` if the value at `index` is null.
    ///
    /// # Panics
    ///
    /// Panics if `index` is out of bounds.
    #[inline]
    pub fn is_null(&self, index: usize) -> bool {
        match self {
            Presence::Trivial(len) => {
                assert!(index < *len);
                false
            }
            Presence::Nulls(len) => {
                assert!(index < *len);
                true
            }
            Presence::Bytes(bytes) => bytes[index] == 0,
        }
    }

    /// Returns the number of null values.
    pub fn count_nulls(&self) -> usize {
        match self {
            Presence::Trivial(_) => 0,
            Presence::Nulls(len) => *len,
            Presence::Bytes(bytes) => bytes.iter().filter(|&&b| b == 0).count(),
        }
    }

    /// Returns the number of non-null values.
    pub fn count_non_nulls(&self) -> usize {
        self.len() - self.count_nulls()
    }

    /// Appends a single non-null marker.
    pub fn push_non_null(&mut self) {
        match self {
            Presence::Trivial(len) => *len += 1,
            Presence::Nulls(_) => {
                self.materialize();
                self.push_non_null();
            }
            Presence::Bytes(bytes) => bytes.push(1),
        }
    }

    /// Appends a single null marker.
    pub fn push_null(&mut self) {
        match self {
            Presence::Nulls(len) => *len += 1,
            Presence::Trivial(_) => {
                self.materialize();
                self.push_null();
            }
            Presence::Bytes(bytes) => bytes.push(0),
        }
    }

    /// Appends `count` non-null markers.
    pub fn extend_with_non_nulls(&mut self, count: usize) {
        match self {
            Presence::Trivial(len) => *len += count,
            Presence::Nulls(_) => {
                if count > 0 {
                    self.materialize();
                    self.extend_with_non_nulls(count);
                }
            }
            Presence::Bytes(bytes) => bytes.resize(bytes.len() + count, 1),
        }
    }

    /// Appends `count` null markers.
    pub fn extend_with_nulls(&mut self, count: usize) {
        match self {
            Presence::Nulls(len) => *len += count,
            Presence::Trivial(_) => {
                if count > 0 {
                    self.materialize();
                    self.extend_with_nulls(count);
                }
            }
            Presence::Bytes(bytes) => bytes.resize(bytes.len() + count, 0),
        }
    }

    /// Appends `len` markers starting at `offset` from another presence.
    pub fn extend_from_range(&mut self, source: &Presence, offset: usize, len: usize) {
        assert!(offset + len <= source.len());
        match source {
            Presence::Trivial(_) => self.extend_with_non_nulls(len),
            Presence::Nulls(_) => self.extend_with_nulls(len),
            Presence::Bytes(bytes) => {
                for &b in &bytes[offset..offset + len] {
                    if b != 0 {
                        self.push_non_null();
                    } else {
                        self.push_null();
                    }
                }
            }
        }
    }

    /// Truncates the presence to `len` values.
    pub fn truncate(&mut self, len: usize) {
        match self {
            Presence::Trivial(n) | Presence::Nulls(n) => *n = (*n).min(len),
            Presence::Bytes(bytes) => bytes.truncate(len),
        }
    }

    /// Returns the in-memory size of the presence in bytes.
    pub fn byte_size(&self) -> usize {
        match self {
            Presence::Trivial(_) | Presence::Nulls(_) => std::mem::size_of::<usize>(),
            Presence::Bytes(bytes) => bytes.len(),
        }
    }

    /// Appends the blob encoding of the presence to `out`.
    pub(crate) fn write_to(&self, out: &mut Vec<u8>) {
        match self {
            Presence::Trivial(_) => out.push(0),
            Presence::Nulls(_) => out.push(1),
            Presence::Bytes(bytes) => {
                out.push(2);
                out.extend_from_slice(bytes);
            }
        }
    }

    /// Reads a blob encoding describing `len` values.
    pub(crate) fn read_from(input: &mut &[u8], len: usize) -> Result<Presence> {
        match read_u8(input)? {
            0 => Ok(Presence::Trivial(len)),
            1 => Ok(Presence::Nulls(len)),
            2 => Ok(Presence::Bytes(read_bytes(input, len)?.to_vec())),
            tag => Err(Error::invalid_format(
                "presence",
                format!("bad presence tag {tag}"),
            )),
        }
    }

    /// Converts a trivial representation to the byte form so mixed markers
    /// can be appended.
    fn materialize(&mut self) {
        let bytes = match self {
            Presence::Trivial(len) => vec![1u8; *len],
            Presence::Nulls(len) => vec![0u8; *len],
            Presence::Bytes(_) => return,
        };
        *self = Presence::Bytes(bytes);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trivial_stays_trivial() {
        let mut presence = Presence::Trivial(0);
        presence.push_non_null();
        presence.extend_with_non_nulls(3);
        assert!(matches!(presence, Presence::Trivial(4)));
        assert_eq!(presence.count_nulls(), 0);
    }

    #[test]
    fn test_mixed_materializes() {
        let mut presence = Presence::Trivial(2);
        presence.push_null();
        assert!(matches!(presence, Presence::Bytes(_)));
        assert_eq!(presence.len(), 3);
        assert!(!presence.is_null(0));
        assert!(presence.is_null(2));
        assert_eq!(presence.count_nulls(), 1);
        assert_eq!(presence.count_non_nulls(), 2);
    }

    #[test]
    fn test_extend_from_range() {
        let mut source = Presence::Trivial(0);
        source.push_non_null();
        source.push_null();
        source.push_non_null();

        let mut target = Presence::Trivial(0);
        target.extend_from_range(&source, 1, 2);
        assert!(target.is_null(0));
        assert!(!target.is_null(1));
    }

    #[test]
    fn test_truncate() {
        let mut presence = Presence::Nulls(5);
        presence.truncate(2);
        assert_eq!(presence.len(), 2);
        assert_eq!(presence.count_nulls(), 2);
    }
}
