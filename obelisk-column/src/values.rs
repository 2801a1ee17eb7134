//! Raw column storage as a byte buffer with typed element access.

/// A growable byte buffer holding the raw storage of a column.
///
/// The buffer itself is untyped; the owning column tracks the element kind
/// and size. Elements are appended and read through `bytemuck`-checked
/// conversions, so any fixed-size primitive can be stored without a
/// dedicated buffer type per kind. Reads go through unaligned loads, which
/// keeps the storage a plain `Vec<u8>`.
#[derive(Debug, Clone, Default)]
pub struct Values(Vec<u8>);

impl Values {
    /// Creates a new, empty `Values` buffer.
    pub fn new() -> Values {
        Values(Vec::new())
    }

    /// Creates a new `Values` buffer with the given byte capacity reserved.
    pub fn with_byte_capacity(capacity: usize) -> Values {
        Values(Vec::with_capacity(capacity))
    }

    /// Returns the length of the buffer in bytes.
    #[inline]
    pub fn bytes_len(&self) -> usize {
        self.0.len()
    }

    /// Returns `true` if the buffer holds no bytes.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns the underlying bytes.
    #[inline]
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Appends a single fixed-size element.
    #[inline]
    pub fn push<T: bytemuck::NoUninit>(&mut self, value: T) {
        self.0.extend_from_slice(bytemuck::bytes_of(&value));
    }

    /// Reads the element at the given index, interpreting the buffer as a
    /// dense array of `T`.
    ///
    /// # Panics
    ///
    /// Panics if the byte range for `index` is out of bounds.
    #[inline]
    pub fn get<T: bytemuck::AnyBitPattern>(&self, index: usize) -> T {
        let size = std::mem::size_of::<T>();
        bytemuck::pod_read_unaligned(&self.0[index * size..(index + 1) * size])
    }

    /// Appends raw bytes to the buffer.
    #[inline]
    pub fn extend_from_slice(&mut self, bytes: &[u8]) {
        self.0.extend_from_slice(bytes);
    }

    /// Appends `count` zero bytes.
    pub fn extend_zeroed(&mut self, count: usize) {
        self.0.resize(self.0.len() + count, 0);
    }

    /// Truncates the buffer to `len` bytes.
    pub fn truncate_bytes(&mut self, len: usize) {
        self.0.truncate(len);
    }

    /// Reserves capacity for at least `additional` more bytes.
    pub fn reserve_bytes(&mut self, additional: usize) {
        self.0.reserve(additional);
    }

    /// Returns the number of bytes the buffer has allocated.
    pub fn allocated_bytes(&self) -> usize {
        self.0.capacity()
    }

    /// Drops excess capacity.
    pub fn shrink_to_fit(&mut self) {
        self.0.shrink_to_fit();
    }
}
