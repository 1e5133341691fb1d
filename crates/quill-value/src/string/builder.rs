//! Growable byte and UTF-16 builders

const MIN_CAPACITY: usize = 16;

/// Growable byte-string builder
///
/// Capacity doubles when an append does not fit, so repeated appends are
/// amortized O(1).
#[derive(Clone, Default, PartialEq, Eq)]
pub struct BinaryBuf {
    data: Vec<u8>,
}

impl BinaryBuf {
    /// Create an empty builder
    pub fn new() -> Self {
        Self { data: Vec::new() }
    }

    /// Create an empty builder with room for `capacity` bytes
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            data: Vec::with_capacity(capacity),
        }
    }

    /// Create a builder holding a copy of `bytes`
    pub fn from_bytes(bytes: &[u8]) -> Self {
        let mut buf = Self::with_capacity(bytes.len().max(MIN_CAPACITY));
        buf.data.extend_from_slice(bytes);
        buf
    }

    /// Contents
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    /// Length in bytes
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Allocated capacity
    pub fn capacity(&self) -> usize {
        self.data.capacity()
    }

    fn ensure_capacity(&mut self, extra: usize) {
        let needed = self.data.len() + extra;
        if needed > self.data.capacity() {
            let target = needed.max(self.data.capacity() * 2).max(MIN_CAPACITY);
            self.data.reserve_exact(target - self.data.len());
        }
    }

    /// Append one byte
    pub fn push(&mut self, byte: u8) {
        self.ensure_capacity(1);
        self.data.push(byte);
    }

    /// Append bytes
    pub fn append(&mut self, bytes: &[u8]) {
        self.ensure_capacity(bytes.len());
        self.data.extend_from_slice(bytes);
    }

    /// Byte at `index`
    pub fn byte_at(&self, index: usize) -> Option<u8> {
        self.data.get(index).copied()
    }

    /// Overwrite the byte at `index`, padding with spaces when past the end
    pub fn set_byte_at(&mut self, index: usize, byte: u8) {
        if index >= self.data.len() {
            self.ensure_capacity(index + 1 - self.data.len());
            self.data.resize(index, b' ');
            self.data.push(byte);
        } else {
            self.data[index] = byte;
        }
    }

    /// Shorten to `len` bytes
    pub fn truncate(&mut self, len: usize) {
        self.data.truncate(len);
    }

    /// Consume into the underlying vector
    pub fn into_vec(self) -> Vec<u8> {
        self.data
    }
}

impl From<Vec<u8>> for BinaryBuf {
    fn from(data: Vec<u8>) -> Self {
        Self { data }
    }
}

impl std::fmt::Debug for BinaryBuf {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "b{:?}", String::from_utf8_lossy(&self.data))
    }
}

/// Growable UTF-16 string builder
#[derive(Clone, Default, PartialEq, Eq)]
pub struct UnicodeBuf {
    units: Vec<u16>,
}

impl UnicodeBuf {
    /// Create an empty builder
    pub fn new() -> Self {
        Self { units: Vec::new() }
    }

    /// Create a builder from UTF-16 code units
    pub fn from_units(units: &[u16]) -> Self {
        let mut buf = Self::new();
        buf.append(units);
        buf
    }

    /// Create a builder from a Rust string
    pub fn from_text(s: &str) -> Self {
        Self {
            units: s.encode_utf16().collect(),
        }
    }

    /// Contents
    pub fn as_units(&self) -> &[u16] {
        &self.units
    }

    /// Length in code units
    pub fn len(&self) -> usize {
        self.units.len()
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    fn ensure_capacity(&mut self, extra: usize) {
        let needed = self.units.len() + extra;
        if needed > self.units.capacity() {
            let target = needed.max(self.units.capacity() * 2).max(MIN_CAPACITY);
            self.units.reserve_exact(target - self.units.len());
        }
    }

    /// Append code units
    pub fn append(&mut self, units: &[u16]) {
        self.ensure_capacity(units.len());
        self.units.extend_from_slice(units);
    }

    /// Append a Rust string
    pub fn append_str(&mut self, s: &str) {
        self.ensure_capacity(s.len());
        self.units.extend(s.encode_utf16());
    }

    /// Code unit at `index`
    pub fn unit_at(&self, index: usize) -> Option<u16> {
        self.units.get(index).copied()
    }

    /// Overwrite the unit at `index`, padding with spaces when past the end
    pub fn set_unit_at(&mut self, index: usize, unit: u16) {
        if index >= self.units.len() {
            self.ensure_capacity(index + 1 - self.units.len());
            self.units.resize(index, 0x20);
            self.units.push(unit);
        } else {
            self.units[index] = unit;
        }
    }

    /// Lossy conversion to a Rust string
    pub fn to_string_lossy(&self) -> String {
        String::from_utf16_lossy(&self.units)
    }
}

impl std::fmt::Debug for UnicodeBuf {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "u{:?}", self.to_string_lossy())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_binary_doubling() {
        let mut buf = BinaryBuf::new();
        buf.append(b"0123456789abcdef");
        let cap = buf.capacity();
        buf.push(b'!');
        assert!(buf.capacity() >= cap * 2);
        assert_eq!(buf.len(), 17);
    }

    #[test]
    fn test_set_byte_pads() {
        let mut buf = BinaryBuf::from_bytes(b"ab");
        buf.set_byte_at(4, b'z');
        assert_eq!(buf.as_bytes(), b"ab  z");
        buf.set_byte_at(0, b'A');
        assert_eq!(buf.as_bytes(), b"Ab  z");
    }

    #[test]
    fn test_unicode_builder() {
        let mut buf = UnicodeBuf::from_text("h\u{e9}");
        buf.append_str("llo");
        assert_eq!(buf.len(), 5);
        assert_eq!(buf.to_string_lossy(), "h\u{e9}llo");
        assert_eq!(buf.unit_at(1), Some(0xE9));
    }
}
