//! Interned immutable strings
//!
//! An interned string is frozen at construction and caches everything the
//! engine asks of a string repeatedly: its hash, numeric classification,
//! integer and float values and canonical array-key form. Array string keys
//! are stored as interned strings so key clones are reference-count bumps.

use super::{StringWidth, hash_bytes, hash_units};
use crate::numeric;
use crate::value::ValueType;
use dashmap::DashMap;
use smallvec::SmallVec;
use std::sync::{Arc, LazyLock};

/// Strings sharing one hash
type Bucket = SmallVec<[Arc<InternedString>; 1]>;

/// Intern table keyed by content hash
type InternTable = DashMap<u64, Bucket>;

/// Global binary intern table
static BINARY_TABLE: LazyLock<InternTable> = LazyLock::new(DashMap::new);

/// Global unicode intern table
static UNICODE_TABLE: LazyLock<InternTable> = LazyLock::new(DashMap::new);

/// Interned forms of the integers 0..=255
static SMALL_INTS: LazyLock<Vec<Arc<InternedString>>> = LazyLock::new(|| {
    (0..=255i64)
        .map(|i| {
            let mut buf = itoa::Buffer::new();
            InternedString::intern(buf.format(i))
        })
        .collect()
});

/// Interned single-byte strings
static SINGLE_BYTES: LazyLock<Vec<Arc<InternedString>>> = LazyLock::new(|| {
    (0..=255u8)
        .map(|b| InternedString::intern_bytes(&[b]))
        .collect()
});

#[derive(Clone, PartialEq, Eq)]
pub(crate) enum Text {
    Binary(Box<[u8]>),
    Unicode(Box<[u16]>),
}

/// Immutable string with precomputed hash, numeric form and key form
pub struct InternedString {
    text: Text,
    hash: u64,
    value_type: ValueType,
    long_value: i64,
    double_value: f64,
    key: Option<i64>,
}

impl InternedString {
    /// Freeze a byte string (not added to any table)
    pub fn binary(bytes: &[u8]) -> Self {
        Self {
            hash: hash_bytes(bytes),
            value_type: numeric::classify(bytes),
            long_value: numeric::parse_long(bytes),
            double_value: numeric::parse_double(bytes),
            key: numeric::canonical_key(bytes),
            text: Text::Binary(bytes.into()),
        }
    }

    /// Freeze a UTF-16 string (not added to any table)
    pub fn unicode(units: &[u16]) -> Self {
        Self {
            hash: hash_units(units),
            value_type: numeric::classify(units),
            long_value: numeric::parse_long(units),
            double_value: numeric::parse_double(units),
            key: numeric::canonical_key(units),
            text: Text::Unicode(units.into()),
        }
    }

    /// Create or retrieve a binary string from the global table
    pub fn intern(s: &str) -> Arc<Self> {
        Self::intern_bytes(s.as_bytes())
    }

    /// Create or retrieve a binary string from the global table
    pub fn intern_bytes(bytes: &[u8]) -> Arc<Self> {
        intern_in(&BINARY_TABLE, hash_bytes(bytes), bytes, Self::binary)
    }

    /// Create or retrieve a unicode string from the global table
    pub fn intern_units(units: &[u16]) -> Arc<Self> {
        intern_in(&UNICODE_TABLE, hash_units(units), units, Self::unicode)
    }

    /// Interned decimal form of a small integer (0..=255)
    pub fn small_int(i: i64) -> Option<Arc<Self>> {
        usize::try_from(i).ok().and_then(|i| SMALL_INTS.get(i)).cloned()
    }

    /// Interned one-byte string
    pub fn single_byte(byte: u8) -> Arc<Self> {
        SINGLE_BYTES[byte as usize].clone()
    }

    /// Code-unit width
    pub fn width(&self) -> StringWidth {
        match self.text {
            Text::Binary(_) => StringWidth::Binary,
            Text::Unicode(_) => StringWidth::Unicode,
        }
    }

    /// Length in code units
    pub fn len(&self) -> usize {
        match &self.text {
            Text::Binary(b) => b.len(),
            Text::Unicode(u) => u.len(),
        }
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Bytes of a binary string
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match &self.text {
            Text::Binary(b) => Some(b),
            Text::Unicode(_) => None,
        }
    }

    /// Code units of a unicode string
    pub fn as_units(&self) -> Option<&[u16]> {
        match &self.text {
            Text::Binary(_) => None,
            Text::Unicode(u) => Some(u),
        }
    }

    /// Precomputed hash
    pub fn hash_value(&self) -> u64 {
        self.hash
    }

    /// Cached numeric classification
    pub fn value_type(&self) -> ValueType {
        self.value_type
    }

    /// Cached integer value
    pub fn to_long(&self) -> i64 {
        self.long_value
    }

    /// Cached float value
    pub fn to_double(&self) -> f64 {
        self.double_value
    }

    /// Cached canonical integer key, if the string is one
    pub fn int_key(&self) -> Option<i64> {
        self.key
    }

    /// Code-unit equality regardless of width
    pub fn content_eq(&self, other: &InternedString) -> bool {
        if self.hash != other.hash {
            return false;
        }
        match (&self.text, &other.text) {
            (Text::Binary(a), Text::Binary(b)) => a == b,
            (Text::Unicode(a), Text::Unicode(b)) => a == b,
            (Text::Binary(b), Text::Unicode(u)) | (Text::Unicode(u), Text::Binary(b)) => {
                b.len() == u.len() && b.iter().zip(u.iter()).all(|(&b, &u)| u16::from(b) == u)
            }
        }
    }

    /// Lossy conversion to a Rust string
    pub fn to_string_lossy(&self) -> String {
        match &self.text {
            Text::Binary(b) => String::from_utf8_lossy(b).into_owned(),
            Text::Unicode(u) => String::from_utf16_lossy(u),
        }
    }
}

impl PartialEq for InternedString {
    fn eq(&self, other: &Self) -> bool {
        self.hash == other.hash && self.text == other.text
    }
}

impl Eq for InternedString {}

impl std::fmt::Debug for InternedString {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.text {
            Text::Binary(_) => write!(f, "{:?}", self.to_string_lossy()),
            Text::Unicode(_) => write!(f, "u{:?}", self.to_string_lossy()),
        }
    }
}

fn intern_in<T: PartialEq>(
    table: &InternTable,
    hash: u64,
    text: &[T],
    make: fn(&[T]) -> InternedString,
) -> Arc<InternedString>
where
    InternedString: HasText<T>,
{
    if let Some(bucket) = table.get(&hash)
        && let Some(existing) = bucket.iter().find(|s| s.same_text(text))
    {
        return existing.clone();
    }
    let mut bucket = table.entry(hash).or_default();
    if let Some(existing) = bucket.iter().find(|s| s.same_text(text)) {
        return existing.clone();
    }
    let interned = Arc::new(make(text));
    bucket.push(interned.clone());
    interned
}

/// Content comparison against a unit slice of a given width
pub(crate) trait HasText<T> {
    fn same_text(&self, text: &[T]) -> bool;
}

impl HasText<u8> for InternedString {
    fn same_text(&self, text: &[u8]) -> bool {
        self.as_bytes() == Some(text)
    }
}

impl HasText<u16> for InternedString {
    fn same_text(&self, text: &[u16]) -> bool {
        self.as_units() == Some(text)
    }
}

/// Per-context string table
///
/// Isolates interning for one execution context; the global table is shared
/// by every context in the process.
pub struct StringTable {
    binary: InternTable,
    unicode: InternTable,
}

impl StringTable {
    /// Create an empty table
    pub fn new() -> Self {
        Self {
            binary: DashMap::new(),
            unicode: DashMap::new(),
        }
    }

    /// Intern a byte string in this table
    pub fn intern_bytes(&self, bytes: &[u8]) -> Arc<InternedString> {
        intern_in(&self.binary, hash_bytes(bytes), bytes, InternedString::binary)
    }

    /// Intern a UTF-16 string in this table
    pub fn intern_units(&self, units: &[u16]) -> Arc<InternedString> {
        intern_in(&self.unicode, hash_units(units), units, InternedString::unicode)
    }

    /// Check if a byte string is interned in this table
    pub fn is_interned(&self, bytes: &[u8]) -> bool {
        self.binary
            .get(&hash_bytes(bytes))
            .is_some_and(|bucket| bucket.iter().any(|s| s.same_text(bytes)))
    }

    /// Number of interned strings
    pub fn len(&self) -> usize {
        let count = |table: &InternTable| table.iter().map(|bucket| bucket.len()).sum::<usize>();
        count(&self.binary) + count(&self.unicode)
    }

    /// Check if the table is empty
    pub fn is_empty(&self) -> bool {
        self.binary.is_empty() && self.unicode.is_empty()
    }
}

impl Default for StringTable {
    fn default() -> Self {
        Self::new()
    }
}

/// Frequently used strings
pub mod well_known {
    use super::*;

    macro_rules! well_known_string {
        ($name:ident, $value:literal) => {
            /// Well-known string constant
            pub static $name: LazyLock<Arc<InternedString>> =
                LazyLock::new(|| InternedString::intern($value));
        };
    }

    well_known_string!(EMPTY, "");
    well_known_string!(ONE, "1");
    well_known_string!(KEY, "key");
    well_known_string!(VALUE, "value");
    well_known_string!(ARRAY, "Array");
    well_known_string!(OBJECT, "Object");
    well_known_string!(STD_CLASS, "stdClass");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_interning() {
        let a = InternedString::intern("hello");
        let b = InternedString::intern("hello");
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(a.width(), StringWidth::Binary);
    }

    #[test]
    fn test_hash_collisions_keep_both_strings() {
        let table = InternTable::new();
        let a = intern_in(&table, 7, b"left", InternedString::binary);
        let b = intern_in(&table, 7, b"right", InternedString::binary);
        assert!(!Arc::ptr_eq(&a, &b));
        assert!(Arc::ptr_eq(&a, &intern_in(&table, 7, b"left", InternedString::binary)));
        assert!(Arc::ptr_eq(&b, &intern_in(&table, 7, b"right", InternedString::binary)));
        assert_eq!(table.get(&7).map(|bucket| bucket.len()), Some(2));
    }

    #[test]
    fn test_widths_are_separate() {
        let units: Vec<u16> = "hello".encode_utf16().collect();
        let a = InternedString::intern("hello");
        let b = InternedString::intern_units(&units);
        assert!(!Arc::ptr_eq(&a, &b));
        assert_ne!(*a, *b);
        assert!(a.content_eq(&b));
        assert!(!a.content_eq(&InternedString::intern("hellO")));
    }

    #[test]
    fn test_cached_forms() {
        let s = InternedString::binary(b"42");
        assert_eq!(s.value_type(), ValueType::LongCmp);
        assert_eq!(s.to_long(), 42);
        assert_eq!(s.to_double(), 42.0);
        assert_eq!(s.int_key(), Some(42));

        let s = InternedString::binary(b"08");
        assert_eq!(s.value_type(), ValueType::LongCmp);
        assert_eq!(s.int_key(), None);
    }

    #[test]
    fn test_small_tables() {
        let seven = InternedString::small_int(7).unwrap();
        assert_eq!(seven.as_bytes(), Some(&b"7"[..]));
        assert!(Arc::ptr_eq(&seven, &InternedString::intern("7")));
        assert!(InternedString::small_int(256).is_none());
        assert!(InternedString::small_int(-1).is_none());
        assert_eq!(InternedString::single_byte(b'a').as_bytes(), Some(&b"a"[..]));
    }

    #[test]
    fn test_context_table() {
        let table = StringTable::new();
        assert!(table.is_empty());
        let a = table.intern_bytes(b"x");
        let b = table.intern_bytes(b"x");
        assert!(Arc::ptr_eq(&a, &b));
        assert!(table.is_interned(b"x"));
        assert!(!table.is_interned(b"y"));
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn test_well_known() {
        assert_eq!(well_known::ARRAY.to_string_lossy(), "Array");
        assert!(Arc::ptr_eq(&well_known::KEY, &InternedString::intern("key")));
    }
}
