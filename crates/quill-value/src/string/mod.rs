//! String family
//!
//! Strings come in two code-unit widths: binary (bytes) and unicode (UTF-16
//! units). Each width has a growable builder; binary strings additionally have
//! a chunked builder for very large content, and both widths have an interned
//! immutable form. Values of different widths are never equal at the storage
//! level; loose comparison between widths transcodes through the active
//! [`TextEncoding`](crate::config::TextEncoding).

mod builder;
mod interned;
mod large;

pub use builder::{BinaryBuf, UnicodeBuf};
pub use interned::{InternedString, StringTable, well_known};
pub use large::LargeBinaryBuf;

use crate::config::{self, TextEncoding};
use crate::key::ArrayKey;
use crate::numeric;
use crate::value::ValueType;
use rustc_hash::FxHasher;
use std::borrow::Cow;
use std::cmp::Ordering;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

/// Code-unit width of a string
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StringWidth {
    /// 8-bit bytes
    Binary,
    /// 16-bit UTF-16 code units
    Unicode,
}

/// Hash a binary string
///
/// Hashes are over code units, so a binary and a unicode string spelling the
/// same units hash alike and can address the same array key.
pub(crate) fn hash_bytes(bytes: &[u8]) -> u64 {
    let mut hasher = FxHasher::default();
    for byte in bytes {
        hasher.write_u16(u16::from(*byte));
    }
    hasher.finish()
}

/// Hash a unicode string
pub(crate) fn hash_units(units: &[u16]) -> u64 {
    let mut hasher = FxHasher::default();
    for unit in units {
        hasher.write_u16(*unit);
    }
    hasher.finish()
}

/// Decode bytes into UTF-16 code units
///
/// Invalid UTF-8 is decoded one byte per code unit and logged.
pub fn decode_bytes(bytes: &[u8], encoding: TextEncoding) -> Vec<u16> {
    match encoding {
        TextEncoding::Latin1 => bytes.iter().map(|&b| b as u16).collect(),
        TextEncoding::Utf8 => match std::str::from_utf8(bytes) {
            Ok(s) => s.encode_utf16().collect(),
            Err(err) => {
                tracing::warn!(
                    target: "quill::string",
                    valid_up_to = err.valid_up_to(),
                    "invalid UTF-8 while decoding binary string"
                );
                bytes.iter().map(|&b| b as u16).collect()
            }
        },
    }
}

/// Encode UTF-16 code units into bytes
///
/// Unpaired surrogates (UTF-8) and units above 0xFF (Latin-1) are replaced and
/// logged.
pub fn encode_units(units: &[u16], encoding: TextEncoding) -> Vec<u8> {
    match encoding {
        TextEncoding::Latin1 => {
            if units.iter().any(|&u| u > 0xFF) {
                tracing::warn!(
                    target: "quill::string",
                    "unit outside Latin-1 while encoding unicode string"
                );
            }
            units
                .iter()
                .map(|&u| if u <= 0xFF { u as u8 } else { b'?' })
                .collect()
        }
        TextEncoding::Utf8 => match String::from_utf16(units) {
            Ok(s) => s.into_bytes(),
            Err(_) => {
                tracing::warn!(
                    target: "quill::string",
                    "unpaired surrogate while encoding unicode string"
                );
                String::from_utf16_lossy(units).into_bytes()
            }
        },
    }
}

/// A string value
#[derive(Clone)]
pub enum StringBuf {
    /// Growable byte builder
    Binary(BinaryBuf),
    /// Growable UTF-16 builder
    Unicode(UnicodeBuf),
    /// Immutable interned string (either width)
    Interned(Arc<InternedString>),
    /// Chunked byte builder for large content
    Large(LargeBinaryBuf),
}

impl StringBuf {
    /// Empty binary string
    pub fn new() -> Self {
        StringBuf::Binary(BinaryBuf::new())
    }

    /// Binary string holding `bytes`
    ///
    /// Content at or above the large-string threshold goes straight into a
    /// chunked builder.
    pub fn from_bytes(bytes: &[u8]) -> Self {
        let (threshold, chunk_size) =
            config::with_active(|c| (c.large_threshold, c.large_chunk_size));
        if bytes.len() >= threshold {
            StringBuf::Large(LargeBinaryBuf::from_bytes(chunk_size, bytes))
        } else {
            StringBuf::Binary(BinaryBuf::from_bytes(bytes))
        }
    }

    /// Unicode string holding the UTF-16 form of `s`
    pub fn unicode(s: &str) -> Self {
        StringBuf::Unicode(UnicodeBuf::from_text(s))
    }

    /// Unicode string holding `units`
    pub fn from_units(units: &[u16]) -> Self {
        StringBuf::Unicode(UnicodeBuf::from_units(units))
    }

    /// String literal following the active semantics (unicode or binary)
    pub fn literal(s: &str) -> Self {
        if config::unicode_semantics() {
            Self::unicode(s)
        } else {
            Self::from_bytes(s.as_bytes())
        }
    }

    /// Globally interned binary string
    pub fn interned(s: &str) -> Self {
        StringBuf::Interned(InternedString::intern(s))
    }

    /// Code-unit width
    pub fn width(&self) -> StringWidth {
        match self {
            StringBuf::Binary(_) | StringBuf::Large(_) => StringWidth::Binary,
            StringBuf::Unicode(_) => StringWidth::Unicode,
            StringBuf::Interned(s) => s.width(),
        }
    }

    /// Check if this is a binary string
    pub fn is_binary(&self) -> bool {
        self.width() == StringWidth::Binary
    }

    /// Check if this is a unicode string
    pub fn is_unicode(&self) -> bool {
        self.width() == StringWidth::Unicode
    }

    /// Length in code units
    pub fn len(&self) -> usize {
        match self {
            StringBuf::Binary(b) => b.len(),
            StringBuf::Unicode(u) => u.len(),
            StringBuf::Interned(s) => s.len(),
            StringBuf::Large(l) => l.len(),
        }
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Code unit at `index`
    pub fn unit_at(&self, index: usize) -> Option<u32> {
        match self {
            StringBuf::Binary(b) => b.byte_at(index).map(u32::from),
            StringBuf::Unicode(u) => u.unit_at(index).map(u32::from),
            StringBuf::Large(l) => l.byte_at(index).map(u32::from),
            StringBuf::Interned(s) => match s.as_bytes() {
                Some(bytes) => bytes.get(index).map(|&b| u32::from(b)),
                None => s
                    .as_units()
                    .and_then(|units| units.get(index))
                    .map(|&u| u32::from(u)),
            },
        }
    }

    /// One-unit string at `index` (string offset read)
    pub fn char_at(&self, index: usize) -> Option<StringBuf> {
        let unit = self.unit_at(index)?;
        Some(match self.width() {
            StringWidth::Binary => StringBuf::Interned(InternedString::single_byte(unit as u8)),
            StringWidth::Unicode => StringBuf::from_units(&[unit as u16]),
        })
    }

    /// Byte view, transcoding unicode through the active encoding
    pub fn bytes(&self) -> Cow<'_, [u8]> {
        match self {
            StringBuf::Binary(b) => Cow::Borrowed(b.as_bytes()),
            StringBuf::Large(l) => Cow::Owned(l.to_vec()),
            StringBuf::Unicode(u) => Cow::Owned(encode_units(u.as_units(), config::encoding())),
            StringBuf::Interned(s) => match s.as_bytes() {
                Some(bytes) => Cow::Borrowed(bytes),
                None => Cow::Owned(encode_units(s.as_units().unwrap_or(&[]), config::encoding())),
            },
        }
    }

    /// UTF-16 view, transcoding binary through the active encoding
    pub fn units(&self) -> Cow<'_, [u16]> {
        match self {
            StringBuf::Unicode(u) => Cow::Borrowed(u.as_units()),
            StringBuf::Binary(b) => Cow::Owned(decode_bytes(b.as_bytes(), config::encoding())),
            StringBuf::Large(l) => Cow::Owned(decode_bytes(&l.to_vec(), config::encoding())),
            StringBuf::Interned(s) => match s.as_units() {
                Some(units) => Cow::Borrowed(units),
                None => Cow::Owned(decode_bytes(s.as_bytes().unwrap_or(&[]), config::encoding())),
            },
        }
    }

    /// Binary form of this string
    pub fn to_binary(&self) -> StringBuf {
        match self.width() {
            StringWidth::Binary => self.clone(),
            StringWidth::Unicode => StringBuf::from_bytes(&self.bytes()),
        }
    }

    /// Unicode form of this string
    pub fn to_unicode(&self) -> StringBuf {
        match self.width() {
            StringWidth::Unicode => self.clone(),
            StringWidth::Binary => StringBuf::from_units(&self.units()),
        }
    }

    /// Lossy conversion to a Rust string
    pub fn to_string_lossy(&self) -> String {
        match self {
            StringBuf::Unicode(u) => u.to_string_lossy(),
            StringBuf::Interned(s) => s.to_string_lossy(),
            _ => String::from_utf8_lossy(&self.bytes()).into_owned(),
        }
    }

    /// Numeric classification
    pub fn value_type(&self) -> ValueType {
        match self {
            StringBuf::Interned(s) => s.value_type(),
            StringBuf::Unicode(u) => numeric::classify(u.as_units()),
            _ => numeric::classify(&self.bytes()),
        }
    }

    /// Check if the whole string is a numeric literal
    pub fn is_numeric(&self) -> bool {
        self.value_type().is_number_cmp()
    }

    /// Integer value
    pub fn to_long(&self) -> i64 {
        match self {
            StringBuf::Interned(s) => s.to_long(),
            StringBuf::Unicode(u) => numeric::parse_long(u.as_units()),
            _ => numeric::parse_long(&self.bytes()),
        }
    }

    /// Float value
    pub fn to_double(&self) -> f64 {
        match self {
            StringBuf::Interned(s) => s.to_double(),
            StringBuf::Unicode(u) => numeric::parse_double(u.as_units()),
            _ => numeric::parse_double(&self.bytes()),
        }
    }

    /// Truthiness: only `""` and `"0"` are false
    pub fn to_bool(&self) -> bool {
        match self.len() {
            0 => false,
            1 => self.unit_at(0) != Some(u32::from(b'0')),
            _ => true,
        }
    }

    /// Canonical integer key, if this string is one
    pub fn int_key(&self) -> Option<i64> {
        match self {
            StringBuf::Interned(s) => s.int_key(),
            StringBuf::Unicode(u) => numeric::canonical_key(u.as_units()),
            StringBuf::Binary(b) => numeric::canonical_key(b.as_bytes()),
            // "-9223372036854775808" is the longest canonical key
            StringBuf::Large(l) if l.len() <= 20 => numeric::canonical_key(&l.to_vec()),
            StringBuf::Large(_) => None,
        }
    }

    /// Normalized array key
    pub fn to_key(&self) -> ArrayKey {
        if let Some(i) = self.int_key() {
            return ArrayKey::Int(i);
        }
        ArrayKey::Str(self.to_interned())
    }

    /// Immutable form with cached hash and numeric forms
    ///
    /// Builders are frozen into a fresh (untabled) interned string.
    pub fn to_interned(&self) -> Arc<InternedString> {
        match self {
            StringBuf::Interned(s) => s.clone(),
            StringBuf::Unicode(u) => Arc::new(InternedString::unicode(u.as_units())),
            _ => Arc::new(InternedString::binary(&self.bytes())),
        }
    }

    /// Storage hash; consistent with `==`
    pub fn hash_value(&self) -> u64 {
        match self {
            StringBuf::Interned(s) => s.hash_value(),
            StringBuf::Unicode(u) => hash_units(u.as_units()),
            _ => hash_bytes(&self.bytes()),
        }
    }

    fn make_builder(&mut self) {
        if let StringBuf::Interned(s) = self {
            *self = match s.as_bytes() {
                Some(bytes) => StringBuf::Binary(BinaryBuf::from_bytes(bytes)),
                None => StringBuf::Unicode(UnicodeBuf::from_units(s.as_units().unwrap_or(&[]))),
            };
        }
    }

    /// Append bytes (decoded through the active encoding for unicode strings)
    pub fn append_bytes(&mut self, bytes: &[u8]) {
        self.make_builder();
        match self {
            StringBuf::Binary(buf) => {
                let (threshold, chunk_size) =
                    config::with_active(|c| (c.large_threshold, c.large_chunk_size));
                if buf.len() + bytes.len() >= threshold {
                    let mut large = LargeBinaryBuf::from_bytes(chunk_size, buf.as_bytes());
                    large.append(bytes);
                    tracing::trace!(
                        target: "quill::string",
                        len = large.len(),
                        chunk_size,
                        "promoted binary builder to chunked storage"
                    );
                    *self = StringBuf::Large(large);
                } else {
                    buf.append(bytes);
                }
            }
            StringBuf::Large(large) => large.append(bytes),
            StringBuf::Unicode(u) => u.append(&decode_bytes(bytes, config::encoding())),
            StringBuf::Interned(_) => {}
        }
    }

    /// Append a Rust string
    pub fn append_str(&mut self, s: &str) {
        if let StringBuf::Unicode(u) = self {
            u.append_str(s);
        } else if self.is_unicode() {
            self.make_builder();
            self.append_str(s);
        } else {
            self.append_bytes(s.as_bytes());
        }
    }

    /// Append another string, transcoding to this string's width
    pub fn append(&mut self, other: &StringBuf) {
        match self.width() {
            StringWidth::Binary => self.append_bytes(&other.bytes()),
            StringWidth::Unicode => {
                self.make_builder();
                if let StringBuf::Unicode(u) = self {
                    u.append(&other.units());
                }
            }
        }
    }

    /// Half-open substring by code-unit position (clamped)
    pub fn substring(&self, start: usize, end: usize) -> StringBuf {
        let end = end.min(self.len());
        let start = start.min(end);
        match self.width() {
            StringWidth::Binary => StringBuf::from_bytes(&self.bytes()[start..end]),
            StringWidth::Unicode => StringBuf::from_units(&self.units()[start..end]),
        }
    }

    /// Content ordering; strings of different widths compare as UTF-16
    pub fn content_cmp(&self, other: &StringBuf) -> Ordering {
        if self.is_binary() && other.is_binary() {
            self.bytes().as_ref().cmp(other.bytes().as_ref())
        } else {
            self.units().as_ref().cmp(other.units().as_ref())
        }
    }

    /// Content equality across widths
    pub fn content_eq(&self, other: &StringBuf) -> bool {
        self.content_cmp(other) == Ordering::Equal
    }
}

impl Default for StringBuf {
    fn default() -> Self {
        Self::new()
    }
}

/// Storage equality: same width and same code units
impl PartialEq for StringBuf {
    fn eq(&self, other: &Self) -> bool {
        if let (StringBuf::Interned(a), StringBuf::Interned(b)) = (self, other) {
            return Arc::ptr_eq(a, b) || **a == **b;
        }
        if self.width() != other.width() || self.len() != other.len() {
            return false;
        }
        match self.width() {
            StringWidth::Binary => self.bytes() == other.bytes(),
            StringWidth::Unicode => self.units() == other.units(),
        }
    }
}

impl Eq for StringBuf {}

impl Hash for StringBuf {
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write_u64(self.hash_value());
    }
}

impl From<&str> for StringBuf {
    fn from(s: &str) -> Self {
        StringBuf::from_bytes(s.as_bytes())
    }
}

impl From<String> for StringBuf {
    fn from(s: String) -> Self {
        StringBuf::from(s.into_bytes())
    }
}

impl From<&[u8]> for StringBuf {
    fn from(bytes: &[u8]) -> Self {
        StringBuf::from_bytes(bytes)
    }
}

impl From<Vec<u8>> for StringBuf {
    fn from(bytes: Vec<u8>) -> Self {
        let threshold = config::with_active(|c| c.large_threshold);
        if bytes.len() >= threshold {
            StringBuf::from_bytes(&bytes)
        } else {
            StringBuf::Binary(BinaryBuf::from(bytes))
        }
    }
}

impl From<Arc<InternedString>> for StringBuf {
    fn from(s: Arc<InternedString>) -> Self {
        StringBuf::Interned(s)
    }
}

impl std::fmt::Debug for StringBuf {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StringBuf::Binary(b) => b.fmt(f),
            StringBuf::Unicode(u) => u.fmt(f),
            StringBuf::Interned(s) => s.fmt(f),
            StringBuf::Large(l) => l.fmt(f),
        }
    }
}

impl std::fmt::Display for StringBuf {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_string_lossy())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RuntimeConfig;

    #[test]
    fn test_storage_equality_requires_same_width() {
        let b = StringBuf::from("abc");
        let u = StringBuf::unicode("abc");
        assert_ne!(b, u);
        assert!(b.content_eq(&u));
        assert_eq!(b, StringBuf::interned("abc"));
        assert_eq!(b.hash_value(), StringBuf::interned("abc").hash_value());
    }

    #[test]
    fn test_large_promotion_on_append() {
        let _guard = RuntimeConfig::default().with_large_strings(16, 32).install();
        let mut s = StringBuf::from("0123456789");
        s.append_bytes(&[b'x'; 30]);
        assert!(matches!(s, StringBuf::Large(_)));
        assert_eq!(s.len(), 40);
        assert_eq!(&s.bytes()[..10], b"0123456789");
        assert_eq!(s, StringBuf::Binary(BinaryBuf::from_bytes(&s.bytes())));
    }

    #[test]
    fn test_large_from_bytes_round_trip() {
        let data: Vec<u8> = (0..5000u32).map(|i| (i % 256) as u8).collect();
        let s = StringBuf::from_bytes(&data);
        match &s {
            StringBuf::Large(large) => {
                assert_eq!(large.chunk_size(), 4096);
                assert_eq!(large.chunk_count(), 2);
            }
            other => panic!("expected chunked storage, got {other:?}"),
        }
        assert_eq!(s.bytes().as_ref(), data.as_slice());
    }

    #[test]
    fn test_append_to_interned_copies() {
        let mut s = StringBuf::interned("foo");
        s.append_str("bar");
        assert!(matches!(s, StringBuf::Binary(_)));
        assert_eq!(s.to_string(), "foobar");
        assert_eq!(InternedString::intern("foo").len(), 3);
    }

    #[test]
    fn test_cross_width_append_transcodes() {
        let mut u = StringBuf::unicode("caf");
        u.append(&StringBuf::from("\u{e9}"));
        assert!(u.is_unicode());
        assert_eq!(u.to_string(), "caf\u{e9}");

        let mut b = StringBuf::from("caf");
        b.append(&StringBuf::unicode("\u{e9}"));
        assert!(b.is_binary());
        assert_eq!(b.bytes().as_ref(), "caf\u{e9}".as_bytes());
    }

    #[test]
    fn test_latin1_transcoding() {
        let _guard = RuntimeConfig::default()
            .with_encoding(TextEncoding::Latin1)
            .install();
        let b = StringBuf::from_bytes(&[0x63, 0xE9]);
        assert_eq!(b.units().as_ref(), &[0x63, 0xE9]);
        assert_eq!(StringBuf::unicode("\u{e9}").bytes().as_ref(), &[0xE9]);
    }

    #[test]
    fn test_invalid_utf8_decodes_bytewise() {
        let b = StringBuf::from_bytes(&[0x61, 0xFF]);
        assert_eq!(b.units().as_ref(), &[0x61, 0xFF]);
    }

    #[test]
    fn test_numeric_forms() {
        assert_eq!(StringBuf::from("42").to_long(), 42);
        assert_eq!(StringBuf::unicode("2.5").to_double(), 2.5);
        assert!(StringBuf::from(" 7 ").is_numeric());
        assert!(!StringBuf::from("7a").is_numeric());
        assert!(!StringBuf::from("0").to_bool());
        assert!(!StringBuf::from("").to_bool());
        assert!(StringBuf::from("0.0").to_bool());
    }

    #[test]
    fn test_key_normalization() {
        assert_eq!(StringBuf::from("8").to_key(), ArrayKey::Int(8));
        assert_eq!(StringBuf::unicode("8").to_key(), ArrayKey::Int(8));
        assert!(matches!(StringBuf::from("08").to_key(), ArrayKey::Str(_)));
    }

    #[test]
    fn test_key_normalization_of_chunked_strings() {
        let _guard = RuntimeConfig::default().with_large_strings(4096, 1).install();
        let five = StringBuf::from("5");
        assert!(matches!(five, StringBuf::Large(_)));
        assert_eq!(five.to_key(), ArrayKey::Int(5));
        assert_eq!(
            StringBuf::from("-9223372036854775808").to_key(),
            ArrayKey::Int(i64::MIN)
        );
        assert!(matches!(StringBuf::from("05").to_key(), ArrayKey::Str(_)));
    }

    #[test]
    fn test_char_at_and_substring() {
        let s = StringBuf::from("hello");
        assert_eq!(s.char_at(1), Some(StringBuf::from("e")));
        assert_eq!(s.char_at(9), None);
        assert_eq!(s.substring(1, 3), StringBuf::from("el"));
        assert_eq!(s.substring(3, 99), StringBuf::from("lo"));
        assert_eq!(StringBuf::unicode("h\u{e9}").char_at(1), Some(StringBuf::unicode("\u{e9}")));
    }

    #[test]
    fn test_literal_follows_semantics() {
        assert!(StringBuf::literal("x").is_binary());
        let _guard = RuntimeConfig::default().with_unicode_semantics(true).install();
        assert!(StringBuf::literal("x").is_unicode());
    }
}
