//! Normalized array keys

use crate::string::{InternedString, StringBuf};
use crate::value::Value;
use rustc_hash::FxHasher;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

/// A normalized array key: an integer or a non-canonical string
///
/// String keys that spell a canonical decimal integer never appear here; they
/// are normalized to [`ArrayKey::Int`] on the way in. String keys compare by
/// code units, so a binary and a unicode spelling of the same key are one key.
#[derive(Clone)]
pub enum ArrayKey {
    /// Integer key
    Int(i64),
    /// String key (frozen, with cached hash)
    Str(Arc<InternedString>),
}

impl ArrayKey {
    /// String key from a Rust string, normalizing canonical integers
    pub fn string(s: &str) -> Self {
        StringBuf::from(s).to_key()
    }

    /// Hash used by the array hash index
    pub fn hash_value(&self) -> u64 {
        match self {
            ArrayKey::Int(i) => {
                let mut hasher = FxHasher::default();
                hasher.write_i64(*i);
                hasher.finish()
            }
            ArrayKey::Str(s) => s.hash_value(),
        }
    }

    /// Integer key, if this is one
    pub fn as_int(&self) -> Option<i64> {
        match self {
            ArrayKey::Int(i) => Some(*i),
            ArrayKey::Str(_) => None,
        }
    }

    /// Check if this is a string key
    pub fn is_string(&self) -> bool {
        matches!(self, ArrayKey::Str(_))
    }

    /// Next append index after seeing this key
    ///
    /// Integer keys at or above `current` push the index to `key + 1`; string
    /// keys leave it unchanged.
    pub fn next_index(&self, current: i64) -> i64 {
        match self {
            ArrayKey::Int(i) if *i >= current => i.saturating_add(1),
            _ => current,
        }
    }

    /// The key as a value
    pub fn to_value(&self) -> Value {
        match self {
            ArrayKey::Int(i) => Value::Int(*i),
            ArrayKey::Str(s) => Value::Str(StringBuf::Interned(s.clone())),
        }
    }
}

impl PartialEq for ArrayKey {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (ArrayKey::Int(a), ArrayKey::Int(b)) => a == b,
            (ArrayKey::Str(a), ArrayKey::Str(b)) => Arc::ptr_eq(a, b) || a.content_eq(b),
            _ => false,
        }
    }
}

impl Eq for ArrayKey {}

impl Hash for ArrayKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write_u64(self.hash_value());
    }
}

impl std::fmt::Debug for ArrayKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ArrayKey::Int(i) => write!(f, "{i}"),
            ArrayKey::Str(s) => write!(f, "{s:?}"),
        }
    }
}

impl std::fmt::Display for ArrayKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ArrayKey::Int(i) => write!(f, "{i}"),
            ArrayKey::Str(s) => f.write_str(&s.to_string_lossy()),
        }
    }
}

/// Conversion into a normalized array key
pub trait IntoArrayKey {
    /// Normalize into an [`ArrayKey`]
    fn into_array_key(self) -> ArrayKey;
}

impl IntoArrayKey for ArrayKey {
    fn into_array_key(self) -> ArrayKey {
        self
    }
}

impl IntoArrayKey for &ArrayKey {
    fn into_array_key(self) -> ArrayKey {
        self.clone()
    }
}

impl IntoArrayKey for i64 {
    fn into_array_key(self) -> ArrayKey {
        ArrayKey::Int(self)
    }
}

impl IntoArrayKey for i32 {
    fn into_array_key(self) -> ArrayKey {
        ArrayKey::Int(i64::from(self))
    }
}

impl IntoArrayKey for &str {
    fn into_array_key(self) -> ArrayKey {
        ArrayKey::string(self)
    }
}

impl IntoArrayKey for &StringBuf {
    fn into_array_key(self) -> ArrayKey {
        self.to_key()
    }
}

impl IntoArrayKey for StringBuf {
    fn into_array_key(self) -> ArrayKey {
        self.to_key()
    }
}

impl IntoArrayKey for &Value {
    fn into_array_key(self) -> ArrayKey {
        self.to_key()
    }
}

impl IntoArrayKey for Value {
    fn into_array_key(self) -> ArrayKey {
        self.to_key()
    }
}
