//! Immutable arrays shareable across execution contexts
//!
//! A [`ConstArray`] is frozen from an [`ArrayValue`] of scalars, strings and
//! nested arrays. It is `Send + Sync`, so a compiled constant can live in a
//! process-wide static and be handed to every context. Wrapping it with
//! [`ArrayValue::from_const`] gives a context a normal array whose reads go to
//! the shared table and whose first mutation forks a private copy.

use super::ArrayValue;
use super::table::EntryTable;
use crate::config;
use crate::entry::{NIL, Slot};
use crate::error::{ValueError, ValueResult};
use crate::key::ArrayKey;
use crate::string::{InternedString, StringBuf};
use crate::value::Value;
use indexmap::IndexMap;
use rustc_hash::FxBuildHasher;
use std::sync::Arc;

type ConstTable = IndexMap<ArrayKey, ConstValue, FxBuildHasher>;

/// A frozen element of a constant array
#[derive(Clone, Debug, PartialEq)]
pub enum ConstValue {
    /// Null
    Null,
    /// Boolean
    Bool(bool),
    /// Integer
    Int(i64),
    /// Float
    Float(f64),
    /// Interned string
    Str(Arc<InternedString>),
    /// Nested constant array
    Array(ConstArray),
}

impl ConstValue {
    /// Freeze a value; objects cannot be frozen
    pub fn freeze(value: &Value) -> ValueResult<Self> {
        Self::freeze_at(value, 0, config::with_active(|c| c.max_depth))
    }

    fn freeze_at(value: &Value, depth: usize, max_depth: usize) -> ValueResult<Self> {
        Ok(match value {
            Value::Null => ConstValue::Null,
            Value::Bool(b) => ConstValue::Bool(*b),
            Value::Int(i) => ConstValue::Int(*i),
            Value::Float(d) => ConstValue::Float(*d),
            Value::Str(s) => ConstValue::Str(s.to_interned()),
            Value::Array(a) => ConstValue::Array(ConstArray::freeze_at(a, depth + 1, max_depth)?),
            Value::Object(_) => return Err(ValueError::unsupported("freeze", "object value")),
        })
    }

    /// Thaw into a context-local value
    pub fn to_value(&self) -> Value {
        match self {
            ConstValue::Null => Value::Null,
            ConstValue::Bool(b) => Value::Bool(*b),
            ConstValue::Int(i) => Value::Int(*i),
            ConstValue::Float(d) => Value::Float(*d),
            ConstValue::Str(s) => Value::Str(StringBuf::Interned(s.clone())),
            ConstValue::Array(a) => Value::Array(ArrayValue::from_const(a.clone())),
        }
    }
}

/// Immutable, thread-shareable ordered array
#[derive(Clone)]
pub struct ConstArray(Arc<ConstTable>);

impl ConstArray {
    /// Freeze an array (references are read through, objects are rejected)
    pub fn freeze(array: &ArrayValue) -> ValueResult<Self> {
        Self::freeze_at(array, 0, config::with_active(|c| c.max_depth))
    }

    fn freeze_at(array: &ArrayValue, depth: usize, max_depth: usize) -> ValueResult<Self> {
        if depth > max_depth {
            return Err(ValueError::recursion(max_depth));
        }
        let mut table = ConstTable::with_capacity_and_hasher(array.len(), FxBuildHasher);
        for (key, value) in array.iter() {
            table.insert(key, ConstValue::freeze_at(&value, depth, max_depth)?);
        }
        Ok(Self(Arc::new(table)))
    }

    /// Number of elements
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Element at `key`
    pub fn get(&self, key: &ArrayKey) -> Option<Value> {
        self.0.get(key).map(ConstValue::to_value)
    }

    /// Check if `key` is present
    pub fn contains_key(&self, key: &ArrayKey) -> bool {
        self.0.contains_key(key)
    }

    /// Element at order position `pos`
    pub fn get_index(&self, pos: usize) -> Option<(ArrayKey, Value)> {
        self.0
            .get_index(pos)
            .map(|(key, value)| (key.clone(), value.to_value()))
    }

    /// Frozen entries in order
    pub fn iter(&self) -> indexmap::map::Iter<'_, ArrayKey, ConstValue> {
        self.0.iter()
    }

    /// Wrap as a context-local array
    pub fn to_array(&self) -> ArrayValue {
        ArrayValue::from_const(self.clone())
    }

    /// Check if both handles share one table
    pub fn ptr_eq(&self, other: &ConstArray) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    pub(crate) fn next_index(&self) -> i64 {
        self.0.keys().fold(0, |next, key| key.next_index(next))
    }

    /// Private owned copy for a mutating context
    pub(crate) fn to_table(&self) -> EntryTable {
        let mut table = EntryTable::with_capacity(self.len());
        for (key, value) in self.0.iter() {
            table.insert(key.clone(), Slot::Value(value.to_value()), NIL);
        }
        table
    }
}

impl PartialEq for ConstArray {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other) || self.0.iter().eq(other.0.iter())
    }
}

impl std::fmt::Debug for ConstArray {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_map().entries(self.0.iter()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::object::ObjectHandle;
    use std::sync::LazyLock;

    static COLORS: LazyLock<ConstArray> = LazyLock::new(|| {
        let mut array = ArrayValue::new();
        array.put("red", 0xff0000);
        array.put("green", 0x00ff00);
        array.append("fallback");
        ConstArray::freeze(&array).unwrap()
    });

    fn assert_send_sync<T: Send + Sync>() {}

    #[test]
    fn test_is_send_sync() {
        assert_send_sync::<ConstArray>();
    }

    #[test]
    fn test_reads_share_the_table() {
        let a = COLORS.to_array();
        assert!(a.is_const());
        assert_eq!(a.get("red"), Some(Value::Int(0xff0000)));
        assert_eq!(a.get(0), Some(Value::from("fallback")));
        assert_eq!(a.len(), 3);
        assert!(a.is_const());
    }

    #[test]
    fn test_first_mutation_forks() {
        let mut a = COLORS.to_array();
        a.put("blue", 0x0000ff);
        assert!(!a.is_const());
        assert_eq!(a.len(), 4);
        assert_eq!(COLORS.len(), 3);
        assert!(!COLORS.contains_key(&ArrayKey::string("blue")));
        assert_eq!(a.append(1), ArrayKey::Int(1));
    }

    #[test]
    fn test_shared_across_threads() {
        let handle = std::thread::spawn(|| COLORS.get(&ArrayKey::string("green")).map(|v| v.to_long()));
        assert_eq!(handle.join().unwrap(), Some(0x00ff00));
    }

    #[test]
    fn test_objects_cannot_be_frozen() {
        let mut array = ArrayValue::new();
        array.append(ObjectHandle::std_class());
        assert!(matches!(
            ConstArray::freeze(&array),
            Err(ValueError::UnsupportedOperation { .. })
        ));
    }

    #[test]
    fn test_nested_constants_thaw_to_arrays() {
        let mut inner = ArrayValue::new();
        inner.append(1);
        let mut outer = ArrayValue::new();
        outer.put("inner", inner);
        let frozen = ConstArray::freeze(&outer).unwrap();
        match frozen.get(&ArrayKey::string("inner")) {
            Some(Value::Array(a)) => {
                assert!(a.is_const());
                assert_eq!(a.get(0), Some(Value::Int(1)));
            }
            other => panic!("expected nested array, got {other:?}"),
        }
    }
}
