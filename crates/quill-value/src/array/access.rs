//! Array-like access over different backing stores
//!
//! [`ArrayAccess`] is the seam for containers that look like arrays to the
//! evaluator but restrict what may change. [`ArrayValue`] supports every
//! operation; [`FixedArray`] (a fixed-arity argument list) refuses anything
//! that would change its shape.

use super::ArrayValue;
use crate::error::{ValueError, ValueResult};
use crate::key::ArrayKey;
use crate::value::Value;

/// Keyed access shared by array-like containers
pub trait ArrayAccess {
    /// Container kind, used in error messages
    fn container_name(&self) -> &'static str;

    /// Number of elements
    fn len(&self) -> usize;

    /// Check if empty
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Element at `key`
    fn get(&self, key: &ArrayKey) -> Option<Value>;

    /// Assign `value` at `key`
    fn put(&mut self, key: ArrayKey, value: Value) -> ValueResult<()>;

    /// Append with the next integer key
    fn append(&mut self, value: Value) -> ValueResult<ArrayKey>;

    /// Remove `key`
    fn remove(&mut self, key: &ArrayKey) -> ValueResult<Option<Value>>;

    /// Insert at the front with the next integer key
    fn unshift(&mut self, value: Value) -> ValueResult<ArrayKey>;

    /// Snapshot as a regular array
    fn to_array(&self) -> ArrayValue;
}

impl ArrayAccess for ArrayValue {
    fn container_name(&self) -> &'static str {
        "array"
    }

    fn len(&self) -> usize {
        ArrayValue::len(self)
    }

    fn get(&self, key: &ArrayKey) -> Option<Value> {
        self.get_key(key)
    }

    fn put(&mut self, key: ArrayKey, value: Value) -> ValueResult<()> {
        ArrayValue::put(self, key, value);
        Ok(())
    }

    fn append(&mut self, value: Value) -> ValueResult<ArrayKey> {
        Ok(ArrayValue::append(self, value))
    }

    fn remove(&mut self, key: &ArrayKey) -> ValueResult<Option<Value>> {
        Ok(ArrayValue::remove(self, key))
    }

    fn unshift(&mut self, value: Value) -> ValueResult<ArrayKey> {
        Ok(ArrayValue::unshift(self, value))
    }

    fn to_array(&self) -> ArrayValue {
        self.copy()
    }
}

/// Fixed-arity positional array (keys `0..len`)
///
/// Elements may be read and overwritten in place; changing the arity is an
/// [`ValueError::UnsupportedOperation`].
#[derive(Debug, Clone, Default)]
pub struct FixedArray {
    values: Vec<Value>,
}

impl FixedArray {
    const NAME: &'static str = "fixed array";

    /// Wrap positional values
    pub fn new(values: Vec<Value>) -> Self {
        Self { values }
    }

    /// Positional values
    pub fn as_slice(&self) -> &[Value] {
        &self.values
    }

    fn position(&self, key: &ArrayKey) -> Option<usize> {
        key.as_int()
            .and_then(|i| usize::try_from(i).ok())
            .filter(|&i| i < self.values.len())
    }
}

impl From<Vec<Value>> for FixedArray {
    fn from(values: Vec<Value>) -> Self {
        Self::new(values)
    }
}

impl ArrayAccess for FixedArray {
    fn container_name(&self) -> &'static str {
        Self::NAME
    }

    fn len(&self) -> usize {
        self.values.len()
    }

    fn get(&self, key: &ArrayKey) -> Option<Value> {
        self.position(key).map(|i| self.values[i].clone())
    }

    fn put(&mut self, key: ArrayKey, value: Value) -> ValueResult<()> {
        match self.position(&key) {
            Some(i) => {
                self.values[i] = value;
                Ok(())
            }
            None => Err(ValueError::unsupported("put outside the fixed arity", Self::NAME)),
        }
    }

    fn append(&mut self, _value: Value) -> ValueResult<ArrayKey> {
        Err(ValueError::unsupported("append", Self::NAME))
    }

    fn remove(&mut self, _key: &ArrayKey) -> ValueResult<Option<Value>> {
        Err(ValueError::unsupported("remove", Self::NAME))
    }

    fn unshift(&mut self, _value: Value) -> ValueResult<ArrayKey> {
        Err(ValueError::unsupported("unshift", Self::NAME))
    }

    fn to_array(&self) -> ArrayValue {
        self.values.iter().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fill(container: &mut dyn ArrayAccess) -> ValueResult<()> {
        container.put(ArrayKey::Int(0), Value::Int(10))?;
        container.append(Value::Int(20))?;
        Ok(())
    }

    #[test]
    fn test_array_supports_everything() {
        let mut array = ArrayValue::new();
        fill(&mut array).unwrap();
        assert_eq!(ArrayAccess::len(&array), 2);
        assert_eq!(
            ArrayAccess::unshift(&mut array, Value::Int(5)).unwrap(),
            ArrayKey::Int(2)
        );
        assert_eq!(
            ArrayAccess::remove(&mut array, &ArrayKey::Int(0)).unwrap(),
            Some(Value::Int(10))
        );
    }

    #[test]
    fn test_fixed_array_rejects_shape_changes() {
        let mut fixed = FixedArray::new(vec![Value::Null, Value::Null]);
        assert!(matches!(
            fill(&mut fixed),
            Err(ValueError::UnsupportedOperation { operation: "append", .. })
        ));
        assert_eq!(fixed.get(&ArrayKey::Int(0)), Some(Value::Int(10)));

        let err = fixed.unshift(Value::Int(1)).unwrap_err();
        assert_eq!(
            err,
            ValueError::unsupported("unshift", "fixed array")
        );
        assert!(fixed.remove(&ArrayKey::Int(1)).is_err());
        assert!(fixed.put(ArrayKey::Int(2), Value::Null).is_err());
        assert_eq!(fixed.len(), 2);
    }

    #[test]
    fn test_fixed_array_snapshot() {
        let fixed = FixedArray::from(vec![Value::from("a"), Value::Int(2)]);
        let array = fixed.to_array();
        assert_eq!(array.get(0), Some(Value::from("a")));
        assert_eq!(array.get(1), Some(Value::Int(2)));
        assert_eq!(fixed.container_name(), "fixed array");
    }
}
