//! Object handles
//!
//! Objects are shared by identity: copying a [`Value::Object`] copies the
//! handle, not the object. Fields are an ordered table with the same key
//! rules as arrays, so a field can be bound to a [`Var`] like an element.

use crate::array::ArrayValue;
use crate::key::IntoArrayKey;
use crate::string::{InternedString, well_known};
use crate::value::Value;
use crate::var::Var;
use std::cell::RefCell;
use std::rc::Rc;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_OBJECT_ID: AtomicU64 = AtomicU64::new(1);

struct ObjectData {
    id: u64,
    class_name: Arc<InternedString>,
    fields: RefCell<ArrayValue>,
}

/// Shared handle to an object instance
#[derive(Clone)]
pub struct ObjectHandle(Rc<ObjectData>);

impl ObjectHandle {
    /// New instance of `class_name` with no fields
    pub fn new(class_name: &str) -> Self {
        Self::with_class(InternedString::intern(class_name))
    }

    /// New `stdClass` instance
    pub fn std_class() -> Self {
        Self::with_class(well_known::STD_CLASS.clone())
    }

    fn with_class(class_name: Arc<InternedString>) -> Self {
        Self(Rc::new(ObjectData {
            id: NEXT_OBJECT_ID.fetch_add(1, Ordering::Relaxed),
            class_name,
            fields: RefCell::new(ArrayValue::new()),
        }))
    }

    /// Instance id, unique within the process
    pub fn id(&self) -> u64 {
        self.0.id
    }

    /// Class name
    pub fn class_name(&self) -> String {
        self.0.class_name.to_string_lossy()
    }

    /// Field value; `None` when unset
    pub fn get_field<K: IntoArrayKey>(&self, name: K) -> Option<Value> {
        self.0.fields.borrow().get(name)
    }

    /// Assign a field (writes through a bound reference)
    pub fn set_field<K: IntoArrayKey, V: Into<Value>>(&self, name: K, value: V) {
        self.0.fields.borrow_mut().put(name, value);
    }

    /// Remove a field
    pub fn unset_field<K: IntoArrayKey>(&self, name: K) -> Option<Value> {
        self.0.fields.borrow_mut().remove(name)
    }

    /// Reference cell for a field, creating a null field if missing
    pub fn field_var<K: IntoArrayKey>(&self, name: K) -> Var {
        self.0.fields.borrow_mut().get_var(name)
    }

    /// Copy of the field table (copy-on-write, references preserved)
    pub fn fields(&self) -> ArrayValue {
        self.0.fields.borrow().copy()
    }

    /// Replace the whole field table
    pub fn set_fields(&self, fields: ArrayValue) {
        *self.0.fields.borrow_mut() = fields;
    }

    /// Edit the field table in place, without forking it
    pub(crate) fn with_fields_mut<R>(&self, f: impl FnOnce(&mut ArrayValue) -> R) -> R {
        f(&mut self.0.fields.borrow_mut())
    }

    /// Number of fields
    pub fn field_count(&self) -> usize {
        self.0.fields.borrow().len()
    }

    /// Check if both handles point to the same instance
    pub fn ptr_eq(&self, other: &ObjectHandle) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    /// Address of the instance, stable while any handle is alive
    pub(crate) fn addr(&self) -> usize {
        Rc::as_ptr(&self.0) as usize
    }
}

impl std::fmt::Debug for ObjectHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}#{}", self.class_name(), self.id())
    }
}

impl PartialEq for ObjectHandle {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_handles_share_identity() {
        let a = ObjectHandle::new("Point");
        let b = a.clone();
        b.set_field("x", 3);
        assert_eq!(a.get_field("x"), Some(Value::Int(3)));
        assert!(a.ptr_eq(&b));
        assert_eq!(a.class_name(), "Point");
        assert_ne!(a.id(), ObjectHandle::new("Point").id());
    }

    #[test]
    fn test_field_var_aliases_field() {
        let o = ObjectHandle::std_class();
        let var = o.field_var("count");
        var.set(Value::Int(2));
        assert_eq!(o.get_field("count"), Some(Value::Int(2)));
        o.set_field("count", 5);
        assert_eq!(var.get(), Value::Int(5));
        assert_eq!(o.field_count(), 1);
    }

    #[test]
    fn test_fields_snapshot_is_independent() {
        let o = ObjectHandle::std_class();
        o.set_field("a", 1);
        let mut fields = o.fields();
        fields.put("b", 2);
        assert_eq!(o.field_count(), 1);
        assert_eq!(o.unset_field("a"), Some(Value::Int(1)));
        assert_eq!(fields.get("a"), Some(Value::Int(1)));
    }

    #[test]
    fn test_debug_shows_class() {
        let o = ObjectHandle::std_class();
        assert_eq!(format!("{o:?}"), format!("stdClass#{}", o.id()));
    }
}
