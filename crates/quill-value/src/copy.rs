//! Deep copies of value graphs
//!
//! A plain array copy shares reference cells with its source. A deep copy
//! builds a fully independent graph: fresh tables, fresh cells, fresh
//! objects. Cells and objects reached twice inside the source are copied once,
//! so aliasing inside the copied graph mirrors the source. Cycles through
//! cells or objects terminate because the placeholder is registered before
//! its content is copied.

use crate::array::ArrayValue;
use crate::entry::Slot;
use crate::object::ObjectHandle;
use crate::value::Value;
use crate::var::Var;
use rustc_hash::FxHashMap;

/// Identity map from source cells and objects to their copies
#[derive(Default)]
pub struct CopyMap {
    vars: FxHashMap<usize, Var>,
    objects: FxHashMap<usize, ObjectHandle>,
}

impl CopyMap {
    /// Empty map
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of cells and objects copied so far
    pub fn len(&self) -> usize {
        self.vars.len() + self.objects.len()
    }

    /// Check if nothing has been copied
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn copy_var(&mut self, var: &Var) -> Var {
        if let Some(copy) = self.vars.get(&var.id()) {
            return copy.clone();
        }
        let copy = Var::default();
        self.vars.insert(var.id(), copy.clone());
        let value = var.get();
        copy.set(value.deep_copy(self));
        copy
    }

    fn copy_object(&mut self, object: &ObjectHandle) -> ObjectHandle {
        if let Some(copy) = self.objects.get(&object.addr()) {
            return copy.clone();
        }
        let copy = ObjectHandle::new(&object.class_name());
        self.objects.insert(object.addr(), copy.clone());
        copy.set_fields(object.fields().deep_copy(self));
        copy
    }
}

impl Value {
    /// Fully independent copy of this value graph
    pub fn deep_copy(&self, map: &mut CopyMap) -> Value {
        match self {
            Value::Array(a) => Value::Array(a.deep_copy(map)),
            Value::Object(o) => Value::Object(map.copy_object(o)),
            other => other.clone(),
        }
    }
}

impl ArrayValue {
    /// Copy with fresh tables and fresh reference cells
    pub fn deep_copy(&self, map: &mut CopyMap) -> ArrayValue {
        let mut copy = ArrayValue::with_capacity(self.len());
        self.for_each_slot(|key, slot| match slot {
            Slot::Value(value) => copy.put(key, value.deep_copy(map)),
            Slot::Var(var) => copy.put_ref(key, map.copy_var(var)),
        });
        copy
    }
}
