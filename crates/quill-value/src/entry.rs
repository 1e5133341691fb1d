//! Array entries and their value slots

use crate::key::ArrayKey;
use crate::value::Value;
use crate::var::Var;

/// Sentinel link meaning "no entry"
pub(crate) const NIL: u32 = u32::MAX;

/// Storage for one array element: a plain value or a reference cell
///
/// Cloning a slot clones a plain value (arrays copy-on-write) but shares a
/// reference cell, so references survive array copies.
#[derive(Clone, Debug)]
pub enum Slot {
    /// Plain value owned by the entry
    Value(Value),
    /// Element bound to a reference cell
    Var(Var),
}

impl Slot {
    /// Current value, read through a reference cell
    pub fn get(&self) -> Value {
        match self {
            Slot::Value(v) => v.clone(),
            Slot::Var(var) => var.get(),
        }
    }

    /// Borrow the current value for the duration of `f`
    pub fn with<F, R>(&self, f: F) -> R
    where
        F: FnOnce(&Value) -> R,
    {
        match self {
            Slot::Value(v) => f(v),
            Slot::Var(var) => var.with(f),
        }
    }

    /// Mutate the current value in place (through the cell if bound)
    pub fn with_mut<F, R>(&mut self, f: F) -> R
    where
        F: FnOnce(&mut Value) -> R,
    {
        match self {
            Slot::Value(v) => f(v),
            Slot::Var(var) => var.with_mut(f),
        }
    }

    /// Assign; a bound element writes through its cell
    pub fn set(&mut self, value: Value) {
        match self {
            Slot::Value(v) => *v = value,
            Slot::Var(var) => var.set(value),
        }
    }

    /// Upgrade to a reference cell (idempotent) and return it
    pub fn to_var(&mut self) -> Var {
        if let Slot::Value(v) = self {
            let var = Var::new(std::mem::take(v));
            *self = Slot::Var(var);
        }
        match self {
            Slot::Var(var) => var.clone(),
            Slot::Value(_) => Var::default(),
        }
    }

    /// Check if the slot is bound to a reference cell
    pub fn is_var(&self) -> bool {
        matches!(self, Slot::Var(_))
    }
}

impl Default for Slot {
    fn default() -> Self {
        Slot::Value(Value::Null)
    }
}

/// One key/value association inside an array
///
/// Entries live in the array's entry arena; `prev`/`next` link insertion
/// order and `next_hash` chains entries sharing a hash bucket.
#[derive(Clone, Debug)]
pub struct Entry {
    pub(crate) key: ArrayKey,
    pub(crate) hash: u64,
    pub(crate) slot: Slot,
    pub(crate) prev: u32,
    pub(crate) next: u32,
    pub(crate) next_hash: u32,
}

impl Entry {
    pub(crate) fn new(key: ArrayKey, hash: u64, slot: Slot) -> Self {
        Self {
            key,
            hash,
            slot,
            prev: NIL,
            next: NIL,
            next_hash: NIL,
        }
    }

    /// The entry's key
    pub fn key(&self) -> &ArrayKey {
        &self.key
    }

    /// The entry's value
    pub fn value(&self) -> Value {
        self.slot.get()
    }

    /// The entry's slot
    pub fn slot(&self) -> &Slot {
        &self.slot
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slot_upgrade_is_idempotent() {
        let mut slot = Slot::Value(Value::Int(4));
        let a = slot.to_var();
        let b = slot.to_var();
        assert!(a.ptr_eq(&b));
        assert_eq!(a.get(), Value::Int(4));
        assert!(slot.is_var());
    }

    #[test]
    fn test_set_writes_through_var() {
        let var = Var::new(Value::Null);
        let mut slot = Slot::Var(var.clone());
        slot.set(Value::Int(9));
        assert_eq!(var.get(), Value::Int(9));
    }

    #[test]
    fn test_clone_shares_var() {
        let mut slot = Slot::Value(Value::Int(1));
        let var = slot.to_var();
        let copy = slot.clone();
        var.set(Value::Int(2));
        assert_eq!(copy.get(), Value::Int(2));
    }
}
