//! Shared mutable value cells (references)

use crate::value::Value;
use rustc_hash::FxHashSet;
use std::cell::RefCell;
use std::rc::Rc;

/// A reference cell
///
/// Every holder of a clone of the same `Var` observes writes made through any
/// other clone. Array entries, object fields and argument thunks bind to a
/// `Var` when a reference is taken:
///
/// ```ignore
/// $a = 1;
/// $b = &$a;   // both names now hold the same Var
/// $b = 2;     // $a is 2
/// ```
///
/// Cells are single-threaded; a context never shares them across threads.
#[derive(Clone)]
pub struct Var(Rc<RefCell<Value>>);

impl Var {
    /// Create a new cell holding `value`
    pub fn new(value: Value) -> Self {
        Self(Rc::new(RefCell::new(value)))
    }

    /// Get a copy of the current value
    pub fn get(&self) -> Value {
        self.0.borrow().clone()
    }

    /// Store a new value
    pub fn set(&self, value: Value) {
        *self.0.borrow_mut() = value;
    }

    /// Store a new value and return the old one
    pub fn replace(&self, value: Value) -> Value {
        self.0.replace(value)
    }

    /// Take the value, leaving null behind
    pub fn take(&self) -> Value {
        self.0.take()
    }

    /// Borrow the current value for the duration of `f`
    pub fn with<F, R>(&self, f: F) -> R
    where
        F: FnOnce(&Value) -> R,
    {
        f(&self.0.borrow())
    }

    /// Mutably borrow the current value for the duration of `f`
    ///
    /// `f` must not reach this same cell again.
    pub fn with_mut<F, R>(&self, f: F) -> R
    where
        F: FnOnce(&mut Value) -> R,
    {
        f(&mut self.0.borrow_mut())
    }

    /// Check if both handles name the same cell
    pub fn ptr_eq(&self, other: &Var) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    /// Identity of the cell, stable while any handle is alive
    pub fn id(&self) -> usize {
        Rc::as_ptr(&self.0) as *const () as usize
    }

    /// Number of live handles to this cell
    pub fn handle_count(&self) -> usize {
        Rc::strong_count(&self.0)
    }

    /// Check if another handle shares this cell
    pub fn is_shared(&self) -> bool {
        self.handle_count() > 1
    }
}

impl Default for Var {
    fn default() -> Self {
        Self::new(Value::Null)
    }
}

impl From<Value> for Var {
    fn from(value: Value) -> Self {
        Self::new(value)
    }
}

thread_local! {
    /// Cells currently being formatted on this thread
    static FORMATTING: RefCell<FxHashSet<usize>> = RefCell::new(FxHashSet::default());
}

impl std::fmt::Debug for Var {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let id = self.id();
        if !FORMATTING.with(|open| open.borrow_mut().insert(id)) {
            return f.write_str("Var(*RECURSION*)");
        }
        let result = match self.0.try_borrow() {
            Ok(value) => write!(f, "Var({:?})", *value),
            Err(_) => f.write_str("Var(<borrowed>)"),
        };
        FORMATTING.with(|open| open.borrow_mut().remove(&id));
        result
    }
}
