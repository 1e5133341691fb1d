//! Ordered associative arrays
//!
//! An [`ArrayValue`] keeps insertion order, normalizes keys, shares its entry
//! table copy-on-write with its copies, and carries one internal cursor for
//! positional iteration (`current`/`next`/`reset`/...).
//!
//! Copying an array is an `Rc` bump; the first mutation through either copy
//! clones the table. Elements bound to a [`Var`] keep sharing that `Var`
//! after the clone, so references survive copies while plain elements become
//! independent.

mod access;
mod constant;
mod table;

pub use access::{ArrayAccess, FixedArray};
pub use constant::{ConstArray, ConstValue};

use crate::entry::{NIL, Slot};
use crate::key::{ArrayKey, IntoArrayKey};
use crate::string::well_known;
use crate::value::Value;
use crate::var::Var;
use rustc_hash::FxHashSet;
use std::cmp::Ordering;
use std::rc::Rc;
use table::{EntryTable, TableIter};

/// Ordered associative array with copy-on-write storage
#[derive(Clone)]
pub struct ArrayValue {
    table: Rc<EntryTable>,
    /// Shared constant table; reads go here until the first mutation
    constant: Option<ConstArray>,
    /// Internal pointer: arena index (owned) or position (constant), NIL past the end
    cursor: u32,
}

impl ArrayValue {
    /// Create an empty array
    pub fn new() -> Self {
        Self {
            table: Rc::new(EntryTable::new()),
            constant: None,
            cursor: NIL,
        }
    }

    /// Create an empty array with room for `capacity` entries
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            table: Rc::new(EntryTable::with_capacity(capacity)),
            constant: None,
            cursor: NIL,
        }
    }

    /// Wrap a shared constant array
    pub fn from_const(constant: ConstArray) -> Self {
        let cursor = if constant.is_empty() { NIL } else { 0 };
        Self {
            table: Rc::new(EntryTable::new()),
            constant: Some(constant),
            cursor,
        }
    }

    /// Check if reads still go to a shared constant table
    pub fn is_const(&self) -> bool {
        self.constant.is_some()
    }

    /// Check if storage is shared with another array (the next write forks)
    pub fn is_shared(&self) -> bool {
        self.constant.is_some() || Rc::strong_count(&self.table) > 1
    }

    /// Number of elements
    pub fn len(&self) -> usize {
        match &self.constant {
            Some(c) => c.len(),
            None => self.table.len(),
        }
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn table_mut(&mut self) -> &mut EntryTable {
        if let Some(constant) = self.constant.take() {
            tracing::debug!(
                target: "quill::array",
                len = constant.len(),
                "forking constant array"
            );
            self.table = Rc::new(constant.to_table());
        } else if Rc::strong_count(&self.table) > 1 {
            tracing::trace!(
                target: "quill::array",
                len = self.table.len(),
                "copy-on-write fork"
            );
        }
        Rc::make_mut(&mut self.table)
    }

    fn has_key(&self, key: &ArrayKey) -> bool {
        match &self.constant {
            Some(c) => c.contains_key(key),
            None => self.table.find(key).is_some(),
        }
    }

    /// Element at `key`; `None` is the unset sentinel
    pub fn get<K: IntoArrayKey>(&self, key: K) -> Option<Value> {
        self.get_key(&key.into_array_key())
    }

    /// Element at an already normalized key
    pub fn get_key(&self, key: &ArrayKey) -> Option<Value> {
        match &self.constant {
            Some(c) => c.get(key),
            None => self
                .table
                .find(key)
                .map(|idx| self.table.entry(idx).slot.get()),
        }
    }

    /// Raw slot at `key` (a plain value or the bound reference cell)
    pub fn get_raw<K: IntoArrayKey>(&self, key: K) -> Option<Slot> {
        let key = key.into_array_key();
        match &self.constant {
            Some(c) => c.get(&key).map(Slot::Value),
            None => self
                .table
                .find(&key)
                .map(|idx| self.table.entry(idx).slot.clone()),
        }
    }

    /// Check if `key` is present
    pub fn contains_key<K: IntoArrayKey>(&self, key: K) -> bool {
        self.has_key(&key.into_array_key())
    }

    fn find_or_insert(&mut self, key: ArrayKey) -> u32 {
        let was_empty = self.is_empty();
        let table = self.table_mut();
        let idx = match table.find(&key) {
            Some(idx) => idx,
            None => table.insert(key, Slot::default(), NIL),
        };
        if was_empty {
            self.cursor = idx;
        }
        idx
    }

    /// Assign `value` at `key`
    ///
    /// An existing key keeps its position; a reference-bound element writes
    /// through its cell. A new key goes to the tail.
    pub fn put<K: IntoArrayKey, V: Into<Value>>(&mut self, key: K, value: V) {
        let idx = self.find_or_insert(key.into_array_key());
        self.table_mut().entry_mut(idx).slot.set(value.into());
    }

    /// Bind the element at `key` to `var` (`$a[k] = &$x`)
    pub fn put_ref<K: IntoArrayKey>(&mut self, key: K, var: Var) {
        let idx = self.find_or_insert(key.into_array_key());
        self.table_mut().entry_mut(idx).slot = Slot::Var(var);
    }

    /// Next integer key `append` will use
    pub fn next_index(&self) -> i64 {
        match &self.constant {
            Some(c) => c.next_index(),
            None => self.table.peek_next_index(),
        }
    }

    /// Claim the next integer key, recomputing it if stale
    pub fn create_tail_key(&mut self) -> ArrayKey {
        ArrayKey::Int(self.table_mut().next_available_index())
    }

    fn append_slot(&mut self, slot: Slot) -> ArrayKey {
        let was_empty = self.is_empty();
        let table = self.table_mut();
        let key = ArrayKey::Int(table.next_available_index());
        if table.find(&key).is_some() {
            tracing::warn!(
                target: "quill::array",
                key = ?key,
                "cannot append: the next element is already occupied"
            );
            return key;
        }
        let idx = table.insert(key.clone(), slot, NIL);
        if was_empty {
            self.cursor = idx;
        }
        key
    }

    /// Append with the next integer key; returns the key used
    pub fn append<V: Into<Value>>(&mut self, value: V) -> ArrayKey {
        self.append_slot(Slot::Value(value.into()))
    }

    /// Append an element bound to `var`
    pub fn append_ref(&mut self, var: Var) -> ArrayKey {
        self.append_slot(Slot::Var(var))
    }

    /// Append a fresh reference-bound null element and return its cell (`&$a[]`)
    pub fn put_var(&mut self) -> Var {
        let var = Var::default();
        self.append_slot(Slot::Var(var.clone()));
        var
    }

    /// Remove `key`, returning its value
    ///
    /// Removing the greatest integer key makes the next append key stale; it is
    /// recomputed from the remaining keys when next needed.
    pub fn remove<K: IntoArrayKey>(&mut self, key: K) -> Option<Value> {
        let key = key.into_array_key();
        if !self.has_key(&key) {
            return None;
        }
        let cursor = self.cursor;
        let table = self.table_mut();
        let idx = table.find(&key)?;
        let next = table.entry(idx).next;
        let (_, slot) = table.remove_at(idx);
        if cursor == idx {
            self.cursor = next;
        }
        Some(slot.get())
    }

    /// Insert at the front with the next integer key
    ///
    /// Existing integer keys are not renumbered.
    pub fn unshift<V: Into<Value>>(&mut self, value: V) -> ArrayKey {
        let was_empty = self.is_empty();
        let table = self.table_mut();
        let key = ArrayKey::Int(table.next_available_index());
        let head = table.head();
        let idx = table.insert(key.clone(), Slot::Value(value.into()), head);
        if was_empty {
            self.cursor = idx;
        }
        key
    }

    /// Remove the positions `[start, end)` and insert `replacement` there
    ///
    /// Returns the removed elements: string keys are kept, integer keys are
    /// renumbered from 0. Replacement elements get fresh tail keys.
    pub fn splice(
        &mut self,
        start: usize,
        end: usize,
        replacement: Option<&ArrayValue>,
    ) -> ArrayValue {
        let end = end.min(self.len());
        let start = start.min(end);
        let mut removed = ArrayValue::new();
        if start == end && replacement.is_none_or(ArrayValue::is_empty) {
            return removed;
        }

        let cursor = self.cursor;
        let mut cursor_removed = false;
        let mut taken = Vec::with_capacity(end - start);
        let table = self.table_mut();
        let mut idx = table.nth(start);
        for _ in start..end {
            let next = table.entry(idx).next;
            cursor_removed |= idx == cursor;
            taken.push(table.remove_at(idx));
            idx = next;
        }
        if let Some(replacement) = replacement {
            for (_, value) in replacement.iter() {
                let key = ArrayKey::Int(table.next_available_index());
                table.insert(key, Slot::Value(value), idx);
            }
        }
        let head = table.head();
        if cursor_removed || cursor == NIL {
            self.cursor = head;
        }

        for (key, slot) in taken {
            if key.is_string() {
                removed.put_slot(key, slot);
            } else {
                removed.append_slot(slot);
            }
        }
        removed
    }

    fn put_slot(&mut self, key: ArrayKey, slot: Slot) {
        let idx = self.find_or_insert(key);
        self.table_mut().entry_mut(idx).slot = slot;
    }

    /// Copy of the positions `[start, end)`
    ///
    /// String keys are kept; integer keys are kept only with `preserve_keys`.
    pub fn slice(&self, start: usize, end: usize, preserve_keys: bool) -> ArrayValue {
        let mut result = ArrayValue::new();
        for (key, value) in self.iter().skip(start).take(end.saturating_sub(start)) {
            if preserve_keys || key.is_string() {
                result.put(key, value);
            } else {
                result.append(value);
            }
        }
        result
    }

    /// Copy-on-write copy; no structural work until either side writes
    pub fn copy(&self) -> ArrayValue {
        self.clone()
    }

    /// Reference cell for the element at `key`, creating a null element if
    /// missing and upgrading a plain element in place
    pub fn get_var<K: IntoArrayKey>(&mut self, key: K) -> Var {
        let idx = self.find_or_insert(key.into_array_key());
        self.table_mut().entry_mut(idx).slot.to_var()
    }

    /// Mutate the element at `key` in place, creating a null element if missing
    pub fn update<K, F, R>(&mut self, key: K, f: F) -> R
    where
        K: IntoArrayKey,
        F: FnOnce(&mut Value) -> R,
    {
        let idx = self.find_or_insert(key.into_array_key());
        self.table_mut().entry_mut(idx).slot.with_mut(f)
    }

    /// Mutate the nested array at `key`, auto-vivifying a missing, null or
    /// empty element; `None` when the element is a non-empty scalar
    pub fn get_array<K, F, R>(&mut self, key: K, f: F) -> Option<R>
    where
        K: IntoArrayKey,
        F: FnOnce(&mut ArrayValue) -> R,
    {
        self.update(key, |value| value.ensure_array().map(f))
    }

    /// Remove the last element (resets the cursor)
    pub fn pop(&mut self) -> Option<Value> {
        let key = match &self.constant {
            Some(c) => c.get_index(c.len().checked_sub(1)?)?.0,
            None if self.table.tail() == NIL => return None,
            None => self.table.entry(self.table.tail()).key.clone(),
        };
        let value = self.remove(key);
        self.cursor = self.first();
        value
    }

    /// Remove the first element and renumber integer keys from 0
    pub fn shift(&mut self) -> Option<Value> {
        if self.is_empty() {
            return None;
        }
        let table = self.table_mut();
        let mut drained = table.drain().into_iter();
        let (_, first) = drained.next()?;
        for (key, slot) in drained {
            let key = if key.is_string() {
                key
            } else {
                ArrayKey::Int(table.next_available_index())
            };
            table.insert(key, slot, NIL);
        }
        self.cursor = self.table.head();
        Some(first.get())
    }

    /// Renumber integer keys from `base`; `strict` renumbers string keys too
    pub fn key_reset(&mut self, base: i64, strict: bool) {
        let table = self.table_mut();
        let mut next = base;
        for (key, slot) in table.drain() {
            let key = if strict || !key.is_string() {
                let key = ArrayKey::Int(next);
                next = next.saturating_add(1);
                key
            } else {
                key
            };
            table.insert(key, slot, NIL);
        }
        self.cursor = self.table.head();
    }

    /// Remove every element
    pub fn clear(&mut self) {
        self.table = Rc::new(EntryTable::new());
        self.constant = None;
        self.cursor = NIL;
    }

    /// First key whose value loosely equals `value`
    pub fn contains(&self, value: &Value) -> Option<ArrayKey> {
        self.iter()
            .find(|(_, v)| v.loose_eq(value))
            .map(|(key, _)| key)
    }

    /// First key whose value is identical to `value`
    pub fn contains_strict(&self, value: &Value) -> Option<ArrayKey> {
        self.iter()
            .find(|(_, v)| v.strict_eq(value))
            .map(|(key, _)| key)
    }

    /// List of the keys
    pub fn keys(&self) -> ArrayValue {
        self.iter().map(|(key, _)| key.to_value()).collect()
    }

    /// List of the values
    pub fn values(&self) -> ArrayValue {
        self.iter().map(|(_, value)| value).collect()
    }

    /// Union: this array plus the elements of `other` whose keys are absent
    pub fn union(&self, other: &ArrayValue) -> ArrayValue {
        let mut result = self.copy();
        for (key, value) in other.iter() {
            if !result.has_key(&key) {
                result.put(key, value);
            }
        }
        result
    }

    /// Head-to-tail traversal (independent of the internal cursor)
    pub fn iter(&self) -> Iter<'_> {
        match &self.constant {
            Some(c) => Iter {
                inner: IterInner::Const(c.iter()),
            },
            None => Iter {
                inner: IterInner::Owned(self.table.iter()),
            },
        }
    }

    /// All entries in order
    pub fn entries(&self) -> Vec<(ArrayKey, Value)> {
        self.iter().collect()
    }

    /// Visit every raw slot in order
    pub fn for_each_slot<F>(&self, mut f: F)
    where
        F: FnMut(&ArrayKey, &Slot),
    {
        match &self.constant {
            Some(c) => {
                for (key, value) in c.iter() {
                    f(key, &Slot::Value(value.to_value()));
                }
            }
            None => {
                for (_, entry) in self.table.iter() {
                    f(&entry.key, &entry.slot);
                }
            }
        }
    }

    pub(crate) fn for_each_slot_mut<F>(&mut self, f: F)
    where
        F: FnMut(&ArrayKey, &mut Slot),
    {
        self.table_mut().for_each_slot_mut(f);
    }

    /// Element count including nested arrays (each reference visited once)
    pub fn count_recursive(&self) -> usize {
        let mut seen = FxHashSet::default();
        self.count_inner(&mut seen)
    }

    fn count_inner(&self, seen: &mut FxHashSet<usize>) -> usize {
        let mut count = self.len();
        self.for_each_slot(|_, slot| match slot {
            Slot::Value(Value::Array(inner)) => count += inner.count_inner(seen),
            Slot::Var(var) => {
                if seen.insert(var.id()) {
                    var.with(|value| {
                        if let Value::Array(inner) = value {
                            count += inner.count_inner(seen);
                        }
                    });
                }
            }
            Slot::Value(_) => {}
        });
        count
    }

    // Internal pointer

    fn first(&self) -> u32 {
        match &self.constant {
            Some(c) if c.is_empty() => NIL,
            Some(_) => 0,
            None => self.table.head(),
        }
    }

    fn last(&self) -> u32 {
        match &self.constant {
            Some(c) => c.len().checked_sub(1).map_or(NIL, |pos| pos as u32),
            None => self.table.tail(),
        }
    }

    fn after(&self, at: u32) -> u32 {
        if at == NIL {
            return NIL;
        }
        match &self.constant {
            Some(c) if (at as usize) + 1 < c.len() => at + 1,
            Some(_) => NIL,
            None => self.table.entry(at).next,
        }
    }

    fn before(&self, at: u32) -> u32 {
        if at == NIL {
            return NIL;
        }
        match &self.constant {
            Some(_) if at == 0 => NIL,
            Some(_) => at - 1,
            None => self.table.entry(at).prev,
        }
    }

    fn cursor_entry(&self) -> Option<(ArrayKey, Value)> {
        if self.cursor == NIL {
            return None;
        }
        match &self.constant {
            Some(c) => c.get_index(self.cursor as usize),
            None => {
                let entry = self.table.entry(self.cursor);
                Some((entry.key.clone(), entry.slot.get()))
            }
        }
    }

    /// Value under the cursor (`None` past either end)
    pub fn current(&self) -> Option<Value> {
        self.cursor_entry().map(|(_, value)| value)
    }

    /// Key under the cursor
    pub fn key(&self) -> Option<ArrayKey> {
        self.cursor_entry().map(|(key, _)| key)
    }

    /// Check if the cursor is on an element
    pub fn has_current(&self) -> bool {
        self.cursor != NIL
    }

    /// Advance the cursor and return the new current value
    #[allow(clippy::should_implement_trait)]
    pub fn next(&mut self) -> Option<Value> {
        self.cursor = self.after(self.cursor);
        self.current()
    }

    /// Move the cursor back and return the new current value
    pub fn prev(&mut self) -> Option<Value> {
        self.cursor = self.before(self.cursor);
        self.current()
    }

    /// Move the cursor to the first element
    pub fn reset(&mut self) -> Option<Value> {
        self.cursor = self.first();
        self.current()
    }

    /// Move the cursor to the last element
    pub fn end(&mut self) -> Option<Value> {
        self.cursor = self.last();
        self.current()
    }

    /// Current pair as `[0 => key, "key" => key, 1 => value, "value" => value]`,
    /// then advance
    pub fn each(&mut self) -> Option<ArrayValue> {
        let (key, value) = self.cursor_entry()?;
        self.cursor = self.after(self.cursor);

        let key = key.to_value();
        let mut pair = ArrayValue::with_capacity(4);
        pair.put(0, key.clone());
        pair.put(ArrayKey::Str(well_known::KEY.clone()), key);
        pair.put(1, value.clone());
        pair.put(ArrayKey::Str(well_known::VALUE.clone()), value);
        Some(pair)
    }

    // Comparison

    fn same_storage(&self, other: &ArrayValue) -> bool {
        match (&self.constant, &other.constant) {
            (None, None) => Rc::ptr_eq(&self.table, &other.table),
            _ => false,
        }
    }

    /// Loose equality: same key set, values loosely equal
    pub fn loose_eq(&self, other: &ArrayValue) -> bool {
        self.loose_eq_at(other, 0)
    }

    pub(crate) fn loose_eq_at(&self, other: &ArrayValue, depth: usize) -> bool {
        if self.same_storage(other) {
            return true;
        }
        if self.len() != other.len() {
            return false;
        }
        if depth >= NESTING_LIMIT {
            nesting_too_deep();
            return false;
        }
        self.iter().all(|(key, value)| {
            other
                .get_key(&key)
                .is_some_and(|rhs| value.loose_eq_at(&rhs, depth + 1))
        })
    }

    /// Strict equality: same keys in the same order with identical values
    pub fn strict_eq(&self, other: &ArrayValue) -> bool {
        self.strict_eq_at(other, 0)
    }

    pub(crate) fn strict_eq_at(&self, other: &ArrayValue, depth: usize) -> bool {
        if self.same_storage(other) {
            return true;
        }
        if self.len() != other.len() {
            return false;
        }
        if depth >= NESTING_LIMIT {
            nesting_too_deep();
            return false;
        }
        self.iter()
            .zip(other.iter())
            .all(|((k1, v1), (k2, v2))| k1 == k2 && v1.strict_eq_at(&v2, depth + 1))
    }

    /// Ordering: smaller arrays first, then element-wise by this array's keys
    ///
    /// A key missing from `other` makes the arrays uncomparable, reported as
    /// `uncomparable`. So does nesting past [`NESTING_LIMIT`].
    pub fn compare(&self, other: &ArrayValue, uncomparable: Ordering) -> Ordering {
        self.compare_at(other, uncomparable, 0)
    }

    pub(crate) fn compare_at(
        &self,
        other: &ArrayValue,
        uncomparable: Ordering,
        depth: usize,
    ) -> Ordering {
        if self.same_storage(other) {
            return Ordering::Equal;
        }
        match self.len().cmp(&other.len()) {
            Ordering::Equal => {}
            ord => return ord,
        }
        if depth >= NESTING_LIMIT {
            nesting_too_deep();
            return uncomparable;
        }
        for (key, value) in self.iter() {
            let Some(rhs) = other.get_key(&key) else {
                return uncomparable;
            };
            match value.compare_at(&rhs, uncomparable, depth + 1) {
                Ordering::Equal => {}
                ord => return ord,
            }
        }
        Ordering::Equal
    }
}

/// Array nesting at which comparison stops descending
pub const NESTING_LIMIT: usize = 256;

fn nesting_too_deep() {
    tracing::warn!(
        target: "quill::array",
        limit = NESTING_LIMIT,
        "nesting level too deep, recursive dependency?"
    );
}

impl Default for ArrayValue {
    fn default() -> Self {
        Self::new()
    }
}

impl PartialEq for ArrayValue {
    fn eq(&self, other: &Self) -> bool {
        self.strict_eq(other)
    }
}

impl std::fmt::Debug for ArrayValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut map = f.debug_map();
        self.for_each_slot(|key, slot| match slot {
            Slot::Value(value) => {
                map.entry(key, value);
            }
            Slot::Var(var) => {
                map.entry(key, var);
            }
        });
        map.finish()
    }
}

impl FromIterator<Value> for ArrayValue {
    fn from_iter<I: IntoIterator<Item = Value>>(iter: I) -> Self {
        let iter = iter.into_iter();
        let mut array = ArrayValue::with_capacity(iter.size_hint().0);
        for value in iter {
            array.append(value);
        }
        array
    }
}

impl<K: IntoArrayKey, V: Into<Value>> FromIterator<(K, V)> for ArrayValue {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut array = ArrayValue::new();
        for (key, value) in iter {
            array.put(key, value);
        }
        array
    }
}

/// Head-to-tail iterator over `(key, value)` pairs
pub struct Iter<'a> {
    inner: IterInner<'a>,
}

enum IterInner<'a> {
    Owned(TableIter<'a>),
    Const(indexmap::map::Iter<'a, ArrayKey, ConstValue>),
}

impl Iterator for Iter<'_> {
    type Item = (ArrayKey, Value);

    fn next(&mut self) -> Option<Self::Item> {
        match &mut self.inner {
            IterInner::Owned(it) => it
                .next()
                .map(|(_, entry)| (entry.key.clone(), entry.slot.get())),
            IterInner::Const(it) => it.next().map(|(key, value)| (key.clone(), value.to_value())),
        }
    }
}

impl<'a> IntoIterator for &'a ArrayValue {
    type Item = (ArrayKey, Value);
    type IntoIter = Iter<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
