//! Entry arena backing an owned array
//!
//! Entries live in a slab indexed by `u32`. Insertion order is a doubly linked
//! list through `prev`/`next`; once the table outgrows [`MIN_HASH`] entries a
//! power-of-two bucket array chains entries through `next_hash`. Smaller tables
//! have no bucket array and lookups scan the order list.

use crate::entry::{Entry, NIL, Slot};
use crate::key::ArrayKey;

/// Tables at or below this size are scanned linearly
pub(crate) const MIN_HASH: usize = 4;

/// Initial bucket count once hashing starts
const INITIAL_BUCKETS: usize = 8;

#[derive(Clone)]
pub(crate) struct EntryTable {
    slots: Vec<Entry>,
    free: Vec<u32>,
    buckets: Option<Box<[u32]>>,
    head: u32,
    tail: u32,
    size: usize,
    /// Next append key; `None` when stale after a removal
    next_index: Option<i64>,
}

impl EntryTable {
    pub(crate) fn new() -> Self {
        Self {
            slots: Vec::new(),
            free: Vec::new(),
            buckets: None,
            head: NIL,
            tail: NIL,
            size: 0,
            next_index: Some(0),
        }
    }

    pub(crate) fn with_capacity(capacity: usize) -> Self {
        let mut table = Self::new();
        table.slots.reserve(capacity);
        table
    }

    pub(crate) fn len(&self) -> usize {
        self.size
    }

    pub(crate) fn head(&self) -> u32 {
        self.head
    }

    pub(crate) fn tail(&self) -> u32 {
        self.tail
    }

    pub(crate) fn is_hashed(&self) -> bool {
        self.buckets.is_some()
    }

    pub(crate) fn entry(&self, idx: u32) -> &Entry {
        &self.slots[idx as usize]
    }

    pub(crate) fn entry_mut(&mut self, idx: u32) -> &mut Entry {
        &mut self.slots[idx as usize]
    }

    /// Arena index of the entry at order position `pos` (NIL past the end)
    pub(crate) fn nth(&self, pos: usize) -> u32 {
        let mut idx = self.head;
        for _ in 0..pos {
            if idx == NIL {
                break;
            }
            idx = self.entry(idx).next;
        }
        idx
    }

    pub(crate) fn find(&self, key: &ArrayKey) -> Option<u32> {
        let hash = key.hash_value();
        match &self.buckets {
            Some(buckets) => {
                let mut idx = buckets[hash as usize & (buckets.len() - 1)];
                while idx != NIL {
                    let entry = self.entry(idx);
                    if entry.hash == hash && entry.key == *key {
                        return Some(idx);
                    }
                    idx = entry.next_hash;
                }
                None
            }
            None => {
                let mut idx = self.head;
                while idx != NIL {
                    let entry = self.entry(idx);
                    if entry.hash == hash && entry.key == *key {
                        return Some(idx);
                    }
                    idx = entry.next;
                }
                None
            }
        }
    }

    fn alloc(&mut self, entry: Entry) -> u32 {
        match self.free.pop() {
            Some(idx) => {
                self.slots[idx as usize] = entry;
                idx
            }
            None => {
                self.slots.push(entry);
                (self.slots.len() - 1) as u32
            }
        }
    }

    /// Insert an absent key before `before` (NIL appends at the tail)
    pub(crate) fn insert(&mut self, key: ArrayKey, slot: Slot, before: u32) -> u32 {
        if let Some(next) = self.next_index {
            self.next_index = Some(key.next_index(next));
        }
        let hash = key.hash_value();
        let idx = self.alloc(Entry::new(key, hash, slot));

        if before == NIL {
            let tail = self.tail;
            self.entry_mut(idx).prev = tail;
            if tail == NIL {
                self.head = idx;
            } else {
                self.entry_mut(tail).next = idx;
            }
            self.tail = idx;
        } else {
            let prev = self.entry(before).prev;
            {
                let entry = self.entry_mut(idx);
                entry.prev = prev;
                entry.next = before;
            }
            self.entry_mut(before).prev = idx;
            if prev == NIL {
                self.head = idx;
            } else {
                self.entry_mut(prev).next = idx;
            }
        }

        self.size += 1;
        self.link_hash(idx);
        idx
    }

    fn link_hash(&mut self, idx: u32) {
        let bucket_count = match &self.buckets {
            None if self.size <= MIN_HASH => return,
            None => (2 * self.size + 1).next_power_of_two().max(INITIAL_BUCKETS),
            Some(buckets) if buckets.len() <= 2 * self.size => buckets.len() * 2,
            Some(_) => 0,
        };
        if bucket_count > 0 {
            self.rehash(bucket_count);
            return;
        }
        let hash = self.entry(idx).hash;
        if let Some(buckets) = self.buckets.as_mut() {
            let bucket = hash as usize & (buckets.len() - 1);
            self.slots[idx as usize].next_hash = buckets[bucket];
            buckets[bucket] = idx;
        }
    }

    fn rehash(&mut self, bucket_count: usize) {
        tracing::trace!(
            target: "quill::array",
            size = self.size,
            buckets = bucket_count,
            "rehashing array"
        );
        let mut buckets = vec![NIL; bucket_count].into_boxed_slice();
        let mask = bucket_count - 1;
        let mut idx = self.head;
        while idx != NIL {
            let entry = &mut self.slots[idx as usize];
            let bucket = entry.hash as usize & mask;
            entry.next_hash = buckets[bucket];
            buckets[bucket] = idx;
            idx = entry.next;
        }
        self.buckets = Some(buckets);
    }

    /// Unlink the entry at `idx` from both lists and free its slot
    pub(crate) fn remove_at(&mut self, idx: u32) -> (ArrayKey, Slot) {
        let (hash, prev, next, next_hash) = {
            let entry = self.entry(idx);
            (entry.hash, entry.prev, entry.next, entry.next_hash)
        };

        if let Some(buckets) = self.buckets.as_mut() {
            let bucket = hash as usize & (buckets.len() - 1);
            if buckets[bucket] == idx {
                buckets[bucket] = next_hash;
            } else {
                let mut cur = buckets[bucket];
                while self.slots[cur as usize].next_hash != idx {
                    cur = self.slots[cur as usize].next_hash;
                }
                self.slots[cur as usize].next_hash = next_hash;
            }
        }

        if prev == NIL {
            self.head = next;
        } else {
            self.entry_mut(prev).next = next;
        }
        if next == NIL {
            self.tail = prev;
        } else {
            self.entry_mut(next).prev = prev;
        }
        self.size -= 1;

        let entry = self.entry_mut(idx);
        let key = std::mem::replace(&mut entry.key, ArrayKey::Int(0));
        let slot = std::mem::take(&mut entry.slot);
        entry.prev = NIL;
        entry.next = NIL;
        entry.next_hash = NIL;
        self.free.push(idx);

        if let (ArrayKey::Int(k), Some(next_index)) = (&key, self.next_index)
            && k.checked_add(1) == Some(next_index)
        {
            self.next_index = None;
        }
        (key, slot)
    }

    /// Next append key, recomputing (and caching) it when stale
    pub(crate) fn next_available_index(&mut self) -> i64 {
        match self.next_index {
            Some(next) => next,
            None => {
                let next = self.scan_next_index();
                self.next_index = Some(next);
                next
            }
        }
    }

    /// Next append key without caching
    pub(crate) fn peek_next_index(&self) -> i64 {
        self.next_index.unwrap_or_else(|| self.scan_next_index())
    }

    fn scan_next_index(&self) -> i64 {
        self.iter().fold(0, |next, (_, entry)| entry.key.next_index(next))
    }

    pub(crate) fn iter(&self) -> TableIter<'_> {
        TableIter {
            table: self,
            idx: self.head,
        }
    }

    /// Visit every slot mutably in order
    pub(crate) fn for_each_slot_mut<F>(&mut self, mut f: F)
    where
        F: FnMut(&ArrayKey, &mut Slot),
    {
        let mut idx = self.head;
        while idx != NIL {
            let entry = &mut self.slots[idx as usize];
            f(&entry.key, &mut entry.slot);
            idx = entry.next;
        }
    }

    /// Drain all entries in order, leaving the table empty
    pub(crate) fn drain(&mut self) -> Vec<(ArrayKey, Slot)> {
        let mut out = Vec::with_capacity(self.size);
        let mut idx = self.head;
        while idx != NIL {
            let entry = &mut self.slots[idx as usize];
            idx = entry.next;
            out.push((
                std::mem::replace(&mut entry.key, ArrayKey::Int(0)),
                std::mem::take(&mut entry.slot),
            ));
        }
        *self = Self::new();
        out
    }
}

impl Default for EntryTable {
    fn default() -> Self {
        Self::new()
    }
}

/// Head-to-tail traversal of a table
pub(crate) struct TableIter<'a> {
    table: &'a EntryTable,
    idx: u32,
}

impl<'a> Iterator for TableIter<'a> {
    type Item = (u32, &'a Entry);

    fn next(&mut self) -> Option<Self::Item> {
        if self.idx == NIL {
            return None;
        }
        let idx = self.idx;
        let table: &'a EntryTable = self.table;
        let entry = table.entry(idx);
        self.idx = entry.next;
        Some((idx, entry))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Value;

    fn keys(table: &EntryTable) -> Vec<ArrayKey> {
        table.iter().map(|(_, e)| e.key.clone()).collect()
    }

    #[test]
    fn test_linear_then_hashed() {
        let mut table = EntryTable::new();
        for i in 0..MIN_HASH as i64 {
            table.insert(ArrayKey::Int(i), Slot::Value(Value::Int(i)), NIL);
        }
        assert!(!table.is_hashed());
        table.insert(ArrayKey::Int(99), Slot::Value(Value::Null), NIL);
        assert!(table.is_hashed());
        for i in 0..MIN_HASH as i64 {
            assert!(table.find(&ArrayKey::Int(i)).is_some());
        }
        assert!(table.find(&ArrayKey::Int(5)).is_none());
    }

    #[test]
    fn test_growth_keeps_every_entry_reachable() {
        let mut table = EntryTable::new();
        for i in 0..1000 {
            table.insert(ArrayKey::Int(i * 7), Slot::Value(Value::Int(i)), NIL);
        }
        for i in 0..1000 {
            let idx = table.find(&ArrayKey::Int(i * 7)).unwrap();
            assert_eq!(table.entry(idx).slot.get(), Value::Int(i));
        }
        assert_eq!(table.len(), 1000);
    }

    #[test]
    fn test_remove_unlinks_and_reuses_slot() {
        let mut table = EntryTable::new();
        for i in 0..10 {
            table.insert(ArrayKey::Int(i), Slot::Value(Value::Int(i)), NIL);
        }
        let idx = table.find(&ArrayKey::Int(4)).unwrap();
        let (key, slot) = table.remove_at(idx);
        assert_eq!(key, ArrayKey::Int(4));
        assert_eq!(slot.get(), Value::Int(4));
        assert!(table.find(&ArrayKey::Int(4)).is_none());
        assert_eq!(table.len(), 9);

        let reused = table.insert(ArrayKey::string("x"), Slot::default(), NIL);
        assert_eq!(reused, idx);
        assert_eq!(keys(&table).last(), Some(&ArrayKey::string("x")));
    }

    #[test]
    fn test_insert_before() {
        let mut table = EntryTable::new();
        let a = table.insert(ArrayKey::Int(0), Slot::default(), NIL);
        table.insert(ArrayKey::Int(1), Slot::default(), NIL);
        table.insert(ArrayKey::Int(2), Slot::default(), a);
        assert_eq!(
            keys(&table),
            vec![ArrayKey::Int(2), ArrayKey::Int(0), ArrayKey::Int(1)]
        );
        assert_eq!(table.entry(table.head()).key, ArrayKey::Int(2));
        assert_eq!(table.entry(table.tail()).key, ArrayKey::Int(1));
    }

    #[test]
    fn test_next_index_goes_stale_on_max_removal() {
        let mut table = EntryTable::new();
        table.insert(ArrayKey::Int(0), Slot::default(), NIL);
        let one = table.insert(ArrayKey::Int(1), Slot::default(), NIL);
        assert_eq!(table.next_available_index(), 2);
        table.remove_at(one);
        assert_eq!(table.peek_next_index(), 1);
        assert_eq!(table.next_available_index(), 1);
    }

    #[test]
    fn test_drain_empties() {
        let mut table = EntryTable::new();
        table.insert(ArrayKey::Int(3), Slot::default(), NIL);
        table.insert(ArrayKey::string("a"), Slot::default(), NIL);
        let drained = table.drain();
        assert_eq!(drained.len(), 2);
        assert_eq!(table.len(), 0);
        assert_eq!(table.next_available_index(), 0);
    }
}
