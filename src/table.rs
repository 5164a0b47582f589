//! EntryTable: keyed storage with stable generational handles.
//!
//! An index of slot keys (`hashbrown::HashTable`) over slot storage
//! (`slotmap::SlotMap`). Every entry stores the hash it was inserted with,
//! and probing and rehashing only use stored hashes, so the table never
//! hashes a key itself; the owner supplies the hash for lookups and inserts.
//! Handles stay valid until their entry is removed, and a handle to a
//! removed entry never aliases a later entry for the same key.

use core::hash::BuildHasher;
use hashbrown::hash_table::Entry as TableEntry;
use hashbrown::HashTable;
use slotmap::{DefaultKey, SlotMap};

/// Identifies one actor instance: (actor type, actor id).
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub(crate) struct ReentrancyKey {
    actor_type: String,
    actor_id: String,
}

impl ReentrancyKey {
    pub(crate) fn new(actor_type: &str, actor_id: &str) -> Self {
        Self {
            actor_type: actor_type.to_owned(),
            actor_id: actor_id.to_owned(),
        }
    }

    pub(crate) fn matches(&self, actor_type: &str, actor_id: &str) -> bool {
        self.actor_type == actor_type && self.actor_id == actor_id
    }

    /// Hash used for both shard selection and table probing. Borrowed parts
    /// hash the same as an owned key, so lookups never allocate.
    pub(crate) fn hash_parts<S: BuildHasher>(hasher: &S, actor_type: &str, actor_id: &str) -> u64 {
        hasher.hash_one((actor_type, actor_id))
    }

    pub(crate) fn actor_type(&self) -> &str {
        &self.actor_type
    }

    pub(crate) fn actor_id(&self) -> &str {
        &self.actor_id
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub(crate) struct Handle(DefaultKey);

#[derive(Debug)]
struct Entry<V> {
    key: ReentrancyKey,
    value: V,
    hash: u64,
}

#[derive(Debug)]
pub(crate) struct EntryTable<V> {
    index: HashTable<DefaultKey>,
    slots: SlotMap<DefaultKey, Entry<V>>,
}

impl<V> Default for EntryTable<V> {
    fn default() -> Self {
        Self::with_capacity(0)
    }
}

impl<V> EntryTable<V> {
    pub(crate) fn with_capacity(capacity: usize) -> Self {
        Self {
            index: HashTable::with_capacity(capacity),
            slots: SlotMap::with_capacity_and_key(capacity),
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.slots.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub(crate) fn find(&self, hash: u64, actor_type: &str, actor_id: &str) -> Option<Handle> {
        let slots = &self.slots;
        self.index
            .find(hash, |&k| {
                slots
                    .get(k)
                    .map(|e| e.key.matches(actor_type, actor_id))
                    .unwrap_or(false)
            })
            .map(|&k| Handle(k))
    }

    /// Return the handle and value for the key, inserting `default()` first
    /// if absent. The boolean reports whether this call created the entry.
    pub(crate) fn find_or_insert_with<F>(
        &mut self,
        hash: u64,
        actor_type: &str,
        actor_id: &str,
        default: F,
    ) -> (Handle, &mut V, bool)
    where
        F: FnOnce() -> V,
    {
        let slots = &mut self.slots;
        match self.index.entry(
            hash,
            |&k| {
                slots
                    .get(k)
                    .map(|e| e.key.matches(actor_type, actor_id))
                    .unwrap_or(false)
            },
            |&k| slots.get(k).map(|e| e.hash).unwrap_or(0),
        ) {
            TableEntry::Occupied(o) => {
                let k = *o.get();
                (Handle(k), &mut slots[k].value, false)
            }
            TableEntry::Vacant(v) => {
                let k = slots.insert(Entry {
                    key: ReentrancyKey::new(actor_type, actor_id),
                    value: default(),
                    hash,
                });
                let _ = v.insert(k);
                (Handle(k), &mut slots[k].value, true)
            }
        }
    }

    pub(crate) fn remove(&mut self, handle: Handle) -> Option<(ReentrancyKey, V)> {
        let k = handle.0;
        let entry = self.slots.remove(k)?;
        if let Ok(occupied) = self.index.find_entry(entry.hash, |&kk| kk == k) {
            let _ = occupied.remove();
        }
        Some((entry.key, entry.value))
    }

    pub(crate) fn get(&self, handle: Handle) -> Option<&V> {
        self.slots.get(handle.0).map(|e| &e.value)
    }

    pub(crate) fn get_mut(&mut self, handle: Handle) -> Option<&mut V> {
        self.slots.get_mut(handle.0).map(|e| &mut e.value)
    }

    pub(crate) fn key(&self, handle: Handle) -> Option<&ReentrancyKey> {
        self.slots.get(handle.0).map(|e| &e.key)
    }
}
