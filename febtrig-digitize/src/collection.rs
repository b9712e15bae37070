//! Keyed per-event collections with upsert semantics.
//!
//! Trigger primitives and crate trigger words are unique per
//! (address, clocktick): a second contribution to an existing key updates
//! the stored entry in place instead of growing the collection. The
//! collection keeps insertion order for iteration and an index for O(1)
//! key lookup.

use std::collections::HashMap;
use std::hash::Hash;
use std::slice;

use crate::error::{Error, Result};

/// An entry addressable by a per-event key and stamped with a clocktick.
pub trait Keyed {
    /// The uniqueness key, e.g. `(BoardAddress, clocktick)`.
    type Key: Copy + Eq + Hash;

    /// This entry's key.
    fn key(&self) -> Self::Key;

    /// This entry's clocktick on its own grid.
    fn clocktick(&self) -> u32;
}

/// Insertion-ordered collection with one entry per key.
#[derive(Debug, Clone)]
pub struct KeyedCollection<V: Keyed> {
    label: &'static str,
    items: Vec<V>,
    index: HashMap<V::Key, usize>,
}

impl<V: Keyed> KeyedCollection<V> {
    /// Creates an empty collection. `label` names it in error messages.
    pub fn new(label: &'static str) -> Self {
        Self {
            label,
            items: Vec::new(),
            index: HashMap::new(),
        }
    }

    /// Inserts a new entry for `key` or updates the existing one.
    ///
    /// `insert` runs only when the key is absent; `update` runs on the
    /// entry either way, so a contribution is applied exactly once.
    pub fn upsert(
        &mut self,
        key: V::Key,
        insert: impl FnOnce() -> V,
        update: impl FnOnce(&mut V),
    ) {
        let slot = *self.index.entry(key).or_insert_with(|| {
            self.items.push(insert());
            self.items.len() - 1
        });
        update(&mut self.items[slot]);
    }

    /// The entry for `key`, if any.
    pub fn get(&self, key: &V::Key) -> Option<&V> {
        self.index.get(key).map(|&i| &self.items[i])
    }

    /// Entries in insertion order.
    pub fn iter(&self) -> slice::Iter<'_, V> {
        self.items.iter()
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// True when no entry was inserted.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Drops all entries for the next event.
    pub fn clear(&mut self) {
        self.items.clear();
        self.index.clear();
    }

    /// Entries stamped with `clocktick`; empty when none.
    pub fn at_clocktick(&self, clocktick: u32) -> Vec<&V> {
        self.items
            .iter()
            .filter(|v| v.clocktick() == clocktick)
            .collect()
    }

    /// Smallest clocktick present. Errors on an empty collection.
    pub fn clocktick_min(&self) -> Result<u32> {
        self.items
            .iter()
            .map(Keyed::clocktick)
            .min()
            .ok_or(Error::EmptyCollection(self.label))
    }

    /// Largest clocktick present. Errors on an empty collection.
    pub fn clocktick_max(&self) -> Result<u32> {
        self.items
            .iter()
            .map(Keyed::clocktick)
            .max()
            .ok_or(Error::EmptyCollection(self.label))
    }

    /// `(min, max)` clockticks present. Errors on an empty collection.
    pub fn clocktick_range(&self) -> Result<(u32, u32)> {
        Ok((self.clocktick_min()?, self.clocktick_max()?))
    }

    /// Consistency gate: scans the stored entries for a duplicated key.
    ///
    /// The upsert path cannot produce one, but a collection filled by
    /// several builders is re-checked before the trigger stages read it.
    pub fn check(&self) -> Result<()>
    where
        V::Key: IntoDuplicateReport,
    {
        let mut seen = HashMap::with_capacity(self.items.len());
        for item in &self.items {
            if seen.insert(item.key(), ()).is_some() {
                return Err(item.key().into_duplicate_report());
            }
        }
        Ok(())
    }
}

impl<'a, V: Keyed> IntoIterator for &'a KeyedCollection<V> {
    type Item = &'a V;
    type IntoIter = slice::Iter<'a, V>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Renders a duplicated key into the matching error variant.
pub trait IntoDuplicateReport {
    fn into_duplicate_report(self) -> Error;
}

impl IntoDuplicateReport for (febtrig_core::BoardAddress, u32) {
    fn into_duplicate_report(self) -> Error {
        Error::DuplicateKey {
            crate_id: self.0.crate_id,
            clocktick: self.1,
        }
    }
}

impl IntoDuplicateReport for (u8, u32) {
    fn into_duplicate_report(self) -> Error {
        Error::DuplicateKey {
            crate_id: self.0,
            clocktick: self.1,
        }
    }
}
