// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Insertion-ordered hash table backing `dict` and `set`.
//!
//! Removal leaves a tombstone, so a traversal position (`dict_next`) stays
//! meaningful while entries are deleted. Insertion compacts the slots once
//! tombstones outnumber live entries; like any insertion during traversal,
//! that invalidates outstanding positions.
//! Tables hold owned references; releasing displaced entries is left to the
//! caller so that destructors never run while a table is borrowed.

use std::collections::HashMap;

use crate::object::ObjPtr;
use crate::ops;

/// Tombstones tolerated before an insertion compacts, whatever the size.
const MIN_TOMBSTONES: usize = 8;

pub(crate) struct Entry {
    pub hash: i64,
    pub key: ObjPtr,
    pub value: ObjPtr,
}

#[derive(Default)]
pub(crate) struct Table {
    slots: Vec<Option<Entry>>,
    index: HashMap<i64, Vec<usize>>,
    len: usize,
}

impl Table {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.len
    }

    /// Slots in use, live or dead.
    #[cfg(test)]
    pub fn slot_count(&self) -> usize {
        self.slots.len()
    }

    fn compact(&mut self) {
        self.slots.retain(Option::is_some);
        self.index.clear();
        for (slot, entry) in self.slots.iter().enumerate() {
            if let Some(entry) = entry {
                self.index.entry(entry.hash).or_default().push(slot);
            }
        }
    }

    /// Slot holding `key`, or `Err(())` if an equality check raised.
    pub fn find(&self, key: ObjPtr, hash: i64) -> Result<Option<usize>, ()> {
        let Some(candidates) = self.index.get(&hash) else {
            return Ok(None);
        };
        for &slot in candidates {
            let Some(entry) = self.slots[slot].as_ref() else {
                continue;
            };
            if entry.key == key {
                return Ok(Some(slot));
            }
            match ops::rich_eq(entry.key, key) {
                1 => return Ok(Some(slot)),
                0 => {}
                _ => return Err(()),
            }
        }
        Ok(None)
    }

    pub fn get(&self, slot: usize) -> Option<&Entry> {
        self.slots.get(slot).and_then(Option::as_ref)
    }

    /// Insert owned `key`/`value`. Returns the references the caller must
    /// release (the duplicate key and the replaced value) when the key was
    /// already present.
    pub fn insert(
        &mut self,
        key: ObjPtr,
        hash: i64,
        value: ObjPtr,
    ) -> Result<Option<(ObjPtr, ObjPtr)>, ()> {
        if let Some(slot) = self.find(key, hash)? {
            if let Some(entry) = self.slots[slot].as_mut() {
                let old = std::mem::replace(&mut entry.value, value);
                return Ok(Some((key, old)));
            }
        }
        if self.slots.len() - self.len > self.len.max(MIN_TOMBSTONES) {
            self.compact();
        }
        let slot = self.slots.len();
        self.slots.push(Some(Entry { hash, key, value }));
        self.index.entry(hash).or_default().push(slot);
        self.len += 1;
        Ok(None)
    }

    /// Remove `key`, handing its owned references back to the caller.
    pub fn remove(&mut self, key: ObjPtr, hash: i64) -> Result<Option<Entry>, ()> {
        let Some(slot) = self.find(key, hash)? else {
            return Ok(None);
        };
        if let Some(candidates) = self.index.get_mut(&hash) {
            candidates.retain(|&s| s != slot);
            if candidates.is_empty() {
                self.index.remove(&hash);
            }
        }
        self.len -= 1;
        let entry = self.slots[slot].take();
        if self.len == 0 {
            self.slots.clear();
        }
        Ok(entry)
    }

    /// Empty the table, yielding every owned entry.
    pub fn drain(&mut self) -> impl Iterator<Item = Entry> {
        self.index.clear();
        self.len = 0;
        std::mem::take(&mut self.slots).into_iter().flatten()
    }

    /// Next live entry at or after `*pos`; advances `*pos` past it.
    pub fn next_from(&self, pos: &mut usize) -> Option<&Entry> {
        while *pos < self.slots.len() {
            let slot = *pos;
            *pos += 1;
            if let Some(entry) = self.slots[slot].as_ref() {
                return Some(entry);
            }
        }
        None
    }

    pub fn entries(&self) -> impl Iterator<Item = &Entry> {
        self.slots.iter().flatten()
    }
}
