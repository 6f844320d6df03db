/*
 * Copyright (C) 2024 Nils Asmussen, Barkhausen Institut
 *
 * This file is part of M3 (Microkernel-based SysteM for Heterogeneous Manycores).
 *
 * M3 is free software: you can redistribute it and/or modify
 * it under the terms of the GNU General Public License version 2 as
 * published by the Free Software Foundation.
 *
 * M3 is distributed in the hope that it will be useful, but
 * WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the GNU
 * General Public License version 2 for more details.
 */

use std::fmt;
use std::ptr::NonNull;

use crate::col::rbtree::{RbItem, RbLinks, RbTree};
use crate::errors::{Code, Error};
use crate::util::math;

struct Entry<V> {
    start: u64,
    end: u64,
    value: V,
    links: RbLinks<Entry<V>>,
}

impl<V> RbItem for Entry<V> {
    fn links(&self) -> &RbLinks<Self> {
        &self.links
    }

    fn key_start(&self) -> u64 {
        self.start
    }

    fn key_end(&self) -> u64 {
        self.end
    }
}

/// An owning map from non-overlapping ranges `[start, end)` to values
///
/// The entries are allocated on the heap and indexed by a [`RbTree`]. In contrast to the tree
/// itself, the map is safe to use: it rejects duplicates and overlapping ranges and frees the
/// entries on removal.
pub struct RangeMap<V> {
    tree: RbTree<Entry<V>>,
}

impl<V> RangeMap<V> {
    /// Creates an empty map
    pub const fn new() -> Self {
        Self {
            tree: RbTree::new(),
        }
    }

    /// Returns the number of entries
    pub fn len(&self) -> usize {
        self.tree.len()
    }

    /// Returns true if the map has no entries
    pub fn is_empty(&self) -> bool {
        self.tree.is_empty()
    }

    /// Inserts `value` for the range `[start, end)`
    ///
    /// Point entries with `start == end` are allowed. Returns `Code::InvArgs` if `end < start` and
    /// `Code::Exists` if the range overlaps with an existing entry or an entry with the same start
    /// exists already.
    pub fn insert(&mut self, start: u64, end: u64, value: V) -> Result<(), Error> {
        if end < start {
            return Err(Error::new(Code::InvArgs));
        }
        if self.tree.search(start).is_some() || self.overlaps(start, end) {
            return Err(Error::new(Code::Exists));
        }

        let entry = NonNull::from(Box::leak(Box::new(Entry {
            start,
            end,
            value,
            links: RbLinks::new(),
        })));
        // safety: the entry is new and lives until we remove it from the tree
        unsafe { self.tree.insert(entry) };
        Ok(())
    }

    fn overlaps(&self, start: u64, end: u64) -> bool {
        let prev = self.tree.less_than_search(start);
        let next = self.tree.enum_start(start);
        prev.into_iter()
            .chain(next)
            .any(|e| math::overlaps(start, end.max(start.saturating_add(1)), e.start, e.end))
    }

    /// Returns the value of the entry that starts at `start`
    pub fn get(&self, start: u64) -> Option<&V> {
        self.tree.search(start).map(|e| &e.value)
    }

    /// Returns the value of the entry that starts at `start` mutably
    pub fn get_mut(&mut self, start: u64) -> Option<&mut V> {
        // safety: we own all entries and hold the map mutably
        self.tree
            .search_ptr(start)
            .map(|e| unsafe { &mut (*e.as_ptr()).value })
    }

    /// Returns the range and value of the entry that contains `addr`
    pub fn find(&self, addr: u64) -> Option<(u64, u64, &V)> {
        self.tree
            .range_search(addr)
            .map(|e| (e.start, e.end, &e.value))
    }

    /// Returns the range and value of the entry with the greatest start that is less than `start`
    pub fn find_prev(&self, start: u64) -> Option<(u64, u64, &V)> {
        self.tree
            .less_than_search(start)
            .map(|e| (e.start, e.end, &e.value))
    }

    /// Removes the entry that starts at `start` and returns its value
    pub fn remove(&mut self, start: u64) -> Option<V> {
        let entry = self.tree.search_ptr(start)?;
        // safety: the entry is a member of our tree and was allocated by insert
        unsafe {
            self.tree.unlink(entry);
            Some(Box::from_raw(entry.as_ptr()).value)
        }
    }

    /// Returns an iterator over all entries that start at or after `start` in ascending order
    pub fn iter_from(&self, start: u64) -> impl Iterator<Item = (u64, u64, &V)> {
        self.tree
            .iter_from(start)
            .map(|e| (e.start, e.end, &e.value))
    }

    /// Returns an iterator over all entries in ascending order
    pub fn iter(&self) -> impl Iterator<Item = (u64, u64, &V)> {
        self.iter_from(0)
    }

    /// Checks the invariants of the underlying tree (see [`RbTree::check`])
    pub fn check(&self) -> Option<usize> {
        self.tree.check()
    }

    /// Removes all entries
    pub fn clear(&mut self) {
        while let Some(start) = self.tree.first().map(|e| e.start) {
            self.remove(start);
        }
    }
}

impl<V> Default for RangeMap<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V> Drop for RangeMap<V> {
    fn drop(&mut self) {
        self.clear();
    }
}

impl<V: fmt::Debug> fmt::Debug for RangeMap<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (start, end, v) in self.iter() {
            writeln!(f, "  [{:#x} .. {:#x}) -> {:?}", start, end, v)?;
        }
        Ok(())
    }
}
