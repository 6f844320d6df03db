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
use std::sync::atomic::{self, AtomicU32, Ordering};

use crate::io::LogFlags;

/// An atomic reference counter with a release callback
///
/// The counter starts at 1. [`put`](RefCount::put) decrements it and calls the given release
/// function if the counter dropped to zero. Only the thread that observes the transition to zero
/// calls the release function, so that it runs exactly once, regardless of how many threads call
/// `put` concurrently.
///
/// The counter never goes below zero and is never incremented from zero. Both cases indicate a bug
/// in the caller; they are logged with [`LogFlags::Warn`] and otherwise ignored.
pub struct RefCount {
    refs: AtomicU32,
}

impl RefCount {
    /// Creates a new counter with a count of 1
    pub const fn new() -> Self {
        Self {
            refs: AtomicU32::new(1),
        }
    }

    /// Resets the counter to 1
    pub fn init(&self) {
        self.refs.store(1, Ordering::Release);
    }

    /// Returns the current count
    pub fn read(&self) -> u32 {
        self.refs.load(Ordering::Acquire)
    }

    /// Increments the counter
    pub fn get(&self) {
        if !self.get_unless_zero() {
            log!(LogFlags::Warn, "refcount: get on released object {:p}", self);
        }
    }

    /// Increments the counter unless it is zero
    ///
    /// Returns true if the counter has been incremented. This allows to take a new reference to an
    /// object without resurrecting it during its teardown.
    pub fn get_unless_zero(&self) -> bool {
        self.refs
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |r| match r {
                0 => None,
                r => r.checked_add(1),
            })
            .is_ok()
    }

    /// Decrements the counter and calls `release` if it dropped to zero
    pub fn put<F: FnOnce()>(&self, release: F) {
        self.put_return(release);
    }

    /// Decrements the counter and calls `release` if it dropped to zero
    ///
    /// Returns true if `release` has been called.
    pub fn put_return<F: FnOnce()>(&self, release: F) -> bool {
        match self
            .refs
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |r| r.checked_sub(1))
        {
            Ok(1) => {
                // synchronize with all previous puts before tearing the object down
                atomic::fence(Ordering::Acquire);
                log!(LogFlags::LibRefs, "refcount: releasing {:p}", self);
                release();
                true
            },
            Ok(_) => false,
            Err(_) => {
                log!(LogFlags::Warn, "refcount: put on released object {:p}", self);
                false
            },
        }
    }
}

impl Default for RefCount {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for RefCount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RefCount({})", self.read())
    }
}
