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
use std::marker::PhantomData;
use std::mem;
use std::ops::Deref;
use std::ptr::NonNull;

use crate::rc::RefCount;

struct KrefBox<T> {
    refs: RefCount,
    value: T,
}

/// Thread-safe reference-counted pointer on top of [`RefCount`]
///
/// Cloning a `Kref` takes a new reference and dropping it puts the reference. The value is dropped
/// together with the last reference. In contrast to `Arc`, `put` reports whether the last
/// reference was dropped and the count is observable via [`refs`](Kref::refs).
pub struct Kref<T> {
    ptr: NonNull<KrefBox<T>>,
    phantom: PhantomData<KrefBox<T>>,
}

unsafe impl<T: Send + Sync> Send for Kref<T> {
}
unsafe impl<T: Send + Sync> Sync for Kref<T> {
}

impl<T> Kref<T> {
    /// Creates a new `Kref` with given object and a reference count of 1
    pub fn new(value: T) -> Self {
        Self {
            ptr: NonNull::from(Box::leak(Box::new(KrefBox {
                refs: RefCount::new(),
                value,
            }))),
            phantom: PhantomData,
        }
    }

    fn inner(&self) -> &KrefBox<T> {
        // safety: the box stays alive as long as we hold a reference
        unsafe { self.ptr.as_ref() }
    }

    /// Returns the current number of references
    pub fn refs(this: &Self) -> u32 {
        this.inner().refs.read()
    }

    /// Takes a new reference unless the object is already being released
    pub fn try_get(this: &Self) -> Option<Self> {
        match this.inner().refs.get_unless_zero() {
            true => Some(Self {
                ptr: this.ptr,
                phantom: PhantomData,
            }),
            false => None,
        }
    }

    /// Returns true if both pointers refer to the same object
    pub fn ptr_eq(this: &Self, other: &Self) -> bool {
        this.ptr == other.ptr
    }

    /// Puts the reference `this` and returns true if it was the last one
    ///
    /// In this case, the object has been dropped.
    pub fn put(mut this: Self) -> bool {
        let last = this.drop_ref();
        mem::forget(this);
        last
    }

    fn drop_ref(&mut self) -> bool {
        let last = self.inner().refs.put_return(|| {});
        if last {
            // safety: we were the last user of the box
            unsafe { drop(Box::from_raw(self.ptr.as_ptr())) };
        }
        last
    }
}

impl<T> Deref for Kref<T> {
    type Target = T;

    fn deref(&self) -> &Self::Target {
        &self.inner().value
    }
}

impl<T> Clone for Kref<T> {
    fn clone(&self) -> Self {
        self.inner().refs.get();
        Self {
            ptr: self.ptr,
            phantom: PhantomData,
        }
    }
}

impl<T> Drop for Kref<T> {
    fn drop(&mut self) {
        self.drop_ref();
    }
}

impl<T: fmt::Debug> fmt::Debug for Kref<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&**self, f)
    }
}
