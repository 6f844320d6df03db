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
use std::sync::Arc;

/// The operations of an OS-level fence (e.g., a sync file handed out to user space)
pub trait OsFenceOps: Send + Sync + fmt::Debug {
    /// Returns the name of the fence
    fn name(&self) -> &str;

    /// Returns true if the fence has been signalled
    fn is_signaled(&self) -> bool;
}

/// A reference to an OS-level fence
///
/// The OS fence has its own reference count: cloning takes a new reference and dropping puts it.
#[derive(Clone, Debug)]
pub struct OsFence(Arc<dyn OsFenceOps>);

impl OsFence {
    /// Creates a new OS fence with given operations
    pub fn new<O: OsFenceOps + 'static>(ops: O) -> Self {
        Self(Arc::new(ops))
    }

    /// Returns the name of the fence
    pub fn name(&self) -> &str {
        self.0.name()
    }

    /// Returns true if the fence has been signalled
    pub fn is_signaled(&self) -> bool {
        self.0.is_signaled()
    }

    /// Returns the number of references to the OS fence
    pub fn refs(&self) -> usize {
        Arc::strong_count(&self.0)
    }

    /// Returns true if both refer to the same OS fence
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}
