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

use base::time::TimeDuration;

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

fn alloc_id() -> u64 {
    // process-wide and never reused, even after the domain or the scheduler is gone
    static NEXT_ID: AtomicU64 = AtomicU64::new(0);
    NEXT_ID.fetch_add(1, Ordering::Relaxed) + 1
}

/// A scheduling domain: a named partition with a timeslice and a preemption grace period
///
/// This is a descriptor of a domain registered at a [`Scheduler`](crate::Scheduler). The reference
/// count of the domain is kept by the scheduler.
#[derive(Clone, PartialEq, Eq)]
pub struct NvsDomain {
    id: u64,
    name: String,
    timeslice_ns: u64,
    preempt_grace_ns: u64,
}

impl NvsDomain {
    pub(crate) fn new(name: &str, timeslice_ns: u64, preempt_grace_ns: u64) -> Self {
        Self {
            id: alloc_id(),
            name: name.to_string(),
            timeslice_ns,
            preempt_grace_ns,
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn timeslice_ns(&self) -> u64 {
        self.timeslice_ns
    }

    pub fn timeslice(&self) -> TimeDuration {
        TimeDuration::from_nanos(self.timeslice_ns)
    }

    pub fn preempt_grace_ns(&self) -> u64 {
        self.preempt_grace_ns
    }
}

impl fmt::Debug for NvsDomain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "NvsDomain[id={}, name={}, timeslice={}ns, grace={}ns]",
            self.id, self.name, self.timeslice_ns, self.preempt_grace_ns
        )
    }
}
