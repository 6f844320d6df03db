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

use base::errors::{Code, Error};
use base::time::TimeInstant;

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex, PoisonError};

use crate::Timeout;

/// A queue of threads waiting for a condition
///
/// Waiters check their condition with the internal lock held and wakers take the lock before
/// notifying, so that no wakeup gets lost.
#[derive(Default)]
pub struct WaitQueue {
    interrupts: Mutex<u64>,
    cond: Condvar,
}

impl WaitQueue {
    /// Creates a new wait queue
    pub fn new() -> Self {
        Self::default()
    }

    /// Waits until `cond` holds
    ///
    /// Returns `Code::Timeout` if the timeout elapsed before and `Code::Interrupted` if the wait
    /// was interrupted via [`interrupt`](WaitQueue::interrupt).
    pub fn wait_until<F: Fn() -> bool>(&self, cond: F, timeout: Timeout) -> Result<(), Error> {
        let deadline = timeout.deadline();
        let mut irqs = self.interrupts.lock().unwrap_or_else(PoisonError::into_inner);
        let start = *irqs;

        loop {
            if cond() {
                return Ok(());
            }
            if *irqs != start {
                return Err(Error::new(Code::Interrupted));
            }

            irqs = match deadline {
                None => self
                    .cond
                    .wait(irqs)
                    .unwrap_or_else(PoisonError::into_inner),
                Some(d) => {
                    let now = TimeInstant::now();
                    if now >= d {
                        return Err(Error::new(Code::Timeout));
                    }
                    self.cond
                        .wait_timeout(irqs, d - now)
                        .unwrap_or_else(PoisonError::into_inner)
                        .0
                },
            };
        }
    }

    /// Wakes up all waiters to re-evaluate their condition
    pub fn wake_all(&self) {
        let _irqs = self.interrupts.lock().unwrap_or_else(PoisonError::into_inner);
        self.cond.notify_all();
    }

    /// Interrupts all current waiters
    pub fn interrupt(&self) {
        let mut irqs = self.interrupts.lock().unwrap_or_else(PoisonError::into_inner);
        *irqs += 1;
        self.cond.notify_all();
    }
}

impl fmt::Debug for WaitQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "WaitQueue")
    }
}

/// A binary semaphore that is acquired by the producer of some work and released on completion
///
/// Releasing the semaphore wakes up all waiters on the associated wait queue.
#[derive(Debug)]
pub struct Semaphore {
    acquired: AtomicBool,
    wq: Arc<WaitQueue>,
}

impl Semaphore {
    /// Creates a new released semaphore that signals `wq`
    pub fn new(wq: Arc<WaitQueue>) -> Self {
        Self {
            acquired: AtomicBool::new(false),
            wq,
        }
    }

    /// Returns the wait queue that is signalled on release
    pub fn wait_queue(&self) -> &Arc<WaitQueue> {
        &self.wq
    }

    /// Marks the semaphore as acquired
    ///
    /// Returns false if it was acquired already.
    pub fn acquire(&self) -> bool {
        !self.acquired.swap(true, Ordering::AcqRel)
    }

    /// Releases the semaphore and wakes up all waiters
    pub fn release(&self) {
        self.acquired.store(false, Ordering::Release);
        self.wq.wake_all();
    }

    /// Returns true if the semaphore is currently acquired
    pub fn is_acquired(&self) -> bool {
        self.acquired.load(Ordering::Acquire)
    }
}
