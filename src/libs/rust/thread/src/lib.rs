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

//! A generic worker: a named background thread that processes enqueued items and calls a set of
//! hooks around every wakeup.
//!
//! The worker sleeps until an item is enqueued, the optional wakeup condition holds, or the
//! dynamic timeout of the hooks expires. After each wakeup it processes all pending items and
//! calls [`WorkerOps::wakeup_post_process`], which allows users to implement self-rearming timer
//! loops.

use base::errors::{Code, Error};
use base::io::LogFlags;
use base::log;
use base::time::{TimeDuration, TimeInstant};

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread;

/// The hooks of a [`Worker`]
///
/// All hooks are called on the worker thread. The default implementations do nothing.
pub trait WorkerOps: Send + 'static {
    /// The type of the items that can be enqueued
    type Item: Send + 'static;

    /// Is called once on the worker thread before the first wakeup
    fn pre_process(&mut self) {
    }

    /// Is called after every wakeup; returning true terminates the worker
    fn wakeup_early_exit(&mut self) -> bool {
        false
    }

    /// An additional condition that wakes up the worker
    ///
    /// This is checked with the internal lock of the worker held, so that it should be cheap.
    fn wakeup_condition(&self) -> bool {
        false
    }

    /// Processes the given item
    fn wakeup_process_item(&mut self, _item: Self::Item) {
    }

    /// Returns the time until the next wakeup or None to sleep until an item arrives
    fn wakeup_timeout(&self) -> Option<TimeDuration> {
        None
    }

    /// Is called after the items of a wakeup have been processed
    fn wakeup_post_process(&mut self) {
    }
}

struct State<I> {
    items: VecDeque<I>,
    stop: bool,
    running: bool,
}

struct Shared<I> {
    state: Mutex<State<I>>,
    cond: Condvar,
}

impl<I> Shared<I> {
    fn lock(&self) -> MutexGuard<'_, State<I>> {
        // the state is always consistent, even if a hook panicked
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn alloc_id() -> u32 {
    static NEXT_ID: AtomicU32 = AtomicU32::new(0);
    NEXT_ID.fetch_add(1, Ordering::Relaxed) + 1
}

/// A named background thread with hooks
pub struct Worker<I: Send + 'static> {
    id: u32,
    name: String,
    shared: Arc<Shared<I>>,
    handle: Option<thread::JoinHandle<()>>,
}

impl<I: Send + 'static> Worker<I> {
    /// Starts a new worker thread with given name that uses `ops` as its hooks
    ///
    /// Returns `Code::ThreadFail` if the thread could not be created.
    pub fn start<O: WorkerOps<Item = I>>(name: &str, ops: O) -> Result<Self, Error> {
        let id = alloc_id();
        let shared = Arc::new(Shared {
            state: Mutex::new(State {
                items: VecDeque::new(),
                stop: false,
                running: true,
            }),
            cond: Condvar::new(),
        });

        let thread_shared = shared.clone();
        let handle = thread::Builder::new()
            .name(name.to_string())
            .spawn(move || Self::run(id, ops, thread_shared))
            .map_err(|e| {
                log!(
                    LogFlags::Error,
                    "Unable to create worker thread {}: {}",
                    name,
                    e
                );
                Error::new(Code::ThreadFail)
            })?;

        log!(LogFlags::LibThread, "Created worker {} ({})", id, name);
        Ok(Self {
            id,
            name: name.to_string(),
            shared,
            handle: Some(handle),
        })
    }

    /// Returns the id of the worker
    pub fn id(&self) -> u32 {
        self.id
    }

    /// Returns the name of the worker
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns true if the worker thread is still processing wakeups
    pub fn is_running(&self) -> bool {
        self.shared.lock().running
    }

    /// Returns the number of items that have not been processed yet
    pub fn pending(&self) -> usize {
        self.shared.lock().items.len()
    }

    /// Enqueues the given item and wakes up the worker
    ///
    /// Returns `Code::InvState` if the worker has already stopped.
    pub fn enqueue(&self, item: I) -> Result<(), Error> {
        let mut state = self.shared.lock();
        if state.stop || !state.running {
            return Err(Error::new(Code::InvState));
        }
        state.items.push_back(item);
        self.shared.cond.notify_one();
        Ok(())
    }

    /// Wakes up the worker without an item to re-evaluate the wakeup condition and timeout
    pub fn wakeup(&self) {
        let _state = self.shared.lock();
        self.shared.cond.notify_one();
    }

    /// Stops the worker and waits until its thread has terminated
    ///
    /// Items that have not been processed yet are dropped. Calling `stop` multiple times is
    /// allowed.
    pub fn stop(&mut self) {
        let Some(handle) = self.handle.take()
        else {
            return;
        };

        {
            let mut state = self.shared.lock();
            state.stop = true;
            self.shared.cond.notify_one();
        }

        if handle.join().is_err() {
            log!(LogFlags::Error, "Worker {} ({}) panicked", self.id, self.name);
        }
        log!(LogFlags::LibThread, "Stopped worker {} ({})", self.id, self.name);
    }

    fn run<O: WorkerOps<Item = I>>(id: u32, mut ops: O, shared: Arc<Shared<I>>) {
        log!(LogFlags::LibThread, "Worker {} running", id);

        ops.pre_process();

        loop {
            let items = {
                let mut state = shared.lock();
                loop {
                    if state.stop || !state.items.is_empty() || ops.wakeup_condition() {
                        break;
                    }

                    match ops.wakeup_timeout() {
                        Some(t) if t.is_zero() => break,
                        Some(t) => {
                            let (s, res) = shared
                                .cond
                                .wait_timeout(state, t)
                                .unwrap_or_else(PoisonError::into_inner);
                            state = s;
                            if res.timed_out() {
                                break;
                            }
                        },
                        None => {
                            state = shared
                                .cond
                                .wait(state)
                                .unwrap_or_else(PoisonError::into_inner);
                        },
                    }
                }

                if state.stop {
                    break;
                }
                state.items.drain(..).collect::<Vec<_>>()
            };

            if ops.wakeup_early_exit() {
                log!(LogFlags::LibThread, "Worker {} requested exit", id);
                break;
            }

            for item in items {
                ops.wakeup_process_item(item);
            }

            ops.wakeup_post_process();
        }

        shared.lock().running = false;
        log!(LogFlags::LibThread, "Worker {} terminated", id);
    }
}

impl<I: Send + 'static> Drop for Worker<I> {
    fn drop(&mut self) {
        self.stop();
    }
}

/// A timeout for the hooks of a worker
///
/// The hooks arm the timeout (e.g., in [`WorkerOps::pre_process`]), report the remaining time via
/// [`WorkerOps::wakeup_timeout`], and check in [`WorkerOps::wakeup_post_process`] whether it
/// expired.
#[derive(Debug, Default, Copy, Clone)]
pub struct WorkerTimeout {
    deadline: Option<TimeInstant>,
}

impl WorkerTimeout {
    /// Creates a disarmed timeout
    pub const fn new() -> Self {
        Self { deadline: None }
    }

    /// Arms the timeout to expire `dur` from now
    pub fn arm(&mut self, dur: TimeDuration) {
        self.deadline = Some(TimeInstant::now() + dur);
    }

    /// Disarms the timeout
    pub fn disarm(&mut self) {
        self.deadline = None;
    }

    /// Returns true if the timeout is armed
    pub fn is_armed(&self) -> bool {
        self.deadline.is_some()
    }

    /// Returns the remaining time (zero if expired) or None if not armed
    pub fn remaining(&self) -> Option<TimeDuration> {
        self.deadline
            .map(|d| d.checked_duration_since(TimeInstant::now()).unwrap_or_default())
    }

    /// Returns true if the timeout is armed and expired
    pub fn expired(&self) -> bool {
        self.deadline.map_or(false, |d| TimeInstant::now() >= d)
    }
}
