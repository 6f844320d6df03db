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

use base::cfg;
use base::errors::{Code, Error};
use base::io::LogFlags;
use base::log;
use base::time::TimeDuration;
use base::util::math;

use thread::{Worker, WorkerOps, WorkerTimeout};

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::{NvsDomain, Runlist, SchedConfig};

struct DomainEntry {
    dom: NvsDomain,
    refs: u32,
}

struct SchedState {
    domains: Vec<DomainEntry>,
    active: Option<u64>,
    worker: Option<Worker<()>>,
}

impl SchedState {
    fn pos_by_id(&self, id: u64) -> Option<usize> {
        self.domains.iter().position(|e| e.dom.id() == id)
    }

    fn pos_by_name(&self, name: &str) -> Option<usize> {
        self.domains.iter().position(|e| e.dom.name() == name)
    }

    fn get_by_pos(&mut self, pos: usize) -> NvsDomain {
        let entry = &mut self.domains[pos];
        entry.refs += 1;
        entry.dom.clone()
    }
}

struct Inner {
    runlist: Arc<dyn Runlist>,
    cfg: SchedConfig,
    state: Mutex<Option<SchedState>>,
}

impl Inner {
    fn lock(&self) -> MutexGuard<'_, Option<SchedState>> {
        // every operation leaves the state consistent before it can panic
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn add_locked(
        &self,
        st: &mut SchedState,
        name: &str,
        timeslice_ns: u64,
        preempt_grace_ns: u64,
    ) -> Result<NvsDomain, Error> {
        if st.pos_by_name(name).is_some() {
            return Err(Error::new(Code::Exists));
        }

        st.domains
            .try_reserve(1)
            .map_err(|_| Error::new(Code::OutOfMem))?;

        let dom = NvsDomain::new(name, timeslice_ns, preempt_grace_ns);
        st.domains.push(DomainEntry {
            dom: dom.clone(),
            refs: 1,
        });

        if let Err(e) = self.runlist.alloc_domain(name) {
            log!(
                LogFlags::NvsDoms,
                "Unable to allocate runlist domain for {}: {}",
                name,
                e
            );
            st.domains.pop();
            return Err(e);
        }

        if st.active.is_none() {
            st.active = Some(dom.id());
        }

        log!(LogFlags::NvsDoms, "Added {:?}", dom);
        Ok(dom)
    }

    fn tick(&self) -> TimeDuration {
        let next = {
            let mut state = self.lock();
            let Some(st) = state.as_mut()
            else {
                return self.cfg.idle_poll;
            };

            // poll until there is a domain to schedule; an event-driven wakeup would avoid that
            let active = match st.active {
                Some(active) if !st.domains.is_empty() => active,
                _ => {
                    log!(LogFlags::NvsTick, "tick: no active domain");
                    return self.cfg.idle_poll;
                },
            };

            let next_pos = st
                .pos_by_id(active)
                .map_or(0, |pos| (pos + 1) % st.domains.len());
            let next = st.domains[next_pos].dom.clone();
            st.active = Some(next.id());
            next
        };

        log!(LogFlags::NvsTick, "tick: switching to {:?}", next);
        self.runlist.tick(&next);

        let ms = math::div_round_up(next.timeslice_ns(), cfg::NSEC_PER_MSEC).max(1);
        TimeDuration::from_millis(ms)
    }
}

struct SchedWorker {
    inner: Arc<Inner>,
    timeout: WorkerTimeout,
}

impl WorkerOps for SchedWorker {
    type Item = ();

    fn pre_process(&mut self) {
        self.timeout.arm(self.inner.cfg.initial_wakeup);
    }

    fn wakeup_timeout(&self) -> Option<TimeDuration> {
        self.timeout.remaining()
    }

    fn wakeup_post_process(&mut self) {
        if self.timeout.expired() {
            let next = self.inner.tick();
            self.timeout.arm(next);
        }
    }
}

/// The scheduler lock, held while using the `_locked` lookups
pub struct SchedGuard<'s> {
    state: MutexGuard<'s, Option<SchedState>>,
}

impl<'s> SchedGuard<'s> {
    /// Returns the domain with given id without taking a reference
    pub fn domain_by_id_locked(&self, id: u64) -> Option<&NvsDomain> {
        let st = self.state.as_ref()?;
        st.pos_by_id(id).map(|pos| &st.domains[pos].dom)
    }

    /// Returns the domain with given name without taking a reference
    pub fn domain_by_name_locked(&self, name: &str) -> Option<&NvsDomain> {
        let st = self.state.as_ref()?;
        st.pos_by_name(name).map(|pos| &st.domains[pos].dom)
    }

    /// Returns the number of domains
    pub fn domain_count(&self) -> u32 {
        self.state.as_ref().map_or(0, |st| st.domains.len() as u32)
    }
}

/// The domain scheduler
///
/// The scheduler holds an ordered list of domains of which one is the active domain. After the
/// timeslice of the active domain, the background worker makes the next domain in list order
/// active (wrapping at the end) and ticks the runlists.
///
/// Every domain carries a reference count that starts at 1 for the registration itself. Lookups
/// via [`Scheduler::domain_by_id`] and [`Scheduler::domain_by_name`] take a reference that needs to
/// be released via [`Scheduler::domain_put`]. Domains can only be deleted if no other reference
/// exists.
pub struct Scheduler {
    inner: Arc<Inner>,
}

impl Scheduler {
    /// Creates a new closed scheduler that uses the given runlists
    pub fn new(runlist: Arc<dyn Runlist>, cfg: SchedConfig) -> Self {
        Self {
            inner: Arc::new(Inner {
                runlist,
                cfg,
                state: Mutex::new(None),
            }),
        }
    }

    /// Returns the configuration
    pub fn config(&self) -> &SchedConfig {
        &self.inner.cfg
    }

    /// Opens the scheduler and starts the worker, if configured
    ///
    /// Opening an already opened scheduler does nothing.
    pub fn open(&self) -> Result<(), Error> {
        let mut state = self.inner.lock();
        if state.is_some() {
            log!(LogFlags::NvsSched, "Scheduler already open");
            return Ok(());
        }

        let mut domains = Vec::new();
        domains
            .try_reserve(1)
            .map_err(|_| Error::new(Code::OutOfMem))?;

        let worker = if self.inner.cfg.run_worker {
            let ops = SchedWorker {
                inner: self.inner.clone(),
                timeout: WorkerTimeout::new(),
            };
            Some(Worker::<()>::start(&self.inner.cfg.worker_name, ops)?)
        }
        else {
            None
        };

        *state = Some(SchedState {
            domains,
            active: None,
            worker,
        });

        log!(LogFlags::NvsSched, "Opened scheduler");
        Ok(())
    }

    /// Opens the scheduler and adds the default domain, if it does not exist yet
    pub fn init(&self) -> Result<(), Error> {
        self.open()?;

        let mut state = self.inner.lock();
        let st = state.as_mut().ok_or_else(|| Error::new(Code::InvState))?;
        if st.pos_by_name(cfg::DEFAULT_DOMAIN_NAME).is_none() {
            self.inner.add_locked(
                st,
                cfg::DEFAULT_DOMAIN_NAME,
                self.inner.cfg.default_timeslice.as_nanos() as u64,
                self.inner.cfg.default_grace.as_nanos() as u64,
            )?;
        }
        Ok(())
    }

    /// Returns true if the scheduler is open
    pub fn is_open(&self) -> bool {
        self.inner.lock().is_some()
    }

    /// Stops the worker and removes all domains
    ///
    /// Domains that are still referenced are reported, but removed nevertheless. Closing a closed
    /// scheduler does nothing.
    pub fn close(&self) {
        let worker = {
            let mut state = self.inner.lock();
            match state.as_mut() {
                Some(st) => st.worker.take(),
                None => return,
            }
        };

        // the worker ticks with the lock held, so stop it without
        if let Some(mut w) = worker {
            w.stop();
        }

        let mut state = self.inner.lock();
        if let Some(st) = state.take() {
            for e in &st.domains {
                if e.refs != 1 {
                    log!(
                        LogFlags::Warn,
                        "Domain {:?} is still in use ({} references)",
                        e.dom,
                        e.refs
                    );
                }
            }
            self.inner.runlist.cleanup();
            log!(
                LogFlags::NvsSched,
                "Closed scheduler with {} domains",
                st.domains.len()
            );
        }
    }

    /// Adds a new domain with given name, timeslice, and preemption grace period
    ///
    /// Returns `Code::Exists` if a domain with that name exists, `Code::InvState` if the scheduler
    /// is not open, or the error of the runlists.
    pub fn add_domain(
        &self,
        name: &str,
        timeslice_ns: u64,
        preempt_grace_ns: u64,
    ) -> Result<NvsDomain, Error> {
        let mut state = self.inner.lock();
        let st = state.as_mut().ok_or_else(|| Error::new(Code::InvState))?;
        self.inner
            .add_locked(st, name, timeslice_ns, preempt_grace_ns)
    }

    /// Looks up the domain with given id and takes a reference
    pub fn domain_by_id(&self, id: u64) -> Option<NvsDomain> {
        let mut state = self.inner.lock();
        let st = state.as_mut()?;
        let pos = st.pos_by_id(id)?;
        Some(st.get_by_pos(pos))
    }

    /// Looks up the domain with given name and takes a reference
    pub fn domain_by_name(&self, name: &str) -> Option<NvsDomain> {
        let mut state = self.inner.lock();
        let st = state.as_mut()?;
        let pos = st.pos_by_name(name)?;
        Some(st.get_by_pos(pos))
    }

    /// Locks the scheduler to use lookups that do not take references
    pub fn lock(&self) -> SchedGuard<'_> {
        SchedGuard {
            state: self.inner.lock(),
        }
    }

    /// Takes another reference to `dom`
    pub fn domain_get(&self, dom: &NvsDomain) {
        let mut state = self.inner.lock();
        match state
            .as_mut()
            .and_then(|st| st.pos_by_id(dom.id()).map(|pos| &mut st.domains[pos]))
        {
            Some(e) => {
                if e.refs == 0 {
                    log!(LogFlags::Warn, "Getting unreferenced domain {:?}", dom);
                }
                e.refs += 1;
            },
            None => log!(LogFlags::Warn, "Getting unknown domain {:?}", dom),
        }
    }

    /// Releases a reference to `dom`
    ///
    /// The reference of the registration cannot be released this way.
    pub fn domain_put(&self, dom: &NvsDomain) {
        let mut state = self.inner.lock();
        match state
            .as_mut()
            .and_then(|st| st.pos_by_id(dom.id()).map(|pos| &mut st.domains[pos]))
        {
            Some(e) if e.refs <= 1 => {
                log!(
                    LogFlags::Warn,
                    "Putting domain {:?} with {} references",
                    dom,
                    e.refs
                );
            },
            Some(e) => e.refs -= 1,
            None => log!(LogFlags::Warn, "Putting unknown domain {:?}", dom),
        }
    }

    /// Deletes the domain with given id
    ///
    /// Returns `Code::NotFound` if there is no such domain, `Code::Busy` if it is still referenced,
    /// or the error of the runlists. In all error cases, the domain stays registered.
    pub fn del_domain(&self, id: u64) -> Result<(), Error> {
        let mut state = self.inner.lock();
        let st = state.as_mut().ok_or_else(|| Error::new(Code::NotFound))?;
        let pos = st.pos_by_id(id).ok_or_else(|| Error::new(Code::NotFound))?;

        let refs = st.domains[pos].refs;
        if refs != 1 {
            log!(
                LogFlags::NvsDoms,
                "Unable to delete {:?}: {} references",
                st.domains[pos].dom,
                refs
            );
            return Err(Error::new(Code::Busy));
        }

        self.inner
            .runlist
            .delete_domain(st.domains[pos].dom.name())
            .map_err(|e| {
                log!(
                    LogFlags::NvsDoms,
                    "Unable to delete runlist domain {}: {}",
                    st.domains[pos].dom.name(),
                    e
                );
                e
            })?;

        if st.active == Some(id) {
            let len = st.domains.len();
            st.active = match len {
                1 => None,
                _ => Some(st.domains[(pos + 1) % len].dom.id()),
            };
        }

        let entry = st.domains.remove(pos);
        log!(LogFlags::NvsDoms, "Deleted {:?}", entry.dom);
        Ok(())
    }

    /// Returns the number of domains (0 if closed)
    pub fn domain_count(&self) -> u32 {
        self.lock().domain_count()
    }

    /// Returns the active domain
    pub fn active_domain(&self) -> Option<NvsDomain> {
        let state = self.inner.lock();
        let st = state.as_ref()?;
        let pos = st.pos_by_id(st.active?)?;
        Some(st.domains[pos].dom.clone())
    }

    /// Returns the number of references to the domain with given id
    pub fn domain_refs(&self, id: u64) -> Option<u32> {
        let state = self.inner.lock();
        let st = state.as_ref()?;
        st.pos_by_id(id).map(|pos| st.domains[pos].refs)
    }

    /// Returns all domains in list order
    pub fn domains(&self) -> Vec<NvsDomain> {
        self.inner
            .lock()
            .as_ref()
            .map(|st| st.domains.iter().map(|e| e.dom.clone()).collect())
            .unwrap_or_default()
    }

    /// Calls `func` with the scheduler and all active runlists locked
    ///
    /// This is meant for recovery, which needs a stable view on both.
    pub fn with_runlists_locked<R, F>(&self, func: F) -> R
    where
        F: FnOnce(&SchedGuard<'_>) -> R,
    {
        let guard = self.lock();
        let mask = self.inner.runlist.lock_active_runlists();
        let res = func(&guard);
        self.inner.runlist.unlock_runlists(mask);
        res
    }

    /// Makes the next domain active and ticks the runlists
    ///
    /// This is the body of the worker. Returns the time until the next tick.
    pub fn tick(&self) -> TimeDuration {
        self.inner.tick()
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        self.close();
    }
}
