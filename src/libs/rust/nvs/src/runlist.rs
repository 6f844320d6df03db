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
use base::io::LogFlags;
use base::log;

use std::fmt;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::NvsDomain;

/// The runlist collaborator of the [`Scheduler`](crate::Scheduler)
///
/// The runlists hold the per-domain resources of the hardware. The scheduler allocates and releases
/// them together with its domains and ticks them whenever the active domain changes.
pub trait Runlist: Send + Sync {
    /// Allocates the runlist resources for the domain with given name
    fn alloc_domain(&self, name: &str) -> Result<(), Error>;

    /// Releases the runlist resources for the domain with given name
    fn delete_domain(&self, name: &str) -> Result<(), Error>;

    /// Advances the runlists to `next`, the now-active domain
    fn tick(&self, next: &NvsDomain);

    /// Releases the resources of all domains; is called when the scheduler is closed
    fn cleanup(&self) {
    }

    /// Locks all active runlists and returns the mask of locked runlists
    fn lock_active_runlists(&self) -> u32 {
        0
    }

    /// Unlocks the runlists in `mask`
    fn unlock_runlists(&self, _mask: u32) {
    }
}

struct RlDomains {
    domains: Vec<String>,
    current: Option<usize>,
    capacity: usize,
}

impl RlDomains {
    fn find(&self, name: &str) -> Option<usize> {
        self.domains.iter().position(|d| d == name)
    }

    fn alloc(&mut self, name: &str) -> Result<(), Error> {
        if self.find(name).is_some() {
            return Err(Error::new(Code::Exists));
        }
        if self.domains.len() >= self.capacity {
            return Err(Error::new(Code::OutOfMem));
        }

        self.domains.push(name.to_string());
        if self.current.is_none() {
            self.current = Some(self.domains.len() - 1);
        }
        Ok(())
    }

    fn switch_to(&mut self, idx: usize) {
        self.current = Some(idx);
    }

    fn switch_next(&mut self) {
        if self.domains.is_empty() {
            self.current = None;
        }
        else {
            let next = self.current.map_or(0, |c| (c + 1) % self.domains.len());
            self.switch_to(next);
        }
    }

    fn remove(&mut self, idx: usize) {
        if self.current == Some(idx) {
            self.switch_next();
        }

        self.domains.remove(idx);
        self.current = match self.current {
            _ if self.domains.is_empty() => None,
            Some(c) if c > idx => Some(c - 1),
            c => c,
        };
    }
}

/// A software implementation of the runlist collaborator
///
/// Every runlist keeps its own list of domains and its current domain. All runlists get the same
/// domains and each of them holds at most `capacity` domains.
pub struct SwRunlist {
    runlists: Mutex<Vec<RlDomains>>,
    locked: AtomicU32,
    ticks: AtomicU64,
}

impl SwRunlist {
    /// Creates `num` runlists with room for `capacity` domains each
    pub fn new(num: usize, capacity: usize) -> Self {
        Self::with_capacities(vec![capacity; num])
    }

    /// Creates one runlist per given capacity
    pub fn with_capacities(capacities: Vec<usize>) -> Self {
        Self {
            runlists: Mutex::new(
                capacities
                    .into_iter()
                    .map(|capacity| RlDomains {
                        domains: Vec::new(),
                        current: None,
                        capacity,
                    })
                    .collect(),
            ),
            locked: AtomicU32::new(0),
            ticks: AtomicU64::new(0),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Vec<RlDomains>> {
        self.runlists.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Returns the number of runlists
    pub fn count(&self) -> usize {
        self.lock().len()
    }

    /// Returns the names of the domains in runlist `rl` in list order
    pub fn domains(&self, rl: usize) -> Vec<String> {
        self.lock()
            .get(rl)
            .map(|r| r.domains.clone())
            .unwrap_or_default()
    }

    /// Returns the name of the current domain of runlist `rl`
    pub fn current(&self, rl: usize) -> Option<String> {
        let rls = self.lock();
        let r = rls.get(rl)?;
        r.current.map(|c| r.domains[c].clone())
    }

    /// Returns the number of ticks so far
    pub fn ticks(&self) -> u64 {
        self.ticks.load(Ordering::Acquire)
    }

    /// Returns the mask of currently locked runlists
    pub fn locked_mask(&self) -> u32 {
        self.locked.load(Ordering::Acquire)
    }
}

impl Runlist for SwRunlist {
    fn alloc_domain(&self, name: &str) -> Result<(), Error> {
        let mut rls = self.lock();
        for i in 0..rls.len() {
            if let Err(e) = rls[i].alloc(name) {
                log!(
                    LogFlags::NvsRunlist,
                    "runlist {}: unable to allocate domain {}: {:?}",
                    i,
                    name,
                    e.code()
                );
                // undo the runlists we have already allocated for
                for rl in &mut rls[..i] {
                    if let Some(idx) = rl.find(name) {
                        rl.remove(idx);
                    }
                }
                return Err(e);
            }
        }

        log!(
            LogFlags::NvsRunlist,
            "allocated domain {} in {} runlists",
            name,
            rls.len()
        );
        Ok(())
    }

    fn delete_domain(&self, name: &str) -> Result<(), Error> {
        let mut rls = self.lock();

        // a runlist always needs a domain; check all first to not delete it partially
        if rls
            .iter()
            .any(|rl| rl.domains.len() == 1 && rl.find(name).is_some())
        {
            log!(
                LogFlags::NvsRunlist,
                "refusing to delete {}: last domain of a runlist",
                name
            );
            return Err(Error::new(Code::InvArgs));
        }

        for rl in rls.iter_mut() {
            if let Some(idx) = rl.find(name) {
                rl.remove(idx);
            }
        }

        log!(LogFlags::NvsRunlist, "deleted domain {}", name);
        Ok(())
    }

    fn tick(&self, next: &NvsDomain) {
        let mut rls = self.lock();
        for rl in rls.iter_mut() {
            match rl.find(next.name()) {
                Some(idx) => rl.switch_to(idx),
                None => rl.switch_next(),
            }
        }
        let ticks = self.ticks.fetch_add(1, Ordering::AcqRel) + 1;
        log!(
            LogFlags::NvsRunlist,
            "tick {}: switched to {}",
            ticks,
            next.name()
        );
    }

    fn cleanup(&self) {
        let mut rls = self.lock();
        for rl in rls.iter_mut() {
            rl.domains.clear();
            rl.current = None;
        }
        log!(LogFlags::NvsRunlist, "released all domains");
    }

    fn lock_active_runlists(&self) -> u32 {
        let num = self.lock().len().min(32) as u32;
        let mask = if num == 32 { !0 } else { (1 << num) - 1 };
        self.locked.fetch_or(mask, Ordering::AcqRel);
        mask
    }

    fn unlock_runlists(&self, mask: u32) {
        self.locked.fetch_and(!mask, Ordering::AcqRel);
    }
}

impl fmt::Debug for SwRunlist {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rls = self.lock();
        f.debug_list()
            .entries(rls.iter().map(|rl| (&rl.domains, rl.current)))
            .finish()
    }
}
