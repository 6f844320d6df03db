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
use base::time::TimeInstant;

use std::fmt;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use crate::{Backoff, Timeout};

/// Raw access to 32-bit device registers
pub trait RegIo: Send + Sync {
    /// Reads the register at `addr`
    fn read(&self, addr: u32) -> u32;

    /// Writes `val` to the register at `addr`
    fn write(&self, addr: u32, val: u32);
}

/// Registers in host memory, used for simulation and tests
pub struct MemRegs {
    regs: Vec<AtomicU32>,
}

impl MemRegs {
    /// Creates `count` registers, all initialized to zero
    pub fn new(count: usize) -> Self {
        Self {
            regs: (0..count).map(|_| AtomicU32::new(0)).collect(),
        }
    }

    fn reg(&self, addr: u32) -> Option<&AtomicU32> {
        let reg = self.regs.get(addr as usize / 4);
        if reg.is_none() {
            log!(LogFlags::Warn, "regs: access to invalid register {:#x}", addr);
        }
        reg
    }
}

impl RegIo for MemRegs {
    fn read(&self, addr: u32) -> u32 {
        self.reg(addr).map_or(!0, |r| r.load(Ordering::Acquire))
    }

    fn write(&self, addr: u32, val: u32) {
        if let Some(r) = self.reg(addr) {
            r.store(val, Ordering::Release);
        }
    }
}

/// Returns true if the free-running counter value `cur` has reached `thresh`
///
/// The comparison handles the wraparound of the counter: values up to 2^31 behind `cur` count as
/// reached.
pub fn syncpt_reached(cur: u32, thresh: u32) -> bool {
    (cur.wrapping_sub(thresh) as i32) >= 0
}

const SYNCPT_STRIDE: u32 = 4;

/// A device with free-running syncpoint counters
///
/// Every syncpoint is a 32-bit hardware register. The device caches the last value read from the
/// hardware (the "min"), which is typically updated on completion interrupts. Checks use the
/// cached value first and re-read the hardware only if that is not sufficient.
pub struct SyncptDev {
    regs: Arc<dyn RegIo>,
    base: u32,
    mins: Vec<AtomicU32>,
}

impl SyncptDev {
    /// Creates a new device with `count` syncpoints whose registers start at `base`
    pub fn new(regs: Arc<dyn RegIo>, base: u32, count: usize) -> Self {
        Self {
            regs,
            base,
            mins: (0..count).map(|_| AtomicU32::new(0)).collect(),
        }
    }

    /// Returns the number of syncpoints
    pub fn count(&self) -> usize {
        self.mins.len()
    }

    /// Returns true if `id` denotes a syncpoint of this device
    pub fn is_valid(&self, id: u32) -> bool {
        (id as usize) < self.mins.len()
    }

    fn check(&self, id: u32) -> Result<(), Error> {
        match self.is_valid(id) {
            true => Ok(()),
            false => Err(Error::new(Code::InvArgs)),
        }
    }

    fn reg(&self, id: u32) -> u32 {
        self.base + id * SYNCPT_STRIDE
    }

    /// Returns the cached value of syncpoint `id`
    pub fn read_min(&self, id: u32) -> Result<u32, Error> {
        self.check(id)?;
        Ok(self.mins[id as usize].load(Ordering::Acquire))
    }

    /// Reads syncpoint `id` from the hardware, updates the cached value, and returns it
    pub fn update_min(&self, id: u32) -> Result<u32, Error> {
        self.check(id)?;
        let val = self.regs.read(self.reg(id));
        self.mins[id as usize].store(val, Ordering::Release);
        Ok(val)
    }

    /// Increments syncpoint `id` in hardware and returns the new value
    pub fn incr(&self, id: u32) -> Result<u32, Error> {
        self.check(id)?;
        let val = self.regs.read(self.reg(id)).wrapping_add(1);
        self.regs.write(self.reg(id), val);
        log!(LogFlags::LibSyncpt, "syncpt {}: incremented to {}", id, val);
        Ok(val)
    }

    /// Returns true if syncpoint `id` reached `thresh`
    ///
    /// If the cached value has not reached the threshold, the hardware is read once, because no
    /// completion interrupt might have been registered for this value.
    pub fn is_expired(&self, id: u32, thresh: u32) -> bool {
        match self.read_min(id) {
            Ok(min) if syncpt_reached(min, thresh) => true,
            Ok(_) => self
                .update_min(id)
                .map_or(false, |cur| syncpt_reached(cur, thresh)),
            Err(_) => false,
        }
    }

    /// Waits until syncpoint `id` reached `thresh`, polling the hardware with exponential backoff
    ///
    /// Returns `Code::InvArgs` for invalid syncpoints and `Code::Timeout` if the timeout elapsed.
    pub fn wait(
        &self,
        id: u32,
        thresh: u32,
        timeout: Timeout,
        backoff: &mut Backoff,
    ) -> Result<(), Error> {
        self.check(id)?;

        let deadline = timeout.deadline();
        let mut polls = 0;
        loop {
            if self.is_expired(id, thresh) {
                log!(
                    LogFlags::LibSyncpt,
                    "syncpt {}: reached {} after {} polls",
                    id,
                    thresh,
                    polls
                );
                return Ok(());
            }

            if deadline.map_or(false, |d| TimeInstant::now() >= d) {
                log!(
                    LogFlags::LibSyncpt,
                    "syncpt {}: timeout waiting for {} (cur={:?})",
                    id,
                    thresh,
                    self.read_min(id)
                );
                return Err(Error::new(Code::Timeout));
            }

            backoff.sleep(deadline);
            polls += 1;
        }
    }
}

impl fmt::Debug for SyncptDev {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SyncptDev[base={:#x}, count={}]", self.base, self.count())
    }
}
