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
use base::time::{TimeDuration, TimeInstant};

use std::cmp;
use std::thread;

/// The timeout of a wait operation
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Timeout {
    /// Wait at most the given duration
    Bounded(TimeDuration),
    /// Wait until the condition holds or the wait is interrupted
    Infinite,
}

impl Timeout {
    /// Creates a bounded timeout of `ms` milliseconds
    pub fn from_millis(ms: u64) -> Self {
        Self::Bounded(TimeDuration::from_millis(ms))
    }

    /// Returns the point in time at which a wait started now expires
    pub fn deadline(&self) -> Option<TimeInstant> {
        match self {
            Self::Bounded(d) => Some(TimeInstant::now() + *d),
            Self::Infinite => None,
        }
    }
}

/// The caller-level policy for fence waits
///
/// On platforms other than silicon (simulators, emulation), waits are not bounded, because the
/// platform can be arbitrarily slow.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct WaitPolicy {
    silicon: bool,
    default: TimeDuration,
}

impl WaitPolicy {
    /// Creates a new policy with the default timeout
    pub fn new(silicon: bool) -> Self {
        Self::with_timeout(
            silicon,
            TimeDuration::from_millis(cfg::FENCE_DEFAULT_TIMEOUT_MS),
        )
    }

    /// Creates a new policy with given default timeout
    pub fn with_timeout(silicon: bool, default: TimeDuration) -> Self {
        Self { silicon, default }
    }

    /// Returns true if the policy is meant for silicon
    pub fn is_silicon(&self) -> bool {
        self.silicon
    }

    /// Returns the timeout to use for waits without an explicit timeout
    pub fn timeout(&self) -> Timeout {
        self.apply(Timeout::Bounded(self.default))
    }

    /// Returns the timeout to use instead of `timeout`
    pub fn apply(&self, timeout: Timeout) -> Timeout {
        match self.silicon {
            true => timeout,
            false => Timeout::Infinite,
        }
    }
}

impl Default for WaitPolicy {
    fn default() -> Self {
        Self::new(true)
    }
}

/// Exponential backoff between two polls
///
/// The delay starts at `min` and doubles after every poll until it reaches `max`.
#[derive(Debug, Copy, Clone)]
pub struct Backoff {
    min: TimeDuration,
    cur: TimeDuration,
    max: TimeDuration,
}

impl Backoff {
    /// Creates a new backoff from `min` to `max`
    pub fn new(min: TimeDuration, max: TimeDuration) -> Self {
        let max = cmp::max(min, max);
        Self { min, cur: min, max }
    }

    /// Returns the current delay and doubles it for the next call
    pub fn next_delay(&mut self) -> TimeDuration {
        let delay = self.cur;
        self.cur = cmp::min(self.cur * 2, self.max);
        delay
    }

    /// Resets the delay to the minimum
    pub fn reset(&mut self) {
        self.cur = self.min;
    }

    /// Sleeps for the next delay, but not beyond `deadline`
    pub fn sleep(&mut self, deadline: Option<TimeInstant>) {
        let mut delay = self.next_delay();
        if let Some(d) = deadline {
            delay = cmp::min(delay, d.duration_since(TimeInstant::now()));
        }
        if !delay.is_zero() {
            thread::sleep(delay);
        }
    }
}

impl Default for Backoff {
    fn default() -> Self {
        Self::new(
            TimeDuration::from_micros(cfg::POLL_BACKOFF_MIN_US),
            TimeDuration::from_micros(cfg::POLL_BACKOFF_MAX_US),
        )
    }
}
