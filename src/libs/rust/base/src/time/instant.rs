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

//! Contains time measurement functions

use lazy_static::lazy_static;

use std::fmt;
use std::ops::{Add, AddAssign, Sub};
use std::time::Instant;

use crate::time::TimeDuration;

lazy_static! {
    static ref START: Instant = Instant::now();
}

/// A measurement of time, represented in nanoseconds since the first use of the clock. Useful in
/// combination with [`TimeDuration`].
// inspired by std::time::Instant
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TimeInstant(u64);

impl TimeInstant {
    /// Returns an instant corresponding to "now".
    pub fn now() -> Self {
        Self::from_nanos(START.elapsed().as_nanos() as u64)
    }

    /// Creates a new time instant from the given number of nanoseconds.
    pub fn from_nanos(nanos: u64) -> Self {
        Self(nanos)
    }

    /// Returns the time instant in nanoseconds
    pub fn as_nanos(&self) -> u64 {
        self.0
    }

    /// Returns the amount of time elapsed from another instant to this one, or None if that instant
    /// is later than this one.
    pub fn checked_duration_since(&self, earlier: Self) -> Option<TimeDuration> {
        self.0.checked_sub(earlier.0).map(TimeDuration::from_nanos)
    }

    /// Returns the amount of time elapsed from another instant to this one, or zero if that
    /// instant is later than this one.
    pub fn duration_since(&self, earlier: Self) -> TimeDuration {
        TimeDuration::from_nanos(self.0.saturating_sub(earlier.0))
    }

    /// Returns the amount of time elapsed since this instant was created.
    pub fn elapsed(&self) -> TimeDuration {
        Self::now().duration_since(*self)
    }
}

impl Add<TimeDuration> for TimeInstant {
    type Output = TimeInstant;

    fn add(self, other: TimeDuration) -> TimeInstant {
        let nanos = u64::try_from(other.as_nanos()).unwrap_or(u64::MAX);
        Self::from_nanos(self.0.saturating_add(nanos))
    }
}

impl AddAssign<TimeDuration> for TimeInstant {
    fn add_assign(&mut self, other: TimeDuration) {
        *self = *self + other;
    }
}

impl Sub<TimeInstant> for TimeInstant {
    type Output = TimeDuration;

    fn sub(self, other: TimeInstant) -> TimeDuration {
        self.duration_since(other)
    }
}

impl fmt::Debug for TimeInstant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ns", self.0)
    }
}
