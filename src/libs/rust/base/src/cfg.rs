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

//! The compile-time configuration

use crate::const_assert;

pub const NSEC_PER_MSEC: u64 = 1_000_000;

/// The name of the domain that is created on scheduler init
pub const DEFAULT_DOMAIN_NAME: &str = "(default)";

pub const DEFAULT_TIMESLICE_NS: u64 = 100 * NSEC_PER_MSEC;
pub const DEFAULT_PREEMPT_GRACE_NS: u64 = 0;

/// The worker wakeup interval in milliseconds if there is no active domain
pub const SCHED_IDLE_POLL_MS: u64 = 100;
/// The first worker wakeup after the scheduler has been opened
pub const SCHED_INITIAL_WAKEUP_MS: u64 = 100;
pub const SCHED_WORKER_NAME: &str = "nvs_worker";

pub const FENCE_DEFAULT_TIMEOUT_MS: u64 = 3000;

pub const POLL_BACKOFF_MIN_US: u64 = 10;
pub const POLL_BACKOFF_MAX_US: u64 = 1000;

const_assert!(POLL_BACKOFF_MIN_US > 0);
const_assert!(POLL_BACKOFF_MIN_US <= POLL_BACKOFF_MAX_US);
const_assert!(SCHED_IDLE_POLL_MS > 0);
const_assert!(DEFAULT_TIMESLICE_NS >= NSEC_PER_MSEC);
