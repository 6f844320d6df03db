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

//! The domain scheduler: rotates through a list of scheduling domains, each for its timeslice,
//! and keeps the runlists in sync with the active domain.

mod config;
mod domain;
mod runlist;
mod sched;

pub use self::config::SchedConfig;
pub use self::domain::NvsDomain;
pub use self::runlist::{Runlist, SwRunlist};
pub use self::sched::{SchedGuard, Scheduler};
