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

use bitflags::bitflags;

use std::str;

bitflags! {
    /// All log flags
    ///
    /// Logging is controlled at runtime via the environment variable `LOG`, which is read by
    /// [`init`](crate::io::init). Any component can then use the `log` macro to log something. The
    /// available flags are kept here.
    ///
    /// There are four general flags: `Info`, `Warn`, `Error`, and `Debug`. Info, Warn, and Error
    /// are enabled by default. Warnings are used for invariant violations that indicate a bug in
    /// the caller (e.g., reference count underflows), but are not propagated as errors.
    ///
    /// Additionally, there are per-component flags such as `LibSyncpt` or `NvsTick` that control
    /// the logging of certain aspects within a specific component.
    #[derive(Copy, Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
    pub struct LogFlags : u64 {
        /// General: informational output (enabled by default)
        const Info          = 1 << 0;
        /// General: debugging output (disable by default)
        const Debug         = 1 << 1;
        /// General: error output (enabled by default)
        const Error         = 1 << 2;
        /// General: invariant warnings (enabled by default)
        const Warn          = 1 << 3;

        #[doc(hidden)]
        const __lib_start = 4;

        /// libraries: red-black tree operations
        const LibRbTree     = 1 << (Self::__lib_start.bits() + 0);
        /// libraries: reference counters
        const LibRefs       = 1 << (Self::__lib_start.bits() + 1);
        /// libraries: worker threads
        const LibThread     = 1 << (Self::__lib_start.bits() + 2);
        /// libraries: fence creation, waits and releases
        const LibFence      = 1 << (Self::__lib_start.bits() + 3);
        /// libraries: syncpoint polling
        const LibSyncpt     = 1 << (Self::__lib_start.bits() + 4);

        #[doc(hidden)]
        const __nvs_start = Self::__lib_start.bits() + 5;

        /// Scheduler: domain creation/removal and lookups
        const NvsDoms       = 1 << (Self::__nvs_start.bits() + 0);
        /// Scheduler: open/close and configuration
        const NvsSched      = 1 << (Self::__nvs_start.bits() + 1);
        /// Scheduler: worker ticks
        const NvsTick       = 1 << (Self::__nvs_start.bits() + 2);
        /// Scheduler: runlist operations
        const NvsRunlist    = 1 << (Self::__nvs_start.bits() + 3);
    }
}

impl Default for LogFlags {
    fn default() -> Self {
        Self::Info | Self::Warn | Self::Error
    }
}

impl str::FromStr for LogFlags {
    type Err = bitflags::parser::ParseError;

    fn from_str(flags: &str) -> Result<Self, Self::Err> {
        Ok(Self(flags.parse()?))
    }
}
