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

//! The base library shared by the scheduler, fence, and worker crates.
//!
//! It contains the error codes, the logger, time types, configuration helpers, reference counters,
//! the intrusive red-black tree, and the WvTest harness.

// Macros
pub use static_assertions::const_assert;

#[macro_use]
pub mod io;
#[macro_use]
pub mod test;

pub mod cfg;
pub mod col;
pub mod errors;
pub mod rc;
pub mod time;
pub mod util;
