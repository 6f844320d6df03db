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

//! Fences track the completion of work behind one interface, regardless of whether the completion
//! is signalled by a semaphore or a hardware syncpoint.

mod fence;
mod osfence;
mod sema;
mod syncpt;
mod timeout;

pub use self::fence::{Fence, FenceOps, SemaFence, SyncptFence, SyncptValue, UserFence};
pub use self::osfence::{OsFence, OsFenceOps};
pub use self::sema::{Semaphore, WaitQueue};
pub use self::syncpt::{syncpt_reached, MemRegs, RegIo, SyncptDev};
pub use self::timeout::{Backoff, Timeout, WaitPolicy};
