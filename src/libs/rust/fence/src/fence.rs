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
use base::rc::Kref;

use derivative::Derivative;
use serde::{Deserialize, Serialize};

use std::fmt;
use std::sync::Arc;

use crate::{Backoff, OsFence, Semaphore, SyncptDev, Timeout, WaitPolicy, WaitQueue};

/// A syncpoint id together with the value that marks completion
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncptValue {
    pub id: u32,
    pub value: u32,
}

/// The backend of a [`Fence`]
///
/// The backends derive the state of the fence from the underlying signal on every call instead of
/// caching a terminal state.
pub trait FenceOps: Send + Sync {
    /// Waits until the fence expired or the timeout elapsed
    fn wait(&self, timeout: Timeout) -> Result<(), Error>;

    /// Returns true if the fence expired
    fn is_expired(&self) -> bool;

    /// Releases the resources of the backend; is called once when the fence is destroyed
    fn release(&mut self);

    /// Returns the syncpoint and threshold, if the fence is backed by a syncpoint
    fn syncpt(&self) -> Option<SyncptValue> {
        None
    }
}

/// The semaphore backend: the fence expires as soon as the semaphore is released
pub struct SemaFence {
    sema: Option<Arc<Semaphore>>,
    wq: Arc<WaitQueue>,
}

impl SemaFence {
    pub fn new(sema: Arc<Semaphore>, wq: Arc<WaitQueue>) -> Self {
        Self {
            sema: Some(sema),
            wq,
        }
    }
}

impl FenceOps for SemaFence {
    fn wait(&self, timeout: Timeout) -> Result<(), Error> {
        match &self.sema {
            Some(s) => self.wq.wait_until(|| !s.is_acquired(), timeout),
            None => Ok(()),
        }
    }

    fn is_expired(&self) -> bool {
        self.sema.as_ref().map_or(true, |s| !s.is_acquired())
    }

    fn release(&mut self) {
        self.sema = None;
    }
}

/// The syncpoint backend: the fence expires as soon as the syncpoint reached the threshold
pub struct SyncptFence {
    dev: Arc<SyncptDev>,
    id: u32,
    thresh: u32,
    backoff: Backoff,
}

impl SyncptFence {
    pub fn new(dev: Arc<SyncptDev>, id: u32, thresh: u32) -> Self {
        Self {
            dev,
            id,
            thresh,
            backoff: Backoff::default(),
        }
    }
}

impl FenceOps for SyncptFence {
    fn wait(&self, timeout: Timeout) -> Result<(), Error> {
        let mut backoff = self.backoff;
        self.dev.wait(self.id, self.thresh, timeout, &mut backoff)
    }

    fn is_expired(&self) -> bool {
        self.dev.is_expired(self.id, self.thresh)
    }

    fn release(&mut self) {
        // the syncpoint belongs to the device
    }

    fn syncpt(&self) -> Option<SyncptValue> {
        Some(SyncptValue {
            id: self.id,
            value: self.thresh,
        })
    }
}

#[derive(Derivative)]
#[derivative(Debug)]
struct FenceInner {
    #[derivative(Debug = "ignore")]
    ops: Box<dyn FenceOps>,
    os_fence: Option<OsFence>,
}

impl Drop for FenceInner {
    fn drop(&mut self) {
        log!(LogFlags::LibFence, "fence: releasing {:?}", self);
        // the OS fence goes first, as it may refer to the backend
        self.os_fence.take();
        self.ops.release();
    }
}

/// A reference-counted handle for the completion of some work
///
/// The fence is either backed by a semaphore ([`Fence::from_semaphore`]) or a syncpoint
/// ([`Fence::from_syncpoint`]). Cloning the fence ([`Fence::get`]) takes a new reference; the
/// backend and the optional OS fence are released together with the last reference.
#[derive(Clone, Debug)]
pub struct Fence {
    inner: Kref<FenceInner>,
}

impl Fence {
    /// Creates a new fence with given backend and optional OS fence
    pub fn new(ops: Box<dyn FenceOps>, os_fence: Option<OsFence>) -> Self {
        Self {
            inner: Kref::new(FenceInner { ops, os_fence }),
        }
    }

    /// Creates a new fence that expires as soon as `sema` is released
    ///
    /// The fence takes ownership of the semaphore reference and the OS fence. Waiters sleep on
    /// `wq`.
    pub fn from_semaphore(
        sema: Arc<Semaphore>,
        wq: Arc<WaitQueue>,
        os_fence: Option<OsFence>,
    ) -> Self {
        log!(
            LogFlags::LibFence,
            "fence: new semaphore fence (acquired={})",
            sema.is_acquired()
        );
        Self::new(Box::new(SemaFence::new(sema, wq)), os_fence)
    }

    /// Creates a new fence that expires as soon as syncpoint `id` of `dev` reached `thresh`
    ///
    /// Returns `Code::InvArgs` if `id` is not a syncpoint of `dev`.
    pub fn from_syncpoint(
        dev: Arc<SyncptDev>,
        id: u32,
        thresh: u32,
        os_fence: Option<OsFence>,
    ) -> Result<Self, Error> {
        if !dev.is_valid(id) {
            return Err(Error::new(Code::InvArgs));
        }
        log!(
            LogFlags::LibFence,
            "fence: new syncpoint fence (id={}, thresh={})",
            id,
            thresh
        );
        Ok(Self::new(
            Box::new(SyncptFence::new(dev, id, thresh)),
            os_fence,
        ))
    }

    /// Takes a new reference to this fence
    pub fn get(&self) -> Self {
        self.clone()
    }

    /// Puts this reference and returns true if it was the last one
    pub fn put(self) -> bool {
        Kref::put(self.inner)
    }

    /// Returns the number of references to this fence
    pub fn refs(&self) -> u32 {
        Kref::refs(&self.inner)
    }

    /// Waits until the fence expired
    ///
    /// Returns `Code::Timeout` if the timeout elapsed before and `Code::Interrupted` if the wait
    /// was interrupted.
    pub fn wait(&self, timeout: Timeout) -> Result<(), Error> {
        let res = self.inner.ops.wait(timeout);
        if let Err(ref e) = res {
            log!(LogFlags::LibFence, "fence: wait failed: {}", e);
        }
        res
    }

    /// Waits until the fence expired, using the timeout of `policy`
    pub fn wait_with(&self, policy: &WaitPolicy) -> Result<(), Error> {
        self.wait(policy.timeout())
    }

    /// Returns true if the fence expired
    pub fn is_expired(&self) -> bool {
        self.inner.ops.is_expired()
    }

    /// Returns true if the fence is backed by a syncpoint
    pub fn is_syncpoint(&self) -> bool {
        self.inner.ops.syncpt().is_some()
    }

    /// Returns the OS fence, if any
    pub fn os_fence(&self) -> Option<&OsFence> {
        self.inner.os_fence.as_ref()
    }

    /// Returns true if both refer to the same fence
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Kref::ptr_eq(&self.inner, &other.inner)
    }

    /// Returns a snapshot of the fence that can be handed out to user space
    ///
    /// The snapshot holds its own reference to the OS fence, so that it stays valid independent of
    /// the lifetime of this fence.
    pub fn extract_user(&self) -> UserFence {
        UserFence {
            syncpt: self.inner.ops.syncpt(),
            os_fence: self.inner.os_fence.clone(),
        }
    }
}

/// The user-visible part of a [`Fence`]
#[derive(Clone, Debug, Default)]
pub struct UserFence {
    pub syncpt: Option<SyncptValue>,
    pub os_fence: Option<OsFence>,
}

impl UserFence {
    /// Returns true if the snapshot carries neither a syncpoint nor an OS fence
    pub fn is_empty(&self) -> bool {
        self.syncpt.is_none() && self.os_fence.is_none()
    }
}

impl fmt::Display for UserFence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.syncpt, &self.os_fence) {
            (Some(s), Some(o)) => write!(f, "syncpt {}@{} + {}", s.id, s.value, o.name()),
            (Some(s), None) => write!(f, "syncpt {}@{}", s.id, s.value),
            (None, Some(o)) => write!(f, "{}", o.name()),
            (None, None) => write!(f, "empty"),
        }
    }
}
