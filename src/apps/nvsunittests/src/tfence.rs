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
use base::test::WvTester;
use base::time::TimeDuration;
use base::{wv_assert, wv_assert_eq, wv_assert_err, wv_assert_ok, wv_assert_some, wv_run_test};

use fence::{
    Fence, FenceOps, MemRegs, OsFence, OsFenceOps, Semaphore, SyncptDev, SyncptValue, Timeout,
    UserFence, WaitPolicy, WaitQueue,
};

use std::sync::{Arc, Mutex};
use std::thread;

pub fn run(t: &mut dyn WvTester) {
    wv_run_test!(t, sema_released);
    wv_run_test!(t, sema_flips);
    wv_run_test!(t, sema_wait);
    wv_run_test!(t, sema_interrupt);
    wv_run_test!(t, concurrent_waiters);
    wv_run_test!(t, get_and_put);
    wv_run_test!(t, release_order);
    wv_run_test!(t, extract_user);
    wv_run_test!(t, syncpt_fence);
    wv_run_test!(t, wait_policy);
}

type EventLog = Arc<Mutex<Vec<&'static str>>>;

fn record(log: &EventLog, ev: &'static str) {
    if let Ok(mut l) = log.lock() {
        l.push(ev);
    }
}

fn events(log: &EventLog) -> Vec<&'static str> {
    log.lock().map(|l| l.clone()).unwrap_or_default()
}

#[derive(Debug)]
struct TestOsFence {
    name: String,
    log: EventLog,
}

impl OsFenceOps for TestOsFence {
    fn name(&self) -> &str {
        &self.name
    }

    fn is_signaled(&self) -> bool {
        false
    }
}

impl Drop for TestOsFence {
    fn drop(&mut self) {
        record(&self.log, "os");
    }
}

struct TestOps {
    log: EventLog,
}

impl FenceOps for TestOps {
    fn wait(&self, _timeout: Timeout) -> Result<(), Error> {
        Ok(())
    }

    fn is_expired(&self) -> bool {
        true
    }

    fn release(&mut self) {
        record(&self.log, "release");
    }
}

fn os_fence(name: &str, log: &EventLog) -> OsFence {
    OsFence::new(TestOsFence {
        name: name.to_string(),
        log: log.clone(),
    })
}

fn sema_fence() -> (Arc<Semaphore>, Arc<WaitQueue>, Fence) {
    let wq = Arc::new(WaitQueue::new());
    let sema = Arc::new(Semaphore::new(wq.clone()));
    let fence = Fence::from_semaphore(sema.clone(), wq.clone(), None);
    (sema, wq, fence)
}

fn sema_released(t: &mut dyn WvTester) {
    let (_sema, _wq, fence) = sema_fence();
    wv_assert!(t, fence.is_expired());
    wv_assert!(t, !fence.is_syncpoint());
    wv_assert_ok!(fence.wait(Timeout::from_millis(0)));
    wv_assert!(t, fence.put());
}

fn sema_flips(t: &mut dyn WvTester) {
    let wq = Arc::new(WaitQueue::new());
    let sema = Arc::new(Semaphore::new(wq.clone()));
    wv_assert!(t, sema.acquire());
    wv_assert!(t, !sema.acquire());

    let fence = Fence::from_semaphore(sema.clone(), wq, None);
    wv_assert!(t, !fence.is_expired());
    wv_assert!(t, !fence.is_expired());

    sema.release();
    wv_assert!(t, fence.is_expired());

    // the fence reflects the semaphore, not a cached state
    wv_assert!(t, sema.acquire());
    wv_assert!(t, !fence.is_expired());
    sema.release();
    wv_assert!(t, fence.is_expired());
}

fn sema_wait(t: &mut dyn WvTester) {
    let (sema, _wq, fence) = sema_fence();
    wv_assert!(t, sema.acquire());

    wv_assert_err!(t, fence.wait(Timeout::from_millis(10)), Code::Timeout);

    let releaser = thread::spawn(move || {
        thread::sleep(TimeDuration::from_millis(10));
        sema.release();
    });
    wv_assert_ok!(fence.wait(Timeout::from_millis(5000)));
    wv_assert!(t, fence.is_expired());
    wv_assert!(t, releaser.join().is_ok());
}

fn sema_interrupt(t: &mut dyn WvTester) {
    let (sema, wq, fence) = sema_fence();
    wv_assert!(t, sema.acquire());

    let waiter = thread::spawn(move || fence.wait(Timeout::Infinite).map_err(|e| e.code()));

    // keep interrupting, because the waiter might not be waiting yet
    for _ in 0..5000 {
        if waiter.is_finished() {
            break;
        }
        wq.interrupt();
        thread::sleep(TimeDuration::from_millis(1));
    }

    wv_assert_eq!(t, waiter.join().ok(), Some(Err(Code::Interrupted)));
    wv_assert!(t, sema.is_acquired());
}

fn concurrent_waiters(t: &mut dyn WvTester) {
    let (sema, _wq, fence) = sema_fence();
    wv_assert!(t, sema.acquire());

    let waiters = (0..4)
        .map(|_| {
            let fence = fence.get();
            thread::spawn(move || {
                let res = fence.wait(Timeout::from_millis(5000)).map_err(|e| e.code());
                fence.put();
                res
            })
        })
        .collect::<Vec<_>>();

    thread::sleep(TimeDuration::from_millis(10));
    sema.release();

    for w in waiters {
        wv_assert_eq!(t, w.join().ok(), Some(Ok(())));
    }
    wv_assert_eq!(t, fence.refs(), 1);
}

fn get_and_put(t: &mut dyn WvTester) {
    let log = EventLog::default();
    let fence = Fence::new(Box::new(TestOps { log: log.clone() }), None);
    wv_assert_eq!(t, fence.refs(), 1);

    let f2 = fence.get();
    let f3 = f2.clone();
    wv_assert_eq!(t, fence.refs(), 3);
    wv_assert!(t, f2.ptr_eq(&f3));

    wv_assert!(t, !f2.put());
    wv_assert!(t, !f3.put());
    wv_assert!(t, events(&log).is_empty());

    wv_assert!(t, fence.put());
    wv_assert_eq!(t, events(&log), vec!["release"]);
}

fn release_order(t: &mut dyn WvTester) {
    let log = EventLog::default();
    let fence = Fence::new(
        Box::new(TestOps { log: log.clone() }),
        Some(os_fence("order", &log)),
    );
    wv_assert_eq!(t, wv_assert_some!(fence.os_fence()).name(), "order");

    drop(fence);
    wv_assert_eq!(t, events(&log), vec!["os", "release"]);
}

fn extract_user(t: &mut dyn WvTester) {
    let log = EventLog::default();
    let fence = Fence::new(
        Box::new(TestOps { log: log.clone() }),
        Some(os_fence("user", &log)),
    );

    let user = fence.extract_user();
    wv_assert!(t, !user.is_empty());
    wv_assert!(t, user.syncpt.is_none());
    let os = wv_assert_some!(user.os_fence.as_ref());
    wv_assert!(t, os.ptr_eq(wv_assert_some!(fence.os_fence())));
    wv_assert_eq!(t, os.refs(), 2);

    wv_assert!(t, fence.put());
    wv_assert_eq!(t, events(&log), vec!["release"]);

    // the snapshot still holds the OS fence
    let os = wv_assert_some!(user.os_fence.as_ref());
    wv_assert_eq!(t, os.refs(), 1);
    wv_assert_eq!(t, os.name(), "user");
    wv_assert!(t, !os.is_signaled());
    wv_assert_eq!(t, format!("{}", user), "user");

    drop(user);
    wv_assert_eq!(t, events(&log), vec!["release", "os"]);

    wv_assert!(t, UserFence::default().is_empty());
    wv_assert_eq!(t, format!("{}", UserFence::default()), "empty");
}

fn syncpt_fence(t: &mut dyn WvTester) {
    let dev = Arc::new(SyncptDev::new(Arc::new(MemRegs::new(4)), 0, 4));

    wv_assert_err!(
        t,
        Fence::from_syncpoint(dev.clone(), 4, 1, None),
        Code::InvArgs
    );

    let fence = wv_assert_ok!(Fence::from_syncpoint(dev.clone(), 1, 2, None));
    wv_assert!(t, fence.is_syncpoint());
    wv_assert!(t, !fence.is_expired());
    wv_assert_err!(t, fence.wait(Timeout::from_millis(5)), Code::Timeout);

    wv_assert_ok!(dev.incr(1));
    wv_assert!(t, !fence.is_expired());
    wv_assert_ok!(dev.incr(1));
    wv_assert!(t, fence.is_expired());
    wv_assert_ok!(fence.wait(Timeout::from_millis(5)));

    let user = fence.extract_user();
    wv_assert_eq!(t, user.syncpt, Some(SyncptValue { id: 1, value: 2 }));
    wv_assert!(t, user.os_fence.is_none());
    wv_assert_eq!(t, format!("{}", user), "syncpt 1@2");
    wv_assert!(t, fence.put());
}

fn wait_policy(t: &mut dyn WvTester) {
    let (sema, _wq, fence) = sema_fence();

    // without silicon, waits are unbounded, so only wait for expired fences
    let sim = WaitPolicy::new(false);
    wv_assert_ok!(fence.wait_with(&sim));

    let silicon = WaitPolicy::with_timeout(true, TimeDuration::from_millis(5));
    wv_assert!(t, sema.acquire());
    wv_assert_err!(t, fence.wait_with(&silicon), Code::Timeout);
    sema.release();
    wv_assert_ok!(fence.wait_with(&silicon));
}
