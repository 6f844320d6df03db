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

use base::errors::Code;
use base::test::WvTester;
use base::time::{TimeDuration, TimeInstant};
use base::{wv_assert, wv_assert_eq, wv_assert_err, wv_assert_ok, wv_assert_some, wv_run_test};

use fence::{syncpt_reached, Backoff, MemRegs, RegIo, SyncptDev, Timeout, WaitPolicy};

use std::sync::Arc;
use std::thread;

pub fn run(t: &mut dyn WvTester) {
    wv_run_test!(t, reached_wraps);
    wv_run_test!(t, cached_min);
    wv_run_test!(t, expired_after_wrap);
    wv_run_test!(t, invalid_ids);
    wv_run_test!(t, wait_timeout);
    wv_run_test!(t, wait_for_other_thread);
    wv_run_test!(t, backoff);
    wv_run_test!(t, wait_policy);
}

const SYNCPTS: usize = 8;

fn make_dev() -> (Arc<MemRegs>, Arc<SyncptDev>) {
    let regs = Arc::new(MemRegs::new(SYNCPTS));
    let dev = Arc::new(SyncptDev::new(regs.clone(), 0, SYNCPTS));
    (regs, dev)
}

fn reached_wraps(t: &mut dyn WvTester) {
    wv_assert!(t, syncpt_reached(10, 10));
    wv_assert!(t, syncpt_reached(11, 10));
    wv_assert!(t, !syncpt_reached(9, 10));
    wv_assert!(t, syncpt_reached(5, 0xFFFF_FFF0));
    wv_assert!(t, !syncpt_reached(0xFFFF_FFF0, 5));
    wv_assert!(t, syncpt_reached(0, 0xFFFF_FFFF));
}

fn cached_min(t: &mut dyn WvTester) {
    let (regs, dev) = make_dev();
    wv_assert_eq!(t, dev.count(), SYNCPTS);

    regs.write(3 * 4, 42);
    wv_assert_eq!(t, dev.read_min(3), Ok(0));
    wv_assert_eq!(t, dev.update_min(3), Ok(42));
    wv_assert_eq!(t, dev.read_min(3), Ok(42));

    wv_assert_eq!(t, dev.incr(3), Ok(43));
    wv_assert_eq!(t, regs.read(3 * 4), 43);
    // the increment is only visible after the next read of the hardware
    wv_assert_eq!(t, dev.read_min(3), Ok(42));
    wv_assert!(t, dev.is_expired(3, 43));
    wv_assert_eq!(t, dev.read_min(3), Ok(43));
}

fn expired_after_wrap(t: &mut dyn WvTester) {
    let (regs, dev) = make_dev();
    let thresh = 0xFFFF_FFF0;

    regs.write(0, 0xFFFF_FFE0);
    wv_assert_eq!(t, dev.update_min(0), Ok(0xFFFF_FFE0));
    wv_assert!(t, !dev.is_expired(0, thresh));

    // the counter wrapped around in the meantime
    regs.write(0, 5);
    wv_assert!(t, dev.is_expired(0, thresh));
    wv_assert_eq!(t, dev.read_min(0), Ok(5));

    // the cached value suffices now
    regs.write(0, 0xFFFF_FFE0);
    wv_assert!(t, dev.is_expired(0, thresh));
}

fn invalid_ids(t: &mut dyn WvTester) {
    let (_regs, dev) = make_dev();
    let id = SYNCPTS as u32;

    wv_assert!(t, !dev.is_valid(id));
    wv_assert_err!(t, dev.read_min(id), Code::InvArgs);
    wv_assert_err!(t, dev.update_min(id), Code::InvArgs);
    wv_assert_err!(t, dev.incr(id), Code::InvArgs);
    wv_assert!(t, !dev.is_expired(id, 0));
    wv_assert_err!(
        t,
        dev.wait(id, 0, Timeout::from_millis(1), &mut Backoff::default()),
        Code::InvArgs
    );
}

fn wait_timeout(t: &mut dyn WvTester) {
    let (_regs, dev) = make_dev();

    let start = TimeInstant::now();
    wv_assert_err!(
        t,
        dev.wait(1, 1, Timeout::from_millis(20), &mut Backoff::default()),
        Code::Timeout
    );
    wv_assert!(t, start.elapsed() >= TimeDuration::from_millis(20));

    // already reached values do not wait at all
    wv_assert_ok!(dev.wait(1, 0, Timeout::from_millis(0), &mut Backoff::default()));
}

fn wait_for_other_thread(t: &mut dyn WvTester) {
    let (_regs, dev) = make_dev();

    let incr_dev = dev.clone();
    let incr = thread::spawn(move || {
        for _ in 0..3 {
            thread::sleep(TimeDuration::from_millis(5));
            if incr_dev.incr(2).is_err() {
                return false;
            }
        }
        true
    });

    wv_assert_ok!(dev.wait(2, 3, Timeout::from_millis(5000), &mut Backoff::default()));
    wv_assert!(t, dev.is_expired(2, 3));
    wv_assert_eq!(t, incr.join().ok(), Some(true));
}

fn backoff(t: &mut dyn WvTester) {
    let us = TimeDuration::from_micros;
    let mut b = Backoff::new(us(10), us(80));
    let delays = (0..6).map(|_| b.next_delay()).collect::<Vec<_>>();
    wv_assert_eq!(t, delays, vec![us(10), us(20), us(40), us(80), us(80), us(80)]);

    b.reset();
    wv_assert_eq!(t, b.next_delay(), us(10));

    // the cap is never below the start
    let mut b = Backoff::new(us(50), us(10));
    wv_assert_eq!(t, b.next_delay(), us(50));
    wv_assert_eq!(t, b.next_delay(), us(50));

    // sleeping never exceeds the deadline
    let mut b = Backoff::new(TimeDuration::from_secs(10), TimeDuration::from_secs(10));
    let start = TimeInstant::now();
    b.sleep(Some(start + TimeDuration::from_millis(5)));
    wv_assert!(t, start.elapsed() < TimeDuration::from_secs(5));
}

fn wait_policy(t: &mut dyn WvTester) {
    let silicon = WaitPolicy::default();
    wv_assert!(t, silicon.is_silicon());
    wv_assert_eq!(t, silicon.timeout(), Timeout::from_millis(3000));
    wv_assert_eq!(t, silicon.apply(Timeout::from_millis(7)), Timeout::from_millis(7));

    let sim = WaitPolicy::with_timeout(false, TimeDuration::from_millis(10));
    wv_assert!(t, !sim.is_silicon());
    wv_assert_eq!(t, sim.timeout(), Timeout::Infinite);
    wv_assert_eq!(t, sim.apply(Timeout::from_millis(7)), Timeout::Infinite);

    wv_assert!(t, Timeout::Infinite.deadline().is_none());
    wv_assert!(t, Timeout::from_millis(1).deadline().is_some());

    // a bound beyond the representable time saturates instead of wrapping around
    let now = TimeInstant::now();
    let huge = Timeout::Bounded(TimeDuration::from_secs(u64::MAX));
    let deadline = wv_assert_some!(huge.deadline());
    wv_assert!(t, deadline > now + TimeDuration::from_secs(3600));
}
