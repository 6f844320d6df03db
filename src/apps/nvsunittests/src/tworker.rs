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
use base::{wv_assert, wv_assert_eq, wv_assert_err, wv_assert_ok, wv_run_test};

use thread::{Worker, WorkerOps, WorkerTimeout};

use std::sync::{Arc, Mutex};
use std::thread as std_thread;

pub fn run(t: &mut dyn WvTester) {
    wv_run_test!(t, process_items);
    wv_run_test!(t, timer_loop);
    wv_run_test!(t, early_exit);
    wv_run_test!(t, stop_twice);
    wv_run_test!(t, timeout_helper);
    wv_run_test!(t, huge_timeout);
}

#[derive(Default)]
struct Events {
    log: Vec<String>,
}

type SharedEvents = Arc<Mutex<Events>>;

fn events(ev: &SharedEvents) -> Vec<String> {
    ev.lock().map(|e| e.log.clone()).unwrap_or_default()
}

fn push(ev: &SharedEvents, s: String) {
    if let Ok(mut e) = ev.lock() {
        e.log.push(s);
    }
}

fn wait_for<F: Fn() -> bool>(cond: F, max: TimeDuration) -> bool {
    let end = TimeInstant::now() + max;
    while !cond() {
        if TimeInstant::now() >= end {
            return false;
        }
        std_thread::sleep(TimeDuration::from_millis(1));
    }
    true
}

struct ItemWorker {
    ev: SharedEvents,
}

impl WorkerOps for ItemWorker {
    type Item = u32;

    fn pre_process(&mut self) {
        push(&self.ev, "pre".to_string());
    }

    fn wakeup_process_item(&mut self, item: u32) {
        push(&self.ev, format!("item {}", item));
    }
}

fn process_items(t: &mut dyn WvTester) {
    let ev = SharedEvents::default();
    let mut w = wv_assert_ok!(Worker::start("items", ItemWorker { ev: ev.clone() }));
    wv_assert_eq!(t, w.name(), "items");
    wv_assert!(t, w.is_running());

    for i in 0..5 {
        wv_assert_ok!(w.enqueue(i));
    }
    wv_assert!(
        t,
        wait_for(|| events(&ev).len() == 6, TimeDuration::from_secs(5))
    );

    let mut expected = vec!["pre".to_string()];
    expected.extend((0..5).map(|i| format!("item {}", i)));
    wv_assert_eq!(t, events(&ev), expected);
    wv_assert_eq!(t, w.pending(), 0);

    w.stop();
    wv_assert!(t, !w.is_running());
    wv_assert_err!(t, w.enqueue(5), Code::InvState);
}

struct TimerWorker {
    ev: SharedEvents,
    timeout: WorkerTimeout,
    ticks: u32,
}

impl WorkerOps for TimerWorker {
    type Item = ();

    fn pre_process(&mut self) {
        push(&self.ev, "pre".to_string());
        self.timeout.arm(TimeDuration::from_millis(2));
    }

    fn wakeup_timeout(&self) -> Option<TimeDuration> {
        self.timeout.remaining()
    }

    fn wakeup_post_process(&mut self) {
        if self.timeout.expired() {
            self.ticks += 1;
            push(&self.ev, format!("tick {}", self.ticks));
            self.timeout.arm(TimeDuration::from_millis(2));
        }
    }
}

fn timer_loop(t: &mut dyn WvTester) {
    let ev = SharedEvents::default();
    let ops = TimerWorker {
        ev: ev.clone(),
        timeout: WorkerTimeout::new(),
        ticks: 0,
    };
    let mut w = wv_assert_ok!(Worker::start("timer", ops));

    wv_assert!(
        t,
        wait_for(|| events(&ev).len() >= 4, TimeDuration::from_secs(5))
    );
    w.stop();

    let log = events(&ev);
    wv_assert_eq!(t, log[0], "pre");
    // the ticks are strictly sequential
    for (i, e) in log.iter().skip(1).enumerate() {
        wv_assert_eq!(t, *e, format!("tick {}", i + 1));
    }
}

struct ExitWorker {
    exit: Arc<Mutex<bool>>,
}

impl WorkerOps for ExitWorker {
    type Item = ();

    fn wakeup_condition(&self) -> bool {
        self.exit.lock().map(|e| *e).unwrap_or(true)
    }

    fn wakeup_early_exit(&mut self) -> bool {
        self.wakeup_condition()
    }
}

fn early_exit(t: &mut dyn WvTester) {
    let exit = Arc::new(Mutex::new(false));
    let mut w = wv_assert_ok!(Worker::start("exit", ExitWorker { exit: exit.clone() }));
    wv_assert!(t, w.is_running());

    if let Ok(mut e) = exit.lock() {
        *e = true;
    }
    w.wakeup();
    wv_assert!(
        t,
        wait_for(|| !w.is_running(), TimeDuration::from_secs(5))
    );
    wv_assert_err!(t, w.enqueue(()), Code::InvState);
    w.stop();
}

fn stop_twice(t: &mut dyn WvTester) {
    let ev = SharedEvents::default();
    let mut w = wv_assert_ok!(Worker::start("twice", ItemWorker { ev: ev.clone() }));
    let w2 = wv_assert_ok!(Worker::start("other", ItemWorker { ev: ev.clone() }));
    wv_assert!(t, w.id() != w2.id());

    w.stop();
    w.stop();
    wv_assert!(t, !w.is_running());

    // dropping stops the worker as well
    drop(w2);
    wv_assert!(
        t,
        wait_for(|| events(&ev).len() == 2, TimeDuration::from_secs(5))
    );
}

fn timeout_helper(t: &mut dyn WvTester) {
    let mut to = WorkerTimeout::new();
    wv_assert!(t, !to.is_armed());
    wv_assert!(t, !to.expired());
    wv_assert_eq!(t, to.remaining(), None);

    to.arm(TimeDuration::from_secs(60));
    wv_assert!(t, to.is_armed());
    wv_assert!(t, !to.expired());
    wv_assert!(t, to.remaining().map_or(false, |r| r > TimeDuration::from_secs(50)));

    to.arm(TimeDuration::ZERO);
    wv_assert!(t, to.expired());
    wv_assert_eq!(t, to.remaining(), Some(TimeDuration::ZERO));

    to.disarm();
    wv_assert!(t, !to.is_armed());
}

fn huge_timeout(t: &mut dyn WvTester) {
    let huge = TimeDuration::from_millis(u64::MAX / 1_000_000 + 1);
    let now = TimeInstant::now();
    let deadline = now + huge;
    wv_assert!(t, deadline > now + TimeDuration::from_secs(3600));
    wv_assert_eq!(t, deadline.as_nanos(), u64::MAX);

    let mut to = WorkerTimeout::new();
    to.arm(huge);
    wv_assert!(t, !to.expired());
    wv_assert!(t, to.remaining().map_or(false, |r| r > TimeDuration::from_secs(3600)));
}
