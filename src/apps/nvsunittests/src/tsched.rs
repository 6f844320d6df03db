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

use base::cfg;
use base::errors::Code;
use base::test::WvTester;
use base::time::{TimeDuration, TimeInstant};
use base::{wv_assert, wv_assert_eq, wv_assert_ok, wv_assert_some, wv_run_test};

use nvs::{SchedConfig, Scheduler, SwRunlist};

use thread::WorkerTimeout;

use std::collections::HashMap;
use std::sync::Arc;
use std::thread as std_thread;

pub fn run(t: &mut dyn WvTester) {
    wv_run_test!(t, open_twice);
    wv_run_test!(t, init_twice);
    wv_run_test!(t, round_robin);
    wv_run_test!(t, tick_interval);
    wv_run_test!(t, idle_tick);
    wv_run_test!(t, huge_timeslice);
    wv_run_test!(t, close_and_reinit);
    wv_run_test!(t, runlists_locked);
    wv_run_test!(t, worker_ticks);
    wv_run_test!(t, config_defaults);
    wv_run_test!(t, config_vars);
}

fn test_cfg() -> SchedConfig {
    SchedConfig {
        run_worker: false,
        ..SchedConfig::default()
    }
}

fn open_twice(t: &mut dyn WvTester) {
    let sched = Scheduler::new(Arc::new(SwRunlist::new(1, 8)), test_cfg());
    wv_assert_ok!(sched.open());
    wv_assert_ok!(sched.add_domain("a", 1_000_000, 0));

    // opening again keeps the existing state
    wv_assert_ok!(sched.open());
    wv_assert!(t, sched.is_open());
    wv_assert_eq!(t, sched.domain_count(), 1);
}

fn init_twice(t: &mut dyn WvTester) {
    let sched = Scheduler::new(Arc::new(SwRunlist::new(2, 8)), test_cfg());
    wv_assert_ok!(sched.init());
    wv_assert_ok!(sched.init());
    wv_assert_ok!(sched.open());

    wv_assert_eq!(t, sched.domain_count(), 1);
    let def = wv_assert_some!(sched.active_domain());
    wv_assert_eq!(t, def.name(), cfg::DEFAULT_DOMAIN_NAME);
    wv_assert_eq!(t, def.name(), "(default)");
    wv_assert_eq!(t, def.timeslice(), TimeDuration::from_millis(100));
    wv_assert_eq!(t, def.preempt_grace_ns(), 0);
    wv_assert_eq!(t, sched.domain_refs(def.id()), Some(1));
}

fn round_robin(t: &mut dyn WvTester) {
    let rl = Arc::new(SwRunlist::new(1, 8));
    let sched = Scheduler::new(rl.clone(), test_cfg());
    wv_assert_ok!(sched.open());

    let a = wv_assert_ok!(sched.add_domain("A", 1_000_000, 0));
    let b = wv_assert_ok!(sched.add_domain("B", 1_000_000, 0));
    let c = wv_assert_ok!(sched.add_domain("C", 1_000_000, 0));
    wv_assert_eq!(t, sched.active_domain(), Some(a.clone()));

    for (i, exp) in [&b, &c, &a, &b].iter().enumerate() {
        sched.tick();
        wv_assert_eq!(t, sched.active_domain().as_ref(), Some(*exp));
        wv_assert_eq!(t, rl.current(0).as_deref(), Some(exp.name()));
        wv_assert_eq!(t, rl.ticks(), i as u64 + 1);
    }
}

fn tick_interval(t: &mut dyn WvTester) {
    let sched = Scheduler::new(Arc::new(SwRunlist::new(1, 8)), test_cfg());
    wv_assert_ok!(sched.open());
    wv_assert_ok!(sched.add_domain("a", 3_000_000, 0));
    wv_assert_ok!(sched.add_domain("b", 1_500_000, 0));
    wv_assert_ok!(sched.add_domain("c", 0, 0));

    // the interval is the timeslice of the next domain, rounded up to milliseconds
    wv_assert_eq!(t, sched.tick(), TimeDuration::from_millis(2));
    wv_assert_eq!(t, sched.tick(), TimeDuration::from_millis(1));
    wv_assert_eq!(t, sched.tick(), TimeDuration::from_millis(3));
}

fn idle_tick(t: &mut dyn WvTester) {
    let rl = Arc::new(SwRunlist::new(1, 8));
    let cfg = SchedConfig {
        idle_poll: TimeDuration::from_millis(7),
        ..test_cfg()
    };
    let sched = Scheduler::new(rl.clone(), cfg);
    wv_assert_ok!(sched.open());

    wv_assert_eq!(t, sched.tick(), TimeDuration::from_millis(7));
    wv_assert_eq!(t, rl.ticks(), 0);
    wv_assert!(t, sched.active_domain().is_none());
}

fn huge_timeslice(t: &mut dyn WvTester) {
    let sched = Scheduler::new(Arc::new(SwRunlist::new(1, 8)), test_cfg());
    wv_assert_ok!(sched.open());
    wv_assert_ok!(sched.add_domain("a", 1_000_000, 0));
    wv_assert_ok!(sched.add_domain("big", u64::MAX, 0));

    let interval = sched.tick();
    wv_assert_eq!(t, interval, TimeDuration::from_millis(u64::MAX / 1_000_000 + 1));

    // the worker has to sleep for that interval instead of rearming right away
    let mut to = WorkerTimeout::new();
    to.arm(interval);
    wv_assert!(t, !to.expired());
    wv_assert!(t, to.remaining().map_or(false, |r| r > TimeDuration::from_secs(3600)));
}

fn close_and_reinit(t: &mut dyn WvTester) {
    let rl = Arc::new(SwRunlist::new(1, 8));
    let sched = Scheduler::new(rl.clone(), test_cfg());
    wv_assert_ok!(sched.init());
    let first = wv_assert_some!(sched.active_domain());

    // a leaked reference is reported, but does not prevent the teardown
    let leaked = wv_assert_some!(sched.domain_by_id(first.id()));
    wv_assert_eq!(t, sched.domain_refs(leaked.id()), Some(2));

    sched.close();
    wv_assert!(t, !sched.is_open());
    wv_assert_eq!(t, sched.domain_count(), 0);
    wv_assert!(t, rl.domains(0).is_empty());
    sched.close();

    wv_assert_ok!(sched.init());
    let second = wv_assert_some!(sched.active_domain());
    wv_assert_eq!(t, second.name(), first.name());
    wv_assert!(t, second.id() > first.id());
    wv_assert_eq!(t, rl.domains(0), vec![first.name().to_string()]);
}

fn runlists_locked(t: &mut dyn WvTester) {
    let rl = Arc::new(SwRunlist::new(2, 8));
    let sched = Scheduler::new(rl.clone(), test_cfg());
    wv_assert_ok!(sched.init());

    let (mask, count) = sched.with_runlists_locked(|guard| (rl.locked_mask(), guard.domain_count()));
    wv_assert_eq!(t, mask, 0b11);
    wv_assert_eq!(t, count, 1);
    wv_assert_eq!(t, rl.locked_mask(), 0);
}

fn worker_ticks(t: &mut dyn WvTester) {
    let rl = Arc::new(SwRunlist::new(1, 8));
    let cfg = SchedConfig {
        initial_wakeup: TimeDuration::from_millis(1),
        idle_poll: TimeDuration::from_millis(1),
        run_worker: true,
        worker_name: "nvs_test_worker".to_string(),
        ..SchedConfig::default()
    };
    let sched = Scheduler::new(rl.clone(), cfg);
    wv_assert_ok!(sched.open());
    wv_assert_ok!(sched.add_domain("a", 1_000_000, 0));
    wv_assert_ok!(sched.add_domain("b", 1_000_000, 0));

    let end = TimeInstant::now() + TimeDuration::from_secs(10);
    while rl.ticks() < 3 && TimeInstant::now() < end {
        std_thread::sleep(TimeDuration::from_millis(1));
    }
    wv_assert!(t, rl.ticks() >= 3);

    sched.close();
    let ticks = rl.ticks();
    std_thread::sleep(TimeDuration::from_millis(10));
    // the worker is gone
    wv_assert_eq!(t, rl.ticks(), ticks);
}

fn config_defaults(t: &mut dyn WvTester) {
    let cfg = SchedConfig::default();
    wv_assert_eq!(t, cfg.default_timeslice, TimeDuration::from_millis(100));
    wv_assert_eq!(t, cfg.default_grace, TimeDuration::ZERO);
    wv_assert_eq!(t, cfg.idle_poll, TimeDuration::from_millis(100));
    wv_assert_eq!(t, cfg.initial_wakeup, TimeDuration::from_millis(100));
    wv_assert!(t, cfg.run_worker);
    wv_assert_eq!(t, cfg.worker_name, "nvs_worker");

    // without any variables, we get the defaults
    let from_vars = wv_assert_ok!(SchedConfig::with_vars(|_| None));
    wv_assert_eq!(t, from_vars, cfg);
}

fn config_vars(t: &mut dyn WvTester) {
    let mut vars = HashMap::new();
    vars.insert("NVS_TIMESLICE", "5ms");
    vars.insert("NVS_GRACE", "250us");
    vars.insert("NVS_IDLE_POLL", "1s");
    vars.insert("NVS_WORKER", "false");

    let get = |name: &str| vars.get(name).map(|v| v.to_string());
    let cfg = wv_assert_ok!(SchedConfig::with_vars(get));
    wv_assert_eq!(t, cfg.default_timeslice, TimeDuration::from_millis(5));
    wv_assert_eq!(t, cfg.default_grace, TimeDuration::from_micros(250));
    wv_assert_eq!(t, cfg.idle_poll, TimeDuration::from_secs(1));
    wv_assert!(t, !cfg.run_worker);

    // the default domain uses the configured timeslice
    let sched = Scheduler::new(Arc::new(SwRunlist::new(1, 8)), cfg);
    wv_assert_ok!(sched.init());
    let def = wv_assert_some!(sched.active_domain());
    wv_assert_eq!(t, def.timeslice_ns(), 5_000_000);
    wv_assert_eq!(t, def.preempt_grace_ns(), 250_000);

    vars.insert("NVS_TIMESLICE", "fast");
    match SchedConfig::with_vars(|name| vars.get(name).map(|v| v.to_string())) {
        Ok(_) => wv_assert!(t, false),
        Err(e) => {
            wv_assert_eq!(t, e.code(), Code::InvArgs);
            wv_assert!(t, e.msg().contains("NVS_TIMESLICE"));
        },
    }
}
