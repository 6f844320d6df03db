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
use base::{wv_assert, wv_assert_eq, wv_assert_err, wv_assert_ok, wv_run_test};

use nvs::{Runlist, SchedConfig, Scheduler, SwRunlist};

use std::sync::Arc;

pub fn run(t: &mut dyn WvTester) {
    wv_run_test!(t, alloc_in_all_runlists);
    wv_run_test!(t, alloc_rollback);
    wv_run_test!(t, delete_last);
    wv_run_test!(t, delete_current);
    wv_run_test!(t, tick_follows_scheduler);
    wv_run_test!(t, lock_runlists);
    wv_run_test!(t, cleanup);
}

fn names(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| s.to_string()).collect()
}

fn alloc_in_all_runlists(t: &mut dyn WvTester) {
    let rl = SwRunlist::new(3, 8);
    wv_assert_eq!(t, rl.count(), 3);
    wv_assert_eq!(t, rl.current(0), None);

    wv_assert_ok!(rl.alloc_domain("a"));
    wv_assert_ok!(rl.alloc_domain("b"));
    wv_assert_err!(t, rl.alloc_domain("a"), Code::Exists);

    for i in 0..3 {
        wv_assert_eq!(t, rl.domains(i), names(&["a", "b"]));
        // the first domain becomes the current one
        wv_assert_eq!(t, rl.current(i), Some("a".to_string()));
    }
    wv_assert!(t, rl.domains(3).is_empty());
    wv_assert_eq!(t, rl.current(3), None);
}

fn alloc_rollback(t: &mut dyn WvTester) {
    let rl = SwRunlist::with_capacities(vec![4, 4, 1]);
    wv_assert_ok!(rl.alloc_domain("a"));

    wv_assert_err!(t, rl.alloc_domain("b"), Code::OutOfMem);
    for i in 0..3 {
        wv_assert_eq!(t, rl.domains(i), names(&["a"]));
        wv_assert_eq!(t, rl.current(i), Some("a".to_string()));
    }

    // a failure on the very first domain leaves all runlists empty
    let rl = SwRunlist::with_capacities(vec![1, 0]);
    wv_assert_err!(t, rl.alloc_domain("a"), Code::OutOfMem);
    wv_assert!(t, rl.domains(0).is_empty());
    wv_assert_eq!(t, rl.current(0), None);
}

fn delete_last(t: &mut dyn WvTester) {
    let rl = SwRunlist::new(2, 8);
    wv_assert_ok!(rl.alloc_domain("a"));

    wv_assert_err!(t, rl.delete_domain("a"), Code::InvArgs);
    wv_assert_eq!(t, rl.domains(0), names(&["a"]));
    wv_assert_eq!(t, rl.domains(1), names(&["a"]));

    wv_assert_ok!(rl.alloc_domain("b"));
    wv_assert_ok!(rl.delete_domain("a"));
    wv_assert_eq!(t, rl.domains(1), names(&["b"]));
    wv_assert_eq!(t, rl.current(1), Some("b".to_string()));

    // unknown domains are no error
    wv_assert_ok!(rl.delete_domain("zzz"));
}

fn delete_current(t: &mut dyn WvTester) {
    let rl = SwRunlist::new(1, 8);
    for n in ["a", "b", "c"] {
        wv_assert_ok!(rl.alloc_domain(n));
    }
    wv_assert_eq!(t, rl.current(0), Some("a".to_string()));

    // switches to the next domain before deleting the current one
    wv_assert_ok!(rl.delete_domain("a"));
    wv_assert_eq!(t, rl.current(0), Some("b".to_string()));

    wv_assert_ok!(rl.delete_domain("b"));
    wv_assert_eq!(t, rl.current(0), Some("c".to_string()));

    wv_assert_ok!(rl.alloc_domain("d"));
    wv_assert_ok!(rl.alloc_domain("e"));
    wv_assert_eq!(t, rl.domains(0), names(&["c", "d", "e"]));

    // deleting a non-current domain keeps the current one
    wv_assert_ok!(rl.delete_domain("d"));
    wv_assert_eq!(t, rl.current(0), Some("c".to_string()));
}

fn tick_follows_scheduler(t: &mut dyn WvTester) {
    let rl = Arc::new(SwRunlist::new(2, 8));
    let sched = Scheduler::new(
        rl.clone(),
        SchedConfig {
            run_worker: false,
            ..SchedConfig::default()
        },
    );
    wv_assert_ok!(sched.open());

    for n in ["a", "b", "c"] {
        wv_assert_ok!(sched.add_domain(n, 1_000_000, 0));
    }
    wv_assert_eq!(t, rl.current(1), Some("a".to_string()));

    for (i, n) in ["b", "c", "a", "b"].iter().enumerate() {
        sched.tick();
        wv_assert_eq!(t, rl.ticks(), i as u64 + 1);
        wv_assert_eq!(t, rl.current(0), Some(n.to_string()));
        wv_assert_eq!(t, rl.current(1), Some(n.to_string()));
    }

    // the deleted current domain is replaced by its successor
    wv_assert_ok!(sched.del_domain(sched.domains()[1].id()));
    wv_assert_eq!(t, rl.domains(0), names(&["a", "c"]));
    wv_assert_eq!(t, rl.current(0), Some("c".to_string()));
    sched.close();
}

fn lock_runlists(t: &mut dyn WvTester) {
    let rl = SwRunlist::new(3, 8);
    wv_assert_eq!(t, rl.locked_mask(), 0);

    let mask = rl.lock_active_runlists();
    wv_assert_eq!(t, mask, 0b111);
    wv_assert_eq!(t, rl.locked_mask(), 0b111);

    rl.unlock_runlists(0b010);
    wv_assert_eq!(t, rl.locked_mask(), 0b101);
    rl.unlock_runlists(mask);
    wv_assert_eq!(t, rl.locked_mask(), 0);
}

fn cleanup(t: &mut dyn WvTester) {
    let rl = SwRunlist::new(2, 8);
    wv_assert_ok!(rl.alloc_domain("a"));
    wv_assert_ok!(rl.alloc_domain("b"));

    rl.cleanup();
    wv_assert!(t, rl.domains(0).is_empty());
    wv_assert_eq!(t, rl.current(1), None);

    // everything can be allocated again afterwards
    wv_assert_ok!(rl.alloc_domain("a"));
    wv_assert_eq!(t, rl.current(0), Some("a".to_string()));
}
