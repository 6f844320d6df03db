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

use nvs::{NvsDomain, Runlist, SchedConfig, Scheduler, SwRunlist};

use std::sync::Arc;

pub fn run(t: &mut dyn WvTester) {
    wv_run_test!(t, lifecycle);
    wv_run_test!(t, busy);
    wv_run_test!(t, name_clash);
    wv_run_test!(t, ids_not_reused);
    wv_run_test!(t, lookups);
    wv_run_test!(t, put_keeps_registration);
    wv_run_test!(t, runlist_alloc_fails);
    wv_run_test!(t, runlist_delete_fails);
    wv_run_test!(t, delete_active);
    wv_run_test!(t, closed_scheduler);
}

fn test_cfg() -> SchedConfig {
    SchedConfig {
        run_worker: false,
        ..SchedConfig::default()
    }
}

fn open_sched(rl: Arc<dyn Runlist>) -> Scheduler {
    let sched = Scheduler::new(rl, test_cfg());
    wv_assert_ok!(sched.open());
    sched
}

fn lifecycle(t: &mut dyn WvTester) {
    let sched = open_sched(Arc::new(SwRunlist::new(2, 8)));
    wv_assert_ok!(sched.add_domain("other", 1_000_000, 0));

    let x = wv_assert_ok!(sched.add_domain("x", 5_000_000, 1000));
    wv_assert_eq!(t, x.name(), "x");
    wv_assert_eq!(t, x.timeslice_ns(), 5_000_000);
    wv_assert_eq!(t, x.timeslice(), TimeDuration::from_millis(5));
    wv_assert_eq!(t, x.preempt_grace_ns(), 1000);
    wv_assert_eq!(t, sched.domain_refs(x.id()), Some(1));

    let found = wv_assert_some!(sched.domain_by_name("x"));
    wv_assert_eq!(t, found, x);
    wv_assert_eq!(t, sched.domain_refs(x.id()), Some(2));

    sched.domain_put(&found);
    wv_assert_eq!(t, sched.domain_refs(x.id()), Some(1));

    wv_assert_ok!(sched.del_domain(x.id()));
    wv_assert_err!(t, sched.del_domain(x.id()), Code::NotFound);
    wv_assert_eq!(t, sched.domain_refs(x.id()), None);
    wv_assert!(t, sched.domain_by_name("x").is_none());
    wv_assert_eq!(t, sched.domain_count(), 1);
}

fn busy(t: &mut dyn WvTester) {
    let sched = open_sched(Arc::new(SwRunlist::new(1, 8)));
    wv_assert_ok!(sched.add_domain("other", 1_000_000, 0));

    let y = wv_assert_ok!(sched.add_domain("y", 1_000_000, 0));
    sched.domain_get(&y);
    wv_assert_eq!(t, sched.domain_refs(y.id()), Some(2));

    wv_assert_err!(t, sched.del_domain(y.id()), Code::Busy);
    wv_assert_eq!(t, sched.domain_count(), 2);

    sched.domain_put(&y);
    wv_assert_ok!(sched.del_domain(y.id()));
    wv_assert_eq!(t, sched.domain_count(), 1);
}

fn name_clash(t: &mut dyn WvTester) {
    let rl = Arc::new(SwRunlist::new(1, 8));
    let sched = open_sched(rl.clone());

    let a = wv_assert_ok!(sched.add_domain("a", 1_000_000, 0));
    wv_assert_err!(t, sched.add_domain("a", 2_000_000, 0), Code::Exists);
    wv_assert_eq!(t, sched.domain_count(), 1);
    wv_assert_eq!(t, rl.domains(0), vec!["a".to_string()]);

    // the existing domain is unchanged
    let found = wv_assert_some!(sched.lock().domain_by_name_locked("a").cloned());
    wv_assert_eq!(t, found.timeslice_ns(), 1_000_000);
    wv_assert_eq!(t, found.id(), a.id());
}

fn ids_not_reused(t: &mut dyn WvTester) {
    let sched = open_sched(Arc::new(SwRunlist::new(1, 8)));
    wv_assert_ok!(sched.add_domain("keep", 1_000_000, 0));

    let mut last = 0;
    for _ in 0..5 {
        let d = wv_assert_ok!(sched.add_domain("again", 1_000_000, 0));
        wv_assert!(t, d.id() > last);
        last = d.id();
        wv_assert_ok!(sched.del_domain(d.id()));
    }

    // ids are unique across schedulers as well
    let other = open_sched(Arc::new(SwRunlist::new(1, 8)));
    let d = wv_assert_ok!(other.add_domain("again", 1_000_000, 0));
    wv_assert!(t, d.id() > last);
}

fn lookups(t: &mut dyn WvTester) {
    let sched = open_sched(Arc::new(SwRunlist::new(1, 8)));
    let a = wv_assert_ok!(sched.add_domain("a", 1_000_000, 0));
    let b = wv_assert_ok!(sched.add_domain("b", 2_000_000, 0));

    let found = wv_assert_some!(sched.domain_by_id(b.id()));
    wv_assert_eq!(t, found.name(), "b");
    wv_assert_eq!(t, sched.domain_refs(b.id()), Some(2));
    wv_assert!(t, sched.domain_by_id(b.id() + 1000).is_none());
    wv_assert!(t, sched.domain_by_name("c").is_none());

    {
        // the locked variants do not take references
        let guard = sched.lock();
        wv_assert_eq!(t, guard.domain_by_id_locked(a.id()), Some(&a));
        wv_assert_eq!(t, guard.domain_by_name_locked("b").map(|d| d.id()), Some(b.id()));
        wv_assert!(t, guard.domain_by_name_locked("c").is_none());
        wv_assert_eq!(t, guard.domain_count(), 2);
    }
    wv_assert_eq!(t, sched.domain_refs(a.id()), Some(1));
    wv_assert_eq!(t, sched.domain_refs(b.id()), Some(2));

    sched.domain_put(&found);
    let all = sched.domains().iter().map(NvsDomain::id).collect::<Vec<_>>();
    wv_assert_eq!(t, all, vec![a.id(), b.id()]);
}

fn put_keeps_registration(t: &mut dyn WvTester) {
    let sched = open_sched(Arc::new(SwRunlist::new(1, 8)));
    let a = wv_assert_ok!(sched.add_domain("a", 1_000_000, 0));

    // the reference of the registration cannot be put
    sched.domain_put(&a);
    sched.domain_put(&a);
    wv_assert_eq!(t, sched.domain_refs(a.id()), Some(1));

    sched.domain_get(&a);
    sched.domain_get(&a);
    wv_assert_eq!(t, sched.domain_refs(a.id()), Some(3));
    sched.domain_put(&a);
    sched.domain_put(&a);
    wv_assert_eq!(t, sched.domain_refs(a.id()), Some(1));
}

struct FailingRunlist;

impl Runlist for FailingRunlist {
    fn alloc_domain(&self, _name: &str) -> Result<(), Error> {
        Err(Error::new(Code::OutOfMem))
    }

    fn delete_domain(&self, _name: &str) -> Result<(), Error> {
        Err(Error::new(Code::Busy))
    }

    fn tick(&self, _next: &NvsDomain) {
    }
}

fn runlist_alloc_fails(t: &mut dyn WvTester) {
    let sched = open_sched(Arc::new(FailingRunlist));
    wv_assert_err!(t, sched.add_domain("a", 1_000_000, 0), Code::OutOfMem);
    wv_assert_eq!(t, sched.domain_count(), 0);
    wv_assert!(t, sched.active_domain().is_none());
    wv_assert_err!(t, sched.init(), Code::OutOfMem);
    wv_assert_eq!(t, sched.domain_count(), 0);

    // a full runlist rejects further domains
    let sched = open_sched(Arc::new(SwRunlist::new(2, 1)));
    wv_assert_ok!(sched.add_domain("a", 1_000_000, 0));
    wv_assert_err!(t, sched.add_domain("b", 1_000_000, 0), Code::OutOfMem);
    wv_assert_eq!(t, sched.domain_count(), 1);
    wv_assert!(t, sched.domain_by_name("b").is_none());
}

fn runlist_delete_fails(t: &mut dyn WvTester) {
    let sched = open_sched(Arc::new(SwRunlist::new(1, 8)));
    let a = wv_assert_ok!(sched.add_domain("a", 1_000_000, 0));

    // the runlists need at least one domain
    wv_assert_err!(t, sched.del_domain(a.id()), Code::InvArgs);
    wv_assert_eq!(t, sched.domain_count(), 1);
    wv_assert_eq!(t, sched.active_domain(), Some(a.clone()));
    wv_assert_eq!(t, sched.domain_refs(a.id()), Some(1));

    let b = wv_assert_ok!(sched.add_domain("b", 1_000_000, 0));
    wv_assert_ok!(sched.del_domain(a.id()));
    wv_assert_eq!(t, sched.active_domain(), Some(b));
}

fn delete_active(t: &mut dyn WvTester) {
    let sched = open_sched(Arc::new(SwRunlist::new(1, 8)));
    let a = wv_assert_ok!(sched.add_domain("a", 1_000_000, 0));
    let b = wv_assert_ok!(sched.add_domain("b", 1_000_000, 0));
    let c = wv_assert_ok!(sched.add_domain("c", 1_000_000, 0));
    wv_assert_eq!(t, sched.active_domain(), Some(a.clone()));

    // deleting an inactive domain keeps the active one
    wv_assert_ok!(sched.del_domain(b.id()));
    wv_assert_eq!(t, sched.active_domain(), Some(a.clone()));

    sched.tick();
    wv_assert_eq!(t, sched.active_domain(), Some(c.clone()));

    // the active domain is the last one, so that we wrap around
    wv_assert_ok!(sched.del_domain(c.id()));
    wv_assert_eq!(t, sched.active_domain(), Some(a));
}

fn closed_scheduler(t: &mut dyn WvTester) {
    let sched = Scheduler::new(Arc::new(SwRunlist::new(1, 8)), test_cfg());
    wv_assert!(t, !sched.is_open());
    wv_assert_err!(t, sched.add_domain("a", 1_000_000, 0), Code::InvState);
    wv_assert_err!(t, sched.del_domain(1), Code::NotFound);
    wv_assert!(t, sched.domain_by_id(1).is_none());
    wv_assert_eq!(t, sched.domain_count(), 0);
    wv_assert!(t, sched.domains().is_empty());
    wv_assert_eq!(t, sched.tick(), sched.config().idle_poll);
    sched.close();
}
