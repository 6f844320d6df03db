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

use base::rc::{Kref, RefCount};
use base::test::WvTester;
use base::{wv_assert, wv_assert_eq, wv_assert_some, wv_run_test};

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;

pub fn run(t: &mut dyn WvTester) {
    wv_run_test!(t, get_and_put);
    wv_run_test!(t, get_unless_zero);
    wv_run_test!(t, no_underflow);
    wv_run_test!(t, concurrent_put);
    wv_run_test!(t, kref_lifetime);
    wv_run_test!(t, kref_threads);
}

fn get_and_put(t: &mut dyn WvTester) {
    let released = AtomicU32::new(0);
    let rc = RefCount::new();
    wv_assert_eq!(t, rc.read(), 1);

    rc.get();
    rc.get();
    wv_assert_eq!(t, rc.read(), 3);

    let release = || {
        released.fetch_add(1, Ordering::Relaxed);
    };
    wv_assert!(t, !rc.put_return(release));
    rc.put(release);
    wv_assert_eq!(t, released.load(Ordering::Relaxed), 0);
    wv_assert!(t, rc.put_return(release));
    wv_assert_eq!(t, released.load(Ordering::Relaxed), 1);
    wv_assert_eq!(t, rc.read(), 0);

    rc.init();
    wv_assert_eq!(t, rc.read(), 1);
}

fn get_unless_zero(t: &mut dyn WvTester) {
    let rc = RefCount::default();
    wv_assert!(t, rc.get_unless_zero());
    wv_assert_eq!(t, rc.read(), 2);

    wv_assert!(t, !rc.put_return(|| {}));
    wv_assert!(t, rc.put_return(|| {}));

    wv_assert!(t, !rc.get_unless_zero());
    wv_assert_eq!(t, rc.read(), 0);

    // get does not resurrect the object either
    rc.get();
    wv_assert_eq!(t, rc.read(), 0);
}

fn no_underflow(t: &mut dyn WvTester) {
    let released = AtomicU32::new(0);
    let rc = RefCount::new();
    wv_assert!(t, rc.put_return(|| {
        released.fetch_add(1, Ordering::Relaxed);
    }));

    // further puts are refused and never release again
    for _ in 0..3 {
        wv_assert!(t, !rc.put_return(|| {
            released.fetch_add(1, Ordering::Relaxed);
        }));
    }
    wv_assert_eq!(t, rc.read(), 0);
    wv_assert_eq!(t, released.load(Ordering::Relaxed), 1);
}

fn concurrent_put(t: &mut dyn WvTester) {
    const THREADS: u32 = 8;

    for _ in 0..10 {
        let rc = Arc::new(RefCount::new());
        for _ in 1..THREADS {
            rc.get();
        }

        let released = Arc::new(AtomicU32::new(0));
        let barrier = Arc::new(Barrier::new(THREADS as usize));
        let handles = (0..THREADS)
            .map(|_| {
                let rc = rc.clone();
                let released = released.clone();
                let barrier = barrier.clone();
                thread::spawn(move || {
                    barrier.wait();
                    rc.put_return(|| {
                        released.fetch_add(1, Ordering::Relaxed);
                    })
                })
            })
            .collect::<Vec<_>>();

        let lasts = handles
            .into_iter()
            .map(|h| h.join().unwrap_or(false))
            .filter(|last| *last)
            .count();

        wv_assert_eq!(t, lasts, 1);
        wv_assert_eq!(t, released.load(Ordering::Relaxed), 1);
        wv_assert_eq!(t, rc.read(), 0);
    }
}

struct Tracked(Arc<AtomicU32>);

impl Drop for Tracked {
    fn drop(&mut self) {
        self.0.fetch_add(1, Ordering::Relaxed);
    }
}

fn kref_lifetime(t: &mut dyn WvTester) {
    let drops = Arc::new(AtomicU32::new(0));
    let a = Kref::new(Tracked(drops.clone()));
    wv_assert_eq!(t, Kref::refs(&a), 1);

    let b = a.clone();
    let c = wv_assert_some!(Kref::try_get(&a));
    wv_assert_eq!(t, Kref::refs(&a), 3);
    wv_assert!(t, Kref::ptr_eq(&b, &c));
    wv_assert!(t, !Kref::ptr_eq(&a, &Kref::new(Tracked(Arc::new(AtomicU32::new(0))))));

    wv_assert!(t, !Kref::put(b));
    drop(c);
    wv_assert_eq!(t, Kref::refs(&a), 1);
    wv_assert_eq!(t, drops.load(Ordering::Relaxed), 0);

    wv_assert!(t, Kref::put(a));
    wv_assert_eq!(t, drops.load(Ordering::Relaxed), 1);
}

fn kref_threads(t: &mut dyn WvTester) {
    let drops = Arc::new(AtomicU32::new(0));
    let obj = Kref::new(Tracked(drops.clone()));

    let handles = (0..4)
        .map(|_| {
            let obj = obj.clone();
            thread::spawn(move || {
                for _ in 0..1000 {
                    let tmp = obj.clone();
                    drop(tmp);
                }
                Kref::put(obj)
            })
        })
        .collect::<Vec<_>>();

    for h in handles {
        wv_assert_eq!(t, h.join().ok(), Some(false));
    }
    wv_assert_eq!(t, Kref::refs(&obj), 1);
    wv_assert_eq!(t, drops.load(Ordering::Relaxed), 0);

    drop(obj);
    wv_assert_eq!(t, drops.load(Ordering::Relaxed), 1);
}
