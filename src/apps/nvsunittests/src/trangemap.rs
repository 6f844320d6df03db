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

use base::col::RangeMap;
use base::errors::Code;
use base::test::WvTester;
use base::{wv_assert, wv_assert_eq, wv_assert_err, wv_assert_ok, wv_assert_some, wv_run_test};

use std::rc::Rc;

pub fn run(t: &mut dyn WvTester) {
    wv_run_test!(t, insert_and_get);
    wv_run_test!(t, reject_invalid);
    wv_run_test!(t, find_ranges);
    wv_run_test!(t, iterate);
    wv_run_test!(t, remove_and_clear);
}

fn insert_and_get(t: &mut dyn WvTester) {
    let mut map = RangeMap::new();
    wv_assert_ok!(map.insert(0x1000, 0x2000, "a"));
    wv_assert_ok!(map.insert(0x3000, 0x4000, "b"));
    wv_assert_ok!(map.insert(0x2000, 0x3000, "c"));
    wv_assert_eq!(t, map.len(), 3);

    wv_assert_eq!(t, map.get(0x1000), Some(&"a"));
    wv_assert_eq!(t, map.get(0x2000), Some(&"c"));
    wv_assert_eq!(t, map.get(0x1800), None);

    *wv_assert_some!(map.get_mut(0x3000)) = "d";
    wv_assert_eq!(t, map.get(0x3000), Some(&"d"));
    wv_assert!(t, map.check().is_some());
}

fn reject_invalid(t: &mut dyn WvTester) {
    let mut map = RangeMap::new();
    wv_assert_ok!(map.insert(0x1000, 0x2000, 1));

    wv_assert_err!(t, map.insert(0x1000, 0x1800, 2), Code::Exists);
    wv_assert_err!(t, map.insert(0x0800, 0x1001, 3), Code::Exists);
    wv_assert_err!(t, map.insert(0x1fff, 0x3000, 4), Code::Exists);
    wv_assert_err!(t, map.insert(0x3000, 0x2000, 5), Code::InvArgs);

    // empty ranges are points and adjacent ranges do not overlap
    wv_assert_ok!(map.insert(0x2000, 0x2000, 6));
    wv_assert_ok!(map.insert(0x0, 0x1000, 7));
    wv_assert_eq!(t, map.len(), 3);
    wv_assert_eq!(t, map.get(0x1000), Some(&1));
}

fn find_ranges(t: &mut dyn WvTester) {
    let mut map = RangeMap::new();
    for i in 0..16u64 {
        wv_assert_ok!(map.insert(i * 0x1000, i * 0x1000 + 0x800, i));
    }

    for addr in (0..0x11000).step_by(0x100) {
        let expected = match addr % 0x1000 < 0x800 && addr < 0x10000 {
            true => Some(addr / 0x1000),
            false => None,
        };
        wv_assert_eq!(t, map.find(addr).map(|(_, _, v)| *v), expected);
    }

    let (start, end, val) = wv_assert_some!(map.find(0x5400));
    wv_assert_eq!(t, (start, end, *val), (0x5000, 0x5800, 5));

    wv_assert!(t, map.find_prev(0).is_none());
    wv_assert!(t, map.find_prev(0x1).is_some());
    let (start, _, val) = wv_assert_some!(map.find_prev(0x5000));
    wv_assert_eq!(t, (start, *val), (0x4000, 4));
}

fn iterate(t: &mut dyn WvTester) {
    let mut map = RangeMap::new();
    for s in [0x5000u64, 0x1000, 0x3000, 0x4000, 0x2000] {
        wv_assert_ok!(map.insert(s, s + 0x100, s / 0x1000));
    }

    let all = map.iter().map(|(s, _, _)| s).collect::<Vec<_>>();
    wv_assert_eq!(t, all, vec![0x1000, 0x2000, 0x3000, 0x4000, 0x5000]);

    let tail = map.iter_from(0x2800).map(|(_, _, v)| *v).collect::<Vec<_>>();
    wv_assert_eq!(t, tail, vec![3, 4, 5]);
    wv_assert_eq!(t, map.iter_from(0x6000).count(), 0);
}

fn remove_and_clear(t: &mut dyn WvTester) {
    let val = Rc::new(());
    let mut map = RangeMap::new();
    for i in 0..32u64 {
        wv_assert_ok!(map.insert(i * 0x10, i * 0x10 + 0x10, val.clone()));
    }
    wv_assert_eq!(t, Rc::strong_count(&val), 33);

    for i in (0..32u64).step_by(2) {
        wv_assert!(t, map.remove(i * 0x10).is_some());
        wv_assert!(t, map.check().is_some());
    }
    wv_assert!(t, map.remove(0).is_none());
    wv_assert_eq!(t, map.len(), 16);
    wv_assert_eq!(t, Rc::strong_count(&val), 17);

    map.clear();
    wv_assert!(t, map.is_empty());
    wv_assert_eq!(t, Rc::strong_count(&val), 1);

    // dropping the map frees the remaining entries
    {
        let mut map = RangeMap::new();
        wv_assert_ok!(map.insert(0, 1, val.clone()));
        wv_assert_eq!(t, Rc::strong_count(&val), 2);
    }
    wv_assert_eq!(t, Rc::strong_count(&val), 1);
}
