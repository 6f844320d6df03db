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

use base::col::{RbItem, RbNode, RbTree};
use base::test::WvTester;
use base::{wv_assert, wv_assert_eq, wv_assert_some, wv_run_test};

use std::ptr::NonNull;

pub fn run(t: &mut dyn WvTester) {
    wv_run_test!(t, insert_in_order);
    wv_run_test!(t, insert_rev_order);
    wv_run_test!(t, insert_rand_order);
    wv_run_test!(t, duplicate_insert);
    wv_run_test!(t, range_search);
    wv_run_test!(t, less_than_search);
    wv_run_test!(t, enumerate);
    wv_run_test!(t, enum_next_foreign);
    wv_run_test!(t, unlink);
}

const NODE_COUNT: u64 = 64;
const RANGE_SIZE: u64 = 0x100;
const RANGE_GAP: u64 = 0x80;

// a tiny LCG, so that the random orders are reproducible
fn shuffle(vals: &mut [u64], mut seed: u64) {
    for i in (1..vals.len()).rev() {
        seed = seed.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
        let j = (seed >> 33) as usize % (i + 1);
        vals.swap(i, j);
    }
}

fn make_nodes(keys: &[u64]) -> Vec<RbNode> {
    keys.iter()
        .map(|k| {
            let start = k * (RANGE_SIZE + RANGE_GAP);
            RbNode::new(start, start + RANGE_SIZE)
        })
        .collect()
}

fn insert_all(t: &mut dyn WvTester, tree: &mut RbTree<RbNode>, nodes: &[RbNode]) {
    for n in nodes {
        // safety: the nodes outlive the tree and are not moved
        wv_assert!(t, unsafe { tree.insert(NonNull::from(n)) });
        wv_assert!(t, tree.check().is_some());
    }
}

fn in_order_keys(tree: &RbTree<RbNode>) -> Vec<u64> {
    tree.iter().map(|n| n.key_start()).collect()
}

fn test_insert(t: &mut dyn WvTester, keys: &[u64]) {
    let nodes = make_nodes(keys);
    let mut tree = RbTree::new();
    insert_all(t, &mut tree, &nodes);

    wv_assert_eq!(t, tree.len(), keys.len());

    let mut expected = nodes.iter().map(|n| n.key_start()).collect::<Vec<_>>();
    expected.sort_unstable();
    wv_assert_eq!(t, in_order_keys(&tree), expected);

    // a red-black tree with n nodes has a black height of at most log2(n + 1) + 1
    let height = wv_assert_some!(tree.check());
    wv_assert!(t, height <= 8);
}

fn insert_in_order(t: &mut dyn WvTester) {
    let keys = (0..NODE_COUNT).collect::<Vec<_>>();
    test_insert(t, &keys);
}

fn insert_rev_order(t: &mut dyn WvTester) {
    let keys = (0..NODE_COUNT).rev().collect::<Vec<_>>();
    test_insert(t, &keys);
}

fn insert_rand_order(t: &mut dyn WvTester) {
    for seed in [1, 42, 0xdead_beef] {
        let mut keys = (0..NODE_COUNT).collect::<Vec<_>>();
        shuffle(&mut keys, seed);
        test_insert(t, &keys);
    }
}

fn duplicate_insert(t: &mut dyn WvTester) {
    let nodes = make_nodes(&[3, 1, 4, 5, 9, 2, 6]);
    let dup = RbNode::new(nodes[2].key_start(), nodes[2].key_end() + 1);

    let mut tree = RbTree::new();
    insert_all(t, &mut tree, &nodes);

    let before = in_order_keys(&tree);
    let height = tree.check();
    // safety: the node outlives the tree
    wv_assert!(t, !unsafe { tree.insert(NonNull::from(&dup)) });
    wv_assert!(t, !dup.links().is_linked());
    wv_assert_eq!(t, tree.len(), nodes.len());
    wv_assert_eq!(t, in_order_keys(&tree), before);
    wv_assert_eq!(t, tree.check(), height);

    // the tree still holds the original node
    let found = wv_assert_some!(tree.search(nodes[2].key_start()));
    wv_assert!(t, std::ptr::eq(found, &nodes[2]));
}

fn range_search(t: &mut dyn WvTester) {
    let mut keys = (0..NODE_COUNT).collect::<Vec<_>>();
    shuffle(&mut keys, 7);
    let nodes = make_nodes(&keys);
    let mut tree = RbTree::new();
    insert_all(t, &mut tree, &nodes);

    let end = NODE_COUNT * (RANGE_SIZE + RANGE_GAP) + RANGE_SIZE;
    for k in (0..end).step_by(0x10) {
        let expected = nodes
            .iter()
            .find(|n| k >= n.key_start() && k < n.key_end())
            .map(|n| n.key_start());
        wv_assert_eq!(t, tree.range_search(k).map(|n| n.key_start()), expected);
    }
}

fn less_than_search(t: &mut dyn WvTester) {
    let mut keys = (0..NODE_COUNT).collect::<Vec<_>>();
    shuffle(&mut keys, 13);
    let nodes = make_nodes(&keys);
    let mut tree = RbTree::new();
    insert_all(t, &mut tree, &nodes);

    let end = NODE_COUNT * (RANGE_SIZE + RANGE_GAP) + RANGE_SIZE;
    for k in (0..end).step_by(0x20) {
        let expected = nodes
            .iter()
            .map(|n| n.key_start())
            .filter(|s| *s < k)
            .max();
        wv_assert_eq!(t, tree.less_than_search(k).map(|n| n.key_start()), expected);
    }
}

fn enumerate(t: &mut dyn WvTester) {
    let mut keys = (0..NODE_COUNT).collect::<Vec<_>>();
    shuffle(&mut keys, 99);
    let nodes = make_nodes(&keys);
    let mut tree = RbTree::new();
    insert_all(t, &mut tree, &nodes);

    let mut all = nodes.iter().map(|n| n.key_start()).collect::<Vec<_>>();
    all.sort_unstable();

    // queries on, between, before, and beyond the existing keys
    let end = NODE_COUNT * (RANGE_SIZE + RANGE_GAP);
    for q in (0..end + RANGE_SIZE).step_by(0x40) {
        let mut visited = Vec::new();
        let mut cur = tree.enum_start(q);
        while let Some(n) = cur {
            visited.push(n.key_start());
            cur = tree.enum_next(n);
        }

        let expected = all.iter().copied().filter(|s| *s >= q).collect::<Vec<_>>();
        wv_assert_eq!(t, visited, expected);
        wv_assert_eq!(
            t,
            tree.iter_from(q).map(|n| n.key_start()).collect::<Vec<_>>(),
            expected
        );
    }

    let empty = RbTree::<RbNode>::new();
    wv_assert!(t, empty.enum_start(0).is_none());
    wv_assert!(t, empty.first().is_none());
}

fn enum_next_foreign(t: &mut dyn WvTester) {
    let nodes = make_nodes(&[0, 1, 2, 3]);
    let others = make_nodes(&[0, 1, 2, 3]);
    let mut tree = RbTree::new();
    insert_all(t, &mut tree, &nodes);
    let mut other = RbTree::new();
    insert_all(t, &mut other, &others);

    // items of another tree with the same keys are not followed
    wv_assert!(t, tree.enum_next(&others[1]).is_none());
    let unlinked = RbNode::new(nodes[1].key_start(), nodes[1].key_end());
    wv_assert!(t, tree.enum_next(&unlinked).is_none());

    let next = wv_assert_some!(tree.enum_next(&nodes[1]));
    wv_assert!(t, std::ptr::eq(next, &nodes[2]));
    wv_assert!(t, tree.enum_next(&nodes[3]).is_none());
}

fn unlink(t: &mut dyn WvTester) {
    let mut keys = (0..NODE_COUNT).collect::<Vec<_>>();
    shuffle(&mut keys, 5);
    let nodes = make_nodes(&keys);
    let mut tree = RbTree::new();
    insert_all(t, &mut tree, &nodes);

    let mut remaining = nodes.iter().map(|n| n.key_start()).collect::<Vec<_>>();
    remaining.sort_unstable();

    // remove every other node first, then the rest in insertion order
    let order = nodes
        .iter()
        .step_by(2)
        .chain(nodes.iter().skip(1).step_by(2));
    for n in order {
        // safety: every node is removed exactly once
        unsafe { tree.unlink(NonNull::from(n)) };
        wv_assert!(t, !n.links().is_linked());
        wv_assert!(t, tree.check().is_some());

        remaining.retain(|s| *s != n.key_start());
        wv_assert_eq!(t, in_order_keys(&tree), remaining);
        wv_assert!(t, tree.search(n.key_start()).is_none());
    }

    wv_assert!(t, tree.is_empty());
    wv_assert!(t, tree.root().is_none());
}
