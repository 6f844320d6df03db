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

use std::cell::Cell;
use std::fmt;
use std::marker::PhantomData;
use std::ptr::NonNull;

use crate::io::LogFlags;

type Link<T> = Option<NonNull<T>>;

/// The links that an item needs to embed to be stored in a [`RbTree`]
///
/// The tree only reads and writes these links; it never allocates or frees items.
pub struct RbLinks<T> {
    parent: Cell<Link<T>>,
    left: Cell<Link<T>>,
    right: Cell<Link<T>>,
    red: Cell<bool>,
}

unsafe impl<T: Send> Send for RbLinks<T> {
}

impl<T> RbLinks<T> {
    /// Creates new unlinked links
    pub const fn new() -> Self {
        Self {
            parent: Cell::new(None),
            left: Cell::new(None),
            right: Cell::new(None),
            red: Cell::new(false),
        }
    }

    /// Returns true if the item is currently the root or has a parent/children
    pub fn is_linked(&self) -> bool {
        self.parent.get().is_some() || self.left.get().is_some() || self.right.get().is_some()
    }

    fn reset(&self) {
        self.parent.set(None);
        self.left.set(None);
        self.right.set(None);
        self.red.set(false);
    }
}

impl<T> Default for RbLinks<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for RbLinks<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "RbLinks[parent={:?}, left={:?}, right={:?}, red={}]",
            self.parent.get(),
            self.left.get(),
            self.right.get(),
            self.red.get()
        )
    }
}

/// An item that can be stored in a [`RbTree`]
///
/// The tree is ordered by `key_start`. The range `[key_start, key_end)` is used by
/// [`range_search`](RbTree::range_search); point items may use `key_end == key_start`.
pub trait RbItem: Sized {
    /// Returns the embedded links
    fn links(&self) -> &RbLinks<Self>;

    /// Returns the start of the key range (inclusive)
    fn key_start(&self) -> u64;

    /// Returns the end of the key range (exclusive)
    fn key_end(&self) -> u64;
}

/// A ready-made item that carries just a key range
#[derive(Debug, Default)]
pub struct RbNode {
    start: u64,
    end: u64,
    links: RbLinks<RbNode>,
}

impl RbNode {
    /// Creates a new unlinked node for the range `[start, end)`
    pub const fn new(start: u64, end: u64) -> Self {
        Self {
            start,
            end,
            links: RbLinks::new(),
        }
    }
}

impl RbItem for RbNode {
    fn links(&self) -> &RbLinks<Self> {
        &self.links
    }

    fn key_start(&self) -> u64 {
        self.start
    }

    fn key_end(&self) -> u64 {
        self.end
    }
}

// all nodes reachable from the root are valid as long as they are members of the tree, which the
// callers of insert and unlink guarantee.
fn item<'a, T: RbItem>(n: NonNull<T>) -> &'a T {
    unsafe { &*n.as_ptr() }
}

fn parent<T: RbItem>(n: NonNull<T>) -> Link<T> {
    item(n).links().parent.get()
}

fn left<T: RbItem>(n: NonNull<T>) -> Link<T> {
    item(n).links().left.get()
}

fn right<T: RbItem>(n: NonNull<T>) -> Link<T> {
    item(n).links().right.get()
}

fn set_parent<T: RbItem>(n: NonNull<T>, p: Link<T>) {
    item(n).links().parent.set(p);
}

fn set_left<T: RbItem>(n: NonNull<T>, l: Link<T>) {
    item(n).links().left.set(l);
}

fn set_right<T: RbItem>(n: NonNull<T>, r: Link<T>) {
    item(n).links().right.set(r);
}

/// Null links are leaves and therefore black
fn is_red<T: RbItem>(n: Link<T>) -> bool {
    n.map_or(false, |n| item(n).links().red.get())
}

fn is_black<T: RbItem>(n: Link<T>) -> bool {
    !is_red(n)
}

fn set_red<T: RbItem>(n: Link<T>, red: bool) {
    if let Some(n) = n {
        item(n).links().red.set(red);
    }
}

fn leftmost<T: RbItem>(mut n: NonNull<T>) -> NonNull<T> {
    while let Some(l) = left(n) {
        n = l;
    }
    n
}

fn successor<T: RbItem>(n: NonNull<T>) -> Link<T> {
    if let Some(r) = right(n) {
        return Some(leftmost(r));
    }

    // walk up until we come from a left child
    let mut cur = n;
    let mut up = parent(cur);
    while let Some(p) = up {
        if left(p) == Some(cur) {
            return Some(p);
        }
        cur = p;
        up = parent(p);
    }
    None
}

/// An intrusive red-black tree
///
/// The items embed [`RbLinks`] and are owned by the caller; the tree only links them together.
/// Items are ordered by their `key_start`, which needs to be unique. Inserting an item with an
/// existing `key_start` leaves the tree unchanged.
///
/// Besides exact lookups, the tree supports lookups of the range that contains a key, the
/// predecessor of a key, and in-order enumeration starting at a key. Overlapping ranges are not
/// supported by `range_search` and `less_than_search`.
///
/// The tree has no internal locking; concurrent mutations need to be serialized by the caller.
///
/// The implementation follows the classic algorithms from "Introduction to Algorithms" (Cormen et
/// al.), but uses null links instead of a sentinel node. Null links are treated as black.
pub struct RbTree<T: RbItem> {
    root: Link<T>,
    len: usize,
}

unsafe impl<T: RbItem + Send> Send for RbTree<T> {
}

impl<T: RbItem> RbTree<T> {
    /// Creates an empty tree
    pub const fn new() -> Self {
        Self { root: None, len: 0 }
    }

    /// Returns the number of items in the tree
    pub fn len(&self) -> usize {
        self.len
    }

    /// Returns true if the tree has no items
    pub fn is_empty(&self) -> bool {
        self.root.is_none()
    }

    /// Returns the root item
    pub fn root(&self) -> Option<&T> {
        self.root.map(|r| item(r))
    }

    /// Inserts the given item into the tree
    ///
    /// Returns false if an item with the same `key_start` exists already. In this case, the tree
    /// is not changed.
    ///
    /// # Safety
    ///
    /// The caller needs to guarantee that `new` points to a valid item that is not part of any
    /// tree, and that it stays valid and is not moved until it has been removed via
    /// [`unlink`](RbTree::unlink) or the tree is no longer used.
    pub unsafe fn insert(&mut self, new: NonNull<T>) -> bool {
        let key = item(new).key_start();

        let mut up = None;
        let mut cur = self.root;
        let mut is_left = false;
        while let Some(c) = cur {
            let ckey = item(c).key_start();
            if key == ckey {
                log!(LogFlags::LibRbTree, "rbtree: ignoring duplicate key {:#x}", key);
                return false;
            }

            up = Some(c);
            is_left = key < ckey;
            cur = if is_left { left(c) } else { right(c) };
        }

        let links = item(new).links();
        links.parent.set(up);
        links.left.set(None);
        links.right.set(None);
        links.red.set(true);

        match up {
            None => self.root = Some(new),
            Some(p) if is_left => set_left(p, Some(new)),
            Some(p) => set_right(p, Some(new)),
        }
        self.len += 1;

        self.insert_fixup(new);
        true
    }

    fn insert_fixup(&mut self, mut x: NonNull<T>) {
        while let Some(mut p) = parent(x).filter(|p| is_red(Some(*p))) {
            // a red node is never the root, so that the grandparent exists
            let g = match parent(p) {
                Some(g) => g,
                None => break,
            };

            if left(g) == Some(p) {
                let uncle = right(g);
                if is_red(uncle) {
                    set_red(Some(p), false);
                    set_red(uncle, false);
                    set_red(Some(g), true);
                    x = g;
                }
                else {
                    if right(p) == Some(x) {
                        self.rotate_left(p);
                        std::mem::swap(&mut x, &mut p);
                    }
                    set_red(Some(p), false);
                    set_red(Some(g), true);
                    self.rotate_right(g);
                }
            }
            else {
                let uncle = left(g);
                if is_red(uncle) {
                    set_red(Some(p), false);
                    set_red(uncle, false);
                    set_red(Some(g), true);
                    x = g;
                }
                else {
                    if left(p) == Some(x) {
                        self.rotate_right(p);
                        std::mem::swap(&mut x, &mut p);
                    }
                    set_red(Some(p), false);
                    set_red(Some(g), true);
                    self.rotate_left(g);
                }
            }
        }

        set_red(self.root, false);
    }

    /// Removes the given item from the tree
    ///
    /// # Safety
    ///
    /// The caller needs to guarantee that `node` is currently a member of this tree.
    pub unsafe fn unlink(&mut self, node: NonNull<T>) {
        let x;
        let x_parent;
        let removed_black;

        match (left(node), right(node)) {
            (Some(_), Some(r)) => {
                // splice in the in-order successor, which has no left child
                let succ = leftmost(r);
                removed_black = is_black(Some(succ));
                x = right(succ);

                if parent(succ) == Some(node) {
                    x_parent = Some(succ);
                }
                else {
                    x_parent = parent(succ);
                    self.transplant(succ, x);
                    set_right(succ, right(node));
                    if let Some(r) = right(succ) {
                        set_parent(r, Some(succ));
                    }
                }

                self.transplant(node, Some(succ));
                set_left(succ, left(node));
                if let Some(l) = left(succ) {
                    set_parent(l, Some(succ));
                }
                set_red(Some(succ), is_red(Some(node)));
            },

            (child, None) | (None, child) => {
                removed_black = is_black(Some(node));
                x = child;
                x_parent = parent(node);
                self.transplant(node, child);
            },
        }

        item(node).links().reset();
        self.len -= 1;

        if removed_black {
            self.delete_fixup(x, x_parent);
        }
    }

    fn delete_fixup(&mut self, mut x: Link<T>, mut x_parent: Link<T>) {
        while x != self.root && is_black(x) {
            let p = match x_parent {
                Some(p) => p,
                None => break,
            };

            if left(p) == x {
                let mut w = right(p);
                if is_red(w) {
                    set_red(w, false);
                    set_red(Some(p), true);
                    self.rotate_left(p);
                    w = right(p);
                }

                // the sibling of a doubly-black node always exists
                let Some(mut wn) = w
                else {
                    x = Some(p);
                    x_parent = parent(p);
                    continue;
                };

                if is_black(left(wn)) && is_black(right(wn)) {
                    set_red(Some(wn), true);
                    x = Some(p);
                    x_parent = parent(p);
                }
                else {
                    if is_black(right(wn)) {
                        set_red(left(wn), false);
                        set_red(Some(wn), true);
                        self.rotate_right(wn);
                        if let Some(n) = right(p) {
                            wn = n;
                        }
                    }
                    set_red(Some(wn), is_red(Some(p)));
                    set_red(Some(p), false);
                    set_red(right(wn), false);
                    self.rotate_left(p);
                    x = self.root;
                    break;
                }
            }
            else {
                let mut w = left(p);
                if is_red(w) {
                    set_red(w, false);
                    set_red(Some(p), true);
                    self.rotate_right(p);
                    w = left(p);
                }

                let Some(mut wn) = w
                else {
                    x = Some(p);
                    x_parent = parent(p);
                    continue;
                };

                if is_black(left(wn)) && is_black(right(wn)) {
                    set_red(Some(wn), true);
                    x = Some(p);
                    x_parent = parent(p);
                }
                else {
                    if is_black(left(wn)) {
                        set_red(right(wn), false);
                        set_red(Some(wn), true);
                        self.rotate_left(wn);
                        if let Some(n) = left(p) {
                            wn = n;
                        }
                    }
                    set_red(Some(wn), is_red(Some(p)));
                    set_red(Some(p), false);
                    set_red(left(wn), false);
                    self.rotate_right(p);
                    x = self.root;
                    break;
                }
            }
        }

        set_red(x, false);
    }

    /// Replaces `old` by `new` as the child of `old`'s parent
    fn replace_child(&mut self, up: Link<T>, old: NonNull<T>, new: Link<T>) {
        match up {
            None => self.root = new,
            Some(p) if left(p) == Some(old) => set_left(p, new),
            Some(p) => set_right(p, new),
        }
    }

    fn transplant(&mut self, old: NonNull<T>, new: Link<T>) {
        let up = parent(old);
        self.replace_child(up, old, new);
        if let Some(n) = new {
            set_parent(n, up);
        }
    }

    fn rotate_left(&mut self, x: NonNull<T>) {
        let Some(y) = right(x)
        else {
            return;
        };

        set_right(x, left(y));
        if let Some(yl) = left(y) {
            set_parent(yl, Some(x));
        }

        let up = parent(x);
        set_parent(y, up);
        self.replace_child(up, x, Some(y));

        set_left(y, Some(x));
        set_parent(x, Some(y));
    }

    fn rotate_right(&mut self, x: NonNull<T>) {
        let Some(y) = left(x)
        else {
            return;
        };

        set_left(x, right(y));
        if let Some(yr) = right(y) {
            set_parent(yr, Some(x));
        }

        let up = parent(x);
        set_parent(y, up);
        self.replace_child(up, x, Some(y));

        set_right(y, Some(x));
        set_parent(x, Some(y));
    }

    /// Returns a pointer to the item with given `key_start`
    pub fn search_ptr(&self, key_start: u64) -> Option<NonNull<T>> {
        let mut cur = self.root;
        while let Some(c) = cur {
            let ckey = item(c).key_start();
            if key_start == ckey {
                return Some(c);
            }
            cur = if key_start < ckey { left(c) } else { right(c) };
        }
        None
    }

    /// Returns the item with given `key_start`
    pub fn search(&self, key_start: u64) -> Option<&T> {
        self.search_ptr(key_start).map(|n| item(n))
    }

    pub(crate) fn range_search_ptr(&self, key: u64) -> Option<NonNull<T>> {
        let mut cur = self.root;
        while let Some(c) = cur {
            let it = item(c);
            if key < it.key_start() {
                cur = left(c);
            }
            else if key >= it.key_end() {
                cur = right(c);
            }
            else {
                return Some(c);
            }
        }
        None
    }

    /// Returns the item whose range `[key_start, key_end)` contains `key`
    pub fn range_search(&self, key: u64) -> Option<&T> {
        self.range_search_ptr(key).map(|n| item(n))
    }

    pub(crate) fn less_than_search_ptr(&self, key_start: u64) -> Option<NonNull<T>> {
        let mut best = None;
        let mut cur = self.root;
        while let Some(c) = cur {
            if item(c).key_start() < key_start {
                best = Some(c);
                cur = right(c);
            }
            else {
                cur = left(c);
            }
        }
        best
    }

    /// Returns the item with the greatest `key_start` that is strictly less than `key_start`
    pub fn less_than_search(&self, key_start: u64) -> Option<&T> {
        self.less_than_search_ptr(key_start).map(|n| item(n))
    }

    pub(crate) fn enum_start_ptr(&self, key_start: u64) -> Option<NonNull<T>> {
        let mut best = None;
        let mut cur = self.root;
        while let Some(c) = cur {
            let ckey = item(c).key_start();
            if ckey == key_start {
                return Some(c);
            }
            else if ckey > key_start {
                best = Some(c);
                cur = left(c);
            }
            else {
                cur = right(c);
            }
        }
        best
    }

    /// Starts an in-order enumeration at the smallest item with a `key_start` >= `key_start`
    ///
    /// The enumeration is continued via [`enum_next`](RbTree::enum_next).
    pub fn enum_start(&self, key_start: u64) -> Option<&T> {
        self.enum_start_ptr(key_start).map(|n| item(n))
    }

    /// Returns the in-order successor of `node`
    ///
    /// Returns None if `node` is the last item or not a member of this tree.
    pub fn enum_next(&self, node: &T) -> Option<&T> {
        let ptr = NonNull::from(node);
        // only follow the links of our own items
        if self.search_ptr(node.key_start()) != Some(ptr) {
            log!(
                LogFlags::LibRbTree,
                "rbtree: enum_next on foreign item {:#x}",
                node.key_start()
            );
            return None;
        }
        successor(ptr).map(|n| item(n))
    }

    /// Returns the item with the smallest `key_start`
    pub fn first(&self) -> Option<&T> {
        self.root.map(|r| item(leftmost(r)))
    }

    /// Returns an iterator over all items with a `key_start` >= `key_start` in ascending order
    pub fn iter_from(&self, key_start: u64) -> Iter<'_, T> {
        Iter {
            next: self.enum_start_ptr(key_start),
            phantom: PhantomData,
        }
    }

    /// Returns an iterator over all items in ascending order
    pub fn iter(&self) -> Iter<'_, T> {
        Iter {
            next: self.root.map(leftmost),
            phantom: PhantomData,
        }
    }

    /// Checks the red-black invariants and the binary-search ordering
    ///
    /// Returns the black height of the tree (counting the null leaves) or None if any invariant is
    /// violated.
    pub fn check(&self) -> Option<usize> {
        if is_red(self.root) {
            log!(LogFlags::LibRbTree, "rbtree: root is red");
            return None;
        }
        if let Some(r) = self.root {
            if parent(r).is_some() {
                log!(LogFlags::LibRbTree, "rbtree: root has a parent");
                return None;
            }
        }

        let height = Self::check_rec(self.root, None, None)?;

        let count = self.iter().count();
        if count != self.len {
            log!(
                LogFlags::LibRbTree,
                "rbtree: found {} items, but expected {}",
                count,
                self.len
            );
            return None;
        }
        Some(height)
    }

    fn check_rec(node: Link<T>, min: Option<u64>, max: Option<u64>) -> Option<usize> {
        let Some(n) = node
        else {
            // leaves are black
            return Some(1);
        };

        let key = item(n).key_start();
        if min.map_or(false, |m| key <= m) || max.map_or(false, |m| key >= m) {
            log!(LogFlags::LibRbTree, "rbtree: key {:#x} violates the ordering", key);
            return None;
        }

        if is_red(node) && (is_red(left(n)) || is_red(right(n))) {
            log!(LogFlags::LibRbTree, "rbtree: red node {:#x} has a red child", key);
            return None;
        }

        for child in [left(n), right(n)].into_iter().flatten() {
            if parent(child) != Some(n) {
                log!(LogFlags::LibRbTree, "rbtree: broken parent link below {:#x}", key);
                return None;
            }
        }

        let lheight = Self::check_rec(left(n), min, Some(key))?;
        let rheight = Self::check_rec(right(n), Some(key), max)?;
        if lheight != rheight {
            log!(
                LogFlags::LibRbTree,
                "rbtree: black height mismatch below {:#x}: {} vs. {}",
                key,
                lheight,
                rheight
            );
            return None;
        }

        Some(lheight + if is_black(node) { 1 } else { 0 })
    }
}

impl<T: RbItem> Default for RbTree<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: RbItem + fmt::Debug> fmt::Debug for RbTree<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.iter()).finish()
    }
}

/// An in-order iterator over the items of a [`RbTree`]
pub struct Iter<'a, T: RbItem> {
    next: Link<T>,
    phantom: PhantomData<&'a T>,
}

impl<'a, T: RbItem> Iterator for Iter<'a, T> {
    type Item = &'a T;

    fn next(&mut self) -> Option<Self::Item> {
        let cur = self.next?;
        self.next = successor(cur);
        Some(item(cur))
    }
}
