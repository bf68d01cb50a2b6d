//! Tree: AVL-balanced binary search tree with threaded links.
//!
//! Nodes live in a `SlotMap` arena and refer to each other by arena key.
//! A node's `left`/`right` link is a real child only when the matching
//! `left_child`/`right_child` flag is set; otherwise it is a thread to
//! the in-order predecessor/successor (or the null key at either end).
//! Threads give O(1) stepping without parent links, so insertion and
//! removal keep an explicit ancestor path for rebalancing instead.
//!
//! `balance` is `height(right) - height(left)`. It may reach +-2 while a
//! rebalance is in progress and is back in `-1..=1` when a public call
//! returns.

use crate::notify::{DestroyNotify, Destroyers};
use core::borrow::Borrow;
use core::cmp::Ordering;
use core::mem;
use slotmap::{DefaultKey, Key, SlotMap};

/// Ancestor path bound. An AVL tree taller than this would need more
/// nodes than fit in memory.
pub(crate) const MAX_HEIGHT: usize = 40;

/// Ordering used to place keys in a `Tree`.
pub trait KeyCompare<K: ?Sized> {
    fn compare(&self, a: &K, b: &K) -> Ordering;
}

/// `Ord` ordering of the key type.
#[derive(Clone, Copy, Debug, Default)]
pub struct Natural;

impl<K: Ord + ?Sized> KeyCompare<K> for Natural {
    #[inline]
    fn compare(&self, a: &K, b: &K) -> Ordering {
        a.cmp(b)
    }
}

impl<K: ?Sized, F> KeyCompare<K> for F
where
    F: Fn(&K, &K) -> Ordering,
{
    #[inline]
    fn compare(&self, a: &K, b: &K) -> Ordering {
        self(a, b)
    }
}

/// Stable reference to a tree node. Becomes stale when the node is
/// removed; a stale handle never resolves to another node.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub struct NodeHandle(pub(crate) DefaultKey);

impl NodeHandle {
    pub(crate) fn from_raw(k: DefaultKey) -> Option<Self> {
        (!k.is_null()).then_some(NodeHandle(k))
    }

    pub fn key<'a, K, V, C>(&self, tree: &'a Tree<K, V, C>) -> Option<&'a K> {
        tree.nodes.get(self.0).map(|n| &n.key)
    }

    pub fn value<'a, K, V, C>(&self, tree: &'a Tree<K, V, C>) -> Option<&'a V> {
        tree.nodes.get(self.0).map(|n| &n.value)
    }

    pub fn value_mut<'a, K, V, C>(&self, tree: &'a mut Tree<K, V, C>) -> Option<&'a mut V> {
        tree.nodes.get_mut(self.0).map(|n| &mut n.value)
    }
}

#[derive(Debug)]
pub(crate) struct Node<K, V> {
    pub(crate) key: K,
    pub(crate) value: V,
    pub(crate) left: DefaultKey,
    pub(crate) right: DefaultKey,
    pub(crate) balance: i8,
    pub(crate) left_child: bool,
    pub(crate) right_child: bool,
}

impl<K, V> Node<K, V> {
    fn new(key: K, value: V, left: DefaultKey, right: DefaultKey) -> Self {
        Self {
            key,
            value,
            left,
            right,
            balance: 0,
            left_child: false,
            right_child: false,
        }
    }
}

pub struct Tree<K, V, C = Natural> {
    pub(crate) nodes: SlotMap<DefaultKey, Node<K, V>>,
    pub(crate) root: DefaultKey,
    pub(crate) compare: C,
    destroy: Destroyers<K, V>,
}

impl<K: Ord, V> Tree<K, V> {
    pub fn new() -> Self {
        Self::with_compare(Natural)
    }
}

impl<K: Ord, V> Default for Tree<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V, C> Tree<K, V, C> {
    /// Create a tree ordered by `compare`. A closure can capture whatever
    /// context the ordering needs.
    pub fn with_compare(compare: C) -> Self {
        Self {
            nodes: SlotMap::with_key(),
            root: DefaultKey::null(),
            compare,
            destroy: Destroyers::none(),
        }
    }

    /// Register a callback that receives every key the tree destroys.
    pub fn with_key_destroy<F>(mut self, f: F) -> Self
    where
        F: Fn(K) + Send + Sync + 'static,
    {
        let boxed: DestroyNotify<K> = Box::new(f);
        let value = mem::replace(&mut self.destroy, Destroyers::none()).into_value();
        self.destroy = Destroyers::new(Some(boxed), value);
        self
    }

    /// Register a callback that receives every value the tree destroys.
    pub fn with_value_destroy<F>(mut self, f: F) -> Self
    where
        F: Fn(V) + Send + Sync + 'static,
    {
        let boxed: DestroyNotify<V> = Box::new(f);
        let key = mem::replace(&mut self.destroy, Destroyers::none()).into_key();
        self.destroy = Destroyers::new(key, Some(boxed));
        self
    }

    /// Number of nodes.
    #[inline]
    pub fn nnodes(&self) -> usize {
        self.nodes.len()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Height of the tree; 0 when empty. Walks the left spine adding the
    /// extra height each stored balance implies.
    pub fn height(&self) -> usize {
        let mut node = self.root;
        if node.is_null() {
            return 0;
        }
        let mut height = 0;
        loop {
            let n = &self.nodes[node];
            height += 1 + n.balance.max(0) as usize;
            if !n.left_child {
                return height;
            }
            node = n.left;
        }
    }

    #[inline]
    pub(crate) fn first_key(&self) -> DefaultKey {
        let mut tmp = self.root;
        if tmp.is_null() {
            return tmp;
        }
        while self.nodes[tmp].left_child {
            tmp = self.nodes[tmp].left;
        }
        tmp
    }

    #[inline]
    pub(crate) fn last_key(&self) -> DefaultKey {
        let mut tmp = self.root;
        if tmp.is_null() {
            return tmp;
        }
        while self.nodes[tmp].right_child {
            tmp = self.nodes[tmp].right;
        }
        tmp
    }

    #[inline]
    pub(crate) fn next_key(&self, node: DefaultKey) -> DefaultKey {
        let n = &self.nodes[node];
        let mut tmp = n.right;
        if n.right_child {
            while self.nodes[tmp].left_child {
                tmp = self.nodes[tmp].left;
            }
        }
        tmp
    }

    #[inline]
    pub(crate) fn prev_key(&self, node: DefaultKey) -> DefaultKey {
        let n = &self.nodes[node];
        let mut tmp = n.left;
        if n.left_child {
            while self.nodes[tmp].right_child {
                tmp = self.nodes[tmp].right;
            }
        }
        tmp
    }

    /// Point `parent`'s link on the given side (or the root) at `node`.
    #[inline]
    fn set_link(&mut self, parent: DefaultKey, left_node: bool, node: DefaultKey) {
        if parent.is_null() {
            self.root = node;
        } else if left_node {
            self.nodes[parent].left = node;
        } else {
            self.nodes[parent].right = node;
        }
    }

    #[inline]
    fn is_left_of(&self, parent: DefaultKey, node: DefaultKey) -> bool {
        !parent.is_null() && self.nodes[parent].left == node
    }

    fn rotate_left(&mut self, node: DefaultKey) -> DefaultKey {
        let right = self.nodes[node].right;

        if self.nodes[right].left_child {
            self.nodes[node].right = self.nodes[right].left;
        } else {
            self.nodes[node].right_child = false;
            self.nodes[right].left_child = true;
        }
        self.nodes[right].left = node;

        let a_bal = self.nodes[node].balance as i32;
        let b_bal = self.nodes[right].balance as i32;

        if b_bal <= 0 {
            let right_bal = if a_bal >= 1 { b_bal - 1 } else { a_bal + b_bal - 2 };
            self.nodes[right].balance = right_bal as i8;
            self.nodes[node].balance = (a_bal - 1) as i8;
        } else {
            self.nodes[right].balance = (if a_bal <= b_bal { a_bal - 2 } else { b_bal - 1 }) as i8;
            self.nodes[node].balance = (a_bal - b_bal - 1) as i8;
        }

        right
    }

    fn rotate_right(&mut self, node: DefaultKey) -> DefaultKey {
        let left = self.nodes[node].left;

        if self.nodes[left].right_child {
            self.nodes[node].left = self.nodes[left].right;
        } else {
            self.nodes[node].left_child = false;
            self.nodes[left].right_child = true;
        }
        self.nodes[left].right = node;

        let a_bal = self.nodes[node].balance as i32;
        let b_bal = self.nodes[left].balance as i32;

        if b_bal <= 0 {
            self.nodes[left].balance = (if b_bal > a_bal { b_bal + 1 } else { a_bal + 2 }) as i8;
            self.nodes[node].balance = (a_bal - b_bal + 1) as i8;
        } else {
            let left_bal = if a_bal <= -1 { b_bal + 1 } else { a_bal + b_bal + 2 };
            self.nodes[left].balance = left_bal as i8;
            self.nodes[node].balance = (a_bal + 1) as i8;
        }

        left
    }

    /// Single or double rotation for a node at +-2. Returns the new
    /// subtree root.
    fn node_balance(&mut self, node: DefaultKey) -> DefaultKey {
        let balance = self.nodes[node].balance;
        if balance < -1 {
            let left = self.nodes[node].left;
            if self.nodes[left].balance > 0 {
                self.nodes[node].left = self.rotate_left(left);
            }
            self.rotate_right(node)
        } else if balance > 1 {
            let right = self.nodes[node].right;
            if self.nodes[right].balance < 0 {
                self.nodes[node].right = self.rotate_right(right);
            }
            self.rotate_left(node)
        } else {
            node
        }
    }

    #[inline]
    fn out_of_balance(&self, node: DefaultKey) -> bool {
        !(-1..=1).contains(&self.nodes[node].balance)
    }

    /// Remove every node in order, passing keys and values to the notifiers.
    pub fn remove_all(&mut self) {
        tracing::trace!(nnodes = self.nodes.len(), "tree remove_all");
        let mut node = self.first_key();
        self.root = DefaultKey::null();
        while !node.is_null() {
            let next = self.next_key(node);
            if let Some(n) = self.nodes.remove(node) {
                self.destroy.entry(n.key, n.value);
            }
            node = next;
        }
        self.nodes.clear();
    }

    /// Validate ordering, AVL balance, stored balance factors and threads.
    /// Panics on the first violation.
    pub fn check_invariants(&self)
    where
        C: KeyCompare<K>,
    {
        let mut order = Vec::with_capacity(self.nodes.len());
        if !self.root.is_null() {
            self.check_subtree(self.root, &mut order);
        }
        assert_eq!(order.len(), self.nodes.len(), "unreachable nodes in arena");

        for (i, &k) in order.iter().enumerate() {
            let n = &self.nodes[k];
            let prev = if i == 0 { DefaultKey::null() } else { order[i - 1] };
            let next = order.get(i + 1).copied().unwrap_or_else(DefaultKey::null);
            if !n.left_child {
                assert_eq!(n.left, prev, "left thread does not point at predecessor");
            }
            if !n.right_child {
                assert_eq!(n.right, next, "right thread does not point at successor");
            }
            if i > 0 {
                let p = &self.nodes[prev];
                assert_eq!(
                    self.compare.compare(&p.key, &n.key),
                    Ordering::Less,
                    "in-order keys not strictly ascending"
                );
            }
        }
    }

    /// Returns the subtree height; appends the in-order node sequence.
    fn check_subtree(&self, node: DefaultKey, order: &mut Vec<DefaultKey>) -> i32 {
        let n = &self.nodes[node];
        let lh = if n.left_child {
            self.check_subtree(n.left, order)
        } else {
            0
        };
        order.push(node);
        let rh = if n.right_child {
            self.check_subtree(n.right, order)
        } else {
            0
        };
        assert_eq!(n.balance as i32, rh - lh, "stored balance disagrees with heights");
        assert!((-1..=1).contains(&n.balance), "node out of AVL balance");
        1 + lh.max(rh)
    }

    #[inline]
    fn debug_check(&self)
    where
        C: KeyCompare<K>,
    {
        #[cfg(feature = "debug-checks")]
        self.check_invariants();
    }
}

impl<K, V, C> Tree<K, V, C>
where
    C: KeyCompare<K>,
{
    fn insert_internal(&mut self, key: K, value: V, replace: bool) -> DefaultKey {
        if self.root.is_null() {
            let null = DefaultKey::null();
            self.root = self.nodes.insert(Node::new(key, value, null, null));
            return self.root;
        }

        let mut path = [DefaultKey::null(); MAX_HEIGHT];
        let mut idx = 1;
        let mut node = self.root;
        let retnode;

        loop {
            match self.compare.compare(&key, &self.nodes[node].key) {
                Ordering::Equal => {
                    let n = &mut self.nodes[node];
                    let old_value = mem::replace(&mut n.value, value);
                    let key_to_free = if replace {
                        mem::replace(&mut n.key, key)
                    } else {
                        key
                    };
                    self.destroy.value(old_value);
                    self.destroy.key(key_to_free);
                    return node;
                }
                Ordering::Less => {
                    if self.nodes[node].left_child {
                        path[idx] = node;
                        idx += 1;
                        node = self.nodes[node].left;
                    } else {
                        let pred = self.nodes[node].left;
                        let child = self.nodes.insert(Node::new(key, value, pred, node));
                        let n = &mut self.nodes[node];
                        n.left = child;
                        n.left_child = true;
                        n.balance -= 1;
                        retnode = child;
                        break;
                    }
                }
                Ordering::Greater => {
                    if self.nodes[node].right_child {
                        path[idx] = node;
                        idx += 1;
                        node = self.nodes[node].right;
                    } else {
                        let succ = self.nodes[node].right;
                        let child = self.nodes.insert(Node::new(key, value, node, succ));
                        let n = &mut self.nodes[node];
                        n.right = child;
                        n.right_child = true;
                        n.balance += 1;
                        retnode = child;
                        break;
                    }
                }
            }
        }

        // Walk back up; stop as soon as a subtree's height is unchanged.
        loop {
            idx -= 1;
            let bparent = path[idx];
            let left_node = self.is_left_of(bparent, node);

            if self.out_of_balance(node) {
                node = self.node_balance(node);
                self.set_link(bparent, left_node, node);
            }

            if self.nodes[node].balance == 0 || bparent.is_null() {
                break;
            }

            if left_node {
                self.nodes[bparent].balance -= 1;
            } else {
                self.nodes[bparent].balance += 1;
            }
            node = bparent;
        }

        retnode
    }

    fn remove_internal<Q>(&mut self, key: &Q) -> Option<(K, V)>
    where
        K: Borrow<Q>,
        Q: ?Sized,
        C: KeyCompare<Q>,
    {
        if self.root.is_null() {
            return None;
        }

        let mut path = [DefaultKey::null(); MAX_HEIGHT];
        let mut idx = 1;
        let mut node = self.root;

        loop {
            let n = &self.nodes[node];
            match self.compare.compare(key, <K as Borrow<Q>>::borrow(&n.key)) {
                Ordering::Equal => break,
                Ordering::Less => {
                    if !n.left_child {
                        return None;
                    }
                    path[idx] = node;
                    idx += 1;
                    node = n.left;
                }
                Ordering::Greater => {
                    if !n.right_child {
                        return None;
                    }
                    path[idx] = node;
                    idx += 1;
                    node = n.right;
                }
            }
        }

        idx -= 1;
        let parent = path[idx];
        let mut balance = parent;
        let left_node = self.is_left_of(parent, node);
        let (n_left, n_right) = (self.nodes[node].left, self.nodes[node].right);

        match (self.nodes[node].left_child, self.nodes[node].right_child) {
            (false, false) => {
                if parent.is_null() {
                    self.root = DefaultKey::null();
                } else if left_node {
                    let p = &mut self.nodes[parent];
                    p.left_child = false;
                    p.left = n_left;
                    p.balance += 1;
                } else {
                    let p = &mut self.nodes[parent];
                    p.right_child = false;
                    p.right = n_right;
                    p.balance -= 1;
                }
            }
            (false, true) => {
                let tmp = self.next_key(node);
                self.nodes[tmp].left = n_left;
                self.splice(parent, left_node, n_right);
            }
            (true, false) => {
                let tmp = self.prev_key(node);
                self.nodes[tmp].right = n_right;
                self.splice(parent, left_node, n_left);
            }
            (true, true) => {
                let mut prev = n_left;
                let mut next = n_right;
                let mut nextp = node;
                idx += 1;
                let old_idx = idx;

                // Find the in-order successor and its parent.
                while self.nodes[next].left_child {
                    idx += 1;
                    path[idx] = next;
                    nextp = next;
                    next = self.nodes[next].left;
                }

                path[old_idx] = next;
                balance = path[idx];

                // Unhook the successor from its old position.
                if nextp != node {
                    if self.nodes[next].right_child {
                        self.nodes[nextp].left = self.nodes[next].right;
                    } else {
                        self.nodes[nextp].left_child = false;
                    }
                    self.nodes[nextp].balance += 1;

                    self.nodes[next].right_child = true;
                    self.nodes[next].right = n_right;
                } else {
                    self.nodes[node].balance -= 1;
                }

                // The predecessor's thread now points at the successor.
                while self.nodes[prev].right_child {
                    prev = self.nodes[prev].right;
                }
                self.nodes[prev].right = next;

                let node_balance = self.nodes[node].balance;
                let nx = &mut self.nodes[next];
                nx.left_child = true;
                nx.left = n_left;
                nx.balance = node_balance;

                self.set_link(parent, left_node, next);
            }
        }

        // A shrink propagates upward while the subtree balance lands on 0.
        if !balance.is_null() {
            loop {
                idx -= 1;
                let bparent = path[idx];
                let left_node = self.is_left_of(bparent, balance);

                if self.out_of_balance(balance) {
                    balance = self.node_balance(balance);
                    self.set_link(bparent, left_node, balance);
                }

                if self.nodes[balance].balance != 0 || bparent.is_null() {
                    break;
                }

                if left_node {
                    self.nodes[bparent].balance += 1;
                } else {
                    self.nodes[bparent].balance -= 1;
                }
                balance = bparent;
            }
        }

        self.nodes.remove(node).map(|n| (n.key, n.value))
    }

    /// Replace `parent`'s link to a half-leaf being removed with its only
    /// child and record the height loss on that side.
    fn splice(&mut self, parent: DefaultKey, left_node: bool, child: DefaultKey) {
        if parent.is_null() {
            self.root = child;
        } else if left_node {
            let p = &mut self.nodes[parent];
            p.left = child;
            p.balance += 1;
        } else {
            let p = &mut self.nodes[parent];
            p.right = child;
            p.balance -= 1;
        }
    }

    /// Insert `key -> value`. On an existing key the stored key is kept,
    /// the old value and the passed key are destroyed.
    pub fn insert(&mut self, key: K, value: V) {
        self.insert_node(key, value);
    }

    /// Like `insert`, returning the handle of the affected node.
    pub fn insert_node(&mut self, key: K, value: V) -> NodeHandle {
        let k = self.insert_internal(key, value, false);
        self.debug_check();
        NodeHandle(k)
    }

    /// Insert `key -> value`. On an existing key both the old key and the
    /// old value are destroyed and replaced.
    pub fn replace(&mut self, key: K, value: V) {
        self.replace_node(key, value);
    }

    pub fn replace_node(&mut self, key: K, value: V) -> NodeHandle {
        let k = self.insert_internal(key, value, true);
        self.debug_check();
        NodeHandle(k)
    }

    /// Remove `key`, destroying its key and value. Returns whether it was
    /// present.
    pub fn remove<Q>(&mut self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: ?Sized,
        C: KeyCompare<Q>,
    {
        match self.remove_internal(key) {
            Some((k, v)) => {
                self.debug_check();
                self.destroy.entry(k, v);
                true
            }
            None => false,
        }
    }

    /// Remove `key` without notifying and hand its entry back.
    pub fn steal<Q>(&mut self, key: &Q) -> Option<(K, V)>
    where
        K: Borrow<Q>,
        Q: ?Sized,
        C: KeyCompare<Q>,
    {
        let entry = self.remove_internal(key);
        self.debug_check();
        entry
    }
}

impl<K, V, C> Drop for Tree<K, V, C> {
    fn drop(&mut self) {
        if !self.destroy.is_empty() {
            self.remove_all();
        }
    }
}

impl<K, V, C> core::fmt::Debug for Tree<K, V, C>
where
    K: core::fmt::Debug,
    V: core::fmt::Debug,
{
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}

impl<K, V, C> Extend<(K, V)> for Tree<K, V, C>
where
    C: KeyCompare<K>,
{
    fn extend<I: IntoIterator<Item = (K, V)>>(&mut self, iter: I) {
        for (k, v) in iter {
            self.insert(k, v);
        }
    }
}

impl<K: Ord, V> FromIterator<(K, V)> for Tree<K, V> {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut t = Tree::new();
        t.extend(iter);
        t
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    fn keys_in_order<V, C>(t: &Tree<i32, V, C>) -> Vec<i32> {
        t.keys().copied().collect()
    }

    /// The worked example from the design notes.
    #[test]
    fn insert_lookup_remove_scenario() {
        let mut t = Tree::new();
        for k in [5, 3, 8, 1, 4, 7, 9] {
            t.insert(k, k * 100);
        }
        assert_eq!(keys_in_order(&t), vec![1, 3, 4, 5, 7, 8, 9]);
        assert_eq!(t.nnodes(), 7);
        assert_eq!(t.lookup(&4), Some(&400));
        t.check_invariants();

        assert!(t.remove(&3));
        assert_eq!(keys_in_order(&t), vec![1, 4, 5, 7, 8, 9]);
        t.check_invariants();
        assert!(!t.remove(&3));
    }

    /// Invariant: ascending inserts trigger single rotations and keep
    /// the tree perfectly balanced at powers of two minus one.
    #[test]
    fn ascending_inserts_rotate() {
        let mut t = Tree::new();
        for k in 1..=7 {
            t.insert(k, ());
            t.check_invariants();
        }
        assert_eq!(t.height(), 3);
        let root = t.root;
        assert_eq!(t.nodes[root].key, 4);
    }

    /// Invariant: zig-zag inserts trigger double rotations.
    #[test]
    fn zigzag_inserts_double_rotate() {
        let mut t = Tree::new();
        for k in [10, 5, 7] {
            t.insert(k, ());
        }
        t.check_invariants();
        assert_eq!(t.nodes[t.root].key, 7);
        let mut t = Tree::new();
        for k in [10, 15, 12] {
            t.insert(k, ());
        }
        t.check_invariants();
        assert_eq!(t.nodes[t.root].key, 12);
    }

    /// Invariant: each removal shape (leaf, half-leaf either side, two
    /// children with near and far successor, root) keeps all invariants.
    #[test]
    fn every_removal_shape() {
        let base = [50, 25, 75, 12, 37, 62, 87, 6, 18, 31, 43, 56, 68, 81, 93, 3, 40, 90];
        for victim in base {
            let mut t = Tree::new();
            for k in base {
                t.insert(k, k);
            }
            assert!(t.remove(&victim), "remove {victim}");
            t.check_invariants();
            let mut expect: Vec<i32> = base.iter().copied().filter(|k| *k != victim).collect();
            expect.sort();
            assert_eq!(keys_in_order(&t), expect);
        }
    }

    #[test]
    fn drain_to_empty_and_reuse() {
        let mut t = Tree::new();
        for k in 0..100 {
            t.insert((k * 37) % 100, k);
        }
        for k in 0..100 {
            assert!(t.remove(&((k * 53) % 100)));
            t.check_invariants();
        }
        assert!(t.is_empty());
        assert_eq!(t.height(), 0);
        assert!(t.root.is_null());
        t.insert(1, 1);
        t.check_invariants();
        assert_eq!(t.len(), 1);
    }

    /// Invariant: `insert` keeps the stored key and destroys the passed one;
    /// `replace` destroys the stored key; both destroy the old value.
    #[test]
    fn insert_vs_replace_destroy_order() {
        #[derive(Debug)]
        struct K(i32, &'static str);
        let log = Arc::new(Mutex::new(Vec::new()));
        let (lk, lv) = (log.clone(), log.clone());
        let mut t = Tree::with_compare(|a: &K, b: &K| a.0.cmp(&b.0))
            .with_key_destroy(move |k: K| lk.lock().unwrap().push(format!("k:{}", k.1)))
            .with_value_destroy(move |v: i32| lv.lock().unwrap().push(format!("v:{v}")));

        t.insert(K(1, "orig"), 10);
        t.insert(K(1, "dup"), 11);
        assert_eq!(*log.lock().unwrap(), vec!["v:10", "k:dup"]);
        assert_eq!(t.lookup_extended(&K(1, "")).map(|(k, v)| (k.1, *v)), Some(("orig", 11)));

        t.replace(K(1, "new"), 12);
        assert_eq!(*log.lock().unwrap(), vec!["v:10", "k:dup", "v:11", "k:orig"]);
        assert_eq!(t.lookup_extended(&K(1, "")).map(|(k, v)| (k.1, *v)), Some(("new", 12)));
        assert_eq!(t.len(), 1);
    }

    #[test]
    fn steal_skips_notifiers_and_drop_runs_them() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let lv = log.clone();
        let mut t = Tree::new().with_value_destroy(move |v: i32| lv.lock().unwrap().push(v));
        for k in 1..=4 {
            t.insert(k, k * 10);
        }
        assert_eq!(t.steal(&2), Some((2, 20)));
        assert!(log.lock().unwrap().is_empty());
        assert!(t.remove(&3));
        assert_eq!(*log.lock().unwrap(), vec![30]);
        drop(t);
        assert_eq!(*log.lock().unwrap(), vec![30, 10, 40], "teardown runs in key order");
    }

    #[test]
    fn remove_all_resets() {
        let mut t: Tree<i32, String> = (0..20).map(|k| (k, k.to_string())).collect();
        t.remove_all();
        assert!(t.is_empty());
        assert_eq!(t.first(), None);
        t.insert(3, "3".into());
        t.check_invariants();
    }

    /// Invariant: the height bound of AVL trees holds under sequential load.
    #[test]
    fn height_stays_logarithmic() {
        let mut t = Tree::new();
        for k in 0..4096 {
            t.insert(k, ());
        }
        let bound = 1.44 * ((t.nnodes() + 2) as f64).log2();
        assert!((t.height() as f64) <= bound, "height {} > {bound}", t.height());
        t.check_invariants();
    }
}
