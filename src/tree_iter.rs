//! Lookup, navigation and traversal for `Tree`.

use crate::error::{precondition, Error};
use crate::tree::{KeyCompare, NodeHandle, Tree};
use core::borrow::Borrow;
use core::cmp::Ordering;
use slotmap::{DefaultKey, Key};
use std::collections::VecDeque;

/// Visit order for `Tree::traverse`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TraverseType {
    InOrder,
    PreOrder,
    PostOrder,
    LevelOrder,
}

impl<K, V, C> Tree<K, V, C> {
    pub fn first(&self) -> Option<NodeHandle> {
        NodeHandle::from_raw(self.first_key())
    }

    pub fn last(&self) -> Option<NodeHandle> {
        NodeHandle::from_raw(self.last_key())
    }

    /// In-order successor of `node`. A stale handle logs and yields `None`.
    pub fn next(&self, node: NodeHandle) -> Option<NodeHandle> {
        if !self.nodes.contains_key(node.0) {
            precondition("tree next", Error::StaleNode);
            return None;
        }
        NodeHandle::from_raw(self.next_key(node.0))
    }

    /// In-order predecessor of `node`. A stale handle logs and yields `None`.
    pub fn previous(&self, node: NodeHandle) -> Option<NodeHandle> {
        if !self.nodes.contains_key(node.0) {
            precondition("tree previous", Error::StaleNode);
            return None;
        }
        NodeHandle::from_raw(self.prev_key(node.0))
    }

    /// Call `f` on each entry in key order until it returns `true`.
    pub fn foreach<F>(&self, mut f: F)
    where
        F: FnMut(&K, &V) -> bool,
    {
        let mut node = self.first_key();
        while !node.is_null() {
            let n = &self.nodes[node];
            if f(&n.key, &n.value) {
                break;
            }
            node = self.next_key(node);
        }
    }

    /// Like `foreach`, but hands out node handles.
    pub fn foreach_node<F>(&self, mut f: F)
    where
        F: FnMut(NodeHandle, &K, &V) -> bool,
    {
        let mut node = self.first_key();
        while !node.is_null() {
            let n = &self.nodes[node];
            if f(NodeHandle(node), &n.key, &n.value) {
                break;
            }
            node = self.next_key(node);
        }
    }

    /// Visit every entry in the given order until `f` returns `true`.
    pub fn traverse<F>(&self, order: TraverseType, mut f: F)
    where
        F: FnMut(&K, &V) -> bool,
    {
        if self.root.is_null() {
            return;
        }
        match order {
            TraverseType::PreOrder => {
                self.pre_order(self.root, &mut f);
            }
            TraverseType::InOrder => self.foreach(f),
            TraverseType::PostOrder => {
                self.post_order(self.root, &mut f);
            }
            TraverseType::LevelOrder => {
                let mut queue = VecDeque::from([self.root]);
                while let Some(node) = queue.pop_front() {
                    let n = &self.nodes[node];
                    if f(&n.key, &n.value) {
                        return;
                    }
                    if n.left_child {
                        queue.push_back(n.left);
                    }
                    if n.right_child {
                        queue.push_back(n.right);
                    }
                }
            }
        }
    }

    fn pre_order<F>(&self, node: DefaultKey, f: &mut F) -> bool
    where
        F: FnMut(&K, &V) -> bool,
    {
        let n = &self.nodes[node];
        if f(&n.key, &n.value) {
            return true;
        }
        if n.left_child && self.pre_order(n.left, f) {
            return true;
        }
        n.right_child && self.pre_order(n.right, f)
    }

    fn post_order<F>(&self, node: DefaultKey, f: &mut F) -> bool
    where
        F: FnMut(&K, &V) -> bool,
    {
        let n = &self.nodes[node];
        if n.left_child && self.post_order(n.left, f) {
            return true;
        }
        if n.right_child && self.post_order(n.right, f) {
            return true;
        }
        f(&n.key, &n.value)
    }

    /// Find an entry by a search closure. `f` receives a node key and
    /// returns where the sought entry lies relative to it: `Less` goes
    /// left, `Greater` goes right, `Equal` is a hit.
    pub fn search_node<F>(&self, mut f: F) -> Option<NodeHandle>
    where
        F: FnMut(&K) -> Ordering,
    {
        let mut node = self.root;
        if node.is_null() {
            return None;
        }
        loop {
            let n = &self.nodes[node];
            match f(&n.key) {
                Ordering::Equal => return Some(NodeHandle(node)),
                Ordering::Less if n.left_child => node = n.left,
                Ordering::Greater if n.right_child => node = n.right,
                _ => return None,
            }
        }
    }

    pub fn search<F>(&self, f: F) -> Option<&V>
    where
        F: FnMut(&K) -> Ordering,
    {
        self.search_node(f).map(|h| &self.nodes[h.0].value)
    }

    /// Entries in key order.
    pub fn iter(&self) -> Iter<'_, K, V, C> {
        Iter {
            tree: self,
            front: self.first_key(),
            back: self.last_key(),
            remaining: self.nodes.len(),
        }
    }

    pub fn keys(&self) -> impl DoubleEndedIterator<Item = &K> + ExactSizeIterator + '_ {
        self.iter().map(|(k, _)| k)
    }

    pub fn values(&self) -> impl DoubleEndedIterator<Item = &V> + ExactSizeIterator + '_ {
        self.iter().map(|(_, v)| v)
    }
}

// Lookups take any borrowed form `Q` of the key, as long as the
// comparator also orders `Q`. `Natural` does for every `Q: Ord`; a
// closure comparator only orders `K` itself.
impl<K, V, C> Tree<K, V, C> {
    fn find_key<Q>(&self, key: &Q) -> DefaultKey
    where
        K: Borrow<Q>,
        Q: ?Sized,
        C: KeyCompare<Q>,
    {
        let mut node = self.root;
        if node.is_null() {
            return node;
        }
        loop {
            let n = &self.nodes[node];
            match self.compare.compare(key, <K as Borrow<Q>>::borrow(&n.key)) {
                Ordering::Equal => return node,
                Ordering::Less if n.left_child => node = n.left,
                Ordering::Greater if n.right_child => node = n.right,
                _ => return DefaultKey::null(),
            }
        }
    }

    pub fn lookup<Q>(&self, key: &Q) -> Option<&V>
    where
        K: Borrow<Q>,
        Q: ?Sized,
        C: KeyCompare<Q>,
    {
        self.nodes.get(self.find_key(key)).map(|n| &n.value)
    }

    pub fn lookup_mut<Q>(&mut self, key: &Q) -> Option<&mut V>
    where
        K: Borrow<Q>,
        Q: ?Sized,
        C: KeyCompare<Q>,
    {
        let k = self.find_key(key);
        self.nodes.get_mut(k).map(|n| &mut n.value)
    }

    pub fn lookup_node<Q>(&self, key: &Q) -> Option<NodeHandle>
    where
        K: Borrow<Q>,
        Q: ?Sized,
        C: KeyCompare<Q>,
    {
        NodeHandle::from_raw(self.find_key(key))
    }

    /// The stored key alongside its value.
    pub fn lookup_extended<Q>(&self, key: &Q) -> Option<(&K, &V)>
    where
        K: Borrow<Q>,
        Q: ?Sized,
        C: KeyCompare<Q>,
    {
        self.nodes.get(self.find_key(key)).map(|n| (&n.key, &n.value))
    }

    pub fn contains<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: ?Sized,
        C: KeyCompare<Q>,
    {
        !self.find_key(key).is_null()
    }

    /// First node whose key is not less than `key`.
    pub fn lower_bound<Q>(&self, key: &Q) -> Option<NodeHandle>
    where
        K: Borrow<Q>,
        Q: ?Sized,
        C: KeyCompare<Q>,
    {
        self.bound(|c| c != Ordering::Less, key)
    }

    /// First node whose key is greater than `key`.
    pub fn upper_bound<Q>(&self, key: &Q) -> Option<NodeHandle>
    where
        K: Borrow<Q>,
        Q: ?Sized,
        C: KeyCompare<Q>,
    {
        self.bound(|c| c == Ordering::Greater, key)
    }

    fn bound<Q>(&self, accept: impl Fn(Ordering) -> bool, key: &Q) -> Option<NodeHandle>
    where
        K: Borrow<Q>,
        Q: ?Sized,
        C: KeyCompare<Q>,
    {
        let mut node = self.root;
        let mut result = DefaultKey::null();
        if node.is_null() {
            return None;
        }
        loop {
            let n = &self.nodes[node];
            if accept(self.compare.compare(<K as Borrow<Q>>::borrow(&n.key), key)) {
                result = node;
                if !n.left_child {
                    break;
                }
                node = n.left;
            } else {
                if !n.right_child {
                    break;
                }
                node = n.right;
            }
        }
        NodeHandle::from_raw(result)
    }
}

/// Double-ended in-order iterator over a `Tree`.
pub struct Iter<'a, K, V, C> {
    tree: &'a Tree<K, V, C>,
    front: DefaultKey,
    back: DefaultKey,
    remaining: usize,
}

impl<'a, K, V, C> Iterator for Iter<'a, K, V, C> {
    type Item = (&'a K, &'a V);

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }
        self.remaining -= 1;
        let node = self.front;
        self.front = self.tree.next_key(node);
        let n = &self.tree.nodes[node];
        Some((&n.key, &n.value))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<'a, K, V, C> DoubleEndedIterator for Iter<'a, K, V, C> {
    fn next_back(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }
        self.remaining -= 1;
        let node = self.back;
        self.back = self.tree.prev_key(node);
        let n = &self.tree.nodes[node];
        Some((&n.key, &n.value))
    }
}

impl<'a, K, V, C> ExactSizeIterator for Iter<'a, K, V, C> {}

impl<'a, K, V, C> IntoIterator for &'a Tree<K, V, C> {
    type Item = (&'a K, &'a V);
    type IntoIter = Iter<'a, K, V, C>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
