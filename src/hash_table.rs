//! HashTable: open addressing with tombstones and triangular probing.
//!
//! Every slot is `Unused`, a `Tombstone`, or `Occupied` with the key's
//! 32-bit hash cached next to it. Probing starts at `hash % modulus`,
//! where `modulus` is the largest prime below the power-of-two capacity,
//! and then walks with a growing step (`+1, +2, +3, ...`) masked to the
//! capacity, which visits every slot of a power-of-two table.

use crate::error::{precondition, Error};
use crate::hash_table_iter::{Iter, IterMut, Keys, Values};
use crate::notify::{DestroyNotify, Destroyers};
use core::borrow::Borrow;
use core::hash::{BuildHasher, Hash};
use core::mem;
use hashbrown::hash_map::DefaultHashBuilder;

const MIN_SHIFT: u32 = 3;
const MAX_SHIFT: u32 = 31;

// Hash values 0 and 1 are the unused/tombstone sentinels in the classic
// encoding; real hashes are coerced out of that range so the cached hash
// of an occupied slot is always >= 2.
const FIRST_REAL_HASH: u32 = 2;

/// Largest prime below `1 << shift`, indexed by shift.
static PRIME_MOD: [u32; 32] = [
    1, // For 1 << 0
    2, 3, 7, 13, 31, 61, 127, 251, 509, 1021, 2039, 4093, 8191, 16381, 32749,
    65521, // For 1 << 16
    131071, 262139, 524287, 1048573, 2097143, 4194301, 8388593, 16777213, 33554393, 67108859,
    134217689, 268435399, 536870909, 1073741789, 2147483647, // For 1 << 31
];

#[derive(Debug)]
pub(crate) enum Slot<K, V> {
    Unused,
    Tombstone,
    Occupied { hash: u32, key: K, value: V },
}

impl<K, V> Slot<K, V> {
    #[inline]
    fn is_unused(&self) -> bool {
        matches!(self, Slot::Unused)
    }
}

fn alloc_slots<K, V>(size: usize) -> Box<[Slot<K, V>]> {
    core::iter::repeat_with(|| Slot::Unused).take(size).collect()
}

/// Number of bits needed to represent `n`.
fn closest_shift(mut n: usize) -> u32 {
    let mut i = 0;
    while n != 0 {
        n >>= 1;
        i += 1;
    }
    i
}

pub struct HashTable<K, V, S = DefaultHashBuilder> {
    pub(crate) slots: Box<[Slot<K, V>]>,
    modulus: usize,
    mask: usize,
    min_shift: u32,
    pub(crate) nnodes: usize,
    // live entries plus tombstones
    noccupied: usize,
    hasher: S,
    destroy: Destroyers<K, V>,
}

impl<K, V> HashTable<K, V>
where
    K: Eq + Hash,
{
    pub fn new() -> Self {
        Self::with_hasher(Default::default())
    }

    /// Create a table whose capacity never shrinks below what `capacity`
    /// entries need.
    pub fn with_capacity(capacity: usize) -> Self {
        Self::with_capacity_and_hasher(capacity, Default::default())
    }
}

impl<K, V> Default for HashTable<K, V>
where
    K: Eq + Hash,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V, S> HashTable<K, V, S> {
    fn set_shift(&mut self, shift: u32) {
        assert!(shift <= MAX_SHIFT, "hash table capacity overflow");
        let size = 1usize << shift;
        self.modulus = PRIME_MOD[shift as usize] as usize;
        self.mask = size - 1;
    }

    fn set_shift_from_size(&mut self, size: usize) {
        let shift = closest_shift(size).max(self.min_shift);
        self.set_shift(shift);
    }

    /// Number of slots (always a power of two).
    #[inline]
    pub fn capacity(&self) -> usize {
        self.mask + 1
    }

    /// Live entries plus tombstones.
    #[inline]
    pub fn occupied(&self) -> usize {
        self.noccupied
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.nnodes
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.nnodes == 0
    }

    /// Register a callback that receives every key the table destroys.
    pub fn with_key_destroy<F>(mut self, f: F) -> Self
    where
        F: Fn(K) + Send + Sync + 'static,
    {
        let boxed: DestroyNotify<K> = Box::new(f);
        let value = mem::replace(&mut self.destroy, Destroyers::none()).into_value();
        self.destroy = Destroyers::new(Some(boxed), value);
        self
    }

    /// Register a callback that receives every value the table destroys.
    pub fn with_value_destroy<F>(mut self, f: F) -> Self
    where
        F: Fn(V) + Send + Sync + 'static,
    {
        let boxed: DestroyNotify<V> = Box::new(f);
        let key = mem::replace(&mut self.destroy, Destroyers::none()).into_key();
        self.destroy = Destroyers::new(key, Some(boxed));
        self
    }

    fn resize(&mut self) {
        let old_size = self.capacity();
        self.set_shift_from_size(self.nnodes * 2);
        let size = self.capacity();
        let old = mem::replace(&mut self.slots, alloc_slots(size));

        for slot in old.into_vec() {
            let Slot::Occupied { hash, key, value } = slot else {
                continue;
            };
            // Fresh storage has no tombstones: stop at the first unused slot.
            let mut index = hash as usize % self.modulus;
            let mut step = 0;
            while !self.slots[index].is_unused() {
                step += 1;
                index = (index + step) & self.mask;
            }
            self.slots[index] = Slot::Occupied { hash, key, value };
        }

        self.noccupied = self.nnodes;
        tracing::trace!(old_size, new_size = size, nnodes = self.nnodes, "hash table resized");
    }

    fn maybe_resize(&mut self) {
        let noccupied = self.noccupied;
        let size = self.capacity();
        if (size > self.nnodes * 4 && size > 1 << self.min_shift)
            || size <= noccupied + noccupied / 16
        {
            self.resize();
        }
    }

    /// Turn slot `index` into a tombstone and hand back its entry.
    pub(crate) fn remove_node(&mut self, index: usize) -> (K, V) {
        let Slot::Occupied { key, value, .. } =
            mem::replace(&mut self.slots[index], Slot::Tombstone)
        else {
            unreachable!("remove_node on a slot that holds no entry");
        };
        self.nnodes -= 1;
        (key, value)
    }

    pub(crate) fn notify_entry(&self, key: K, value: V) {
        self.destroy.entry(key, value);
    }

    /// Swap the value stored in an occupied slot, destroying the old one.
    pub(crate) fn replace_value_at(&mut self, index: usize, new_value: V) {
        let old = match &mut self.slots[index] {
            Slot::Occupied { value, .. } => mem::replace(value, new_value),
            _ => unreachable!("replace_value_at on a slot that holds no entry"),
        };
        self.destroy.value(old);
    }

    fn remove_all_nodes(&mut self) {
        if self.nnodes == 0 {
            return;
        }
        self.nnodes = 0;
        self.noccupied = 0;

        if self.destroy.is_empty() {
            self.slots.iter_mut().for_each(|s| *s = Slot::Unused);
            return;
        }

        // Detach the old storage first so the table is consistent while
        // notifiers run.
        self.set_shift(self.min_shift);
        let size = self.capacity();
        let old = mem::replace(&mut self.slots, alloc_slots(size));
        for slot in old.into_vec() {
            if let Slot::Occupied { key, value, .. } = slot {
                self.destroy.entry(key, value);
            }
        }
    }

    /// Remove every entry, passing keys and values to the notifiers.
    pub fn remove_all(&mut self) {
        tracing::trace!(nnodes = self.nnodes, "hash table remove_all");
        self.remove_all_nodes();
        self.maybe_resize();
        self.debug_audit();
    }

    /// Remove every entry without notifying; the entries are returned.
    pub fn steal_all(&mut self) -> Vec<(K, V)> {
        tracing::trace!(nnodes = self.nnodes, "hash table steal_all");
        let mut out = Vec::with_capacity(self.nnodes);
        for slot in self.slots.iter_mut() {
            if let Slot::Occupied { key, value, .. } = mem::replace(slot, Slot::Unused) {
                out.push((key, value));
            }
        }
        self.nnodes = 0;
        self.noccupied = 0;
        self.maybe_resize();
        self.debug_audit();
        out
    }

    /// Call `f` on every entry, in slot order.
    pub fn foreach<F>(&self, mut f: F)
    where
        F: FnMut(&K, &V),
    {
        for (k, v) in self.iter() {
            f(k, v);
        }
    }

    /// First value whose entry satisfies `predicate`, in slot order.
    pub fn find<F>(&self, mut predicate: F) -> Option<&V>
    where
        F: FnMut(&K, &V) -> bool,
    {
        self.iter().find(|&(k, v)| predicate(k, v)).map(|(_, v)| v)
    }

    fn foreach_remove_or_steal<F, G>(&mut self, mut predicate: F, mut sink: G) -> usize
    where
        F: FnMut(&K, &V) -> bool,
        G: FnMut(&Self, K, V),
    {
        let mut deleted = 0;
        for i in 0..self.capacity() {
            let hit = match &self.slots[i] {
                Slot::Occupied { key, value, .. } => predicate(key, value),
                _ => false,
            };
            if hit {
                let (k, v) = self.remove_node(i);
                sink(&*self, k, v);
                deleted += 1;
            }
        }
        self.maybe_resize();
        self.debug_audit();
        deleted
    }

    /// Remove (and destroy) every entry matching `predicate`. Returns the
    /// number removed.
    pub fn foreach_remove<F>(&mut self, predicate: F) -> usize
    where
        F: FnMut(&K, &V) -> bool,
    {
        self.foreach_remove_or_steal(predicate, |t, k, v| t.notify_entry(k, v))
    }

    /// Remove every entry matching `predicate` without notifying; the
    /// entries are returned.
    pub fn foreach_steal<F>(&mut self, predicate: F) -> Vec<(K, V)>
    where
        F: FnMut(&K, &V) -> bool,
    {
        let mut out = Vec::new();
        self.foreach_remove_or_steal(predicate, |_, k, v| out.push((k, v)));
        out
    }

    pub fn iter(&self) -> Iter<'_, K, V> {
        Iter::new(&self.slots, self.nnodes)
    }

    pub fn iter_mut(&mut self) -> IterMut<'_, K, V> {
        IterMut::new(&mut self.slots, self.nnodes)
    }

    pub fn keys(&self) -> Keys<'_, K, V> {
        Keys { inner: self.iter() }
    }

    pub fn values(&self) -> Values<'_, K, V> {
        Values { inner: self.iter() }
    }

    /// Snapshot of the keys, in slot order.
    pub fn get_keys(&self) -> Vec<&K> {
        self.keys().collect()
    }

    /// Snapshot of the values, in slot order.
    pub fn get_values(&self) -> Vec<&V> {
        self.values().collect()
    }

    /// Validate slot bookkeeping. Panics on a broken count.
    #[cfg_attr(not(any(test, feature = "debug-checks")), allow(dead_code))]
    pub(crate) fn audit(&self) {
        let mut live = 0;
        let mut tombstones = 0;
        for slot in self.slots.iter() {
            match slot {
                Slot::Unused => {}
                Slot::Tombstone => tombstones += 1,
                Slot::Occupied { hash, .. } => {
                    assert!(*hash >= FIRST_REAL_HASH, "sentinel hash in occupied slot");
                    live += 1;
                }
            }
        }
        assert_eq!(live, self.nnodes, "nnodes out of sync");
        assert_eq!(live + tombstones, self.noccupied, "noccupied out of sync");
        assert!(self.slots.len().is_power_of_two());
        assert!(self.noccupied < self.slots.len(), "no unused slot left");
    }

    #[inline]
    fn debug_audit(&self) {
        #[cfg(feature = "debug-checks")]
        self.audit();
    }
}

impl<K, V, S> HashTable<K, V, S>
where
    K: Eq + Hash,
    S: BuildHasher,
{
    pub fn with_hasher(hasher: S) -> Self {
        Self::with_capacity_and_hasher(0, hasher)
    }

    pub fn with_capacity_and_hasher(capacity: usize, hasher: S) -> Self {
        let mut t = Self {
            slots: Box::new([]),
            modulus: 1,
            mask: 0,
            min_shift: MIN_SHIFT,
            nnodes: 0,
            noccupied: 0,
            hasher,
            destroy: Destroyers::none(),
        };
        // Room for `capacity` entries at the post-resize load factor.
        t.min_shift = closest_shift(capacity * 2).max(MIN_SHIFT);
        t.set_shift(t.min_shift);
        t.slots = alloc_slots(t.capacity());
        t
    }

    /// 64-bit hasher output folded to 32 bits, kept out of the sentinel range.
    fn make_hash<Q>(&self, q: &Q) -> u32
    where
        Q: ?Sized + Hash,
    {
        let h = self.hasher.hash_one(q);
        let h = (h ^ (h >> 32)) as u32;
        if h < FIRST_REAL_HASH {
            FIRST_REAL_HASH
        } else {
            h
        }
    }

    /// Find the slot holding `q`, or the slot an insert of `q` should use:
    /// the first tombstone on the probe path if there was one, else the
    /// unused slot that ended the probe.
    fn lookup_node<Q>(&self, q: &Q) -> (usize, u32)
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        let hash = self.make_hash(q);
        let mut index = hash as usize % self.modulus;
        let mut step = 0;
        let mut first_tombstone = None;

        loop {
            match &self.slots[index] {
                Slot::Unused => break,
                // Compare cached hashes first; `Eq` only runs on a match.
                Slot::Occupied { hash: h, key, .. } => {
                    if *h == hash && <K as Borrow<Q>>::borrow(key) == q {
                        return (index, hash);
                    }
                }
                Slot::Tombstone => {
                    if first_tombstone.is_none() {
                        first_tombstone = Some(index);
                    }
                }
            }
            step += 1;
            index = (index + step) & self.mask;
        }

        (first_tombstone.unwrap_or(index), hash)
    }

    fn insert_node(
        &mut self,
        index: usize,
        hash: u32,
        key: K,
        value: V,
        keep_new_key: bool,
    ) -> bool {
        if let Slot::Occupied {
            key: old_key,
            value: old_value,
            ..
        } = &mut self.slots[index]
        {
            let value_to_free = mem::replace(old_value, value);
            let key_to_free = if keep_new_key {
                mem::replace(old_key, key)
            } else {
                key
            };
            // The write is committed; notifiers see a consistent table.
            self.destroy.key(key_to_free);
            self.destroy.value(value_to_free);
            return false;
        }

        let slot = &mut self.slots[index];
        let was_unused = slot.is_unused();
        *slot = Slot::Occupied { hash, key, value };
        self.nnodes += 1;
        if was_unused {
            self.noccupied += 1;
            self.maybe_resize();
        }
        true
    }

    fn insert_internal(&mut self, key: K, value: V, keep_new_key: bool) -> bool {
        let (index, hash) = self.lookup_node(&key);
        let inserted = self.insert_node(index, hash, key, value, keep_new_key);
        self.debug_audit();
        inserted
    }

    /// Insert `key -> value`. On an existing key the stored key is kept,
    /// the passed key and the old value are destroyed. Returns whether the
    /// key was new.
    pub fn insert(&mut self, key: K, value: V) -> bool {
        self.insert_internal(key, value, false)
    }

    /// Like `insert`, but on an existing key the passed key replaces the
    /// stored one (the old key is destroyed instead).
    pub fn replace(&mut self, key: K, value: V) -> bool {
        self.insert_internal(key, value, true)
    }

    pub fn lookup<Q>(&self, q: &Q) -> Option<&V>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        let (index, _) = self.lookup_node(q);
        match &self.slots[index] {
            Slot::Occupied { value, .. } => Some(value),
            _ => None,
        }
    }

    pub fn lookup_mut<Q>(&mut self, q: &Q) -> Option<&mut V>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        let (index, _) = self.lookup_node(q);
        match &mut self.slots[index] {
            Slot::Occupied { value, .. } => Some(value),
            _ => None,
        }
    }

    /// Look up the stored key together with its value.
    pub fn lookup_extended<Q>(&self, q: &Q) -> Option<(&K, &V)>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        let (index, _) = self.lookup_node(q);
        match &self.slots[index] {
            Slot::Occupied { key, value, .. } => Some((key, value)),
            _ => None,
        }
    }

    pub fn contains<Q>(&self, q: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        let (index, _) = self.lookup_node(q);
        matches!(self.slots[index], Slot::Occupied { .. })
    }

    fn remove_internal<Q>(&mut self, q: &Q) -> Option<(K, V)>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        let (index, _) = self.lookup_node(q);
        if !matches!(self.slots[index], Slot::Occupied { .. }) {
            return None;
        }
        let entry = self.remove_node(index);
        self.maybe_resize();
        self.debug_audit();
        Some(entry)
    }

    /// Remove `q`, destroying its key and value. Returns whether it was present.
    pub fn remove<Q>(&mut self, q: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        match self.remove_internal(q) {
            Some((k, v)) => {
                self.destroy.entry(k, v);
                true
            }
            None => false,
        }
    }

    /// Remove `q` without notifying and hand its entry back.
    pub fn steal<Q>(&mut self, q: &Q) -> Option<(K, V)>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        self.remove_internal(q)
    }

    /// Positioned cursor supporting removal and replacement at the
    /// current entry.
    pub fn cursor(&mut self) -> Cursor<'_, K, V, S> {
        Cursor {
            table: self,
            position: None,
        }
    }
}

impl<K, S> HashTable<K, K, S>
where
    K: Eq + Hash + Clone,
    S: BuildHasher,
{
    /// Set-style insert: the key is stored as its own value, with
    /// `replace` semantics.
    pub fn add(&mut self, key: K) -> bool {
        let value = key.clone();
        self.insert_internal(key, value, true)
    }
}

impl<K, V, S> Drop for HashTable<K, V, S> {
    fn drop(&mut self) {
        if self.destroy.is_empty() || self.nnodes == 0 {
            return;
        }
        let old = mem::take(&mut self.slots);
        self.nnodes = 0;
        self.noccupied = 0;
        for slot in old.into_vec() {
            if let Slot::Occupied { key, value, .. } = slot {
                self.destroy.entry(key, value);
            }
        }
    }
}

impl<K, V, S> core::fmt::Debug for HashTable<K, V, S>
where
    K: core::fmt::Debug,
    V: core::fmt::Debug,
{
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}

impl<K, V, S> Extend<(K, V)> for HashTable<K, V, S>
where
    K: Eq + Hash,
    S: BuildHasher,
{
    fn extend<I: IntoIterator<Item = (K, V)>>(&mut self, iter: I) {
        for (k, v) in iter {
            self.insert(k, v);
        }
    }
}

impl<K, V, S> FromIterator<(K, V)> for HashTable<K, V, S>
where
    K: Eq + Hash,
    S: BuildHasher + Default,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut t = Self::with_hasher(S::default());
        t.extend(iter);
        t
    }
}

/// Cursor over a table's slots in slot order.
///
/// Starts before the first entry. `remove`, `steal` and `replace` act on
/// the current entry and never resize the table, so the walk can continue
/// after them.
pub struct Cursor<'a, K, V, S> {
    table: &'a mut HashTable<K, V, S>,
    position: Option<usize>,
}

impl<'a, K, V, S> Cursor<'a, K, V, S> {
    /// Advance to the next entry. Returns `false` once past the end.
    pub fn move_next(&mut self) -> bool {
        let size = self.table.capacity();
        let mut pos = match self.position {
            Some(p) if p >= size => return false,
            Some(p) => p + 1,
            None => 0,
        };
        while pos < size && !matches!(self.table.slots[pos], Slot::Occupied { .. }) {
            pos += 1;
        }
        self.position = Some(pos);
        pos < size
    }

    fn current(&self, op: &'static str) -> Result<usize, Error> {
        match self.position {
            Some(p) if p < self.table.capacity() => match self.table.slots[p] {
                Slot::Occupied { .. } => Ok(p),
                _ => Err(precondition(op, Error::EntryGone)),
            },
            _ => Err(precondition(op, Error::CursorNotPositioned)),
        }
    }

    pub fn key(&self) -> Result<&K, Error> {
        let p = self.current("cursor key")?;
        match &self.table.slots[p] {
            Slot::Occupied { key, .. } => Ok(key),
            _ => unreachable!(),
        }
    }

    pub fn value(&self) -> Result<&V, Error> {
        let p = self.current("cursor value")?;
        match &self.table.slots[p] {
            Slot::Occupied { value, .. } => Ok(value),
            _ => unreachable!(),
        }
    }

    pub fn value_mut(&mut self) -> Result<&mut V, Error> {
        let p = self.current("cursor value_mut")?;
        match &mut self.table.slots[p] {
            Slot::Occupied { value, .. } => Ok(value),
            _ => unreachable!(),
        }
    }

    /// Remove the current entry, destroying its key and value.
    pub fn remove(&mut self) -> Result<(), Error> {
        let p = self.current("cursor remove")?;
        let (k, v) = self.table.remove_node(p);
        self.table.notify_entry(k, v);
        Ok(())
    }

    /// Remove the current entry without notifying and return it.
    pub fn steal(&mut self) -> Result<(K, V), Error> {
        let p = self.current("cursor steal")?;
        Ok(self.table.remove_node(p))
    }

    /// Replace the current value, destroying the old one. The key is kept.
    pub fn replace(&mut self, value: V) -> Result<(), Error> {
        let p = self.current("cursor replace")?;
        self.table.replace_value_at(p, value);
        Ok(())
    }

    pub fn table(&self) -> &HashTable<K, V, S> {
        &*self.table
    }
}
