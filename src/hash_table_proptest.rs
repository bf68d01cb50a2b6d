#![cfg(test)]

// Property tests for HashTable kept inside the crate so the slot audit
// can run after every operation.

use crate::hash_table::HashTable;
use proptest::prelude::*;
use std::collections::{BTreeMap, HashMap};
use std::hash::{BuildHasher, Hasher};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

// Pool-indexed operations: indices shrink toward earlier keys, and the
// pool and op list shrink in length.
#[derive(Clone, Debug)]
enum Op {
    Insert(usize, i32),
    Replace(usize, i32),
    Remove(usize),
    Steal(usize),
    Lookup(usize),
    Contains(String),
    Mutate(usize, i32),
    RemoveOver(i32),
    Iterate,
}

fn arb_scenario() -> impl Strategy<Value = (Vec<String>, Vec<Op>)> {
    proptest::collection::vec("[a-z]{0,5}", 1..=24).prop_flat_map(|pool| {
        let idxs: Vec<usize> = (0..pool.len()).collect();
        let idx = proptest::sample::select(idxs);
        let op = prop_oneof![
            4 => (idx.clone(), any::<i32>()).prop_map(|(i, v)| Op::Insert(i, v)),
            1 => (idx.clone(), any::<i32>()).prop_map(|(i, v)| Op::Replace(i, v)),
            2 => idx.clone().prop_map(Op::Remove),
            1 => idx.clone().prop_map(Op::Steal),
            1 => idx.clone().prop_map(Op::Lookup),
            1 => "[a-z]{0,5}".prop_map(Op::Contains),
            1 => (idx.clone(), -100i32..100).prop_map(|(i, d)| Op::Mutate(i, d)),
            1 => any::<i32>().prop_map(Op::RemoveOver),
            1 => Just(Op::Iterate),
        ];
        proptest::collection::vec(op, 1..120).prop_map(move |ops| (pool.clone(), ops))
    })
}

fn run_scenario<S: BuildHasher>(
    hasher: S,
    pool: Vec<String>,
    ops: Vec<Op>,
) -> Result<(), TestCaseError> {
    let destroyed = Arc::new(AtomicUsize::new(0));
    let counter = destroyed.clone();
    let mut sut: HashTable<String, i32, S> = HashTable::with_hasher(hasher)
        .with_value_destroy(move |_: i32| {
            counter.fetch_add(1, Ordering::Relaxed);
        });
    let mut model: HashMap<String, i32> = HashMap::new();
    let mut expect_destroyed = 0usize;

    for op in ops {
        match op {
            Op::Insert(i, v) => {
                let k = pool[i].clone();
                let existed = model.insert(k.clone(), v).is_some();
                prop_assert_eq!(sut.insert(k, v), !existed);
                expect_destroyed += existed as usize;
            }
            Op::Replace(i, v) => {
                let k = pool[i].clone();
                let existed = model.insert(k.clone(), v).is_some();
                prop_assert_eq!(sut.replace(k, v), !existed);
                expect_destroyed += existed as usize;
            }
            Op::Remove(i) => {
                let k = pool[i].as_str();
                let existed = model.remove(k).is_some();
                prop_assert_eq!(sut.remove(k), existed);
                expect_destroyed += existed as usize;
            }
            Op::Steal(i) => {
                let k = pool[i].as_str();
                let got = sut.steal(k);
                let want = model.remove(k).map(|v| (k.to_string(), v));
                prop_assert_eq!(got, want);
            }
            Op::Lookup(i) => {
                let k = pool[i].as_str();
                prop_assert_eq!(sut.lookup(k), model.get(k));
                prop_assert_eq!(
                    sut.lookup_extended(k).map(|(k, _)| k.as_str()),
                    model.get_key_value(k).map(|(k, _)| k.as_str())
                );
            }
            Op::Contains(s) => {
                prop_assert_eq!(sut.contains(s.as_str()), model.contains_key(&s));
            }
            Op::Mutate(i, d) => {
                let k = pool[i].as_str();
                if let Some(v) = sut.lookup_mut(k) {
                    *v = v.wrapping_add(d);
                }
                if let Some(v) = model.get_mut(k) {
                    *v = v.wrapping_add(d);
                }
            }
            Op::RemoveOver(t) => {
                let before = model.len();
                model.retain(|_, v| *v <= t);
                let n = sut.foreach_remove(|_, v| *v > t);
                prop_assert_eq!(n, before - model.len());
                expect_destroyed += n;
            }
            Op::Iterate => {
                let s: BTreeMap<_, _> = sut.iter().map(|(k, v)| (k.clone(), *v)).collect();
                let m: BTreeMap<_, _> = model.iter().map(|(k, v)| (k.clone(), *v)).collect();
                prop_assert_eq!(s, m);
            }
        }

        // Post-conditions after each op
        sut.audit();
        prop_assert_eq!(sut.len(), model.len());
        prop_assert_eq!(sut.is_empty(), model.is_empty());
        prop_assert!(sut.occupied() < sut.capacity());
        prop_assert_eq!(destroyed.load(Ordering::Relaxed), expect_destroyed);
    }

    let remaining = sut.len();
    drop(sut);
    prop_assert_eq!(destroyed.load(Ordering::Relaxed), expect_destroyed + remaining);
    Ok(())
}

// Property: state-machine equivalence against std::collections::HashMap.
// - insert/replace report novelty and overwrite like the model.
// - remove notifies, steal hands back the owned pair without notifying.
// - Slot bookkeeping stays exact and at least one slot stays unused.
// - Every destroyed value is accounted for, including teardown.
proptest! {
    #![proptest_config(ProptestConfig { cases: 64, .. ProptestConfig::default() })]
    #[test]
    fn prop_state_machine((pool, ops) in arb_scenario()) {
        run_scenario(hashbrown::hash_map::DefaultHashBuilder::default(), pool, ops)?;
    }

    #[test]
    fn prop_state_machine_djb2((pool, ops) in arb_scenario()) {
        run_scenario(crate::hash::BuildStrHasher::default(), pool, ops)?;
    }
}

// Collision variant using a constant hasher: every key shares one probe
// sequence, so equality alone separates entries.
#[derive(Clone, Default)]
struct ConstBuildHasher;
struct ConstHasher;
impl BuildHasher for ConstBuildHasher {
    type Hasher = ConstHasher;
    fn build_hasher(&self) -> Self::Hasher {
        ConstHasher
    }
}
impl Hasher for ConstHasher {
    fn write(&mut self, _bytes: &[u8]) {}
    fn finish(&self) -> u64 {
        0
    }
}

proptest! {
    #![proptest_config(ProptestConfig { cases: 32, .. ProptestConfig::default() })]
    #[test]
    fn prop_state_machine_collisions((pool, ops) in arb_scenario()) {
        run_scenario(ConstBuildHasher, pool, ops)?;
    }
}
