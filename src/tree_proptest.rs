#![cfg(test)]

// Property tests for Tree: every operation is mirrored into a BTreeMap
// and the full structural check runs after each step.

use crate::tree::{NodeHandle, Tree};
use proptest::prelude::*;
use std::collections::{BTreeMap, HashMap};
use std::ops::Bound;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

#[derive(Clone, Debug)]
enum Op {
    Insert(u16, i32),
    Replace(u16, i32),
    Remove(u16),
    Steal(u16),
    Lookup(u16),
    LowerBound(u16),
    UpperBound(u16),
    Walk,
}

fn arb_ops() -> impl Strategy<Value = Vec<Op>> {
    // A narrow key space keeps hits and duplicates frequent.
    let key = 0u16..256;
    let op = prop_oneof![
        5 => (key.clone(), any::<i32>()).prop_map(|(k, v)| Op::Insert(k, v)),
        1 => (key.clone(), any::<i32>()).prop_map(|(k, v)| Op::Replace(k, v)),
        3 => key.clone().prop_map(Op::Remove),
        1 => key.clone().prop_map(Op::Steal),
        1 => key.clone().prop_map(Op::Lookup),
        1 => key.clone().prop_map(Op::LowerBound),
        1 => key.clone().prop_map(Op::UpperBound),
        1 => Just(Op::Walk),
    ];
    proptest::collection::vec(op, 1..300)
}

fn handle_key(t: &Tree<u16, i32>, h: Option<NodeHandle>) -> Option<u16> {
    h.and_then(|h| h.key(t).copied())
}

// Property: Tree behaves like BTreeMap under random operation sequences.
// - Ordering, AVL balance, stored balance factors and threads hold after
//   every mutation.
// - Handles of surviving nodes stay valid; removed nodes' handles go stale.
// - Height stays within the AVL bound.
// - Each overwritten or removed value reaches the notifier exactly once.
proptest! {
    #![proptest_config(ProptestConfig { cases: 64, .. ProptestConfig::default() })]
    #[test]
    fn prop_tree_matches_btreemap(ops in arb_ops()) {
        let destroyed = Arc::new(AtomicUsize::new(0));
        let counter = destroyed.clone();
        let mut sut: Tree<u16, i32> = Tree::new().with_value_destroy(move |_: i32| {
            counter.fetch_add(1, Ordering::Relaxed);
        });
        let mut model: BTreeMap<u16, i32> = BTreeMap::new();
        let mut handles: HashMap<u16, NodeHandle> = HashMap::new();
        let mut stale: Vec<NodeHandle> = Vec::new();
        let mut expect_destroyed = 0usize;

        for op in ops {
            match op {
                Op::Insert(k, v) => {
                    let existed = model.insert(k, v).is_some();
                    let h = sut.insert_node(k, v);
                    if existed {
                        prop_assert_eq!(Some(&h), handles.get(&k), "overwrite keeps the node");
                        expect_destroyed += 1;
                    } else {
                        handles.insert(k, h);
                    }
                }
                Op::Replace(k, v) => {
                    let existed = model.insert(k, v).is_some();
                    let h = sut.replace_node(k, v);
                    expect_destroyed += existed as usize;
                    handles.insert(k, h);
                }
                Op::Remove(k) => {
                    let existed = model.remove(&k).is_some();
                    prop_assert_eq!(sut.remove(&k), existed);
                    expect_destroyed += existed as usize;
                    if let Some(h) = handles.remove(&k) {
                        stale.push(h);
                    }
                }
                Op::Steal(k) => {
                    let want = model.remove(&k).map(|v| (k, v));
                    prop_assert_eq!(sut.steal(&k), want);
                    if let Some(h) = handles.remove(&k) {
                        stale.push(h);
                    }
                }
                Op::Lookup(k) => {
                    prop_assert_eq!(sut.lookup(&k), model.get(&k));
                    prop_assert_eq!(sut.contains(&k), model.contains_key(&k));
                }
                Op::LowerBound(k) => {
                    let want = model.range(k..).next().map(|(k, _)| *k);
                    prop_assert_eq!(handle_key(&sut, sut.lower_bound(&k)), want);
                }
                Op::UpperBound(k) => {
                    let want = model
                        .range((Bound::Excluded(k), Bound::Unbounded))
                        .next()
                        .map(|(k, _)| *k);
                    prop_assert_eq!(handle_key(&sut, sut.upper_bound(&k)), want);
                }
                Op::Walk => {
                    let fwd: Vec<(u16, i32)> = sut.iter().map(|(k, v)| (*k, *v)).collect();
                    let want: Vec<(u16, i32)> = model.iter().map(|(k, v)| (*k, *v)).collect();
                    prop_assert_eq!(&fwd, &want);
                    let back: Vec<u16> = sut.keys().rev().copied().collect();
                    let want_back: Vec<u16> = model.keys().rev().copied().collect();
                    prop_assert_eq!(back, want_back);
                }
            }

            // Post-conditions after each op
            sut.check_invariants();
            prop_assert_eq!(sut.nnodes(), model.len());
            let bound = 1.45 * ((model.len() + 2) as f64).log2();
            prop_assert!(sut.height() as f64 <= bound);
            for (k, h) in &handles {
                prop_assert_eq!(h.key(&sut), Some(k));
            }
            for h in &stale {
                prop_assert!(h.value(&sut).is_none());
            }
            prop_assert_eq!(destroyed.load(Ordering::Relaxed), expect_destroyed);
        }

        let remaining = sut.len();
        drop(sut);
        prop_assert_eq!(destroyed.load(Ordering::Relaxed), expect_destroyed + remaining);
    }
}
