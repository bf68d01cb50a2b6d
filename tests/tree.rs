// Tree public API suite.
//
// Invariants exercised:
// - Order: iteration, traversal and navigation follow the comparator,
//   including closure comparators that capture state.
// - Balance: check_invariants holds through bulk insert/remove.
// - Handles: survive unrelated removals, go stale on their own removal.
use std::cmp::Ordering;
use std::sync::{Arc, Mutex};
use sys_collections::{TraverseType, Tree};

// Test: string keys queried through &str.
// Verifies: lookups, bounds and removal accept the borrowed key form.
#[test]
fn string_keys_with_borrowed_queries() {
    let mut t: Tree<String, u32> = Tree::new();
    for (i, w) in ["kiwi", "apple", "mango", "fig"].iter().enumerate() {
        t.insert(w.to_string(), i as u32);
    }
    assert_eq!(t.lookup("mango"), Some(&2));
    assert!(t.contains("fig"));
    assert!(!t.contains("pear"));
    assert_eq!(t.lookup_extended("apple").map(|(k, _)| k.as_str()), Some("apple"));
    *t.lookup_mut("kiwi").unwrap() += 10;
    assert_eq!(t.lookup_node("kiwi").and_then(|h| h.value(&t).copied()), Some(10));
    let lb = t.lower_bound("b").and_then(|h| h.key(&t).cloned());
    assert_eq!(lb.as_deref(), Some("fig"));
    let ub = t.upper_bound("kiwi").and_then(|h| h.key(&t).cloned());
    assert_eq!(ub.as_deref(), Some("mango"));
    assert!(t.remove("fig"));
    assert_eq!(t.steal("apple"), Some(("apple".to_string(), 1)));
    assert_eq!(t.len(), 2);
    t.check_invariants();
}

// Test: a closure comparator ordering strings by length, then content.
#[test]
fn custom_comparator_orders_keys() {
    let mut t = Tree::with_compare(|a: &String, b: &String| {
        a.len().cmp(&b.len()).then_with(|| a.cmp(b))
    });
    for w in ["pear", "fig", "banana", "kiwi", "apple", "date"] {
        t.insert(w.to_string(), w.len());
    }
    let keys: Vec<&str> = t.keys().map(String::as_str).collect();
    assert_eq!(keys, vec!["fig", "date", "kiwi", "pear", "apple", "banana"]);
    t.check_invariants();
}

// Test: comparator capturing context (descending order toggle).
#[test]
fn comparator_with_captured_context() {
    let descending = true;
    let mut t = Tree::with_compare(move |a: &i32, b: &i32| {
        if descending {
            b.cmp(a)
        } else {
            a.cmp(b)
        }
    });
    t.extend((0..10).map(|k| (k, ())));
    let keys: Vec<i32> = t.keys().copied().collect();
    assert_eq!(keys, (0..10).rev().collect::<Vec<_>>());
    assert_eq!(t.first().and_then(|h| h.key(&t).copied()), Some(9));
}

// Test: bulk load then interleaved removal.
// Verifies: invariants after every step, contents match a reference.
#[test]
fn bulk_insert_and_remove_keep_invariants() {
    let mut t = Tree::new();
    let mut s: u64 = 7;
    let mut reference = std::collections::BTreeMap::new();
    for _ in 0..2_000 {
        s = s.wrapping_mul(6364136223846793005).wrapping_add(1);
        let k = (s >> 33) % 5_000;
        t.insert(k, s);
        reference.insert(k, s);
    }
    t.check_invariants();
    for k in (0..5_000u64).step_by(2) {
        assert_eq!(t.remove(&k), reference.remove(&k).is_some());
    }
    t.check_invariants();
    assert_eq!(t.len(), reference.len());
    assert!(t.iter().map(|(k, v)| (*k, *v)).eq(reference.into_iter()));
}

// Test: handles of untouched nodes survive restructuring.
#[test]
fn handles_survive_rebalancing() {
    let mut t = Tree::new();
    let handles: Vec<_> = (0..64).map(|k| (k, t.insert_node(k, k * 10))).collect();
    for k in (0..64).filter(|k| k % 3 == 0) {
        t.remove(&k);
    }
    for (k, h) in handles {
        if k % 3 == 0 {
            assert_eq!(h.key(&t), None);
        } else {
            assert_eq!(h.value(&t), Some(&(k * 10)));
        }
    }
}

// Test: traversal orders on a rotated tree.
#[test]
fn traversal_after_rotations() {
    let t: Tree<i32, ()> = (1..=7).map(|k| (k, ())).collect();
    let mut pre = Vec::new();
    t.traverse(TraverseType::PreOrder, |k, _| {
        pre.push(*k);
        false
    });
    assert_eq!(pre, vec![4, 2, 1, 3, 6, 5, 7]);
    let mut level = Vec::new();
    t.traverse(TraverseType::LevelOrder, |k, _| {
        level.push(*k);
        false
    });
    assert_eq!(level, vec![4, 2, 6, 1, 3, 5, 7]);
    assert_eq!(t.height(), 3);
}

// Test: range scan from lower_bound with next.
#[test]
fn range_scan_via_bounds() {
    let t: Tree<u32, ()> = (0..100).step_by(5).map(|k| (k, ())).collect();
    let mut out = Vec::new();
    let mut cur = t.lower_bound(&12);
    let end = t.upper_bound(&40);
    while cur != end {
        let Some(h) = cur else { break };
        out.push(*h.key(&t).unwrap());
        cur = t.next(h);
    }
    assert_eq!(out, vec![15, 20, 25, 30, 35, 40]);
}

// Test: search with a closure that only understands a key prefix.
#[test]
fn search_by_key_prefix() {
    let t: Tree<(u8, u8), &str> =
        [((1, 1), "a"), ((2, 5), "b"), ((3, 0), "c")].into_iter().collect();
    let hit = t.search(|k| 2u8.cmp(&k.0));
    assert_eq!(hit, Some(&"b"));
    assert_eq!(t.search(|k| 9u8.cmp(&k.0)), None);
}

// Test: teardown order and notifier coverage.
#[test]
fn drop_and_remove_all_notify_in_order() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let sink = log.clone();
    let mut t = Tree::new().with_key_destroy(move |k: i32| sink.lock().unwrap().push(k));
    for k in [4, 2, 6, 1, 3] {
        t.insert(k, ());
    }
    t.remove_all();
    assert_eq!(*log.lock().unwrap(), vec![1, 2, 3, 4, 6]);
    t.insert(9, ());
    t.insert(8, ());
    drop(t);
    assert_eq!(*log.lock().unwrap(), vec![1, 2, 3, 4, 6, 8, 9]);
}

#[test]
fn empty_tree_queries() {
    let t: Tree<i32, i32> = Tree::new();
    assert_eq!(t.height(), 0);
    assert_eq!(t.first(), None);
    assert_eq!(t.last(), None);
    assert_eq!(t.lookup(&1), None);
    assert_eq!(t.search(|k| 1.cmp(k)), None);
    assert_eq!(t.iter().next(), None);
    let mut called = false;
    t.traverse(TraverseType::PostOrder, |_, _| {
        called = true;
        false
    });
    assert!(!called);
    assert_eq!(t.search(|_| Ordering::Equal), None);
}
