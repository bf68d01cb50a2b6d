//! sys-collections: an open-addressing `HashTable` and a threaded AVL
//! `Tree`, both owning their entries and optionally handing them to
//! destroy notifiers on removal.
//!
//! Internal Design:
//!
//! Summary
//! - HashTable<K, V, S>: one flat slot array with tombstones. Each
//!   occupied slot caches the key's 32-bit hash so a resize never calls
//!   back into `K: Hash`. Triangular probing over a power-of-two
//!   capacity, initial index taken modulo the largest prime below it.
//! - Tree<K, V, C>: AVL tree in a `SlotMap` arena. Links that are not
//!   children thread to the in-order neighbours, so `next`/`previous`
//!   and the double-ended iterator need no parent pointers or stack.
//!   Node handles are generational arena keys and go stale on removal.
//!
//! Ownership and notifiers
//! - Containers own keys and values. `remove*`, overwrites, `remove_all`
//!   and `Drop` pass the displaced parts to the registered key/value
//!   notifiers (key first); `steal*` returns them to the caller instead.
//! - Notifiers run only after the structure is consistent again. They
//!   receive ownership and cannot reach the container, so reentrant
//!   mutation is ruled out by the borrow checker rather than a guard.
//!
//! Sharing
//! - Neither container is internally synchronized. Share one across
//!   threads with `Arc<Mutex<_>>`; the last `Arc` drop tears it down and
//!   runs the notifiers once per entry. Notifiers are `Send + Sync` so
//!   this always type-checks.
//!
//! Sizing invariants (HashTable)
//! - `len <= occupied < capacity`; `capacity == 1 << shift`, `shift >= 3`.
//! - Grow when `occupied + occupied / 16 >= capacity`; shrink when
//!   `capacity > 4 * len` and above the creation-time floor. A resize
//!   rehashes from the cached hashes and drops all tombstones.
//!
//! Balance invariants (Tree)
//! - `balance == height(right) - height(left)` and `|balance| <= 1` for
//!   every node between public calls; `check_invariants` verifies this
//!   along with ordering and threads. The `debug-checks` feature runs it
//!   (and the table audit) after every mutation.
//!
//! Errors and logging
//! - Failures are precondition violations only: a cursor off an entry, or
//!   a stale node handle. They return `Error` (or `None`) after a
//!   `tracing` warning and leave the container untouched. Broken internal
//!   invariants panic.

mod error;
pub mod hash;
mod hash_table;
mod hash_table_iter;
mod hash_table_proptest;
mod notify;
mod tree;
mod tree_iter;
mod tree_proptest;

// Public surface
pub use error::Error;
pub use hash::{BuildDirectHasher, BuildStrHasher, DirectHasher, StrHasher};
pub use hash_table::{Cursor, HashTable};
pub use hash_table_iter::{Iter, IterMut, Keys, Values};
pub use notify::DestroyNotify;
pub use tree::{KeyCompare, Natural, NodeHandle, Tree};
pub use tree_iter::{Iter as TreeIter, TraverseType};
