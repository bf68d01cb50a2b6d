//! Error type for precondition failures.
//!
//! None of these indicate a corrupted container: the operation that
//! returned one did not touch any state.

/// Precondition failures reported by cursor and node-handle operations.
#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// Cursor is before the first entry or past the last one.
    #[error("cursor is not positioned on an entry")]
    CursorNotPositioned,
    /// The slot under the cursor was already removed through the cursor.
    #[error("entry under the cursor was already removed")]
    EntryGone,
    /// The node handle refers to a node that has since been removed.
    #[error("node handle is stale")]
    StaleNode,
}

/// Log a precondition failure and hand the error back for propagation.
#[inline]
pub(crate) fn precondition(op: &'static str, err: Error) -> Error {
    tracing::warn!(op, %err, "precondition failed");
    err
}
