//! # Error Codes
//!
//! Typed failure conditions for index operations. Most fallible functions in
//! this crate return [`eyre::Result`]; conditions a caller is expected to
//! branch on (duplicate key, missing key, free-list exhaustion) are raised as
//! a [`BTreeError`] inside the report and can be recovered with
//! [`eyre::Report::downcast_ref`]:
//!
//! ```ignore
//! match index.insert(key, value) {
//!     Err(e) if e.downcast_ref::<BTreeError>() == Some(&BTreeError::Conflict) => {
//!         // duplicate key, tree unchanged
//!     }
//!     other => other?,
//! }
//! ```
//!
//! I/O failures from the backing store are not enumerated here; they surface
//! as plain reports carrying the store's own error and context.

use std::fmt::Display;

/// Enumerated failure conditions surfaced by index operations.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BTreeError {
    /// The free list is exhausted; no block could be allocated.
    NoSpace,
    /// The key was not found (lookup/update), or descent reached an interior
    /// node with no keys.
    NonExistent,
    /// An insert collided with an existing key. No mutation has occurred.
    Conflict,
    /// The operation is not implemented (deletion).
    Unimplemented,
    /// A slot index was out of range for the node's current occupancy.
    BadSlot { slot: u64, numkeys: u64 },
    /// A structural invariant was violated: descent reached a block whose
    /// type cannot appear at that position. Indicates a bug or a corrupted
    /// store.
    Insane(String),
}

impl std::error::Error for BTreeError {}

impl Display for BTreeError {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            BTreeError::NoSpace => write!(f, "free list exhausted"),
            BTreeError::NonExistent => write!(f, "key does not exist"),
            BTreeError::Conflict => write!(f, "key already exists"),
            BTreeError::Unimplemented => write!(f, "operation not implemented"),
            BTreeError::BadSlot { slot, numkeys } => {
                write!(f, "slot {slot} out of range (numkeys={numkeys})")
            }
            BTreeError::Insane(msg) => write!(f, "structural corruption: {msg}"),
        }
    }
}

/// True when `report` carries the given [`BTreeError`] code.
pub fn is_code(report: &eyre::Report, code: &BTreeError) -> bool {
    report.downcast_ref::<BTreeError>() == Some(code)
}
