//! # B-Tree Index Implementation
//!
//! A disk-resident B-tree over fixed-size blocks, mapping fixed-width keys
//! to fixed-width values. Point lookup, insert with split-and-promote, and
//! in-place update; all state lives in the backing [`BlockStore`] and the
//! index can be re-mounted from it later.
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌────────────────────────────────────────────┐
//! │        BTreeIndex (tree.rs)                 │  descent, splits, allocator
//! ├────────────────────────────────────────────┤
//! │        Node image (node.rs)                 │  header + slot accessors
//! ├────────────────────────────────────────────┤
//! │        Records (record.rs)                  │  Key / Value / pairs
//! ├────────────────────────────────────────────┤
//! │        BlockStore (storage module)          │  whole-block read/write
//! └────────────────────────────────────────────┘
//! ```
//!
//! Every node is the in-memory image of exactly one block: reads pull a
//! block into an owned buffer, mutations touch only the image, and an
//! explicit serialize pushes it back. The tree layer never holds references
//! into the store.
//!
//! ## Variant
//!
//! Leaves split B+-style (the promoted separator stays as the right leaf's
//! first key) while interior nodes split classically (the separator is
//! lifted out). Nodes split at a two-thirds fill threshold rather than at
//! capacity. See `tree.rs` for the full rules.
//!
//! [`BlockStore`]: crate::storage::BlockStore

mod display;
mod node;
mod record;
mod tree;

pub use display::DisplayMode;
pub use node::{
    probe_geometry, Node, NodeHeader, NodeType, StoreGeometry, NODE_HEADER_SIZE, PTR_SIZE,
};
pub use record::{Key, KeyPointerPair, KeyValuePair, Value};
pub use tree::{BTreeIndex, SUPERBLOCK_INDEX};
