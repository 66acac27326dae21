//! # Briar - Disk-Resident B-Tree Index
//!
//! Briar is a block-oriented B-tree index that maps fixed-width binary keys
//! to fixed-width binary values. All state lives in a flat array of
//! equal-sized blocks behind a [`BlockStore`], every structural mutation is
//! written through that store, and an index can be re-mounted later from the
//! same backing file.
//!
//! ## Quick Start
//!
//! ```ignore
//! use briar::{BTreeIndex, MmapStore};
//!
//! let mut store = MmapStore::create("./users.idx", 4096, 1024)?;
//! let mut index = BTreeIndex::new(&mut store, 8, 16, false)?;
//! index.attach(0, true)?;
//!
//! index.insert(b"00000001", b"alice@example.com")?;
//! let value = index.lookup(b"00000001")?;
//!
//! index.detach()?;
//! ```
//!
//! ## Store Layout
//!
//! ```text
//! Block 0:      Superblock (geometry, root block, free-list head)
//! Block 1:      Root node
//! Blocks 2..N:  Tree nodes and the free chain
//! ```
//!
//! Unallocated blocks form a singly-linked free list threaded through their
//! headers; splits pop blocks off it and an exhausted list surfaces
//! `NoSpace`.
//!
//! ## Scope
//!
//! Single-threaded and synchronous: operations on a handle run to
//! completion, writes within one insert land bottom-up, and no atomicity
//! across block writes is promised. Range scans, deletion, and transactions
//! are out of scope.
//!
//! ## Module Overview
//!
//! - [`storage`]: the `BlockStore` contract and the memory-mapped store
//! - [`btree`]: node layout, records, descent, splits, display dumps
//! - [`error`]: the enumerated failure codes (`Conflict`, `NoSpace`, ...)
//!
//! [`BlockStore`]: storage::BlockStore

#[macro_use]
mod macros;

pub mod btree;
pub mod error;
pub mod storage;

pub use btree::{BTreeIndex, DisplayMode, Key, KeyPointerPair, KeyValuePair, Value};
pub use error::BTreeError;
pub use storage::{BlockStore, MmapStore};
