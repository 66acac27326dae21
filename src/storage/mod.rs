//! # Storage Module
//!
//! The backing store abstraction for the index. The index never touches a
//! file directly; every persistent byte flows through a [`BlockStore`], a
//! flat array of equal-sized blocks addressed by number.
//!
//! ## Contract
//!
//! A store exposes:
//!
//! - `block_size()` / `block_count()` — fixed geometry
//! - `read_block(n, buf)` / `write_block(n, data)` — whole-block synchronous I/O
//! - `notify_allocate(n)` / `notify_deallocate(n)` — side channel the index
//!   calls on every free-list transition so external bookkeeping (cache
//!   pinning, statistics) can stay consistent
//!
//! Blocks are addressed by integers in `[0, block_count)`. Any error returned
//! by the store aborts the current index operation and is propagated
//! unchanged.
//!
//! ## Implementations
//!
//! - [`MmapStore`]: memory-mapped file, the production store. Reads copy out
//!   of the map into the caller's node image; writes copy the image back.
//!
//! Tests wrap `MmapStore` in counting adapters to observe the notify side
//! channel; any type implementing the trait works, so an application can
//! substitute its own buffer cache.
//!
//! ## Threading
//!
//! Stores are used from a single thread; the index serializes all access
//! (see the crate docs). Nothing here is `Sync`.

mod mmap;

pub use mmap::MmapStore;

use eyre::Result;

/// Minimum block size a store may advertise. A block must at least hold a
/// node header, the reserved leaf pointer, and one key/value or key/pointer
/// slot of nontrivial width.
pub const MIN_BLOCK_SIZE: usize = 64;

/// Flat array of fixed-size blocks. The external collaborator every index
/// operation reads from and writes through.
pub trait BlockStore {
    /// Size in bytes of every block in the store.
    fn block_size(&self) -> usize;

    /// Number of blocks addressable as `[0, block_count)`.
    fn block_count(&self) -> u64;

    /// Reads block `n` into `buf`. `buf` must be exactly `block_size` long.
    fn read_block(&self, n: u64, buf: &mut [u8]) -> Result<()>;

    /// Writes `data` as the new contents of block `n`. `data` must be exactly
    /// `block_size` long.
    fn write_block(&mut self, n: u64, data: &[u8]) -> Result<()>;

    /// Called by the index when block `n` leaves the free list.
    fn notify_allocate(&mut self, _n: u64) {}

    /// Called by the index when block `n` returns to the free list.
    fn notify_deallocate(&mut self, _n: u64) {}

    /// Flushes any buffered state to durable storage.
    fn sync(&self) -> Result<()> {
        Ok(())
    }
}

impl<S: BlockStore + ?Sized> BlockStore for &mut S {
    fn block_size(&self) -> usize {
        (**self).block_size()
    }

    fn block_count(&self) -> u64 {
        (**self).block_count()
    }

    fn read_block(&self, n: u64, buf: &mut [u8]) -> Result<()> {
        (**self).read_block(n, buf)
    }

    fn write_block(&mut self, n: u64, data: &[u8]) -> Result<()> {
        (**self).write_block(n, data)
    }

    fn notify_allocate(&mut self, n: u64) {
        (**self).notify_allocate(n)
    }

    fn notify_deallocate(&mut self, n: u64) {
        (**self).notify_deallocate(n)
    }

    fn sync(&self) -> Result<()> {
        (**self).sync()
    }
}
