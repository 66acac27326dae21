//! # End-to-End Index Scenarios
//!
//! Drives the full stack (BTreeIndex over MmapStore) through realistic
//! lifecycles: bulk insertion across multiple levels of growth, remount from
//! disk, in-place updates, duplicate and exhaustion handling, and the
//! allocate/deallocate notification side channel. The structural invariant
//! check runs after every phase; a failure here indicates a regression in
//! descent, split, or allocator logic.

use briar::btree::probe_geometry;
use briar::error::is_code;
use briar::{BTreeError, BTreeIndex, BlockStore, DisplayMode, MmapStore, Value};
use eyre::Result;
use tempfile::tempdir;

// 8-byte keys and values over 256-byte blocks: 13 leaf slots (threshold 8),
// 13 interior slots (threshold 8).
const BLOCK_SIZE: usize = 256;
const KEY_SIZE: u32 = 8;
const VALUE_SIZE: u32 = 8;

fn key(i: usize) -> String {
    format!("{:08}", i)
}

fn value(i: usize) -> String {
    format!("v{:07}", i)
}

/// Block store wrapper that counts the allocation notifications the index
/// sends on every free-list transition.
struct CountingStore<S: BlockStore> {
    inner: S,
    allocated: Vec<u64>,
    deallocated: Vec<u64>,
}

impl<S: BlockStore> CountingStore<S> {
    fn new(inner: S) -> Self {
        Self {
            inner,
            allocated: Vec::new(),
            deallocated: Vec::new(),
        }
    }
}

impl<S: BlockStore> BlockStore for CountingStore<S> {
    fn block_size(&self) -> usize {
        self.inner.block_size()
    }

    fn block_count(&self) -> u64 {
        self.inner.block_count()
    }

    fn read_block(&self, n: u64, buf: &mut [u8]) -> Result<()> {
        self.inner.read_block(n, buf)
    }

    fn write_block(&mut self, n: u64, data: &[u8]) -> Result<()> {
        self.inner.write_block(n, data)
    }

    fn notify_allocate(&mut self, n: u64) {
        self.allocated.push(n);
    }

    fn notify_deallocate(&mut self, n: u64) {
        self.deallocated.push(n);
    }
}

#[test]
fn bulk_insert_lookup_across_multiple_levels() {
    let dir = tempdir().unwrap();
    let mut store = MmapStore::create(dir.path().join("bulk.idx"), BLOCK_SIZE, 256).unwrap();
    let mut index = BTreeIndex::new(&mut store, KEY_SIZE, VALUE_SIZE, false).unwrap();
    index.attach(0, true).unwrap();

    let initial_root = index.rootnode();
    for i in 0..400 {
        index.insert(key(i).as_bytes(), value(i).as_bytes()).unwrap();
    }

    assert_ne!(index.rootnode(), initial_root, "tree never grew in height");

    for i in 0..400 {
        assert_eq!(
            index.lookup(key(i).as_bytes()).unwrap(),
            Value::new(value(i).as_bytes()),
            "key {} lost",
            i
        );
    }
    assert!(is_code(
        &index.lookup(key(400).as_bytes()).unwrap_err(),
        &BTreeError::NonExistent
    ));
    index.sanity_check().unwrap();
}

#[test]
fn scattered_insert_order_keeps_keys_sorted() {
    let dir = tempdir().unwrap();
    let mut store = MmapStore::create(dir.path().join("scatter.idx"), BLOCK_SIZE, 256).unwrap();
    let mut index = BTreeIndex::new(&mut store, KEY_SIZE, VALUE_SIZE, false).unwrap();
    index.attach(0, true).unwrap();

    // 211 is coprime to 400: visits every key exactly once, far from order.
    let mut i = 0;
    for _ in 0..400 {
        index.insert(key(i).as_bytes(), value(i).as_bytes()).unwrap();
        i = (i + 211) % 400;
    }

    index.sanity_check().unwrap();

    // The sorted dump walks leaves left to right; it must list every key
    // exactly once, in order.
    let mut out = Vec::new();
    index.display(&mut out, DisplayMode::SortedKeyVal).unwrap();
    let text = String::from_utf8(out).unwrap();
    let listed: Vec<&str> = text.lines().collect();

    assert_eq!(listed.len(), 400);
    for (i, line) in listed.iter().enumerate() {
        assert_eq!(*line, format!("({},{})", key(i), value(i)));
    }
}

#[test]
fn detach_reopen_preserves_everything() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("reopen.idx");

    {
        let mut store = MmapStore::create(&path, BLOCK_SIZE, 128).unwrap();
        let mut index = BTreeIndex::new(&mut store, KEY_SIZE, VALUE_SIZE, false).unwrap();
        index.attach(0, true).unwrap();
        for i in 0..150 {
            index.insert(key(i).as_bytes(), value(i).as_bytes()).unwrap();
        }
        index.detach().unwrap();
        store.sync().unwrap();
    }

    let geometry = probe_geometry(&path).unwrap();
    assert_eq!(geometry.blocksize as usize, BLOCK_SIZE);
    assert_eq!(geometry.keysize, KEY_SIZE);
    assert_eq!(geometry.valuesize, VALUE_SIZE);

    let mut store = MmapStore::open(&path, geometry.blocksize as usize).unwrap();
    let mut index =
        BTreeIndex::new(&mut store, geometry.keysize, geometry.valuesize, false).unwrap();
    index.attach(0, false).unwrap();

    for i in 0..150 {
        assert_eq!(
            index.lookup(key(i).as_bytes()).unwrap(),
            Value::new(value(i).as_bytes())
        );
    }
    index.sanity_check().unwrap();

    // The remounted handle keeps working for writes.
    index.update(key(7).as_bytes(), b"fresh!!!").unwrap();
    index.insert(key(500).as_bytes(), value(500).as_bytes()).unwrap();
    assert_eq!(index.lookup(key(7).as_bytes()).unwrap(), Value::new(b"fresh!!!"));
    index.sanity_check().unwrap();
}

#[test]
fn updates_churn_without_structural_change() {
    let dir = tempdir().unwrap();
    let mut store = MmapStore::create(dir.path().join("churn.idx"), BLOCK_SIZE, 128).unwrap();
    let mut index = BTreeIndex::new(&mut store, KEY_SIZE, VALUE_SIZE, false).unwrap();
    index.attach(0, true).unwrap();

    for i in 0..100 {
        index.insert(key(i).as_bytes(), value(i).as_bytes()).unwrap();
    }
    let root = index.rootnode();
    let free = index.freelist_head();

    for round in 0..3 {
        for i in 0..100 {
            let v = format!("r{}v{:05}", round, i);
            index.update(key(i).as_bytes(), v.as_bytes()).unwrap();
        }
    }

    for i in 0..100 {
        let expected = format!("r2v{:05}", i);
        assert_eq!(
            index.lookup(key(i).as_bytes()).unwrap(),
            Value::new(expected.as_bytes())
        );
    }
    assert_eq!(index.rootnode(), root);
    assert_eq!(index.freelist_head(), free);
    index.sanity_check().unwrap();
}

#[test]
fn duplicate_inserts_reject_at_every_depth() {
    let dir = tempdir().unwrap();
    let mut store = MmapStore::create(dir.path().join("dup.idx"), BLOCK_SIZE, 256).unwrap();
    let mut index = BTreeIndex::new(&mut store, KEY_SIZE, VALUE_SIZE, false).unwrap();
    index.attach(0, true).unwrap();

    for i in 0..300 {
        index.insert(key(i).as_bytes(), value(i).as_bytes()).unwrap();
    }

    for i in 0..300 {
        let err = index.insert(key(i).as_bytes(), b"other!!!").unwrap_err();
        assert!(
            is_code(&err, &BTreeError::Conflict),
            "key {} did not conflict",
            i
        );
    }

    for i in 0..300 {
        assert_eq!(
            index.lookup(key(i).as_bytes()).unwrap(),
            Value::new(value(i).as_bytes())
        );
    }
    index.sanity_check().unwrap();
}

#[test]
fn exhausted_store_fails_cleanly_and_stays_mountable() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("full.idx");
    let mut store = MmapStore::create(&path, BLOCK_SIZE, 8).unwrap();

    let inserted = {
        let mut index = BTreeIndex::new(&mut store, KEY_SIZE, VALUE_SIZE, false).unwrap();
        index.attach(0, true).unwrap();

        let mut inserted = Vec::new();
        let mut hit_nospace = false;
        for i in 0..200 {
            match index.insert(key(i).as_bytes(), value(i).as_bytes()) {
                Ok(()) => inserted.push(i),
                Err(e) if is_code(&e, &BTreeError::NoSpace) => {
                    hit_nospace = true;
                    break;
                }
                Err(e) => panic!("unexpected error: {e:#}"),
            }
        }

        assert!(hit_nospace, "an 8-block store never ran out of space");
        index.sanity_check().unwrap();
        index.detach().unwrap();
        inserted
    };

    // Everything inserted before exhaustion survives a remount.
    let mut index = BTreeIndex::new(&mut store, KEY_SIZE, VALUE_SIZE, false).unwrap();
    index.attach(0, false).unwrap();
    for &i in &inserted {
        assert_eq!(
            index.lookup(key(i).as_bytes()).unwrap(),
            Value::new(value(i).as_bytes())
        );
    }
    index.sanity_check().unwrap();
}

#[test]
fn allocation_notifications_track_free_list_transitions() {
    let dir = tempdir().unwrap();
    let inner = MmapStore::create(dir.path().join("notify.idx"), 108, 32).unwrap();
    let mut store = CountingStore::new(inner);

    let mut index = BTreeIndex::new(&mut store, 4, 4, false).unwrap();
    index.attach(0, true).unwrap();

    // Formatting claims the superblock and root outside the free list.
    assert_eq!(index.store().allocated, vec![0, 1]);

    // The bootstrap allocates the two leaves.
    index.insert(b"0001", b"0001").unwrap();
    assert_eq!(index.store().allocated, vec![0, 1, 2, 3]);

    // Filling the right leaf to its threshold allocates one split sibling.
    for i in 2..=5 {
        let k = format!("{:04}", i);
        index.insert(k.as_bytes(), k.as_bytes()).unwrap();
    }
    assert_eq!(index.store().allocated, vec![0, 1, 2, 3, 4]);
    assert!(index.store().deallocated.is_empty());

    index.sanity_check().unwrap();
}

#[test]
fn deallocation_notification_fires_on_free() {
    let dir = tempdir().unwrap();
    let inner = MmapStore::create(dir.path().join("free.idx"), 108, 8).unwrap();
    let mut store = CountingStore::new(inner);

    let mut index = BTreeIndex::new(&mut store, 4, 4, false).unwrap();
    index.attach(0, true).unwrap();

    // Bootstrap allocates leaves at blocks 2 and 3; returning one to the
    // free list must notify the store and move the head.
    index.insert(b"0001", b"0001").unwrap();
    index.deallocate_node(3).unwrap();

    assert_eq!(index.store().deallocated, vec![3]);
    assert_eq!(index.freelist_head(), 3);
}
