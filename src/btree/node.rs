//! # Node Layout and Accessors
//!
//! Every tree cell occupies exactly one block and begins with a 40-byte
//! header; the rest of the block is a slot array whose interpretation depends
//! on the node type.
//!
//! ## Node Header Layout (40 bytes)
//!
//! ```text
//! Offset  Size  Field      Description
//! ------  ----  ---------  ----------------------------------------
//! 0       1     node_type  Superblock, Root, Interior, Leaf, Unallocated
//! 1       3     reserved   Zeroes
//! 4       4     keysize    Key width in bytes
//! 8       4     valuesize  Value width in bytes
//! 12      4     blocksize  Block size the node was built for
//! 16      8     rootnode   Current root block (authoritative in the superblock)
//! 24      8     freelist   Free-list head (superblock) / next free (unallocated)
//! 32      8     numkeys    Occupied key slots
//! ```
//!
//! All multi-byte fields are little-endian via zerocopy's `U32`/`U64`
//! wrappers, so a header round-trips bit-exactly between memory and disk.
//!
//! ## Slot Arrays
//!
//! ```text
//! Leaf:        | header | P0 | K0 V0 | K1 V1 | ...
//! Interior:    | header | P0 | K0 | P1 | K1 | ... | K(n-1) | Pn
//! Superblock:  | header |             (slot area unused)
//! Unallocated: | header |             (freelist field = next free block)
//! ```
//!
//! A leaf's leading `P0` is reserved for a future leaf-chain link and is
//! carried across splits but never followed. An interior node with `numkeys
//! = n` owns `n + 1` child pointers; child `Pi` covers keys in
//! `[K(i-1), Ki)`.
//!
//! ## Capacity
//!
//! ```text
//! leaf:     (blocksize - 40 - 8) / (keysize + valuesize)
//! interior: (blocksize - 40 - 8) / (keysize + 8)
//! ```
//!
//! ## Ownership
//!
//! A [`Node`] is an owned in-memory image of one block. Mutating accessors
//! touch only the image; nothing persists until [`Node::write`] pushes the
//! image back through the block store. [`Node::read`] is the inverse. Unused
//! slot bytes round-trip untouched and are never interpreted.

use eyre::{ensure, Result};
use zerocopy::little_endian::{U32, U64};
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout, Unaligned};

use crate::btree::record::{Key, KeyPointerPair, KeyValuePair, Value};
use crate::error::BTreeError;
use crate::storage::BlockStore;

pub const NODE_HEADER_SIZE: usize = 40;
pub const PTR_SIZE: usize = 8;

#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeType {
    Unallocated = 0x00,
    Superblock = 0x01,
    Root = 0x02,
    Interior = 0x03,
    Leaf = 0x04,
    Unknown = 0xFF,
}

impl NodeType {
    pub fn from_byte(b: u8) -> Self {
        match b {
            0x00 => NodeType::Unallocated,
            0x01 => NodeType::Superblock,
            0x02 => NodeType::Root,
            0x03 => NodeType::Interior,
            0x04 => NodeType::Leaf,
            _ => NodeType::Unknown,
        }
    }
}

#[repr(C)]
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, Immutable, KnownLayout, Unaligned)]
pub struct NodeHeader {
    node_type: u8,
    reserved: [u8; 3],
    keysize: U32,
    valuesize: U32,
    blocksize: U32,
    rootnode: U64,
    freelist: U64,
    numkeys: U64,
}

const _: () = assert!(std::mem::size_of::<NodeHeader>() == NODE_HEADER_SIZE);

impl NodeHeader {
    pub fn new(node_type: NodeType, keysize: u32, valuesize: u32, blocksize: u32) -> Self {
        Self {
            node_type: node_type as u8,
            reserved: [0; 3],
            keysize: U32::new(keysize),
            valuesize: U32::new(valuesize),
            blocksize: U32::new(blocksize),
            rootnode: U64::new(0),
            freelist: U64::new(0),
            numkeys: U64::new(0),
        }
    }

    pub fn from_bytes(data: &[u8]) -> Result<&Self> {
        ensure!(
            data.len() >= NODE_HEADER_SIZE,
            "buffer too small for NodeHeader: {} < {}",
            data.len(),
            NODE_HEADER_SIZE
        );

        Self::ref_from_bytes(&data[..NODE_HEADER_SIZE])
            .map_err(|e| eyre::eyre!("failed to read NodeHeader: {:?}", e))
    }

    pub fn from_bytes_mut(data: &mut [u8]) -> Result<&mut Self> {
        ensure!(
            data.len() >= NODE_HEADER_SIZE,
            "buffer too small for NodeHeader: {} < {}",
            data.len(),
            NODE_HEADER_SIZE
        );

        Self::mut_from_bytes(&mut data[..NODE_HEADER_SIZE])
            .map_err(|e| eyre::eyre!("failed to read NodeHeader: {:?}", e))
    }

    pub fn node_type(&self) -> NodeType {
        NodeType::from_byte(self.node_type)
    }

    pub fn set_node_type(&mut self, node_type: NodeType) {
        self.node_type = node_type as u8;
    }

    zerocopy_accessors! {
        keysize: u32,
        valuesize: u32,
        blocksize: u32,
        rootnode: u64,
        freelist: u64,
        numkeys: u64,
    }
}

/// Owned in-memory image of one block, viewed through its header as a typed
/// tree node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Node {
    buf: Vec<u8>,
}

impl Node {
    /// Builds a fresh zeroed node image. `blocksize` must accommodate the
    /// header plus at least one slot; the index validates geometry before
    /// constructing nodes.
    pub fn new(node_type: NodeType, keysize: u32, valuesize: u32, blocksize: u32) -> Self {
        let mut buf = vec![0u8; blocksize as usize];
        let header = NodeHeader::new(node_type, keysize, valuesize, blocksize);
        buf[..NODE_HEADER_SIZE].copy_from_slice(header.as_bytes());
        Self { buf }
    }

    /// Populates a node image from block `n` of the store.
    pub fn read<S: BlockStore>(store: &S, n: u64) -> Result<Self> {
        let mut buf = vec![0u8; store.block_size()];
        store.read_block(n, &mut buf)?;
        Ok(Self { buf })
    }

    /// Writes the node image back to block `n` of the store.
    pub fn write<S: BlockStore>(&self, store: &mut S, n: u64) -> Result<()> {
        store.write_block(n, &self.buf)
    }

    fn header(&self) -> &NodeHeader {
        // INVARIANT: buf holds at least NODE_HEADER_SIZE bytes, established
        // by every constructor.
        NodeHeader::from_bytes(&self.buf).unwrap()
    }

    fn header_mut(&mut self) -> &mut NodeHeader {
        NodeHeader::from_bytes_mut(&mut self.buf).unwrap()
    }

    pub fn node_type(&self) -> NodeType {
        self.header().node_type()
    }

    pub fn set_node_type(&mut self, node_type: NodeType) {
        self.header_mut().set_node_type(node_type);
    }

    pub fn keysize(&self) -> u32 {
        self.header().keysize()
    }

    pub fn valuesize(&self) -> u32 {
        self.header().valuesize()
    }

    pub fn blocksize(&self) -> u32 {
        self.header().blocksize()
    }

    pub fn rootnode(&self) -> u64 {
        self.header().rootnode()
    }

    pub fn set_rootnode(&mut self, block: u64) {
        self.header_mut().set_rootnode(block);
    }

    pub fn freelist(&self) -> u64 {
        self.header().freelist()
    }

    pub fn set_freelist(&mut self, block: u64) {
        self.header_mut().set_freelist(block);
    }

    pub fn numkeys(&self) -> usize {
        self.header().numkeys() as usize
    }

    pub fn set_numkeys(&mut self, numkeys: usize) {
        self.header_mut().set_numkeys(numkeys as u64);
    }

    /// Slots available when the block is interpreted as a leaf.
    pub fn leaf_capacity(&self) -> usize {
        (self.blocksize() as usize - NODE_HEADER_SIZE - PTR_SIZE)
            / (self.keysize() as usize + self.valuesize() as usize)
    }

    /// Slots available when the block is interpreted as an interior node.
    pub fn interior_capacity(&self) -> usize {
        (self.blocksize() as usize - NODE_HEADER_SIZE - PTR_SIZE)
            / (self.keysize() as usize + PTR_SIZE)
    }

    fn is_inner(&self) -> bool {
        matches!(self.node_type(), NodeType::Root | NodeType::Interior)
    }

    fn key_offset(&self, slot: usize) -> usize {
        let keysize = self.keysize() as usize;
        if self.is_inner() {
            NODE_HEADER_SIZE + slot * (keysize + PTR_SIZE) + PTR_SIZE
        } else {
            NODE_HEADER_SIZE + PTR_SIZE + slot * (keysize + self.valuesize() as usize)
        }
    }

    fn ptr_offset(&self, slot: usize) -> usize {
        if self.is_inner() {
            NODE_HEADER_SIZE + slot * (self.keysize() as usize + PTR_SIZE)
        } else {
            NODE_HEADER_SIZE
        }
    }

    fn value_offset(&self, slot: usize) -> usize {
        self.key_offset(slot) + self.keysize() as usize
    }

    fn bad_slot(&self, slot: usize) -> eyre::Report {
        eyre::Report::new(BTreeError::BadSlot {
            slot: slot as u64,
            numkeys: self.numkeys() as u64,
        })
    }

    pub fn key_at(&self, slot: usize) -> Result<Key> {
        if slot >= self.numkeys() {
            return Err(self.bad_slot(slot));
        }
        let off = self.key_offset(slot);
        let end = off + self.keysize() as usize;
        ensure!(
            end <= self.buf.len(),
            "key slot {} extends beyond the block (offset {})",
            slot,
            off
        );
        Ok(Key::new(&self.buf[off..end]))
    }

    pub fn set_key(&mut self, slot: usize, key: &Key) -> Result<()> {
        if slot >= self.numkeys() {
            return Err(self.bad_slot(slot));
        }
        ensure!(
            key.len() == self.keysize() as usize,
            "key width {} != keysize {}",
            key.len(),
            self.keysize()
        );
        let off = self.key_offset(slot);
        self.buf[off..off + key.len()].copy_from_slice(key.as_bytes());
        Ok(())
    }

    pub fn ptr_at(&self, slot: usize) -> Result<u64> {
        if self.is_inner() {
            if slot > self.numkeys() {
                return Err(self.bad_slot(slot));
            }
        } else if slot != 0 {
            return Err(self.bad_slot(slot));
        }
        let off = self.ptr_offset(slot);
        let end = off + PTR_SIZE;
        ensure!(
            end <= self.buf.len(),
            "pointer slot {} extends beyond the block (offset {})",
            slot,
            off
        );
        let raw: [u8; PTR_SIZE] = self.buf[off..end].try_into().unwrap();
        Ok(u64::from_le_bytes(raw))
    }

    pub fn set_ptr(&mut self, slot: usize, ptr: u64) -> Result<()> {
        if self.is_inner() {
            if slot > self.numkeys() {
                return Err(self.bad_slot(slot));
            }
        } else if slot != 0 {
            return Err(self.bad_slot(slot));
        }
        let off = self.ptr_offset(slot);
        self.buf[off..off + PTR_SIZE].copy_from_slice(&ptr.to_le_bytes());
        Ok(())
    }

    pub fn value_at(&self, slot: usize) -> Result<Value> {
        ensure!(
            self.node_type() == NodeType::Leaf,
            "value access on non-leaf node ({:?})",
            self.node_type()
        );
        if slot >= self.numkeys() {
            return Err(self.bad_slot(slot));
        }
        let off = self.value_offset(slot);
        let end = off + self.valuesize() as usize;
        ensure!(
            end <= self.buf.len(),
            "value slot {} extends beyond the block (offset {})",
            slot,
            off
        );
        Ok(Value::new(&self.buf[off..end]))
    }

    pub fn set_value(&mut self, slot: usize, value: &Value) -> Result<()> {
        ensure!(
            self.node_type() == NodeType::Leaf,
            "value access on non-leaf node ({:?})",
            self.node_type()
        );
        if slot >= self.numkeys() {
            return Err(self.bad_slot(slot));
        }
        ensure!(
            value.len() == self.valuesize() as usize,
            "value width {} != valuesize {}",
            value.len(),
            self.valuesize()
        );
        let off = self.value_offset(slot);
        self.buf[off..off + value.len()].copy_from_slice(value.as_bytes());
        Ok(())
    }

    pub fn key_value_at(&self, slot: usize) -> Result<KeyValuePair> {
        Ok(KeyValuePair::new(self.key_at(slot)?, self.value_at(slot)?))
    }

    pub fn set_key_value(&mut self, slot: usize, kv: &KeyValuePair) -> Result<()> {
        self.set_key(slot, &kv.key)?;
        self.set_value(slot, &kv.value)
    }

    /// The separator at `slot` paired with its right-hand child pointer.
    pub fn key_ptr_at(&self, slot: usize) -> Result<KeyPointerPair> {
        Ok(KeyPointerPair::new(
            self.key_at(slot)?,
            self.ptr_at(slot + 1)?,
        ))
    }

    pub fn set_key_ptr(&mut self, slot: usize, kp: &KeyPointerPair) -> Result<()> {
        self.set_key(slot, &kp.key)?;
        self.set_ptr(slot + 1, kp.pointer)
    }

    /// Shift-then-store insertion into a leaf: pairs `[slot, numkeys)` move
    /// one slot right, the new pair lands at `slot`, and `numkeys` grows by
    /// one. Fails with `BadSlot` when `slot > numkeys`.
    pub fn insert_key_value(&mut self, slot: usize, kv: &KeyValuePair) -> Result<()> {
        ensure!(
            self.node_type() == NodeType::Leaf,
            "pair insert on non-leaf node ({:?})",
            self.node_type()
        );
        let numkeys = self.numkeys();
        if slot > numkeys {
            return Err(self.bad_slot(slot));
        }
        ensure!(
            numkeys < self.leaf_capacity(),
            "leaf slot array full (numkeys={}, capacity={})",
            numkeys,
            self.leaf_capacity()
        );

        let stride = self.keysize() as usize + self.valuesize() as usize;
        let start = self.key_offset(slot);
        let end = self.key_offset(numkeys);
        self.buf.copy_within(start..end, start + stride);

        self.set_numkeys(numkeys + 1);
        self.set_key_value(slot, kv)
    }

    /// Shift-then-store insertion into an interior node: keys `[slot,
    /// numkeys)` and pointers `[slot+1, numkeys+1)` move one slot right, the
    /// separator lands at key slot `slot` with its right-child pointer at
    /// `slot + 1`, and `numkeys` grows by one. The pointer left of the
    /// separator is untouched. Fails with `BadSlot` when `slot > numkeys`.
    pub fn insert_key_ptr(&mut self, slot: usize, kp: &KeyPointerPair) -> Result<()> {
        ensure!(
            self.is_inner(),
            "separator insert on non-interior node ({:?})",
            self.node_type()
        );
        let numkeys = self.numkeys();
        if slot > numkeys {
            return Err(self.bad_slot(slot));
        }
        ensure!(
            numkeys < self.interior_capacity(),
            "interior slot array full (numkeys={}, capacity={})",
            numkeys,
            self.interior_capacity()
        );

        // The byte region K(slot) .. P(numkeys) is contiguous in the
        // interleaved layout; shifting it by one stride moves both the key
        // run and the pointer run in a single copy.
        let stride = self.keysize() as usize + PTR_SIZE;
        let start = self.key_offset(slot);
        let end = self.ptr_offset(numkeys) + PTR_SIZE;
        self.buf.copy_within(start..end, start + stride);

        self.set_numkeys(numkeys + 1);
        self.set_key(slot, &kp.key)?;
        self.set_ptr(slot + 1, kp.pointer)
    }
}

/// Geometry recorded in a store file's superblock.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoreGeometry {
    pub blocksize: u32,
    pub keysize: u32,
    pub valuesize: u32,
}

/// Reads the geometry recorded in a store file's superblock without mapping
/// the file, so an existing index can be reopened without the caller
/// re-supplying it.
pub fn probe_geometry<P: AsRef<std::path::Path>>(path: P) -> Result<StoreGeometry> {
    use std::io::Read;

    let path = path.as_ref();
    let mut file = std::fs::File::open(path)
        .map_err(|e| eyre::eyre!("failed to open store file '{}': {}", path.display(), e))?;

    let mut buf = [0u8; NODE_HEADER_SIZE];
    file.read_exact(&mut buf)
        .map_err(|e| eyre::eyre!("failed to read superblock header: {}", e))?;

    let header = NodeHeader::from_bytes(&buf)?;
    ensure!(
        header.node_type() == NodeType::Superblock,
        "block 0 of '{}' is {:?}, not a superblock",
        path.display(),
        header.node_type()
    );
    Ok(StoreGeometry {
        blocksize: header.blocksize(),
        keysize: header.keysize(),
        valuesize: header.valuesize(),
    })
}
