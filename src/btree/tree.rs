//! # B-Tree Index
//!
//! The public handle over a block store: point lookup, insertion with
//! split-and-promote, in-place value update, and the free-list allocator
//! that feeds splits with fresh blocks.
//!
//! ## Store Layout
//!
//! ```text
//! Block 0:      Superblock (rootnode + free-list head)
//! Block 1:      Root node (initially empty)
//! Blocks 2..N:  Free chain, each block naming the next, tail = 0
//! ```
//!
//! `attach(0, create=true)` builds this layout; `attach(0, create=false)`
//! mounts an existing one by reading the superblock and validating its
//! geometry against the store. `detach` writes the superblock back.
//!
//! ## Insert Algorithm
//!
//! ```text
//! 1. Descend from the root, scanning separators in slot order
//! 2. At the leaf: splice the pair in at its sorted position
//! 3. If the leaf reaches the fill threshold, split it; the first key of
//!    the right half is promoted with the new sibling's block number
//! 4. Each parent splices the promotion into its own slot array and splits
//!    in turn if it crosses its threshold
//! 5. A promotion escaping the root allocates a fresh root block; the tree
//!    grows by one level and the superblock learns the new root last
//! ```
//!
//! A child's split result travels up as a [`Promotion`] value returned from
//! the recursive call, so "promotion data is valid" and "a split happened"
//! are the same fact by construction.
//!
//! ## Fill Threshold
//!
//! A node splits when `numkeys >= capacity * 2 / 3` *after* a splice. The
//! two-thirds trigger (rather than splitting at full) leaves slack in both
//! halves for future inserts at the cost of occupancy.
//!
//! ## Split Asymmetry
//!
//! Leaf and interior splits differ on purpose:
//!
//! - **Leaf**: the promoted key is the first key of the right half and
//!   *stays* in the right leaf (B+-tree style); every pair survives.
//! - **Interior**: the promoted key is *lifted out* and appears in neither
//!   half (classical B-tree style); its left and right neighbors become the
//!   halves' boundaries.
//!
//! Matching this asymmetry, equal-key descent takes the left child of a
//! matching separator: a separator is the smallest key of the subtree to
//! its right, and lookups of that key must land in the right subtree's
//! leftmost leaf, which the `key <= separator` tie-break reaches.
//!
//! ## Write Ordering
//!
//! Within one insert, blocks reach the store bottom-up: a new right sibling
//! is written before its promotion reaches the parent, each node on the
//! path is written after its child completes, and the superblock is written
//! last when the root grows. No atomicity across writes is promised; a
//! crash mid-split can orphan blocks, and recovery is out of scope.
//!
//! ## Concurrency
//!
//! Single-threaded and synchronous. The index assumes exclusive write
//! access to block 0 and every block it has allocated.

use eyre::{bail, ensure, Result, WrapErr};
use log::{debug, trace};

use crate::btree::node::{Node, NodeType, NODE_HEADER_SIZE, PTR_SIZE};
use crate::btree::record::{Key, KeyPointerPair, KeyValuePair, Value};
use crate::error::BTreeError;
use crate::storage::BlockStore;

/// The superblock always lives at block 0.
pub const SUPERBLOCK_INDEX: u64 = 0;

/// Result of a recursive insert below some node: either the child absorbed
/// the pair, or it split and hands up the separator plus its new right
/// sibling for the parent to splice in.
enum Promotion {
    None,
    Promoted { key: Key, right: u64 },
}

/// A block-oriented B-tree index mapping fixed-width keys to fixed-width
/// values, persisted through a [`BlockStore`].
pub struct BTreeIndex<S: BlockStore> {
    store: S,
    superblock: Node,
    unique: bool,
}

impl<S: BlockStore> BTreeIndex<S> {
    /// Binds an index handle to a store. `keysize` and `valuesize` fix the
    /// record geometry for the life of the index; the block size comes from
    /// the store. The `unique` flag is accepted and recorded; exact
    /// duplicate keys are rejected on insert regardless of it.
    pub fn new(store: S, keysize: u32, valuesize: u32, unique: bool) -> Result<Self> {
        ensure!(keysize > 0, "keysize must be nonzero");
        ensure!(valuesize > 0, "valuesize must be nonzero");

        let blocksize = store.block_size();
        ensure!(
            blocksize <= u32::MAX as usize,
            "block size {} too large",
            blocksize
        );
        ensure!(
            blocksize > NODE_HEADER_SIZE + PTR_SIZE,
            "block size {} cannot hold a node header",
            blocksize
        );

        let slot_area = blocksize - NODE_HEADER_SIZE - PTR_SIZE;
        let leaf_capacity = slot_area / (keysize as usize + valuesize as usize);
        let interior_capacity = slot_area / (keysize as usize + PTR_SIZE);
        ensure!(
            leaf_capacity >= 3 && interior_capacity >= 3,
            "block size {} holds only {} leaf / {} interior slots; \
             splitting needs at least 3 of each",
            blocksize,
            leaf_capacity,
            interior_capacity
        );

        let superblock = Node::new(NodeType::Superblock, keysize, valuesize, blocksize as u32);

        Ok(Self {
            store,
            superblock,
            unique,
        })
    }

    pub fn keysize(&self) -> u32 {
        self.superblock.keysize()
    }

    pub fn valuesize(&self) -> u32 {
        self.superblock.valuesize()
    }

    pub fn unique(&self) -> bool {
        self.unique
    }

    /// Block number of the current root.
    pub fn rootnode(&self) -> u64 {
        self.superblock.rootnode()
    }

    /// Head of the free list; 0 means exhausted.
    pub fn freelist_head(&self) -> u64 {
        self.superblock.freelist()
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    fn fresh_node(&self, node_type: NodeType) -> Node {
        let mut node = Node::new(
            node_type,
            self.superblock.keysize(),
            self.superblock.valuesize(),
            self.superblock.blocksize(),
        );
        node.set_rootnode(self.superblock.rootnode());
        node
    }

    /// Mounts the index. With `create`, first formats the store: block 0
    /// becomes the superblock, block 1 an empty root, and blocks `2..N`
    /// the free chain. `initblock` must be 0.
    pub fn attach(&mut self, initblock: u64, create: bool) -> Result<()> {
        ensure!(
            initblock == SUPERBLOCK_INDEX,
            "superblock must live at block 0, got {}",
            initblock
        );

        if create {
            let nblocks = self.store.block_count();
            ensure!(
                nblocks >= 3,
                "store of {} blocks cannot hold superblock, root, and a free block",
                nblocks
            );

            let mut superblock = self.fresh_node(NodeType::Superblock);
            superblock.set_rootnode(SUPERBLOCK_INDEX + 1);
            superblock.set_freelist(SUPERBLOCK_INDEX + 2);
            self.store.notify_allocate(SUPERBLOCK_INDEX);
            superblock
                .write(&mut self.store, SUPERBLOCK_INDEX)
                .wrap_err("writing fresh superblock")?;

            let mut root = self.fresh_node(NodeType::Root);
            root.set_rootnode(SUPERBLOCK_INDEX + 1);
            root.set_freelist(SUPERBLOCK_INDEX + 2);
            self.store.notify_allocate(SUPERBLOCK_INDEX + 1);
            root.write(&mut self.store, SUPERBLOCK_INDEX + 1)
                .wrap_err("writing fresh root")?;

            for i in SUPERBLOCK_INDEX + 2..nblocks {
                let mut free = self.fresh_node(NodeType::Unallocated);
                free.set_rootnode(SUPERBLOCK_INDEX + 1);
                free.set_freelist(if i + 1 == nblocks { 0 } else { i + 1 });
                free.write(&mut self.store, i)
                    .wrap_err_with(|| format!("chaining free block {i}"))?;
            }

            debug!("formatted store: {} blocks, free chain 2..{}", nblocks, nblocks);
        }

        let superblock = Node::read(&self.store, SUPERBLOCK_INDEX)?;
        if superblock.node_type() != NodeType::Superblock {
            bail!(BTreeError::Insane(format!(
                "block 0 is {:?}, not a superblock",
                superblock.node_type()
            )));
        }
        ensure!(
            superblock.keysize() == self.superblock.keysize(),
            "store keysize {} != index keysize {}",
            superblock.keysize(),
            self.superblock.keysize()
        );
        ensure!(
            superblock.valuesize() == self.superblock.valuesize(),
            "store valuesize {} != index valuesize {}",
            superblock.valuesize(),
            self.superblock.valuesize()
        );
        ensure!(
            superblock.blocksize() as usize == self.store.block_size(),
            "store block size {} != superblock block size {}",
            self.store.block_size(),
            superblock.blocksize()
        );

        self.superblock = superblock;
        debug!(
            "attached: root block {}, free head {}",
            self.superblock.rootnode(),
            self.superblock.freelist()
        );
        Ok(())
    }

    /// Writes the superblock back. The handle stays usable.
    pub fn detach(&mut self) -> Result<()> {
        self.superblock
            .write(&mut self.store, SUPERBLOCK_INDEX)
            .wrap_err("writing superblock on detach")
    }

    /// Pops the free-list head. The superblock is written through and the
    /// store is told about the allocation. Fails with `NoSpace` when the
    /// chain is empty.
    pub fn allocate_node(&mut self) -> Result<u64> {
        let n = self.superblock.freelist();
        if n == 0 {
            bail!(BTreeError::NoSpace);
        }

        let node = Node::read(&self.store, n)?;
        if node.node_type() != NodeType::Unallocated {
            bail!(BTreeError::Insane(format!(
                "free-list head {} is {:?}, not unallocated",
                n,
                node.node_type()
            )));
        }

        self.superblock.set_freelist(node.freelist());
        self.superblock.write(&mut self.store, SUPERBLOCK_INDEX)?;
        self.store.notify_allocate(n);
        trace!("allocated block {}", n);
        Ok(n)
    }

    /// Returns block `n` to the free list: re-types it, chains it to the
    /// current head, and advances the head to `n`.
    pub fn deallocate_node(&mut self, n: u64) -> Result<()> {
        let mut node = Node::read(&self.store, n)?;
        if node.node_type() == NodeType::Unallocated {
            bail!(BTreeError::Insane(format!(
                "double free of block {}",
                n
            )));
        }

        node.set_node_type(NodeType::Unallocated);
        node.set_freelist(self.superblock.freelist());
        node.write(&mut self.store, n)?;

        self.superblock.set_freelist(n);
        self.superblock.write(&mut self.store, SUPERBLOCK_INDEX)?;
        self.store.notify_deallocate(n);
        trace!("deallocated block {}", n);
        Ok(())
    }

    fn check_key(&self, key: &[u8]) -> Result<()> {
        ensure!(
            key.len() == self.keysize() as usize,
            "key width {} != keysize {}",
            key.len(),
            self.keysize()
        );
        Ok(())
    }

    fn check_value(&self, value: &[u8]) -> Result<()> {
        ensure!(
            value.len() == self.valuesize() as usize,
            "value width {} != valuesize {}",
            value.len(),
            self.valuesize()
        );
        Ok(())
    }

    /// Point lookup. Fails with `NonExistent` when the key is absent.
    pub fn lookup(&self, key: &[u8]) -> Result<Value> {
        self.check_key(key)?;
        let key = Key::new(key);
        let (leaf, slot) = self.locate(self.superblock.rootnode(), &key)?;
        Node::read(&self.store, leaf)?.value_at(slot)
    }

    /// Overwrites the value stored for `key` in place. No structural change.
    pub fn update(&mut self, key: &[u8], value: &[u8]) -> Result<()> {
        self.check_key(key)?;
        self.check_value(value)?;
        let key = Key::new(key);
        let (leaf, slot) = self.locate(self.superblock.rootnode(), &key)?;

        let mut node = Node::read(&self.store, leaf)?;
        node.set_value(slot, &Value::new(value))?;
        node.write(&mut self.store, leaf)
    }

    /// Deletion with rebalancing is not provided.
    pub fn delete(&mut self, key: &[u8]) -> Result<()> {
        self.check_key(key)?;
        bail!(BTreeError::Unimplemented)
    }

    /// Shared descent for lookup and update: resolves `key` to its leaf
    /// block and slot. Equal keys follow the left child of a matching
    /// separator, which reaches the leaf that keeps the separator's copy.
    fn locate(&self, block: u64, key: &Key) -> Result<(u64, usize)> {
        let node = Node::read(&self.store, block)?;

        match node.node_type() {
            NodeType::Root | NodeType::Interior => {
                let n = node.numkeys();
                for slot in 0..n {
                    if *key <= node.key_at(slot)? {
                        return self.locate(node.ptr_at(slot)?, key);
                    }
                }
                if n > 0 {
                    self.locate(node.ptr_at(n)?, key)
                } else {
                    bail!(BTreeError::NonExistent)
                }
            }
            NodeType::Leaf => {
                for slot in 0..node.numkeys() {
                    if node.key_at(slot)? == *key {
                        return Ok((block, slot));
                    }
                }
                bail!(BTreeError::NonExistent)
            }
            other => bail!(BTreeError::Insane(format!(
                "descent reached {:?} at block {}",
                other, block
            ))),
        }
    }

    /// Inserts a new pair. Fails with `Conflict` if the key exists (the
    /// tree is untouched), `NoSpace` if a needed split cannot allocate.
    pub fn insert(&mut self, key: &[u8], value: &[u8]) -> Result<()> {
        self.check_key(key)?;
        self.check_value(value)?;
        let kv = KeyValuePair::new(Key::new(key), Value::new(value));

        match self.insert_at(self.superblock.rootnode(), &kv)? {
            Promotion::None => Ok(()),
            Promotion::Promoted { key, right } => self.grow_root(key, right),
        }
    }

    /// One level of the recursive insert descent.
    fn insert_at(&mut self, block: u64, kv: &KeyValuePair) -> Result<Promotion> {
        let node = Node::read(&self.store, block)?;

        match node.node_type() {
            NodeType::Root if node.numkeys() == 0 => self.bootstrap_root(block, node, kv),
            NodeType::Root | NodeType::Interior => self.insert_below(block, node, kv),
            NodeType::Leaf => self.insert_into_leaf(block, node, kv),
            other => bail!(BTreeError::Insane(format!(
                "insert descent reached {:?} at block {}",
                other, block
            ))),
        }
    }

    /// First insert into a fresh tree: the empty root becomes a proper
    /// inner node over two new leaves, the left holding the pair and the
    /// right empty. Later inserts of larger keys land in the right leaf via
    /// the rightmost-pointer descent rule.
    fn bootstrap_root(&mut self, block: u64, mut root: Node, kv: &KeyValuePair) -> Result<Promotion> {
        let mut lhs = self.fresh_node(NodeType::Leaf);
        lhs.set_ptr(0, 0)?;
        lhs.insert_key_value(0, kv)?;

        let mut rhs = self.fresh_node(NodeType::Leaf);
        rhs.set_ptr(0, 0)?;

        let lhs_block = self.allocate_node()?;
        let rhs_block = self.allocate_node()?;

        root.set_numkeys(1);
        root.set_key(0, &kv.key)?;
        root.set_ptr(0, lhs_block)?;
        root.set_ptr(1, rhs_block)?;

        lhs.write(&mut self.store, lhs_block)?;
        rhs.write(&mut self.store, rhs_block)?;
        root.write(&mut self.store, block)?;

        debug!(
            "bootstrapped root {}: leaves {} and {}",
            block, lhs_block, rhs_block
        );
        Ok(Promotion::None)
    }

    /// Insert descent through an inner node. On return from the child, a
    /// promotion is spliced in at the slot the descent took; crossing the
    /// fill threshold splits this node in turn.
    fn insert_below(&mut self, block: u64, mut node: Node, kv: &KeyValuePair) -> Result<Promotion> {
        let n = node.numkeys();
        if n == 0 {
            // An inner node with no keys has nowhere to send the pair.
            bail!(BTreeError::NonExistent);
        }

        let mut child_slot = n;
        for slot in 0..n {
            let probe = node.key_at(slot)?;
            if kv.key == probe {
                bail!(BTreeError::Conflict);
            }
            if kv.key < probe {
                child_slot = slot;
                break;
            }
        }

        let child = node.ptr_at(child_slot)?;
        match self.insert_at(child, kv)? {
            Promotion::None => Ok(Promotion::None),
            Promotion::Promoted { key, right } => {
                node.insert_key_ptr(child_slot, &KeyPointerPair::new(key, right))?;

                let threshold = node.interior_capacity() * 2 / 3;
                let promotion = if node.numkeys() >= threshold {
                    let (separator, right) = self.split_inner(&mut node)?;
                    Promotion::Promoted {
                        key: separator,
                        right,
                    }
                } else {
                    Promotion::None
                };

                node.write(&mut self.store, block)?;
                Ok(promotion)
            }
        }
    }

    /// Insert into a leaf at its sorted position; an empty leaf (the
    /// bootstrap's right sibling) takes the pair at slot 0.
    fn insert_into_leaf(&mut self, block: u64, mut node: Node, kv: &KeyValuePair) -> Result<Promotion> {
        let n = node.numkeys();
        let mut slot = n;
        for i in 0..n {
            let probe = node.key_at(i)?;
            if kv.key == probe {
                bail!(BTreeError::Conflict);
            }
            if kv.key < probe {
                slot = i;
                break;
            }
        }

        node.insert_key_value(slot, kv)?;

        let threshold = node.leaf_capacity() * 2 / 3;
        let promotion = if node.numkeys() >= threshold {
            let (separator, right) = self.split_leaf(&mut node)?;
            Promotion::Promoted {
                key: separator,
                right,
            }
        } else {
            Promotion::None
        };

        node.write(&mut self.store, block)?;
        Ok(promotion)
    }

    /// Splits a leaf: the lower `n / 2` pairs stay, the rest move to a new
    /// right leaf, and the right leaf's first key is promoted while staying
    /// in place. The caller writes the shrunken left leaf.
    fn split_leaf(&mut self, node: &mut Node) -> Result<(Key, u64)> {
        let n = node.numkeys();
        let lhs_n = n / 2;
        let rhs_n = n - lhs_n;

        let separator = node.key_at(lhs_n)?;

        let right_block = self
            .allocate_node()
            .wrap_err("allocating right leaf for split")?;

        let mut rhs = self.fresh_node(NodeType::Leaf);
        rhs.set_numkeys(rhs_n);
        for (to, from) in (lhs_n..n).enumerate() {
            let pair = node.key_value_at(from)?;
            rhs.set_key_value(to, &pair)?;
        }
        // Carry the reserved leaf-chain slot so the on-disk format stays
        // stable for a future range-scan extension.
        rhs.set_ptr(0, node.ptr_at(0)?)?;
        rhs.write(&mut self.store, right_block)?;

        node.set_numkeys(lhs_n);
        trace!(
            "leaf split: {} pairs left, {} right into block {}",
            lhs_n,
            rhs_n,
            right_block
        );
        Ok((separator, right_block))
    }

    /// Splits an inner node: the key at `n / 2` is lifted out as the
    /// separator, keys above it and their right-hand pointers move to a new
    /// interior block. The caller writes the shrunken left node.
    fn split_inner(&mut self, node: &mut Node) -> Result<(Key, u64)> {
        let n = node.numkeys();
        let lhs_n = n / 2;
        let rhs_n = if n % 2 == 0 { n / 2 - 1 } else { n / 2 };

        let separator = node.key_at(lhs_n)?;

        let right_block = self
            .allocate_node()
            .wrap_err("allocating right sibling for split")?;

        let mut rhs = self.fresh_node(NodeType::Interior);
        rhs.set_numkeys(rhs_n);
        for (to, from) in (lhs_n + 1..n).enumerate() {
            rhs.set_key(to, &node.key_at(from)?)?;
            rhs.set_ptr(to, node.ptr_at(from)?)?;
        }
        rhs.set_ptr(rhs_n, node.ptr_at(n)?)?;
        rhs.write(&mut self.store, right_block)?;

        node.set_numkeys(lhs_n);
        trace!(
            "interior split: {} keys left, {} right into block {}",
            lhs_n,
            rhs_n,
            right_block
        );
        Ok((separator, right_block))
    }

    /// A promotion escaped the root: allocate a fresh root block holding
    /// one separator over the old root and its new sibling. The old root is
    /// demoted to an interior node and the superblock learns the new root
    /// last. This is the only place tree height grows.
    fn grow_root(&mut self, separator: Key, right: u64) -> Result<()> {
        let old_root = self.superblock.rootnode();

        let mut old = Node::read(&self.store, old_root)?;
        old.set_node_type(NodeType::Interior);
        old.write(&mut self.store, old_root)?;

        let new_block = self.allocate_node().wrap_err("allocating new root")?;

        let mut root = self.fresh_node(NodeType::Root);
        root.set_rootnode(new_block);
        root.set_numkeys(1);
        root.set_key(0, &separator)?;
        root.set_ptr(0, old_root)?;
        root.set_ptr(1, right)?;
        root.write(&mut self.store, new_block)?;

        self.superblock.set_rootnode(new_block);
        self.superblock.write(&mut self.store, SUPERBLOCK_INDEX)?;

        debug!("root grew: {} -> {}", old_root, new_block);
        Ok(())
    }

    /// Verifies the structural invariants: key order with separator bounds,
    /// uniform leaf depth, per-type capacity, and the partition of all
    /// blocks into {superblock} ∪ reachable ∪ free. Read-only.
    pub fn sanity_check(&self) -> Result<()> {
        let nblocks = self.store.block_count();
        let mut seen = vec![false; nblocks as usize];
        seen[SUPERBLOCK_INDEX as usize] = true;

        let mut leaf_depth = None;
        self.check_subtree(
            self.superblock.rootnode(),
            0,
            None,
            None,
            true,
            &mut leaf_depth,
            &mut seen,
        )?;

        let mut free = self.superblock.freelist();
        while free != 0 {
            if free >= nblocks {
                bail!(BTreeError::Insane(format!(
                    "free chain names block {} past the store ({} blocks)",
                    free, nblocks
                )));
            }
            if seen[free as usize] {
                bail!(BTreeError::Insane(format!(
                    "block {} is both reachable and on the free list",
                    free
                )));
            }
            seen[free as usize] = true;

            let node = Node::read(&self.store, free)?;
            if node.node_type() != NodeType::Unallocated {
                bail!(BTreeError::Insane(format!(
                    "free block {} is typed {:?}",
                    free,
                    node.node_type()
                )));
            }
            free = node.freelist();
        }

        for (block, covered) in seen.iter().enumerate() {
            if !covered {
                bail!(BTreeError::Insane(format!(
                    "block {} is neither reachable nor free",
                    block
                )));
            }
        }

        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    fn check_subtree(
        &self,
        block: u64,
        depth: usize,
        lower: Option<&Key>,
        upper: Option<&Key>,
        is_root: bool,
        leaf_depth: &mut Option<usize>,
        seen: &mut [bool],
    ) -> Result<()> {
        if block >= self.store.block_count() {
            bail!(BTreeError::Insane(format!(
                "tree names block {} past the store",
                block
            )));
        }
        if !is_root && seen[block as usize] {
            bail!(BTreeError::Insane(format!(
                "block {} reached twice",
                block
            )));
        }
        seen[block as usize] = true;

        let node = Node::read(&self.store, block)?;
        let is_root_type = node.node_type() == NodeType::Root;
        if is_root != is_root_type {
            bail!(BTreeError::Insane(format!(
                "block {} is typed {:?} {} the root position",
                block,
                node.node_type(),
                if is_root { "at" } else { "outside" }
            )));
        }

        match node.node_type() {
            NodeType::Root | NodeType::Interior => {
                let n = node.numkeys();
                if n > node.interior_capacity() {
                    bail!(BTreeError::Insane(format!(
                        "interior block {} holds {} keys over capacity {}",
                        block,
                        n,
                        node.interior_capacity()
                    )));
                }

                let keys: Vec<Key> = (0..n).map(|i| node.key_at(i)).collect::<Result<_>>()?;
                self.check_key_bounds(block, &keys, lower, upper)?;

                if n > 0 {
                    for slot in 0..=n {
                        let child_lower = if slot == 0 { lower } else { Some(&keys[slot - 1]) };
                        let child_upper = if slot == n { upper } else { Some(&keys[slot]) };
                        self.check_subtree(
                            node.ptr_at(slot)?,
                            depth + 1,
                            child_lower,
                            child_upper,
                            false,
                            leaf_depth,
                            seen,
                        )?;
                    }
                }
                Ok(())
            }
            NodeType::Leaf => {
                let n = node.numkeys();
                if n > node.leaf_capacity() {
                    bail!(BTreeError::Insane(format!(
                        "leaf block {} holds {} keys over capacity {}",
                        block,
                        n,
                        node.leaf_capacity()
                    )));
                }

                let keys: Vec<Key> = (0..n).map(|i| node.key_at(i)).collect::<Result<_>>()?;
                self.check_key_bounds(block, &keys, lower, upper)?;

                match leaf_depth {
                    None => *leaf_depth = Some(depth),
                    Some(expected) if *expected != depth => bail!(BTreeError::Insane(format!(
                        "leaf block {} at depth {} but tree leaves sit at {}",
                        block, depth, expected
                    ))),
                    Some(_) => {}
                }
                Ok(())
            }
            other => bail!(BTreeError::Insane(format!(
                "tree walk reached {:?} at block {}",
                other, block
            ))),
        }
    }

    fn check_key_bounds(
        &self,
        block: u64,
        keys: &[Key],
        lower: Option<&Key>,
        upper: Option<&Key>,
    ) -> Result<()> {
        for pair in keys.windows(2) {
            if pair[0] >= pair[1] {
                bail!(BTreeError::Insane(format!(
                    "keys out of order in block {}",
                    block
                )));
            }
        }
        if let (Some(lower), Some(first)) = (lower, keys.first()) {
            if first < lower {
                bail!(BTreeError::Insane(format!(
                    "key below subtree bound in block {}",
                    block
                )));
            }
        }
        if let (Some(upper), Some(last)) = (upper, keys.last()) {
            if last >= upper {
                bail!(BTreeError::Insane(format!(
                    "key at or above subtree bound in block {}",
                    block
                )));
            }
        }
        Ok(())
    }
}
