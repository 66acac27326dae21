//! # Tree Dumps
//!
//! Read-only, depth-first emitters for debugging and inspection:
//!
//! - [`DisplayMode::Depth`]: one line per node with block numbers, pointer
//!   values, and raw key/value bytes
//! - [`DisplayMode::Dot`]: a Graphviz digraph, nodes labelled by block id
//!   and edges from parent to child
//! - [`DisplayMode::SortedKeyVal`]: only leaf `(key,value)` tuples, which
//!   the depth-first walk visits in key order
//!
//! Key and value bytes are rendered lossily as UTF-8; non-text payloads
//! still dump, just not prettily.

use std::io::Write;

use eyre::{bail, Result};

use crate::btree::node::{Node, NodeType};
use crate::btree::tree::BTreeIndex;
use crate::error::BTreeError;
use crate::storage::BlockStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisplayMode {
    Depth,
    Dot,
    SortedKeyVal,
}

fn bytes(buf: &[u8]) -> String {
    String::from_utf8_lossy(buf).into_owned()
}

impl<S: BlockStore> BTreeIndex<S> {
    /// Dumps the tree depth-first. `Dot` output is a complete digraph
    /// suitable for `dot -Tsvg`.
    pub fn display<W: Write>(&self, out: &mut W, mode: DisplayMode) -> Result<()> {
        if mode == DisplayMode::Dot {
            writeln!(out, "digraph tree {{")?;
        }
        self.display_node(self.rootnode(), out, mode)?;
        if mode == DisplayMode::Dot {
            writeln!(out, "}}")?;
        }
        Ok(())
    }

    fn display_node<W: Write>(&self, block: u64, out: &mut W, mode: DisplayMode) -> Result<()> {
        let node = Node::read(self.store(), block)?;

        self.print_node(block, &node, out, mode)?;

        match node.node_type() {
            NodeType::Root | NodeType::Interior => {
                if node.numkeys() > 0 {
                    for slot in 0..=node.numkeys() {
                        let child = node.ptr_at(slot)?;
                        if mode == DisplayMode::Dot {
                            writeln!(out, "{} -> {};", block, child)?;
                        }
                        self.display_node(child, out, mode)?;
                    }
                }
                Ok(())
            }
            NodeType::Leaf => Ok(()),
            other => bail!(BTreeError::Insane(format!(
                "display walk reached {:?} at block {}",
                other, block
            ))),
        }
    }

    fn print_node<W: Write>(
        &self,
        block: u64,
        node: &Node,
        out: &mut W,
        mode: DisplayMode,
    ) -> Result<()> {
        match node.node_type() {
            NodeType::Root | NodeType::Interior => match mode {
                DisplayMode::SortedKeyVal => Ok(()),
                DisplayMode::Depth => {
                    write!(out, "{}: Interior: ", block)?;
                    for slot in 0..=node.numkeys() {
                        write!(out, "*{} ", node.ptr_at(slot)?)?;
                        if slot == node.numkeys() {
                            break;
                        }
                        write!(out, "{} ", bytes(node.key_at(slot)?.as_bytes()))?;
                    }
                    writeln!(out)?;
                    Ok(())
                }
                DisplayMode::Dot => {
                    write!(out, "{} [ label=\"{}: ", block, block)?;
                    for slot in 0..=node.numkeys() {
                        write!(out, "*{} ", node.ptr_at(slot)?)?;
                        if slot == node.numkeys() {
                            break;
                        }
                        write!(out, "{} ", bytes(node.key_at(slot)?.as_bytes()))?;
                    }
                    writeln!(out, "\" ];")?;
                    Ok(())
                }
            },
            NodeType::Leaf => match mode {
                DisplayMode::SortedKeyVal => {
                    for slot in 0..node.numkeys() {
                        writeln!(
                            out,
                            "({},{})",
                            bytes(node.key_at(slot)?.as_bytes()),
                            bytes(node.value_at(slot)?.as_bytes())
                        )?;
                    }
                    Ok(())
                }
                DisplayMode::Depth => {
                    write!(out, "{}: Leaf: *{} ", block, node.ptr_at(0)?)?;
                    for slot in 0..node.numkeys() {
                        write!(
                            out,
                            "{} {} ",
                            bytes(node.key_at(slot)?.as_bytes()),
                            bytes(node.value_at(slot)?.as_bytes())
                        )?;
                    }
                    writeln!(out)?;
                    Ok(())
                }
                DisplayMode::Dot => {
                    write!(out, "{} [ label=\"{}: ", block, block)?;
                    for slot in 0..node.numkeys() {
                        write!(
                            out,
                            "{} {} ",
                            bytes(node.key_at(slot)?.as_bytes()),
                            bytes(node.value_at(slot)?.as_bytes())
                        )?;
                    }
                    writeln!(out, "\" ];")?;
                    Ok(())
                }
            },
            other => bail!(BTreeError::Insane(format!(
                "display reached {:?} at block {}",
                other, block
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MmapStore;
    use tempfile::tempdir;

    fn built_index(store: &mut MmapStore) -> BTreeIndex<&mut MmapStore> {
        let mut index = BTreeIndex::new(store, 4, 4, false).unwrap();
        index.attach(0, true).unwrap();
        for i in [3, 1, 4, 2, 5] {
            let k = format!("{:04}", i);
            index.insert(k.as_bytes(), k.as_bytes()).unwrap();
        }
        index
    }

    fn test_store() -> (tempfile::TempDir, MmapStore) {
        let dir = tempdir().unwrap();
        let store = MmapStore::create(dir.path().join("t.idx"), 108, 16).unwrap();
        (dir, store)
    }

    #[test]
    fn depth_dump_names_every_node_kind() {
        let (_dir, mut store) = test_store();
        let index = built_index(&mut store);

        let mut out = Vec::new();
        index.display(&mut out, DisplayMode::Depth).unwrap();
        let text = String::from_utf8(out).unwrap();

        assert!(text.contains("Interior:"));
        assert!(text.contains("Leaf:"));
        assert!(text.contains("0003"));
    }

    #[test]
    fn dot_dump_is_a_digraph_with_edges() {
        let (_dir, mut store) = test_store();
        let index = built_index(&mut store);

        let mut out = Vec::new();
        index.display(&mut out, DisplayMode::Dot).unwrap();
        let text = String::from_utf8(out).unwrap();

        assert!(text.starts_with("digraph tree {"));
        assert!(text.trim_end().ends_with('}'));
        assert!(text.contains("->"));
        assert!(text.contains("label="));
    }

    #[test]
    fn sorted_dump_lists_pairs_in_key_order() {
        let (_dir, mut store) = test_store();
        let index = built_index(&mut store);

        let mut out = Vec::new();
        index.display(&mut out, DisplayMode::SortedKeyVal).unwrap();
        let text = String::from_utf8(out).unwrap();

        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(
            lines,
            vec![
                "(0001,0001)",
                "(0002,0002)",
                "(0003,0003)",
                "(0004,0004)",
                "(0005,0005)"
            ]
        );
    }

    #[test]
    fn empty_tree_dumps_the_bare_root() {
        let (_dir, mut store) = test_store();
        let mut index = BTreeIndex::new(&mut store, 4, 4, false).unwrap();
        index.attach(0, true).unwrap();

        let mut out = Vec::new();
        index.display(&mut out, DisplayMode::Depth).unwrap();
        let text = String::from_utf8(out).unwrap();

        assert!(text.contains("1: Interior:"));
    }
}
