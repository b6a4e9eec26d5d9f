//! # Cursor Traversal
//!
//! A cursor pins one leaf (an owned copy of its page) and a slot index
//! inside it, and walks the leaf chain through each leaf's forward
//! pointer. Interior levels are touched only when the cursor is created
//! or repositioned with a seek; advancing never goes back up the tree.
//!
//! The cursor holds the tree exclusively for its lifetime, so the tree
//! cannot be mutated mid-iteration. Leaves emptied by earlier deletions
//! are skipped transparently: the cursor settles on the next slot that
//! actually holds a cell, or goes invalid at the end of the chain.

use eyre::{ensure, Result};

use crate::records::Row;

use super::leaf::LeafNode;
use super::tree::BTree;

#[derive(Debug)]
pub struct Cursor<'a> {
    tree: &'a mut BTree,
    leaf: LeafNode,
    page: u32,
    idx: usize,
    valid: bool,
}

impl<'a> Cursor<'a> {
    pub(crate) fn new(tree: &'a mut BTree, leaf: LeafNode, idx: usize) -> Result<Cursor<'a>> {
        let page = leaf.page();
        let mut cursor = Cursor {
            tree,
            leaf,
            page,
            idx,
            valid: false,
        };
        cursor.settle()?;
        Ok(cursor)
    }

    /// Whether the cursor is positioned on an existing cell. `key` and
    /// `value` are only defined while this holds.
    pub fn valid(&self) -> bool {
        self.valid
    }

    pub fn key(&self) -> Result<u32> {
        ensure!(self.valid, "cursor is not positioned on a row");
        Ok(self.leaf.key_at(self.idx))
    }

    pub fn value(&self) -> Result<Row> {
        ensure!(self.valid, "cursor is not positioned on a row");
        self.tree.schema().deserialize_row(self.leaf.row_at(self.idx))
    }

    /// Page number of the pinned leaf.
    pub fn page(&self) -> u32 {
        self.page
    }

    /// Moves to the next key in order. Returns `false` once the cursor
    /// has run off the end of the leaf chain.
    pub fn advance(&mut self) -> Result<bool> {
        if !self.valid {
            return Ok(false);
        }
        self.idx += 1;
        self.settle()?;
        Ok(self.valid)
    }

    /// Repositions at the smallest key `>= target`, leaving the cursor
    /// invalid when every key in the tree is smaller.
    pub fn seek(&mut self, target: u32) -> Result<()> {
        let leaf = self.tree.find_leaf(target)?;
        self.idx = leaf.lower_bound(target);
        self.page = leaf.page();
        self.leaf = leaf;
        self.settle()
    }

    /// Resolves the current position: if `idx` points past the pinned
    /// leaf's cells, follows the leaf chain until a cell exists or the
    /// chain ends.
    fn settle(&mut self) -> Result<()> {
        loop {
            if self.idx < self.leaf.num_cells() {
                self.valid = true;
                return Ok(());
            }
            let next = self.leaf.right_pointer();
            if next == 0 {
                self.valid = false;
                return Ok(());
            }
            self.leaf = self.tree.load_leaf(next)?;
            self.page = next;
            self.idx = 0;
        }
    }
}
