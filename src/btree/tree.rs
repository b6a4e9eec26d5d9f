//! # B+Tree Driver
//!
//! [`BTree`] owns the pager, the row schema, and the root page number. It
//! drives descents, applies the split/promote protocol at the root, and
//! keeps the meta page's root pointer in sync with the in-memory one.
//!
//! ## On-Disk Bootstrap
//!
//! A fresh file gets two pages: page 0 (meta) and page 1 (an empty root
//! leaf). Reopening an existing file reads the root pointer back from the
//! meta page; nothing else is touched until a descent needs it.
//!
//! ## Root Split
//!
//! When an insert splits the root, a new interior root is allocated with a
//! single separator cell pointing at the demoted old root and a rightmost
//! subtree pointing at the new sibling. The old root loses its root flag,
//! every touched node is re-serialized, and the meta page is updated
//! before the insert returns. The tree grows by one level and nothing
//! below the root moves.
//!
//! ## Durability
//!
//! Mutations land in the pager's cache and reach disk on [`BTree::flush`]
//! or [`BTree::close`]. There is no write-ahead log and no crash recovery;
//! a process death between flushes loses unflushed writes.

use std::path::Path;

use eyre::{ensure, Result};

use crate::records::{Row, Schema, Value};
use crate::storage::{MetaHeader, Pager, META_PAGE, NODE_HEADER_SIZE, PAGE_SIZE};

use super::cursor::Cursor;
use super::interior::{InteriorCell, InteriorNode};
use super::leaf::LeafNode;
use super::node::Node;
use super::MAX_CELLS;

#[derive(Debug)]
pub struct BTree {
    pub(crate) pager: Pager,
    pub(crate) schema: Schema,
    pub(crate) root_page: u32,
}

impl BTree {
    /// Opens or creates a tree backed by `path`. The schema fixes the row
    /// width for the tree's lifetime and must fit a full node in one page.
    pub fn open<P: AsRef<Path>>(path: P, schema: Schema) -> Result<Self> {
        let row_size = schema.row_size() as usize;
        let cell_size = 4 + row_size;
        ensure!(
            NODE_HEADER_SIZE + MAX_CELLS * cell_size <= PAGE_SIZE,
            "row size {}: {} cells of {} bytes do not fit a {}-byte page",
            row_size,
            MAX_CELLS,
            cell_size,
            PAGE_SIZE
        );

        let mut pager = Pager::open(path)?;

        if pager.page_count() == 0 {
            pager.allocate_page()?; // meta page 0
            let root_page = pager.allocate_page()?;

            let root = LeafNode::new(root_page, true, row_size);
            root.serialize(pager.page_mut(root_page)?)?;

            let data = pager.page_mut(META_PAGE)?;
            MetaHeader::from_bytes_mut(data)?.set_root_page(root_page);

            return Ok(Self {
                pager,
                schema,
                root_page,
            });
        }

        let data = pager.page(META_PAGE)?;
        let root_page = MetaHeader::from_bytes(data)?.root_page();
        ensure!(
            root_page != META_PAGE && root_page < pager.page_count(),
            "corrupt meta page: root pointer {} ({} pages)",
            root_page,
            pager.page_count()
        );

        Ok(Self {
            pager,
            schema,
            root_page,
        })
    }

    /// Encodes `row` against the schema and inserts it under `key`. Splits
    /// propagate up the descent; a split that reaches the root grows the
    /// tree by one level.
    pub fn insert(&mut self, key: u32, row: &[Value]) -> Result<()> {
        let mut blob = vec![0u8; self.schema.row_size() as usize];
        self.schema.serialize_row(row, &mut blob)?;
        let row_size = blob.len();

        let mut root = Node::load(&mut self.pager, self.root_page, row_size)?;
        match root.insert(&mut self.pager, row_size, key, &blob)? {
            None => root.serialize_to(&mut self.pager),
            Some((sibling, separator)) => self.promote_root(root, sibling, separator),
        }
    }

    /// Exact-match lookup. "Not present" is a successful `None`, never an
    /// error.
    pub fn search(&mut self, key: u32) -> Result<Option<Row>> {
        let row_size = self.schema.row_size() as usize;
        let mut current = self.root_page;

        loop {
            match Node::load(&mut self.pager, current, row_size)? {
                Node::Leaf(leaf) => {
                    return match leaf.search(key) {
                        Some(row) => Ok(Some(self.schema.deserialize_row(row)?)),
                        None => Ok(None),
                    };
                }
                Node::Interior(node) => {
                    let (child, _) = node.find_child(key);
                    current = child;
                }
            }
        }
    }

    /// Removes `key` if present. The tree never shrinks structurally:
    /// deletion only drops the leaf cell, and underfull nodes are
    /// tolerated.
    pub fn delete(&mut self, key: u32) -> Result<bool> {
        let row_size = self.schema.row_size() as usize;

        let mut root = Node::load(&mut self.pager, self.root_page, row_size)?;
        let found = root.delete(&mut self.pager, row_size, key)?;
        if found {
            root.serialize_to(&mut self.pager)?;
        }
        Ok(found)
    }

    /// Cursor positioned at the smallest key in the tree.
    pub fn cursor_first(&mut self) -> Result<Cursor<'_>> {
        let leaf = self.first_leaf()?;
        Cursor::new(self, leaf, 0)
    }

    /// Cursor positioned at the smallest key `>= target`, invalid when no
    /// such key exists.
    pub fn cursor_seek(&mut self, target: u32) -> Result<Cursor<'_>> {
        let leaf = self.find_leaf(target)?;
        let idx = leaf.lower_bound(target);
        Cursor::new(self, leaf, idx)
    }

    /// Writes every dirty page back to the file.
    pub fn flush(&mut self) -> Result<()> {
        self.pager.flush_all()
    }

    /// Flushes and releases the backing file.
    pub fn close(self) -> Result<()> {
        self.pager.close()
    }

    pub fn root_page(&self) -> u32 {
        self.root_page
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// Installs a new interior root above a split: one separator cell for
    /// the demoted old root, the sibling as the rightmost subtree. The
    /// meta page is updated in the same call, before success is reported.
    fn promote_root(&mut self, mut old_root: Node, sibling: Node, separator: u32) -> Result<()> {
        let new_root_page = self.pager.allocate_page()?;

        old_root.set_is_root(false);
        old_root.serialize_to(&mut self.pager)?;
        sibling.serialize_to(&mut self.pager)?;

        let mut new_root = InteriorNode::new(new_root_page, true);
        new_root.cells.push(InteriorCell {
            child_page: old_root.page(),
            key: separator,
        });
        new_root.right_pointer = sibling.page();
        new_root.serialize(self.pager.page_mut(new_root_page)?)?;

        self.root_page = new_root_page;
        let data = self.pager.page_mut(META_PAGE)?;
        MetaHeader::from_bytes_mut(data)?.set_root_page(new_root_page);
        Ok(())
    }

    /// Descends to the leaf that would hold `key`.
    pub(crate) fn find_leaf(&mut self, key: u32) -> Result<LeafNode> {
        let row_size = self.schema.row_size() as usize;
        let mut current = self.root_page;

        loop {
            match Node::load(&mut self.pager, current, row_size)? {
                Node::Leaf(leaf) => return Ok(leaf),
                Node::Interior(node) => {
                    let (child, _) = node.find_child(key);
                    current = child;
                }
            }
        }
    }

    /// Descends to the left-most leaf.
    pub(crate) fn first_leaf(&mut self) -> Result<LeafNode> {
        let row_size = self.schema.row_size() as usize;
        let mut current = self.root_page;

        loop {
            match Node::load(&mut self.pager, current, row_size)? {
                Node::Leaf(leaf) => return Ok(leaf),
                Node::Interior(node) => current = node.first_child(),
            }
        }
    }

    pub(crate) fn load_leaf(&mut self, page_no: u32) -> Result<LeafNode> {
        let row_size = self.schema.row_size() as usize;
        let data = self.pager.page(page_no)?;
        LeafNode::load(data, page_no, row_size)
    }
}
