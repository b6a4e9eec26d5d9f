//! # Interior Nodes
//!
//! An interior node routes descents over a set of child subtrees. Each cell
//! pairs a child page with a separator key that upper-bounds every key in
//! that child's subtree; the header's `right_pointer` names the rightmost
//! subtree, which holds everything at or above the last separator.
//!
//! ## Page Layout
//!
//! ```text
//! +---------------------------+
//! | Node header (14 bytes)    |
//! +---------------------------+
//! | Cell 0: child | key       |  8 bytes each
//! | Cell 1: child | key       |
//! | ...                       |
//! +---------------------------+
//! | Zeroed tail               |
//! +---------------------------+
//! ```
//!
//! Interior cells only ever appear through split promotion, so separator
//! keys are unique by construction and never change on delete.

use eyre::{ensure, Result};

use crate::storage::{NodeHeader, NodeType, Pager, NODE_HEADER_SIZE, PAGE_SIZE};

use super::node::Node;
use super::{read_u32, MAX_CELLS};

pub const INTERIOR_CELL_SIZE: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InteriorCell {
    pub child_page: u32,
    pub key: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InteriorNode {
    pub(crate) page: u32,
    pub(crate) is_root: bool,
    pub(crate) right_pointer: u32,
    pub(crate) cells: Vec<InteriorCell>,
}

impl InteriorNode {
    pub fn new(page: u32, is_root: bool) -> Self {
        Self {
            page,
            is_root,
            right_pointer: 0,
            cells: Vec::new(),
        }
    }

    /// Deserializes an interior node from its page. A wrong type byte is
    /// data corruption and fails immediately.
    pub fn load(data: &[u8], page_no: u32) -> Result<Self> {
        ensure!(
            data.len() == PAGE_SIZE,
            "invalid page size: {} != {}",
            data.len(),
            PAGE_SIZE
        );

        let header = NodeHeader::from_bytes(data)?;
        ensure!(
            header.node_type() == Some(NodeType::Interior),
            "page {}: expected interior page, got type byte {:#04x}",
            page_no,
            header.type_byte()
        );

        let count = header.num_cells() as usize;
        ensure!(
            count <= MAX_CELLS,
            "page {}: implausible cell count {}",
            page_no,
            count
        );

        let mut cells = Vec::with_capacity(count);
        let mut off = NODE_HEADER_SIZE;
        for _ in 0..count {
            let child_page = read_u32(data, off);
            let key = read_u32(data, off + 4);
            off += INTERIOR_CELL_SIZE;
            cells.push(InteriorCell { child_page, key });
        }

        Ok(Self {
            page: page_no,
            is_root: header.is_root(),
            right_pointer: header.right_pointer(),
            cells,
        })
    }

    pub fn serialize(&self, data: &mut [u8]) -> Result<()> {
        ensure!(
            data.len() == PAGE_SIZE,
            "invalid page size: {} != {}",
            data.len(),
            PAGE_SIZE
        );
        ensure!(
            self.cells.len() <= MAX_CELLS,
            "interior page {} holds {} cells, max is {}",
            self.page,
            self.cells.len(),
            MAX_CELLS
        );

        data.fill(0);

        let mut header = NodeHeader::new(NodeType::Interior);
        header.set_is_root(self.is_root);
        header.set_num_cells(self.cells.len() as u32);
        header.set_right_pointer(self.right_pointer);
        header.write_to(data)?;

        let mut off = NODE_HEADER_SIZE;
        for cell in &self.cells {
            data[off..off + 4].copy_from_slice(&cell.child_page.to_le_bytes());
            data[off + 4..off + 8].copy_from_slice(&cell.key.to_le_bytes());
            off += INTERIOR_CELL_SIZE;
        }

        Ok(())
    }

    /// Routes a key to a child subtree: the first cell whose separator is
    /// strictly greater than `key`, falling through to the rightmost
    /// subtree. A key equal to a separator routes right, where the split
    /// that promoted the separator placed it. Returns the child page and
    /// the cell index used (`cells.len()` for the rightmost subtree).
    pub fn find_child(&self, key: u32) -> (u32, usize) {
        let idx = self.cells.partition_point(|c| c.key <= key);
        if idx < self.cells.len() {
            (self.cells[idx].child_page, idx)
        } else {
            (self.right_pointer, idx)
        }
    }

    /// Child page for the smallest keys, used to reach the left-most leaf.
    pub fn first_child(&self) -> u32 {
        self.cells
            .first()
            .map(|c| c.child_page)
            .unwrap_or(self.right_pointer)
    }

    /// Descends into the child chosen by [`find_child`], recurses, and
    /// serializes whatever the recursion changed. When the child split,
    /// the separator is spliced in here: the child keeps its slot's lower
    /// range, and the pointer that used to route to it is repointed at the
    /// new sibling. An overflow past `MAX_CELLS` splits this node in turn,
    /// promoting the median cell's key and handing the median's child to
    /// the left half as its rightmost subtree.
    ///
    /// [`find_child`]: InteriorNode::find_child
    pub fn insert(
        &mut self,
        pager: &mut Pager,
        row_size: usize,
        key: u32,
        row: &[u8],
    ) -> Result<Option<(InteriorNode, u32)>> {
        let (child_page, idx) = self.find_child(key);

        let mut child = Node::load(pager, child_page, row_size)?;
        let split = child.insert(pager, row_size, key, row)?;
        child.serialize_to(pager)?;

        let Some((sibling, separator)) = split else {
            return Ok(None);
        };
        sibling.serialize_to(pager)?;

        self.cells.insert(
            idx,
            InteriorCell {
                child_page,
                key: separator,
            },
        );
        if idx + 1 < self.cells.len() {
            self.cells[idx + 1].child_page = sibling.page();
        } else {
            self.right_pointer = sibling.page();
        }

        if self.cells.len() <= MAX_CELLS {
            return Ok(None);
        }

        let sibling_page = pager.allocate_page()?;
        let mut new_sibling = InteriorNode::new(sibling_page, false);

        let mid = self.cells.len() / 2;
        let median = self.cells[mid];
        new_sibling.cells = self.cells.split_off(mid + 1);
        new_sibling.right_pointer = self.right_pointer;
        self.cells.truncate(mid);
        self.right_pointer = median.child_page;

        Ok(Some((new_sibling, median.key)))
    }

    /// Descends by the same routing rule and deletes recursively. The
    /// child is re-serialized only when the delete landed; interior cells
    /// themselves never change.
    pub fn delete(&mut self, pager: &mut Pager, row_size: usize, key: u32) -> Result<bool> {
        let (child_page, _) = self.find_child(key);

        let mut child = Node::load(pager, child_page, row_size)?;
        let found = child.delete(pager, row_size, key)?;
        if found {
            child.serialize_to(pager)?;
        }
        Ok(found)
    }

    pub fn page(&self) -> u32 {
        self.page
    }

    pub fn is_root(&self) -> bool {
        self.is_root
    }

    pub fn num_cells(&self) -> usize {
        self.cells.len()
    }

    pub fn right_pointer(&self) -> u32 {
        self.right_pointer
    }

    pub fn cell_at(&self, idx: usize) -> InteriorCell {
        self.cells[idx]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn routing_node() -> InteriorNode {
        // children: [2] keys < 10, [3] keys in [10, 20), [4] keys >= 20
        let mut node = InteriorNode::new(1, true);
        node.cells.push(InteriorCell {
            child_page: 2,
            key: 10,
        });
        node.cells.push(InteriorCell {
            child_page: 3,
            key: 20,
        });
        node.right_pointer = 4;
        node
    }

    #[test]
    fn find_child_routes_below_separator_left() {
        let node = routing_node();

        assert_eq!(node.find_child(0), (2, 0));
        assert_eq!(node.find_child(9), (2, 0));
        assert_eq!(node.find_child(15), (3, 1));
    }

    #[test]
    fn find_child_routes_separator_key_right() {
        let node = routing_node();

        assert_eq!(node.find_child(10), (3, 1));
        assert_eq!(node.find_child(20), (4, 2));
        assert_eq!(node.find_child(u32::MAX), (4, 2));
    }

    #[test]
    fn find_child_with_no_cells_uses_right_pointer() {
        let mut node = InteriorNode::new(1, false);
        node.right_pointer = 8;

        assert_eq!(node.find_child(123), (8, 0));
        assert_eq!(node.first_child(), 8);
    }

    #[test]
    fn first_child_prefers_leftmost_cell() {
        let node = routing_node();
        assert_eq!(node.first_child(), 2);
    }

    #[test]
    fn serialize_load_roundtrip() {
        let mut node = routing_node();
        node.is_root = false;

        let mut buf = vec![0u8; PAGE_SIZE];
        node.serialize(&mut buf).unwrap();

        let loaded = InteriorNode::load(&buf, 1).unwrap();
        assert_eq!(loaded, node);
    }

    #[test]
    fn serialized_cell_layout_is_child_then_key() {
        let node = routing_node();

        let mut buf = vec![0u8; PAGE_SIZE];
        node.serialize(&mut buf).unwrap();

        assert_eq!(buf[0], NodeType::Interior as u8);
        assert_eq!(read_u32(&buf, NODE_HEADER_SIZE), 2);
        assert_eq!(read_u32(&buf, NODE_HEADER_SIZE + 4), 10);
        assert_eq!(read_u32(&buf, NODE_HEADER_SIZE + 8), 3);
        assert_eq!(read_u32(&buf, NODE_HEADER_SIZE + 12), 20);
    }

    #[test]
    fn load_rejects_leaf_page() {
        let mut buf = vec![0u8; PAGE_SIZE];
        let header = NodeHeader::new(NodeType::Leaf);
        header.write_to(&mut buf).unwrap();

        let result = InteriorNode::load(&buf, 6);
        assert!(result.is_err());
        assert!(result
            .unwrap_err()
            .to_string()
            .contains("expected interior page"));
    }
}
