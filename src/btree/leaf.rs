//! # Leaf Nodes
//!
//! A leaf stores `(key, row)` cells in ascending key order. Rows are opaque
//! fixed-width blobs; the leaf knows their width but never their contents.
//!
//! ## Page Layout
//!
//! ```text
//! +---------------------------+
//! | Node header (14 bytes)    |
//! +---------------------------+
//! | Cell 0: key | row         |  cell width = 4 + row_size
//! | Cell 1: key | row         |
//! | ...                       |
//! +---------------------------+
//! | Zeroed tail               |
//! +---------------------------+
//! ```
//!
//! The header's `right_pointer` names the next leaf in key order, forming
//! the chain the cursor walks; the last leaf stores 0.

use eyre::{ensure, Result};

use crate::storage::{NodeHeader, NodeType, Pager, NODE_HEADER_SIZE, PAGE_SIZE};

use super::{read_u32, MAX_CELLS};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LeafCell {
    pub key: u32,
    pub row: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LeafNode {
    pub(crate) page: u32,
    pub(crate) is_root: bool,
    pub(crate) right_pointer: u32,
    pub(crate) row_size: usize,
    pub(crate) cells: Vec<LeafCell>,
}

impl LeafNode {
    pub fn new(page: u32, is_root: bool, row_size: usize) -> Self {
        Self {
            page,
            is_root,
            right_pointer: 0,
            row_size,
            cells: Vec::new(),
        }
    }

    /// Deserializes a leaf from its page. Fails if the page's type byte
    /// does not mark a leaf, which signals data corruption rather than a
    /// missing key.
    pub fn load(data: &[u8], page_no: u32, row_size: usize) -> Result<Self> {
        ensure!(
            data.len() == PAGE_SIZE,
            "invalid page size: {} != {}",
            data.len(),
            PAGE_SIZE
        );

        let header = NodeHeader::from_bytes(data)?;
        ensure!(
            header.node_type() == Some(NodeType::Leaf),
            "page {}: expected leaf page, got type byte {:#04x}",
            page_no,
            header.type_byte()
        );

        let count = header.num_cells() as usize;
        let cell_size = 4 + row_size;
        ensure!(
            count <= MAX_CELLS && NODE_HEADER_SIZE + count * cell_size <= PAGE_SIZE,
            "page {}: implausible cell count {}",
            page_no,
            count
        );

        let mut cells = Vec::with_capacity(count);
        let mut off = NODE_HEADER_SIZE;
        for _ in 0..count {
            let key = read_u32(data, off);
            off += 4;
            let row = data[off..off + row_size].to_vec();
            off += row_size;
            cells.push(LeafCell { key, row });
        }

        Ok(Self {
            page: page_no,
            is_root: header.is_root(),
            right_pointer: header.right_pointer(),
            row_size,
            cells,
        })
    }

    /// Writes the leaf back to its page, zeroing the tail so unused bytes
    /// are deterministic.
    pub fn serialize(&self, data: &mut [u8]) -> Result<()> {
        ensure!(
            data.len() == PAGE_SIZE,
            "invalid page size: {} != {}",
            data.len(),
            PAGE_SIZE
        );
        ensure!(
            self.cells.len() <= MAX_CELLS,
            "leaf page {} holds {} cells, max is {}",
            self.page,
            self.cells.len(),
            MAX_CELLS
        );

        data.fill(0);

        let mut header = NodeHeader::new(NodeType::Leaf);
        header.set_is_root(self.is_root);
        header.set_num_cells(self.cells.len() as u32);
        header.set_right_pointer(self.right_pointer);
        header.write_to(data)?;

        let mut off = NODE_HEADER_SIZE;
        for cell in &self.cells {
            ensure!(
                cell.row.len() == self.row_size,
                "leaf page {}: cell row is {} bytes, expected {}",
                self.page,
                cell.row.len(),
                self.row_size
            );
            data[off..off + 4].copy_from_slice(&cell.key.to_le_bytes());
            off += 4;
            data[off..off + self.row_size].copy_from_slice(&cell.row);
            off += self.row_size;
        }

        Ok(())
    }

    /// Splices `(key, row)` into the sorted cell array. On overflow the
    /// leaf splits: the upper half moves to a new sibling page, the chain
    /// pointer threads through it, and the sibling plus its smallest key
    /// are returned for the caller to promote.
    pub fn insert(
        &mut self,
        pager: &mut Pager,
        key: u32,
        row: &[u8],
    ) -> Result<Option<(LeafNode, u32)>> {
        ensure!(
            row.len() == self.row_size,
            "row is {} bytes, leaf stores {}-byte rows",
            row.len(),
            self.row_size
        );

        let idx = self.cells.partition_point(|c| c.key < key);
        self.cells.insert(
            idx,
            LeafCell {
                key,
                row: row.to_vec(),
            },
        );

        if self.cells.len() <= MAX_CELLS {
            return Ok(None);
        }

        let sibling_page = pager.allocate_page()?;
        let mut sibling = LeafNode::new(sibling_page, false, self.row_size);

        let mid = self.cells.len() / 2;
        sibling.cells = self.cells.split_off(mid);
        sibling.right_pointer = self.right_pointer;
        self.right_pointer = sibling_page;

        let separator = sibling.cells[0].key;
        Ok(Some((sibling, separator)))
    }

    /// Removes the cell with an exact key match. No rebalancing; the leaf
    /// may end up empty.
    pub fn delete(&mut self, key: u32) -> bool {
        match self.cells.binary_search_by_key(&key, |c| c.key) {
            Ok(idx) => {
                self.cells.remove(idx);
                true
            }
            Err(_) => false,
        }
    }

    /// Exact-match lookup returning the raw row bytes.
    pub fn search(&self, key: u32) -> Option<&[u8]> {
        match self.cells.binary_search_by_key(&key, |c| c.key) {
            Ok(idx) => Some(&self.cells[idx].row),
            Err(_) => None,
        }
    }

    /// First cell index whose key is `>= key`.
    pub fn lower_bound(&self, key: u32) -> usize {
        self.cells.partition_point(|c| c.key < key)
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

    pub fn key_at(&self, idx: usize) -> u32 {
        self.cells[idx].key
    }

    pub fn row_at(&self, idx: usize) -> &[u8] {
        &self.cells[idx].row
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::records::{Column, Schema, Value};
    use tempfile::tempdir;

    const ROW_SIZE: usize = 8;

    fn open_test_pager() -> (tempfile::TempDir, Pager) {
        let dir = tempdir().unwrap();
        let pager = Pager::open(dir.path().join("test.kdb")).unwrap();
        (dir, pager)
    }

    fn row(tag: u8) -> Vec<u8> {
        vec![tag; ROW_SIZE]
    }

    #[test]
    fn insert_keeps_cells_sorted() {
        let (_dir, mut pager) = open_test_pager();
        let mut leaf = LeafNode::new(1, true, ROW_SIZE);

        for key in [30, 10, 20, 5] {
            assert!(leaf.insert(&mut pager, key, &row(key as u8)).unwrap().is_none());
        }

        let keys: Vec<u32> = leaf.cells.iter().map(|c| c.key).collect();
        assert_eq!(keys, vec![5, 10, 20, 30]);
    }

    #[test]
    fn insert_rejects_wrong_row_width() {
        let (_dir, mut pager) = open_test_pager();
        let mut leaf = LeafNode::new(1, true, ROW_SIZE);

        let result = leaf.insert(&mut pager, 1, &[0u8; 3]);
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("3 bytes"));
    }

    #[test]
    fn thirteenth_insert_splits_at_midpoint() {
        let (_dir, mut pager) = open_test_pager();
        pager.allocate_page().unwrap();
        let mut leaf = LeafNode::new(0, true, ROW_SIZE);

        for key in 0..12 {
            assert!(leaf.insert(&mut pager, key, &row(key as u8)).unwrap().is_none());
        }

        let (sibling, separator) = leaf.insert(&mut pager, 12, &row(12)).unwrap().unwrap();

        assert_eq!(separator, 6);
        assert_eq!(leaf.num_cells(), 6);
        assert_eq!(sibling.num_cells(), 7);
        assert_eq!(leaf.cells.last().unwrap().key, 5);
        assert_eq!(sibling.cells[0].key, 6);
        assert!(!sibling.is_root());
    }

    #[test]
    fn split_threads_the_leaf_chain() {
        let (_dir, mut pager) = open_test_pager();
        pager.allocate_page().unwrap();
        let mut leaf = LeafNode::new(0, false, ROW_SIZE);
        leaf.right_pointer = 77;

        let mut split = None;
        for key in 0..13 {
            if let Some(s) = leaf.insert(&mut pager, key, &row(key as u8)).unwrap() {
                split = Some(s);
            }
        }

        let (sibling, _) = split.unwrap();
        assert_eq!(sibling.page(), 1);
        assert_eq!(leaf.right_pointer(), 1);
        assert_eq!(sibling.right_pointer(), 77);
    }

    #[test]
    fn delete_removes_only_exact_match() {
        let (_dir, mut pager) = open_test_pager();
        let mut leaf = LeafNode::new(1, true, ROW_SIZE);

        for key in [10, 20, 30] {
            leaf.insert(&mut pager, key, &row(key as u8)).unwrap();
        }

        assert!(!leaf.delete(15));
        assert!(leaf.delete(20));
        assert!(!leaf.delete(20));

        let keys: Vec<u32> = leaf.cells.iter().map(|c| c.key).collect();
        assert_eq!(keys, vec![10, 30]);
    }

    #[test]
    fn search_finds_inserted_rows() {
        let (_dir, mut pager) = open_test_pager();
        let mut leaf = LeafNode::new(1, true, ROW_SIZE);

        leaf.insert(&mut pager, 42, &row(7)).unwrap();

        assert_eq!(leaf.search(42), Some(&row(7)[..]));
        assert_eq!(leaf.search(41), None);
    }

    #[test]
    fn serialize_load_roundtrip() {
        let (_dir, mut pager) = open_test_pager();
        let mut leaf = LeafNode::new(3, true, ROW_SIZE);
        leaf.right_pointer = 9;

        for key in [4, 8, 15] {
            leaf.insert(&mut pager, key, &row(key as u8)).unwrap();
        }

        let mut buf = vec![0u8; PAGE_SIZE];
        leaf.serialize(&mut buf).unwrap();

        let loaded = LeafNode::load(&buf, 3, ROW_SIZE).unwrap();
        assert_eq!(loaded, leaf);
    }

    #[test]
    fn serialize_zeroes_the_tail() {
        let mut leaf = LeafNode::new(1, false, ROW_SIZE);
        leaf.cells.push(LeafCell {
            key: 1,
            row: row(1),
        });

        let mut buf = vec![0xFFu8; PAGE_SIZE];
        leaf.serialize(&mut buf).unwrap();

        let used = NODE_HEADER_SIZE + 4 + ROW_SIZE;
        assert!(buf[used..].iter().all(|&b| b == 0));
    }

    #[test]
    fn load_rejects_interior_page() {
        let mut buf = vec![0u8; PAGE_SIZE];
        let header = NodeHeader::new(NodeType::Interior);
        header.write_to(&mut buf).unwrap();

        let result = LeafNode::load(&buf, 5, ROW_SIZE);
        assert!(result.is_err());
        assert!(result
            .unwrap_err()
            .to_string()
            .contains("expected leaf page"));
    }

    #[test]
    fn load_rejects_implausible_cell_count() {
        let mut buf = vec![0u8; PAGE_SIZE];
        let mut header = NodeHeader::new(NodeType::Leaf);
        header.set_num_cells(5000);
        header.write_to(&mut buf).unwrap();

        let result = LeafNode::load(&buf, 5, ROW_SIZE);
        assert!(result.is_err());
        assert!(result
            .unwrap_err()
            .to_string()
            .contains("implausible cell count"));
    }

    #[test]
    fn schema_rows_roundtrip_through_a_leaf_page() {
        let schema = Schema::new(vec![Column::int("id"), Column::text("name", 8)]).unwrap();
        let row_size = schema.row_size() as usize;

        let (_dir, mut pager) = open_test_pager();
        let mut leaf = LeafNode::new(1, true, row_size);

        let people = [(10u32, "Alice"), (5, "Bob"), (20, "Carol")];
        for (id, name) in people {
            let mut blob = vec![0u8; row_size];
            schema
                .serialize_row(&[Value::Int(id), Value::Text(name.into())], &mut blob)
                .unwrap();
            leaf.insert(&mut pager, id, &blob).unwrap();
        }

        let mut buf = vec![0u8; PAGE_SIZE];
        leaf.serialize(&mut buf).unwrap();
        let loaded = LeafNode::load(&buf, 1, row_size).unwrap();

        let keys: Vec<u32> = (0..loaded.num_cells()).map(|i| loaded.key_at(i)).collect();
        assert_eq!(keys, vec![5, 10, 20]);

        for (idx, name) in [(0, "Bob"), (1, "Alice"), (2, "Carol")] {
            let decoded = schema.deserialize_row(loaded.row_at(idx)).unwrap();
            assert_eq!(decoded[0], Value::Int(loaded.key_at(idx)));
            assert_eq!(decoded[1], Value::Text(name.into()));
        }
    }
}
