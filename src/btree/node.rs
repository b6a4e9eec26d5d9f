//! Tagged sum over the two node variants, discriminated by the on-disk
//! type byte. Dispatch happens here so the tree driver and the recursive
//! descent never match on raw bytes themselves.

use eyre::{bail, Result};

use crate::storage::{NodeType, Pager};

use super::interior::InteriorNode;
use super::leaf::LeafNode;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    Leaf(LeafNode),
    Interior(InteriorNode),
}

impl Node {
    /// Reads a page and materializes the node it holds, dispatching on the
    /// type byte. Anything other than a leaf or interior byte is data
    /// corruption.
    pub fn load(pager: &mut Pager, page_no: u32, row_size: usize) -> Result<Node> {
        let data = pager.page(page_no)?;
        match NodeType::from_byte(data[0]) {
            Some(NodeType::Leaf) => Ok(Node::Leaf(LeafNode::load(data, page_no, row_size)?)),
            Some(NodeType::Interior) => Ok(Node::Interior(InteriorNode::load(data, page_no)?)),
            None => bail!(
                "page {} holds no node (type byte {:#04x})",
                page_no,
                data[0]
            ),
        }
    }

    pub fn page(&self) -> u32 {
        match self {
            Node::Leaf(n) => n.page(),
            Node::Interior(n) => n.page(),
        }
    }

    pub fn is_leaf(&self) -> bool {
        matches!(self, Node::Leaf(_))
    }

    pub fn is_root(&self) -> bool {
        match self {
            Node::Leaf(n) => n.is_root(),
            Node::Interior(n) => n.is_root(),
        }
    }

    pub fn set_is_root(&mut self, is_root: bool) {
        match self {
            Node::Leaf(n) => n.is_root = is_root,
            Node::Interior(n) => n.is_root = is_root,
        }
    }

    pub fn serialize(&self, data: &mut [u8]) -> Result<()> {
        match self {
            Node::Leaf(n) => n.serialize(data),
            Node::Interior(n) => n.serialize(data),
        }
    }

    /// Serializes the node into its own page through the pager, marking
    /// the page dirty.
    pub fn serialize_to(&self, pager: &mut Pager) -> Result<()> {
        let data = pager.page_mut(self.page())?;
        self.serialize(data)
    }

    pub fn insert(
        &mut self,
        pager: &mut Pager,
        row_size: usize,
        key: u32,
        row: &[u8],
    ) -> Result<Option<(Node, u32)>> {
        match self {
            Node::Leaf(n) => Ok(n
                .insert(pager, key, row)?
                .map(|(sibling, sep)| (Node::Leaf(sibling), sep))),
            Node::Interior(n) => Ok(n
                .insert(pager, row_size, key, row)?
                .map(|(sibling, sep)| (Node::Interior(sibling), sep))),
        }
    }

    pub fn delete(&mut self, pager: &mut Pager, row_size: usize, key: u32) -> Result<bool> {
        match self {
            Node::Leaf(n) => Ok(n.delete(key)),
            Node::Interior(n) => n.delete(pager, row_size, key),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::PAGE_SIZE;
    use tempfile::tempdir;

    #[test]
    fn load_dispatches_on_type_byte() {
        let dir = tempdir().unwrap();
        let mut pager = Pager::open(dir.path().join("test.kdb")).unwrap();

        let leaf_page = pager.allocate_page().unwrap();
        LeafNode::new(leaf_page, false, 8)
            .serialize(pager.page_mut(leaf_page).unwrap())
            .unwrap();

        let interior_page = pager.allocate_page().unwrap();
        InteriorNode::new(interior_page, false)
            .serialize(pager.page_mut(interior_page).unwrap())
            .unwrap();

        assert!(Node::load(&mut pager, leaf_page, 8).unwrap().is_leaf());
        assert!(!Node::load(&mut pager, interior_page, 8).unwrap().is_leaf());
    }

    #[test]
    fn load_rejects_unknown_type_byte() {
        let dir = tempdir().unwrap();
        let mut pager = Pager::open(dir.path().join("test.kdb")).unwrap();

        let page_no = pager.allocate_page().unwrap();
        pager.page_mut(page_no).unwrap()[0] = 0x7E;

        let result = Node::load(&mut pager, page_no, 8);
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("holds no node"));
    }

    #[test]
    fn serialize_to_marks_the_page_dirty() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.kdb");

        {
            let mut pager = Pager::open(&path).unwrap();
            let page_no = pager.allocate_page().unwrap();
            let node = Node::Leaf(LeafNode::new(page_no, true, 8));
            node.serialize_to(&mut pager).unwrap();
            pager.close().unwrap();
        }

        let mut pager = Pager::open(&path).unwrap();
        let data = pager.page(0).unwrap();
        assert_eq!(data.len(), PAGE_SIZE);
        assert_eq!(data[0], NodeType::Leaf as u8);
        assert_eq!(data[1], 1);
    }
}
