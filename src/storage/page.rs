//! # Node and Meta Page Layouts
//!
//! Every node page begins with a common 14-byte header. Page 0 is special:
//! it holds no node, only the tree metadata described by [`MetaHeader`].
//!
//! ## Node Header Layout (14 bytes)
//!
//! ```text
//! Offset  Size  Field          Description
//! ------  ----  -------------  -----------------------------------------
//! 0       1     node_type      1 = leaf, 0 = interior
//! 1       1     is_root        1 if this node is the tree root
//! 2       4     parent_page    Reserved; always written as 0
//! 6       4     num_cells      Number of cells in the body
//! 10      4     right_pointer  Leaf: next leaf in key order (0 = none)
//!                              Interior: rightmost child subtree
//! ```
//!
//! All multi-byte fields are little-endian. The headers use `zerocopy` for
//! safe transmutation straight from page bytes, so reading a header never
//! copies.
//!
//! ## Meta Page Layout
//!
//! ```text
//! Offset  Size  Field       Description
//! ------  ----  ----------  --------------------------------------
//! 0       4     root_page   Page number of the current root node
//! 4..     -     reserved    Zero
//! ```

use eyre::{ensure, Result};
use zerocopy::little_endian::U32;
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout, Unaligned};

use super::NODE_HEADER_SIZE;

/// Page number of the meta page. Reserved; never holds a node.
pub const META_PAGE: u32 = 0;

#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeType {
    Interior = 0,
    Leaf = 1,
}

impl NodeType {
    pub fn from_byte(b: u8) -> Option<Self> {
        match b {
            0 => Some(NodeType::Interior),
            1 => Some(NodeType::Leaf),
            _ => None,
        }
    }
}

#[repr(C)]
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, Immutable, KnownLayout, Unaligned)]
pub struct NodeHeader {
    node_type: u8,
    is_root: u8,
    parent_page: U32,
    num_cells: U32,
    right_pointer: U32,
}

const _: () = assert!(std::mem::size_of::<NodeHeader>() == NODE_HEADER_SIZE);

impl NodeHeader {
    pub fn new(node_type: NodeType) -> Self {
        Self {
            node_type: node_type as u8,
            is_root: 0,
            parent_page: U32::new(0),
            num_cells: U32::new(0),
            right_pointer: U32::new(0),
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

    pub fn write_to(&self, data: &mut [u8]) -> Result<()> {
        ensure!(
            data.len() >= NODE_HEADER_SIZE,
            "buffer too small for NodeHeader: {} < {}",
            data.len(),
            NODE_HEADER_SIZE
        );

        data[..NODE_HEADER_SIZE].copy_from_slice(self.as_bytes());
        Ok(())
    }

    pub fn node_type(&self) -> Option<NodeType> {
        NodeType::from_byte(self.node_type)
    }

    pub fn type_byte(&self) -> u8 {
        self.node_type
    }

    pub fn is_root(&self) -> bool {
        self.is_root == 1
    }

    pub fn set_is_root(&mut self, is_root: bool) {
        self.is_root = if is_root { 1 } else { 0 };
    }

    pub fn num_cells(&self) -> u32 {
        self.num_cells.get()
    }

    pub fn set_num_cells(&mut self, count: u32) {
        self.num_cells = U32::new(count);
    }

    pub fn right_pointer(&self) -> u32 {
        self.right_pointer.get()
    }

    pub fn set_right_pointer(&mut self, page_no: u32) {
        self.right_pointer = U32::new(page_no);
    }
}

#[repr(C)]
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, Immutable, KnownLayout, Unaligned)]
pub struct MetaHeader {
    root_page: U32,
}

impl MetaHeader {
    pub fn from_bytes(data: &[u8]) -> Result<&Self> {
        ensure!(
            data.len() >= std::mem::size_of::<Self>(),
            "buffer too small for MetaHeader: {} < {}",
            data.len(),
            std::mem::size_of::<Self>()
        );

        Self::ref_from_bytes(&data[..std::mem::size_of::<Self>()])
            .map_err(|e| eyre::eyre!("failed to read MetaHeader: {:?}", e))
    }

    pub fn from_bytes_mut(data: &mut [u8]) -> Result<&mut Self> {
        ensure!(
            data.len() >= std::mem::size_of::<Self>(),
            "buffer too small for MetaHeader: {} < {}",
            data.len(),
            std::mem::size_of::<Self>()
        );

        Self::mut_from_bytes(&mut data[..std::mem::size_of::<Self>()])
            .map_err(|e| eyre::eyre!("failed to read MetaHeader: {:?}", e))
    }

    pub fn root_page(&self) -> u32 {
        self.root_page.get()
    }

    pub fn set_root_page(&mut self, page_no: u32) {
        self.root_page = U32::new(page_no);
    }
}
