//! Core types of the paged R*-tree.
//!
//! This module defines:
//! - Entry and node types (leaf and directory)
//! - The tree header persisted in the page store's extra header
//! - Statistics and integrity report structures

use serde::{Deserialize, Serialize};

use super::rtree_constants::TREE_HEADER_SIZE;
use crate::errors::{SpatialError, SpatialResult};
use crate::spatial::Mbr;
use crate::storage::PageId;

/// Caller-assigned identifier of an indexed object
pub type ObjectId = u64;

// ============================================================================
// Node Types
// ============================================================================

/// An indexed object: its id and bounding rectangle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeafEntry {
    pub id: ObjectId,
    pub mbr: Mbr,
}

/// A child reference in a directory node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DirectoryEntry {
    pub page_id: PageId,
    pub mbr: Mbr,
}

/// Anything stored in a node. Lets split, reinsertion and packing work on
/// both entry kinds.
pub trait SpatialEntry {
    fn mbr(&self) -> &Mbr;
}

impl SpatialEntry for LeafEntry {
    fn mbr(&self) -> &Mbr {
        &self.mbr
    }
}

impl SpatialEntry for DirectoryEntry {
    fn mbr(&self) -> &Mbr {
        &self.mbr
    }
}

/// Node types in the R*-tree
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Node {
    /// Leaf node containing indexed objects
    Leaf(Vec<LeafEntry>),
    /// Directory node containing child references
    Directory(Vec<DirectoryEntry>),
}

impl Node {
    pub fn is_leaf(&self) -> bool {
        matches!(self, Node::Leaf(_))
    }

    pub fn len(&self) -> usize {
        match self {
            Node::Leaf(entries) => entries.len(),
            Node::Directory(entries) => entries.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The rectangle enclosing all entries, `None` for an empty node.
    pub fn mbr(&self) -> Option<Mbr> {
        match self {
            Node::Leaf(entries) => Mbr::union_all(entries.iter().map(|e| &e.mbr)),
            Node::Directory(entries) => Mbr::union_all(entries.iter().map(|e| &e.mbr)),
        }
    }
}

/// Entry waiting to be placed into a node at a given level.
#[derive(Debug, Clone)]
pub(crate) enum PendingEntry {
    Leaf(LeafEntry),
    Directory(DirectoryEntry),
}

impl PendingEntry {
    pub(crate) fn mbr(&self) -> &Mbr {
        match self {
            PendingEntry::Leaf(e) => &e.mbr,
            PendingEntry::Directory(e) => &e.mbr,
        }
    }
}

/// Marker written into a released page; pages form a singly linked free list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FreePage {
    /// Next free page in the chain (`NO_PAGE` = end of chain)
    pub next_free: PageId,
}

// ============================================================================
// Tree Header
// ============================================================================

/// Tree settings and state stored in the page store's extra header.
///
/// Only fixed-width fields, so the bincode legacy encoding always takes
/// `TREE_HEADER_SIZE` bytes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TreeHeader {
    pub dimensionality: u32,
    pub leaf_capacity: u32,
    pub dir_capacity: u32,
    pub leaf_minimum: u32,
    pub dir_minimum: u32,
    pub reinsert_fraction: f64,
    pub root_page: PageId,
    /// Number of node levels; a tree whose root is a leaf has height 1
    pub height: u32,
    pub entry_count: u64,
    pub next_page_id: PageId,
    pub free_list_head: PageId,
    pub free_page_count: u32,
}

impl TreeHeader {
    pub fn encode_into(&self, buffer: &mut [u8]) -> SpatialResult<()> {
        let written =
            bincode::serde::encode_into_slice(self, buffer, bincode::config::legacy())?;
        debug_assert_eq!(written, TREE_HEADER_SIZE);
        Ok(())
    }

    pub fn decode(buffer: &[u8]) -> SpatialResult<Self> {
        if buffer.len() < TREE_HEADER_SIZE {
            return Err(SpatialError::Serialization(format!(
                "tree header needs {} bytes, found {}",
                TREE_HEADER_SIZE,
                buffer.len()
            )));
        }
        let (header, _) = bincode::serde::decode_from_slice(buffer, bincode::config::legacy())?;
        Ok(header)
    }
}

// ============================================================================
// Statistics
// ============================================================================

/// Statistics about R-Tree operations
#[derive(Debug, Clone, Default)]
pub struct RTreeStats {
    pub total_entries: u64,
    pub allocated_pages: u32,
    pub free_pages: u32,
    pub cached_pages: u64,
    pub cache_hits: u64,
    pub cache_misses: u64,
    pub page_reads: u64,
    pub page_writes: u64,
    pub tree_height: u32,
}

/// Result of [`crate::RTree::check_integrity`]
#[derive(Debug, Clone)]
pub struct IntegrityReport {
    /// Total pages visited from the root
    pub pages_checked: u64,
    /// Leaf entries found
    pub entries_found: u64,
    /// Summary of findings
    pub is_valid: bool,
    /// Detailed error messages
    pub errors: Vec<String>,
}

impl IntegrityReport {
    pub fn new() -> Self {
        Self {
            pages_checked: 0,
            entries_found: 0,
            is_valid: true,
            errors: Vec::new(),
        }
    }

    pub(crate) fn fail(&mut self, message: String) {
        self.is_valid = false;
        self.errors.push(message);
    }
}

impl Default for IntegrityReport {
    fn default() -> Self {
        Self::new()
    }
}
