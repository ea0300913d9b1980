//! Persistent R*-tree over a page store.
//!
//! This module provides:
//! - Page-based node storage, one node per fixed-size record
//! - A per-tree LRU cache of decoded nodes
//! - R* insertion with forced reinsertion and topological split
//! - Deletion with tree condensation and page reuse through a free list
//! - Sort-Tile-Recursive bulk loading
//! - Range, window and tie-exact k-nearest-neighbor queries
//!
//! Nodes are read lazily; only the tree header is loaded on open.

pub mod node_codec;
pub mod rtree_config;
pub mod rtree_constants;
pub mod rtree_types;

mod bulk_load;
mod delete;
mod insert;
mod query;
mod rtree_cache;
mod rtree_impl;
mod split;

pub use node_codec::NodeCodec;
pub use rtree_config::{RTreeBuilder, RTreeConfig};
pub use rtree_constants::{DEFAULT_CACHE_PAGES, DEFAULT_PAGE_SIZE};
pub use rtree_impl::RTree;
pub use rtree_types::{
    DirectoryEntry, IntegrityReport, LeafEntry, Node, ObjectId, RTreeStats, SpatialEntry,
    TreeHeader,
};
