//! Constants for the paged R*-tree.

/// Default page (record) size in bytes
pub const DEFAULT_PAGE_SIZE: usize = 4096;

/// Default node cache size in number of pages
pub const DEFAULT_CACHE_PAGES: usize = 256;

/// Share of an overflowing node's entries that forced reinsertion removes
pub const DEFAULT_REINSERT_FRACTION: f64 = 0.3;

/// Minimum fill of a node relative to its capacity
pub const DEFAULT_MIN_FILL: f64 = 0.4;

/// Seed mixed into the page store magic; XORed with the dimensionality
pub const TREE_MAGIC_SEED: u32 = 0x522A_5452; // "R*TR"

/// Free list terminator
pub const NO_PAGE: u32 = u32::MAX;

/// Smallest number of records the store grows by when it runs out of pages
pub const MIN_GROWTH_PAGES: u32 = 16;

/// Encoded size of the tree header kept in the store's extra header
pub const TREE_HEADER_SIZE: usize = 56;
