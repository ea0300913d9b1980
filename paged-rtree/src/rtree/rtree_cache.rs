//! LRU cache of decoded nodes.
//!
//! Each tree owns one cache. Writes go through to the page store immediately,
//! so cached nodes are never dirty and eviction never writes.

use std::num::NonZeroUsize;

use lru::LruCache;

use super::rtree_types::Node;
use crate::storage::PageId;

/// Decoded nodes keyed by page id
pub struct NodeCache {
    pages: LruCache<PageId, Node>,
}

impl NodeCache {
    /// Creates a cache holding at most `max_pages` nodes (at least one).
    pub fn new(max_pages: usize) -> Self {
        let capacity = NonZeroUsize::new(max_pages.max(1)).unwrap_or(NonZeroUsize::MIN);
        Self {
            pages: LruCache::new(capacity),
        }
    }

    /// Returns a copy of the cached node and marks it most recently used.
    pub fn get(&mut self, page_id: PageId) -> Option<Node> {
        self.pages.get(&page_id).cloned()
    }

    /// Inserts or replaces a node, evicting the least recently used one if full.
    pub fn put(&mut self, page_id: PageId, node: Node) {
        self.pages.put(page_id, node);
    }

    pub fn remove(&mut self, page_id: PageId) -> Option<Node> {
        self.pages.pop(&page_id)
    }

    pub fn len(&self) -> usize {
        self.pages.len()
    }
}
