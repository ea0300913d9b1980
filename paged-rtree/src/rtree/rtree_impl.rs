//! RTree implementation: node I/O, page allocation and tree-wide services.
//!
//! The balancing algorithms live in `insert`, `delete`, `split` and
//! `bulk_load`; queries live in `query`. All of them go through the node
//! accessors defined here.

use std::collections::HashSet;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;

use super::node_codec::{minimum_fill, NodeCodec};
use super::rtree_cache::NodeCache;
use super::rtree_config::{RTreeBuilder, RTreeConfig};
use super::rtree_constants::{
    DEFAULT_PAGE_SIZE, MIN_GROWTH_PAGES, NO_PAGE, TREE_HEADER_SIZE, TREE_MAGIC_SEED,
};
use super::rtree_types::{
    FreePage, IntegrityReport, LeafEntry, Node, RTreeStats, TreeHeader,
};
use crate::errors::{SpatialError, SpatialResult};
use crate::spatial::{Mbr, SpatialComparable};
use crate::storage::{PageId, PageStore};

/// A persistent R*-tree over fixed-size pages.
///
/// Mutations take `&mut self`; queries take `&self` and may run from several
/// threads at once.
pub struct RTree {
    pub(crate) store: PageStore,
    pub(crate) codec: NodeCodec,
    pub(crate) header: TreeHeader,
    cache: Mutex<NodeCache>,
    stats: RTreeStatistics,
}

/// Internal statistics tracking
struct RTreeStatistics {
    cache_hits: AtomicU64,
    cache_misses: AtomicU64,
    page_reads: AtomicU64,
    page_writes: AtomicU64,
}

impl RTreeStatistics {
    fn new() -> Self {
        Self {
            cache_hits: AtomicU64::new(0),
            cache_misses: AtomicU64::new(0),
            page_reads: AtomicU64::new(0),
            page_writes: AtomicU64::new(0),
        }
    }
}

fn magic_seed(dimensionality: usize) -> u32 {
    TREE_MAGIC_SEED ^ dimensionality as u32
}

fn capped(capacity: usize, cap: Option<usize>) -> usize {
    cap.map_or(capacity, |cap| capacity.min(cap))
}

impl RTree {
    /// Starts configuring a tree of the given dimensionality.
    pub fn builder(dimensionality: usize) -> RTreeBuilder {
        RTreeBuilder::new(dimensionality)
    }

    /// Creates an empty tree with default settings.
    pub fn create(path: impl AsRef<Path>, dimensionality: usize) -> SpatialResult<Self> {
        Self::builder(dimensionality).create(path)
    }

    /// Opens an existing tree for reading and writing.
    pub fn open(path: impl AsRef<Path>, dimensionality: usize) -> SpatialResult<Self> {
        Self::builder(dimensionality).open(path)
    }

    /// Opens an existing tree for queries only.
    pub fn open_read_only(path: impl AsRef<Path>, dimensionality: usize) -> SpatialResult<Self> {
        Self::builder(dimensionality).open_read_only(path)
    }

    pub(crate) fn create_with(path: &Path, config: &RTreeConfig) -> SpatialResult<Self> {
        let dims = config.dimensionality;
        let record_size = config.page_size.unwrap_or(DEFAULT_PAGE_SIZE);
        let codec = NodeCodec::new(record_size, dims);

        let leaf_capacity = capped(codec.leaf_capacity(), config.max_leaf_entries);
        if leaf_capacity < 2 {
            return Err(SpatialError::Capacity {
                kind: "leaf",
                capacity: leaf_capacity,
                record_size,
            });
        }
        let dir_capacity = capped(codec.dir_capacity(), config.max_dir_entries);
        if dir_capacity < 2 {
            return Err(SpatialError::Capacity {
                kind: "directory",
                capacity: dir_capacity,
                record_size,
            });
        }

        let store = PageStore::create(
            path,
            magic_seed(dims),
            TREE_HEADER_SIZE,
            record_size,
            config.initial_pages.max(1),
        )?;

        let header = TreeHeader {
            dimensionality: dims as u32,
            leaf_capacity: leaf_capacity as u32,
            dir_capacity: dir_capacity as u32,
            leaf_minimum: minimum_fill(leaf_capacity, config.min_fill) as u32,
            dir_minimum: minimum_fill(dir_capacity, config.min_fill) as u32,
            reinsert_fraction: config.reinsert_fraction,
            root_page: 0,
            height: 1,
            entry_count: 0,
            next_page_id: 1,
            free_list_head: NO_PAGE,
            free_page_count: 0,
        };

        let mut tree = Self::from_parts(store, codec, header, config.cache_pages);
        tree.write_node(0, Node::Leaf(Vec::new()))?;
        tree.write_header()?;
        tree.store.flush()?;

        log::debug!(
            "Created R*-tree {} ({} dimensions, leaf capacity {}, directory capacity {})",
            path.display(),
            dims,
            leaf_capacity,
            dir_capacity
        );
        Ok(tree)
    }

    pub(crate) fn open_with(
        path: &Path,
        config: &RTreeConfig,
        writable: bool,
    ) -> SpatialResult<Self> {
        let dims = config.dimensionality;
        let store = PageStore::open(
            path,
            magic_seed(dims),
            TREE_HEADER_SIZE,
            config.page_size,
            writable,
        )?;
        let header = TreeHeader::decode(store.extra_header())?;
        if header.dimensionality as usize != dims {
            return Err(SpatialError::DimensionalityMismatch {
                expected: header.dimensionality as usize,
                actual: dims,
            });
        }

        let codec = NodeCodec::new(store.record_size(), dims);
        validate_header(&header, &codec, store.num_records())?;

        log::debug!(
            "Opened R*-tree {} ({} entries, height {})",
            path.display(),
            header.entry_count,
            header.height
        );
        Ok(Self::from_parts(store, codec, header, config.cache_pages))
    }

    fn from_parts(store: PageStore, codec: NodeCodec, header: TreeHeader, cache_pages: usize) -> Self {
        Self {
            store,
            codec,
            header,
            cache: Mutex::new(NodeCache::new(cache_pages)),
            stats: RTreeStatistics::new(),
        }
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    /// Number of indexed objects.
    pub fn len(&self) -> u64 {
        self.header.entry_count
    }

    pub fn is_empty(&self) -> bool {
        self.header.entry_count == 0
    }

    /// Number of node levels; a tree whose root is a leaf has height 1.
    pub fn height(&self) -> u32 {
        self.header.height
    }

    pub fn dimensionality(&self) -> usize {
        self.header.dimensionality as usize
    }

    pub fn root_page(&self) -> PageId {
        self.header.root_page
    }

    pub fn leaf_capacity(&self) -> usize {
        self.header.leaf_capacity as usize
    }

    pub fn dir_capacity(&self) -> usize {
        self.header.dir_capacity as usize
    }

    pub fn leaf_minimum(&self) -> usize {
        self.header.leaf_minimum as usize
    }

    pub fn dir_minimum(&self) -> usize {
        self.header.dir_minimum as usize
    }

    pub fn page_size(&self) -> usize {
        self.store.record_size()
    }

    pub fn path(&self) -> &Path {
        self.store.path()
    }

    pub fn is_writable(&self) -> bool {
        self.store.is_writable()
    }

    /// Rectangle covering every indexed object, `None` for an empty tree.
    pub fn root_mbr(&self) -> SpatialResult<Option<Mbr>> {
        Ok(self.read_node(self.header.root_page)?.mbr())
    }

    /// Get comprehensive statistics
    pub fn stats(&self) -> RTreeStats {
        RTreeStats {
            total_entries: self.header.entry_count,
            allocated_pages: self.header.next_page_id,
            free_pages: self.header.free_page_count,
            cached_pages: self.cache.lock().len() as u64,
            cache_hits: self.stats.cache_hits.load(Ordering::Relaxed),
            cache_misses: self.stats.cache_misses.load(Ordering::Relaxed),
            page_reads: self.stats.page_reads.load(Ordering::Relaxed),
            page_writes: self.stats.page_writes.load(Ordering::Relaxed),
            tree_height: self.header.height,
        }
    }

    pub(crate) fn capacity_of(&self, node: &Node) -> usize {
        if node.is_leaf() {
            self.leaf_capacity()
        } else {
            self.dir_capacity()
        }
    }

    pub(crate) fn minimum_of(&self, node: &Node) -> usize {
        if node.is_leaf() {
            self.leaf_minimum()
        } else {
            self.dir_minimum()
        }
    }

    // ========================================================================
    // Guards
    // ========================================================================

    pub(crate) fn ensure_writable(&self) -> SpatialResult<()> {
        if self.store.is_writable() {
            Ok(())
        } else {
            Err(SpatialError::ReadOnly)
        }
    }

    pub(crate) fn check_dimensionality(&self, key: &dyn SpatialComparable) -> SpatialResult<()> {
        if !key.is_well_formed() {
            return Err(SpatialError::InvalidOperation(
                "key bounds have different dimensionalities".into(),
            ));
        }
        let actual = key.dimensionality();
        if actual != self.dimensionality() {
            return Err(SpatialError::DimensionalityMismatch {
                expected: self.dimensionality(),
                actual,
            });
        }
        Ok(())
    }

    /// Dimensionality check plus a sanity check of the extent itself.
    pub(crate) fn check_key(&self, mbr: &Mbr) -> SpatialResult<()> {
        self.check_dimensionality(mbr)?;
        for (dim, (lo, hi)) in mbr.min.iter().zip(&mbr.max).enumerate() {
            // also rejects NaN
            if !(lo <= hi) {
                return Err(SpatialError::InvalidOperation(format!(
                    "invalid extent in dimension {}: [{}, {}]",
                    dim, lo, hi
                )));
            }
        }
        Ok(())
    }

    // ========================================================================
    // Node I/O
    // ========================================================================

    /// Reads a node, from the cache when possible.
    pub(crate) fn read_node(&self, page_id: PageId) -> SpatialResult<Node> {
        {
            let mut cache = self.cache.lock();
            if let Some(node) = cache.get(page_id) {
                self.stats.cache_hits.fetch_add(1, Ordering::Relaxed);
                return Ok(node);
            }
        }

        self.stats.cache_misses.fetch_add(1, Ordering::Relaxed);
        self.stats.page_reads.fetch_add(1, Ordering::Relaxed);
        let node = self.codec.decode(self.store.record_buffer(page_id)?)?;

        self.cache.lock().put(page_id, node.clone());
        Ok(node)
    }

    /// Encodes a node into its page and caches it.
    pub(crate) fn write_node(&mut self, page_id: PageId, node: Node) -> SpatialResult<()> {
        self.codec
            .encode(page_id, &node, self.store.record_buffer_mut(page_id)?)?;
        self.stats.page_writes.fetch_add(1, Ordering::Relaxed);
        self.cache.get_mut().put(page_id, node);
        Ok(())
    }

    pub(crate) fn write_header(&mut self) -> SpatialResult<()> {
        self.header.encode_into(self.store.extra_header_mut()?)
    }

    /// Takes a page from the free list, or a fresh one from the end of the
    /// store, growing the file when needed.
    pub(crate) fn allocate_page(&mut self) -> SpatialResult<PageId> {
        if self.header.free_list_head != NO_PAGE {
            let page_id = self.header.free_list_head;
            let free = self.codec.decode_free(self.store.record_buffer(page_id)?)?;
            self.header.free_list_head = free.next_free;
            self.header.free_page_count = self.header.free_page_count.saturating_sub(1);
            return Ok(page_id);
        }

        let page_id = self.header.next_page_id;
        if page_id == NO_PAGE {
            return Err(SpatialError::InvalidOperation(
                "page ids exhausted".into(),
            ));
        }
        if page_id >= self.store.num_records() {
            let grown = self
                .store
                .num_records()
                .saturating_mul(2)
                .max(page_id + 1)
                .max(MIN_GROWTH_PAGES);
            self.store.ensure_size(grown)?;
        }
        self.header.next_page_id += 1;
        Ok(page_id)
    }

    /// Pushes a page onto the persisted free list.
    pub(crate) fn free_page(&mut self, page_id: PageId) -> SpatialResult<()> {
        let link = FreePage {
            next_free: self.header.free_list_head,
        };
        self.codec
            .encode_free(&link, self.store.record_buffer_mut(page_id)?)?;
        self.stats.page_writes.fetch_add(1, Ordering::Relaxed);
        self.cache.get_mut().remove(page_id);
        self.header.free_list_head = page_id;
        self.header.free_page_count += 1;
        Ok(())
    }

    // ========================================================================
    // Maintenance
    // ========================================================================

    /// Every indexed object with its stored rectangle, in tree order.
    pub fn entries(&self) -> SpatialResult<Vec<LeafEntry>> {
        let mut entries = Vec::with_capacity(self.header.entry_count as usize);
        let mut stack = vec![self.header.root_page];
        while let Some(page_id) = stack.pop() {
            match self.read_node(page_id)? {
                Node::Leaf(leaf) => entries.extend(leaf),
                Node::Directory(children) => {
                    stack.extend(children.iter().rev().map(|c| c.page_id));
                }
            }
        }
        Ok(entries)
    }

    /// Writes mapped pages back to the file.
    pub fn flush(&self) -> SpatialResult<()> {
        self.store.flush()
    }

    /// Flushes and closes the tree, surfacing any failure.
    pub fn close(self) -> SpatialResult<()> {
        log::debug!(
            "Closing R*-tree {} ({} entries)",
            self.store.path().display(),
            self.header.entry_count
        );
        let RTree { store, .. } = self;
        store.close()
    }

    /// Walks the whole tree and checks its structural invariants.
    ///
    /// Checks:
    /// - every directory entry's rectangle equals the union of its child
    /// - all leaves sit at the same depth, equal to the stored height
    /// - node sizes respect capacity and minimum fill
    /// - the stored entry count matches the leaves
    /// - every allocated page is either reachable or on the free list
    pub fn check_integrity(&self) -> SpatialResult<IntegrityReport> {
        let mut report = IntegrityReport::new();
        let mut reachable = HashSet::new();

        let root_level = self.header.height.saturating_sub(1) as usize;
        self.check_subtree(
            self.header.root_page,
            root_level,
            true,
            &mut report,
            &mut reachable,
        )?;

        if report.entries_found != self.header.entry_count {
            report.fail(format!(
                "header counts {} entries, leaves hold {}",
                self.header.entry_count, report.entries_found
            ));
        }

        let mut free = HashSet::new();
        let mut page_id = self.header.free_list_head;
        while page_id != NO_PAGE {
            if page_id >= self.header.next_page_id {
                report.fail(format!("free page {} was never allocated", page_id));
                break;
            }
            if reachable.contains(&page_id) {
                report.fail(format!("page {} is both free and in use", page_id));
                break;
            }
            if !free.insert(page_id) {
                report.fail(format!("free list cycles at page {}", page_id));
                break;
            }
            page_id = self.codec.decode_free(self.store.record_buffer(page_id)?)?.next_free;
        }

        if free.len() as u32 != self.header.free_page_count {
            report.fail(format!(
                "header counts {} free pages, free list holds {}",
                self.header.free_page_count,
                free.len()
            ));
        }
        let accounted = reachable.len() + free.len();
        if accounted != self.header.next_page_id as usize {
            report.fail(format!(
                "{} pages allocated, {} reachable or free",
                self.header.next_page_id, accounted
            ));
        }

        Ok(report)
    }

    /// Checks the subtree below `page_id`, whose nodes should sit at `level`
    /// (leaves are level 0). Returns the subtree's rectangle.
    fn check_subtree(
        &self,
        page_id: PageId,
        level: usize,
        is_root: bool,
        report: &mut IntegrityReport,
        reachable: &mut HashSet<PageId>,
    ) -> SpatialResult<Option<Mbr>> {
        if !reachable.insert(page_id) {
            report.fail(format!("page {} is referenced twice", page_id));
            return Ok(None);
        }
        report.pages_checked += 1;

        let node = self.read_node(page_id)?;
        if node.len() > self.capacity_of(&node) {
            report.fail(format!(
                "page {} holds {} entries, capacity is {}",
                page_id,
                node.len(),
                self.capacity_of(&node)
            ));
        }
        if !is_root && node.len() < self.minimum_of(&node) {
            report.fail(format!(
                "page {} holds {} entries, minimum is {}",
                page_id,
                node.len(),
                self.minimum_of(&node)
            ));
        }

        match &node {
            Node::Leaf(entries) => {
                if level != 0 {
                    report.fail(format!("leaf page {} found at level {}", page_id, level));
                }
                report.entries_found += entries.len() as u64;
            }
            Node::Directory(children) => {
                if level == 0 {
                    report.fail(format!("directory page {} found at leaf level", page_id));
                    return Ok(node.mbr());
                }
                if is_root && children.len() < 2 {
                    report.fail(format!("root directory {} has {} children", page_id, children.len()));
                }
                for child in children {
                    let child_mbr =
                        self.check_subtree(child.page_id, level - 1, false, report, reachable)?;
                    if let Some(child_mbr) = child_mbr {
                        if child_mbr != child.mbr {
                            report.fail(format!(
                                "entry for page {} in page {} is {}, children cover {}",
                                child.page_id, page_id, child.mbr, child_mbr
                            ));
                        }
                    }
                }
            }
        }
        Ok(node.mbr())
    }
}

/// Sanity checks on a header read from disk.
fn validate_header(header: &TreeHeader, codec: &NodeCodec, num_records: u32) -> SpatialResult<()> {
    let problem = if header.leaf_capacity < 2 || header.leaf_capacity as usize > codec.leaf_capacity() {
        Some(format!("leaf capacity {}", header.leaf_capacity))
    } else if header.dir_capacity < 2 || header.dir_capacity as usize > codec.dir_capacity() {
        Some(format!("directory capacity {}", header.dir_capacity))
    } else if header.height == 0 {
        Some("height 0".to_string())
    } else if header.next_page_id > num_records {
        Some(format!(
            "next page {} beyond {} records",
            header.next_page_id, num_records
        ))
    } else if header.root_page >= header.next_page_id {
        Some(format!("root page {}", header.root_page))
    } else {
        None
    };

    match problem {
        Some(problem) => Err(SpatialError::Serialization(format!(
            "inconsistent tree header: {}",
            problem
        ))),
        None => Ok(()),
    }
}
