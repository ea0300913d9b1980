//! R*-tree insertion: subtree choice, forced reinsertion and overflow
//! propagation.

use super::rtree_impl::RTree;
use super::rtree_types::{DirectoryEntry, LeafEntry, Node, ObjectId, PendingEntry, SpatialEntry};
use super::split::topological_split;
use crate::errors::{SpatialError, SpatialResult};
use crate::spatial::{Mbr, SpatialComparable};
use crate::storage::PageId;

/// Directory pages visited on the way down, with the index of the chosen
/// child in each.
pub(crate) type NodePath = Vec<(PageId, usize)>;

/// Levels (counted from the leaves) at which forced reinsertion already ran
/// during one top-level insertion.
#[derive(Debug, Default)]
pub(crate) struct OverflowState {
    reinserted: Vec<bool>,
}

impl OverflowState {
    /// Returns `true` the first time it is called for `level`.
    fn first_overflow(&mut self, level: usize) -> bool {
        if self.reinserted.len() <= level {
            self.reinserted.resize(level + 1, false);
        }
        !std::mem::replace(&mut self.reinserted[level], true)
    }
}

impl RTree {
    /// Adds an object to the tree.
    ///
    /// The key's dimensionality is checked before anything is modified.
    /// Duplicate ids are allowed; each insert adds a new entry.
    pub fn insert(&mut self, id: ObjectId, key: &dyn SpatialComparable) -> SpatialResult<()> {
        self.ensure_writable()?;
        self.check_dimensionality(key)?;
        let mbr = key.mbr();
        self.check_key(&mbr)?;

        let mut state = OverflowState::default();
        self.insert_at_level(PendingEntry::Leaf(LeafEntry { id, mbr }), 0, &mut state)?;
        self.header.entry_count += 1;
        self.write_header()
    }

    /// Places `entry` into a node at `level`, handling any overflow it causes.
    pub(crate) fn insert_at_level(
        &mut self,
        entry: PendingEntry,
        level: usize,
        state: &mut OverflowState,
    ) -> SpatialResult<()> {
        let (path, page_id) = self.choose_subtree(entry.mbr(), level)?;
        let mut node = self.read_node(page_id)?;
        match (&mut node, entry) {
            (Node::Leaf(entries), PendingEntry::Leaf(entry)) => entries.push(entry),
            (Node::Directory(entries), PendingEntry::Directory(entry)) => entries.push(entry),
            _ => {
                return Err(SpatialError::InvalidOperation(format!(
                    "entry kind does not match page {} at level {}",
                    page_id, level
                )))
            }
        }
        self.store_node(page_id, node, level, path, state)
    }

    /// Descends from the root to the node at `level` best suited to hold `mbr`.
    pub(crate) fn choose_subtree(&self, mbr: &Mbr, level: usize) -> SpatialResult<(NodePath, PageId)> {
        let mut path = NodePath::new();
        let mut page_id = self.header.root_page;
        let mut node_level = self.header.height as usize - 1;

        while node_level > level {
            let children = match self.read_node(page_id)? {
                Node::Directory(children) if !children.is_empty() => children,
                _ => {
                    return Err(SpatialError::InvalidOperation(format!(
                        "expected a non-empty directory at page {}",
                        page_id
                    )))
                }
            };
            let index = if node_level == 1 {
                least_overlap_enlargement(&children, mbr)
            } else {
                least_area_enlargement(&children, mbr)
            };
            path.push((page_id, index));
            page_id = children[index].page_id;
            node_level -= 1;
        }
        Ok((path, page_id))
    }

    /// Writes a modified node, resolving overflow by reinsertion or split and
    /// walking up the path until no ancestor overflows.
    fn store_node(
        &mut self,
        mut page_id: PageId,
        mut node: Node,
        mut level: usize,
        mut path: NodePath,
        state: &mut OverflowState,
    ) -> SpatialResult<()> {
        loop {
            if node.len() <= self.capacity_of(&node) {
                let mbr = node.mbr();
                self.write_node(page_id, node)?;
                return match mbr {
                    Some(mbr) => self.adjust_path(&path, mbr),
                    None => Ok(()),
                };
            }

            if !path.is_empty() && state.first_overflow(level) {
                return self.reinsert(page_id, node, level, &path, state);
            }

            let minimum = self.minimum_of(&node);
            let (stay, moved) = match node {
                Node::Leaf(entries) => {
                    let (a, b) = topological_split(entries, minimum);
                    (Node::Leaf(a), Node::Leaf(b))
                }
                Node::Directory(entries) => {
                    let (a, b) = topological_split(entries, minimum);
                    (Node::Directory(a), Node::Directory(b))
                }
            };
            let stay_mbr = node_mbr(&stay, page_id)?;
            let sibling_page = self.allocate_page()?;
            let sibling_mbr = node_mbr(&moved, sibling_page)?;
            log::trace!(
                "Split page {} at level {} into {} + {} entries (new page {})",
                page_id,
                level,
                stay.len(),
                moved.len(),
                sibling_page
            );
            self.write_node(page_id, stay)?;
            self.write_node(sibling_page, moved)?;

            let Some((parent_id, index)) = path.pop() else {
                return self.grow_root(
                    DirectoryEntry { page_id, mbr: stay_mbr },
                    DirectoryEntry { page_id: sibling_page, mbr: sibling_mbr },
                );
            };

            let mut parent = self.read_node(parent_id)?;
            match &mut parent {
                Node::Directory(children) => {
                    children[index].mbr = stay_mbr;
                    children.push(DirectoryEntry {
                        page_id: sibling_page,
                        mbr: sibling_mbr,
                    });
                }
                Node::Leaf(_) => {
                    return Err(SpatialError::InvalidOperation(format!(
                        "page {} on the insertion path is a leaf",
                        parent_id
                    )))
                }
            }
            page_id = parent_id;
            node = parent;
            level += 1;
        }
    }

    /// Forced reinsertion: removes the entries farthest from the node's
    /// center and inserts them again from the root, closest first.
    fn reinsert(
        &mut self,
        page_id: PageId,
        node: Node,
        level: usize,
        path: &[(PageId, usize)],
        state: &mut OverflowState,
    ) -> SpatialResult<()> {
        let count = self.reinsert_count(&node);
        let center = node_mbr(&node, page_id)?.center();

        let (kept, removed) = match node {
            Node::Leaf(entries) => {
                let (kept, removed) = take_farthest(entries, &center, count);
                (Node::Leaf(kept), removed.into_iter().map(PendingEntry::Leaf).collect::<Vec<_>>())
            }
            Node::Directory(entries) => {
                let (kept, removed) = take_farthest(entries, &center, count);
                (
                    Node::Directory(kept),
                    removed.into_iter().map(PendingEntry::Directory).collect(),
                )
            }
        };
        log::trace!(
            "Reinserting {} entries from page {} at level {}",
            removed.len(),
            page_id,
            level
        );

        let kept_mbr = node_mbr(&kept, page_id)?;
        self.write_node(page_id, kept)?;
        self.adjust_path(path, kept_mbr)?;

        for entry in removed {
            self.insert_at_level(entry, level, state)?;
        }
        Ok(())
    }

    fn reinsert_count(&self, node: &Node) -> usize {
        let len = node.len();
        let wanted = (len as f64 * self.header.reinsert_fraction).ceil() as usize;
        wanted.max(1).min(len.saturating_sub(self.minimum_of(node)))
    }

    /// Replaces the root by a directory over the two halves of a root split.
    fn grow_root(&mut self, first: DirectoryEntry, second: DirectoryEntry) -> SpatialResult<()> {
        let root = self.allocate_page()?;
        self.write_node(root, Node::Directory(vec![first, second]))?;
        self.header.root_page = root;
        self.header.height += 1;
        log::trace!("Tree grew to height {} (root page {})", self.header.height, root);
        Ok(())
    }

    /// Propagates a changed child rectangle up the path, stopping as soon as
    /// an ancestor's entry is already exact.
    pub(crate) fn adjust_path(&mut self, path: &[(PageId, usize)], mut mbr: Mbr) -> SpatialResult<()> {
        for &(parent_id, index) in path.iter().rev() {
            let mut parent = self.read_node(parent_id)?;
            let Node::Directory(children) = &mut parent else {
                return Err(SpatialError::InvalidOperation(format!(
                    "page {} on the insertion path is a leaf",
                    parent_id
                )));
            };
            if children[index].mbr == mbr {
                return Ok(());
            }
            children[index].mbr = mbr;
            mbr = node_mbr(&parent, parent_id)?;
            self.write_node(parent_id, parent)?;
        }
        Ok(())
    }
}

fn node_mbr(node: &Node, page_id: PageId) -> SpatialResult<Mbr> {
    node.mbr().ok_or_else(|| {
        SpatialError::InvalidOperation(format!("page {} unexpectedly empty", page_id))
    })
}

/// Child of a directory above leaves: least overlap enlargement, then least
/// area enlargement, then smallest area.
fn least_overlap_enlargement(children: &[DirectoryEntry], mbr: &Mbr) -> usize {
    let mut best = 0;
    let mut best_key = [f64::INFINITY; 3];
    for (i, child) in children.iter().enumerate() {
        let enlarged = child.mbr.union(mbr);
        let mut overlap_before = 0.0;
        let mut overlap_after = 0.0;
        for (j, other) in children.iter().enumerate() {
            if i != j {
                overlap_before += child.mbr.overlap(&other.mbr);
                overlap_after += enlarged.overlap(&other.mbr);
            }
        }
        let area = enlarged.area();
        let key = [overlap_after - overlap_before, area - child.mbr.area(), area];
        if key < best_key {
            best = i;
            best_key = key;
        }
    }
    best
}

/// Child of a higher directory: least area enlargement, then smallest area.
fn least_area_enlargement(children: &[DirectoryEntry], mbr: &Mbr) -> usize {
    let mut best = 0;
    let mut best_key = [f64::INFINITY; 2];
    for (i, child) in children.iter().enumerate() {
        let area = child.mbr.union(mbr).area();
        let key = [area - child.mbr.area(), area];
        if key < best_key {
            best = i;
            best_key = key;
        }
    }
    best
}

/// Splits off the `count` entries whose centers lie farthest from `center`.
/// The removed entries come back ordered closest first.
fn take_farthest<E: SpatialEntry>(mut entries: Vec<E>, center: &[f64], count: usize) -> (Vec<E>, Vec<E>) {
    let distance = |entry: &E| -> f64 {
        let mbr = entry.mbr();
        center
            .iter()
            .enumerate()
            .map(|(dim, c)| {
                let d = mbr.center_at(dim) - c;
                d * d
            })
            .sum()
    };
    entries.sort_by(|a, b| distance(a).total_cmp(&distance(b)));
    let removed = entries.split_off(entries.len() - count.min(entries.len()));
    (entries, removed)
}
