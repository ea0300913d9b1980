//! Deletion with tree condensation.

use super::insert::{NodePath, OverflowState};
use super::rtree_impl::RTree;
use super::rtree_types::{LeafEntry, Node, ObjectId, PendingEntry};
use crate::errors::{SpatialError, SpatialResult};
use crate::spatial::{Mbr, SpatialComparable};
use crate::storage::PageId;

impl RTree {
    /// Removes the entry with this id whose rectangle equals `key`'s.
    ///
    /// Only subtrees containing the key are searched. Returns `Ok(false)` if
    /// no such entry exists.
    pub fn delete(&mut self, id: ObjectId, key: &dyn SpatialComparable) -> SpatialResult<bool> {
        self.ensure_writable()?;
        self.check_dimensionality(key)?;
        let mbr = key.mbr();
        self.delete_matching(id, Some(&mbr))
    }

    /// Removes one entry with this id, searching the whole tree.
    pub fn delete_by_id(&mut self, id: ObjectId) -> SpatialResult<bool> {
        self.ensure_writable()?;
        self.delete_matching(id, None)
    }

    fn delete_matching(&mut self, id: ObjectId, mbr: Option<&Mbr>) -> SpatialResult<bool> {
        let mut path = NodePath::new();
        let Some((leaf_page, index)) = self.find_leaf(self.header.root_page, id, mbr, &mut path)?
        else {
            return Ok(false);
        };

        self.condense(path, leaf_page, index)?;
        self.header.entry_count -= 1;
        self.write_header()?;
        Ok(true)
    }

    /// Depth-first search for the leaf holding a matching entry. On success
    /// `path` holds the directories leading to it.
    fn find_leaf(
        &self,
        page_id: PageId,
        id: ObjectId,
        mbr: Option<&Mbr>,
        path: &mut NodePath,
    ) -> SpatialResult<Option<(PageId, usize)>> {
        match self.read_node(page_id)? {
            Node::Leaf(entries) => Ok(entries
                .iter()
                .position(|e| e.id == id && mbr.map_or(true, |m| e.mbr == *m))
                .map(|index| (page_id, index))),
            Node::Directory(children) => {
                for (index, child) in children.iter().enumerate() {
                    if mbr.is_some_and(|m| !child.mbr.contains(m)) {
                        continue;
                    }
                    path.push((page_id, index));
                    if let Some(found) = self.find_leaf(child.page_id, id, mbr, path)? {
                        return Ok(Some(found));
                    }
                    path.pop();
                }
                Ok(None)
            }
        }
    }

    /// Removes entry `index` from the leaf and repairs the path above it.
    ///
    /// Underfull nodes are cut from their parent and their pages freed; their
    /// leaf entries are inserted again once the path is consistent.
    fn condense(&mut self, mut path: NodePath, leaf_page: PageId, index: usize) -> SpatialResult<()> {
        let mut node = self.read_node(leaf_page)?;
        if let Node::Leaf(entries) = &mut node {
            entries.remove(index);
        }

        let mut page_id = leaf_page;
        let mut orphans = Vec::new();
        while let Some((parent_id, child_index)) = path.pop() {
            let mut parent = self.read_node(parent_id)?;
            let Node::Directory(children) = &mut parent else {
                return Err(SpatialError::InvalidOperation(format!(
                    "page {} on the deletion path is a leaf",
                    parent_id
                )));
            };

            match node.mbr() {
                Some(mbr) if node.len() >= self.minimum_of(&node) => {
                    children[child_index].mbr = mbr;
                    self.write_node(page_id, node)?;
                }
                _ => {
                    children.remove(child_index);
                    log::trace!(
                        "Dissolving underfull page {} ({} entries)",
                        page_id,
                        node.len()
                    );
                    self.dissolve(node, &mut orphans)?;
                    self.free_page(page_id)?;
                }
            }

            page_id = parent_id;
            node = parent;
        }

        // `node` is now the root
        self.write_node(page_id, node)?;
        self.shorten_root()?;

        if !orphans.is_empty() {
            log::trace!("Reinserting {} orphaned entries", orphans.len());
        }
        for entry in orphans {
            let mut state = OverflowState::default();
            self.insert_at_level(PendingEntry::Leaf(entry), 0, &mut state)?;
        }
        Ok(())
    }

    /// Collects the leaf entries below `node`, freeing every page beneath it.
    fn dissolve(&mut self, node: Node, out: &mut Vec<LeafEntry>) -> SpatialResult<()> {
        match node {
            Node::Leaf(entries) => out.extend(entries),
            Node::Directory(children) => {
                for child in children {
                    let child_node = self.read_node(child.page_id)?;
                    self.dissolve(child_node, out)?;
                    self.free_page(child.page_id)?;
                }
            }
        }
        Ok(())
    }

    /// Replaces a directory root with a single child by that child, repeatedly.
    /// A directory root left without children becomes an empty leaf.
    fn shorten_root(&mut self) -> SpatialResult<()> {
        loop {
            let root = self.header.root_page;
            match self.read_node(root)? {
                Node::Directory(children) if children.len() == 1 => {
                    self.header.root_page = children[0].page_id;
                    self.header.height -= 1;
                    self.free_page(root)?;
                    log::trace!(
                        "Tree shrank to height {} (root page {})",
                        self.header.height,
                        self.header.root_page
                    );
                }
                Node::Directory(children) if children.is_empty() => {
                    self.write_node(root, Node::Leaf(Vec::new()))?;
                    self.header.height = 1;
                    return Ok(());
                }
                _ => return Ok(()),
            }
        }
    }
}
