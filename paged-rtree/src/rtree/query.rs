//! Range and k-nearest-neighbor queries.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use super::rtree_impl::RTree;
use super::rtree_types::{Node, ObjectId};
use crate::distance::{EuclideanDistance, SpatialDistance};
use crate::errors::SpatialResult;
use crate::knn::{BoundedHeap, KnnList};
use crate::spatial::SpatialComparable;
use crate::storage::PageId;

/// A subtree waiting in the best-first queue, nearest first.
#[derive(Debug, Clone, Copy)]
struct QueuedPage {
    min_dist: f64,
    page_id: PageId,
}

impl PartialEq for QueuedPage {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for QueuedPage {}

impl PartialOrd for QueuedPage {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for QueuedPage {
    // reversed: BinaryHeap is a max-heap
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .min_dist
            .total_cmp(&self.min_dist)
            .then_with(|| other.page_id.cmp(&self.page_id))
    }
}

impl RTree {
    /// All objects within `radius` of `key` under the Euclidean distance.
    pub fn range_query(
        &self,
        key: &dyn SpatialComparable,
        radius: f64,
    ) -> SpatialResult<Vec<(ObjectId, f64)>> {
        self.range_query_with(key, radius, &EuclideanDistance)
    }

    /// All objects within `radius` of `key`, unordered, with their distances.
    pub fn range_query_with(
        &self,
        key: &dyn SpatialComparable,
        radius: f64,
        distance: &dyn SpatialDistance,
    ) -> SpatialResult<Vec<(ObjectId, f64)>> {
        self.check_dimensionality(key)?;

        let mut found = Vec::new();
        let mut stack = vec![self.header.root_page];
        while let Some(page_id) = stack.pop() {
            match self.read_node(page_id)? {
                Node::Leaf(entries) => {
                    for entry in entries {
                        let d = distance.min_dist(key, &entry.mbr);
                        if d <= radius {
                            found.push((entry.id, d));
                        }
                    }
                }
                Node::Directory(children) => {
                    for child in children {
                        if distance.min_dist(key, &child.mbr) <= radius {
                            stack.push(child.page_id);
                        }
                    }
                }
            }
        }
        Ok(found)
    }

    /// Objects whose rectangle intersects `window`.
    pub fn intersecting(&self, window: &dyn SpatialComparable) -> SpatialResult<Vec<ObjectId>> {
        self.check_dimensionality(window)?;
        let window = window.mbr();

        let mut found = Vec::new();
        let mut stack = vec![self.header.root_page];
        while let Some(page_id) = stack.pop() {
            match self.read_node(page_id)? {
                Node::Leaf(entries) => {
                    found.extend(entries.iter().filter(|e| e.mbr.intersects(&window)).map(|e| e.id));
                }
                Node::Directory(children) => {
                    stack.extend(
                        children
                            .iter()
                            .filter(|c| c.mbr.intersects(&window))
                            .map(|c| c.page_id),
                    );
                }
            }
        }
        Ok(found)
    }

    /// The `k` nearest objects to `key` under the Euclidean distance.
    pub fn knn(&self, key: &dyn SpatialComparable, k: usize) -> SpatialResult<KnnList> {
        self.knn_with(key, k, &EuclideanDistance)
    }

    /// The `k` nearest objects to `key`, plus every object tied with the k-th.
    ///
    /// Best-first search: subtrees are visited by increasing lower-bound
    /// distance and dropped once their bound exceeds the current k-th
    /// distance. Subtrees exactly at that distance are still visited, so no
    /// tie is missed.
    pub fn knn_with(
        &self,
        key: &dyn SpatialComparable,
        k: usize,
        distance: &dyn SpatialDistance,
    ) -> SpatialResult<KnnList> {
        self.check_dimensionality(key)?;
        if k == 0 {
            return Ok(KnnList::new(0, Vec::new()));
        }

        let mut heap = BoundedHeap::new(k);
        let mut queue = BinaryHeap::new();
        queue.push(QueuedPage {
            min_dist: 0.0,
            page_id: self.header.root_page,
        });

        while let Some(QueuedPage { min_dist, page_id }) = queue.pop() {
            if min_dist > heap.kdist() {
                break;
            }
            match self.read_node(page_id)? {
                Node::Leaf(entries) => {
                    for entry in entries {
                        heap.insert(distance.min_dist(key, &entry.mbr), entry.id);
                    }
                }
                Node::Directory(children) => {
                    for child in children {
                        let d = distance.min_dist(key, &child.mbr);
                        if d <= heap.kdist() {
                            queue.push(QueuedPage {
                                min_dist: d,
                                page_id: child.page_id,
                            });
                        }
                    }
                }
            }
        }

        Ok(heap.into_result_list())
    }
}
