//! Tie-exact bounded heap for k-nearest-neighbor search.
//!
//! Holds the k best candidates in a max-heap plus a list of candidates tied
//! with the current k-th distance. Ties are kept instead of being dropped
//! arbitrarily, so a query returns every object at the boundary distance.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use super::result_list::KnnList;
use crate::rtree::ObjectId;

/// A candidate result: an object id and its distance to the query.
#[derive(Debug, Clone, Copy)]
pub struct Neighbor {
    pub distance: f64,
    pub id: ObjectId,
}

impl Neighbor {
    pub fn new(distance: f64, id: ObjectId) -> Self {
        Self { distance, id }
    }
}

impl PartialEq for Neighbor {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Neighbor {}

impl PartialOrd for Neighbor {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Neighbor {
    /// By distance, then by id.
    fn cmp(&self, other: &Self) -> Ordering {
        self.distance
            .total_cmp(&other.distance)
            .then_with(|| self.id.cmp(&other.id))
    }
}

/// Keeps the `k` nearest candidates plus everything tied with the k-th.
#[derive(Debug, Clone)]
pub struct BoundedHeap {
    k: usize,
    heap: BinaryHeap<Neighbor>,
    ties: Vec<Neighbor>,
    kdist: f64,
}

impl BoundedHeap {
    /// Creates a heap for `k` neighbors. `k` is raised to at least 1.
    pub fn new(k: usize) -> Self {
        let k = k.max(1);
        Self {
            k,
            heap: BinaryHeap::with_capacity(k + 1),
            ties: Vec::new(),
            kdist: f64::INFINITY,
        }
    }

    pub fn k(&self) -> usize {
        self.k
    }

    /// The current k-th distance, infinite until `k` candidates are held.
    pub fn kdist(&self) -> f64 {
        self.kdist
    }

    /// Number of candidates held, ties included.
    pub fn size(&self) -> usize {
        self.heap.len() + self.ties.len()
    }

    pub fn is_empty(&self) -> bool {
        self.size() == 0
    }

    /// Offers a candidate.
    ///
    /// Below `k` candidates everything is accepted. After that, a strictly
    /// closer candidate replaces the worst one (which becomes a tie if the
    /// k-th distance does not shrink), an equally distant one joins the
    /// ties, and anything farther is dropped.
    pub fn insert(&mut self, distance: f64, id: ObjectId) {
        let candidate = Neighbor::new(distance, id);

        if self.heap.len() < self.k {
            self.heap.push(candidate);
            if self.heap.len() == self.k {
                self.kdist = self.worst_distance();
            }
            return;
        }

        if distance < self.kdist {
            let evicted = self.heap.pop();
            self.heap.push(candidate);
            let worst = self.worst_distance();
            if let Some(evicted) = evicted {
                if worst < evicted.distance {
                    self.ties.clear();
                } else {
                    self.ties.push(evicted);
                }
            }
            self.kdist = worst;
        } else if distance == self.kdist {
            self.ties.push(candidate);
        }
    }

    /// Removes one candidate: the most recent tie if any, otherwise the
    /// current worst.
    pub fn poll(&mut self) -> Option<Neighbor> {
        self.ties.pop().or_else(|| self.heap.pop())
    }

    fn worst_distance(&self) -> f64 {
        self.heap.peek().map_or(f64::INFINITY, |n| n.distance)
    }

    /// Consumes the heap into a list sorted by distance, then id.
    pub fn into_result_list(self) -> KnnList {
        let mut neighbors = self.heap.into_vec();
        neighbors.extend(self.ties);
        KnnList::new(self.k, neighbors)
    }
}
