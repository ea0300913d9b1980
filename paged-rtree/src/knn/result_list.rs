//! Immutable k-nearest-neighbor result list.

use std::slice;

use super::bounded_heap::Neighbor;
use crate::rtree::ObjectId;

/// Neighbors in ascending (distance, id) order.
///
/// Holds at least `k` neighbors when the tree has that many objects, and more
/// when several objects tie with the k-th distance.
#[derive(Debug, Clone, PartialEq)]
pub struct KnnList {
    k: usize,
    neighbors: Vec<Neighbor>,
}

impl KnnList {
    /// Sorts `neighbors` and wraps them.
    pub fn new(k: usize, mut neighbors: Vec<Neighbor>) -> Self {
        neighbors.sort();
        Self { k, neighbors }
    }

    /// The `k` the list was computed for.
    pub fn k(&self) -> usize {
        self.k
    }

    pub fn len(&self) -> usize {
        self.neighbors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.neighbors.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Neighbor> {
        self.neighbors.get(index)
    }

    pub fn iter(&self) -> slice::Iter<'_, Neighbor> {
        self.neighbors.iter()
    }

    pub fn ids(&self) -> Vec<ObjectId> {
        self.neighbors.iter().map(|n| n.id).collect()
    }

    pub fn distances(&self) -> Vec<f64> {
        self.neighbors.iter().map(|n| n.distance).collect()
    }

    /// Distance of the k-th neighbor, infinite when fewer than `k` were found.
    pub fn k_distance(&self) -> f64 {
        match self.k.checked_sub(1).and_then(|i| self.neighbors.get(i)) {
            Some(n) => n.distance,
            None => f64::INFINITY,
        }
    }

    pub fn contains(&self, id: ObjectId) -> bool {
        self.neighbors.iter().any(|n| n.id == id)
    }

    /// The result for a smaller `k`, keeping every neighbor tied with the new
    /// k-th distance.
    pub fn sublist(&self, k: usize) -> KnnList {
        if k == 0 {
            return KnnList {
                k,
                neighbors: Vec::new(),
            };
        }
        if k >= self.neighbors.len() {
            return KnnList {
                k,
                neighbors: self.neighbors.clone(),
            };
        }

        let boundary = self.neighbors[k - 1].distance;
        let end = k + self.neighbors[k..]
            .iter()
            .take_while(|n| n.distance == boundary)
            .count();
        KnnList {
            k,
            neighbors: self.neighbors[..end].to_vec(),
        }
    }

    pub fn as_slice(&self) -> &[Neighbor] {
        &self.neighbors
    }

    pub fn into_vec(self) -> Vec<Neighbor> {
        self.neighbors
    }
}

impl<'a> IntoIterator for &'a KnnList {
    type Item = &'a Neighbor;
    type IntoIter = slice::Iter<'a, Neighbor>;

    fn into_iter(self) -> Self::IntoIter {
        self.neighbors.iter()
    }
}

impl IntoIterator for KnnList {
    type Item = Neighbor;
    type IntoIter = std::vec::IntoIter<Neighbor>;

    fn into_iter(self) -> Self::IntoIter {
        self.neighbors.into_iter()
    }
}
