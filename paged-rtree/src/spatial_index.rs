//! SpatialIndex trait definition.

use crate::distance::SpatialDistance;
use crate::errors::SpatialResult;
use crate::knn::KnnList;
use crate::rtree::{ObjectId, RTree};
use crate::spatial::SpatialComparable;

/// The surface that code consuming a spatial index works against.
///
/// Object safe, so callers can hold a `Box<dyn SpatialIndex>`.
pub trait SpatialIndex: Send + Sync {
    /// Adds an object.
    fn insert(&mut self, id: ObjectId, key: &dyn SpatialComparable) -> SpatialResult<()>;

    /// Removes an object; `Ok(false)` if it is not indexed.
    fn delete(&mut self, id: ObjectId, key: &dyn SpatialComparable) -> SpatialResult<bool>;

    /// Finds the objects within `radius` of `key`.
    fn range_query(
        &self,
        key: &dyn SpatialComparable,
        radius: f64,
        distance: &dyn SpatialDistance,
    ) -> SpatialResult<Vec<(ObjectId, f64)>>;

    /// Finds the `k` nearest objects, boundary ties included.
    fn knn(
        &self,
        key: &dyn SpatialComparable,
        k: usize,
        distance: &dyn SpatialDistance,
    ) -> SpatialResult<KnnList>;

    /// Gets the number of indexed objects.
    fn len(&self) -> u64;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl SpatialIndex for RTree {
    fn insert(&mut self, id: ObjectId, key: &dyn SpatialComparable) -> SpatialResult<()> {
        RTree::insert(self, id, key)
    }

    fn delete(&mut self, id: ObjectId, key: &dyn SpatialComparable) -> SpatialResult<bool> {
        RTree::delete(self, id, key)
    }

    fn range_query(
        &self,
        key: &dyn SpatialComparable,
        radius: f64,
        distance: &dyn SpatialDistance,
    ) -> SpatialResult<Vec<(ObjectId, f64)>> {
        self.range_query_with(key, radius, distance)
    }

    fn knn(
        &self,
        key: &dyn SpatialComparable,
        k: usize,
        distance: &dyn SpatialDistance,
    ) -> SpatialResult<KnnList> {
        self.knn_with(key, k, distance)
    }

    fn len(&self) -> u64 {
        RTree::len(self)
    }
}
