//! Distance functions usable for pruning.
//!
//! Every function computes `min_dist`, the smallest distance between any two
//! points of the two extents. For two points this is their exact distance, for
//! a point and a rectangle it is the classic MINDIST lower bound used to prune
//! subtrees during search.

use crate::spatial::SpatialComparable;

/// A distance that can bound the distance between spatial extents from below.
pub trait SpatialDistance: Send + Sync {
    /// Lower bound on the distance between any point of `a` and any point of `b`.
    ///
    /// Both arguments must have the same dimensionality.
    fn min_dist(&self, a: &dyn SpatialComparable, b: &dyn SpatialComparable) -> f64;

    /// Short name used in log output.
    fn name(&self) -> &'static str;
}

/// Per-dimension gap between two extents, 0 when they overlap in `dim`.
#[inline]
fn gap(a: &dyn SpatialComparable, b: &dyn SpatialComparable, dim: usize) -> f64 {
    let below = b.min_at(dim) - a.max_at(dim);
    let above = a.min_at(dim) - b.max_at(dim);
    below.max(above).max(0.0)
}

/// Standard L2 distance.
#[derive(Debug, Clone, Copy, Default)]
pub struct EuclideanDistance;

impl SpatialDistance for EuclideanDistance {
    fn min_dist(&self, a: &dyn SpatialComparable, b: &dyn SpatialComparable) -> f64 {
        SquaredEuclideanDistance.min_dist(a, b).sqrt()
    }

    fn name(&self) -> &'static str {
        "euclidean"
    }
}

/// L2 distance without the square root; preserves the ordering of
/// [`EuclideanDistance`] and is cheaper to evaluate.
#[derive(Debug, Clone, Copy, Default)]
pub struct SquaredEuclideanDistance;

impl SpatialDistance for SquaredEuclideanDistance {
    fn min_dist(&self, a: &dyn SpatialComparable, b: &dyn SpatialComparable) -> f64 {
        (0..a.dimensionality())
            .map(|d| {
                let g = gap(a, b, d);
                g * g
            })
            .sum()
    }

    fn name(&self) -> &'static str {
        "squared-euclidean"
    }
}

/// L1 distance.
#[derive(Debug, Clone, Copy, Default)]
pub struct ManhattanDistance;

impl SpatialDistance for ManhattanDistance {
    fn min_dist(&self, a: &dyn SpatialComparable, b: &dyn SpatialComparable) -> f64 {
        (0..a.dimensionality()).map(|d| gap(a, b, d)).sum()
    }

    fn name(&self) -> &'static str {
        "manhattan"
    }
}

/// L-infinity (Chebyshev) distance.
#[derive(Debug, Clone, Copy, Default)]
pub struct MaximumDistance;

impl SpatialDistance for MaximumDistance {
    fn min_dist(&self, a: &dyn SpatialComparable, b: &dyn SpatialComparable) -> f64 {
        (0..a.dimensionality())
            .map(|d| gap(a, b, d))
            .fold(0.0, f64::max)
    }

    fn name(&self) -> &'static str {
        "maximum"
    }
}
