//! Spatial keys: the capability every indexed object provides, plus the two
//! concrete key types the tree works with.
//!
//! The tree itself only stores minimum bounding rectangles. Points are kept as
//! degenerate rectangles (`min == max` in every dimension), which makes the
//! lower-bound distance to a stored point its exact distance.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Anything that can be compared spatially with the index.
///
/// Implementors describe an axis-aligned extent per dimension. For a point,
/// `min_at(d) == max_at(d)`.
pub trait SpatialComparable {
    /// Number of dimensions of this object.
    fn dimensionality(&self) -> usize;

    /// Lower bound of the extent in dimension `dim`.
    fn min_at(&self, dim: usize) -> f64;

    /// Upper bound of the extent in dimension `dim`.
    fn max_at(&self, dim: usize) -> f64;

    /// `false` when the lower and upper bounds disagree on the number of
    /// dimensions. Tree operations reject such keys.
    fn is_well_formed(&self) -> bool {
        true
    }

    /// The minimum bounding rectangle of this object.
    fn mbr(&self) -> Mbr {
        let dims = self.dimensionality();
        Mbr {
            min: (0..dims).map(|d| self.min_at(d)).collect(),
            max: (0..dims).map(|d| self.max_at(d)).collect(),
        }
    }
}

/// A point in d-dimensional space.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Point {
    coords: Vec<f64>,
}

impl Point {
    pub fn new(coords: Vec<f64>) -> Self {
        Self { coords }
    }

    pub fn coords(&self) -> &[f64] {
        &self.coords
    }
}

impl From<Vec<f64>> for Point {
    fn from(coords: Vec<f64>) -> Self {
        Self::new(coords)
    }
}

impl From<&[f64]> for Point {
    fn from(coords: &[f64]) -> Self {
        Self::new(coords.to_vec())
    }
}

impl SpatialComparable for Point {
    fn dimensionality(&self) -> usize {
        self.coords.len()
    }

    fn min_at(&self, dim: usize) -> f64 {
        self.coords[dim]
    }

    fn max_at(&self, dim: usize) -> f64 {
        self.coords[dim]
    }
}

impl fmt::Display for Point {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Point{:?}", self.coords)
    }
}

/// Minimum bounding rectangle.
///
/// Used both as the stored key of leaf entries and as the covering
/// rectangle of directory entries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Mbr {
    /// Lower corner, one value per dimension
    pub min: Vec<f64>,
    /// Upper corner, one value per dimension
    pub max: Vec<f64>,
}

impl Mbr {
    /// Creates a rectangle from its two corners.
    ///
    /// Both corners must have the same length and `min[d] <= max[d]`; the
    /// tree refuses rectangles that break either rule.
    pub fn new(min: Vec<f64>, max: Vec<f64>) -> Self {
        Self { min, max }
    }

    /// A degenerate rectangle covering exactly one point.
    pub fn from_point(coords: &[f64]) -> Self {
        Self {
            min: coords.to_vec(),
            max: coords.to_vec(),
        }
    }

    /// The neutral element of [`Mbr::extend`]: inverted infinite bounds.
    pub fn empty(dims: usize) -> Self {
        Self {
            min: vec![f64::INFINITY; dims],
            max: vec![f64::NEG_INFINITY; dims],
        }
    }

    pub fn is_empty(&self) -> bool {
        self.min.iter().zip(&self.max).any(|(lo, hi)| lo > hi)
    }

    /// Union of a sequence of rectangles, `None` when the sequence is empty.
    pub fn union_all<'a, I>(mbrs: I) -> Option<Mbr>
    where
        I: IntoIterator<Item = &'a Mbr>,
    {
        let mut iter = mbrs.into_iter();
        let mut acc = iter.next()?.clone();
        for mbr in iter {
            acc.extend(mbr);
        }
        Some(acc)
    }

    /// Grows this rectangle to cover `other`.
    pub fn extend(&mut self, other: &Mbr) {
        for d in 0..self.min.len() {
            self.min[d] = self.min[d].min(other.min[d]);
            self.max[d] = self.max[d].max(other.max[d]);
        }
    }

    pub fn union(&self, other: &Mbr) -> Mbr {
        let mut merged = self.clone();
        merged.extend(other);
        merged
    }

    /// Volume (area in 2D).
    pub fn area(&self) -> f64 {
        self.min
            .iter()
            .zip(&self.max)
            .map(|(lo, hi)| (hi - lo).max(0.0))
            .product()
    }

    /// Sum of the edge lengths, the R* "margin" up to a constant factor.
    pub fn margin(&self) -> f64 {
        self.min.iter().zip(&self.max).map(|(lo, hi)| hi - lo).sum()
    }

    /// Volume of the intersection with `other`, 0 when they are disjoint.
    pub fn overlap(&self, other: &Mbr) -> f64 {
        let mut volume = 1.0;
        for d in 0..self.min.len() {
            let lo = self.min[d].max(other.min[d]);
            let hi = self.max[d].min(other.max[d]);
            if hi < lo {
                return 0.0;
            }
            volume *= hi - lo;
        }
        volume
    }

    /// Area increase needed to cover `other`.
    pub fn enlargement(&self, other: &Mbr) -> f64 {
        self.union(other).area() - self.area()
    }

    pub fn intersects(&self, other: &Mbr) -> bool {
        (0..self.min.len()).all(|d| self.min[d] <= other.max[d] && other.min[d] <= self.max[d])
    }

    /// `true` when `other` lies completely inside this rectangle.
    pub fn contains(&self, other: &Mbr) -> bool {
        (0..self.min.len()).all(|d| self.min[d] <= other.min[d] && other.max[d] <= self.max[d])
    }

    pub fn center(&self) -> Vec<f64> {
        self.min
            .iter()
            .zip(&self.max)
            .map(|(lo, hi)| (lo + hi) / 2.0)
            .collect()
    }

    /// Center coordinate in a single dimension.
    pub fn center_at(&self, dim: usize) -> f64 {
        (self.min[dim] + self.max[dim]) / 2.0
    }
}

impl SpatialComparable for Mbr {
    fn dimensionality(&self) -> usize {
        self.min.len()
    }

    fn min_at(&self, dim: usize) -> f64 {
        self.min.get(dim).copied().unwrap_or(f64::NAN)
    }

    fn max_at(&self, dim: usize) -> f64 {
        self.max.get(dim).copied().unwrap_or(f64::NAN)
    }

    fn is_well_formed(&self) -> bool {
        self.min.len() == self.max.len()
    }

    fn mbr(&self) -> Mbr {
        self.clone()
    }
}

impl fmt::Display for Mbr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Mbr({:?}, {:?})", self.min, self.max)
    }
}
