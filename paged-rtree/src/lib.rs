//! # Paged R-Tree - Disk-Backed Spatial Index
//!
//! A persistent R*-tree answering k-nearest-neighbor and range queries over
//! point and box collections too large to scan linearly.
//!
//! ## Features
//!
//! - **Page Store**: Memory-mapped file of fixed-size records with a validated header
//! - **LRU Cache**: Decoded nodes kept in memory per tree
//! - **R\* Balancing**: Forced reinsertion and overlap-minimizing splits
//! - **Bulk Loading**: Sort-Tile-Recursive packing
//! - **Tie-Exact KNN**: Every object tied with the k-th distance is returned
//! - **Persistent**: Data survives process restarts; freed pages are reused
//! - **Shared Reads**: Queries take `&self` and can run from many threads
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use paged_rtree::{Mbr, Point, RTree};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let mut tree = RTree::create("places.rtree", 2)?;
//!
//! tree.insert(1, &Point::new(vec![0.0, 0.0]))?;
//! tree.insert(2, &Mbr::new(vec![1.0, 1.0], vec![2.0, 3.0]))?;
//!
//! // Nearest neighbors, ties at the boundary included
//! let nearest = tree.knn(&Point::new(vec![0.5, 0.5]), 1)?;
//! for neighbor in &nearest {
//!     println!("{} at {}", neighbor.id, neighbor.distance);
//! }
//!
//! // Everything within a radius
//! let close = tree.range_query(&Point::new(vec![0.0, 0.0]), 2.0)?;
//! # let _ = close;
//! tree.close()?;
//! # Ok(())
//! # }
//! ```

pub mod distance;
pub mod errors;
pub mod knn;
pub mod rtree;
pub mod spatial;
pub mod spatial_index;
pub mod storage;

pub use distance::{
    EuclideanDistance, ManhattanDistance, MaximumDistance, SpatialDistance,
    SquaredEuclideanDistance,
};
pub use errors::{SpatialError, SpatialResult};
pub use knn::{BoundedHeap, KnnList, Neighbor};
pub use rtree::{
    IntegrityReport, LeafEntry, ObjectId, RTree, RTreeBuilder, RTreeConfig, RTreeStats,
};
pub use spatial::{Mbr, Point, SpatialComparable};
pub use spatial_index::SpatialIndex;
pub use storage::{PageId, PageStore};
