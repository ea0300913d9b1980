//! Bounded k-nearest-neighbor collection and its result list.

pub mod bounded_heap;
pub mod result_list;

pub use bounded_heap::{BoundedHeap, Neighbor};
pub use result_list::KnnList;
