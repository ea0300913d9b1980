//! Encodes nodes into page records and derives node capacities.
//!
//! Nodes use the bincode legacy configuration (fixed-width integers), so the
//! encoded size of a node is a linear function of its entry count:
//!
//! ```text
//! overhead        = 4 (variant tag) + 8 (entry count)              = 12
//! leaf entry      = 8 (id)      + 2 * (8 + 8 * d) (min/max corner) = 24 + 16d
//! directory entry = 4 (page id) + 2 * (8 + 8 * d)                  = 20 + 16d
//! capacity        = floor((record_size - overhead) / entry size)
//! ```
//!
//! The sizes are measured by encoding sample values rather than hard-coded.

use super::rtree_types::{DirectoryEntry, FreePage, LeafEntry, Node};
use crate::errors::{SpatialError, SpatialResult};
use crate::spatial::Mbr;
use crate::storage::PageId;

/// Per-tree node encoder bound to a record size and dimensionality.
#[derive(Debug, Clone)]
pub struct NodeCodec {
    record_size: usize,
    dimensionality: usize,
}

fn encoded_len<T: serde::Serialize>(value: &T) -> usize {
    bincode::serde::encode_to_vec(value, bincode::config::legacy())
        .map(|bytes| bytes.len())
        .unwrap_or(usize::MAX)
}

impl NodeCodec {
    pub fn new(record_size: usize, dimensionality: usize) -> Self {
        Self {
            record_size,
            dimensionality,
        }
    }

    pub fn record_size(&self) -> usize {
        self.record_size
    }

    /// Bytes taken by a node without entries.
    pub fn overhead() -> usize {
        encoded_len(&Node::Leaf(Vec::new()))
    }

    pub fn leaf_entry_size(&self) -> usize {
        encoded_len(&LeafEntry {
            id: 0,
            mbr: Mbr::from_point(&vec![0.0; self.dimensionality]),
        })
    }

    pub fn dir_entry_size(&self) -> usize {
        encoded_len(&DirectoryEntry {
            page_id: 0,
            mbr: Mbr::from_point(&vec![0.0; self.dimensionality]),
        })
    }

    /// Maximum number of leaf entries one record can hold.
    pub fn leaf_capacity(&self) -> usize {
        self.record_size.saturating_sub(Self::overhead()) / self.leaf_entry_size()
    }

    /// Maximum number of directory entries one record can hold.
    pub fn dir_capacity(&self) -> usize {
        self.record_size.saturating_sub(Self::overhead()) / self.dir_entry_size()
    }

    /// Writes `node` to the start of `buffer` and zeroes the rest.
    ///
    /// Fails without touching the buffer if the node does not fit.
    pub fn encode(&self, page_id: PageId, node: &Node, buffer: &mut [u8]) -> SpatialResult<()> {
        let bytes = bincode::serde::encode_to_vec(node, bincode::config::legacy())?;
        if bytes.len() > buffer.len() {
            return Err(SpatialError::NodeTooLarge {
                page_id,
                size: bytes.len(),
                record_size: buffer.len(),
            });
        }
        buffer[..bytes.len()].copy_from_slice(&bytes);
        buffer[bytes.len()..].fill(0);
        Ok(())
    }

    pub fn decode(&self, buffer: &[u8]) -> SpatialResult<Node> {
        let (node, _) = bincode::serde::decode_from_slice(buffer, bincode::config::legacy())?;
        Ok(node)
    }

    pub fn encode_free(&self, free: &FreePage, buffer: &mut [u8]) -> SpatialResult<()> {
        let written = bincode::serde::encode_into_slice(free, &mut *buffer, bincode::config::legacy())?;
        buffer[written..].fill(0);
        Ok(())
    }

    pub fn decode_free(&self, buffer: &[u8]) -> SpatialResult<FreePage> {
        let (free, _) = bincode::serde::decode_from_slice(buffer, bincode::config::legacy())?;
        Ok(free)
    }
}

/// Minimum entries of a non-root node for a given capacity.
///
/// At least one, and small enough that an overflowing node (capacity + 1
/// entries) can always be split into two valid halves.
pub fn minimum_fill(capacity: usize, min_fill: f64) -> usize {
    let minimum = (capacity as f64 * min_fill).floor() as usize;
    minimum.clamp(1, ((capacity + 1) / 2).max(1))
}
