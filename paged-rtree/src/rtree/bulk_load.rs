//! Sort-Tile-Recursive bulk loading.
//!
//! Entries are packed bottom-up. At each level the number of nodes is fixed
//! first (`ceil(n / capacity)`), and the entries are spread over them as
//! evenly as possible, so every node other than the root meets the minimum
//! fill. The order follows STR: slice by center along the first dimension,
//! tile each slice along the next one, and so on.

use super::rtree_impl::RTree;
use super::rtree_types::{DirectoryEntry, LeafEntry, Node, ObjectId, SpatialEntry};
use crate::errors::{SpatialError, SpatialResult};
use crate::spatial::{Mbr, SpatialComparable};

impl RTree {
    /// Builds the tree from `entries` in one pass.
    ///
    /// Only allowed on an empty tree. Every key is checked before anything is
    /// written.
    pub fn bulk_load<I, K>(&mut self, entries: I) -> SpatialResult<()>
    where
        I: IntoIterator<Item = (ObjectId, K)>,
        K: SpatialComparable,
    {
        self.ensure_writable()?;
        if !self.is_empty() {
            return Err(SpatialError::InvalidOperation(format!(
                "bulk load needs an empty tree, this one holds {} entries",
                self.len()
            )));
        }

        let mut leaves = Vec::new();
        for (id, key) in entries {
            self.check_dimensionality(&key)?;
            let mbr = key.mbr();
            self.check_key(&mbr)?;
            leaves.push(LeafEntry { id, mbr });
        }
        if leaves.is_empty() {
            return Ok(());
        }
        let count = leaves.len() as u64;

        // The empty root leaf goes back to the free list so packing reuses it.
        self.free_page(self.header.root_page)?;

        let mut level = self.pack_level(leaves, self.leaf_capacity(), Node::Leaf)?;
        let mut height = 1;
        while level.len() > 1 {
            level = self.pack_level(level, self.dir_capacity(), Node::Directory)?;
            height += 1;
        }

        let root = level.pop().ok_or_else(|| {
            SpatialError::InvalidOperation("bulk load produced no root".into())
        })?;
        self.header.root_page = root.page_id;
        self.header.height = height;
        self.header.entry_count = count;
        self.write_header()?;

        log::debug!(
            "Bulk loaded {} entries into {} (height {}, {} pages)",
            count,
            self.path().display(),
            height,
            self.header.next_page_id - self.header.free_page_count
        );
        Ok(())
    }

    /// Packs one level into nodes and returns the directory entries that
    /// point at them.
    fn pack_level<E: SpatialEntry>(
        &mut self,
        entries: Vec<E>,
        capacity: usize,
        make_node: fn(Vec<E>) -> Node,
    ) -> SpatialResult<Vec<DirectoryEntry>> {
        let groups = str_partition(entries, capacity, self.dimensionality());
        let mut parents = Vec::with_capacity(groups.len());
        for group in groups {
            let mbr = Mbr::union_all(group.iter().map(|e| e.mbr())).ok_or_else(|| {
                SpatialError::InvalidOperation("bulk load produced an empty node".into())
            })?;
            let page_id = self.allocate_page()?;
            self.write_node(page_id, make_node(group))?;
            parents.push(DirectoryEntry { page_id, mbr });
        }
        Ok(parents)
    }
}

/// Splits `entries` into `ceil(n / capacity)` groups in STR order. Group
/// sizes differ by at most one.
pub(crate) fn str_partition<E: SpatialEntry>(entries: Vec<E>, capacity: usize, dims: usize) -> Vec<Vec<E>> {
    let n = entries.len();
    if n == 0 {
        return Vec::new();
    }
    let pages = n.div_ceil(capacity.max(1));
    let sizes: Vec<usize> = (0..pages)
        .map(|i| n / pages + usize::from(i < n % pages))
        .collect();

    let mut groups = Vec::with_capacity(pages);
    tile(entries, &sizes, 0, dims.max(1), &mut groups);
    groups
}

/// Orders `entries` along `dim`, cuts them into slices made of whole groups
/// and recurses into the next dimension.
fn tile<E: SpatialEntry>(
    mut entries: Vec<E>,
    sizes: &[usize],
    dim: usize,
    dims: usize,
    out: &mut Vec<Vec<E>>,
) {
    entries.sort_by(|a, b| a.mbr().center_at(dim).total_cmp(&b.mbr().center_at(dim)));

    if dim + 1 >= dims || sizes.len() <= 1 {
        for &size in sizes {
            let rest = entries.split_off(size.min(entries.len()));
            out.push(std::mem::replace(&mut entries, rest));
        }
        return;
    }

    let remaining_dims = (dims - dim) as f64;
    let slices = (sizes.len() as f64).powf(1.0 / remaining_dims).ceil().max(1.0) as usize;
    let groups_per_slice = sizes.len().div_ceil(slices);

    for slice_sizes in sizes.chunks(groups_per_slice) {
        let slice_len: usize = slice_sizes.iter().sum();
        let rest = entries.split_off(slice_len.min(entries.len()));
        let slice = std::mem::replace(&mut entries, rest);
        tile(slice, slice_sizes, dim + 1, dims, out);
    }
}
