//! R* topological split.
//!
//! 1. For every axis, sort the entries by lower bound and by upper bound and
//!    sum the margins of all valid distributions. Keep the axes with the
//!    smallest sum.
//! 2. Over the distributions of those axes, pick the one with the least
//!    overlap between the two groups, then the least total area.

use std::cmp::Ordering;

use super::rtree_types::SpatialEntry;
use crate::spatial::Mbr;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SortKey {
    Lower,
    Upper,
}

const SORT_KEYS: [SortKey; 2] = [SortKey::Lower, SortKey::Upper];

fn compare(a: &Mbr, b: &Mbr, axis: usize, key: SortKey) -> Ordering {
    match key {
        SortKey::Lower => a.min[axis]
            .total_cmp(&b.min[axis])
            .then(a.max[axis].total_cmp(&b.max[axis])),
        SortKey::Upper => a.max[axis]
            .total_cmp(&b.max[axis])
            .then(a.min[axis].total_cmp(&b.min[axis])),
    }
}

/// Bounding rectangles of every prefix and every suffix of `order`.
///
/// `prefix[i]` covers entries `0..=i`, `suffix[i]` covers `i..`.
fn prefix_suffix<E: SpatialEntry>(entries: &[E], order: &[usize]) -> (Vec<Mbr>, Vec<Mbr>) {
    let mut prefix: Vec<Mbr> = Vec::with_capacity(order.len());
    for &i in order {
        let next = match prefix.last() {
            Some(acc) => acc.union(entries[i].mbr()),
            None => entries[i].mbr().clone(),
        };
        prefix.push(next);
    }

    let mut suffix: Vec<Mbr> = Vec::with_capacity(order.len());
    for &i in order.iter().rev() {
        let next = match suffix.last() {
            Some(acc) => acc.union(entries[i].mbr()),
            None => entries[i].mbr().clone(),
        };
        suffix.push(next);
    }
    suffix.reverse();
    (prefix, suffix)
}

struct Candidate {
    axis: usize,
    key: SortKey,
    split_at: usize,
    overlap: f64,
    area: f64,
}

/// Splits an overflowing node's entries into two groups of at least
/// `min_entries` each.
///
/// Returns `(first, second)`, where `first` are the lower entries of the
/// chosen ordering.
pub(crate) fn topological_split<E: SpatialEntry>(mut entries: Vec<E>, min_entries: usize) -> (Vec<E>, Vec<E>) {
    let n = entries.len();
    if n < 2 {
        return (entries, Vec::new());
    }
    let m = min_entries.clamp(1, n / 2);
    let dims = entries[0].mbr().min.len();

    // (axis, sort key, prefix, suffix) for every ordering
    let mut sorted = Vec::with_capacity(dims * 2);
    let mut margins = vec![0.0f64; dims];
    for (axis, margin) in margins.iter_mut().enumerate() {
        for key in SORT_KEYS {
            let mut order: Vec<usize> = (0..n).collect();
            order.sort_by(|&a, &b| compare(entries[a].mbr(), entries[b].mbr(), axis, key));
            let (prefix, suffix) = prefix_suffix(&entries, &order);
            for k in m..=n - m {
                *margin += prefix[k - 1].margin() + suffix[k].margin();
            }
            sorted.push((axis, key, prefix, suffix));
        }
    }

    let min_margin = margins.iter().copied().fold(f64::INFINITY, f64::min);

    let mut best: Option<Candidate> = None;
    for (axis, key, prefix, suffix) in &sorted {
        if margins[*axis] != min_margin {
            continue;
        }
        for k in m..=n - m {
            let overlap = prefix[k - 1].overlap(&suffix[k]);
            let area = prefix[k - 1].area() + suffix[k].area();
            let better = match &best {
                None => true,
                Some(b) => [overlap, area] < [b.overlap, b.area],
            };
            if better {
                best = Some(Candidate {
                    axis: *axis,
                    key: *key,
                    split_at: k,
                    overlap,
                    area,
                });
            }
        }
    }

    let (axis, key, split_at) = match best {
        Some(c) => (c.axis, c.key, c.split_at),
        None => (0, SortKey::Lower, n / 2),
    };
    // stable sort, so this reproduces the order the candidate was scored on
    entries.sort_by(|a, b| compare(a.mbr(), b.mbr(), axis, key));
    let second = entries.split_off(split_at);
    (entries, second)
}
