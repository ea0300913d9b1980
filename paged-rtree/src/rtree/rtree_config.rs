//! Configuration and builder for [`RTree`].

use std::path::Path;

use super::rtree_constants::{
    DEFAULT_CACHE_PAGES, DEFAULT_MIN_FILL, DEFAULT_REINSERT_FRACTION,
};
use super::rtree_impl::RTree;
use crate::errors::{SpatialError, SpatialResult};

/// Settings used when creating or opening a tree.
///
/// Only `page_size` and `cache_pages` matter when opening an existing file;
/// capacities and fill settings are read from the stored tree header.
#[derive(Debug, Clone)]
pub struct RTreeConfig {
    pub dimensionality: usize,
    /// Record size in bytes. `None` uses the default on create and adopts the
    /// stored size on open.
    pub page_size: Option<usize>,
    pub cache_pages: usize,
    pub reinsert_fraction: f64,
    pub min_fill: f64,
    pub max_leaf_entries: Option<usize>,
    pub max_dir_entries: Option<usize>,
    pub initial_pages: u32,
}

impl RTreeConfig {
    pub fn new(dimensionality: usize) -> Self {
        Self {
            dimensionality,
            page_size: None,
            cache_pages: DEFAULT_CACHE_PAGES,
            reinsert_fraction: DEFAULT_REINSERT_FRACTION,
            min_fill: DEFAULT_MIN_FILL,
            max_leaf_entries: None,
            max_dir_entries: None,
            initial_pages: 1,
        }
    }

    pub fn validate(&self) -> SpatialResult<()> {
        if self.dimensionality == 0 || self.dimensionality > u32::MAX as usize {
            return Err(SpatialError::InvalidOperation(format!(
                "dimensionality must be between 1 and {}, got {}",
                u32::MAX,
                self.dimensionality
            )));
        }
        if self.page_size == Some(0) {
            return Err(SpatialError::InvalidOperation(
                "page size must be positive".into(),
            ));
        }
        check_fraction("reinsert fraction", self.reinsert_fraction)?;
        check_fraction("minimum fill", self.min_fill)?;
        for (name, cap) in [
            ("leaf", self.max_leaf_entries),
            ("directory", self.max_dir_entries),
        ] {
            if let Some(cap) = cap {
                if cap < 2 {
                    return Err(SpatialError::InvalidOperation(format!(
                        "maximum {} entries must be at least 2, got {}",
                        name, cap
                    )));
                }
            }
        }
        Ok(())
    }
}

fn check_fraction(name: &str, value: f64) -> SpatialResult<()> {
    if value > 0.0 && value <= 0.5 {
        Ok(())
    } else {
        Err(SpatialError::InvalidOperation(format!(
            "{} must be in (0, 0.5], got {}",
            name, value
        )))
    }
}

/// Fluent builder for [`RTree`].
///
/// Invalid settings are reported when the tree is created or opened.
///
/// ```no_run
/// use paged_rtree::{Point, RTree};
///
/// # fn main() -> paged_rtree::SpatialResult<()> {
/// let mut tree = RTree::builder(2)
///     .page_size(1024)
///     .cache_pages(64)
///     .create("points.rtree")?;
/// tree.insert(1, &Point::new(vec![0.5, 1.5]))?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct RTreeBuilder {
    config: RTreeConfig,
}

impl RTreeBuilder {
    pub fn new(dimensionality: usize) -> Self {
        Self {
            config: RTreeConfig::new(dimensionality),
        }
    }

    /// Record size in bytes (default 4096). Must match the stored size on open.
    pub fn page_size(mut self, page_size: usize) -> Self {
        self.config.page_size = Some(page_size);
        self
    }

    /// Number of decoded nodes kept in memory (default 256).
    pub fn cache_pages(mut self, cache_pages: usize) -> Self {
        self.config.cache_pages = cache_pages;
        self
    }

    /// Share of an overflowing node's entries removed by forced reinsertion.
    pub fn reinsert_fraction(mut self, fraction: f64) -> Self {
        self.config.reinsert_fraction = fraction;
        self
    }

    /// Minimum fill of non-root nodes relative to their capacity.
    pub fn min_fill(mut self, min_fill: f64) -> Self {
        self.config.min_fill = min_fill;
        self
    }

    /// Caps leaf capacity below what the page size allows.
    pub fn max_leaf_entries(mut self, entries: usize) -> Self {
        self.config.max_leaf_entries = Some(entries);
        self
    }

    /// Caps directory capacity below what the page size allows.
    pub fn max_dir_entries(mut self, entries: usize) -> Self {
        self.config.max_dir_entries = Some(entries);
        self
    }

    /// Records preallocated by `create`.
    pub fn initial_pages(mut self, pages: u32) -> Self {
        self.config.initial_pages = pages;
        self
    }

    pub fn config(&self) -> &RTreeConfig {
        &self.config
    }

    /// Creates a new tree file, replacing any file at `path`.
    pub fn create(self, path: impl AsRef<Path>) -> SpatialResult<RTree> {
        self.config.validate()?;
        RTree::create_with(path.as_ref(), &self.config)
    }

    /// Opens an existing tree for reading and writing.
    pub fn open(self, path: impl AsRef<Path>) -> SpatialResult<RTree> {
        self.config.validate()?;
        RTree::open_with(path.as_ref(), &self.config, true)
    }

    /// Opens an existing tree for queries only. Takes no lock.
    pub fn open_read_only(self, path: impl AsRef<Path>) -> SpatialResult<RTree> {
        self.config.validate()?;
        RTree::open_with(path.as_ref(), &self.config, false)
    }
}
