use paged_rtree::{
    IntegrityReport, Mbr, ObjectId, Point, RTree, SpatialComparable, SpatialDistance,
    SpatialResult,
};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;

/// Runs a test between a setup and a teardown step.
///
/// The teardown runs even when the test body returns an error, so the error
/// reported is always the test's own.
pub fn run_test<T, B, A>(before: B, test: T, after: A)
where
    T: Fn(TestContext) -> SpatialResult<()>,
    B: Fn() -> SpatialResult<TestContext>,
    A: Fn(TestContext) -> SpatialResult<()>,
{
    let ctx = match before() {
        Ok(ctx) => ctx,
        Err(e) => panic!("Before run failed: {:?}", e),
    };

    let test_result = test(ctx.clone());
    let after_result = after(ctx);

    if let Err(e) = test_result {
        panic!("Test failed: {:?}", e);
    }
    if let Err(e) = after_result {
        panic!("After run failed: {:?}", e);
    }
}

/// A scratch directory with a tree file path inside it.
///
/// The directory is removed when the last clone is dropped.
#[derive(Clone)]
pub struct TestContext {
    dir: Arc<TempDir>,
    path: PathBuf,
}

impl TestContext {
    pub fn new(dir: TempDir, file_name: &str) -> Self {
        let path = dir.path().join(file_name);
        Self {
            dir: Arc::new(dir),
            path,
        }
    }

    pub fn dir(&self) -> &Path {
        self.dir.path()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

pub fn create_test_context() -> SpatialResult<TestContext> {
    let dir = tempfile::Builder::new().prefix("paged-rtree").tempdir()?;
    Ok(TestContext::new(dir, "test.rtree"))
}

/// Removes the tree file, leaving the directory for the context to drop.
pub fn cleanup(ctx: TestContext) -> SpatialResult<()> {
    match std::fs::remove_file(ctx.path()) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}

// ============================================================================
// Data generation
// ============================================================================

/// Uniform random points in `[0, 1000)^dims`, ids `0..count`.
pub fn random_points(count: usize, dims: usize, seed: u64) -> Vec<(ObjectId, Point)> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..count as u64)
        .map(|id| {
            let coords = (0..dims).map(|_| rng.random_range(0.0..1000.0)).collect();
            (id, Point::new(coords))
        })
        .collect()
}

/// Random boxes with sides up to `max_side`, ids `0..count`.
pub fn random_boxes(count: usize, dims: usize, max_side: f64, seed: u64) -> Vec<(ObjectId, Mbr)> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..count as u64)
        .map(|id| {
            let mut min = Vec::with_capacity(dims);
            let mut max = Vec::with_capacity(dims);
            for _ in 0..dims {
                let low: f64 = rng.random_range(0.0..1000.0);
                let side: f64 = rng.random_range(0.0..max_side);
                min.push(low);
                max.push(low + side);
            }
            (id, Mbr::new(min, max))
        })
        .collect()
}

/// Integer grid points `side x side`; point `(x, y)` gets id `x * side + y`.
///
/// Many points share a distance to any integer query point, which makes the
/// grid useful for tie handling.
pub fn grid_points(side: u64) -> Vec<(ObjectId, Point)> {
    let mut points = Vec::with_capacity((side * side) as usize);
    for x in 0..side {
        for y in 0..side {
            points.push((x * side + y, Point::new(vec![x as f64, y as f64])));
        }
    }
    points
}

pub fn to_mbrs<K: SpatialComparable>(data: &[(ObjectId, K)]) -> Vec<(ObjectId, Mbr)> {
    data.iter().map(|(id, key)| (*id, key.mbr())).collect()
}

/// Builds a tree by inserting every object one at a time.
pub fn insert_all<K: SpatialComparable>(tree: &mut RTree, data: &[(ObjectId, K)]) -> SpatialResult<()> {
    for (id, key) in data {
        tree.insert(*id, key)?;
    }
    Ok(())
}

// ============================================================================
// Linear scan reference results
// ============================================================================

/// The k nearest objects by linear scan, with every object tied at the k-th
/// distance, ordered by distance then id.
pub fn brute_force_knn(
    data: &[(ObjectId, Mbr)],
    key: &dyn SpatialComparable,
    k: usize,
    distance: &dyn SpatialDistance,
) -> Vec<(ObjectId, f64)> {
    let mut all: Vec<(ObjectId, f64)> = data
        .iter()
        .map(|(id, mbr)| (*id, distance.min_dist(key, mbr)))
        .collect();
    all.sort_by(|a, b| a.1.total_cmp(&b.1).then(a.0.cmp(&b.0)));

    if k == 0 || all.is_empty() {
        return Vec::new();
    }
    let kdist = all[k.min(all.len()) - 1].1;
    all.into_iter().take_while(|(_, d)| *d <= kdist).collect()
}

/// Every object within `radius` by linear scan, ordered by id.
pub fn brute_force_range(
    data: &[(ObjectId, Mbr)],
    key: &dyn SpatialComparable,
    radius: f64,
    distance: &dyn SpatialDistance,
) -> Vec<(ObjectId, f64)> {
    data.iter()
        .map(|(id, mbr)| (*id, distance.min_dist(key, mbr)))
        .filter(|(_, d)| *d <= radius)
        .collect()
}

/// Ids of a result, sorted.
pub fn sorted_ids(found: &[(ObjectId, f64)]) -> Vec<ObjectId> {
    let mut ids: Vec<ObjectId> = found.iter().map(|(id, _)| *id).collect();
    ids.sort_unstable();
    ids
}

/// Panics with every finding when the tree fails its integrity check.
pub fn assert_valid(tree: &RTree) -> IntegrityReport {
    let report = match tree.check_integrity() {
        Ok(report) => report,
        Err(e) => panic!("Integrity check failed to run: {:?}", e),
    };
    assert!(report.is_valid, "tree is invalid: {:#?}", report.errors);
    report
}
