use paged_rtree::{Mbr, Point, RTree, SpatialError};
use paged_rtree_int_test::test_util::{
    assert_valid, cleanup, create_test_context, insert_all, random_boxes, random_points, run_test,
};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::HashMap;

fn small_tree(path: &std::path::Path, dims: usize) -> paged_rtree::SpatialResult<RTree> {
    RTree::builder(dims)
        .max_leaf_entries(10)
        .max_dir_entries(6)
        .create(path)
}

#[test]
fn test_random_inserts_keep_invariants() {
    run_test(
        create_test_context,
        |ctx| {
            let data = random_boxes(2000, 2, 25.0, 99);
            let mut tree = small_tree(ctx.path(), 2)?;
            insert_all(&mut tree, &data)?;

            let report = assert_valid(&tree);
            assert_eq!(report.entries_found, 2000);
            assert_eq!(tree.len(), 2000);

            let mut ids: Vec<u64> = tree.entries()?.iter().map(|e| e.id).collect();
            ids.sort_unstable();
            assert_eq!(ids, (0..2000).collect::<Vec<u64>>());
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_mixed_inserts_and_deletes_match_model() {
    run_test(
        create_test_context,
        |ctx| {
            let mut rng = StdRng::seed_from_u64(2024);
            let mut tree = small_tree(ctx.path(), 2)?;
            let mut model: HashMap<u64, Mbr> = HashMap::new();
            let mut next_id = 0u64;

            for step in 0..3000 {
                if model.is_empty() || rng.random_bool(0.6) {
                    let x: f64 = rng.random_range(0.0..100.0);
                    let y: f64 = rng.random_range(0.0..100.0);
                    let mbr = Mbr::from_point(&[x, y]);
                    tree.insert(next_id, &mbr)?;
                    model.insert(next_id, mbr);
                    next_id += 1;
                } else {
                    let mut ids: Vec<u64> = model.keys().copied().collect();
                    ids.sort_unstable();
                    let id = ids[rng.random_range(0..ids.len())];
                    let mbr = model.remove(&id).unwrap();
                    assert!(tree.delete(id, &mbr)?);
                }

                if step % 250 == 0 {
                    assert_valid(&tree);
                }
            }

            assert_valid(&tree);
            assert_eq!(tree.len(), model.len() as u64);
            let mut stored: Vec<(u64, Mbr)> =
                tree.entries()?.into_iter().map(|e| (e.id, e.mbr)).collect();
            stored.sort_by_key(|(id, _)| *id);
            let mut expected: Vec<(u64, Mbr)> = model.into_iter().collect();
            expected.sort_by_key(|(id, _)| *id);
            assert_eq!(stored, expected);
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_freed_pages_are_reused() {
    run_test(
        create_test_context,
        |ctx| {
            let data = random_points(1000, 2, 5);
            let mut tree = small_tree(ctx.path(), 2)?;
            insert_all(&mut tree, &data)?;
            let allocated = tree.stats().allocated_pages;

            for (id, point) in data.iter().skip(10) {
                assert!(tree.delete(*id, point)?);
            }
            let stats = tree.stats();
            assert_eq!(stats.allocated_pages, allocated);
            assert!(stats.free_pages > 0);
            let freed = stats.free_pages;
            assert_valid(&tree);

            insert_all(&mut tree, &data[10..])?;
            let stats = tree.stats();
            assert!(stats.free_pages < freed);
            // The store only grows once the free list is used up
            if stats.allocated_pages > allocated {
                assert_eq!(stats.free_pages, 0);
            }
            assert_eq!(tree.len(), 1000);
            assert_valid(&tree);
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_delete_everything_leaves_empty_root() {
    run_test(
        create_test_context,
        |ctx| {
            let data = random_points(400, 3, 17);
            let mut tree = small_tree(ctx.path(), 3)?;
            insert_all(&mut tree, &data)?;
            assert!(tree.height() > 1);

            for (id, point) in data.iter().rev() {
                assert!(tree.delete(*id, point)?);
            }
            assert!(tree.is_empty());
            assert_eq!(tree.height(), 1);
            assert_eq!(tree.root_mbr()?, None);
            assert!(tree.knn(&Point::new(vec![1.0, 2.0, 3.0]), 5)?.is_empty());
            assert_valid(&tree);
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_delete_by_id_without_key() {
    run_test(
        create_test_context,
        |ctx| {
            let data = random_points(200, 2, 8);
            let mut tree = small_tree(ctx.path(), 2)?;
            insert_all(&mut tree, &data)?;

            assert!(tree.delete_by_id(150)?);
            assert!(!tree.delete_by_id(150)?);
            assert!(!tree.delete_by_id(10_000)?);
            assert_eq!(tree.len(), 199);
            assert!(!tree.knn(&data[150].1, 1)?.contains(150));
            assert_valid(&tree);
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_delete_with_wrong_key_finds_nothing() {
    run_test(
        create_test_context,
        |ctx| {
            let mut tree = small_tree(ctx.path(), 2)?;
            tree.insert(1, &Point::new(vec![10.0, 10.0]))?;

            assert!(!tree.delete(1, &Point::new(vec![11.0, 10.0]))?);
            assert_eq!(tree.len(), 1);
            assert!(tree.delete(1, &Point::new(vec![10.0, 10.0]))?);
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_wrong_dimensionality_is_rejected_everywhere() {
    run_test(
        create_test_context,
        |ctx| {
            let mut tree = small_tree(ctx.path(), 2)?;
            insert_all(&mut tree, &random_points(50, 2, 3))?;

            let key = Point::new(vec![1.0, 2.0, 3.0]);
            let is_mismatch = |e: &SpatialError| {
                matches!(e, SpatialError::DimensionalityMismatch { expected: 2, actual: 3 })
            };
            assert!(is_mismatch(&tree.insert(99, &key).err().unwrap()));
            assert!(is_mismatch(&tree.delete(0, &key).err().unwrap()));
            assert!(is_mismatch(&tree.knn(&key, 3).err().unwrap()));
            assert!(is_mismatch(&tree.range_query(&key, 3.0).err().unwrap()));
            assert!(is_mismatch(&tree.intersecting(&key).err().unwrap()));

            let mut empty = small_tree(&ctx.dir().join("empty.rtree"), 2)?;
            assert!(is_mismatch(
                &empty.bulk_load(vec![(1u64, key.clone())]).err().unwrap()
            ));
            assert!(empty.is_empty());

            assert_eq!(tree.len(), 50);
            assert_valid(&tree);
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_invalid_extent_is_rejected() {
    run_test(
        create_test_context,
        |ctx| {
            let mut tree = small_tree(ctx.path(), 2)?;
            let inverted = Mbr::new(vec![5.0, 0.0], vec![1.0, 1.0]);
            assert!(matches!(
                tree.insert(1, &inverted),
                Err(SpatialError::InvalidOperation(_))
            ));
            assert!(tree.is_empty());
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_read_only_tree_rejects_mutation() {
    run_test(
        create_test_context,
        |ctx| {
            let mut tree = small_tree(ctx.path(), 2)?;
            insert_all(&mut tree, &random_points(20, 2, 4))?;
            tree.close()?;

            let mut tree = RTree::open_read_only(ctx.path(), 2)?;
            assert!(!tree.is_writable());
            let point = Point::new(vec![1.0, 1.0]);
            assert!(matches!(tree.insert(100, &point), Err(SpatialError::ReadOnly)));
            assert!(matches!(tree.delete_by_id(0), Err(SpatialError::ReadOnly)));
            assert_eq!(tree.len(), 20);
            assert_eq!(tree.knn(&point, 3)?.len(), 3);
            Ok(())
        },
        cleanup,
    )
}
