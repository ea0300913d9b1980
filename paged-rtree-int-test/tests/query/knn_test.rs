use paged_rtree::{
    EuclideanDistance, ManhattanDistance, MaximumDistance, Point, RTree, SpatialDistance,
    SquaredEuclideanDistance,
};
use paged_rtree_int_test::test_util::{
    brute_force_knn, cleanup, create_test_context, grid_points, insert_all, random_boxes,
    random_points, run_test, sorted_ids, to_mbrs,
};

fn small_tree(path: &std::path::Path, dims: usize) -> paged_rtree::SpatialResult<RTree> {
    RTree::builder(dims)
        .max_leaf_entries(8)
        .max_dir_entries(5)
        .create(path)
}

#[test]
fn test_knn_returns_every_boundary_tie() {
    run_test(
        create_test_context,
        |ctx| {
            let mut tree = small_tree(ctx.path(), 2)?;
            insert_all(&mut tree, &grid_points(20))?;
            let query = Point::new(vec![10.0, 10.0]);

            let one = tree.knn(&query, 1)?;
            assert_eq!(one.ids(), vec![210]);
            assert_eq!(one.k_distance(), 0.0);

            // Four grid neighbors tie at distance 1
            for k in 2..=5 {
                let result = tree.knn(&query, k)?;
                assert_eq!(result.len(), 5, "k = {}", k);
                assert_eq!(result.k_distance(), 1.0);
                assert_eq!(result.ids(), vec![210, 190, 209, 211, 230]);
            }

            let diagonal = tree.knn(&query, 6)?;
            assert_eq!(diagonal.len(), 9);
            assert_eq!(diagonal.k_distance(), 2f64.sqrt());
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_sublist_keeps_ties() {
    run_test(
        create_test_context,
        |ctx| {
            let mut tree = small_tree(ctx.path(), 2)?;
            insert_all(&mut tree, &grid_points(20))?;
            let full = tree.knn(&Point::new(vec![5.0, 5.0]), 9)?;
            assert_eq!(full.len(), 9);

            assert_eq!(full.sublist(1).len(), 1);
            assert_eq!(full.sublist(2).len(), 5);
            assert_eq!(full.sublist(5).len(), 5);
            assert_eq!(full.sublist(6).len(), 9);
            assert_eq!(full.sublist(20).len(), 9);

            // Narrowing gives what a smaller query would have returned
            let direct = tree.knn(&Point::new(vec![5.0, 5.0]), 3)?;
            assert_eq!(full.sublist(3).ids(), direct.ids());
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_knn_matches_linear_scan() {
    run_test(
        create_test_context,
        |ctx| {
            let data = random_boxes(1500, 2, 20.0, 404);
            let mut tree = small_tree(ctx.path(), 2)?;
            insert_all(&mut tree, &data)?;

            let distances: [&dyn SpatialDistance; 4] = [
                &EuclideanDistance,
                &SquaredEuclideanDistance,
                &ManhattanDistance,
                &MaximumDistance,
            ];
            for distance in distances {
                for (_, query) in random_points(10, 2, 405) {
                    for k in [1, 4, 25, 100] {
                        let found = tree.knn_with(&query, k, distance)?;
                        let expected = brute_force_knn(&data, &query, k, distance);
                        let found: Vec<(u64, f64)> =
                            found.iter().map(|n| (n.id, n.distance)).collect();
                        assert_eq!(found, expected, "{} k = {}", distance.name(), k);
                    }
                }
            }
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_knn_agrees_with_range_at_k_distance() {
    run_test(
        create_test_context,
        |ctx| {
            let data = random_points(2000, 3, 8);
            let mut tree = small_tree(ctx.path(), 3)?;
            insert_all(&mut tree, &data)?;

            for (_, query) in random_points(15, 3, 9) {
                let nearest = tree.knn(&query, 12)?;
                assert_eq!(nearest.len(), 12);
                let within = tree.range_query(&query, nearest.k_distance())?;

                let mut knn_ids = nearest.ids();
                knn_ids.sort_unstable();
                assert_eq!(knn_ids, sorted_ids(&within));
            }
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_knn_with_more_k_than_objects() {
    run_test(
        create_test_context,
        |ctx| {
            let data = random_points(30, 2, 1);
            let mut tree = small_tree(ctx.path(), 2)?;
            insert_all(&mut tree, &data)?;

            let result = tree.knn(&Point::new(vec![0.0, 0.0]), 100)?;
            assert_eq!(result.len(), 30);
            assert_eq!(result.k(), 100);
            let expected = brute_force_knn(&to_mbrs(&data), &Point::new(vec![0.0, 0.0]), 100, &EuclideanDistance);
            assert_eq!(result.ids(), expected.iter().map(|(id, _)| *id).collect::<Vec<_>>());
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_knn_with_duplicate_locations() {
    run_test(
        create_test_context,
        |ctx| {
            let mut tree = small_tree(ctx.path(), 2)?;
            for id in 0..40u64 {
                tree.insert(id, &Point::new(vec![3.0, 3.0]))?;
            }
            tree.insert(100, &Point::new(vec![3.0, 4.0]))?;

            let result = tree.knn(&Point::new(vec![3.0, 3.0]), 1)?;
            assert_eq!(result.len(), 40);
            assert!(!result.contains(100));
            assert!(result.distances().iter().all(|d| *d == 0.0));

            let result = tree.knn(&Point::new(vec![3.0, 3.0]), 41)?;
            assert_eq!(result.len(), 41);
            assert_eq!(result.get(40).map(|n| n.id), Some(100));
            Ok(())
        },
        cleanup,
    )
}
