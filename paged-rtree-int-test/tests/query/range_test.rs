use paged_rtree::{EuclideanDistance, ManhattanDistance, Mbr, Point, RTree, SpatialDistance};
use paged_rtree_int_test::test_util::{
    brute_force_range, cleanup, create_test_context, grid_points, insert_all, random_boxes,
    random_points, run_test, sorted_ids, to_mbrs,
};

fn small_tree(path: &std::path::Path, dims: usize) -> paged_rtree::SpatialResult<RTree> {
    RTree::builder(dims)
        .max_leaf_entries(8)
        .max_dir_entries(5)
        .create(path)
}

fn sorted(mut found: Vec<(u64, f64)>) -> Vec<(u64, f64)> {
    found.sort_by_key(|(id, _)| *id);
    found
}

#[test]
fn test_range_matches_linear_scan() {
    run_test(
        create_test_context,
        |ctx| {
            let data = random_boxes(1500, 2, 15.0, 55);
            let mut tree = small_tree(ctx.path(), 2)?;
            insert_all(&mut tree, &data)?;

            let distances: [&dyn SpatialDistance; 2] = [&EuclideanDistance, &ManhattanDistance];
            for distance in distances {
                for (_, query) in random_points(10, 2, 56) {
                    for radius in [0.0, 5.0, 40.0, 150.0] {
                        let found = tree.range_query_with(&query, radius, distance)?;
                        let expected = brute_force_range(&data, &query, radius, distance);
                        assert_eq!(sorted(found), expected, "{} r = {}", distance.name(), radius);
                    }
                }
            }
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_range_with_box_key() {
    run_test(
        create_test_context,
        |ctx| {
            let data = random_points(800, 2, 21);
            let mut tree = small_tree(ctx.path(), 2)?;
            insert_all(&mut tree, &data)?;

            // Radius 0 around a box finds everything inside it
            let window = Mbr::new(vec![200.0, 300.0], vec![450.0, 500.0]);
            let found = tree.range_query(&window, 0.0)?;
            let mut expected: Vec<u64> = data
                .iter()
                .filter(|(_, p)| window.contains(&Mbr::from_point(p.coords())))
                .map(|(id, _)| *id)
                .collect();
            expected.sort_unstable();
            assert_eq!(sorted_ids(&found), expected);
            assert!(found.iter().all(|(_, d)| *d == 0.0));
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_range_radius_boundary_is_inclusive() {
    run_test(
        create_test_context,
        |ctx| {
            let mut tree = small_tree(ctx.path(), 2)?;
            insert_all(&mut tree, &grid_points(10))?;
            let query = Point::new(vec![4.0, 4.0]);

            assert_eq!(sorted_ids(&tree.range_query(&query, 0.0)?), vec![44]);
            assert_eq!(sorted_ids(&tree.range_query(&query, 1.0)?), vec![34, 43, 44, 45, 54]);
            assert!(tree.range_query(&query, -1.0)?.is_empty());
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_intersecting_matches_linear_scan() {
    run_test(
        create_test_context,
        |ctx| {
            let data = random_boxes(1000, 2, 30.0, 600);
            let mut tree = small_tree(ctx.path(), 2)?;
            insert_all(&mut tree, &data)?;

            for (_, corner) in random_boxes(10, 2, 200.0, 601) {
                let mut found = tree.intersecting(&corner)?;
                found.sort_unstable();
                let expected: Vec<u64> = data
                    .iter()
                    .filter(|(_, mbr)| mbr.intersects(&corner))
                    .map(|(id, _)| *id)
                    .collect();
                assert_eq!(found, expected);
            }
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_range_on_points_matches_linear_scan() {
    run_test(
        create_test_context,
        |ctx| {
            let data = random_points(1000, 4, 71);
            let mut tree = small_tree(ctx.path(), 4)?;
            tree.bulk_load(data.clone())?;

            let mbrs = to_mbrs(&data);
            for (_, query) in random_points(5, 4, 72) {
                let found = tree.range_query(&query, 250.0)?;
                let expected = brute_force_range(&mbrs, &query, 250.0, &EuclideanDistance);
                assert_eq!(sorted(found), expected);
            }
            Ok(())
        },
        cleanup,
    )
}
