use paged_rtree::{EuclideanDistance, RTree};
use paged_rtree_int_test::test_util::{
    brute_force_knn, cleanup, create_test_context, random_points, run_test, to_mbrs,
};
use std::sync::Arc;
use std::thread;

#[test]
fn test_scoped_threads_share_read_only_tree() {
    run_test(
        create_test_context,
        |ctx| {
            let data = random_points(3000, 2, 1234);
            let mut tree = RTree::builder(2).max_leaf_entries(16).create(ctx.path())?;
            tree.bulk_load(data.clone())?;
            tree.close()?;

            let tree = RTree::builder(2).cache_pages(8).open_read_only(ctx.path())?;
            let mbrs = to_mbrs(&data);

            thread::scope(|scope| {
                for worker in 0..4u64 {
                    let tree = &tree;
                    let mbrs = &mbrs;
                    scope.spawn(move || {
                        for (_, query) in random_points(50, 2, 500 + worker) {
                            let found = tree.knn(&query, 5).unwrap();
                            let expected = brute_force_knn(mbrs, &query, 5, &EuclideanDistance);
                            assert_eq!(found.ids(), expected.iter().map(|(id, _)| *id).collect::<Vec<_>>());
                        }
                    });
                }
            });

            let stats = tree.stats();
            assert!(stats.cached_pages <= 8);
            assert!(stats.cache_misses > 0);
            assert_eq!(stats.page_writes, 0);
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_arc_shared_tree_across_spawned_threads() {
    run_test(
        create_test_context,
        |ctx| {
            let data = random_points(1000, 3, 88);
            let mut tree = RTree::create(ctx.path(), 3)?;
            tree.bulk_load(data)?;
            tree.close()?;

            let tree = Arc::new(RTree::open_read_only(ctx.path(), 3)?);
            let handles: Vec<_> = (0..4u64)
                .map(|worker| {
                    let tree = Arc::clone(&tree);
                    thread::spawn(move || {
                        let mut total = 0;
                        for (_, query) in random_points(20, 3, 900 + worker) {
                            total += tree.range_query(&query, 100.0).unwrap().len();
                        }
                        total
                    })
                })
                .collect();

            let mut expected = 0;
            for worker in 0..4u64 {
                for (_, query) in random_points(20, 3, 900 + worker) {
                    expected += tree.range_query(&query, 100.0)?.len();
                }
            }
            let total: usize = handles.into_iter().map(|h| h.join().unwrap()).sum();
            assert_eq!(total, expected);
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_many_read_only_handles() {
    run_test(
        create_test_context,
        |ctx| {
            let mut tree = RTree::create(ctx.path(), 2)?;
            tree.bulk_load(random_points(200, 2, 6))?;
            tree.close()?;

            let readers: Vec<RTree> = (0..3)
                .map(|_| RTree::open_read_only(ctx.path(), 2))
                .collect::<Result<_, _>>()?;
            for reader in &readers {
                assert_eq!(reader.len(), 200);
                assert!(!reader.is_writable());
            }
            Ok(())
        },
        cleanup,
    )
}
