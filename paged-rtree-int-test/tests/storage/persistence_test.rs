use paged_rtree::{Point, RTree, SpatialError};
use paged_rtree_int_test::test_util::{
    assert_valid, cleanup, create_test_context, insert_all, random_points, run_test,
};

fn small_tree(path: &std::path::Path) -> paged_rtree::SpatialResult<RTree> {
    RTree::builder(2)
        .page_size(512)
        .max_leaf_entries(8)
        .max_dir_entries(6)
        .create(path)
}

#[test]
fn test_tree_survives_reopen() {
    run_test(
        create_test_context,
        |ctx| {
            let data = random_points(500, 2, 42);
            let query = Point::new(vec![500.0, 500.0]);

            let mut tree = small_tree(ctx.path())?;
            insert_all(&mut tree, &data)?;
            let height = tree.height();
            let root = tree.root_page();
            let before = tree.knn(&query, 10)?;
            assert!(height >= 3);
            tree.close()?;

            let tree = RTree::open(ctx.path(), 2)?;
            assert_eq!(tree.len(), 500);
            assert_eq!(tree.height(), height);
            assert_eq!(tree.root_page(), root);
            assert_eq!(tree.leaf_capacity(), 8);
            assert_eq!(tree.dir_capacity(), 6);
            assert_eq!(tree.page_size(), 512);

            let after = tree.knn(&query, 10)?;
            assert_eq!(after.ids(), before.ids());
            assert_eq!(after.distances(), before.distances());
            assert_valid(&tree);
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_deletes_survive_reopen() {
    run_test(
        create_test_context,
        |ctx| {
            let data = random_points(300, 2, 7);

            let mut tree = small_tree(ctx.path())?;
            insert_all(&mut tree, &data)?;
            for (id, point) in data.iter().filter(|(id, _)| id % 3 == 0) {
                assert!(tree.delete(*id, point)?);
            }
            let free_pages = tree.stats().free_pages;
            tree.close()?;

            let mut tree = RTree::open(ctx.path(), 2)?;
            assert_eq!(tree.len(), 200);
            assert_eq!(tree.stats().free_pages, free_pages);
            assert_valid(&tree);

            let mut ids: Vec<u64> = tree.entries()?.iter().map(|e| e.id).collect();
            ids.sort_unstable();
            let expected: Vec<u64> = (0..300).filter(|id| id % 3 != 0).collect();
            assert_eq!(ids, expected);

            // Deleted objects are gone for good
            let (id, point) = &data[0];
            assert!(!tree.delete(*id, point)?);
            tree.close()?;
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_open_with_other_dimensionality_fails() {
    run_test(
        create_test_context,
        |ctx| {
            RTree::create(ctx.path(), 2)?.close()?;

            let err = RTree::open(ctx.path(), 3).err().unwrap();
            assert!(err.is_format_error(), "unexpected error {:?}", err);
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_open_with_other_page_size_fails() {
    run_test(
        create_test_context,
        |ctx| {
            RTree::builder(2).page_size(1024).create(ctx.path())?.close()?;

            let err = RTree::builder(2).page_size(2048).open(ctx.path()).err().unwrap();
            assert!(matches!(
                err,
                SpatialError::RecordSizeMismatch { expected: 2048, actual: 1024, .. }
            ));

            // The default builder adopts the stored page size
            let tree = RTree::open_read_only(ctx.path(), 2)?;
            assert_eq!(tree.page_size(), 1024);
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_open_missing_file_fails() {
    run_test(
        create_test_context,
        |ctx| {
            let err = RTree::open(ctx.dir().join("missing.rtree"), 2).err().unwrap();
            assert!(matches!(err, SpatialError::Io(_)));
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_create_replaces_existing_tree() {
    run_test(
        create_test_context,
        |ctx| {
            let mut tree = RTree::create(ctx.path(), 2)?;
            insert_all(&mut tree, &random_points(50, 2, 1))?;
            tree.close()?;

            let tree = RTree::create(ctx.path(), 2)?;
            assert!(tree.is_empty());
            assert_eq!(tree.height(), 1);
            tree.close()?;

            let tree = RTree::open(ctx.path(), 2)?;
            assert!(tree.is_empty());
            Ok(())
        },
        cleanup,
    )
}
