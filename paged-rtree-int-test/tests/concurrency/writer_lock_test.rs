use paged_rtree::{Point, RTree, SpatialError};
use paged_rtree_int_test::test_util::{cleanup, create_test_context, run_test};

#[test]
fn test_second_writer_is_locked_out() {
    run_test(
        create_test_context,
        |ctx| {
            let mut writer = RTree::create(ctx.path(), 2)?;
            writer.insert(1, &Point::new(vec![1.0, 1.0]))?;

            let err = RTree::open(ctx.path(), 2).err().unwrap();
            assert!(matches!(err, SpatialError::Locked { .. }));

            // A competing create must not truncate the locked file
            let err = RTree::create(ctx.path(), 2).err().unwrap();
            assert!(matches!(err, SpatialError::Locked { .. }));
            assert_eq!(writer.len(), 1);
            assert_eq!(writer.knn(&Point::new(vec![0.0, 0.0]), 1)?.ids(), vec![1]);

            writer.close()?;
            let reopened = RTree::open(ctx.path(), 2)?;
            assert_eq!(reopened.len(), 1);
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_dropping_writer_releases_lock() {
    run_test(
        create_test_context,
        |ctx| {
            let mut writer = RTree::create(ctx.path(), 2)?;
            writer.insert(7, &Point::new(vec![2.0, 3.0]))?;
            drop(writer);

            let writer = RTree::open(ctx.path(), 2)?;
            assert_eq!(writer.len(), 1);
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_reader_opens_beside_writer() {
    run_test(
        create_test_context,
        |ctx| {
            let mut writer = RTree::create(ctx.path(), 2)?;
            writer.insert(3, &Point::new(vec![5.0, 5.0]))?;
            writer.flush()?;

            let reader = RTree::open_read_only(ctx.path(), 2)?;
            assert_eq!(reader.len(), 1);
            assert_eq!(reader.knn(&Point::new(vec![5.0, 5.0]), 1)?.ids(), vec![3]);
            Ok(())
        },
        cleanup,
    )
}
