//! Query integration tests, checked against linear scans.

mod knn_test;
mod range_test;
