//! Shared read access and writer exclusion.

mod shared_read_test;
mod writer_lock_test;
