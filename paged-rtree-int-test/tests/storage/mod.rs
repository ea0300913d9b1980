//! Page store and tree file integration tests.
//!
//! These tests verify the on-disk format: header validation on open,
//! persistence across reopen and the writer lock.

mod persistence_test;
