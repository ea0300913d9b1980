//! Tree maintenance integration tests.

mod insert_delete_test;
