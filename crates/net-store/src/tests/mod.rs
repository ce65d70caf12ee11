//! Store tests

mod file_store_tests;
