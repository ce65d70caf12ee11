//! netd network CLI
//!
//! Command-line management of the networks of a netd node: listing,
//! inspection, creation, update, rename, deletion and usage checks.

pub mod commands;
pub mod config;
pub mod context;
