//! I/O helpers for the recovery binary and its callers.

pub mod config;
pub mod raw_output;
pub mod report;
pub mod schema;
