//! Integration test suite entry point.

mod cli_tests;
#[path = "../common/mod.rs"]
mod common;
mod live_tests;
