//! Property test suite entry point.

mod classifier_tests;
mod convergence_tests;
