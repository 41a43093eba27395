//! Heuristic lifecycle tagging of skill steps.
//!
//! Tags are computed once when a skill is loaded and annotate the projection
//! (memory access, semantic search, auto-remediation, retryability). They are
//! never consulted when deciding whether a step runs.

mod classifier;
mod table;

pub use classifier::*;
pub use table::*;
