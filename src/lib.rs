//! skillview: a live projection of skill executions.
//!
//! An external executor appends events to a JSON state record. This crate
//! watches that record, folds the new events into an [`execution::ExecutionState`],
//! and keeps a step-by-step view and a compact presence indicator in sync with it.

pub mod app;
pub mod cli;
pub mod config;
pub mod error;
pub mod execution;
pub mod lifecycle;
pub mod monitor;
pub mod projection;
pub mod skill;
pub mod test_utils;
pub mod trigger;
pub mod utils;
pub mod watch;

pub use error::{Result, SkillViewError};
