//! Execution state for the one live run.
//!
//! The external runner appends events to a JSON state record. This module
//! decodes that record ([`StateRecord`]), diffs it against the last one seen
//! ([`reconcile`]), and folds new events into an [`ExecutionState`] held by
//! the [`ExecutionStore`].

mod reconcile;
mod record;
mod state;
mod store;

pub use reconcile::{
    Applied, ApplyContext, Reconciliation, apply_event, baseline, initial_steps, reconcile,
    replay, resolve_step,
};
pub use record::{EventData, EventKind, ExecutionEvent, RunStepInfo, StateRecord};
pub use state::{ExecutionState, RunStatus, StepRuntime, StepStatus};
pub use store::{DefinitionLookup, ExecutionStore, NoDefinitions, StoreUpdate};
