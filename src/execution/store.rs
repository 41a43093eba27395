//! The single live execution state and the record it was derived from.

use tracing::{debug, info};

use crate::skill::SkillDefinition;

use super::reconcile::{self, Applied, ApplyContext};
use super::record::StateRecord;
use super::state::ExecutionState;

/// Resolves a skill definition by name when a run starts.
pub trait DefinitionLookup {
    fn definition(&self, skill_name: &str) -> Option<SkillDefinition>;
}

/// Lookup that never resolves; step layout then comes from the record.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoDefinitions;

impl DefinitionLookup for NoDefinitions {
    fn definition(&self, _skill_name: &str) -> Option<SkillDefinition> {
        None
    }
}

/// Result of ingesting one record.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StoreUpdate {
    /// The record started a different run than the one held.
    pub is_new_run: bool,
    /// Events applied from this record.
    pub applied: usize,
    /// A `run-start` event was applied.
    pub run_started: bool,
    /// Steps whose runtime changed, in first-touched order.
    pub touched_steps: Vec<usize>,
    pub run_completed: bool,
}

impl StoreUpdate {
    pub fn is_noop(&self) -> bool {
        !self.is_new_run && self.applied == 0
    }
}

#[derive(Debug, Default)]
pub struct ExecutionStore {
    state: ExecutionState,
    last_record: Option<StateRecord>,
    definition: Option<SkillDefinition>,
}

impl ExecutionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub const fn state(&self) -> &ExecutionState {
        &self.state
    }

    pub const fn last_record(&self) -> Option<&StateRecord> {
        self.last_record.as_ref()
    }

    /// Definition of the live run's skill, if one resolved at run start.
    pub const fn definition(&self) -> Option<&SkillDefinition> {
        self.definition.as_ref()
    }

    /// Fold a freshly read record into the live state.
    pub fn ingest(&mut self, record: StateRecord, lookup: &dyn DefinitionLookup) -> StoreUpdate {
        let reconciliation = reconcile::reconcile(self.last_record.as_ref(), &record);
        let mut update = StoreUpdate {
            is_new_run: reconciliation.is_new_run,
            ..StoreUpdate::default()
        };

        if reconciliation.is_new_run {
            self.definition = if record.skill_name.is_empty() {
                None
            } else {
                lookup.definition(&record.skill_name)
            };
            let ctx = ApplyContext {
                definition: self.definition.as_ref(),
                record: Some(&record),
            };
            self.state = reconcile::baseline(&record, &ctx);
            info!(
                target: "reconcile",
                skill = %record.skill_name,
                steps = self.state.total_steps(),
                definition = self.definition.is_some(),
                "new run observed"
            );
        }

        let ctx = ApplyContext {
            definition: self.definition.as_ref(),
            record: Some(&record),
        };
        for event in reconciliation.new_events {
            match reconcile::apply_event(&mut self.state, event, &ctx) {
                Applied::Ignored => continue,
                Applied::RunStarted => {
                    update.run_started = true;
                    update.touched_steps.clear();
                }
                Applied::Step(index) => {
                    if !update.touched_steps.contains(&index) {
                        update.touched_steps.push(index);
                    }
                }
                Applied::RunCompleted => update.run_completed = true,
            }
            update.applied += 1;
        }

        debug!(
            target: "reconcile",
            applied = update.applied,
            new_run = update.is_new_run,
            status = %self.state.status,
            "record ingested"
        );
        self.last_record = Some(record);
        update
    }

    /// Drop everything; the next record is treated as a new run.
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}
