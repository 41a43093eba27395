//! Event reconciliation: which events are new, and what each one does.

use tracing::{debug, trace, warn};

use crate::skill::SkillDefinition;

use super::record::{EventKind, ExecutionEvent, StateRecord};
use super::state::{ExecutionState, RunStatus, StepRuntime, StepStatus};

/// Outcome of diffing a freshly read record against the last one seen.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Reconciliation<'a> {
    pub new_events: &'a [ExecutionEvent],
    pub is_new_run: bool,
}

/// Determine the new events in `incoming` relative to `previous`.
///
/// A different skill name or start time is a new run and every event is new.
/// Otherwise the log is append-only and the new events are the suffix past the
/// previously seen length. A log that shrank yields nothing.
pub fn reconcile<'a>(
    previous: Option<&StateRecord>,
    incoming: &'a StateRecord,
) -> Reconciliation<'a> {
    let Some(previous) = previous.filter(|prev| prev.same_run(incoming)) else {
        return Reconciliation {
            new_events: &incoming.events,
            is_new_run: true,
        };
    };

    let seen = previous.events.len();
    if incoming.events.len() < seen {
        warn!(
            target: "reconcile",
            skill = %incoming.skill_name,
            seen,
            now = incoming.events.len(),
            "event log shrank within the same run; adopting it as the new baseline"
        );
    }

    Reconciliation {
        new_events: incoming.events.get(seen..).unwrap_or_default(),
        is_new_run: false,
    }
}

/// Inputs to event application that do not live on the state itself.
#[derive(Debug, Clone, Copy, Default)]
pub struct ApplyContext<'a> {
    /// Definition of the skill being run, when the catalog resolves it.
    pub definition: Option<&'a SkillDefinition>,
    /// The record this event arrived in.
    pub record: Option<&'a StateRecord>,
}

/// What applying one event did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Applied {
    /// The run was (re)started; the step layout may have changed.
    RunStarted,
    /// One step's runtime changed.
    Step(usize),
    /// The run reached a terminal status.
    RunCompleted,
    Ignored,
}

/// Initial step layout for a run of `skill_name`.
///
/// Order of preference: the resolved definition, the step list the runner
/// announced, then a bare step count.
pub fn initial_steps(
    ctx: &ApplyContext<'_>,
    announced: Option<Vec<String>>,
) -> Vec<StepRuntime> {
    if let Some(definition) = ctx.definition {
        return definition
            .steps
            .iter()
            .map(|step| StepRuntime::from_tags(step.name(), step.tags()))
            .collect();
    }
    if let Some(names) = announced {
        return names.into_iter().map(StepRuntime::pending).collect();
    }
    let count = ctx.record.and_then(|record| record.total_steps).unwrap_or(0);
    (0..count)
        .map(|index| StepRuntime::pending(format!("step-{}", index + 1)))
        .collect()
}

/// Apply one event to the live state.
pub fn apply_event(
    state: &mut ExecutionState,
    event: &ExecutionEvent,
    ctx: &ApplyContext<'_>,
) -> Applied {
    if event.kind == EventKind::RunStart {
        let skill_name = if event.skill_name.is_empty() {
            ctx.record.map(|r| r.skill_name.clone()).unwrap_or_default()
        } else {
            event.skill_name.clone()
        };
        let start_time = ctx
            .record
            .and_then(|r| r.start_time)
            .or(Some(event.timestamp));
        let steps = initial_steps(ctx, event.data.step_names());
        debug!(target: "reconcile", skill = %skill_name, steps = steps.len(), "run started");
        *state = ExecutionState::begin(skill_name, start_time, steps);
        return Applied::RunStarted;
    }

    if state.is_terminal() || state.status == RunStatus::Idle {
        trace!(
            target: "reconcile",
            kind = %event.kind,
            status = %state.status,
            "event outside an active run ignored"
        );
        return Applied::Ignored;
    }

    match event.kind {
        EventKind::RunComplete => {
            complete_run(state, event, ctx);
            Applied::RunCompleted
        }
        EventKind::Unknown => {
            debug!(target: "reconcile", "unknown event type ignored");
            Applied::Ignored
        }
        kind => {
            let Some(index) = resolve_step(state, event) else {
                debug!(
                    target: "reconcile",
                    kind = %kind,
                    step_index = ?event.step_index,
                    step_name = ?event.step_name,
                    "event does not resolve to a step; ignored"
                );
                return Applied::Ignored;
            };
            apply_step_event(state, index, event);
            Applied::Step(index)
        }
    }
}

/// `stepIndex` when in range, else the first step with a matching name.
pub fn resolve_step(state: &ExecutionState, event: &ExecutionEvent) -> Option<usize> {
    let by_index = event
        .step_index
        .and_then(|index| usize::try_from(index).ok())
        .filter(|index| *index < state.steps.len());
    by_index.or_else(|| {
        let name = event.step_name.as_deref()?;
        state.steps.iter().position(|step| step.name == name)
    })
}

fn apply_step_event(state: &mut ExecutionState, index: usize, event: &ExecutionEvent) {
    let data = &event.data;
    match event.kind {
        EventKind::StepStart => {
            // A step still running lost its completion event.
            if let Some(stale) = state.running_step().filter(|running| *running != index) {
                state.steps[stale].status = StepStatus::Success;
                state.advance_past(stale);
            }
            state.steps[index].status = StepStatus::Running;
        }
        EventKind::StepComplete => {
            let step = &mut state.steps[index];
            step.status = StepStatus::Success;
            step.duration_ms = data.duration_ms().or(step.duration_ms);
            if data.result.is_some() {
                step.result.clone_from(&data.result);
            }
            state.advance_past(index);
        }
        EventKind::StepFailed => {
            let step = &mut state.steps[index];
            step.status = StepStatus::Failed;
            step.duration_ms = data.duration_ms().or(step.duration_ms);
            step.error = data.error_text().or_else(|| Some("step failed".to_string()));
            state.advance_past(index);
        }
        EventKind::StepSkipped => {
            state.steps[index].status = StepStatus::Skipped;
            state.advance_past(index);
        }
        EventKind::MemoryRead => {
            if let Some(key) = data.key.as_deref() {
                state.steps[index].record_memory_read(key);
            }
        }
        EventKind::MemoryWrite => {
            if let Some(key) = data.key.as_deref() {
                state.steps[index].record_memory_write(key);
            }
        }
        EventKind::AutoHeal => {
            let step = &mut state.steps[index];
            step.healing_applied = true;
            if let Some(details) = data.details_text() {
                step.healing_details = Some(details);
            }
        }
        EventKind::Retry => {
            let step = &mut state.steps[index];
            step.retry_count = match data.retry_count {
                Some(reported) => step.retry_count.max(reported),
                None => step.retry_count.saturating_add(1),
            };
        }
        EventKind::RunStart | EventKind::RunComplete | EventKind::Unknown => {}
    }
}

fn complete_run(state: &mut ExecutionState, event: &ExecutionEvent, ctx: &ApplyContext<'_>) {
    let any_failed = state.steps.iter().any(|s| s.status == StepStatus::Failed);
    let success = event.data.success.unwrap_or_else(|| {
        match ctx.record.map(|record| record.status) {
            Some(RunStatus::Success) => true,
            Some(RunStatus::Failed) => false,
            _ => !any_failed,
        }
    });

    let (run_status, leftover) = if success {
        (RunStatus::Success, StepStatus::Success)
    } else {
        (RunStatus::Failed, StepStatus::Failed)
    };
    if let Some(running) = state.running_step() {
        state.steps[running].status = leftover;
        state.advance_past(running);
    }
    state.status = run_status;
    state.end_time = Some(event.timestamp)
        .filter(|ts| *ts > 0)
        .or_else(|| ctx.record.and_then(|r| r.end_time));
    debug!(target: "reconcile", skill = %state.skill_name, status = %state.status, "run completed");
}

/// Apply every event of `record` to a state built from scratch.
///
/// This is the batch counterpart of incremental ingestion; both must end in
/// the same state for the same final record.
pub fn replay(record: &StateRecord, definition: Option<&SkillDefinition>) -> ExecutionState {
    let ctx = ApplyContext {
        definition,
        record: Some(record),
    };
    let mut state = baseline(record, &ctx);
    for event in &record.events {
        apply_event(&mut state, event, &ctx);
    }
    state
}

/// Starting state for a newly observed run before its events are applied.
///
/// A record first seen mid-run may not carry its `run-start` any more, so the
/// layout is taken from the record itself. When the record has events they
/// decide the status; without events the record's own `status` does.
pub fn baseline(record: &StateRecord, ctx: &ApplyContext<'_>) -> ExecutionState {
    if record.is_idle() {
        return ExecutionState::idle();
    }
    if record.events.is_empty() && record.status == RunStatus::Idle {
        return ExecutionState::idle();
    }

    let mut state = ExecutionState::begin(
        record.skill_name.clone(),
        record.start_time,
        initial_steps(ctx, None),
    );
    if record.events.is_empty() && record.status.is_terminal() {
        state.status = record.status;
        state.end_time = record.end_time;
        let total = state.total_steps();
        state.current_step_index = usize::try_from(record.current_step_index)
            .ok()
            .map(|index| index.min(total));
    }
    state
}
