use crate::execution::{ExecutionState, StepRuntime};

/// How the surface should bring itself up to date with a new state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenderPlan {
    /// Discard every step node and draw the run from scratch.
    FullRebuild,
    /// Redraw only these step nodes, in ascending order. May be empty.
    PatchSteps(Vec<usize>),
}

impl RenderPlan {
    pub const fn is_full(&self) -> bool {
        matches!(self, Self::FullRebuild)
    }

    /// Nothing to draw.
    pub fn is_noop(&self) -> bool {
        matches!(self, Self::PatchSteps(indices) if indices.is_empty())
    }
}

/// Decide between a rebuild and a patch.
///
/// Patching requires the same run and the same step count; in that case only
/// steps whose visible runtime facts differ are listed.
pub fn plan_render(
    previous: Option<&ExecutionState>,
    next: &ExecutionState,
    is_new_run: bool,
) -> RenderPlan {
    let Some(previous) = previous else {
        return RenderPlan::FullRebuild;
    };
    if is_new_run
        || previous.steps.len() != next.steps.len()
        || previous.skill_name != next.skill_name
        || previous.start_time != next.start_time
    {
        return RenderPlan::FullRebuild;
    }

    RenderPlan::PatchSteps(
        previous
            .steps
            .iter()
            .zip(&next.steps)
            .enumerate()
            .filter(|(_, (before, after))| step_differs(before, after))
            .map(|(index, _)| index)
            .collect(),
    )
}

/// Whether two snapshots of one step render differently.
pub fn step_differs(before: &StepRuntime, after: &StepRuntime) -> bool {
    before.status != after.status
        || before.duration_ms != after.duration_ms
        || before.error != after.error
        || before.healing_applied != after.healing_applied
        || before.healing_details != after.healing_details
        || before.retry_count != after.retry_count
        || before.memory_read != after.memory_read
        || before.memory_write != after.memory_write
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::execution::StepStatus;

    fn run(skill: &str, start: i64, steps: usize) -> ExecutionState {
        ExecutionState::begin(
            skill,
            Some(start),
            (0..steps).map(|i| StepRuntime::pending(format!("s{i}"))).collect(),
        )
    }

    #[test]
    fn first_render_is_full() {
        assert_eq!(plan_render(None, &run("a", 1, 2), false), RenderPlan::FullRebuild);
    }

    #[test]
    fn new_run_flag_forces_rebuild() {
        let state = run("a", 1, 2);
        assert!(plan_render(Some(&state), &state, true).is_full());
    }

    #[test]
    fn length_or_identity_change_rebuilds() {
        let previous = run("a", 1, 2);
        assert!(plan_render(Some(&previous), &run("a", 1, 3), false).is_full());
        assert!(plan_render(Some(&previous), &run("b", 1, 2), false).is_full());
        assert!(plan_render(Some(&previous), &run("a", 2, 2), false).is_full());
    }

    #[test]
    fn patch_lists_only_changed_steps() {
        let previous = run("a", 1, 4);
        let mut next = previous.clone();
        next.steps[1].status = StepStatus::Success;
        next.steps[1].duration_ms = Some(5);
        next.steps[3].retry_count = 1;
        next.steps[2].result = Some(serde_json::json!("not rendered in patches"));
        assert_eq!(
            plan_render(Some(&previous), &next, false),
            RenderPlan::PatchSteps(vec![1, 3])
        );
    }

    #[test]
    fn identical_states_are_a_noop() {
        let state = run("a", 1, 2);
        assert!(plan_render(Some(&state), &state, false).is_noop());
    }
}
