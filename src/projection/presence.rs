//! Compact run indicator with delayed auto-clear on terminal states.

use std::time::{Duration, Instant};

use serde::Serialize;
use tracing::debug;

use crate::execution::{ExecutionState, RunStatus};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Tone {
    /// Persistent, attention-grabbing treatment.
    Attention,
    Success,
    Failure,
}

/// What the indicator currently shows. `None` from [`PresenceSignal::label`] means hidden.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PresenceLabel {
    pub text: String,
    pub tone: Tone,
}

/// Produce the label for `state` without any timer logic.
pub fn label_for(state: &ExecutionState) -> Option<PresenceLabel> {
    match state.status {
        RunStatus::Idle => None,
        RunStatus::Running => {
            let (current, total) = state.progress();
            Some(PresenceLabel {
                text: format!("◐ {} {current}/{total}", state.skill_name),
                tone: Tone::Attention,
            })
        }
        RunStatus::Success => Some(PresenceLabel {
            text: format!("✓ {}", state.skill_name),
            tone: Tone::Success,
        }),
        RunStatus::Failed => Some(PresenceLabel {
            text: format!("✗ {}", state.skill_name),
            tone: Tone::Failure,
        }),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PresenceTimings {
    pub success_clear: Duration,
    pub failure_clear: Duration,
}

impl Default for PresenceTimings {
    fn default() -> Self {
        Self {
            success_clear: Duration::from_secs(5),
            failure_clear: Duration::from_secs(10),
        }
    }
}

/// The presence indicator and its pending auto-clear.
#[derive(Debug, Clone, Default)]
pub struct PresenceSignal {
    timings: PresenceTimings,
    label: Option<PresenceLabel>,
    clear_at: Option<Instant>,
    /// Identity of the run whose terminal state already scheduled a clear.
    cleared_run: Option<(String, Option<i64>)>,
    activations: u64,
}

impl PresenceSignal {
    pub fn new(timings: PresenceTimings) -> Self {
        Self {
            timings,
            ..Self::default()
        }
    }

    pub fn label(&self) -> Option<&PresenceLabel> {
        self.label.as_ref()
    }

    pub const fn clear_deadline(&self) -> Option<Instant> {
        self.clear_at
    }

    /// A new run started: drop any pending clear from the previous one.
    pub fn on_run_start(&mut self) {
        if self.clear_at.take().is_some() {
            debug!(target: "presence", "pending auto-clear cancelled by new run");
        }
        self.cleared_run = None;
    }

    /// Refresh the label from `state` as of `now`.
    pub fn update(&mut self, state: &ExecutionState, now: Instant) {
        let identity = (state.skill_name.clone(), state.start_time);
        if state.is_terminal() && self.cleared_run.as_ref() == Some(&identity) {
            // This terminal run was already shown and scheduled (or cleared).
            return;
        }
        self.label = label_for(state);
        if state.is_terminal() {
            let delay = if state.status == RunStatus::Success {
                self.timings.success_clear
            } else {
                self.timings.failure_clear
            };
            self.clear_at = Some(now + delay);
            self.cleared_run = Some(identity);
            debug!(target: "presence", ?delay, status = %state.status, "auto-clear scheduled");
        } else {
            self.clear_at = None;
        }
    }

    /// Hide the label once its deadline passes. Returns true when it cleared.
    pub fn tick(&mut self, now: Instant) -> bool {
        match self.clear_at {
            Some(deadline) if now >= deadline => {
                self.clear_at = None;
                self.label = None;
                debug!(target: "presence", "label auto-cleared");
                true
            }
            _ => false,
        }
    }

    /// The user clicked the indicator.
    pub fn activate(&mut self) {
        self.activations += 1;
    }

    pub const fn activations(&self) -> u64 {
        self.activations
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::execution::{StepRuntime, StepStatus};

    fn state(status: RunStatus, start: i64) -> ExecutionState {
        let mut state = ExecutionState::begin(
            "deploy",
            Some(start),
            vec![StepRuntime::pending("a"), StepRuntime::pending("b")],
        );
        state.status = status;
        state
    }

    #[test]
    fn running_shows_progress() {
        let mut running = state(RunStatus::Running, 1);
        let label = label_for(&running).unwrap();
        assert_eq!(label.text, "◐ deploy 1/2");
        assert_eq!(label.tone, Tone::Attention);
        running.steps[0].status = StepStatus::Success;
        running.advance_past(0);
        assert_eq!(label_for(&running).unwrap().text, "◐ deploy 2/2");
        assert!(label_for(&ExecutionState::idle()).is_none());
    }

    #[test]
    fn success_clears_after_delay() {
        let mut signal = PresenceSignal::new(PresenceTimings::default());
        let now = Instant::now();
        signal.update(&state(RunStatus::Success, 1), now);
        assert_eq!(signal.label().unwrap().text, "✓ deploy");
        assert!(!signal.tick(now + Duration::from_secs(4)));
        assert!(signal.tick(now + Duration::from_secs(5)));
        assert!(signal.label().is_none());

        // Re-reading the same finished run does not resurrect the label.
        signal.update(&state(RunStatus::Success, 1), now + Duration::from_secs(6));
        assert!(signal.label().is_none());
    }

    #[test]
    fn failure_uses_longer_delay() {
        let mut signal = PresenceSignal::new(PresenceTimings::default());
        let now = Instant::now();
        signal.update(&state(RunStatus::Failed, 1), now);
        assert_eq!(signal.clear_deadline(), Some(now + Duration::from_secs(10)));
    }

    #[test]
    fn new_run_cancels_pending_clear() {
        let mut signal = PresenceSignal::new(PresenceTimings::default());
        let now = Instant::now();
        signal.update(&state(RunStatus::Success, 1), now);
        signal.on_run_start();
        signal.update(&state(RunStatus::Running, 2), now);
        assert!(signal.clear_deadline().is_none());
        assert!(!signal.tick(now + Duration::from_secs(60)));
        assert_eq!(signal.label().unwrap().tone, Tone::Attention);
    }
}
