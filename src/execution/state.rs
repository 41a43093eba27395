use std::fmt;

use serde::{Deserialize, Serialize};

use crate::lifecycle::LifecycleTags;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    #[default]
    Idle,
    Running,
    #[serde(alias = "completed", alias = "succeeded")]
    Success,
    #[serde(alias = "error")]
    Failed,
}

impl RunStatus {
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Success | Self::Failed)
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Idle => "idle",
            Self::Running => "running",
            Self::Success => "success",
            Self::Failed => "failed",
        })
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    #[default]
    Pending,
    Running,
    Success,
    Failed,
    Skipped,
}

impl StepStatus {
    /// Finished one way or another; the run index may move past it.
    pub const fn is_settled(self) -> bool {
        matches!(self, Self::Success | Self::Failed | Self::Skipped)
    }
}

impl fmt::Display for StepStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Success => "success",
            Self::Failed => "failed",
            Self::Skipped => "skipped",
        })
    }
}

/// Runtime state of one step within the current run.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StepRuntime {
    pub name: String,
    pub status: StepStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub healing_applied: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub healing_details: Option<String>,
    pub retry_count: u32,
    /// Structural keys from the definition plus any reported at runtime.
    pub memory_read: Vec<String>,
    pub memory_write: Vec<String>,
}

impl StepRuntime {
    pub fn pending(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// A pending step seeded with the structural memory keys of its definition.
    pub fn from_tags(name: impl Into<String>, tags: &LifecycleTags) -> Self {
        Self {
            memory_read: tags.memory_read.clone(),
            memory_write: tags.memory_write.clone(),
            ..Self::pending(name)
        }
    }

    pub fn record_memory_read(&mut self, key: &str) {
        push_unique(&mut self.memory_read, key);
    }

    pub fn record_memory_write(&mut self, key: &str) {
        push_unique(&mut self.memory_write, key);
    }
}

fn push_unique(keys: &mut Vec<String>, key: &str) {
    if !keys.iter().any(|existing| existing == key) {
        keys.push(key.to_string());
    }
}

/// The live view of the most recent run.
///
/// `current_step_index` is `None` before any run starts; afterwards it counts
/// settled steps and only moves forward.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionState {
    pub skill_name: String,
    pub status: RunStatus,
    pub current_step_index: Option<usize>,
    pub steps: Vec<StepRuntime>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_time: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_time: Option<i64>,
}

impl ExecutionState {
    pub fn idle() -> Self {
        Self::default()
    }

    /// Fresh running state. Step count is fixed from here on.
    pub fn begin(
        skill_name: impl Into<String>,
        start_time: Option<i64>,
        steps: Vec<StepRuntime>,
    ) -> Self {
        Self {
            skill_name: skill_name.into(),
            status: RunStatus::Running,
            current_step_index: Some(0),
            steps,
            start_time,
            end_time: None,
        }
    }

    pub fn total_steps(&self) -> usize {
        self.steps.len()
    }

    pub fn running_step(&self) -> Option<usize> {
        self.steps
            .iter()
            .position(|step| step.status == StepStatus::Running)
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// `(current, total)` for progress labels, with `current` 1-based and clamped.
    pub fn progress(&self) -> (usize, usize) {
        let total = self.total_steps();
        let current = self.current_step_index.map_or(0, |index| (index + 1).min(total));
        (current, total)
    }

    /// Move the index forward past `settled`; never moves it back.
    pub fn advance_past(&mut self, settled: usize) {
        let next = (settled + 1).min(self.total_steps());
        self.current_step_index = Some(self.current_step_index.map_or(next, |cur| cur.max(next)));
    }

    /// Check the structural invariants; returns the first violation found.
    pub fn check_invariants(&self) -> Result<(), String> {
        if let Some(index) = self.current_step_index {
            if index > self.steps.len() {
                return Err(format!(
                    "current step index {index} exceeds step count {}",
                    self.steps.len()
                ));
            }
        }
        let running = self
            .steps
            .iter()
            .filter(|step| step.status == StepStatus::Running)
            .count();
        if running > 1 {
            return Err(format!("{running} steps are running at once"));
        }
        if self.status.is_terminal() && running > 0 {
            return Err(format!("run is {} but a step is still running", self.status));
        }
        Ok(())
    }
}
