//! The live projection: step nodes plus view state that outlives data refreshes.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::error::SkillViewError;
use crate::execution::{ExecutionState, RunStatus, StepRuntime, StepStatus};
use crate::lifecycle::{LifecycleTag, LifecycleTags};
use crate::skill::{ParseDiagnostic, SkillDefinition};
use crate::utils::format_duration_ms;

use super::plan::{RenderPlan, plan_render};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DisplayMode {
    /// One node per step with a connector between nodes.
    #[default]
    Flow,
    /// One line per step.
    Compact,
}

impl DisplayMode {
    /// Rows one collapsed step occupies.
    pub const fn rows_per_step(self) -> usize {
        match self {
            Self::Flow => 2,
            Self::Compact => 1,
        }
    }

    #[must_use]
    pub const fn toggled(self) -> Self {
        match self {
            Self::Flow => Self::Compact,
            Self::Compact => Self::Flow,
        }
    }
}

impl FromStr for DisplayMode {
    type Err = SkillViewError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "flow" => Ok(Self::Flow),
            "compact" => Ok(Self::Compact),
            other => Err(SkillViewError::Config(format!(
                "unknown display mode: {other} (expected flow or compact)"
            ))),
        }
    }
}

impl fmt::Display for DisplayMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Flow => "flow",
            Self::Compact => "compact",
        })
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SurfaceTab {
    #[default]
    Execution,
    Definition,
}

impl SurfaceTab {
    #[must_use]
    pub const fn next(self) -> Self {
        match self {
            Self::Execution => Self::Definition,
            Self::Definition => Self::Execution,
        }
    }
}

/// User-owned view state. Data refreshes never reset it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ViewState {
    pub tab: SurfaceTab,
    pub mode: DisplayMode,
    pub selected: usize,
    pub expanded: Option<usize>,
    pub scroll_offset: usize,
}

/// One drawn step.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StepNode {
    pub index: usize,
    pub name: String,
    pub action: String,
    pub description: Option<String>,
    pub condition: Option<String>,
    pub tags: LifecycleTags,
    pub runtime: StepRuntime,
    /// Bumped each time this node is redrawn in place.
    pub revision: u64,
}

impl StepNode {
    fn new(index: usize, runtime: StepRuntime, definition: Option<&SkillDefinition>) -> Self {
        let declared = definition
            .and_then(|def| def.step(index))
            .filter(|s| s.name() == runtime.name);
        Self {
            index,
            name: runtime.name.clone(),
            action: declared.map_or_else(String::new, |s| s.action_label().to_string()),
            description: declared.and_then(|s| s.declaration().description.clone()),
            condition: declared.and_then(|s| s.declaration().condition.clone()),
            tags: declared.map(|s| s.tags().clone()).unwrap_or_default(),
            runtime,
            revision: 0,
        }
    }

    pub fn status_icon(&self) -> &'static str {
        status_icon(self.runtime.status)
    }

    /// `✓ 2. fetch-logs  [shell_exec]  1.4s  R W ↻1`
    pub fn summary_line(&self) -> String {
        let mut line = format!("{} {}. {}", self.status_icon(), self.index + 1, self.name);
        if !self.action.is_empty() {
            line.push_str(&format!("  [{}]", self.action));
        }
        if let Some(ms) = self.runtime.duration_ms {
            line.push_str(&format!("  {}", format_duration_ms(ms)));
        }
        let badges = self.badges();
        if !badges.is_empty() {
            line.push_str("  ");
            line.push_str(&badges.join(" "));
        }
        line
    }

    /// Short markers for structural tags and runtime facts.
    pub fn badges(&self) -> Vec<String> {
        let mut badges: Vec<String> = self
            .tags
            .active()
            .into_iter()
            .map(|tag| tag_badge(tag).to_string())
            .collect();
        if !self.runtime.memory_read.is_empty() && !self.tags.has(LifecycleTag::MemoryRead) {
            badges.push(tag_badge(LifecycleTag::MemoryRead).to_string());
        }
        if !self.runtime.memory_write.is_empty() && !self.tags.has(LifecycleTag::MemoryWrite) {
            badges.push(tag_badge(LifecycleTag::MemoryWrite).to_string());
        }
        if self.runtime.healing_applied {
            badges.push("healed".to_string());
        }
        if self.runtime.retry_count > 0 {
            badges.push(format!("↻{}", self.runtime.retry_count));
        }
        badges
    }

    /// Lines shown under an expanded node.
    pub fn detail_lines(&self) -> Vec<String> {
        let mut lines = Vec::new();
        if let Some(description) = &self.description {
            lines.push(description.clone());
        }
        if let Some(condition) = &self.condition {
            lines.push(format!("when: {condition}"));
        }
        if !self.runtime.memory_read.is_empty() {
            lines.push(format!("reads: {}", self.runtime.memory_read.join(", ")));
        }
        if !self.runtime.memory_write.is_empty() {
            lines.push(format!("writes: {}", self.runtime.memory_write.join(", ")));
        }
        if !self.tags.semantic_search.is_empty() {
            lines.push(format!("searches: {}", self.tags.semantic_search.join(", ")));
        }
        if let Some(details) = &self.runtime.healing_details {
            lines.push(format!("healed: {details}"));
        }
        if let Some(error) = &self.runtime.error {
            lines.push(format!("error: {error}"));
        }
        if let Some(result) = &self.runtime.result {
            let text = result
                .as_str()
                .map_or_else(|| result.to_string(), str::to_string);
            lines.push(format!("result: {text}"));
        }
        lines
    }
}

pub const fn status_icon(status: StepStatus) -> &'static str {
    match status {
        StepStatus::Pending => "○",
        StepStatus::Running => "◐",
        StepStatus::Success => "✓",
        StepStatus::Failed => "✗",
        StepStatus::Skipped => "⊘",
    }
}

const fn tag_badge(tag: LifecycleTag) -> &'static str {
    match tag {
        LifecycleTag::MemoryRead => "R",
        LifecycleTag::MemoryWrite => "W",
        LifecycleTag::SemanticSearch => "S",
        LifecycleTag::AutoRemediation => "heal",
        LifecycleTag::Retryable => "retry",
    }
}

/// The one projection surface.
#[derive(Debug, Clone, Default)]
pub struct ProjectionSurface {
    skill_name: String,
    run_status: RunStatus,
    nodes: Vec<StepNode>,
    view: ViewState,
    rendered: Option<ExecutionState>,
    definition: Option<SkillDefinition>,
    diagnostics: Vec<ParseDiagnostic>,
    viewport_rows: usize,
    rebuilds: u64,
    /// Set once the user picks a skill; cleared surfaces follow the live run.
    pinned: bool,
}

impl ProjectionSurface {
    pub fn new(mode: DisplayMode) -> Self {
        Self {
            view: ViewState {
                mode,
                ..ViewState::default()
            },
            viewport_rows: 20,
            ..Self::default()
        }
    }

    pub fn skill_name(&self) -> &str {
        &self.skill_name
    }

    pub const fn run_status(&self) -> RunStatus {
        self.run_status
    }

    pub fn nodes(&self) -> &[StepNode] {
        &self.nodes
    }

    pub const fn view(&self) -> &ViewState {
        &self.view
    }

    pub const fn definition(&self) -> Option<&SkillDefinition> {
        self.definition.as_ref()
    }

    pub fn diagnostics(&self) -> &[ParseDiagnostic] {
        &self.diagnostics
    }

    /// The state last drawn, if any.
    pub const fn rendered(&self) -> Option<&ExecutionState> {
        self.rendered.as_ref()
    }

    /// Number of full rebuilds so far.
    pub const fn rebuilds(&self) -> u64 {
        self.rebuilds
    }

    pub const fn is_pinned(&self) -> bool {
        self.pinned
    }

    /// Whether refreshes of `state` belong on this surface: always while
    /// following the live run, otherwise only for the picked skill.
    pub fn follows(&self, state: &ExecutionState) -> bool {
        !self.pinned || self.skill_name == state.skill_name
    }

    /// The user picked a skill. The only operation that resets view state.
    pub fn select_skill(&mut self, name: &str) {
        debug!(target: "surface", skill = name, "skill selected; view reset");
        self.view = ViewState {
            mode: self.view.mode,
            ..ViewState::default()
        };
        self.skill_name = name.to_string();
        self.nodes.clear();
        self.rendered = None;
        self.definition = None;
        self.diagnostics.clear();
        self.run_status = RunStatus::Idle;
        self.pinned = true;
    }

    /// Definition-only view of a skill.
    pub fn load_skill(&mut self, definition: SkillDefinition, diagnostics: Vec<ParseDiagnostic>) {
        if definition.name != self.skill_name {
            self.select_skill(&definition.name);
        }
        self.pinned = true;
        self.nodes = definition
            .steps
            .iter()
            .enumerate()
            .map(|(index, step)| {
                StepNode::new(
                    index,
                    StepRuntime::from_tags(step.name(), step.tags()),
                    Some(&definition),
                )
            })
            .collect();
        self.view.tab = SurfaceTab::Definition;
        self.run_status = RunStatus::Idle;
        self.rendered = None;
        self.diagnostics = diagnostics;
        self.definition = Some(definition);
        self.rebuilds += 1;
        self.clamp_view();
    }

    /// Live view of `state`, drawn from scratch.
    pub fn show_execution(&mut self, state: &ExecutionState) -> RenderPlan {
        self.view.tab = SurfaceTab::Execution;
        self.apply(state, true)
    }

    /// Switch to the live run and follow later runs whatever their skill.
    pub fn follow(
        &mut self,
        state: &ExecutionState,
        definition: Option<&SkillDefinition>,
    ) -> RenderPlan {
        if self.skill_name != state.skill_name {
            self.select_skill(&state.skill_name);
        }
        self.pinned = false;
        self.attach_definition(definition);
        self.show_execution(state)
    }

    /// Offer a definition for step metadata; kept only if it names the same skill.
    pub fn attach_definition(&mut self, definition: Option<&SkillDefinition>) {
        if let Some(definition) = definition {
            if self.definition.as_ref().map(|d| &d.name) != Some(&definition.name) {
                self.definition = Some(definition.clone());
                self.diagnostics.clear();
            }
        }
    }

    /// Bring the surface up to date with `state`.
    pub fn apply(&mut self, state: &ExecutionState, is_new_run: bool) -> RenderPlan {
        let plan = plan_render(self.rendered.as_ref(), state, is_new_run);
        let started_running = newly_running(self.rendered.as_ref(), state, plan.is_full());

        match &plan {
            RenderPlan::FullRebuild => self.rebuild(state),
            RenderPlan::PatchSteps(indices) => {
                for &index in indices {
                    self.patch(index, &state.steps[index]);
                }
            }
        }
        self.run_status = state.status;
        self.rendered = Some(state.clone());

        if let Some(index) = started_running {
            self.ensure_visible(index);
        }
        plan
    }

    fn rebuild(&mut self, state: &ExecutionState) {
        if self.definition.as_ref().is_some_and(|d| d.name != state.skill_name) {
            self.definition = None;
            self.diagnostics.clear();
        }
        self.skill_name.clone_from(&state.skill_name);
        self.nodes = state
            .steps
            .iter()
            .enumerate()
            .map(|(index, runtime)| StepNode::new(index, runtime.clone(), self.definition.as_ref()))
            .collect();
        self.rebuilds += 1;
        self.clamp_view();
        debug!(
            target: "surface",
            skill = %self.skill_name,
            nodes = self.nodes.len(),
            "full rebuild"
        );
    }

    fn patch(&mut self, index: usize, runtime: &StepRuntime) {
        if let Some(node) = self.nodes.get_mut(index) {
            node.runtime = runtime.clone();
            node.revision += 1;
            trace!(target: "surface", index, status = %runtime.status, "step patched");
        }
    }

    fn clamp_view(&mut self) {
        let count = self.nodes.len();
        self.view.selected = self.view.selected.min(count.saturating_sub(1));
        self.view.expanded = self.view.expanded.filter(|index| *index < count);
        self.view.scroll_offset = self.view.scroll_offset.min(self.max_scroll());
    }

    // View actions

    pub fn set_viewport_rows(&mut self, rows: usize) {
        self.viewport_rows = rows.max(1);
        self.view.scroll_offset = self.view.scroll_offset.min(self.max_scroll());
    }

    pub fn select_next(&mut self) {
        if self.view.selected + 1 < self.nodes.len() {
            self.view.selected += 1;
            self.ensure_visible(self.view.selected);
        }
    }

    pub fn select_previous(&mut self) {
        if self.view.selected > 0 {
            self.view.selected -= 1;
            self.ensure_visible(self.view.selected);
        }
    }

    pub fn toggle_expanded(&mut self) {
        if self.nodes.is_empty() {
            return;
        }
        let selected = self.view.selected;
        self.view.expanded = if self.view.expanded == Some(selected) {
            None
        } else {
            Some(selected)
        };
        self.view.scroll_offset = self.view.scroll_offset.min(self.max_scroll());
    }

    pub fn toggle_mode(&mut self) {
        self.view.mode = self.view.mode.toggled();
        self.view.scroll_offset = self.view.scroll_offset.min(self.max_scroll());
    }

    pub fn next_tab(&mut self) {
        self.view.tab = self.view.tab.next();
    }

    pub fn set_tab(&mut self, tab: SurfaceTab) {
        self.view.tab = tab;
    }

    pub fn scroll_by(&mut self, delta: isize) {
        let target = self.view.scroll_offset.saturating_add_signed(delta);
        self.view.scroll_offset = target.min(self.max_scroll());
    }

    pub fn page_down(&mut self) {
        self.scroll_by(isize::try_from(self.viewport_rows).unwrap_or(isize::MAX));
    }

    pub fn page_up(&mut self) {
        self.scroll_by(-isize::try_from(self.viewport_rows).unwrap_or(isize::MAX));
    }

    /// Rows taken by node `index` in the current mode.
    pub fn node_height(&self, index: usize) -> usize {
        let base = self.view.mode.rows_per_step();
        if self.view.expanded == Some(index) {
            base + self.nodes.get(index).map_or(0, |n| n.detail_lines().len())
        } else {
            base
        }
    }

    fn row_of(&self, index: usize) -> usize {
        (0..index).map(|i| self.node_height(i)).sum()
    }

    fn content_rows(&self) -> usize {
        self.row_of(self.nodes.len())
    }

    fn max_scroll(&self) -> usize {
        self.content_rows().saturating_sub(self.viewport_rows.max(1))
    }

    /// Scroll the minimum needed to show node `index` in full.
    pub fn ensure_visible(&mut self, index: usize) {
        if index >= self.nodes.len() {
            return;
        }
        let top = self.row_of(index);
        let bottom = top + self.node_height(index);
        let viewport = self.viewport_rows.max(1);
        if top < self.view.scroll_offset {
            self.view.scroll_offset = top;
        } else if bottom > self.view.scroll_offset + viewport {
            self.view.scroll_offset = bottom.saturating_sub(viewport).min(top);
        }
        trace!(target: "surface", index, offset = self.view.scroll_offset, "scrolled into view");
    }

    /// Plain-text rendering of the step list in the current mode.
    pub fn render_lines(&self) -> Vec<String> {
        let mut lines = Vec::new();
        for (index, node) in self.nodes.iter().enumerate() {
            lines.push(node.summary_line());
            if self.view.expanded == Some(index) {
                lines.extend(node.detail_lines().into_iter().map(|l| format!("    {l}")));
            }
            if self.view.mode == DisplayMode::Flow {
                let last = index + 1 == self.nodes.len();
                lines.push(if last { String::new() } else { "  │".to_string() });
            }
        }
        lines
    }
}

/// Index of a step that is running in `next` but was not running before.
fn newly_running(
    previous: Option<&ExecutionState>,
    next: &ExecutionState,
    full: bool,
) -> Option<usize> {
    let running = next.running_step()?;
    if full {
        return Some(running);
    }
    let was_running = previous
        .and_then(|prev| prev.steps.get(running))
        .is_some_and(|step| step.status == StepStatus::Running);
    (!was_running).then_some(running)
}
