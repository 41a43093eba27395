//! The monitor service: one detector, one store, at most one surface.
//!
//! A [`Monitor`] is constructed once per process, owns every piece of live
//! state, and is disposed on shutdown. Callers reach the surface and presence
//! signal through accessors on it.

use std::collections::{VecDeque, vec_deque};
use std::path::PathBuf;
use std::thread;
use std::time::{Duration, Instant};

use chrono::{DateTime, Local};
use serde::Serialize;
use tracing::{debug, info, trace, warn};

use crate::error::{Result, SkillViewError};
use crate::execution::{ExecutionState, ExecutionStore, StateRecord, StoreUpdate};
use crate::projection::{
    DisplayMode, PresenceSignal, PresenceTimings, ProjectionSurface, RenderPlan, SurfaceTab,
};
use crate::skill::SkillCatalog;
use crate::trigger::RunTrigger;
use crate::watch::{ChangeDetector, DetectorOptions};

/// Creates the projection surface on demand. A host may refuse.
pub trait SurfaceHost {
    fn create_surface(&mut self, mode: DisplayMode) -> Result<ProjectionSurface>;
}

/// Host that always provides an in-process surface.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalHost;

impl SurfaceHost for LocalHost {
    fn create_surface(&mut self, mode: DisplayMode) -> Result<ProjectionSurface> {
        Ok(ProjectionSurface::new(mode))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NoticeLevel {
    Info,
    Warning,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notification {
    pub seq: u64,
    pub level: NoticeLevel,
    pub message: String,
    pub at: DateTime<Local>,
}

/// Bounded, most-recent-last list of user-visible messages.
#[derive(Debug, Clone)]
pub struct Notifications {
    items: VecDeque<Notification>,
    capacity: usize,
    next_seq: u64,
}

impl Default for Notifications {
    fn default() -> Self {
        Self::with_capacity(8)
    }
}

impl Notifications {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            items: VecDeque::with_capacity(capacity),
            capacity: capacity.max(1),
            next_seq: 1,
        }
    }

    pub fn push(&mut self, level: NoticeLevel, message: impl Into<String>) -> u64 {
        let seq = self.next_seq;
        self.next_seq += 1;
        if self.items.len() == self.capacity {
            self.items.pop_front();
        }
        self.items.push_back(Notification {
            seq,
            level,
            message: message.into(),
            at: Local::now(),
        });
        seq
    }

    /// Oldest first; reverse it for most-recent-first.
    pub fn iter(&self) -> vec_deque::Iter<'_, Notification> {
        self.items.iter()
    }

    pub fn latest(&self) -> Option<&Notification> {
        self.items.back()
    }

    /// Notifications newer than `seq`.
    pub fn since(&self, seq: u64) -> impl Iterator<Item = &Notification> {
        self.items.iter().filter(move |n| n.seq > seq)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MonitorOptions {
    pub detector: DetectorOptions,
    pub presence: PresenceTimings,
    pub auto_open: bool,
    /// Pause after auto-creating the surface before replaying the run into it.
    pub settle_delay: Duration,
    pub default_mode: DisplayMode,
}

impl Default for MonitorOptions {
    fn default() -> Self {
        Self {
            detector: DetectorOptions::default(),
            presence: PresenceTimings::default(),
            auto_open: true,
            settle_delay: Duration::from_millis(100),
            default_mode: DisplayMode::Flow,
        }
    }
}

/// What one tick or ingest did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TickOutcome {
    pub update: Option<StoreUpdate>,
    pub plan: Option<RenderPlan>,
    /// The surface was created by this tick.
    pub opened_surface: bool,
    pub presence_cleared: bool,
}

pub struct Monitor {
    detector: ChangeDetector,
    store: ExecutionStore,
    catalog: SkillCatalog,
    surface: Option<ProjectionSurface>,
    host: Box<dyn SurfaceHost>,
    presence: PresenceSignal,
    notifications: Notifications,
    options: MonitorOptions,
    disposed: bool,
}

impl Monitor {
    /// Start watching `state_path` and pick up whatever record is already there.
    pub fn start(
        state_path: impl Into<PathBuf>,
        catalog: SkillCatalog,
        host: Box<dyn SurfaceHost>,
        options: MonitorOptions,
    ) -> Result<Self> {
        let detector = ChangeDetector::start(state_path, options.detector)?;
        Ok(Self::with_detector(detector, catalog, host, options))
    }

    pub fn with_detector(
        detector: ChangeDetector,
        catalog: SkillCatalog,
        host: Box<dyn SurfaceHost>,
        options: MonitorOptions,
    ) -> Self {
        let mut monitor = Self {
            detector,
            store: ExecutionStore::new(),
            catalog,
            surface: None,
            host,
            presence: PresenceSignal::new(options.presence),
            notifications: Notifications::default(),
            options,
            disposed: false,
        };
        if let Some(record) = monitor.detector.read_if_changed() {
            monitor.ingest(record);
        }
        info!(target: "monitor", path = %monitor.detector.path().display(), "monitor started");
        monitor
    }

    pub const fn state(&self) -> &ExecutionState {
        self.store.state()
    }

    pub const fn store(&self) -> &ExecutionStore {
        &self.store
    }

    pub const fn catalog(&self) -> &SkillCatalog {
        &self.catalog
    }

    pub const fn detector(&self) -> &ChangeDetector {
        &self.detector
    }

    pub const fn surface(&self) -> Option<&ProjectionSurface> {
        self.surface.as_ref()
    }

    pub const fn surface_mut(&mut self) -> Option<&mut ProjectionSurface> {
        self.surface.as_mut()
    }

    pub const fn presence(&self) -> &PresenceSignal {
        &self.presence
    }

    pub const fn notifications(&self) -> &Notifications {
        &self.notifications
    }

    pub fn notify(&mut self, level: NoticeLevel, message: impl Into<String>) {
        let message = message.into();
        match level {
            NoticeLevel::Info => info!(target: "monitor", %message, "notification"),
            NoticeLevel::Warning | NoticeLevel::Error => {
                warn!(target: "monitor", %message, "notification");
            }
        }
        self.notifications.push(level, message);
    }

    pub const fn is_disposed(&self) -> bool {
        self.disposed
    }

    /// Wait up to `timeout` for a change, fold it in, and advance timers.
    pub fn tick(&mut self, timeout: Duration) -> TickOutcome {
        if self.disposed {
            return TickOutcome::default();
        }
        let mut outcome = self
            .detector
            .next_change(timeout)
            .map(|record| self.ingest(record))
            .unwrap_or_default();
        outcome.presence_cleared = self.presence.tick(Instant::now());
        outcome
    }

    /// Fold one record into the store and propagate to presence and surface.
    pub fn ingest(&mut self, record: StateRecord) -> TickOutcome {
        let update = self.store.ingest(record, &self.catalog);
        if update.is_noop() {
            return TickOutcome {
                update: Some(update),
                ..TickOutcome::default()
            };
        }

        if update.is_new_run || update.run_started {
            self.presence.on_run_start();
        }
        self.presence.update(self.store.state(), Instant::now());

        let rebuild = update.is_new_run || update.run_started;
        let mut outcome = TickOutcome::default();
        if self.surface.is_none() && rebuild && self.should_auto_open() {
            outcome.opened_surface = self.auto_open();
        }
        if let Some(surface) = self.surface.as_mut() {
            if surface.follows(self.store.state()) {
                if rebuild {
                    surface.attach_definition(self.store.definition());
                }
                outcome.plan = Some(surface.apply(self.store.state(), rebuild));
            } else {
                trace!(
                    target: "surface",
                    shown = surface.skill_name(),
                    live = %self.store.state().skill_name,
                    "refresh for another skill left the picked one in place"
                );
            }
        }
        outcome.update = Some(update);
        outcome
    }

    fn should_auto_open(&self) -> bool {
        let state = self.store.state();
        self.options.auto_open && !state.is_terminal() && !state.skill_name.is_empty()
    }

    fn auto_open(&mut self) -> bool {
        match self.host.create_surface(self.options.default_mode) {
            Ok(surface) => {
                self.surface = Some(surface);
                // Let the host finish setting the surface up before the replay.
                thread::sleep(self.options.settle_delay);
                debug!(target: "surface", "surface auto-opened for new run");
                true
            }
            Err(err) => {
                self.notify(
                    NoticeLevel::Error,
                    format!("could not open the execution view: {err}"),
                );
                false
            }
        }
    }

    /// The surface, created on first use.
    pub fn ensure_surface(&mut self) -> Result<&mut ProjectionSurface> {
        if self.disposed {
            return Err(SkillViewError::SurfaceUnavailable("monitor disposed".to_string()));
        }
        if self.surface.is_none() {
            match self.host.create_surface(self.options.default_mode) {
                Ok(surface) => self.surface = Some(surface),
                Err(err) => {
                    self.notify(
                        NoticeLevel::Error,
                        format!("could not open the execution view: {err}"),
                    );
                    return Err(err);
                }
            }
        }
        self.surface
            .as_mut()
            .ok_or_else(|| SkillViewError::SurfaceUnavailable("surface missing".to_string()))
    }

    /// Definition-only view of `name`.
    pub fn load_skill(&mut self, name: &str) -> Result<()> {
        let parsed = self.catalog.load(name)?;
        if !parsed.diagnostics.is_empty() {
            self.notify(
                NoticeLevel::Warning,
                format!("{name}: {} step problem(s) skipped or kept", parsed.diagnostics.len()),
            );
        }
        let surface = self.ensure_surface()?;
        surface.load_skill(parsed.definition, parsed.diagnostics);
        Ok(())
    }

    /// Live view for `name`: the current run if it is that skill, else its
    /// definition with every step pending.
    pub fn show_execution(&mut self, name: &str) -> Result<()> {
        if self.store.state().skill_name == name {
            let definition = self.store.definition().cloned();
            let state = self.store.state().clone();
            let surface = self.ensure_surface()?;
            if surface.skill_name() != name {
                surface.select_skill(name);
            }
            surface.attach_definition(definition.as_ref());
            surface.show_execution(&state);
            return Ok(());
        }
        self.load_skill(name)?;
        if let Some(surface) = self.surface.as_mut() {
            surface.set_tab(SurfaceTab::Execution);
        }
        Ok(())
    }

    /// The presence indicator was clicked: show the surface for the current run.
    pub fn activate_presence(&mut self) -> Result<()> {
        self.presence.activate();
        let skill = self.store.state().skill_name.clone();
        if skill.is_empty() {
            self.ensure_surface()?;
            return Ok(());
        }
        self.follow_live()
    }

    /// Show the live run and keep following it across skills.
    pub fn follow_live(&mut self) -> Result<()> {
        let definition = self.store.definition().cloned();
        let state = self.store.state().clone();
        let surface = self.ensure_surface()?;
        surface.follow(&state, definition.as_ref());
        Ok(())
    }

    /// Hand the "request run" action to `trigger` for the displayed skill.
    pub fn request_run(&mut self, trigger: &dyn RunTrigger) -> Result<()> {
        let skill = self
            .surface
            .as_ref()
            .map(|s| s.skill_name().to_string())
            .filter(|name| !name.is_empty())
            .unwrap_or_else(|| self.store.state().skill_name.clone());
        if skill.is_empty() {
            self.notify(NoticeLevel::Warning, "no skill selected to run");
            return Err(SkillViewError::Trigger("no skill selected".to_string()));
        }
        match trigger.trigger(&skill) {
            Ok(()) => {
                self.notify(NoticeLevel::Info, format!("run requested for {skill}"));
                Ok(())
            }
            Err(err) => {
                self.notify(NoticeLevel::Error, format!("run request failed: {err}"));
                Err(err)
            }
        }
    }

    /// Stop watching and drop the surface. Idempotent.
    pub fn dispose(&mut self) {
        if self.disposed {
            return;
        }
        self.disposed = true;
        self.detector.dispose();
        self.surface = None;
        info!(target: "monitor", "monitor disposed");
    }
}

impl Drop for Monitor {
    fn drop(&mut self) {
        self.dispose();
    }
}
