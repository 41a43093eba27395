//! What the user sees of a run.
//!
//! - [`plan`]: pure rebuild-or-patch decision between two states
//! - [`surface`]: step nodes and view state
//! - [`presence`]: compact status indicator with auto-clear
//! - [`tui`]: full-screen terminal drawing and key handling

pub mod plan;
pub mod presence;
pub mod surface;
pub mod tui;

pub use plan::{RenderPlan, plan_render, step_differs};
pub use presence::{PresenceLabel, PresenceSignal, PresenceTimings, Tone, label_for};
pub use surface::{DisplayMode, ProjectionSurface, StepNode, SurfaceTab, ViewState, status_icon};
