//! skillview watch - Full-screen live view

use clap::Args;
use tracing::{info, warn};

use crate::app::AppContext;
use crate::error::Result;
use crate::monitor::{LocalHost, Monitor, NoticeLevel};
use crate::projection::DisplayMode;
use crate::projection::tui::{SkillCursor, run_watch_tui};

#[derive(Args, Debug)]
pub struct WatchArgs {
    /// Open this skill instead of the current run
    #[arg(long, short)]
    pub skill: Option<String>,

    /// Start in compact mode
    #[arg(long)]
    pub compact: bool,
}

pub fn run(ctx: &AppContext, args: &WatchArgs) -> Result<()> {
    let mut options = ctx.config.monitor_options();
    if args.compact {
        options.default_mode = DisplayMode::Compact;
    }
    let trigger = ctx.trigger()?;
    let catalog = ctx.catalog();
    let names = match catalog.list() {
        Ok(entries) => entries.into_iter().map(|entry| entry.name).collect(),
        Err(err) => {
            warn!(target: "skill", error = %err, "could not list skills");
            Vec::new()
        }
    };

    let mut monitor = Monitor::start(ctx.state_file(), catalog, Box::new(LocalHost), options)?;
    monitor.ensure_surface()?;

    let current = match args.skill.as_deref() {
        Some(name) => {
            if let Err(err) = monitor.show_execution(name) {
                monitor.notify(NoticeLevel::Error, format!("{name}: {err}"));
            }
            Some(name.to_string())
        }
        None => {
            monitor.follow_live()?;
            Some(monitor.state().skill_name.clone()).filter(|name| !name.is_empty())
        }
    };

    info!(
        target: "monitor",
        trigger = %trigger.describe(),
        skills = names.len(),
        "watch view starting"
    );
    let cursor = SkillCursor::new(names, current.as_deref());
    let result = run_watch_tui(&mut monitor, trigger.as_ref(), cursor);
    monitor.dispose();
    result
}
