//! skillview tail - Headless live mode
//!
//! Follows the state record and prints the presence label, step patches and
//! notifications as they happen.

use std::time::Duration;

use clap::Args;
use serde::Serialize;
use tracing::info;

use crate::app::AppContext;
use crate::cli::output::{OutputFormat, emit_json_line, step_status_style, tone_style};
use crate::error::Result;
use crate::monitor::{LocalHost, Monitor, Notification};
use crate::projection::{PresenceLabel, RenderPlan, StepNode};

const TICK: Duration = Duration::from_millis(250);

#[derive(Args, Debug)]
pub struct TailArgs {
    /// Exit once the followed run reaches success or failed
    #[arg(long)]
    pub exit_on_complete: bool,
}

#[derive(Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
enum TailLine<'a> {
    Label { label: Option<&'a PresenceLabel> },
    Rebuild { skill: &'a str, steps: &'a [StepNode] },
    Step { step: &'a StepNode },
    Notice { notice: &'a Notification },
}

pub fn run(ctx: &AppContext, args: &TailArgs) -> Result<()> {
    let mut options = ctx.config.monitor_options();
    options.settle_delay = Duration::ZERO;
    let mut monitor =
        Monitor::start(ctx.state_file(), ctx.catalog(), Box::new(LocalHost), options)?;
    info!(target: "monitor", path = %ctx.state_file().display(), "tailing state record");

    let definition = monitor.store().definition().cloned();
    let state = monitor.state().clone();
    let surface = monitor.ensure_surface()?;
    surface.attach_definition(definition.as_ref());
    surface.show_execution(&state);

    let mut printer = TailPrinter::new(ctx.output_format);
    printer.rebuild(&monitor)?;
    printer.label(&monitor)?;

    let mut seen_running = !monitor.state().is_terminal() && !monitor.state().skill_name.is_empty();
    loop {
        let outcome = monitor.tick(TICK);
        match outcome.plan {
            Some(RenderPlan::FullRebuild) => printer.rebuild(&monitor)?,
            Some(RenderPlan::PatchSteps(indices)) => printer.patches(&monitor, &indices)?,
            None => {}
        }
        printer.label(&monitor)?;
        printer.notices(&monitor)?;

        let state = monitor.state();
        if !state.is_terminal() && !state.skill_name.is_empty() {
            seen_running = true;
        }
        if args.exit_on_complete && seen_running && state.is_terminal() {
            break;
        }
    }
    monitor.dispose();
    Ok(())
}

struct TailPrinter {
    format: OutputFormat,
    last_label: Option<Option<PresenceLabel>>,
    last_notice: u64,
}

impl TailPrinter {
    const fn new(format: OutputFormat) -> Self {
        Self {
            format,
            last_label: None,
            last_notice: 0,
        }
    }

    fn label(&mut self, monitor: &Monitor) -> Result<()> {
        let label = monitor.presence().label().cloned();
        if self.last_label.as_ref() == Some(&label) {
            return Ok(());
        }
        match self.format {
            OutputFormat::Json => emit_json_line(&TailLine::Label { label: label.as_ref() })?,
            OutputFormat::Human => match &label {
                Some(label) => println!("{}", tone_style(label.tone).apply_to(&label.text)),
                None => println!("(idle)"),
            },
        }
        self.last_label = Some(label);
        Ok(())
    }

    fn rebuild(&mut self, monitor: &Monitor) -> Result<()> {
        let Some(surface) = monitor.surface() else {
            return Ok(());
        };
        if surface.skill_name().is_empty() {
            return Ok(());
        }
        match self.format {
            OutputFormat::Json => emit_json_line(&TailLine::Rebuild {
                skill: surface.skill_name(),
                steps: surface.nodes(),
            }),
            OutputFormat::Human => {
                println!("== {} ({} steps)", surface.skill_name(), surface.nodes().len());
                for node in surface.nodes() {
                    print_node(node);
                }
                Ok(())
            }
        }
    }

    fn patches(&mut self, monitor: &Monitor, indices: &[usize]) -> Result<()> {
        let Some(surface) = monitor.surface() else {
            return Ok(());
        };
        for node in indices.iter().filter_map(|i| surface.nodes().get(*i)) {
            match self.format {
                OutputFormat::Json => emit_json_line(&TailLine::Step { step: node })?,
                OutputFormat::Human => print_node(node),
            }
        }
        Ok(())
    }

    fn notices(&mut self, monitor: &Monitor) -> Result<()> {
        for notice in monitor.notifications().since(self.last_notice) {
            match self.format {
                OutputFormat::Json => emit_json_line(&TailLine::Notice { notice })?,
                OutputFormat::Human => eprintln!("[{:?}] {}", notice.level, notice.message),
            }
            self.last_notice = notice.seq;
        }
        Ok(())
    }
}

fn print_node(node: &StepNode) {
    let line = node.summary_line();
    println!("  {}", step_status_style(node.runtime.status).apply_to(line));
}
