//! skillview status - One-shot view of the current or last run

use clap::Args;
use serde::Serialize;
use tracing::debug;

use crate::app::AppContext;
use crate::cli::output::{
    HumanLayout, OutputFormat, emit_human, emit_json, robot_ok, step_status_style, tone_style,
};
use crate::error::{Result, SkillViewError};
use crate::execution::{DefinitionLookup, ExecutionState, StateRecord, replay};
use crate::projection::{PresenceLabel, label_for, status_icon};
use crate::utils::{elapsed_ms, format_duration_ms, format_timestamp_ms};

#[derive(Args, Debug)]
pub struct StatusArgs {
    /// Also list every step
    #[arg(long, short)]
    pub steps: bool,
}

#[derive(Serialize)]
struct StatusOutput<'a> {
    state_file: String,
    label: Option<PresenceLabel>,
    current: usize,
    total: usize,
    state: &'a ExecutionState,
}

pub fn run(ctx: &AppContext, args: &StatusArgs) -> Result<()> {
    let path = ctx.state_file();
    let record = match StateRecord::read(&path) {
        Ok(record) => record,
        Err(SkillViewError::Io(err)) if err.kind() == std::io::ErrorKind::NotFound => {
            debug!(target: "status", path = %path.display(), "no state record yet");
            StateRecord::default()
        }
        Err(err) => return Err(err),
    };

    let definition = if record.is_idle() {
        None
    } else {
        ctx.catalog().definition(&record.skill_name)
    };
    let state = replay(&record, definition.as_ref());
    let label = label_for(&state);
    let (current, total) = state.progress();

    match ctx.output_format {
        OutputFormat::Json => emit_json(&robot_ok(StatusOutput {
            state_file: path.display().to_string(),
            label,
            current,
            total,
            state: &state,
        })),
        OutputFormat::Human => {
            let mut layout = HumanLayout::new();
            match &label {
                Some(label) => {
                    layout.push_line(tone_style(label.tone).apply_to(&label.text).to_string());
                }
                None => {
                    layout.push_line("No run recorded");
                }
            }
            if let Some(start) = state.start_time {
                layout.kv("Started", &format_timestamp_ms(start));
            }
            if let Some(end) = state.end_time {
                layout.kv("Finished", &format_timestamp_ms(end));
                if let Some(ms) = state.start_time.and_then(|start| elapsed_ms(start, end)) {
                    layout.kv("Took", &format_duration_ms(ms));
                }
            }
            if args.steps && !state.steps.is_empty() {
                layout.blank().section("Steps");
                for (index, step) in state.steps.iter().enumerate() {
                    let icon = step_status_style(step.status).apply_to(status_icon(step.status));
                    let mut line = format!("{icon} {}. {}", index + 1, step.name);
                    if let Some(ms) = step.duration_ms {
                        line.push_str(&format!("  {}", format_duration_ms(ms)));
                    }
                    if let Some(error) = &step.error {
                        line.push_str(&format!("  {error}"));
                    }
                    layout.push_line(line);
                }
            }
            emit_human(layout);
            Ok(())
        }
    }
}
