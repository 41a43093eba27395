//! skillview show - Definition-only view of a skill

use clap::Args;
use serde::Serialize;
use tracing::debug;

use crate::app::AppContext;
use crate::cli::output::{HumanLayout, OutputFormat, emit_human, emit_json, join_or_dash, robot_ok};
use crate::error::Result;
use crate::projection::{DisplayMode, ProjectionSurface, StepNode};
use crate::skill::{ParseDiagnostic, SkillDefinition};

#[derive(Args, Debug)]
pub struct ShowArgs {
    /// Skill name
    pub skill: String,

    /// One line per step
    #[arg(long)]
    pub compact: bool,

    /// Include the detail lines of every step
    #[arg(long)]
    pub full: bool,
}

#[derive(Serialize)]
struct ShowOutput<'a> {
    definition: &'a SkillDefinition,
    nodes: &'a [StepNode],
    diagnostics: &'a [ParseDiagnostic],
}

pub fn run(ctx: &AppContext, args: &ShowArgs) -> Result<()> {
    let parsed = ctx.catalog().load(&args.skill)?;
    debug!(
        target: "show",
        skill = %args.skill,
        steps = parsed.definition.steps.len(),
        "skill loaded"
    );

    let mode = if args.compact {
        DisplayMode::Compact
    } else {
        ctx.config.surface.default_mode
    };
    let mut surface = ProjectionSurface::new(mode);
    surface.load_skill(parsed.definition, parsed.diagnostics);

    let Some(definition) = surface.definition() else {
        return Ok(());
    };

    match ctx.output_format {
        OutputFormat::Json => emit_json(&robot_ok(ShowOutput {
            definition,
            nodes: surface.nodes(),
            diagnostics: surface.diagnostics(),
        })),
        OutputFormat::Human => {
            emit_human(human_layout(&surface, definition, args.full));
            Ok(())
        }
    }
}

fn human_layout(
    surface: &ProjectionSurface,
    definition: &SkillDefinition,
    full: bool,
) -> HumanLayout {
    let mut layout = HumanLayout::new();
    layout.title(&definition.name);
    if !definition.description.is_empty() {
        layout.kv("Description", &definition.description);
    }
    layout.kv("Version", definition.version.as_deref().unwrap_or("-"));
    layout.kv("Inputs", &join_or_dash(definition.inputs.iter().map(|i| i.name.as_str())));
    layout.kv("Outputs", &join_or_dash(definition.outputs.iter().map(|o| o.name.as_str())));
    layout.blank();

    layout.section(&format!("Steps ({})", surface.nodes().len()));
    if full {
        for node in surface.nodes() {
            layout.push_line(node.summary_line());
            for detail in node.detail_lines() {
                layout.push_line(format!("    {detail}"));
            }
        }
    } else {
        for line in surface.render_lines() {
            layout.push_line(line);
        }
    }

    if !surface.diagnostics().is_empty() {
        layout.blank().section("Diagnostics");
        for diagnostic in surface.diagnostics() {
            layout.bullet(&diagnostic.to_string());
        }
    }
    layout
}
