//! skillview list - List skills in the skills directory

use clap::Args;
use serde::Serialize;
use tracing::debug;

use crate::app::AppContext;
use crate::cli::output::{HumanLayout, OutputFormat, emit_human, emit_json, robot_ok_with_warnings};
use crate::error::Result;
use crate::utils::truncate_string;

#[derive(Args, Debug)]
pub struct ListArgs {
    /// Only skills whose name contains this text
    #[arg(long, short)]
    pub filter: Option<String>,

    /// Maximum number of skills to show
    #[arg(long, short = 'n', default_value = "50")]
    pub limit: usize,
}

#[derive(Debug, Serialize)]
struct ListedSkill {
    name: String,
    path: String,
    description: String,
    steps: usize,
    diagnostics: usize,
}

pub fn run(ctx: &AppContext, args: &ListArgs) -> Result<()> {
    let catalog = ctx.catalog();
    debug!(target: "list", root = %catalog.root().display(), "listing skills");

    let mut skills = Vec::new();
    let mut warnings = Vec::new();
    let entries = catalog
        .list()?
        .into_iter()
        .filter(|entry| {
            args.filter
                .as_deref()
                .is_none_or(|needle| entry.name.contains(needle))
        })
        .take(args.limit);

    for entry in entries {
        match catalog.load(&entry.name) {
            Ok(parsed) => skills.push(ListedSkill {
                name: entry.name,
                path: entry.path.display().to_string(),
                description: parsed.definition.description,
                steps: parsed.definition.steps.len(),
                diagnostics: parsed.diagnostics.len(),
            }),
            Err(err) => warnings.push(format!("{}: {err}", entry.name)),
        }
    }

    match ctx.output_format {
        OutputFormat::Json => emit_json(&robot_ok_with_warnings(&skills, warnings)),
        OutputFormat::Human => {
            let mut layout = HumanLayout::new();
            layout.title(&format!("Skills ({})", skills.len()));
            if skills.is_empty() {
                layout.push_line(format!("No skills found in {}", catalog.root().display()));
            }
            for skill in &skills {
                let mut line = format!(
                    "{:<28} {:>3} steps  {}",
                    truncate_string(&skill.name, 28),
                    skill.steps,
                    truncate_string(&skill.description, 48)
                );
                if skill.diagnostics > 0 {
                    line.push_str(&format!("  ({} warnings)", skill.diagnostics));
                }
                layout.push_line(line);
            }
            if !warnings.is_empty() {
                layout.blank().section("Unreadable");
                for warning in &warnings {
                    layout.bullet(warning);
                }
            }
            emit_human(layout);
            Ok(())
        }
    }
}
