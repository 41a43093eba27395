use chrono::{DateTime, Utc};
use console::{Style, style};
use itertools::Itertools;
use serde::Serialize;

use crate::error::{Result, SkillViewError};
use crate::execution::StepStatus;
use crate::projection::Tone;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Human,
    Json,
}

#[derive(Serialize)]
pub struct RobotResponse<T> {
    pub status: &'static str,
    pub timestamp: DateTime<Utc>,
    pub version: String,
    pub data: T,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

pub fn robot_ok<T: Serialize>(data: T) -> RobotResponse<T> {
    RobotResponse {
        status: "ok",
        timestamp: Utc::now(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        data,
        warnings: Vec::new(),
    }
}

pub fn robot_ok_with_warnings<T: Serialize>(data: T, warnings: Vec<String>) -> RobotResponse<T> {
    RobotResponse {
        warnings,
        ..robot_ok(data)
    }
}

pub fn emit_json<T: Serialize>(value: &T) -> Result<()> {
    let payload = serde_json::to_string_pretty(value)
        .map_err(|err| SkillViewError::Serialization(format!("serialize output: {err}")))?;
    println!("{payload}");
    Ok(())
}

/// One compact JSON object per line, for `tail --robot`.
pub fn emit_json_line<T: Serialize>(value: &T) -> Result<()> {
    let payload = serde_json::to_string(value)
        .map_err(|err| SkillViewError::Serialization(format!("serialize output: {err}")))?;
    println!("{payload}");
    Ok(())
}

pub struct HumanLayout {
    lines: Vec<String>,
    key_width: usize,
}

impl Default for HumanLayout {
    fn default() -> Self {
        Self::new()
    }
}

impl HumanLayout {
    pub fn new() -> Self {
        Self {
            lines: Vec::new(),
            key_width: 14,
        }
    }

    pub fn title(&mut self, text: &str) -> &mut Self {
        self.lines.push(style(text).bold().to_string());
        self.lines.push(String::new());
        self
    }

    pub fn section(&mut self, text: &str) -> &mut Self {
        self.lines.push(style(text).bold().to_string());
        self.lines.push("-".repeat(text.chars().count().max(3)));
        self
    }

    pub fn kv(&mut self, key: &str, value: &str) -> &mut Self {
        let padded = format!("{key:width$}", width = self.key_width);
        self.lines.push(format!("{} {value}", style(padded).dim()));
        self
    }

    pub fn bullet(&mut self, text: &str) -> &mut Self {
        self.lines.push(format!("- {text}"));
        self
    }

    pub fn blank(&mut self) -> &mut Self {
        self.lines.push(String::new());
        self
    }

    pub fn push_line(&mut self, line: impl Into<String>) -> &mut Self {
        self.lines.push(line.into());
        self
    }

    pub fn build(self) -> String {
        self.lines.join("\n")
    }
}

pub fn emit_human(layout: HumanLayout) {
    println!("{}", layout.build());
}

pub fn step_status_style(status: StepStatus) -> Style {
    match status {
        StepStatus::Pending => Style::new().dim(),
        StepStatus::Running => Style::new().yellow().bold(),
        StepStatus::Success => Style::new().green(),
        StepStatus::Failed => Style::new().red().bold(),
        StepStatus::Skipped => Style::new().dim().italic(),
    }
}

pub fn tone_style(tone: Tone) -> Style {
    match tone {
        Tone::Attention => Style::new().yellow().bold(),
        Tone::Success => Style::new().green().bold(),
        Tone::Failure => Style::new().red().bold(),
    }
}

/// `a, b, c`, or `-` when empty.
pub fn join_or_dash<I, S>(items: I) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let joined = items.into_iter().map(|s| s.as_ref().to_string()).join(", ");
    if joined.is_empty() { "-".to_string() } else { joined }
}
