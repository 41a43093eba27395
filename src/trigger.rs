//! Hand-off of the "request run" action to an external runner.

use std::process::{Command, Stdio};

use tracing::info;

use crate::error::{Result, SkillViewError};

pub trait RunTrigger {
    /// Human description for notifications, e.g. the command line.
    fn describe(&self) -> String;

    /// Ask the external runner to start `skill`. Does not wait for the run.
    fn trigger(&self, skill: &str) -> Result<()>;
}

/// Runs a configured command with the skill name appended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandTrigger {
    argv: Vec<String>,
}

impl CommandTrigger {
    pub fn new(argv: Vec<String>) -> Result<Self> {
        if argv.first().is_none_or(|program| program.trim().is_empty()) {
            return Err(SkillViewError::Config("trigger.command is empty".to_string()));
        }
        Ok(Self { argv })
    }

    pub fn argv(&self) -> &[String] {
        &self.argv
    }
}

impl RunTrigger for CommandTrigger {
    fn describe(&self) -> String {
        self.argv.join(" ")
    }

    fn trigger(&self, skill: &str) -> Result<()> {
        let (program, args) = self
            .argv
            .split_first()
            .ok_or_else(|| SkillViewError::Trigger("trigger command is empty".to_string()))?;
        let child = Command::new(program)
            .args(args)
            .arg(skill)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|err| SkillViewError::Trigger(format!("spawn {program}: {err}")))?;
        info!(target: "monitor", skill, pid = child.id(), "run trigger spawned");
        Ok(())
    }
}

/// Used when no trigger command is configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoTrigger;

impl RunTrigger for NoTrigger {
    fn describe(&self) -> String {
        "none".to_string()
    }

    fn trigger(&self, _skill: &str) -> Result<()> {
        Err(SkillViewError::Trigger(
            "no run trigger configured (set trigger.command)".to_string(),
        ))
    }
}

/// Trigger for a configured argv; empty means [`NoTrigger`].
pub fn from_command(argv: &[String]) -> Result<Box<dyn RunTrigger>> {
    if argv.is_empty() {
        Ok(Box::new(NoTrigger))
    } else {
        Ok(Box::new(CommandTrigger::new(argv.to_vec())?))
    }
}
