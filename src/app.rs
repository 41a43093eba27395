use std::path::{Path, PathBuf};

use crate::cli::OutputFormat;
use crate::config::Config;
use crate::error::{Result, SkillViewError};
use crate::skill::SkillCatalog;
use crate::trigger::{self, RunTrigger};

pub struct AppContext {
    pub root: PathBuf,
    pub config_path: PathBuf,
    pub config: Config,
    pub robot_mode: bool,
    pub output_format: OutputFormat,
    pub verbosity: u8,
}

impl AppContext {
    pub fn from_cli(cli: &crate::cli::Cli) -> Result<Self> {
        let root = find_root()?;
        let config_path = cli
            .config
            .clone()
            .unwrap_or_else(|| default_config_path(&root));
        let config = Config::load(cli.config.as_deref(), &root)?;

        Ok(Self {
            root,
            config_path,
            config,
            robot_mode: cli.robot,
            output_format: cli.output_format(),
            verbosity: cli.verbose,
        })
    }

    /// Context over an explicit root, used by tests and embedders.
    pub fn with_root(root: impl Into<PathBuf>, config: Config) -> Self {
        let root = root.into();
        Self {
            config_path: root.join("config.toml"),
            root,
            config,
            robot_mode: false,
            output_format: OutputFormat::Human,
            verbosity: 0,
        }
    }

    pub fn state_file(&self) -> PathBuf {
        self.config.state_file(&self.root)
    }

    pub fn skills_dir(&self) -> PathBuf {
        self.config.skills_dir(&self.root)
    }

    pub fn catalog(&self) -> SkillCatalog {
        SkillCatalog::new(self.skills_dir())
    }

    pub fn trigger(&self) -> Result<Box<dyn RunTrigger>> {
        trigger::from_command(&self.config.trigger.command)
    }

    pub fn log_dir(&self) -> PathBuf {
        self.root.join("logs")
    }
}

/// `SKILLVIEW_ROOT`, else the nearest `.skillview` directory upwards, else the data dir.
pub fn find_root() -> Result<PathBuf> {
    if let Ok(root) = std::env::var("SKILLVIEW_ROOT") {
        return Ok(PathBuf::from(root));
    }
    let cwd = std::env::current_dir()?;
    if let Some(found) = find_upwards(&cwd, ".skillview")? {
        return Ok(found);
    }

    let data_dir = dirs::data_dir()
        .ok_or_else(|| SkillViewError::MissingConfig("data directory not found".to_string()))?;
    Ok(data_dir.join("skillview"))
}

fn default_config_path(root: &Path) -> PathBuf {
    if root.ends_with(".skillview") {
        root.join("config.toml")
    } else {
        dirs::config_dir()
            .unwrap_or_else(|| root.to_path_buf())
            .join("skillview/config.toml")
    }
}

fn find_upwards(start: &Path, name: &str) -> Result<Option<PathBuf>> {
    let mut current = Some(start);
    while let Some(dir) = current {
        let candidate = dir.join(name);
        if candidate.is_dir() {
            return Ok(Some(candidate));
        }
        current = dir.parent();
    }
    Ok(None)
}
