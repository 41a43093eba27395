use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Result, SkillViewError};
use crate::monitor::MonitorOptions;
use crate::projection::{DisplayMode, PresenceTimings};
use crate::watch::{DetectorOptions, WatcherMode};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub paths: PathsConfig,
    #[serde(default)]
    pub watcher: WatcherConfig,
    #[serde(default)]
    pub presence: PresenceConfig,
    #[serde(default)]
    pub surface: SurfaceConfig,
    #[serde(default)]
    pub trigger: TriggerConfig,
}

impl Config {
    pub fn load(explicit_path: Option<&Path>, root: &Path) -> Result<Self> {
        let mut config = Self::default();

        let explicit = explicit_path
            .map(PathBuf::from)
            .or_else(|| std::env::var("SKILLVIEW_CONFIG").ok().map(PathBuf::from));

        if let Some(path) = explicit {
            if let Some(patch) = Self::load_patch(&path)? {
                config.merge_patch(patch);
            }
        } else {
            if let Some(global) = Self::load_global()? {
                config.merge_patch(global);
            }
            if let Some(project) = Self::load_project(root)? {
                config.merge_patch(project);
            }
        }

        config.apply_env_overrides()?;

        Ok(config)
    }

    fn load_global() -> Result<Option<ConfigPatch>> {
        let path = dirs::config_dir()
            .ok_or_else(|| SkillViewError::MissingConfig("config directory not found".to_string()))?
            .join("skillview/config.toml");
        Self::load_patch(&path)
    }

    fn load_project(root: &Path) -> Result<Option<ConfigPatch>> {
        Self::load_patch(&root.join("config.toml"))
    }

    fn load_patch(path: &Path) -> Result<Option<ConfigPatch>> {
        if !path.exists() {
            return Ok(None);
        }

        let raw = std::fs::read_to_string(path)
            .map_err(|err| {
                SkillViewError::Config(format!("read config {}: {err}", path.display()))
            })?;
        let patch = toml::from_str(&raw)
            .map_err(|err| {
                SkillViewError::Config(format!("parse config {}: {err}", path.display()))
            })?;
        Ok(Some(patch))
    }

    /// Parse a full TOML document layered over the defaults.
    pub fn from_toml(raw: &str) -> Result<Self> {
        let patch: ConfigPatch =
            toml::from_str(raw).map_err(|err| {
                SkillViewError::Config(format!("parse config: {err}"))
            })?;
        let mut config = Self::default();
        config.merge_patch(patch);
        Ok(config)
    }

    fn merge_patch(&mut self, patch: ConfigPatch) {
        if let Some(patch) = patch.paths {
            self.paths.merge(patch);
        }
        if let Some(patch) = patch.watcher {
            self.watcher.merge(patch);
        }
        if let Some(patch) = patch.presence {
            self.presence.merge(patch);
        }
        if let Some(patch) = patch.surface {
            self.surface.merge(patch);
        }
        if let Some(patch) = patch.trigger {
            self.trigger.merge(patch);
        }
    }

    fn apply_env_overrides(&mut self) -> Result<()> {
        self.apply_overrides(&|key: &str| std::env::var(key).ok())
    }

    /// Apply `SKILLVIEW_*` overrides read through `env`.
    pub fn apply_overrides(&mut self, env: &dyn Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(value) = env("SKILLVIEW_STATE_FILE") {
            self.paths.state_file = PathBuf::from(value);
        }
        if let Some(value) = env("SKILLVIEW_SKILLS_DIR") {
            self.paths.skills_dir = PathBuf::from(value);
        }
        if let Some(value) = env("SKILLVIEW_WATCHER_MODE") {
            self.watcher.mode = value.parse()?;
        }
        if let Some(ms) = env_u64(env, "SKILLVIEW_POLL_INTERVAL_MS")? {
            self.watcher.poll_interval = Duration::from_millis(ms);
        }
        if let Some(ms) = env_u64(env, "SKILLVIEW_SETTLE_DELAY_MS")? {
            self.watcher.settle_delay = Duration::from_millis(ms);
        }
        if let Some(secs) = env_u64(env, "SKILLVIEW_SUCCESS_CLEAR_SECS")? {
            self.presence.success_clear = Duration::from_secs(secs);
        }
        if let Some(secs) = env_u64(env, "SKILLVIEW_FAILURE_CLEAR_SECS")? {
            self.presence.failure_clear = Duration::from_secs(secs);
        }
        if let Some(value) = env_bool(env, "SKILLVIEW_AUTO_OPEN") {
            self.surface.auto_open = value;
        }
        if let Some(values) = env_list(env, "SKILLVIEW_TRIGGER_COMMAND") {
            self.trigger.command = values;
        }
        Ok(())
    }

    /// `path` as-is when absolute, else relative to `root`.
    pub fn resolve(root: &Path, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            root.join(path)
        }
    }

    pub fn state_file(&self, root: &Path) -> PathBuf {
        Self::resolve(root, &self.paths.state_file)
    }

    pub fn skills_dir(&self, root: &Path) -> PathBuf {
        Self::resolve(root, &self.paths.skills_dir)
    }

    pub fn monitor_options(&self) -> MonitorOptions {
        MonitorOptions {
            detector: DetectorOptions {
                mode: self.watcher.mode,
                poll_interval: self.watcher.poll_interval,
            },
            presence: PresenceTimings {
                success_clear: self.presence.success_clear,
                failure_clear: self.presence.failure_clear,
            },
            auto_open: self.surface.auto_open,
            settle_delay: self.watcher.settle_delay,
            default_mode: self.surface.default_mode,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PathsConfig {
    #[serde(default = "default_state_file")]
    pub state_file: PathBuf,
    #[serde(default = "default_skills_dir")]
    pub skills_dir: PathBuf,
}

fn default_state_file() -> PathBuf {
    PathBuf::from("state/execution-state.json")
}

fn default_skills_dir() -> PathBuf {
    PathBuf::from("skills")
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            state_file: default_state_file(),
            skills_dir: default_skills_dir(),
        }
    }
}

impl PathsConfig {
    fn merge(&mut self, patch: PathsPatch) {
        if let Some(value) = patch.state_file {
            self.state_file = value;
        }
        if let Some(value) = patch.skills_dir {
            self.skills_dir = value;
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WatcherConfig {
    #[serde(default)]
    pub mode: WatcherMode,
    #[serde(default = "default_poll_interval", with = "humantime_serde")]
    pub poll_interval: Duration,
    #[serde(default = "default_settle_delay", with = "humantime_serde")]
    pub settle_delay: Duration,
}

const fn default_poll_interval() -> Duration {
    Duration::from_millis(500)
}

const fn default_settle_delay() -> Duration {
    Duration::from_millis(100)
}

impl Default for WatcherConfig {
    fn default() -> Self {
        Self {
            mode: WatcherMode::Auto,
            poll_interval: default_poll_interval(),
            settle_delay: default_settle_delay(),
        }
    }
}

impl WatcherConfig {
    fn merge(&mut self, patch: WatcherPatch) {
        if let Some(value) = patch.mode {
            self.mode = value;
        }
        if let Some(value) = patch.poll_interval {
            self.poll_interval = value;
        }
        if let Some(value) = patch.settle_delay {
            self.settle_delay = value;
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PresenceConfig {
    #[serde(default = "default_success_clear", with = "humantime_serde")]
    pub success_clear: Duration,
    #[serde(default = "default_failure_clear", with = "humantime_serde")]
    pub failure_clear: Duration,
}

const fn default_success_clear() -> Duration {
    Duration::from_secs(5)
}

const fn default_failure_clear() -> Duration {
    Duration::from_secs(10)
}

impl Default for PresenceConfig {
    fn default() -> Self {
        Self {
            success_clear: default_success_clear(),
            failure_clear: default_failure_clear(),
        }
    }
}

impl PresenceConfig {
    fn merge(&mut self, patch: PresencePatch) {
        if let Some(value) = patch.success_clear {
            self.success_clear = value;
        }
        if let Some(value) = patch.failure_clear {
            self.failure_clear = value;
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SurfaceConfig {
    #[serde(default = "default_true")]
    pub auto_open: bool,
    #[serde(default)]
    pub default_mode: DisplayMode,
}

const fn default_true() -> bool {
    true
}

impl Default for SurfaceConfig {
    fn default() -> Self {
        Self {
            auto_open: true,
            default_mode: DisplayMode::Flow,
        }
    }
}

impl SurfaceConfig {
    fn merge(&mut self, patch: SurfacePatch) {
        if let Some(value) = patch.auto_open {
            self.auto_open = value;
        }
        if let Some(value) = patch.default_mode {
            self.default_mode = value;
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TriggerConfig {
    /// Program and arguments; the skill name is appended. Empty disables run requests.
    #[serde(default)]
    pub command: Vec<String>,
}

impl TriggerConfig {
    fn merge(&mut self, patch: TriggerPatch) {
        if let Some(values) = patch.command {
            self.command = values;
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
struct ConfigPatch {
    pub paths: Option<PathsPatch>,
    pub watcher: Option<WatcherPatch>,
    pub presence: Option<PresencePatch>,
    pub surface: Option<SurfacePatch>,
    pub trigger: Option<TriggerPatch>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct PathsPatch {
    pub state_file: Option<PathBuf>,
    pub skills_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct WatcherPatch {
    pub mode: Option<WatcherMode>,
    #[serde(default, with = "humantime_serde")]
    pub poll_interval: Option<Duration>,
    #[serde(default, with = "humantime_serde")]
    pub settle_delay: Option<Duration>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct PresencePatch {
    #[serde(default, with = "humantime_serde")]
    pub success_clear: Option<Duration>,
    #[serde(default, with = "humantime_serde")]
    pub failure_clear: Option<Duration>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct SurfacePatch {
    pub auto_open: Option<bool>,
    pub default_mode: Option<DisplayMode>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct TriggerPatch {
    pub command: Option<Vec<String>>,
}

fn env_bool(env: &dyn Fn(&str) -> Option<String>, key: &str) -> Option<bool> {
    env(key).map(|value| matches!(value.to_lowercase().as_str(), "1" | "true" | "yes" | "on"))
}

fn env_u64(env: &dyn Fn(&str) -> Option<String>, key: &str) -> Result<Option<u64>> {
    match env(key) {
        Some(value) => value
            .trim()
            .parse::<u64>()
            .map(Some)
            .map_err(|err| SkillViewError::Config(format!("invalid {key} value {value}: {err}"))),
        None => Ok(None),
    }
}

fn env_list(env: &dyn Fn(&str) -> Option<String>, key: &str) -> Option<Vec<String>> {
    env(key).map(|value| {
        value
            .split(',')
            .map(str::trim)
            .filter(|entry| !entry.is_empty())
            .map(str::to_string)
            .collect()
    })
}
