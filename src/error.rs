use thiserror::Error;

#[derive(Error, Debug)]
pub enum SkillViewError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Missing configuration: {0}")]
    MissingConfig(String),

    #[error("Invalid skill definition: {0}")]
    InvalidSkill(String),

    #[error("Skill not found: {0}")]
    SkillNotFound(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Change watcher unavailable: {0}")]
    Watch(String),

    #[error("Projection surface unavailable: {0}")]
    SurfaceUnavailable(String),

    #[error("Run trigger failed: {0}")]
    Trigger(String),

    #[error("Terminal error: {0}")]
    Terminal(String),
}

impl SkillViewError {
    /// Stable machine-readable code used in robot output.
    pub const fn code(&self) -> &'static str {
        match self {
            Self::Io(_) => "io",
            Self::Config(_) => "config",
            Self::MissingConfig(_) => "missing_config",
            Self::InvalidSkill(_) => "invalid_skill",
            Self::SkillNotFound(_) => "skill_not_found",
            Self::Serialization(_) => "serialization",
            Self::Watch(_) => "watch",
            Self::SurfaceUnavailable(_) => "surface_unavailable",
            Self::Trigger(_) => "trigger",
            Self::Terminal(_) => "terminal",
        }
    }
}

pub type Result<T> = std::result::Result<T, SkillViewError>;
