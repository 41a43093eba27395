use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;

use crate::lifecycle::{self, LifecycleTags};

/// A parsed skill: ordered inputs, steps and outputs.
///
/// Immutable once parsed. Reloading the underlying file produces a new value.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SkillDefinition {
    pub name: String,
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    pub inputs: Vec<SkillInput>,
    pub steps: Vec<StepDefinition>,
    pub outputs: Vec<SkillOutput>,
}

impl SkillDefinition {
    pub fn step(&self, index: usize) -> Option<&StepDefinition> {
        self.steps.get(index)
    }

    pub fn step_index(&self, name: &str) -> Option<usize> {
        self.steps.iter().position(|step| step.name() == name)
    }

    pub fn step_names(&self) -> impl Iterator<Item = &str> {
        self.steps.iter().map(StepDefinition::name)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SkillInput {
    pub name: String,
    #[serde(rename = "type")]
    pub input_type: String,
    pub required: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<serde_yaml::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SkillOutput {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
}

/// What a step does: call a named external action, or run an inline computation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum StepAction {
    Tool { name: String },
    Inline {
        #[serde(skip_serializing_if = "Option::is_none")]
        expression: Option<String>,
    },
}

impl StepAction {
    pub fn tool_name(&self) -> Option<&str> {
        match self {
            Self::Tool { name } => Some(name),
            Self::Inline { .. } => None,
        }
    }

    /// Short label for listings.
    pub fn label(&self) -> &str {
        match self {
            Self::Tool { name } => name,
            Self::Inline { .. } => "inline",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OnErrorPolicy {
    Continue,
    Retry,
    Abort,
    Other(String),
}

impl OnErrorPolicy {
    pub fn parse(token: &str) -> Self {
        match token.trim().to_lowercase().as_str() {
            "continue" | "ignore" => Self::Continue,
            "retry" => Self::Retry,
            "abort" | "fail" | "stop" => Self::Abort,
            other => Self::Other(other.to_string()),
        }
    }

    pub const fn is_known(&self) -> bool {
        !matches!(self, Self::Other(_))
    }
}

impl fmt::Display for OnErrorPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Continue => f.write_str("continue"),
            Self::Retry => f.write_str("retry"),
            Self::Abort => f.write_str("abort"),
            Self::Other(token) => f.write_str(token),
        }
    }
}

/// The declared part of a step, exactly as written in the skill file.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StepDeclaration {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub action: StepAction,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub args: BTreeMap<String, serde_yaml::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub condition: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub on_error: Option<OnErrorPolicy>,
}

impl StepDeclaration {
    pub fn new(name: impl Into<String>, action: StepAction) -> Self {
        Self {
            name: name.into(),
            description: None,
            action,
            args: BTreeMap::new(),
            condition: None,
            on_error: None,
        }
    }

    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    #[must_use]
    pub fn with_arg(mut self, key: impl Into<String>, value: impl Into<serde_yaml::Value>) -> Self {
        self.args.insert(key.into(), value.into());
        self
    }

    #[must_use]
    pub fn with_on_error(mut self, policy: OnErrorPolicy) -> Self {
        self.on_error = Some(policy);
        self
    }

    pub fn tool_name(&self) -> Option<&str> {
        self.action.tool_name()
    }
}

/// A step plus the lifecycle tags derived from it at load time.
///
/// The declaration is only reachable by shared reference, so tags cannot go
/// stale after construction.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StepDefinition {
    #[serde(flatten)]
    declaration: StepDeclaration,
    tags: LifecycleTags,
}

impl StepDefinition {
    pub fn new(declaration: StepDeclaration) -> Self {
        let tags = lifecycle::classify(&declaration);
        Self { declaration, tags }
    }

    pub fn name(&self) -> &str {
        &self.declaration.name
    }

    pub const fn declaration(&self) -> &StepDeclaration {
        &self.declaration
    }

    pub const fn tags(&self) -> &LifecycleTags {
        &self.tags
    }

    pub fn action_label(&self) -> &str {
        self.declaration.action.label()
    }
}

/// A non-fatal problem found while parsing a skill definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ParseDiagnostic {
    /// Position of the offending step block, when the problem is step-local.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub step_index: Option<usize>,
    pub message: String,
}

impl ParseDiagnostic {
    pub fn step(index: usize, message: impl Into<String>) -> Self {
        Self {
            step_index: Some(index),
            message: message.into(),
        }
    }

    pub fn skill(message: impl Into<String>) -> Self {
        Self {
            step_index: None,
            message: message.into(),
        }
    }
}

impl fmt::Display for ParseDiagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.step_index {
            Some(index) => write!(f, "step #{}: {}", index + 1, self.message),
            None => f.write_str(&self.message),
        }
    }
}

/// Result of a tolerant parse: the usable definition plus skipped-block diagnostics.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParsedSkill {
    pub definition: SkillDefinition,
    pub diagnostics: Vec<ParseDiagnostic>,
}
