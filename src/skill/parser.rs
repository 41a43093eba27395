use std::collections::{BTreeMap, HashSet};
use std::path::Path;

use serde::Deserialize;
use serde_yaml::{Mapping, Value};
use tracing::debug;

use crate::error::{Result, SkillViewError};

use super::types::{
    OnErrorPolicy, ParseDiagnostic, ParsedSkill, SkillDefinition, SkillInput, SkillOutput,
    StepAction, StepDeclaration, StepDefinition,
};

pub struct SkillParser;

impl SkillParser {
    /// Parse a skill definition, skipping malformed step blocks.
    ///
    /// Only a document without a resolvable name is rejected outright.
    pub fn parse_str(content: &str) -> Result<ParsedSkill> {
        let doc: Value = serde_yaml::from_str(content)
            .map_err(|err| SkillViewError::InvalidSkill(format!("skill parse error: {err}")))?;
        let Value::Mapping(root) = doc else {
            return Err(SkillViewError::InvalidSkill(
                "skill definition must be a mapping".to_string(),
            ));
        };

        let name = root
            .get("name")
            .and_then(scalar_to_string)
            .map(|name| name.trim().to_string())
            .filter(|name| !name.is_empty())
            .ok_or_else(|| SkillViewError::InvalidSkill("skill name is required".to_string()))?;

        let mut diagnostics = Vec::new();

        let description = root
            .get("description")
            .and_then(scalar_to_string)
            .unwrap_or_default();

        let version = root.get("version").and_then(scalar_to_string);
        if let Some(version) = &version {
            if semver::Version::parse(version).is_err() {
                diagnostics.push(ParseDiagnostic::skill(format!(
                    "version `{version}` is not a semantic version"
                )));
            }
        }

        let inputs = parse_inputs(root.get("inputs"), &mut diagnostics);
        let steps = parse_steps(root.get("steps"), &mut diagnostics);
        let outputs = parse_outputs(root.get("outputs"), &mut diagnostics);

        debug!(
            target: "skill",
            skill = %name,
            steps = steps.len(),
            skipped = diagnostics.iter().filter(|d| d.step_index.is_some()).count(),
            "parsed skill definition"
        );

        Ok(ParsedSkill {
            definition: SkillDefinition {
                name,
                description,
                version,
                inputs,
                steps,
                outputs,
            },
            diagnostics,
        })
    }

    /// Strict variant of [`Self::parse_str`] that drops the diagnostics.
    pub fn parse(content: &str) -> Result<SkillDefinition> {
        Self::parse_str(content).map(|parsed| parsed.definition)
    }

    pub fn parse_path(path: &Path) -> Result<ParsedSkill> {
        let content = std::fs::read_to_string(path).map_err(|err| {
            SkillViewError::InvalidSkill(format!("read skill {}: {err}", path.display()))
        })?;
        Self::parse_str(&content).map_err(|err| match err {
            SkillViewError::InvalidSkill(message) => {
                SkillViewError::InvalidSkill(format!("{} ({})", message, path.display()))
            }
            other => other,
        })
    }
}

#[derive(Debug, Deserialize)]
struct RawInput {
    name: Option<String>,
    #[serde(rename = "type", default)]
    input_type: Option<String>,
    #[serde(default)]
    required: bool,
    #[serde(default)]
    default: Option<Value>,
    #[serde(default)]
    description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawStep {
    #[serde(default)]
    name: Option<Value>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default, alias = "action")]
    tool: Option<String>,
    #[serde(default)]
    compute: Option<Value>,
    #[serde(default)]
    code: Option<String>,
    #[serde(default, alias = "with", alias = "params")]
    args: Option<Mapping>,
    #[serde(default, alias = "if", alias = "when")]
    condition: Option<Value>,
    #[serde(default, rename = "onError", alias = "on_error")]
    on_error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawOutput {
    name: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    value: Option<Value>,
}

fn parse_inputs(
    section: Option<&Value>,
    diagnostics: &mut Vec<ParseDiagnostic>,
) -> Vec<SkillInput> {
    let mut inputs = Vec::new();
    for (position, entry) in section_entries(section, "inputs", diagnostics) {
        let raw: RawInput = match serde_yaml::from_value(entry) {
            Ok(raw) => raw,
            Err(err) => {
                diagnostics.push(ParseDiagnostic::skill(format!(
                    "input #{}: skipped malformed entry: {err}",
                    position + 1
                )));
                continue;
            }
        };
        let Some(name) = raw.name.filter(|n| !n.trim().is_empty()) else {
            diagnostics.push(ParseDiagnostic::skill(format!(
                "input #{}: skipped entry without a name",
                position + 1
            )));
            continue;
        };
        inputs.push(SkillInput {
            name,
            input_type: raw.input_type.unwrap_or_else(|| "string".to_string()),
            required: raw.required,
            default: raw.default,
            description: raw.description,
        });
    }
    inputs
}

fn parse_steps(
    section: Option<&Value>,
    diagnostics: &mut Vec<ParseDiagnostic>,
) -> Vec<StepDefinition> {
    if section.is_none() {
        diagnostics.push(ParseDiagnostic::skill("skill declares no steps"));
        return Vec::new();
    }

    let mut steps: Vec<StepDefinition> = Vec::new();
    let mut seen = HashSet::new();
    for (position, entry) in section_entries(section, "steps", diagnostics) {
        match parse_step(entry) {
            Ok(declaration) => {
                if !seen.insert(declaration.name.clone()) {
                    diagnostics.push(ParseDiagnostic::step(
                        position,
                        format!("duplicate step name `{}`", declaration.name),
                    ));
                    continue;
                }
                if let Some(OnErrorPolicy::Other(token)) = &declaration.on_error {
                    diagnostics.push(ParseDiagnostic::step(
                        position,
                        format!("unknown onError policy `{token}`"),
                    ));
                }
                steps.push(StepDefinition::new(declaration));
            }
            Err(message) => diagnostics.push(ParseDiagnostic::step(position, message)),
        }
    }
    steps
}

fn parse_step(entry: Value) -> std::result::Result<StepDeclaration, String> {
    if !entry.is_mapping() {
        return Err("skipped step that is not a mapping".to_string());
    }
    let raw: RawStep =
        serde_yaml::from_value(entry).map_err(|err| format!("skipped malformed step: {err}"))?;

    let name = raw
        .name
        .as_ref()
        .and_then(scalar_to_string)
        .map(|name| name.trim().to_string())
        .filter(|name| !name.is_empty())
        .ok_or_else(|| "skipped step without a name".to_string())?;

    let inline = inline_marker(raw.compute.as_ref(), raw.code.as_deref());
    let action = match (raw.tool, inline) {
        (Some(tool), None) if !tool.trim().is_empty() => StepAction::Tool {
            name: tool.trim().to_string(),
        },
        (None, Some(expression)) => StepAction::Inline { expression },
        (Some(_), Some(_)) => {
            return Err(format!(
                "skipped step `{name}`: declares both a tool and an inline computation"
            ));
        }
        _ => {
            return Err(format!("skipped step `{name}`: no tool or inline computation"));
        }
    };

    let args = raw
        .args
        .unwrap_or_default()
        .into_iter()
        .filter_map(|(key, value)| scalar_to_string(&key).map(|key| (key, value)))
        .collect::<BTreeMap<_, _>>();

    Ok(StepDeclaration {
        name,
        description: raw.description,
        action,
        args,
        condition: raw.condition.as_ref().and_then(scalar_to_string),
        on_error: raw.on_error.as_deref().map(OnErrorPolicy::parse),
    })
}

/// `compute: true`, `compute: "<expr>"` and `code: "<expr>"` all mark an inline step.
fn inline_marker(compute: Option<&Value>, code: Option<&str>) -> Option<Option<String>> {
    if let Some(code) = code {
        return Some(Some(code.to_string()));
    }
    match compute? {
        Value::Bool(false) | Value::Null => None,
        Value::Bool(true) => Some(None),
        other => Some(scalar_to_string(other)),
    }
}

fn parse_outputs(
    section: Option<&Value>,
    diagnostics: &mut Vec<ParseDiagnostic>,
) -> Vec<SkillOutput> {
    let mut outputs = Vec::new();
    for (position, entry) in section_entries(section, "outputs", diagnostics) {
        match serde_yaml::from_value::<RawOutput>(entry) {
            Ok(RawOutput {
                name: Some(name),
                description,
                value,
            }) if !name.trim().is_empty() => outputs.push(SkillOutput {
                name,
                description,
                value: value.as_ref().and_then(scalar_to_string),
            }),
            Ok(_) => diagnostics.push(ParseDiagnostic::skill(format!(
                "output #{}: skipped entry without a name",
                position + 1
            ))),
            Err(err) => diagnostics.push(ParseDiagnostic::skill(format!(
                "output #{}: skipped malformed entry: {err}",
                position + 1
            ))),
        }
    }
    outputs
}

/// Flatten a section into ordered entries.
///
/// Sections may be a sequence of mappings or a mapping keyed by name; in the
/// latter case the key is injected as `name` and a scalar body is read as the
/// entry's `type` (inputs) or `value` (outputs) shorthand.
fn section_entries(
    section: Option<&Value>,
    label: &str,
    diagnostics: &mut Vec<ParseDiagnostic>,
) -> Vec<(usize, Value)> {
    match section {
        None | Some(Value::Null) => Vec::new(),
        Some(Value::Sequence(items)) => items.iter().cloned().enumerate().collect(),
        Some(Value::Mapping(map)) => map
            .iter()
            .enumerate()
            .map(|(position, (key, body))| {
                let mut entry = match body {
                    Value::Mapping(inner) => inner.clone(),
                    Value::Null => Mapping::new(),
                    scalar => {
                        let mut inner = Mapping::new();
                        let field = if label == "inputs" { "type" } else { "value" };
                        inner.insert(Value::from(field), scalar.clone());
                        inner
                    }
                };
                if !entry.contains_key("name") {
                    entry.insert(Value::from("name"), key.clone());
                }
                (position, Value::Mapping(entry))
            })
            .collect(),
        Some(_) => {
            diagnostics.push(ParseDiagnostic::skill(format!(
                "`{label}` must be a list or mapping; section ignored"
            )));
            Vec::new()
        }
    }
}

fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}
