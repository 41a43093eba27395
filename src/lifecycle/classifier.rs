use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

use crate::skill::{OnErrorPolicy, StepDeclaration};

use super::table::{ClassifierTable, LifecycleTag, MEMORY_KEY_ARGS, MatchField};

/// Structural lifecycle facts for one step. Display-only; never gates execution.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LifecycleTags {
    pub memory_read: Vec<String>,
    pub memory_write: Vec<String>,
    pub semantic_search: Vec<String>,
    pub is_auto_remediation: bool,
    pub can_retry: bool,
}

impl LifecycleTags {
    pub fn has(&self, tag: LifecycleTag) -> bool {
        match tag {
            LifecycleTag::MemoryRead => !self.memory_read.is_empty(),
            LifecycleTag::MemoryWrite => !self.memory_write.is_empty(),
            LifecycleTag::SemanticSearch => !self.semantic_search.is_empty(),
            LifecycleTag::AutoRemediation => self.is_auto_remediation,
            LifecycleTag::Retryable => self.can_retry,
        }
    }

    /// Tags that are set, in a fixed display order.
    pub fn active(&self) -> Vec<LifecycleTag> {
        [
            LifecycleTag::MemoryRead,
            LifecycleTag::MemoryWrite,
            LifecycleTag::SemanticSearch,
            LifecycleTag::AutoRemediation,
            LifecycleTag::Retryable,
        ]
        .into_iter()
        .filter(|tag| self.has(*tag))
        .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.active().is_empty()
    }
}

static DEFAULT_CLASSIFIER: LazyLock<Classifier> = LazyLock::new(Classifier::default);

static TEMPLATE_BRACES: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{\{\s*(.*?)\s*\}\}").expect("valid regex"));

/// Classify a step with the built-in table.
pub fn classify(step: &StepDeclaration) -> LifecycleTags {
    DEFAULT_CLASSIFIER.classify(step)
}

/// Table-driven step classifier. Pure: output depends only on the step.
#[derive(Debug, Clone, Default)]
pub struct Classifier {
    table: ClassifierTable,
}

impl Classifier {
    pub const fn new(table: ClassifierTable) -> Self {
        Self { table }
    }

    pub const fn table(&self) -> &ClassifierTable {
        &self.table
    }

    pub fn classify(&self, step: &StepDeclaration) -> LifecycleTags {
        let action = step.tool_name().unwrap_or_default().to_lowercase();
        let prose = format!(
            "{} {}",
            step.name.to_lowercase(),
            step.description.as_deref().unwrap_or_default().to_lowercase()
        );

        let hit = |tag: LifecycleTag| {
            self.table.rules_for(tag).any(|rule| {
                let haystack = match rule.field {
                    MatchField::Action => action.as_str(),
                    MatchField::NameOrDescription => prose.as_str(),
                };
                !haystack.is_empty() && rule.first_match(haystack).is_some()
            })
        };

        let key = || vec![infer_memory_key(step)];
        let memory_read = if hit(LifecycleTag::MemoryRead) { key() } else { Vec::new() };
        let memory_write = if hit(LifecycleTag::MemoryWrite) { key() } else { Vec::new() };
        let semantic_search = if hit(LifecycleTag::SemanticSearch) {
            key()
        } else {
            Vec::new()
        };

        let is_auto_remediation =
            hit(LifecycleTag::AutoRemediation) || self.table.is_record_fix_action(&action);

        let can_retry = matches!(
            step.on_error,
            Some(OnErrorPolicy::Continue | OnErrorPolicy::Retry)
        ) || (!action.is_empty() && self.table.in_idempotent_namespace(&action));

        LifecycleTags {
            memory_read,
            memory_write,
            semantic_search,
            is_auto_remediation,
            can_retry,
        }
    }
}

/// Best-effort memory key: the first known key-like argument, else the step name.
///
/// Template expressions are reduced to their inner path, so
/// `"{{ inputs.service }}"` becomes `inputs.service`.
pub fn infer_memory_key(step: &StepDeclaration) -> String {
    MEMORY_KEY_ARGS
        .iter()
        .find_map(|wanted| {
            step.args.iter().find_map(|(key, value)| {
                if key.to_lowercase() != *wanted {
                    return None;
                }
                value.as_str().map(str::trim).filter(|v| !v.is_empty())
            })
        })
        .map_or_else(
            || step.name.clone(),
            |raw| TEMPLATE_BRACES.replace_all(raw, "$1").into_owned(),
        )
}
