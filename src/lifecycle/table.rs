//! Pattern tables driving lifecycle classification.
//!
//! Each rule maps one tag to the substrings that trigger it and the step
//! field they are matched against. Matching is case-insensitive substring
//! containment. Extending the classifier means adding a row, not a branch.

use serde::Serialize;

/// Structural behaviours a step can be tagged with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleTag {
    MemoryRead,
    MemoryWrite,
    SemanticSearch,
    AutoRemediation,
    Retryable,
}

/// Which part of a step a rule inspects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchField {
    /// The tool name, lowercased.
    Action,
    /// Step name and description, lowercased.
    NameOrDescription,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MatchRule {
    pub tag: LifecycleTag,
    pub field: MatchField,
    pub patterns: Vec<String>,
}

impl MatchRule {
    pub fn new(tag: LifecycleTag, field: MatchField, patterns: &[&str]) -> Self {
        Self {
            tag,
            field,
            patterns: patterns.iter().map(|p| p.to_lowercase()).collect(),
        }
    }

    /// First pattern contained in `haystack`, which must already be lowercase.
    pub fn first_match(&self, haystack: &str) -> Option<&str> {
        self.patterns
            .iter()
            .map(String::as_str)
            .find(|pattern| haystack.contains(pattern))
    }
}

const MEMORY_READ_ACTIONS: &[&str] = &[
    "memory_read",
    "memory_get",
    "memory_recall",
    "memory_load",
    "memory_list",
    "memory_fetch",
    "recall",
];

const MEMORY_WRITE_ACTIONS: &[&str] = &[
    "memory_write",
    "memory_store",
    "memory_save",
    "memory_put",
    "memory_record",
    "memory_update",
    "remember",
];

const SEMANTIC_SEARCH_ACTIONS: &[&str] = &[
    "semantic_search",
    "memory_search",
    "vector_search",
    "similarity_search",
    "embedding",
    "knn",
];

const REMEDIATION_WORDS: &[&str] = &[
    "retry",
    "heal",
    "fix",
    "recover",
    "fallback",
    "remediat",
    "rollback",
    "repair",
];

/// Actions that record a learned fix; invoking one is remediation by definition.
const RECORD_FIX_ACTIONS: &[&str] = &[
    "memory_record_fix",
    "record_learned_fix",
    "record_fix",
    "learn_fix",
];

/// Integration namespaces whose calls are safe to repeat.
const IDEMPOTENT_NAMESPACES: &[&str] = &[
    "github",
    "gitlab",
    "bitbucket",
    "jira",
    "linear",
    "confluence",
    "notion",
    "slack",
    "teams",
    "pagerduty",
    "kubernetes",
    "k8s",
    "docker",
    "http",
];

/// Separators allowed between a namespace and the rest of a tool name.
pub const NAMESPACE_SEPARATORS: &[char] = &['_', '.', '/', ':', '-'];

/// Argument keys consulted, in order, when inferring a memory key.
pub const MEMORY_KEY_ARGS: &[&str] = &[
    "key",
    "memory_key",
    "memorykey",
    "namespace",
    "query",
    "collection",
    "topic",
];

/// The complete data table consumed by [`super::Classifier`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClassifierTable {
    pub rules: Vec<MatchRule>,
    pub record_fix_actions: Vec<String>,
    pub idempotent_namespaces: Vec<String>,
}

impl Default for ClassifierTable {
    fn default() -> Self {
        Self {
            rules: vec![
                MatchRule::new(LifecycleTag::MemoryRead, MatchField::Action, MEMORY_READ_ACTIONS),
                MatchRule::new(
                    LifecycleTag::MemoryWrite,
                    MatchField::Action,
                    MEMORY_WRITE_ACTIONS,
                ),
                MatchRule::new(
                    LifecycleTag::SemanticSearch,
                    MatchField::Action,
                    SEMANTIC_SEARCH_ACTIONS,
                ),
                MatchRule::new(
                    LifecycleTag::AutoRemediation,
                    MatchField::NameOrDescription,
                    REMEDIATION_WORDS,
                ),
            ],
            record_fix_actions: RECORD_FIX_ACTIONS.iter().map(|s| (*s).to_string()).collect(),
            idempotent_namespaces: IDEMPOTENT_NAMESPACES
                .iter()
                .map(|s| (*s).to_string())
                .collect(),
        }
    }
}

impl ClassifierTable {
    /// Add a pattern to the rule for `tag` on `field`, creating the rule if absent.
    #[must_use]
    pub fn with_pattern(mut self, tag: LifecycleTag, field: MatchField, pattern: &str) -> Self {
        let pattern = pattern.to_lowercase();
        match self
            .rules
            .iter_mut()
            .find(|rule| rule.tag == tag && rule.field == field)
        {
            Some(rule) => rule.patterns.push(pattern),
            None => self.rules.push(MatchRule {
                tag,
                field,
                patterns: vec![pattern],
            }),
        }
        self
    }

    #[must_use]
    pub fn with_idempotent_namespace(mut self, namespace: &str) -> Self {
        self.idempotent_namespaces.push(namespace.to_lowercase());
        self
    }

    pub fn rules_for(&self, tag: LifecycleTag) -> impl Iterator<Item = &MatchRule> {
        self.rules.iter().filter(move |rule| rule.tag == tag)
    }

    pub fn is_record_fix_action(&self, action: &str) -> bool {
        self.record_fix_actions.iter().any(|known| known == action)
    }

    /// True when `action` is `<namespace><separator>...` or exactly `<namespace>`.
    pub fn in_idempotent_namespace(&self, action: &str) -> bool {
        self.idempotent_namespaces.iter().any(|namespace| {
            action.strip_prefix(namespace.as_str()).is_some_and(|rest| {
                rest.is_empty() || rest.starts_with(NAMESPACE_SEPARATORS)
            })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn namespace_requires_separator() {
        let table = ClassifierTable::default();
        assert!(table.in_idempotent_namespace("github_create_pr"));
        assert!(table.in_idempotent_namespace("k8s.rollout"));
        assert!(table.in_idempotent_namespace("http"));
        assert!(!table.in_idempotent_namespace("githubby_thing"));
        assert!(!table.in_idempotent_namespace("shell_exec"));
    }

    #[test]
    fn with_pattern_extends_existing_rule() {
        let table = ClassifierTable::default().with_pattern(
            LifecycleTag::MemoryRead,
            MatchField::Action,
            "KV_GET",
        );
        let rule = table
            .rules_for(LifecycleTag::MemoryRead)
            .next()
            .expect("memory read rule");
        assert_eq!(rule.first_match("kv_get_value"), Some("kv_get"));
        assert_eq!(table.rules_for(LifecycleTag::MemoryRead).count(), 1);
    }

    #[test]
    fn with_pattern_creates_missing_rule() {
        let table = ClassifierTable::default().with_pattern(
            LifecycleTag::SemanticSearch,
            MatchField::NameOrDescription,
            "lookup similar",
        );
        assert_eq!(table.rules_for(LifecycleTag::SemanticSearch).count(), 2);
    }
}
