//! Wire shape of the state record written by the external skill runner.
//!
//! The record is read whole on every change. Every field is optional on the
//! wire so that a producer writing a minimal record still parses; unknown
//! fields are ignored and unknown event types decode as [`EventKind::Unknown`].

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::{Result, SkillViewError};

use super::state::RunStatus;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StateRecord {
    pub skill_name: String,
    #[serde(deserialize_with = "lenient_run_status")]
    pub status: RunStatus,
    pub current_step_index: i64,
    pub total_steps: Option<usize>,
    pub start_time: Option<i64>,
    pub end_time: Option<i64>,
    pub events: Vec<ExecutionEvent>,
}

impl Default for StateRecord {
    fn default() -> Self {
        Self {
            skill_name: String::new(),
            status: RunStatus::Idle,
            current_step_index: -1,
            total_steps: None,
            start_time: None,
            end_time: None,
            events: Vec::new(),
        }
    }
}

impl StateRecord {
    pub fn parse(raw: &str) -> Result<Self> {
        serde_json::from_str(raw)
            .map_err(|err| SkillViewError::Serialization(format!("state record: {err}")))
    }

    pub fn read(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        Self::parse(&raw)
    }

    /// A record that names no run: nothing has executed yet.
    pub fn is_idle(&self) -> bool {
        self.skill_name.is_empty() && self.events.is_empty()
    }

    /// Same run identity as `other`: skill name and start time both match.
    pub fn same_run(&self, other: &Self) -> bool {
        self.skill_name == other.skill_name && self.start_time == other.start_time
    }
}

fn lenient_run_status<'de, D>(deserializer: D) -> std::result::Result<RunStatus, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<String>::deserialize(deserializer)?;
    Ok(match raw.as_deref().map(str::to_ascii_lowercase).as_deref() {
        Some("running" | "started" | "in_progress") => RunStatus::Running,
        Some("success" | "succeeded" | "completed" | "complete") => RunStatus::Success,
        Some("failed" | "failure" | "error") => RunStatus::Failed,
        _ => RunStatus::Idle,
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    RunStart,
    StepStart,
    StepComplete,
    StepFailed,
    StepSkipped,
    RunComplete,
    MemoryRead,
    MemoryWrite,
    AutoHeal,
    Retry,
    /// Any type this consumer does not know; ignored during reconciliation.
    Unknown,
}

impl EventKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::RunStart => "run-start",
            Self::StepStart => "step-start",
            Self::StepComplete => "step-complete",
            Self::StepFailed => "step-failed",
            Self::StepSkipped => "step-skipped",
            Self::RunComplete => "run-complete",
            Self::MemoryRead => "memory-read",
            Self::MemoryWrite => "memory-write",
            Self::AutoHeal => "auto-heal",
            Self::Retry => "retry",
            Self::Unknown => "unknown",
        }
    }

    /// Events that target a single step.
    pub const fn is_step_scoped(self) -> bool {
        !matches!(self, Self::RunStart | Self::RunComplete | Self::Unknown)
    }
}

impl FromStr for EventKind {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace('_', "-");
        Ok(match normalized.as_str() {
            "run-start" => Self::RunStart,
            "step-start" => Self::StepStart,
            "step-complete" => Self::StepComplete,
            "step-failed" => Self::StepFailed,
            "step-skipped" => Self::StepSkipped,
            "run-complete" => Self::RunComplete,
            "memory-read" => Self::MemoryRead,
            "memory-write" => Self::MemoryWrite,
            "auto-heal" => Self::AutoHeal,
            "retry" => Self::Retry,
            _ => Self::Unknown,
        })
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for EventKind {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for EventKind {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(raw.parse().unwrap_or(Self::Unknown))
    }
}

/// One appended progress event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionEvent {
    #[serde(rename = "type")]
    pub kind: EventKind,
    #[serde(default)]
    pub timestamp: i64,
    #[serde(default)]
    pub skill_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub step_index: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub step_name: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub data: EventData,
}

impl ExecutionEvent {
    pub fn new(kind: EventKind, timestamp: i64, skill_name: impl Into<String>) -> Self {
        Self {
            kind,
            timestamp,
            skill_name: skill_name.into(),
            step_index: None,
            step_name: None,
            data: EventData::default(),
        }
    }

    #[must_use]
    pub fn at_step(mut self, index: usize, name: impl Into<String>) -> Self {
        self.step_index = i64::try_from(index).ok();
        self.step_name = Some(name.into());
        self
    }

    #[must_use]
    pub fn with_data(mut self, data: EventData) -> Self {
        self.data = data;
        self
    }
}

fn null_as_default<'de, D, T>(deserializer: D) -> std::result::Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Optional payload of an event. Which keys matter depends on the event kind.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EventData {
    #[serde(alias = "durationMs", skip_serializing_if = "Option::is_none")]
    pub duration: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<serde_json::Value>,
    #[serde(alias = "memoryKey", skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
    #[serde(alias = "count", alias = "attempt", skip_serializing_if = "Option::is_none")]
    pub retry_count: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub success: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub steps: Option<Vec<RunStepInfo>>,
}

impl EventData {
    /// Duration in whole milliseconds; negative or non-finite values are dropped.
    pub fn duration_ms(&self) -> Option<u64> {
        self.duration
            .filter(|d| d.is_finite() && *d >= 0.0)
            .map(|d| d.round() as u64)
    }

    /// Error text whether the producer sent a string or a structured object.
    pub fn error_text(&self) -> Option<String> {
        self.error.as_ref().map(value_to_text)
    }

    pub fn details_text(&self) -> Option<String> {
        self.details.as_ref().map(value_to_text)
    }

    pub fn step_names(&self) -> Option<Vec<String>> {
        self.steps
            .as_ref()
            .map(|steps| steps.iter().map(|step| step.name().to_string()).collect())
    }
}

fn value_to_text(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(text) => text.clone(),
        serde_json::Value::Object(map) => map
            .get("message")
            .and_then(|m| m.as_str())
            .map_or_else(|| value.to_string(), str::to_string),
        other => other.to_string(),
    }
}

/// A step announced by `run-start`: a bare name or an object carrying one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RunStepInfo {
    Name(String),
    Detailed { name: String },
}

impl RunStepInfo {
    pub fn name(&self) -> &str {
        match self {
            Self::Name(name) | Self::Detailed { name } => name,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
        "skillName": "triage-incident",
        "status": "running",
        "currentStepIndex": 1,
        "totalSteps": 3,
        "startTime": 1760400000000,
        "endTime": null,
        "producer": "runner-7",
        "events": [
            { "type": "run-start", "timestamp": 1760400000000, "skillName": "triage-incident",
              "data": { "steps": ["recall", {"name": "summarize"}, "open"] } },
            { "type": "step-complete", "timestamp": 1760400000120, "skillName": "triage-incident",
              "stepIndex": 0, "stepName": "recall", "data": { "duration": 120.4, "result": "ok" } },
            { "type": "checkpoint", "timestamp": 1760400000130, "skillName": "triage-incident",
              "data": null }
        ]
    }"#;

    #[test]
    fn parses_full_record() {
        let record = StateRecord::parse(SAMPLE).unwrap();
        assert_eq!(record.skill_name, "triage-incident");
        assert_eq!(record.status, RunStatus::Running);
        assert_eq!(record.total_steps, Some(3));
        assert_eq!(record.events.len(), 3);
        assert_eq!(
            record.events[0].data.step_names(),
            Some(vec!["recall".to_string(), "summarize".to_string(), "open".to_string()])
        );
        assert_eq!(record.events[1].data.duration_ms(), Some(120));
        assert_eq!(record.events[2].kind, EventKind::Unknown);
    }

    #[test]
    fn minimal_record_uses_defaults() {
        let record = StateRecord::parse("{}").unwrap();
        assert!(record.is_idle());
        assert_eq!(record.current_step_index, -1);
        assert_eq!(record.status, RunStatus::Idle);
    }

    #[test]
    fn partial_write_is_an_error() {
        let truncated = &SAMPLE[..SAMPLE.len() / 2];
        assert!(matches!(
            StateRecord::parse(truncated),
            Err(SkillViewError::Serialization(_))
        ));
    }

    #[test]
    fn unknown_status_reads_as_idle() {
        let record = StateRecord::parse(r#"{"status": "queued"}"#).unwrap();
        assert_eq!(record.status, RunStatus::Idle);
        let record = StateRecord::parse(r#"{"status": "Completed"}"#).unwrap();
        assert_eq!(record.status, RunStatus::Success);
    }

    #[test]
    fn event_kind_accepts_snake_case() {
        assert_eq!("memory_write".parse::<EventKind>().unwrap(), EventKind::MemoryWrite);
        assert_eq!("Auto-Heal".parse::<EventKind>().unwrap(), EventKind::AutoHeal);
        assert_eq!(
            serde_json::to_string(&EventKind::StepFailed).unwrap(),
            "\"step-failed\""
        );
    }

    #[test]
    fn data_aliases_and_error_objects() {
        let data: EventData = serde_json::from_str(
            r#"{"durationMs": 15, "count": 2, "memoryKey": "prefs",
                "error": {"message": "boom", "code": 7}}"#,
        )
        .unwrap();
        assert_eq!(data.duration_ms(), Some(15));
        assert_eq!(data.retry_count, Some(2));
        assert_eq!(data.key.as_deref(), Some("prefs"));
        assert_eq!(data.error_text().as_deref(), Some("boom"));
    }

    #[test]
    fn negative_duration_is_dropped() {
        let data = EventData {
            duration: Some(-4.0),
            ..EventData::default()
        };
        assert_eq!(data.duration_ms(), None);
    }
}
