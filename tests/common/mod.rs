//! Helpers shared by the test suites: skill fixtures and state-record builders.

#![allow(dead_code)]

use skillview::execution::{EventData, EventKind, ExecutionEvent, RunStatus, StateRecord};

pub const START: i64 = 1_760_400_000_000;

pub const DEPLOY_SKILL: &str = r"
name: deploy
description: Build and ship the service
steps:
  - name: recall
    tool: memory_read
    args: { key: last-deploy }
  - name: build
    tool: shell_exec
    onError: retry
  - name: record
    tool: memory_write
    args: { key: last-deploy }
";

/// Builds the state record an executor would write, one event at a time.
#[derive(Debug, Clone)]
pub struct RecordBuilder {
    record: StateRecord,
    clock: i64,
}

impl RecordBuilder {
    pub fn new(skill: &str, start: i64) -> Self {
        Self {
            record: StateRecord {
                skill_name: skill.to_string(),
                status: RunStatus::Running,
                current_step_index: 0,
                total_steps: None,
                start_time: Some(start),
                end_time: None,
                events: Vec::new(),
            },
            clock: start,
        }
    }

    fn push(&mut self, event: ExecutionEvent) -> &mut Self {
        self.record.events.push(event);
        self
    }

    fn tick(&mut self) -> i64 {
        self.clock += 10;
        self.clock
    }

    pub fn run_start(&mut self, total: usize) -> &mut Self {
        self.record.total_steps = Some(total);
        let ts = self.record.start_time.unwrap_or(self.clock);
        let skill = self.record.skill_name.clone();
        self.push(ExecutionEvent::new(EventKind::RunStart, ts, skill))
    }

    pub fn step(
        &mut self,
        kind: EventKind,
        index: usize,
        name: &str,
        data: EventData,
    ) -> &mut Self {
        let ts = self.tick();
        let skill = self.record.skill_name.clone();
        self.push(ExecutionEvent::new(kind, ts, skill).at_step(index, name).with_data(data))
    }

    pub fn step_start(&mut self, index: usize, name: &str) -> &mut Self {
        self.step(EventKind::StepStart, index, name, EventData::default())
    }

    pub fn step_complete(&mut self, index: usize, name: &str, duration: f64) -> &mut Self {
        let data = EventData {
            duration: Some(duration),
            ..EventData::default()
        };
        self.record.current_step_index = i64::try_from(index + 1).unwrap_or(i64::MAX);
        self.step(EventKind::StepComplete, index, name, data)
    }

    pub fn step_failed(&mut self, index: usize, name: &str, error: &str) -> &mut Self {
        let data = EventData {
            error: Some(serde_json::Value::String(error.to_string())),
            ..EventData::default()
        };
        self.step(EventKind::StepFailed, index, name, data)
    }

    pub fn run_complete(&mut self, success: bool) -> &mut Self {
        let ts = self.tick();
        self.record.status = if success { RunStatus::Success } else { RunStatus::Failed };
        self.record.end_time = Some(ts);
        let skill = self.record.skill_name.clone();
        let data = EventData {
            success: Some(success),
            ..EventData::default()
        };
        self.push(ExecutionEvent::new(EventKind::RunComplete, ts, skill).with_data(data))
    }

    pub fn build(&self) -> StateRecord {
        self.record.clone()
    }
}
