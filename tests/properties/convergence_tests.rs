use proptest::prelude::*;

use skillview::execution::{
    EventData, EventKind, ExecutionEvent, ExecutionStore, NoDefinitions, RunStatus, StateRecord,
    replay,
};
use skillview::skill::SkillParser;

const SKILL: &str = "prop";
const START: i64 = 1_760_400_000_000;

#[derive(Debug, Clone)]
enum Op {
    Start(usize),
    Complete(usize, u32),
    Fail(usize),
    Skip(usize),
    MemoryRead(usize, u8),
    Retry(usize, Option<u32>),
    Heal(usize),
    Finish(bool),
}

fn op_strategy(steps: usize) -> impl Strategy<Value = Op> {
    let index = 0..steps + 1;
    prop_oneof![
        4 => index.clone().prop_map(Op::Start),
        4 => (index.clone(), 0u32..5_000).prop_map(|(i, d)| Op::Complete(i, d)),
        1 => index.clone().prop_map(Op::Fail),
        1 => index.clone().prop_map(Op::Skip),
        1 => (index.clone(), 0u8..3).prop_map(|(i, k)| Op::MemoryRead(i, k)),
        1 => (index.clone(), proptest::option::of(0u32..4)).prop_map(|(i, c)| Op::Retry(i, c)),
        1 => index.prop_map(Op::Heal),
        1 => any::<bool>().prop_map(Op::Finish),
    ]
}

fn event_for(op: &Op, ts: i64) -> ExecutionEvent {
    let at = |kind, index: usize, data| {
        ExecutionEvent::new(kind, ts, SKILL)
            .at_step(index, format!("step-{}", index + 1))
            .with_data(data)
    };
    match *op {
        Op::Start(i) => at(EventKind::StepStart, i, EventData::default()),
        Op::Complete(i, d) => at(
            EventKind::StepComplete,
            i,
            EventData {
                duration: Some(f64::from(d)),
                ..EventData::default()
            },
        ),
        Op::Fail(i) => at(
            EventKind::StepFailed,
            i,
            EventData {
                error: Some(serde_json::json!({ "message": "boom" })),
                ..EventData::default()
            },
        ),
        Op::Skip(i) => at(EventKind::StepSkipped, i, EventData::default()),
        Op::MemoryRead(i, k) => at(
            EventKind::MemoryRead,
            i,
            EventData {
                key: Some(format!("key-{k}")),
                ..EventData::default()
            },
        ),
        Op::Retry(i, count) => at(
            EventKind::Retry,
            i,
            EventData {
                retry_count: count,
                ..EventData::default()
            },
        ),
        Op::Heal(i) => at(
            EventKind::AutoHeal,
            i,
            EventData {
                details: Some(serde_json::Value::String("patched".to_string())),
                ..EventData::default()
            },
        ),
        Op::Finish(success) => {
            ExecutionEvent::new(EventKind::RunComplete, ts, SKILL).with_data(EventData {
                success: Some(success),
                ..EventData::default()
            })
        }
    }
}

fn final_record(steps: usize, ops: &[Op]) -> StateRecord {
    let mut events = vec![ExecutionEvent::new(EventKind::RunStart, START, SKILL)];
    events.extend(
        ops.iter()
            .enumerate()
            .map(|(n, op)| event_for(op, START + 10 * (n as i64 + 1))),
    );
    StateRecord {
        skill_name: SKILL.to_string(),
        status: RunStatus::Running,
        current_step_index: 0,
        total_steps: Some(steps),
        start_time: Some(START),
        end_time: None,
        events,
    }
}

fn prefix(record: &StateRecord, len: usize) -> StateRecord {
    StateRecord {
        events: record.events[..len].to_vec(),
        ..record.clone()
    }
}

fn scenario() -> impl Strategy<Value = (usize, Vec<Op>, Vec<usize>)> {
    (1usize..6).prop_flat_map(|steps| {
        (
            Just(steps),
            proptest::collection::vec(op_strategy(steps), 0..24),
            proptest::collection::vec(1usize..26, 0..6),
        )
    })
}

proptest! {
    #[test]
    fn incremental_ingest_converges_to_replay((steps, ops, cuts) in scenario()) {
        let record = final_record(steps, &ops);
        let total = record.events.len();
        let mut cuts: Vec<usize> = cuts.into_iter().map(|c| c.min(total)).collect();
        cuts.sort_unstable();

        let mut store = ExecutionStore::new();
        for cut in cuts {
            store.ingest(prefix(&record, cut), &NoDefinitions);
            let checked = store.state().check_invariants();
            prop_assert!(checked.is_ok(), "{:?}", checked);
        }
        store.ingest(record.clone(), &NoDefinitions);

        prop_assert_eq!(store.state(), &replay(&record, None));
    }

    #[test]
    fn at_most_one_step_runs_after_every_event((steps, ops, _cuts) in scenario()) {
        let record = final_record(steps, &ops);
        for len in 1..=record.events.len() {
            let state = replay(&prefix(&record, len), None);
            prop_assert!(state.check_invariants().is_ok(), "{:?}", state.check_invariants());
            prop_assert_eq!(state.steps.len(), steps);
        }
    }

    #[test]
    fn reingesting_the_same_record_changes_nothing((steps, ops, _cuts) in scenario()) {
        let record = final_record(steps, &ops);
        let mut store = ExecutionStore::new();
        store.ingest(record.clone(), &NoDefinitions);
        let before = store.state().clone();
        let update = store.ingest(record, &NoDefinitions);
        prop_assert!(update.is_noop());
        prop_assert_eq!(store.state(), &before);
    }

    #[test]
    fn run_start_lays_out_definition_steps(count in 0usize..12, announced in 0usize..12) {
        let mut yaml = String::from("name: prop\nsteps:\n");
        for i in 0..count {
            yaml.push_str(&format!("  - name: s{i}\n    tool: t{i}\n"));
        }
        if count == 0 {
            yaml.push_str("  []\n");
        }
        let definition = SkillParser::parse(&yaml).unwrap();
        let record = final_record(announced, &[]);

        let state = replay(&record, Some(&definition));
        prop_assert_eq!(state.steps.len(), definition.steps.len());
        prop_assert_eq!(state.status, RunStatus::Running);
    }
}
