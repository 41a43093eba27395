use std::path::PathBuf;

use skillview::error::SkillViewError;
use skillview::lifecycle::classify;
use skillview::skill::{OnErrorPolicy, SkillParser, StepAction};
use skillview::test_utils::{TestCase, run_table_tests};

fn fixture_skill(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests/fixtures/skills")
        .join(format!("{name}.yaml"))
}

#[test]
fn fixture_skill_keeps_valid_steps_in_order() {
    let parsed = SkillParser::parse_path(&fixture_skill("triage-incident")).unwrap();
    let definition = &parsed.definition;
    assert_eq!(definition.name, "triage-incident");
    assert_eq!(definition.version.as_deref(), Some("1.2.0"));
    assert_eq!(
        definition.step_names().collect::<Vec<_>>(),
        vec!["recall-similar", "summarize", "open"]
    );
    assert_eq!(definition.inputs.len(), 1);
    assert_eq!(definition.inputs[0].input_type, "string");
    assert!(definition.inputs[0].required);
    assert_eq!(definition.outputs[0].name, "ticket");

    assert_eq!(parsed.diagnostics.len(), 1);
    assert_eq!(parsed.diagnostics[0].step_index, Some(2));
}

#[test]
fn fixture_skill_step_details() {
    let definition = SkillParser::parse_path(&fixture_skill("triage-incident"))
        .unwrap()
        .definition;
    let summarize = definition.step(1).unwrap().declaration();
    assert!(matches!(summarize.action, StepAction::Inline { .. }));
    assert_eq!(summarize.on_error, Some(OnErrorPolicy::Continue));
    assert!(summarize.condition.is_some());

    let recall = definition.step(0).unwrap();
    assert_eq!(recall.tags().semantic_search, vec!["inputs.service outage"]);
    assert!(recall.tags().memory_read.is_empty());
}

#[test]
fn unusable_documents_are_rejected() -> Result<(), String> {
    let cases = vec![
        TestCase {
            name: "not yaml",
            input: "name: [unclosed",
            expected: true,
            should_panic: false,
        },
        TestCase {
            name: "sequence root",
            input: "- a\n- b\n",
            expected: true,
            should_panic: false,
        },
        TestCase {
            name: "blank name",
            input: "name: '  '\nsteps: []\n",
            expected: true,
            should_panic: false,
        },
        TestCase {
            name: "minimal",
            input: "name: ok\nsteps: []\n",
            expected: false,
            should_panic: false,
        },
    ];
    run_table_tests(cases, |content| {
        matches!(SkillParser::parse_str(content), Err(SkillViewError::InvalidSkill(_)))
    })
}

#[test]
fn memory_write_with_retry_policy_is_tagged() {
    let definition = SkillParser::parse(
        "name: s\nsteps:\n  - name: persist\n    tool: memory_write\n\
         \x20   args: { key: incidents }\n    onError: retry\n",
    )
    .unwrap();
    let tags = classify(definition.step(0).unwrap().declaration());
    assert_eq!(tags.memory_write, vec!["incidents"]);
    assert!(tags.can_retry);
    assert!(tags.memory_read.is_empty());
}

#[test]
fn non_semver_version_is_a_diagnostic_not_an_error() {
    let parsed = SkillParser::parse_str("name: s\nversion: latest\nsteps: []\n").unwrap();
    assert_eq!(parsed.definition.version.as_deref(), Some("latest"));
    assert!(parsed.diagnostics.iter().any(|d| d.message.contains("semantic version")));
}
