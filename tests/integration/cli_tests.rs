use std::io::Read;
use std::process::{Child, Stdio};
use std::time::{Duration, Instant};

use assert_cmd::Command;
use predicates::prelude::*;
use serde_json::Value;
use skillview::test_utils::fixtures::UnitTestFixture;

use crate::common::{DEPLOY_SKILL, RecordBuilder, START};

fn skillview(fixture: &UnitTestFixture) -> Command {
    let mut cmd = Command::cargo_bin("skillview").unwrap();
    cmd.env("SKILLVIEW_ROOT", &fixture.data_path)
        .env("SKILLVIEW_CONFIG", fixture.data_path.join("config.toml"))
        .env_remove("RUST_LOG");
    cmd
}

fn robot_json(cmd: &mut Command) -> Value {
    let output = cmd.output().unwrap();
    serde_json::from_slice(&output.stdout).unwrap()
}

#[test]
fn test_cli_help() {
    let mut cmd = Command::cargo_bin("skillview").unwrap();
    cmd.arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Usage:"));
}

#[test]
fn test_cli_version() {
    let mut cmd = Command::cargo_bin("skillview").unwrap();
    cmd.arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains(env!("CARGO_PKG_VERSION")));
}

#[test]
fn list_reports_skills_with_step_counts() {
    let fixture = UnitTestFixture::new();
    fixture.create_skill("deploy", DEPLOY_SKILL);
    fixture.create_file(
        "skills/triage/skill.yaml",
        "name: triage\nsteps:\n  - name: a\n    tool: x\n",
    );

    let json = robot_json(skillview(&fixture).args(["--robot", "list"]));
    assert_eq!(json["status"], "ok");
    let skills = json["data"].as_array().unwrap();
    assert_eq!(skills.len(), 2);
    assert_eq!(skills[0]["name"], "deploy");
    assert_eq!(skills[0]["steps"], 3);
    assert_eq!(skills[1]["name"], "triage");
}

#[test]
fn show_prints_steps_and_tags() {
    let fixture = UnitTestFixture::new();
    fixture.create_skill("deploy", DEPLOY_SKILL);

    skillview(&fixture)
        .args(["show", "deploy", "--full"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Steps (3)"))
        .stdout(predicate::str::contains("recall"))
        .stdout(predicate::str::contains("reads: last-deploy"));
}

#[test]
fn show_missing_skill_is_a_robot_error() {
    let fixture = UnitTestFixture::new();
    let mut cmd = skillview(&fixture);
    cmd.args(["--robot", "show", "nope"]);
    let output = cmd.output().unwrap();
    assert!(!output.status.success());
    let json: Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(json["error"], true);
    assert_eq!(json["code"], "skill_not_found");
}

#[test]
fn status_without_record_is_idle() {
    let fixture = UnitTestFixture::new();
    skillview(&fixture)
        .arg("status")
        .assert()
        .success()
        .stdout(predicate::str::contains("No run recorded"));
}

#[test]
fn status_replays_a_finished_run() {
    let fixture = UnitTestFixture::new();
    fixture.create_skill("deploy", DEPLOY_SKILL);
    let record = RecordBuilder::new("deploy", START)
        .run_start(3)
        .step_start(0, "recall")
        .step_complete(0, "recall", 40.0)
        .step_start(1, "build")
        .step_failed(1, "build", "exit 2")
        .run_complete(false)
        .build();
    fixture.write_record(&record);

    let json = robot_json(skillview(&fixture).args(["--robot", "status"]));
    let data = &json["data"];
    assert_eq!(data["label"]["text"], "✗ deploy");
    assert_eq!(data["label"]["tone"], "failure");
    assert_eq!(data["state"]["status"], "failed");
    assert_eq!(data["state"]["steps"][0]["status"], "success");
    assert_eq!(data["state"]["steps"][1]["error"], "exit 2");
    assert_eq!(data["state"]["steps"][2]["status"], "pending");
}

fn wait_with_timeout(child: &mut Child, timeout: Duration) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if child.try_wait().unwrap().is_some() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(50));
    }
    false
}

#[test]
fn tail_follows_a_run_until_it_completes() {
    let fixture = UnitTestFixture::new();
    fixture.create_skill("deploy", DEPLOY_SKILL);
    let mut builder = RecordBuilder::new("deploy", START);
    builder.run_start(3).step_start(0, "recall");
    fixture.write_record(&builder.build());

    let mut child = std::process::Command::new(assert_cmd::cargo::cargo_bin("skillview"))
        .env("SKILLVIEW_ROOT", &fixture.data_path)
        .env("SKILLVIEW_CONFIG", fixture.data_path.join("config.toml"))
        .env("SKILLVIEW_WATCHER_MODE", "polling")
        .env("SKILLVIEW_POLL_INTERVAL_MS", "50")
        .args(["--quiet", "tail", "--exit-on-complete"])
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .unwrap();

    std::thread::sleep(Duration::from_millis(400));
    builder
        .step_complete(0, "recall", 12.0)
        .step_start(1, "build")
        .step_complete(1, "build", 900.0)
        .step_start(2, "record")
        .step_complete(2, "record", 5.0)
        .run_complete(true);
    fixture.write_record(&builder.build());

    let exited = wait_with_timeout(&mut child, Duration::from_secs(10));
    if !exited {
        child.kill().ok();
    }
    let mut stdout = String::new();
    child.stdout.take().unwrap().read_to_string(&mut stdout).unwrap();
    assert!(exited, "tail did not exit; output so far:\n{stdout}");
    assert!(stdout.contains("== deploy (3 steps)"), "{stdout}");
    assert!(stdout.contains("◐ deploy 1/3"), "{stdout}");
    assert!(stdout.contains("✓ deploy"), "{stdout}");
}
