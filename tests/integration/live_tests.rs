use std::time::Duration;

use skillview::error::{Result, SkillViewError};
use skillview::execution::{ExecutionStore, RunStatus, StepStatus};
use skillview::monitor::{LocalHost, Monitor, MonitorOptions, NoticeLevel, SurfaceHost};
use skillview::projection::{DisplayMode, ProjectionSurface, RenderPlan, SurfaceTab};
use skillview::skill::SkillCatalog;
use skillview::test_utils::fixtures::UnitTestFixture;
use skillview::trigger::NoTrigger;
use skillview::watch::{ChangeDetector, DetectorOptions, PollingSource, WatcherMode};

use crate::common::{DEPLOY_SKILL, RecordBuilder, START};

fn quick_options() -> MonitorOptions {
    MonitorOptions {
        settle_delay: Duration::ZERO,
        ..MonitorOptions::default()
    }
}

fn polling_monitor(fixture: &UnitTestFixture, host: Box<dyn SurfaceHost>) -> Monitor {
    let detector = ChangeDetector::with_source(
        fixture.state_path(),
        Box::new(PollingSource::new(Duration::from_millis(20))),
    );
    Monitor::with_detector(detector, SkillCatalog::new(fixture.skills_dir()), host, quick_options())
}

struct RefusingHost;

impl SurfaceHost for RefusingHost {
    fn create_surface(&mut self, _mode: DisplayMode) -> Result<ProjectionSurface> {
        Err(SkillViewError::SurfaceUnavailable("host is headless".to_string()))
    }
}

#[test]
fn torn_write_is_retried_on_the_next_poll() {
    let fixture = UnitTestFixture::new();
    let options = DetectorOptions {
        mode: WatcherMode::Polling,
        poll_interval: Duration::from_millis(50),
    };
    let mut detector = ChangeDetector::start(fixture.state_path(), options).unwrap();
    assert!(fixture.state_path().parent().unwrap().is_dir());

    fixture.create_file("state/execution-state.json", r#"{"skillName": "deploy", "events": [{"ty"#);
    assert!(detector.next_change(Duration::from_millis(200)).is_none());

    let mut builder = RecordBuilder::new("deploy", START);
    builder.run_start(3);
    fixture.write_record(&builder.build());
    let record = detector.next_change(Duration::from_millis(500)).expect("valid record read");
    assert_eq!(record.skill_name, "deploy");
    assert_eq!(record.events.len(), 1);
    detector.dispose();
    detector.dispose();
    assert!(detector.is_disposed());
}

#[test]
fn same_run_snapshot_patches_only_changed_steps() {
    let fixture = UnitTestFixture::new();
    fixture.create_skill("deploy", DEPLOY_SKILL);
    let catalog = SkillCatalog::new(fixture.skills_dir());
    let mut store = ExecutionStore::new();
    let mut surface = ProjectionSurface::new(DisplayMode::Flow);

    let mut builder = RecordBuilder::new("deploy", START);
    builder.run_start(3).step_start(0, "recall").step_complete(0, "recall", 30.0);
    let first = store.ingest(builder.build(), &catalog);
    surface.attach_definition(store.definition());
    assert_eq!(surface.apply(store.state(), first.is_new_run), RenderPlan::FullRebuild);
    surface.toggle_expanded();
    let recall_revision = surface.nodes()[0].revision;

    builder.step_start(1, "build").step_failed(1, "build", "compile error");
    let second = store.ingest(builder.build(), &catalog);
    assert!(!second.is_new_run);
    assert_eq!(second.touched_steps, vec![1]);

    let plan = surface.apply(store.state(), second.is_new_run);
    assert_eq!(plan, RenderPlan::PatchSteps(vec![1]));
    assert_eq!(surface.nodes()[0].revision, recall_revision);
    assert_eq!(surface.nodes()[1].runtime.status, StepStatus::Failed);
    assert_eq!(surface.nodes()[1].runtime.error.as_deref(), Some("compile error"));
    assert_eq!(surface.view().expanded, Some(0));
}

#[test]
fn different_skill_run_rebuilds_from_scratch() {
    let fixture = UnitTestFixture::new();
    fixture.create_skill("deploy", DEPLOY_SKILL);
    let catalog = SkillCatalog::new(fixture.skills_dir());
    let mut store = ExecutionStore::new();
    let mut surface = ProjectionSurface::new(DisplayMode::Compact);

    let mut deploy = RecordBuilder::new("deploy", START);
    deploy.run_start(3).step_start(0, "recall");
    let update = store.ingest(deploy.build(), &catalog);
    surface.apply(store.state(), update.is_new_run);
    assert_eq!(store.state().status, RunStatus::Running);

    let mut audit = RecordBuilder::new("audit", START + 5_000);
    audit.run_start(2).step_start(0, "scan");
    let update = store.ingest(audit.build(), &catalog);
    assert!(update.is_new_run);
    assert_eq!(surface.apply(store.state(), update.is_new_run), RenderPlan::FullRebuild);

    assert_eq!(surface.skill_name(), "audit");
    assert_eq!(surface.nodes().len(), 2);
    assert_eq!(surface.nodes()[0].name, "step-1");
    assert!(surface.nodes().iter().all(|node| node.name != "recall"));
    assert_eq!(surface.view().mode, DisplayMode::Compact);
}

#[test]
fn new_run_opens_the_surface_and_steps_match_definition() {
    let fixture = UnitTestFixture::new();
    fixture.create_skill("deploy", DEPLOY_SKILL);
    let mut monitor = polling_monitor(&fixture, Box::new(LocalHost));
    assert!(monitor.surface().is_none());

    let mut builder = RecordBuilder::new("deploy", START);
    builder.run_start(3);
    let outcome = monitor.ingest(builder.build());
    assert!(outcome.opened_surface);
    assert_eq!(monitor.state().steps.len(), 3);

    let surface = monitor.surface().unwrap();
    assert_eq!(surface.view().tab, SurfaceTab::Execution);
    assert_eq!(surface.nodes()[0].tags.memory_read, vec!["last-deploy"]);
    assert_eq!(monitor.presence().label().unwrap().text, "◐ deploy 1/3");
}

#[test]
fn refused_surface_becomes_a_notification() {
    let fixture = UnitTestFixture::new();
    fixture.create_skill("deploy", DEPLOY_SKILL);
    let mut monitor = polling_monitor(&fixture, Box::new(RefusingHost));

    let mut builder = RecordBuilder::new("deploy", START);
    builder.run_start(3).step_start(0, "recall");
    let outcome = monitor.ingest(builder.build());
    assert!(!outcome.opened_surface);
    assert!(monitor.surface().is_none());
    assert_eq!(monitor.state().status, RunStatus::Running);

    let notice = monitor.notifications().latest().unwrap();
    assert_eq!(notice.level, NoticeLevel::Error);
    assert!(notice.message.contains("host is headless"));

    assert!(monitor.request_run(&NoTrigger).is_err());
    monitor.dispose();
    monitor.dispose();
    assert!(monitor.is_disposed());
}

#[test]
fn tick_picks_up_records_written_after_start() {
    let fixture = UnitTestFixture::new();
    fixture.create_skill("deploy", DEPLOY_SKILL);
    let mut monitor = polling_monitor(&fixture, Box::new(LocalHost));

    let mut builder = RecordBuilder::new("deploy", START);
    builder.run_start(3).step_start(0, "recall").step_complete(0, "recall", 8.0);
    fixture.write_record(&builder.build());

    let mut seen = false;
    for _ in 0..20 {
        if monitor.tick(Duration::from_millis(50)).update.is_some() {
            seen = true;
            break;
        }
    }
    assert!(seen, "record never observed");
    assert_eq!(monitor.state().steps[0].status, StepStatus::Success);
    assert_eq!(monitor.state().steps[0].duration_ms, Some(8));
}
