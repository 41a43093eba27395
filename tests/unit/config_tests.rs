use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use skillview::config::Config;
use skillview::projection::DisplayMode;
use skillview::test_utils::{TestCase, run_table_tests};
use skillview::watch::WatcherMode;

fn fixture_path(relative: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join(relative)
}

fn load_fixture(relative: &str) -> Config {
    let content = fs::read_to_string(fixture_path(relative)).expect("read fixture");
    Config::from_toml(&content).expect("parse config")
}

#[test]
fn config_watcher_and_surface_from_fixture() -> Result<(), String> {
    let cases = vec![
        TestCase {
            name: "default",
            input: "tests/fixtures/configs/default.toml",
            expected: (
                WatcherMode::Auto,
                Duration::from_millis(500),
                Duration::from_millis(100),
                true,
                DisplayMode::Flow,
            ),
            should_panic: false,
        },
        TestCase {
            name: "custom",
            input: "tests/fixtures/configs/custom.toml",
            expected: (
                WatcherMode::Polling,
                Duration::from_millis(250),
                Duration::from_millis(100),
                false,
                DisplayMode::Compact,
            ),
            should_panic: false,
        },
    ];

    run_table_tests(cases, |relative_path| {
        let config = load_fixture(relative_path);
        (
            config.watcher.mode,
            config.watcher.poll_interval,
            config.watcher.settle_delay,
            config.surface.auto_open,
            config.surface.default_mode,
        )
    })
}

#[test]
fn config_partial_file_keeps_other_defaults() {
    let config = load_fixture("tests/fixtures/configs/custom.toml");
    assert_eq!(config.presence.success_clear, Duration::from_secs(5));
    assert_eq!(config.presence.failure_clear, Duration::from_secs(30));
    assert_eq!(config.paths.skills_dir, PathBuf::from("skills"));
    assert_eq!(config.trigger.command, vec!["skill-runner", "--detach"]);
}

#[test]
fn config_paths_resolve_against_root() {
    let config = load_fixture("tests/fixtures/configs/custom.toml");
    let root = PathBuf::from("/home/dev/.skillview");
    assert_eq!(config.state_file(&root), PathBuf::from("/var/run/skills/state.json"));
    assert_eq!(config.skills_dir(&root), root.join("skills"));
}

#[test]
fn config_overrides_win_over_file() {
    let mut config = load_fixture("tests/fixtures/configs/custom.toml");
    let env = |key: &str| match key {
        "SKILLVIEW_WATCHER_MODE" => Some("native".to_string()),
        "SKILLVIEW_SUCCESS_CLEAR_SECS" => Some("2".to_string()),
        "SKILLVIEW_TRIGGER_COMMAND" => Some("runner, start".to_string()),
        _ => None,
    };
    config.apply_overrides(&env).unwrap();
    assert_eq!(config.watcher.mode, WatcherMode::Native);
    assert_eq!(config.presence.success_clear, Duration::from_secs(2));
    assert_eq!(config.trigger.command, vec!["runner", "start"]);
}

#[test]
fn config_monitor_options_carry_timings() {
    let config = load_fixture("tests/fixtures/configs/custom.toml");
    let options = config.monitor_options();
    assert_eq!(options.detector.mode, WatcherMode::Polling);
    assert_eq!(options.detector.poll_interval, Duration::from_millis(250));
    assert_eq!(options.presence.failure_clear, Duration::from_secs(30));
    assert!(!options.auto_open);
    assert_eq!(options.default_mode, DisplayMode::Compact);
}
