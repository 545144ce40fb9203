//! End-to-end tests driving the `bt` binary.
//!
//! Tests the full pipeline: check → fix-unpaired --write → irr / time-budget

use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use tempfile::TempDir;

const PROJECT: &str = r#"{
    "ethogram": [
        {"code": "walk", "type": "state"},
        {"code": "rest", "type": "state"},
        {"code": "bark", "type": "point"}
    ],
    "subjects": ["mouse"],
    "observations": {
        "rater-a": {
            "type": "media",
            "media_durations": ["20"],
            "events": [
                ["0", "mouse", "walk", ""],
                ["5", "mouse", "walk", ""],
                ["5", "mouse", "rest", ""],
                ["7", "mouse", "bark", ""]
            ]
        },
        "rater-b": {
            "type": "media",
            "media_durations": ["20"],
            "events": [
                ["0", "mouse", "walk", ""],
                ["5", "mouse", "walk", ""],
                ["5", "mouse", "rest", ""],
                ["19.999", "mouse", "rest", ""]
            ]
        }
    }
}"#;

fn bt_binary() -> String {
    env!("CARGO_BIN_EXE_bt").to_string()
}

fn write_project(temp: &Path) -> PathBuf {
    let path = temp.join("project.json");
    std::fs::write(&path, PROJECT).unwrap();
    path
}

/// Runs `bt` with an isolated config directory and no `BT_*` overrides.
fn bt(temp: &Path, args: &[&str]) -> Output {
    Command::new(bt_binary())
        .env("HOME", temp)
        .env("XDG_CONFIG_HOME", temp.join("config"))
        .env_remove("BT_ROUND_DECIMALS")
        .env_remove("BT_EVENT_WEIGHT")
        .env_remove("RUST_LOG")
        .args(args)
        .output()
        .expect("failed to run bt")
}

fn stdout(output: &Output) -> String {
    assert!(
        output.status.success(),
        "bt should succeed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    String::from_utf8(output.stdout.clone()).unwrap()
}

#[test]
fn test_repair_then_compare() {
    let temp = TempDir::new().unwrap();
    let project = write_project(temp.path());
    let project = project.to_str().unwrap();

    let check = stdout(&bt(temp.path(), &["check", "--project", project]));
    assert!(check.contains("rater-a: 4 events, 1 unpaired state(s)"));
    assert!(check.contains("  - mouse|rest"));

    // IRR refuses to compare a timeline with an open state.
    let irr = bt(temp.path(), &["irr", "--project", project]);
    assert!(!irr.status.success());
    assert!(String::from_utf8_lossy(&irr.stderr).contains("unpaired state mouse|rest"));

    let fix = stdout(&bt(
        temp.path(),
        &["fix-unpaired", "--project", project, "--write"],
    ));
    assert!(fix.contains("rater-a: state mouse|rest opened at 5.000 was closed at 19.999"));

    let check = stdout(&bt(temp.path(), &["check", "--project", project]));
    assert!(check.contains("rater-a: 5 events, all states paired"));

    let irr = stdout(&bt(temp.path(), &["irr", "--project", project]));
    assert!(irr.contains("rater-a    1.000    0.500"), "unexpected output:\n{irr}");
}

#[test]
fn test_states_query() {
    let temp = TempDir::new().unwrap();
    let project = write_project(temp.path());

    let out = stdout(&bt(
        temp.path(),
        &[
            "states",
            "--project",
            project.to_str().unwrap(),
            "--observation",
            "rater-b",
            "--time",
            "6",
        ],
    ));
    assert_eq!(out, "rater-b at 6.000\nmouse: rest\n");
}

#[test]
fn test_irr_json_after_repair() {
    let temp = TempDir::new().unwrap();
    let project = write_project(temp.path());
    let project = project.to_str().unwrap();
    stdout(&bt(temp.path(), &["fix-unpaired", "-p", project, "--write"]));

    let out = stdout(&bt(
        temp.path(),
        &["irr", "-p", project, "--weighted", "--json"],
    ));
    let value: serde_json::Value = serde_json::from_str(&out).unwrap();
    assert_eq!(value["method"], "weighted");
    assert_eq!(value["observations"].as_array().unwrap().len(), 2);
    assert_eq!(value["diagnostics"].as_array().unwrap().len(), 3);
}

#[test]
fn test_invalid_config_rejected() {
    let temp = TempDir::new().unwrap();
    let project = write_project(temp.path());
    let config = temp.path().join("bt.toml");
    std::fs::write(&config, "event_weight = 42.0\n").unwrap();

    let output = bt(
        temp.path(),
        &[
            "--config",
            config.to_str().unwrap(),
            "irr",
            "--project",
            project.to_str().unwrap(),
        ],
    );
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("failed to load configuration"), "{stderr}");
    assert!(output.stdout.is_empty());
}

#[test]
fn test_env_overrides_config() {
    let temp = TempDir::new().unwrap();
    let project = write_project(temp.path());
    let project = project.to_str().unwrap();
    stdout(&bt(temp.path(), &["fix-unpaired", "-p", project, "--write"]));

    let output = Command::new(bt_binary())
        .env("HOME", temp.path())
        .env("XDG_CONFIG_HOME", temp.path().join("config"))
        .env("BT_ROUND_DECIMALS", "-9")
        .args(["irr", "--project", project])
        .output()
        .unwrap();
    assert!(!output.status.success());
}

#[test]
fn test_missing_project_file() {
    let temp = TempDir::new().unwrap();
    let output = bt(temp.path(), &["check", "--project", "nope.json"]);
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("failed to read nope.json"));
}
