// ABOUTME: Integration tests for the devnet CLI binary.
// ABOUTME: Covers help output, `devnet spec` and failures reported before any deploy.

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::path::Path;

const STACK: &str = r#"
apps:
  postgres:
    type: postgres
    image: postgres:14.3-alpine
    ports:
      sql: 5432
modes:
  dev: [postgres]
"#;

/// The binary with no DEVNET_* settings leaking in from the caller's shell.
fn devnet(home: &Path) -> Command {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("devnet"));
    for var in [
        "DEVNET_ENV",
        "DEVNET_HOME",
        "DEVNET_MODE",
        "DEVNET_TARGET",
        "DEVNET_BIN_DIR",
        "DEVNET_STACK",
        "DEVNET_DOCKER",
        "RUST_LOG",
    ] {
        cmd.env_remove(var);
    }
    cmd.arg("--home").arg(home);
    cmd
}

#[test]
fn help_lists_commands() {
    let home = tempfile::tempdir().unwrap();
    devnet(home.path())
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("start"))
        .stdout(predicate::str::contains("stop"))
        .stdout(predicate::str::contains("remove"))
        .stdout(predicate::str::contains("spec"))
        .stdout(predicate::str::contains("test"));
}

#[test]
fn spec_prints_empty_state_for_new_environment() {
    let home = tempfile::tempdir().unwrap();
    let output = devnet(home.path())
        .args(["--env", "znet", "spec"])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();

    let json: serde_json::Value = serde_json::from_slice(&output).unwrap();
    assert_eq!(json["target"], "docker");
    assert_eq!(json["mode"], "dev");
    assert_eq!(json["env"], "znet");
    assert_eq!(json["apps"], serde_json::json!({}));

    // Reading the state never creates it.
    assert!(!home.path().join("znet").exists());
}

#[test]
fn start_without_stack_file_fails() {
    let home = tempfile::tempdir().unwrap();
    let cwd = tempfile::tempdir().unwrap();

    devnet(home.path())
        .current_dir(cwd.path())
        .arg("start")
        .assert()
        .failure()
        .stderr(predicate::str::contains("stack file not found"));
}

#[test]
fn unknown_target_is_rejected() {
    let home = tempfile::tempdir().unwrap();
    let cwd = tempfile::tempdir().unwrap();
    fs::write(cwd.path().join("devnet.yml"), STACK).unwrap();

    devnet(home.path())
        .current_dir(cwd.path())
        .args(["--target", "tmux", "start"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("unknown target \"tmux\""));
}

#[test]
fn unknown_mode_is_rejected() {
    let home = tempfile::tempdir().unwrap();
    let cwd = tempfile::tempdir().unwrap();
    fs::write(cwd.path().join("devnet.yml"), STACK).unwrap();

    devnet(home.path())
        .current_dir(cwd.path())
        .args(["--mode", "full", "--docker", "/nonexistent/docker", "start"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("unknown mode \"full\""));
}

#[test]
fn state_of_another_mode_is_rejected() {
    let home = tempfile::tempdir().unwrap();
    fs::create_dir_all(home.path().join("devnet")).unwrap();
    fs::write(
        home.path().join("devnet/spec.json"),
        r#"{"target": "docker", "mode": "dev", "env": "devnet", "apps": {}}"#,
    )
    .unwrap();

    devnet(home.path())
        .args(["--mode", "chain", "spec"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("mode mismatch"));
}

#[test]
fn test_without_matching_tests_fails() {
    let home = tempfile::tempdir().unwrap();
    let cwd = tempfile::tempdir().unwrap();
    fs::write(
        cwd.path().join("devnet.yml"),
        format!("{STACK}  test: [postgres]\ntests:\n  bank-send:\n    command: ./bank-send\n"),
    )
    .unwrap();

    devnet(home.path())
        .current_dir(cwd.path())
        .args(["test", "--filter", "dex"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("dex"));
}

#[test]
fn quiet_and_json_conflict() {
    let home = tempfile::tempdir().unwrap();
    devnet(home.path())
        .args(["--quiet", "--json", "spec"])
        .assert()
        .failure();
}
