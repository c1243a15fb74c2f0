//! End-to-end tests of the `agent-race` binary

use assert_cmd::Command;
use predicates::prelude::*;
use std::path::Path;
use tempfile::TempDir;

fn agent_race(config: &Path) -> Command {
    let mut cmd = Command::cargo_bin("agent-race").unwrap();
    cmd.env("AGENT_RACE_CONFIG", config)
        .env_remove("AGENT_RACE_API_URL")
        .env_remove("AGENT_RACE_PROFILE")
        .env_remove("RUST_LOG")
        .arg("--no-color");
    cmd
}

fn config_file() -> (TempDir, std::path::PathBuf) {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");
    (dir, path)
}

#[test]
fn test_help_lists_commands() {
    let (_dir, path) = config_file();

    agent_race(&path)
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("race"))
        .stdout(predicate::str::contains("run"))
        .stdout(predicate::str::contains("config"));
}

#[test]
fn test_version() {
    let (_dir, path) = config_file();

    agent_race(&path)
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::starts_with("agent-race "));
}

#[test]
fn test_config_path_honors_env() {
    let (_dir, path) = config_file();

    agent_race(&path)
        .args(["config", "path"])
        .assert()
        .success()
        .stdout(predicate::str::contains(path.display().to_string()));
}

#[test]
fn test_config_set_then_get() {
    let (_dir, path) = config_file();

    agent_race(&path)
        .args(["config", "set", "settings.judging_poll_secs", "7"])
        .assert()
        .success();
    assert!(path.exists());

    agent_race(&path)
        .args(["config", "get", "settings.judging_poll_secs"])
        .assert()
        .success()
        .stdout("7\n");
}

#[test]
fn test_config_rejects_unknown_key() {
    let (_dir, path) = config_file();

    agent_race(&path)
        .args(["config", "set", "settings.nope", "1"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Unknown setting: nope"));
}

#[test]
fn test_run_start_rejects_short_task() {
    let (_dir, path) = config_file();

    agent_race(&path)
        .args(["run", "start", "x"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("at least 2 characters"));
}

#[test]
fn test_race_show_unreachable_server_fails() {
    let (_dir, path) = config_file();
    std::fs::write(&path, "[settings]\nmax_retries = 0\ntimeout_secs = 2\n").unwrap();

    agent_race(&path)
        .args(["--api-url", "http://127.0.0.1:9", "race", "show", "race-1"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to fetch race race-1"));
}

#[test]
fn test_race_play_needs_a_terminal() {
    let (_dir, path) = config_file();

    agent_race(&path)
        .args(["race", "play"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("interactive terminal"));
}
