//! Binary-level tests for the focusrun CLI.
//!
//! Every test points `FOCUSRUN_HOME` at a temporary directory, so the
//! stores start empty and no daemon socket exists.

use assert_cmd::Command;
use predicates::prelude::*;

use focusrun::store::{AppPaths, SessionStore, SettingsStore, HOME_ENV};

// ============================================================================
// Test Helpers
// ============================================================================

fn focusrun(home: &tempfile::TempDir) -> Command {
    let mut cmd = Command::cargo_bin("focusrun").unwrap();
    cmd.env(HOME_ENV, home.path()).env_remove("RUST_LOG");
    cmd
}

fn add_session(home: &tempfile::TempDir, name: &str) -> String {
    focusrun(home)
        .args([
            "session",
            "add",
            "--name",
            name,
            "--task",
            "work:25:Deep work",
            "--task",
            "break:5",
        ])
        .assert()
        .success();

    let paths = AppPaths::from_base(home.path());
    let store = SessionStore::open(paths.sessions_file()).unwrap();
    store
        .list()
        .iter()
        .find(|s| s.name == name)
        .map(|s| s.id.clone())
        .unwrap()
}

// ============================================================================
// General
// ============================================================================

#[test]
fn test_help_lists_subcommands() {
    let home = tempfile::tempdir().unwrap();
    focusrun(&home)
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("session"))
        .stdout(predicate::str::contains("daemon"))
        .stdout(predicate::str::contains("music"));
}

#[test]
fn test_version() {
    let home = tempfile::tempdir().unwrap();
    focusrun(&home)
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::starts_with("focusrun"));
}

#[test]
fn test_completions_bash() {
    let home = tempfile::tempdir().unwrap();
    focusrun(&home)
        .args(["completions", "bash"])
        .assert()
        .success()
        .stdout(predicate::str::contains("focusrun"));
}

// ============================================================================
// Sessions
// ============================================================================

#[test]
fn test_session_add_list_show() {
    let home = tempfile::tempdir().unwrap();
    let id = add_session(&home, "Morning");

    focusrun(&home)
        .args(["session", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Morning"))
        .stdout(predicate::str::contains("2タスク"))
        .stdout(predicate::str::contains("30分"));

    focusrun(&home)
        .args(["session", "show", &id[..8]])
        .assert()
        .success()
        .stdout(predicate::str::contains("Deep work"))
        .stdout(predicate::str::contains("[休憩] 休憩 - 5分"));
}

#[test]
fn test_session_list_empty() {
    let home = tempfile::tempdir().unwrap();
    focusrun(&home)
        .args(["session", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("保存されたセッションはありません"));
}

#[test]
fn test_session_add_requires_task() {
    let home = tempfile::tempdir().unwrap();
    focusrun(&home)
        .args(["session", "add", "--name", "Nothing"])
        .assert()
        .failure();
}

#[test]
fn test_session_add_rejects_bad_task_arg() {
    let home = tempfile::tempdir().unwrap();
    focusrun(&home)
        .args(["session", "add", "--name", "Bad", "--task", "work:0"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("タスクの時間"));
}

#[test]
fn test_session_rename_and_delete_without_daemon() {
    let home = tempfile::tempdir().unwrap();
    let id = add_session(&home, "Morning");

    focusrun(&home)
        .args(["session", "rename", &id, "Evening"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Evening"));

    focusrun(&home)
        .args(["session", "delete", &id])
        .assert()
        .success();

    let paths = AppPaths::from_base(home.path());
    let store = SessionStore::open(paths.sessions_file()).unwrap();
    assert!(store.list().is_empty());
}

#[test]
fn test_session_show_unknown_id() {
    let home = tempfile::tempdir().unwrap();
    focusrun(&home)
        .args(["session", "show", "does-not-exist"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("セッションが見つかりません"));
}

// ============================================================================
// Settings
// ============================================================================

#[test]
fn test_settings_show_defaults() {
    let home = tempfile::tempdir().unwrap();
    focusrun(&home)
        .args(["settings", "show"])
        .assert()
        .success()
        .stdout(predicate::str::contains("アイドルしきい値: 300秒"))
        .stdout(predicate::str::contains("音量: 50%"));
}

#[test]
fn test_settings_set_persists() {
    let home = tempfile::tempdir().unwrap();
    focusrun(&home)
        .args([
            "settings",
            "set",
            "--music-volume",
            "0.8",
            "--activity-threshold",
            "120",
            "--music-file",
            "/music/rain.mp3",
            "--music-auto-play",
            "true",
        ])
        .assert()
        .success();

    let paths = AppPaths::from_base(home.path());
    let settings = SettingsStore::load(paths.settings_file()).unwrap();
    let settings = settings.settings();
    assert_eq!(settings.music_volume, 0.8);
    assert_eq!(settings.activity_threshold, 120);
    assert_eq!(settings.music_file_path.as_deref(), Some("/music/rain.mp3"));
    assert!(settings.music_auto_play);
}

#[test]
fn test_music_volume_saves_without_daemon() {
    let home = tempfile::tempdir().unwrap();
    focusrun(&home)
        .args(["music", "volume", "0.3"])
        .assert()
        .success();

    let paths = AppPaths::from_base(home.path());
    let settings = SettingsStore::load(paths.settings_file()).unwrap();
    assert_eq!(settings.settings().music_volume, 0.3);
}

#[test]
fn test_settings_set_rejects_out_of_range_threshold() {
    let home = tempfile::tempdir().unwrap();
    focusrun(&home)
        .args(["settings", "set", "--activity-threshold", "10"])
        .assert()
        .failure();
}

// ============================================================================
// Daemon commands without a daemon
// ============================================================================

#[test]
fn test_status_without_daemon_fails() {
    let home = tempfile::tempdir().unwrap();
    focusrun(&home)
        .arg("status")
        .assert()
        .failure()
        .stderr(predicate::str::contains("focusrun daemon"));
}

#[test]
fn test_load_unknown_session_fails_before_connecting() {
    let home = tempfile::tempdir().unwrap();
    focusrun(&home)
        .args(["load", "nope"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("セッションが見つかりません"));
}

#[test]
fn test_music_play_without_any_file() {
    let home = tempfile::tempdir().unwrap();
    focusrun(&home)
        .args(["music", "play"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("音楽ファイルが指定されていません"));
}
