//! CLI end-to-end tests
//!
//! Tests for the reelforge command-line interface. None of these need
//! ffmpeg installed.

use assert_cmd::prelude::*;
use predicates::prelude::*;
use std::fs;
use std::process::Command;
use tempfile::tempdir;

/// Get a command for the reelforge binary
#[allow(deprecated)]
fn reelforge_cmd() -> Command {
    let mut cmd = Command::cargo_bin("reelforge").unwrap();
    cmd.env_remove("RUST_LOG")
        .env_remove("UPLOAD_PATH")
        .env_remove("FFMPEG_PATH")
        .env_remove("FFPROBE_PATH")
        .env_remove("MAX_FILE_SIZE");
    cmd
}

#[test]
fn test_cli_no_args_shows_help() {
    let mut cmd = reelforge_cmd();
    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("Usage"));
}

#[test]
fn test_cli_help_flag() {
    let mut cmd = reelforge_cmd();
    cmd.arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("reelforge"))
        .stdout(predicate::str::contains("process"));
}

#[test]
fn test_cli_version_command() {
    let mut cmd = reelforge_cmd();
    cmd.arg("version")
        .assert()
        .success()
        .stdout(predicate::str::contains(format!(
            "reelforge {}",
            env!("CARGO_PKG_VERSION")
        )));
}

#[test]
fn test_cli_process_help() {
    let mut cmd = reelforge_cmd();
    cmd.args(["process", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--qualities"))
        .stdout(predicate::str::contains("--parallel"));
}

#[test]
fn test_cli_profiles_lists_presets() {
    let mut cmd = reelforge_cmd();
    cmd.arg("profiles")
        .assert()
        .success()
        .stdout(predicate::str::contains("4K"))
        .stdout(predicate::str::contains("1280x720"))
        .stdout(predicate::str::contains("_360p"));
}

#[test]
fn test_cli_check_tools_command() {
    let mut cmd = reelforge_cmd();
    cmd.arg("check-tools").assert().success().stdout(
        predicate::str::contains("ffmpeg").and(predicate::str::contains("ffprobe")),
    );
}

#[test]
fn test_cli_probe_nonexistent_file() {
    let mut cmd = reelforge_cmd();
    cmd.args(["probe", "/nonexistent/clip.mp4"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("does not exist"));
}

#[test]
fn test_cli_process_rejects_non_video() {
    let dir = tempdir().unwrap();
    let input = dir.path().join("notes.txt");
    fs::write(&input, "hello").unwrap();

    let mut cmd = reelforge_cmd();
    cmd.current_dir(dir.path())
        .args(["process"])
        .arg(&input)
        .assert()
        .failure()
        .stderr(predicate::str::contains("unsupported video container"));
    assert!(!dir.path().join("uploads").exists());
}

#[test]
fn test_cli_process_empty_upload_dir() {
    let dir = tempdir().unwrap();
    let uploads = dir.path().join("uploads");
    fs::create_dir_all(&uploads).unwrap();

    let mut cmd = reelforge_cmd();
    cmd.env("UPLOAD_PATH", &uploads)
        .arg("process")
        .assert()
        .failure()
        .stderr(predicate::str::contains("No video files found"));
}

#[test]
fn test_cli_status_empty_store() {
    let dir = tempdir().unwrap();

    let mut cmd = reelforge_cmd();
    cmd.env("UPLOAD_PATH", dir.path())
        .arg("status")
        .assert()
        .success()
        .stdout(predicate::str::contains("No jobs found"));
}

#[test]
fn test_cli_status_unknown_job() {
    let dir = tempdir().unwrap();

    let mut cmd = reelforge_cmd();
    cmd.env("UPLOAD_PATH", dir.path())
        .args(["status", "6f1c1c1e-8a5b-4f7e-9a0e-3f1d2b4c5a6d"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Job not found"));
}

#[test]
fn test_cli_validate_config_file() {
    let dir = tempdir().unwrap();
    let config_path = dir.path().join("reelforge.toml");
    fs::write(
        &config_path,
        r#"
[storage]
upload_dir = "/srv/uploads"

[pipeline]
execution = { bounded_parallel = 2 }
cooldown_ms = 0

[workers]
max_concurrent_jobs = 3
"#,
    )
    .unwrap();

    let mut cmd = reelforge_cmd();
    cmd.arg("validate")
        .arg(&config_path)
        .assert()
        .success()
        .stdout(predicate::str::contains("Configuration is valid"))
        .stdout(predicate::str::contains("/srv/uploads/processed"))
        .stdout(predicate::str::contains("BoundedParallel(2)"))
        .stdout(predicate::str::contains("Max concurrent jobs: 3"));
}

#[test]
fn test_cli_validate_invalid_config() {
    let dir = tempdir().unwrap();
    let config_path = dir.path().join("broken.json");
    fs::write(&config_path, "{ not json").unwrap();

    let mut cmd = reelforge_cmd();
    cmd.arg("validate")
        .arg(&config_path)
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to load config"));
}
