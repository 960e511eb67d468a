//! CLI end-to-end tests
//!
//! Tests for the frameseek command-line interface. Everything that needs
//! decoded video runs against the synthetic stream of `simulate`.

use assert_cmd::prelude::*;
use predicates::prelude::*;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::tempdir;

/// Get a command for the frameseek binary
#[allow(deprecated)]
fn frameseek_cmd() -> Command {
    let mut cmd = Command::cargo_bin("frameseek").unwrap();
    // Keep default config lookups away from the developer's own files.
    cmd.env("HOME", std::env::temp_dir());
    cmd
}

fn json_output(cmd: &mut Command) -> serde_json::Value {
    let output = cmd.output().unwrap();
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));
    serde_json::from_slice(&output.stdout).unwrap()
}

fn files_with_extension(dir: &Path, extension: &str) -> Vec<PathBuf> {
    fs::read_dir(dir)
        .unwrap()
        .map(|e| e.unwrap().path())
        .filter(|p| p.extension().is_some_and(|e| e == extension))
        .collect()
}

// ---------------------------------------------------------------------------
// Basics
// ---------------------------------------------------------------------------

#[test]
fn test_cli_no_args_shows_help() {
    let mut cmd = frameseek_cmd();
    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("Usage"));
}

#[test]
fn test_cli_help_flag() {
    let mut cmd = frameseek_cmd();
    cmd.arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("frameseek"))
        .stdout(predicate::str::contains("Usage"));
}

#[test]
fn test_cli_version_flag() {
    let mut cmd = frameseek_cmd();
    cmd.arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("frameseek"));
}

#[test]
fn test_cli_version_command() {
    let mut cmd = frameseek_cmd();
    cmd.arg("version")
        .assert()
        .success()
        .stdout(predicate::str::contains(env!("CARGO_PKG_VERSION")));
}

#[test]
fn test_cli_check_tools_command() {
    let mut cmd = frameseek_cmd();
    cmd.arg("check-tools")
        .assert()
        .success()
        .stdout(predicate::str::contains("ffprobe"))
        .stdout(predicate::str::contains("Native decoder"));
}

#[cfg(unix)]
#[test]
fn test_cli_check_tools_uses_configured_ffprobe() {
    use std::os::unix::fs::PermissionsExt;

    let dir = tempdir().unwrap();
    let fake = dir.path().join("custom-ffprobe");
    fs::write(&fake, "#!/bin/sh\necho 'ffprobe version 9.9-local Copyright (c) the FFmpeg developers'\n").unwrap();
    fs::set_permissions(&fake, fs::Permissions::from_mode(0o755)).unwrap();
    let config = dir.path().join("frameseek.toml");
    fs::write(&config, format!("[tools]\nffprobe_path = {:?}\n", fake.display().to_string())).unwrap();

    let mut cmd = frameseek_cmd();
    cmd.arg("--config")
        .arg(&config)
        .arg("check-tools")
        .assert()
        .success()
        .stdout(predicate::str::contains("✓ ffprobe (9.9-local)"))
        .stdout(predicate::str::contains("custom-ffprobe"));
}

#[test]
fn test_cli_seek_help() {
    let mut cmd = frameseek_cmd();
    cmd.args(["seek", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Seek to a frame"));
}

// ---------------------------------------------------------------------------
// Simulation
// ---------------------------------------------------------------------------

#[test]
fn test_cli_simulate_native() {
    let mut cmd = frameseek_cmd();
    cmd.arg("simulate")
        .assert()
        .success()
        .stdout(predicate::str::contains("reliability Native"))
        .stdout(predicate::str::contains("✗").not());
}

#[test]
fn test_cli_simulate_json() {
    let json = json_output(frameseek_cmd().args(["simulate", "--json", "--targets", "10,500,1001"]));
    assert_eq!(json["reliability"], "native");
    let seeks = json["seeks"].as_array().unwrap();
    assert_eq!(seeks.len(), 3);
    assert_eq!(seeks[1]["landed"], 500);
    assert_eq!(seeks[1]["strategy"], "native");
    assert_eq!(seeks[2]["outcome"], "end_of_stream");
    assert!(seeks.iter().all(|s| s["exact"] == true));
}

#[test]
fn test_cli_simulate_lagging_stream_with_index() {
    let json = json_output(frameseek_cmd().args([
        "simulate", "--lag", "40", "--index", "--targets", "640", "--json",
    ]));
    assert_eq!(json["reliability"], "index_only");
    assert_eq!(json["seeks"][0]["strategy"], "indexed");
    assert_eq!(json["seeks"][0]["landed"], 640);
}

#[test]
fn test_cli_simulate_without_timestamps() {
    let json = json_output(frameseek_cmd().args([
        "simulate",
        "--no-timestamps",
        "--frames",
        "200",
        "--json",
    ]));
    assert_eq!(json["reliability"], "sequential_only");
    assert!(json["seeks"].as_array().unwrap().iter().all(|s| s["exact"] == true));
}

#[test]
fn test_cli_simulate_pulldown() {
    let mut cmd = frameseek_cmd();
    cmd.args(["simulate", "--steps", "3003,4505"])
        .assert()
        .success()
        .stdout(predicate::str::contains("reliability Native"));
}

#[test]
fn test_cli_simulate_rejects_bad_config() {
    let dir = tempdir().unwrap();
    let config = dir.path().join("frameseek.toml");
    fs::write(&config, "[engine]\nnative_retries = 0\n").unwrap();

    let mut cmd = frameseek_cmd();
    cmd.args(["--config", config.to_str().unwrap(), "simulate"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("native_retries"));
}

// ---------------------------------------------------------------------------
// Cache inspection
// ---------------------------------------------------------------------------

#[test]
fn test_cli_inspect_simulated_index() {
    let dir = tempdir().unwrap();
    let mut cmd = frameseek_cmd();
    cmd.args(["simulate", "--index", "--cache-dir", dir.path().to_str().unwrap()])
        .assert()
        .success();

    let indexes = files_with_extension(dir.path(), "fsidx");
    assert_eq!(indexes.len(), 1);

    let mut cmd = frameseek_cmd();
    cmd.args(["inspect-index", indexes[0].to_str().unwrap(), "--rows", "3"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Entries: 84"))
        .stdout(predicate::str::contains("Frames: 1000"));

    let json = json_output(frameseek_cmd().args([
        "inspect-index",
        indexes[0].to_str().unwrap(),
        "--rows",
        "2",
        "--json",
    ]));
    assert_eq!(json["complete"], true);
    assert_eq!(json["total_frames"], 1000);
    assert_eq!(json["rows"].as_array().unwrap().len(), 2);
    assert_eq!(json["rows"][1]["seek_nr"], 13);
}

#[test]
fn test_cli_inspect_corrupt_index() {
    let dir = tempdir().unwrap();
    let file = dir.path().join("broken.fsidx");
    fs::write(&file, b"definitely not an index").unwrap();

    let mut cmd = frameseek_cmd();
    cmd.args(["inspect-index", file.to_str().unwrap()])
        .assert()
        .failure()
        .stderr(predicate::str::contains("corrupt frame index"));
}

#[test]
fn test_cli_inspect_record() {
    let dir = tempdir().unwrap();
    let file = dir.path().join("clip.mkv.t0.h264.fsrel");
    fs::write(
        &file,
        r#"decoder_version = "ffmpeg-7.1"
total_frames = 1440
all_frames_counted = false
eof_timecode = 1439000
native_seek_reliable = true
seek_pre_roll_size = 12
source_mtime = 1700000000000000000

[profile]
offset_of_first_frame = 0
step_pattern = [1000]
cycle_sum = 1000
min_abs_step = 1000
timing = "cyclic"
"#,
    )
    .unwrap();

    let json = json_output(frameseek_cmd().args(["inspect-record", file.to_str().unwrap(), "--json"]));
    assert_eq!(json["total_frames"], 1440);
    assert_eq!(json["seek_pre_roll_size"], 12);
    assert_eq!(json["native_failures"], 0);
    assert_eq!(json["profile"]["timing"], "cyclic");

    let mut cmd = frameseek_cmd();
    cmd.args(["inspect-record", file.to_str().unwrap()])
        .assert()
        .success()
        .stdout(predicate::str::contains("native_seek_reliable = true"));
}

#[test]
fn test_cli_inspect_missing_record() {
    let dir = tempdir().unwrap();
    let mut cmd = frameseek_cmd();
    cmd.args([
        "inspect-record",
        dir.path().join("none.fsrel").to_str().unwrap(),
    ])
    .assert()
    .failure()
    .stderr(predicate::str::contains("No reliability record"));
}

// ---------------------------------------------------------------------------
// Media files
// ---------------------------------------------------------------------------

#[test]
fn test_cli_analyze_nonexistent_file() {
    let mut cmd = frameseek_cmd();
    cmd.args(["analyze", "/nonexistent/file.mkv"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("does not exist"));
}

#[test]
fn test_cli_seek_nonexistent_file() {
    let mut cmd = frameseek_cmd();
    cmd.args(["seek", "/nonexistent/file.mkv", "10"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("does not exist"));
}

#[test]
fn test_cli_probe_nonexistent_file() {
    let mut cmd = frameseek_cmd();
    cmd.args(["probe", "/nonexistent/file.mkv"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("does not exist"));
}
