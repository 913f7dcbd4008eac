//! End-to-end tests for the `pathwatch` binary

mod common;

use common::PathwatchCommand;
use std::fs;
use std::time::Duration;
use tempfile::TempDir;

const TIMEOUT: Duration = Duration::from_secs(10);

#[test]
fn test_help_lists_flags() {
    let dir = TempDir::new().unwrap();
    let result = PathwatchCommand::new(dir.path())
        .args(&["--help"])
        .execute()
        .unwrap();

    assert!(result.success());
    for flag in ["--exec", "--window-ms", "--changed-only", "--async", "--config"] {
        assert!(result.stdout.contains(flag), "missing {}", flag);
    }
}

#[test]
fn test_no_paths_fails() {
    let dir = TempDir::new().unwrap();
    let result = PathwatchCommand::new(dir.path()).execute().unwrap();

    assert!(!result.success());
    assert!(result.stderr.contains("No files to watch"));
}

#[test]
fn test_invalid_window_fails() {
    let dir = TempDir::new().unwrap();
    let result = PathwatchCommand::new(dir.path())
        .args(&["notes.md", "--window-ms", "0"])
        .execute()
        .unwrap();

    assert!(!result.success());
    assert!(result.stderr.contains("window_ms"));
}

#[cfg(unix)]
#[test]
fn test_reports_change_and_runs_command() {
    let dir = TempDir::new().unwrap();
    let file = dir.path().join("notes.md");
    fs::write(&file, "draft").unwrap();

    let watch = PathwatchCommand::new(dir.path())
        .args(&["notes.md", "--window-ms", "50", "--exec", "echo ran:$PATHWATCH_CHANGED"])
        .spawn()
        .unwrap();
    watch.wait_for_line("watching", TIMEOUT).unwrap();

    fs::write(&file, "final").unwrap();
    let changed = watch.wait_for_line("changed", TIMEOUT).unwrap();
    assert!(changed.contains("notes.md"));
    let ran = watch.wait_for_line("ran:", TIMEOUT).unwrap();
    assert!(ran.contains("notes.md"));
}

#[cfg(unix)]
#[test]
fn test_async_mode_reports_change() {
    let dir = TempDir::new().unwrap();
    let file = dir.path().join("page.md");
    fs::write(&file, "# Title").unwrap();

    let watch = PathwatchCommand::new(dir.path())
        .args(&["page.md", "--async", "--changed-only"])
        .spawn()
        .unwrap();
    watch.wait_for_line("watching", TIMEOUT).unwrap();

    fs::write(&file, "# New title").unwrap();
    let changed = watch.wait_for_line("changed", TIMEOUT).unwrap();
    assert!(changed.contains("page.md"));
}

/// Two files written inside one window must run the command once
#[cfg(unix)]
fn assert_one_run_per_batch(extra: &[&str]) {
    let dir = TempDir::new().unwrap();
    let first = dir.path().join("a.md");
    let second = dir.path().join("b.md");
    fs::write(&first, "a").unwrap();
    fs::write(&second, "b").unwrap();

    let mut args = vec!["a.md", "b.md", "--window-ms", "500", "--exec", "echo ran-batch"];
    args.extend_from_slice(extra);
    let watch = PathwatchCommand::new(dir.path()).args(&args).spawn().unwrap();
    watch.wait_for_line("watching", TIMEOUT).unwrap();

    fs::write(&first, "a2").unwrap();
    fs::write(&second, "b2").unwrap();

    watch.wait_for_line("ran-batch", TIMEOUT).unwrap();
    assert_eq!(watch.count_lines("ran-batch", Duration::from_millis(1500)), 0);
}

#[cfg(unix)]
#[test]
fn test_blocking_mode_runs_command_once_per_batch() {
    assert_one_run_per_batch(&[]);
}

#[cfg(unix)]
#[test]
fn test_async_mode_runs_command_once_per_batch() {
    assert_one_run_per_batch(&["--async"]);
}
