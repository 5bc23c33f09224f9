//! The command-line interface, exercised as a separate process.

use std::process::{Command, Output};
use std::time::{Duration, Instant};

fn harness(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_search_harness"))
        .args(args)
        .output()
        .unwrap()
}

#[test]
fn diff_of_equivalent_files_succeeds() {
    let dir = tempfile::tempdir().unwrap();
    let actual = testing::write_text(dir.path(), "actual.txt", "a  \nb\n\n");
    let expected = testing::write_text(dir.path(), "expected.txt", "a\nb\n");

    let output = harness(&["diff", actual.to_str().unwrap(), expected.to_str().unwrap()]);

    assert!(output.status.success());
    assert_eq!(String::from_utf8_lossy(&output.stdout), "Files match\n");
}

#[test]
fn diff_of_different_files_fails_with_the_line() {
    let dir = tempfile::tempdir().unwrap();
    let actual = testing::write_text(dir.path(), "actual.txt", "a\nb\n");
    let expected = testing::write_text(dir.path(), "expected.txt", "a\nc\n");

    let output = harness(&["diff", actual.to_str().unwrap(), expected.to_str().unwrap()]);

    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stdout).starts_with("Files differ on line 2\n"));
}

#[test]
fn missing_subcommand_is_rejected() {
    let output = harness(&[]);

    assert!(!output.status.success());
}

#[cfg(unix)]
#[test]
fn compare_writes_report_and_verdict() {
    let dir = tempfile::tempdir().unwrap();

    let output = harness(&[
        "compare",
        "--program",
        "true",
        "--name",
        "Noop",
        "--label1",
        "Single",
        "--args1",
        "a b",
        "--label2",
        "Multi",
        "--args2",
        "c",
        "--warmup",
        "0",
        "--timed",
        "2",
        "--artifact-dir",
        dir.path().to_str().unwrap(),
    ]);

    assert!(output.status.success());

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("## Testing Noop - Single versus Multi"));
    assert!(stdout.contains("Multi is a "));
    assert!(dir.path().join("bench-noop-single.txt").exists());
}

#[cfg(unix)]
#[test]
fn compare_with_failing_program_fails() {
    let dir = tempfile::tempdir().unwrap();

    let output = harness(&[
        "compare",
        "--program",
        "false",
        "--name",
        "Broken",
        "--label1",
        "Single",
        "--args1",
        "x",
        "--label2",
        "Multi",
        "--args2",
        "y",
        "--timed",
        "1",
        "--artifact-dir",
        dir.path().to_str().unwrap(),
    ]);

    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("Error: "));
    assert!(!dir.path().join("bench-broken-single.txt").exists());
}

#[cfg(unix)]
#[test]
fn check_of_succeeding_program_succeeds() {
    let output = harness(&["check", "--program", "true", "--args", "-docs corpus"]);

    assert!(output.status.success());
    assert!(String::from_utf8_lossy(&output.stdout).starts_with("Finished without failures"));
}

#[cfg(unix)]
#[test]
fn check_of_failing_program_names_the_arguments() {
    let output = harness(&["check", "--program", "false", "--args", "-docs corpus"]);

    assert!(!output.status.success());

    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Arguments (2):\n-docs corpus"));
}

#[cfg(unix)]
#[test]
fn check_gives_up_after_the_timeout() {
    // The abandoned child keeps the inherited output open, so the output is only complete once
    // it exits.
    let output = harness(&["check", "--program", "sleep", "--args", "3", "--timeout-secs", "1"]);

    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("did not finish within 1s"));
}

#[cfg(unix)]
#[test]
fn compare_gives_up_after_the_timeout() {
    let dir = tempfile::tempdir().unwrap();
    let start = Instant::now();

    let output = harness(&[
        "compare",
        "--program",
        "sleep",
        "--name",
        "Slow",
        "--label1",
        "Single",
        "--args1",
        "30",
        "--label2",
        "Multi",
        "--args2",
        "30",
        "--warmup",
        "0",
        "--timed",
        "1",
        "--timeout-secs",
        "1",
        "--artifact-dir",
        dir.path().to_str().unwrap(),
    ]);

    // The abandoned round still has output suppressed, so only the exit status tells.
    assert!(!output.status.success());
    assert!(start.elapsed() < Duration::from_secs(20));
    assert!(!dir.path().join("bench-slow-single.txt").exists());
}

#[cfg(unix)]
#[test]
fn check_shows_the_diagnostics_of_a_succeeding_program() {
    let dir = tempfile::tempdir().unwrap();
    let script = testing::write_text(dir.path(), "driver.sh", "echo merging segments >&2\n");

    let output = harness(&["check", "--program", "sh", "--args", script.to_str().unwrap()]);

    assert!(output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("merging segments"));
}

#[cfg(unix)]
#[test]
fn compare_hides_the_diagnostics_of_the_benchmarked_program() {
    let dir = tempfile::tempdir().unwrap();
    let script = testing::write_text(dir.path(), "driver.sh", "echo merging segments >&2\n");
    let script = script.to_str().unwrap();

    let output = harness(&[
        "compare",
        "--program",
        "sh",
        "--name",
        "Quiet",
        "--label1",
        "Single",
        "--args1",
        script,
        "--label2",
        "Multi",
        "--args2",
        script,
        "--warmup",
        "0",
        "--timed",
        "1",
        "--artifact-dir",
        dir.path().to_str().unwrap(),
    ]);

    assert!(output.status.success());
    assert!(!String::from_utf8_lossy(&output.stderr).contains("merging segments"));
}
