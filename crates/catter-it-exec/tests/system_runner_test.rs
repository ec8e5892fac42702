//! Integration test: real subprocess execution through `SystemRunner`.
//!
//! Run: cargo test -p catter-it-exec --test system_runner_test

#![cfg(unix)]

use std::time::{Duration, Instant};

use catter_it_exec::{CommandLine, CommandRunner, ExecError, SystemRunner};

fn sh(script: &str) -> CommandLine {
    CommandLine::new("/bin/sh").args(["-c", script])
}

#[test]
fn captures_stdout_stderr_and_exit_code() {
    let out = SystemRunner::new()
        .run(&sh("echo hello; echo oops >&2; exit 3"))
        .unwrap();
    assert_eq!(out.exit_code, Some(3));
    assert_eq!(out.stdout.trim(), "hello");
    assert_eq!(out.stderr.trim(), "oops");
}

#[test]
fn env_additions_reach_only_the_child() {
    let out = SystemRunner::new()
        .run(&sh("printf '%s' \"$CATTER_IT_CHILD_VAR\"").env("CATTER_IT_CHILD_VAR", "preloaded"))
        .unwrap();
    assert!(out.success());
    assert_eq!(out.stdout, "preloaded");
    assert!(std::env::var("CATTER_IT_CHILD_VAR").is_err());
}

#[test]
fn missing_program_is_a_spawn_error() {
    let err = SystemRunner::new()
        .run(&CommandLine::new("/nonexistent/catter-it-no-such-program"))
        .unwrap_err();
    assert!(matches!(err, ExecError::Spawn { .. }), "got {err:?}");
}

#[test]
fn deadline_runner_still_captures_output() {
    let runner = SystemRunner::with_timeout(Some(Duration::from_secs(30)));
    let out = runner.run(&sh("seq 1 20000; exit 0")).unwrap();
    assert!(out.success());
    assert_eq!(out.stdout.lines().count(), 20000);
}

#[test]
fn hung_child_is_killed_at_deadline() {
    let runner = SystemRunner::with_timeout(Some(Duration::from_millis(200)));
    let started = Instant::now();
    let err = runner.run(&sh("exec sleep 30")).unwrap_err();
    assert!(matches!(err, ExecError::TimedOut { .. }), "got {err:?}");
    assert!(started.elapsed() < Duration::from_secs(10));
}

#[test]
fn inherited_pipe_does_not_outlive_deadline() {
    let runner = SystemRunner::with_timeout(Some(Duration::from_millis(300)));
    let started = Instant::now();
    // The shell exits at once; the background sleep keeps stdout open.
    let err = runner.run(&sh("sleep 5 & echo started")).unwrap_err();
    assert!(matches!(err, ExecError::TimedOut { .. }), "got {err:?}");
    assert!(started.elapsed() < Duration::from_secs(4));
}
