//! Hook artifact driver.
//!
//! Runs `<hook> --test <api>` once per API name, in order, and stops at the
//! first failure so the failing entry point is unambiguous.

use std::time::Instant;

use catter_it_exec::{CommandOutput, CommandRunner};
use serde::{Deserialize, Serialize};

use crate::contract::OutputContract;
use crate::error::{HarnessError, Result};
use crate::launch::LaunchSpec;
use crate::structured_log::{LogEmitter, LogEntry, LogLevel, Outcome};

/// One passing hook invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HookCaseResult {
    pub api_name: String,
    pub command: String,
    pub stdout: String,
    pub duration_ms: u64,
}

pub struct HookTestRunner<'a> {
    runner: &'a dyn CommandRunner,
    target: String,
    contract: OutputContract,
}

impl<'a> HookTestRunner<'a> {
    #[must_use]
    pub fn new(
        runner: &'a dyn CommandRunner,
        target: impl Into<String>,
        contract: OutputContract,
    ) -> Self {
        Self {
            runner,
            target: target.into(),
            contract,
        }
    }

    /// Exercise every name in `api_names`; fail fast on the first bad case.
    pub fn run(
        &self,
        launch: &LaunchSpec,
        api_names: &[String],
        log: &mut LogEmitter,
    ) -> Result<Vec<HookCaseResult>> {
        self.run_reporting(launch, api_names, log, |_| {})
    }

    /// Like [`HookTestRunner::run`], handing each passing case to `on_pass`
    /// as soon as it completes, before the next name is tried.
    pub fn run_reporting<F>(
        &self,
        launch: &LaunchSpec,
        api_names: &[String],
        log: &mut LogEmitter,
        mut on_pass: F,
    ) -> Result<Vec<HookCaseResult>>
    where
        F: FnMut(&HookCaseResult),
    {
        let mut results = Vec::with_capacity(api_names.len());
        for api_name in api_names {
            let command = launch.command().args(["--test", api_name.as_str()]);
            let rendered = command.render();
            let started = Instant::now();
            let run = self.runner.run(&command);
            let duration_ms = elapsed_ms(started);

            let entry = LogEntry::event(LogLevel::Info, "hook_case")
                .with_target(&self.target)
                .with_api_name(api_name)
                .with_command(&rendered)
                .with_duration_ms(duration_ms);

            let output = match run {
                Ok(output) => output,
                Err(err) => {
                    let message = err.to_string();
                    log_failure(log, failure_entry(entry, Outcome::Error, None, &message));
                    return Err(HarnessError::ArtifactInvocation {
                        command: rendered,
                        exit_code: None,
                        stderr: message,
                    });
                }
            };

            if !output.success() {
                log_failure(
                    log,
                    failure_entry(entry, Outcome::Fail, output.exit_code, &output.stderr),
                );
                return Err(invocation_error(rendered, output));
            }

            if let Err(expectation) = self.contract.check(&output.stdout) {
                log_failure(
                    log,
                    failure_entry(entry, Outcome::Fail, output.exit_code, &expectation)
                        .with_details(serde_json::json!({
                            "expectation": expectation,
                            "stdout": output.stdout,
                            "stderr": output.stderr,
                        })),
                );
                return Err(HarnessError::UnexpectedOutput {
                    command: rendered,
                    expectation,
                    stdout: output.stdout,
                    stderr: output.stderr,
                });
            }

            log.emit_entry(
                entry
                    .with_outcome(Outcome::Pass)
                    .with_exit_code(output.exit_code)
                    .with_details(serde_json::json!({ "stdout": output.stdout })),
            )?;
            let case = HookCaseResult {
                api_name: api_name.clone(),
                command: rendered,
                stdout: output.stdout,
                duration_ms,
            };
            on_pass(&case);
            results.push(case);
        }
        Ok(results)
    }
}

pub(crate) fn invocation_error(command: String, output: CommandOutput) -> HarnessError {
    HarnessError::ArtifactInvocation {
        command,
        exit_code: output.exit_code,
        stderr: output.stderr,
    }
}

/// Record a failure without letting a broken log mask the artifact error.
pub(crate) fn log_failure(log: &mut LogEmitter, entry: LogEntry) {
    let _ = log.emit_entry(entry);
}

pub(crate) fn failure_entry(
    entry: LogEntry,
    outcome: Outcome,
    exit_code: Option<i32>,
    message: &str,
) -> LogEntry {
    let mut entry = entry
        .with_outcome(outcome)
        .with_exit_code(exit_code)
        .with_details(serde_json::json!({ "message": message }));
    entry.level = LogLevel::Error;
    entry
}

pub(crate) fn elapsed_ms(started: Instant) -> u64 {
    u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contract::REEXEC_TRACE;
    use catter_it_exec::ScriptedRunner;

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| (*s).to_string()).collect()
    }

    fn hook_launch() -> LaunchSpec {
        LaunchSpec::bare("/b/it-catter-hook")
    }

    #[test]
    fn runs_every_name_in_order() {
        let runner = ScriptedRunner::new().on_arg("--test", CommandOutput::ok("ok"));
        let mut log = LogEmitter::disabled("catter-it", "unit");
        let results = HookTestRunner::new(&runner, "it-catter-hook", OutputContract::NonEmpty)
            .run(&hook_launch(), &names(&["execve", "execv"]), &mut log)
            .unwrap();

        assert_eq!(results.len(), 2);
        assert_eq!(results[0].api_name, "execve");
        assert_eq!(results[1].command, "/b/it-catter-hook --test execv");
        let calls = runner.calls();
        assert_eq!(calls[0].args, names(&["--test", "execve"]));
        assert_eq!(calls[1].args, names(&["--test", "execv"]));
        assert_eq!(log.emitted(), 2);
    }

    #[test]
    fn stops_at_first_non_zero_exit() {
        let runner = ScriptedRunner::new()
            .on_arg("execv", CommandOutput::failed(1, "execv: Permission denied"))
            .on_arg("--test", CommandOutput::ok("ok"));
        let mut log = LogEmitter::disabled("catter-it", "unit");
        let err = HookTestRunner::new(&runner, "it-catter-hook", OutputContract::NonEmpty)
            .run(
                &hook_launch(),
                &names(&["execve", "execv", "execvp"]),
                &mut log,
            )
            .unwrap_err();

        match err {
            HarnessError::ArtifactInvocation {
                command,
                exit_code,
                stderr,
            } => {
                assert_eq!(command, "/b/it-catter-hook --test execv");
                assert_eq!(exit_code, Some(1));
                assert!(stderr.contains("Permission denied"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(runner.calls().len(), 2, "execvp must not run");
    }

    #[test]
    fn empty_stdout_breaks_non_empty_contract() {
        let runner = ScriptedRunner::new().otherwise(CommandOutput::ok("\n"));
        let mut log = LogEmitter::disabled("catter-it", "unit");
        let err = HookTestRunner::new(&runner, "it-catter-hook", OutputContract::NonEmpty)
            .run(&hook_launch(), &names(&["execl"]), &mut log)
            .unwrap_err();
        assert!(matches!(err, HarnessError::UnexpectedOutput { .. }));
    }

    #[test]
    fn strict_contract_requires_reexec_trace() {
        let runner = ScriptedRunner::new()
            .on_arg("posix_spawn", CommandOutput::ok(format!("{REEXEC_TRACE}\n")))
            .on_arg("posix_spawnp", CommandOutput::ok("Hello, World!\n"));
        let mut log = LogEmitter::disabled("catter-it", "unit");
        let hook = HookTestRunner::new(
            &runner,
            "it-catter-hook",
            OutputContract::Contains(REEXEC_TRACE.to_string()),
        );
        let err = hook
            .run(
                &hook_launch(),
                &names(&["posix_spawn", "posix_spawnp"]),
                &mut log,
            )
            .unwrap_err();
        match err {
            HarnessError::UnexpectedOutput {
                command, stdout, ..
            } => {
                assert!(command.ends_with("--test posix_spawnp"));
                assert_eq!(stdout, "Hello, World!\n");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn spawn_failure_is_invocation_error() {
        let runner = ScriptedRunner::new().fail_spawn_when(|_| true, "No such file");
        let mut log = LogEmitter::disabled("catter-it", "unit");
        let err = HookTestRunner::new(&runner, "it-catter-hook", OutputContract::Any)
            .run(&hook_launch(), &names(&["execve"]), &mut log)
            .unwrap_err();
        assert!(matches!(
            err,
            HarnessError::ArtifactInvocation {
                exit_code: None,
                ..
            }
        ));
    }

    #[test]
    fn passing_cases_are_reported_before_a_later_failure() {
        let runner = ScriptedRunner::new()
            .on_arg("execv", CommandOutput::failed(1, "execv: not intercepted"))
            .on_arg("--test", CommandOutput::ok("execve forwarded\n"));
        let mut log = LogEmitter::disabled("catter-it", "unit");
        let mut reported = Vec::new();
        let err = HookTestRunner::new(&runner, "it-catter-hook", OutputContract::NonEmpty)
            .run_reporting(
                &hook_launch(),
                &names(&["execve", "execv"]),
                &mut log,
                |case| reported.push((case.api_name.clone(), case.stdout.clone())),
            )
            .unwrap_err();

        assert!(matches!(err, HarnessError::ArtifactInvocation { .. }));
        assert_eq!(
            reported,
            vec![(String::from("execve"), String::from("execve forwarded\n"))]
        );
    }

    struct BrokenLog;

    impl std::io::Write for BrokenLog {
        fn write(&mut self, _buf: &[u8]) -> std::io::Result<usize> {
            Err(std::io::Error::other("disk full"))
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn broken_log_does_not_mask_case_failure() {
        let runner = ScriptedRunner::new().otherwise(CommandOutput::failed(2, "hook crashed"));
        let mut log = LogEmitter::to_writer(Box::new(BrokenLog), "catter-it", "unit");
        let err = HookTestRunner::new(&runner, "it-catter-hook", OutputContract::NonEmpty)
            .run(&hook_launch(), &names(&["execve"]), &mut log)
            .unwrap_err();
        assert!(
            matches!(err, HarnessError::ArtifactInvocation { exit_code: Some(2), .. }),
            "got {err:?}"
        );

        let runner = ScriptedRunner::new().otherwise(CommandOutput::ok(""));
        let err = HookTestRunner::new(&runner, "it-catter-hook", OutputContract::NonEmpty)
            .run(&hook_launch(), &names(&["execve"]), &mut log)
            .unwrap_err();
        assert!(matches!(err, HarnessError::UnexpectedOutput { .. }), "got {err:?}");
    }

    #[test]
    fn no_names_means_no_invocations() {
        let runner = ScriptedRunner::new();
        let mut log = LogEmitter::disabled("catter-it", "unit");
        let results = HookTestRunner::new(&runner, "it-catter-hook", OutputContract::NonEmpty)
            .run(&hook_launch(), &[], &mut log)
            .unwrap();
        assert!(results.is_empty());
        assert!(runner.calls().is_empty());
    }

    #[test]
    fn preload_reaches_each_invocation() {
        let runner = ScriptedRunner::new().otherwise(CommandOutput::ok("ok"));
        let mut log = LogEmitter::disabled("catter-it", "unit");
        let launch = LaunchSpec::with_preload("/b/it-catter-hook", "/usr/lib/libasan.so");
        HookTestRunner::new(&runner, "it-catter-hook", OutputContract::NonEmpty)
            .run(&launch, &names(&["execve"]), &mut log)
            .unwrap();
        let call = &runner.calls()[0];
        assert_eq!(call.env[0].0, "LD_PRELOAD");
        assert_eq!(call.env[0].1, "/usr/lib/libasan.so");
    }
}
