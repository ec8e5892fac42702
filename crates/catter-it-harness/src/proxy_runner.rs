//! Proxy artifact driver: one argument-less run, reported back verbatim.

use std::time::Instant;

use catter_it_exec::CommandRunner;
use serde::{Deserialize, Serialize};

use crate::contract::OutputContract;
use crate::error::{HarnessError, Result};
use crate::hook_runner::{elapsed_ms, failure_entry, invocation_error, log_failure};
use crate::launch::LaunchSpec;
use crate::structured_log::{LogEmitter, LogEntry, LogLevel, Outcome};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProxyResult {
    pub command: String,
    pub stdout: String,
    pub duration_ms: u64,
}

pub struct ProxyTestRunner<'a> {
    runner: &'a dyn CommandRunner,
    target: String,
    contract: OutputContract,
}

impl<'a> ProxyTestRunner<'a> {
    /// `contract` is normally [`OutputContract::Any`]: the lit suite checks the
    /// proxy's behaviour, this runner only checks that it starts and exits 0.
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

    pub fn run(&self, launch: &LaunchSpec, log: &mut LogEmitter) -> Result<ProxyResult> {
        let command = launch.command();
        let rendered = command.render();
        let started = Instant::now();
        let run = self.runner.run(&command);
        let duration_ms = elapsed_ms(started);

        let entry = LogEntry::event(LogLevel::Info, "proxy_run")
            .with_target(&self.target)
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
                failure_entry(entry, Outcome::Fail, output.exit_code, &expectation),
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
        Ok(ProxyResult {
            command: rendered,
            stdout: output.stdout,
            duration_ms,
        })
    }
}
