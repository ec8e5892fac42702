//! Command execution adapter shared by harness tooling.
//!
//! Every external process the harness starts (build-system queries, compiler
//! lookups, artifact runs) goes through the [`CommandRunner`] capability, so the
//! orchestration logic can be exercised against [`ScriptedRunner`] without
//! spawning anything.

pub mod command;
pub mod scripted;
pub mod system;

use std::time::Duration;

use thiserror::Error;

pub use command::{CommandLine, CommandOutput, describe_exit, shell_quote};
pub use scripted::ScriptedRunner;
pub use system::SystemRunner;

/// Failure to obtain any output from an external command.
///
/// A command that ran and exited non-zero is *not* an `ExecError`; callers
/// inspect [`CommandOutput::exit_code`] for that.
#[derive(Debug, Error)]
pub enum ExecError {
    #[error("failed to spawn `{command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },
    #[error("i/o error while running `{command}`: {source}")]
    Io {
        command: String,
        #[source]
        source: std::io::Error,
    },
    #[error("`{command}` timed out after {after:?} and was killed")]
    TimedOut { command: String, after: Duration },
}

/// Runs one command line to completion and captures its streams.
pub trait CommandRunner {
    fn run(&self, command: &CommandLine) -> Result<CommandOutput, ExecError>;
}

impl<R: CommandRunner + ?Sized> CommandRunner for &R {
    fn run(&self, command: &CommandLine) -> Result<CommandOutput, ExecError> {
        (**self).run(command)
    }
}
