//! Harness error taxonomy. Every variant is fatal to the current run.

use catter_it_exec::describe_exit;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum HarnessError {
    /// Build-system introspection failed or returned unusable data.
    #[error("build query `{command}` failed: {reason}")]
    BuildQuery { command: String, reason: String },

    /// A compiler that claims sanitizer support gave no usable runtime path.
    #[error("cannot resolve sanitizer runtime for compiler `{compiler}`: {reason}")]
    SanitizerResolution { compiler: String, reason: String },

    /// The hook or proxy artifact could not be run or exited non-zero.
    #[error("`{command}` failed ({}):\n{stderr}", exit_text(.exit_code))]
    ArtifactInvocation {
        command: String,
        exit_code: Option<i32>,
        stderr: String,
    },

    /// The artifact exited 0 but its output broke the configured contract.
    #[error(
        "`{command}` exited 0 but its output {expectation}\n--- stdout ---\n{stdout}\n--- stderr ---\n{stderr}"
    )]
    UnexpectedOutput {
        command: String,
        expectation: String,
        stdout: String,
        stderr: String,
    },

    #[error("host `{host}` has no process-creation APIs to exercise")]
    UnsupportedPlatform { host: String },

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, HarnessError>;

fn exit_text(exit_code: &Option<i32>) -> String {
    describe_exit(*exit_code)
}
