//! Real subprocess execution.

use std::io::Read;
use std::process::{Child, Command, Stdio};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crate::{CommandLine, CommandOutput, CommandRunner, ExecError};

const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Spawns real processes with `std::process::Command`.
///
/// Without a timeout the call blocks until the child exits and its output pipes
/// close. With a timeout the child is killed and reaped once the deadline
/// passes; the same deadline bounds the wait for its output, so a descendant
/// that keeps the pipes open cannot stall the run either.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemRunner {
    timeout: Option<Duration>,
}

impl SystemRunner {
    #[must_use]
    pub fn new() -> Self {
        Self { timeout: None }
    }

    #[must_use]
    pub fn with_timeout(timeout: Option<Duration>) -> Self {
        Self { timeout }
    }

    #[must_use]
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }
}

impl CommandRunner for SystemRunner {
    fn run(&self, command: &CommandLine) -> Result<CommandOutput, ExecError> {
        let mut proc = Command::new(&command.program);
        proc.args(&command.args).stdin(Stdio::null());
        for (key, value) in &command.env {
            proc.env(key, value);
        }

        let Some(limit) = self.timeout else {
            let output = proc.output().map_err(|source| ExecError::Spawn {
                command: command.render(),
                source,
            })?;
            return Ok(CommandOutput::from(output));
        };

        let child = proc
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|source| ExecError::Spawn {
                command: command.render(),
                source,
            })?;
        wait_with_deadline(child, command, limit)
    }
}

fn wait_with_deadline(
    mut child: Child,
    command: &CommandLine,
    limit: Duration,
) -> Result<CommandOutput, ExecError> {
    // Drain both pipes while polling so a chatty child cannot block on a full pipe.
    let stdout = child.stdout.take().map(drain);
    let stderr = child.stderr.take().map(drain);

    let started = Instant::now();
    let status = loop {
        match child.try_wait() {
            Ok(Some(status)) => break status,
            Ok(None) if started.elapsed() >= limit => {
                let _ = child.kill();
                let _ = child.wait();
                return Err(ExecError::TimedOut {
                    command: command.render(),
                    after: limit,
                });
            }
            Ok(None) => thread::sleep(POLL_INTERVAL),
            Err(source) => {
                return Err(ExecError::Io {
                    command: command.render(),
                    source,
                });
            }
        }
    };

    let deadline = started + limit;
    Ok(CommandOutput {
        exit_code: status.code(),
        stdout: collect(stdout, command, deadline, limit)?,
        stderr: collect(stderr, command, deadline, limit)?,
    })
}

fn drain<R: Read + Send + 'static>(mut pipe: R) -> JoinHandle<std::io::Result<Vec<u8>>> {
    thread::spawn(move || {
        let mut buf = Vec::new();
        pipe.read_to_end(&mut buf)?;
        Ok(buf)
    })
}

fn collect(
    handle: Option<JoinHandle<std::io::Result<Vec<u8>>>>,
    command: &CommandLine,
    deadline: Instant,
    limit: Duration,
) -> Result<String, ExecError> {
    let Some(handle) = handle else {
        return Ok(String::new());
    };
    while !handle.is_finished() {
        // The child has exited but something it spawned still holds the pipe.
        // The reader thread is left detached and ends when that writer does.
        if Instant::now() >= deadline {
            return Err(ExecError::TimedOut {
                command: command.render(),
                after: limit,
            });
        }
        thread::sleep(POLL_INTERVAL);
    }
    let bytes = handle
        .join()
        .map_err(|_| std::io::Error::other("output reader thread panicked"))
        .and_then(|read| read)
        .map_err(|source| ExecError::Io {
            command: command.render(),
            source,
        })?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}
