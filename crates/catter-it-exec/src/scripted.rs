//! Scripted command runner for tests.
//!
//! Replies are chosen by the first matching rule; every call is recorded so
//! tests can assert on invocation order.

use parking_lot::Mutex;

use crate::{CommandLine, CommandOutput, CommandRunner, ExecError};

type Matcher = Box<dyn Fn(&CommandLine) -> bool + Send + Sync>;

#[derive(Debug, Clone)]
enum Reply {
    Output(CommandOutput),
    SpawnFailure(String),
}

struct Rule {
    matcher: Matcher,
    reply: Reply,
}

/// A [`CommandRunner`] that never spawns processes.
pub struct ScriptedRunner {
    rules: Vec<Rule>,
    fallback: Reply,
    calls: Mutex<Vec<CommandLine>>,
}

impl Default for ScriptedRunner {
    fn default() -> Self {
        Self::new()
    }
}

impl ScriptedRunner {
    /// Unmatched commands exit 127, like a shell that cannot find the program.
    #[must_use]
    pub fn new() -> Self {
        Self {
            rules: Vec::new(),
            fallback: Reply::Output(CommandOutput::failed(127, "no scripted reply")),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Reply with `output` to commands accepted by `matcher`.
    #[must_use]
    pub fn when<F>(mut self, matcher: F, output: CommandOutput) -> Self
    where
        F: Fn(&CommandLine) -> bool + Send + Sync + 'static,
    {
        self.rules.push(Rule {
            matcher: Box::new(matcher),
            reply: Reply::Output(output),
        });
        self
    }

    /// Reply with `output` when the argument list equals `args` exactly.
    #[must_use]
    pub fn on_args(self, args: &[&str], output: CommandOutput) -> Self {
        let expected: Vec<String> = args.iter().map(|a| (*a).to_string()).collect();
        self.when(move |cmd| cmd.args == expected, output)
    }

    /// Reply with `output` when any argument equals `arg`.
    #[must_use]
    pub fn on_arg(self, arg: &str, output: CommandOutput) -> Self {
        let arg = arg.to_string();
        self.when(move |cmd| cmd.args.iter().any(|a| *a == arg), output)
    }

    /// Simulate a spawn failure (missing program) for matching commands.
    #[must_use]
    pub fn fail_spawn_when<F>(mut self, matcher: F, message: impl Into<String>) -> Self
    where
        F: Fn(&CommandLine) -> bool + Send + Sync + 'static,
    {
        self.rules.push(Rule {
            matcher: Box::new(matcher),
            reply: Reply::SpawnFailure(message.into()),
        });
        self
    }

    /// Reply used when no rule matches.
    #[must_use]
    pub fn otherwise(mut self, output: CommandOutput) -> Self {
        self.fallback = Reply::Output(output);
        self
    }

    /// Every command run so far, in call order.
    #[must_use]
    pub fn calls(&self) -> Vec<CommandLine> {
        self.calls.lock().clone()
    }
}

impl CommandRunner for ScriptedRunner {
    fn run(&self, command: &CommandLine) -> Result<CommandOutput, ExecError> {
        self.calls.lock().push(command.clone());
        let reply = self
            .rules
            .iter()
            .find(|rule| (rule.matcher)(command))
            .map_or(&self.fallback, |rule| &rule.reply);
        match reply {
            Reply::Output(output) => Ok(output.clone()),
            Reply::SpawnFailure(message) => Err(ExecError::Spawn {
                command: command.render(),
                source: std::io::Error::new(std::io::ErrorKind::NotFound, message.clone()),
            }),
        }
    }
}
