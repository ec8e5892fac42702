//! Command lines and captured results.

use std::borrow::Cow;
use std::fmt;

use serde::{Deserialize, Serialize};

/// A program invocation: argv plus environment additions for the child.
///
/// No shell is involved when a `CommandLine` is executed; [`CommandLine::render`]
/// only produces a shell-equivalent string for diagnostics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandLine {
    pub program: String,
    pub args: Vec<String>,
    /// Variables set in the child's environment only, in order.
    pub env: Vec<(String, String)>,
}

impl CommandLine {
    #[must_use]
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            env: Vec::new(),
        }
    }

    #[must_use]
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    #[must_use]
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    #[must_use]
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    /// True when the argument list equals `expected` exactly.
    #[must_use]
    pub fn has_args(&self, expected: &[&str]) -> bool {
        self.args.len() == expected.len() && self.args.iter().zip(expected).all(|(a, e)| a == e)
    }

    /// Render as a POSIX shell command line (`KEY=value program args...`).
    #[must_use]
    pub fn render(&self) -> String {
        let mut parts: Vec<String> = Vec::with_capacity(self.env.len() + self.args.len() + 1);
        for (key, value) in &self.env {
            parts.push(format!("{key}={}", shell_quote(value)));
        }
        parts.push(shell_quote(&self.program).into_owned());
        parts.extend(self.args.iter().map(|arg| shell_quote(arg).into_owned()));
        parts.join(" ")
    }
}

impl fmt::Display for CommandLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render())
    }
}

/// Captured result of one finished command.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandOutput {
    /// `None` when the child was terminated by a signal.
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    /// Exit 0 with the given stdout.
    #[must_use]
    pub fn ok(stdout: impl Into<String>) -> Self {
        Self {
            exit_code: Some(0),
            stdout: stdout.into(),
            stderr: String::new(),
        }
    }

    /// Non-zero exit with the given stderr.
    #[must_use]
    pub fn failed(exit_code: i32, stderr: impl Into<String>) -> Self {
        Self {
            exit_code: Some(exit_code),
            stdout: String::new(),
            stderr: stderr.into(),
        }
    }

    #[must_use]
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }

    /// Human-readable exit status (`exit code 3`, `no exit code`).
    #[must_use]
    pub fn status_text(&self) -> String {
        describe_exit(self.exit_code)
    }
}

impl From<std::process::Output> for CommandOutput {
    fn from(output: std::process::Output) -> Self {
        Self {
            exit_code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        }
    }
}

#[must_use]
pub fn describe_exit(exit_code: Option<i32>) -> String {
    match exit_code {
        Some(code) => format!("exit code {code}"),
        None => String::from("no exit code"),
    }
}

/// Quote `word` for a POSIX shell, leaving plain words untouched.
#[must_use]
pub fn shell_quote(word: &str) -> Cow<'_, str> {
    let plain = !word.is_empty()
        && word
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "-_./:=+,%@".contains(c));
    if plain {
        Cow::Borrowed(word)
    } else {
        Cow::Owned(format!("'{}'", word.replace('\'', r"'\''")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_words_are_not_quoted() {
        assert_eq!(shell_quote("/usr/bin/it-catter-hook"), "/usr/bin/it-catter-hook");
        assert_eq!(shell_quote("--test"), "--test");
    }

    #[test]
    fn words_with_spaces_and_quotes_are_quoted() {
        assert_eq!(shell_quote("a b"), "'a b'");
        assert_eq!(shell_quote("it's"), r"'it'\''s'");
        assert_eq!(shell_quote(""), "''");
    }

    #[test]
    fn render_puts_env_before_program() {
        let cmd = CommandLine::new("/opt/hook")
            .env("LD_PRELOAD", "/lib/libasan.so")
            .args(["--test", "execve"]);
        assert_eq!(cmd.render(), "LD_PRELOAD=/lib/libasan.so /opt/hook --test execve");
        assert_eq!(cmd.to_string(), cmd.render());
    }

    #[test]
    fn has_args_requires_exact_match() {
        let cmd = CommandLine::new("xmake").args(["show", "--json"]);
        assert!(cmd.has_args(&["show", "--json"]));
        assert!(!cmd.has_args(&["show"]));
        assert!(!cmd.has_args(&["show", "-t", "x", "--json"]));
    }

    #[test]
    fn output_status_helpers() {
        assert!(CommandOutput::ok("hi").success());
        let failed = CommandOutput::failed(2, "nope");
        assert!(!failed.success());
        assert_eq!(failed.status_text(), "exit code 2");
        let killed = CommandOutput {
            exit_code: None,
            ..CommandOutput::default()
        };
        assert_eq!(killed.status_text(), "no exit code");
    }
}
