//! Output contracts for artifact runs.

use serde::{Deserialize, Serialize};

/// Re-exec trace printed when the hook forwards `/bin/echo Hello, World!`.
pub const REEXEC_TRACE: &str = "-p 0 --exec /bin/echo -- /bin/echo Hello, World!";

/// What a successful (exit 0) artifact run must print on stdout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum OutputContract {
    /// Exit status alone decides.
    Any,
    /// Stdout must contain something other than whitespace.
    NonEmpty,
    /// Stdout must contain the given substring.
    Contains(String),
}

impl OutputContract {
    /// `Err` carries a phrase completing "its output ...".
    pub fn check(&self, stdout: &str) -> Result<(), String> {
        match self {
            Self::Any => Ok(()),
            Self::NonEmpty if stdout.trim().is_empty() => Err(String::from("is empty")),
            Self::NonEmpty => Ok(()),
            Self::Contains(needle) if stdout.contains(needle.as_str()) => Ok(()),
            Self::Contains(needle) => Err(format!("does not contain `{needle}`")),
        }
    }
}
