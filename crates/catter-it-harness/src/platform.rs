//! Host platform policy.
//!
//! Pure mappings from the host OS and build mode to the API names the hook is
//! exercised with, the sanitizer decision, and lit's shell mode. Nothing here
//! touches the filesystem or spawns processes.

use serde::{Serialize, Serializer};

/// Process-creation entry points instrumented on Windows, in execution order.
pub const WINDOWS_APIS: &[&str] = &["CreateProcessA", "CreateProcessW"];

/// Exec-family entry points instrumented on Linux and macOS, in execution order.
pub const POSIX_APIS: &[&str] = &[
    "execve",
    "execv",
    "execvp",
    "execl",
    "posix_spawn",
    "posix_spawnp",
];

/// Operating system the harness runs on.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum HostOs {
    Windows,
    Linux,
    MacOs,
    Other(String),
}

impl HostOs {
    /// The OS this binary was compiled for.
    #[must_use]
    pub fn current() -> Self {
        Self::from_str_loose(std::env::consts::OS)
    }

    /// Parse from string (case-insensitive). Unknown names become `Other`.
    #[must_use]
    pub fn from_str_loose(s: &str) -> Self {
        let lower = s.trim().to_ascii_lowercase();
        match lower.as_str() {
            "windows" | "win32" | "win64" | "mingw" => Self::Windows,
            "linux" => Self::Linux,
            "macos" | "darwin" | "osx" => Self::MacOs,
            _ => Self::Other(lower),
        }
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Windows => "windows",
            Self::Linux => "linux",
            Self::MacOs => "macos",
            Self::Other(name) => name,
        }
    }

    /// lit feature name used by `%if system-<name>` guards in `.test` files.
    ///
    /// Follows Python's `platform.system().lower()`, so macOS is `darwin`.
    #[must_use]
    pub fn lit_system_feature(&self) -> String {
        match self {
            Self::MacOs => String::from("system-darwin"),
            other => format!("system-{}", other.as_str()),
        }
    }
}

impl Serialize for HostOs {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// Build mode reported by the build system.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum BuildMode {
    Debug,
    Release,
    ReleaseDbg,
    MinSizeRel,
    Other(String),
}

impl BuildMode {
    /// Parse from string (case-insensitive). Unknown modes become `Other`.
    #[must_use]
    pub fn from_str_loose(s: &str) -> Self {
        let lower = s.trim().to_ascii_lowercase();
        match lower.as_str() {
            "debug" => Self::Debug,
            "release" => Self::Release,
            "releasedbg" => Self::ReleaseDbg,
            "minsizerel" => Self::MinSizeRel,
            _ => Self::Other(lower),
        }
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Debug => "debug",
            Self::Release => "release",
            Self::ReleaseDbg => "releasedbg",
            Self::MinSizeRel => "minsizerel",
            Self::Other(name) => name,
        }
    }
}

impl Serialize for BuildMode {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// How lit runs `RUN:` lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ShellMode {
    /// `ShTest(True)`: hand RUN lines to an external POSIX shell.
    External,
    /// `ShTest(False)`: lit's internal shell, no POSIX shell features assumed.
    Internal,
}

/// Ordered API names to exercise on `host`. Empty means "no applicable tests".
#[must_use]
pub fn api_names_for_host(host: &HostOs) -> Vec<String> {
    let names: &[&str] = match host {
        HostOs::Windows => WINDOWS_APIS,
        HostOs::Linux | HostOs::MacOs => POSIX_APIS,
        HostOs::Other(_) => &[],
    };
    names.iter().map(|name| (*name).to_string()).collect()
}

/// Sanitizer preloading applies to debug builds on Linux only.
#[must_use]
pub fn sanitizer_required(mode: &BuildMode, host: &HostOs) -> bool {
    matches!((mode, host), (BuildMode::Debug, HostOs::Linux))
}

#[must_use]
pub fn shell_mode(host: &HostOs) -> ShellMode {
    match host {
        HostOs::Windows => ShellMode::Internal,
        _ => ShellMode::External,
    }
}
