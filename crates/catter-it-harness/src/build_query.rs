//! Build-system introspection.
//!
//! Artifact paths and toolchain metadata come from the build system
//! (`xmake show --json`, `xmake show -t <target> --json`) instead of being
//! hardcoded. Each query is one external invocation; nothing is cached.

use std::path::{Path, PathBuf};

use catter_it_exec::{CommandLine, CommandRunner};
use serde::Serialize;
use serde_json::Value;

use crate::error::{HarnessError, Result};
use crate::platform::BuildMode;

/// Project-wide facts for one harness run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProjectDescriptor {
    pub root_directory: PathBuf,
    pub build_mode: BuildMode,
}

/// Compiler families with a known sanitizer runtime layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CompilerFamily {
    Gcc,
    Clang,
    Unsupported,
}

/// A compiler used to build a target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CompilerInfo {
    /// Program path or bare name, as the build system reports it.
    pub program: String,
}

impl CompilerInfo {
    #[must_use]
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    /// Classify by file name: `x86_64-linux-gnu-gcc-13` is GCC, `clang++-18`
    /// is Clang, `clang-cl` and anything else is unsupported.
    #[must_use]
    pub fn family(&self) -> CompilerFamily {
        let file_name = Path::new(&self.program)
            .file_name()
            .and_then(|name| name.to_str())
            .unwrap_or(&self.program)
            .to_ascii_lowercase();
        let name = file_name.strip_suffix(".exe").unwrap_or(&file_name);

        if name.starts_with("clang-cl") {
            CompilerFamily::Unsupported
        } else if name.contains("clang") {
            CompilerFamily::Clang
        } else if name.contains("gcc") || name.contains("g++") {
            CompilerFamily::Gcc
        } else {
            CompilerFamily::Unsupported
        }
    }
}

/// One named build target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TargetDescriptor {
    pub name: String,
    pub target_file: PathBuf,
    pub compilers: Vec<CompilerInfo>,
}

impl TargetDescriptor {
    /// The compiler whose sanitizer runtime is preloaded.
    #[must_use]
    pub fn primary_compiler(&self) -> Option<&CompilerInfo> {
        self.compilers.first()
    }

    /// Artifact path, with relative paths taken from the project root.
    #[must_use]
    pub fn resolved_path(&self, project_root: &Path) -> PathBuf {
        if self.target_file.is_absolute() {
            self.target_file.clone()
        } else {
            project_root.join(&self.target_file)
        }
    }
}

/// Issues build-system queries through a [`CommandRunner`].
pub struct BuildIntrospectionClient<'a> {
    runner: &'a dyn CommandRunner,
    program: String,
}

impl<'a> BuildIntrospectionClient<'a> {
    #[must_use]
    pub fn new(runner: &'a dyn CommandRunner, program: impl Into<String>) -> Self {
        Self {
            runner,
            program: program.into(),
        }
    }

    /// `xmake show --json` → `project.projectdir`, `project.mode`.
    pub fn query_project(&self) -> Result<ProjectDescriptor> {
        let command = CommandLine::new(&self.program).args(["show", "--json"]);
        let doc = self.query_json(&command)?;

        let root = required_str(&doc, "/project/projectdir", &command)?;
        let mode = required_str(&doc, "/project/mode", &command)?;
        Ok(ProjectDescriptor {
            root_directory: PathBuf::from(root),
            build_mode: BuildMode::from_str_loose(mode),
        })
    }

    /// `xmake show -t <name> --json` → `targetfile`, `compilers[].program`.
    pub fn query_target(&self, name: &str) -> Result<TargetDescriptor> {
        let command = CommandLine::new(&self.program).args(["show", "-t", name, "--json"]);
        let doc = self.query_json(&command)?;

        let target_file = required_str(&doc, "/targetfile", &command)?;
        let compilers = match doc.get("compilers") {
            None | Some(Value::Null) => Vec::new(),
            Some(Value::Array(entries)) => entries
                .iter()
                .enumerate()
                .map(|(idx, entry)| {
                    entry
                        .get("program")
                        .and_then(Value::as_str)
                        .filter(|program| !program.trim().is_empty())
                        .map(CompilerInfo::new)
                        .ok_or_else(|| {
                            query_error(&command, format!("compilers[{idx}].program is missing"))
                        })
                })
                .collect::<Result<Vec<_>>>()?,
            Some(_) => return Err(query_error(&command, "`compilers` is not an array")),
        };

        Ok(TargetDescriptor {
            name: name.to_string(),
            target_file: PathBuf::from(target_file),
            compilers,
        })
    }

    fn query_json(&self, command: &CommandLine) -> Result<Value> {
        let output = self
            .runner
            .run(command)
            .map_err(|err| query_error(command, err.to_string()))?;

        if !output.success() {
            return Err(query_error(
                command,
                format!("{}:\n{}", output.status_text(), output.stderr.trim_end()),
            ));
        }

        serde_json::from_str(&output.stdout).map_err(|err| {
            query_error(
                command,
                format!("unparseable JSON ({err}); output was: {}", output.stdout.trim()),
            )
        })
    }
}

fn required_str<'v>(doc: &'v Value, pointer: &str, command: &CommandLine) -> Result<&'v str> {
    doc.pointer(pointer)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .ok_or_else(|| query_error(command, format!("field `{pointer}` is missing or empty")))
}

fn query_error(command: &CommandLine, reason: impl Into<String>) -> HarnessError {
    HarnessError::BuildQuery {
        command: command.render(),
        reason: reason.into(),
    }
}
