//! Artifact launch specs, optionally wrapped with a sanitizer preload.

use std::path::PathBuf;

use catter_it_exec::{CommandLine, shell_quote};
use serde::Serialize;

use crate::build_query::{ProjectDescriptor, TargetDescriptor};
use crate::error::Result;
use crate::platform::{HostOs, sanitizer_required};
use crate::sanitizer::SanitizerResolver;

/// Environment variable the dynamic loader reads for preloads.
pub const PRELOAD_VAR: &str = "LD_PRELOAD";

/// Fully resolved command to start an artifact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LaunchSpec {
    pub executable: PathBuf,
    pub env_prefix: Vec<(String, String)>,
}

impl LaunchSpec {
    #[must_use]
    pub fn bare(executable: impl Into<PathBuf>) -> Self {
        Self {
            executable: executable.into(),
            env_prefix: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_preload(executable: impl Into<PathBuf>, library: impl Into<PathBuf>) -> Self {
        Self {
            executable: executable.into(),
            env_prefix: vec![(
                PRELOAD_VAR.to_string(),
                library.into().display().to_string(),
            )],
        }
    }

    #[must_use]
    pub fn is_wrapped(&self) -> bool {
        !self.env_prefix.is_empty()
    }

    /// Command line with the prefix applied to the child environment only.
    #[must_use]
    pub fn command(&self) -> CommandLine {
        self.env_prefix.iter().fold(
            CommandLine::new(self.executable.display().to_string()),
            |cmd, (key, value)| cmd.env(key, value),
        )
    }

    /// Shell-invocable form for lit substitutions: `[KEY=value ...] <artifact>`.
    #[must_use]
    pub fn to_shell_string(&self) -> String {
        let mut out = String::new();
        for (key, value) in &self.env_prefix {
            out.push_str(&format!("{key}={} ", shell_quote(value)));
        }
        out.push_str(&shell_quote(&self.executable.display().to_string()));
        out
    }
}

/// Build the launch spec for `target`.
///
/// The artifact is wrapped only when the build/host pair requires a sanitizer
/// and the target's primary compiler resolves to a runtime library.
pub fn plan_launch(
    project: &ProjectDescriptor,
    target: &TargetDescriptor,
    host: &HostOs,
    resolver: &SanitizerResolver<'_>,
) -> Result<LaunchSpec> {
    let executable = target.resolved_path(&project.root_directory);
    if !sanitizer_required(&project.build_mode, host) {
        return Ok(LaunchSpec::bare(executable));
    }
    let Some(compiler) = target.primary_compiler() else {
        return Ok(LaunchSpec::bare(executable));
    };
    Ok(match resolver.resolve(compiler)? {
        Some(library) => LaunchSpec::with_preload(executable, library),
        None => LaunchSpec::bare(executable),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::build_query::CompilerInfo;
    use crate::platform::BuildMode;
    use catter_it_exec::{CommandOutput, ScriptedRunner};

    fn project(mode: BuildMode) -> ProjectDescriptor {
        ProjectDescriptor {
            root_directory: PathBuf::from("/src/catter"),
            build_mode: mode,
        }
    }

    fn hook(compiler: &str) -> TargetDescriptor {
        TargetDescriptor {
            name: String::from("it-catter-hook"),
            target_file: PathBuf::from("/src/catter/build/it-catter-hook"),
            compilers: vec![CompilerInfo::new(compiler)],
        }
    }

    #[test]
    fn shell_string_prefixes_preload() {
        let spec = LaunchSpec::with_preload("/b/it-catter-hook", "/usr/lib/libasan.so.8");
        assert!(spec.is_wrapped());
        assert_eq!(
            spec.to_shell_string(),
            "LD_PRELOAD=/usr/lib/libasan.so.8 /b/it-catter-hook"
        );
        let cmd = spec.command();
        assert_eq!(cmd.program, "/b/it-catter-hook");
        assert_eq!(
            cmd.env,
            vec![(String::from("LD_PRELOAD"), String::from("/usr/lib/libasan.so.8"))]
        );
    }

    #[test]
    fn bare_paths_with_spaces_are_quoted() {
        let spec = LaunchSpec::bare("/home/me/my builds/it-catter-proxy");
        assert_eq!(spec.to_shell_string(), "'/home/me/my builds/it-catter-proxy'");
    }

    #[test]
    fn release_build_is_never_wrapped() {
        let runner = ScriptedRunner::new();
        let resolver = SanitizerResolver::new(&runner);
        let spec = plan_launch(
            &project(BuildMode::Release),
            &hook("gcc"),
            &HostOs::Linux,
            &resolver,
        )
        .unwrap();
        assert_eq!(spec, LaunchSpec::bare("/src/catter/build/it-catter-hook"));
        assert!(runner.calls().is_empty());
    }

    #[test]
    fn debug_on_macos_is_never_wrapped() {
        let runner = ScriptedRunner::new();
        let resolver = SanitizerResolver::new(&runner);
        let spec = plan_launch(
            &project(BuildMode::Debug),
            &hook("clang"),
            &HostOs::MacOs,
            &resolver,
        )
        .unwrap();
        assert!(!spec.is_wrapped());
    }

    #[test]
    fn unsupported_compiler_leaves_launch_bare() {
        let runner = ScriptedRunner::new();
        let resolver = SanitizerResolver::new(&runner);
        let spec = plan_launch(
            &project(BuildMode::Debug),
            &hook("tcc"),
            &HostOs::Linux,
            &resolver,
        )
        .unwrap();
        assert!(!spec.is_wrapped());
    }

    #[test]
    fn resolution_failure_propagates() {
        let runner = ScriptedRunner::new().otherwise(CommandOutput::ok("libasan.so"));
        let resolver = SanitizerResolver::new(&runner);
        let err = plan_launch(
            &project(BuildMode::Debug),
            &hook("gcc"),
            &HostOs::Linux,
            &resolver,
        )
        .unwrap_err();
        assert!(matches!(
            err,
            crate::error::HarnessError::SanitizerResolution { .. }
        ));
    }
}
