//! AddressSanitizer runtime resolution.
//!
//! The compiler is asked where its runtime shared object lives via
//! `-print-file-name=<lib>`. A compiler that cannot find the file echoes the
//! bare name back, which is how a missing sanitizer toolchain shows up.

use std::path::{Path, PathBuf};

use catter_it_exec::{CommandLine, CommandRunner};

use crate::build_query::{CompilerFamily, CompilerInfo};
use crate::error::{HarnessError, Result};

/// Runtime library names to look up, most specific first.
#[must_use]
pub fn runtime_candidates(family: CompilerFamily, arch: &str) -> Vec<String> {
    match family {
        CompilerFamily::Gcc => vec![String::from("libasan.so")],
        // Older layouts suffix the arch; per-target runtime dirs do not.
        CompilerFamily::Clang => vec![
            format!("libclang_rt.asan-{arch}.so"),
            String::from("libclang_rt.asan.so"),
        ],
        CompilerFamily::Unsupported => Vec::new(),
    }
}

pub struct SanitizerResolver<'a> {
    runner: &'a dyn CommandRunner,
    arch: String,
}

impl<'a> SanitizerResolver<'a> {
    #[must_use]
    pub fn new(runner: &'a dyn CommandRunner) -> Self {
        Self::with_arch(runner, std::env::consts::ARCH)
    }

    #[must_use]
    pub fn with_arch(runner: &'a dyn CommandRunner, arch: impl Into<String>) -> Self {
        Self {
            runner,
            arch: arch.into(),
        }
    }

    /// Absolute path of the compiler's sanitizer runtime.
    ///
    /// `Ok(None)` means the compiler family is not supported and no preload
    /// should happen.
    pub fn resolve(&self, compiler: &CompilerInfo) -> Result<Option<PathBuf>> {
        let candidates = runtime_candidates(compiler.family(), &self.arch);
        if candidates.is_empty() {
            return Ok(None);
        }

        let mut last_printed = String::new();
        for lib in candidates {
            let command =
                CommandLine::new(&compiler.program).arg(format!("-print-file-name={lib}"));
            let output = self
                .runner
                .run(&command)
                .map_err(|err| resolution_error(compiler, err.to_string()))?;
            if !output.success() {
                return Err(resolution_error(
                    compiler,
                    format!(
                        "`{command}` failed ({}): {}",
                        output.status_text(),
                        output.stderr.trim()
                    ),
                ));
            }

            let printed = output.stdout.trim();
            let path = Path::new(printed);
            if path.is_absolute() && path.exists() {
                return Ok(Some(path.to_path_buf()));
            }
            last_printed = printed.to_string();
        }

        Err(resolution_error(
            compiler,
            format!("compiler printed `{last_printed}`, which is not an absolute path to an existing file"),
        ))
    }
}

fn resolution_error(compiler: &CompilerInfo, reason: String) -> HarnessError {
    HarnessError::SanitizerResolution {
        compiler: compiler.program.clone(),
        reason,
    }
}
