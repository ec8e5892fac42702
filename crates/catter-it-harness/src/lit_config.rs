//! lit configuration for the shell-test suite.
//!
//! The emitter builds one immutable [`LitConfig`] per run. It is rendered as a
//! `lit.cfg.py` fragment (or JSON) and handed to lit, which then runs the
//! `.test` files under `tests/integration/test` with the two artifact
//! substitutions below.

use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::build_query::{ProjectDescriptor, TargetDescriptor};
use crate::error::Result;
use crate::launch::plan_launch;
use crate::platform::{HostOs, ShellMode, shell_mode};
use crate::sanitizer::SanitizerResolver;

pub const SUITE_NAME: &str = "Catter Integration Test";
pub const HOOK_TOKEN: &str = "%it_catter_hook";
pub const PROXY_TOKEN: &str = "%it_catter_proxy";
pub const DEFAULT_SUFFIX: &str = ".test";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Substitution {
    pub token: String,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LitConfig {
    pub name: String,
    pub test_format: ShellMode,
    pub suffixes: Vec<String>,
    pub test_source_root: PathBuf,
    pub test_exec_root: PathBuf,
    pub substitutions: Vec<Substitution>,
    pub available_features: Vec<String>,
}

impl LitConfig {
    #[must_use]
    pub fn substitution(&self, token: &str) -> Option<&str> {
        self.substitutions
            .iter()
            .find(|sub| sub.token == token)
            .map(|sub| sub.value.as_str())
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(|err| std::io::Error::other(err).into())
    }

    /// Render as Python assigning onto lit's `config` object.
    #[must_use]
    pub fn to_python(&self) -> String {
        let external = match self.test_format {
            ShellMode::External => "True",
            ShellMode::Internal => "False",
        };
        let suffixes: Vec<String> = self.suffixes.iter().map(|s| py_str(s)).collect();

        let mut out = String::new();
        out.push_str("# ruff: noqa: F821\n");
        out.push_str("# Generated by it-harness; regenerate instead of editing.\n");
        out.push_str("import lit.formats\n\n");
        out.push_str(&format!("config.name = {}\n", py_str(&self.name)));
        out.push_str(&format!(
            "config.test_format = lit.formats.ShTest({external})\n"
        ));
        out.push_str(&format!("config.suffixes = [{}]\n", suffixes.join(", ")));
        out.push_str(&format!(
            "config.test_source_root = {}\n",
            py_path(&self.test_source_root)
        ));
        out.push_str(&format!(
            "config.test_exec_root = {}\n",
            py_path(&self.test_exec_root)
        ));
        for sub in &self.substitutions {
            out.push_str(&format!(
                "config.substitutions.append(({}, {}))\n",
                py_str(&sub.token),
                py_str(&sub.value)
            ));
        }
        for feature in &self.available_features {
            out.push_str(&format!(
                "config.available_features.add({})\n",
                py_str(feature)
            ));
        }
        out
    }
}

pub struct LitConfigEmitter<'a> {
    resolver: &'a SanitizerResolver<'a>,
    extra_suffixes: Vec<String>,
}

impl<'a> LitConfigEmitter<'a> {
    #[must_use]
    pub fn new(resolver: &'a SanitizerResolver<'a>) -> Self {
        Self {
            resolver,
            extra_suffixes: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_extra_suffixes(mut self, suffixes: Vec<String>) -> Self {
        self.extra_suffixes = suffixes;
        self
    }

    pub fn emit(
        &self,
        project: &ProjectDescriptor,
        hook: &TargetDescriptor,
        proxy: &TargetDescriptor,
        host: &HostOs,
    ) -> Result<LitConfig> {
        let hook_launch = plan_launch(project, hook, host, self.resolver)?;
        let proxy_launch = plan_launch(project, proxy, host, self.resolver)?;

        let mut suffixes = vec![DEFAULT_SUFFIX.to_string()];
        for suffix in &self.extra_suffixes {
            if !suffixes.contains(suffix) {
                suffixes.push(suffix.clone());
            }
        }

        let root = &project.root_directory;
        Ok(LitConfig {
            name: SUITE_NAME.to_string(),
            test_format: shell_mode(host),
            suffixes,
            test_source_root: test_source_root(root),
            test_exec_root: root.join("build").join("lit-tests"),
            substitutions: vec![
                Substitution {
                    token: HOOK_TOKEN.to_string(),
                    value: hook_launch.to_shell_string(),
                },
                Substitution {
                    token: PROXY_TOKEN.to_string(),
                    value: proxy_launch.to_shell_string(),
                },
            ],
            available_features: vec![host.lit_system_feature()],
        })
    }
}

#[must_use]
pub fn test_source_root(project_root: &Path) -> PathBuf {
    project_root.join("tests").join("integration").join("test")
}

fn py_path(path: &Path) -> String {
    py_str(&path.display().to_string())
}

/// Double-quoted Python string literal.
fn py_str(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if c.is_control() => out.push_str(&format!("\\x{:02x}", u32::from(c))),
            c => out.push(c),
        }
    }
    out.push('"');
    out
}
