//! Run report for `it-harness all`.

use std::path::{Path, PathBuf};

use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::hook_runner::HookCaseResult;
use crate::proxy_runner::ProxyResult;

/// Content digest of a built artifact, so a report pins exactly what ran.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ArtifactDigest {
    pub target: String,
    pub path: PathBuf,
    pub sha256: String,
}

impl ArtifactDigest {
    pub fn of_file(target: impl Into<String>, path: &Path) -> std::io::Result<Self> {
        Ok(Self {
            target: target.into(),
            path: path.to_path_buf(),
            sha256: sha256_file(path)?,
        })
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct HarnessReport {
    pub title: String,
    pub host: String,
    pub build_mode: String,
    /// Timestamp (UTC).
    pub timestamp: String,
    pub artifacts: Vec<ArtifactDigest>,
    pub hook_cases: Vec<HookCaseResult>,
    /// `None` when the run stopped before the proxy was exercised.
    pub proxy: Option<ProxyResult>,
}

impl HarnessReport {
    #[must_use]
    pub fn to_markdown(&self) -> String {
        let mut out = String::new();
        out.push_str(&format!("# {}\n\n", self.title));
        out.push_str(&format!("- Host: {}\n", self.host));
        out.push_str(&format!("- Build mode: {}\n", self.build_mode));
        out.push_str(&format!("- Timestamp: {}\n", self.timestamp));
        out.push_str(&format!("- Hook cases: {}\n", self.hook_cases.len()));
        let proxy = if self.proxy.is_some() { "PASS" } else { "not run" };
        out.push_str(&format!("- Proxy: {proxy}\n\n"));

        if !self.artifacts.is_empty() {
            out.push_str("| Target | Path | SHA-256 |\n");
            out.push_str("|--------|------|---------|\n");
            for a in &self.artifacts {
                out.push_str(&format!(
                    "| {} | `{}` | `{}` |\n",
                    a.target,
                    a.path.display(),
                    a.sha256
                ));
            }
            out.push('\n');
        }

        if !self.hook_cases.is_empty() {
            out.push_str("| API | Duration (ms) | Status |\n");
            out.push_str("|-----|---------------|--------|\n");
            for case in &self.hook_cases {
                out.push_str(&format!(
                    "| {} | {} | PASS |\n",
                    case.api_name, case.duration_ms
                ));
            }
        }
        out
    }

    #[must_use]
    pub fn to_json(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_else(|e| format!("{{\"error\": \"{e}\"}}"))
    }
}

pub fn sha256_file(path: &Path) -> std::io::Result<String> {
    let data = std::fs::read(path)?;
    Ok(hex_lower(&Sha256::digest(&data)))
}

fn hex_lower(bytes: &[u8]) -> String {
    use std::fmt::Write;
    let mut out = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        let _ = write!(&mut out, "{b:02x}");
    }
    out
}
