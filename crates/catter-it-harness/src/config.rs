//! Harness configuration.
//!
//! Precedence, lowest to highest: built-in defaults, a JSON file passed with
//! `--config`, `CATTER_IT_*` environment variables, command-line flags.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::contract::{OutputContract, REEXEC_TRACE};
use crate::error::{HarnessError, Result};
use crate::platform::{HostOs, api_names_for_host};

pub const ENV_BUILD_TOOL: &str = "CATTER_IT_BUILD_TOOL";
pub const ENV_TIMEOUT_SECS: &str = "CATTER_IT_TIMEOUT_SECS";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct HarnessConfig {
    /// Build-system program answering `show --json` queries.
    pub build_tool: String,
    pub hook_target: String,
    pub proxy_target: String,
    /// Replaces the platform's API list when set.
    pub api_names: Option<Vec<String>>,
    pub hook_contract: OutputContract,
    pub proxy_contract: OutputContract,
    /// Test-file suffixes recognized by lit in addition to `.test`.
    pub extra_suffixes: Vec<String>,
    /// Treat an empty API list as an error instead of "nothing to run".
    pub require_tests: bool,
    /// Kill any external command still running after this many seconds.
    pub timeout_secs: Option<u64>,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            build_tool: String::from("xmake"),
            hook_target: String::from("it-catter-hook"),
            proxy_target: String::from("it-catter-proxy"),
            api_names: None,
            hook_contract: OutputContract::NonEmpty,
            proxy_contract: OutputContract::Any,
            extra_suffixes: Vec::new(),
            require_tests: false,
            timeout_secs: None,
        }
    }
}

impl HarnessConfig {
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|err| HarnessError::Config(err.to_string()))
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json(&content)
            .map_err(|err| HarnessError::Config(format!("{}: {err}", path.display())))
    }

    /// Apply `CATTER_IT_*` overrides from the process environment.
    pub fn apply_env(&mut self) -> Result<()> {
        self.apply_env_from(|key| std::env::var(key).ok())
    }

    pub fn apply_env_from<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(tool) = lookup(ENV_BUILD_TOOL).filter(|v| !v.trim().is_empty()) {
            self.build_tool = tool.trim().to_string();
        }
        if let Some(raw) = lookup(ENV_TIMEOUT_SECS).filter(|v| !v.trim().is_empty()) {
            let secs = raw.trim().parse::<u64>().map_err(|err| {
                HarnessError::Config(format!("{ENV_TIMEOUT_SECS}='{raw}' is not a number: {err}"))
            })?;
            self.timeout_secs = Some(secs);
        }
        Ok(())
    }

    /// Stricter variant: both artifacts must print the hook's re-exec trace.
    #[must_use]
    pub fn strict(mut self) -> Self {
        self.hook_contract = OutputContract::Contains(REEXEC_TRACE.to_string());
        self.proxy_contract = OutputContract::Contains(REEXEC_TRACE.to_string());
        self
    }

    /// API names for `host`, honouring an explicit override.
    #[must_use]
    pub fn api_names_for(&self, host: &HostOs) -> Vec<String> {
        self.api_names
            .clone()
            .unwrap_or_else(|| api_names_for_host(host))
    }

    #[must_use]
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }

    pub fn validate(&self) -> Result<()> {
        for (field, value) in [
            ("build_tool", &self.build_tool),
            ("hook_target", &self.hook_target),
            ("proxy_target", &self.proxy_target),
        ] {
            if value.trim().is_empty() {
                return Err(HarnessError::Config(format!("{field} must not be empty")));
            }
        }
        if let Some(names) = &self.api_names
            && let Some(bad) = names.iter().find(|name| name.trim().is_empty())
        {
            return Err(HarnessError::Config(format!(
                "api_names contains an empty entry: {bad:?}"
            )));
        }
        if let Some(bad) = self
            .extra_suffixes
            .iter()
            .find(|suffix| !suffix.starts_with('.') || suffix.len() < 2)
        {
            return Err(HarnessError::Config(format!(
                "suffix '{bad}' must look like '.ext'"
            )));
        }
        if self.timeout_secs == Some(0) {
            return Err(HarnessError::Config(String::from(
                "timeout_secs must be greater than zero",
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_project_layout() {
        let cfg = HarnessConfig::default();
        assert_eq!(cfg.build_tool, "xmake");
        assert_eq!(cfg.hook_target, "it-catter-hook");
        assert_eq!(cfg.proxy_target, "it-catter-proxy");
        assert_eq!(cfg.hook_contract, OutputContract::NonEmpty);
        assert_eq!(cfg.proxy_contract, OutputContract::Any);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let cfg = HarnessConfig::from_json(
            r#"{"api_names":["execve","execv"],"extra_suffixes":[".cc"],"timeout_secs":30}"#,
        )
        .unwrap();
        assert_eq!(cfg.build_tool, "xmake");
        assert_eq!(cfg.api_names_for(&HostOs::Windows), vec!["execve", "execv"]);
        assert_eq!(cfg.timeout(), Some(Duration::from_secs(30)));
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let err = HarnessConfig::from_json(r#"{"hook_tgt":"x"}"#).unwrap_err();
        assert!(matches!(err, HarnessError::Config(_)));
    }

    #[test]
    fn env_overrides() {
        let mut cfg = HarnessConfig::default();
        cfg.apply_env_from(|key| match key {
            ENV_BUILD_TOOL => Some(String::from("/opt/xmake/bin/xmake")),
            ENV_TIMEOUT_SECS => Some(String::from("45")),
            _ => None,
        })
        .unwrap();
        assert_eq!(cfg.build_tool, "/opt/xmake/bin/xmake");
        assert_eq!(cfg.timeout_secs, Some(45));

        let err = HarnessConfig::default()
            .apply_env_from(|key| (key == ENV_TIMEOUT_SECS).then(|| String::from("soon")))
            .unwrap_err();
        assert!(err.to_string().contains(ENV_TIMEOUT_SECS));
    }

    #[test]
    fn strict_profile_requires_trace_from_both_artifacts() {
        let cfg = HarnessConfig::default().strict();
        assert_eq!(
            cfg.hook_contract,
            OutputContract::Contains(REEXEC_TRACE.to_string())
        );
        assert_eq!(cfg.proxy_contract, cfg.hook_contract);
    }

    #[test]
    fn platform_names_used_without_override() {
        let cfg = HarnessConfig::default();
        assert_eq!(cfg.api_names_for(&HostOs::Windows), vec!["CreateProcessA", "CreateProcessW"]);
        assert!(cfg.api_names_for(&HostOs::Other(String::from("plan9"))).is_empty());
    }

    #[test]
    fn validation_rejects_bad_values() {
        let cfg = HarnessConfig {
            extra_suffixes: vec![String::from("test")],
            ..HarnessConfig::default()
        };
        assert!(cfg.validate().is_err());

        let cfg = HarnessConfig {
            timeout_secs: Some(0),
            ..HarnessConfig::default()
        };
        assert!(cfg.validate().is_err());

        let cfg = HarnessConfig {
            hook_target: String::from(" "),
            ..HarnessConfig::default()
        };
        assert!(cfg.validate().unwrap_err().to_string().contains("hook_target"));
    }
}
