//! One harness invocation: configuration, runner, host and log wired together.
//!
//! The build system is queried once per run ([`HarnessSession::describe`]);
//! every later step takes the resulting [`RunContext`] so hook cases, the
//! proxy run and the lit configuration all see the same descriptors.

use std::time::Instant;

use catter_it_exec::CommandRunner;
use serde::Serialize;

use crate::build_query::{BuildIntrospectionClient, ProjectDescriptor, TargetDescriptor};
use crate::config::HarnessConfig;
use crate::error::{HarnessError, Result};
use crate::hook_runner::{HookCaseResult, HookTestRunner, elapsed_ms, log_failure};
use crate::launch::{LaunchSpec, plan_launch};
use crate::lit_config::{LitConfig, LitConfigEmitter, SUITE_NAME};
use crate::platform::HostOs;
use crate::proxy_runner::{ProxyResult, ProxyTestRunner};
use crate::report::{ArtifactDigest, HarnessReport};
use crate::sanitizer::SanitizerResolver;
use crate::structured_log::{LogEmitter, LogEntry, LogLevel, Outcome, now_utc};

/// Descriptors shared by every step of a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunContext {
    pub project: ProjectDescriptor,
    pub hook: TargetDescriptor,
    pub proxy: TargetDescriptor,
}

/// Called with each passing hook case as soon as it completes.
pub type CaseReporter<'a> = Box<dyn FnMut(&HookCaseResult) + 'a>;

pub struct HarnessSession<'a> {
    config: HarnessConfig,
    runner: &'a dyn CommandRunner,
    host: HostOs,
    arch: String,
    log: LogEmitter,
    case_reporter: Option<CaseReporter<'a>>,
}

impl<'a> HarnessSession<'a> {
    #[must_use]
    pub fn new(
        config: HarnessConfig,
        runner: &'a dyn CommandRunner,
        host: HostOs,
        log: LogEmitter,
    ) -> Self {
        Self {
            config,
            runner,
            host,
            arch: std::env::consts::ARCH.to_string(),
            log,
            case_reporter: None,
        }
    }

    /// Report passing hook cases as they complete, so their output survives a
    /// later failing case.
    #[must_use]
    pub fn with_case_reporter<F>(mut self, reporter: F) -> Self
    where
        F: FnMut(&HookCaseResult) + 'a,
    {
        self.case_reporter = Some(Box::new(reporter));
        self
    }

    /// Override the architecture used for Clang runtime names.
    #[must_use]
    pub fn with_arch(mut self, arch: impl Into<String>) -> Self {
        self.arch = arch.into();
        self
    }

    #[must_use]
    pub fn config(&self) -> &HarnessConfig {
        &self.config
    }

    #[must_use]
    pub fn host(&self) -> &HostOs {
        &self.host
    }

    /// Query the project and both artifact targets.
    pub fn describe(&mut self) -> Result<RunContext> {
        let client = BuildIntrospectionClient::new(self.runner, self.config.build_tool.clone());

        let started = Instant::now();
        let project = client.query_project();
        self.log_query(None, started, &project)?;
        let project = project?;

        let mut targets = Vec::with_capacity(2);
        for name in [self.config.hook_target.clone(), self.config.proxy_target.clone()] {
            let started = Instant::now();
            let target = client.query_target(&name);
            self.log_query(Some(&name), started, &target)?;
            targets.push(target?);
        }
        let proxy = targets.pop();
        let hook = targets.pop();
        match (hook, proxy) {
            (Some(hook), Some(proxy)) => Ok(RunContext {
                project,
                hook,
                proxy,
            }),
            _ => Err(HarnessError::Config(String::from(
                "target queries returned no descriptors",
            ))),
        }
    }

    /// Launch spec for `target`, with the sanitizer preload when required.
    pub fn plan(&mut self, ctx: &RunContext, target: &TargetDescriptor) -> Result<LaunchSpec> {
        let resolver = SanitizerResolver::with_arch(self.runner, self.arch.clone());
        let started = Instant::now();
        let planned = plan_launch(&ctx.project, target, &self.host, &resolver);

        let entry = self
            .entry(LogLevel::Info, "sanitizer_resolve", ctx)
            .with_target(&target.name)
            .with_duration_ms(elapsed_ms(started));
        match &planned {
            Ok(launch) => self.log.emit_entry(
                entry
                    .with_outcome(Outcome::Pass)
                    .with_command(launch.to_shell_string())
                    .with_details(serde_json::json!({
                        "preload": launch.env_prefix.first().map(|(_, lib)| lib),
                    })),
            )?,
            Err(err) => log_failure(&mut self.log, failed(entry, err)),
        }
        planned
    }

    /// Run `--test <api>` for every configured API name.
    pub fn run_hook_suite(&mut self, ctx: &RunContext) -> Result<Vec<HookCaseResult>> {
        let api_names = self.config.api_names_for(&self.host);
        if api_names.is_empty() {
            if self.config.require_tests {
                return Err(HarnessError::UnsupportedPlatform {
                    host: self.host.as_str().to_string(),
                });
            }
            let entry = self
                .entry(LogLevel::Warn, "hook_suite", ctx)
                .with_target(&ctx.hook.name)
                .with_outcome(Outcome::Skip)
                .with_details(serde_json::json!({ "reason": "no process-creation APIs for host" }));
            self.log.emit_entry(entry)?;
            return Ok(Vec::new());
        }

        let launch = self.plan(ctx, &ctx.hook)?;
        ensure_artifact(&launch)?;
        let hook = HookTestRunner::new(
            self.runner,
            ctx.hook.name.clone(),
            self.config.hook_contract.clone(),
        );
        match self.case_reporter.as_mut() {
            Some(report) => hook.run_reporting(&launch, &api_names, &mut self.log, |case| {
                report(case);
            }),
            None => hook.run(&launch, &api_names, &mut self.log),
        }
    }

    pub fn run_proxy(&mut self, ctx: &RunContext) -> Result<ProxyResult> {
        let launch = self.plan(ctx, &ctx.proxy)?;
        ensure_artifact(&launch)?;
        ProxyTestRunner::new(
            self.runner,
            ctx.proxy.name.clone(),
            self.config.proxy_contract.clone(),
        )
        .run(&launch, &mut self.log)
    }

    pub fn emit_lit_config(&mut self, ctx: &RunContext) -> Result<LitConfig> {
        let resolver = SanitizerResolver::with_arch(self.runner, self.arch.clone());
        let emitted = LitConfigEmitter::new(&resolver)
            .with_extra_suffixes(self.config.extra_suffixes.clone())
            .emit(&ctx.project, &ctx.hook, &ctx.proxy, &self.host);

        let entry = self.entry(LogLevel::Info, "lit_config_emit", ctx);
        match &emitted {
            Ok(cfg) => self.log.emit_entry(
                entry
                    .with_outcome(Outcome::Pass)
                    .with_details(serde_json::to_value(&cfg.substitutions).unwrap_or_default()),
            )?,
            Err(err) => log_failure(&mut self.log, failed(entry, err)),
        }
        emitted
    }

    /// Hook suite, then the proxy; the first failure ends the run.
    pub fn run_all(&mut self) -> Result<HarnessReport> {
        let ctx = self.describe()?;
        let hook_cases = self.run_hook_suite(&ctx)?;
        let proxy = self.run_proxy(&ctx)?;

        let mut artifacts = Vec::with_capacity(2);
        for target in [&ctx.hook, &ctx.proxy] {
            let path = target.resolved_path(&ctx.project.root_directory);
            if path.is_file() {
                artifacts.push(ArtifactDigest::of_file(target.name.clone(), &path)?);
            }
        }
        let refs = artifacts
            .iter()
            .map(|a| format!("{}@sha256:{}", a.path.display(), a.sha256))
            .collect();
        let entry = self
            .entry(LogLevel::Info, "run_complete", &ctx)
            .with_outcome(Outcome::Pass)
            .with_artifacts(refs);
        self.log.emit_entry(entry)?;

        Ok(HarnessReport {
            title: SUITE_NAME.to_string(),
            host: self.host.as_str().to_string(),
            build_mode: ctx.project.build_mode.as_str().to_string(),
            timestamp: now_utc(),
            artifacts,
            hook_cases,
            proxy: Some(proxy),
        })
    }

    /// Flush the structured log; call once at the end of a run.
    pub fn finish(mut self) -> Result<()> {
        self.log.flush()?;
        Ok(())
    }

    fn entry(&self, level: LogLevel, event: &str, ctx: &RunContext) -> LogEntry {
        LogEntry::event(level, event)
            .with_host(self.host.as_str())
            .with_mode(ctx.project.build_mode.as_str())
    }

    fn log_query<T>(
        &mut self,
        target: Option<&str>,
        started: Instant,
        result: &Result<T>,
    ) -> Result<()> {
        let mut entry = LogEntry::event(LogLevel::Info, "build_query")
            .with_host(self.host.as_str())
            .with_duration_ms(elapsed_ms(started));
        if let Some(target) = target {
            entry = entry.with_target(target);
        }
        match result {
            Ok(_) => self.log.emit_entry(entry.with_outcome(Outcome::Pass))?,
            Err(err) => log_failure(&mut self.log, failed(entry, err)),
        }
        Ok(())
    }
}

fn failed(entry: LogEntry, err: &HarnessError) -> LogEntry {
    let mut entry = entry
        .with_outcome(Outcome::Error)
        .with_details(serde_json::json!({ "message": err.to_string() }));
    entry.level = LogLevel::Error;
    entry
}

fn ensure_artifact(launch: &LaunchSpec) -> Result<()> {
    if launch.executable.is_file() {
        return Ok(());
    }
    Err(HarnessError::ArtifactInvocation {
        command: launch.command().render(),
        exit_code: None,
        stderr: format!("artifact `{}` does not exist", launch.executable.display()),
    })
}
