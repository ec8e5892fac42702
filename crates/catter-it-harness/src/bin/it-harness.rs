//! CLI entrypoint for the catter integration-test harness.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use catter_it_exec::SystemRunner;
use catter_it_harness::structured_log::LogEmitter;
use catter_it_harness::{HarnessConfig, HarnessSession, HostOs};
use clap::{Parser, Subcommand, ValueEnum};

const LOG_SUITE: &str = "catter-it";

/// Drives the catter hook and proxy artifacts built by xmake.
#[derive(Debug, Parser)]
#[command(name = "it-harness")]
#[command(about = "Integration-test harness for the catter hook and proxy artifacts")]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// JSON configuration file (defaults apply to missing keys).
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Build-system program to query (also `CATTER_IT_BUILD_TOOL`).
    #[arg(long, global = true)]
    build_tool: Option<String>,
    #[arg(long, global = true)]
    hook_target: Option<String>,
    #[arg(long, global = true)]
    proxy_target: Option<String>,
    /// Require both artifacts to print the re-exec trace.
    #[arg(long, global = true)]
    strict: bool,
    /// Fail instead of skipping when the host has no APIs to exercise.
    #[arg(long, global = true)]
    require_tests: bool,
    /// Kill artifacts and queries running longer than this (also `CATTER_IT_TIMEOUT_SECS`).
    #[arg(long, global = true)]
    timeout_secs: Option<u64>,
    /// Structured JSONL log output path.
    #[arg(long, global = true)]
    log: Option<PathBuf>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Print the project and target descriptors as JSON.
    Describe,
    /// Run the hook artifact once per process-creation API.
    Hook {
        /// API names to exercise instead of the platform list (repeatable).
        #[arg(long = "api")]
        apis: Vec<String>,
    },
    /// Run the proxy artifact once.
    Proxy,
    /// Generate the lit configuration for the shell-test suite.
    LitConfig {
        #[arg(long, value_enum, default_value_t = LitFormat::Python)]
        format: LitFormat,
        /// Output file path (if omitted, prints to stdout).
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Hook suite, then the proxy.
    All {
        /// Output report path (markdown; JSON goes next to it).
        #[arg(long)]
        report: Option<PathBuf>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum LitFormat {
    Python,
    Json,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}

fn load_config(cli: &Cli) -> Result<HarnessConfig, Box<dyn std::error::Error>> {
    let mut config = match &cli.config {
        Some(path) => HarnessConfig::from_file(path)?,
        None => HarnessConfig::default(),
    };
    config.apply_env()?;

    if let Some(tool) = &cli.build_tool {
        config.build_tool = tool.clone();
    }
    if let Some(target) = &cli.hook_target {
        config.hook_target = target.clone();
    }
    if let Some(target) = &cli.proxy_target {
        config.proxy_target = target.clone();
    }
    if let Some(secs) = cli.timeout_secs {
        config.timeout_secs = Some(secs);
    }
    if let Command::Hook { apis } = &cli.command
        && !apis.is_empty()
    {
        config.api_names = Some(apis.clone());
    }
    config.require_tests |= cli.require_tests;
    if cli.strict {
        config = config.strict();
    }
    config.validate()?;
    Ok(config)
}

fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let config = load_config(&cli)?;
    let run_id = format!("{}-{}", command_name(&cli.command), std::process::id());
    let log = match &cli.log {
        Some(path) => LogEmitter::to_file(path, LOG_SUITE, &run_id)?,
        None => LogEmitter::disabled(LOG_SUITE, &run_id),
    };
    let runner = SystemRunner::with_timeout(config.timeout());
    let mut session = HarnessSession::new(config, &runner, HostOs::current(), log)
        .with_case_reporter(|case| println!("Output for {}:\n{}", case.api_name, case.stdout));

    let outcome = dispatch(&mut session, cli.command);
    // Keep the log of a failed run; it is what explains the failure.
    settle(outcome, session.finish())
}

/// The run's own error wins over a failure to flush the log afterwards.
fn settle(
    outcome: Result<(), Box<dyn std::error::Error>>,
    flushed: catter_it_harness::Result<()>,
) -> Result<(), Box<dyn std::error::Error>> {
    outcome?;
    flushed?;
    Ok(())
}

fn dispatch(
    session: &mut HarnessSession<'_>,
    command: Command,
) -> Result<(), Box<dyn std::error::Error>> {
    match command {
        Command::Describe => {
            let ctx = session.describe()?;
            println!("{}", serde_json::to_string_pretty(&ctx)?);
        }
        Command::Hook { .. } => {
            let ctx = session.describe()?;
            eprintln!("Running {} hook cases on {}", ctx.hook.name, session.host().as_str());
            let cases = session.run_hook_suite(&ctx)?;
            if cases.is_empty() {
                eprintln!("No process-creation APIs to exercise; skipped");
            }
            eprintln!("Hook suite complete: passed={}", cases.len());
        }
        Command::Proxy => {
            let ctx = session.describe()?;
            eprintln!("Running {}", ctx.proxy.name);
            let result = session.run_proxy(&ctx)?;
            println!("Output:\n{}", result.stdout);
        }
        Command::LitConfig { format, output } => {
            let ctx = session.describe()?;
            let lit = session.emit_lit_config(&ctx)?;
            let body = match format {
                LitFormat::Python => lit.to_python(),
                LitFormat::Json => lit.to_json()?,
            };
            match output {
                Some(path) => {
                    write_with_parents(&path, &body)?;
                    eprintln!("Wrote lit configuration to {}", path.display());
                }
                None => print!("{body}"),
            }
        }
        Command::All { report } => {
            let report_doc = session.run_all()?;
            eprintln!(
                "Run complete: hook_cases={}, proxy={}",
                report_doc.hook_cases.len(),
                if report_doc.proxy.is_some() { "pass" } else { "not run" }
            );
            if let Some(report_path) = report {
                eprintln!("Writing report to {}", report_path.display());
                write_with_parents(&report_path, &report_doc.to_markdown())?;
                let json_path = report_path.with_extension("json");
                std::fs::write(&json_path, report_doc.to_json())?;
            }
        }
    }
    Ok(())
}

fn command_name(command: &Command) -> &'static str {
    match command {
        Command::Describe => "describe",
        Command::Hook { .. } => "hook",
        Command::Proxy => "proxy",
        Command::LitConfig { .. } => "lit-config",
        Command::All { .. } => "all",
    }
}

fn write_with_parents(path: &Path, body: &str) -> std::io::Result<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, body)
}
