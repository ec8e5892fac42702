//! Integration-test harness for the catter hook and proxy artifacts.
//!
//! This crate provides:
//! - Build introspection: artifact paths and compilers from `xmake show`
//! - Platform policy: API names, sanitizer applicability, lit shell mode
//! - Sanitizer resolution: the AddressSanitizer runtime to preload in debug
//! - Hook and proxy runners: drive the built artifacts and check their output
//! - lit configuration: the substitution table for the shell-test suite
//! - Structured logging and run reports

#![forbid(unsafe_code)]

pub mod build_query;
pub mod config;
pub mod contract;
pub mod error;
pub mod hook_runner;
pub mod launch;
pub mod lit_config;
pub mod platform;
pub mod proxy_runner;
pub mod report;
pub mod sanitizer;
pub mod session;
pub mod structured_log;

pub use build_query::{BuildIntrospectionClient, ProjectDescriptor, TargetDescriptor};
pub use config::HarnessConfig;
pub use contract::OutputContract;
pub use error::{HarnessError, Result};
pub use hook_runner::HookTestRunner;
pub use lit_config::{LitConfig, LitConfigEmitter};
pub use platform::{BuildMode, HostOs};
pub use proxy_runner::ProxyTestRunner;
pub use report::HarnessReport;
pub use sanitizer::SanitizerResolver;
pub use session::{HarnessSession, RunContext};
