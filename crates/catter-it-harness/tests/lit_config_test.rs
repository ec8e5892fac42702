//! Integration test: lit configuration for debug and release builds.
//!
//! Run: cargo test -p catter-it-harness --test lit_config_test

use std::path::{Path, PathBuf};

use catter_it_exec::{CommandOutput, ScriptedRunner};
use catter_it_harness::lit_config::{HOOK_TOKEN, PROXY_TOKEN};
use catter_it_harness::structured_log::LogEmitter;
use catter_it_harness::{HarnessConfig, HarnessSession, HostOs};

fn build_system(root: &Path, mode: &str) -> ScriptedRunner {
    let target = |name: &str| {
        CommandOutput::ok(format!(
            r#"{{"targetfile":"build/{name}","compilers":[{{"program":"gcc"}}]}}"#
        ))
    };
    ScriptedRunner::new()
        .on_args(
            &["show", "--json"],
            CommandOutput::ok(format!(
                r#"{{"project":{{"projectdir":"{}","mode":"{mode}"}}}}"#,
                root.display()
            )),
        )
        .on_args(&["show", "-t", "it-catter-hook", "--json"], target("it-catter-hook"))
        .on_args(&["show", "-t", "it-catter-proxy", "--json"], target("it-catter-proxy"))
}

fn scratch(tag: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("catter_it_lit_{tag}_{}", std::process::id()));
    std::fs::create_dir_all(&dir).unwrap();
    dir
}

#[test]
fn linux_debug_wraps_both_artifacts_with_preload() {
    let root = scratch("debug");
    let lib = root.join("libasan.so.8");
    std::fs::write(&lib, b"").unwrap();
    let runner = build_system(&root, "debug").on_args(
        &["-print-file-name=libasan.so"],
        CommandOutput::ok(format!("{}\n", lib.display())),
    );

    let mut session = HarnessSession::new(
        HarnessConfig::default(),
        &runner,
        HostOs::Linux,
        LogEmitter::disabled("catter-it", "lit"),
    );
    let ctx = session.describe().unwrap();
    let cfg = session.emit_lit_config(&ctx).unwrap();

    let hook = cfg.substitution(HOOK_TOKEN).unwrap();
    assert!(hook.starts_with(&format!("LD_PRELOAD={} ", lib.display())), "{hook}");
    assert!(hook.ends_with("build/it-catter-hook"), "{hook}");
    let proxy = cfg.substitution(PROXY_TOKEN).unwrap();
    assert!(proxy.starts_with("LD_PRELOAD="), "{proxy}");

    let python = cfg.to_python();
    assert!(python.contains("lit.formats.ShTest(True)"));
    assert!(python.contains("config.available_features.add(\"system-linux\")"));
    std::fs::remove_dir_all(&root).unwrap();
}

#[test]
fn release_substitutions_are_bare_paths() {
    let root = scratch("release");
    let runner = build_system(&root, "release");
    let mut session = HarnessSession::new(
        HarnessConfig::default(),
        &runner,
        HostOs::Linux,
        LogEmitter::disabled("catter-it", "lit"),
    );
    let ctx = session.describe().unwrap();
    let cfg = session.emit_lit_config(&ctx).unwrap();

    let expected = root.join("build").join("it-catter-hook").display().to_string();
    assert_eq!(cfg.substitution(HOOK_TOKEN), Some(expected.as_str()));
    assert!(
        runner.calls().iter().all(|cmd| cmd.program == "xmake"),
        "release builds never query the compiler"
    );
    assert_eq!(cfg.test_source_root, root.join("tests").join("integration").join("test"));
    std::fs::remove_dir_all(&root).unwrap();
}

#[test]
fn macos_debug_is_never_wrapped() {
    let root = scratch("macos");
    let runner = build_system(&root, "debug");
    let mut session = HarnessSession::new(
        HarnessConfig::default(),
        &runner,
        HostOs::MacOs,
        LogEmitter::disabled("catter-it", "lit"),
    );
    let ctx = session.describe().unwrap();
    let cfg = session.emit_lit_config(&ctx).unwrap();
    assert!(!cfg.substitution(HOOK_TOKEN).unwrap().contains("LD_PRELOAD"));
    assert_eq!(cfg.available_features, vec!["system-darwin"]);
    std::fs::remove_dir_all(&root).unwrap();
}
