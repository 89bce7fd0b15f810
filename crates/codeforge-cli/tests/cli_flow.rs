//! Runs the `codeforge` binary end to end against fixture pages.

use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use serde_json::Value;

fn fixture(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name)
}

fn codeforge(store_root: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_codeforge"))
        .arg("--store-root")
        .arg(store_root)
        .args(args)
        .env("RUST_LOG", "error")
        .output()
        .expect("failed to spawn codeforge")
}

fn stdout_json(out: &Output) -> Value {
    assert!(
        out.status.success(),
        "codeforge failed: {}",
        String::from_utf8_lossy(&out.stderr)
    );
    serde_json::from_slice(&out.stdout).expect("stdout is json")
}

#[test]
fn validate_accepts_good_and_rejects_cyclic_pages() {
    let dir = tempfile::tempdir().unwrap();
    let counter = fixture("counter.json");
    let ok = codeforge(dir.path(), &["--json", "validate", counter.to_str().unwrap()]);
    assert_eq!(stdout_json(&ok)["ok"], true);

    let broken = fixture("broken.json");
    let bad = codeforge(dir.path(), &["--json", "validate", broken.to_str().unwrap()]);
    assert!(!bad.status.success());
    let report: Value = serde_json::from_slice(&bad.stdout).unwrap();
    assert_eq!(report["ok"], false);
    assert!(report["diagnostics"]
        .as_array()
        .unwrap()
        .iter()
        .any(|d| d["level"] == "error"));
}

#[test]
fn render_prints_html() {
    let dir = tempfile::tempdir().unwrap();
    let counter = fixture("counter.json");
    let out = codeforge(dir.path(), &["--backend", "memory", "render", counter.to_str().unwrap()]);
    assert!(out.status.success());
    let html = String::from_utf8(out.stdout).unwrap();
    assert!(html.contains("Count: 0"));
    assert!(html.contains("data-key=\"inc\""));
}

#[test]
fn fired_events_persist_between_runs() {
    let dir = tempfile::tempdir().unwrap();
    let todos = fixture("todos.json");
    let todos = todos.to_str().unwrap();

    let first = stdout_json(&codeforge(
        dir.path(),
        &["--json", "fire", todos, "--node", "add", "--event", "onClick", "--payload", r#"{"text":"Milk"}"#],
    ));
    assert_eq!(first["toasts"][0]["message"], "Added Milk");
    assert_eq!(first["data"]["stats"]["total"], 1);

    let second = stdout_json(&codeforge(
        dir.path(),
        &["--json", "fire", todos, "--node", "add", "--event", "onClick", "--payload", r#"{"text":"Eggs"}"#],
    ));
    assert_eq!(second["data"]["stats"]["total"], 2);

    let stored = stdout_json(&codeforge(dir.path(), &["--json", "storage", "get", "app:todos"]));
    assert_eq!(stored["value"].as_array().unwrap().len(), 2);
    assert!(dir.path().join("codeforge.db").exists());
}

#[test]
fn components_lists_builtins() {
    let dir = tempfile::tempdir().unwrap();
    let out = stdout_json(&codeforge(dir.path(), &["--json", "components"]));
    let types: Vec<&str> = out["components"]
        .as_array()
        .unwrap()
        .iter()
        .filter_map(|c| c["type"].as_str())
        .collect();
    assert!(types.contains(&"Text"));
    assert!(types.contains(&"Dialog"));
}
