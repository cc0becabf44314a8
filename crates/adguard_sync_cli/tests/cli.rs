//! Tests driving the `adguard-sync` binary.

use std::path::Path;
use std::process::{Command, Output};
use tempfile::TempDir;

fn adguard_sync(config: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_adguard-sync"))
        .arg("--config")
        .arg(config)
        .args(args)
        .env_remove("RUST_LOG")
        .output()
        .unwrap()
}

fn write_config(dir: &TempDir, contents: &str) -> std::path::PathBuf {
    let path = dir.path().join("adguard-sync.yaml");
    std::fs::write(&path, contents).unwrap();
    path
}

#[test]
fn version_prints_crate_version() {
    let output = Command::new(env!("CARGO_BIN_EXE_adguard-sync"))
        .arg("version")
        .output()
        .unwrap();
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains(env!("CARGO_PKG_VERSION")));
}

#[test]
fn missing_config_fails() {
    let dir = TempDir::new().unwrap();
    let output = adguard_sync(&dir.path().join("missing.yaml"), &["run"]);
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("missing.yaml"));
}

#[test]
fn invalid_config_fails() {
    let dir = TempDir::new().unwrap();
    let path = write_config(&dir, "origin:\n  url: http://127.0.0.1:1\nreplicas: []\n");
    let output = adguard_sync(&path, &["check"]);
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("at least one replica"));
}

#[test]
fn unreachable_origin_reports_failure_as_json() {
    let dir = TempDir::new().unwrap();
    let path = write_config(
        &dir,
        "origin:\n  url: http://127.0.0.1:1\nreplicas:\n  - url: http://127.0.0.1:2\n",
    );
    let output = adguard_sync(&path, &["run", "--format", "json"]);
    assert_eq!(output.status.code(), Some(1));

    let report: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(report["origin"], "127.0.0.1:1");
    assert_eq!(report["origin_error"]["kind"], "connection");
    assert_eq!(report["replicas"].as_array().map(Vec::len), Some(0));
}

#[test]
fn check_reports_unreachable_instances() {
    let dir = TempDir::new().unwrap();
    let path = write_config(
        &dir,
        "origin:\n  url: http://127.0.0.1:1\nreplicas:\n  - url: http://127.0.0.1:2\nfeatures:\n  clients: false\n",
    );
    let output = adguard_sync(&path, &["check"]);
    assert_eq!(output.status.code(), Some(1));

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Configuration OK"));
    assert!(!stdout.contains("clients"));
    assert!(stdout.contains("unreachable"));
}
