//! Integration tests for `kiln config`.

use std::process::Command;
use tempfile::tempdir;

fn cargo_bin() -> Command {
    let mut cmd = Command::new(env!("CARGO"));
    cmd.args(["run", "-p", "kiln-cli", "--bin", "kiln", "--"]);
    cmd.env_remove("NODE_ENV");
    cmd
}

fn config_json(dir: &std::path::Path, extra: &[&str]) -> serde_json::Value {
    let output = cargo_bin()
        .args(["config", "--cwd"])
        .arg(dir)
        .args(extra)
        .output()
        .expect("Failed to run config command");
    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));
    serde_json::from_slice(&output.stdout).expect("Output should be valid JSON")
}

#[test]
fn test_config_defaults_to_development() {
    let dir = tempdir().unwrap();
    std::fs::write(
        dir.path().join("kiln.config.json"),
        r#"{"entry": {"main": "./index.js"}}"#,
    )
    .unwrap();

    let json = config_json(dir.path(), &[]);
    assert_eq!(json["mode"], "development");
    assert_eq!(json["optimization"]["minify"], false);
    assert!(json["define"].get("process.env.NODE_ENV").is_none());
}

#[test]
fn test_config_mode_flag_wins_over_file() {
    let dir = tempdir().unwrap();
    std::fs::write(
        dir.path().join("kiln.config.json"),
        r#"{"mode": "development", "entry": {"main": "./index.js"}}"#,
    )
    .unwrap();

    let json = config_json(dir.path(), &["--mode", "production"]);
    assert_eq!(json["mode"], "production");
    assert_eq!(json["optimization"]["minify"], true);
    assert_eq!(json["optimization"]["sourceMaps"], false);
}

#[test]
fn test_config_env_mode_wins_over_file() {
    let dir = tempdir().unwrap();
    std::fs::write(
        dir.path().join("kiln.config.json"),
        r#"{"mode": "development", "entry": {"main": "./index.js"}}"#,
    )
    .unwrap();

    let output = cargo_bin()
        .env("NODE_ENV", "production")
        .args(["config", "--cwd"])
        .arg(dir.path())
        .output()
        .expect("Failed to run config command");
    let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(json["mode"], "production");
}
