//! Integration tests for `kiln build`.
//!
//! These tests verify:
//! - `--json` output is always valid JSON with an `ok` boolean
//! - Failures carry a SCREAMING_SNAKE_CASE code, the module path and exit non-zero
//! - The human error output names the code and the failing module

use std::path::Path;
use std::process::{Command, Output};
use tempfile::tempdir;

fn cargo_bin() -> Command {
    let mut cmd = Command::new(env!("CARGO"));
    cmd.args(["run", "-p", "kiln-cli", "--bin", "kiln", "--"]);
    cmd.env_remove("NODE_ENV");
    cmd
}

fn write(root: &Path, name: &str, content: &str) {
    let path = root.join(name);
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(path, content).unwrap();
}

fn build(root: &Path, extra: &[&str]) -> Output {
    cargo_bin()
        .args(["build", "--cwd"])
        .arg(root)
        .args(extra)
        .output()
        .expect("Failed to run build command")
}

fn stdout_json(output: &Output) -> serde_json::Value {
    let stdout = String::from_utf8_lossy(&output.stdout);
    serde_json::from_str(&stdout).expect("Output should be valid JSON")
}

#[test]
fn test_build_json_success() {
    let dir = tempdir().unwrap();
    write(dir.path(), "kiln.config.json", r#"{"entry": {"main": "./src/index.js"}}"#);
    write(dir.path(), "src/index.js", "import { a } from './a';\nconsole.log(a);\n");
    write(dir.path(), "src/a.js", "export const a = 1;\n");

    let output = build(dir.path(), &["--json", "--mode", "production"]);
    assert!(output.status.success(), "build should succeed");

    let json = stdout_json(&output);
    assert_eq!(json["ok"], true);
    assert_eq!(json["schemaVersion"], 1);
    assert_eq!(json["mode"], "production");
    assert_eq!(json["modules"], 2);
    assert_eq!(json["chunks"][0]["name"], "main");
    assert_eq!(json["chunks"][0]["kind"], "entry");

    let file = json["chunks"][0]["file"].as_str().unwrap();
    assert!(file.starts_with("main.") && file.ends_with(".js"));
    assert!(dir.path().join("dist").join(file).exists());
    assert!(dir.path().join("dist/manifest.json").exists());
}

#[test]
fn test_build_json_out_dir() {
    let dir = tempdir().unwrap();
    write(dir.path(), "kiln.config.json", r#"{"entry": {"main": "./index.js"}}"#);
    write(dir.path(), "index.js", "console.log(1);\n");

    let output = build(dir.path(), &["--json", "--out", "public"]);
    assert!(output.status.success());
    let json = stdout_json(&output);
    let written = json["written"].as_array().unwrap();
    assert!(!written.is_empty());
    for name in written {
        assert!(dir.path().join("public").join(name.as_str().unwrap()).exists());
    }
    assert!(!dir.path().join("dist").exists());
}

#[test]
fn test_build_json_unresolved_import() {
    let dir = tempdir().unwrap();
    write(dir.path(), "kiln.config.json", r#"{"entry": {"main": "./src/index.js"}}"#);
    write(dir.path(), "src/index.js", "import './missing';\n");

    let output = build(dir.path(), &["--json"]);
    assert!(!output.status.success(), "build should fail");

    let json = stdout_json(&output);
    assert_eq!(json["ok"], false);
    assert_eq!(json["error"]["code"], "RESOLVE_NOT_FOUND");
    assert!(json["error"]["path"].as_str().unwrap().ends_with("index.js"));
    assert!(!dir.path().join("dist").exists(), "nothing is written on failure");
}

#[test]
fn test_build_json_error_code_is_screaming_snake_case() {
    let dir = tempdir().unwrap();

    let output = build(dir.path(), &["--json"]);
    assert!(!output.status.success());

    let json = stdout_json(&output);
    assert_eq!(json["ok"], false);
    let code = json["error"]["code"].as_str().unwrap();
    assert_eq!(code, "CONFIG_INVALID");
    assert!(code.chars().all(|c| c.is_ascii_uppercase() || c == '_'));
}

#[test]
fn test_build_human_error_names_module_and_stage() {
    let dir = tempdir().unwrap();
    write(dir.path(), "kiln.config.json", r#"{"entry": {"main": "./index.js"}}"#);
    write(dir.path(), "index.js", "import './theme.less';\n");
    write(dir.path(), "theme.less", "a { color: red; }\n");

    let output = build(dir.path(), &[]);
    assert!(!output.status.success());

    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("error: TRANSFORM_ERROR:"), "stderr: {stderr}");
    assert!(stderr.contains("theme.less [match]"), "stderr: {stderr}");
}
