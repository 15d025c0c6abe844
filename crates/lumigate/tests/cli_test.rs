//! Integration tests for the `lumigate` CLI binary.
//!
//! Argument parsing, help output, completions, bridge selection errors, and
//! the unauthenticated `info` probe against a mock bridge. Nothing here
//! touches the system keyring.
#![allow(clippy::unwrap_used)]

use std::path::Path;

use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;
use serde_json::json;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

// ── Helpers ─────────────────────────────────────────────────────────

/// Build a [`Command`] for the `lumigate` binary with env isolation.
fn lumigate_cmd(config: &Path) -> assert_cmd::Command {
    let mut cmd = cargo_bin_cmd!("lumigate");
    cmd.env("HOME", "/tmp/lumigate-cli-test-nonexistent")
        .env("XDG_CONFIG_HOME", "/tmp/lumigate-cli-test-nonexistent")
        .env_remove("LUMIGATE_BRIDGE")
        .env_remove("LUMIGATE_ADDRESS")
        .env_remove("LUMIGATE_OUTPUT")
        .env_remove("LUMIGATE_CONFIG")
        .arg("--config")
        .arg(config);
    cmd
}

fn combined_output(output: &std::process::Output) -> String {
    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);
    format!("{stdout}{stderr}")
}

fn write_config(dir: &Path) -> std::path::PathBuf {
    let path = dir.join("config.toml");
    std::fs::write(
        &path,
        r#"
default_bridge = "office"

[bridges.office]
id = "001788FFFE0A0B0C"
address = "192.0.2.10"

[bridges.attic]
id = "001788FFFE112233"
address = "192.0.2.11"
port = 8080
"#,
    )
    .unwrap();
    path
}

fn status_body(api_version: &str) -> serde_json::Value {
    json!({
        "name": "Office Bridge",
        "bridgeid": "001788fffe0a0b0c",
        "modelid": "BSB002",
        "swversion": "1967054020",
        "apiversion": api_version,
        "mac": "00:17:88:0a:0b:0c"
    })
}

// ── Basic invocation ────────────────────────────────────────────────

#[test]
fn test_no_args_shows_help() {
    let output = cargo_bin_cmd!("lumigate").output().unwrap();
    assert_eq!(output.status.code(), Some(2), "Expected exit code 2");
    assert!(combined_output(&output).contains("Usage"));
}

#[test]
fn test_help_lists_commands() {
    cargo_bin_cmd!("lumigate")
        .arg("--help")
        .assert()
        .success()
        .stdout(
            predicate::str::contains("discover")
                .and(predicate::str::contains("pair"))
                .and(predicate::str::contains("lights"))
                .and(predicate::str::contains("add-serial")),
        );
}

#[test]
fn test_version_flag() {
    cargo_bin_cmd!("lumigate")
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("lumigate"));
}

#[test]
fn test_completions_bash() {
    cargo_bin_cmd!("lumigate")
        .args(["completions", "bash"])
        .assert()
        .success()
        .stdout(predicate::str::is_empty().not());
}

#[test]
fn test_unknown_resource_kind_is_usage_error() {
    let dir = tempfile::tempdir().unwrap();
    lumigate_cmd(&dir.path().join("config.toml"))
        .args(["resources", "get", "toaster", "abc"])
        .assert()
        .code(2);
}

// ── Config ──────────────────────────────────────────────────────────

#[test]
fn test_config_path_honors_flag() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("custom.toml");
    lumigate_cmd(&path)
        .args(["config", "path"])
        .assert()
        .success()
        .stdout(predicate::str::contains("custom.toml"));
}

#[test]
fn test_config_bridges_plain() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_config(dir.path());
    lumigate_cmd(&path)
        .args(["config", "bridges", "-o", "plain"])
        .assert()
        .success()
        .stdout("attic\noffice\n");
}

// ── Bridge selection ────────────────────────────────────────────────

#[test]
fn test_no_bridge_configured() {
    let dir = tempfile::tempdir().unwrap();
    let output = lumigate_cmd(&dir.path().join("config.toml"))
        .arg("lights")
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(2));
    assert!(combined_output(&output).contains("No bridge selected"));
}

#[test]
fn test_unknown_bridge_lists_known_ones() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_config(dir.path());
    let output = lumigate_cmd(&path)
        .args(["--bridge", "garage", "lights"])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(2));
    let text = combined_output(&output);
    assert!(text.contains("garage"), "{text}");
    assert!(text.contains("attic, office"), "{text}");
}

// ── Info against a mock bridge ──────────────────────────────────────

#[tokio::test(flavor = "multi_thread")]
async fn test_info_reports_status() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/0/config"))
        .respond_with(ResponseTemplate::new(200).set_body_json(status_body("1.61.0")))
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let port = server.address().port().to_string();
    let output = lumigate_cmd(&dir.path().join("config.toml"))
        .args(["info", "--address", "127.0.0.1", "--port", &port, "-o", "json"])
        .output()
        .unwrap();

    assert!(output.status.success(), "{}", combined_output(&output));
    let info: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(info["id"], "001788FFFE0A0B0C");
    assert_eq!(info["api_version"], "1.61.0");
    assert_eq!(info["supported"], true);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_info_flags_old_firmware() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/0/config"))
        .respond_with(ResponseTemplate::new(200).set_body_json(status_body("1.39.0")))
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let port = server.address().port().to_string();
    let output = lumigate_cmd(&dir.path().join("config.toml"))
        .args(["info", "--address", "127.0.0.1", "--port", &port])
        .output()
        .unwrap();

    assert_eq!(output.status.code(), Some(1));
    let text = combined_output(&output);
    assert!(text.contains("1.39.0"), "{text}");
}

#[tokio::test(flavor = "multi_thread")]
async fn test_address_that_is_not_a_bridge() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/0/config"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "name": "router",
            "bridgeid": "AABBCCDDEEFF",
            "modelid": "RT-AX88U"
        })))
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let port = server.address().port().to_string();
    let output = lumigate_cmd(&dir.path().join("config.toml"))
        .args(["lights", "--address", "127.0.0.1", "--port", &port])
        .output()
        .unwrap();

    assert_eq!(output.status.code(), Some(2));
    assert!(combined_output(&output).contains("does not look like a bridge"));
}
