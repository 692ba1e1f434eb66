//! Integration tests for the `vitalwatch` CLI binary.
//!
//! Parsing, help, config and error paths run without a server; data
//! commands run against a wiremock server.
#![allow(clippy::unwrap_used)]

use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;
use serde_json::{Value, json};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

// ── Helpers ─────────────────────────────────────────────────────────

/// Build a [`Command`] for the `vitalwatch` binary with env isolation.
///
/// Clears `VITALWATCH_*` overrides and points config directories at a
/// nonexistent path so tests never touch the user's configuration.
fn vitalwatch_cmd() -> assert_cmd::Command {
    let mut cmd = cargo_bin_cmd!("vitalwatch");
    cmd.env("HOME", "/tmp/vitalwatch-cli-test-nonexistent")
        .env("XDG_CONFIG_HOME", "/tmp/vitalwatch-cli-test-nonexistent")
        .env("NO_COLOR", "1")
        .env_remove("RUST_LOG")
        .env_remove("VITALWATCH_BASE_URL")
        .env_remove("VITALWATCH_TIMEOUT_MS")
        .env_remove("VITALWATCH_CACHE_WINDOW_MS")
        .env_remove("VITALWATCH_FALLBACK_FILE")
        .env_remove("VITALWATCH_OUTPUT");
    cmd
}

/// Run a command off the async runtime and capture its output.
async fn run(mut cmd: assert_cmd::Command) -> std::process::Output {
    tokio::task::spawn_blocking(move || cmd.output().unwrap())
        .await
        .unwrap()
}

fn combined_output(output: &std::process::Output) -> String {
    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);
    format!("{stdout}{stderr}")
}

// ── Basic invocation ────────────────────────────────────────────────

#[test]
fn test_no_args_shows_help() {
    let output = vitalwatch_cmd().output().unwrap();
    assert_eq!(output.status.code(), Some(2), "Expected exit code 2");
    assert!(combined_output(&output).contains("Usage"));
}

#[test]
fn test_help_lists_commands() {
    vitalwatch_cmd().arg("--help").assert().success().stdout(
        predicate::str::contains("health")
            .and(predicate::str::contains("snapshot"))
            .and(predicate::str::contains("health-batch"))
            .and(predicate::str::contains("watch")),
    );
}

#[test]
fn test_version_flag() {
    vitalwatch_cmd()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("vitalwatch"));
}

#[test]
fn test_completions_bash() {
    vitalwatch_cmd()
        .args(["completions", "bash"])
        .assert()
        .success()
        .stdout(predicate::str::is_empty().not());
}

#[test]
fn test_invalid_output_format() {
    vitalwatch_cmd()
        .args(["--output", "yaml", "endpoints"])
        .assert()
        .code(2);
}

// ── Offline commands ────────────────────────────────────────────────

#[test]
fn test_endpoints_json() {
    let output = vitalwatch_cmd()
        .args(["--output", "json", "endpoints"])
        .output()
        .unwrap();
    assert!(output.status.success());

    let table: Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(table["health"], "/health");
    assert_eq!(table["iot-locations-all"], "/api/iot/locations-all");
    assert_eq!(table.as_object().unwrap().len(), 11);
}

#[test]
fn test_endpoint_override_from_config_file() {
    let dir = tempfile::tempdir().unwrap();
    let config = dir.path().join("config.toml");
    std::fs::write(&config, "[endpoints]\nstats = \"/v2/stats\"\n").unwrap();

    vitalwatch_cmd()
        .args(["--output", "json", "endpoints", "--config"])
        .arg(&config)
        .assert()
        .success()
        .stdout(predicate::str::contains("/v2/stats"));
}

#[test]
fn test_unknown_endpoint_is_usage_error() {
    vitalwatch_cmd()
        .args(["--base-url", "http://127.0.0.1:1", "get", "bogus"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("Unknown endpoint"));
}

#[test]
fn test_send_rejects_bad_json() {
    vitalwatch_cmd()
        .args(["--base-url", "http://127.0.0.1:1", "send", "health", "{nope"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("Invalid JSON"));
}

#[test]
fn test_invalid_base_url_is_config_error() {
    vitalwatch_cmd()
        .args(["--base-url", "ftp://example.com", "health"])
        .assert()
        .code(9);
}

// ── Config commands ─────────────────────────────────────────────────

#[test]
fn test_config_init_then_show() {
    let dir = tempfile::tempdir().unwrap();
    let config = dir.path().join("vitalwatch.toml");

    vitalwatch_cmd()
        .arg("--config")
        .arg(&config)
        .args(["config", "init"])
        .assert()
        .success();
    assert!(config.exists());

    // Second init refuses to clobber.
    vitalwatch_cmd()
        .arg("--config")
        .arg(&config)
        .args(["config", "init"])
        .assert()
        .code(9)
        .stderr(predicate::str::contains("--force"));

    vitalwatch_cmd()
        .arg("--config")
        .arg(&config)
        .args(["config", "show"])
        .assert()
        .success()
        .stdout(
            predicate::str::contains("timeout_ms = 10000")
                .and(predicate::str::contains("[realtime]")),
        );
}

#[test]
fn test_config_path_honors_flag() {
    vitalwatch_cmd()
        .args(["config", "path", "--config", "/tmp/somewhere/custom.toml"])
        .assert()
        .success()
        .stdout(predicate::str::contains("/tmp/somewhere/custom.toml"));
}

// ── Server-backed commands ──────────────────────────────────────────

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_health_online() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/health"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"status": "healthy", "version": "2.1.0"})),
        )
        .mount(&server)
        .await;

    let mut cmd = vitalwatch_cmd();
    cmd.args(["--base-url", &server.uri(), "--output", "json", "health"]);
    let output = run(cmd).await;

    assert!(output.status.success(), "{}", combined_output(&output));
    let status: Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(status["is_online"], true);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_health_unreachable_exits_with_connection_code() {
    let mut cmd = vitalwatch_cmd();
    cmd.args(["--base-url", "http://127.0.0.1:1", "--timeout-ms", "500", "health"]);
    let output = run(cmd).await;
    assert_eq!(output.status.code(), Some(7));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_get_with_id() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/employees/EMP001"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"success": true, "data": {"id": "EMP001", "name": "Ana"}})),
        )
        .mount(&server)
        .await;

    let mut cmd = vitalwatch_cmd();
    cmd.args(["--base-url", &server.uri(), "-o", "table", "get", "employees", "EMP001"]);
    let output = run(cmd).await;

    assert!(output.status.success(), "{}", combined_output(&output));
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Ana"));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_get_timeout_exit_code() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/stats"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({}))
                .set_delay(std::time::Duration::from_secs(3)),
        )
        .mount(&server)
        .await;

    let mut cmd = vitalwatch_cmd();
    cmd.args(["--base-url", &server.uri(), "--timeout-ms", "200", "get", "stats"]);
    let output = run(cmd).await;
    assert_eq!(output.status.code(), Some(8));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_get_serves_fallback_file() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/stats"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let fallback = dir.path().join("fallback.json");
    std::fs::write(&fallback, r#"{"/api/stats": {"total_employees": 0}}"#).unwrap();

    let mut cmd = vitalwatch_cmd();
    cmd.args(["--base-url", &server.uri(), "-o", "json-compact", "get", "stats"])
        .arg("--fallback-file")
        .arg(&fallback);
    let output = run(cmd).await;

    assert!(output.status.success(), "{}", combined_output(&output));
    assert_eq!(
        String::from_utf8_lossy(&output.stdout).trim(),
        r#"{"total_employees":0}"#
    );
    assert!(String::from_utf8_lossy(&output.stderr).contains("offline data"));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_health_batch_skips_failures() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/iot/health/EMP001"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "data": [{"employee_id": "EMP001", "heart_rate": 75}]
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/iot/health/EMP002"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let mut cmd = vitalwatch_cmd();
    cmd.args([
        "--base-url",
        &server.uri(),
        "-o",
        "json",
        "health-batch",
        "EMP001",
        "EMP002",
    ]);
    let output = run(cmd).await;

    assert!(output.status.success(), "{}", combined_output(&output));
    let map: Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(map["EMP001"]["heart_rate"], 75);
    assert!(map.get("EMP002").is_none());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_send_location_posts_payload() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/iot/location"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({"success": true})))
        .expect(1)
        .mount(&server)
        .await;

    let mut cmd = vitalwatch_cmd();
    cmd.args([
        "--base-url",
        &server.uri(),
        "-o",
        "json-compact",
        "send",
        "location",
        r#"{"employee_id":"EMP001","latitude":-3.73,"longitude":-38.52}"#,
    ]);
    let output = run(cmd).await;

    assert!(output.status.success(), "{}", combined_output(&output));
    assert!(String::from_utf8_lossy(&output.stdout).contains("true"));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_snapshot_reports_partial_failure() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/employees-stats"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"active": 3})))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/iot/stats"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"devices": 9})))
        .mount(&server)
        .await;

    let mut cmd = vitalwatch_cmd();
    cmd.args(["--base-url", &server.uri(), "-o", "json", "snapshot"]);
    let output = run(cmd).await;

    assert!(output.status.success(), "{}", combined_output(&output));
    let snap: Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(snap["iot_stats"]["origin"], "live");
    assert!(snap["locations"]["error"].as_str().unwrap().contains("404"));
}
