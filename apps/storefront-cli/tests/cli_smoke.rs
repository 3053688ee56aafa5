#![allow(clippy::unwrap_used, clippy::expect_used)]

//! CLI smoke tests for the `storefront` binary.

use std::path::Path;
use std::process::{Command, Output, Stdio};

use httpmock::prelude::*;
use tempfile::TempDir;

fn run_storefront(dir: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_storefront"))
        .args(args)
        .current_dir(dir)
        .env_remove("RUST_LOG")
        .env_remove("STOREFRONT_PASSWORD")
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
        .expect("failed to execute storefront")
}

fn write_config(dir: &TempDir, base_url: &str) -> String {
    let path = dir.path().join("storefront.yaml");
    let yaml = format!(
        r#"auth:
  base_url: "{base_url}"
  http:
    transport: allow_insecure_http
  refresh_http:
    transport: allow_insecure_http
credentials_path: "{}"
"#,
        dir.path().join("session.json").display()
    );
    std::fs::write(&path, yaml).unwrap();
    path.to_string_lossy().into_owned()
}

#[test]
fn help_lists_subcommands() {
    let dir = TempDir::new().unwrap();
    let output = run_storefront(dir.path(), &["--help"]);
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    for word in ["login", "call", "logout", "status", "check", "--config"] {
        assert!(stdout.contains(word), "help should mention {word}");
    }
}

#[test]
fn missing_config_file_fails() {
    let dir = TempDir::new().unwrap();
    let output = run_storefront(dir.path(), &["--config", "absent.yaml", "status"]);
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("config file does not exist"));
}

#[test]
fn print_config_emits_yaml() {
    let dir = TempDir::new().unwrap();
    let config = write_config(&dir, "https://api.shop.test/");
    let output = run_storefront(dir.path(), &["--config", &config, "--print-config"]);
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("base_url"));
    assert!(stdout.contains("https://api.shop.test/"));
    assert!(stdout.contains("refresh_timeout"));
}

#[test]
fn check_requires_base_url() {
    let dir = TempDir::new().unwrap();
    let credentials = dir.path().join("session.json");
    let output = run_storefront(
        dir.path(),
        &["--credentials", &credentials.to_string_lossy(), "check"],
    );
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("base_url is required"));
}

#[test]
fn login_call_logout() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(POST).path("/auth/login");
        then.status(200)
            .json_body(serde_json::json!({"accessToken": "a1", "refreshToken": "r1"}));
    });
    let orders = server.mock(|when, then| {
        when.method(GET)
            .path("/orders")
            .header("authorization", "Bearer a1");
        then.status(200).json_body(serde_json::json!([{"id": 7}]));
    });

    let dir = TempDir::new().unwrap();
    let config = write_config(&dir, &server.base_url());

    let status = run_storefront(dir.path(), &["--config", &config, "status"]);
    assert!(String::from_utf8_lossy(&status.stdout).contains("Not signed in"));

    let login = run_storefront(
        dir.path(),
        &["--config", &config, "login", "--email", "ops@shop.test", "--password", "hunter2"],
    );
    assert!(login.status.success(), "{}", String::from_utf8_lossy(&login.stderr));
    assert!(dir.path().join("session.json").exists());

    let call = run_storefront(dir.path(), &["--config", &config, "call", "get", "/orders"]);
    assert!(call.status.success(), "{}", String::from_utf8_lossy(&call.stderr));
    assert!(String::from_utf8_lossy(&call.stdout).contains("\"id\": 7"));
    orders.assert_calls(1);

    let logout = run_storefront(dir.path(), &["--config", &config, "logout"]);
    assert!(logout.status.success());
    assert!(!dir.path().join("session.json").exists());
}
