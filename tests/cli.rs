use assert_cmd::Command;
use predicates::prelude::*;

#[test]
fn test_cli_version() {
    let mut cmd = Command::cargo_bin("vulnscan-mcp").unwrap();
    cmd.arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("vulnscan-mcp 0.1.0"));
}

#[test]
fn test_cli_help() {
    let mut cmd = Command::cargo_bin("vulnscan-mcp").unwrap();
    cmd.arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Security-scanning MCP server"));
}

#[test]
fn test_show_config_reflects_environment() {
    let mut cmd = Command::cargo_bin("vulnscan-mcp").unwrap();
    cmd.arg("show-config")
        .env("MCP_HOST", "127.0.0.1")
        .env("MCP_PORT", "8123")
        .env("MCP_AUTH_TOKEN", "s3cret")
        .assert()
        .success()
        .stdout(predicate::str::contains("127.0.0.1:8123"))
        .stdout(predicate::str::contains("auth          = configured"))
        // The secret itself must never be echoed
        .stdout(predicate::str::contains("s3cret").not());
}

#[test]
fn test_show_config_defaults() {
    let mut cmd = Command::cargo_bin("vulnscan-mcp").unwrap();
    cmd.arg("show-config")
        .env_remove("MCP_HOST")
        .env_remove("MCP_PORT")
        .env_remove("MCP_AUTH_TOKEN")
        .env_remove("ALLOWED_COMMANDS")
        .assert()
        .success()
        .stdout(predicate::str::contains("127.0.0.1:8000"))
        .stdout(predicate::str::contains("whoami,id,uname"));
}
