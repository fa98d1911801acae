//! Integration tests for the tale-send daemon
//!
//! Every run uses `--once` and points the endpoints at a closed local port,
//! so nothing leaves the machine.

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

const UNREACHABLE: &str = "http://127.0.0.1:9";

/// Write a config whose endpoints all point at a closed port
fn setup_test_env() -> (TempDir, String, String) {
    let temp_dir = TempDir::new().unwrap();
    let config_path = temp_dir.path().join("config.toml");
    let token_path = temp_dir.path().join("data").join("token.txt");

    let config_content = format!(
        r#"
[reddit]
auth_url = "{base}/api/v1/access_token"
submit_url = "{base}/api/submit"

[mistral]
endpoint = "{base}/v1/agents/completions"

[storage]
token_path = "{token}"

[http]
timeout_secs = 2
"#,
        base = UNREACHABLE,
        token = token_path.display().to_string().replace('\\', "/")
    );
    fs::write(&config_path, config_content).unwrap();

    (
        temp_dir,
        config_path.to_str().unwrap().to_string(),
        token_path.to_str().unwrap().to_string(),
    )
}

fn tale_send(config_path: &str) -> Command {
    let mut cmd = Command::cargo_bin("tale-send").unwrap();
    cmd.env("TALECAST_CONFIG", config_path)
        .env("REDDIT_CLIENT_ID", "client")
        .env("REDDIT_CLIENT_SECRET", "secret")
        .env("REDDIT_USERNAME", "spooky_teller")
        .env("REDDIT_PASSWORD", "hunter2")
        .env("MISTRAL_API_KEY", "key")
        .env("MISTRAL_AGENT_ID", "agent")
        .env_remove("RUST_LOG");
    cmd
}

fn seed_token(token_path: &str) {
    let path = Path::new(token_path);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, "seeded-token").unwrap();
}

#[test]
fn test_help_describes_daemon() {
    Command::cargo_bin("tale-send")
        .unwrap()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("tale-send"))
        .stdout(predicate::str::contains("EXIT CODES"));
}

#[test]
fn test_version_flag() {
    Command::cargo_bin("tale-send")
        .unwrap()
        .arg("--version")
        .assert()
        .success();
}

#[test]
fn test_invalid_duration_is_usage_error() {
    let (_temp_dir, config_path, _token_path) = setup_test_env();

    tale_send(&config_path)
        .args(["--once", "--interval", "whenever"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("whenever"));
}

#[test]
fn test_unknown_config_key_exits_with_config_error() {
    let (temp_dir, _config_path, _token_path) = setup_test_env();
    let bad_config = temp_dir.path().join("bad.toml");
    fs::write(&bad_config, "[reddit]\npassword = \"in the file\"\n").unwrap();

    tale_send(bad_config.to_str().unwrap())
        .arg("--once")
        .assert()
        .code(3)
        .stderr(predicate::str::contains("config"));
}

#[test]
fn test_missing_explicit_config_exits_with_config_error() {
    let temp_dir = TempDir::new().unwrap();
    let missing = temp_dir.path().join("nope.toml");

    tale_send(missing.to_str().unwrap())
        .arg("--once")
        .assert()
        .code(3);
}

#[test]
fn test_zero_interval_exits_with_config_error() {
    let (_temp_dir, config_path, _token_path) = setup_test_env();

    tale_send(&config_path)
        .args(["--once", "--interval", "0s"])
        .assert()
        .code(3);
}

#[test]
fn test_missing_credentials_exit_with_auth_error() {
    let (_temp_dir, config_path, token_path) = setup_test_env();

    tale_send(&config_path)
        .env_remove("REDDIT_PASSWORD")
        .arg("--once")
        .assert()
        .code(2)
        .stderr(predicate::str::contains("REDDIT_PASSWORD"));

    assert!(!Path::new(&token_path).exists());
}

#[test]
fn test_unreachable_auth_endpoint_exits_with_auth_error() {
    let (_temp_dir, config_path, token_path) = setup_test_env();

    tale_send(&config_path).arg("--once").assert().code(2);

    assert!(!Path::new(&token_path).exists());
}

#[test]
fn test_cached_token_skips_auth_and_survives_failed_cycle() {
    let (_temp_dir, config_path, token_path) = setup_test_env();
    seed_token(&token_path);

    // Generation fails, which is never fatal
    tale_send(&config_path).arg("--once").assert().success();

    assert_eq!(fs::read_to_string(&token_path).unwrap(), "seeded-token");
}

#[test]
fn test_token_path_flag_overrides_config() {
    let (temp_dir, config_path, _token_path) = setup_test_env();
    let other = temp_dir.path().join("other-token.txt");
    seed_token(other.to_str().unwrap());

    tale_send(&config_path)
        .arg("--once")
        .arg("--token-path")
        .arg(&other)
        .assert()
        .success();
}
