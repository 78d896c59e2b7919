//! Unit tests for configuration parsing and validation.
//!
//! Covers:
//! - defaults for an empty file
//! - explicit values for every section
//! - validation failures name the offending setting
//! - derived paths under the persistence directory

use std::path::PathBuf;
use std::time::Duration;

use acp_adapter::config::{GlobalConfig, MCP_CONFIG_FILE};
use acp_adapter::session::ConfirmationMode;
use acp_adapter::AppError;

fn full_toml(persistence: &str) -> String {
    format!(
        r#"
persistence_dir = '{persistence}'
work_dir = '/srv/project'
cancel_timeout_seconds = 4
default_confirmation_mode = "llm-approve"
streaming = true

[agent]
command = "engine-bin"
args = ["--stdio", "--verbose"]
startup_timeout_seconds = 12
event_channel_capacity = 64

[cloud]
api_url = "https://cloud.example.test"
keep_alive = false
request_timeout_seconds = 7
poll_interval_ms = 250
"#
    )
}

fn expect_config_error(raw: &str, needle: &str) {
    match GlobalConfig::from_toml_str(raw) {
        Err(AppError::Config(msg)) => assert!(
            msg.contains(needle),
            "error must mention `{needle}`, got: {msg}"
        ),
        other => panic!("expected config error, got {other:?}"),
    }
}

// ── Parsing ─────────────────────────────────────────────────────────────────

#[test]
fn empty_file_uses_defaults() {
    let config = GlobalConfig::from_toml_str("").expect("empty config parses");

    assert_eq!(config.cancel_timeout(), Duration::from_secs(10));
    assert_eq!(config.default_confirmation_mode, ConfirmationMode::AlwaysAsk);
    assert!(!config.streaming);
    assert_eq!(config.agent.event_channel_capacity, 256);
    assert!(config.cloud.keep_alive);
    assert!(config.cloud.api_key.is_none());
    assert!(config.work_dir.is_none());
    assert_eq!(config, GlobalConfig::default());
}

#[test]
fn explicit_values_are_applied() {
    let temp = tempfile::tempdir().expect("tempdir");
    let raw = full_toml(temp.path().to_str().expect("utf8 path"));
    let config = GlobalConfig::from_toml_str(&raw).expect("valid config");

    assert_eq!(config.persistence_dir, temp.path());
    assert_eq!(config.work_dir, Some(PathBuf::from("/srv/project")));
    assert_eq!(config.cancel_timeout(), Duration::from_secs(4));
    assert_eq!(config.default_confirmation_mode, ConfirmationMode::LlmApprove);
    assert!(config.streaming);
    assert_eq!(config.agent.command, "engine-bin");
    assert_eq!(config.agent.args, vec!["--stdio", "--verbose"]);
    assert_eq!(config.agent.startup_timeout_seconds, 12);
    assert_eq!(config.agent.event_channel_capacity, 64);
    assert_eq!(config.cloud.api_url, "https://cloud.example.test");
    assert!(!config.cloud.keep_alive);
    assert_eq!(config.cloud.request_timeout_seconds, 7);
    assert_eq!(config.cloud.poll_interval_ms, 250);
}

#[test]
fn load_from_path_reads_file() {
    let temp = tempfile::tempdir().expect("tempdir");
    let path = temp.path().join("config.toml");
    std::fs::write(&path, "cancel_timeout_seconds = 3\n").expect("write config");

    let config = GlobalConfig::load_from_path(&path).expect("config loads");
    assert_eq!(config.cancel_timeout_seconds, 3);
}

#[test]
fn missing_file_is_config_error() {
    let temp = tempfile::tempdir().expect("tempdir");
    let result = GlobalConfig::load_from_path(temp.path().join("absent.toml"));
    assert!(matches!(result, Err(AppError::Config(_))));
}

#[test]
fn malformed_toml_is_config_error() {
    expect_config_error("cancel_timeout_seconds = [", "invalid config");
}

#[test]
fn unknown_confirmation_mode_is_rejected() {
    expect_config_error(r#"default_confirmation_mode = "sometimes""#, "invalid config");
}

// ── Validation ──────────────────────────────────────────────────────────────

#[test]
fn zero_cancel_timeout_is_rejected() {
    expect_config_error("cancel_timeout_seconds = 0", "cancel_timeout_seconds");
}

#[test]
fn zero_channel_capacity_is_rejected() {
    expect_config_error(
        "[agent]\nevent_channel_capacity = 0",
        "event_channel_capacity",
    );
}

#[test]
fn blank_engine_command_is_rejected() {
    expect_config_error("[agent]\ncommand = \"  \"", "agent.command");
}

#[test]
fn non_http_cloud_url_is_rejected() {
    expect_config_error("[cloud]\napi_url = \"ftp://cloud\"", "cloud.api_url");
}

#[test]
fn overrides_are_revalidated() {
    let mut config = GlobalConfig::default();
    assert!(config.validate().is_ok());

    config.cloud.api_url = "cloud.example.test".into();
    assert!(matches!(config.validate(), Err(AppError::Config(_))));
}

// ── Derived paths ───────────────────────────────────────────────────────────

#[test]
fn derived_paths_live_under_persistence_dir() {
    let config = GlobalConfig {
        persistence_dir: PathBuf::from("/data/adapter"),
        ..GlobalConfig::default()
    };

    assert_eq!(
        config.mcp_config_path(),
        PathBuf::from("/data/adapter").join(MCP_CONFIG_FILE)
    );
    assert_eq!(
        config.conversations_dir(),
        PathBuf::from("/data/adapter/conversations")
    );
    assert_eq!(
        config.resource_cache_dir(),
        PathBuf::from("/data/adapter/cache/resources")
    );
    assert_eq!(
        config.debug_trace_dir(),
        PathBuf::from("/data/adapter/acp-debug")
    );
}

#[test]
fn explicit_mcp_path_wins() {
    let config = GlobalConfig {
        mcp_config_path: Some(PathBuf::from("/etc/mcp.json")),
        ..GlobalConfig::default()
    };
    assert_eq!(config.mcp_config_path(), PathBuf::from("/etc/mcp.json"));
}
