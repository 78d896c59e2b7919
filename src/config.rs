//! Global configuration parsing, validation, and credential loading.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use tracing::{debug, warn};

use crate::session::confirmation::ConfirmationMode;
use crate::{AppError, Result};

/// Keychain service name under which credentials are stored.
pub const KEYRING_SERVICE: &str = "acp-adapter";

/// Environment variable consulted when the keychain holds no cloud API key.
pub const CLOUD_API_KEY_ENV: &str = "ACP_CLOUD_API_KEY";

/// File name of the MCP server configuration inside the persistence directory.
pub const MCP_CONFIG_FILE: &str = "mcp.json";

/// How the external conversation engine process is launched.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct EngineConfig {
    /// Engine executable.
    #[serde(default = "default_engine_command")]
    pub command: String,
    /// Arguments passed to the engine executable.
    #[serde(default)]
    pub args: Vec<String>,
    /// Time allowed for the engine to emit its ready line.
    #[serde(default = "default_startup_timeout")]
    pub startup_timeout_seconds: u64,
    /// Capacity of the bounded engine → protocol-loop message channel.
    #[serde(default = "default_channel_capacity")]
    pub event_channel_capacity: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            command: default_engine_command(),
            args: Vec::new(),
            startup_timeout_seconds: default_startup_timeout(),
            event_channel_capacity: default_channel_capacity(),
        }
    }
}

/// Cloud control-plane settings.
///
/// The API key is loaded at runtime via OS keychain or environment variable,
/// never from the TOML file.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct CloudConfig {
    /// Base URL of the cloud API.
    #[serde(default = "default_cloud_api_url")]
    pub api_url: String,
    /// Keep sandboxes running after the session closes.
    #[serde(default = "default_true")]
    pub keep_alive: bool,
    /// Per-request timeout for cloud and sandbox HTTP calls.
    #[serde(default = "default_request_timeout")]
    pub request_timeout_seconds: u64,
    /// Interval between event polls while a remote turn is running.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    /// API key (populated at runtime).
    #[serde(skip)]
    pub api_key: Option<String>,
}

impl Default for CloudConfig {
    fn default() -> Self {
        Self {
            api_url: default_cloud_api_url(),
            keep_alive: true,
            request_timeout_seconds: default_request_timeout(),
            poll_interval_ms: default_poll_interval_ms(),
            api_key: None,
        }
    }
}

fn default_engine_command() -> String {
    "agent-engine".into()
}

fn default_startup_timeout() -> u64 {
    30
}

fn default_channel_capacity() -> usize {
    256
}

fn default_cloud_api_url() -> String {
    "https://app.all-hands.dev".into()
}

fn default_true() -> bool {
    true
}

fn default_request_timeout() -> u64 {
    30
}

fn default_poll_interval_ms() -> u64 {
    500
}

fn default_cancel_timeout() -> u64 {
    10
}

fn default_persistence_dir() -> PathBuf {
    env::var_os("HOME")
        .map_or_else(|| PathBuf::from("."), PathBuf::from)
        .join(".acp-adapter")
}

/// Global configuration parsed from `config.toml`.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct GlobalConfig {
    /// Root for persisted conversations, the MCP config, and debug traces.
    #[serde(default = "default_persistence_dir")]
    pub persistence_dir: PathBuf,
    /// Working directory used when the host does not supply one.
    #[serde(default)]
    pub work_dir: Option<PathBuf>,
    /// Explicit MCP configuration path; defaults to `<persistence_dir>/mcp.json`.
    #[serde(default)]
    pub mcp_config_path: Option<PathBuf>,
    /// Bounded wait applied by `session/cancel` before the turn is aborted.
    #[serde(default = "default_cancel_timeout")]
    pub cancel_timeout_seconds: u64,
    /// Confirmation mode applied to newly created sessions.
    #[serde(default)]
    pub default_confirmation_mode: ConfirmationMode,
    /// Forward token-level deltas while a turn is running.
    #[serde(default)]
    pub streaming: bool,
    /// Engine process settings.
    #[serde(default)]
    pub agent: EngineConfig,
    /// Cloud settings.
    #[serde(default)]
    pub cloud: CloudConfig,
}

impl Default for GlobalConfig {
    fn default() -> Self {
        Self {
            persistence_dir: default_persistence_dir(),
            work_dir: None,
            mcp_config_path: None,
            cancel_timeout_seconds: default_cancel_timeout(),
            default_confirmation_mode: ConfirmationMode::default(),
            streaming: false,
            agent: EngineConfig::default(),
            cloud: CloudConfig::default(),
        }
    }
}

impl GlobalConfig {
    /// Load and validate configuration from a TOML file path.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if the file cannot be read or contains
    /// invalid TOML, or if validation fails.
    pub fn load_from_path(path: impl AsRef<Path>) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .map_err(|err| AppError::Config(format!("failed to read config: {err}")))?;
        Self::from_toml_str(&raw)
    }

    /// Parse configuration from a TOML string and validate it.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if parsing or validation fails.
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        let config: Self = toml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Load the cloud API key from OS keychain with env-var fallback.
    ///
    /// A missing key is not an error: the cloud provider then advertises the
    /// `oauth` authentication method and rejects session creation.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if the keychain task panics.
    pub async fn load_credentials(&mut self) -> Result<()> {
        self.cloud.api_key = load_credential("cloud_api_key", CLOUD_API_KEY_ENV).await?;
        Ok(())
    }

    /// Bounded wait applied when cancelling a running turn.
    #[must_use]
    pub fn cancel_timeout(&self) -> Duration {
        Duration::from_secs(self.cancel_timeout_seconds)
    }

    /// Resolved path of the MCP server configuration file.
    #[must_use]
    pub fn mcp_config_path(&self) -> PathBuf {
        self.mcp_config_path
            .clone()
            .unwrap_or_else(|| self.persistence_dir.join(MCP_CONFIG_FILE))
    }

    /// Directory holding one sub-directory per persisted conversation.
    #[must_use]
    pub fn conversations_dir(&self) -> PathBuf {
        self.persistence_dir.join("conversations")
    }

    /// Directory where non-image resource blobs from prompts are written.
    #[must_use]
    pub fn resource_cache_dir(&self) -> PathBuf {
        self.persistence_dir.join("cache").join("resources")
    }

    /// Directory receiving protocol debug traces.
    #[must_use]
    pub fn debug_trace_dir(&self) -> PathBuf {
        self.persistence_dir.join("acp-debug")
    }

    /// Check value ranges; run again after command-line overrides.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` naming the offending setting.
    pub fn validate(&self) -> Result<()> {
        if self.cancel_timeout_seconds == 0 {
            return Err(AppError::Config(
                "cancel_timeout_seconds must be greater than zero".into(),
            ));
        }

        if self.agent.event_channel_capacity == 0 {
            return Err(AppError::Config(
                "agent.event_channel_capacity must be greater than zero".into(),
            ));
        }

        if self.agent.command.trim().is_empty() {
            return Err(AppError::Config("agent.command must not be empty".into()));
        }

        if !(self.cloud.api_url.starts_with("http://") || self.cloud.api_url.starts_with("https://"))
        {
            return Err(AppError::Config(format!(
                "cloud.api_url must be an http(s) URL, got {}",
                self.cloud.api_url
            )));
        }

        Ok(())
    }
}

/// Load a single credential from OS keychain with env-var fallback.
async fn load_credential(keyring_key: &str, env_key: &str) -> Result<Option<String>> {
    let key = keyring_key.to_owned();

    // Keyring is synchronous I/O.
    let keychain_result = tokio::task::spawn_blocking(move || {
        keyring::Entry::new(KEYRING_SERVICE, &key).and_then(|entry| entry.get_password())
    })
    .await
    .map_err(|err| AppError::Config(format!("keychain task panicked: {err}")))?;

    match keychain_result {
        Ok(value) if !value.is_empty() => return Ok(Some(value)),
        Ok(_) => {
            warn!(key = keyring_key, "keychain entry is empty, trying env var");
        }
        Err(err) => {
            debug!(
                key = keyring_key,
                ?err,
                "keychain lookup failed, trying env var"
            );
        }
    }

    Ok(env::var(env_key).ok().filter(|value| !value.is_empty()))
}
