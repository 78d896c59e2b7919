//! Error types shared across the application.

use std::fmt::{Display, Formatter};

use serde_json::Value;

/// Shared application result type.
pub type Result<T> = std::result::Result<T, AppError>;

/// Application error enumeration covering all domain failure modes.
///
/// Variants carrying a [`Value`] hold the structured `data` object that is
/// returned to the host inside the JSON-RPC error response.
#[derive(Debug)]
pub enum AppError {
    /// Configuration parsing or validation failure.
    Config(String),
    /// Framing or envelope failure on a protocol stream.
    Acp(String),
    /// Client supplied parameters the adapter cannot accept.
    InvalidParams(Value),
    /// Client sent a request the adapter cannot route or a turn was already running.
    InvalidRequest(String),
    /// Requested protocol method is not implemented.
    MethodNotFound(String),
    /// Operation requires an authenticated cloud account.
    AuthRequired(Value),
    /// Runtime failure surfaced to the host as an internal error.
    Internal(Value),
    /// Conversation engine failure.
    Engine(String),
    /// Cloud API failure.
    Cloud(String),
    /// Requested entity does not exist.
    NotFound(String),
    /// File-system or I/O operation failure.
    Io(String),
}

impl AppError {
    /// Build an [`AppError::InvalidParams`] from a reason string.
    #[must_use]
    pub fn invalid_params(reason: impl Into<String>) -> Self {
        Self::InvalidParams(serde_json::json!({ "reason": reason.into() }))
    }

    /// Build an [`AppError::Internal`] with a reason and a details string.
    #[must_use]
    pub fn internal(reason: impl Into<String>, details: impl Display) -> Self {
        Self::Internal(serde_json::json!({
            "reason": reason.into(),
            "details": details.to_string(),
        }))
    }

    /// Build an [`AppError::AuthRequired`] from a reason string.
    #[must_use]
    pub fn auth_required(reason: impl Into<String>) -> Self {
        Self::AuthRequired(serde_json::json!({ "reason": reason.into() }))
    }

    /// `true` when the error is a structured protocol error that must reach
    /// the host unchanged rather than be wrapped as an internal failure.
    #[must_use]
    pub fn is_structured(&self) -> bool {
        matches!(
            self,
            Self::InvalidParams(_)
                | Self::InvalidRequest(_)
                | Self::MethodNotFound(_)
                | Self::AuthRequired(_)
                | Self::Internal(_)
        )
    }
}

impl Display for AppError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Config(msg) => write!(f, "config: {msg}"),
            Self::Acp(msg) => write!(f, "acp: {msg}"),
            Self::InvalidParams(data) => write!(f, "invalid params: {}", reason_of(data)),
            Self::InvalidRequest(msg) => write!(f, "invalid request: {msg}"),
            Self::MethodNotFound(method) => write!(f, "method not found: {method}"),
            Self::AuthRequired(data) => write!(f, "authentication required: {}", reason_of(data)),
            Self::Internal(data) => write!(f, "internal: {}", reason_of(data)),
            Self::Engine(msg) => write!(f, "engine: {msg}"),
            Self::Cloud(msg) => write!(f, "cloud: {msg}"),
            Self::NotFound(msg) => write!(f, "not found: {msg}"),
            Self::Io(msg) => write!(f, "io: {msg}"),
        }
    }
}

impl std::error::Error for AppError {}

impl From<toml::de::Error> for AppError {
    fn from(err: toml::de::Error) -> Self {
        Self::Config(format!("invalid config: {err}"))
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

impl From<reqwest::Error> for AppError {
    fn from(err: reqwest::Error) -> Self {
        Self::Cloud(err.to_string())
    }
}

fn reason_of(data: &Value) -> String {
    match data.get("reason").and_then(Value::as_str) {
        Some(reason) => reason.to_owned(),
        None => data.to_string(),
    }
}
