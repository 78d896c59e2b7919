//! JSON-RPC 2.0 envelopes for the host connection.
//!
//! Inbound lines are classified into requests, notifications and responses;
//! outbound helpers build the matching envelopes. [`RpcError`] is the wire
//! form of an [`AppError`].

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::{AppError, Result};

/// Protocol version string carried by every envelope.
pub const JSONRPC_VERSION: &str = "2.0";

/// Invalid JSON was received.
pub const PARSE_ERROR: i64 = -32700;
/// The JSON sent is not a valid request object.
pub const INVALID_REQUEST: i64 = -32600;
/// The method does not exist.
pub const METHOD_NOT_FOUND: i64 = -32601;
/// Invalid method parameters.
pub const INVALID_PARAMS: i64 = -32602;
/// Internal error.
pub const INTERNAL_ERROR: i64 = -32603;
/// Authentication is required before the operation.
pub const AUTH_REQUIRED: i64 = -32000;

/// Error object of a JSON-RPC response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RpcError {
    /// Numeric error code.
    pub code: i64,
    /// Short description.
    pub message: String,
    /// Structured details.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl RpcError {
    /// Error with `code`, `message` and optional `data`.
    #[must_use]
    pub fn new(code: i64, message: impl Into<String>, data: Option<Value>) -> Self {
        Self {
            code,
            message: message.into(),
            data,
        }
    }
}

impl From<&AppError> for RpcError {
    fn from(err: &AppError) -> Self {
        match err {
            AppError::InvalidParams(data) => {
                Self::new(INVALID_PARAMS, "Invalid params", Some(data.clone()))
            }
            AppError::InvalidRequest(reason) => Self::new(
                INVALID_REQUEST,
                "Invalid request",
                Some(json!({ "reason": reason })),
            ),
            AppError::MethodNotFound(method) => Self::new(
                METHOD_NOT_FOUND,
                "Method not found",
                Some(json!({ "method": method })),
            ),
            AppError::AuthRequired(data) => {
                Self::new(AUTH_REQUIRED, "Authentication required", Some(data.clone()))
            }
            AppError::Internal(data) => {
                Self::new(INTERNAL_ERROR, "Internal error", Some(data.clone()))
            }
            other => Self::new(
                INTERNAL_ERROR,
                "Internal error",
                Some(json!({ "reason": other.to_string() })),
            ),
        }
    }
}

impl From<AppError> for RpcError {
    fn from(err: AppError) -> Self {
        Self::from(&err)
    }
}

/// Classified inbound message.
#[derive(Debug, Clone, PartialEq)]
pub enum Inbound {
    /// Call expecting a response.
    Request {
        /// Correlation id, echoed in the response.
        id: Value,
        /// Method name.
        method: String,
        /// Parameters (`null` when absent).
        params: Value,
    },
    /// Call without a response.
    Notification {
        /// Method name.
        method: String,
        /// Parameters (`null` when absent).
        params: Value,
    },
    /// Reply to a request the adapter sent.
    Response {
        /// Correlation id of the original request.
        id: Value,
        /// Result or error object.
        result: std::result::Result<Value, RpcError>,
    },
}

#[derive(Deserialize)]
struct Envelope {
    #[serde(default)]
    jsonrpc: Option<String>,
    #[serde(default)]
    id: Option<Value>,
    #[serde(default)]
    method: Option<String>,
    #[serde(default)]
    params: Option<Value>,
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<RpcError>,
}

/// Parse one inbound line.
///
/// Returns `Ok(None)` for blank lines. On failure returns the id (when one
/// could be read) and the error to answer with.
///
/// # Errors
///
/// - [`PARSE_ERROR`] for text that is not JSON.
/// - [`INVALID_REQUEST`] for JSON that is not a JSON-RPC 2.0 envelope.
pub fn parse_inbound(line: &str) -> std::result::Result<Option<Inbound>, (Value, RpcError)> {
    if line.trim().is_empty() {
        return Ok(None);
    }

    let raw: Value = serde_json::from_str(line).map_err(|e| {
        (
            Value::Null,
            RpcError::new(PARSE_ERROR, "Parse error", Some(json!({ "details": e.to_string() }))),
        )
    })?;

    let id_hint = raw.get("id").cloned().unwrap_or(Value::Null);
    let invalid = |reason: &str| {
        (
            id_hint.clone(),
            RpcError::new(
                INVALID_REQUEST,
                "Invalid request",
                Some(json!({ "reason": reason })),
            ),
        )
    };

    let envelope: Envelope =
        serde_json::from_value(raw).map_err(|_| invalid("malformed envelope"))?;

    if envelope.jsonrpc.as_deref() != Some(JSONRPC_VERSION) {
        return Err(invalid("jsonrpc must be \"2.0\""));
    }

    let params = envelope.params.unwrap_or(Value::Null);
    match (envelope.method, envelope.id) {
        (Some(method), Some(id)) => Ok(Some(Inbound::Request { id, method, params })),
        (Some(method), None) => Ok(Some(Inbound::Notification { method, params })),
        (None, Some(id)) => {
            let result = match (envelope.result, envelope.error) {
                (_, Some(error)) => Err(error),
                (Some(result), None) => Ok(result),
                (None, None) => Ok(Value::Null),
            };
            Ok(Some(Inbound::Response { id, result }))
        }
        (None, None) => Err(invalid("missing method")),
    }
}

/// Deserialize request parameters.
///
/// # Errors
///
/// Returns [`AppError::InvalidParams`] describing the mismatch.
pub fn parse_params<T: DeserializeOwned>(params: Value) -> Result<T> {
    let params = if params.is_null() { json!({}) } else { params };
    serde_json::from_value(params).map_err(|e| {
        AppError::InvalidParams(json!({
            "reason": "Invalid params",
            "details": e.to_string(),
        }))
    })
}

/// Successful response envelope.
#[must_use]
pub fn response(id: Value, result: Value) -> Value {
    json!({ "jsonrpc": JSONRPC_VERSION, "id": id, "result": result })
}

/// Error response envelope.
#[must_use]
pub fn error_response(id: Value, error: &RpcError) -> Value {
    json!({ "jsonrpc": JSONRPC_VERSION, "id": id, "error": error })
}

/// Request envelope.
#[must_use]
pub fn request(id: u64, method: &str, params: Value) -> Value {
    json!({ "jsonrpc": JSONRPC_VERSION, "id": id, "method": method, "params": params })
}

/// Notification envelope.
#[must_use]
pub fn notification(method: &str, params: Value) -> Value {
    json!({ "jsonrpc": JSONRPC_VERSION, "method": method, "params": params })
}
