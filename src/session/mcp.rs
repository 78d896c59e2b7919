//! MCP server configuration handed to the engine.
//!
//! Servers come from two places: the persistent `mcp.json` file and the
//! `mcpServers` list of `session/new`. Host-declared servers win on name
//! clashes. The merged result has the engine's shape:
//! `{"mcpServers": {"<name>": {...}}}`.

use std::fs;
use std::path::Path;

use serde_json::{json, Map, Value};
use tracing::{debug, warn};

use crate::acp::schema::McpServer;
use crate::{AppError, Result};

/// Read `path`; a missing file is an empty configuration.
///
/// # Errors
///
/// Returns [`AppError::InvalidParams`] with a remediation hint when the file
/// exists but is not a JSON object.
pub fn load_file(path: &Path) -> Result<Map<String, Value>> {
    let raw = match fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            debug!(path = %path.display(), "no MCP configuration file");
            return Ok(Map::new());
        }
        Err(err) => return Err(invalid_config(path, format!("Error reading config file: {err}"))),
    };

    let parsed: Value = serde_json::from_str(&raw)
        .map_err(|err| invalid_config(path, format!("Invalid JSON in config file: {err}")))?;
    match parsed {
        Value::Object(mut root) => match root.remove("mcpServers") {
            None | Some(Value::Null) => Ok(Map::new()),
            Some(Value::Object(servers)) => Ok(servers),
            Some(_) => Err(invalid_config(path, "\"mcpServers\" must be an object".to_owned())),
        },
        _ => Err(invalid_config(path, "top level must be a JSON object".to_owned())),
    }
}

/// Convert host-declared ACP servers into engine entries keyed by name.
///
/// Entries without a name are skipped.
#[must_use]
pub fn from_host(servers: &[McpServer]) -> Map<String, Value> {
    let mut out = Map::new();
    for server in servers {
        let Some(name) = server.get("name").and_then(Value::as_str) else {
            warn!(?server, "MCP server without a name, skipping");
            continue;
        };
        out.insert(name.to_owned(), engine_entry(server));
    }
    out
}

fn engine_entry(server: &Value) -> Value {
    let transport = server
        .get("type")
        .and_then(Value::as_str)
        .unwrap_or("stdio");
    match transport {
        "http" | "sse" => json!({
            "url": server.get("url").cloned().unwrap_or(Value::Null),
            "headers": pairs_to_object(server.get("headers")),
            "transport": transport,
        }),
        _ => json!({
            "command": server.get("command").cloned().unwrap_or(Value::Null),
            "args": server.get("args").cloned().unwrap_or_else(|| json!([])),
            "env": pairs_to_object(server.get("env")),
            "transport": "stdio",
        }),
    }
}

/// `[{"name": k, "value": v}, ...]` → `{k: v, ...}`.
fn pairs_to_object(pairs: Option<&Value>) -> Value {
    let mut out = Map::new();
    for pair in pairs.and_then(Value::as_array).into_iter().flatten() {
        if let (Some(name), Some(value)) = (
            pair.get("name").and_then(Value::as_str),
            pair.get("value"),
        ) {
            out.insert(name.to_owned(), value.clone());
        }
    }
    Value::Object(out)
}

/// Merge the file configuration at `path` with host-declared `servers`.
///
/// # Errors
///
/// Propagates [`load_file`] failures.
pub fn merged_config(path: &Path, servers: &[McpServer]) -> Result<Value> {
    let mut merged = load_file(path)?;
    merged.extend(from_host(servers));
    Ok(json!({ "mcpServers": merged }))
}

fn invalid_config(path: &Path, details: String) -> AppError {
    AppError::InvalidParams(json!({
        "reason": "Invalid MCP configuration file",
        "details": details,
        "help": format!("Please check {} for JSON syntax errors", path.display()),
    }))
}
