//! HTTP client for the cloud control plane.
//!
//! | Call                        | Endpoint                                  |
//! |-----------------------------|-------------------------------------------|
//! | [`CloudClient::validate`]   | `GET /api/settings`                       |
//! | [`CloudClient::list_conversations`] | `GET /api/v1/app-conversations`   |
//! | [`CloudClient::conversation`] | `GET /api/v1/app-conversations/{id}`    |
//! | [`CloudClient::start_sandbox`] | `POST /api/v1/sandboxes`               |
//! | [`CloudClient::sandbox`]    | `GET /api/v1/sandboxes/{id}`              |
//! | [`CloudClient::delete_sandbox`] | `DELETE /api/v1/sandboxes/{id}`       |

use std::time::Duration;

use reqwest::{header, Client, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::debug;

use crate::{AppError, Result};

/// Sandbox state reported by the control plane.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SandboxInfo {
    /// Sandbox identifier.
    #[serde(alias = "sandbox_id")]
    pub id: String,
    /// Lifecycle state (`STARTING`, `RUNNING`, ...).
    #[serde(default)]
    pub status: String,
    /// Base URL of the agent server inside the sandbox, once running.
    #[serde(default)]
    pub agent_server_url: Option<String>,
    /// Key the agent server expects in `X-Session-API-Key`.
    #[serde(default)]
    pub session_api_key: Option<String>,
}

impl SandboxInfo {
    /// `true` once the agent server can be reached.
    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.status.eq_ignore_ascii_case("running") && self.agent_server_url.is_some()
    }
}

/// Authenticated control-plane client.
#[derive(Debug, Clone)]
pub struct CloudClient {
    http: Client,
    api_url: String,
}

impl CloudClient {
    /// Build a client sending `api_key` as a bearer token.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Config`] if the key is not a valid header value or
    /// the HTTP client cannot be built.
    pub fn new(api_url: &str, api_key: &str, timeout: Duration) -> Result<Self> {
        let mut headers = header::HeaderMap::new();
        let token = header::HeaderValue::from_str(&format!("Bearer {api_key}"))
            .map_err(|err| AppError::Config(format!("cloud API key is invalid: {err}")))?;
        headers.insert(header::AUTHORIZATION, token);
        Ok(Self {
            http: json_client(headers, timeout)?,
            api_url: api_url.trim_end_matches('/').to_owned(),
        })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.api_url, path.trim_start_matches('/'))
    }

    /// `true` when the key is accepted, `false` when it is rejected.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Cloud`] for transport or server failures.
    pub async fn validate(&self) -> Result<bool> {
        match request_json::<Value>(self.http.get(self.endpoint("/api/settings"))).await {
            Ok(_) => Ok(true),
            Err(AppError::AuthRequired(_)) => Ok(false),
            Err(err) => Err(err),
        }
    }

    /// Every conversation of the account, as returned by the API.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::AuthRequired`] or [`AppError::Cloud`].
    pub async fn list_conversations(&self) -> Result<Vec<Value>> {
        let payload: Value =
            request_json(self.http.get(self.endpoint("/api/v1/app-conversations"))).await?;
        Ok(extract_list(payload, "results"))
    }

    /// Metadata of one conversation.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::NotFound`] for an unknown id.
    pub async fn conversation(&self, conversation_id: &str) -> Result<Value> {
        request_json(
            self.http
                .get(self.endpoint(&format!("/api/v1/app-conversations/{conversation_id}"))),
        )
        .await
    }

    /// Start a new sandbox, or resume `sandbox_id`.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::AuthRequired`] or [`AppError::Cloud`].
    pub async fn start_sandbox(&self, sandbox_id: Option<&str>) -> Result<SandboxInfo> {
        let body = match sandbox_id {
            Some(id) => json!({ "sandbox_id": id }),
            None => json!({}),
        };
        request_json(self.http.post(self.endpoint("/api/v1/sandboxes")).json(&body)).await
    }

    /// Current state of a sandbox.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::NotFound`] for an unknown id.
    pub async fn sandbox(&self, sandbox_id: &str) -> Result<SandboxInfo> {
        request_json(
            self.http
                .get(self.endpoint(&format!("/api/v1/sandboxes/{sandbox_id}"))),
        )
        .await
    }

    /// Delete a sandbox.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Cloud`] if the control plane refuses.
    pub async fn delete_sandbox(&self, sandbox_id: &str) -> Result<()> {
        request_status_only(
            self.http
                .delete(self.endpoint(&format!("/api/v1/sandboxes/{sandbox_id}"))),
        )
        .await
    }
}

/// JSON HTTP client with `headers` on every request.
pub(crate) fn json_client(mut headers: header::HeaderMap, timeout: Duration) -> Result<Client> {
    headers.insert(
        header::CONTENT_TYPE,
        header::HeaderValue::from_static("application/json"),
    );
    Client::builder()
        .timeout(timeout)
        .default_headers(headers)
        .build()
        .map_err(|err| AppError::Config(format!("failed to build HTTP client: {err}")))
}

/// Send `request` and decode a JSON body.
pub(crate) async fn request_json<T: DeserializeOwned>(request: RequestBuilder) -> Result<T> {
    let body = send(request).await?;
    serde_json::from_str(&body)
        .map_err(|err| AppError::Cloud(format!("response was malformed JSON: {err}")))
}

/// Send `request` and check only its status.
pub(crate) async fn request_status_only(request: RequestBuilder) -> Result<()> {
    send(request).await.map(drop)
}

async fn send(request: RequestBuilder) -> Result<String> {
    let response = request
        .send()
        .await
        .map_err(|err| AppError::Cloud(format!("request failed: {err}")))?;
    let status = response.status();
    let url = response.url().path().to_owned();
    let body = response
        .text()
        .await
        .map_err(|err| AppError::Cloud(format!("response read failed: {err}")))?;
    debug!(%status, url, "cloud response");

    match status {
        s if s.is_success() => Ok(body),
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(AppError::auth_required(
            "Authentication required",
        )),
        StatusCode::NOT_FOUND => Err(AppError::NotFound(format!("{url}: {body}"))),
        s => Err(AppError::Cloud(format!("request to {url} failed with status {s}: {body}"))),
    }
}

/// Items of a list payload that is either a bare array or `{key: [...]}`.
#[must_use]
pub fn extract_list(payload: Value, key: &str) -> Vec<Value> {
    match payload {
        Value::Array(items) => items,
        Value::Object(mut map) => match map.remove(key) {
            Some(Value::Array(items)) => items,
            _ => Vec::new(),
        },
        _ => Vec::new(),
    }
}
