//! Cloud hosting: one sandbox per session, provisioned through the cloud API.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};
use std::time::Duration;

use serde_json::{json, Value};
use tracing::{info, warn};

use super::mcp;
use super::provider::{ProviderFuture, SessionProvider, SessionRequest};
use crate::acp::schema::{AuthMethod, SessionInfo};
use crate::cloud::{CloudClient, CloudWorkspace, RemoteConversation};
use crate::config::{GlobalConfig, CLOUD_API_KEY_ENV};
use crate::engine::Conversation;
use crate::mode::AgentKind;
use crate::{AppError, Result};

/// Only authentication method accepted by the cloud provider.
pub const OAUTH_METHOD: &str = "oauth";

/// Provider running conversations in cloud sandboxes.
pub struct CloudProvider {
    api_url: String,
    keep_alive: bool,
    request_timeout: Duration,
    poll_interval: Duration,
    mcp_config_path: PathBuf,
    api_key: RwLock<Option<String>>,
    workspaces: Mutex<HashMap<String, CloudWorkspace>>,
}

impl CloudProvider {
    /// Provider configured from `config`; `config.cloud.api_key` may be unset.
    #[must_use]
    pub fn new(config: &GlobalConfig) -> Self {
        Self {
            api_url: config.cloud.api_url.clone(),
            keep_alive: config.cloud.keep_alive,
            request_timeout: Duration::from_secs(config.cloud.request_timeout_seconds),
            poll_interval: Duration::from_millis(config.cloud.poll_interval_ms),
            mcp_config_path: config.mcp_config_path(),
            api_key: RwLock::new(config.cloud.api_key.clone()),
            workspaces: Mutex::new(HashMap::new()),
        }
    }

    /// `true` when an API key is available.
    #[must_use]
    pub fn has_api_key(&self) -> bool {
        self.api_key().is_some()
    }

    fn api_key(&self) -> Option<String> {
        self.api_key
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn client(&self, reason: &str) -> Result<CloudClient> {
        let key = self.api_key().ok_or_else(|| AppError::auth_required(reason))?;
        CloudClient::new(&self.api_url, &key, self.request_timeout)
    }

    fn workspaces(&self) -> MutexGuard<'_, HashMap<String, CloudWorkspace>> {
        self.workspaces.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Sandbox id of an existing cloud conversation.
    async fn sandbox_for(&self, client: &CloudClient, conversation_id: &str) -> Result<String> {
        info!(conversation_id, "verifying cloud conversation");
        let info = match client.conversation(conversation_id).await {
            Ok(info) => info,
            Err(AppError::NotFound(_)) => {
                return Err(AppError::InvalidParams(json!({
                    "reason": "Conversation not found",
                    "conversation_id": conversation_id,
                    "help": "The conversation may have been deleted or the ID is incorrect.",
                })));
            }
            Err(AppError::AuthRequired(_)) => {
                return Err(AppError::auth_required(
                    "Authentication required to verify conversation",
                ));
            }
            Err(err) => {
                return Err(AppError::Internal(json!({
                    "reason": format!("Failed to verify conversation: {err}"),
                })));
            }
        };
        info.get("sandbox_id")
            .and_then(Value::as_str)
            .filter(|id| !id.is_empty())
            .map(str::to_owned)
            .ok_or_else(|| {
                AppError::InvalidParams(json!({
                    "reason": "Conversation has no associated sandbox",
                    "conversation_id": conversation_id,
                    "help": "The conversation may not have been started with a sandbox.",
                }))
            })
    }
}

impl SessionProvider for CloudProvider {
    fn kind(&self) -> AgentKind {
        AgentKind::Cloud
    }

    fn auth_methods(&self) -> Vec<AuthMethod> {
        if self.has_api_key() {
            return Vec::new();
        }
        vec![AuthMethod {
            id: OAUTH_METHOD.to_owned(),
            name: "OAuth with the cloud service".to_owned(),
            description: Some("Sign in to the cloud service to run sessions in a sandbox".to_owned()),
        }]
    }

    fn authenticate(&self, method_id: String) -> ProviderFuture<'_, ()> {
        Box::pin(async move {
            info!(method_id = method_id.as_str(), "authentication requested");
            if method_id != OAUTH_METHOD {
                return Err(AppError::invalid_params(format!(
                    "Unsupported authentication method: {method_id}"
                )));
            }
            // The sign-in flow itself runs outside the adapter and leaves the
            // key in the keychain or the environment.
            let mut config = GlobalConfig::default();
            config.load_credentials().await?;
            let Some(key) = config.cloud.api_key else {
                return Err(AppError::auth_required(format!(
                    "No cloud API key found; sign in or set {CLOUD_API_KEY_ENV}"
                )));
            };
            *self.api_key.write().unwrap_or_else(PoisonError::into_inner) = Some(key);
            info!("cloud credentials loaded");
            Ok(())
        })
    }

    fn create(&self, request: SessionRequest) -> ProviderFuture<'_, Arc<dyn Conversation>> {
        Box::pin(async move {
            let client = self.client("Authentication required to create a cloud session")?;
            if !client.validate().await? {
                return Err(AppError::auth_required(
                    "Authentication required to create a cloud session",
                ));
            }
            let mcp_config = mcp::merged_config(&self.mcp_config_path, &request.mcp_servers)?;

            let sandbox_id = if request.resume {
                Some(self.sandbox_for(&client, &request.session_id).await?)
            } else {
                None
            };
            let workspace = CloudWorkspace::provision(
                client,
                sandbox_id.as_deref(),
                self.keep_alive,
                self.poll_interval,
            )
            .await?;

            let connected = RemoteConversation::connect(
                &workspace,
                &request.session_id,
                &mcp_config,
                request.sink,
                self.request_timeout,
                self.poll_interval,
            )
            .await;
            let conversation = match connected {
                Ok(conversation) => conversation,
                Err(err) => {
                    if let Err(cleanup) = workspace.cleanup().await {
                        warn!(session_id = request.session_id.as_str(), %cleanup, "sandbox cleanup failed");
                    }
                    return Err(err);
                }
            };
            self.workspaces().insert(request.session_id, workspace);
            Ok(Arc::new(conversation) as Arc<dyn Conversation>)
        })
    }

    fn loads_from_storage(&self) -> bool {
        false
    }

    fn list_sessions(&self, _cwd: Option<String>) -> ProviderFuture<'_, Vec<SessionInfo>> {
        Box::pin(async move {
            let Ok(client) = self.client("Authentication required to list sessions") else {
                warn!("no API key available, returning empty session list");
                return Ok(Vec::new());
            };
            let conversations = match client.list_conversations().await {
                Ok(conversations) => conversations,
                Err(err) => {
                    warn!(%err, "failed to list cloud sessions");
                    return Ok(Vec::new());
                }
            };
            let sessions: Vec<SessionInfo> = conversations
                .iter()
                .filter(|conv| conv.get("conversation_version").and_then(Value::as_str) == Some("V1"))
                .map(|conv| SessionInfo {
                    session_id: string_field(conv, "conversation_id").unwrap_or_default(),
                    cwd: "/".to_owned(),
                    title: string_field(conv, "title"),
                    updated_at: string_field(conv, "last_updated_at"),
                })
                .collect();
            info!(count = sessions.len(), "cloud sessions listed");
            Ok(sessions)
        })
    }

    fn release(&self, session_id: String) -> ProviderFuture<'_, ()> {
        Box::pin(async move {
            let workspace = self.workspaces().remove(&session_id);
            match workspace {
                Some(workspace) => workspace.cleanup().await,
                None => Ok(()),
            }
        })
    }
}

fn string_field(value: &Value, key: &str) -> Option<String> {
    value.get(key).and_then(Value::as_str).map(str::to_owned)
}
