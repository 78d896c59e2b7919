//! Local hosting: one engine child process per session, history on disk.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use super::mcp;
use super::provider::{ProviderFuture, SessionProvider, SessionRequest};
use crate::acp::schema::{AuthMethod, SessionInfo};
use crate::config::GlobalConfig;
use crate::engine::process::{ConversationOptions, EngineLaunch, ProcessConversation};
use crate::engine::store::EventStore;
use crate::engine::Conversation;
use crate::mode::AgentKind;
use crate::{AppError, Result};

/// Provider spawning the engine locally.
#[derive(Debug, Clone)]
pub struct LocalProvider {
    launch: EngineLaunch,
    conversations_dir: PathBuf,
    default_work_dir: PathBuf,
    mcp_config_path: PathBuf,
}

impl LocalProvider {
    /// Provider configured from `config`.
    #[must_use]
    pub fn new(config: &GlobalConfig) -> Self {
        let default_work_dir = config
            .work_dir
            .clone()
            .or_else(|| std::env::current_dir().ok())
            .unwrap_or_else(|| PathBuf::from("."));
        Self {
            launch: EngineLaunch {
                command: config.agent.command.clone(),
                args: config.agent.args.clone(),
                startup_timeout: Duration::from_secs(config.agent.startup_timeout_seconds),
            },
            conversations_dir: config.conversations_dir(),
            default_work_dir,
            mcp_config_path: config.mcp_config_path(),
        }
    }

    /// Directory holding persisted conversations.
    #[must_use]
    pub fn conversations_dir(&self) -> &Path {
        &self.conversations_dir
    }

    /// Resolve and prepare the working directory for a session.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::InvalidParams`] when the path exists but is not a
    /// directory, and [`AppError::Io`] when it cannot be created.
    pub fn prepare_work_dir(&self, requested: Option<PathBuf>) -> Result<PathBuf> {
        let dir = requested.unwrap_or_else(|| self.default_work_dir.clone());
        if !dir.exists() {
            warn!(path = %dir.display(), "working directory does not exist, creating it");
            fs::create_dir_all(&dir)?;
        }
        if !dir.is_dir() {
            return Err(AppError::invalid_params(format!(
                "Working directory path is not a directory: {}",
                dir.display()
            )));
        }
        Ok(dir)
    }
}

impl SessionProvider for LocalProvider {
    fn kind(&self) -> AgentKind {
        AgentKind::Local
    }

    fn auth_methods(&self) -> Vec<AuthMethod> {
        Vec::new()
    }

    fn authenticate(&self, method_id: String) -> ProviderFuture<'_, ()> {
        Box::pin(async move {
            info!(method_id = method_id.as_str(), "authentication requested, nothing to do locally");
            Ok(())
        })
    }

    fn create(&self, request: SessionRequest) -> ProviderFuture<'_, Arc<dyn Conversation>> {
        Box::pin(async move {
            let working_dir = self.prepare_work_dir(request.working_dir)?;
            let mcp_config = mcp::merged_config(&self.mcp_config_path, &request.mcp_servers)?;
            let store = EventStore::open(&self.conversations_dir, &request.session_id)?;
            let options = ConversationOptions {
                conversation_id: request.session_id,
                working_dir,
                mcp_config,
                streaming: request.streaming,
            };
            let conversation =
                ProcessConversation::spawn(&self.launch, options, store, request.sink).await?;
            Ok(Arc::new(conversation) as Arc<dyn Conversation>)
        })
    }

    fn loads_from_storage(&self) -> bool {
        true
    }

    fn list_sessions(&self, cwd: Option<String>) -> ProviderFuture<'_, Vec<SessionInfo>> {
        Box::pin(async move {
            info!(?cwd, "list sessions requested");
            Ok(Vec::new())
        })
    }

    fn release(&self, _session_id: String) -> ProviderFuture<'_, ()> {
        Box::pin(async { Ok(()) })
    }
}
