//! Protocol handler shared by every hosting backend.
//!
//! [`AcpAgent`] implements the ACP agent methods once. Backend-specific
//! behavior (how a conversation is built, whether sessions can be reloaded
//! from storage, which auth methods exist) comes from its
//! [`SessionProvider`].

use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use serde_json::{json, Value};
use tracing::{debug, info, info_span, warn, Instrument};
use uuid::Uuid;

use super::commands::{self, parse_slash_command};
use super::confirmation::{mode_state, valid_mode_ids, ConfirmationMode};
use super::prompt::{convert_prompt, single_text};
use super::provider::{SessionProvider, SessionRequest};
use super::registry::{Session, SessionRegistry};
use super::runner::run_turn;
use super::supervisor::{CancelOutcome, TaskSupervisor, TurnEnd};
use crate::acp::connection::Client;
use crate::acp::schema::{
    AgentCapabilities, AuthenticateRequest, CloseSessionRequest, Implementation,
    InitializeRequest, InitializeResponse, ListSessionsRequest, ListSessionsResponse,
    LoadSessionRequest, LoadSessionResponse, McpCapabilities, McpServer, NewSessionRequest,
    NewSessionResponse, PromptCapabilities, PromptRequest, PromptResponse, SessionNotification,
    SessionUpdate, SetSessionModeRequest, SetSessionModelRequest, StopReason,
};
use crate::config::GlobalConfig;
use crate::engine::{EngineSink, ExecutionStatus, Message, Role};
use crate::events::pump::replay;
use crate::events::{EventPump, SessionContext};
use crate::{AppError, Result};

/// Name reported in `initialize`.
pub const AGENT_NAME: &str = "acp-adapter";

/// Runtime settings of the protocol handler.
#[derive(Debug, Clone)]
pub struct AgentSettings {
    /// Forward token-level deltas.
    pub streaming: bool,
    /// Bounded wait of `session/cancel`.
    pub cancel_timeout: Duration,
    /// Mode applied to every newly built conversation.
    pub default_mode: ConfirmationMode,
    /// Where non-image prompt blobs are written.
    pub resource_cache_dir: PathBuf,
    /// Capacity of each session's engine channel.
    pub channel_capacity: usize,
    /// Conversation reused by the first `session/new`.
    pub resume_id: Option<String>,
}

impl AgentSettings {
    /// Settings derived from the loaded configuration.
    #[must_use]
    pub fn from_config(config: &GlobalConfig, resume_id: Option<String>) -> Self {
        Self {
            streaming: config.streaming,
            cancel_timeout: config.cancel_timeout(),
            default_mode: config.default_confirmation_mode,
            resource_cache_dir: config.resource_cache_dir(),
            channel_capacity: config.agent.event_channel_capacity,
            resume_id,
        }
    }
}

/// ACP agent over a [`SessionProvider`].
pub struct AcpAgent<P: SessionProvider> {
    provider: P,
    client: Client,
    registry: SessionRegistry,
    supervisor: TaskSupervisor,
    settings: AgentSettings,
    resume_id: Mutex<Option<String>>,
}

impl<P: SessionProvider> AcpAgent<P> {
    /// Handler sending host-bound traffic through `client`.
    pub fn new(provider: P, client: Client, mut settings: AgentSettings) -> Self {
        let resume_id = settings.resume_id.take();
        if let Some(id) = &resume_id {
            info!(conversation_id = id.as_str(), "will resume conversation on first session/new");
        }
        info!(
            kind = provider.kind().as_str(),
            mode = settings.default_mode.as_str(),
            streaming = settings.streaming,
            "agent initialized"
        );
        Self {
            provider,
            client,
            registry: SessionRegistry::new(),
            supervisor: TaskSupervisor::new(),
            settings,
            resume_id: Mutex::new(resume_id),
        }
    }

    /// The backend.
    #[must_use]
    pub fn provider(&self) -> &P {
        &self.provider
    }

    /// Live sessions.
    #[must_use]
    pub fn registry(&self) -> &SessionRegistry {
        &self.registry
    }

    // ── initialize / authenticate ────────────────────────────────────────────

    /// `initialize`.
    #[must_use]
    pub fn initialize(&self, request: &InitializeRequest) -> InitializeResponse {
        info!(protocol_version = request.protocol_version, "initializing");
        InitializeResponse {
            protocol_version: request.protocol_version,
            agent_capabilities: AgentCapabilities {
                load_session: true,
                mcp_capabilities: McpCapabilities {
                    http: true,
                    sse: true,
                },
                prompt_capabilities: PromptCapabilities {
                    image: true,
                    audio: false,
                    embedded_context: true,
                },
            },
            auth_methods: self.provider.auth_methods(),
            agent_info: Implementation {
                name: AGENT_NAME.to_owned(),
                version: env!("CARGO_PKG_VERSION").to_owned(),
            },
        }
    }

    /// `authenticate`.
    ///
    /// # Errors
    ///
    /// Propagates the provider's rejection.
    pub async fn authenticate(&self, request: AuthenticateRequest) -> Result<Value> {
        self.provider.authenticate(request.method_id).await?;
        Ok(json!({}))
    }

    // ── session lifecycle ────────────────────────────────────────────────────

    /// `session/new`. The first call after startup reuses the resume id.
    ///
    /// # Errors
    ///
    /// Construction failures; unstructured ones as internal errors.
    pub async fn new_session(&self, request: NewSessionRequest) -> Result<NewSessionResponse> {
        let resume_id = self
            .resume_id
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        let resumed = resume_id.is_some();
        let session_id = resume_id.unwrap_or_else(|| Uuid::new_v4().to_string());
        let span = info_span!("session_new", session_id = session_id.as_str(), resumed);

        async {
            let working_dir = non_empty_path(&request.cwd);
            info!(cwd = request.cwd.as_str(), "creating session");
            let (session, _) = self
                .open_session(&session_id, working_dir, request.mcp_servers, resumed)
                .await
                .map_err(|err| structured(err, "Failed to create session"))?;

            if resumed {
                let events = session.conversation.events();
                info!(events = events.len(), "replaying resumed conversation");
                replay(&self.client, &SessionContext::new(&session_id), &events).await?;
            }
            self.send_available_commands(&session_id).await;

            Ok(NewSessionResponse {
                session_id: session_id.clone(),
                modes: mode_state(ConfirmationMode::of(session.conversation.as_ref())),
            })
        }
        .instrument(span)
        .await
    }

    /// `session/load`: replay the history of a known session.
    ///
    /// # Errors
    ///
    /// - [`AppError::InvalidParams`] for a malformed id, or an unknown one on
    ///   a backend that cannot load from storage.
    /// - [`AppError::Internal`] for other failures.
    pub async fn load_session(&self, request: LoadSessionRequest) -> Result<LoadSessionResponse> {
        let session_id = request.session_id;
        let span = info_span!("session_load", session_id = session_id.as_str());

        async {
            if Uuid::parse_str(&session_id).is_err() {
                return Err(AppError::InvalidParams(json!({
                    "reason": "Invalid session ID format",
                    "sessionId": session_id,
                })));
            }

            let session = match self.registry.get(&session_id) {
                Some(session) => session,
                None if self.provider.loads_from_storage() => {
                    self.open_session(
                        &session_id,
                        non_empty_path(&request.cwd),
                        request.mcp_servers,
                        true,
                    )
                    .await
                    .map_err(|err| structured(err, "Failed to load session"))?
                    .0
                }
                None => {
                    return Err(AppError::InvalidParams(json!({
                        "reason": "Session not found",
                        "sessionId": session_id,
                        "help": "Cloud mode doesn't support loading sessions from disk. \
                                 Each cloud session creates a new sandbox.",
                    })));
                }
            };

            let modes = mode_state(ConfirmationMode::of(session.conversation.as_ref()));
            let events = session.conversation.events();
            if events.is_empty() {
                warn!("session has no history");
                return Ok(LoadSessionResponse { modes });
            }

            info!(events = events.len(), "replaying conversation history");
            replay(&self.client, &SessionContext::new(&session_id), &events)
                .await
                .map_err(|err| structured(err, "Failed to load session"))?;
            self.send_available_commands(&session_id).await;
            Ok(LoadSessionResponse { modes })
        }
        .instrument(span)
        .await
    }

    /// `session/close`: drop the session and release its resources.
    ///
    /// Cleanup failures are logged, never returned.
    pub async fn close_session(&self, request: CloseSessionRequest) -> Value {
        info!(session_id = request.session_id.as_str(), "closing session");
        if let Some(session) = self.registry.remove(&request.session_id) {
            self.teardown(&session).await;
        }
        json!({})
    }

    /// Close every session; used on shutdown.
    pub async fn close_all(&self) {
        self.supervisor.abort_all();
        let sessions = self.registry.drain();
        info!(count = sessions.len(), "closing all sessions");
        for session in sessions {
            self.teardown(&session).await;
        }
    }

    /// `session/list`.
    ///
    /// # Errors
    ///
    /// Propagates provider failures.
    pub async fn list_sessions(&self, request: ListSessionsRequest) -> Result<ListSessionsResponse> {
        let sessions = self.provider.list_sessions(request.cwd).await?;
        Ok(ListSessionsResponse { sessions })
    }

    // ── prompt / cancel ──────────────────────────────────────────────────────

    /// `session/prompt`: run one turn, or answer a slash command directly.
    ///
    /// # Errors
    ///
    /// - Structured errors (busy session, bad params) unchanged.
    /// - Anything else: an `Error: …` message chunk is sent first, then
    ///   [`AppError::Internal`] with reason `Failed to process prompt`.
    pub async fn prompt(&self, request: PromptRequest) -> Result<PromptResponse> {
        let session_id = request.session_id.clone();
        let span = info_span!("prompt", session_id = session_id.as_str());

        match self.prompt_inner(request).instrument(span).await {
            Ok(stop_reason) => Ok(PromptResponse { stop_reason }),
            Err(err) if err.is_structured() => Err(err),
            Err(err) => {
                warn!(session_id = session_id.as_str(), %err, "prompt failed");
                self.send_update(&session_id, SessionUpdate::message(format!("Error: {err}")))
                    .await;
                Err(AppError::internal("Failed to process prompt", err))
            }
        }
    }

    async fn prompt_inner(&self, request: PromptRequest) -> Result<StopReason> {
        let session_id = request.session_id;
        let (session, _) = self
            .open_session(&session_id, None, Vec::new(), false)
            .await?;
        let conversation = Arc::clone(&session.conversation);

        let content = convert_prompt(&request.prompt, &self.settings.resource_cache_dir)?;
        if content.is_empty() {
            debug!("empty prompt");
            return Ok(StopReason::EndTurn);
        }

        if let Some((command, rest)) = single_text(&content).and_then(parse_slash_command) {
            info!(command = command.as_str(), rest = rest.as_str(), "executing slash command");
            let current = ConfirmationMode::of(conversation.as_ref());
            let outcome = commands::execute(&command, &rest, current);
            if let Some(mode) = outcome.mode_change {
                mode.apply(conversation.as_ref())?;
                self.send_update(
                    &session_id,
                    SessionUpdate::CurrentModeUpdate {
                        current_mode_id: mode.as_str().to_owned(),
                    },
                )
                .await;
            }
            self.send_update(&session_id, SessionUpdate::message(outcome.reply))
                .await;
            return Ok(StopReason::EndTurn);
        }

        // The message is queued only once the turn holds the session's slot,
        // so a rejected prompt leaves the conversation untouched.
        let turn = {
            let conversation = Arc::clone(&conversation);
            let client = self.client.clone();
            let session_id = session_id.clone();
            async move {
                conversation.send_message(Message {
                    role: Role::User,
                    content,
                })?;
                run_turn(conversation, client, session_id).await
            }
        };
        let end = self.supervisor.run(&session_id, turn).await?;
        // Every notification of the turn reaches the host before the reply.
        session.sink.flush().await;

        match end {
            TurnEnd::Completed(result) => {
                result?;
                if conversation.execution_status() == ExecutionStatus::Paused {
                    return Ok(StopReason::Cancelled);
                }
                Ok(StopReason::EndTurn)
            }
            TurnEnd::Aborted => Ok(StopReason::Cancelled),
        }
    }

    /// `session/cancel`: pause the engine, then wait (bounded) for the turn.
    ///
    /// # Errors
    ///
    /// [`AppError::Internal`] when pausing fails or the turn terminated
    /// abnormally while being waited on.
    pub async fn cancel(&self, session_id: &str) -> Result<()> {
        let Some(session) = self.registry.get(session_id) else {
            debug!(session_id, "cancel for unknown session ignored");
            return Ok(());
        };
        info!(session_id, "cancelling");
        session
            .conversation
            .pause()
            .map_err(|err| AppError::internal("Failed to cancel session", err))?;

        match self
            .supervisor
            .wait_or_abort(session_id, self.settings.cancel_timeout)
            .await?
        {
            CancelOutcome::Idle => debug!(session_id, "no turn running"),
            CancelOutcome::Finished => info!(session_id, "turn stopped after pause"),
            CancelOutcome::Aborted => warn!(session_id, "turn aborted after cancel timeout"),
        }
        Ok(())
    }

    // ── modes / inert methods ────────────────────────────────────────────────

    /// `session/set_mode`.
    ///
    /// # Errors
    ///
    /// [`AppError::InvalidParams`] listing the valid modes for an unknown id.
    pub async fn set_session_mode(&self, request: SetSessionModeRequest) -> Result<Value> {
        info!(
            session_id = request.session_id.as_str(),
            mode_id = request.mode_id.as_str(),
            "set session mode"
        );
        let Some(mode) = ConfirmationMode::ALL
            .into_iter()
            .find(|mode| mode.as_str() == request.mode_id)
        else {
            return Err(AppError::InvalidParams(json!({
                "reason": format!("Invalid mode ID: {}", request.mode_id),
                "validModes": valid_mode_ids(),
            })));
        };

        match self.registry.get(&request.session_id) {
            Some(session) => mode.apply(session.conversation.as_ref())?,
            None => warn!(
                session_id = request.session_id.as_str(),
                "cannot set confirmation mode: session not found"
            ),
        }
        self.send_update(
            &request.session_id,
            SessionUpdate::CurrentModeUpdate {
                current_mode_id: mode.as_str().to_owned(),
            },
        )
        .await;
        Ok(json!({}))
    }

    /// `session/set_model`: accepted and ignored.
    #[must_use]
    pub fn set_session_model(&self, request: &SetSessionModelRequest) -> Value {
        info!(
            session_id = request.session_id.as_str(),
            model_id = request.model_id.as_str(),
            "set session model ignored"
        );
        json!({})
    }

    /// `_`-prefixed extension request.
    #[must_use]
    pub fn ext_method(&self, method: &str, params: &Value) -> Value {
        info!(method, %params, "extension method not supported");
        json!({ "error": "ext_method not supported" })
    }

    /// `_`-prefixed extension notification.
    pub fn ext_notification(&self, method: &str, params: &Value) {
        info!(method, %params, "extension notification received");
    }

    // ── helpers ──────────────────────────────────────────────────────────────

    async fn open_session(
        &self,
        session_id: &str,
        working_dir: Option<PathBuf>,
        mcp_servers: Vec<McpServer>,
        resume: bool,
    ) -> Result<(Arc<Session>, bool)> {
        self.registry
            .get_or_try_init(session_id, || {
                self.build_session(session_id, working_dir, mcp_servers, resume)
            })
            .await
    }

    async fn build_session(
        &self,
        session_id: &str,
        working_dir: Option<PathBuf>,
        mcp_servers: Vec<McpServer>,
        resume: bool,
    ) -> Result<Session> {
        debug!(session_id, resume, "building conversation");
        let (sink, rx) = EngineSink::channel(session_id, self.settings.channel_capacity);
        let conversation = self
            .provider
            .create(SessionRequest {
                session_id: session_id.to_owned(),
                working_dir,
                mcp_servers,
                sink: sink.clone(),
                streaming: self.settings.streaming,
                resume,
            })
            .await?;

        if let Err(err) = self.settings.default_mode.apply(conversation.as_ref()) {
            if let Err(close) = conversation.close() {
                debug!(session_id, %close, "close after failed setup");
            }
            return Err(err);
        }

        let pump = tokio::spawn(
            EventPump::new(session_id, self.settings.streaming).run(rx, self.client.clone()),
        );
        Ok(Session {
            id: session_id.to_owned(),
            conversation,
            sink,
            pump,
        })
    }

    async fn teardown(&self, session: &Session) {
        if let Err(err) = session.conversation.close() {
            warn!(session_id = session.id.as_str(), %err, "error closing conversation");
        }
        if let Err(err) = self.provider.release(session.id.clone()).await {
            warn!(session_id = session.id.as_str(), %err, "error releasing session resources");
        }
    }

    async fn send_available_commands(&self, session_id: &str) {
        self.send_update(
            session_id,
            SessionUpdate::AvailableCommandsUpdate {
                available_commands: commands::available_commands(),
            },
        )
        .await;
    }

    async fn send_update(&self, session_id: &str, update: SessionUpdate) {
        if let Err(err) = self
            .client
            .session_update(SessionNotification::new(session_id, update))
            .await
        {
            warn!(session_id, %err, "failed to send session update");
        }
    }
}

fn non_empty_path(cwd: &str) -> Option<PathBuf> {
    let trimmed = cwd.trim();
    (!trimmed.is_empty()).then(|| PathBuf::from(trimmed))
}

/// Keep structured errors; wrap everything else as internal with `reason`.
fn structured(err: AppError, reason: &str) -> AppError {
    if err.is_structured() {
        err
    } else {
        AppError::internal(reason, err)
    }
}
