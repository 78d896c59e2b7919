//! Conversation hosted by the agent server inside a cloud sandbox.
//!
//! Agent server endpoints, relative to the sandbox URL, all authenticated
//! with `X-Session-API-Key`:
//!
//! | Operation            | Endpoint                                              |
//! |----------------------|-------------------------------------------------------|
//! | start / resume       | `POST /api/conversations`                             |
//! | state                | `GET /api/conversations/{id}`                         |
//! | history page         | `GET /api/conversations/{id}/events?offset={n}`       |
//! | send message         | `POST /api/conversations/{id}/events`                 |
//! | run                  | `POST /api/conversations/{id}/run`                    |
//! | pause                | `POST /api/conversations/{id}/pause`                  |
//! | policy / analyzer    | `POST /api/conversations/{id}/confirmation_policy`, `.../security_analyzer` |
//! | reject pending       | `POST /api/conversations/{id}/events/respond_to_confirmation` |
//!
//! HTTP calls are made by one worker task, in submission order. A run is
//! followed by polling until the server reports a state other than
//! `running`; every new event is mirrored and published on the sink.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use reqwest::{header, Client};
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::runtime::Handle;
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::client::{extract_list, json_client, request_json, request_status_only};
use super::workspace::CloudWorkspace;
use crate::engine::{
    ActionEvent, ConfirmationPolicy, Conversation, DomainEvent, EngineMessage, EngineSink,
    ExecutionStatus, Message, SecurityAnalyzer, UsageMetrics,
};
use crate::{AppError, Result};

const COMMAND_CAPACITY: usize = 64;

/// Server-side state of a conversation.
#[derive(Debug, Clone, Deserialize)]
struct ConversationState {
    #[serde(default)]
    execution_status: ExecutionStatus,
    #[serde(default)]
    metrics: Option<UsageMetrics>,
}

/// Agent server API bound to one conversation.
#[derive(Debug, Clone)]
struct AgentServer {
    http: Client,
    root: String,
    conversation_id: String,
}

impl AgentServer {
    fn new(workspace: &CloudWorkspace, conversation_id: &str, timeout: Duration) -> Result<Self> {
        let mut headers = header::HeaderMap::new();
        if let Some(key) = workspace.session_api_key() {
            let value = header::HeaderValue::from_str(key)
                .map_err(|err| AppError::Cloud(format!("invalid session API key: {err}")))?;
            headers.insert("X-Session-API-Key", value);
        }
        Ok(Self {
            http: json_client(headers, timeout)?,
            root: format!(
                "{}/api/conversations",
                workspace.agent_server_url().trim_end_matches('/')
            ),
            conversation_id: conversation_id.to_owned(),
        })
    }

    fn url(&self, suffix: &str) -> String {
        format!("{}/{}{suffix}", self.root, self.conversation_id)
    }

    async fn start(&self, mcp_config: &Value) -> Result<()> {
        request_status_only(self.http.post(&self.root).json(&json!({
            "conversation_id": self.conversation_id,
            "mcp_config": mcp_config,
        })))
        .await
    }

    async fn state(&self) -> Result<ConversationState> {
        request_json(self.http.get(self.url(""))).await
    }

    async fn events_from(&self, offset: usize) -> Result<Vec<DomainEvent>> {
        let page: Value =
            request_json(self.http.get(self.url(&format!("/events?offset={offset}")))).await?;
        let mut events = Vec::new();
        for item in extract_list(page, "items") {
            match serde_json::from_value(item) {
                Ok(event) => events.push(event),
                Err(err) => warn!(%err, "skipping undecodable remote event"),
            }
        }
        Ok(events)
    }

    async fn post(&self, suffix: &str, body: Value) -> Result<()> {
        request_status_only(self.http.post(self.url(suffix)).json(&body)).await
    }
}

#[derive(Debug)]
struct Mirror {
    status: ExecutionStatus,
    events: Vec<DomainEvent>,
    policy: ConfirmationPolicy,
    analyzer: Option<SecurityAnalyzer>,
}

struct Shared {
    session_id: String,
    server: AgentServer,
    mirror: Mutex<Mirror>,
    sink: EngineSink,
    poll_interval: Duration,
}

impl Shared {
    fn mirror(&self) -> MutexGuard<'_, Mirror> {
        self.mirror.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Mirror and publish events the server has that we have not seen.
    async fn sync_events(&self) -> Result<()> {
        let offset = self.mirror().events.len();
        let fresh = self.server.events_from(offset).await?;
        for event in fresh {
            self.mirror().events.push(event.clone());
            self.sink.publish(EngineMessage::Event(event)).await;
        }
        Ok(())
    }

    async fn run_to_stop(&self, cancel: &CancellationToken) -> Result<()> {
        self.mirror().status = ExecutionStatus::Running;
        self.server.post("/run", json!({})).await?;
        loop {
            tokio::select! {
                biased;
                () = cancel.cancelled() => {
                    return Err(AppError::Engine("remote conversation closed".into()));
                }
                () = tokio::time::sleep(self.poll_interval) => {}
            }
            self.sync_events().await?;
            let state = self.server.state().await?;
            if let Some(metrics) = state.metrics {
                self.sink.publish(EngineMessage::Metrics(metrics)).await;
            }
            if state.execution_status != ExecutionStatus::Running {
                // Events written between the two calls.
                self.sync_events().await?;
                self.mirror().status = state.execution_status;
                debug!(
                    session_id = self.session_id.as_str(),
                    status = ?state.execution_status,
                    "remote run stopped"
                );
                return Ok(());
            }
        }
    }
}

enum Command {
    Send(&'static str, Value),
    Run(oneshot::Sender<Result<()>>),
}

/// [`Conversation`] backed by a sandbox agent server.
pub struct RemoteConversation {
    shared: Arc<Shared>,
    commands: mpsc::Sender<Command>,
    cancel: CancellationToken,
    runtime: Handle,
}

impl RemoteConversation {
    /// Start or resume `conversation_id` on the workspace's agent server.
    ///
    /// On resume the server's history is mirrored without being published;
    /// the caller replays it.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Cloud`] or [`AppError::AuthRequired`] from the
    /// agent server.
    pub async fn connect(
        workspace: &CloudWorkspace,
        conversation_id: &str,
        mcp_config: &Value,
        sink: EngineSink,
        request_timeout: Duration,
        poll_interval: Duration,
    ) -> Result<Self> {
        let server = AgentServer::new(workspace, conversation_id, request_timeout)?;
        let existing = match server.state().await {
            Ok(state) => Some(state),
            Err(AppError::NotFound(_)) => None,
            Err(err) => return Err(err),
        };
        let (status, history) = match existing {
            Some(state) => (state.execution_status, server.events_from(0).await?),
            None => {
                server.start(mcp_config).await?;
                (ExecutionStatus::Idle, Vec::new())
            }
        };
        info!(
            session_id = conversation_id,
            sandbox_id = workspace.sandbox_id(),
            resumed_events = history.len(),
            "remote conversation connected"
        );

        let shared = Arc::new(Shared {
            session_id: conversation_id.to_owned(),
            server,
            mirror: Mutex::new(Mirror {
                status,
                events: history,
                policy: ConfirmationPolicy::NeverConfirm,
                analyzer: None,
            }),
            sink,
            poll_interval,
        });
        let cancel = CancellationToken::new();
        let (commands, rx) = mpsc::channel(COMMAND_CAPACITY);
        tokio::spawn(run_worker(Arc::clone(&shared), rx, cancel.clone()));

        Ok(Self {
            shared,
            commands,
            cancel,
            runtime: Handle::current(),
        })
    }

    fn submit(&self, path: &'static str, body: Value) -> Result<()> {
        self.commands
            .try_send(Command::Send(path, body))
            .map_err(|err| match err {
                mpsc::error::TrySendError::Full(_) => {
                    AppError::Engine(format!("remote command queue full, dropped {path}"))
                }
                mpsc::error::TrySendError::Closed(_) => {
                    AppError::Engine("remote conversation closed".into())
                }
            })
    }
}

impl Conversation for RemoteConversation {
    fn id(&self) -> &str {
        &self.shared.session_id
    }

    fn send_message(&self, message: Message) -> Result<()> {
        self.submit("/events", json!({ "role": message.role, "content": message.content, "run": false }))
    }

    fn run(&self) -> Result<()> {
        let (tx, rx) = oneshot::channel();
        self.commands
            .blocking_send(Command::Run(tx))
            .map_err(|_| AppError::Engine("remote conversation closed".into()))?;
        rx.blocking_recv()
            .map_err(|_| AppError::Engine("remote conversation closed during run".into()))?
    }

    fn pause(&self) -> Result<()> {
        // Bypasses the queue: a run may be occupying the worker.
        let shared = Arc::clone(&self.shared);
        self.runtime.spawn(async move {
            if let Err(err) = shared.server.post("/pause", json!({})).await {
                warn!(session_id = shared.session_id.as_str(), %err, "remote pause failed");
            }
        });
        Ok(())
    }

    fn execution_status(&self) -> ExecutionStatus {
        self.shared.mirror().status
    }

    fn events(&self) -> Vec<DomainEvent> {
        self.shared.mirror().events.clone()
    }

    fn pending_actions(&self) -> Vec<ActionEvent> {
        let mirror = self.shared.mirror();
        if mirror.status != ExecutionStatus::WaitingForConfirmation {
            return Vec::new();
        }
        unanswered_actions(&mirror.events)
    }

    fn reject_pending_actions(&self, reason: &str) -> Result<()> {
        self.submit(
            "/events/respond_to_confirmation",
            json!({ "accept": false, "reason": reason }),
        )
    }

    fn set_confirmation_policy(&self, policy: ConfirmationPolicy) -> Result<()> {
        self.submit("/confirmation_policy", json!({ "policy": policy }))?;
        self.shared.mirror().policy = policy;
        Ok(())
    }

    fn set_security_analyzer(&self, analyzer: Option<SecurityAnalyzer>) -> Result<()> {
        self.submit("/security_analyzer", json!({ "analyzer": analyzer }))?;
        self.shared.mirror().analyzer = analyzer;
        Ok(())
    }

    fn confirmation_policy(&self) -> ConfirmationPolicy {
        self.shared.mirror().policy
    }

    fn security_analyzer(&self) -> Option<SecurityAnalyzer> {
        self.shared.mirror().analyzer
    }

    fn close(&self) -> Result<()> {
        self.cancel.cancel();
        Ok(())
    }
}

impl Drop for RemoteConversation {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// Actions with no observation, rejection or error answering them yet.
#[must_use]
pub fn unanswered_actions(events: &[DomainEvent]) -> Vec<ActionEvent> {
    let answered: HashSet<&str> = events
        .iter()
        .filter_map(|event| match event {
            DomainEvent::Observation(e) => Some(e.tool_call_id.as_str()),
            DomainEvent::UserReject(e) => Some(e.tool_call_id.as_str()),
            DomainEvent::AgentError(e) => Some(e.tool_call_id.as_str()),
            _ => None,
        })
        .collect();
    events
        .iter()
        .filter_map(|event| match event {
            DomainEvent::Action(action) if !answered.contains(action.tool_call_id.as_str()) => {
                Some(action.clone())
            }
            _ => None,
        })
        .collect()
}

async fn run_worker(shared: Arc<Shared>, mut rx: mpsc::Receiver<Command>, cancel: CancellationToken) {
    let session_id = shared.session_id.clone();
    loop {
        let command = tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            command = rx.recv() => match command {
                Some(command) => command,
                None => break,
            },
        };
        match command {
            Command::Send(path, body) => {
                if let Err(err) = shared.server.post(path, body).await {
                    warn!(session_id, path, %err, "remote command failed");
                }
            }
            Command::Run(reply) => {
                let result = shared.run_to_stop(&cancel).await;
                if result.is_err() {
                    shared.mirror().status = ExecutionStatus::Error;
                }
                let _ = reply.send(result);
            }
        }
    }
    debug!(session_id, "remote worker stopped");
}
