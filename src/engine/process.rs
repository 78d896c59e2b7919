//! Conversation backed by an engine child process.
//!
//! The engine is launched once per conversation with:
//! - `kill_on_drop(true)` so the process dies with its handle.
//! - `env_clear()` + a safe variable allowlist so the cloud API key and other
//!   secrets of the adapter never reach the engine.
//! - A startup timeout: the engine must print a ready line, then answer the
//!   `conversation/start` request, within the window.
//!
//! After startup both sides exchange NDJSON JSON-RPC. Requests sent to the
//! engine: `conversation/start`, `conversation/run`. Notifications sent to the
//! engine: `conversation/send_message`, `conversation/pause`,
//! `conversation/set_confirmation_policy`, `conversation/set_security_analyzer`,
//! `conversation/reject_pending_actions`, `conversation/close`.
//! Notifications received from the engine:
//!
//! | Method                  | Effect                                          |
//! |-------------------------|-------------------------------------------------|
//! | `conversation/event`    | persisted, mirrored, published as an event      |
//! | `conversation/token`    | published as a token delta                      |
//! | `conversation/metrics`  | published as a usage update                     |
//! | `conversation/status`   | mirrored execution status and pending actions   |
//! | *(any other)*           | skipped; logged at `DEBUG`                      |

use std::collections::HashMap;
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use futures_util::StreamExt;
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::{mpsc, oneshot};
use tokio_util::codec::FramedRead;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::conversation::{Conversation, EngineMessage, EngineSink};
use super::event::{ActionEvent, DomainEvent, Message};
use super::store::EventStore;
use super::stream::LlmStreamChunk;
use super::{ConfirmationPolicy, ExecutionStatus, SecurityAnalyzer, UsageMetrics};
use crate::acp::codec::AcpCodec;
use crate::acp::writer::run_writer;
use crate::{AppError, Result};

// ── Environment allowlist ────────────────────────────────────────────────────

/// Environment variables inherited by the engine process.
///
/// Every other variable is stripped via `env_clear()`. LLM provider keys are
/// expected in the engine's own settings store, not in the adapter's
/// environment.
pub const ALLOWED_ENV_VARS: &[&str] = &[
    "PATH",
    "HOME",
    "RUST_LOG",
    "LANG",
    "TERM",
    "USERPROFILE",
    "SystemRoot",
    "TEMP",
    "TMP",
    "USERNAME",
    "APPDATA",
    "LOCALAPPDATA",
    "COMSPEC",
];

/// Capacity of the adapter → engine outbound queue.
const OUTBOUND_CAPACITY: usize = 64;

// ── Configuration ────────────────────────────────────────────────────────────

/// How to launch the engine process.
#[derive(Debug, Clone)]
pub struct EngineLaunch {
    /// Engine executable.
    pub command: String,
    /// Arguments passed to the executable.
    pub args: Vec<String>,
    /// Maximum time for the ready line and the `conversation/start` reply.
    pub startup_timeout: Duration,
}

/// Per-conversation parameters passed in `conversation/start`.
#[derive(Debug, Clone)]
pub struct ConversationOptions {
    /// Conversation identifier.
    pub conversation_id: String,
    /// Working directory for tools; also the child's current directory.
    pub working_dir: PathBuf,
    /// Merged MCP server configuration (`{"mcpServers": {...}}`).
    pub mcp_config: Value,
    /// Whether the engine should emit token deltas.
    pub streaming: bool,
}

// ── Inbound parsing ──────────────────────────────────────────────────────────

/// Wire envelope received from the engine.
#[derive(Debug, Deserialize)]
struct EngineEnvelope {
    #[serde(default)]
    id: Option<u64>,
    #[serde(default)]
    method: Option<String>,
    #[serde(default)]
    params: Value,
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<Value>,
}

/// Parameters of `conversation/status`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StatusParams {
    status: ExecutionStatus,
    #[serde(default)]
    pending_actions: Option<Vec<ActionEvent>>,
}

/// Decoded message from the engine.
#[derive(Debug, Clone, PartialEq)]
pub enum EngineInbound {
    /// Reply to a request sent by the adapter.
    Response {
        /// Correlation id.
        id: u64,
        /// Result payload, or the engine's error message.
        result: std::result::Result<Value, String>,
    },
    /// Completed history event.
    Event(DomainEvent),
    /// Token delta.
    Token(LlmStreamChunk),
    /// Usage totals.
    Metrics(UsageMetrics),
    /// Execution status change.
    Status {
        /// New status.
        status: ExecutionStatus,
        /// Replacement list of pending actions, when reported.
        pending_actions: Option<Vec<ActionEvent>>,
    },
}

/// Parse one NDJSON line received from the engine.
///
/// # Return value
///
/// - `Ok(Some(msg))`: a recognized response or notification.
/// - `Ok(None)`: blank line or unknown method (logged at `DEBUG`).
///
/// # Errors
///
/// - [`AppError::Engine`]`("malformed json: …")`: not valid JSON.
/// - [`AppError::Engine`]`("invalid params for …")`: known method with a
///   payload that does not match its shape.
pub fn parse_engine_line(line: &str) -> Result<Option<EngineInbound>> {
    if line.trim().is_empty() {
        return Ok(None);
    }

    let envelope: EngineEnvelope =
        serde_json::from_str(line).map_err(|e| AppError::Engine(format!("malformed json: {e}")))?;

    if let (Some(id), None) = (envelope.id, envelope.method.as_deref()) {
        let result = match (envelope.result, envelope.error) {
            (_, Some(error)) => Err(error
                .get("message")
                .and_then(Value::as_str)
                .map_or_else(|| error.to_string(), str::to_owned)),
            (Some(result), None) => Ok(result),
            (None, None) => Ok(Value::Null),
        };
        return Ok(Some(EngineInbound::Response { id, result }));
    }

    let Some(method) = envelope.method else {
        debug!("engine: skipping message without method or id");
        return Ok(None);
    };
    let params = envelope.params;

    let decoded = match method.as_str() {
        "conversation/event" => EngineInbound::Event(field(&method, params, "event")?),
        "conversation/token" => EngineInbound::Token(field(&method, params, "chunk")?),
        "conversation/metrics" => EngineInbound::Metrics(field(&method, params, "metrics")?),
        "conversation/status" => {
            let status: StatusParams = serde_json::from_value(params)
                .map_err(|e| AppError::Engine(format!("invalid params for {method}: {e}")))?;
            EngineInbound::Status {
                status: status.status,
                pending_actions: status.pending_actions,
            }
        }
        other => {
            debug!(method = other, "engine: skipping unknown notification");
            return Ok(None);
        }
    };
    Ok(Some(decoded))
}

fn field<T: serde::de::DeserializeOwned>(method: &str, mut params: Value, name: &str) -> Result<T> {
    let value = params
        .get_mut(name)
        .map(Value::take)
        .ok_or_else(|| AppError::Engine(format!("invalid params for {method}: missing {name}")))?;
    serde_json::from_value(value)
        .map_err(|e| AppError::Engine(format!("invalid params for {method}: {e}")))
}

// ── Conversation handle ──────────────────────────────────────────────────────

type PendingReplies = Mutex<HashMap<u64, oneshot::Sender<std::result::Result<Value, String>>>>;

/// Adapter-side mirror of engine state.
#[derive(Debug)]
struct Mirror {
    status: ExecutionStatus,
    events: Vec<DomainEvent>,
    pending_actions: Vec<ActionEvent>,
    policy: ConfirmationPolicy,
    analyzer: Option<SecurityAnalyzer>,
}

/// State shared between the handle and its reader task.
struct Shared {
    session_id: String,
    mirror: Mutex<Mirror>,
    pending: PendingReplies,
    store: EventStore,
}

impl Shared {
    fn mirror(&self) -> MutexGuard<'_, Mirror> {
        self.mirror
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    fn fail_pending(&self, reason: &str) {
        let drained: Vec<_> = match self.pending.lock() {
            Ok(mut pending) => pending.drain().collect(),
            Err(_) => return,
        };
        for (_, tx) in drained {
            let _ = tx.send(Err(reason.to_owned()));
        }
    }
}

/// [`Conversation`] implemented by an engine child process.
pub struct ProcessConversation {
    shared: Arc<Shared>,
    outbound: mpsc::Sender<Value>,
    next_id: AtomicU64,
    cancel: CancellationToken,
    child: Mutex<Option<Child>>,
}

impl ProcessConversation {
    /// Spawn the engine, wait for readiness, and start the conversation.
    ///
    /// Persisted events are loaded from `store` before the engine starts and
    /// form the initial history.
    ///
    /// # Errors
    ///
    /// - `AppError::Engine("failed to spawn engine: …")`: OS spawn failure.
    /// - `AppError::Engine("startup timeout …")`: no ready line or start reply
    ///   within the window.
    /// - `AppError::Engine("engine process exited before ready signal")`.
    /// - `AppError::Engine` carrying the engine's own error for a rejected start.
    pub async fn spawn(
        launch: &EngineLaunch,
        options: ConversationOptions,
        store: EventStore,
        sink: EngineSink,
    ) -> Result<Self> {
        let session_id = options.conversation_id.clone();
        let history = store.load()?;
        info!(
            session_id,
            persisted_events = history.len(),
            "starting engine process"
        );

        let mut cmd = Command::new(&launch.command);
        cmd.args(&launch.args);

        cmd.env_clear();
        for &key in ALLOWED_ENV_VARS {
            if let Ok(val) = std::env::var(key) {
                cmd.env(key, val);
            }
        }
        cmd.env("ACP_CONVERSATION_ID", &session_id);

        cmd.current_dir(&options.working_dir)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true);

        let mut child = cmd
            .spawn()
            .map_err(|err| AppError::Engine(format!("failed to spawn engine: {err}")))?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| AppError::Engine("failed to capture engine stdin".into()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| AppError::Engine("failed to capture engine stdout".into()))?;

        let mut reader = BufReader::new(stdout);
        let mut line = String::new();
        match tokio::time::timeout(launch.startup_timeout, reader.read_line(&mut line)).await {
            Ok(Ok(n)) if n > 0 => {
                debug!(session_id, ready_line = line.trim(), "engine emitted ready signal");
            }
            Ok(Ok(_)) => {
                return Err(AppError::Engine(
                    "engine process exited before ready signal".into(),
                ));
            }
            Ok(Err(err)) => {
                return Err(AppError::Engine(format!(
                    "failed to read engine ready signal: {err}"
                )));
            }
            Err(_elapsed) => {
                child.kill().await.ok();
                return Err(AppError::Engine(format!(
                    "startup timeout: engine did not emit ready signal within {:?}",
                    launch.startup_timeout
                )));
            }
        }

        let cancel = CancellationToken::new();
        let (outbound, outbound_rx) = mpsc::channel(OUTBOUND_CAPACITY);

        let writer_session = session_id.clone();
        let writer_cancel = cancel.clone();
        tokio::spawn(async move {
            let result =
                run_writer(writer_session.clone(), stdin, outbound_rx, writer_cancel, None).await;
            if let Err(err) = result {
                warn!(session_id = writer_session, %err, "engine writer stopped");
            }
        });

        let shared = Arc::new(Shared {
            session_id: session_id.clone(),
            mirror: Mutex::new(Mirror {
                status: ExecutionStatus::Idle,
                events: history,
                pending_actions: Vec::new(),
                policy: ConfirmationPolicy::NeverConfirm,
                analyzer: None,
            }),
            pending: Mutex::new(HashMap::new()),
            store,
        });

        tokio::spawn(read_engine(
            Arc::clone(&shared),
            reader,
            sink,
            cancel.clone(),
        ));

        let conversation = Self {
            shared,
            outbound,
            next_id: AtomicU64::new(1),
            cancel,
            child: Mutex::new(Some(child)),
        };

        let params = json!({
            "conversationId": options.conversation_id,
            "workingDir": options.working_dir,
            "persistenceDir": conversation.shared.store.dir(),
            "mcpConfig": options.mcp_config,
            "streaming": options.streaming,
        });
        let reply = conversation.request("conversation/start", params).await?;
        match tokio::time::timeout(launch.startup_timeout, reply).await {
            Ok(Ok(Ok(_))) => {}
            Ok(Ok(Err(message))) => {
                return Err(AppError::Engine(format!("engine rejected start: {message}")))
            }
            Ok(Err(_)) => return Err(AppError::Engine("engine exited during start".into())),
            Err(_elapsed) => {
                return Err(AppError::Engine(format!(
                    "startup timeout: engine did not accept the conversation within {:?}",
                    launch.startup_timeout
                )))
            }
        }

        info!(session_id, "engine conversation started");
        Ok(conversation)
    }

    fn register(
        &self,
    ) -> Result<(u64, oneshot::Receiver<std::result::Result<Value, String>>)> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = oneshot::channel();
        self.shared
            .pending
            .lock()
            .map_err(|_| AppError::Engine("pending request map poisoned".into()))?
            .insert(id, tx);
        Ok((id, rx))
    }

    async fn request(
        &self,
        method: &str,
        params: Value,
    ) -> Result<oneshot::Receiver<std::result::Result<Value, String>>> {
        let (id, rx) = self.register()?;
        let msg = json!({ "jsonrpc": "2.0", "id": id, "method": method, "params": params });
        self.outbound
            .send(msg)
            .await
            .map_err(|_| AppError::Engine("engine input closed".into()))?;
        Ok(rx)
    }

    fn notify(&self, method: &str, params: Value) -> Result<()> {
        let msg = json!({ "jsonrpc": "2.0", "method": method, "params": params });
        self.outbound.try_send(msg).map_err(|err| match err {
            mpsc::error::TrySendError::Full(_) => {
                AppError::Engine(format!("engine input queue full, dropped {method}"))
            }
            mpsc::error::TrySendError::Closed(_) => AppError::Engine("engine input closed".into()),
        })
    }
}

impl Conversation for ProcessConversation {
    fn id(&self) -> &str {
        &self.shared.session_id
    }

    fn send_message(&self, message: Message) -> Result<()> {
        self.notify("conversation/send_message", json!({ "message": message }))
    }

    fn run(&self) -> Result<()> {
        let (id, rx) = self.register()?;
        self.shared.mirror().status = ExecutionStatus::Running;
        let msg = json!({ "jsonrpc": "2.0", "id": id, "method": "conversation/run", "params": {} });
        self.outbound
            .blocking_send(msg)
            .map_err(|_| AppError::Engine("engine input closed".into()))?;

        let reply = rx
            .blocking_recv()
            .map_err(|_| AppError::Engine("engine exited during run".into()))?
            .map_err(AppError::Engine)?;

        if let Some(status) = reply.get("status") {
            let status: ExecutionStatus = serde_json::from_value(status.clone())
                .map_err(|e| AppError::Engine(format!("invalid run status: {e}")))?;
            let mut mirror = self.shared.mirror();
            mirror.status = status;
            if let Some(actions) = reply.get("pendingActions") {
                mirror.pending_actions = serde_json::from_value(actions.clone())
                    .map_err(|e| AppError::Engine(format!("invalid pending actions: {e}")))?;
            }
        }
        Ok(())
    }

    fn pause(&self) -> Result<()> {
        self.notify("conversation/pause", json!({}))
    }

    fn execution_status(&self) -> ExecutionStatus {
        self.shared.mirror().status
    }

    fn events(&self) -> Vec<DomainEvent> {
        self.shared.mirror().events.clone()
    }

    fn pending_actions(&self) -> Vec<ActionEvent> {
        self.shared.mirror().pending_actions.clone()
    }

    fn reject_pending_actions(&self, reason: &str) -> Result<()> {
        self.notify(
            "conversation/reject_pending_actions",
            json!({ "reason": reason }),
        )?;
        self.shared.mirror().pending_actions.clear();
        Ok(())
    }

    fn set_confirmation_policy(&self, policy: ConfirmationPolicy) -> Result<()> {
        self.notify(
            "conversation/set_confirmation_policy",
            json!({ "policy": policy }),
        )?;
        self.shared.mirror().policy = policy;
        Ok(())
    }

    fn set_security_analyzer(&self, analyzer: Option<SecurityAnalyzer>) -> Result<()> {
        self.notify(
            "conversation/set_security_analyzer",
            json!({ "analyzer": analyzer }),
        )?;
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
        let result = self.notify("conversation/close", json!({}));
        self.cancel.cancel();
        if let Ok(mut child) = self.child.lock() {
            if let Some(mut child) = child.take() {
                // kill_on_drop covers the case where the engine ignores close.
                if let Err(err) = child.start_kill() {
                    debug!(session_id = self.shared.session_id.as_str(), %err, "engine already exited");
                }
            }
        }
        result
    }
}

impl Drop for ProcessConversation {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

// ── Reader task ──────────────────────────────────────────────────────────────

async fn read_engine<R>(shared: Arc<Shared>, stdout: R, sink: EngineSink, cancel: CancellationToken)
where
    R: AsyncRead + Unpin + Send,
{
    let session_id = shared.session_id.clone();
    let mut framed = FramedRead::new(stdout, AcpCodec::new());
    let mut resync = false;

    loop {
        tokio::select! {
            biased;

            () = cancel.cancelled() => {
                debug!(session_id, "engine reader: cancellation received, stopping");
                break;
            }

            item = framed.next() => {
                match item {
                    None if resync => resync = false,
                    None => {
                        debug!(session_id, "engine reader: EOF detected");
                        break;
                    }
                    Some(Err(AppError::Acp(ref msg))) => {
                        warn!(session_id, error = msg.as_str(), "engine reader: framing error, skipping");
                        resync = true;
                    }
                    Some(Err(err)) => {
                        warn!(session_id, %err, "engine reader: IO error, stopping");
                        break;
                    }
                    Some(Ok(line)) => {
                        resync = false;
                        match parse_engine_line(&line) {
                            Ok(Some(inbound)) => dispatch_inbound(&shared, &sink, inbound).await,
                            Ok(None) => {}
                            Err(err) => warn!(session_id, %err, "engine reader: skipping line"),
                        }
                    }
                }
            }
        }
    }

    shared.mirror().status = ExecutionStatus::Error;
    shared.fail_pending("engine stream closed");
}

async fn dispatch_inbound(shared: &Shared, sink: &EngineSink, inbound: EngineInbound) {
    match inbound {
        EngineInbound::Response { id, result } => {
            let waiter = shared.pending.lock().ok().and_then(|mut p| p.remove(&id));
            match waiter {
                Some(tx) => {
                    let _ = tx.send(result);
                }
                None => debug!(
                    session_id = shared.session_id.as_str(),
                    id, "engine reader: reply for unknown request"
                ),
            }
        }
        EngineInbound::Event(event) => {
            if let Err(err) = shared.store.append(&event) {
                warn!(session_id = shared.session_id.as_str(), %err, "failed to persist event");
            }
            shared.mirror().events.push(event.clone());
            sink.publish(EngineMessage::Event(event)).await;
        }
        EngineInbound::Token(chunk) => sink.publish(EngineMessage::Token(chunk)).await,
        EngineInbound::Metrics(metrics) => sink.publish(EngineMessage::Metrics(metrics)).await,
        EngineInbound::Status {
            status,
            pending_actions,
        } => {
            let mut mirror = shared.mirror();
            mirror.status = status;
            if let Some(actions) = pending_actions {
                mirror.pending_actions = actions;
            }
        }
    }
}
