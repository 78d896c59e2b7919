//! Conversation handle trait and the engine → protocol-loop channel.

use tokio::sync::{mpsc, oneshot};
use tracing::debug;

use super::event::{ActionEvent, DomainEvent, Message};
use super::stream::LlmStreamChunk;
use super::{ConfirmationPolicy, ExecutionStatus, SecurityAnalyzer, UsageMetrics};
use crate::Result;

/// Message published by the engine for the protocol loop.
#[derive(Debug)]
pub enum EngineMessage {
    /// A completed history event.
    Event(DomainEvent),
    /// A token-level output delta.
    Token(LlmStreamChunk),
    /// Updated usage totals for the conversation.
    Metrics(UsageMetrics),
    /// Barrier: acknowledged once everything published before it has been
    /// delivered to the host.
    Flush(oneshot::Sender<()>),
}

/// Sending half of the bounded engine → loop channel.
///
/// Engine code running on a worker thread calls [`EngineSink::blocking_publish`];
/// engine code running as a tokio task calls [`EngineSink::publish`]. In both
/// cases the protocol loop receives messages in publish order.
#[derive(Debug, Clone)]
pub struct EngineSink {
    session_id: String,
    tx: mpsc::Sender<EngineMessage>,
}

impl EngineSink {
    /// Create a sink and its receiving half with the given capacity.
    #[must_use]
    pub fn channel(
        session_id: impl Into<String>,
        capacity: usize,
    ) -> (Self, mpsc::Receiver<EngineMessage>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (
            Self {
                session_id: session_id.into(),
                tx,
            },
            rx,
        )
    }

    /// Session this sink publishes for.
    #[must_use]
    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// Publish from async context, waiting for channel capacity.
    pub async fn publish(&self, message: EngineMessage) {
        if self.tx.send(message).await.is_err() {
            debug!(
                session_id = self.session_id.as_str(),
                "engine sink: receiver closed, dropping message"
            );
        }
    }

    /// Wait until every message published so far has been delivered.
    ///
    /// Returns immediately when the consumer is gone.
    pub async fn flush(&self) {
        let (ack, delivered) = oneshot::channel();
        if self.tx.send(EngineMessage::Flush(ack)).await.is_err() {
            return;
        }
        if delivered.await.is_err() {
            debug!(
                session_id = self.session_id.as_str(),
                "engine sink: consumer stopped before flush"
            );
        }
    }

    /// Publish from a non-async worker thread, blocking on channel capacity.
    ///
    /// Must not be called from within an async task.
    pub fn blocking_publish(&self, message: EngineMessage) {
        if self.tx.blocking_send(message).is_err() {
            debug!(
                session_id = self.session_id.as_str(),
                "engine sink: receiver closed, dropping message"
            );
        }
    }
}

/// Handle to one engine conversation.
///
/// All methods except [`Conversation::run`] are non-blocking and may be
/// called from async context. `run` executes a full turn and blocks the
/// calling thread until the engine stops; callers dispatch it through
/// [`tokio::task::spawn_blocking`].
pub trait Conversation: Send + Sync {
    /// Conversation identifier (canonical UUID text).
    fn id(&self) -> &str;

    /// Queue a user message for the next turn.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Engine`](crate::AppError::Engine) if the engine is unreachable.
    fn send_message(&self, message: Message) -> Result<()>;

    /// Run the conversation until the engine stops. Blocks the calling thread.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Engine`](crate::AppError::Engine) if the turn fails.
    fn run(&self) -> Result<()>;

    /// Ask the engine to pause at the next safe point.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Engine`](crate::AppError::Engine) if the engine is unreachable.
    fn pause(&self) -> Result<()>;

    /// Current execution state.
    fn execution_status(&self) -> ExecutionStatus;

    /// Full event history in original order.
    fn events(&self) -> Vec<DomainEvent>;

    /// Actions waiting for confirmation.
    fn pending_actions(&self) -> Vec<ActionEvent>;

    /// Reject every pending action with `reason`.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Engine`](crate::AppError::Engine) if the engine is unreachable.
    fn reject_pending_actions(&self, reason: &str) -> Result<()>;

    /// Replace the confirmation policy.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Engine`](crate::AppError::Engine) if the engine is unreachable.
    fn set_confirmation_policy(&self, policy: ConfirmationPolicy) -> Result<()>;

    /// Replace the security analyzer.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Engine`](crate::AppError::Engine) if the engine is unreachable.
    fn set_security_analyzer(&self, analyzer: Option<SecurityAnalyzer>) -> Result<()>;

    /// Confirmation policy last applied.
    fn confirmation_policy(&self) -> ConfirmationPolicy;

    /// Security analyzer last applied.
    fn security_analyzer(&self) -> Option<SecurityAnalyzer>;

    /// Release engine resources. Further calls may fail.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Engine`](crate::AppError::Engine) if shutdown fails.
    fn close(&self) -> Result<()>;
}
