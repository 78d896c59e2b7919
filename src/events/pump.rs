//! Per-session consumer of the engine → loop channel.

use tokio::sync::mpsc;
use tracing::{debug, warn};

use super::context::SessionContext;
use super::streamer::TokenStreamer;
use super::translator::translate_for;
use crate::acp::connection::Client;
use crate::acp::schema::SessionNotification;
use crate::engine::{DomainEvent, EngineMessage};

/// Drains one session's [`EngineMessage`]s and forwards the resulting
/// notifications to the host in receive order.
pub struct EventPump {
    ctx: SessionContext,
    streamer: TokenStreamer,
    streaming: bool,
}

impl EventPump {
    /// Pump for `session_id`; `streaming` selects token-level previews.
    #[must_use]
    pub fn new(session_id: impl Into<String>, streaming: bool) -> Self {
        Self {
            ctx: SessionContext::new(session_id),
            streamer: TokenStreamer::new(),
            streaming,
        }
    }

    /// Current per-session context.
    #[must_use]
    pub fn context(&self) -> &SessionContext {
        &self.ctx
    }

    /// Notifications produced by one message.
    pub fn handle(&mut self, message: EngineMessage) -> Vec<SessionNotification> {
        match message {
            EngineMessage::Event(event) => translate_for(&self.ctx, &event, self.streaming),
            EngineMessage::Token(chunk) => {
                if !self.streaming {
                    return Vec::new();
                }
                self.streamer
                    .on_chunk(&chunk)
                    .into_iter()
                    .map(|update| self.ctx.notification(update))
                    .collect()
            }
            EngineMessage::Metrics(metrics) => {
                self.ctx.update_metrics(metrics);
                Vec::new()
            }
            // Earlier messages were fully sent before this one was received.
            EngineMessage::Flush(ack) => {
                let _ = ack.send(());
                Vec::new()
            }
        }
    }

    /// Run until every sender of `rx` is dropped.
    pub async fn run(mut self, mut rx: mpsc::Receiver<EngineMessage>, client: Client) {
        let session_id = self.ctx.session_id.clone();
        debug!(session_id, streaming = self.streaming, "event pump started");

        while let Some(message) = rx.recv().await {
            for notification in self.handle(message) {
                if let Err(err) = client.session_update(notification).await {
                    warn!(session_id, %err, "failed to deliver session update");
                }
            }
        }

        debug!(session_id, "event pump stopped");
    }
}

/// Send the full history of a session, in order, as non-streaming updates.
///
/// Returns the number of notifications sent.
///
/// # Errors
///
/// Returns [`AppError::Acp`](crate::AppError::Acp) if the host connection closed.
pub async fn replay(
    client: &Client,
    ctx: &SessionContext,
    events: &[DomainEvent],
) -> crate::Result<usize> {
    let mut sent = 0;
    for event in events {
        for notification in translate_for(ctx, event, false) {
            client.session_update(notification).await?;
            sent += 1;
        }
    }
    debug!(
        session_id = ctx.session_id.as_str(),
        events = events.len(),
        notifications = sent,
        "history replayed"
    );
    Ok(sent)
}
