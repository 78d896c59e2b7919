//! One prompt turn, including the confirmation round trips.
//!
//! The engine runs on a blocking worker thread. When it stops on actions
//! that need confirmation, the host is asked through
//! `session/request_permission` and the engine resumes according to the
//! answer.

use std::fmt::Write as _;
use std::sync::Arc;

use tracing::{debug, info, info_span, warn, Instrument};

use super::confirmation::{decide, permission_options, permission_tool_call, Decision};
use crate::acp::connection::Client;
use crate::acp::schema::{
    RequestPermissionRequest, SessionNotification, SessionUpdate, ToolCallContent,
};
use crate::engine::render::render_action_event;
use crate::engine::{ActionEvent, Conversation, ExecutionStatus};
use crate::{AppError, Result};

/// Drive `conversation` until the engine stops for good.
///
/// # Errors
///
/// Returns the engine's failure, or [`AppError::Internal`] if the worker
/// thread panicked.
pub async fn run_turn(
    conversation: Arc<dyn Conversation>,
    client: Client,
    session_id: String,
) -> Result<()> {
    let span = info_span!("turn", session_id = session_id.as_str());
    async move {
        let mut rounds = 0_u32;
        loop {
            rounds += 1;
            let engine = Arc::clone(&conversation);
            tokio::task::spawn_blocking(move || engine.run())
                .await
                .map_err(|err| AppError::internal("Failed to process prompt", err))??;

            let status = conversation.execution_status();
            debug!(?status, rounds, "engine stopped");
            if status != ExecutionStatus::WaitingForConfirmation {
                info!(?status, rounds, "turn finished");
                return Ok(());
            }

            let pending = conversation.pending_actions();
            if pending.is_empty() {
                debug!("waiting for confirmation with no pending actions, ending turn");
                return Ok(());
            }

            match ask_host(&client, &session_id, &pending).await {
                Decision::Accept { mode_change } => {
                    if let Some(mode) = mode_change {
                        mode.apply(conversation.as_ref())?;
                        let update = SessionUpdate::CurrentModeUpdate {
                            current_mode_id: mode.as_str().to_owned(),
                        };
                        if let Err(err) = client
                            .session_update(SessionNotification::new(&session_id, update))
                            .await
                        {
                            warn!(%err, "failed to announce mode change");
                        }
                    }
                    info!(actions = pending.len(), "pending actions accepted");
                }
                Decision::Reject { reason } => {
                    conversation.reject_pending_actions(&reason)?;
                    info!(actions = pending.len(), "pending actions rejected");
                }
                Decision::Defer => {
                    conversation.pause()?;
                    info!("confirmation deferred, conversation paused");
                    return Ok(());
                }
            }
        }
    }
    .instrument(span)
    .await
}

/// Ask the host about `pending`; a failed round trip defers.
async fn ask_host(client: &Client, session_id: &str, pending: &[ActionEvent]) -> Decision {
    let mut tool_call = permission_tool_call(session_id);
    tool_call.content = ToolCallContent::from_text(&describe(pending));

    let request = RequestPermissionRequest {
        session_id: session_id.to_owned(),
        tool_call,
        options: permission_options(),
    };
    match client.request_permission(request).await {
        Ok(response) => decide(&response.outcome),
        Err(err) => {
            warn!(session_id, %err, "permission request failed, deferring");
            Decision::Defer
        }
    }
}

/// Numbered summary of pending actions.
#[must_use]
pub fn describe(pending: &[ActionEvent]) -> String {
    let mut out = String::new();
    for (index, action) in pending.iter().enumerate() {
        if index > 0 {
            out.push('\n');
        }
        let _ = write!(
            out,
            "{}. {}: {}",
            index + 1,
            action.tool_name,
            render_action_event(action)
        );
    }
    out
}
