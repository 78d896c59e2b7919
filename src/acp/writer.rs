//! Outbound NDJSON writer task.
//!
//! Receives JSON values from an [`mpsc`] channel, serialises each to a single
//! line and writes it to the given sink (the adapter's stdout, or an engine
//! process's stdin). One task owns the sink, so lines never interleave.

use std::sync::Arc;

use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::trace::{Direction, ProtocolTrace};
use crate::{AppError, Result};

/// Drain `msg_rx` into `sink`, one compact JSON line per message.
///
/// Each line is flushed as soon as it is written; with `trace` set the
/// message is recorded before it leaves. Stops when `cancel` fires or the
/// last sender is dropped.
///
/// # Errors
///
/// [`AppError::Acp`] when a message cannot be encoded or the sink refuses
/// the bytes, typically because the peer went away.
pub async fn run_writer<W>(
    label: String,
    mut sink: W,
    mut msg_rx: mpsc::Receiver<serde_json::Value>,
    cancel: CancellationToken,
    trace: Option<Arc<ProtocolTrace>>,
) -> Result<()>
where
    W: AsyncWrite + Unpin + Send,
{
    loop {
        tokio::select! {
            biased;

            () = cancel.cancelled() => {
                debug!(label, "writer: cancellation received, stopping");
                break;
            }

            msg = msg_rx.recv() => {
                let Some(value) = msg else {
                    debug!(label, "writer: message channel closed, stopping");
                    break;
                };

                if let Some(trace) = &trace {
                    trace.record(Direction::Outbound, &value);
                }

                let mut bytes = serde_json::to_vec(&value).map_err(|e| {
                    AppError::Acp(format!("failed to serialise outbound message: {e}"))
                })?;
                bytes.push(b'\n');

                sink.write_all(&bytes).await.map_err(|e| {
                    warn!(label, error = %e, "writer: write failed");
                    AppError::Acp(format!("write failed: {e}"))
                })?;
                sink.flush().await.map_err(|e| {
                    warn!(label, error = %e, "writer: flush failed");
                    AppError::Acp(format!("write failed: {e}"))
                })?;
            }
        }
    }

    Ok(())
}
