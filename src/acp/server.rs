//! Inbound side of the host connection.
//!
//! [`serve`] reads NDJSON lines from the host, classifies them, and routes
//! requests to the [`AcpAgent`]. Every request runs in its own task so that a
//! long `session/prompt` never blocks `session/cancel` or permission replies.

use std::sync::Arc;
use std::time::Duration;

use futures_util::StreamExt;
use serde::Serialize;
use serde_json::Value;
use tokio::io::AsyncRead;
use tokio_util::codec::FramedRead;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, info, info_span, warn, Instrument};

use super::codec::AcpCodec;
use super::connection::Client;
use super::rpc::{self, parse_inbound, parse_params, Inbound, RpcError};
use super::schema::CancelNotification;
use super::trace::{Direction, ProtocolTrace};
use crate::session::agent::AcpAgent;
use crate::session::provider::SessionProvider;
use crate::{AppError, Result};

/// How long in-flight requests may run after the host disconnects.
pub const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

/// Serve the host connection until `input` reaches EOF or `cancel` fires.
///
/// Responses and notifications leave through `client`. On exit, outstanding
/// host requests are failed and every session is closed.
///
/// # Errors
///
/// Returns [`AppError::Io`] if reading `input` fails.
pub async fn serve<P, R>(
    agent: Arc<AcpAgent<P>>,
    client: Client,
    input: R,
    cancel: CancellationToken,
    trace: Option<Arc<ProtocolTrace>>,
) -> Result<()>
where
    P: SessionProvider,
    R: AsyncRead + Unpin + Send,
{
    let mut lines = FramedRead::new(input, AcpCodec::new());
    let tasks = TaskTracker::new();
    let mut outcome = Ok(());
    // FramedRead yields one `None` after a decode error before resuming.
    let mut resync = false;

    loop {
        tokio::select! {
            biased;

            () = cancel.cancelled() => {
                info!("shutdown requested");
                break;
            }

            item = lines.next() => match item {
                None if resync => resync = false,
                None => {
                    info!("host closed the connection");
                    break;
                }
                Some(Err(AppError::Acp(msg))) => {
                    warn!(error = msg.as_str(), "framing error, line skipped");
                    resync = true;
                }
                Some(Err(err)) => {
                    warn!(%err, "read failed, stopping");
                    outcome = Err(err);
                    break;
                }
                Some(Ok(line)) => {
                    resync = false;
                    handle_line(&agent, &client, &tasks, trace.as_deref(), &line).await;
                }
            },
        }
    }

    client.fail_all("host connection closed");
    agent.close_all().await;
    tasks.close();
    if tokio::time::timeout(SHUTDOWN_GRACE, tasks.wait()).await.is_err() {
        warn!(remaining = tasks.len(), "requests still running at shutdown");
    }
    outcome
}

async fn handle_line<P: SessionProvider>(
    agent: &Arc<AcpAgent<P>>,
    client: &Client,
    tasks: &TaskTracker,
    trace: Option<&ProtocolTrace>,
    line: &str,
) {
    if let Some(trace) = trace {
        if let Ok(value) = serde_json::from_str::<Value>(line) {
            trace.record(Direction::Inbound, &value);
        }
    }

    match parse_inbound(line) {
        Ok(None) => {}
        Err((id, error)) => {
            warn!(code = error.code, message = error.message.as_str(), "rejecting malformed message");
            send_or_log(client, rpc::error_response(id, &error)).await;
        }
        Ok(Some(Inbound::Response { id, result })) => {
            client.resolve(&id, result);
        }
        Ok(Some(Inbound::Notification { method, params })) => {
            let agent = Arc::clone(agent);
            tasks.spawn(async move { notify(&agent, &method, params).await });
        }
        Ok(Some(Inbound::Request { id, method, params })) => {
            let agent = Arc::clone(agent);
            let client = client.clone();
            let span = info_span!("request", method = method.as_str(), id = %id);
            tasks.spawn(
                async move {
                    let reply = match dispatch(&agent, &method, params).await {
                        Ok(result) => rpc::response(id, result),
                        Err(err) => {
                            let error = RpcError::from(&err);
                            debug!(code = error.code, %err, "request failed");
                            rpc::error_response(id, &error)
                        }
                    };
                    send_or_log(&client, reply).await;
                }
                .instrument(span),
            );
        }
    }
}

/// Route one request to its handler.
///
/// # Errors
///
/// [`AppError::MethodNotFound`] for unknown methods, otherwise the handler's
/// error.
pub async fn dispatch<P: SessionProvider>(
    agent: &AcpAgent<P>,
    method: &str,
    params: Value,
) -> Result<Value> {
    debug!(method, "dispatching request");
    match method {
        "initialize" => to_value(&agent.initialize(&parse_params(params)?)),
        "authenticate" => agent.authenticate(parse_params(params)?).await,
        "session/new" => to_value(&agent.new_session(parse_params(params)?).await?),
        "session/load" => to_value(&agent.load_session(parse_params(params)?).await?),
        "session/prompt" => to_value(&agent.prompt(parse_params(params)?).await?),
        "session/cancel" => {
            let request: CancelNotification = parse_params(params)?;
            agent.cancel(&request.session_id).await?;
            Ok(Value::Null)
        }
        "session/set_mode" => agent.set_session_mode(parse_params(params)?).await,
        "session/set_model" => Ok(agent.set_session_model(&parse_params(params)?)),
        "session/list" => to_value(&agent.list_sessions(parse_params(params)?).await?),
        "session/close" => Ok(agent.close_session(parse_params(params)?).await),
        ext if ext.starts_with('_') => Ok(agent.ext_method(ext, &params)),
        other => Err(AppError::MethodNotFound(other.to_owned())),
    }
}

async fn notify<P: SessionProvider>(agent: &AcpAgent<P>, method: &str, params: Value) {
    match method {
        "session/cancel" => {
            let result = match parse_params::<CancelNotification>(params) {
                Ok(request) => agent.cancel(&request.session_id).await,
                Err(err) => Err(err),
            };
            if let Err(err) = result {
                warn!(%err, "cancel notification failed");
            }
        }
        ext if ext.starts_with('_') => agent.ext_notification(ext, &params),
        other => debug!(method = other, "ignoring unknown notification"),
    }
}

fn to_value<T: Serialize>(value: &T) -> Result<Value> {
    serde_json::to_value(value)
        .map_err(|e| AppError::internal("Failed to serialize response", e))
}

async fn send_or_log(client: &Client, message: Value) {
    if let Err(err) = client.send(message).await {
        warn!(%err, "failed to send reply");
    }
}
