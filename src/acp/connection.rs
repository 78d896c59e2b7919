//! Outbound side of the host connection.
//!
//! [`Client`] is the adapter's handle for talking to the host: it queues
//! `session/update` notifications and issues `session/request_permission`
//! requests, correlating replies by id. Every message goes through one
//! bounded channel drained by the writer task, so host-visible order is the
//! order of the `send` calls.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, warn};

use super::rpc::{self, RpcError};
use super::schema::{RequestPermissionRequest, RequestPermissionResponse, SessionNotification};
use crate::{AppError, Result};

/// Method name of streamed session updates.
pub const SESSION_UPDATE: &str = "session/update";

/// Method name of permission requests.
pub const REQUEST_PERMISSION: &str = "session/request_permission";

type Reply = oneshot::Sender<std::result::Result<Value, RpcError>>;

struct Inner {
    outbound: mpsc::Sender<Value>,
    pending: Mutex<HashMap<u64, Reply>>,
    next_id: AtomicU64,
}

/// Cloneable handle for sending messages to the host.
#[derive(Clone)]
pub struct Client {
    inner: Arc<Inner>,
}

impl Client {
    /// Client writing into `outbound`.
    #[must_use]
    pub fn new(outbound: mpsc::Sender<Value>) -> Self {
        Self {
            inner: Arc::new(Inner {
                outbound,
                pending: Mutex::new(HashMap::new()),
                next_id: AtomicU64::new(0),
            }),
        }
    }

    /// Queue a raw envelope.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Acp`] if the writer has stopped.
    pub async fn send(&self, message: Value) -> Result<()> {
        self.inner
            .outbound
            .send(message)
            .await
            .map_err(|_| AppError::Acp("host output closed".into()))
    }

    /// Send one `session/update` notification.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Acp`] if the writer has stopped or the notification
    /// cannot be serialized.
    pub async fn session_update(&self, notification: SessionNotification) -> Result<()> {
        let params = serde_json::to_value(&notification)
            .map_err(|e| AppError::Acp(format!("failed to serialize session update: {e}")))?;
        self.send(rpc::notification(SESSION_UPDATE, params)).await
    }

    /// Ask the host to approve pending actions.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Acp`] if the connection closes before the reply or
    /// the reply is malformed, and [`AppError::Internal`] if the host answers
    /// with an error.
    pub async fn request_permission(
        &self,
        request: RequestPermissionRequest,
    ) -> Result<RequestPermissionResponse> {
        let params = serde_json::to_value(&request)
            .map_err(|e| AppError::Acp(format!("failed to serialize permission request: {e}")))?;
        self.request(REQUEST_PERMISSION, params).await
    }

    /// Send a request and wait for the typed reply.
    ///
    /// # Errors
    ///
    /// See [`Client::request_permission`].
    pub async fn request<T: DeserializeOwned>(&self, method: &str, params: Value) -> Result<T> {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = oneshot::channel();
        self.pending().insert(id, tx);

        if let Err(err) = self.send(rpc::request(id, method, params)).await {
            self.pending().remove(&id);
            return Err(err);
        }

        let reply = rx
            .await
            .map_err(|_| AppError::Acp(format!("connection closed before {method} reply")))?;
        match reply {
            Ok(result) => serde_json::from_value(result)
                .map_err(|e| AppError::Acp(format!("malformed {method} reply: {e}"))),
            Err(error) => Err(AppError::internal(
                format!("Host rejected {method}"),
                error.message,
            )),
        }
    }

    /// Route a response from the host to its waiting request.
    ///
    /// Returns `false` when no request with that id is outstanding.
    pub fn resolve(&self, id: &Value, result: std::result::Result<Value, RpcError>) -> bool {
        let Some(numeric) = id.as_u64() else {
            warn!(%id, "response with non-numeric id");
            return false;
        };
        match self.pending().remove(&numeric) {
            Some(tx) => {
                let _ = tx.send(result);
                true
            }
            None => {
                debug!(id = numeric, "response for unknown request");
                false
            }
        }
    }

    /// Fail every outstanding request, e.g. when the host disconnects.
    pub fn fail_all(&self, reason: &str) {
        let drained: Vec<_> = self.pending().drain().collect();
        for (_, tx) in drained {
            let _ = tx.send(Err(RpcError::new(rpc::INTERNAL_ERROR, reason, None)));
        }
    }

    fn pending(&self) -> std::sync::MutexGuard<'_, HashMap<u64, Reply>> {
        self.inner
            .pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}
