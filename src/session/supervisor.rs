//! At most one running turn per session, with bounded-wait cancellation.
//!
//! Each turn runs as its own tokio task. The task owns a
//! [`watch::Sender`] that flips to `true` when the turn completes; the
//! sender is dropped without flipping when the task is aborted or panics.
//! That distinction lets [`TaskSupervisor::wait_or_abort`] tell a clean
//! finish from a failure.

use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::AbortHandle;
use tracing::{debug, info, warn};

use crate::{AppError, Result};

/// Reason attached to cancellation failures.
pub const CANCEL_FAILURE: &str = "Error during conversation cancellation";

struct TurnHandle {
    turn_id: u64,
    abort: AbortHandle,
    done: watch::Receiver<bool>,
}

/// How a cancellation wait ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelOutcome {
    /// No turn was running.
    Idle,
    /// The turn stopped on its own within the wait.
    Finished,
    /// The wait timed out and the turn was aborted.
    Aborted,
}

/// How a supervised turn ended.
#[derive(Debug, PartialEq, Eq)]
pub enum TurnEnd<T> {
    /// The turn ran to completion.
    Completed(T),
    /// The turn was aborted by a cancellation.
    Aborted,
}

/// Registry of in-flight turns keyed by session id.
#[derive(Default)]
pub struct TaskSupervisor {
    turns: Mutex<HashMap<String, TurnHandle>>,
    next_turn: AtomicU64,
}

impl TaskSupervisor {
    /// Empty supervisor.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// `true` while a turn is recorded for `session_id` and has not finished.
    #[must_use]
    pub fn is_busy(&self, session_id: &str) -> bool {
        self.turns()
            .get(session_id)
            .is_some_and(|turn| !*turn.done.borrow())
    }

    /// Run `turn` as the session's background task and wait for it.
    ///
    /// The record is removed when the turn ends, also if the caller's own
    /// future is dropped first.
    ///
    /// # Errors
    ///
    /// - [`AppError::InvalidRequest`] if a turn is already running.
    /// - [`AppError::Internal`] if the turn task panicked.
    pub async fn run<F>(&self, session_id: &str, turn: F) -> Result<TurnEnd<F::Output>>
    where
        F: Future + Send + 'static,
        F::Output: Send + 'static,
    {
        let (done_tx, done_rx) = watch::channel(false);
        let turn_id = self.next_turn.fetch_add(1, Ordering::Relaxed);

        let handle = {
            let mut turns = self.turns();
            if turns
                .get(session_id)
                .is_some_and(|existing| !*existing.done.borrow())
            {
                return Err(AppError::InvalidRequest(format!(
                    "session {session_id} already has a prompt in progress"
                )));
            }

            let handle = tokio::spawn(async move {
                let output = turn.await;
                let _ = done_tx.send(true);
                output
            });
            turns.insert(
                session_id.to_owned(),
                TurnHandle {
                    turn_id,
                    abort: handle.abort_handle(),
                    done: done_rx,
                },
            );
            handle
        };
        debug!(session_id, turn_id, "turn started");

        let _guard = FinishGuard {
            supervisor: self,
            session_id,
            turn_id,
        };

        match handle.await {
            Ok(output) => Ok(TurnEnd::Completed(output)),
            Err(err) if err.is_cancelled() => {
                info!(session_id, turn_id, "turn aborted");
                Ok(TurnEnd::Aborted)
            }
            Err(err) => Err(AppError::internal("Failed to process prompt", err)),
        }
    }

    /// Wait up to `timeout` for the session's turn to stop; abort it and
    /// await its teardown if it does not.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Internal`] with reason [`CANCEL_FAILURE`] if the
    /// turn terminated abnormally while being waited on.
    pub async fn wait_or_abort(&self, session_id: &str, timeout: Duration) -> Result<CancelOutcome> {
        let recorded = self
            .turns()
            .get(session_id)
            .map(|turn| (turn.abort.clone(), turn.done.clone()));
        let Some((abort, mut done)) = recorded else {
            return Ok(CancelOutcome::Idle);
        };
        if *done.borrow() {
            return Ok(CancelOutcome::Finished);
        }

        let waited = tokio::time::timeout(timeout, done.wait_for(|finished| *finished))
            .await
            .map(|result| result.map(|_| ()));
        match waited {
            Ok(Ok(())) => Ok(CancelOutcome::Finished),
            Ok(Err(_)) => Err(AppError::internal(
                CANCEL_FAILURE,
                "turn task terminated abnormally",
            )),
            Err(_elapsed) => {
                warn!(
                    session_id,
                    timeout_secs = timeout.as_secs_f64(),
                    "turn did not stop in time, aborting"
                );
                abort.abort();
                // Resolves once the aborted task has been torn down.
                let _ = done.wait_for(|finished| *finished).await;
                Ok(CancelOutcome::Aborted)
            }
        }
    }

    /// Abort every running turn without waiting.
    pub fn abort_all(&self) {
        for (session_id, turn) in self.turns().drain() {
            debug!(session_id, turn_id = turn.turn_id, "aborting turn on shutdown");
            turn.abort.abort();
        }
    }

    fn finish(&self, session_id: &str, turn_id: u64) {
        let mut turns = self.turns();
        if turns.get(session_id).is_some_and(|t| t.turn_id == turn_id) {
            turns.remove(session_id);
        }
    }

    fn turns(&self) -> MutexGuard<'_, HashMap<String, TurnHandle>> {
        self.turns.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

struct FinishGuard<'a> {
    supervisor: &'a TaskSupervisor,
    session_id: &'a str,
    turn_id: u64,
}

impl Drop for FinishGuard<'_> {
    fn drop(&mut self) {
        self.supervisor.finish(self.session_id, self.turn_id);
    }
}
