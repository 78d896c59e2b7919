//! Session id → live conversation.
//!
//! Each id maps to a [`OnceCell`]: concurrent callers for the same id share
//! one construction, and a failed construction leaves no entry behind.

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::OnceCell;
use tokio::task::JoinHandle;
use tracing::debug;

use crate::engine::{Conversation, EngineSink};
use crate::Result;

/// One live session.
pub struct Session {
    /// Session identifier.
    pub id: String,
    /// Engine conversation handle.
    pub conversation: Arc<dyn Conversation>,
    /// Publishing side of the session's engine channel, kept for flushing.
    pub sink: EngineSink,
    /// Task draining the session's engine channel.
    pub pump: JoinHandle<()>,
}

type Slot = Arc<OnceCell<Arc<Session>>>;

/// Registry of live sessions.
#[derive(Default)]
pub struct SessionRegistry {
    sessions: Mutex<HashMap<String, Slot>>,
}

impl SessionRegistry {
    /// Empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Cached session, if fully constructed.
    #[must_use]
    pub fn get(&self, session_id: &str) -> Option<Arc<Session>> {
        self.map().get(session_id).and_then(|slot| slot.get().cloned())
    }

    /// `true` if a constructed session is cached under `session_id`.
    #[must_use]
    pub fn contains(&self, session_id: &str) -> bool {
        self.get(session_id).is_some()
    }

    /// Return the cached session or run `init` to build it.
    ///
    /// `init` runs at most once per id among concurrent callers. The boolean
    /// is `true` for the caller whose `init` produced the session.
    ///
    /// # Errors
    ///
    /// Propagates the error of `init`; the id is then free for a later attempt.
    pub async fn get_or_try_init<F, Fut>(&self, session_id: &str, init: F) -> Result<(Arc<Session>, bool)>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Session>>,
    {
        let slot = Arc::clone(
            self.map()
                .entry(session_id.to_owned())
                .or_insert_with(|| Arc::new(OnceCell::new())),
        );

        let mut created = false;
        let outcome = slot
            .get_or_try_init(|| async {
                created = true;
                init().await.map(Arc::new)
            })
            .await;

        match outcome {
            Ok(session) => Ok((Arc::clone(session), created)),
            Err(err) => {
                let mut map = self.map();
                if map
                    .get(session_id)
                    .is_some_and(|current| Arc::ptr_eq(current, &slot) && current.get().is_none())
                {
                    map.remove(session_id);
                }
                debug!(session_id, %err, "session construction failed");
                Err(err)
            }
        }
    }

    /// Drop the session from the registry and hand it back.
    pub fn remove(&self, session_id: &str) -> Option<Arc<Session>> {
        self.map()
            .remove(session_id)
            .and_then(|slot| slot.get().cloned())
    }

    /// Remove and return every constructed session.
    pub fn drain(&self) -> Vec<Arc<Session>> {
        self.map()
            .drain()
            .filter_map(|(_, slot)| slot.get().cloned())
            .collect()
    }

    /// Number of constructed sessions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.map().values().filter(|slot| slot.initialized()).count()
    }

    /// `true` when no session is cached.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn map(&self) -> MutexGuard<'_, HashMap<String, Slot>> {
        self.sessions.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
