//! JSONL event log for locally persisted conversations.
//!
//! Each conversation owns `<root>/<uuid-hex>/events.jsonl`, one serialized
//! [`DomainEvent`] per line in original order. A missing file is an empty
//! history, not an error.

use std::{
    fs::{self, File, OpenOptions},
    io::{BufRead, BufReader, BufWriter, Write},
    path::{Path, PathBuf},
    sync::Mutex,
};

use tracing::warn;
use uuid::Uuid;

use super::event::DomainEvent;
use crate::{AppError, Result};

/// File name of the event log inside a conversation directory.
pub const EVENTS_FILE: &str = "events.jsonl";

/// Append-only event log of one conversation.
pub struct EventStore {
    dir: PathBuf,
    writer: Mutex<Option<BufWriter<File>>>,
}

impl EventStore {
    /// Directory used for `conversation_id` under `root`.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::InvalidParams`] if `conversation_id` is not a UUID.
    pub fn conversation_dir(root: &Path, conversation_id: &str) -> Result<PathBuf> {
        let uuid = Uuid::parse_str(conversation_id).map_err(|_| {
            AppError::InvalidParams(serde_json::json!({
                "reason": "Invalid session ID format",
                "sessionId": conversation_id,
            }))
        })?;
        Ok(root.join(uuid.simple().to_string()))
    }

    /// Open (creating directories as needed) the log for `conversation_id`.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::InvalidParams`] for a malformed id and
    /// [`AppError::Io`] if the directory cannot be created.
    pub fn open(root: &Path, conversation_id: &str) -> Result<Self> {
        let dir = Self::conversation_dir(root, conversation_id)?;
        fs::create_dir_all(&dir).map_err(|e| {
            AppError::Io(format!(
                "failed to create conversation directory {}: {e}",
                dir.display()
            ))
        })?;
        Ok(Self {
            dir,
            writer: Mutex::new(None),
        })
    }

    /// Path of the event log file.
    #[must_use]
    pub fn path(&self) -> PathBuf {
        self.dir.join(EVENTS_FILE)
    }

    /// Conversation directory handed to the engine as its persistence root.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Read every persisted event. Malformed lines are logged and skipped.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Io`] if the file exists but cannot be read.
    pub fn load(&self) -> Result<Vec<DomainEvent>> {
        let path = self.path();
        let file = match File::open(&path) {
            Ok(file) => file,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => {
                return Err(AppError::Io(format!(
                    "failed to open event log {}: {err}",
                    path.display()
                )))
            }
        };

        let mut events = Vec::new();
        for (index, line) in BufReader::new(file).lines().enumerate() {
            let line = line.map_err(|e| AppError::Io(format!("failed to read event log: {e}")))?;
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<DomainEvent>(&line) {
                Ok(event) => events.push(event),
                Err(err) => warn!(
                    path = %path.display(),
                    line = index + 1,
                    %err,
                    "skipping malformed event log line"
                ),
            }
        }
        Ok(events)
    }

    /// Append one event and flush.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Io`] if the write fails.
    pub fn append(&self, event: &DomainEvent) -> Result<()> {
        let mut guard = self
            .writer
            .lock()
            .map_err(|_| AppError::Io("event store mutex poisoned".into()))?;

        if guard.is_none() {
            let path = self.path();
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(&path)
                .map_err(|e| {
                    AppError::Io(format!("failed to open event log {}: {e}", path.display()))
                })?;
            *guard = Some(BufWriter::new(file));
        }

        if let Some(writer) = guard.as_mut() {
            let line = serde_json::to_string(event)
                .map_err(|e| AppError::Io(format!("failed to serialize event: {e}")))?;
            writeln!(writer, "{line}")
                .and_then(|()| writer.flush())
                .map_err(|e| AppError::Io(format!("event log write failed: {e}")))?;
        }

        Ok(())
    }
}
