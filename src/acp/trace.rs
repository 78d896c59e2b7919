//! JSONL protocol trace written when `--debug` is set.
//!
//! Every inbound and outbound message is appended as
//! `{"timestamp", "direction", "message"}` to
//! `<trace_dir>/<YYYYmmdd_HHMMSS>_acp.jsonl`.

use std::{
    fs::{self, File, OpenOptions},
    io::{BufWriter, Write},
    path::{Path, PathBuf},
    sync::Mutex,
};

use chrono::Utc;
use serde::Serialize;
use serde_json::Value;
use tracing::warn;

use crate::{AppError, Result};

/// Which way a traced message travelled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    /// Host → adapter.
    Inbound,
    /// Adapter → host.
    Outbound,
}

#[derive(Serialize)]
struct TraceRecord<'a> {
    timestamp: String,
    direction: Direction,
    message: &'a Value,
}

/// Append-only JSONL trace of protocol traffic.
pub struct ProtocolTrace {
    path: PathBuf,
    writer: Mutex<BufWriter<File>>,
}

impl ProtocolTrace {
    /// Create a new trace file under `dir`, creating the directory if needed.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Config`] if the directory or file cannot be created.
    pub fn create(dir: &Path) -> Result<Self> {
        fs::create_dir_all(dir).map_err(|e| {
            AppError::Config(format!(
                "failed to create trace directory {}: {e}",
                dir.display()
            ))
        })?;

        let file_name = format!("{}_acp.jsonl", Utc::now().format("%Y%m%d_%H%M%S"));
        let path = dir.join(file_name);
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|e| {
                AppError::Config(format!("failed to open trace file {}: {e}", path.display()))
            })?;

        Ok(Self {
            path,
            writer: Mutex::new(BufWriter::new(file)),
        })
    }

    /// Location of the trace file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one message. Failures are logged, never raised: tracing must
    /// not disturb the protocol stream.
    pub fn record(&self, direction: Direction, message: &Value) {
        let record = TraceRecord {
            timestamp: Utc::now().to_rfc3339(),
            direction,
            message,
        };

        let Ok(mut writer) = self.writer.lock() else {
            warn!("protocol trace mutex poisoned, dropping record");
            return;
        };

        let result = serde_json::to_string(&record)
            .map_err(|e| e.to_string())
            .and_then(|line| {
                writeln!(writer, "{line}")
                    .and_then(|()| writer.flush())
                    .map_err(|e| e.to_string())
            });
        if let Err(err) = result {
            warn!(path = %self.path.display(), %err, "failed to write protocol trace");
        }
    }
}
