//! Agent backend kind: where conversations for this process are hosted.
//!
//! `AgentKind` is used as the `--mode` CLI flag value. It decides which
//! [`SessionProvider`](crate::session::provider::SessionProvider) the
//! protocol handler is composed with at startup.

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

/// Top-level hosting mode for agent conversations.
///
/// Passed as `--mode` on the command line. Defaults to [`AgentKind::Local`].
#[derive(Debug, Copy, Clone, Default, Eq, PartialEq, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentKind {
    /// Conversations run in a locally spawned engine process with on-disk
    /// persistence. Default mode.
    #[default]
    Local,
    /// Conversations run in a cloud sandbox provisioned through the cloud API.
    Cloud,
}

impl AgentKind {
    /// Stable lowercase label used in logs.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Local => "local",
            Self::Cloud => "cloud",
        }
    }
}
