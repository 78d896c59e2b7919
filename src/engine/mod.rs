//! Boundary with the external conversation engine.
//!
//! The engine owns reasoning, tool execution and its own persistence. This
//! module defines what crosses the boundary:
//! - [`event`]: the closed [`DomainEvent`] set.
//! - [`stream`]: token-level [`LlmStreamChunk`] deltas.
//! - [`conversation`]: the [`Conversation`] handle trait and the bounded
//!   [`EngineSink`] through which the engine publishes into the protocol loop.
//! - [`render`]: plain-text rendering of events.
//! - [`process`]: a [`Conversation`] backed by an engine child process.
//! - [`store`]: JSONL event log used to reload local conversations.

pub mod conversation;
pub mod event;
pub mod process;
pub mod render;
pub mod store;
pub mod stream;

use serde::{Deserialize, Serialize};

pub use conversation::{Conversation, EngineMessage, EngineSink};
pub use event::{Action, ActionEvent, DomainEvent, Message, MessageContent, Observation, Role};
pub use stream::LlmStreamChunk;

/// Risk level assigned to an action by the security analyzer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SecurityRisk {
    /// No assessment available.
    #[default]
    Unknown,
    /// Safe to run unattended.
    Low,
    /// Possibly destructive.
    Medium,
    /// Likely destructive or exfiltrating.
    High,
}

/// When the engine must stop and ask before executing an action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ConfirmationPolicy {
    /// Every action needs confirmation.
    AlwaysConfirm,
    /// No action needs confirmation.
    NeverConfirm,
    /// Actions at or above `threshold` need confirmation.
    ConfirmRisky {
        /// Lowest risk requiring confirmation.
        threshold: SecurityRisk,
    },
}

/// Analyzer used by the engine to assign [`SecurityRisk`] to actions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SecurityAnalyzer {
    /// The model scores its own actions.
    LlmRisk,
}

/// Execution state reported by the engine.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionStatus {
    /// Waiting for a message.
    #[default]
    Idle,
    /// Executing a turn.
    Running,
    /// Paused by request.
    Paused,
    /// Stopped on actions that need confirmation.
    WaitingForConfirmation,
    /// Turn completed.
    Finished,
    /// Turn failed.
    Error,
    /// Agent detected it is looping.
    Stuck,
}

impl ExecutionStatus {
    /// `true` when a turn is no longer making progress on its own.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        !matches!(self, Self::Running)
    }
}

/// Accumulated token usage and cost of a conversation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct UsageMetrics {
    /// Prompt tokens.
    #[serde(default)]
    pub input_tokens: u64,
    /// Completion tokens.
    #[serde(default)]
    pub output_tokens: u64,
    /// Prompt tokens served from cache.
    #[serde(default)]
    pub cache_read_tokens: u64,
    /// Reasoning tokens.
    #[serde(default)]
    pub reasoning_tokens: u64,
    /// Accumulated cost in dollars.
    #[serde(default)]
    pub cost: f64,
}
