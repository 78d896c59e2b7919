//! Domain events produced by the conversation engine.
//!
//! Every completed unit of conversation history is one [`DomainEvent`]. The
//! set is closed: adding a variant forces every consumer (translator,
//! renderer, store) to handle it.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::SecurityRisk;

/// A completed, already-finished unit of conversation history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DomainEvent {
    /// The agent started a tool invocation.
    Action(ActionEvent),
    /// A tool invocation produced a result.
    Observation(ObservationEvent),
    /// The user rejected a pending action.
    UserReject(UserRejectEvent),
    /// The agent failed while executing a tool call.
    AgentError(AgentErrorEvent),
    /// A conversational message from the user or the assistant.
    Message(MessageEvent),
    /// The conversation was paused.
    Pause(PauseEvent),
    /// Older history was condensed.
    Condensation(CondensationEvent),
    /// The engine asked for history condensation.
    CondensationRequest(CondensationRequestEvent),
    /// The system prompt the agent runs with.
    SystemPrompt(SystemPromptEvent),
    /// Internal engine state change; never shown to the host.
    StateUpdate(StateUpdateEvent),
}

impl DomainEvent {
    /// Identifier of the underlying event.
    #[must_use]
    pub fn id(&self) -> &str {
        match self {
            Self::Action(e) => &e.id,
            Self::Observation(e) => &e.id,
            Self::UserReject(e) => &e.id,
            Self::AgentError(e) => &e.id,
            Self::Message(e) => &e.id,
            Self::Pause(e) => &e.id,
            Self::Condensation(e) => &e.id,
            Self::CondensationRequest(e) => &e.id,
            Self::SystemPrompt(e) => &e.id,
            Self::StateUpdate(e) => &e.id,
        }
    }
}

/// Tool invocation started by the agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionEvent {
    /// Event identifier.
    pub id: String,
    /// Identifier shared with the streamed tool call and the observation.
    pub tool_call_id: String,
    /// Name of the invoked tool.
    pub tool_name: String,
    /// Parsed tool arguments; absent when the engine could not parse them.
    #[serde(default)]
    pub action: Option<Action>,
    /// Model reasoning text emitted alongside the call.
    #[serde(default)]
    pub reasoning_content: Option<String>,
    /// Free-form thought text emitted alongside the call.
    #[serde(default)]
    pub thought: Option<String>,
    /// Risk assigned by the security analyzer, if any.
    #[serde(default)]
    pub security_risk: SecurityRisk,
}

/// Parsed arguments of a tool invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Action {
    /// File viewing or editing.
    FileEditor {
        /// `view`, `create`, `str_replace`, `insert`, or `undo_edit`.
        command: String,
        /// Target path.
        path: String,
        /// Full content for `create`.
        #[serde(default)]
        file_text: Option<String>,
        /// Text to replace.
        #[serde(default)]
        old_str: Option<String>,
        /// Replacement or inserted text.
        #[serde(default)]
        new_str: Option<String>,
        /// Inclusive line range for `view`.
        #[serde(default)]
        view_range: Option<Vec<u32>>,
        /// Line after which `insert` places text.
        #[serde(default)]
        insert_line: Option<u32>,
    },
    /// Shell command execution.
    Terminal {
        /// Command line.
        command: String,
    },
    /// Task list manipulation.
    TaskTracker {
        /// `view` or `plan`.
        command: String,
        /// Tasks after the update.
        #[serde(default)]
        task_list: Vec<Task>,
    },
    /// Private reasoning.
    Think {
        /// Reasoning text.
        thought: String,
    },
    /// Turn completion with a final message.
    Finish {
        /// Final message to the user.
        message: String,
    },
    /// Any other tool; arguments kept verbatim.
    Other {
        /// Raw tool arguments.
        #[serde(default)]
        arguments: Value,
    },
}

/// One entry of the task tracker list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    /// Task title.
    pub title: String,
    /// Additional notes.
    #[serde(default)]
    pub notes: String,
    /// Progress state.
    #[serde(default)]
    pub status: TaskStatus,
}

/// Task tracker progress state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    /// Not started.
    #[default]
    Todo,
    /// Being worked on.
    InProgress,
    /// Finished.
    Done,
}

/// Result of a tool invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObservationEvent {
    /// Event identifier.
    pub id: String,
    /// Identifier of the originating tool call.
    pub tool_call_id: String,
    /// Name of the tool that produced the result.
    pub tool_name: String,
    /// Tool-specific result payload.
    pub observation: Observation,
}

/// Tool-specific result payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Observation {
    /// Task list after a task tracker call.
    TaskTracker {
        /// Tasks after the update.
        #[serde(default)]
        task_list: Vec<Task>,
    },
    /// Acknowledgement of a think call.
    Think {
        /// Acknowledgement text.
        #[serde(default)]
        content: String,
    },
    /// Acknowledgement of a finish call.
    Finish {
        /// Acknowledgement text.
        #[serde(default)]
        content: String,
    },
    /// Result of any other tool.
    Other {
        /// Textual result.
        #[serde(default)]
        content: String,
        /// Whether the tool reported a failure.
        #[serde(default)]
        is_error: bool,
    },
}

/// Rejection of a pending action by the user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserRejectEvent {
    /// Event identifier.
    pub id: String,
    /// Identifier of the rejected tool call.
    pub tool_call_id: String,
    /// Name of the rejected tool.
    pub tool_name: String,
    /// Reason given by the user.
    #[serde(default)]
    pub rejection_reason: String,
}

/// Failure while executing a tool call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentErrorEvent {
    /// Event identifier.
    pub id: String,
    /// Identifier of the failed tool call.
    pub tool_call_id: String,
    /// Name of the failed tool.
    pub tool_name: String,
    /// Error description.
    pub error: String,
}

/// Message author.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// The human user.
    User,
    /// The agent.
    Assistant,
    /// System text injected by the engine.
    System,
}

/// Content part of a conversational message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MessageContent {
    /// Plain text.
    Text {
        /// Text body.
        text: String,
    },
    /// One or more images as URLs or data URIs.
    Image {
        /// Image locations.
        image_urls: Vec<String>,
    },
}

impl MessageContent {
    /// Convenience constructor for a text part.
    #[must_use]
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text { text: text.into() }
    }
}

/// Message sent to the engine or produced by it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// Author.
    pub role: Role,
    /// Ordered content parts.
    pub content: Vec<MessageContent>,
}

/// Conversational message event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageEvent {
    /// Event identifier.
    pub id: String,
    /// Author.
    pub role: Role,
    /// Ordered content parts.
    pub content: Vec<MessageContent>,
}

/// Pause marker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PauseEvent {
    /// Event identifier.
    pub id: String,
}

/// History condensation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CondensationEvent {
    /// Event identifier.
    pub id: String,
    /// Events dropped from the working context.
    #[serde(default)]
    pub forgotten_event_ids: Vec<String>,
    /// Summary replacing the forgotten events.
    #[serde(default)]
    pub summary: Option<String>,
}

/// Request for history condensation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CondensationRequestEvent {
    /// Event identifier.
    pub id: String,
}

/// System prompt announcement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SystemPromptEvent {
    /// Event identifier.
    pub id: String,
    /// Prompt text.
    pub system_prompt: String,
    /// Names of the tools available to the agent.
    #[serde(default)]
    pub tools: Vec<String>,
}

/// Internal engine state change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateUpdateEvent {
    /// Event identifier.
    pub id: String,
    /// Changed state key.
    #[serde(default)]
    pub key: String,
    /// New value.
    #[serde(default)]
    pub value: Value,
}
