//! Agent Client Protocol message types.
//!
//! Field names follow the wire format (`camelCase`); enum tags follow the
//! protocol's `snake_case` discriminators.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Protocol version implemented by this adapter.
pub const PROTOCOL_VERSION: u32 = 1;

// ── initialize / authenticate ────────────────────────────────────────────────

/// `initialize` request parameters.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitializeRequest {
    /// Protocol version requested by the host.
    #[serde(default)]
    pub protocol_version: u32,
    /// Host capabilities; not interpreted.
    #[serde(default)]
    pub client_capabilities: Option<Value>,
    /// Host identification; not interpreted.
    #[serde(default)]
    pub client_info: Option<Value>,
}

/// `initialize` response.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitializeResponse {
    /// Echo of the negotiated protocol version.
    pub protocol_version: u32,
    /// What the adapter supports.
    pub agent_capabilities: AgentCapabilities,
    /// Authentication methods the host may invoke.
    pub auth_methods: Vec<AuthMethod>,
    /// Adapter identification.
    pub agent_info: Implementation,
}

/// Capability advertisement.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentCapabilities {
    /// `session/load` is supported.
    pub load_session: bool,
    /// MCP transports accepted in `mcpServers`.
    pub mcp_capabilities: McpCapabilities,
    /// Content types accepted in prompts.
    pub prompt_capabilities: PromptCapabilities,
}

/// MCP transport support.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct McpCapabilities {
    /// Streamable HTTP servers.
    pub http: bool,
    /// SSE servers.
    pub sse: bool,
}

/// Prompt content support.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PromptCapabilities {
    /// Image blocks.
    pub image: bool,
    /// Audio blocks.
    pub audio: bool,
    /// Embedded resource blocks.
    pub embedded_context: bool,
}

/// Name and version of an implementation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Implementation {
    /// Display name.
    pub name: String,
    /// Version string.
    pub version: String,
}

/// Authentication method advertised in `initialize`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthMethod {
    /// Method identifier passed back in `authenticate`.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Longer description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// `authenticate` request parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthenticateRequest {
    /// Chosen method.
    pub method_id: String,
}

// ── sessions ─────────────────────────────────────────────────────────────────

/// MCP server declared by the host for a session.
///
/// Kept as raw JSON: the adapter only forwards these to the engine.
pub type McpServer = Value;

/// `session/new` request parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewSessionRequest {
    /// Working directory.
    pub cwd: String,
    /// MCP servers to attach.
    #[serde(default)]
    pub mcp_servers: Vec<McpServer>,
}

/// `session/new` response.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewSessionResponse {
    /// Identifier of the created (or resumed) session.
    pub session_id: String,
    /// Available confirmation modes and the current one.
    pub modes: SessionModeState,
}

/// `session/load` request parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoadSessionRequest {
    /// Working directory.
    #[serde(default)]
    pub cwd: String,
    /// MCP servers to attach.
    #[serde(default)]
    pub mcp_servers: Vec<McpServer>,
    /// Session to load.
    pub session_id: String,
}

/// `session/load` response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoadSessionResponse {
    /// Available confirmation modes and the current one.
    pub modes: SessionModeState,
}

/// Mode advertisement attached to session responses.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionModeState {
    /// Active mode id.
    pub current_mode_id: String,
    /// Every selectable mode.
    pub available_modes: Vec<SessionMode>,
}

/// One selectable mode.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionMode {
    /// Mode id.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Longer description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// `session/prompt` request parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PromptRequest {
    /// Target session.
    pub session_id: String,
    /// Prompt content.
    pub prompt: Vec<ContentBlock>,
}

/// `session/prompt` response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PromptResponse {
    /// Why the turn ended.
    pub stop_reason: StopReason,
}

/// Why a turn ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// The agent finished its turn.
    EndTurn,
    /// The turn was cancelled by the host.
    Cancelled,
}

/// `session/cancel` parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CancelNotification {
    /// Session to cancel.
    pub session_id: String,
}

/// `session/close` parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CloseSessionRequest {
    /// Session to close.
    pub session_id: String,
}

/// `session/set_mode` parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetSessionModeRequest {
    /// Target session.
    pub session_id: String,
    /// Requested mode id.
    pub mode_id: String,
}

/// `session/set_model` parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetSessionModelRequest {
    /// Target session.
    pub session_id: String,
    /// Requested model id.
    pub model_id: String,
}

/// `session/list` parameters.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ListSessionsRequest {
    /// Pagination cursor.
    #[serde(default)]
    pub cursor: Option<String>,
    /// Restrict to sessions for this working directory.
    #[serde(default)]
    pub cwd: Option<String>,
}

/// `session/list` response.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ListSessionsResponse {
    /// Known sessions.
    pub sessions: Vec<SessionInfo>,
}

/// Entry of `session/list`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionInfo {
    /// Session id.
    pub session_id: String,
    /// Working directory of the session.
    pub cwd: String,
    /// Human-readable title.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Last update timestamp (RFC 3339).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
}

// ── content ──────────────────────────────────────────────────────────────────

/// Prompt and notification content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentBlock {
    /// Plain text.
    Text {
        /// Text body.
        text: String,
    },
    /// Base64 image.
    Image {
        /// Base64 data.
        data: String,
        /// MIME type.
        #[serde(rename = "mimeType")]
        mime_type: String,
        /// Optional source URI.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        uri: Option<String>,
    },
    /// Base64 audio.
    Audio {
        /// Base64 data.
        data: String,
        /// MIME type.
        #[serde(rename = "mimeType")]
        mime_type: String,
    },
    /// Reference to a resource the agent may fetch.
    ResourceLink(ResourceLink),
    /// Resource contents embedded in the prompt.
    Resource {
        /// Embedded contents.
        resource: EmbeddedResource,
    },
}

impl ContentBlock {
    /// Convenience constructor for a text block.
    #[must_use]
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text { text: text.into() }
    }
}

/// Link to a resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceLink {
    /// Resource URI.
    pub uri: String,
    /// Resource name.
    pub name: String,
    /// MIME type.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
    /// Size in bytes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
    /// Display title.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Embedded resource contents, either text or a base64 blob.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EmbeddedResource {
    /// Textual contents.
    Text(TextResource),
    /// Binary contents.
    Blob(BlobResource),
}

/// Textual embedded resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextResource {
    /// Resource URI.
    pub uri: String,
    /// Contents.
    pub text: String,
    /// MIME type.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
}

/// Binary embedded resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlobResource {
    /// Resource URI.
    pub uri: String,
    /// Base64 contents.
    pub blob: String,
    /// MIME type.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
}

// ── session/update ───────────────────────────────────────────────────────────

/// `session/update` notification parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionNotification {
    /// Session the update belongs to.
    pub session_id: String,
    /// The update.
    pub update: SessionUpdate,
    /// Extension metadata (usage metrics).
    #[serde(rename = "_meta", default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<Value>,
}

impl SessionNotification {
    /// Notification without metadata.
    #[must_use]
    pub fn new(session_id: impl Into<String>, update: SessionUpdate) -> Self {
        Self {
            session_id: session_id.into(),
            update,
            meta: None,
        }
    }
}

/// One streamed update about a session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "sessionUpdate", rename_all = "snake_case")]
pub enum SessionUpdate {
    /// Piece of the agent's visible answer.
    AgentMessageChunk {
        /// Content piece.
        content: ContentBlock,
    },
    /// Piece of the agent's reasoning.
    AgentThoughtChunk {
        /// Content piece.
        content: ContentBlock,
    },
    /// A new tool call.
    ToolCall(ToolCall),
    /// Progress of an existing tool call.
    ToolCallUpdate(ToolCallUpdate),
    /// Replacement execution plan.
    Plan {
        /// Every plan entry.
        entries: Vec<PlanEntry>,
    },
    /// Commands the host may offer to the user.
    AvailableCommandsUpdate {
        /// Command list.
        #[serde(rename = "availableCommands")]
        available_commands: Vec<AvailableCommand>,
    },
    /// Active mode changed.
    CurrentModeUpdate {
        /// New mode id.
        #[serde(rename = "currentModeId")]
        current_mode_id: String,
    },
}

impl SessionUpdate {
    /// Agent message chunk carrying `text`.
    #[must_use]
    pub fn message(text: impl Into<String>) -> Self {
        Self::AgentMessageChunk {
            content: ContentBlock::text(text),
        }
    }

    /// Agent thought chunk carrying `text`.
    #[must_use]
    pub fn thought(text: impl Into<String>) -> Self {
        Self::AgentThoughtChunk {
            content: ContentBlock::text(text),
        }
    }
}

/// Category of a tool call, used by hosts to pick an icon.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolKind {
    /// Reading files.
    Read,
    /// Modifying files.
    Edit,
    /// Removing files.
    Delete,
    /// Moving files.
    Move,
    /// Searching.
    Search,
    /// Running commands.
    Execute,
    /// Internal reasoning.
    Think,
    /// Retrieving external data.
    Fetch,
    /// Anything else.
    Other,
}

/// Lifecycle state of a tool call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolCallStatus {
    /// Not started.
    Pending,
    /// Running.
    InProgress,
    /// Finished successfully.
    Completed,
    /// Failed or rejected.
    Failed,
}

/// Content attached to a tool call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ToolCallContent {
    /// Generic content block.
    Content {
        /// The block.
        content: ContentBlock,
    },
}

impl ToolCallContent {
    /// Wrap `text` as tool-call content; `None` when blank.
    #[must_use]
    pub fn from_text(text: &str) -> Option<Vec<Self>> {
        if text.trim().is_empty() {
            return None;
        }
        Some(vec![Self::Content {
            content: ContentBlock::text(text),
        }])
    }
}

/// File location affected by a tool call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolCallLocation {
    /// File path.
    pub path: String,
    /// 1-based line, when known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line: Option<u32>,
}

/// A new tool call (`sessionUpdate: "tool_call"`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolCall {
    /// Tool call id.
    pub tool_call_id: String,
    /// Display title.
    pub title: String,
    /// Category.
    pub kind: ToolKind,
    /// Lifecycle state.
    pub status: ToolCallStatus,
    /// Attached content.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<Vec<ToolCallContent>>,
    /// Affected files.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub locations: Option<Vec<ToolCallLocation>>,
    /// Raw tool arguments.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw_input: Option<Value>,
}

/// Progress of an existing tool call (`sessionUpdate: "tool_call_update"`).
///
/// Every field except the id is optional; absent fields keep their previous
/// value on the host.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolCallUpdate {
    /// Tool call id.
    pub tool_call_id: String,
    /// Display title.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Category.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<ToolKind>,
    /// Lifecycle state.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<ToolCallStatus>,
    /// Attached content.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<Vec<ToolCallContent>>,
    /// Affected files.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub locations: Option<Vec<ToolCallLocation>>,
    /// Raw tool arguments.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw_input: Option<Value>,
    /// Raw tool result.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw_output: Option<Value>,
}

/// Entry of an execution plan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanEntry {
    /// Task description.
    pub content: String,
    /// Relative importance.
    pub priority: PlanEntryPriority,
    /// Progress state.
    pub status: PlanEntryStatus,
}

/// Plan entry importance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanEntryPriority {
    /// High.
    High,
    /// Medium.
    Medium,
    /// Low.
    Low,
}

/// Plan entry progress state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanEntryStatus {
    /// Not started.
    Pending,
    /// Being worked on.
    InProgress,
    /// Finished.
    Completed,
}

/// Command advertised through `available_commands_update`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AvailableCommand {
    /// Command name without the leading slash.
    pub name: String,
    /// Description.
    pub description: String,
    /// Argument hint.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input: Option<AvailableCommandInput>,
}

/// Argument hint of an advertised command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AvailableCommandInput {
    /// Placeholder text.
    pub hint: String,
}

// ── session/request_permission ───────────────────────────────────────────────

/// `session/request_permission` request parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestPermissionRequest {
    /// Session asking.
    pub session_id: String,
    /// Tool call the permission is about.
    pub tool_call: ToolCallUpdate,
    /// Choices offered.
    pub options: Vec<PermissionOption>,
}

/// One permission choice.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PermissionOption {
    /// Option id returned in the outcome.
    pub option_id: String,
    /// Display name.
    pub name: String,
    /// Semantic kind.
    pub kind: PermissionOptionKind,
}

/// Semantic kind of a permission choice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PermissionOptionKind {
    /// Allow this time.
    AllowOnce,
    /// Allow from now on.
    AllowAlways,
    /// Reject this time.
    RejectOnce,
    /// Reject from now on.
    RejectAlways,
}

/// `session/request_permission` response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestPermissionResponse {
    /// The user's decision.
    pub outcome: RequestPermissionOutcome,
}

/// The user's decision on a permission request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum RequestPermissionOutcome {
    /// The prompt was dismissed or the turn cancelled.
    Cancelled,
    /// An option was chosen.
    Selected {
        /// Chosen option id.
        #[serde(rename = "optionId")]
        option_id: String,
    },
}
