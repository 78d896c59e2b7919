//! State of one streaming tool invocation.

use serde_json::Value;

use super::partial_json::parse_partial;
use super::translator::{file_editor_title, tool_kind_for_name};
use crate::acp::schema::ToolKind;
use crate::engine::render::THOUGHT_HEADER;

/// Name of the reasoning tool whose `thought` argument is streamed as text.
pub const THINK_TOOL: &str = "think";

/// Accumulated arguments and emission cursor of one streaming tool call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolCallState {
    /// Tool call id.
    pub tool_call_id: String,
    /// Tool name.
    pub tool_name: String,
    /// Argument text received so far; only ever grows.
    pub args: String,
    /// A `tool_call` start notification has been sent.
    pub started: bool,
    /// Longest `thought` prefix already emitted (think tool only).
    pub emitted_thought: String,
    /// The thought header has been emitted (think tool only).
    pub thought_header_emitted: bool,
}

impl ToolCallState {
    /// Fresh state for a newly announced tool call.
    #[must_use]
    pub fn new(tool_call_id: impl Into<String>, tool_name: impl Into<String>) -> Self {
        Self {
            tool_call_id: tool_call_id.into(),
            tool_name: tool_name.into(),
            args: String::new(),
            started: false,
            emitted_thought: String::new(),
            thought_header_emitted: false,
        }
    }

    /// `true` for the reasoning tool, which never produces tool-call notifications.
    #[must_use]
    pub fn is_think(&self) -> bool {
        self.tool_name == THINK_TOOL
    }

    /// Append the next argument fragment.
    pub fn append_args(&mut self, fragment: &str) {
        self.args.push_str(fragment);
    }

    /// Best-effort parse of the arguments received so far.
    #[must_use]
    pub fn partial_args(&self) -> Option<Value> {
        parse_partial(&self.args)
    }

    /// Text of the `thought` argument not yet emitted.
    ///
    /// Re-parses the accumulated arguments and diffs the `thought` field
    /// against the emitted prefix. The first non-empty piece carries the
    /// thought header. Returns `None` and leaves the cursor untouched when
    /// the arguments cannot be parsed, the field is absent, or nothing new
    /// arrived.
    pub fn extract_thought_piece(&mut self) -> Option<String> {
        if !self.is_think() {
            return None;
        }

        let args = self.partial_args()?;
        let thought = args.get("thought").and_then(Value::as_str)?;
        if thought.is_empty() {
            return None;
        }

        let delta = match thought.strip_prefix(self.emitted_thought.as_str()) {
            Some(delta) => delta,
            // The model rewrote earlier text; emit only what extends past the old length.
            None => thought.get(self.emitted_thought.len()..).unwrap_or_default(),
        };
        if delta.is_empty() {
            return None;
        }

        let mut piece = String::new();
        if !self.thought_header_emitted {
            self.thought_header_emitted = true;
            piece.push_str(THOUGHT_HEADER);
        }
        piece.push_str(delta);
        self.emitted_thought = thought.to_owned();
        Some(piece)
    }

    /// Display title derived from the arguments received so far.
    #[must_use]
    pub fn title(&self) -> String {
        let args = self.partial_args();
        let arg = |name: &str| {
            args.as_ref()
                .and_then(|a| a.get(name))
                .and_then(Value::as_str)
                .filter(|s| !s.is_empty())
                .map(str::to_owned)
        };

        match self.tool_name.as_str() {
            "file_editor" => match (arg("command"), arg("path")) {
                (Some(command), Some(path)) => file_editor_title(&command, &path),
                (None, Some(path)) => format!("Editing `{path}`"),
                _ => self.tool_name.clone(),
            },
            "terminal" => arg("command").unwrap_or_else(|| self.tool_name.clone()),
            "task_tracker" => "Plan updated".to_owned(),
            _ => self.tool_name.clone(),
        }
    }

    /// Tool kind, refined for the file editor from the partial arguments.
    #[must_use]
    pub fn kind(&self) -> ToolKind {
        if self.tool_name == "file_editor" {
            let is_view = self
                .partial_args()
                .as_ref()
                .and_then(|a| a.get("command"))
                .and_then(Value::as_str)
                == Some("view");
            return if is_view { ToolKind::Read } else { ToolKind::Edit };
        }
        tool_kind_for_name(&self.tool_name)
    }
}
