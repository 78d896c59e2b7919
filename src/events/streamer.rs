//! Token-level aggregation of streamed model output.
//!
//! [`TokenStreamer`] turns [`LlmStreamChunk`] deltas into preview
//! notifications: content and reasoning text are forwarded as they arrive,
//! tool-call argument fragments are accumulated per slot so a readable title
//! exists before the final [`ActionEvent`](crate::engine::ActionEvent) does.

use std::collections::HashMap;

use tracing::{debug, trace};

use super::tool_state::ToolCallState;
use crate::acp::schema::{SessionUpdate, ToolCall, ToolCallContent, ToolCallStatus, ToolCallUpdate};
use crate::engine::stream::{LlmStreamChunk, ToolCallDelta};

/// Per-session streaming state keyed by tool-call slot.
#[derive(Debug, Default)]
pub struct TokenStreamer {
    slots: HashMap<u32, ToolCallState>,
}

impl TokenStreamer {
    /// Empty streamer.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// State currently held for `index`.
    #[must_use]
    pub fn slot(&self, index: u32) -> Option<&ToolCallState> {
        self.slots.get(&index)
    }

    /// Consume one chunk and return the notifications it produces, in order.
    pub fn on_chunk(&mut self, chunk: &LlmStreamChunk) -> Vec<SessionUpdate> {
        let mut updates = Vec::new();

        for choice in &chunk.choices {
            let Some(delta) = &choice.delta else {
                continue;
            };

            for tool_call in delta.tool_calls.iter().flatten() {
                updates.extend(self.on_tool_call(tool_call));
            }

            if let Some(reasoning) = delta.reasoning_content.as_deref().filter(|s| !s.is_empty()) {
                updates.push(SessionUpdate::thought(reasoning));
            }
            if let Some(content) = delta.content.as_deref().filter(|s| !s.is_empty()) {
                updates.push(SessionUpdate::message(content));
            }
        }

        updates
    }

    fn on_tool_call(&mut self, delta: &ToolCallDelta) -> Option<SessionUpdate> {
        let index = delta.index.unwrap_or(0);
        let function = delta.function.as_ref()?;

        if let (Some(id), Some(name)) = (delta.id.as_deref(), function.name.as_deref()) {
            let replace = self
                .slots
                .get(&index)
                .is_none_or(|state| state.tool_call_id != id);
            if replace {
                trace!(index, tool_call_id = id, tool_name = name, "new streaming tool call");
                self.slots.insert(index, ToolCallState::new(id, name));
            }
        }

        let Some(state) = self.slots.get_mut(&index) else {
            debug!(index, "tool call fragment for unknown slot, ignoring");
            return None;
        };

        let fragment = function.arguments.as_deref().unwrap_or_default();
        state.append_args(fragment);

        if state.is_think() {
            return state.extract_thought_piece().map(SessionUpdate::thought);
        }

        if !state.started {
            state.started = true;
            return Some(SessionUpdate::ToolCall(ToolCall {
                tool_call_id: state.tool_call_id.clone(),
                title: state.title(),
                kind: state.kind(),
                status: ToolCallStatus::InProgress,
                content: ToolCallContent::from_text(&state.args),
                locations: None,
                raw_input: None,
            }));
        }

        if fragment.is_empty() {
            return None;
        }

        Some(SessionUpdate::ToolCallUpdate(ToolCallUpdate {
            tool_call_id: state.tool_call_id.clone(),
            title: Some(state.title()),
            kind: Some(state.kind()),
            status: Some(ToolCallStatus::InProgress),
            content: ToolCallContent::from_text(&state.args),
            ..ToolCallUpdate::default()
        }))
    }
}
