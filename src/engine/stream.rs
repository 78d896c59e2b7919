//! Token-level model output deltas.
//!
//! Shapes follow the OpenAI-compatible streaming chunk format the engine
//! forwards verbatim. Every field is optional so partially populated chunks
//! deserialize without error.

use serde::{Deserialize, Serialize};

/// One streamed chunk of model output.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LlmStreamChunk {
    /// Parallel choices; the engine normally sends exactly one.
    #[serde(default)]
    pub choices: Vec<StreamChoice>,
}

/// One choice within a chunk.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StreamChoice {
    /// Incremental payload; absent on keep-alive chunks.
    #[serde(default)]
    pub delta: Option<StreamDelta>,
}

/// Incremental payload of a choice.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StreamDelta {
    /// Assistant-visible text.
    #[serde(default)]
    pub content: Option<String>,
    /// Model reasoning text.
    #[serde(default)]
    pub reasoning_content: Option<String>,
    /// Partial tool-call fragments.
    #[serde(default)]
    pub tool_calls: Option<Vec<ToolCallDelta>>,
}

/// Partial tool-call fragment keyed by slot index.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ToolCallDelta {
    /// Slot index; absent means slot 0.
    #[serde(default)]
    pub index: Option<u32>,
    /// Tool call identifier; only present on the first fragment of a call.
    #[serde(default)]
    pub id: Option<String>,
    /// Function name and argument fragment.
    #[serde(default)]
    pub function: Option<FunctionDelta>,
}

/// Function part of a tool-call fragment.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FunctionDelta {
    /// Tool name; only present on the first fragment of a call.
    #[serde(default)]
    pub name: Option<String>,
    /// Next piece of the JSON argument text.
    #[serde(default)]
    pub arguments: Option<String>,
}

impl LlmStreamChunk {
    /// Chunk carrying a single content delta.
    #[must_use]
    pub fn content(text: impl Into<String>) -> Self {
        Self::from_delta(StreamDelta {
            content: Some(text.into()),
            ..StreamDelta::default()
        })
    }

    /// Chunk carrying a single reasoning delta.
    #[must_use]
    pub fn reasoning(text: impl Into<String>) -> Self {
        Self::from_delta(StreamDelta {
            reasoning_content: Some(text.into()),
            ..StreamDelta::default()
        })
    }

    /// Chunk carrying a single tool-call fragment.
    #[must_use]
    pub fn tool_call(
        index: u32,
        id: Option<&str>,
        name: Option<&str>,
        arguments: Option<&str>,
    ) -> Self {
        Self::from_delta(StreamDelta {
            tool_calls: Some(vec![ToolCallDelta {
                index: Some(index),
                id: id.map(str::to_owned),
                function: Some(FunctionDelta {
                    name: name.map(str::to_owned),
                    arguments: arguments.map(str::to_owned),
                }),
            }]),
            ..StreamDelta::default()
        })
    }

    fn from_delta(delta: StreamDelta) -> Self {
        Self {
            choices: vec![StreamChoice { delta: Some(delta) }],
        }
    }
}
