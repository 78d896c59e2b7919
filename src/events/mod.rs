//! Engine output → host notifications.
//!
//! - [`translator`]: completed [`DomainEvent`](crate::engine::DomainEvent)s,
//!   used for live delivery and history replay.
//! - [`streamer`]: token-level previews built from
//!   [`LlmStreamChunk`](crate::engine::LlmStreamChunk) deltas.
//! - [`tool_state`] and [`partial_json`]: per-slot argument accumulation and
//!   best-effort parsing of truncated JSON.
//! - [`context`]: per-session identity and usage metadata.
//! - [`pump`]: the task draining the bounded engine channel.

pub mod context;
pub mod partial_json;
pub mod pump;
pub mod streamer;
pub mod tool_state;
pub mod translator;

pub use context::SessionContext;
pub use pump::EventPump;
pub use streamer::TokenStreamer;
pub use tool_state::ToolCallState;
pub use translator::translate;
