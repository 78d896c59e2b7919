//! Unit tests for the token stream aggregator.
//!
//! Covers:
//! - content and reasoning deltas pass straight through
//! - the first fragment of a tool call starts it, later ones update it
//! - a new id on an occupied slot replaces the slot
//! - fragments for unknown slots are ignored
//! - think tool arguments stream as thought text

use acp_adapter::acp::schema::{SessionUpdate, ToolCallStatus, ToolKind};
use acp_adapter::engine::render::THOUGHT_HEADER;
use acp_adapter::engine::LlmStreamChunk;
use acp_adapter::events::TokenStreamer;

// ── Text deltas ─────────────────────────────────────────────────────────────

#[test]
fn content_delta_becomes_message_chunk() {
    let mut streamer = TokenStreamer::new();
    let updates = streamer.on_chunk(&LlmStreamChunk::content("Hello"));
    assert_eq!(updates, vec![SessionUpdate::message("Hello")]);
}

#[test]
fn reasoning_delta_becomes_thought_chunk() {
    let mut streamer = TokenStreamer::new();
    let updates = streamer.on_chunk(&LlmStreamChunk::reasoning("hmm"));
    assert_eq!(updates, vec![SessionUpdate::thought("hmm")]);
}

#[test]
fn empty_deltas_emit_nothing() {
    let mut streamer = TokenStreamer::new();
    assert!(streamer.on_chunk(&LlmStreamChunk::content("")).is_empty());
    assert!(streamer.on_chunk(&LlmStreamChunk::default()).is_empty());
}

// ── Tool calls ──────────────────────────────────────────────────────────────

#[test]
fn first_fragment_starts_tool_call() {
    let mut streamer = TokenStreamer::new();
    let updates = streamer.on_chunk(&LlmStreamChunk::tool_call(
        0,
        Some("call_1"),
        Some("terminal"),
        Some(r#"{"command": "ls"#),
    ));

    let [SessionUpdate::ToolCall(call)] = updates.as_slice() else {
        panic!("expected a single tool_call, got {updates:?}");
    };
    assert_eq!(call.tool_call_id, "call_1");
    assert_eq!(call.title, "ls");
    assert_eq!(call.kind, ToolKind::Execute);
    assert_eq!(call.status, ToolCallStatus::InProgress);
    assert!(call.content.is_some());
}

#[test]
fn later_fragments_update_tool_call() {
    let mut streamer = TokenStreamer::new();
    let _ = streamer.on_chunk(&LlmStreamChunk::tool_call(
        0,
        Some("call_1"),
        Some("terminal"),
        Some(r#"{"command": "ls"#),
    ));
    let updates =
        streamer.on_chunk(&LlmStreamChunk::tool_call(0, None, None, Some(r#" -la"}"#)));

    let [SessionUpdate::ToolCallUpdate(update)] = updates.as_slice() else {
        panic!("expected a single tool_call_update, got {updates:?}");
    };
    assert_eq!(update.tool_call_id, "call_1");
    assert_eq!(update.title.as_deref(), Some("ls -la"));
    assert_eq!(update.status, Some(ToolCallStatus::InProgress));
    assert_eq!(
        streamer.slot(0).map(|s| s.args.as_str()),
        Some(r#"{"command": "ls -la"}"#)
    );
}

#[test]
fn empty_fragment_after_start_emits_nothing() {
    let mut streamer = TokenStreamer::new();
    let _ = streamer.on_chunk(&LlmStreamChunk::tool_call(
        0,
        Some("call_1"),
        Some("terminal"),
        Some("{"),
    ));
    let updates = streamer.on_chunk(&LlmStreamChunk::tool_call(0, None, None, Some("")));
    assert!(updates.is_empty());
}

#[test]
fn new_id_on_same_slot_replaces_state() {
    let mut streamer = TokenStreamer::new();
    let _ = streamer.on_chunk(&LlmStreamChunk::tool_call(
        0,
        Some("call_1"),
        Some("terminal"),
        Some(r#"{"command": "pwd"}"#),
    ));
    let updates = streamer.on_chunk(&LlmStreamChunk::tool_call(
        0,
        Some("call_2"),
        Some("file_editor"),
        Some(r#"{"command": "view", "path": "a.txt"#),
    ));

    let [SessionUpdate::ToolCall(call)] = updates.as_slice() else {
        panic!("expected a fresh tool_call, got {updates:?}");
    };
    assert_eq!(call.tool_call_id, "call_2");
    assert_eq!(call.title, "Reading `a.txt`");
    let slot = streamer.slot(0).expect("slot 0");
    assert_eq!(slot.tool_call_id, "call_2");
    assert!(!slot.args.contains("pwd"), "old arguments must be discarded");
}

#[test]
fn repeated_id_keeps_accumulating() {
    let mut streamer = TokenStreamer::new();
    let _ = streamer.on_chunk(&LlmStreamChunk::tool_call(
        0,
        Some("call_1"),
        Some("terminal"),
        Some(r#"{"command": "ec"#),
    ));
    let _ = streamer.on_chunk(&LlmStreamChunk::tool_call(
        0,
        Some("call_1"),
        Some("terminal"),
        Some(r#"ho"}"#),
    ));
    assert_eq!(
        streamer.slot(0).map(|s| s.args.as_str()),
        Some(r#"{"command": "echo"}"#)
    );
}

#[test]
fn slots_are_independent() {
    let mut streamer = TokenStreamer::new();
    let _ = streamer.on_chunk(&LlmStreamChunk::tool_call(
        0,
        Some("call_a"),
        Some("terminal"),
        Some("{"),
    ));
    let _ = streamer.on_chunk(&LlmStreamChunk::tool_call(
        1,
        Some("call_b"),
        Some("terminal"),
        Some("{"),
    ));
    assert_eq!(streamer.slot(0).map(|s| s.tool_call_id.as_str()), Some("call_a"));
    assert_eq!(streamer.slot(1).map(|s| s.tool_call_id.as_str()), Some("call_b"));
}

#[test]
fn fragment_for_unknown_slot_is_ignored() {
    let mut streamer = TokenStreamer::new();
    let updates = streamer.on_chunk(&LlmStreamChunk::tool_call(3, None, None, Some("{}")));
    assert!(updates.is_empty());
    assert!(streamer.slot(3).is_none());
}

// ── Think tool ──────────────────────────────────────────────────────────────

#[test]
fn think_arguments_stream_as_thought() {
    let mut streamer = TokenStreamer::new();
    let first = streamer.on_chunk(&LlmStreamChunk::tool_call(
        0,
        Some("call_t"),
        Some("think"),
        Some(r#"{"thought": "Plan"#),
    ));
    assert_eq!(
        first,
        vec![SessionUpdate::thought(format!("{THOUGHT_HEADER}Plan"))]
    );

    let second = streamer.on_chunk(&LlmStreamChunk::tool_call(0, None, None, Some(" ahead")));
    assert_eq!(second, vec![SessionUpdate::thought(" ahead")]);
}

#[test]
fn think_tool_never_starts_tool_call() {
    let mut streamer = TokenStreamer::new();
    let updates = streamer.on_chunk(&LlmStreamChunk::tool_call(
        0,
        Some("call_t"),
        Some("think"),
        Some("{"),
    ));
    assert!(updates.is_empty());
    assert!(!streamer.slot(0).expect("slot").started);
}
