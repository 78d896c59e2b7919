//! Unit tests for the engine process line protocol.
//!
//! Covers:
//! - replies with results and errors
//! - event, token, metrics and status notifications
//! - blank lines and unknown methods are skipped
//! - malformed JSON and bad payloads are engine errors

use serde_json::json;

use acp_adapter::engine::process::{parse_engine_line, EngineInbound};
use acp_adapter::engine::{DomainEvent, ExecutionStatus, LlmStreamChunk, Role};
use acp_adapter::AppError;

fn parse(line: &str) -> EngineInbound {
    parse_engine_line(line)
        .expect("line must parse")
        .expect("line must carry a message")
}

// ── Replies ─────────────────────────────────────────────────────────────────

#[test]
fn reply_with_result() {
    let inbound = parse(r#"{"id": 4, "result": {"ok": true}}"#);
    assert_eq!(
        inbound,
        EngineInbound::Response {
            id: 4,
            result: Ok(json!({ "ok": true })),
        }
    );
}

#[test]
fn reply_with_error_keeps_message() {
    let inbound = parse(r#"{"id": 5, "error": {"code": 1, "message": "no such conversation"}}"#);
    assert_eq!(
        inbound,
        EngineInbound::Response {
            id: 5,
            result: Err("no such conversation".to_owned()),
        }
    );
}

#[test]
fn reply_without_payload_is_null() {
    let inbound = parse(r#"{"id": 6}"#);
    assert_eq!(
        inbound,
        EngineInbound::Response {
            id: 6,
            result: Ok(serde_json::Value::Null),
        }
    );
}

// ── Notifications ───────────────────────────────────────────────────────────

#[test]
fn event_notification() {
    let inbound = parse(
        r#"{"method": "conversation/event", "params": {"event": {
            "kind": "message", "id": "m1", "role": "assistant",
            "content": [{"type": "text", "text": "hi"}]
        }}}"#,
    );
    let EngineInbound::Event(DomainEvent::Message(message)) = inbound else {
        panic!("expected message event, got {inbound:?}");
    };
    assert_eq!(message.id, "m1");
    assert_eq!(message.role, Role::Assistant);
}

#[test]
fn token_notification() {
    let inbound = parse(
        r#"{"method": "conversation/token", "params": {"chunk": {
            "choices": [{"delta": {"content": "He"}}]
        }}}"#,
    );
    assert_eq!(inbound, EngineInbound::Token(LlmStreamChunk::content("He")));
}

#[test]
fn metrics_notification() {
    let inbound = parse(
        r#"{"method": "conversation/metrics", "params": {"metrics": {
            "input_tokens": 10, "output_tokens": 3, "cost": 0.01
        }}}"#,
    );
    let EngineInbound::Metrics(metrics) = inbound else {
        panic!("expected metrics, got {inbound:?}");
    };
    assert_eq!(metrics.input_tokens, 10);
    assert_eq!(metrics.cache_read_tokens, 0);
}

#[test]
fn status_notification_with_pending_actions() {
    let inbound = parse(
        r#"{"method": "conversation/status", "params": {
            "status": "waiting_for_confirmation",
            "pendingActions": [{
                "id": "a1", "tool_call_id": "c1", "tool_name": "terminal",
                "action": {"type": "terminal", "command": "rm -rf build"}
            }]
        }}"#,
    );
    let EngineInbound::Status {
        status,
        pending_actions,
    } = inbound
    else {
        panic!("expected status, got {inbound:?}");
    };
    assert_eq!(status, ExecutionStatus::WaitingForConfirmation);
    let pending = pending_actions.expect("pending actions reported");
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].tool_call_id, "c1");
}

#[test]
fn status_without_pending_actions() {
    let inbound = parse(r#"{"method": "conversation/status", "params": {"status": "finished"}}"#);
    assert_eq!(
        inbound,
        EngineInbound::Status {
            status: ExecutionStatus::Finished,
            pending_actions: None,
        }
    );
}

// ── Skips and failures ──────────────────────────────────────────────────────

#[test]
fn blank_and_unknown_lines_are_skipped() {
    assert_eq!(parse_engine_line("").expect("blank"), None);
    assert_eq!(
        parse_engine_line(r#"{"method": "conversation/heartbeat", "params": {}}"#)
            .expect("unknown method"),
        None
    );
}

#[test]
fn malformed_json_is_engine_error() {
    let err = parse_engine_line("{oops").expect_err("must fail");
    assert!(matches!(err, AppError::Engine(ref msg) if msg.starts_with("malformed json")));
}

#[test]
fn missing_payload_field_is_engine_error() {
    let err = parse_engine_line(r#"{"method": "conversation/event", "params": {}}"#)
        .expect_err("must fail");
    assert!(
        matches!(err, AppError::Engine(ref msg) if msg.contains("missing event")),
        "got {err:?}"
    );
}
