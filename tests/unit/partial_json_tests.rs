//! Unit tests for best-effort completion of truncated JSON.
//!
//! Covers:
//! - open strings, objects and arrays are closed
//! - half-written literals and numbers are completed or dropped
//! - dangling keys, colons and commas are repaired
//! - input that is not a JSON prefix still fails to parse

use serde_json::json;

use acp_adapter::events::partial_json::{complete_json, parse_partial};

// ── Strings and containers ──────────────────────────────────────────────────

#[test]
fn open_string_value_is_closed() {
    let value = parse_partial(r#"{"command": "vi"#).expect("prefix must parse");
    assert_eq!(value, json!({ "command": "vi" }));
}

#[test]
fn nested_containers_are_closed_innermost_first() {
    let completed = complete_json(r#"{"a": {"b": [{"c": "d"#);
    assert_eq!(completed, r#"{"a": {"b": [{"c": "d"}]}}"#);
}

#[test]
fn open_array_is_closed() {
    let value = parse_partial(r#"{"items": [1, 2"#).expect("prefix must parse");
    assert_eq!(value, json!({ "items": [1, 2] }));
}

#[test]
fn complete_document_is_unchanged() {
    let raw = r#"{"path": "/tmp/a.rs", "command": "view"}"#;
    assert_eq!(complete_json(raw), raw);
}

// ── Keys, colons and commas ─────────────────────────────────────────────────

#[test]
fn key_without_colon_gets_null_value() {
    let value = parse_partial(r#"{"thought"#).expect("prefix must parse");
    assert_eq!(value, json!({ "thought": null }));
}

#[test]
fn key_with_colon_but_no_value_gets_null() {
    let value = parse_partial(r#"{"thought":"#).expect("prefix must parse");
    assert_eq!(value, json!({ "thought": null }));
}

#[test]
fn trailing_comma_in_object_is_removed() {
    let value = parse_partial(r#"{"a": 1,"#).expect("prefix must parse");
    assert_eq!(value, json!({ "a": 1 }));
}

#[test]
fn trailing_comma_in_array_is_removed() {
    let value = parse_partial("[1, 2,").expect("prefix must parse");
    assert_eq!(value, json!([1, 2]));
}

// ── Escapes, literals and numbers ───────────────────────────────────────────

#[test]
fn dangling_escape_is_dropped() {
    let value = parse_partial(r#"{"t": "line\"#).expect("prefix must parse");
    assert_eq!(value, json!({ "t": "line" }));
}

#[test]
fn incomplete_unicode_escape_is_dropped() {
    let value = parse_partial(r#"{"t": "ab\u00"#).expect("prefix must parse");
    assert_eq!(value, json!({ "t": "ab" }));
}

#[test]
fn complete_escape_is_kept() {
    let value = parse_partial(r#"{"t": "a\"b"#).expect("prefix must parse");
    assert_eq!(value, json!({ "t": "a\"b" }));
}

#[test]
fn partial_literals_are_completed() {
    assert_eq!(parse_partial(r#"{"a": tr"#), Some(json!({ "a": true })));
    assert_eq!(parse_partial(r#"{"a": fa"#), Some(json!({ "a": false })));
    assert_eq!(parse_partial(r#"{"a": n"#), Some(json!({ "a": null })));
}

#[test]
fn number_with_dangling_fraction_is_trimmed() {
    assert_eq!(parse_partial(r#"{"n": 1."#), Some(json!({ "n": 1 })));
    assert_eq!(parse_partial(r#"{"n": 2e"#), Some(json!({ "n": 2 })));
}

#[test]
fn lone_minus_sign_becomes_null() {
    assert_eq!(parse_partial(r#"{"n": -"#), Some(json!({ "n": null })));
}

// ── Failures ────────────────────────────────────────────────────────────────

#[test]
fn empty_input_does_not_parse() {
    assert_eq!(parse_partial(""), None);
    assert_eq!(parse_partial("   "), None);
}

#[test]
fn text_that_is_not_a_json_prefix_does_not_parse() {
    assert_eq!(parse_partial("not json"), None);
    assert_eq!(parse_partial(r#"{"a": 1} ]]"#), None);
}
