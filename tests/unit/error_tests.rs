//! Unit tests for `AppError` display and classification.
//!
//! Covers:
//! - every variant renders with a lowercase domain prefix
//! - structured variants render their `reason`
//! - structured vs wrapped classification
//! - conversions from library errors

use serde_json::json;

use acp_adapter::AppError;

#[test]
fn variants_render_with_prefix() {
    let cases = [
        (AppError::Config("bad".into()), "config: bad"),
        (AppError::Acp("stream closed".into()), "acp: stream closed"),
        (AppError::InvalidRequest("busy".into()), "invalid request: busy"),
        (AppError::MethodNotFound("x/y".into()), "method not found: x/y"),
        (AppError::Engine("crashed".into()), "engine: crashed"),
        (AppError::Cloud("503".into()), "cloud: 503"),
        (AppError::NotFound("s1".into()), "not found: s1"),
        (AppError::Io("denied".into()), "io: denied"),
    ];
    for (err, expected) in cases {
        assert_eq!(err.to_string(), expected);
    }
}

#[test]
fn messages_have_no_trailing_period() {
    let err = AppError::Acp("write failed".into());
    assert!(!err.to_string().ends_with('.'));
}

#[test]
fn structured_variants_render_reason() {
    assert_eq!(
        AppError::invalid_params("Invalid mode ID: x").to_string(),
        "invalid params: Invalid mode ID: x"
    );
    assert_eq!(
        AppError::auth_required("no key").to_string(),
        "authentication required: no key"
    );
    assert_eq!(
        AppError::internal("Failed to process prompt", "boom").to_string(),
        "internal: Failed to process prompt"
    );
}

#[test]
fn data_without_reason_renders_raw_json() {
    let err = AppError::InvalidParams(json!({ "sessionId": "s1" }));
    assert!(err.to_string().contains("\"sessionId\""));
}

#[test]
fn internal_carries_reason_and_details() {
    let AppError::Internal(data) = AppError::internal("Failed to load session", "disk full")
    else {
        panic!("internal constructor");
    };
    assert_eq!(data["reason"], "Failed to load session");
    assert_eq!(data["details"], "disk full");
}

// ── Classification ──────────────────────────────────────────────────────────

#[test]
fn protocol_errors_are_structured() {
    assert!(AppError::invalid_params("x").is_structured());
    assert!(AppError::InvalidRequest("x".into()).is_structured());
    assert!(AppError::MethodNotFound("x".into()).is_structured());
    assert!(AppError::auth_required("x").is_structured());
    assert!(AppError::internal("x", "y").is_structured());
}

#[test]
fn runtime_failures_are_not_structured() {
    assert!(!AppError::Engine("x".into()).is_structured());
    assert!(!AppError::Cloud("x".into()).is_structured());
    assert!(!AppError::Io("x".into()).is_structured());
    assert!(!AppError::Config("x".into()).is_structured());
}

// ── Conversions ─────────────────────────────────────────────────────────────

#[test]
fn io_error_converts_to_io() {
    let err: AppError = std::io::Error::new(std::io::ErrorKind::NotFound, "gone").into();
    assert!(matches!(err, AppError::Io(ref msg) if msg == "gone"));
}

#[test]
fn toml_error_converts_to_config() {
    let parsed: Result<toml::Value, _> = toml::from_str("streaming = [");
    let err: AppError = parsed.expect_err("malformed").into();
    assert!(err.to_string().starts_with("config: invalid config"));
}
