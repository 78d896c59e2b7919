//! Integration tests for the protocol handler over a scripted provider.
//!
//! Covers:
//! - `session/new` builds a conversation, advertises modes and commands
//! - prompts run the engine; slash commands never reach it
//! - mode changes through `/confirm` and `session/set_mode`
//! - `session/load` validation, history replay and the storage capability
//! - bounded-wait cancellation and its stop reasons
//! - busy sessions (sequential and simultaneous), empty prompts and engine failures
//! - resuming a conversation on the first `session/new`
//! - closing a session releases its resources

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use tempfile::TempDir;

use acp_adapter::acp::schema::{
    CloseSessionRequest, ContentBlock, LoadSessionRequest, NewSessionRequest, PromptRequest,
    SetSessionModeRequest, StopReason,
};
use acp_adapter::engine::{ConfirmationPolicy, Conversation, ExecutionStatus};
use acp_adapter::mode::AgentKind;
use acp_adapter::session::agent::{AcpAgent, AgentSettings};
use acp_adapter::session::confirmation::ConfirmationMode;
use acp_adapter::AppError;

use crate::common::{assistant_message, FakeProvider, Host, Step};

const STORED: &str = "6a1f0c3e-2b4d-4c5e-8f70-112233445566";

struct Harness {
    agent: Arc<AcpAgent<FakeProvider>>,
    host: Host,
    _cache: TempDir,
}

fn harness(provider: FakeProvider, resume_id: Option<&str>) -> Harness {
    let host = Host::start(Some(json!({ "outcome": "selected", "optionId": "accept" })));
    let cache = TempDir::new().expect("tempdir");
    let settings = AgentSettings {
        streaming: false,
        cancel_timeout: Duration::from_millis(100),
        default_mode: ConfirmationMode::AlwaysAsk,
        resource_cache_dir: cache.path().to_path_buf(),
        channel_capacity: 16,
        resume_id: resume_id.map(str::to_owned),
    };
    let agent = Arc::new(AcpAgent::new(provider, host.client.clone(), settings));
    Harness {
        agent,
        host,
        _cache: cache,
    }
}

async fn new_session(h: &Harness) -> String {
    let response = h
        .agent
        .new_session(NewSessionRequest {
            cwd: "/work".to_owned(),
            mcp_servers: Vec::new(),
        })
        .await
        .expect("session/new");
    response.session_id
}

fn prompt(session_id: &str, text: &str) -> PromptRequest {
    PromptRequest {
        session_id: session_id.to_owned(),
        prompt: vec![ContentBlock::text(text)],
    }
}

fn load(session_id: &str) -> LoadSessionRequest {
    LoadSessionRequest {
        cwd: "/work".to_owned(),
        mcp_servers: Vec::new(),
        session_id: session_id.to_owned(),
    }
}

fn message_texts(host: &Host) -> Vec<String> {
    host.updates()
        .iter()
        .filter(|u| u["sessionUpdate"] == "agent_message_chunk")
        .filter_map(|u| u["content"]["text"].as_str().map(str::to_owned))
        .collect()
}

// ── session/new ─────────────────────────────────────────────────────────────

#[tokio::test]
async fn new_session_advertises_modes_and_commands() {
    let h = harness(FakeProvider::new(AgentKind::Local), None);
    let response = h
        .agent
        .new_session(NewSessionRequest {
            cwd: "/work".to_owned(),
            mcp_servers: Vec::new(),
        })
        .await
        .expect("session/new");

    assert!(uuid::Uuid::parse_str(&response.session_id).is_ok());
    assert_eq!(response.modes.current_mode_id, "always-ask");
    assert_eq!(response.modes.available_modes.len(), 3);

    let conversation = h.agent.provider().conversation(&response.session_id);
    assert_eq!(
        conversation.confirmation_policy(),
        ConfirmationPolicy::AlwaysConfirm
    );
    assert_eq!(
        h.agent.provider().requests.lock().expect("lock")[0],
        (response.session_id.clone(), false)
    );

    h.host.settle().await;
    assert_eq!(h.host.update_kinds(), vec!["available_commands_update"]);
}

#[tokio::test]
async fn first_session_resumes_configured_conversation() {
    let provider = FakeProvider::new(AgentKind::Local)
        .with_history(STORED, vec![assistant_message("m1", "earlier answer")]);
    let h = harness(provider, Some(STORED));

    assert_eq!(new_session(&h).await, STORED);
    let second = new_session(&h).await;
    assert_ne!(second, STORED);
    h.host.settle().await;

    let requests = h.agent.provider().requests.lock().expect("lock").clone();
    assert_eq!(requests[0], (STORED.to_owned(), true));
    assert!(!requests[1].1);
    assert_eq!(message_texts(&h.host), vec!["earlier answer"]);
}

// ── session/prompt ──────────────────────────────────────────────────────────

#[tokio::test]
async fn prompt_runs_engine_and_streams_reply() {
    let provider = FakeProvider::new(AgentKind::Local)
        .with_script(vec![Step::Finish(vec![assistant_message("m1", "Hello there")])]);
    let h = harness(provider, None);
    let id = new_session(&h).await;

    let response = h.agent.prompt(prompt(&id, "hi")).await.expect("prompt");
    assert_eq!(response.stop_reason, StopReason::EndTurn);

    let conversation = h.agent.provider().conversation(&id);
    assert_eq!(conversation.state().runs, 1);
    assert_eq!(conversation.state().messages.len(), 1);
    assert_eq!(message_texts(&h.host), vec!["Hello there"]);
}

#[tokio::test]
async fn prompt_for_unknown_session_builds_it() {
    let h = harness(FakeProvider::new(AgentKind::Local), None);
    let response = h
        .agent
        .prompt(prompt("fresh", "hi"))
        .await
        .expect("prompt");
    assert_eq!(response.stop_reason, StopReason::EndTurn);
    assert_eq!(h.agent.provider().create_count(), 1);
    assert!(h.agent.registry().contains("fresh"));
}

#[tokio::test]
async fn empty_prompt_ends_turn_without_running() {
    let h = harness(FakeProvider::new(AgentKind::Local), None);
    let id = new_session(&h).await;

    let response = h
        .agent
        .prompt(PromptRequest {
            session_id: id.clone(),
            prompt: Vec::new(),
        })
        .await
        .expect("prompt");
    assert_eq!(response.stop_reason, StopReason::EndTurn);
    assert_eq!(h.agent.provider().conversation(&id).state().runs, 0);
}

#[tokio::test]
async fn help_command_answers_without_engine() {
    let h = harness(FakeProvider::new(AgentKind::Local), None);
    let id = new_session(&h).await;

    let response = h.agent.prompt(prompt(&id, "/help")).await.expect("prompt");
    assert_eq!(response.stop_reason, StopReason::EndTurn);
    h.host.settle().await;

    let conversation = h.agent.provider().conversation(&id);
    assert_eq!(conversation.state().runs, 0);
    assert!(conversation.state().messages.is_empty());
    let texts = message_texts(&h.host);
    assert_eq!(texts.len(), 1);
    assert!(texts[0].contains("/confirm"));
}

#[tokio::test]
async fn confirm_command_switches_mode() {
    let h = harness(FakeProvider::new(AgentKind::Local), None);
    let id = new_session(&h).await;

    h.agent
        .prompt(prompt(&id, "/confirm always-approve"))
        .await
        .expect("prompt");
    h.host.settle().await;

    let conversation = h.agent.provider().conversation(&id);
    assert_eq!(
        conversation.confirmation_policy(),
        ConfirmationPolicy::NeverConfirm
    );
    assert_eq!(conversation.state().runs, 0);
    let updates = h.host.updates();
    assert!(updates.iter().any(|u| u["sessionUpdate"] == "current_mode_update"
        && u["currentModeId"] == "always-approve"));
    assert_eq!(message_texts(&h.host).len(), 1);
}

#[tokio::test]
async fn engine_failure_is_reported_then_wrapped() {
    let provider =
        FakeProvider::new(AgentKind::Local).with_script(vec![Step::Fail("model down".into())]);
    let h = harness(provider, None);
    let id = new_session(&h).await;

    let err = h
        .agent
        .prompt(prompt(&id, "hi"))
        .await
        .expect_err("must fail");
    let AppError::Internal(data) = err else {
        panic!("expected internal error, got {err:?}");
    };
    assert_eq!(data["reason"], "Failed to process prompt");
    h.host.settle().await;

    let texts = message_texts(&h.host);
    assert_eq!(texts.len(), 1);
    assert!(texts[0].starts_with("Error: "));
    assert!(texts[0].contains("model down"));
}

#[tokio::test]
async fn second_prompt_on_busy_session_is_rejected() {
    let provider = FakeProvider::new(AgentKind::Local).with_script(vec![Step::UntilPaused]);
    let h = harness(provider, None);
    let id = new_session(&h).await;

    let first = {
        let agent = Arc::clone(&h.agent);
        let id = id.clone();
        tokio::spawn(async move { agent.prompt(prompt(&id, "long task")).await })
    };
    tokio::time::sleep(Duration::from_millis(50)).await;

    let second = h.agent.prompt(prompt(&id, "another")).await;
    assert!(matches!(second, Err(AppError::InvalidRequest(_))));
    assert_eq!(
        h.agent.provider().conversation(&id).state().messages.len(),
        1,
        "rejected prompt never reaches the engine"
    );

    h.agent.cancel(&id).await.expect("cancel");
    first.await.expect("join").expect("first prompt");
}

#[tokio::test(flavor = "multi_thread")]
async fn simultaneous_prompts_run_one_turn() {
    let provider = FakeProvider::new(AgentKind::Local).with_script(vec![Step::UntilPaused]);
    let h = harness(provider, None);
    let id = new_session(&h).await;

    let spawn_prompt = |text: &'static str| {
        let agent = Arc::clone(&h.agent);
        let id = id.clone();
        tokio::spawn(async move { agent.prompt(prompt(&id, text)).await })
    };
    let mut first = spawn_prompt("one");
    let mut second = spawn_prompt("two");

    // One of the two is refused at once; the other holds the session until cancelled.
    let (refused, first_refused) = tokio::select! {
        result = &mut first => (result, true),
        result = &mut second => (result, false),
    };
    let admitted = if first_refused { second } else { first };
    let refused = refused.expect("join");
    assert!(
        matches!(refused, Err(AppError::InvalidRequest(_))),
        "expected a busy rejection, got {refused:?}"
    );

    let conversation = h.agent.provider().conversation(&id);
    tokio::time::timeout(Duration::from_secs(5), async {
        while conversation.state().runs == 0 {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("admitted turn starts");
    assert_eq!(
        conversation.state().messages.len(),
        1,
        "only the admitted prompt reaches the engine"
    );

    h.agent.cancel(&id).await.expect("cancel");
    let admitted = admitted.await.expect("join").expect("admitted prompt");
    assert_eq!(admitted.stop_reason, StopReason::Cancelled);
}

// ── session/cancel ──────────────────────────────────────────────────────────

#[tokio::test]
async fn cancel_of_unknown_session_is_ignored() {
    let h = harness(FakeProvider::new(AgentKind::Local), None);
    h.agent.cancel("nobody").await.expect("no-op");
}

#[tokio::test]
async fn cancel_pauses_running_turn() {
    let provider = FakeProvider::new(AgentKind::Local).with_script(vec![Step::UntilPaused]);
    let h = harness(provider, None);
    let id = new_session(&h).await;

    let turn = {
        let agent = Arc::clone(&h.agent);
        let id = id.clone();
        tokio::spawn(async move { agent.prompt(prompt(&id, "long task")).await })
    };
    tokio::time::sleep(Duration::from_millis(50)).await;

    h.agent.cancel(&id).await.expect("cancel");
    let response = turn.await.expect("join").expect("prompt");
    assert_eq!(response.stop_reason, StopReason::Cancelled);

    let conversation = h.agent.provider().conversation(&id);
    assert_eq!(conversation.state().pauses, 1);
    assert_eq!(conversation.execution_status(), ExecutionStatus::Paused);
}

#[tokio::test]
async fn cancel_aborts_turn_ignoring_pause() {
    let provider = FakeProvider::new(AgentKind::Local)
        .with_script(vec![Step::Block(Duration::from_millis(500))]);
    let h = harness(provider, None);
    let id = new_session(&h).await;

    let turn = {
        let agent = Arc::clone(&h.agent);
        let id = id.clone();
        tokio::spawn(async move { agent.prompt(prompt(&id, "stubborn")).await })
    };
    tokio::time::sleep(Duration::from_millis(30)).await;

    let started = tokio::time::Instant::now();
    h.agent.cancel(&id).await.expect("cancel");
    assert!(started.elapsed() < Duration::from_millis(400));

    let response = turn.await.expect("join").expect("prompt");
    assert_eq!(response.stop_reason, StopReason::Cancelled);
}

// ── session/set_mode ────────────────────────────────────────────────────────

#[tokio::test]
async fn set_mode_rejects_unknown_mode() {
    let h = harness(FakeProvider::new(AgentKind::Local), None);
    let id = new_session(&h).await;

    let err = h
        .agent
        .set_session_mode(SetSessionModeRequest {
            session_id: id,
            mode_id: "yolo".to_owned(),
        })
        .await
        .expect_err("invalid mode");
    let AppError::InvalidParams(data) = err else {
        panic!("expected invalid params, got {err:?}");
    };
    assert_eq!(data["reason"], "Invalid mode ID: yolo");
    assert_eq!(
        data["validModes"],
        json!(["always-approve", "always-ask", "llm-approve"])
    );
}

#[tokio::test]
async fn set_mode_applies_and_announces() {
    let h = harness(FakeProvider::new(AgentKind::Local), None);
    let id = new_session(&h).await;

    h.agent
        .set_session_mode(SetSessionModeRequest {
            session_id: id.clone(),
            mode_id: "llm-approve".to_owned(),
        })
        .await
        .expect("set mode");
    h.host.settle().await;

    let conversation = h.agent.provider().conversation(&id);
    assert!(matches!(
        conversation.confirmation_policy(),
        ConfirmationPolicy::ConfirmRisky { .. }
    ));
    assert!(conversation.security_analyzer().is_some());
    assert!(h
        .host
        .updates()
        .iter()
        .any(|u| u["currentModeId"] == "llm-approve"));
}

// ── session/load ────────────────────────────────────────────────────────────

#[tokio::test]
async fn load_rejects_malformed_id() {
    let h = harness(FakeProvider::new(AgentKind::Local), None);
    let err = h.agent.load_session(load("not-a-uuid")).await.expect_err("bad id");
    let AppError::InvalidParams(data) = err else {
        panic!("expected invalid params, got {err:?}");
    };
    assert_eq!(data["reason"], "Invalid session ID format");
    assert_eq!(data["sessionId"], "not-a-uuid");
    assert_eq!(h.agent.provider().create_count(), 0);
}

#[tokio::test]
async fn cloud_load_of_unknown_session_is_not_found() {
    let h = harness(FakeProvider::new(AgentKind::Cloud), None);
    let err = h.agent.load_session(load(STORED)).await.expect_err("unknown");
    let AppError::InvalidParams(data) = err else {
        panic!("expected invalid params, got {err:?}");
    };
    assert_eq!(data["reason"], "Session not found");
    assert!(data["help"].as_str().is_some());
    assert_eq!(h.agent.provider().create_count(), 0);
}

#[tokio::test]
async fn local_load_replays_history_then_commands() {
    let provider = FakeProvider::new(AgentKind::Local).with_history(
        STORED,
        vec![
            assistant_message("m1", "first"),
            assistant_message("m2", "second"),
        ],
    );
    let h = harness(provider, None);

    let response = h.agent.load_session(load(STORED)).await.expect("load");
    assert_eq!(response.modes.current_mode_id, "always-ask");
    h.host.settle().await;

    assert_eq!(
        h.host.update_kinds(),
        vec![
            "agent_message_chunk",
            "agent_message_chunk",
            "available_commands_update"
        ]
    );
    assert_eq!(message_texts(&h.host), vec!["first", "second"]);
    assert_eq!(
        h.agent.provider().requests.lock().expect("lock")[0],
        (STORED.to_owned(), true)
    );
}

#[tokio::test]
async fn load_of_empty_history_returns_modes_only() {
    let h = harness(FakeProvider::new(AgentKind::Local), None);
    let response = h.agent.load_session(load(STORED)).await.expect("load");
    assert_eq!(response.modes.current_mode_id, "always-ask");
    h.host.settle().await;
    assert!(h.host.updates().is_empty());
}

#[tokio::test]
async fn cloud_load_of_live_session_replays() {
    let h = harness(FakeProvider::new(AgentKind::Cloud), None);
    let first = h.agent.prompt(prompt(STORED, "hi")).await.expect("prompt");
    assert_eq!(first.stop_reason, StopReason::EndTurn);
    h.agent
        .provider()
        .conversation(STORED)
        .state()
        .events
        .push(assistant_message("m1", "kept in memory"));

    h.agent.load_session(load(STORED)).await.expect("load");
    h.host.settle().await;
    assert_eq!(message_texts(&h.host), vec!["kept in memory"]);
    assert_eq!(h.agent.provider().create_count(), 1);
}

// ── session/close ───────────────────────────────────────────────────────────

#[tokio::test]
async fn close_releases_session() {
    let h = harness(FakeProvider::new(AgentKind::Cloud), None);
    let id = new_session(&h).await;
    let conversation = h.agent.provider().conversation(&id);

    let reply = h
        .agent
        .close_session(CloseSessionRequest {
            session_id: id.clone(),
        })
        .await;
    assert_eq!(reply, json!({}));
    assert!(conversation.state().closed);
    assert!(!h.agent.registry().contains(&id));
    assert_eq!(
        *h.agent.provider().released.lock().expect("lock"),
        vec![id]
    );
}

#[tokio::test]
async fn close_all_releases_every_session() {
    let h = harness(FakeProvider::new(AgentKind::Local), None);
    new_session(&h).await;
    new_session(&h).await;

    h.agent.close_all().await;
    assert!(h.agent.registry().is_empty());
    assert_eq!(h.agent.provider().released.lock().expect("lock").len(), 2);
}
