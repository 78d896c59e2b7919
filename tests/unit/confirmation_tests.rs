//! Unit tests for confirmation modes and the permission round trip.
//!
//! Covers:
//! - wire ids, parsing and the mode advertisement
//! - projection of each mode onto engine policy and analyzer
//! - recovering the mode from the engine's policy
//! - host answers mapped to accept, reject or mode switches

use acp_adapter::acp::schema::{PermissionOptionKind, RequestPermissionOutcome, ToolCallStatus};
use acp_adapter::engine::{ConfirmationPolicy, Conversation, SecurityAnalyzer, SecurityRisk};
use acp_adapter::session::confirmation::{
    decide, mode_state, permission_options, permission_tool_call, valid_mode_ids, Decision,
    CANCEL_REASON, REJECT_REASON,
};
use acp_adapter::session::ConfirmationMode;

use crate::common::FakeConversation;

fn selected(option_id: &str) -> RequestPermissionOutcome {
    RequestPermissionOutcome::Selected {
        option_id: option_id.to_owned(),
    }
}

// ── Modes ───────────────────────────────────────────────────────────────────

#[test]
fn wire_ids_round_trip_through_parse() {
    for mode in ConfirmationMode::ALL {
        assert_eq!(ConfirmationMode::parse(mode.as_str()), Some(mode));
        assert_eq!(mode.to_string(), mode.as_str());
    }
    assert_eq!(
        ConfirmationMode::parse(" Always-Ask "),
        Some(ConfirmationMode::AlwaysAsk)
    );
    assert_eq!(ConfirmationMode::parse("always"), None);
}

#[test]
fn default_mode_asks() {
    assert_eq!(ConfirmationMode::default(), ConfirmationMode::AlwaysAsk);
}

#[test]
fn valid_ids_are_sorted() {
    assert_eq!(
        valid_mode_ids(),
        vec!["always-approve", "always-ask", "llm-approve"]
    );
}

#[test]
fn mode_state_advertises_all_modes() {
    let state = mode_state(ConfirmationMode::LlmApprove);
    assert_eq!(state.current_mode_id, "llm-approve");
    let ids: Vec<&str> = state.available_modes.iter().map(|m| m.id.as_str()).collect();
    assert_eq!(ids, vec!["always-ask", "always-approve", "llm-approve"]);
    assert!(state.available_modes.iter().all(|m| m.description.is_some()));
}

// ── Engine projection ───────────────────────────────────────────────────────

#[test]
fn always_ask_confirms_everything_with_analyzer() {
    let conversation = FakeConversation::new("s", None, Vec::new());
    ConfirmationMode::AlwaysAsk
        .apply(&conversation)
        .expect("apply");

    assert_eq!(
        conversation.confirmation_policy(),
        ConfirmationPolicy::AlwaysConfirm
    );
    assert_eq!(
        conversation.security_analyzer(),
        Some(SecurityAnalyzer::LlmRisk)
    );
    assert_eq!(
        ConfirmationMode::of(&conversation),
        ConfirmationMode::AlwaysAsk
    );
}

#[test]
fn always_approve_leaves_analyzer_untouched() {
    let conversation = FakeConversation::new("s", None, Vec::new());
    ConfirmationMode::LlmApprove.apply(&conversation).expect("apply");
    ConfirmationMode::AlwaysApprove
        .apply(&conversation)
        .expect("apply");

    assert_eq!(
        conversation.confirmation_policy(),
        ConfirmationPolicy::NeverConfirm
    );
    assert_eq!(
        conversation.security_analyzer(),
        Some(SecurityAnalyzer::LlmRisk),
        "switching to always-approve must not clear the analyzer"
    );
}

#[test]
fn llm_approve_confirms_high_risk_only() {
    let (policy, analyzer) = ConfirmationMode::LlmApprove.engine_settings();
    assert_eq!(
        policy,
        ConfirmationPolicy::ConfirmRisky {
            threshold: SecurityRisk::High
        }
    );
    assert_eq!(analyzer, Some(SecurityAnalyzer::LlmRisk));
}

#[test]
fn mode_is_recovered_from_policy() {
    for mode in ConfirmationMode::ALL {
        let (policy, _) = mode.engine_settings();
        assert_eq!(ConfirmationMode::from_policy(policy), mode);
    }
    assert_eq!(
        ConfirmationMode::from_policy(ConfirmationPolicy::ConfirmRisky {
            threshold: SecurityRisk::Medium
        }),
        ConfirmationMode::LlmApprove
    );
}

// ── Permission round trip ───────────────────────────────────────────────────

#[test]
fn four_options_are_offered() {
    let options = permission_options();
    let ids: Vec<&str> = options.iter().map(|o| o.option_id.as_str()).collect();
    assert_eq!(ids, vec!["accept", "reject", "always_proceed", "risk_based"]);
    assert_eq!(options[1].kind, PermissionOptionKind::RejectOnce);
    assert_eq!(options[2].kind, PermissionOptionKind::AllowAlways);
}

#[test]
fn permission_tool_call_is_pending_and_session_scoped() {
    let call = permission_tool_call("abc");
    assert_eq!(call.tool_call_id, "confirmation-abc");
    assert_eq!(call.status, Some(ToolCallStatus::Pending));
}

#[test]
fn answers_map_to_decisions() {
    assert_eq!(
        decide(&selected("accept")),
        Decision::Accept { mode_change: None }
    );
    assert_eq!(
        decide(&selected("reject")),
        Decision::Reject {
            reason: REJECT_REASON.to_owned()
        }
    );
    assert_eq!(
        decide(&selected("always_proceed")),
        Decision::Accept {
            mode_change: Some(ConfirmationMode::AlwaysApprove)
        }
    );
    assert_eq!(
        decide(&selected("risk_based")),
        Decision::Accept {
            mode_change: Some(ConfirmationMode::LlmApprove)
        }
    );
}

#[test]
fn dismissed_prompt_rejects_with_cancel_reason() {
    assert_eq!(
        decide(&RequestPermissionOutcome::Cancelled),
        Decision::Reject {
            reason: CANCEL_REASON.to_owned()
        }
    );
}

#[test]
fn unknown_option_rejects() {
    assert!(matches!(
        decide(&selected("maybe")),
        Decision::Reject { .. }
    ));
}
