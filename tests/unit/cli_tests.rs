//! Unit tests for the `--mode` and `--confirmation-mode` value enums.
//!
//! Covers:
//! - defaults
//! - parsing from command-line strings
//! - possible-value names match the wire and log labels

use clap::ValueEnum as _;

use acp_adapter::mode::AgentKind;
use acp_adapter::session::confirmation::ConfirmationMode;

#[test]
fn agent_kind_defaults_to_local() {
    assert_eq!(AgentKind::default(), AgentKind::Local);
}

#[test]
fn agent_kind_parses_from_string() {
    assert_eq!(
        AgentKind::from_str("cloud", false).expect("cloud is valid"),
        AgentKind::Cloud
    );
    assert_eq!(
        AgentKind::from_str("local", false).expect("local is valid"),
        AgentKind::Local
    );
    assert!(AgentKind::from_str("remote", false).is_err());
}

#[test]
fn agent_kind_possible_values_match_labels() {
    for kind in AgentKind::value_variants() {
        let value = kind.to_possible_value().expect("has possible value");
        assert_eq!(value.get_name(), kind.as_str());
    }
}

#[test]
fn confirmation_mode_possible_values_match_wire_ids() {
    for mode in ConfirmationMode::value_variants() {
        let value = mode.to_possible_value().expect("has possible value");
        assert_eq!(value.get_name(), mode.as_str());
    }
}

#[test]
fn confirmation_mode_parses_kebab_case() {
    assert_eq!(
        ConfirmationMode::from_str("llm-approve", false).expect("valid"),
        ConfirmationMode::LlmApprove
    );
    assert!(ConfirmationMode::from_str("llm_approve", false).is_err());
}
