//! Confirmation modes and the host permission round trip.
//!
//! A session runs in exactly one [`ConfirmationMode`]. The mode is not stored
//! separately: it is projected onto the engine's confirmation policy and
//! security analyzer, and read back from them.

use std::fmt;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::acp::schema::{
    PermissionOption, PermissionOptionKind, RequestPermissionOutcome, SessionMode,
    SessionModeState, ToolCallStatus, ToolCallUpdate, ToolKind,
};
use crate::engine::{ConfirmationPolicy, Conversation, SecurityAnalyzer, SecurityRisk};
use crate::Result;

/// How much the agent must ask before acting.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, ValueEnum, Serialize, Deserialize,
)]
#[serde(rename_all = "kebab-case")]
pub enum ConfirmationMode {
    /// Ask before every action.
    #[default]
    AlwaysAsk,
    /// Never ask.
    AlwaysApprove,
    /// Let the model score risk; ask only for high-risk actions.
    LlmApprove,
}

impl ConfirmationMode {
    /// Every mode, in presentation order.
    pub const ALL: [Self; 3] = [Self::AlwaysAsk, Self::AlwaysApprove, Self::LlmApprove];

    /// Wire identifier.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::AlwaysAsk => "always-ask",
            Self::AlwaysApprove => "always-approve",
            Self::LlmApprove => "llm-approve",
        }
    }

    /// Parse a mode token, ignoring case and surrounding whitespace.
    #[must_use]
    pub fn parse(token: &str) -> Option<Self> {
        let normalized = token.trim().to_ascii_lowercase();
        Self::ALL.into_iter().find(|mode| mode.as_str() == normalized)
    }

    /// Display name shown by hosts.
    #[must_use]
    pub fn display_name(self) -> &'static str {
        match self {
            Self::AlwaysAsk => "Always Ask",
            Self::AlwaysApprove => "Always Approve",
            Self::LlmApprove => "LLM Approve",
        }
    }

    /// One-line description.
    #[must_use]
    pub fn description(self) -> &'static str {
        match self {
            Self::AlwaysAsk => "Ask for permission before every action",
            Self::AlwaysApprove => "Automatically approve all actions",
            Self::LlmApprove => "Use LLM security analyzer to auto-approve safe actions",
        }
    }

    /// Policy and analyzer this mode projects onto.
    ///
    /// `None` for the analyzer means "leave the current one in place".
    #[must_use]
    pub fn engine_settings(self) -> (ConfirmationPolicy, Option<SecurityAnalyzer>) {
        match self {
            Self::AlwaysAsk => (ConfirmationPolicy::AlwaysConfirm, Some(SecurityAnalyzer::LlmRisk)),
            Self::AlwaysApprove => (ConfirmationPolicy::NeverConfirm, None),
            Self::LlmApprove => (
                ConfirmationPolicy::ConfirmRisky {
                    threshold: SecurityRisk::High,
                },
                Some(SecurityAnalyzer::LlmRisk),
            ),
        }
    }

    /// Mode a policy corresponds to.
    #[must_use]
    pub fn from_policy(policy: ConfirmationPolicy) -> Self {
        match policy {
            ConfirmationPolicy::AlwaysConfirm => Self::AlwaysAsk,
            ConfirmationPolicy::NeverConfirm => Self::AlwaysApprove,
            ConfirmationPolicy::ConfirmRisky { .. } => Self::LlmApprove,
        }
    }

    /// Mode currently projected onto `conversation`.
    #[must_use]
    pub fn of(conversation: &dyn Conversation) -> Self {
        Self::from_policy(conversation.confirmation_policy())
    }

    /// Project this mode onto `conversation`.
    ///
    /// # Errors
    ///
    /// Propagates [`AppError::Engine`](crate::AppError::Engine) if the engine
    /// cannot be reached.
    pub fn apply(self, conversation: &dyn Conversation) -> Result<()> {
        let (policy, analyzer) = self.engine_settings();
        if let Some(analyzer) = analyzer {
            conversation.set_security_analyzer(Some(analyzer))?;
        }
        conversation.set_confirmation_policy(policy)?;
        info!(
            session_id = conversation.id(),
            mode = self.as_str(),
            "confirmation mode applied"
        );
        Ok(())
    }
}

impl fmt::Display for ConfirmationMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Valid mode ids, sorted.
#[must_use]
pub fn valid_mode_ids() -> Vec<&'static str> {
    let mut ids: Vec<_> = ConfirmationMode::ALL.iter().map(|m| m.as_str()).collect();
    ids.sort_unstable();
    ids
}

/// Mode advertisement for session responses.
#[must_use]
pub fn mode_state(current: ConfirmationMode) -> SessionModeState {
    SessionModeState {
        current_mode_id: current.as_str().to_owned(),
        available_modes: ConfirmationMode::ALL
            .into_iter()
            .map(|mode| SessionMode {
                id: mode.as_str().to_owned(),
                name: mode.display_name().to_owned(),
                description: Some(mode.description().to_owned()),
            })
            .collect(),
    }
}

// ── Permission round trip ────────────────────────────────────────────────────

/// Reason given to the engine when the user rejects pending actions.
pub const REJECT_REASON: &str =
    "User rejected the action. Please ask the user how they want to proceed.";

/// Reason given to the engine when the user dismisses the permission prompt.
pub const CANCEL_REASON: &str =
    "User cancelled the action. Please ask the user how they want to proceed.";

/// What the turn runner does after a permission prompt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    /// Run the pending actions, optionally switching mode first.
    Accept {
        /// Mode to apply before resuming.
        mode_change: Option<ConfirmationMode>,
    },
    /// Reject the pending actions with a reason for the agent.
    Reject {
        /// Reason forwarded to the engine.
        reason: String,
    },
    /// Pause and leave the actions pending.
    Defer,
}

/// Choices offered in `session/request_permission`.
#[must_use]
pub fn permission_options() -> Vec<PermissionOption> {
    [
        ("accept", "Yes, proceed", PermissionOptionKind::AllowOnce),
        ("reject", "Reject", PermissionOptionKind::RejectOnce),
        (
            "always_proceed",
            "Always proceed (don't ask again)",
            PermissionOptionKind::AllowAlways,
        ),
        (
            "risk_based",
            "Auto-confirm LOW/MEDIUM risk, ask for HIGH risk action",
            PermissionOptionKind::AllowOnce,
        ),
    ]
    .into_iter()
    .map(|(id, name, kind)| PermissionOption {
        option_id: id.to_owned(),
        name: name.to_owned(),
        kind,
    })
    .collect()
}

/// Tool call shown to the host while asking for permission.
#[must_use]
pub fn permission_tool_call(session_id: &str) -> ToolCallUpdate {
    ToolCallUpdate {
        tool_call_id: format!("confirmation-{session_id}"),
        title: Some("Confirm Agent Actions".to_owned()),
        kind: Some(ToolKind::Other),
        status: Some(ToolCallStatus::Pending),
        ..ToolCallUpdate::default()
    }
}

/// Interpret the host's answer.
#[must_use]
pub fn decide(outcome: &RequestPermissionOutcome) -> Decision {
    match outcome {
        RequestPermissionOutcome::Cancelled => Decision::Reject {
            reason: CANCEL_REASON.to_owned(),
        },
        RequestPermissionOutcome::Selected { option_id } => match option_id.as_str() {
            "accept" => Decision::Accept { mode_change: None },
            "reject" => Decision::Reject {
                reason: REJECT_REASON.to_owned(),
            },
            "always_proceed" => Decision::Accept {
                mode_change: Some(ConfirmationMode::AlwaysApprove),
            },
            "risk_based" => Decision::Accept {
                mode_change: Some(ConfirmationMode::LlmApprove),
            },
            other => {
                warn!(option_id = other, "unknown permission option, treating as reject");
                Decision::Reject {
                    reason: REJECT_REASON.to_owned(),
                }
            }
        },
    }
}
