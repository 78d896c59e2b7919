//! Slash commands handled by the adapter without involving the engine.
//!
//! Parsing is pure. [`execute`] returns the reply text and, for a successful
//! `/confirm <mode>`, the mode the caller must apply.

use std::fmt::Write as _;

use crate::acp::schema::{AvailableCommand, AvailableCommandInput};

use super::confirmation::ConfirmationMode;

/// Split `/command rest` into a lower-cased command and the trimmed rest.
///
/// Returns `None` when `text` does not start with `/` or names no command.
#[must_use]
pub fn parse_slash_command(text: &str) -> Option<(String, String)> {
    let body = text.trim().strip_prefix('/')?.trim();
    if body.is_empty() {
        return None;
    }
    let (command, rest) = body
        .split_once(char::is_whitespace)
        .unwrap_or((body, ""));
    Some((command.to_lowercase(), rest.trim().to_owned()))
}

/// Commands advertised through `available_commands_update`, sorted by name.
#[must_use]
pub fn available_commands() -> Vec<AvailableCommand> {
    vec![
        AvailableCommand {
            name: "confirm".to_owned(),
            description: "Control confirmation mode (always-ask|always-approve|llm-approve)"
                .to_owned(),
            input: Some(AvailableCommandInput {
                hint: "always-ask | always-approve | llm-approve".to_owned(),
            }),
        },
        AvailableCommand {
            name: "help".to_owned(),
            description: "Show available slash commands".to_owned(),
            input: None,
        },
    ]
}

/// Result of running a slash command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutcome {
    /// Text sent back as an agent message.
    pub reply: String,
    /// Mode to apply, set only by a successful `/confirm <mode>`.
    pub mode_change: Option<ConfirmationMode>,
}

impl CommandOutcome {
    fn reply(reply: String) -> Self {
        Self {
            reply,
            mode_change: None,
        }
    }
}

/// Run `command` with argument `rest` against the session's `current` mode.
#[must_use]
pub fn execute(command: &str, rest: &str, current: ConfirmationMode) -> CommandOutcome {
    match command {
        "help" => CommandOutcome::reply(help_text()),
        "confirm" => confirm(rest, current),
        other => CommandOutcome::reply(unknown_command_text(other)),
    }
}

fn confirm(rest: &str, current: ConfirmationMode) -> CommandOutcome {
    if rest.trim().is_empty() {
        return CommandOutcome::reply(confirm_help_text(current));
    }
    match ConfirmationMode::parse(rest) {
        Some(mode) => CommandOutcome {
            reply: confirm_success_text(mode),
            mode_change: Some(mode),
        },
        None => CommandOutcome::reply(confirm_error_text(rest.trim(), current)),
    }
}

/// Listing of every command.
#[must_use]
pub fn help_text() -> String {
    let mut out = String::from("Available slash commands:\n");
    for command in available_commands() {
        let _ = write!(out, "\n  /{} - {}", command.name, command.description);
    }
    out
}

/// Reply to an unregistered command.
#[must_use]
pub fn unknown_command_text(command: &str) -> String {
    let available: Vec<String> = available_commands()
        .iter()
        .map(|c| format!("/{}", c.name))
        .collect();
    format!(
        "Unknown command: /{command}\n\nAvailable commands: {}\nUse /help for more information.",
        available.join(", ")
    )
}

fn modes_listing() -> String {
    let mut out = String::from("Available modes:");
    for mode in ConfirmationMode::ALL {
        let _ = write!(out, "\n  {:<14} - {}", mode.as_str(), mode.description());
    }
    out
}

/// `/confirm` without an argument.
#[must_use]
pub fn confirm_help_text(current: ConfirmationMode) -> String {
    format!(
        "Current confirmation mode: {current}\n\n{}\n\nUsage: /confirm <mode>\nExample: /confirm always-ask",
        modes_listing()
    )
}

/// `/confirm` with an unknown mode token.
#[must_use]
pub fn confirm_error_text(invalid: &str, current: ConfirmationMode) -> String {
    format!(
        "Unknown mode: {invalid}\n\n{}\n\nCurrent mode: {current}",
        modes_listing()
    )
}

/// `/confirm` after a successful switch.
#[must_use]
pub fn confirm_success_text(mode: ConfirmationMode) -> String {
    let detail = match mode {
        ConfirmationMode::AlwaysAsk => {
            "Agent will ask for permission before executing every action."
        }
        ConfirmationMode::AlwaysApprove => {
            "Agent will automatically approve all actions without asking. Use with caution!"
        }
        ConfirmationMode::LlmApprove => {
            "Agent will use LLM security analyzer to automatically approve safe actions. \
             You will only be asked for permission on potentially risky actions."
        }
    };
    format!("Confirmation mode set to: {mode}\n\n{detail}")
}
