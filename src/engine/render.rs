//! Plain-text rendering of domain events.
//!
//! Used as the body of thought notifications and tool-call content. Output
//! carries no markup beyond the bold section headers the host renders as
//! Markdown.

use std::fmt::Write as _;

use super::event::{
    Action, ActionEvent, CondensationEvent, DomainEvent, MessageContent, Observation, Task,
    TaskStatus,
};

/// Header placed before model reasoning text.
pub const REASONING_HEADER: &str = "**Reasoning**:\n";

/// Header placed before agent thought text.
pub const THOUGHT_HEADER: &str = "\n**Thought**:\n";

/// Render any event as plain text.
#[must_use]
pub fn render_event(event: &DomainEvent) -> String {
    match event {
        DomainEvent::Action(action) => render_action_event(action),
        DomainEvent::Observation(obs) => render_observation(&obs.observation),
        DomainEvent::UserReject(reject) => {
            if reject.rejection_reason.is_empty() {
                "Action rejected by user".to_owned()
            } else {
                format!("Action rejected by user: {}", reject.rejection_reason)
            }
        }
        DomainEvent::AgentError(err) => format!("Error: {}", err.error),
        DomainEvent::Message(msg) => render_message_content(&msg.content),
        DomainEvent::Pause(_) => "Agent paused".to_owned(),
        DomainEvent::Condensation(cond) => render_condensation(cond),
        DomainEvent::CondensationRequest(_) => "Conversation condensation requested".to_owned(),
        DomainEvent::SystemPrompt(prompt) => {
            let mut out = format!("System Prompt:\n{}", prompt.system_prompt);
            if !prompt.tools.is_empty() {
                let _ = write!(out, "\n\nTools available: {}", prompt.tools.join(", "));
            }
            out
        }
        DomainEvent::StateUpdate(update) => format!("State update: {}", update.key),
    }
}

/// Render the reasoning and thought sections of an action, empty when neither
/// carries text.
#[must_use]
pub fn render_reasoning(action: &ActionEvent) -> String {
    let mut out = String::new();
    if let Some(reasoning) = action.reasoning_content.as_deref().map(str::trim) {
        if !reasoning.is_empty() {
            let _ = writeln!(out, "{REASONING_HEADER}{reasoning}");
        }
    }
    if let Some(thought) = action.thought.as_deref().map(str::trim) {
        if !thought.is_empty() {
            let _ = writeln!(out, "{THOUGHT_HEADER}{thought}");
        }
    }
    out
}

/// Render the tool invocation of an action without its reasoning text.
#[must_use]
pub fn render_action_event(action: &ActionEvent) -> String {
    match &action.action {
        Some(parsed) => render_action(parsed),
        None => format!("{} (arguments unavailable)", action.tool_name),
    }
}

/// Render parsed tool arguments.
#[must_use]
pub fn render_action(action: &Action) -> String {
    match action {
        Action::FileEditor {
            command,
            path,
            file_text,
            old_str,
            new_str,
            view_range,
            insert_line,
        } => {
            let mut out = format!("{command} {path}");
            if let Some(range) = view_range.as_deref().filter(|r| !r.is_empty()) {
                let bounds: Vec<String> = range.iter().map(u32::to_string).collect();
                let _ = write!(out, " [{}]", bounds.join(", "));
            }
            if let Some(line) = insert_line {
                let _ = write!(out, " after line {line}");
            }
            if let Some(text) = file_text {
                let _ = write!(out, "\n{text}");
            }
            if let Some(old) = old_str {
                let _ = write!(out, "\n- {old}");
            }
            if let Some(new) = new_str {
                let _ = write!(out, "\n+ {new}");
            }
            out
        }
        Action::Terminal { command } => format!("$ {command}"),
        Action::TaskTracker { command, task_list } => {
            if task_list.is_empty() {
                format!("Task tracker: {command}")
            } else {
                render_tasks(task_list)
            }
        }
        Action::Think { thought } => thought.clone(),
        Action::Finish { message } => message.clone(),
        Action::Other { arguments } => {
            serde_json::to_string_pretty(arguments).unwrap_or_else(|_| arguments.to_string())
        }
    }
}

/// Render a tool result payload.
#[must_use]
pub fn render_observation(observation: &Observation) -> String {
    match observation {
        Observation::TaskTracker { task_list } => render_tasks(task_list),
        Observation::Think { content } | Observation::Finish { content } => content.clone(),
        Observation::Other { content, is_error } => {
            if *is_error {
                format!("Error: {content}")
            } else {
                content.clone()
            }
        }
    }
}

/// Concatenate the text parts of a message; image parts render as a count.
#[must_use]
pub fn render_message_content(content: &[MessageContent]) -> String {
    let mut parts = Vec::with_capacity(content.len());
    for part in content {
        match part {
            MessageContent::Text { text } => parts.push(text.clone()),
            MessageContent::Image { image_urls } => {
                parts.push(format!("[{} image(s)]", image_urls.len()));
            }
        }
    }
    parts.join("\n")
}

fn render_tasks(tasks: &[Task]) -> String {
    tasks
        .iter()
        .map(|task| {
            let marker = match task.status {
                TaskStatus::Todo => "[ ]",
                TaskStatus::InProgress => "[~]",
                TaskStatus::Done => "[x]",
            };
            format!("{marker} {}", task.title)
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn render_condensation(cond: &CondensationEvent) -> String {
    let mut out = format!(
        "Condensation: {} event(s) forgotten",
        cond.forgotten_event_ids.len()
    );
    if let Some(summary) = cond.summary.as_deref().filter(|s| !s.is_empty()) {
        let _ = write!(out, "\n{summary}");
    }
    out
}
