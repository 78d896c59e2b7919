//! Domain event → `session/update` translation.
//!
//! [`translate`] is pure: it maps one completed event to the notifications
//! the host should see, in order. The same function serves live delivery and
//! history replay, so a resumed session renders exactly as it did live.

use serde_json::Value;
use tracing::debug;

use super::context::SessionContext;
use crate::acp::schema::{
    PlanEntry, PlanEntryPriority, PlanEntryStatus, SessionNotification, SessionUpdate, ToolCall,
    ToolCallContent, ToolCallLocation, ToolCallStatus, ToolCallUpdate, ToolKind,
};
use crate::engine::event::{
    Action, ActionEvent, MessageEvent, Observation, ObservationEvent, Role, Task, TaskStatus,
};
use crate::engine::render::{
    render_action, render_event, render_message_content, render_reasoning,
};
use crate::engine::DomainEvent;

/// Kind for a tool name before any argument-based refinement.
#[must_use]
pub fn tool_kind_for_name(tool_name: &str) -> ToolKind {
    match tool_name {
        "terminal" => ToolKind::Execute,
        "think" => ToolKind::Think,
        name if name.starts_with("browser") => ToolKind::Fetch,
        _ => ToolKind::Other,
    }
}

/// Title of a file editor call: reading for `view`, editing otherwise.
#[must_use]
pub fn file_editor_title(command: &str, path: &str) -> String {
    if command == "view" {
        format!("Reading `{path}`")
    } else {
        format!("Editing `{path}`")
    }
}

/// Translate one completed event into host notifications.
///
/// With `streaming` set, assistant messages, reasoning text and `think`
/// arguments were already delivered token by token; they are skipped and
/// actions become
/// `tool_call_update`s of the call the stream preview started.
#[must_use]
pub fn translate(event: &DomainEvent, streaming: bool) -> Vec<SessionUpdate> {
    match event {
        DomainEvent::StateUpdate(_) => Vec::new(),
        DomainEvent::Action(action) => translate_action(action, streaming),
        DomainEvent::Observation(observation) => translate_observation(observation, event),
        DomainEvent::UserReject(reject) => vec![failed_update(&reject.tool_call_id, event)],
        DomainEvent::AgentError(error) => vec![failed_update(&error.tool_call_id, event)],
        DomainEvent::Message(message) => translate_message(message, streaming),
        DomainEvent::Pause(_)
        | DomainEvent::Condensation(_)
        | DomainEvent::CondensationRequest(_)
        | DomainEvent::SystemPrompt(_) => thought(render_event(event)).into_iter().collect(),
    }
}

/// [`translate`] wrapped into notifications for the session in `ctx`,
/// each carrying the current usage metadata.
#[must_use]
pub fn translate_for(
    ctx: &SessionContext,
    event: &DomainEvent,
    streaming: bool,
) -> Vec<SessionNotification> {
    translate(event, streaming)
        .into_iter()
        .map(|update| ctx.notification(update))
        .collect()
}

fn translate_action(event: &ActionEvent, streaming: bool) -> Vec<SessionUpdate> {
    let mut updates = Vec::with_capacity(2);

    if !streaming {
        updates.extend(thought(render_reasoning(event)));
    }

    let mut kind = tool_kind_for_name(&event.tool_name);
    let mut title = event.tool_name.clone();
    let mut content = None;
    let mut locations = None;
    let mut raw_input = None;

    if let Some(action) = &event.action {
        let rendered = render_action(action);
        match action {
            Action::Think { .. } => {
                // Streamed piecewise from the tool arguments already.
                if !streaming {
                    updates.extend(thought(rendered));
                }
                return updates;
            }
            Action::Finish { .. } => {
                updates.extend(message(rendered));
                return updates;
            }
            Action::FileEditor { command, path, .. } => {
                kind = if command == "view" {
                    ToolKind::Read
                } else {
                    ToolKind::Edit
                };
                title = file_editor_title(command, path);
            }
            Action::Terminal { command } => title.clone_from(command),
            Action::TaskTracker { .. } => title = "Plan updated".to_owned(),
            Action::Other { .. } => {}
        }
        content = ToolCallContent::from_text(&rendered);
        locations = action_locations(action);
        raw_input = serde_json::to_value(action)
            .map_err(|err| debug!(%err, "action not serializable"))
            .ok();
    }

    if streaming {
        updates.push(SessionUpdate::ToolCallUpdate(ToolCallUpdate {
            tool_call_id: event.tool_call_id.clone(),
            title: Some(title),
            kind: Some(kind),
            status: Some(ToolCallStatus::InProgress),
            content,
            locations,
            raw_input,
            raw_output: None,
        }));
    } else {
        updates.push(SessionUpdate::ToolCall(ToolCall {
            tool_call_id: event.tool_call_id.clone(),
            title,
            kind,
            status: ToolCallStatus::InProgress,
            content,
            locations,
            raw_input,
        }));
    }
    updates
}

fn translate_observation(
    observation: &ObservationEvent,
    event: &DomainEvent,
) -> Vec<SessionUpdate> {
    match &observation.observation {
        Observation::Think { .. } | Observation::Finish { .. } => Vec::new(),
        Observation::TaskTracker { task_list } => vec![SessionUpdate::Plan {
            entries: task_list.iter().map(plan_entry).collect(),
        }],
        Observation::Other { .. } => vec![SessionUpdate::ToolCallUpdate(ToolCallUpdate {
            tool_call_id: observation.tool_call_id.clone(),
            status: Some(ToolCallStatus::Completed),
            content: ToolCallContent::from_text(&render_event(event)),
            raw_output: raw_event(event),
            ..ToolCallUpdate::default()
        })],
    }
}

fn translate_message(event: &MessageEvent, streaming: bool) -> Vec<SessionUpdate> {
    if event.role == Role::User || streaming {
        return Vec::new();
    }
    message(render_message_content(&event.content))
        .into_iter()
        .collect()
}

fn failed_update(tool_call_id: &str, event: &DomainEvent) -> SessionUpdate {
    SessionUpdate::ToolCallUpdate(ToolCallUpdate {
        tool_call_id: tool_call_id.to_owned(),
        status: Some(ToolCallStatus::Failed),
        content: ToolCallContent::from_text(&render_event(event)),
        raw_output: raw_event(event),
        ..ToolCallUpdate::default()
    })
}

/// Plan entry for one tracked task.
#[must_use]
pub fn plan_entry(task: &Task) -> PlanEntry {
    PlanEntry {
        content: task.title.clone(),
        priority: PlanEntryPriority::Medium,
        status: match task.status {
            TaskStatus::Todo => PlanEntryStatus::Pending,
            TaskStatus::InProgress => PlanEntryStatus::InProgress,
            TaskStatus::Done => PlanEntryStatus::Completed,
        },
    }
}

/// File locations touched by an action; only the file editor reports any.
#[must_use]
pub fn action_locations(action: &Action) -> Option<Vec<ToolCallLocation>> {
    let Action::FileEditor {
        path,
        view_range,
        insert_line,
        ..
    } = action
    else {
        return None;
    };
    if path.is_empty() {
        return None;
    }
    let line = view_range
        .as_deref()
        .and_then(<[u32]>::first)
        .copied()
        .or(*insert_line);
    Some(vec![ToolCallLocation {
        path: path.clone(),
        line,
    }])
}

fn raw_event(event: &DomainEvent) -> Option<Value> {
    serde_json::to_value(event)
        .map_err(|err| debug!(%err, event_id = event.id(), "event not serializable"))
        .ok()
}

fn thought(text: String) -> Option<SessionUpdate> {
    (!text.trim().is_empty()).then(|| SessionUpdate::thought(text))
}

fn message(text: String) -> Option<SessionUpdate> {
    (!text.trim().is_empty()).then(|| SessionUpdate::message(text))
}
